//! Orchestration of one puzzle session: loading, actions, hints, history and saves.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::clock::{SharedClock, system_clock};
use crate::constants::{DEFAULT_STORAGE_KEY, DEFAULT_VARIABLE_TYPE, FEEDBACK_NO_LEVEL, MAX_HINT_TIER};
use crate::events::{EventBus, GameEvent, GameEventKind, RestoreReason, SubscriptionId};
use crate::hints::hint_for_tier;
use crate::level::{Level, LevelConfig, VariableSeed, load_level};
use crate::resolver::{ActionHandler, ActionOutcome, ActionResolver, PlayerAction, StateDiff};
use crate::storage::{SaveData, SaveStore};
use crate::tracker::CodeLineTracker;
use crate::types::{CharacterTag, get_character_for_type};
use crate::world::{WorldError, WorldState};

#[derive(Debug, Error)]
pub enum GameError {
    #[error("no level is loaded")]
    NoLevel,
    #[error("invalid level configuration: {0}")]
    InvalidLevel(#[from] serde_json::Error),
    #[error("cannot seed level `{level_id}`: {source}")]
    Seed {
        level_id: String,
        #[source]
        source: WorldError,
    },
}

/// Manager settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagerConfig {
    #[serde(default = "ManagerConfig::default_storage_key")]
    pub storage_key: String,
    #[serde(default = "ManagerConfig::default_auto_save")]
    pub auto_save: bool,
    #[serde(default = "ManagerConfig::default_max_hint_tier")]
    pub max_hint_tier: u8,
}

impl ManagerConfig {
    fn default_storage_key() -> String {
        DEFAULT_STORAGE_KEY.to_string()
    }

    const fn default_auto_save() -> bool {
        true
    }

    const fn default_max_hint_tier() -> u8 {
        MAX_HINT_TIER
    }

    /// # Errors
    ///
    /// Returns an error if the JSON does not match the config schema.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            storage_key: Self::default_storage_key(),
            auto_save: Self::default_auto_save(),
            max_hint_tier: Self::default_max_hint_tier(),
        }
    }
}

/// A loaded level bound to its world and tracker.
#[derive(Debug, Clone)]
pub struct PuzzleSession {
    level: Level,
    world: WorldState,
    tracker: CodeLineTracker,
}

impl PuzzleSession {
    /// Build the world and tracker for `level`.
    ///
    /// # Errors
    ///
    /// Returns an error if the initial state names duplicate or off-board
    /// entities, or binds a variable to a missing entity.
    pub fn new(level: Level, clock: SharedClock) -> Result<Self, GameError> {
        let world = Self::seed_world(&level, clock.clone()).map_err(|source| GameError::Seed {
            level_id: level.id.clone(),
            source,
        })?;
        let tracker = CodeLineTracker::new(level.code_lines.clone(), clock);
        Ok(Self {
            level,
            world,
            tracker,
        })
    }

    fn seed_world(level: &Level, clock: SharedClock) -> Result<WorldState, WorldError> {
        let initial = &level.initial_state;
        let mut world = WorldState::new(
            initial.grid.rows,
            initial.grid.cols,
            level.tray_config.slots,
            clock,
        );
        for descriptor in &initial.entities {
            world.add_entity(descriptor.clone())?;
        }
        for (name, seed) in &initial.variables {
            match seed {
                VariableSeed::Binding(binding) => {
                    world.set_variable(name, &binding.var_type, binding.value.clone());
                    if let Some(entity_id) = &binding.bound_to {
                        world.bind_variable(name, entity_id)?;
                    }
                }
                VariableSeed::Plain(value) => {
                    world.set_variable(name, DEFAULT_VARIABLE_TYPE, value.clone());
                }
            }
        }
        for item in initial.tray.items.iter().chain(&level.tray_config.items) {
            if !world.add_to_tray(&item.item_type, item.metadata.clone()) {
                log::warn!(
                    "level {}: tray is full, dropping {} seed",
                    level.id,
                    item.item_type
                );
            }
        }
        Ok(world)
    }

    #[must_use]
    pub const fn level(&self) -> &Level {
        &self.level
    }

    #[must_use]
    pub const fn world(&self) -> &WorldState {
        &self.world
    }

    #[must_use]
    pub const fn tracker(&self) -> &CodeLineTracker {
        &self.tracker
    }

    /// Resolve one action against this session.
    pub fn execute(&mut self, resolver: &ActionResolver, action: &PlayerAction) -> ActionOutcome {
        resolver.resolve_action(&mut self.world, &mut self.tracker, action)
    }
}

/// Facade owning the active session, resolver, event bus and save store.
#[derive(Debug)]
pub struct GameStateManager<S>
where
    S: SaveStore,
{
    config: ManagerConfig,
    store: S,
    clock: SharedClock,
    resolver: ActionResolver,
    events: EventBus,
    session: Option<PuzzleSession>,
}

impl<S> GameStateManager<S>
where
    S: SaveStore,
{
    #[must_use]
    pub fn new(store: S) -> Self {
        Self::with_config(store, ManagerConfig::default())
    }

    #[must_use]
    pub fn with_config(store: S, config: ManagerConfig) -> Self {
        Self {
            config,
            store,
            clock: system_clock(),
            resolver: ActionResolver::new(),
            events: EventBus::new(),
            session: None,
        }
    }

    /// Replace the time source used for sessions loaded afterwards.
    #[must_use]
    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub const fn config(&self) -> &ManagerConfig {
        &self.config
    }

    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    #[must_use]
    pub const fn session(&self) -> Option<&PuzzleSession> {
        self.session.as_ref()
    }

    #[must_use]
    pub fn level(&self) -> Option<&Level> {
        self.session.as_ref().map(PuzzleSession::level)
    }

    #[must_use]
    pub fn world(&self) -> Option<&WorldState> {
        self.session.as_ref().map(PuzzleSession::world)
    }

    #[must_use]
    pub fn tracker(&self) -> Option<&CodeLineTracker> {
        self.session.as_ref().map(PuzzleSession::tracker)
    }

    #[must_use]
    pub fn is_level_complete(&self) -> bool {
        self.tracker().is_some_and(CodeLineTracker::is_complete)
    }

    /// Add or replace an action verb.
    pub fn register_handler(&mut self, verb: impl Into<String>, handler: impl ActionHandler + 'static) {
        self.resolver.register_handler(verb, handler);
    }

    /// Normalize and start a level, replacing any active session.
    ///
    /// # Errors
    ///
    /// Returns an error if the initial state cannot be seeded.
    pub fn load_level(&mut self, config: LevelConfig) -> Result<&Level, GameError> {
        let level = load_level(config);
        let session = PuzzleSession::new(level, self.clock.clone())?;
        let event = GameEvent::LevelLoaded {
            level_id: session.level.id.clone(),
            title: session.level.title.clone(),
            line_count: session.level.line_count(),
        };
        self.session = Some(session);
        self.events.emit(&event);
        self.level().ok_or(GameError::NoLevel)
    }

    /// # Errors
    ///
    /// Returns an error if the JSON is not a valid level or cannot be seeded.
    pub fn load_level_json(&mut self, json: &str) -> Result<&Level, GameError> {
        let config = LevelConfig::from_json(json)?;
        self.load_level(config)
    }

    /// Resolve an action, emit its events and auto-save on success.
    pub fn execute_action(&mut self, action: PlayerAction) -> ActionOutcome {
        let Some(session) = self.session.as_mut() else {
            return ActionOutcome::failure(FEEDBACK_NO_LEVEL, None);
        };
        let outcome = session.execute(&self.resolver, &action);

        let mut events = Vec::new();
        if outcome.success {
            events.push(GameEvent::ActionSuccess {
                verb: action.verb.clone(),
                outcome: outcome.clone(),
            });
            if let Some(diff) = &outcome.diff {
                scene_events(&session.world, diff, &mut events);
            }
            if outcome.feedback.level_complete {
                log::info!("level {} complete", session.level.id);
                events.push(GameEvent::LevelComplete {
                    level_id: session.level.id.clone(),
                    stats: session.tracker.stats().clone(),
                });
            } else {
                events.push(GameEvent::LineAdvanced {
                    line_index: session.tracker.current_index(),
                });
            }
        } else {
            events.push(GameEvent::ActionFailure {
                verb: action.verb.clone(),
                outcome: outcome.clone(),
            });
        }

        for event in &events {
            self.events.emit(event);
        }
        if outcome.success && self.config.auto_save {
            self.save_progress();
        }
        outcome
    }

    /// Same as [`Self::execute_action`], for callers that await every action.
    #[cfg(feature = "async")]
    pub async fn execute_action_async(&mut self, action: PlayerAction) -> ActionOutcome {
        tokio::task::yield_now().await;
        self.execute_action(action)
    }

    /// Hint for the current line. Every request against a loaded level counts
    /// as a hint use, including one made after the last line, which yields `None`.
    pub fn get_hint(&mut self, tier: u8) -> Option<String> {
        let max_tier = self.config.max_hint_tier;
        let session = self.session.as_mut()?;
        session.tracker.record_hint();
        let hint = hint_for_tier(session.tracker.current_line()?, tier, max_tier);
        self.events.emit(&GameEvent::HintUsed {
            tier: tier.min(max_tier),
            hint: hint.clone(),
        });
        Some(hint)
    }

    /// Undo the last action and move the cursor back to its line.
    pub fn undo(&mut self) -> bool {
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        if !session.world.undo() {
            return false;
        }
        let line_index = session
            .world
            .history()
            .get(session.world.action_index())
            .and_then(|entry| entry.action.line_index)
            .unwrap_or(0);
        session.tracker.jump_to(line_index);
        self.events.emit(&GameEvent::StateRestored {
            reason: RestoreReason::Undo,
            line_index,
        });
        true
    }

    /// Re-apply the next undone action and move the cursor past its line.
    pub fn redo(&mut self) -> bool {
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        if !session.world.redo() {
            return false;
        }
        let next_line = session
            .world
            .action_index()
            .checked_sub(1)
            .and_then(|index| session.world.history().get(index))
            .and_then(|entry| entry.action.line_index)
            .map_or(0, |index| index + 1);
        session.tracker.jump_to(next_line);
        self.events.emit(&GameEvent::StateRestored {
            reason: RestoreReason::Redo,
            line_index: session.tracker.current_index(),
        });
        true
    }

    /// Rebuild the world and tracker from the loaded level.
    ///
    /// # Errors
    ///
    /// Returns an error if no level is loaded.
    pub fn reset_level(&mut self) -> Result<(), GameError> {
        let level = self.level().cloned().ok_or(GameError::NoLevel)?;
        self.session = Some(PuzzleSession::new(level, self.clock.clone())?);
        self.events.emit(&GameEvent::StateRestored {
            reason: RestoreReason::Reset,
            line_index: 0,
        });
        Ok(())
    }

    /// Persist the active session. Failures are logged and reported as `false`.
    pub fn save_progress(&mut self) -> bool {
        let Some(session) = self.session.as_ref() else {
            return false;
        };
        let save = SaveData {
            level_id: session.level.id.clone(),
            world_snapshot: session.world.snapshot(),
            code_index: session.tracker.current_index(),
            stats: session.tracker.stats().clone(),
            timestamp: self.clock.now_millis(),
        };
        let json = match save.to_json() {
            Ok(json) => json,
            Err(err) => {
                log::warn!("cannot serialize save for level {}: {err}", save.level_id);
                return false;
            }
        };
        match self.store.write(&self.config.storage_key, &json) {
            Ok(()) => true,
            Err(err) => {
                log::warn!("cannot write save `{}`: {err}", self.config.storage_key);
                false
            }
        }
    }

    /// Read the stored save. When it belongs to the active level the world,
    /// cursor and stats are restored from it.
    pub fn load_progress(&mut self) -> Option<SaveData> {
        let raw = match self.store.read(&self.config.storage_key) {
            Ok(raw) => raw?,
            Err(err) => {
                log::warn!("cannot read save `{}`: {err}", self.config.storage_key);
                return None;
            }
        };
        let save = match SaveData::from_json(&raw) {
            Ok(save) => save,
            Err(err) => {
                log::warn!("discarding unreadable save `{}`: {err}", self.config.storage_key);
                return None;
            }
        };
        if let Some(session) = self.session.as_mut()
            && session.level.id == save.level_id
        {
            session.world.restore(&save.world_snapshot);
            session
                .tracker
                .restore_progress(save.code_index, save.stats.clone());
            let line_index = session.tracker.current_index();
            self.events.emit(&GameEvent::StateRestored {
                reason: RestoreReason::SaveLoaded,
                line_index,
            });
        }
        Some(save)
    }

    /// Delete the stored save.
    pub fn clear_progress(&mut self) -> bool {
        match self.store.remove(&self.config.storage_key) {
            Ok(()) => true,
            Err(err) => {
                log::warn!("cannot remove save `{}`: {err}", self.config.storage_key);
                false
            }
        }
    }

    pub fn on<F>(&mut self, kind: GameEventKind, handler: F) -> SubscriptionId
    where
        F: FnMut(&GameEvent) -> anyhow::Result<()> + Send + 'static,
    {
        self.events.on(kind, handler)
    }

    pub fn off(&mut self, id: SubscriptionId) -> bool {
        self.events.off(id)
    }

    /// Drop every subscription and the active session.
    pub fn dispose(&mut self) {
        self.events.clear();
        self.session = None;
    }
}

/// Scene notifications for declared and updated variables and pointer links.
fn scene_events(world: &WorldState, diff: &StateDiff, events: &mut Vec<GameEvent>) {
    let mut touched = Vec::new();
    for name in &diff.variables.added {
        if let Some(binding) = world.get_variable(name) {
            events.push(GameEvent::VariableDeclared {
                name: name.clone(),
                var_type: binding.var_type.clone(),
                value: binding.value.clone(),
            });
            touched.push(name);
        }
    }
    for (name, change) in &diff.variables.changed {
        events.push(GameEvent::VariableUpdated {
            name: name.clone(),
            before: change.before.clone(),
            after: change.after.clone(),
        });
        touched.push(name);
    }
    for name in touched {
        let Some(binding) = world.get_variable(name) else {
            continue;
        };
        if get_character_for_type(&binding.var_type) != CharacterTag::Pointer {
            continue;
        }
        if let Some(entity) = world.resolve_binding(name) {
            events.push(GameEvent::PointerLinked {
                pointer: name.clone(),
                entity_id: entity.id.clone(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::storage::MemoryStore;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    const LEVEL: &str = r#"{
        "id": "pointers-1",
        "codeLines": [
            "int x = 5; // @expected: x=5, pos(entity-x)=0,0",
            "int *p = &x;",
            "*p = 7; // @expected: x=7"
        ],
        "trayConfig": {"slots": 2, "items": [{"type": "catapult"}, {"type": "ballista"}]}
    }"#;

    fn manager() -> GameStateManager<MemoryStore> {
        GameStateManager::new(MemoryStore::new())
            .with_clock(Arc::new(ManualClock::starting_at(10)))
    }

    fn declare_x() -> PlayerAction {
        PlayerAction::new("assign")
            .with_param("target", json!({"row": 0, "col": 0}))
            .with_param("createIfMissing", true)
    }

    fn point_p() -> PlayerAction {
        PlayerAction::new("assign")
            .with_param("target", json!({"row": 0, "col": 1}))
            .with_param("createIfMissing", true)
    }

    #[test]
    fn config_defaults_apply_per_field() {
        let config = ManagerConfig::from_json(r#"{"autoSave": false}"#).unwrap();
        assert_eq!(config.storage_key, "gamestate");
        assert!(!config.auto_save);
        assert_eq!(config.max_hint_tier, 2);
    }

    #[test]
    fn actions_without_a_level_fail() {
        let mut manager = manager();
        let outcome = manager.execute_action(declare_x());
        assert!(!outcome.success);
        assert_eq!(outcome.feedback.text, FEEDBACK_NO_LEVEL);
        assert!(manager.get_hint(0).is_none());
        assert!(!manager.undo());
        assert!(matches!(manager.reset_level(), Err(GameError::NoLevel)));
    }

    #[test]
    fn seeding_errors_surface_from_load() {
        let mut manager = manager();
        let err = manager
            .load_level_json(
                r#"{"id": 1, "initialState": {"variables": {"x": {"type": "int", "boundTo": "ghost"}}}}"#,
            )
            .unwrap_err();
        assert!(matches!(err, GameError::Seed { .. }));
        assert!(matches!(
            manager.load_level_json("{"),
            Err(GameError::InvalidLevel(_))
        ));
    }

    #[test]
    fn full_pointer_level_emits_events_and_completes() {
        let mut manager = manager();
        let kinds = Arc::new(Mutex::new(Vec::new()));
        for kind in [
            GameEventKind::LevelLoaded,
            GameEventKind::ActionSuccess,
            GameEventKind::LineAdvanced,
            GameEventKind::LevelComplete,
            GameEventKind::VariableDeclared,
            GameEventKind::VariableUpdated,
            GameEventKind::PointerLinked,
        ] {
            let kinds = Arc::clone(&kinds);
            manager.on(kind, move |event| {
                kinds.lock().unwrap().push(event.kind());
                Ok(())
            });
        }

        manager.load_level_json(LEVEL).unwrap();
        assert_eq!(manager.world().unwrap().tray().len(), 2);

        assert!(manager.execute_action(declare_x()).success);
        assert!(manager.execute_action(point_p()).success);
        let last = manager.execute_action(PlayerAction::new("deref"));
        assert!(last.success, "{}", last.feedback.text);
        assert!(last.feedback.level_complete);
        assert!(manager.is_level_complete());

        let kinds = kinds.lock().unwrap();
        assert_eq!(kinds[0], GameEventKind::LevelLoaded);
        assert!(kinds.contains(&GameEventKind::PointerLinked));
        assert!(kinds.contains(&GameEventKind::VariableUpdated));
        assert_eq!(kinds.last(), Some(&GameEventKind::LevelComplete));
        assert_eq!(
            kinds
                .iter()
                .filter(|kind| **kind == GameEventKind::LineAdvanced)
                .count(),
            2
        );
    }

    #[test]
    fn hints_count_every_request() {
        let mut manager = manager();
        manager.load_level_json(LEVEL).unwrap();
        assert!(manager.get_hint(0).unwrap().contains("declare"));
        manager.get_hint(1).unwrap();
        assert!(manager.get_hint(2).unwrap().contains("entity-x"));
        assert_eq!(manager.tracker().unwrap().stats().hints_used, 3);
    }

    #[test]
    fn hints_after_completion_are_counted_but_empty() {
        let mut manager = manager();
        assert!(manager.get_hint(0).is_none());
        manager.load_level_json(LEVEL).unwrap();
        manager.execute_action(declare_x());
        manager.execute_action(point_p());
        assert!(manager.execute_action(PlayerAction::new("deref")).success);
        assert!(manager.is_level_complete());

        let before = manager.tracker().unwrap().stats().hints_used;
        assert!(manager.get_hint(1).is_none());
        assert_eq!(manager.tracker().unwrap().stats().hints_used, before + 1);
    }

    #[test]
    fn undo_and_redo_realign_the_cursor() {
        let mut manager = manager();
        manager.load_level_json(LEVEL).unwrap();
        manager.execute_action(declare_x());
        manager.execute_action(point_p());
        assert_eq!(manager.tracker().unwrap().current_index(), 2);

        assert!(manager.undo());
        assert_eq!(manager.tracker().unwrap().current_index(), 1);
        assert!(manager.world().unwrap().get_entity("entity-p").is_none());
        assert!(manager.undo());
        assert_eq!(manager.tracker().unwrap().current_index(), 0);
        assert!(!manager.undo());

        assert!(manager.redo());
        assert_eq!(manager.tracker().unwrap().current_index(), 1);
        assert!(manager.world().unwrap().get_entity("entity-x").is_some());
        assert!(manager.redo());
        assert!(manager.world().unwrap().get_entity("entity-p").is_some());
        assert!(!manager.redo());
    }

    #[test]
    fn progress_round_trips_through_the_store() {
        let mut manager = manager();
        manager.load_level_json(LEVEL).unwrap();
        manager.execute_action(declare_x());
        assert!(manager.store().contains("gamestate"));

        let saved_world = manager.world().unwrap().snapshot();
        manager.reset_level().unwrap();
        assert!(manager.world().unwrap().get_entity("entity-x").is_none());

        let save = manager.load_progress().unwrap();
        assert_eq!(save.code_index, 1);
        assert_eq!(manager.tracker().unwrap().current_index(), 1);
        assert_eq!(manager.world().unwrap().snapshot(), saved_world);
        assert!(manager.clear_progress());
        assert!(manager.load_progress().is_none());
    }

    #[test]
    fn saves_with_a_misshapen_grid_are_discarded() {
        let mut manager = manager();
        manager.load_level_json(LEVEL).unwrap();
        manager.execute_action(declare_x());

        let raw = manager.store().read("gamestate").unwrap().unwrap();
        let mut save: serde_json::Value = serde_json::from_str(&raw).unwrap();
        save["worldSnapshot"]["grid"]["cols"] = json!(9);
        manager.store().write("gamestate", &save.to_string()).unwrap();

        manager.reset_level().unwrap();
        assert!(manager.load_progress().is_none());
        assert_eq!(manager.tracker().unwrap().current_index(), 0);
        assert!(manager.world().unwrap().get_entity("entity-x").is_none());
    }

    #[test]
    fn dispose_drops_subscribers_and_session() {
        let mut manager = manager();
        let id = manager.on(GameEventKind::HintUsed, |_| Ok(()));
        manager.load_level_json(LEVEL).unwrap();
        manager.dispose();
        assert!(!manager.off(id));
        assert!(manager.session().is_none());
    }
}
