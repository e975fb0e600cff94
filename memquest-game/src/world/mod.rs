//! Authoritative world model: board, entities, source variables, tray and history.
//!
//! `WorldState` is the only mutator of these buckets. Every mutator that moves
//! an entity keeps the entity's `position` and the board's membership lists in
//! agreement: a positioned entity sits in exactly the cell named by its
//! position, an unpositioned one sits in no cell.

pub mod error;
pub mod grid;
pub mod tray;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::clock::SharedClock;
use crate::constants::DEFAULT_ENTITY_TYPE;

pub use error::WorldError;
pub use grid::{Cell, EntityId, Grid, Position};
pub use tray::{Tray, TrayItem};

/// Canonical entity record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    pub id: EntityId,
    #[serde(rename = "type")]
    pub entity_type: String,
    pub position: Option<Position>,
    #[serde(default)]
    pub variables: Map<String, Value>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl Entity {
    /// Value carried by the unit, if any.
    #[must_use]
    pub fn value(&self) -> Option<&Value> {
        self.variables.get(crate::constants::ENTITY_VALUE_KEY)
    }
}

fn default_entity_type() -> String {
    DEFAULT_ENTITY_TYPE.to_string()
}

/// Input to [`WorldState::add_entity`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityDescriptor {
    #[serde(default)]
    pub id: Option<EntityId>,
    #[serde(rename = "type", default = "default_entity_type")]
    pub entity_type: String,
    #[serde(default)]
    pub position: Option<Position>,
    #[serde(default)]
    pub variables: Map<String, Value>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl EntityDescriptor {
    #[must_use]
    pub fn new(id: impl Into<EntityId>, entity_type: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            entity_type: entity_type.into(),
            position: None,
            variables: Map::new(),
            metadata: Map::new(),
        }
    }

    #[must_use]
    pub fn at(mut self, position: Position) -> Self {
        self.position = Some(position);
        self
    }

    #[must_use]
    pub fn with_variable(mut self, key: impl Into<String>, value: Value) -> Self {
        self.variables.insert(key.into(), value);
        self
    }
}

/// A source-code variable. `bound_to` is a lookup-only id and may dangle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableBinding {
    #[serde(rename = "type")]
    pub var_type: String,
    pub value: Value,
    #[serde(default)]
    pub bound_to: Option<EntityId>,
}

/// Independent copy of the four state buckets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub grid: Grid,
    pub entities: BTreeMap<EntityId, Entity>,
    pub variables: BTreeMap<String, VariableBinding>,
    pub tray: Tray,
}

impl Snapshot {
    #[must_use]
    pub fn entity(&self, id: &str) -> Option<&Entity> {
        self.entities.get(id)
    }

    #[must_use]
    pub fn variable_value(&self, name: &str) -> Option<&Value> {
        self.variables.get(name).map(|binding| &binding.value)
    }
}

/// The player action that produced a history entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionRecord {
    pub verb: String,
    #[serde(default)]
    pub params: Map<String, Value>,
    #[serde(default)]
    pub line_index: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub action: ActionRecord,
    pub timestamp: i64,
    pub state_before: Snapshot,
    pub state_after: Snapshot,
}

#[derive(Debug, Clone)]
pub struct WorldState {
    grid: Grid,
    entities: BTreeMap<EntityId, Entity>,
    variables: BTreeMap<String, VariableBinding>,
    tray: Tray,
    history: Vec<HistoryEntry>,
    action_index: usize,
    clock: SharedClock,
}

impl WorldState {
    #[must_use]
    pub fn new(rows: usize, cols: usize, tray_slots: usize, clock: SharedClock) -> Self {
        Self {
            grid: Grid::new(rows, cols),
            entities: BTreeMap::new(),
            variables: BTreeMap::new(),
            tray: Tray::new(tray_slots),
            history: Vec::new(),
            action_index: 0,
            clock,
        }
    }

    #[must_use]
    pub const fn grid(&self) -> &Grid {
        &self.grid
    }

    #[must_use]
    pub const fn tray(&self) -> &Tray {
        &self.tray
    }

    #[must_use]
    pub fn now(&self) -> i64 {
        self.clock.now_millis()
    }

    // Entities -------------------------------------------------------------

    /// Create an entity, placing it when the descriptor carries a position.
    ///
    /// # Errors
    ///
    /// Fails when the id is missing or taken, or the position is off the board.
    /// Nothing is created on failure.
    pub fn add_entity(&mut self, descriptor: EntityDescriptor) -> Result<&Entity, WorldError> {
        let id = descriptor.id.ok_or(WorldError::MissingEntityId)?;
        if self.entities.contains_key(&id) {
            return Err(WorldError::DuplicateEntity(id));
        }
        if let Some(position) = descriptor.position {
            self.grid.check(position)?;
        }
        let entity = Entity {
            id: id.clone(),
            entity_type: descriptor.entity_type,
            position: None,
            variables: descriptor.variables,
            metadata: descriptor.metadata,
        };
        self.entities.insert(id.clone(), entity);
        if let Some(position) = descriptor.position {
            self.attach(&id, position);
        }
        log::debug!("added entity {id}");
        self.entities
            .get(&id)
            .ok_or(WorldError::UnknownEntity(id))
    }

    /// Delete an entity and its board membership. Variable bindings are left alone.
    pub fn remove_entity(&mut self, id: &str) -> bool {
        if !self.entities.contains_key(id) {
            return false;
        }
        self.detach(id);
        self.entities.remove(id);
        true
    }

    #[must_use]
    pub fn get_entity(&self, id: &str) -> Option<&Entity> {
        self.entities.get(id)
    }

    #[must_use]
    pub fn has_entity(&self, id: &str) -> bool {
        self.entities.contains_key(id)
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Put an entity on a cell, leaving its previous cell first.
    ///
    /// # Errors
    ///
    /// Fails on an off-board position or an unknown id.
    pub fn place_entity_on_grid(&mut self, id: &str, position: Position) -> Result<(), WorldError> {
        self.grid.check(position)?;
        let current = self
            .entities
            .get(id)
            .ok_or_else(|| WorldError::UnknownEntity(id.to_string()))?
            .position;
        if current == Some(position) {
            return Ok(());
        }
        self.detach(id);
        self.attach(id, position);
        Ok(())
    }

    /// # Errors
    ///
    /// Same as [`Self::place_entity_on_grid`].
    pub fn move_entity(&mut self, id: &str, position: Position) -> Result<(), WorldError> {
        self.place_entity_on_grid(id, position)
    }

    /// Take an entity off the board without deleting it.
    ///
    /// # Errors
    ///
    /// Fails on an unknown id.
    pub fn unplace_entity(&mut self, id: &str) -> Result<(), WorldError> {
        if !self.entities.contains_key(id) {
            return Err(WorldError::UnknownEntity(id.to_string()));
        }
        self.detach(id);
        Ok(())
    }

    /// Exchange the board positions of two entities.
    ///
    /// Both ids are resolved before anything moves, so an unknown id leaves
    /// the board untouched. An unpositioned side makes the other side leave
    /// the board.
    ///
    /// # Errors
    ///
    /// Fails when either id is unknown.
    pub fn swap_entities(&mut self, first: &str, second: &str) -> Result<(), WorldError> {
        let first_pos = self
            .entities
            .get(first)
            .ok_or_else(|| WorldError::UnknownEntity(first.to_string()))?
            .position;
        let second_pos = self
            .entities
            .get(second)
            .ok_or_else(|| WorldError::UnknownEntity(second.to_string()))?
            .position;
        if first == second {
            return Ok(());
        }
        self.detach(first);
        self.detach(second);
        if let Some(position) = second_pos {
            self.attach(first, position);
        }
        if let Some(position) = first_pos {
            self.attach(second, position);
        }
        Ok(())
    }

    /// Set one entry of an entity's variable bag.
    ///
    /// # Errors
    ///
    /// Fails on an unknown id.
    pub fn set_entity_variable(
        &mut self,
        id: &str,
        key: impl Into<String>,
        value: Value,
    ) -> Result<(), WorldError> {
        let entity = self
            .entities
            .get_mut(id)
            .ok_or_else(|| WorldError::UnknownEntity(id.to_string()))?;
        entity.variables.insert(key.into(), value);
        Ok(())
    }

    /// Set one entry of an entity's metadata.
    ///
    /// # Errors
    ///
    /// Fails on an unknown id.
    pub fn set_entity_metadata(
        &mut self,
        id: &str,
        key: impl Into<String>,
        value: Value,
    ) -> Result<(), WorldError> {
        let entity = self
            .entities
            .get_mut(id)
            .ok_or_else(|| WorldError::UnknownEntity(id.to_string()))?;
        entity.metadata.insert(key.into(), value);
        Ok(())
    }

    fn detach(&mut self, id: &str) {
        let Some(entity) = self.entities.get_mut(id) else {
            return;
        };
        if let Some(position) = entity.position.take() {
            self.grid.remove(id, position);
        }
    }

    fn attach(&mut self, id: &str, position: Position) {
        if let Some(entity) = self.entities.get_mut(id) {
            entity.position = Some(position);
            self.grid.insert(id, position);
        }
    }

    // Variables ------------------------------------------------------------

    /// Create or overwrite a variable, keeping an existing binding.
    pub fn set_variable(&mut self, name: &str, var_type: &str, value: Value) {
        self.variables
            .entry(name.to_string())
            .and_modify(|binding| {
                binding.var_type = var_type.to_string();
                binding.value = value.clone();
            })
            .or_insert_with(|| VariableBinding {
                var_type: var_type.to_string(),
                value,
                bound_to: None,
            });
    }

    /// Update only the value of an existing variable.
    ///
    /// # Errors
    ///
    /// Fails on an unknown variable.
    pub fn set_variable_value(&mut self, name: &str, value: Value) -> Result<(), WorldError> {
        let binding = self
            .variables
            .get_mut(name)
            .ok_or_else(|| WorldError::UnknownVariable(name.to_string()))?;
        binding.value = value;
        Ok(())
    }

    #[must_use]
    pub fn get_variable(&self, name: &str) -> Option<&VariableBinding> {
        self.variables.get(name)
    }

    #[must_use]
    pub fn get_variable_value(&self, name: &str) -> Option<&Value> {
        self.variables.get(name).map(|binding| &binding.value)
    }

    #[must_use]
    pub const fn variables(&self) -> &BTreeMap<String, VariableBinding> {
        &self.variables
    }

    /// Point a variable at an entity.
    ///
    /// # Errors
    ///
    /// Fails when either the variable or the entity does not exist.
    pub fn bind_variable(&mut self, name: &str, entity_id: &str) -> Result<(), WorldError> {
        if !self.entities.contains_key(entity_id) {
            return Err(WorldError::UnknownEntity(entity_id.to_string()));
        }
        let binding = self
            .variables
            .get_mut(name)
            .ok_or_else(|| WorldError::UnknownVariable(name.to_string()))?;
        binding.bound_to = Some(entity_id.to_string());
        Ok(())
    }

    /// Names of variables bound to `entity_id`.
    #[must_use]
    pub fn variables_bound_to(&self, entity_id: &str) -> Vec<String> {
        self.variables
            .iter()
            .filter(|(_, binding)| binding.bound_to.as_deref() == Some(entity_id))
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Entity a variable is bound to, if it still exists.
    #[must_use]
    pub fn resolve_binding(&self, name: &str) -> Option<&Entity> {
        let id = self.variables.get(name)?.bound_to.as_deref()?;
        self.entities.get(id)
    }

    // Tray -----------------------------------------------------------------

    /// Append an item. Returns `false` when every slot is taken.
    pub fn add_to_tray(&mut self, item_type: &str, metadata: Map<String, Value>) -> bool {
        let item = TrayItem {
            item_type: item_type.to_string(),
            metadata,
            added_at: self.now(),
        };
        self.tray.push(item)
    }

    pub fn remove_from_tray(&mut self, index: usize) -> Option<TrayItem> {
        self.tray.remove(index)
    }

    #[must_use]
    pub fn find_tray_slot(&self, item_type: &str) -> Option<usize> {
        self.tray.find(item_type)
    }

    pub fn set_cooldown(&mut self, item_type: &str, duration_ms: i64) {
        let until = self.now().saturating_add(duration_ms);
        self.tray.set_cooldown(item_type, until);
    }

    /// Checking an expired cooldown clears it.
    pub fn is_on_cooldown(&mut self, item_type: &str) -> bool {
        let now = self.now();
        self.tray.check_cooldown(item_type, now)
    }

    // Snapshots and history ------------------------------------------------

    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            grid: self.grid.clone(),
            entities: self.entities.clone(),
            variables: self.variables.clone(),
            tray: self.tray.clone(),
        }
    }

    /// Overwrite all four buckets from a snapshot. History is kept.
    pub fn restore(&mut self, snapshot: &Snapshot) {
        self.grid = snapshot.grid.clone();
        self.entities = snapshot.entities.clone();
        self.variables = snapshot.variables.clone();
        self.tray = snapshot.tray.clone();
    }

    /// Append an action, discarding any undone entries past the cursor.
    pub fn record_action(&mut self, action: ActionRecord, state_before: Snapshot) {
        self.history.truncate(self.action_index);
        let entry = HistoryEntry {
            action,
            timestamp: self.now(),
            state_before,
            state_after: self.snapshot(),
        };
        self.history.push(entry);
        self.action_index = self.history.len();
    }

    /// Step back one action. Returns `false` at the start of history.
    pub fn undo(&mut self) -> bool {
        if self.action_index == 0 {
            return false;
        }
        self.action_index -= 1;
        let before = self.history[self.action_index].state_before.clone();
        self.restore(&before);
        true
    }

    /// Re-apply the next undone action from its recorded result.
    pub fn redo(&mut self) -> bool {
        let Some(entry) = self.history.get(self.action_index) else {
            return false;
        };
        let after = entry.state_after.clone();
        self.restore(&after);
        self.action_index += 1;
        true
    }

    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.action_index > 0
    }

    #[must_use]
    pub fn can_redo(&self) -> bool {
        self.action_index < self.history.len()
    }

    #[must_use]
    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    #[must_use]
    pub const fn action_index(&self) -> usize {
        self.action_index
    }
}
