use anyhow::{Context, Result, ensure};
use serde_json::json;
use std::sync::Arc;

use memquest_game::{
    GameStateManager, LevelConfig, ManualClock, MemoryStore, PlayerAction, SharedClock,
    TrackerState,
};

use super::{BUNDLED_LEVELS, LevelSource, Scenario};

const POINTER_SNIPPET: &str = "int main() {
    int x = 5;
    int *p = &x;
    *p = 9;
    x++;
    return 0;
}";

#[must_use]
pub fn catalog_scenarios() -> Vec<Scenario> {
    let mut scenarios: Vec<Scenario> = BUNDLED_LEVELS
        .iter()
        .map(|(key, json)| {
            Scenario::playthrough(
                *key,
                format!("Auto-play the bundled `{key}` level"),
                LevelSource::Bundled(json),
            )
        })
        .collect();
    scenarios.push(Scenario::playthrough(
        "generated-snippet",
        "Generate a level from a C snippet and auto-play it",
        LevelSource::Snippet {
            id: "generated-snippet",
            source: POINTER_SNIPPET,
        },
    ));
    scenarios.push(Scenario::check(
        "rollback",
        "A failed validation restores the world and flags the tracker",
        check_rollback,
    ));
    scenarios.push(Scenario::check(
        "tray-cooldown",
        "Tray placements respect item cooldowns",
        check_tray_cooldown,
    ));
    scenarios.push(Scenario::check(
        "undo-redo",
        "Undo and redo move between recorded states",
        check_undo_redo,
    ));
    scenarios.push(Scenario::check(
        "save-resume",
        "Auto-saved progress resumes in a fresh manager",
        check_save_resume,
    ));
    scenarios.push(Scenario::check(
        "hints",
        "Hint tiers escalate and are counted",
        check_hints,
    ));
    scenarios
}

#[must_use]
pub fn find_scenario(key: &str) -> Option<Scenario> {
    catalog_scenarios()
        .into_iter()
        .find(|scenario| scenario.key == key)
}

fn bundled(key: &str) -> Result<LevelConfig> {
    let (_, json) = BUNDLED_LEVELS
        .iter()
        .find(|(name, _)| *name == key)
        .with_context(|| format!("no bundled level `{key}`"))?;
    LevelSource::Bundled(json).load()
}

fn manager(clock: &Arc<ManualClock>, store: MemoryStore) -> GameStateManager<MemoryStore> {
    let clock: SharedClock = clock.clone();
    GameStateManager::new(store).with_clock(clock)
}

fn assign_at(row: usize, col: usize) -> PlayerAction {
    PlayerAction::new("assign")
        .with_param("target", json!({"row": row, "col": col}))
        .with_param("createIfMissing", true)
}

fn place_catapult(row: usize, col: usize) -> PlayerAction {
    PlayerAction::new("place")
        .with_param("itemType", "catapult")
        .with_param("target", json!({"row": row, "col": col}))
}

fn check_rollback() -> Result<()> {
    let clock = Arc::new(ManualClock::default());
    let mut manager = manager(&clock, MemoryStore::new());
    manager.load_level(bundled("pointers")?)?;
    ensure!(manager.execute_action(assign_at(0, 0)).success, "first line failed");

    let before = manager.world().context("no world")?.snapshot();
    let outcome = manager.execute_action(assign_at(3, 3));
    ensure!(!outcome.success, "misplaced pointer was accepted");
    let world = manager.world().context("no world")?;
    ensure!(world.snapshot() == before, "world was not rolled back");
    let tracker = manager.tracker().context("no tracker")?;
    ensure!(
        tracker.state() == TrackerState::Error,
        "tracker is {:?}, expected Error",
        tracker.state()
    );
    ensure!(tracker.stats().failures == 1, "failure was not counted");
    Ok(())
}

fn check_tray_cooldown() -> Result<()> {
    let clock = Arc::new(ManualClock::starting_at(1_000));
    let mut manager = manager(&clock, MemoryStore::new());
    manager.load_level(bundled("swap")?)?;

    let first = manager.execute_action(place_catapult(1, 0).with_param("cooldownMs", 300));
    ensure!(first.success, "first placement failed: {}", first.feedback.text);
    let early = manager.execute_action(place_catapult(1, 1));
    ensure!(!early.success, "placement ignored the cooldown");

    clock.advance(300);
    let second = manager.execute_action(place_catapult(1, 1));
    ensure!(second.success, "placement after cooldown failed: {}", second.feedback.text);
    ensure!(
        manager.world().context("no world")?.tray().is_empty(),
        "tray still holds items"
    );
    Ok(())
}

fn check_undo_redo() -> Result<()> {
    let clock = Arc::new(ManualClock::default());
    let mut manager = manager(&clock, MemoryStore::new());
    manager.load_level(bundled("variables")?)?;
    ensure!(manager.execute_action(assign_at(0, 0)).success, "assign failed");
    ensure!(
        manager.execute_action(PlayerAction::new("increment")).success,
        "increment failed"
    );
    ensure!(manager.is_level_complete(), "level did not complete");

    ensure!(manager.undo(), "undo had nothing to do");
    let world = manager.world().context("no world")?;
    ensure!(
        world.get_variable_value("x") == Some(&json!(5.0)),
        "undo left x at {:?}",
        world.get_variable_value("x")
    );
    ensure!(manager.redo(), "redo had nothing to do");
    ensure!(manager.is_level_complete(), "redo did not restore completion");
    ensure!(!manager.redo(), "redo past the end succeeded");
    Ok(())
}

fn check_save_resume() -> Result<()> {
    let clock = Arc::new(ManualClock::starting_at(42));
    let store = MemoryStore::new();
    let mut first = manager(&clock, store.clone());
    first.load_level(bundled("pointers")?)?;
    ensure!(first.execute_action(assign_at(0, 0)).success, "assign failed");
    let expected = first.world().context("no world")?.snapshot();
    first.dispose();

    let mut second = manager(&clock, store);
    second.load_level(bundled("pointers")?)?;
    let save = second.load_progress().context("nothing was saved")?;
    ensure!(save.code_index == 1, "resumed at line {}", save.code_index);
    ensure!(
        second.world().context("no world")?.snapshot() == expected,
        "resumed world differs from the saved one"
    );
    ensure!(second.clear_progress(), "save could not be cleared");
    Ok(())
}

fn check_hints() -> Result<()> {
    let clock = Arc::new(ManualClock::default());
    let mut manager = manager(&clock, MemoryStore::new());
    manager.load_level(bundled("swap")?)?;
    let gentle = manager.get_hint(0).context("no tier 0 hint")?;
    let direct = manager.get_hint(2).context("no tier 2 hint")?;
    ensure!(gentle != direct, "hint tiers did not escalate");
    let used = manager.tracker().context("no tracker")?.stats().hints_used;
    ensure!(used == 2, "counted {used} hints");
    Ok(())
}
