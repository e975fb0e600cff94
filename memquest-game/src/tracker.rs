//! Cursor over a level's annotated lines plus post-condition validation.
//!
//! The tracker moves `ready → waiting → success | error`. A successful line
//! advances the cursor back to `ready` on the next line; succeeding on the last
//! line leaves the cursor in place with the state at `success`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::Write as _;

use crate::clock::SharedClock;
use crate::level::{AnnotatedLine, ExpectedState};
use crate::numbers::value_as_f64;
use crate::world::{Position, Snapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TrackerState {
    #[default]
    Ready,
    Waiting,
    Success,
    Error,
}

/// Run statistics for one attempt at a level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TrackerStats {
    pub attempts: u32,
    pub successes: u32,
    pub failures: u32,
    pub hints_used: u32,
    pub start_time: i64,
    #[serde(default)]
    pub completion_time: Option<i64>,
}

impl TrackerStats {
    fn started_at(start_time: i64) -> Self {
        Self {
            start_time,
            ..Self::default()
        }
    }

    /// Elapsed play time once the level is complete.
    #[must_use]
    pub fn duration_ms(&self) -> Option<i64> {
        self.completion_time
            .map(|done| done.saturating_sub(self.start_time))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    pub name: String,
    pub index: usize,
    pub state: TrackerState,
    pub timestamp: i64,
    pub stats: TrackerStats,
}

#[derive(Debug, Clone)]
pub struct CodeLineTracker {
    lines: Vec<AnnotatedLine>,
    current_index: usize,
    state: TrackerState,
    stats: TrackerStats,
    checkpoints: Vec<Checkpoint>,
    clock: SharedClock,
}

impl CodeLineTracker {
    #[must_use]
    pub fn new(lines: Vec<AnnotatedLine>, clock: SharedClock) -> Self {
        let stats = TrackerStats::started_at(clock.now_millis());
        Self {
            lines,
            current_index: 0,
            state: TrackerState::Ready,
            stats,
            checkpoints: Vec::new(),
            clock,
        }
    }

    /// Line awaiting execution. `None` once the level is complete or when there are no lines.
    #[must_use]
    pub fn current_line(&self) -> Option<&AnnotatedLine> {
        if self.is_complete() {
            return None;
        }
        self.lines.get(self.current_index)
    }

    #[must_use]
    pub const fn current_index(&self) -> usize {
        self.current_index
    }

    #[must_use]
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    #[must_use]
    pub fn lines(&self) -> &[AnnotatedLine] {
        &self.lines
    }

    #[must_use]
    pub const fn state(&self) -> TrackerState {
        self.state
    }

    #[must_use]
    pub const fn stats(&self) -> &TrackerStats {
        &self.stats
    }

    #[must_use]
    pub fn checkpoints(&self) -> &[Checkpoint] {
        &self.checkpoints
    }

    /// Move to the next line. Returns `false` when called on the last line,
    /// which completes the level instead.
    pub fn advance(&mut self) -> bool {
        if self.current_index + 1 >= self.lines.len() {
            self.state = TrackerState::Success;
            self.stats.completion_time = Some(self.clock.now_millis());
            return false;
        }
        self.current_index += 1;
        self.state = TrackerState::Ready;
        self.stats.successes += 1;
        true
    }

    pub fn set_waiting(&mut self) {
        self.state = TrackerState::Waiting;
        self.stats.attempts += 1;
    }

    pub fn set_error(&mut self) {
        self.state = TrackerState::Error;
        self.stats.failures += 1;
    }

    pub fn set_success(&mut self) {
        self.state = TrackerState::Success;
    }

    pub fn reset_state(&mut self) {
        self.state = TrackerState::Ready;
    }

    pub fn record_hint(&mut self) {
        self.stats.hints_used += 1;
    }

    /// True when the final line has succeeded. An empty level is complete once
    /// its state is `success`.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        let on_last = match self.lines.len() {
            0 => true,
            len => self.current_index == len - 1,
        };
        on_last && self.state == TrackerState::Success
    }

    /// Fraction of lines completed, in `[0, 1]`.
    #[must_use]
    pub fn progress(&self) -> f64 {
        let total = self.lines.len();
        if total == 0 {
            return if self.is_complete() { 1.0 } else { 0.0 };
        }
        let done = self.current_index + usize::from(self.is_complete());
        crate::numbers::index_to_f64(done) / crate::numbers::index_to_f64(total)
    }

    /// Move the cursor without touching stats. `index == line_count()` marks the
    /// level complete on its last line. Returns `false` for indices past that.
    pub fn jump_to(&mut self, index: usize) -> bool {
        let total = self.lines.len();
        if index > total {
            return false;
        }
        if index == total {
            self.current_index = total.saturating_sub(1);
            self.state = TrackerState::Success;
            if self.stats.completion_time.is_none() {
                self.stats.completion_time = Some(self.clock.now_millis());
            }
        } else {
            self.current_index = index;
            self.state = TrackerState::Ready;
            self.stats.completion_time = None;
        }
        true
    }

    /// Restore a saved cursor and stats. A completion time on the last line
    /// restores the completed state.
    pub fn restore_progress(&mut self, index: usize, stats: TrackerStats) {
        let last = self.lines.len().saturating_sub(1);
        self.current_index = index.min(last);
        self.state = if stats.completion_time.is_some() && self.current_index == last {
            TrackerState::Success
        } else {
            TrackerState::Ready
        };
        self.stats = stats;
    }

    /// Capture the cursor, state and stats under `name`. Returns the checkpoint index.
    pub fn create_checkpoint(&mut self, name: impl Into<String>) -> usize {
        self.checkpoints.push(Checkpoint {
            name: name.into(),
            index: self.current_index,
            state: self.state,
            timestamp: self.clock.now_millis(),
            stats: self.stats.clone(),
        });
        self.checkpoints.len() - 1
    }

    pub fn restore_checkpoint(&mut self, index: usize) -> bool {
        let Some(checkpoint) = self.checkpoints.get(index) else {
            return false;
        };
        self.current_index = checkpoint.index;
        self.state = checkpoint.state;
        self.stats = checkpoint.stats.clone();
        true
    }

    /// First checkpoint with the given name.
    #[must_use]
    pub fn get_checkpoint(&self, name: &str) -> Option<&Checkpoint> {
        self.checkpoints.iter().find(|checkpoint| checkpoint.name == name)
    }

    /// Back to the first line with fresh stats and no checkpoints.
    pub fn reset(&mut self) {
        self.current_index = 0;
        self.state = TrackerState::Ready;
        self.stats = TrackerStats::started_at(self.clock.now_millis());
        self.checkpoints.clear();
    }
}

/// One discrepancy between the world and a line's expected state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum Mismatch {
    Variable {
        name: String,
        expected: Value,
        actual: Option<Value>,
    },
    EntityPosition {
        entity_id: String,
        expected: Position,
        actual: Option<Position>,
        exists: bool,
    },
    GridContent {
        row: usize,
        col: usize,
        expected: Vec<String>,
        actual: Option<Vec<String>>,
    },
}

impl Mismatch {
    /// Player-facing description.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Mismatch::Variable {
                name,
                expected,
                actual: Some(actual),
            } => format!(
                "`{name}` should be {}, but it is {}.",
                display_value(expected),
                display_value(actual)
            ),
            Mismatch::Variable {
                name,
                expected,
                actual: None,
            } => format!(
                "`{name}` should be {}, but it does not exist yet.",
                display_value(expected)
            ),
            Mismatch::EntityPosition {
                entity_id,
                expected,
                exists: false,
                ..
            } => format!("`{entity_id}` should be at {expected}, but it does not exist."),
            Mismatch::EntityPosition {
                entity_id,
                expected,
                actual: Some(actual),
                ..
            } => format!("`{entity_id}` should be at {expected}, but it is at {actual}."),
            Mismatch::EntityPosition {
                entity_id,
                expected,
                actual: None,
                ..
            } => format!("`{entity_id}` should be at {expected}, but it is not on the board."),
            Mismatch::GridContent {
                row,
                col,
                expected,
                actual,
            } => {
                let mut text = format!("Cell ({row}, {col}) should hold [{}]", expected.join(", "));
                match actual {
                    Some(ids) => {
                        let _ = write!(text, ", but it holds [{}].", ids.join(", "));
                    }
                    None => text.push_str(", but it is off the board."),
                }
                text
            }
        }
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::Number(_) => match value_as_f64(value) {
            Some(number) if number.fract() == 0.0 && number.abs() < 1e15 => {
                format!("{number:.0}")
            }
            _ => value.to_string(),
        },
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ValidationResult {
    pub success: bool,
    pub mismatches: Vec<Mismatch>,
}

/// Compare a snapshot against a partial expected state.
///
/// Only keys present in `expected` are checked. Numbers compare by value, so
/// `5` and `5.0` are equal; everything else compares structurally.
#[must_use]
pub fn validate_state(actual: &Snapshot, expected: &ExpectedState) -> ValidationResult {
    let mut mismatches = Vec::new();

    for (name, want) in &expected.variables {
        let have = actual.variable_value(name);
        if !have.is_some_and(|have| values_match(want, have)) {
            mismatches.push(Mismatch::Variable {
                name: name.clone(),
                expected: want.clone(),
                actual: have.cloned(),
            });
        }
    }

    for (entity_id, want) in &expected.entities {
        let entity = actual.entity(entity_id);
        let have = entity.and_then(|entity| entity.position);
        if have != Some(*want) {
            mismatches.push(Mismatch::EntityPosition {
                entity_id: entity_id.clone(),
                expected: *want,
                actual: have,
                exists: entity.is_some(),
            });
        }
    }

    for cell in &expected.grid {
        let have: Option<Vec<String>> = actual
            .grid
            .cell(Position::new(cell.row, cell.col))
            .map(|found| found.entity_ids.to_vec());
        if have.as_ref() != Some(&cell.entity_ids) {
            mismatches.push(Mismatch::GridContent {
                row: cell.row,
                col: cell.col,
                expected: cell.entity_ids.clone(),
                actual: have,
            });
        }
    }

    ValidationResult {
        success: mismatches.is_empty(),
        mismatches,
    }
}

fn values_match(expected: &Value, actual: &Value) -> bool {
    match (expected, actual) {
        (Value::Number(_), Value::Number(_)) => value_as_f64(expected) == value_as_f64(actual),
        (Value::Array(want), Value::Array(have)) => {
            want.len() == have.len() && want.iter().zip(have).all(|(w, h)| values_match(w, h))
        }
        (Value::Object(want), Value::Object(have)) => {
            want.len() == have.len()
                && want
                    .iter()
                    .all(|(key, w)| have.get(key).is_some_and(|h| values_match(w, h)))
        }
        _ => expected == actual,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::level::{ExpectedCell, parse_code_line};
    use crate::world::{EntityDescriptor, WorldState};
    use serde_json::json;
    use std::sync::Arc;

    fn tracker(lines: usize) -> (CodeLineTracker, ManualClock) {
        let clock = ManualClock::starting_at(500);
        let lines = (0..lines)
            .map(|index| parse_code_line(&format!("x{index} = {index};"), index))
            .collect();
        (CodeLineTracker::new(lines, Arc::new(clock.clone())), clock)
    }

    #[test]
    fn advance_terminates_on_the_last_line() {
        let (mut tracker, clock) = tracker(3);
        assert!(tracker.advance());
        assert!(tracker.advance());
        assert!(!tracker.is_complete());
        clock.advance(250);
        assert!(!tracker.advance());
        assert_eq!(tracker.state(), TrackerState::Success);
        assert_eq!(tracker.current_index(), 2);
        assert!(tracker.is_complete());
        assert!(tracker.current_line().is_none());
        assert_eq!(tracker.stats().successes, 2);
        assert_eq!(tracker.stats().duration_ms(), Some(250));
        assert!((tracker.progress() - 1.0).abs() < f64::EPSILON);

        assert!(!tracker.advance());
        assert_eq!(tracker.current_index(), 2);
    }

    #[test]
    fn transitions_bump_counters() {
        let (mut tracker, _) = tracker(2);
        tracker.set_waiting();
        tracker.set_error();
        tracker.set_waiting();
        tracker.set_success();
        assert_eq!(tracker.stats().attempts, 2);
        assert_eq!(tracker.stats().failures, 1);
        assert_eq!(tracker.state(), TrackerState::Success);
        assert!(!tracker.is_complete());
        tracker.reset_state();
        assert_eq!(tracker.state(), TrackerState::Ready);
        tracker.record_hint();
        assert_eq!(tracker.stats().hints_used, 1);
    }

    #[test]
    fn checkpoints_restore_by_index_and_find_by_name() {
        let (mut tracker, _) = tracker(4);
        tracker.advance();
        let first = tracker.create_checkpoint("mid");
        tracker.advance();
        tracker.create_checkpoint("mid");
        tracker.advance();

        assert_eq!(tracker.get_checkpoint("mid").unwrap().index, 1);
        assert!(tracker.restore_checkpoint(first));
        assert_eq!(tracker.current_index(), 1);
        assert_eq!(tracker.stats().successes, 1);
        assert!(!tracker.restore_checkpoint(9));
    }

    #[test]
    fn jump_to_end_marks_completion() {
        let (mut tracker, _) = tracker(2);
        assert!(tracker.jump_to(2));
        assert!(tracker.is_complete());
        assert!(tracker.jump_to(1));
        assert_eq!(tracker.state(), TrackerState::Ready);
        assert!(tracker.stats().completion_time.is_none());
        assert!(!tracker.jump_to(3));
    }

    #[test]
    fn empty_level_completes_on_first_advance() {
        let (mut tracker, _) = tracker(0);
        assert!(tracker.current_line().is_none());
        assert!(!tracker.is_complete());
        assert!(!tracker.advance());
        assert!(tracker.is_complete());
    }

    fn world() -> WorldState {
        let mut world = WorldState::new(3, 3, 2, Arc::new(ManualClock::starting_at(0)));
        world
            .add_entity(EntityDescriptor::new("entity-x", "catapult").at(Position::new(0, 0)))
            .unwrap();
        world.set_variable("x", "int", json!(5));
        world
    }

    #[test]
    fn validation_checks_only_listed_keys() {
        let world = world();
        let mut expected = ExpectedState::default();
        expected.variables.insert("x".into(), json!(5.0));
        expected
            .entities
            .insert("entity-x".into(), Position::new(0, 0));
        expected.grid.push(ExpectedCell {
            row: 0,
            col: 0,
            entity_ids: vec!["entity-x".into()],
        });
        let result = validate_state(&world.snapshot(), &expected);
        assert!(result.success, "{:?}", result.mismatches);
        assert!(validate_state(&world.snapshot(), &ExpectedState::default()).success);
    }

    #[test]
    fn validation_reports_each_pass() {
        let world = world();
        let mut expected = ExpectedState::default();
        expected.variables.insert("x".into(), json!(6));
        expected.variables.insert("y".into(), json!(1));
        expected.entities.insert("entity-x".into(), Position::new(1, 1));
        expected.entities.insert("ghost".into(), Position::new(0, 0));
        expected.grid.push(ExpectedCell {
            row: 2,
            col: 2,
            entity_ids: vec!["entity-x".into()],
        });
        let result = validate_state(&world.snapshot(), &expected);
        assert!(!result.success);
        assert_eq!(result.mismatches.len(), 5);
        assert_eq!(
            result.mismatches[0].message(),
            "`x` should be 6, but it is 5."
        );
        assert!(result.mismatches[1].message().contains("does not exist yet"));
        assert!(
            result
                .mismatches
                .iter()
                .any(|m| m.message() == "`entity-x` should be at (1, 1), but it is at (0, 0).")
        );
        let json = serde_json::to_value(&result.mismatches[4]).unwrap();
        assert_eq!(json["type"], json!("grid_content"));
    }

    #[test]
    fn mismatch_serializes_with_type_tag() {
        let mismatch = Mismatch::EntityPosition {
            entity_id: "a".into(),
            expected: Position::new(0, 0),
            actual: None,
            exists: true,
        };
        let json = serde_json::to_value(&mismatch).unwrap();
        assert_eq!(json["type"], json!("entity_position"));
        assert_eq!(json["entityId"], json!("a"));
    }
}
