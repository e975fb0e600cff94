//! Interprets player actions as executions of the current code line.
//!
//! Every call snapshots the world, dispatches the verb to its handler, then
//! validates the result against the line's expected state. Handler failures,
//! handler errors and validation mismatches all roll the world back to the
//! snapshot, so a failed action never leaves a trace.

pub mod diff;
pub mod handlers;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use thiserror::Error;

use crate::constants::{
    FEEDBACK_HANDLER_FAILED, FEEDBACK_LEVEL_DONE, FEEDBACK_LINE_DONE, FEEDBACK_NO_LINE,
};
use crate::level::AnnotatedLine;
use crate::tracker::{CodeLineTracker, Mismatch, validate_state};
use crate::world::{ActionRecord, WorldError, WorldState};

pub use diff::{EntityDiff, EntityMove, StateDiff, ValueChange, VariableDiff, compute_state_diff};

/// A player intent: a verb plus verb-specific parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerAction {
    pub verb: String,
    #[serde(default)]
    pub params: Map<String, Value>,
}

impl PlayerAction {
    #[must_use]
    pub fn new(verb: impl Into<String>) -> Self {
        Self {
            verb: verb.into(),
            params: Map::new(),
        }
    }

    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackType {
    Success,
    Error,
}

/// Display-ready result text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    #[serde(rename = "type")]
    pub feedback_type: FeedbackType,
    pub text: String,
    pub advanced: bool,
    pub level_complete: bool,
}

impl Feedback {
    fn error(text: impl Into<String>) -> Self {
        Self {
            feedback_type: FeedbackType::Error,
            text: text.into(),
            advanced: false,
            level_complete: false,
        }
    }
}

/// Uniform result of one resolved action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionOutcome {
    pub success: bool,
    pub feedback: Feedback,
    #[serde(default)]
    pub mismatches: Vec<Mismatch>,
    /// Index of the line the action was attempted against.
    #[serde(default)]
    pub line_index: Option<usize>,
    #[serde(default)]
    pub diff: Option<StateDiff>,
}

impl ActionOutcome {
    pub(crate) fn failure(text: impl Into<String>, line_index: Option<usize>) -> Self {
        Self {
            success: false,
            feedback: Feedback::error(text),
            mismatches: Vec::new(),
            line_index,
            diff: None,
        }
    }
}

/// Errors raised inside handlers. The resolver turns them into failed outcomes.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ActionError {
    #[error("no handler registered for action `{0}`")]
    UnknownVerb(String),
    #[error("line is missing the `{0}` operand")]
    MissingOperand(&'static str),
    #[error("action is missing the `{0}` parameter")]
    MissingParam(&'static str),
    #[error("parameter `{name}` is invalid: {reason}")]
    InvalidParam { name: &'static str, reason: String },
    #[error(transparent)]
    World(#[from] WorldError),
    #[error("handler for `{verb}` panicked: {message}")]
    Panicked { verb: String, message: String },
}

/// What a handler reports after running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerOutcome {
    Applied { message: Option<String> },
    /// The action is not legal here. The world is rolled back.
    Rejected { message: Option<String> },
}

impl HandlerOutcome {
    #[must_use]
    pub const fn applied() -> Self {
        HandlerOutcome::Applied { message: None }
    }

    #[must_use]
    pub fn rejected(message: impl Into<String>) -> Self {
        HandlerOutcome::Rejected {
            message: Some(message.into()),
        }
    }
}

/// Everything a handler may read or mutate.
pub struct HandlerContext<'a> {
    pub world: &'a mut WorldState,
    pub line: &'a AnnotatedLine,
    pub params: &'a Map<String, Value>,
}

/// Strategy for one verb.
pub trait ActionHandler: Send + Sync {
    /// # Errors
    ///
    /// Returns an error for structurally invalid input (missing operands,
    /// unknown ids, off-board positions).
    fn handle(&self, ctx: &mut HandlerContext<'_>) -> Result<HandlerOutcome, ActionError>;
}

impl<F> ActionHandler for F
where
    F: Fn(&mut HandlerContext<'_>) -> Result<HandlerOutcome, ActionError> + Send + Sync,
{
    fn handle(&self, ctx: &mut HandlerContext<'_>) -> Result<HandlerOutcome, ActionError> {
        self(ctx)
    }
}

pub struct ActionResolver {
    handlers: HashMap<String, Box<dyn ActionHandler>>,
}

impl fmt::Debug for ActionResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut verbs: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        verbs.sort_unstable();
        f.debug_struct("ActionResolver")
            .field("verbs", &verbs)
            .finish()
    }
}

impl Default for ActionResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl ActionResolver {
    /// Resolver with the built-in verbs registered.
    #[must_use]
    pub fn new() -> Self {
        let mut resolver = Self::empty();
        resolver.register_handler("assign", handlers::assign);
        resolver.register_handler("swap", handlers::swap);
        resolver.register_handler("move", handlers::move_entity);
        resolver.register_handler("deref", handlers::deref);
        resolver.register_handler("place", handlers::place);
        resolver.register_handler("remove", handlers::remove);
        resolver.register_handler("increment", handlers::increment);
        resolver.register_handler("decrement", handlers::decrement);
        resolver
    }

    /// Resolver with no verbs at all.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Add or replace the handler for `verb`.
    pub fn register_handler(&mut self, verb: impl Into<String>, handler: impl ActionHandler + 'static) {
        self.handlers.insert(verb.into(), Box::new(handler));
    }

    #[must_use]
    pub fn has_handler(&self, verb: &str) -> bool {
        self.handlers.contains_key(verb)
    }

    /// Run one action against the tracker's current line.
    pub fn resolve_action(
        &self,
        world: &mut WorldState,
        tracker: &mut CodeLineTracker,
        action: &PlayerAction,
    ) -> ActionOutcome {
        let Some(line) = tracker.current_line().cloned() else {
            return ActionOutcome::failure(FEEDBACK_NO_LINE, None);
        };
        let line_index = tracker.current_index();
        let before = world.snapshot();
        tracker.set_waiting();

        let result = self.dispatch(world, &line, action);
        let message = match result {
            Err(err) => {
                log::warn!("action `{}` failed on line {}: {err}", action.verb, line.line_number);
                world.restore(&before);
                tracker.set_error();
                return ActionOutcome::failure(err.to_string(), Some(line_index));
            }
            Ok(HandlerOutcome::Rejected { message }) => {
                log::debug!("action `{}` rejected on line {}", action.verb, line.line_number);
                world.restore(&before);
                tracker.set_error();
                return ActionOutcome::failure(
                    message.unwrap_or_else(|| FEEDBACK_HANDLER_FAILED.to_string()),
                    Some(line_index),
                );
            }
            Ok(HandlerOutcome::Applied { message }) => message,
        };

        let after = world.snapshot();
        if let Some(expected) = &line.expected_state {
            let validation = validate_state(&after, expected);
            if !validation.success {
                world.restore(&before);
                tracker.set_error();
                let text = validation
                    .mismatches
                    .first()
                    .map_or_else(String::new, Mismatch::message);
                log::debug!(
                    "line {} validation failed with {} mismatch(es)",
                    line.line_number,
                    validation.mismatches.len()
                );
                return ActionOutcome {
                    mismatches: validation.mismatches,
                    ..ActionOutcome::failure(text, Some(line_index))
                };
            }
        }

        let diff = compute_state_diff(&before, &after);
        log::debug!("line {} applied `{}`: {diff:?}", line.line_number, action.verb);
        world.record_action(
            ActionRecord {
                verb: action.verb.clone(),
                params: action.params.clone(),
                line_index: Some(line_index),
            },
            before,
        );
        tracker.set_success();
        let advanced = tracker.advance();
        let level_complete = !advanced;
        let text = if level_complete {
            FEEDBACK_LEVEL_DONE.to_string()
        } else {
            message.unwrap_or_else(|| FEEDBACK_LINE_DONE.to_string())
        };
        ActionOutcome {
            success: true,
            feedback: Feedback {
                feedback_type: FeedbackType::Success,
                text,
                advanced,
                level_complete,
            },
            mismatches: Vec::new(),
            line_index: Some(line_index),
            diff: Some(diff),
        }
    }

    fn dispatch(
        &self,
        world: &mut WorldState,
        line: &AnnotatedLine,
        action: &PlayerAction,
    ) -> Result<HandlerOutcome, ActionError> {
        let handler = self
            .handlers
            .get(&action.verb)
            .ok_or_else(|| ActionError::UnknownVerb(action.verb.clone()))?;
        let mut ctx = HandlerContext {
            world,
            line,
            params: &action.params,
        };
        catch_unwind(AssertUnwindSafe(|| handler.handle(&mut ctx))).unwrap_or_else(|payload| {
            Err(ActionError::Panicked {
                verb: action.verb.clone(),
                message: panic_message(payload.as_ref()),
            })
        })
    }
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|text| (*text).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::level::{LevelConfig, load_level};
    use crate::tracker::TrackerState;
    use crate::world::{EntityDescriptor, Position};
    use serde_json::json;
    use std::sync::Arc;

    fn setup(lines: &[&str]) -> (WorldState, CodeLineTracker) {
        let clock: crate::clock::SharedClock = Arc::new(ManualClock::starting_at(0));
        let level = load_level(LevelConfig::from_lines("t", lines.iter().copied()));
        (
            WorldState::new(4, 4, 3, clock.clone()),
            CodeLineTracker::new(level.code_lines, clock),
        )
    }

    fn scribble(ctx: &mut HandlerContext<'_>) -> Result<HandlerOutcome, ActionError> {
        ctx.world.set_variable("junk", "int", json!(1));
        Ok(HandlerOutcome::Rejected { message: None })
    }

    fn boom(ctx: &mut HandlerContext<'_>) -> Result<HandlerOutcome, ActionError> {
        ctx.world.set_variable("junk", "int", json!(1));
        panic!("kaboom")
    }

    #[test]
    fn no_current_line_fails_without_mutation() {
        let (mut world, mut tracker) = setup(&[]);
        let before = world.snapshot();
        let outcome = ActionResolver::new().resolve_action(
            &mut world,
            &mut tracker,
            &PlayerAction::new("assign"),
        );
        assert!(!outcome.success);
        assert_eq!(outcome.feedback.text, FEEDBACK_NO_LINE);
        assert_eq!(world.snapshot(), before);
        assert_eq!(tracker.stats().attempts, 0);
    }

    #[test]
    fn unknown_verb_rolls_back_and_errors() {
        let (mut world, mut tracker) = setup(&["int x = 5;"]);
        let outcome = ActionResolver::new().resolve_action(
            &mut world,
            &mut tracker,
            &PlayerAction::new("teleport"),
        );
        assert!(!outcome.success);
        assert!(outcome.feedback.text.contains("teleport"));
        assert_eq!(tracker.state(), TrackerState::Error);
        assert_eq!(tracker.stats().failures, 1);
    }

    #[test]
    fn rejected_handler_restores_snapshot() {
        let (mut world, mut tracker) = setup(&["int x = 5;"]);
        let mut resolver = ActionResolver::empty();
        resolver.register_handler("scribble", scribble);
        let before = world.snapshot();
        let outcome =
            resolver.resolve_action(&mut world, &mut tracker, &PlayerAction::new("scribble"));
        assert!(!outcome.success);
        assert_eq!(outcome.feedback.text, FEEDBACK_HANDLER_FAILED);
        assert_eq!(world.snapshot(), before);
    }

    #[test]
    fn panicking_handler_is_contained() {
        let (mut world, mut tracker) = setup(&["int x = 5;"]);
        let mut resolver = ActionResolver::empty();
        resolver.register_handler("boom", boom);
        let outcome = resolver.resolve_action(&mut world, &mut tracker, &PlayerAction::new("boom"));
        assert!(!outcome.success);
        assert!(outcome.feedback.text.contains("kaboom"));
        assert!(world.get_variable("junk").is_none());
    }

    #[test]
    fn success_records_history_and_advances() {
        let (mut world, mut tracker) = setup(&["int x = 5;", "x++;"]);
        let resolver = ActionResolver::new();
        let assign = PlayerAction::new("assign")
            .with_param("target", json!({"row": 0, "col": 0}))
            .with_param("createIfMissing", true);
        let outcome = resolver.resolve_action(&mut world, &mut tracker, &assign);
        assert!(outcome.success, "{}", outcome.feedback.text);
        assert!(outcome.feedback.advanced);
        assert!(!outcome.feedback.level_complete);
        assert_eq!(outcome.line_index, Some(0));
        assert_eq!(world.history().len(), 1);
        assert_eq!(world.history()[0].action.line_index, Some(0));
        assert!(outcome.diff.unwrap().variables.added.contains(&"x".to_string()));

        let outcome = resolver.resolve_action(&mut world, &mut tracker, &PlayerAction::new("increment"));
        assert!(outcome.success, "{}", outcome.feedback.text);
        assert!(outcome.feedback.level_complete);
        assert_eq!(outcome.feedback.text, FEEDBACK_LEVEL_DONE);
        assert_eq!(world.get_variable_value("x"), Some(&json!(6.0)));
        assert!(tracker.is_complete());
    }

    #[test]
    fn mismatch_feedback_uses_first_mismatch() {
        let (mut world, mut tracker) =
            setup(&["int x = 5; // @expected: x=5, pos(entity-x)=0,0"]);
        world
            .add_entity(EntityDescriptor::new("entity-x", "catapult"))
            .unwrap();
        let before = world.snapshot();
        let outcome = ActionResolver::new().resolve_action(
            &mut world,
            &mut tracker,
            &PlayerAction::new("assign").with_param("target", json!({"row": 1, "col": 1})),
        );
        assert!(!outcome.success);
        assert_eq!(outcome.mismatches.len(), 1);
        assert_eq!(outcome.feedback.text, outcome.mismatches[0].message());
        assert_eq!(world.snapshot(), before);
        assert_eq!(world.get_entity("entity-x").unwrap().position, None::<Position>);
    }
}
