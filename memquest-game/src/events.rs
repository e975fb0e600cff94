//! Per-manager synchronous event bus.
//!
//! Subscribers are called in registration order. A subscriber that returns an
//! error or panics is logged and skipped; the rest still receive the event.

use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};

use crate::resolver::{ActionOutcome, panic_message};
use crate::tracker::TrackerStats;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum GameEventKind {
    LevelLoaded,
    ActionSuccess,
    ActionFailure,
    LineAdvanced,
    LevelComplete,
    HintUsed,
    StateRestored,
    VariableDeclared,
    VariableUpdated,
    PointerLinked,
}

/// Why the world was rewound or replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RestoreReason {
    Undo,
    Redo,
    Reset,
    SaveLoaded,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum GameEvent {
    LevelLoaded {
        level_id: String,
        title: String,
        line_count: usize,
    },
    ActionSuccess {
        verb: String,
        outcome: ActionOutcome,
    },
    ActionFailure {
        verb: String,
        outcome: ActionOutcome,
    },
    LineAdvanced {
        line_index: usize,
    },
    LevelComplete {
        level_id: String,
        stats: TrackerStats,
    },
    HintUsed {
        tier: u8,
        hint: String,
    },
    StateRestored {
        reason: RestoreReason,
        line_index: usize,
    },
    VariableDeclared {
        name: String,
        var_type: String,
        value: Value,
    },
    VariableUpdated {
        name: String,
        before: Value,
        after: Value,
    },
    PointerLinked {
        pointer: String,
        entity_id: String,
    },
}

impl GameEvent {
    #[must_use]
    pub const fn kind(&self) -> GameEventKind {
        match self {
            GameEvent::LevelLoaded { .. } => GameEventKind::LevelLoaded,
            GameEvent::ActionSuccess { .. } => GameEventKind::ActionSuccess,
            GameEvent::ActionFailure { .. } => GameEventKind::ActionFailure,
            GameEvent::LineAdvanced { .. } => GameEventKind::LineAdvanced,
            GameEvent::LevelComplete { .. } => GameEventKind::LevelComplete,
            GameEvent::HintUsed { .. } => GameEventKind::HintUsed,
            GameEvent::StateRestored { .. } => GameEventKind::StateRestored,
            GameEvent::VariableDeclared { .. } => GameEventKind::VariableDeclared,
            GameEvent::VariableUpdated { .. } => GameEventKind::VariableUpdated,
            GameEvent::PointerLinked { .. } => GameEventKind::PointerLinked,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

type EventHandler = Box<dyn FnMut(&GameEvent) -> anyhow::Result<()> + Send>;

struct Subscriber {
    id: SubscriptionId,
    kind: GameEventKind,
    handler: EventHandler,
}

#[derive(Default)]
pub struct EventBus {
    next_id: u64,
    subscribers: Vec<Subscriber>,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on<F>(&mut self, kind: GameEventKind, handler: F) -> SubscriptionId
    where
        F: FnMut(&GameEvent) -> anyhow::Result<()> + Send + 'static,
    {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        self.subscribers.push(Subscriber {
            id,
            kind,
            handler: Box::new(handler),
        });
        id
    }

    pub fn off(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|subscriber| subscriber.id != id);
        self.subscribers.len() != before
    }

    /// Deliver `event` to every subscriber of its kind. Returns how many
    /// handlers completed without error.
    pub fn emit(&mut self, event: &GameEvent) -> usize {
        let kind = event.kind();
        let mut delivered = 0;
        for subscriber in self
            .subscribers
            .iter_mut()
            .filter(|subscriber| subscriber.kind == kind)
        {
            match catch_unwind(AssertUnwindSafe(|| (subscriber.handler)(event))) {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(err)) => {
                    log::error!("{kind:?} handler {:?} failed: {err:#}", subscriber.id);
                }
                Err(payload) => {
                    log::error!(
                        "{kind:?} handler {:?} panicked: {}",
                        subscriber.id,
                        panic_message(payload.as_ref())
                    );
                }
            }
        }
        delivered
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    pub fn clear(&mut self) {
        self.subscribers.clear();
    }
}
