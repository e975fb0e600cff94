//! MemQuest Game Engine
//!
//! Platform-agnostic gameplay core for MemQuest, a grid puzzle game that
//! teaches C memory and pointer semantics. Players execute a code snippet one
//! line at a time by placing and moving units; this crate interprets those
//! actions, validates them against each line's expected state and keeps the
//! undo/redo history. Rendering and input live outside this crate.

pub mod clock;
pub mod constants;
pub mod events;
pub mod hints;
pub mod level;
pub mod level_data;
pub mod manager;
pub mod numbers;
pub mod resolver;
pub mod snippet;
pub mod storage;
pub mod tracker;
pub mod types;
pub mod world;

// Re-export commonly used types
pub use clock::{Clock, ManualClock, SharedClock, SystemClock, system_clock};
pub use events::{EventBus, GameEvent, GameEventKind, RestoreReason, SubscriptionId};
pub use hints::hint_for_tier;
pub use level::{
    AnnotatedLine, AnnotatedLineOverride, Classified, CodeLineInput, ExpectedCell, ExpectedState,
    GridConfig, InitialStateConfig, Level, LevelConfig, Operation, TrayConfig, TrayItemSeed,
    VariableSeed, VariableSeedBinding, classify, extract_operands, infer_operation, load_level,
    parse_code_line, parse_code_lines,
};
pub use level_data::{LevelData, SceneObject, ValidationHint, generate_level_data};
pub use manager::{GameError, GameStateManager, ManagerConfig, PuzzleSession};
pub use resolver::{
    ActionError, ActionHandler, ActionOutcome, ActionResolver, Feedback, FeedbackType,
    HandlerContext, HandlerOutcome, PlayerAction, StateDiff, compute_state_diff,
};
pub use snippet::{CharacterDescriptor, ParsedSnippet, parse_snippet};
pub use storage::{MemoryStore, SaveData, SaveStore};
pub use tracker::{
    Checkpoint, CodeLineTracker, Mismatch, TrackerState, TrackerStats, ValidationResult,
    validate_state,
};
pub use types::{
    CharacterTag, DeclarationKind, TypeDeclaration, get_character_for_type, parse_type_declaration,
};
pub use world::{
    ActionRecord, Cell, Entity, EntityDescriptor, EntityId, Grid, HistoryEntry, Position,
    Snapshot, Tray, TrayItem, VariableBinding, WorldError, WorldState,
};
