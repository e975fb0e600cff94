//! Centralized defaults and fixed feedback text for MemQuest game logic.
//!
//! Level files may override the sizing defaults; the feedback strings are
//! fixed so that player-facing wording only changes through reviewed code.

// Level defaults -----------------------------------------------------------
pub(crate) const DEFAULT_GRID_ROWS: usize = 8;
pub(crate) const DEFAULT_GRID_COLS: usize = 8;
pub(crate) const DEFAULT_TRAY_SLOTS: usize = 5;
pub(crate) const DEFAULT_ENTITY_TYPE: &str = "catapult";
pub(crate) const DEFAULT_VARIABLE_TYPE: &str = "int";

// Persistence --------------------------------------------------------------
pub const DEFAULT_STORAGE_KEY: &str = "gamestate";

// Hints --------------------------------------------------------------------
pub(crate) const MAX_HINT_TIER: u8 = 2;
pub(crate) const HINT_FALLBACK: &str = "Read the line carefully: what changes in memory when it runs?";

// Feedback -----------------------------------------------------------------
pub(crate) const FEEDBACK_NO_LINE: &str = "There is no active line to execute.";
pub(crate) const FEEDBACK_HANDLER_FAILED: &str = "That action does not work here.";
pub(crate) const FEEDBACK_VALIDATION_FAILED: &str = "That is not what this line does.";
pub(crate) const FEEDBACK_LINE_DONE: &str = "Correct! On to the next line.";
pub(crate) const FEEDBACK_LEVEL_DONE: &str = "Program complete!";
pub(crate) const FEEDBACK_NO_LEVEL: &str = "No level is loaded.";

// Metadata keys ------------------------------------------------------------
pub(crate) const META_POINTS_TO: &str = "pointsTo";
pub(crate) const ENTITY_VALUE_KEY: &str = "value";
