use thiserror::Error;

use super::Position;

/// Errors raised by world mutators on invalid input.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WorldError {
    #[error("position ({row}, {col}) is outside the {rows}x{cols} grid")]
    OutOfRange {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },
    #[error("entity descriptor has no id")]
    MissingEntityId,
    #[error("entity `{0}` already exists")]
    DuplicateEntity(String),
    #[error("unknown entity `{0}`")]
    UnknownEntity(String),
    #[error("unknown variable `{0}`")]
    UnknownVariable(String),
    #[error("grid declares {rows}x{cols} but row {row} has {found} cells")]
    GridShape {
        rows: usize,
        cols: usize,
        row: usize,
        found: usize,
    },
}

impl WorldError {
    pub(crate) fn out_of_range(position: Position, rows: usize, cols: usize) -> Self {
        WorldError::OutOfRange {
            row: position.row,
            col: position.col,
            rows,
            cols,
        }
    }
}
