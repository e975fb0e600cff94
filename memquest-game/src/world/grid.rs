//! Fixed-size board indexing entities by id.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use smallvec::SmallVec;
use std::fmt;

use super::error::WorldError;

pub type EntityId = String;

/// Board coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub row: usize,
    pub col: usize,
}

impl Position {
    #[must_use]
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// One board cell. Holds entity ids only; entities live in the world registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Cell {
    #[serde(default)]
    pub entity_ids: SmallVec<[EntityId; 2]>,
    #[serde(default)]
    pub terrain: Option<String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl Cell {
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.entity_ids.iter().any(|existing| existing == id)
    }

    fn insert(&mut self, id: &str) {
        if !self.contains(id) {
            self.entity_ids.push(id.to_string());
        }
    }

    fn remove(&mut self, id: &str) {
        self.entity_ids.retain(|existing| existing.as_str() != id);
    }
}

/// Row-major grid of cells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "GridData")]
pub struct Grid {
    rows: usize,
    cols: usize,
    cells: Vec<Vec<Cell>>,
}

/// Wire form of [`Grid`], checked against its declared size on load.
#[derive(Deserialize)]
struct GridData {
    rows: usize,
    cols: usize,
    cells: Vec<Vec<Cell>>,
}

impl TryFrom<GridData> for Grid {
    type Error = WorldError;

    fn try_from(data: GridData) -> Result<Self, Self::Error> {
        let GridData { rows, cols, cells } = data;
        if cells.len() != rows {
            let row = rows.min(cells.len());
            return Err(WorldError::GridShape {
                rows,
                cols,
                row,
                found: cells.get(row).map_or(0, Vec::len),
            });
        }
        if let Some((row, cells)) = cells.iter().enumerate().find(|(_, row)| row.len() != cols) {
            return Err(WorldError::GridShape {
                rows,
                cols,
                row,
                found: cells.len(),
            });
        }
        Ok(Self { rows, cols, cells })
    }
}

impl Grid {
    #[must_use]
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            cells: vec![vec![Cell::default(); cols]; rows],
        }
    }

    #[must_use]
    pub const fn rows(&self) -> usize {
        self.rows
    }

    #[must_use]
    pub const fn cols(&self) -> usize {
        self.cols
    }

    #[must_use]
    pub const fn in_bounds(&self, position: Position) -> bool {
        position.row < self.rows && position.col < self.cols
    }

    /// # Errors
    ///
    /// Returns `WorldError::OutOfRange` when the position is off the board.
    pub fn check(&self, position: Position) -> Result<(), WorldError> {
        if self.in_bounds(position) {
            Ok(())
        } else {
            Err(WorldError::out_of_range(position, self.rows, self.cols))
        }
    }

    #[must_use]
    pub fn cell(&self, position: Position) -> Option<&Cell> {
        self.cells.get(position.row)?.get(position.col)
    }

    pub fn cell_mut(&mut self, position: Position) -> Option<&mut Cell> {
        self.cells.get_mut(position.row)?.get_mut(position.col)
    }

    pub(crate) fn insert(&mut self, id: &str, position: Position) {
        if let Some(cell) = self.cell_mut(position) {
            cell.insert(id);
        }
    }

    pub(crate) fn remove(&mut self, id: &str, position: Position) {
        if let Some(cell) = self.cell_mut(position) {
            cell.remove(id);
        }
    }

    /// Every cell holding `id`, with its coordinates.
    #[must_use]
    pub fn locate(&self, id: &str) -> Vec<Position> {
        self.iter()
            .filter(|(_, cell)| cell.contains(id))
            .map(|(position, _)| position)
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Position, &Cell)> {
        self.cells.iter().enumerate().flat_map(|(row, cells)| {
            cells
                .iter()
                .enumerate()
                .map(move |(col, cell)| (Position::new(row, col), cell))
        })
    }
}
