//! Engine error types

use crate::types::Move;

/// Board access and construction errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BoardError {
    #[error("cell ({x}, {y}) is outside the {cols}x{rows} board")]
    OutOfBounds {
        x: usize,
        y: usize,
        cols: usize,
        rows: usize,
    },
    #[error("grid has no cells")]
    EmptyGrid,
    #[error("grid row {row} has {len} cells, expected {expected}")]
    Ragged {
        row: usize,
        len: usize,
        expected: usize,
    },
}

/// Cascade engine errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// Coordinates out of range or not 4-adjacent. The board is untouched.
    #[error("invalid move ({}, {}) -> ({}, {})", .0.from.x, .0.from.y, .0.to.x, .0.to.y)]
    InvalidMove(Move),
    /// Indexing past validation; indicates a bug upstream.
    #[error(transparent)]
    OutOfBounds(#[from] BoardError),
    /// No board with a legal move could be produced.
    #[error("no playable board after {attempts} reshuffle attempts")]
    DeadlockExhausted { attempts: usize },
}
