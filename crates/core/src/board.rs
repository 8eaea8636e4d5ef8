//! Board module - manages the gem grid
//!
//! The board is an R x C grid (8x8 by default) where each cell holds a gem or is
//! transiently empty while a cascade resolves.
//! Uses a flat vector for cache locality, row-major (`y * cols + x`).
//! Coordinates: (x, y) where x is the column (left to right) and y the row
//! (top to bottom). Row 0 is where refills enter.

use crate::error::BoardError;
use crate::rng::GemRng;
use crate::types::{Cell, Coord, Grid};

/// The game board
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    rows: usize,
    cols: usize,
    /// Flat vector of cells, row-major order
    cells: Vec<Cell>,
}

impl Board {
    /// Create a board with every cell empty
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            cells: vec![None; rows * cols],
        }
    }

    /// Fill every cell with a uniformly random gem
    ///
    /// The result may contain runs or have no legal move; callers repair it
    /// with `CascadeEngine::stabilize`.
    pub fn generate(rows: usize, cols: usize, rng: &mut GemRng) -> Self {
        let cells = (0..rows * cols).map(|_| Some(rng.next_gem())).collect();
        Self { rows, cols, cells }
    }

    /// Build a board from a row-major grid
    pub fn from_grid(grid: &Grid) -> Result<Self, BoardError> {
        let rows = grid.len();
        let cols = grid.first().map(Vec::len).unwrap_or(0);
        if rows == 0 || cols == 0 {
            return Err(BoardError::EmptyGrid);
        }

        let mut cells = Vec::with_capacity(rows * cols);
        for (y, row) in grid.iter().enumerate() {
            if row.len() != cols {
                return Err(BoardError::Ragged {
                    row: y,
                    len: row.len(),
                    expected: cols,
                });
            }
            cells.extend_from_slice(row);
        }
        Ok(Self { rows, cols, cells })
    }

    #[inline(always)]
    fn index(&self, x: usize, y: usize) -> Option<usize> {
        if x >= self.cols || y >= self.rows {
            return None;
        }
        Some(y * self.cols + x)
    }

    fn out_of_bounds(&self, x: usize, y: usize) -> BoardError {
        BoardError::OutOfBounds {
            x,
            y,
            cols: self.cols,
            rows: self.rows,
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn in_bounds(&self, c: Coord) -> bool {
        self.index(c.x, c.y).is_some()
    }

    /// Get cell at position (x, y)
    pub fn get(&self, x: usize, y: usize) -> Result<Cell, BoardError> {
        self.index(x, y)
            .map(|idx| self.cells[idx])
            .ok_or_else(|| self.out_of_bounds(x, y))
    }

    /// Set cell at position (x, y)
    pub fn set(&mut self, x: usize, y: usize, cell: Cell) -> Result<(), BoardError> {
        let idx = self.index(x, y).ok_or_else(|| self.out_of_bounds(x, y))?;
        self.cells[idx] = cell;
        Ok(())
    }

    /// Exchange two cells. Adjacency is the caller's concern.
    pub fn swap(&mut self, a: Coord, b: Coord) -> Result<(), BoardError> {
        let ia = self.index(a.x, a.y).ok_or_else(|| self.out_of_bounds(a.x, a.y))?;
        let ib = self.index(b.x, b.y).ok_or_else(|| self.out_of_bounds(b.x, b.y))?;
        self.cells.swap(ia, ib);
        Ok(())
    }

    /// Unchecked read for scans that iterate within `rows`/`cols`
    #[inline(always)]
    pub(crate) fn at(&self, x: usize, y: usize) -> Cell {
        self.cells[y * self.cols + x]
    }

    #[inline(always)]
    pub(crate) fn put(&mut self, x: usize, y: usize, cell: Cell) {
        self.cells[y * self.cols + x] = cell;
    }

    /// Row-major copy of the board
    pub fn serialize(&self) -> Grid {
        self.cells.chunks(self.cols.max(1)).map(<[Cell]>::to_vec).collect()
    }

    /// True when no cell is empty
    pub fn is_full(&self) -> bool {
        self.cells.iter().all(Option::is_some)
    }

    /// Number of empty cells
    pub fn empty_count(&self) -> usize {
        self.cells.iter().filter(|c| c.is_none()).count()
    }

    /// Get a reference to the internal cells
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new(crate::types::BOARD_HEIGHT, crate::types::BOARD_WIDTH)
    }
}
