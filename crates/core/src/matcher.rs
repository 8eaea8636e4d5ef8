//! Match detection - runs of three or more identical gems
//!
//! Rows are scanned left to right and columns top to bottom. Overlapping runs
//! (L and T shapes) union into one ordered coordinate set, so the result does
//! not depend on scan order.

use std::collections::BTreeSet;

use crate::board::Board;
use crate::types::{Coord, MIN_RUN};

/// Result of a full-board scan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchScan {
    /// Every matched cell, each listed once
    pub cells: BTreeSet<Coord>,
    /// Length of the longest single run found
    pub longest_run: usize,
}

impl MatchScan {
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// Scan the whole board for runs
pub fn scan(board: &Board) -> MatchScan {
    let mut out = MatchScan::default();
    let (rows, cols) = (board.rows(), board.cols());

    for y in 0..rows {
        let mut x = 0;
        while x < cols {
            let Some(gem) = board.at(x, y) else {
                x += 1;
                continue;
            };
            let mut end = x + 1;
            while end < cols && board.at(end, y) == Some(gem) {
                end += 1;
            }
            if end - x >= MIN_RUN {
                out.cells.extend((x..end).map(|rx| Coord::new(rx, y)));
                out.longest_run = out.longest_run.max(end - x);
            }
            x = end;
        }
    }

    for x in 0..cols {
        let mut y = 0;
        while y < rows {
            let Some(gem) = board.at(x, y) else {
                y += 1;
                continue;
            };
            let mut end = y + 1;
            while end < rows && board.at(x, end) == Some(gem) {
                end += 1;
            }
            if end - y >= MIN_RUN {
                out.cells.extend((y..end).map(|ry| Coord::new(x, ry)));
                out.longest_run = out.longest_run.max(end - y);
            }
            y = end;
        }
    }

    out
}

/// All matched coordinates on the board (empty when quiescent)
pub fn find_matches(board: &Board) -> BTreeSet<Coord> {
    scan(board).cells
}

/// Whether the gem at `c` is part of a horizontal or vertical run
///
/// Equivalent to asking the full scan about one cell, used by the deadlock
/// check right after a trial swap.
pub fn run_through(board: &Board, c: Coord) -> bool {
    let Some(gem) = board.at(c.x, c.y) else {
        return false;
    };

    let same = |x: usize, y: usize| board.at(x, y) == Some(gem);

    let left = (0..c.x).rev().take_while(|&x| same(x, c.y)).count();
    let right = (c.x + 1..board.cols()).take_while(|&x| same(x, c.y)).count();
    if left + right + 1 >= MIN_RUN {
        return true;
    }

    let up = (0..c.y).rev().take_while(|&y| same(c.x, y)).count();
    let down = (c.y + 1..board.rows()).take_while(|&y| same(c.x, y)).count();
    up + down + 1 >= MIN_RUN
}

/// Set every listed cell to empty
pub fn clear(board: &mut Board, coords: &BTreeSet<Coord>) {
    for c in coords {
        if board.in_bounds(*c) {
            board.put(c.x, c.y, None);
        }
    }
}
