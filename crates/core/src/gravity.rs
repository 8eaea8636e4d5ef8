//! Gravity resolver - column compaction and top-row refill
//!
//! Gravity is applied one tick at a time so a multi-row fall can be animated
//! frame by frame. Refill only ever touches the top row; new gems reach lower
//! cells by falling.

use crate::board::Board;
use crate::rng::GemRng;

/// Apply one gravity tick
///
/// Scanning rows from the bottom up, every gem with an empty cell directly
/// below it drops one row. Repeated ticks compact each column while keeping
/// the relative order of its gems. Returns whether any gem moved.
pub fn apply_gravity(board: &mut Board) -> bool {
    let mut moved = false;
    for y in (0..board.rows().saturating_sub(1)).rev() {
        for x in 0..board.cols() {
            if board.at(x, y).is_some() && board.at(x, y + 1).is_none() {
                let gem = board.at(x, y);
                board.put(x, y + 1, gem);
                board.put(x, y, None);
                moved = true;
            }
        }
    }
    moved
}

/// Fill every empty top-row cell with a random gem
///
/// Returns whether any cell was refilled.
pub fn refill(board: &mut Board, rng: &mut GemRng) -> bool {
    if board.rows() == 0 {
        return false;
    }
    let mut refilled = false;
    for x in 0..board.cols() {
        if board.at(x, 0).is_none() {
            board.put(x, 0, Some(rng.next_gem()));
            refilled = true;
        }
    }
    refilled
}
