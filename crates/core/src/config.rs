//! Engine tuning

use crate::types::{
    BASE_POINTS_PER_TILE, BOARD_HEIGHT, BOARD_WIDTH, MAX_CASCADE_DEPTH, MAX_RESHUFFLE_ATTEMPTS,
};

/// Per-room engine configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    pub rows: usize,
    pub cols: usize,
    pub base_points: u32,
    /// Clear steps allowed before a cascade is cut short by a reshuffle
    pub max_cascade_depth: usize,
    /// Random regenerations tried before the constructive fallback
    pub max_reshuffle_attempts: usize,
}

impl EngineConfig {
    /// Whether a board of this size can always be given a legal move
    ///
    /// The constructed fallback board needs four cells along one axis and
    /// three along the other.
    pub fn is_playable(&self) -> bool {
        (self.rows >= 3 && self.cols >= 4) || (self.rows >= 4 && self.cols >= 3)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            rows: BOARD_HEIGHT,
            cols: BOARD_WIDTH,
            base_points: BASE_POINTS_PER_TILE,
            max_cascade_depth: MAX_CASCADE_DEPTH,
            max_reshuffle_attempts: MAX_RESHUFFLE_ATTEMPTS,
        }
    }
}
