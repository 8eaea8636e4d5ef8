//! Scoring module - per-clear point awards
//!
//! A clear step awards `tiles * base * size_multiplier * combo_multiplier`.
//! Both multipliers are multiples of one half, so they are carried as
//! integer halves and the product is divided by four once at the end.
//!
//! - size: 1.0x baseline, 1.5x when the longest run of the step exceeds 3,
//!   2.0x when it exceeds 4
//! - combo: 1.0x for the first clear of a move, +0.5x per chained clear

/// Score calculation result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScoreResult {
    pub tiles: u32,
    /// Size multiplier in halves (2 = 1.0x)
    pub size_halves: u32,
    /// Combo multiplier in halves (2 = 1.0x)
    pub combo_halves: u32,
    pub total: u32,
}

/// Size multiplier for the longest run of a clear step, in halves
pub fn size_multiplier_halves(longest_run: usize) -> u32 {
    match longest_run {
        0..=3 => 2,
        4 => 3,
        _ => 4,
    }
}

/// Combo multiplier for the `chain_index`-th clear of a move (0-based), in halves
pub fn combo_multiplier_halves(chain_index: u32) -> u32 {
    2u32.saturating_add(chain_index)
}

/// Calculate the award for one clear step
pub fn calculate_score(
    tiles: usize,
    longest_run: usize,
    chain_index: u32,
    base_points: u32,
) -> ScoreResult {
    let tiles = u32::try_from(tiles).unwrap_or(u32::MAX);
    let size_halves = size_multiplier_halves(longest_run);
    let combo_halves = combo_multiplier_halves(chain_index);

    let total = tiles
        .saturating_mul(base_points)
        .saturating_mul(size_halves)
        .saturating_mul(combo_halves)
        / 4;

    ScoreResult {
        tiles,
        size_halves,
        combo_halves,
        total,
    }
}

/// Chained-clear counter for one player move
///
/// Reset when a new move begins; advanced after every clear the move's
/// cascade triggers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ComboCounter {
    chain: u32,
}

impl ComboCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.chain = 0;
    }

    /// Clears already awarded in this move
    pub fn index(&self) -> u32 {
        self.chain
    }

    pub fn advance(&mut self) {
        self.chain = self.chain.saturating_add(1);
    }

    /// Multiplier the next clear will receive, in halves
    pub fn multiplier_halves(&self) -> u32 {
        combo_multiplier_halves(self.chain)
    }
}
