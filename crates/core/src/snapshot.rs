use crate::board::Board;
use crate::types::Grid;

/// Stage of the cascade state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CascadePhase {
    Idle,
    Validating,
    Swapped,
    Matching,
    Clearing,
    Falling,
    Refilling,
    Quiescent,
    DeadlockCheck,
    Reshuffle,
}

impl CascadePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            CascadePhase::Idle => "idle",
            CascadePhase::Validating => "validating",
            CascadePhase::Swapped => "swapped",
            CascadePhase::Matching => "matching",
            CascadePhase::Clearing => "clearing",
            CascadePhase::Falling => "falling",
            CascadePhase::Refilling => "refilling",
            CascadePhase::Quiescent => "quiescent",
            CascadePhase::DeadlockCheck => "deadlock_check",
            CascadePhase::Reshuffle => "reshuffle",
        }
    }
}

/// One board snapshot emitted while a cascade resolves
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub phase: CascadePhase,
    pub grid: Grid,
    /// Points earned by the move up to and including this frame
    pub score: u32,
}

impl Frame {
    pub fn capture(board: &Board, phase: CascadePhase, score: u32) -> Self {
        Self {
            phase,
            grid: board.serialize(),
            score,
        }
    }

    /// Number of empty cells in this frame
    pub fn empty_cells(&self) -> usize {
        self.grid.iter().flatten().filter(|c| c.is_none()).count()
    }
}
