//! Cascade engine - the swap → match → clear → fall → refill loop
//!
//! One player move runs through an explicit state machine:
//!
//! ```text
//! Idle → Validating → Swapped → Matching ─(none)→ swap back → Idle
//!                                   │
//!                                   └─(found)→ Clearing → Falling* → Refilling
//!                                                 ↑                      │
//!                                                 └──── Matching ←───────┘
//!                                                          │ (none)
//!                                                          ↓
//!                                  Quiescent → DeadlockCheck ─(stuck)→ Reshuffle → Idle
//! ```
//!
//! Every visible step is recorded as a [`Frame`]; the caller decides how (and
//! how fast) to publish them. The engine itself never sleeps or does I/O.
//!
//! Two limits keep the loop finite:
//!
//! - after `max_cascade_depth` clear steps the chain is cut and the board is
//!   reshuffled
//! - reshuffling tries `max_reshuffle_attempts` random quiescent boards, then a
//!   constructed board with a planted move, then gives up with
//!   [`EngineError::DeadlockExhausted`]

use arrayvec::ArrayVec;

use crate::board::Board;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::gravity::{apply_gravity, refill};
use crate::matcher::{self, MatchScan};
use crate::rng::GemRng;
use crate::scoring::{calculate_score, ComboCounter};
use crate::snapshot::{CascadePhase, Frame};
use crate::types::{Coord, Gem, Move};

/// Everything a resolved move produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CascadeResult {
    /// Board after the cascade settled (and after any reshuffle)
    pub final_board: Board,
    /// Points earned across every clear step of the move
    pub score_delta: u32,
    /// Intermediate boards in the order they occurred; empty for a no-op
    pub frames: Vec<Frame>,
    /// Number of clear steps
    pub chain_len: usize,
    /// The chain hit the depth guard and was cut short
    pub depth_limited: bool,
    /// The board was regenerated at the end of the move
    pub reshuffled: bool,
    /// Reshuffling failed; the board may have no legal move
    pub stuck: bool,
}

impl CascadeResult {
    fn unchanged(board: &Board) -> Self {
        Self {
            final_board: board.clone(),
            score_delta: 0,
            frames: Vec::new(),
            chain_len: 0,
            depth_limited: false,
            reshuffled: false,
            stuck: false,
        }
    }

    /// The board did not change at all
    pub fn is_noop(&self) -> bool {
        self.frames.is_empty()
    }
}

struct Resolved {
    score: u32,
    chain_len: usize,
    depth_limited: bool,
}

/// Per-room cascade engine
///
/// Owns the gem source so refills and reshuffles are reproducible from a seed.
#[derive(Debug, Clone)]
pub struct CascadeEngine {
    config: EngineConfig,
    rng: GemRng,
    phase: CascadePhase,
}

impl CascadeEngine {
    pub fn new(config: EngineConfig, rng: GemRng) -> Self {
        Self {
            config,
            rng,
            phase: CascadePhase::Idle,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Current state machine phase (always `Idle` between calls)
    pub fn phase(&self) -> CascadePhase {
        self.phase
    }

    /// Uniformly random board of the configured size (may contain runs)
    pub fn generate_board(&mut self) -> Board {
        Board::generate(self.config.rows, self.config.cols, &mut self.rng)
    }

    /// Apply one player swap and resolve the full cascade
    ///
    /// An invalid move leaves `board` untouched. A legal swap that matches
    /// nothing is reverted and reported as a no-op. Otherwise `board` ends
    /// quiescent and full, with at least one legal move unless `stuck` is set.
    ///
    /// `combo` is reset before the first clear.
    pub fn apply_move(
        &mut self,
        board: &mut Board,
        mv: Move,
        combo: &mut ComboCounter,
    ) -> Result<CascadeResult, EngineError> {
        let result = self.run_move(board, mv, combo);
        self.phase = CascadePhase::Idle;
        result
    }

    /// Bring an arbitrary board to a playable resting state
    ///
    /// Empty cells are settled and refilled, standing runs are cleared as a
    /// cascade and a dead board is reshuffled. Used on freshly generated or
    /// freshly loaded boards before any player acts on them.
    pub fn stabilize(&mut self, board: &mut Board) -> Result<CascadeResult, EngineError> {
        let result = self.run_stabilize(board);
        self.phase = CascadePhase::Idle;
        result
    }

    /// Replace `board` with a quiescent board that has a legal move
    pub fn reshuffle(&mut self, board: &mut Board) -> Result<(), EngineError> {
        let (rows, cols) = (board.rows(), board.cols());

        for _ in 0..self.config.max_reshuffle_attempts {
            let candidate = self.generate_quiescent(rows, cols);
            if has_valid_move(&candidate) {
                *board = candidate;
                return Ok(());
            }
        }

        let fallback = constructed_board(rows, cols);
        if matcher::scan(&fallback).is_empty() && has_valid_move(&fallback) {
            *board = fallback;
            return Ok(());
        }

        Err(EngineError::DeadlockExhausted {
            attempts: self.config.max_reshuffle_attempts,
        })
    }

    fn enter(&mut self, phase: CascadePhase) {
        self.phase = phase;
    }

    fn run_move(
        &mut self,
        board: &mut Board,
        mv: Move,
        combo: &mut ComboCounter,
    ) -> Result<CascadeResult, EngineError> {
        self.enter(CascadePhase::Validating);
        if !mv.is_adjacent() || !board.in_bounds(mv.from) || !board.in_bounds(mv.to) {
            return Err(EngineError::InvalidMove(mv));
        }

        self.enter(CascadePhase::Swapped);
        board.swap(mv.from, mv.to)?;

        self.enter(CascadePhase::Matching);
        let first = matcher::scan(board);
        if first.is_empty() {
            board.swap(mv.from, mv.to)?;
            return Ok(CascadeResult::unchanged(board));
        }

        combo.reset();
        let mut frames = vec![Frame::capture(board, CascadePhase::Swapped, 0)];
        let resolved = self.resolve(board, first, combo, &mut frames);
        self.finish(board, resolved, frames)
    }

    fn run_stabilize(&mut self, board: &mut Board) -> Result<CascadeResult, EngineError> {
        let mut frames = Vec::new();
        if !board.is_full() {
            self.settle(board, &mut frames, 0);
        }

        self.enter(CascadePhase::Matching);
        let scan = matcher::scan(board);
        let mut combo = ComboCounter::new();
        let resolved = self.resolve(board, scan, &mut combo, &mut frames);
        self.finish(board, resolved, frames)
    }

    /// Clear, settle and rescan until no run remains or the depth guard trips
    fn resolve(
        &mut self,
        board: &mut Board,
        mut scan: MatchScan,
        combo: &mut ComboCounter,
        frames: &mut Vec<Frame>,
    ) -> Resolved {
        let mut score = 0u32;
        let mut chain_len = 0usize;

        while !scan.is_empty() {
            if chain_len >= self.config.max_cascade_depth {
                return Resolved {
                    score,
                    chain_len,
                    depth_limited: true,
                };
            }

            self.enter(CascadePhase::Clearing);
            let award = calculate_score(
                scan.cells.len(),
                scan.longest_run,
                combo.index(),
                self.config.base_points,
            );
            score = score.saturating_add(award.total);
            combo.advance();
            chain_len += 1;

            matcher::clear(board, &scan.cells);
            frames.push(Frame::capture(board, CascadePhase::Clearing, score));

            self.settle(board, frames, score);

            self.enter(CascadePhase::Matching);
            scan = matcher::scan(board);
        }

        Resolved {
            score,
            chain_len,
            depth_limited: false,
        }
    }

    /// Drop gems one row per tick and refill the top row until the board is full
    fn settle(&mut self, board: &mut Board, frames: &mut Vec<Frame>, score: u32) {
        loop {
            let mut progressed = false;

            self.enter(CascadePhase::Falling);
            while apply_gravity(board) {
                progressed = true;
                frames.push(Frame::capture(board, CascadePhase::Falling, score));
            }

            self.enter(CascadePhase::Refilling);
            if refill(board, &mut self.rng) {
                progressed = true;
                frames.push(Frame::capture(board, CascadePhase::Refilling, score));
            }

            if !progressed {
                break;
            }
        }
    }

    fn finish(
        &mut self,
        board: &mut Board,
        resolved: Resolved,
        mut frames: Vec<Frame>,
    ) -> Result<CascadeResult, EngineError> {
        self.enter(CascadePhase::Quiescent);

        self.enter(CascadePhase::DeadlockCheck);
        let mut reshuffled = false;
        let mut stuck = false;
        if resolved.depth_limited || !has_valid_move(board) {
            self.enter(CascadePhase::Reshuffle);
            match self.reshuffle(board) {
                Ok(()) => {
                    reshuffled = true;
                    frames.push(Frame::capture(board, CascadePhase::Reshuffle, resolved.score));
                }
                Err(EngineError::DeadlockExhausted { .. }) => stuck = true,
                Err(e) => return Err(e),
            }
        }

        Ok(CascadeResult {
            final_board: board.clone(),
            score_delta: resolved.score,
            frames,
            chain_len: resolved.chain_len,
            depth_limited: resolved.depth_limited,
            reshuffled,
            stuck,
        })
    }

    /// Random board built cell by cell so no run of three ever forms
    fn generate_quiescent(&mut self, rows: usize, cols: usize) -> Board {
        let mut board = Board::new(rows, cols);
        for y in 0..rows {
            for x in 0..cols {
                let mut banned: ArrayVec<Gem, 2> = ArrayVec::new();
                if x >= 2 {
                    if let Some(gem) = board.at(x - 1, y) {
                        if board.at(x - 2, y) == Some(gem) {
                            banned.push(gem);
                        }
                    }
                }
                if y >= 2 {
                    if let Some(gem) = board.at(x, y - 1) {
                        if board.at(x, y - 2) == Some(gem) {
                            banned.push(gem);
                        }
                    }
                }
                board.put(x, y, Some(self.rng.gem_excluding(&banned)));
            }
        }
        board
    }
}

impl Default for CascadeEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default(), GemRng::default())
    }
}

/// Whether any single adjacent swap on `board` would create a run
///
/// Only swaps to the right and downward are tried; that covers every
/// unordered neighbour pair once.
pub fn has_valid_move(board: &Board) -> bool {
    let mut scratch = board.clone();
    for y in 0..board.rows() {
        for x in 0..board.cols() {
            let a = Coord::new(x, y);
            for b in [Coord::new(x + 1, y), Coord::new(x, y + 1)] {
                if !scratch.in_bounds(b) || scratch.at(a.x, a.y) == scratch.at(b.x, b.y) {
                    continue;
                }
                swap_cells(&mut scratch, a, b);
                let found = matcher::run_through(&scratch, a) || matcher::run_through(&scratch, b);
                swap_cells(&mut scratch, a, b);
                if found {
                    return true;
                }
            }
        }
    }
    false
}

fn swap_cells(board: &mut Board, a: Coord, b: Coord) {
    let first = board.at(a.x, a.y);
    board.put(a.x, a.y, board.at(b.x, b.y));
    board.put(b.x, b.y, first);
}

/// Deterministic diagonal pattern with one planted move
///
/// Neighbouring cells of `(x + 2y) mod 7` never repeat, so the base pattern is
/// quiescent. The first row becomes `a a b a ...`, which swapping the third and
/// fourth cells turns into a run. Narrow boards get the plant down the first
/// column instead.
fn constructed_board(rows: usize, cols: usize) -> Board {
    let mut board = Board::new(rows, cols);
    for y in 0..rows {
        for x in 0..cols {
            board.put(x, y, Some(Gem::ALL[(x + 2 * y) % Gem::ALL.len()]));
        }
    }

    let planted = Some(Gem::ALL[0]);
    if cols >= 4 && rows >= 1 {
        board.put(1, 0, planted);
        board.put(3, 0, planted);
    } else if rows >= 4 && cols >= 1 {
        board.put(0, 1, planted);
        board.put(0, 3, planted);
    }
    board
}
