//! Core game logic - pure, deterministic, and testable
//!
//! This crate contains the match-3 rules: the board, run detection, gravity,
//! scoring and the cascade state machine that ties them together. It has
//! **no dependencies** on networking, persistence or timers, making it:
//!
//! - **Deterministic**: Same seed produces identical cascades
//! - **Testable**: Every rule is exercised without a runtime
//! - **Portable**: Can be driven by a server, a bench or a replay tool
//!
//! # Module Structure
//!
//! - [`board`]: Rectangular grid of optional gems with bounds-checked access
//! - [`matcher`]: Horizontal and vertical run detection
//! - [`gravity`]: One-row-per-tick compaction and top-row refill
//! - [`scoring`]: Per-clear awards with size and combo multipliers
//! - [`cascade`]: Swap validation, chained clears, deadlock detection, reshuffle
//! - [`snapshot`]: Frames recorded while a cascade resolves
//! - [`rng`]: Seeded gem generation
//!
//! # Game Rules
//!
//! - A move swaps two 4-directionally adjacent cells
//! - A swap that creates no run of 3+ is reverted and costs nothing
//! - Matched cells clear, gems above fall, the top row refills, and new runs
//!   keep clearing as a chain with a growing combo multiplier
//! - A settled board without any legal move is reshuffled
//!
//! # Example
//!
//! ```
//! use gemswap_core::{Board, CascadeEngine, ComboCounter, EngineConfig, GemRng};
//! use gemswap_types::{Coord, Move};
//!
//! let mut engine = CascadeEngine::new(EngineConfig::default(), GemRng::new(12345));
//! let mut board = engine.generate_board();
//! engine.stabilize(&mut board).unwrap();
//!
//! let mv = Move::new(Coord::new(0, 0), Coord::new(1, 0));
//! let result = engine.apply_move(&mut board, mv, &mut ComboCounter::new()).unwrap();
//! assert!(result.final_board.is_full());
//! ```

pub mod board;
pub mod cascade;
pub mod config;
pub mod error;
pub mod gravity;
pub mod matcher;
pub mod rng;
pub mod scoring;
pub mod snapshot;

pub use gemswap_types as types;

// Re-export commonly used types for convenience
pub use board::Board;
pub use cascade::{has_valid_move, CascadeEngine, CascadeResult};
pub use config::EngineConfig;
pub use error::{BoardError, EngineError};
pub use gravity::{apply_gravity, refill};
pub use matcher::{find_matches, MatchScan};
pub use rng::GemRng;
pub use scoring::{calculate_score, ComboCounter, ScoreResult};
pub use snapshot::{CascadePhase, Frame};
