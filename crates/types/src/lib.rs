//! Core types module - shared data structures and constants
//!
//! This module defines the fundamental types used throughout the workspace.
//! All types are pure data structures with no external dependencies, making them
//! usable in any context (engine logic, room sessions, wire protocol).
//!
//! # Board Dimensions
//!
//! - **Width**: 8 columns (indexed 0-7), `x` grows to the right
//! - **Height**: 8 rows (indexed 0-7), `y` grows downward; row 0 is the top row
//!
//! Rooms may be configured with other dimensions; these are only the defaults.
//!
//! # Tuning Constants
//!
//! | Constant | Value | Description |
//! |----------|-------|-------------|
//! | `BASE_POINTS_PER_TILE` | 10 | Points per cleared gem before multipliers |
//! | `MAX_CASCADE_DEPTH` | 40 | Clear steps allowed in one cascade |
//! | `MAX_RESHUFFLE_ATTEMPTS` | 64 | Random regenerations before the constructive fallback |
//! | `TICK_INTERVAL_MS` | 150 | First animation tick delay |
//! | `TICK_DECAY_NUMERATOR / DENOMINATOR` | 6/5 | Each successive tick is 1.2x shorter |
//!
//! # Examples
//!
//! ```
//! use gemswap_types::{Coord, Gem, Move};
//!
//! let gem = Gem::from_str("Purple").unwrap();
//! assert_eq!(gem, Gem::Purple);
//! assert_eq!(gem.as_str(), "purple");
//!
//! let mv = Move::new(Coord::new(3, 0), Coord::new(3, 1));
//! assert!(mv.is_adjacent());
//! ```

/// Default board width in cells (8 columns)
pub const BOARD_WIDTH: usize = 8;

/// Default board height in cells (8 rows)
pub const BOARD_HEIGHT: usize = 8;

/// Minimum run length that counts as a match
pub const MIN_RUN: usize = 3;

/// Points awarded per cleared gem before size and combo multipliers
pub const BASE_POINTS_PER_TILE: u32 = 10;

/// Upper bound on clear steps within one cascade
pub const MAX_CASCADE_DEPTH: usize = 40;

/// Random regenerations tried before falling back to a constructed board
pub const MAX_RESHUFFLE_ATTEMPTS: usize = 64;

/// Delay before the first animation tick of a cascade (milliseconds)
pub const TICK_INTERVAL_MS: u64 = 150;

/// Each animation tick is shorter than the previous by 6/5
pub const TICK_DECAY_NUMERATOR: u32 = 6;

/// Denominator for [`TICK_DECAY_NUMERATOR`]
pub const TICK_DECAY_DENOMINATOR: u32 = 5;

/// Room joined when a client does not name one
pub const DEFAULT_ROOM: &str = "game_room";

/// The seven gem colors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Gem {
    Red,
    Blue,
    Green,
    Yellow,
    Purple,
    Orange,
    White,
}

impl Gem {
    /// Full palette in a stable order
    pub const ALL: [Gem; 7] = [
        Gem::Red,
        Gem::Blue,
        Gem::Green,
        Gem::Yellow,
        Gem::Purple,
        Gem::Orange,
        Gem::White,
    ];

    /// Parse gem from its color name (case-insensitive)
    ///
    /// # Examples
    ///
    /// ```
    /// use gemswap_types::Gem;
    ///
    /// assert_eq!(Gem::from_str("red"), Some(Gem::Red));
    /// assert_eq!(Gem::from_str("WHITE"), Some(Gem::White));
    /// assert_eq!(Gem::from_str("cyan"), None);
    /// ```
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "red" => Some(Gem::Red),
            "blue" => Some(Gem::Blue),
            "green" => Some(Gem::Green),
            "yellow" => Some(Gem::Yellow),
            "purple" => Some(Gem::Purple),
            "orange" => Some(Gem::Orange),
            "white" => Some(Gem::White),
            _ => None,
        }
    }

    /// Convert to lowercase color name
    pub fn as_str(&self) -> &'static str {
        match self {
            Gem::Red => "red",
            Gem::Blue => "blue",
            Gem::Green => "green",
            Gem::Yellow => "yellow",
            Gem::Purple => "purple",
            Gem::Orange => "orange",
            Gem::White => "white",
        }
    }

    /// Palette index (0-based, matches [`Gem::ALL`])
    pub fn index(&self) -> usize {
        *self as usize
    }
}

/// A cell on the board
///
/// - `None`: Empty (only ever seen transiently while a cascade clears and falls)
/// - `Some(Gem)`: Cell holds the given gem
pub type Cell = Option<Gem>;

/// Row-major copy of a board, safe to hand to stores and broadcasts
pub type Grid = Vec<Vec<Cell>>;

/// Board coordinate: `x` is the column, `y` is the row
///
/// Ordered by row, then column, so sets of coordinates iterate in reading order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Coord {
    pub y: usize,
    pub x: usize,
}

impl Coord {
    pub const fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }

    /// Manhattan distance between two coordinates
    pub fn manhattan(&self, other: Coord) -> usize {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }
}

/// A swap proposed by a player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Move {
    pub from: Coord,
    pub to: Coord,
}

impl Move {
    pub const fn new(from: Coord, to: Coord) -> Self {
        Self { from, to }
    }

    /// Build a move from raw wire coordinates
    ///
    /// Negative coordinates cannot address a cell and yield `None`.
    pub fn from_raw(x1: i64, y1: i64, x2: i64, y2: i64) -> Option<Self> {
        let c = |v: i64| usize::try_from(v).ok();
        Some(Self::new(
            Coord::new(c(x1)?, c(y1)?),
            Coord::new(c(x2)?, c(y2)?),
        ))
    }

    /// True when the two cells are 4-directionally adjacent
    pub fn is_adjacent(&self) -> bool {
        self.from.manhattan(self.to) == 1
    }
}

/// Stable player identifier (user name or generated guest id)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlayerId(pub String);

impl PlayerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PlayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Who is making a move
///
/// Only authenticated identities accumulate persistent score.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identity {
    Authenticated(PlayerId),
    Anonymous(PlayerId),
}

impl Identity {
    pub fn player_id(&self) -> &PlayerId {
        match self {
            Identity::Authenticated(id) | Identity::Anonymous(id) => id,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Identity::Authenticated(_))
    }
}

/// Room identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoomId(pub String);

impl RoomId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RoomId {
    fn default() -> Self {
        Self(DEFAULT_ROOM.to_string())
    }
}

impl std::fmt::Display for RoomId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
