//! Protocol module - JSON message types for the game server
//!
//! Line-delimited JSON over TCP. Every server message has `type`, `seq` and
//! `ts` (timestamp in ms). Boards travel as row-major arrays of lowercase gem
//! names, with `null` for an empty cell.

use serde::{Deserialize, Serialize};

use crate::core::CascadePhase;
use crate::types::{Gem, Grid, Move, RoomId};

pub const PROTOCOL_VERSION: &str = "1.0.0";

// ============== Client -> Server Messages ==============

/// Join (or switch to) a room
///
/// A missing `player` joins anonymously; a missing `room` joins the default
/// shared room.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JoinMessage {
    #[serde(default)]
    pub seq: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player: Option<String>,
}

/// Swap two cells, addressed `(x = column, y = row)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveMessage {
    #[serde(default)]
    pub seq: u64,
    pub x1: i64,
    pub y1: i64,
    pub x2: i64,
    pub y2: i64,
}

impl MoveMessage {
    /// `None` when any coordinate is negative
    pub fn to_move(&self) -> Option<Move> {
        Move::from_raw(self.x1, self.y1, self.x2, self.y2)
    }
}

#[derive(Debug, Clone)]
pub enum ParsedMessage {
    Join(JoinMessage),
    Move(MoveMessage),
    Unknown(UnknownMessage),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownMessage {
    pub seq: u64,
    pub msg_type: String,
}

/// Parse one inbound line
///
/// An object without a `type` field is read as a bare move. An unknown
/// `type` is not a parse error; the caller decides how to answer it.
pub fn parse_message(json: &str) -> Result<ParsedMessage, serde_json::Error> {
    #[derive(Debug, Deserialize)]
    #[serde(tag = "type")]
    enum InboundMessage {
        #[serde(rename = "join")]
        Join(JoinMessage),
        #[serde(rename = "move")]
        Move(MoveMessage),
    }

    match serde_json::from_str::<InboundMessage>(json) {
        Ok(InboundMessage::Join(m)) => Ok(ParsedMessage::Join(m)),
        Ok(InboundMessage::Move(m)) => Ok(ParsedMessage::Move(m)),
        Err(e) => {
            #[derive(Debug, Deserialize)]
            struct TypeOnly {
                #[serde(rename = "type")]
                msg_type: Option<String>,
                #[serde(default)]
                seq: u64,
            }

            let Ok(probe) = serde_json::from_str::<TypeOnly>(json) else {
                return Err(e);
            };
            match probe.msg_type {
                None => serde_json::from_str::<MoveMessage>(json).map(ParsedMessage::Move),
                Some(t) if t == "join" || t == "move" => Err(e),
                Some(t) => Ok(ParsedMessage::Unknown(UnknownMessage {
                    seq: probe.seq,
                    msg_type: t,
                })),
            }
        }
    }
}

// ============== Server -> Client Messages ==============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WelcomeType {
    #[serde(rename = "welcome")]
    Welcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SnapshotType {
    #[serde(rename = "snapshot")]
    Snapshot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorType {
    #[serde(rename = "error")]
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    #[serde(rename = "handshake_required")]
    HandshakeRequired,
    #[serde(rename = "invalid_move")]
    InvalidMove,
    #[serde(rename = "invalid_message")]
    InvalidMessage,
    #[serde(rename = "internal")]
    Internal,
}

/// Gem name as it appears on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GemName {
    #[serde(rename = "red")]
    Red,
    #[serde(rename = "blue")]
    Blue,
    #[serde(rename = "green")]
    Green,
    #[serde(rename = "yellow")]
    Yellow,
    #[serde(rename = "purple")]
    Purple,
    #[serde(rename = "orange")]
    Orange,
    #[serde(rename = "white")]
    White,
}

impl From<Gem> for GemName {
    fn from(gem: Gem) -> Self {
        match gem {
            Gem::Red => GemName::Red,
            Gem::Blue => GemName::Blue,
            Gem::Green => GemName::Green,
            Gem::Yellow => GemName::Yellow,
            Gem::Purple => GemName::Purple,
            Gem::Orange => GemName::Orange,
            Gem::White => GemName::White,
        }
    }
}

impl From<GemName> for Gem {
    fn from(name: GemName) -> Self {
        match name {
            GemName::Red => Gem::Red,
            GemName::Blue => Gem::Blue,
            GemName::Green => Gem::Green,
            GemName::Yellow => Gem::Yellow,
            GemName::Purple => Gem::Purple,
            GemName::Orange => Gem::Orange,
            GemName::White => Gem::White,
        }
    }
}

pub type WireGrid = Vec<Vec<Option<GemName>>>;

pub fn grid_to_wire(grid: &Grid) -> WireGrid {
    grid.iter()
        .map(|row| row.iter().map(|c| c.map(GemName::from)).collect())
        .collect()
}

pub fn wire_to_grid(wire: &WireGrid) -> Grid {
    wire.iter()
        .map(|row| row.iter().map(|c| c.map(Gem::from)).collect())
        .collect()
}

/// Response to join
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WelcomeMessage {
    #[serde(rename = "type")]
    pub msg_type: WelcomeType,
    pub seq: u64,
    pub ts: u64,
    pub protocol_version: String,
    pub room: String,
    pub player_id: String,
    /// Whether moves by this player earn persistent score
    pub authenticated: bool,
}

/// Board state pushed to room subscribers
///
/// `seq` is the room's frame counter; a direct (non-broadcast) snapshot
/// repeats the latest published value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotMessage {
    #[serde(rename = "type")]
    pub msg_type: SnapshotType,
    pub seq: u64,
    pub ts: u64,
    pub room: String,
    pub board: WireGrid,
    /// Player whose move produced this frame
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_id: Option<String>,
    /// Points earned by the move so far
    pub score: u32,
    /// Mover's persistent total, on the final frame of an awarded move
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
    pub phase: String,
    /// Last frame of the move; the board is settled
    #[serde(rename = "final")]
    pub is_final: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorMessage {
    #[serde(rename = "type")]
    pub msg_type: ErrorType,
    pub seq: u64,
    pub ts: u64,
    pub code: ErrorCode,
    pub message: String,
}

/// Anything the server writes to a connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ServerMessage {
    Welcome(WelcomeMessage),
    Snapshot(SnapshotMessage),
    Error(ErrorMessage),
}

// ============== Utility Functions ==============

pub fn create_welcome(
    seq: u64,
    room: &RoomId,
    player_id: &str,
    authenticated: bool,
) -> WelcomeMessage {
    WelcomeMessage {
        msg_type: WelcomeType::Welcome,
        seq,
        ts: current_timestamp_ms(),
        protocol_version: PROTOCOL_VERSION.to_string(),
        room: room.as_str().to_string(),
        player_id: player_id.to_string(),
        authenticated,
    }
}

/// Fields of a snapshot that vary per frame
#[derive(Debug, Clone, Copy)]
pub struct FrameInfo<'a> {
    pub player_id: Option<&'a str>,
    pub score: u32,
    pub total: Option<u64>,
    pub phase: CascadePhase,
    pub is_final: bool,
}

impl FrameInfo<'_> {
    /// A settled board not tied to any move
    pub fn resting() -> Self {
        FrameInfo {
            player_id: None,
            score: 0,
            total: None,
            phase: CascadePhase::Idle,
            is_final: true,
        }
    }
}

pub fn create_snapshot(seq: u64, room: &RoomId, grid: &Grid, info: FrameInfo<'_>) -> SnapshotMessage {
    SnapshotMessage {
        msg_type: SnapshotType::Snapshot,
        seq,
        ts: current_timestamp_ms(),
        room: room.as_str().to_string(),
        board: grid_to_wire(grid),
        player_id: info.player_id.map(str::to_string),
        score: info.score,
        total: info.total,
        phase: info.phase.as_str().to_string(),
        is_final: info.is_final,
    }
}

pub fn create_error(seq: u64, code: ErrorCode, message: &str) -> ErrorMessage {
    ErrorMessage {
        msg_type: ErrorType::Error,
        seq,
        ts: current_timestamp_ms(),
        code,
        message: message.to_string(),
    }
}

/// Get current timestamp in milliseconds
pub fn current_timestamp_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
