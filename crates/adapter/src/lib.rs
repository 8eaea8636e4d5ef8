//! Adapter crate - rooms, persistence and the TCP game server
//!
//! Everything around the pure engine lives here: the wire protocol, the board
//! and score stores, frame pacing, the per-room subscriber hub, room sessions
//! and the server that ties connections to rooms.
//!
//! # Protocol Overview
//!
//! The server speaks **line-delimited JSON** over TCP:
//!
//! 1. **Connection**: Client connects (default: 127.0.0.1:7878)
//! 2. **Join**: Client sends `join`, server answers `welcome` followed by a
//!    `snapshot` of the room's current board
//! 3. **Moves**: Client sends `move`; every subscriber of the room receives
//!    the cascade frame by frame as `snapshot` messages tagged with the
//!    mover's `player_id`, the last one marked `"final": true`
//!
//! # Message Types
//!
//! ## Client → Server
//!
//! - **join**: `room` (default `game_room`) and optional `player`; without a
//!   player the connection plays as an anonymous guest and earns no score
//! - **move**: `x1`, `y1`, `x2`, `y2`; a bare object with just the four
//!   coordinates is accepted too
//!
//! ## Server → Client
//!
//! - **welcome**: Room, assigned player id, whether the player earns score
//! - **snapshot**: Board, phase, running score of the move, room sequence number
//! - **error**: `handshake_required`, `invalid_move`, `invalid_message` or `internal`
//!
//! A swap that matches nothing is reverted and answered with a snapshot to
//! the mover only.
//!
//! # Environment Variables
//!
//! - `GEMSWAP_HOST` / `GEMSWAP_PORT`: Bind address (default 127.0.0.1:7878)
//! - `GEMSWAP_ROWS` / `GEMSWAP_COLS` / `GEMSWAP_BASE_POINTS`: Engine tuning
//! - `GEMSWAP_TICK_MS`: First frame delay, 0 for no pacing (default 150)
//! - `GEMSWAP_DATA_DIR`: Keep boards and scores as JSON files here
//! - `GEMSWAP_SEED`: Fixed RNG seed
//! - `GEMSWAP_RELOAD_EACH_MOVE`: Re-read the board from the store before each move
//! - `GEMSWAP_DEFAULT_ROOM`: Room used when a join names none
//!
//! # Example Protocol Flow
//!
//! ```text
//! Client -> Server: {"type":"join","seq":1,"room":"game_room","player":"alice"}
//! Server -> Client: {"type":"welcome","seq":1,"ts":1700000000000,"protocol_version":"1.0.0","room":"game_room","player_id":"alice","authenticated":true}
//! Server -> Client: {"type":"snapshot","seq":0,"ts":1700000000001,"room":"game_room","board":[["red","blue",...],...],"score":0,"phase":"idle","final":true}
//! Client -> Server: {"type":"move","seq":2,"x1":0,"y1":0,"x2":1,"y2":0}
//! Server -> Client: {"type":"snapshot","seq":1,...,"player_id":"alice","score":0,"phase":"swapped","final":false}
//! Server -> Client: {"type":"snapshot","seq":2,...,"player_id":"alice","score":30,"phase":"clearing","final":false}
//! Server -> Client: {"type":"snapshot","seq":3,...,"player_id":"alice","score":30,"total":30,"phase":"refilling","final":true}
//! ```
//!
//! # Testing
//!
//! ```bash
//! nc 127.0.0.1 7878
//! {"type":"join","player":"alice"}
//! {"type":"move","x1":0,"y1":0,"x2":1,"y2":0}
//! ```

pub mod broadcast;
pub mod pacing;
pub mod protocol;
pub mod registry;
pub mod room;
pub mod server;
pub mod store;

pub use gemswap_core as core;
pub use gemswap_types as types;

// Re-export the main entry points for convenience
pub use broadcast::{ConnectionId, Outbox, Subscribers};
pub use pacing::{GeometricPacing, NoPacing, Pacing};
pub use protocol::*;
pub use registry::RoomRegistry;
pub use room::{MoveOutcome, Room, RoomError, RoomOptions, RoomServices};
pub use server::*;
pub use store::{
    is_blank, BoardStore, FileBoardStore, FileScoreStore, MemoryBoardStore, MemoryScoreStore,
    ScoreStore, StoreError, StoredBoard,
};
