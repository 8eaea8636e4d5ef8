//! Persistence seams for boards and player scores
//!
//! Both stores are async traits so a database-backed implementation can slot
//! in without touching the room. The shipped implementations keep everything
//! in memory or in JSON files under one data directory.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};

use crate::protocol::{current_timestamp_ms, grid_to_wire, wire_to_grid, WireGrid};
use crate::types::{Grid, PlayerId, RoomId};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("store codec failed: {0}")]
    Codec(#[from] serde_json::Error),
    #[error("stored board for room {room} is corrupt: {reason}")]
    Corrupt { room: String, reason: String },
}

/// Persisted board record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredBoard {
    pub room: String,
    pub board: WireGrid,
    /// Milliseconds since the Unix epoch
    pub last_updated: u64,
}

impl StoredBoard {
    pub fn new(room: &RoomId, grid: &Grid) -> Self {
        Self {
            room: room.as_str().to_string(),
            board: grid_to_wire(grid),
            last_updated: current_timestamp_ms(),
        }
    }

    pub fn grid(&self) -> Grid {
        wire_to_grid(&self.board)
    }
}

#[async_trait]
pub trait BoardStore: Send + Sync {
    async fn load(&self, room: &RoomId) -> Result<Option<Grid>, StoreError>;

    async fn save(&self, room: &RoomId, grid: &Grid) -> Result<(), StoreError>;

    /// Load the room's board, storing `fresh` first if there is none
    ///
    /// A stored grid without cells counts as no board.
    async fn load_or_init(&self, room: &RoomId, fresh: Grid) -> Result<Grid, StoreError> {
        if let Some(grid) = self.load(room).await?.filter(|g| !is_blank(g)) {
            return Ok(grid);
        }
        self.save(room, &fresh).await?;
        Ok(fresh)
    }
}

#[async_trait]
pub trait ScoreStore: Send + Sync {
    /// Current total (0 for an unknown player)
    async fn get_score(&self, player: &PlayerId) -> Result<u64, StoreError>;

    /// Atomically add `delta` and return the new total
    async fn add_score(&self, player: &PlayerId, delta: u32) -> Result<u64, StoreError>;
}

/// True for a grid with no rows or an empty first row
pub fn is_blank(grid: &Grid) -> bool {
    grid.first().map_or(true, Vec::is_empty)
}

// ============== In-memory ==============

#[derive(Debug, Default)]
pub struct MemoryBoardStore {
    boards: RwLock<HashMap<RoomId, StoredBoard>>,
}

impl MemoryBoardStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record(&self, room: &RoomId) -> Option<StoredBoard> {
        self.boards.read().await.get(room).cloned()
    }
}

#[async_trait]
impl BoardStore for MemoryBoardStore {
    async fn load(&self, room: &RoomId) -> Result<Option<Grid>, StoreError> {
        Ok(self.boards.read().await.get(room).map(StoredBoard::grid))
    }

    async fn save(&self, room: &RoomId, grid: &Grid) -> Result<(), StoreError> {
        self.boards
            .write()
            .await
            .insert(room.clone(), StoredBoard::new(room, grid));
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryScoreStore {
    scores: Mutex<HashMap<PlayerId, u64>>,
}

impl MemoryScoreStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ScoreStore for MemoryScoreStore {
    async fn get_score(&self, player: &PlayerId) -> Result<u64, StoreError> {
        Ok(self.scores.lock().await.get(player).copied().unwrap_or(0))
    }

    async fn add_score(&self, player: &PlayerId, delta: u32) -> Result<u64, StoreError> {
        let mut scores = self.scores.lock().await;
        let total = scores.entry(player.clone()).or_insert(0);
        *total = total.saturating_add(u64::from(delta));
        Ok(*total)
    }
}

// ============== JSON files ==============

/// One `<room>.json` file per room
#[derive(Debug, Clone)]
pub struct FileBoardStore {
    dir: PathBuf,
}

impl FileBoardStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, room: &RoomId) -> PathBuf {
        self.dir
            .join("boards")
            .join(format!("{}.json", file_stem(room.as_str())))
    }
}

#[async_trait]
impl BoardStore for FileBoardStore {
    async fn load(&self, room: &RoomId) -> Result<Option<Grid>, StoreError> {
        let bytes = match tokio::fs::read(self.path_for(room)).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let stored: StoredBoard = serde_json::from_slice(&bytes)?;
        if stored.room != room.as_str() {
            return Err(StoreError::Corrupt {
                room: room.as_str().to_string(),
                reason: format!("file belongs to room {}", stored.room),
            });
        }
        Ok(Some(stored.grid()))
    }

    async fn save(&self, room: &RoomId, grid: &Grid) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(&StoredBoard::new(room, grid))?;
        write_atomic(&self.path_for(room), &bytes).await
    }
}

/// All scores in one `scores.json`, rewritten on every award
#[derive(Debug)]
pub struct FileScoreStore {
    path: PathBuf,
    scores: Mutex<HashMap<String, u64>>,
}

impl FileScoreStore {
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = dir.as_ref().join("scores.json");
        let scores = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path,
            scores: Mutex::new(scores),
        })
    }
}

#[async_trait]
impl ScoreStore for FileScoreStore {
    async fn get_score(&self, player: &PlayerId) -> Result<u64, StoreError> {
        Ok(self
            .scores
            .lock()
            .await
            .get(player.as_str())
            .copied()
            .unwrap_or(0))
    }

    async fn add_score(&self, player: &PlayerId, delta: u32) -> Result<u64, StoreError> {
        let mut scores = self.scores.lock().await;
        let previous = scores.get(player.as_str()).copied().unwrap_or(0);
        let total = previous.saturating_add(u64::from(delta));
        scores.insert(player.as_str().to_string(), total);

        let bytes = serde_json::to_vec(&*scores)?;
        if let Err(e) = write_atomic(&self.path, &bytes).await {
            scores.insert(player.as_str().to_string(), previous);
            return Err(e);
        }
        Ok(total)
    }
}

/// Write to a sibling temp file and rename over the target
async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

/// Room ids are user input; map them one-to-one onto a safe alphabet
///
/// ASCII letters, digits, `-` and `_` pass through. Every other byte becomes
/// `%XX`, so distinct ids never share a file. The empty id is `%`.
fn file_stem(room: &str) -> String {
    if room.is_empty() {
        return "%".to_string();
    }
    let mut stem = String::with_capacity(room.len());
    for byte in room.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            stem.push(char::from(byte));
        } else {
            stem.push_str(&format!("%{:02X}", byte));
        }
    }
    stem
}
