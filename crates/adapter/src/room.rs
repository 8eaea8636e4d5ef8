//! Room session - one shared board, serialized moves, ordered fan-out
//!
//! Each room owns a single long-lived lock around its board, engine and combo
//! counter. A move holds it from the optional store refresh until its last
//! frame has been published, so two moves can never interleave and every
//! move starts from a settled board.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::broadcast::{ConnectionId, Outbox, Subscribers};
use crate::core::{Board, BoardError, CascadeEngine, ComboCounter, EngineError};
use crate::pacing::{NoPacing, Pacing};
use crate::protocol::{create_snapshot, FrameInfo, ServerMessage};
use crate::store::{
    is_blank, BoardStore, MemoryBoardStore, MemoryScoreStore, ScoreStore, StoreError,
};
use crate::types::{Identity, Move, RoomId};

#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// External collaborators shared by every room
#[derive(Clone)]
pub struct RoomServices {
    pub boards: Arc<dyn BoardStore>,
    pub scores: Arc<dyn ScoreStore>,
    pub pacing: Arc<dyn Pacing>,
}

impl RoomServices {
    /// Memory stores and no pacing
    pub fn in_memory() -> Self {
        Self {
            boards: Arc::new(MemoryBoardStore::new()),
            scores: Arc::new(MemoryScoreStore::new()),
            pacing: Arc::new(NoPacing),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoomOptions {
    /// Re-read the board from the store before every move
    pub reload_each_move: bool,
}

/// What a handled move did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MoveOutcome {
    /// The swap matched nothing and was reverted
    pub noop: bool,
    pub score_delta: u32,
    /// Score was added to the mover's persistent total
    pub awarded: bool,
    pub total_score: Option<u64>,
    pub chain_len: usize,
    pub frames_published: usize,
    pub reshuffled: bool,
    pub stuck: bool,
    /// The board store holds the current board
    pub persisted: bool,
}

struct RoomState {
    board: Board,
    engine: CascadeEngine,
    combo: ComboCounter,
    seq: u64,
    /// The last save failed; the in-memory board is ahead of the store
    dirty: bool,
}

pub struct Room {
    id: RoomId,
    state: tokio::sync::Mutex<RoomState>,
    subscribers: Subscribers,
    services: RoomServices,
    options: RoomOptions,
}

impl Room {
    /// Load the room's board from the store, or create and store a fresh one
    ///
    /// Whatever comes out of the store is stabilized before play starts. A
    /// stored grid without cells is replaced like a missing one.
    pub async fn open(
        id: RoomId,
        mut engine: CascadeEngine,
        services: RoomServices,
        options: RoomOptions,
    ) -> Result<Self, RoomError> {
        let stored = services.boards.load(&id).await?.filter(|g| !is_blank(g));
        let (board, save) = match stored {
            Some(grid) => (
                Board::from_grid(&grid).map_err(|e| corrupt(&id, e))?,
                false,
            ),
            None => {
                let mut fresh = engine.generate_board();
                engine.stabilize(&mut fresh)?;
                debug!(room = %id, "no stored board; generated a fresh one");
                (fresh, true)
            }
        };

        Self::start(id, engine, board, services, options, save).await
    }

    /// Start a room on a given board, replacing whatever the store holds
    pub async fn with_board(
        id: RoomId,
        engine: CascadeEngine,
        board: Board,
        services: RoomServices,
        options: RoomOptions,
    ) -> Result<Self, RoomError> {
        Self::start(id, engine, board, services, options, true).await
    }

    async fn start(
        id: RoomId,
        mut engine: CascadeEngine,
        mut board: Board,
        services: RoomServices,
        options: RoomOptions,
        mut save: bool,
    ) -> Result<Self, RoomError> {
        let repair = engine.stabilize(&mut board)?;
        if !repair.is_noop() {
            info!(
                room = %id,
                chain = repair.chain_len,
                reshuffled = repair.reshuffled,
                "board was not at rest; repaired"
            );
            save = true;
        }
        if save {
            services.boards.save(&id, &board.serialize()).await?;
        }
        if repair.stuck {
            warn!(room = %id, "board has no legal move and could not be reshuffled");
        }

        let subscribers = Subscribers::new();
        subscribers
            .publish(create_snapshot(0, &id, &board.serialize(), FrameInfo::resting()))
            .await;

        info!(room = %id, rows = board.rows(), cols = board.cols(), "room opened");

        Ok(Self {
            id,
            state: tokio::sync::Mutex::new(RoomState {
                board,
                engine,
                combo: ComboCounter::new(),
                seq: 0,
                dirty: false,
            }),
            subscribers,
            services,
            options,
        })
    }

    pub fn id(&self) -> &RoomId {
        &self.id
    }

    /// Add a viewer; it immediately receives the current board
    pub async fn subscribe(&self, conn: ConnectionId, tx: Outbox) {
        self.subscribers.subscribe(conn, tx).await;
        debug!(room = %self.id, conn, "subscribed");
    }

    pub async fn unsubscribe(&self, conn: ConnectionId) -> bool {
        let removed = self.subscribers.unsubscribe(conn).await;
        if removed {
            debug!(room = %self.id, conn, "unsubscribed");
        }
        removed
    }

    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.len().await
    }

    /// Copy of the current board (waits for any running move to finish)
    pub async fn board(&self) -> Board {
        self.state.lock().await.board.clone()
    }

    /// Apply one player's move and publish the resulting frames
    ///
    /// `origin` is the mover's connection; a swap that matches nothing is
    /// answered to it alone. Invalid moves return
    /// `RoomError::Engine(EngineError::InvalidMove)` without touching the
    /// board or notifying anyone.
    pub async fn handle_move(
        &self,
        origin: ConnectionId,
        identity: &Identity,
        mv: Move,
    ) -> Result<MoveOutcome, RoomError> {
        let mut state = self.state.lock().await;

        if self.options.reload_each_move && !state.dirty {
            self.reload(&mut state).await?;
        }

        let result = {
            let RoomState {
                board,
                engine,
                combo,
                ..
            } = &mut *state;
            engine.apply_move(board, mv, combo)?
        };
        let player = identity.player_id().as_str();

        if result.is_noop() {
            let persisted = !state.dirty || self.persist(&mut state).await;
            let info = FrameInfo {
                player_id: Some(player),
                ..FrameInfo::resting()
            };
            let snapshot = create_snapshot(state.seq, &self.id, &state.board.serialize(), info);
            self.subscribers
                .deliver_to(origin, ServerMessage::Snapshot(snapshot))
                .await;
            debug!(room = %self.id, player, "swap matched nothing");
            return Ok(MoveOutcome {
                noop: true,
                persisted,
                ..MoveOutcome::default()
            });
        }

        state.dirty = true;
        let persisted = self.persist(&mut state).await;

        if result.stuck {
            warn!(room = %self.id, "board has no legal move and could not be reshuffled");
        }

        let (awarded, total_score) = self.award(identity, result.score_delta).await;

        let frames = &result.frames;
        let last = frames.len().saturating_sub(1);
        for (i, frame) in frames.iter().enumerate() {
            state.seq += 1;
            let is_final = i == last;
            let info = FrameInfo {
                player_id: Some(player),
                score: frame.score,
                total: if is_final { total_score } else { None },
                phase: frame.phase,
                is_final,
            };
            self.subscribers
                .publish(create_snapshot(state.seq, &self.id, &frame.grid, info))
                .await;
            if !is_final {
                self.services.pacing.pause(i).await;
            }
        }

        info!(
            room = %self.id,
            player,
            score = result.score_delta,
            chain = result.chain_len,
            reshuffled = result.reshuffled,
            "move resolved"
        );

        Ok(MoveOutcome {
            noop: false,
            score_delta: result.score_delta,
            awarded,
            total_score,
            chain_len: result.chain_len,
            frames_published: frames.len(),
            reshuffled: result.reshuffled,
            stuck: result.stuck,
            persisted,
        })
    }

    async fn reload(&self, state: &mut RoomState) -> Result<(), RoomError> {
        // A missing or blank record means the store lost our board; rewrite it.
        let stored = self.services.boards.load(&self.id).await?;
        let Some(grid) = stored.filter(|g| !is_blank(g)) else {
            state.dirty = true;
            return Ok(());
        };
        let board = Board::from_grid(&grid).map_err(|e| corrupt(&self.id, e))?;
        if board == state.board {
            return Ok(());
        }

        debug!(room = %self.id, "board changed in store; reloaded");
        state.board = board;
        let repair = state.engine.stabilize(&mut state.board)?;
        if !repair.is_noop() {
            state.dirty = true;
        }
        Ok(())
    }

    /// Save the board; on failure keep it in memory and retry on the next move
    async fn persist(&self, state: &mut RoomState) -> bool {
        match self
            .services
            .boards
            .save(&self.id, &state.board.serialize())
            .await
        {
            Ok(()) => {
                state.dirty = false;
                true
            }
            Err(e) => {
                error!(room = %self.id, error = %e, "failed to persist board; will retry");
                state.dirty = true;
                false
            }
        }
    }

    async fn award(&self, identity: &Identity, delta: u32) -> (bool, Option<u64>) {
        let Identity::Authenticated(player) = identity else {
            return (false, None);
        };
        if delta == 0 {
            return (false, None);
        }
        match self.services.scores.add_score(player, delta).await {
            Ok(total) => (true, Some(total)),
            Err(e) => {
                error!(room = %self.id, player = %player, error = %e, "failed to award score");
                (false, None)
            }
        }
    }
}

fn corrupt(room: &RoomId, e: BoardError) -> StoreError {
    StoreError::Corrupt {
        room: room.as_str().to_string(),
        reason: e.to_string(),
    }
}

impl std::fmt::Debug for Room {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Room")
            .field("id", &self.id)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
