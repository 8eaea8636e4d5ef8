//! TCP server for the shared-board game
//!
//! Handles incoming connections and manages client lifecycle.
//! Uses tokio for async networking.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::broadcast::ConnectionId;
use crate::core::{EngineConfig, EngineError, GemRng};
use crate::pacing::{GeometricPacing, NoPacing, Pacing};
use crate::protocol::*;
use crate::registry::RoomRegistry;
use crate::room::{Room, RoomError, RoomOptions, RoomServices};
use crate::store::{FileBoardStore, FileScoreStore, MemoryBoardStore, MemoryScoreStore};
use crate::types::{Identity, PlayerId, RoomId, DEFAULT_ROOM, TICK_INTERVAL_MS};

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub engine: EngineConfig,
    /// First frame delay; `None` publishes frames back to back
    pub tick: Option<Duration>,
    /// JSON stores live here; `None` keeps everything in memory
    pub data_dir: Option<PathBuf>,
    /// Fixed seed for reproducible boards; `None` seeds from entropy
    pub seed: Option<u64>,
    pub reload_each_move: bool,
    pub default_room: RoomId,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 7878,
            engine: EngineConfig::default(),
            tick: Some(Duration::from_millis(TICK_INTERVAL_MS)),
            data_dir: None,
            seed: None,
            reload_each_move: false,
            default_room: RoomId::default(),
        }
    }
}

impl ServerConfig {
    /// Create from `GEMSWAP_*` environment variables
    pub fn from_env() -> Self {
        use std::env;

        fn parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
            env::var(key).ok().and_then(|s| s.trim().parse().ok())
        }

        fn non_empty(key: &str) -> Option<String> {
            env::var(key)
                .ok()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        }

        let defaults = Self::default();
        let mut engine = sized_engine(
            defaults.engine,
            parsed("GEMSWAP_ROWS"),
            parsed("GEMSWAP_COLS"),
        );
        engine.base_points = parsed("GEMSWAP_BASE_POINTS").unwrap_or(engine.base_points);

        let tick = match parsed::<u64>("GEMSWAP_TICK_MS") {
            Some(0) => None,
            Some(ms) => Some(Duration::from_millis(ms)),
            None => defaults.tick,
        };

        let reload_each_move = env::var("GEMSWAP_RELOAD_EACH_MOVE")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        Self {
            host: non_empty("GEMSWAP_HOST").unwrap_or(defaults.host),
            port: parsed("GEMSWAP_PORT").unwrap_or(defaults.port),
            engine,
            tick,
            data_dir: non_empty("GEMSWAP_DATA_DIR").map(PathBuf::from),
            seed: parsed("GEMSWAP_SEED"),
            reload_each_move,
            default_room: non_empty("GEMSWAP_DEFAULT_ROOM")
                .map(RoomId::new)
                .unwrap_or_else(|| RoomId::new(DEFAULT_ROOM)),
        }
    }

    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", self.host, self.port))
    }

    /// Stores and pacing selected by this configuration
    pub async fn services(&self) -> anyhow::Result<RoomServices> {
        let pacing: Arc<dyn Pacing> = match self.tick {
            Some(initial) => Arc::new(GeometricPacing::new(initial)),
            None => Arc::new(NoPacing),
        };

        let services = match &self.data_dir {
            Some(dir) => RoomServices {
                boards: Arc::new(FileBoardStore::new(dir)),
                scores: Arc::new(
                    FileScoreStore::open(dir)
                        .await
                        .with_context(|| format!("opening score store in {}", dir.display()))?,
                ),
                pacing,
            },
            None => RoomServices {
                boards: Arc::new(MemoryBoardStore::new()),
                scores: Arc::new(MemoryScoreStore::new()),
                pacing,
            },
        };
        Ok(services)
    }
}

/// Apply board dimensions from the environment, keeping `base`'s size when
/// the result could not hold a playable board
fn sized_engine(base: EngineConfig, rows: Option<usize>, cols: Option<usize>) -> EngineConfig {
    let engine = EngineConfig {
        rows: rows.unwrap_or(base.rows),
        cols: cols.unwrap_or(base.cols),
        ..base
    };
    if engine.is_playable() {
        return engine;
    }
    warn!(
        rows = engine.rows,
        cols = engine.cols,
        "board too small to play; using {}x{}",
        base.rows,
        base.cols
    );
    base
}

/// Shared server state
pub struct ServerState {
    config: ServerConfig,
    registry: RoomRegistry,
    guests: AtomicU64,
}

impl ServerState {
    pub fn new(config: ServerConfig, services: RoomServices) -> Self {
        let rng = match config.seed {
            Some(seed) => GemRng::new(seed),
            None => GemRng::from_entropy(),
        };
        let options = RoomOptions {
            reload_each_move: config.reload_each_move,
        };
        let registry = RoomRegistry::new(config.engine, rng, services, options);
        Self {
            config,
            registry,
            guests: AtomicU64::new(0),
        }
    }

    pub fn registry(&self) -> &RoomRegistry {
        &self.registry
    }

    fn next_guest(&self) -> PlayerId {
        let n = self.guests.fetch_add(1, Ordering::Relaxed) + 1;
        PlayerId::new(format!("guest-{}", n))
    }
}

/// Check whether we can bind a TCP listener on the given address
pub async fn check_tcp_listen_available(addr: SocketAddr) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    drop(listener);
    Ok(())
}

/// Start the TCP server
pub async fn run_server(
    config: ServerConfig,
    ready_tx: Option<oneshot::Sender<SocketAddr>>,
) -> anyhow::Result<()> {
    let services = config.services().await?;
    run_server_with(config, services, ready_tx).await
}

/// Start the TCP server with caller-supplied stores and pacing
pub async fn run_server_with(
    config: ServerConfig,
    services: RoomServices,
    ready_tx: Option<oneshot::Sender<SocketAddr>>,
) -> anyhow::Result<()> {
    let addr = config.socket_addr()?;
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    let bound = listener.local_addr()?;
    info!(addr = %bound, "game server listening");
    if let Some(tx) = ready_tx {
        let _ = tx.send(bound);
    }

    let state = Arc::new(ServerState::new(config, services));
    let mut conn_counter: ConnectionId = 0;

    // Accept incoming connections
    loop {
        let (socket, addr) = listener.accept().await?;
        conn_counter += 1;
        let conn = conn_counter;

        info!(conn, %addr, "client connected");

        let state = Arc::clone(&state);
        tokio::spawn(async move {
            if let Err(e) = handle_client(socket, conn, state).await {
                warn!(conn, error = %e, "client error");
            }
            info!(conn, "client disconnected");
        });
    }
}

/// Connection-local session after a successful join
struct Session {
    identity: Identity,
    room: Arc<Room>,
}

/// Handle a single client connection
async fn handle_client(
    socket: TcpStream,
    conn: ConnectionId,
    state: Arc<ServerState>,
) -> anyhow::Result<()> {
    let (reader, mut writer) = tokio::io::split(socket);
    let mut reader = BufReader::new(reader);

    // Channel to send messages to this client
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();

    // Spawn task to write messages to client
    let write_task = tokio::spawn(async move {
        let mut buf: Vec<u8> = Vec::with_capacity(4096);
        while let Some(msg) = rx.recv().await {
            buf.clear();
            if serde_json::to_writer(&mut buf, &msg).is_err() {
                continue;
            }
            buf.push(b'\n');
            if writer.write_all(&buf).await.is_err() {
                break;
            }
            if writer.flush().await.is_err() {
                break;
            }
        }
    });

    let mut session: Option<Session> = None;
    let mut line = String::new();

    let result: anyhow::Result<()> = async {
        loop {
            line.clear();
            let bytes_read = reader.read_line(&mut line).await?;
            if bytes_read == 0 {
                break;
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            match parse_message(trimmed) {
                Ok(ParsedMessage::Join(join)) => {
                    let joined = join_room(&state, conn, &tx, join, session.take()).await;
                    session = joined;
                }
                Ok(ParsedMessage::Move(msg)) => {
                    let Some(current) = session.as_ref() else {
                        send_error(&tx, msg.seq, ErrorCode::HandshakeRequired, "join a room first");
                        continue;
                    };
                    handle_move_message(current, conn, &tx, msg).await;
                }
                Ok(ParsedMessage::Unknown(unknown)) => {
                    send_error(
                        &tx,
                        unknown.seq,
                        ErrorCode::InvalidMessage,
                        &format!("unknown message type {}", unknown.msg_type),
                    );
                }
                Err(e) => {
                    debug!(conn, error = %e, "unparseable message");
                    send_error(&tx, 0, ErrorCode::InvalidMessage, &e.to_string());
                }
            }
        }
        Ok(())
    }
    .await;

    // A cascade in progress keeps running; this connection just stops receiving it.
    if let Some(current) = session {
        current.room.unsubscribe(conn).await;
    }
    drop(tx);
    let _ = write_task.await;

    result
}

async fn join_room(
    state: &ServerState,
    conn: ConnectionId,
    tx: &mpsc::UnboundedSender<ServerMessage>,
    join: JoinMessage,
    previous: Option<Session>,
) -> Option<Session> {
    let room_id = join
        .room
        .filter(|r| !r.trim().is_empty())
        .map(RoomId::new)
        .unwrap_or_else(|| state.config.default_room.clone());

    let identity = match join.player.filter(|p| !p.trim().is_empty()) {
        Some(name) => Identity::Authenticated(PlayerId::new(name)),
        None => match previous.as_ref().map(|s| &s.identity) {
            Some(Identity::Anonymous(guest)) => Identity::Anonymous(guest.clone()),
            _ => Identity::Anonymous(state.next_guest()),
        },
    };

    let room = match state.registry.get_or_open(&room_id).await {
        Ok(room) => room,
        Err(e) => {
            error!(conn, room = %room_id, error = %e, "failed to open room");
            send_error(tx, join.seq, ErrorCode::Internal, "room unavailable");
            return previous;
        }
    };

    if let Some(old) = previous {
        old.room.unsubscribe(conn).await;
    }

    let welcome = create_welcome(
        join.seq,
        &room_id,
        identity.player_id().as_str(),
        identity.is_authenticated(),
    );
    let _ = tx.send(ServerMessage::Welcome(welcome));
    room.subscribe(conn, tx.clone()).await;

    info!(conn, room = %room_id, player = %identity.player_id(), "joined");
    Some(Session { identity, room })
}

async fn handle_move_message(
    session: &Session,
    conn: ConnectionId,
    tx: &mpsc::UnboundedSender<ServerMessage>,
    msg: MoveMessage,
) {
    let Some(mv) = msg.to_move() else {
        send_error(tx, msg.seq, ErrorCode::InvalidMove, "coordinates must be non-negative");
        return;
    };

    match session.room.handle_move(conn, &session.identity, mv).await {
        Ok(outcome) => {
            debug!(conn, score = outcome.score_delta, noop = outcome.noop, "move handled");
        }
        Err(RoomError::Engine(e @ EngineError::InvalidMove(_))) => {
            send_error(tx, msg.seq, ErrorCode::InvalidMove, &e.to_string());
        }
        Err(e) => {
            error!(conn, room = %session.room.id(), error = %e, "move failed");
            send_error(tx, msg.seq, ErrorCode::Internal, "move could not be applied");
        }
    }
}

fn send_error(tx: &mpsc::UnboundedSender<ServerMessage>, seq: u64, code: ErrorCode, message: &str) {
    let _ = tx.send(ServerMessage::Error(create_error(seq, code, message)));
}
