//! Room session behaviour: serialization, fan-out, scoring and persistence

use std::io::ErrorKind;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use gemswap::adapter::{
    BoardStore, GeometricPacing, MemoryBoardStore, MemoryScoreStore, NoPacing, Room, RoomError,
    RoomOptions, RoomServices, ScoreStore, ServerMessage, SnapshotMessage, StoreError,
};
use gemswap::core::{find_matches, Board, CascadeEngine, EngineConfig, EngineError, GemRng};
use gemswap::types::{Coord, Gem, Grid, Identity, Move, PlayerId, RoomId};

const SINGLE_CLEAR: [&str; 8] = [
    "brrypowr", "rypowrbg", "powrbgyp", "wrbgypow", "bgypowrb", "ypowrbgy", "owrbgypo",
    "rbgyppwp",
];

const FIVE_RUN: [&str; 8] = [
    "rrbrrowr", "gyrowrbg", "powrbgyp", "wrbgypow", "bgypowrb", "ypowrbgy", "owrbgypo",
    "rbgyppwp",
];

fn gem(c: char) -> Option<Gem> {
    match c {
        'r' => Some(Gem::Red),
        'b' => Some(Gem::Blue),
        'g' => Some(Gem::Green),
        'y' => Some(Gem::Yellow),
        'p' => Some(Gem::Purple),
        'o' => Some(Gem::Orange),
        'w' => Some(Gem::White),
        _ => None,
    }
}

fn grid_from(rows: &[&str]) -> Grid {
    rows.iter().map(|r| r.chars().map(gem).collect()).collect()
}

fn board_from(rows: &[&str]) -> Board {
    Board::from_grid(&grid_from(rows)).unwrap()
}

fn engine(refills: &str) -> CascadeEngine {
    CascadeEngine::new(
        EngineConfig::default(),
        GemRng::with_replay(11, refills.chars().filter_map(gem)),
    )
}

fn alice() -> Identity {
    Identity::Authenticated(PlayerId::new("alice"))
}

fn mv(x1: usize, y1: usize, x2: usize, y2: usize) -> Move {
    Move::new(Coord::new(x1, y1), Coord::new(x2, y2))
}

fn drain(rx: &mut mpsc::UnboundedReceiver<ServerMessage>) -> Vec<SnapshotMessage> {
    let mut out = Vec::new();
    while let Ok(msg) = rx.try_recv() {
        match msg {
            ServerMessage::Snapshot(s) => out.push(s),
            other => panic!("unexpected message {:?}", other),
        }
    }
    out
}

async fn room_on(rows: &[&str], refills: &str, services: RoomServices) -> Arc<Room> {
    Arc::new(
        Room::with_board(
            RoomId::default(),
            engine(refills),
            board_from(rows),
            services,
            RoomOptions::default(),
        )
        .await
        .unwrap(),
    )
}

#[tokio::test]
async fn move_is_broadcast_to_every_subscriber_in_order() {
    let scores = Arc::new(MemoryScoreStore::new());
    let boards = Arc::new(MemoryBoardStore::new());
    let services = RoomServices {
        boards: boards.clone(),
        scores: scores.clone(),
        pacing: Arc::new(NoPacing),
    };
    let room = room_on(&SINGLE_CLEAR, "gwb", services).await;

    let (mover_tx, mut mover_rx) = mpsc::unbounded_channel();
    let (viewer_tx, mut viewer_rx) = mpsc::unbounded_channel();
    room.subscribe(1, mover_tx).await;
    room.subscribe(2, viewer_tx).await;

    // Both get the resting board on subscribe.
    for rx in [&mut mover_rx, &mut viewer_rx] {
        let initial = drain(rx);
        assert_eq!(initial.len(), 1);
        assert_eq!(initial[0].seq, 0);
        assert!(initial[0].player_id.is_none());
        assert!(initial[0].is_final);
    }

    let outcome = room.handle_move(1, &alice(), mv(0, 0, 0, 1)).await.unwrap();
    assert!(!outcome.noop);
    assert_eq!(outcome.score_delta, 30);
    assert!(outcome.awarded);
    assert_eq!(outcome.total_score, Some(30));
    assert_eq!(outcome.chain_len, 1);
    assert_eq!(outcome.frames_published, 3);
    assert!(outcome.persisted);

    let mover_frames = drain(&mut mover_rx);
    let viewer_frames = drain(&mut viewer_rx);
    // The mover sees the move through the broadcast exactly once.
    assert_eq!(mover_frames, viewer_frames);
    assert_eq!(
        viewer_frames.iter().map(|s| s.seq).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
    assert_eq!(
        viewer_frames.iter().map(|s| s.phase.as_str()).collect::<Vec<_>>(),
        vec!["swapped", "clearing", "refilling"]
    );
    assert!(viewer_frames
        .iter()
        .all(|s| s.player_id.as_deref() == Some("alice")));
    let last = viewer_frames.last().unwrap();
    assert!(last.is_final);
    assert_eq!(last.score, 30);
    assert_eq!(last.total, Some(30));
    assert!(viewer_frames[..2].iter().all(|s| !s.is_final && s.total.is_none()));

    let board = room.board().await;
    assert_eq!(
        boards.record(&RoomId::default()).await.unwrap().grid(),
        board.serialize()
    );
    assert_eq!(
        scores.get_score(&PlayerId::new("alice")).await.unwrap(),
        30
    );
}

#[tokio::test]
async fn anonymous_moves_score_but_are_not_awarded() {
    let scores = Arc::new(MemoryScoreStore::new());
    let services = RoomServices {
        boards: Arc::new(MemoryBoardStore::new()),
        scores: scores.clone(),
        pacing: Arc::new(NoPacing),
    };
    let room = room_on(&SINGLE_CLEAR, "gwb", services).await;
    let guest = Identity::Anonymous(PlayerId::new("guest-1"));

    let outcome = room.handle_move(1, &guest, mv(0, 0, 0, 1)).await.unwrap();
    assert_eq!(outcome.score_delta, 30);
    assert!(!outcome.awarded);
    assert_eq!(outcome.total_score, None);
    assert_eq!(scores.get_score(&PlayerId::new("guest-1")).await.unwrap(), 0);
}

#[tokio::test]
async fn no_match_swap_answers_only_the_mover() {
    let room = room_on(&SINGLE_CLEAR, "", RoomServices::in_memory()).await;
    let before = room.board().await;

    let (mover_tx, mut mover_rx) = mpsc::unbounded_channel();
    let (viewer_tx, mut viewer_rx) = mpsc::unbounded_channel();
    room.subscribe(1, mover_tx).await;
    room.subscribe(2, viewer_tx).await;
    drain(&mut mover_rx);
    drain(&mut viewer_rx);

    let outcome = room.handle_move(1, &alice(), mv(3, 3, 4, 3)).await.unwrap();
    assert!(outcome.noop);
    assert_eq!(outcome.score_delta, 0);
    assert!(!outcome.awarded);

    let to_mover = drain(&mut mover_rx);
    assert_eq!(to_mover.len(), 1);
    assert_eq!(to_mover[0].seq, 0);
    assert_eq!(to_mover[0].player_id.as_deref(), Some("alice"));
    assert!(drain(&mut viewer_rx).is_empty());
    assert_eq!(room.board().await, before);
}

#[tokio::test]
async fn invalid_move_is_rejected_without_side_effects() {
    let room = room_on(&SINGLE_CLEAR, "", RoomServices::in_memory()).await;
    let before = room.board().await;
    let (tx, mut rx) = mpsc::unbounded_channel();
    room.subscribe(1, tx).await;
    drain(&mut rx);

    let err = room.handle_move(1, &alice(), mv(0, 0, 1, 1)).await.unwrap_err();
    assert!(matches!(
        err,
        RoomError::Engine(EngineError::InvalidMove(_))
    ));
    let err = room.handle_move(1, &alice(), mv(7, 7, 8, 7)).await.unwrap_err();
    assert!(matches!(
        err,
        RoomError::Engine(EngineError::InvalidMove(_))
    ));

    assert!(drain(&mut rx).is_empty());
    assert_eq!(room.board().await, before);
}

#[derive(Default)]
struct FlakyBoardStore {
    inner: MemoryBoardStore,
    failing: AtomicBool,
}

#[async_trait]
impl BoardStore for FlakyBoardStore {
    async fn load(&self, room: &RoomId) -> Result<Option<Grid>, StoreError> {
        self.inner.load(room).await
    }

    async fn save(&self, room: &RoomId, grid: &Grid) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Io(std::io::Error::new(
                ErrorKind::Other,
                "disk full",
            )));
        }
        self.inner.save(room, grid).await
    }
}

#[tokio::test]
async fn failed_save_is_retried_on_next_move() {
    let boards = Arc::new(FlakyBoardStore::default());
    let services = RoomServices {
        boards: boards.clone(),
        scores: Arc::new(MemoryScoreStore::new()),
        pacing: Arc::new(NoPacing),
    };
    let room = room_on(&SINGLE_CLEAR, "gwb", services).await;
    let (tx, mut rx) = mpsc::unbounded_channel();
    room.subscribe(1, tx).await;

    boards.failing.store(true, Ordering::SeqCst);
    let outcome = room.handle_move(1, &alice(), mv(0, 0, 0, 1)).await.unwrap();
    assert!(!outcome.persisted);
    // Viewers still see the move; memory is authoritative.
    assert_eq!(drain(&mut rx).last().unwrap().seq, 3);
    let after_move = room.board().await;
    assert_ne!(
        boards.load(&RoomId::default()).await.unwrap().unwrap(),
        after_move.serialize()
    );

    boards.failing.store(false, Ordering::SeqCst);
    // A swap in the untouched middle of the board matches nothing but still
    // flushes the pending save.
    let outcome = room.handle_move(1, &alice(), mv(3, 3, 4, 3)).await.unwrap();
    assert!(outcome.noop);
    assert!(outcome.persisted);
    assert_eq!(
        boards.load(&RoomId::default()).await.unwrap().unwrap(),
        after_move.serialize()
    );
}

#[tokio::test]
async fn reload_each_move_picks_up_external_board() {
    let boards = Arc::new(MemoryBoardStore::new());
    let services = RoomServices {
        boards: boards.clone(),
        scores: Arc::new(MemoryScoreStore::new()),
        pacing: Arc::new(NoPacing),
    };
    let room = Room::with_board(
        RoomId::default(),
        engine("gwbgw"),
        board_from(&SINGLE_CLEAR),
        services,
        RoomOptions {
            reload_each_move: true,
        },
    )
    .await
    .unwrap();

    boards
        .save(&RoomId::default(), &grid_from(&FIVE_RUN))
        .await
        .unwrap();

    let outcome = room.handle_move(1, &alice(), mv(2, 0, 2, 1)).await.unwrap();
    assert_eq!(outcome.score_delta, 100);
}

#[tokio::test]
async fn late_subscriber_receives_settled_board() {
    let room = room_on(&SINGLE_CLEAR, "gwb", RoomServices::in_memory()).await;
    room.handle_move(1, &alice(), mv(0, 0, 0, 1)).await.unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel();
    room.subscribe(5, tx).await;
    let initial = drain(&mut rx);
    assert_eq!(initial.len(), 1);
    assert!(initial[0].is_final);
    assert_eq!(initial[0].seq, 3);
    assert_eq!(
        gemswap::adapter::wire_to_grid(&initial[0].board),
        room.board().await.serialize()
    );
}

#[tokio::test]
async fn concurrent_moves_never_interleave() {
    let services = RoomServices {
        boards: Arc::new(MemoryBoardStore::new()),
        scores: Arc::new(MemoryScoreStore::new()),
        pacing: Arc::new(GeometricPacing::new(Duration::from_millis(5))),
    };
    let room = room_on(&SINGLE_CLEAR, "gwb", services).await;
    let (tx, mut rx) = mpsc::unbounded_channel();
    room.subscribe(9, tx).await;
    drain(&mut rx);

    let bob = Identity::Authenticated(PlayerId::new("bob"));
    let a = {
        let room = Arc::clone(&room);
        tokio::spawn(async move { room.handle_move(1, &alice(), mv(0, 0, 0, 1)).await })
    };
    let b = {
        let room = Arc::clone(&room);
        tokio::spawn(async move { room.handle_move(2, &bob, mv(6, 7, 7, 7)).await })
    };
    let _ = a.await.unwrap();
    let _ = b.await.unwrap();

    let frames = drain(&mut rx);
    // Room sequence numbers are gapless and each move's frames are contiguous.
    for (i, frame) in frames.iter().enumerate() {
        assert_eq!(frame.seq, i as u64 + 1);
    }
    let mut movers: Vec<&str> = frames
        .iter()
        .filter_map(|f| f.player_id.as_deref())
        .collect();
    movers.dedup();
    assert!(movers.len() <= 2, "frames interleaved: {:?}", movers);
    let finals = frames.iter().filter(|f| f.is_final).count();
    assert_eq!(finals, movers.len());

    let board = room.board().await;
    assert!(board.is_full());
    assert!(find_matches(&board).is_empty());
}

#[tokio::test]
async fn player_total_grows_only_on_matching_moves() {
    let scores = Arc::new(MemoryScoreStore::new());
    let services = RoomServices {
        boards: Arc::new(MemoryBoardStore::new()),
        scores: scores.clone(),
        pacing: Arc::new(NoPacing),
    };
    let room = Room::open(
        RoomId::new("busy"),
        CascadeEngine::new(EngineConfig::default(), GemRng::new(2024)),
        services,
        RoomOptions::default(),
    )
    .await
    .unwrap();

    let player = PlayerId::new("alice");
    let identity = Identity::Authenticated(player.clone());
    let mut last_total = 0;
    let mut scoring_moves = 0;

    // Every neighbour pair once, across and down, so both matching and
    // non-matching swaps occur.
    for y in 0..8 {
        for x in 0..8 {
            for (x2, y2) in [(x + 1, y), (x, y + 1)] {
                if x2 >= 8 || y2 >= 8 {
                    continue;
                }
                let outcome = room
                    .handle_move(1, &identity, mv(x, y, x2, y2))
                    .await
                    .unwrap();
                let total = scores.get_score(&player).await.unwrap();

                if !outcome.noop && outcome.score_delta > 0 {
                    scoring_moves += 1;
                    assert!(total > last_total, "matching move did not raise the total");
                    assert_eq!(total, last_total + u64::from(outcome.score_delta));
                    assert_eq!(outcome.total_score, Some(total));
                } else {
                    assert_eq!(total, last_total, "non-matching move changed the total");
                    assert!(!outcome.awarded);
                }
                last_total = total;
            }
        }
    }
    assert!(scoring_moves > 0);
}

#[tokio::test]
async fn blank_stored_board_is_replaced_on_open() {
    let boards = Arc::new(MemoryBoardStore::new());
    boards.save(&RoomId::default(), &Vec::new()).await.unwrap();
    let services = RoomServices {
        boards: boards.clone(),
        scores: Arc::new(MemoryScoreStore::new()),
        pacing: Arc::new(NoPacing),
    };

    let room = Room::open(
        RoomId::default(),
        CascadeEngine::new(EngineConfig::default(), GemRng::new(8)),
        services,
        RoomOptions::default(),
    )
    .await
    .unwrap();

    let board = room.board().await;
    assert_eq!((board.rows(), board.cols()), (8, 8));
    assert!(board.is_full());
    assert!(find_matches(&board).is_empty());
    assert_eq!(
        boards.load(&RoomId::default()).await.unwrap(),
        Some(board.serialize())
    );
}

#[tokio::test]
async fn opening_a_stored_board_leaves_refills_untouched() {
    let boards = Arc::new(MemoryBoardStore::new());
    boards
        .save(&RoomId::default(), &grid_from(&SINGLE_CLEAR))
        .await
        .unwrap();
    let services = RoomServices {
        boards,
        scores: Arc::new(MemoryScoreStore::new()),
        pacing: Arc::new(NoPacing),
    };

    let room = Room::open(RoomId::default(), engine("gwb"), services, RoomOptions::default())
        .await
        .unwrap();
    assert_eq!(room.board().await, board_from(&SINGLE_CLEAR));

    // The recorded refills are still queued for the first move.
    room.handle_move(1, &alice(), mv(0, 0, 0, 1)).await.unwrap();
    assert_eq!(
        room.board().await,
        board_from(&[
            "gwbypowr", "bypowrbg", "powrbgyp", "wrbgypow", "bgypowrb", "ypowrbgy", "owrbgypo",
            "rbgyppwp",
        ])
    );
}

#[tokio::test]
async fn reload_rewrites_board_missing_from_store() {
    let boards = Arc::new(MemoryBoardStore::new());
    let services = RoomServices {
        boards: boards.clone(),
        scores: Arc::new(MemoryScoreStore::new()),
        pacing: Arc::new(NoPacing),
    };
    let room = Room::with_board(
        RoomId::default(),
        engine(""),
        board_from(&SINGLE_CLEAR),
        services,
        RoomOptions {
            reload_each_move: true,
        },
    )
    .await
    .unwrap();

    boards.save(&RoomId::default(), &Vec::new()).await.unwrap();
    let outcome = room.handle_move(1, &alice(), mv(3, 3, 4, 3)).await.unwrap();
    assert!(outcome.noop);
    assert!(outcome.persisted);
    assert_eq!(
        boards.load(&RoomId::default()).await.unwrap(),
        Some(grid_from(&SINGLE_CLEAR))
    );
}

#[tokio::test]
async fn unsubscribed_connection_stops_receiving() {
    let room = room_on(&SINGLE_CLEAR, "gwb", RoomServices::in_memory()).await;
    let (tx, mut rx) = mpsc::unbounded_channel();
    room.subscribe(1, tx).await;
    drain(&mut rx);

    assert!(room.unsubscribe(1).await);
    assert_eq!(room.subscriber_count().await, 0);

    // The mover's connection is gone but the cascade still completes.
    let outcome = room.handle_move(1, &alice(), mv(0, 0, 0, 1)).await.unwrap();
    assert_eq!(outcome.score_delta, 30);
    assert!(drain(&mut rx).is_empty());
}
