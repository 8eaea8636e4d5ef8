use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use gemswap::adapter::server::{run_server_with, ServerConfig};
use gemswap::adapter::{BoardStore, MemoryBoardStore, MemoryScoreStore, NoPacing, RoomServices};
use gemswap::types::{Gem, Grid, RoomId};

const SINGLE_CLEAR: [&str; 8] = [
    "brrypowr", "rypowrbg", "powrbgyp", "wrbgypow", "bgypowrb", "ypowrbgy", "owrbgypo",
    "rbgyppwp",
];

fn grid_from(rows: &[&str]) -> Grid {
    rows.iter()
        .map(|row| {
            row.chars()
                .map(|c| Gem::ALL.into_iter().find(|g| g.as_str().starts_with(c)))
                .collect()
        })
        .collect()
}

struct Client {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl Client {
    async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.expect("connect failed");
        let (read_half, writer) = stream.into_split();
        Self {
            lines: BufReader::new(read_half).lines(),
            writer,
        }
    }

    async fn send(&mut self, line: &str) {
        self.writer.write_all(line.as_bytes()).await.unwrap();
        self.writer.write_all(b"\n").await.unwrap();
        self.writer.flush().await.unwrap();
    }

    async fn recv(&mut self) -> serde_json::Value {
        let line = tokio::time::timeout(Duration::from_secs(2), self.lines.next_line())
            .await
            .expect("timed out waiting for server")
            .unwrap()
            .expect("connection closed");
        serde_json::from_str(&line).unwrap()
    }

    /// Read snapshots until the final frame of a move
    async fn recv_move(&mut self) -> Vec<serde_json::Value> {
        let mut frames = Vec::new();
        loop {
            let v = self.recv().await;
            assert_eq!(v["type"], "snapshot", "unexpected message {}", v);
            let done = v["final"] == true;
            frames.push(v);
            if done {
                return frames;
            }
        }
    }
}

async fn start(services: RoomServices) -> (SocketAddr, JoinHandle<()>) {
    let config = ServerConfig {
        port: 0,
        tick: None,
        seed: Some(42),
        ..ServerConfig::default()
    };
    let (ready_tx, ready_rx) = oneshot::channel();
    let handle = tokio::spawn(async move {
        let _ = run_server_with(config, services, Some(ready_tx)).await;
    });
    let addr = tokio::time::timeout(Duration::from_secs(2), ready_rx)
        .await
        .expect("server did not signal ready")
        .expect("ready channel dropped");
    (addr, handle)
}

async fn start_on_known_board() -> (SocketAddr, JoinHandle<()>) {
    let boards = Arc::new(MemoryBoardStore::new());
    boards
        .save(&RoomId::default(), &grid_from(&SINGLE_CLEAR))
        .await
        .unwrap();
    start(RoomServices {
        boards,
        scores: Arc::new(MemoryScoreStore::new()),
        pacing: Arc::new(NoPacing),
    })
    .await
}

#[tokio::test]
async fn join_gets_welcome_then_board() {
    let (addr, server) = start_on_known_board().await;
    let mut client = Client::connect(addr).await;

    client
        .send(r#"{"type":"join","seq":1,"room":"game_room","player":"alice"}"#)
        .await;

    let welcome = client.recv().await;
    assert_eq!(welcome["type"], "welcome");
    assert_eq!(welcome["seq"], 1);
    assert_eq!(welcome["room"], "game_room");
    assert_eq!(welcome["player_id"], "alice");
    assert_eq!(welcome["authenticated"], true);
    assert_eq!(welcome["protocol_version"], "1.0.0");

    let snapshot = client.recv().await;
    assert_eq!(snapshot["type"], "snapshot");
    assert_eq!(snapshot["seq"], 0);
    assert_eq!(snapshot["final"], true);
    assert_eq!(snapshot["phase"], "idle");
    assert_eq!(snapshot["board"][0][0], "blue");
    assert_eq!(snapshot["board"][0][1], "red");
    assert_eq!(snapshot["board"].as_array().unwrap().len(), 8);

    server.abort();
}

#[tokio::test]
async fn move_is_streamed_to_mover_and_viewer() {
    let (addr, server) = start_on_known_board().await;
    let mut alice = Client::connect(addr).await;
    let mut viewer = Client::connect(addr).await;

    alice.send(r#"{"type":"join","seq":1,"player":"alice"}"#).await;
    assert_eq!(alice.recv().await["type"], "welcome");
    assert_eq!(alice.recv().await["type"], "snapshot");

    viewer.send(r#"{"type":"join","seq":1}"#).await;
    let welcome = viewer.recv().await;
    assert_eq!(welcome["authenticated"], false);
    assert!(welcome["player_id"].as_str().unwrap().starts_with("guest-"));
    assert_eq!(viewer.recv().await["type"], "snapshot");

    // Top-left gem swapped with the one below it completes the red run.
    alice
        .send(r#"{"type":"move","seq":2,"x1":0,"y1":0,"x2":0,"y2":1}"#)
        .await;

    let seen_by_alice = alice.recv_move().await;
    let seen_by_viewer = viewer.recv_move().await;
    assert_eq!(seen_by_alice, seen_by_viewer);

    assert_eq!(seen_by_viewer[0]["phase"], "swapped");
    assert_eq!(seen_by_viewer[0]["seq"], 1);
    assert_eq!(seen_by_viewer[1]["phase"], "clearing");
    for (i, frame) in seen_by_viewer.iter().enumerate() {
        assert_eq!(frame["seq"], i as u64 + 1);
        assert_eq!(frame["player_id"], "alice");
    }

    let last = seen_by_viewer.last().unwrap();
    let score = last["score"].as_u64().unwrap();
    assert!(score >= 30);
    assert_eq!(last["total"], score);

    server.abort();
}

#[tokio::test]
async fn bare_coordinates_are_a_move() {
    let (addr, server) = start_on_known_board().await;
    let mut client = Client::connect(addr).await;

    client.send(r#"{"type":"join","player":"bob"}"#).await;
    client.recv().await;
    client.recv().await;

    client.send(r#"{"x1":0,"y1":0,"x2":0,"y2":1}"#).await;
    let frames = client.recv_move().await;
    assert_eq!(frames[0]["phase"], "swapped");
    assert_eq!(frames.last().unwrap()["player_id"], "bob");

    server.abort();
}

#[tokio::test]
async fn move_before_join_requires_handshake() {
    let (addr, server) = start(RoomServices::in_memory()).await;
    let mut client = Client::connect(addr).await;

    client
        .send(r#"{"type":"move","seq":5,"x1":0,"y1":0,"x2":1,"y2":0}"#)
        .await;
    let err = client.recv().await;
    assert_eq!(err["type"], "error");
    assert_eq!(err["seq"], 5);
    assert_eq!(err["code"], "handshake_required");

    server.abort();
}

#[tokio::test]
async fn rejected_input_gets_error_codes() {
    let (addr, server) = start_on_known_board().await;
    let mut client = Client::connect(addr).await;

    client.send(r#"{"type":"join","seq":1,"player":"carol"}"#).await;
    client.recv().await;
    client.recv().await;

    client.send(r#"{"type":"dance","seq":2}"#).await;
    let err = client.recv().await;
    assert_eq!(err["code"], "invalid_message");
    assert_eq!(err["seq"], 2);

    client.send("this is not json").await;
    assert_eq!(client.recv().await["code"], "invalid_message");

    client
        .send(r#"{"type":"move","seq":3,"x1":0,"y1":0,"x2":1,"y2":1}"#)
        .await;
    let err = client.recv().await;
    assert_eq!(err["code"], "invalid_move");
    assert_eq!(err["seq"], 3);

    client
        .send(r#"{"type":"move","seq":4,"x1":-1,"y1":0,"x2":0,"y2":0}"#)
        .await;
    assert_eq!(client.recv().await["code"], "invalid_move");

    client
        .send(r#"{"type":"move","seq":5,"x1":7,"y1":7,"x2":8,"y2":7}"#)
        .await;
    assert_eq!(client.recv().await["code"], "invalid_move");

    // Still connected and usable.
    client
        .send(r#"{"type":"move","seq":6,"x1":3,"y1":3,"x2":4,"y2":3}"#)
        .await;
    let reverted = client.recv().await;
    assert_eq!(reverted["type"], "snapshot");
    assert_eq!(reverted["seq"], 0);
    assert_eq!(reverted["player_id"], "carol");

    server.abort();
}

#[tokio::test]
async fn rooms_are_isolated() {
    let (addr, server) = start_on_known_board().await;
    let mut a = Client::connect(addr).await;
    let mut b = Client::connect(addr).await;

    a.send(r#"{"type":"join","player":"alice"}"#).await;
    a.recv().await;
    a.recv().await;

    b.send(r#"{"type":"join","room":"other","player":"bob"}"#).await;
    assert_eq!(b.recv().await["room"], "other");
    assert_eq!(b.recv().await["room"], "other");

    a.send(r#"{"type":"move","x1":0,"y1":0,"x2":0,"y2":1}"#).await;
    let frames = a.recv_move().await;
    assert!(frames.iter().all(|f| f["room"] == "game_room"));

    // Nothing from game_room reaches the other room's subscriber.
    let quiet = tokio::time::timeout(Duration::from_millis(200), b.lines.next_line()).await;
    assert!(quiet.is_err());

    server.abort();
}
