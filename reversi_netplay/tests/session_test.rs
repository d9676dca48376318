// Integration test for the listening side of the session layer.
//
// Starts a real session service on localhost and drives it from a scripted
// raw TCP peer speaking protocol lines directly — no client-side session
// code involved. Exercises the handshake, admission verdicts, move
// exchange in both directions, game-over reporting, and teardown.

use std::io::{BufReader, BufWriter};
use std::net::{SocketAddr, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use reversi_netplay::server::{ServerConfig, start_server};
use reversi_netplay::{
    Admission, GameEvent, GameHost, GameUpdates, RemotePlayer, SessionEvent, SessionHandle,
};
use reversi_protocol::{
    BoardMove, Color, Coord, GameRequest, PlayerKind, Winner, read_line, write_line,
};

/// Scripted raw peer: a plain line-speaking TCP socket.
struct RawPeer {
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,
}

impl RawPeer {
    fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).unwrap();
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        let reader = BufReader::new(stream.try_clone().unwrap());
        RawPeer {
            reader,
            writer: BufWriter::new(stream),
        }
    }

    fn send(&mut self, line: &str) {
        write_line(&mut self.writer, line).unwrap();
    }

    /// Next line, or None on orderly close.
    fn recv(&mut self) -> Option<String> {
        read_line(&mut self.reader).unwrap()
    }

    fn expect(&mut self, want: &str) {
        let got = self.recv();
        assert_eq!(got.as_deref(), Some(want));
    }
}

/// Host whose engine plays one scripted exchange: a local move, then one
/// remote move, then game over.
struct ScriptHost {
    admission: Admission,
    events: Mutex<Vec<SessionEvent>>,
    remote_moves: Arc<Mutex<Vec<BoardMove>>>,
    cancelled: AtomicBool,
    stopped: AtomicBool,
}

impl ScriptHost {
    fn new(admission: Admission) -> Self {
        ScriptHost {
            admission,
            events: Mutex::new(Vec::new()),
            remote_moves: Arc::new(Mutex::new(Vec::new())),
            cancelled: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
        }
    }
}

impl GameHost for ScriptHost {
    fn admit(&self, _request: &GameRequest) -> Admission {
        self.admission
    }

    fn is_legal(&self, mv: &BoardMove) -> bool {
        // Scripted legality: anything on row 1 is illegal.
        mv.coord.is_none_or(|c| c.row != 1)
    }

    fn winner(&self) -> Winner {
        Winner::Black
    }

    fn start_remote_game(
        &self,
        request: GameRequest,
        remote: Arc<RemotePlayer>,
        updates: GameUpdates,
    ) {
        let moves = self.remote_moves.clone();
        let local_color = request.local_color;
        thread::spawn(move || {
            updates.game_update(GameEvent::GameRunning);
            updates.game_update(GameEvent::MoveMade(BoardMove::placement(
                local_color,
                Coord::new(4, 3).unwrap(),
            )));
            if let Some(mv) = remote.next_move() {
                moves.lock().unwrap().push(mv);
            }
            updates.game_update(GameEvent::GameOver {
                unsent_local_move: None,
            });
        });
    }

    fn stop_game(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    fn request_cancelled(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    fn session_event(&self, event: SessionEvent) {
        self.events.lock().unwrap().push(event);
    }
}

fn start(host: Arc<ScriptHost>) -> (SessionHandle, SocketAddr) {
    let config = ServerConfig {
        port: 0,
        hello_version: "ReversiNetplay test".to_string(),
    };
    start_server(config, host).unwrap()
}

fn request_line() -> String {
    "GAME_REQUEST 8 0 15000 15000 1 HUMAN \"Raw\"".to_string()
}

#[test]
fn handshake_and_scripted_game() {
    let host = Arc::new(ScriptHost::new(Admission::Accept));
    let (handle, addr) = start(host.clone());

    let mut peer = RawPeer::connect(addr);
    peer.expect("HELLO ReversiNetplay test");

    // Propose as Black; the service mirrors the agreement as White.
    peer.send(&request_line());
    peer.expect("NEW_GAME 8 0 15000 15000 -1 HUMAN \"Raw\"");
    peer.send("NEW_GAME_ACCEPTED");
    peer.expect("START_GAME");
    peer.send("START_GAME_CONFIRM");

    // Engine's local move comes out as a White MOVE; confirm it.
    peer.expect("MOVE -1(4,3)");
    peer.send("MOVE_CONFIRM");

    // Engine then solicits our move.
    peer.expect("GET_MOVE");
    peer.send("MOVE 1(5,3)");
    peer.expect("MOVE_CONFIRM");

    // Engine finishes; the service reports its outcome.
    peer.expect("GAME_OVER 1:0");
    peer.send("GAME_OVER_CONFIRM");

    // Conversation is over; the socket closes.
    assert_eq!(peer.recv(), None);

    handle.stop();
    assert!(host.stopped.load(Ordering::SeqCst));
    let moves = host.remote_moves.lock().unwrap().clone();
    assert_eq!(
        moves,
        vec![BoardMove::placement(Color::Black, Coord::new(5, 3).unwrap())]
    );
    let events = host.events.lock().unwrap().clone();
    assert!(events.contains(&SessionEvent::PeerConnected));
    assert!(events.contains(&SessionEvent::PeerDisconnected));
}

#[test]
fn illegal_remote_move_is_rejected_then_retried() {
    let host = Arc::new(ScriptHost::new(Admission::Accept));
    let (handle, addr) = start(host.clone());

    let mut peer = RawPeer::connect(addr);
    peer.expect("HELLO ReversiNetplay test");
    peer.send(&request_line());
    peer.recv().unwrap(); // NEW_GAME
    peer.send("NEW_GAME_ACCEPTED");
    peer.expect("START_GAME");
    peer.send("START_GAME_CONFIRM");

    peer.expect("MOVE -1(4,3)");
    peer.send("MOVE_CONFIRM");

    peer.expect("GET_MOVE");
    // Row 1 is illegal per the scripted host.
    peer.send("MOVE 1(5,1)");
    peer.expect("ILLEGAL_MOVE");
    // The solicitation stays open; a legal retry is confirmed.
    peer.send("MOVE 1(5,3)");
    peer.expect("MOVE_CONFIRM");

    peer.expect("GAME_OVER 1:0");
    peer.send("GAME_OVER_CONFIRM");
    assert_eq!(peer.recv(), None);

    handle.stop();
}

#[test]
fn denied_request_is_refused() {
    let host = Arc::new(ScriptHost::new(Admission::Deny));
    let (handle, addr) = start(host.clone());

    let mut peer = RawPeer::connect(addr);
    peer.expect("HELLO ReversiNetplay test");
    peer.send(&request_line());
    peer.expect("REFUSED_DENIED");
    assert_eq!(peer.recv(), None);

    handle.stop();
    assert!(!host.stopped.load(Ordering::SeqCst));
}

#[test]
fn busy_host_refuses_request() {
    let host = Arc::new(ScriptHost::new(Admission::Busy));
    let (handle, addr) = start(host.clone());

    let mut peer = RawPeer::connect(addr);
    peer.expect("HELLO ReversiNetplay test");
    peer.send(&request_line());
    peer.expect("REFUSED_BUSY");
    assert_eq!(peer.recv(), None);

    handle.stop();
}

#[test]
fn garbage_during_handshake_gets_unknown_cmd_and_hangup() {
    let host = Arc::new(ScriptHost::new(Admission::Accept));
    let (handle, addr) = start(host.clone());

    let mut peer = RawPeer::connect(addr);
    peer.expect("HELLO ReversiNetplay test");
    peer.send("SUMMON DRAGON");
    peer.expect("UNKNOWN_CMD");
    assert_eq!(peer.recv(), None);

    handle.stop();
}

#[test]
fn end_before_request_is_confirmed() {
    let host = Arc::new(ScriptHost::new(Admission::Accept));
    let (handle, addr) = start(host.clone());

    let mut peer = RawPeer::connect(addr);
    peer.expect("HELLO ReversiNetplay test");
    peer.send("END");
    peer.expect("END_CONFIRM");
    assert_eq!(peer.recv(), None);

    handle.stop();
}

#[test]
fn backing_out_after_agreement_cancels_the_request() {
    let host = Arc::new(ScriptHost::new(Admission::Accept));
    let (handle, addr) = start(host.clone());

    let mut peer = RawPeer::connect(addr);
    peer.expect("HELLO ReversiNetplay test");
    peer.send(&request_line());
    peer.recv().unwrap(); // NEW_GAME
    peer.send("END");
    peer.expect("END_CONFIRM");
    assert_eq!(peer.recv(), None);

    handle.stop();
    assert!(host.cancelled.load(Ordering::SeqCst));
    assert!(!host.stopped.load(Ordering::SeqCst));
}

#[test]
fn noop_keepalives_are_ignored() {
    let host = Arc::new(ScriptHost::new(Admission::Accept));
    let (handle, addr) = start(host.clone());

    let mut peer = RawPeer::connect(addr);
    peer.expect("HELLO ReversiNetplay test");
    peer.send("NOOP");
    peer.send("NOOP");
    peer.send(&request_line());
    let line = peer.recv().unwrap();
    assert!(line.starts_with("NEW_GAME "), "got {line:?}");
    peer.send("END");
    peer.expect("END_CONFIRM");

    handle.stop();
}

#[test]
fn validates_request_roundtrip_fields() {
    // The request the raw peer sends and the mirrored agreement differ in
    // exactly one field.
    let request = GameRequest {
        board_size: 8,
        timed: false,
        black_ms: 15_000,
        white_ms: 15_000,
        local_color: Color::Black,
        player_kind: PlayerKind::Human,
        player_name: "Raw".to_string(),
    };
    let mirrored = request.mirrored();
    assert_eq!(mirrored.local_color, Color::White);
    assert_eq!(mirrored.board_size, request.board_size);
}
