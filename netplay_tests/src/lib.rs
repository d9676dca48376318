// Test-only game host for session-layer integration tests.
//
// `RecordingHost` is a real `GameHost` whose engine replays a scripted game:
// it plays the script's moves for its own color and solicits the peer's
// moves through the real `RemotePlayer` surrogate, recording everything it
// sees. Both ends of a test run this host over the real session code paths;
// the only test-specific part is the script.
//
// See also: `tests/full_pipeline.rs` for the scenarios.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use log::debug;
use reversi_netplay::{Admission, GameEvent, GameHost, GameUpdates, RemotePlayer, SessionEvent};
use reversi_protocol::{BoardMove, GameRequest, Winner};

/// Initialize test logging. Safe to call from every test.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// What the scripted engine does once the shared script is exhausted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Finale {
    /// Report game over to the peer (this side "finishes first").
    AnnounceOver,
    /// Solicit one more remote move and expect the peer's game-over instead.
    AwaitOver,
}

/// A scripted game shared by both ends: the full ply sequence in order,
/// colors embedded in the moves. Each end plays its own color's plies and
/// receives the other's.
#[derive(Clone, Debug)]
pub struct GameScript {
    pub plies: Vec<BoardMove>,
    pub finale: Finale,
}

/// A real `GameHost` that records everything and replays a script.
pub struct RecordingHost {
    admission: Admission,
    winner: Winner,
    script: Mutex<Option<GameScript>>,
    pub received_moves: Arc<Mutex<Vec<BoardMove>>>,
    pub events: Mutex<Vec<SessionEvent>>,
    pub cancelled: AtomicBool,
    pub stopped: AtomicBool,
}

impl RecordingHost {
    pub fn new(admission: Admission, winner: Winner, script: GameScript) -> Arc<Self> {
        Arc::new(RecordingHost {
            admission,
            winner,
            script: Mutex::new(Some(script)),
            received_moves: Arc::new(Mutex::new(Vec::new())),
            events: Mutex::new(Vec::new()),
            cancelled: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
        })
    }

    /// A host that never gets to play (refusal and cancellation tests).
    pub fn refusing(admission: Admission) -> Arc<Self> {
        Self::new(
            admission,
            Winner::Draw,
            GameScript {
                plies: Vec::new(),
                finale: Finale::AwaitOver,
            },
        )
    }

    pub fn was_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn was_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    pub fn saw_event(&self, event: &SessionEvent) -> bool {
        self.events.lock().unwrap().contains(event)
    }
}

impl GameHost for RecordingHost {
    fn admit(&self, _request: &GameRequest) -> Admission {
        self.admission
    }

    fn is_legal(&self, _mv: &BoardMove) -> bool {
        true
    }

    fn winner(&self) -> Winner {
        self.winner
    }

    fn start_remote_game(
        &self,
        request: GameRequest,
        remote: Arc<RemotePlayer>,
        updates: GameUpdates,
    ) {
        let script = self
            .script
            .lock()
            .unwrap()
            .take()
            .expect("start_remote_game called twice");
        let received = self.received_moves.clone();
        let my_color = request.local_color;

        thread::spawn(move || {
            updates.game_update(GameEvent::GameRunning);
            for mv in script.plies {
                if mv.color == my_color {
                    debug!("engine plays {mv:?}");
                    if mv.is_pass() {
                        updates.game_update(GameEvent::Passed(mv));
                    } else {
                        updates.game_update(GameEvent::MoveMade(mv));
                    }
                } else {
                    match remote.next_move() {
                        Some(got) => {
                            debug!("engine received {got:?}");
                            received.lock().unwrap().push(got);
                        }
                        None => {
                            // Conversation ended mid-script.
                            updates.game_update(GameEvent::GameFinished);
                            return;
                        }
                    }
                }
            }
            match script.finale {
                Finale::AnnounceOver => updates.game_update(GameEvent::GameOver {
                    unsent_local_move: None,
                }),
                Finale::AwaitOver => {
                    // The peer ends the game; the solicitation comes back
                    // empty once its GAME_OVER arrives.
                    let _ = remote.next_move();
                    updates.game_update(GameEvent::GameFinished);
                }
            }
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
