// Collaborator seam between the session layer and the game engine.
//
// The session layer knows nothing about boards, legality rules, or UIs. It
// consumes them through `GameHost`, implemented by the application, and it
// exposes exactly two objects back: `GameUpdates` (the engine's way to
// report lifecycle events into a live connection) and `RemotePlayer` (the
// local surrogate standing in for the remote participant). Context objects
// are passed into constructors explicitly; there are no process-wide
// singletons.

use std::net::SocketAddr;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};

use reversi_protocol::{BoardMove, Color, GameRequest, Winner};

use crate::link::Link;
use crate::mailbox::{ActionPoster, GameAction};

/// Admission ruling for an inbound game request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Admission {
    Accept,
    Deny,
    Busy,
}

/// Session lifecycle notifications delivered to the application.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    /// The listening endpoint is up at this address.
    ServiceUp(SocketAddr),
    /// The listening endpoint has been released.
    ServiceDown,
    /// A transport connection was admitted.
    PeerConnected,
    /// The admitted connection is gone; the admission slot is free again.
    PeerDisconnected,
    /// The peer reported the game finished, with its view of the outcome.
    RemoteGameOver(Winner),
}

/// Lifecycle events the game engine reports into a live connection.
///
/// Events needing a wire round trip (`MoveMade`, `Passed`, `GameRunning`,
/// `GameOver`) block the reporting thread until the connection thread has
/// completed the exchange; `GameStopped` and `GameFinished` never block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GameEvent {
    /// The local player placed a disc.
    MoveMade(BoardMove),
    /// The local player passed.
    Passed(BoardMove),
    /// The local game is up and accepting play.
    GameRunning,
    /// The game finished locally. Carries the final local move if it has
    /// not been reported yet, so the peer sees it before GAME_OVER.
    GameOver {
        unsent_local_move: Option<BoardMove>,
    },
    /// Administrative stop (user cancelled, shutdown). Terminal.
    GameStopped,
    /// The game wound down normally on this side.
    GameFinished,
}

/// What the application/game-engine layer provides to the session layer.
pub trait GameHost: Send + Sync {
    /// Admission ruling for an inbound GAME_REQUEST.
    fn admit(&self, request: &GameRequest) -> Admission;

    /// Is this candidate remote move legal on the current board?
    fn is_legal(&self, mv: &BoardMove) -> bool;

    /// Winner of the active game, consulted when relaying GAME_OVER.
    fn winner(&self) -> Winner;

    /// An agreed game is starting. `request` is the agreement seen from
    /// this side (`local_color` is ours); `remote` stands in for the peer.
    /// The engine keeps `updates` to report lifecycle events back.
    fn start_remote_game(
        &self,
        request: GameRequest,
        remote: Arc<RemotePlayer>,
        updates: GameUpdates,
    );

    /// Stop the local game: the conversation ended while it was active.
    fn stop_game(&self);

    /// A request pending agreement was cancelled before the game started.
    fn request_cancelled(&self);

    /// Service/peer lifecycle notification.
    fn session_event(&self, event: SessionEvent);
}

/// Engine-side handle into a live connection.
#[derive(Clone, Debug)]
pub struct GameUpdates {
    poster: ActionPoster,
    link: Link,
}

impl GameUpdates {
    pub(crate) fn new(poster: ActionPoster, link: Link) -> Self {
        GameUpdates { poster, link }
    }

    /// Report a lifecycle event; see [`GameEvent`] for blocking behavior.
    pub fn game_update(&self, event: GameEvent) {
        let action = match event {
            GameEvent::MoveMade(mv) => GameAction::LocalMove(mv),
            GameEvent::Passed(mv) => GameAction::PassMove(mv),
            GameEvent::GameRunning => GameAction::GameRunning,
            GameEvent::GameOver { unsent_local_move } => GameAction::GameOver(unsent_local_move),
            GameEvent::GameStopped => GameAction::GameStopped,
            GameEvent::GameFinished => GameAction::GameFinished,
        };
        self.poster.post(action);
    }

    /// Ask the conversation to wind down without posting a game event.
    pub fn stop(&self) {
        self.link.request_end();
    }

    /// False once the conversation has ended or failed.
    pub fn is_live(&self) -> bool {
        self.link.continue_conversation()
    }
}

/// Local surrogate for the remote participant. The engine asks it for the
/// next move; the connection thread fetches one from the peer, validates
/// it, and delivers it here.
pub struct RemotePlayer {
    color: Color,
    poster: ActionPoster,
    delivered: Mutex<Receiver<BoardMove>>,
    deliver_tx: Sender<BoardMove>,
}

impl RemotePlayer {
    pub(crate) fn new(color: Color, poster: ActionPoster) -> Self {
        let (deliver_tx, delivered) = mpsc::channel();
        RemotePlayer {
            color,
            poster,
            delivered: Mutex::new(delivered),
            deliver_tx,
        }
    }

    /// The surrogate's color — the remote party's side of the board.
    pub fn color(&self) -> Color {
        self.color
    }

    /// Ask the peer for its next move. Blocks the calling engine thread
    /// until a validated move arrives. `None` means the conversation ended
    /// (or the peer reported game over) before a move was delivered.
    pub fn next_move(&self) -> Option<BoardMove> {
        self.poster.post(GameAction::GetMove);
        self.delivered.lock().unwrap().try_recv().ok()
    }

    /// Called by the connection thread, before it finishes the GetMove
    /// ticket, so the move is already waiting when `next_move` unblocks.
    pub(crate) fn deliver(&self, mv: BoardMove) {
        let _ = self.deliver_tx.send(mv);
    }
}
