// Engine ↔ connection synchronization.
//
// The game action mailbox couples the local game engine thread to the
// network conversation thread. It is what makes an asynchronous wire
// exchange look synchronous to the engine: the engine posts a lifecycle
// action and, for actions that need a network round trip, blocks until the
// connection thread reports the exchange complete.
//
// Implementation: a bounded capacity-1 channel carrying `ActionTicket`
// envelopes. The empty slot *is* the "no action pending" state, so the
// invariant "the previous action is cleared before the next one is set"
// holds structurally rather than by convention. The acknowledgement travels
// back on a per-ticket rendezvous channel; dropping an unfinished ticket
// also releases the poster, so a dying connection thread can never leave
// the engine blocked.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TryRecvError, TrySendError};
use std::time::Duration;

use log::debug;
use reversi_protocol::BoardMove;

/// One pending lifecycle action. At most one is live per connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GameAction {
    /// The local game has started and is accepting play.
    GameRunning,
    /// The local player placed a disc; relay it and await confirmation.
    LocalMove(BoardMove),
    /// The local player passed.
    PassMove(BoardMove),
    /// The surrogate needs the remote party's next move.
    GetMove,
    /// The game finished locally. Carries the final local move if it has
    /// not crossed the wire yet, so the peer sees it before GAME_OVER.
    GameOver(Option<BoardMove>),
    /// Administrative stop. Terminal: the mailbox latches closed.
    GameStopped,
    /// The game wound down normally on this side; no wire exchange needed.
    GameFinished,
}

impl GameAction {
    /// Round-trip actions hold the posting thread until the connection
    /// thread has completed the corresponding wire exchange.
    fn blocks_poster(self) -> bool {
        !matches!(self, GameAction::GameStopped | GameAction::GameFinished)
    }
}

/// A drained action plus the signal that releases its poster.
pub struct ActionTicket {
    pub action: GameAction,
    done: Option<SyncSender<()>>,
}

impl ActionTicket {
    /// Release the engine thread blocked in [`ActionPoster::post`].
    /// Consuming the ticket makes the release happen at most once.
    pub fn finish(mut self) {
        if let Some(done) = self.done.take() {
            let _ = done.send(());
        }
    }
}

/// Engine-side half of the mailbox.
#[derive(Clone, Debug)]
pub struct ActionPoster {
    tx: SyncSender<ActionTicket>,
    stopped: Arc<AtomicBool>,
}

impl ActionPoster {
    /// Post a lifecycle action. Round-trip actions block the caller until
    /// the connection thread calls [`ActionTicket::finish`] (or dies, which
    /// releases the caller too). `GameStopped` and `GameFinished` return
    /// immediately. Posting after `GameStopped`, or once the connection
    /// side is gone, is a no-op.
    pub fn post(&self, action: GameAction) {
        if self.stopped.load(Ordering::SeqCst) {
            debug!("dropping {action:?}: mailbox already stopped");
            return;
        }
        if action == GameAction::GameStopped {
            self.stopped.store(true, Ordering::SeqCst);
        }

        if action.blocks_poster() {
            let (done_tx, done_rx) = mpsc::sync_channel(1);
            let ticket = ActionTicket {
                action,
                done: Some(done_tx),
            };
            if self.tx.send(ticket).is_err() {
                return;
            }
            // Ok: finished normally. Err: the connection thread dropped the
            // ticket unfinished. Either way the exchange is over.
            let _ = done_rx.recv();
        } else {
            // Terminal actions must not block. If the slot is occupied the
            // ticket is dropped; a dropped GameStopped is not lost, because
            // the consumer also observes the stop latch (see ActionSlot).
            let ticket = ActionTicket { action, done: None };
            if let Err(TrySendError::Full(_)) = self.tx.try_send(ticket) {
                debug!("dropping {action:?}: mailbox slot occupied");
            }
        }
    }

    /// True once `GameStopped` has been posted.
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

/// Outcome of one bounded wait on the connection side.
pub enum Wait {
    Action(ActionTicket),
    Timeout,
    /// The engine side dropped its poster; no more actions will come.
    EngineGone,
}

/// Connection-side half of the mailbox.
///
/// Shares the stop latch with the posters: a `GameStopped` that could not
/// enter the occupied slot is re-synthesized here once the slot drains, so
/// the connection always sees the stop exactly once.
pub struct ActionSlot {
    rx: Receiver<ActionTicket>,
    stopped: Arc<AtomicBool>,
    stop_delivered: AtomicBool,
}

impl ActionSlot {
    /// Bounded wait for the next action, so the caller can re-check its
    /// continuation guard between polls.
    pub fn next(&self, timeout: Duration) -> Wait {
        match self.rx.try_recv() {
            Ok(ticket) => return self.deliver(ticket),
            Err(TryRecvError::Empty) => {
                if let Some(stop) = self.pending_stop() {
                    return stop;
                }
            }
            Err(TryRecvError::Disconnected) => {
                return self.pending_stop().unwrap_or(Wait::EngineGone);
            }
        }
        match self.rx.recv_timeout(timeout) {
            Ok(ticket) => self.deliver(ticket),
            Err(RecvTimeoutError::Timeout) => Wait::Timeout,
            Err(RecvTimeoutError::Disconnected) => {
                self.pending_stop().unwrap_or(Wait::EngineGone)
            }
        }
    }

    fn deliver(&self, ticket: ActionTicket) -> Wait {
        if ticket.action == GameAction::GameStopped {
            self.stop_delivered.store(true, Ordering::SeqCst);
        }
        Wait::Action(ticket)
    }

    /// A latched stop whose ticket never made it into the slot, delivered
    /// at most once.
    fn pending_stop(&self) -> Option<Wait> {
        if self.stopped.load(Ordering::SeqCst) && !self.stop_delivered.swap(true, Ordering::SeqCst)
        {
            Some(Wait::Action(ActionTicket {
                action: GameAction::GameStopped,
                done: None,
            }))
        } else {
            None
        }
    }
}

/// Create the two halves of a connection's action mailbox.
pub fn action_mailbox() -> (ActionPoster, ActionSlot) {
    let (tx, rx) = mpsc::sync_channel(1);
    let stopped = Arc::new(AtomicBool::new(false));
    (
        ActionPoster {
            tx,
            stopped: stopped.clone(),
        },
        ActionSlot {
            rx,
            stopped,
            stop_delivered: AtomicBool::new(false),
        },
    )
}
