// Dialing side of a remote-play session.
//
// `dial` validates the request, connects, and spawns the conversation
// thread; the caller keeps a `ConnectionHandle` for reporting game events
// and stopping. The dialer proposes with GAME_REQUEST and must see the
// admitting side's NEW_GAME agreement before anything starts; a reply it
// cannot parse cancels the whole attempt rather than guessing at terms.

use std::io;
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::{debug, info, warn};
use reversi_protocol::{GameRequest, WireMessage};

use crate::connection::Connection;
use crate::host::{GameEvent, GameHost, GameUpdates, RemotePlayer};
use crate::link::Link;
use crate::mailbox::{ActionPoster, action_mailbox};

/// Handle on a dialed conversation.
#[derive(Debug)]
pub struct ConnectionHandle {
    updates: GameUpdates,
    thread: Option<JoinHandle<()>>,
}

impl ConnectionHandle {
    /// Report a game lifecycle event into the conversation.
    pub fn game_update(&self, event: GameEvent) {
        self.updates.game_update(event);
    }

    /// Engine-side handle, cloneable into the game engine.
    pub fn updates(&self) -> GameUpdates {
        self.updates.clone()
    }

    /// Ask the conversation to wind down.
    pub fn stop(&self) {
        self.updates.stop();
    }

    /// False once the conversation has ended or failed.
    pub fn is_live(&self) -> bool {
        self.updates.is_live()
    }

    /// Wait for the conversation thread to exit.
    pub fn join(mut self) {
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            warn!("conversation thread panicked");
        }
    }
}

/// Connect to an admitting peer and propose `request`.
///
/// Returns as soon as the conversation thread is running; negotiation and
/// play happen on that thread, reported through the host.
pub fn dial(
    addr: impl ToSocketAddrs,
    request: GameRequest,
    host: Arc<dyn GameHost>,
) -> io::Result<ConnectionHandle> {
    request
        .validate()
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err.to_string()))?;

    let stream = TcpStream::connect(addr)?;
    debug!("dialed {}", stream.peer_addr()?);

    let link = Link::new();
    let (poster, slot) = action_mailbox();
    let conn = Connection::new(stream, link.clone(), slot, host.clone())?;
    let updates = GameUpdates::new(poster.clone(), link);

    let thread = thread::spawn(move || {
        ClientConnection {
            conn,
            poster,
            host,
            request,
        }
        .run()
    });

    Ok(ConnectionHandle {
        updates,
        thread: Some(thread),
    })
}

struct ClientConnection {
    conn: Connection,
    poster: ActionPoster,
    host: Arc<dyn GameHost>,
    request: GameRequest,
}

impl ClientConnection {
    fn run(mut self) {
        let game_started = self.converse();
        if game_started {
            self.host.stop_game();
        }
        self.conn.shutdown();
    }

    fn converse(&mut self) -> bool {
        match self.conn.receive("HELLO") {
            Some(Ok(WireMessage::Hello(text))) => debug!("greeted: {text}"),
            Some(Ok(WireMessage::RefusedBusy)) => {
                info!("peer is busy");
                self.host.request_cancelled();
                return false;
            }
            Some(Ok(other)) => {
                warn!("awaiting HELLO, peer sent {other:?}");
                self.conn.send(&WireMessage::UnknownCmd);
                self.conn.link.request_end();
                self.host.request_cancelled();
                return false;
            }
            Some(Err(err)) => {
                warn!("awaiting HELLO: {err}");
                self.conn.send(&WireMessage::UnknownCmd);
                self.conn.link.request_end();
                self.host.request_cancelled();
                return false;
            }
            None => {
                self.host.request_cancelled();
                return false;
            }
        }

        self.conn
            .send(&WireMessage::GameRequest(self.request.clone()));

        match self.conn.receive("NEW_GAME") {
            Some(Ok(WireMessage::NewGame(offer))) => {
                debug!("peer agreed: {offer:?}");
            }
            Some(Ok(WireMessage::RefusedBusy)) => {
                info!("request refused: peer busy");
                self.host.request_cancelled();
                return false;
            }
            Some(Ok(WireMessage::RefusedDenied)) => {
                info!("request refused: peer declined");
                self.host.request_cancelled();
                return false;
            }
            Some(Ok(WireMessage::End)) => {
                self.conn.acknowledge_end();
                self.host.request_cancelled();
                return false;
            }
            Some(Ok(other)) => {
                warn!("awaiting NEW_GAME, peer sent {other:?}");
                self.conn.send(&WireMessage::UnknownCmd);
                self.conn.link.request_end();
                self.host.request_cancelled();
                return false;
            }
            Some(Err(err)) => {
                // Never proceed on a half-parsed agreement; reject and hang up.
                warn!("unparseable NEW_GAME: {err}");
                self.conn.send(&WireMessage::End);
                self.conn.link.request_end();
                self.host.request_cancelled();
                return false;
            }
            None => {
                self.host.request_cancelled();
                return false;
            }
        }

        self.conn.send(&WireMessage::NewGameAccepted);
        if !self.conn.await_exact(&WireMessage::StartGame, "START_GAME") {
            self.host.request_cancelled();
            return false;
        }
        self.conn.send(&WireMessage::StartGameConfirm);

        // The remote surrogate plays the color we did not claim.
        let remote = Arc::new(RemotePlayer::new(
            self.request.local_color.opponent(),
            self.poster.clone(),
        ));
        let updates = GameUpdates::new(self.poster.clone(), self.conn.link.clone());
        self.host
            .start_remote_game(self.request.clone(), remote.clone(), updates);

        self.conn.run_game(&remote);
        true
    }
}
