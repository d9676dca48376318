// Admitting-side conversation: greet, negotiate, hand off to the game pump.
//
// The admitting side speaks first (HELLO), receives the dialer's
// GAME_REQUEST, consults the host for admission, and echoes the agreement
// back as NEW_GAME seen from its own perspective. Once START_GAME /
// START_GAME_CONFIRM completes, the host starts the local game and the
// shared `Connection::run_game` pump takes over.

use std::sync::Arc;

use log::{debug, info, warn};
use reversi_protocol::{GameRequest, WireMessage};

use crate::connection::Connection;
use crate::host::{Admission, GameHost, GameUpdates, RemotePlayer};
use crate::mailbox::ActionPoster;

pub(crate) struct ServerConnection {
    conn: Connection,
    poster: ActionPoster,
    host: Arc<dyn GameHost>,
    hello_version: String,
}

impl ServerConnection {
    pub(crate) fn new(
        conn: Connection,
        poster: ActionPoster,
        host: Arc<dyn GameHost>,
        hello_version: &str,
    ) -> Self {
        ServerConnection {
            conn,
            poster,
            host,
            hello_version: hello_version.to_string(),
        }
    }

    /// Drive the whole conversation, then tear the socket down. If a game
    /// was started, the host is told to stop it when the conversation ends.
    pub(crate) fn run(mut self) {
        let game_started = self.converse();
        if game_started {
            self.host.stop_game();
        }
        self.conn.shutdown();
    }

    /// Returns true once a game has been agreed and started.
    fn converse(&mut self) -> bool {
        self.conn
            .send(&WireMessage::Hello(self.hello_version.clone()));

        let Some(request) = self.await_game_request() else {
            return false;
        };

        match self.host.admit(&request) {
            Admission::Accept => {}
            Admission::Busy => {
                info!("host reports busy; refusing {}", request.player_name);
                self.conn.send(&WireMessage::RefusedBusy);
                self.conn.link.request_end();
                return false;
            }
            Admission::Deny => {
                info!("host denied request from {}", request.player_name);
                self.conn.send(&WireMessage::RefusedDenied);
                self.conn.link.request_end();
                return false;
            }
        }

        // Echo the agreement from this side's perspective: same game, our
        // color is the one the dialer did not claim.
        let local_request = request.mirrored();
        self.conn.send(&WireMessage::NewGame(local_request.clone()));
        if !self
            .conn
            .await_exact(&WireMessage::NewGameAccepted, "NEW_GAME_ACCEPTED")
        {
            self.host.request_cancelled();
            return false;
        }

        self.conn.send(&WireMessage::StartGame);
        if !self
            .conn
            .await_exact(&WireMessage::StartGameConfirm, "START_GAME_CONFIRM")
        {
            self.host.request_cancelled();
            return false;
        }

        // The remote surrogate plays the dialer's color.
        let remote = Arc::new(RemotePlayer::new(request.local_color, self.poster.clone()));
        let updates = GameUpdates::new(self.poster.clone(), self.conn.link.clone());
        debug!(
            "starting remote game: {} as {:?}",
            request.player_name, request.local_color
        );
        self.host
            .start_remote_game(local_request, remote.clone(), updates);

        self.conn.run_game(&remote);
        true
    }

    fn await_game_request(&mut self) -> Option<GameRequest> {
        match self.conn.receive("GAME_REQUEST") {
            Some(Ok(WireMessage::GameRequest(request))) => Some(request),
            Some(Ok(WireMessage::End)) => {
                self.conn.acknowledge_end();
                None
            }
            Some(Ok(other)) => {
                warn!("awaiting GAME_REQUEST, peer sent {other:?}");
                self.conn.send(&WireMessage::UnknownCmd);
                self.conn.link.request_end();
                None
            }
            Some(Err(err)) => {
                warn!("awaiting GAME_REQUEST: {err}");
                self.conn.send(&WireMessage::UnknownCmd);
                self.conn.link.request_end();
                None
            }
            None => None,
        }
    }
}
