// One live conversation over a TCP stream.
//
// `Connection` owns the socket and everything both conversation roles share:
// sending and receiving protocol lines, the confirm-wait loops, the in-game
// action pump, and teardown. Role-specific handshakes live in
// `server_connection.rs` and `client.rs`.
//
// All reads are bounded by a read timeout so the thread re-checks its
// continuation guard at least every `POLL_TICK` and can notice a requested
// end while idle. A partial line survives across those timeouts in
// `line_buf`; `BufRead::read_line` appends, so the line completes across as
// many polls as it needs.

use std::io::{self, BufRead, BufReader, BufWriter, Read};
use std::net::{Shutdown, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::{debug, info, warn};
use reversi_protocol::{BoardMove, MAX_LINE_LEN, ProtocolError, WireMessage, write_line};

use crate::host::{GameHost, RemotePlayer, SessionEvent};
use crate::link::Link;
use crate::mailbox::{ActionSlot, GameAction, Wait};

/// How long a blocking read waits before re-checking the continuation guard.
pub(crate) const POLL_TICK: Duration = Duration::from_millis(250);

/// Pause before closing the socket, so lines still in flight land.
const LINGER: Duration = Duration::from_millis(200);

pub(crate) struct Connection {
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,
    line_buf: String,
    pub(crate) link: Link,
    slot: ActionSlot,
    host: Arc<dyn GameHost>,
}

impl Connection {
    pub(crate) fn new(
        stream: TcpStream,
        link: Link,
        slot: ActionSlot,
        host: Arc<dyn GameHost>,
    ) -> io::Result<Self> {
        stream.set_read_timeout(Some(POLL_TICK))?;
        let writer = BufWriter::new(stream.try_clone()?);
        Ok(Connection {
            reader: BufReader::new(stream),
            writer,
            line_buf: String::new(),
            link,
            slot,
            host,
        })
    }

    /// Send one protocol line. A transport failure is recorded on the link,
    /// which trips the continuation guard for everything that follows.
    pub(crate) fn send(&mut self, msg: &WireMessage) {
        let line = msg.encode();
        debug!("send: {line}");
        if let Err(err) = write_line(&mut self.writer, &line) {
            warn!("send failed ({line}): {err}");
            self.link.record_error(err);
        }
    }

    /// Receive the next meaningful line.
    ///
    /// Returns `None` when the conversation should not continue: the guard
    /// tripped, the peer closed the stream, or the transport failed (the
    /// failure is recorded on the link). NOOP keepalives are swallowed here;
    /// an unparseable line is handed back as `Some(Err(..))` so the caller
    /// can answer UNKNOWN_CMD in whatever state it is in.
    pub(crate) fn receive(
        &mut self,
        purpose: &'static str,
    ) -> Option<Result<WireMessage, ProtocolError>> {
        loop {
            if !self.link.continue_conversation() {
                return None;
            }

            // Reads are capped so a peer streaming newline-free bytes can
            // neither grow line_buf without bound nor starve the guard
            // re-check above.
            let cap = (MAX_LINE_LEN + 1 - self.line_buf.len()) as u64;
            match (&mut self.reader).take(cap).read_line(&mut self.line_buf) {
                Ok(0) => {
                    debug!("peer closed while awaiting {purpose}");
                    self.link.request_end();
                    return None;
                }
                Ok(_) if self.line_buf.len() > MAX_LINE_LEN => {
                    warn!("peer line exceeds {MAX_LINE_LEN} bytes; ending conversation");
                    self.link.record_error(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("line exceeds {MAX_LINE_LEN} bytes"),
                    ));
                    return None;
                }
                Ok(_) if self.line_buf.ends_with('\n') => {
                    let line = std::mem::take(&mut self.line_buf);
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    debug!("recv: {line}");
                    match WireMessage::parse(line) {
                        Ok(WireMessage::Noop) => continue,
                        Ok(msg) => return Some(Ok(msg)),
                        Err(err) => return Some(Err(err)),
                    }
                }
                Ok(_) => {
                    // Stream ended mid-line; nothing more is coming.
                    debug!("peer closed mid-line while awaiting {purpose}");
                    self.link.request_end();
                    return None;
                }
                Err(err)
                    if err.kind() == io::ErrorKind::WouldBlock
                        || err.kind() == io::ErrorKind::TimedOut =>
                {
                    // Poll tick. Partial bytes stay in line_buf.
                    continue;
                }
                Err(err) => {
                    warn!("receive failed while awaiting {purpose}: {err}");
                    self.link.record_error(err);
                    return None;
                }
            }
        }
    }

    /// Await exactly `expected`; anything else aborts the conversation.
    /// Used during the handshake, where the exchange is strictly scripted.
    pub(crate) fn await_exact(&mut self, expected: &WireMessage, purpose: &'static str) -> bool {
        match self.receive(purpose) {
            Some(Ok(msg)) if &msg == expected => true,
            Some(Ok(WireMessage::End)) => {
                self.acknowledge_end();
                false
            }
            Some(Ok(other)) => {
                warn!("awaiting {purpose}, peer sent {other:?}");
                self.send(&WireMessage::UnknownCmd);
                self.link.request_end();
                false
            }
            Some(Err(err)) => {
                warn!("awaiting {purpose}: {err}");
                self.send(&WireMessage::UnknownCmd);
                self.link.request_end();
                false
            }
            None => false,
        }
    }

    /// Confirm the peer's END and wind down.
    pub(crate) fn acknowledge_end(&mut self) {
        self.send(&WireMessage::EndConfirm);
        self.link.request_end();
    }

    /// Await the verdict on a MOVE/PASS we just sent. A crossing GET_MOVE is
    /// not a verdict (both sides solicit moves concurrently) and is skipped.
    fn await_move_confirm(&mut self) -> bool {
        loop {
            match self.receive("MOVE_CONFIRM") {
                Some(Ok(WireMessage::MoveConfirm)) => return true,
                Some(Ok(WireMessage::IllegalMove)) => {
                    warn!("peer rejected our move as illegal; ending conversation");
                    self.link.request_end();
                    return false;
                }
                Some(Ok(WireMessage::GetMove)) => {
                    debug!("GET_MOVE crossed our move on the wire; still awaiting verdict");
                }
                Some(Ok(WireMessage::End)) => {
                    self.acknowledge_end();
                    return false;
                }
                Some(Ok(other)) => {
                    warn!("awaiting MOVE_CONFIRM, peer sent {other:?}");
                    self.send(&WireMessage::UnknownCmd);
                }
                Some(Err(err)) => {
                    warn!("awaiting MOVE_CONFIRM: {err}");
                    self.send(&WireMessage::UnknownCmd);
                }
                None => return false,
            }
        }
    }

    /// The in-game phase: pump engine actions until the game or the
    /// conversation ends.
    pub(crate) fn run_game(&mut self, remote: &RemotePlayer) {
        if !self.await_game_running() {
            return;
        }
        while self.link.continue_conversation() {
            match self.slot.next(POLL_TICK) {
                Wait::Action(ticket) => {
                    let action = ticket.action;
                    self.dispatch(action, remote);
                    ticket.finish();
                }
                Wait::Timeout => continue,
                Wait::EngineGone => {
                    debug!("engine dropped its poster; ending conversation");
                    self.link.request_end();
                    return;
                }
            }
        }
    }

    /// First action after the handshake must be GameRunning. A GameStopped
    /// here means the local side cancelled before the game got going.
    fn await_game_running(&mut self) -> bool {
        while self.link.continue_conversation() {
            match self.slot.next(POLL_TICK) {
                Wait::Action(ticket) => {
                    let action = ticket.action;
                    let running = match action {
                        GameAction::GameRunning => true,
                        GameAction::GameStopped => {
                            self.send(&WireMessage::End);
                            self.link.request_end();
                            false
                        }
                        other => {
                            debug!("expected GameRunning, engine posted {other:?}");
                            false
                        }
                    };
                    ticket.finish();
                    if running {
                        return true;
                    }
                    if !self.link.continue_conversation() {
                        return false;
                    }
                }
                Wait::Timeout => continue,
                Wait::EngineGone => return false,
            }
        }
        false
    }

    fn dispatch(&mut self, action: GameAction, remote: &RemotePlayer) {
        match action {
            GameAction::LocalMove(mv) => {
                self.send(&WireMessage::Move(mv));
                self.await_move_confirm();
            }
            GameAction::PassMove(mv) => {
                self.send(&WireMessage::Pass(mv));
                self.await_move_confirm();
            }
            GameAction::GetMove => self.fetch_remote_move(remote),
            GameAction::GameOver(last_local) => {
                self.finish_game(last_local);
                self.link.request_end();
            }
            GameAction::GameStopped => {
                self.send(&WireMessage::End);
                self.link.request_end();
            }
            GameAction::GameFinished => self.link.request_end(),
            GameAction::GameRunning => {}
        }
    }

    /// Solicit the peer's next move and deliver it to the surrogate. Returns
    /// once a legal move is delivered or the conversation is over; either
    /// way the engine's `next_move` call unblocks when the ticket finishes.
    fn fetch_remote_move(&mut self, remote: &RemotePlayer) {
        self.send(&WireMessage::GetMove);
        loop {
            match self.receive("MOVE") {
                Some(Ok(WireMessage::Move(mv))) | Some(Ok(WireMessage::Pass(mv))) => {
                    if self.host.is_legal(&mv) {
                        self.send(&WireMessage::MoveConfirm);
                        remote.deliver(mv);
                        return;
                    }
                    info!("rejecting illegal remote move {mv:?}");
                    self.send(&WireMessage::IllegalMove);
                }
                Some(Ok(WireMessage::GameOver(winner))) => {
                    // Peer's game ended while we were asking for a move.
                    self.send(&WireMessage::GameOverConfirm);
                    self.host.session_event(SessionEvent::RemoteGameOver(winner));
                    self.link.request_end();
                    return;
                }
                Some(Ok(WireMessage::End)) => {
                    self.acknowledge_end();
                    return;
                }
                Some(Ok(WireMessage::GetMove)) => {
                    debug!("GET_MOVE crossed ours on the wire; still awaiting a move");
                }
                Some(Ok(other)) => {
                    warn!("awaiting a move, peer sent {other:?}");
                    self.send(&WireMessage::UnknownCmd);
                }
                Some(Err(err)) => {
                    warn!("awaiting a move: {err}");
                    self.send(&WireMessage::UnknownCmd);
                }
                None => return,
            }
        }
    }

    /// Report local game over: flush the final move if one is still unsent,
    /// then exchange GAME_OVER / GAME_OVER_CONFIRM.
    fn finish_game(&mut self, last_local: Option<BoardMove>) {
        if let Some(mv) = last_local {
            self.send(&WireMessage::Move(mv));
            if !self.await_move_confirm() {
                return;
            }
        }
        self.send(&WireMessage::GameOver(self.host.winner()));
        loop {
            match self.receive("GAME_OVER_CONFIRM") {
                Some(Ok(WireMessage::GameOverConfirm)) => return,
                Some(Ok(WireMessage::GameOver(_))) => {
                    // Both sides finished at once; confirm theirs too.
                    self.send(&WireMessage::GameOverConfirm);
                }
                Some(Ok(WireMessage::GetMove)) => {
                    debug!("GET_MOVE crossed our GAME_OVER; still awaiting confirm");
                }
                Some(Ok(WireMessage::End)) => {
                    self.acknowledge_end();
                    return;
                }
                Some(Ok(other)) => {
                    warn!("awaiting GAME_OVER_CONFIRM, peer sent {other:?}");
                    self.send(&WireMessage::UnknownCmd);
                }
                Some(Err(err)) => {
                    warn!("awaiting GAME_OVER_CONFIRM: {err}");
                    self.send(&WireMessage::UnknownCmd);
                }
                None => return,
            }
        }
    }

    /// Close the socket. Lines written just before this (END, confirms) get
    /// a short linger to reach the peer first.
    pub(crate) fn shutdown(&mut self) {
        thread::sleep(LINGER);
        if let Err(err) = self.writer.get_ref().shutdown(Shutdown::Both) {
            debug!("socket shutdown: {err}");
        }
        self.link.mark_stopped();
        if let Some(cause) = self.link.error_cause() {
            info!("conversation ended on transport error: {cause}");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::net::TcpListener;

    use reversi_protocol::{BoardMove, GameRequest, Winner};

    use crate::host::Admission;
    use crate::mailbox::action_mailbox;

    use super::*;

    struct NullHost;

    impl GameHost for NullHost {
        fn admit(&self, _request: &GameRequest) -> Admission {
            Admission::Accept
        }
        fn is_legal(&self, _mv: &BoardMove) -> bool {
            true
        }
        fn winner(&self) -> Winner {
            Winner::Draw
        }
        fn start_remote_game(
            &self,
            _request: GameRequest,
            _remote: Arc<RemotePlayer>,
            _updates: crate::host::GameUpdates,
        ) {
        }
        fn stop_game(&self) {}
        fn request_cancelled(&self) {}
        fn session_event(&self, _event: SessionEvent) {}
    }

    fn tcp_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let dialed = TcpStream::connect(addr).unwrap();
        let (accepted, _) = listener.accept().unwrap();
        (dialed, accepted)
    }

    fn test_connection(stream: TcpStream) -> Connection {
        let (_poster, slot) = action_mailbox();
        Connection::new(stream, Link::new(), slot, Arc::new(NullHost)).unwrap()
    }

    #[test]
    fn receive_parses_lines_in_order() {
        let (ours, mut theirs) = tcp_pair();
        let mut conn = test_connection(ours);

        theirs.write_all(b"GET_MOVE\nMOVE_CONFIRM\n").unwrap();
        assert_eq!(conn.receive("test").unwrap().unwrap(), WireMessage::GetMove);
        assert_eq!(
            conn.receive("test").unwrap().unwrap(),
            WireMessage::MoveConfirm
        );
    }

    #[test]
    fn receive_returns_none_after_peer_close() {
        let (ours, theirs) = tcp_pair();
        let mut conn = test_connection(ours);

        drop(theirs);
        assert!(conn.receive("test").is_none());
        assert!(!conn.link.continue_conversation());
    }

    #[test]
    fn receive_hands_back_garbage_as_error() {
        let (ours, mut theirs) = tcp_pair();
        let mut conn = test_connection(ours);

        theirs.write_all(b"GIBBERISH x y\n").unwrap();
        let result = conn.receive("test").unwrap();
        assert!(result.is_err());
        // The conversation survives a garbage line.
        assert!(conn.link.continue_conversation());
    }

    #[test]
    fn receive_swallows_noop_keepalives() {
        let (ours, mut theirs) = tcp_pair();
        let mut conn = test_connection(ours);

        theirs.write_all(b"NOOP\nNOOP\nEND\n").unwrap();
        assert_eq!(conn.receive("test").unwrap().unwrap(), WireMessage::End);
    }

    /// A peer streaming newline-free bytes must hit the length bound, not
    /// grow the buffer while the guard goes unchecked.
    #[test]
    fn receive_bounds_runaway_line() {
        let (ours, mut theirs) = tcp_pair();
        let mut conn = test_connection(ours);

        let blob = vec![b'X'; MAX_LINE_LEN * 3];
        theirs.write_all(&blob).unwrap();
        theirs.flush().unwrap();

        assert!(conn.receive("test").is_none());
        assert!(!conn.link.continue_conversation());
        assert!(conn.line_buf.len() <= MAX_LINE_LEN + 1);
    }

    #[test]
    fn receive_reassembles_split_line() {
        let (ours, mut theirs) = tcp_pair();
        let mut conn = test_connection(ours);

        theirs.write_all(b"START_GA").unwrap();
        theirs.flush().unwrap();
        let writer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(400));
            theirs.write_all(b"ME\n").unwrap();
            theirs
        });
        assert_eq!(
            conn.receive("test").unwrap().unwrap(),
            WireMessage::StartGame
        );
        drop(writer.join().unwrap());
    }

    #[test]
    fn await_exact_acknowledges_end() {
        let (ours, mut theirs) = tcp_pair();
        let mut conn = test_connection(ours);

        theirs.write_all(b"END\n").unwrap();
        assert!(!conn.await_exact(&WireMessage::StartGame, "test"));
        assert!(!conn.link.continue_conversation());

        let mut reader = BufReader::new(theirs);
        let reply = reversi_protocol::read_line(&mut reader).unwrap();
        assert_eq!(reply.as_deref(), Some("END_CONFIRM"));
    }
}
