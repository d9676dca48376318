// Listening side of a remote-play session.
//
// `start_server` binds the port and spawns the accept loop; each admitted
// stream gets its own conversation thread. Admission holds at most one live
// connection at a time. Later dialers get REFUSED_BUSY on their raw stream
// and are closed without a conversation thread.

use std::io::{self, BufWriter};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, info, warn};
use reversi_protocol::{WireMessage, write_line};

use crate::connection::Connection;
use crate::host::{GameHost, SessionEvent};
use crate::link::Link;
use crate::mailbox::action_mailbox;
use crate::server_connection::ServerConnection;

/// Accept-loop sleep while no connection is pending.
const ACCEPT_IDLE: Duration = Duration::from_millis(50);

pub struct ServerConfig {
    pub port: u16,
    /// Text sent after HELLO to every admitted peer.
    pub hello_version: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            port: 7171,
            hello_version: "ReversiNetplay 1.0".to_string(),
        }
    }
}

struct ActiveConnection {
    link: Link,
    thread: JoinHandle<()>,
}

/// Admission bookkeeping shared between the accept loop and connection
/// threads. `count` covers the window where a connection is admitted but
/// `active` is not stored yet.
#[derive(Default)]
struct Admitted {
    count: u32,
    active: Option<ActiveConnection>,
}

/// Handle on a running session service. Dropping it leaks the threads;
/// call [`SessionHandle::stop`] for an orderly teardown.
pub struct SessionHandle {
    keep_running: Arc<AtomicBool>,
    admitted: Arc<Mutex<Admitted>>,
    accept_thread: Option<JoinHandle<()>>,
    host: Arc<dyn GameHost>,
}

impl SessionHandle {
    /// Stop listening, end any live conversation, and join all threads.
    pub fn stop(mut self) {
        self.keep_running.store(false, Ordering::SeqCst);

        let active = self.admitted.lock().unwrap().active.take();
        if let Some(active) = active {
            active.link.request_end();
            if active.thread.join().is_err() {
                warn!("connection thread panicked during stop");
            }
        }
        if let Some(accept) = self.accept_thread.take()
            && accept.join().is_err()
        {
            warn!("accept thread panicked during stop");
        }
        self.host.session_event(SessionEvent::ServiceDown);
    }
}

/// Bind the service and start accepting. Returns the handle plus the bound
/// address (useful when `config.port` is 0).
pub fn start_server(
    config: ServerConfig,
    host: Arc<dyn GameHost>,
) -> io::Result<(SessionHandle, SocketAddr)> {
    let listener = TcpListener::bind(("127.0.0.1", config.port))?;
    let addr = listener.local_addr()?;
    listener.set_nonblocking(true)?;
    info!("session service listening on {addr}");
    host.session_event(SessionEvent::ServiceUp(addr));

    let keep_running = Arc::new(AtomicBool::new(true));
    let admitted = Arc::new(Mutex::new(Admitted::default()));

    let accept_thread = {
        let keep_running = keep_running.clone();
        let admitted = admitted.clone();
        let host = host.clone();
        thread::spawn(move || {
            accept_loop(listener, config.hello_version, keep_running, admitted, host)
        })
    };

    Ok((
        SessionHandle {
            keep_running,
            admitted,
            accept_thread: Some(accept_thread),
            host,
        },
        addr,
    ))
}

fn accept_loop(
    listener: TcpListener,
    hello_version: String,
    keep_running: Arc<AtomicBool>,
    admitted: Arc<Mutex<Admitted>>,
    host: Arc<dyn GameHost>,
) {
    while keep_running.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, peer)) => {
                debug!("inbound connection from {peer}");
                admit(stream, &hello_version, &admitted, &host);
            }
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                thread::sleep(ACCEPT_IDLE);
            }
            Err(err) => {
                warn!("accept failed: {err}");
                break;
            }
        }
    }
    debug!("accept loop exiting");
}

fn admit(
    stream: TcpStream,
    hello_version: &str,
    admitted: &Arc<Mutex<Admitted>>,
    host: &Arc<dyn GameHost>,
) {
    let mut slots = admitted.lock().unwrap();
    if slots.count >= 1 {
        info!("refusing connection: a conversation is already live");
        let mut writer = BufWriter::new(stream);
        if let Err(err) = write_line(&mut writer, &WireMessage::RefusedBusy.encode()) {
            debug!("failed to send busy refusal: {err}");
        }
        return;
    }
    slots.count += 1;

    let link = Link::new();
    let (poster, slot) = action_mailbox();
    let conn = match Connection::new(stream, link.clone(), slot, host.clone()) {
        Ok(conn) => conn,
        Err(err) => {
            warn!("could not set up connection: {err}");
            slots.count -= 1;
            return;
        }
    };

    let thread = {
        let admitted = admitted.clone();
        let host = host.clone();
        let server_conn = ServerConnection::new(conn, poster, host.clone(), hello_version);
        thread::spawn(move || {
            server_conn.run();
            connection_closed(&admitted, &host);
        })
    };
    slots.active = Some(ActiveConnection { link, thread });
    drop(slots);
    host.session_event(SessionEvent::PeerConnected);
}

fn connection_closed(admitted: &Arc<Mutex<Admitted>>, host: &Arc<dyn GameHost>) {
    let mut slots = admitted.lock().unwrap();
    slots.count = slots.count.saturating_sub(1);
    slots.active = None;
    drop(slots);
    host.session_event(SessionEvent::PeerDisconnected);
}
