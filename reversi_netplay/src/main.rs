// CLI entry point: a standalone session peer for protocol probing.
//
// Runs the listening side of the session layer with a trivial host that
// accepts (or, with --deny, refuses) every game request and answers move
// solicitations by passing. Useful for poking at the wire protocol with a
// real client or netcat.
//
// Usage:
//   netplay_probe [OPTIONS]
//     --port <PORT>    Listen port (default: 7171)
//     --deny           Refuse every game request

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::info;
use reversi_netplay::server::{ServerConfig, start_server};
use reversi_netplay::{Admission, GameEvent, GameHost, GameUpdates, RemotePlayer, SessionEvent};
use reversi_protocol::{BoardMove, GameRequest, Winner};

fn main() {
    env_logger::init();
    let (config, deny) = parse_args();

    let host = Arc::new(ProbeHost { deny });
    let (handle, addr) = match start_server(config, host) {
        Ok(result) => result,
        Err(e) => {
            eprintln!("Failed to start session service: {e}");
            std::process::exit(1);
        }
    };

    println!("Session service listening on {addr}");
    println!("Press Ctrl+C to stop.");

    // The process exits on SIGINT; thread teardown happens with it.
    let _handle = handle;
    loop {
        thread::sleep(Duration::from_millis(500));
    }
}

/// Accepts every request (unless told to deny) and plays by passing.
struct ProbeHost {
    deny: bool,
}

impl GameHost for ProbeHost {
    fn admit(&self, request: &GameRequest) -> Admission {
        info!(
            "game request from {:?} ({}x{} board)",
            request.player_name, request.board_size, request.board_size
        );
        if self.deny {
            Admission::Deny
        } else {
            Admission::Accept
        }
    }

    fn is_legal(&self, _mv: &BoardMove) -> bool {
        true
    }

    fn winner(&self) -> Winner {
        Winner::Draw
    }

    fn start_remote_game(
        &self,
        request: GameRequest,
        remote: Arc<RemotePlayer>,
        updates: GameUpdates,
    ) {
        // Minimal engine: run the game on its own thread, pass on every
        // turn, and log what the peer plays.
        thread::spawn(move || {
            updates.game_update(GameEvent::GameRunning);
            info!("game running as {:?}", request.local_color);
            while updates.is_live() {
                updates.game_update(GameEvent::Passed(BoardMove::pass(request.local_color)));
                if !updates.is_live() {
                    break;
                }
                match remote.next_move() {
                    Some(mv) => info!("peer played {mv:?}"),
                    None => break,
                }
            }
            updates.game_update(GameEvent::GameFinished);
            info!("probe game over");
        });
    }

    fn stop_game(&self) {
        info!("game stopped");
    }

    fn request_cancelled(&self) {
        info!("request cancelled before start");
    }

    fn session_event(&self, event: SessionEvent) {
        info!("session event: {event:?}");
    }
}

fn parse_args() -> (ServerConfig, bool) {
    let mut config = ServerConfig::default();
    let mut deny = false;
    let args: Vec<String> = std::env::args().collect();
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "--port" => {
                i += 1;
                config.port = args.get(i).and_then(|s| s.parse().ok()).unwrap_or_else(|| {
                    eprintln!("--port requires a valid port number");
                    std::process::exit(1);
                });
            }
            "--deny" => deny = true,
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            other => {
                eprintln!("Unknown argument: {other}");
                print_usage();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    (config, deny)
}

fn print_usage() {
    println!("Usage: netplay_probe [OPTIONS]");
    println!();
    println!("Options:");
    println!("  --port <PORT>    Listen port (default: 7171)");
    println!("  --deny           Refuse every game request");
    println!("  --help, -h       Show this help");
}
