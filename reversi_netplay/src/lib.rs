// reversi_netplay — remote-play session layer for Reversi.
//
// Two Reversi applications play one game over a TCP connection carrying the
// `reversi_protocol` line vocabulary. One side listens (`start_server`) and
// admits at most one conversation at a time; the other dials (`dial`) and
// proposes a game. After the scripted handshake both sides run the same
// conversation pump, relaying local moves out and soliciting remote moves
// in.
//
// Threading model: everything is blocking `std::net` I/O. Each conversation
// runs on its own thread; the local game engine runs on the application's
// threads and talks to the conversation through two seams:
//
// - `GameUpdates` carries engine lifecycle events into the conversation.
//   Events that need a wire round trip block the engine thread until the
//   exchange completes, which keeps engine and wire in lockstep without any
//   engine-side protocol knowledge.
// - `RemotePlayer` is the local surrogate for the peer: the engine asks it
//   for the next move exactly as it would a local player.
//
// The application supplies a `GameHost` for everything game-specific:
// admission policy, move legality, outcome, and lifecycle notifications.

pub mod client;
mod connection;
pub mod host;
pub mod link;
pub mod mailbox;
pub mod server;
mod server_connection;

pub use client::{ConnectionHandle, dial};
pub use host::{Admission, GameEvent, GameHost, GameUpdates, RemotePlayer, SessionEvent};
pub use link::{Link, LinkPhase};
pub use mailbox::{ActionPoster, ActionSlot, ActionTicket, GameAction, Wait, action_mailbox};
pub use server::{ServerConfig, SessionHandle, start_server};
