// reversi_protocol — wire protocol for Reversi remote play.
//
// This crate defines the line vocabulary, payload types, and framing used by
// the session layer (`reversi_netplay`) on both sides of a remote game. It is
// a stateless codec: pure encode/parse functions, no sockets, no threads, no
// knowledge of conversation state.
//
// Module overview:
// - `types.rs`:   Payload values — `Color`, `Coord`, `BoardMove`, `Winner`,
//                 `PlayerKind`, and the negotiated `GameRequest`.
// - `message.rs`: The `WireMessage` enum covering every protocol line, with
//                 exact-inverse `encode`/`parse`.
// - `framing.rs`: Newline-terminated line transport over any
//                 `BufRead`/`Write` stream, with a line-length bound.
// - `error.rs`:   `ProtocolError` — grammar failures, always atomic.
//
// Design decisions:
// - **Plain ASCII lines.** One command per line, fixed leading keyword. The
//   format is human-readable and debuggable with netcat.
// - **One enum for both directions.** Which lines may be sent in which state
//   is session-layer policy; the codec stays symmetric.
// - **No async runtime.** `std::io` traits only, compatible with blocking
//   TCP streams and buffered wrappers.

pub mod error;
pub mod framing;
pub mod message;
pub mod types;

pub use error::ProtocolError;
pub use framing::{MAX_LINE_LEN, read_line, write_line};
pub use message::WireMessage;
pub use types::{BoardMove, Color, Coord, GameRequest, PlayerKind, Winner};
