// Protocol-level parse failures.
//
// A `ProtocolError` means a received line failed the expected grammar. It is
// always recoverable in principle — the codec never panics on bad input and
// never produces a partially populated value. Callers decide whether the
// conversation state allows recovery (reply UNKNOWN_CMD and keep waiting) or
// not (wind the conversation down).

use thiserror::Error;

/// A received line failed the protocol grammar.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// The leading keyword is not part of the protocol vocabulary, or a
    /// fixed-literal command carried an unexpected payload.
    #[error("unknown command: {0:?}")]
    UnknownCommand(String),
    /// A known command whose payload does not match its grammar.
    #[error("malformed {what} payload: {payload:?}")]
    Malformed {
        what: &'static str,
        payload: String,
    },
    /// A single field inside an otherwise well-shaped payload is invalid,
    /// e.g. an odd board size or a zero coordinate.
    #[error("invalid {field}: {value:?}")]
    InvalidField {
        field: &'static str,
        value: String,
    },
}
