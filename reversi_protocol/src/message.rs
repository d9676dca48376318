// Protocol lines for the remote-play conversation.
//
// One enum, `WireMessage`, covers the whole vocabulary in both directions:
// the admitting side and the dialing side exchange the same line grammar and
// differ only in which lines they are allowed to send in which state (that
// policy lives in the session layer, not here).
//
// `encode` and `parse` are exact inverses for every well-formed message.
// Parsing is atomic: a failure returns `ProtocolError` and never a partially
// populated value. No I/O happens here — see `framing.rs` for the
// newline-terminated transport of these strings.

use crate::error::ProtocolError;
use crate::types::{BoardMove, Color, Coord, GameRequest, PlayerKind, Winner};

/// One protocol line, minus its trailing newline.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WireMessage {
    /// Greeting from the admitting side: `HELLO <text>`.
    Hello(String),
    /// Dial-out side proposes a game.
    GameRequest(GameRequest),
    /// Admitting side echoes the agreement from its own perspective.
    NewGame(GameRequest),
    NewGameAccepted,
    RefusedBusy,
    RefusedDenied,
    StartGame,
    StartGameConfirm,
    /// A disc placement: `MOVE <color>(<col>,<row>)`.
    Move(BoardMove),
    MoveConfirm,
    IllegalMove,
    /// Ask the peer for its next local move.
    GetMove,
    /// A pass, sharing the move payload grammar with placeholder coordinates.
    Pass(BoardMove),
    /// `GAME_OVER <1:0|0:1|1:1>`.
    GameOver(Winner),
    GameOverConfirm,
    End,
    EndConfirm,
    /// Keepalive; filtered out before reaching conversation logic.
    Noop,
    /// Reply to a line the receiver could not interpret.
    UnknownCmd,
}

impl WireMessage {
    pub fn encode(&self) -> String {
        match self {
            WireMessage::Hello(text) => format!("HELLO {text}"),
            WireMessage::GameRequest(req) => {
                format!("GAME_REQUEST {}", encode_request(req))
            }
            WireMessage::NewGame(req) => format!("NEW_GAME {}", encode_request(req)),
            WireMessage::NewGameAccepted => "NEW_GAME_ACCEPTED".to_string(),
            WireMessage::RefusedBusy => "REFUSED_BUSY".to_string(),
            WireMessage::RefusedDenied => "REFUSED_DENIED".to_string(),
            WireMessage::StartGame => "START_GAME".to_string(),
            WireMessage::StartGameConfirm => "START_GAME_CONFIRM".to_string(),
            WireMessage::Move(mv) => format!("MOVE {}", encode_move(mv)),
            WireMessage::MoveConfirm => "MOVE_CONFIRM".to_string(),
            WireMessage::IllegalMove => "ILLEGAL_MOVE".to_string(),
            WireMessage::GetMove => "GET_MOVE".to_string(),
            WireMessage::Pass(mv) => format!("PASS {}", encode_move(mv)),
            WireMessage::GameOver(winner) => format!("GAME_OVER {}", winner.token()),
            WireMessage::GameOverConfirm => "GAME_OVER_CONFIRM".to_string(),
            WireMessage::End => "END".to_string(),
            WireMessage::EndConfirm => "END_CONFIRM".to_string(),
            WireMessage::Noop => "NOOP".to_string(),
            WireMessage::UnknownCmd => "UNKNOWN_CMD".to_string(),
        }
    }

    pub fn parse(line: &str) -> Result<WireMessage, ProtocolError> {
        let line = line.trim();
        let (keyword, payload) = match line.split_once(' ') {
            Some((keyword, payload)) => (keyword, Some(payload)),
            None => (line, None),
        };

        match (keyword, payload) {
            ("HELLO", Some(text)) => Ok(WireMessage::Hello(text.to_string())),
            ("GAME_REQUEST", Some(payload)) => {
                parse_request("GAME_REQUEST", payload).map(WireMessage::GameRequest)
            }
            ("NEW_GAME", Some(payload)) => {
                parse_request("NEW_GAME", payload).map(WireMessage::NewGame)
            }
            ("MOVE", Some(payload)) => parse_move("MOVE", payload).map(WireMessage::Move),
            ("PASS", Some(payload)) => {
                // The coordinates on a PASS line are placeholders.
                let mv = parse_move("PASS", payload)?;
                Ok(WireMessage::Pass(BoardMove::pass(mv.color)))
            }
            ("GAME_OVER", Some(token)) => Winner::from_token(token).map(WireMessage::GameOver),
            ("NEW_GAME_ACCEPTED", None) => Ok(WireMessage::NewGameAccepted),
            ("REFUSED_BUSY", None) => Ok(WireMessage::RefusedBusy),
            ("REFUSED_DENIED", None) => Ok(WireMessage::RefusedDenied),
            ("START_GAME", None) => Ok(WireMessage::StartGame),
            ("START_GAME_CONFIRM", None) => Ok(WireMessage::StartGameConfirm),
            ("MOVE_CONFIRM", None) => Ok(WireMessage::MoveConfirm),
            ("ILLEGAL_MOVE", None) => Ok(WireMessage::IllegalMove),
            ("GET_MOVE", None) => Ok(WireMessage::GetMove),
            ("GAME_OVER_CONFIRM", None) => Ok(WireMessage::GameOverConfirm),
            ("END", None) => Ok(WireMessage::End),
            ("END_CONFIRM", None) => Ok(WireMessage::EndConfirm),
            ("NOOP", None) => Ok(WireMessage::Noop),
            ("UNKNOWN_CMD", None) => Ok(WireMessage::UnknownCmd),
            _ => Err(ProtocolError::UnknownCommand(line.to_string())),
        }
    }
}

/// `<dim> <timed:0|1> <blackMs> <whiteMs> <color:-1|1> <TYPE> "<name>"`
fn encode_request(req: &GameRequest) -> String {
    format!(
        "{} {} {} {} {} {} \"{}\"",
        req.board_size,
        u8::from(req.timed),
        req.black_ms,
        req.white_ms,
        req.local_color.token(),
        req.player_kind.tag(),
        req.player_name,
    )
}

fn parse_request(what: &'static str, payload: &str) -> Result<GameRequest, ProtocolError> {
    let malformed = || ProtocolError::Malformed {
        what,
        payload: payload.to_string(),
    };

    // Six space-separated fields, then the quoted name (which may itself
    // contain spaces).
    let mut fields = payload.splitn(7, ' ');
    let board_size: u32 = fields
        .next()
        .and_then(parse_decimal)
        .ok_or_else(malformed)?;
    let timed = match fields.next() {
        Some("0") => false,
        Some("1") => true,
        _ => return Err(malformed()),
    };
    let black_ms: u64 = fields
        .next()
        .and_then(parse_decimal)
        .ok_or_else(malformed)?;
    let white_ms: u64 = fields
        .next()
        .and_then(parse_decimal)
        .ok_or_else(malformed)?;
    let local_color = Color::from_token(fields.next().ok_or_else(malformed)?)?;
    let player_kind = PlayerKind::from_tag(fields.next().ok_or_else(malformed)?)?;
    let player_name = parse_quoted_name(fields.next().ok_or_else(malformed)?, malformed)?;

    let request = GameRequest {
        board_size,
        timed,
        black_ms,
        white_ms,
        local_color,
        player_kind,
        player_name,
    };
    request.validate()?;
    Ok(request)
}

fn parse_quoted_name(
    field: &str,
    malformed: impl Fn() -> ProtocolError,
) -> Result<String, ProtocolError> {
    let inner = field
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .ok_or_else(&malformed)?;
    if inner.contains('"') {
        return Err(malformed());
    }
    Ok(inner.to_string())
}

/// `<color>(<col>,<row>)` with 1–2 digit coordinates.
fn encode_move(mv: &BoardMove) -> String {
    let (col, row) = match mv.coord {
        Some(coord) => (coord.col, coord.row),
        // Pass placeholder; ignored by the parser on PASS lines.
        None => (1, 1),
    };
    format!("{}({},{})", mv.color.token(), col, row)
}

fn parse_move(what: &'static str, payload: &str) -> Result<BoardMove, ProtocolError> {
    let malformed = || ProtocolError::Malformed {
        what,
        payload: payload.to_string(),
    };

    let (color_token, rest) = payload.split_once('(').ok_or_else(malformed)?;
    let coords = rest.strip_suffix(')').ok_or_else(malformed)?;
    let (col_digits, row_digits) = coords.split_once(',').ok_or_else(malformed)?;

    let color = Color::from_token(color_token)?;
    let col = parse_coord_digits(col_digits).ok_or_else(malformed)?;
    let row = parse_coord_digits(row_digits).ok_or_else(malformed)?;
    Ok(BoardMove::placement(color, Coord::new(col, row)?))
}

/// Plain decimal digits only: no sign, no leading zero. Every numeric field
/// gets exactly one wire spelling (`str::parse` alone would admit `+8` and
/// `010`).
fn parse_decimal<T: std::str::FromStr>(digits: &str) -> Option<T> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if digits.len() > 1 && digits.starts_with('0') {
        return None;
    }
    digits.parse().ok()
}

/// 1–2 decimal digits. Leading-zero forms like `03` are rejected so that
/// every coordinate has exactly one wire spelling.
fn parse_coord_digits(digits: &str) -> Option<u8> {
    if digits.is_empty() || digits.len() > 2 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if digits.len() == 2 && digits.starts_with('0') {
        return None;
    }
    digits.parse().ok()
}
