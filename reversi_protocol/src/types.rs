// Core value types for the remote-play protocol.
//
// These are the payloads carried by `message.rs` lines: disc colors, board
// coordinates, moves (placement or pass), game outcomes, player-type tags,
// and the negotiated `GameRequest`. All parsing goes through fallible
// constructors returning `ProtocolError` so a malformed wire field can never
// produce a half-valid value.

use crate::error::ProtocolError;

/// Disc color. Black moves first. Wire token: `1` for black, `-1` for white.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Color {
    Black,
    White,
}

impl Color {
    pub fn token(self) -> &'static str {
        match self {
            Color::Black => "1",
            Color::White => "-1",
        }
    }

    pub fn from_token(token: &str) -> Result<Self, ProtocolError> {
        match token {
            "1" => Ok(Color::Black),
            "-1" => Ok(Color::White),
            other => Err(ProtocolError::InvalidField {
                field: "color",
                value: other.to_string(),
            }),
        }
    }

    pub fn opponent(self) -> Self {
        match self {
            Color::Black => Color::White,
            Color::White => Color::Black,
        }
    }
}

/// One-based board coordinate. On the wire, columns and rows are 1–2 decimal
/// digits, so the representable range is 1..=99 regardless of board size.
/// Board-size bounds are the application's concern, not the codec's.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Coord {
    pub col: u8,
    pub row: u8,
}

impl Coord {
    pub fn new(col: u8, row: u8) -> Result<Self, ProtocolError> {
        if col == 0 || row == 0 {
            return Err(ProtocolError::InvalidField {
                field: "coordinate",
                value: format!("({col},{row})"),
            });
        }
        Ok(Coord { col, row })
    }
}

/// A move on the wire: a disc placement or a pass. A pass carries no
/// coordinate; its wire encoding uses placeholder coordinates `(1,1)` so
/// `MOVE` and `PASS` lines share one payload grammar.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoardMove {
    pub color: Color,
    pub coord: Option<Coord>,
}

impl BoardMove {
    pub fn placement(color: Color, coord: Coord) -> Self {
        BoardMove {
            color,
            coord: Some(coord),
        }
    }

    pub fn pass(color: Color) -> Self {
        BoardMove { color, coord: None }
    }

    pub fn is_pass(&self) -> bool {
        self.coord.is_none()
    }
}

/// Outcome of a finished game. Wire tokens: `1:0` black wins, `0:1` white
/// wins, `1:1` draw.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Winner {
    Black,
    White,
    Draw,
}

impl Winner {
    pub fn token(self) -> &'static str {
        match self {
            Winner::Black => "1:0",
            Winner::White => "0:1",
            Winner::Draw => "1:1",
        }
    }

    pub fn from_token(token: &str) -> Result<Self, ProtocolError> {
        match token {
            "1:0" => Ok(Winner::Black),
            "0:1" => Ok(Winner::White),
            "1:1" => Ok(Winner::Draw),
            other => Err(ProtocolError::InvalidField {
                field: "winner",
                value: other.to_string(),
            }),
        }
    }
}

/// Player implementation tag carried in game requests. This is the
/// compile-time registry: the application maps a tag to a concrete player
/// constructor, with no runtime class resolution.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlayerKind {
    Human,
    Computer,
    Remote,
}

impl PlayerKind {
    pub fn tag(self) -> &'static str {
        match self {
            PlayerKind::Human => "HUMAN",
            PlayerKind::Computer => "COMPUTER",
            PlayerKind::Remote => "REMOTE",
        }
    }

    pub fn from_tag(tag: &str) -> Result<Self, ProtocolError> {
        match tag {
            "HUMAN" => Ok(PlayerKind::Human),
            "COMPUTER" => Ok(PlayerKind::Computer),
            "REMOTE" => Ok(PlayerKind::Remote),
            other => Err(ProtocolError::InvalidField {
                field: "player kind",
                value: other.to_string(),
            }),
        }
    }
}

/// Parameters of a proposed remote game. Mutable only while the two sides
/// negotiate; once both confirm, the agreement is fixed and the request is
/// discarded after game start.
///
/// `local_color` is always the color of the party *holding* this value. When
/// the request crosses the wire, the receiving side mirrors it (see
/// [`GameRequest::mirrored`]) so each side keeps its own perspective.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GameRequest {
    /// Board dimension: positive even integer, at least 6.
    pub board_size: u32,
    pub timed: bool,
    pub black_ms: u64,
    pub white_ms: u64,
    pub local_color: Color,
    pub player_kind: PlayerKind,
    /// Free text; may contain spaces, never an unescaped double quote.
    pub player_name: String,
}

impl GameRequest {
    pub fn validate(&self) -> Result<(), ProtocolError> {
        if self.board_size < 6 || self.board_size % 2 != 0 {
            return Err(ProtocolError::InvalidField {
                field: "board size",
                value: self.board_size.to_string(),
            });
        }
        if self.player_name.contains('"') {
            return Err(ProtocolError::InvalidField {
                field: "player name",
                value: self.player_name.clone(),
            });
        }
        Ok(())
    }

    /// The same agreement seen from the other side of the board: the local
    /// color flips, everything else (including the proposing player's
    /// identity) is carried through unchanged.
    pub fn mirrored(&self) -> GameRequest {
        GameRequest {
            local_color: self.local_color.opponent(),
            ..self.clone()
        }
    }
}
