use serde::{Deserialize, Serialize};

/// Transport-level identity assigned by the server when a socket is accepted.
pub type ConnectionId = u32;
/// Identifier chosen by the client and carried on the upgrade request.
pub type ClientId = String;
pub type SquareId = u64;

/// Cursor coordinate used until the first `move` arrives.
pub const UNKNOWN_POSITION: f64 = -1.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: ClientId,
    pub x: f64,
    pub y: f64,
}

impl Session {
    pub fn new(id: ClientId) -> Self {
        Self {
            id,
            x: UNKNOWN_POSITION,
            y: UNKNOWN_POSITION,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SquareData {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub color: String,
}

/// A square as stored and as sent in `get-squares-response`.
///
/// Kept flat (no `#[serde(flatten)]`) so the same type round-trips through
/// both the JSON wire codec and the bincode snapshot codec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Square {
    pub id: SquareId,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub color: String,
}

impl Square {
    pub fn new(id: SquareId, data: SquareData) -> Self {
        Self {
            id,
            x: data.x,
            y: data.y,
            width: data.width,
            height: data.height,
            color: data.color,
        }
    }

    pub fn data(&self) -> SquareData {
        SquareData {
            x: self.x,
            y: self.y,
            width: self.width,
            height: self.height,
            color: self.color.clone(),
        }
    }
}
