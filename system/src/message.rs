use crate::types::{ClientId, Session, Square, SquareData, SquareId};
use serde::{Deserialize, Serialize};

/// Every frame exchanged over a room socket, discriminated by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum WsMessage {
    /// Free-form relay, broadcast to everyone as received.
    Message { data: serde_json::Value },
    Join {
        id: ClientId,
    },
    Quit {
        id: ClientId,
    },
    Move {
        id: ClientId,
        x: f64,
        y: f64,
    },
    GetCursors,
    GetCursorsResponse {
        sessions: Vec<Session>,
    },
    AddSquare {
        id: ClientId,
        square: SquareData,
        /// Absent on the client request, assigned by the server on broadcast.
        #[serde(
            rename = "squareId",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        square_id: Option<SquareId>,
    },
    DeleteSquare {
        id: ClientId,
        #[serde(rename = "squareId")]
        square_id: SquareId,
    },
    GetSquares,
    GetSquaresResponse {
        squares: Vec<Square>,
    },
}

impl WsMessage {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Wire name of the variant, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Message { .. } => "message",
            Self::Join { .. } => "join",
            Self::Quit { .. } => "quit",
            Self::Move { .. } => "move",
            Self::GetCursors => "get-cursors",
            Self::GetCursorsResponse { .. } => "get-cursors-response",
            Self::AddSquare { .. } => "add-square",
            Self::DeleteSquare { .. } => "delete-square",
            Self::GetSquares => "get-squares",
            Self::GetSquaresResponse { .. } => "get-squares-response",
        }
    }
}
