use actix_web::http::StatusCode;
use actix_web::ResponseError;
use system::{bincode, serde_json, ConnectionId};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("value stored under {key:?} is corrupt: {source}")]
    Corrupt {
        key: String,
        source: bincode::Error,
    },
    #[error("failed to encode value for {key:?}: {source}")]
    Encode {
        key: String,
        source: bincode::Error,
    },
}

/// Failure while handling one room command. Never sent back over the socket.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("failed to write attachment: {0}")]
    Attachment(#[from] bincode::Error),
    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, thiserror::Error)]
#[error("connection {0} is closed")]
pub struct DeliveryError(pub ConnectionId);

/// Rejection of an upgrade request before any socket is opened.
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    #[error("Missing ID")]
    MissingId,
    #[error("Invalid room name")]
    InvalidRoom,
}

impl ResponseError for ConnectError {
    fn status_code(&self) -> StatusCode {
        StatusCode::BAD_REQUEST
    }
}
