use system::{serde_json, Session, WsMessage};

use crate::socket::SocketPool;

/// Serializes `message` once and queues it on every socket in `pool`,
/// skipping sockets whose attached session id equals `exclude`.
///
/// Returns how many sockets accepted the frame.
pub fn broadcast(
    pool: &SocketPool,
    message: &WsMessage,
    exclude: Option<&str>,
) -> Result<usize, serde_json::Error> {
    let frame = message.to_json()?;
    Ok(broadcast_frame(pool, &frame, exclude))
}

/// Like [`broadcast`] for an already encoded frame.
pub fn broadcast_frame(pool: &SocketPool, frame: &str, exclude: Option<&str>) -> usize {
    let mut delivered = 0;
    for socket in pool.sockets() {
        if let Some(exclude) = exclude {
            let attached = socket.deserialize_attachment::<Session>();
            if attached.map_or(false, |session| session.id == exclude) {
                continue;
            }
        }
        match socket.send(frame) {
            Ok(()) => delivered += 1,
            Err(err) => log::warn!("Broadcast skipped a recipient: {}", err),
        }
    }
    delivered
}
