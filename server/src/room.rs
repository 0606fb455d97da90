use std::sync::Arc;

use system::{ClientId, ConnectionId, Session, WsMessage};

use crate::broadcast::{broadcast, broadcast_frame};
use crate::error::RoomError;
use crate::registry::ConnectionRegistry;
use crate::socket::{Socket, SocketPool};
use crate::square_store::SquareStore;
use crate::storage::KeyValueStore;

/// All state of one room. Owned by a single task; see [`crate::server`].
pub struct Room {
    name: String,
    pool: SocketPool,
    registry: ConnectionRegistry,
    squares: SquareStore,
}

impl Room {
    /// Picks up every session still attached to a socket in `pool`, so this
    /// is also how a hibernated room comes back.
    pub fn restore(
        name: impl Into<String>,
        pool: SocketPool,
        kv: Arc<dyn KeyValueStore>,
    ) -> Self {
        let name = name.into();
        let registry = ConnectionRegistry::restore(&pool.sockets());
        if !registry.is_empty() {
            log::info!("Room {} restored {} sessions", name, registry.len());
        }
        Self {
            name,
            pool,
            registry,
            squares: SquareStore::new(kv),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pool(&self) -> &SocketPool {
        &self.pool
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Opens `socket` as `client_id` and tells everyone else about it.
    pub fn accept(&mut self, socket: Socket, client_id: ClientId) -> Result<(), RoomError> {
        self.registry.register(&socket, Session::new(client_id.clone()))?;
        self.pool.accept(socket);
        let join = WsMessage::Join {
            id: client_id.clone(),
        };
        broadcast(&self.pool, &join, Some(client_id.as_str()))?;
        Ok(())
    }

    /// Tears down a connection. Only connections that were fully opened
    /// announce `quit`.
    pub fn close(&mut self, from: ConnectionId) -> Result<(), RoomError> {
        let socket = self.pool.release(from);
        if let Some(session) = self.registry.remove(from) {
            log::info!("Connection {} ({}) left room {}", from, session.id, self.name);
            broadcast(&self.pool, &WsMessage::Quit { id: session.id }, None)?;
        }
        if let Some(socket) = socket {
            socket.close();
        }
        Ok(())
    }

    /// Handles one inbound text frame. Malformed frames, frames from
    /// unregistered connections and server-only message types are dropped
    /// without reply.
    pub async fn handle_text(&mut self, from: ConnectionId, text: &str) -> Result<(), RoomError> {
        let message = match WsMessage::from_json(text) {
            Ok(message) => message,
            Err(err) => {
                log::debug!("Dropping malformed frame from {}: {}", from, err);
                return Ok(());
            }
        };
        let (socket, session) = match (self.pool.get(from), self.registry.get(from)) {
            (Some(socket), Some(session)) => (socket, session.clone()),
            _ => {
                log::debug!("Dropping {} from unregistered {}", message.kind(), from);
                return Ok(());
            }
        };
        let kind = message.kind();
        log::trace!("{} from {}", kind, session.id);

        match message {
            WsMessage::Message { .. } => {
                broadcast_frame(&self.pool, text, None);
            }
            WsMessage::Move { x, y, .. } => {
                self.registry.update(&socket, x, y)?;
                // the sender gets its own move back and ignores it
                broadcast(&self.pool, &WsMessage::Move { id: session.id, x, y }, None)?;
            }
            WsMessage::GetCursors => {
                let sessions = self.registry.all_sessions();
                reply(&socket, &WsMessage::GetCursorsResponse { sessions })?;
            }
            WsMessage::AddSquare { square, .. } => {
                let square = self.squares.add(square).await?;
                broadcast(
                    &self.pool,
                    &WsMessage::AddSquare {
                        id: session.id,
                        square: square.data(),
                        square_id: Some(square.id),
                    },
                    None,
                )?;
            }
            WsMessage::DeleteSquare { square_id, .. } => {
                self.squares.delete(square_id).await?;
                broadcast(
                    &self.pool,
                    &WsMessage::DeleteSquare {
                        id: session.id,
                        square_id,
                    },
                    None,
                )?;
            }
            WsMessage::GetSquares => {
                let squares = self.squares.get_all().await?.into_values().collect();
                reply(&socket, &WsMessage::GetSquaresResponse { squares })?;
            }
            WsMessage::Join { .. }
            | WsMessage::Quit { .. }
            | WsMessage::GetCursorsResponse { .. }
            | WsMessage::GetSquaresResponse { .. } => {
                log::debug!("Ignoring server-only {} from {}", kind, session.id);
            }
        }
        Ok(())
    }
}

fn reply(socket: &Socket, message: &WsMessage) -> Result<(), RoomError> {
    let frame = message.to_json()?;
    if let Err(err) = socket.send(&frame) {
        log::warn!("Reply dropped: {}", err);
    }
    Ok(())
}
