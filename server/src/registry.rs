use std::collections::HashMap;

use system::{bincode, ConnectionId, Session};

use crate::socket::Socket;

/// Live sessions of a room, one per open connection.
///
/// Every change is mirrored into the socket attachment so [`restore`] can
/// rebuild the registry from the sockets alone.
///
/// [`restore`]: ConnectionRegistry::restore
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    sessions: HashMap<ConnectionId, Session>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds from the attachments of currently open sockets. Sockets with
    /// no readable attachment were never fully opened and are skipped.
    pub fn restore(sockets: &[Socket]) -> Self {
        let sessions = sockets
            .iter()
            .filter_map(|socket| {
                socket
                    .deserialize_attachment::<Session>()
                    .map(|session| (socket.id(), session))
            })
            .collect::<HashMap<_, _>>();
        log::debug!("Restored {} sessions", sessions.len());
        Self { sessions }
    }

    pub fn register(&mut self, socket: &Socket, session: Session) -> Result<(), bincode::Error> {
        socket.serialize_attachment(&session)?;
        log::debug!("Connection {} registered as {}", socket.id(), session.id);
        self.sessions.insert(socket.id(), session);
        Ok(())
    }

    pub fn get(&self, connection_id: ConnectionId) -> Option<&Session> {
        self.sessions.get(&connection_id)
    }

    /// Silently ignores connections that are not registered.
    pub fn update(
        &mut self,
        socket: &Socket,
        x: f64,
        y: f64,
    ) -> Result<Option<&Session>, bincode::Error> {
        match self.sessions.get_mut(&socket.id()) {
            Some(session) => {
                session.x = x;
                session.y = y;
                socket.serialize_attachment(&*session)?;
                Ok(Some(&*session))
            }
            None => Ok(None),
        }
    }

    pub fn remove(&mut self, connection_id: ConnectionId) -> Option<Session> {
        self.sessions.remove(&connection_id)
    }

    pub fn all_sessions(&self) -> Vec<Session> {
        self.sessions.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
