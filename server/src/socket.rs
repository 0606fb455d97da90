use std::collections::BTreeMap;
use std::num::Wrapping;
use std::sync::{Arc, Mutex, PoisonError};

use serde::de::DeserializeOwned;
use serde::Serialize;
use system::{bincode, ConnectionId};
use tokio::sync::mpsc::UnboundedSender;

use crate::error::DeliveryError;

/// What the room asks a connection to do with its socket.
#[derive(Debug, Clone, PartialEq)]
pub enum Outgoing {
    Text(String),
    Close,
}

pub type SocketTx = UnboundedSender<Outgoing>;

/// Handle to one open connection.
///
/// The attachment travels with the socket rather than with the room, so a
/// room recreated after hibernation can still tell who is on the other end.
#[derive(Clone)]
pub struct Socket {
    inner: Arc<SocketInner>,
}

struct SocketInner {
    id: ConnectionId,
    tx: SocketTx,
    attachment: Mutex<Option<Vec<u8>>>,
}

impl Socket {
    pub fn new(id: ConnectionId, tx: SocketTx) -> Self {
        Self {
            inner: Arc::new(SocketInner {
                id,
                tx,
                attachment: Mutex::new(None),
            }),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.inner.id
    }

    /// Queues a text frame. Frames are delivered in the order they are queued.
    pub fn send(&self, frame: &str) -> Result<(), DeliveryError> {
        self.inner
            .tx
            .send(Outgoing::Text(frame.to_owned()))
            .map_err(|_| DeliveryError(self.inner.id))
    }

    pub fn close(&self) {
        let _ = self.inner.tx.send(Outgoing::Close);
    }

    pub fn serialize_attachment<T: Serialize>(&self, value: &T) -> Result<(), bincode::Error> {
        let bytes = bincode::serialize(value)?;
        *self.attachment() = Some(bytes);
        Ok(())
    }

    /// `None` when nothing was attached yet or the bytes don't decode as `T`.
    pub fn deserialize_attachment<T: DeserializeOwned>(&self) -> Option<T> {
        let attachment = self.attachment();
        let bytes = attachment.as_ref()?;
        match bincode::deserialize(bytes) {
            Ok(value) => Some(value),
            Err(err) => {
                log::warn!("Unreadable attachment on connection {}: {}", self.id(), err);
                None
            }
        }
    }

    fn attachment(&self) -> std::sync::MutexGuard<'_, Option<Vec<u8>>> {
        self.inner
            .attachment
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for Socket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Socket").field("id", &self.inner.id).finish()
    }
}

/// Sockets accepted into one room. Shared between the room task and the
/// transport so it survives the room being torn down and recreated.
#[derive(Clone, Default)]
pub struct SocketPool {
    inner: Arc<Mutex<SocketPoolInner>>,
}

#[derive(Default)]
struct SocketPoolInner {
    connection_id_source: Wrapping<ConnectionId>,
    sockets: BTreeMap<ConnectionId, Socket>,
}

impl SocketPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a socket with a fresh connection id. It is not part of the
    /// room until accepted.
    pub fn open(&self, tx: SocketTx) -> Socket {
        let mut inner = self.lock();
        inner.connection_id_source += Wrapping(1);
        Socket::new(inner.connection_id_source.0, tx)
    }

    pub fn accept(&self, socket: Socket) {
        self.lock().sockets.insert(socket.id(), socket);
    }

    pub fn get(&self, id: ConnectionId) -> Option<Socket> {
        self.lock().sockets.get(&id).cloned()
    }

    pub fn release(&self, id: ConnectionId) -> Option<Socket> {
        self.lock().sockets.remove(&id)
    }

    pub fn sockets(&self) -> Vec<Socket> {
        self.lock().sockets.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().sockets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SocketPoolInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
