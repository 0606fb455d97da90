use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use system::{ClientId, ConnectionId};
use tokio::sync::mpsc::error::SendError;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

use crate::room::Room;
use crate::socket::{Socket, SocketPool};
use crate::storage::StorageBackend;

#[derive(Debug)]
pub enum RoomCommand {
    Connect { socket: Socket, client_id: ClientId },
    Message { from: ConnectionId, text: String },
    Disconnect { from: ConnectionId },
}

pub type RoomTx = UnboundedSender<RoomCommand>;

async fn handle_room_command(room: &mut Room, command: RoomCommand) {
    let result = match command {
        RoomCommand::Connect { socket, client_id } => {
            log::info!(
                "Connection {} joined room {} as {}",
                socket.id(),
                room.name(),
                client_id
            );
            room.accept(socket, client_id)
        }
        RoomCommand::Message { from, text } => room.handle_text(from, &text).await,
        RoomCommand::Disconnect { from } => room.close(from),
    };
    if let Err(err) = result {
        log::warn!("Room {}: {}", room.name(), err);
    }
}

type RoomSlot = Arc<Mutex<Option<RoomTx>>>;

fn lock_slot(slot: &RoomSlot) -> std::sync::MutexGuard<'_, Option<RoomTx>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Empties `slot` unless a command slipped in meanwhile. Senders hold the
/// slot lock while sending, so once it is empty nothing more can arrive.
fn try_hibernate(rx: &mut UnboundedReceiver<RoomCommand>, slot: &RoomSlot) -> Option<RoomCommand> {
    let mut tx = lock_slot(slot);
    match rx.try_recv() {
        Ok(command) => Some(command),
        Err(_) => {
            *tx = None;
            None
        }
    }
}

/// Runs `room` until its inbox closes or, with `hibernate_after` set, until
/// it has been idle that long.
async fn run_room(
    mut room: Room,
    mut rx: UnboundedReceiver<RoomCommand>,
    hibernate_after: Option<Duration>,
    slot: RoomSlot,
) {
    loop {
        let command = match hibernate_after {
            Some(idle) => match tokio::time::timeout(idle, rx.recv()).await {
                Ok(command) => command,
                Err(_) => match try_hibernate(&mut rx, &slot) {
                    Some(command) => Some(command),
                    None => {
                        log::info!(
                            "Room {} hibernating with {} open connections",
                            room.name(),
                            room.pool().len()
                        );
                        break;
                    }
                },
            },
            None => rx.recv().await,
        };
        match command {
            Some(command) => handle_room_command(&mut room, command).await,
            None => break,
        }
    }
}

fn spawn_room(room: Room, hibernate_after: Option<Duration>, slot: RoomSlot) -> RoomTx {
    let (tx, rx) = unbounded_channel::<RoomCommand>();
    tokio::spawn(run_room(room, rx, hibernate_after, slot));
    tx
}

/// Address of one room. Wakes the room up on demand.
#[derive(Clone)]
pub struct RoomHandle {
    inner: Arc<RoomHandleInner>,
}

struct RoomHandleInner {
    name: String,
    pool: SocketPool,
    storage: StorageBackend,
    hibernate_after: Option<Duration>,
    slot: RoomSlot,
}

impl RoomHandle {
    pub fn new(name: String, storage: StorageBackend, hibernate_after: Option<Duration>) -> Self {
        Self {
            inner: Arc::new(RoomHandleInner {
                name,
                pool: SocketPool::new(),
                storage,
                hibernate_after,
                slot: Arc::new(Mutex::new(None)),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn pool(&self) -> &SocketPool {
        &self.inner.pool
    }

    pub fn is_awake(&self) -> bool {
        lock_slot(&self.inner.slot).is_some()
    }

    /// Nobody but the directory holds this handle and its room is asleep
    /// with no sockets left.
    fn is_unused(&self) -> bool {
        Arc::strong_count(&self.inner) == 1 && self.inner.pool.is_empty() && !self.is_awake()
    }

    pub fn send(&self, command: RoomCommand) {
        let mut tx = lock_slot(&self.inner.slot);
        let command = match tx.as_ref() {
            Some(room_tx) => match room_tx.send(command) {
                Ok(()) => return,
                Err(SendError(command)) => command,
            },
            None => command,
        };

        log::info!("Waking room {}", self.inner.name);
        let room = Room::restore(
            self.inner.name.clone(),
            self.inner.pool.clone(),
            self.inner.storage.open(&self.inner.name),
        );
        let room_tx = spawn_room(
            room,
            self.inner.hibernate_after,
            self.inner.slot.clone(),
        );
        if room_tx.send(command).is_err() {
            log::error!("Room {} stopped right after waking up", self.inner.name);
        }
        *tx = Some(room_tx);
    }
}

/// Routes room names to their handles, creating rooms on first use.
///
/// Handles are only given out under the directory lock, so a handle that is
/// unused while the lock is held can be dropped and later recreated from
/// storage without splitting the room.
#[derive(Clone)]
pub struct RoomDirectory {
    rooms: Arc<Mutex<HashMap<String, RoomHandle>>>,
    storage: StorageBackend,
    hibernate_after: Option<Duration>,
    default_room: String,
}

impl RoomDirectory {
    pub fn new(
        storage: StorageBackend,
        hibernate_after: Option<Duration>,
        default_room: impl Into<String>,
    ) -> Self {
        Self {
            rooms: Arc::new(Mutex::new(HashMap::new())),
            storage,
            hibernate_after,
            default_room: default_room.into(),
        }
    }

    pub fn default_room(&self) -> &str {
        &self.default_room
    }

    pub fn room(&self, name: &str) -> RoomHandle {
        let mut rooms = self.lock_rooms();
        evict_unused(&mut rooms);
        rooms
            .entry(name.to_owned())
            .or_insert_with(|| {
                log::info!("Creating room {}", name);
                RoomHandle::new(
                    name.to_owned(),
                    self.storage.clone(),
                    self.hibernate_after,
                )
            })
            .clone()
    }

    /// Drops every room that is asleep, empty and not referenced by any
    /// connection. Returns how many were dropped.
    pub fn evict_idle(&self) -> usize {
        evict_unused(&mut self.lock_rooms())
    }

    pub fn len(&self) -> usize {
        self.lock_rooms().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_rooms().is_empty()
    }

    fn lock_rooms(&self) -> std::sync::MutexGuard<'_, HashMap<String, RoomHandle>> {
        self.rooms.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn evict_unused(rooms: &mut HashMap<String, RoomHandle>) -> usize {
    let before = rooms.len();
    rooms.retain(|name, handle| {
        let unused = handle.is_unused();
        if unused {
            log::info!("Dropping idle room {}", name);
        }
        !unused
    });
    before - rooms.len()
}
