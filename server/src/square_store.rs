use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use system::{bincode, Square, SquareData, SquareId};

use crate::error::StoreError;
use crate::storage::KeyValueStore;

pub const SQUARES_KEY: &str = "squares";

/// Persisted form of the room's squares.
#[derive(Debug, Default, Serialize, Deserialize)]
struct SquareSnapshot {
    next_id: SquareId,
    squares: BTreeMap<SquareId, Square>,
}

/// Authoritative squares of one room.
///
/// Every call reads the stored snapshot first and every mutation writes the
/// whole snapshot back before returning.
pub struct SquareStore {
    kv: Arc<dyn KeyValueStore>,
    next_id: SquareId,
}

impl SquareStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv, next_id: 0 }
    }

    pub async fn get_all(&mut self) -> Result<BTreeMap<SquareId, Square>, StoreError> {
        Ok(self.load().await?.squares)
    }

    pub async fn add(&mut self, data: SquareData) -> Result<Square, StoreError> {
        let mut snapshot = self.load().await?;
        let id = snapshot.next_id;
        let square = Square::new(id, data);
        snapshot.squares.insert(id, square.clone());
        snapshot.next_id = id + 1;
        self.save(&snapshot).await?;
        self.next_id = snapshot.next_id;
        log::debug!("Added square {}", id);
        Ok(square)
    }

    /// Returns whether a square was removed. Unknown ids leave storage untouched.
    pub async fn delete(&mut self, id: SquareId) -> Result<bool, StoreError> {
        let mut snapshot = self.load().await?;
        if snapshot.squares.remove(&id).is_none() {
            log::debug!("Square {} does not exist", id);
            return Ok(false);
        }
        self.save(&snapshot).await?;
        Ok(true)
    }

    async fn load(&mut self) -> Result<SquareSnapshot, StoreError> {
        let mut snapshot = match self.kv.get(SQUARES_KEY).await? {
            Some(bytes) => bincode::deserialize::<SquareSnapshot>(&bytes).map_err(|source| {
                StoreError::Corrupt {
                    key: SQUARES_KEY.into(),
                    source,
                }
            })?,
            None => SquareSnapshot::default(),
        };
        // never hand out an id below one this instance already allocated
        let floor = snapshot
            .squares
            .keys()
            .next_back()
            .map_or(0, |last| last + 1)
            .max(self.next_id);
        snapshot.next_id = snapshot.next_id.max(floor);
        self.next_id = snapshot.next_id;
        Ok(snapshot)
    }

    async fn save(&self, snapshot: &SquareSnapshot) -> Result<(), StoreError> {
        let bytes = bincode::serialize(snapshot).map_err(|source| StoreError::Encode {
            key: SQUARES_KEY.into(),
            source,
        })?;
        self.kv.put(SQUARES_KEY, bytes).await
    }
}
