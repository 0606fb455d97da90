use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio::fs;

use crate::error::StoreError;

/// Durable key-value storage backing one room.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    async fn put(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(values.get(key).cloned())
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError> {
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        values.insert(key.to_owned(), value);
        Ok(())
    }
}

/// Stores each key as a file inside one directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn file_name(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.bin", key))
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        match fs::read(self.file_name(key)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir).await?;
        let file_name = self.file_name(key);
        let tmp_name = self.dir.join(format!("{}.bin.tmp", key));
        fs::write(&tmp_name, value).await?;
        fs::rename(&tmp_name, &file_name).await?;
        log::debug!("Wrote {}", file_name.display());
        Ok(())
    }
}

/// Where rooms keep their squares.
#[derive(Debug, Clone)]
pub enum StorageBackend {
    /// Lost when the process exits.
    Memory(Arc<Mutex<HashMap<String, Arc<MemoryStore>>>>),
    Files(PathBuf),
}

impl StorageBackend {
    pub fn memory() -> Self {
        Self::Memory(Arc::new(Mutex::new(HashMap::new())))
    }

    pub fn files(data_dir: impl Into<PathBuf>) -> Self {
        Self::Files(data_dir.into())
    }

    /// Opens the store for `room`. Opening the same room twice yields the
    /// same underlying data.
    pub fn open(&self, room: &str) -> Arc<dyn KeyValueStore> {
        match self {
            Self::Memory(stores) => {
                let mut stores = stores.lock().unwrap_or_else(PoisonError::into_inner);
                let store: Arc<dyn KeyValueStore> = stores
                    .entry(room.to_owned())
                    .or_insert_with(|| Arc::new(MemoryStore::new()))
                    .clone();
                store
            }
            Self::Files(data_dir) => Arc::new(FileStore::new(data_dir.join(room))),
        }
    }
}
