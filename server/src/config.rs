use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::storage::StorageBackend;

#[derive(Debug, Clone, Parser)]
#[command(name = "collab-server", about = "Shared cursors and squares over WebSocket")]
pub struct Config {
    /// Address to listen on.
    #[arg(long, env = "COLLAB_BIND", default_value = "127.0.0.1:8787")]
    pub bind: String,

    /// Room used by `/ws` without a room name.
    #[arg(long, env = "COLLAB_DEFAULT_ROOM", default_value = "OnlyRoom")]
    pub default_room: String,

    /// One subdirectory per room is created here.
    #[arg(long, env = "COLLAB_DATA_DIR", default_value = "data")]
    pub data_dir: PathBuf,

    /// Keep squares in memory only.
    #[arg(long, env = "COLLAB_IN_MEMORY")]
    pub in_memory: bool,

    /// Idle seconds before a room drops its in-memory state. 0 disables.
    #[arg(long, env = "COLLAB_HIBERNATE_AFTER_SECS", default_value_t = 60)]
    pub hibernate_after_secs: u64,

    /// CORS origin allowed to call the server. Any origin when unset.
    #[arg(long, env = "COLLAB_ALLOWED_ORIGIN")]
    pub allowed_origin: Option<String>,
}

impl Config {
    pub fn storage(&self) -> StorageBackend {
        if self.in_memory {
            StorageBackend::memory()
        } else {
            StorageBackend::files(&self.data_dir)
        }
    }

    pub fn hibernate_after(&self) -> Option<Duration> {
        match self.hibernate_after_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}
