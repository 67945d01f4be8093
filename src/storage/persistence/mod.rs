//! Persistence of service statuses across restarts

pub mod file;
pub mod flush;

pub use file::FileBackend;
pub use flush::{flush_blocking, run_flush, FlushWorker};

use chrono::{DateTime, Utc};

use crate::data::ServiceStatus;

/// Trait for persistence backends
pub trait PersistenceBackend: Send + Sync {
    /// Replace the persisted state with `snapshot`
    fn save(&self, snapshot: &StoreSnapshot) -> Result<(), PersistenceError>;

    /// Read the persisted state, if any
    fn load(&self) -> Result<Option<StoreSnapshot>, PersistenceError>;
}

/// Everything a store persists
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct StoreSnapshot {
    /// Format version for compatibility
    pub version: u32,
    /// Creation timestamp
    pub saved_at: DateTime<Utc>,
    pub statuses: Vec<ServiceStatus>,
}

impl StoreSnapshot {
    pub const VERSION: u32 = 1;
}

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Corrupted data: {0}")]
    Corrupted(String),

    #[error("Unsupported snapshot version {0}")]
    UnsupportedVersion(u32),
}
