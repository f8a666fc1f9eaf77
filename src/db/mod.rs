//! Job persistence backends.
//!
//! - **memory**: [`InMemoryJobStore`], process-local, lost on restart
//! - **sqlite**: [`SqlJobStore`] on a local libsql file
//! - **turso**: [`SqlJobStore`] on a remote Turso database
//!
//! Only the libsql backends support restart recovery.

pub mod turso;

pub use turso::SqlJobStore;

use crate::jobs::{InMemoryJobStore, JobStore};
use crate::types::Result;
use std::sync::Arc;

/// Storage backend selection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum StorageProvider {
    #[default]
    Memory,
    SQLite {
        path: String,
    },
    Turso {
        url: String,
        auth_token: String,
    },
}

impl StorageProvider {
    pub async fn create_store(&self) -> Result<Arc<dyn JobStore>> {
        match self {
            StorageProvider::Memory => Ok(Arc::new(InMemoryJobStore::new())),
            StorageProvider::SQLite { path } => {
                let store = SqlJobStore::new_local(path).await?;
                Ok(Arc::new(store))
            }
            StorageProvider::Turso { url, auth_token } => {
                let store = SqlJobStore::new_remote(url.clone(), auth_token.clone()).await?;
                Ok(Arc::new(store))
            }
        }
    }

    /// Whether jobs survive a process restart
    pub fn is_durable(&self) -> bool {
        match self {
            StorageProvider::Memory => false,
            StorageProvider::SQLite { path } => path != ":memory:",
            StorageProvider::Turso { .. } => true,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            StorageProvider::Memory => "memory",
            StorageProvider::SQLite { .. } => "sqlite",
            StorageProvider::Turso { .. } => "turso",
        }
    }
}
