//! Trvis Core Library
//!
//! Project repository contract with a local key-value backend and a
//! remote HTTP backend that queues writes while offline.

pub mod factory;
pub mod local;
pub mod models;
pub mod network;
pub mod repository;
pub mod store;

pub use factory::{BackendKind, FactoryError, RepositoryConfig, RepositoryRegistry};
pub use local::{LocalRepository, DEFAULT_STORAGE_KEY};
pub use models::{ProjectData, ProjectPatch, StorageState};
pub use network::{
    ConnectivityMonitor, ConnectivityWatcher, ErrorCallback, HttpTransport, NetworkConfig,
    NetworkRepository, PendingOperation, Transport,
};
pub use repository::{ProjectRepository, RepositoryError, RepositoryResult, SyncStatus};
pub use store::{FileStore, KeyValueStore, MemoryStore, StoreError};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }
}
