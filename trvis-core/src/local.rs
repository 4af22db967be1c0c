//! Repository backed by a single key in a persistent key-value store.
//!
//! The whole collection lives under one key as a serialized
//! [`StorageState`]. Every mutation loads that state, applies one change and
//! writes it back while holding the instance lock, so mutations through one
//! `LocalRepository` never interleave. Two repositories pointed at the same
//! key are last-writer-wins; the registry hands out one instance per key.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{ProjectData, StorageState};
use crate::repository::{ProjectRepository, RepositoryError, RepositoryResult, SyncStatus};
use crate::store::KeyValueStore;

/// Default key the collection is stored under.
pub const DEFAULT_STORAGE_KEY: &str = "trvis-projects";

/// Appended to the storage key to name the scratch value written and removed
/// during `initialize`. Storage keys may not end with it.
const PROBE_SUFFIX: &str = ".probe";

#[derive(Debug, Default)]
struct LocalSyncState {
    pending_changes: usize,
    last_sync_time: Option<DateTime<Utc>>,
}

pub struct LocalRepository {
    store: Arc<dyn KeyValueStore>,
    storage_key: String,
    ready: AtomicBool,
    /// Held for the full duration of every read-modify-write.
    sync_state: Mutex<LocalSyncState>,
}

impl LocalRepository {
    pub fn new(store: Arc<dyn KeyValueStore>, storage_key: impl Into<String>) -> Self {
        Self {
            store,
            storage_key: storage_key.into(),
            ready: AtomicBool::new(false),
            sync_state: Mutex::new(LocalSyncState::default()),
        }
    }

    pub fn storage_key(&self) -> &str {
        &self.storage_key
    }

    fn lock(&self) -> MutexGuard<'_, LocalSyncState> {
        self.sync_state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn ensure_ready(&self) -> RepositoryResult<()> {
        if self.is_ready() {
            Ok(())
        } else {
            Err(RepositoryError::NotInitialized)
        }
    }

    fn parse_state(&self, raw: &str) -> RepositoryResult<StorageState> {
        serde_json::from_str(raw).map_err(|e| RepositoryError::Corrupted {
            key: self.storage_key.clone(),
            message: e.to_string(),
        })
    }

    /// Loads the stored state. A missing key is an empty collection.
    fn read_state(&self) -> RepositoryResult<StorageState> {
        match self.store.get(&self.storage_key)? {
            Some(raw) => self.parse_state(&raw),
            None => Ok(StorageState::default()),
        }
    }

    fn write_state(&self, state: &StorageState) -> RepositoryResult<()> {
        let raw = serde_json::to_string(state)?;
        self.store.set(&self.storage_key, &raw)?;
        Ok(())
    }

    /// Runs one read-modify-write cycle. The state is only written back when
    /// `change` succeeds.
    fn mutate<T>(
        &self,
        change: impl FnOnce(&mut StorageState) -> RepositoryResult<T>,
    ) -> RepositoryResult<T> {
        self.ensure_ready()?;
        let mut sync_state = self.lock();

        let mut state = self.read_state()?;
        let result = change(&mut state)?;
        self.write_state(&state)?;

        sync_state.pending_changes += 1;
        Ok(result)
    }
}

#[async_trait]
impl ProjectRepository for LocalRepository {
    async fn initialize(&self) -> RepositoryResult<()> {
        if self.storage_key.ends_with(PROBE_SUFFIX) {
            return Err(RepositoryError::Storage(format!(
                "storage key '{}' is reserved",
                self.storage_key
            )));
        }

        let probe_key = format!("{}{}", self.storage_key, PROBE_SUFFIX);
        self.store
            .set(&probe_key, "probe")
            .and_then(|_| self.store.remove(&probe_key))
            .map_err(|e| RepositoryError::Storage(format!("store is not writable: {}", e)))?;

        if let Some(raw) = self.store.get(&self.storage_key)? {
            let state = self.parse_state(&raw)?;
            tracing::debug!(
                key = %self.storage_key,
                projects = state.project_data.len(),
                "Loaded existing storage state"
            );
        }

        self.ready.store(true, Ordering::SeqCst);
        tracing::info!(key = %self.storage_key, "Local repository initialized");
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    async fn get_projects(&self) -> RepositoryResult<Vec<ProjectData>> {
        self.ensure_ready()?;
        Ok(self.read_state()?.project_data)
    }

    async fn get_project(&self, id: &str) -> RepositoryResult<ProjectData> {
        self.ensure_ready()?;
        self.read_state()?
            .find(id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))
    }

    async fn create_project(&self, data: ProjectData) -> RepositoryResult<ProjectData> {
        self.mutate(|state| {
            if state.contains(&data.id) {
                return Err(RepositoryError::Conflict(data.id.clone()));
            }
            state.project_data.push(data.clone());
            Ok(data)
        })
    }

    async fn update_project(&self, id: &str, data: ProjectData) -> RepositoryResult<ProjectData> {
        self.mutate(|state| {
            let mut updated = data;
            updated.id = id.to_string();
            updated.touch();

            if !state.replace(updated.clone()) {
                return Err(RepositoryError::NotFound(id.to_string()));
            }
            Ok(updated)
        })
    }

    async fn delete_project(&self, id: &str) -> RepositoryResult<()> {
        self.mutate(|state| {
            state
                .remove(id)
                .map(|_| ())
                .ok_or_else(|| RepositoryError::NotFound(id.to_string()))
        })
    }

    async fn project_exists(&self, id: &str) -> RepositoryResult<bool> {
        self.ensure_ready()?;
        Ok(self.read_state()?.contains(id))
    }

    async fn set_active_project(&self, id: Option<&str>) -> RepositoryResult<()> {
        self.mutate(|state| {
            if let Some(id) = id {
                if !state.contains(id) {
                    return Err(RepositoryError::NotFound(id.to_string()));
                }
            }
            state.active_project_id = id.map(String::from);
            Ok(())
        })
    }

    async fn get_all_projects(&self) -> RepositoryResult<StorageState> {
        self.ensure_ready()?;
        self.read_state()
    }

    async fn save_storage_state(&self, state: &StorageState) -> RepositoryResult<()> {
        self.ensure_ready()?;
        state.validate()?;
        self.mutate(|current| {
            *current = state.clone();
            Ok(())
        })
    }

    async fn load_storage_state(&self) -> RepositoryResult<StorageState> {
        self.ensure_ready()?;
        self.read_state()
    }

    fn sync_status(&self) -> SyncStatus {
        let sync_state = self.lock();
        SyncStatus {
            is_synced: true,
            last_sync_time: sync_state.last_sync_time,
            pending_changes: sync_state.pending_changes,
            sync_error: None,
        }
    }

    /// Nothing to reconcile against; records the sync time and resets the
    /// change counter.
    async fn sync(&self) -> RepositoryResult<()> {
        let mut sync_state = self.lock();
        sync_state.pending_changes = 0;
        sync_state.last_sync_time = Some(Utc::now());
        Ok(())
    }

    async fn clear_pending(&self) -> RepositoryResult<()> {
        self.lock().pending_changes = 0;
        Ok(())
    }

    async fn close(&self) {
        if self.ready.swap(false, Ordering::SeqCst) {
            tracing::debug!(key = %self.storage_key, "Local repository closed");
        }
    }
}
