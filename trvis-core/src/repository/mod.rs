//! Repository contract shared by every storage backend.
//!
//! Callers obtain a `ProjectRepository` from the
//! [`RepositoryRegistry`](crate::factory::RepositoryRegistry) and never
//! construct adapters directly. Every operation reports failure through
//! [`RepositoryResult`]; adapters convert their internal faults into a
//! [`RepositoryError`] rather than panicking.

mod error;
mod status;

use async_trait::async_trait;

use crate::models::{ProjectData, ProjectPatch, StorageState};

pub use error::{RepositoryError, RepositoryResult};
pub use status::SyncStatus;

#[async_trait]
pub trait ProjectRepository: Send + Sync {
    /// Prepares the backend. Call once per instance, before anything else.
    async fn initialize(&self) -> RepositoryResult<()>;

    /// True once `initialize` has succeeded.
    fn is_ready(&self) -> bool;

    async fn get_projects(&self) -> RepositoryResult<Vec<ProjectData>>;

    async fn get_project(&self, id: &str) -> RepositoryResult<ProjectData>;

    /// Stores a new project. Fails with `Conflict` if the id is taken.
    async fn create_project(&self, data: ProjectData) -> RepositoryResult<ProjectData>;

    /// Replaces a stored project. The record keeps `id` regardless of
    /// `data.id`, and its `last_modified` is refreshed.
    async fn update_project(&self, id: &str, data: ProjectData) -> RepositoryResult<ProjectData>;

    /// Reads the current record, merges `patch` into it and writes it back
    /// through `update_project`.
    async fn update_project_partial(
        &self,
        id: &str,
        patch: ProjectPatch,
    ) -> RepositoryResult<ProjectData> {
        let current = self.get_project(id).await?;
        let merged = patch.apply_to(&current);
        self.update_project(id, merged).await
    }

    async fn delete_project(&self, id: &str) -> RepositoryResult<()>;

    async fn project_exists(&self, id: &str) -> RepositoryResult<bool> {
        match self.get_project(id).await {
            Ok(_) => Ok(true),
            Err(RepositoryError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Points the active-project marker at `id`, or clears it.
    async fn set_active_project(&self, id: Option<&str>) -> RepositoryResult<()>;

    async fn get_all_projects(&self) -> RepositoryResult<StorageState>;

    async fn save_storage_state(&self, state: &StorageState) -> RepositoryResult<()>;

    async fn load_storage_state(&self) -> RepositoryResult<StorageState>;

    fn sync_status(&self) -> SyncStatus;

    /// Reconciles local intent with the backend.
    async fn sync(&self) -> RepositoryResult<()>;

    /// Drops every pending change without replaying it.
    async fn clear_pending(&self) -> RepositoryResult<()>;

    /// Releases resources. Safe to call more than once.
    async fn close(&self);
}
