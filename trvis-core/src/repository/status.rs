use chrono::{DateTime, Utc};
use serde::Serialize;

/// Snapshot of a repository's synchronization state.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub is_synced: bool,
    pub last_sync_time: Option<DateTime<Utc>>,
    pub pending_changes: usize,
    pub sync_error: Option<String>,
}

impl SyncStatus {
    /// Builds a status where `is_synced` is derived from the other fields.
    pub fn derive(
        pending_changes: usize,
        last_sync_time: Option<DateTime<Utc>>,
        sync_error: Option<String>,
    ) -> Self {
        Self {
            is_synced: pending_changes == 0 && sync_error.is_none(),
            last_sync_time,
            pending_changes,
            sync_error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synced_only_without_pending_or_error() {
        assert!(SyncStatus::derive(0, None, None).is_synced);
        assert!(!SyncStatus::derive(2, None, None).is_synced);
        assert!(!SyncStatus::derive(0, None, Some("boom".into())).is_synced);
    }
}
