//! In-memory queue of mutations that could not reach the backend.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::ProjectData;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Create,
    Update,
    Delete,
}

/// A mutation that failed for connectivity reasons and awaits replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingOperation {
    pub kind: OperationKind,
    pub project_id: Option<String>,
    pub data: Option<ProjectData>,
    pub timestamp: DateTime<Utc>,
}

impl PendingOperation {
    pub fn create(data: ProjectData) -> Self {
        Self {
            kind: OperationKind::Create,
            project_id: Some(data.id.clone()),
            data: Some(data),
            timestamp: Utc::now(),
        }
    }

    pub fn update(id: impl Into<String>, data: ProjectData) -> Self {
        Self {
            kind: OperationKind::Update,
            project_id: Some(id.into()),
            data: Some(data),
            timestamp: Utc::now(),
        }
    }

    pub fn delete(id: impl Into<String>) -> Self {
        Self {
            kind: OperationKind::Delete,
            project_id: Some(id.into()),
            data: None,
            timestamp: Utc::now(),
        }
    }
}

/// FIFO of pending operations.
#[derive(Debug, Default)]
pub struct PendingQueue {
    operations: Mutex<VecDeque<PendingOperation>>,
}

impl PendingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn operations(&self) -> MutexGuard<'_, VecDeque<PendingOperation>> {
        self.operations.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Appends and returns the new queue length.
    pub fn push(&self, operation: PendingOperation) -> usize {
        let mut operations = self.operations();
        operations.push_back(operation);
        operations.len()
    }

    pub fn front(&self) -> Option<PendingOperation> {
        self.operations().front().cloned()
    }

    /// Removes the head only if it is still `expected`. A `clear` that ran
    /// while `expected` was being replayed leaves newer entries untouched.
    pub fn pop_front_if(&self, expected: &PendingOperation) -> bool {
        let mut operations = self.operations();
        if operations.front() == Some(expected) {
            operations.pop_front();
            true
        } else {
            false
        }
    }

    pub fn len(&self) -> usize {
        self.operations().len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations().is_empty()
    }

    pub fn clear(&self) {
        self.operations().clear();
    }

    pub fn snapshot(&self) -> Vec<PendingOperation> {
        self.operations().iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_order() {
        let queue = PendingQueue::new();
        queue.push(PendingOperation::create(ProjectData::with_id("a", "A")));
        queue.push(PendingOperation::delete("a"));

        let kinds: Vec<_> = queue.snapshot().iter().map(|op| op.kind).collect();
        assert_eq!(kinds, vec![OperationKind::Create, OperationKind::Delete]);
        assert_eq!(queue.front().unwrap().kind, OperationKind::Create);
    }

    #[test]
    fn test_pop_front_if_only_matches_head() {
        let queue = PendingQueue::new();
        let first = PendingOperation::delete("a");
        let second = PendingOperation::delete("b");
        queue.push(first.clone());
        queue.push(second.clone());

        assert!(!queue.pop_front_if(&second));
        assert!(queue.pop_front_if(&first));
        assert_eq!(queue.front(), Some(second));
    }

    #[test]
    fn test_pop_after_clear_is_noop() {
        let queue = PendingQueue::new();
        let op = PendingOperation::delete("a");
        queue.push(op.clone());
        queue.clear();
        queue.push(PendingOperation::delete("b"));

        assert!(!queue.pop_front_if(&op));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_serializes_kind_lowercase() {
        let op = PendingOperation::delete("p1");
        let json = serde_json::to_value(&op).unwrap();
        assert_eq!(json["kind"], "delete");
        assert_eq!(json["projectId"], "p1");
        assert!(json["data"].is_null());
    }
}
