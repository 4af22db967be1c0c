use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use uuid::Uuid;

use crate::repository::RepositoryError;

/// A single stored project.
///
/// `database` holds the project's nested document and `metadata` any editor
/// bookkeeping; neither is interpreted by the repository layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProjectData {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub database: Value,
    #[serde(default)]
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
}

impl ProjectData {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), name)
    }

    pub fn with_id(id: impl Into<String>, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: name.into(),
            database: Value::Object(Default::default()),
            metadata: Value::Object(Default::default()),
            created_at: now,
            last_modified: now,
        }
    }

    pub fn with_database(mut self, database: Value) -> Self {
        self.database = database;
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }

    /// Marks the record as modified now.
    pub fn touch(&mut self) {
        self.last_modified = Utc::now();
    }
}

impl fmt::Display for ProjectData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.name)?;
        writeln!(f, "{}", "=".repeat(self.name.chars().count()))?;
        writeln!(f, "ID: {}", self.id)?;
        writeln!(f, "Created: {}", self.created_at.format("%Y-%m-%d %H:%M:%S"))?;
        write!(
            f,
            "Last modified: {}",
            self.last_modified.format("%Y-%m-%d %H:%M:%S")
        )
    }
}

/// Subset of project fields for a partial update.
///
/// Fields left as `None` keep their stored value. The merge is shallow: a
/// present `database` or `metadata` replaces the stored document wholesale.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProjectPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl ProjectPatch {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn database(mut self, database: Value) -> Self {
        self.database = Some(database);
        self
    }

    pub fn metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.database.is_none() && self.metadata.is_none()
    }

    /// Returns `base` with the patched fields replaced. Identity and creation
    /// time are never touched.
    pub fn apply_to(&self, base: &ProjectData) -> ProjectData {
        let mut merged = base.clone();
        if let Some(name) = &self.name {
            merged.name = name.clone();
        }
        if let Some(database) = &self.database {
            merged.database = database.clone();
        }
        if let Some(metadata) = &self.metadata {
            merged.metadata = metadata.clone();
        }
        merged
    }
}

/// The whole persisted collection.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StorageState {
    #[serde(default)]
    pub project_data: Vec<ProjectData>,
    #[serde(default)]
    pub active_project_id: Option<String>,
}

impl StorageState {
    pub fn new(project_data: Vec<ProjectData>, active_project_id: Option<String>) -> Self {
        Self {
            project_data,
            active_project_id,
        }
    }

    pub fn find(&self, id: &str) -> Option<&ProjectData> {
        self.project_data.iter().find(|p| p.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.find(id).is_some()
    }

    /// Replaces the record with the same id. Returns false if there is none.
    pub fn replace(&mut self, project: ProjectData) -> bool {
        match self.project_data.iter_mut().find(|p| p.id == project.id) {
            Some(slot) => {
                *slot = project;
                true
            }
            None => false,
        }
    }

    /// Removes a record, moving the active pointer to the first remaining
    /// record (or clearing it) when the removed record was active.
    pub fn remove(&mut self, id: &str) -> Option<ProjectData> {
        let index = self.project_data.iter().position(|p| p.id == id)?;
        let removed = self.project_data.remove(index);

        if self.active_project_id.as_deref() == Some(id) {
            self.active_project_id = self.project_data.first().map(|p| p.id.clone());
        }

        Some(removed)
    }

    /// Checks id uniqueness and that the active pointer references a record.
    pub fn validate(&self) -> Result<(), RepositoryError> {
        let mut seen = HashSet::new();
        for project in &self.project_data {
            if !seen.insert(project.id.as_str()) {
                return Err(RepositoryError::InvalidState(format!(
                    "duplicate project id '{}'",
                    project.id
                )));
            }
        }

        if let Some(active) = &self.active_project_id {
            if !seen.contains(active.as_str()) {
                return Err(RepositoryError::InvalidState(format!(
                    "active project '{}' is not in the collection",
                    active
                )));
            }
        }

        Ok(())
    }
}
