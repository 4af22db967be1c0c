mod project;

pub use project::{ProjectData, ProjectPatch, StorageState};
