//! Backup and restore of the whole project collection.

use clap::{Args, Subcommand};
use std::fs;
use std::path::PathBuf;

use trvis_core::{ProjectRepository, StorageState};

#[derive(Args)]
pub struct StateCommand {
    #[command(subcommand)]
    pub command: StateSubcommand,
}

#[derive(Subcommand)]
pub enum StateSubcommand {
    /// Write every project and the active-project marker as JSON
    Export {
        /// Output file (default: stdout)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Replace the stored collection with a previously exported file
    Import {
        /// File produced by `state export`
        input: PathBuf,
    },
}

impl StateCommand {
    pub async fn run(
        &self,
        repo: &dyn ProjectRepository,
    ) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            StateSubcommand::Export { output } => {
                let state = repo.load_storage_state().await?;
                let json = serde_json::to_string_pretty(&state)?;

                match output {
                    Some(path) => {
                        fs::write(path, json)?;
                        println!(
                            "Exported {} project(s) to {}",
                            state.project_data.len(),
                            path.display()
                        );
                    }
                    None => println!("{}", json),
                }
                Ok(())
            }

            StateSubcommand::Import { input } => {
                let contents = fs::read_to_string(input)
                    .map_err(|e| format!("Failed to read '{}': {}", input.display(), e))?;
                let state: StorageState = serde_json::from_str(&contents)
                    .map_err(|e| format!("Failed to parse '{}': {}", input.display(), e))?;

                repo.save_storage_state(&state).await?;
                println!("Imported {} project(s)", state.project_data.len());
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::tempdir;
    use trvis_core::{
        LocalRepository, MemoryStore, ProjectData, RepositoryError, DEFAULT_STORAGE_KEY,
    };

    async fn repo() -> LocalRepository {
        let repo = LocalRepository::new(Arc::new(MemoryStore::new()), DEFAULT_STORAGE_KEY);
        repo.initialize().await.unwrap();
        repo
    }

    #[tokio::test]
    async fn test_export_then_import_into_fresh_repository() {
        let temp_dir = tempdir().unwrap();
        let backup = temp_dir.path().join("backup.json");

        let source = repo().await;
        source
            .create_project(ProjectData::with_id("a", "A"))
            .await
            .unwrap();
        source
            .create_project(ProjectData::with_id("b", "B"))
            .await
            .unwrap();
        source.set_active_project(Some("b")).await.unwrap();

        StateCommand {
            command: StateSubcommand::Export {
                output: Some(backup.clone()),
            },
        }
        .run(&source)
        .await
        .unwrap();

        let target = repo().await;
        StateCommand {
            command: StateSubcommand::Import { input: backup },
        }
        .run(&target)
        .await
        .unwrap();

        assert_eq!(
            target.load_storage_state().await.unwrap(),
            source.load_storage_state().await.unwrap()
        );
    }

    #[tokio::test]
    async fn test_import_rejects_invalid_state() {
        let temp_dir = tempdir().unwrap();
        let input = temp_dir.path().join("bad.json");
        fs::write(
            &input,
            r#"{"projectData": [], "activeProjectId": "ghost"}"#,
        )
        .unwrap();

        let repo = repo().await;
        let err = StateCommand {
            command: StateSubcommand::Import { input },
        }
        .run(&repo)
        .await
        .unwrap_err();

        assert!(err
            .downcast_ref::<RepositoryError>()
            .is_some_and(|e| matches!(e, RepositoryError::InvalidState(_))));
    }

    #[tokio::test]
    async fn test_import_missing_file() {
        let temp_dir = tempdir().unwrap();
        let repo = repo().await;
        let err = StateCommand {
            command: StateSubcommand::Import {
                input: temp_dir.path().join("absent.json"),
            },
        }
        .run(&repo)
        .await
        .unwrap_err();
        assert!(err.to_string().contains("Failed to read"));
    }
}
