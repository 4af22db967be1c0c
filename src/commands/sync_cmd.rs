//! Sync CLI commands for replaying pending changes against the backend.

use clap::{Args, Subcommand};

use trvis_core::{ProjectRepository, SyncStatus};

use super::OutputFormat;
use crate::config::Config;

/// Sync pending changes with the backend
///
/// Pending changes are held in memory by the running process. Each CLI
/// invocation starts with an empty queue, so these commands only report
/// what the current invocation queued.
#[derive(Args)]
pub struct SyncCommand {
    #[command(subcommand)]
    command: Option<SyncSubcommand>,
}

#[derive(Subcommand)]
enum SyncSubcommand {
    /// Show changes pending in this process and the last sync result
    ///
    /// The queue does not outlive the process, so a fresh invocation
    /// always reports nothing pending.
    Status {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Replay changes queued by this process
    ///
    /// Writes that failed in an earlier invocation are not kept and cannot
    /// be replayed here.
    Run,
}

impl SyncCommand {
    pub async fn run(
        &self,
        repo: &dyn ProjectRepository,
        config: &Config,
    ) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            None | Some(SyncSubcommand::Run) => sync(repo).await,
            Some(SyncSubcommand::Status { format }) => {
                let status = repo.sync_status();
                match format {
                    OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&status)?),
                    OutputFormat::Text => print_status(&status, config),
                }
                Ok(())
            }
        }
    }
}

async fn sync(repo: &dyn ProjectRepository) -> Result<(), Box<dyn std::error::Error>> {
    let pending = repo.sync_status().pending_changes;
    println!("Syncing {} pending change(s)...", pending);

    repo.sync().await?;

    let status = repo.sync_status();
    if status.is_synced {
        println!("Sync complete.");
    } else {
        println!("{} change(s) still pending.", status.pending_changes);
    }
    Ok(())
}

fn print_status(status: &SyncStatus, config: &Config) {
    println!("Sync Status");
    println!("===========");
    println!();

    println!("Backend:   {}", config.repository.backend);
    if let Some(url) = &config.repository.base_url {
        println!("Server:    {}", url);
    }
    println!(
        "State:     {}",
        if status.is_synced {
            "✓ synced"
        } else {
            "✗ pending"
        }
    );
    println!("Pending:   {}", status.pending_changes);
    match status.last_sync_time {
        Some(time) => println!("Last sync: {}", time.format("%Y-%m-%d %H:%M:%S UTC")),
        None => println!("Last sync: never"),
    }
    if let Some(error) = &status.sync_error {
        println!("Error:     {}", error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::{Args, Command};
    use std::sync::Arc;
    use trvis_core::{LocalRepository, MemoryStore, ProjectData, DEFAULT_STORAGE_KEY};

    #[test]
    fn test_help_says_queue_is_per_process() {
        let command = SyncCommand::augment_args(Command::new("sync"));
        for name in ["status", "run"] {
            let about = command
                .find_subcommand(name)
                .and_then(|sub| sub.get_about())
                .unwrap()
                .to_string();
            assert!(about.contains("this process"), "{}: {}", name, about);
        }
    }

    #[tokio::test]
    async fn test_run_resets_local_change_counter() {
        let repo = LocalRepository::new(Arc::new(MemoryStore::new()), DEFAULT_STORAGE_KEY);
        repo.initialize().await.unwrap();
        repo.create_project(ProjectData::new("A")).await.unwrap();
        assert_eq!(repo.sync_status().pending_changes, 1);

        sync(&repo).await.unwrap();

        let status = repo.sync_status();
        assert_eq!(status.pending_changes, 0);
        assert!(status.last_sync_time.is_some());
    }
}
