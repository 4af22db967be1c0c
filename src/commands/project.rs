use clap::{Args, Subcommand};
use serde_json::Value;
use std::io::{self, Write};

use trvis_core::{ProjectData, ProjectPatch, ProjectRepository};

use super::OutputFormat;

#[derive(Args)]
pub struct ProjectCommand {
    #[command(subcommand)]
    pub command: ProjectSubcommand,
}

#[derive(Subcommand)]
pub enum ProjectSubcommand {
    /// Create a new project
    Create {
        /// Name of the project
        name: String,

        /// Project ID (default: generated UUID)
        #[arg(long)]
        id: Option<String>,

        /// Database document as JSON
        #[arg(long)]
        database: Option<String>,

        /// Metadata document as JSON
        #[arg(long)]
        metadata: Option<String>,

        /// Make the new project the active one
        #[arg(long)]
        activate: bool,
    },

    /// List all projects
    List {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Show a project's details
    Show {
        /// Project ID
        id: String,

        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Rename a project
    Rename {
        /// Project ID
        id: String,

        /// New name
        name: String,
    },

    /// Delete a project
    Delete {
        /// Project ID
        id: String,

        /// Skip confirmation prompt
        #[arg(long, short)]
        force: bool,
    },

    /// Set the active project, or clear it when no ID is given
    Activate {
        /// Project ID
        id: Option<String>,
    },
}

fn parse_document(flag: &str, raw: &str) -> Result<Value, Box<dyn std::error::Error>> {
    serde_json::from_str(raw).map_err(|e| format!("Invalid JSON for --{}: {}", flag, e).into())
}

impl ProjectCommand {
    pub async fn run(
        &self,
        repo: &dyn ProjectRepository,
    ) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            ProjectSubcommand::Create {
                name,
                id,
                database,
                metadata,
                activate,
            } => {
                if name.trim().is_empty() {
                    return Err("Project name cannot be empty".into());
                }

                let mut project = match id {
                    Some(id) => ProjectData::with_id(id, name.trim()),
                    None => ProjectData::new(name.trim()),
                };
                if let Some(raw) = database {
                    project = project.with_database(parse_document("database", raw)?);
                }
                if let Some(raw) = metadata {
                    project = project.with_metadata(parse_document("metadata", raw)?);
                }

                let created = repo.create_project(project).await?;
                if *activate {
                    repo.set_active_project(Some(created.id.as_str())).await?;
                }

                println!("Created project:");
                println!("{}", created);
                Ok(())
            }

            ProjectSubcommand::List { format } => {
                let state = repo.get_all_projects().await?;
                let projects = state.project_data;

                if projects.is_empty() {
                    println!("No projects found");
                    return Ok(());
                }

                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(&projects)?);
                    }
                    OutputFormat::Text => {
                        println!("  {:<36}  {:<30}  MODIFIED", "ID", "NAME");
                        println!("{}", "-".repeat(90));
                        for project in &projects {
                            let marker =
                                if state.active_project_id.as_deref() == Some(project.id.as_str()) {
                                    "*"
                                } else {
                                    " "
                                };
                            let name = if project.name.chars().count() > 30 {
                                format!("{}...", project.name.chars().take(27).collect::<String>())
                            } else {
                                project.name.clone()
                            };
                            println!(
                                "{} {:<36}  {:<30}  {}",
                                marker,
                                project.id,
                                name,
                                project.last_modified.format("%Y-%m-%d %H:%M")
                            );
                        }
                        println!("\nTotal: {} project(s)", projects.len());
                    }
                }
                Ok(())
            }

            ProjectSubcommand::Show { id, format } => {
                let project = repo.get_project(id).await?;
                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(&project)?);
                    }
                    OutputFormat::Text => {
                        println!("{}", project);
                    }
                }
                Ok(())
            }

            ProjectSubcommand::Rename { id, name } => {
                if name.trim().is_empty() {
                    return Err("Project name cannot be empty".into());
                }

                let updated = repo
                    .update_project_partial(id, ProjectPatch::default().name(name.trim()))
                    .await?;
                println!("Renamed project:");
                println!("{}", updated);
                Ok(())
            }

            ProjectSubcommand::Delete { id, force } => {
                let project = repo.get_project(id).await?;

                if !force {
                    print!("Delete project '{}'? [y/N] ", project.name);
                    io::stdout().flush()?;

                    let mut input = String::new();
                    io::stdin().read_line(&mut input)?;

                    if !input.trim().eq_ignore_ascii_case("y") {
                        println!("Deletion cancelled.");
                        return Ok(());
                    }
                }

                repo.delete_project(&project.id).await?;
                println!("Deleted project: {}", project.name);
                Ok(())
            }

            ProjectSubcommand::Activate { id } => {
                repo.set_active_project(id.as_deref()).await?;
                match id {
                    Some(id) => println!("Active project: {}", id),
                    None => println!("Active project cleared"),
                }
                Ok(())
            }
        }
    }
}
