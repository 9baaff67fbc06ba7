//! PDF Studio CLI - Arrange pages from several PDFs and merge them into one.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use pdf_studio_core::{AppConfig, Arrangement, MergeStage, SourceLink, Studio, WorkspaceId};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "pdf-studio")]
#[command(author, version, about = "Arrange PDF pages into workspaces and merge them", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Workspace database directory
    #[arg(long, env = "PDF_STUDIO_DATA_DIR", global = true)]
    data_dir: Option<PathBuf>,

    /// Directory merged PDFs are saved to
    #[arg(long, env = "PDF_STUDIO_OUTPUT_DIR", global = true)]
    output_dir: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create an empty workspace
    New {
        /// Workspace name (default from config)
        name: Option<String>,
    },
    /// List workspaces, most recently modified first
    List,
    /// Show the pages of a workspace in merge order
    Show { workspace: WorkspaceId },
    /// Append every page of the given PDFs
    Add {
        workspace: WorkspaceId,
        #[arg(required = true)]
        files: Vec<String>,
    },
    /// Move the page at one position to another (1-based)
    Move {
        workspace: WorkspaceId,
        from: usize,
        to: usize,
    },
    /// Remove the page at a position (1-based)
    Remove { workspace: WorkspaceId, position: usize },
    /// Rename a workspace
    Rename { workspace: WorkspaceId, name: String },
    /// Copy a workspace's pages into a new workspace
    Clone { workspace: WorkspaceId },
    /// Delete a workspace and its pages
    Delete { workspace: WorkspaceId },
    /// Merge a workspace into one PDF and retire the workspace
    Merge { workspace: WorkspaceId },
    /// List merged documents, newest first
    Merged,
    /// Delete a merged document and its file
    DeleteMerged { id: Uuid },
    /// Render a page preview to a PNG file
    Preview {
        workspace: WorkspaceId,
        /// Page position (1-based)
        position: usize,
        /// PNG file to write
        #[arg(short, long)]
        output: PathBuf,
        /// Render at full-screen size instead of thumbnail size
        #[arg(long)]
        full: bool,
    },
}

// CLI output is intentional
#[allow(clippy::print_stdout)]
fn say(line: impl std::fmt::Display) {
    println!("{line}");
}

/// Print and clear the session's pending notice
fn show_notice(editor: &Arrangement) {
    if let Some(notice) = editor.snapshot().notice {
        say(notice);
        editor.clear_notice();
    }
}

fn print_pages(editor: &Arrangement) {
    let ws = editor.workspace();
    say(format!("{} ({}), {} pages", ws.name, ws.id, editor.items().len()));
    for (position, item) in editor.items().iter().enumerate() {
        say(format!(
            "{:>4}  {} p.{}  {}x{}",
            position + 1,
            item.source_uri,
            item.page_index + 1,
            item.width,
            item.height
        ));
    }
}

/// Convert a 1-based position from the command line
fn position_index(position: usize, len: usize) -> Result<usize> {
    if position == 0 || position > len {
        bail!("Position {position} out of range (workspace has {len} pages)");
    }
    Ok(position - 1)
}

fn open_existing(studio: &Studio, id: WorkspaceId) -> Result<Arrangement> {
    if studio.store().workspace(id)?.is_none() {
        bail!("Workspace {id} not found");
    }
    studio
        .open_workspace(Some(id))
        .context(format!("Failed to open workspace {id}"))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (before parsing args so env vars are available)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Setup logging
    let log_level = match args.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    // Load or create config
    let mut config = if let Some(config_path) = &args.config {
        AppConfig::from_file(config_path).context("Failed to load config file")?
    } else {
        AppConfig::load()
    };

    // Override config with CLI arguments
    if let Some(dir) = args.data_dir {
        config.storage.data_dir = Some(dir);
    }
    if let Some(dir) = args.output_dir {
        config.storage.output_dir = Some(dir);
    }

    let studio = Studio::open(config).context("Failed to open workspace store")?;

    match args.command {
        Command::New { name } => {
            let ws = studio.create_workspace(name.as_deref())?;
            say(format!("Created {} ({})", ws.name, ws.id));
        }

        Command::List => {
            for ws in studio.store().workspaces()? {
                say(format!(
                    "{}  {}  ({} pages)",
                    ws.id,
                    ws.name,
                    studio.store().page_count(ws.id)
                ));
            }
        }

        Command::Show { workspace } => {
            let editor = open_existing(&studio, workspace)?;
            print_pages(&editor);
        }

        Command::Add { workspace, files } => {
            let mut editor = studio
                .open_workspace(Some(workspace))
                .context("Failed to open workspace")?;
            show_notice(&editor);

            let report = editor
                .add_documents(files.as_slice())
                .await
                .context("Failed to save the arrangement")?;
            for failed in &report.failed {
                say(format!("Skipped unreadable document: {failed}"));
            }
            info!("Added {} pages", report.pages_added);
            print_pages(&editor);
        }

        Command::Move { workspace, from, to } => {
            let mut editor = open_existing(&studio, workspace)?;
            let len = editor.items().len();
            let moved = editor.reorder(position_index(from, len)?, position_index(to, len)?)?;
            if !moved {
                say("Nothing to move");
            }
            print_pages(&editor);
        }

        Command::Remove {
            workspace,
            position,
        } => {
            let mut editor = open_existing(&studio, workspace)?;
            let index = position_index(position, editor.items().len())?;
            let session_id = editor.items()[index].session_id;
            editor.remove(session_id)?;
            print_pages(&editor);
        }

        Command::Rename { workspace, name } => {
            let mut editor = open_existing(&studio, workspace)?;
            if editor.rename(&name)? {
                say(format!("Renamed to {}", editor.workspace().name));
            } else {
                say("Name unchanged");
            }
        }

        Command::Clone { workspace } => {
            let copy = studio.store().clone_workspace(workspace)?;
            say(format!(
                "Created {} ({}) with {} pages",
                copy.name,
                copy.id,
                studio.store().page_count(copy.id)
            ));
        }

        Command::Delete { workspace } => {
            if studio.store().delete_workspace(workspace)? {
                say(format!("Deleted workspace {workspace}"));
            } else {
                bail!("Workspace {workspace} not found");
            }
        }

        Command::Merge { workspace } => {
            studio.start().await.context("Failed to start merge engine")?;
            let mut editor = open_existing(&studio, workspace)?;

            let spinner = ProgressBar::new_spinner();
            // Template is hardcoded and valid, unwrap is safe
            #[allow(clippy::unwrap_used)]
            spinner.set_style(
                ProgressStyle::default_spinner()
                    .template("{spinner:.green} [{elapsed_precise}] {msg}")
                    .unwrap(),
            );
            spinner.enable_steady_tick(Duration::from_millis(100));

            let on_stage = |stage: MergeStage| spinner.set_message(stage.to_string());
            let result = editor.merge(studio.pipeline(), Some(&on_stage)).await;

            match result {
                Ok(outcome) => {
                    spinner.finish_with_message("Merge complete");
                    say(format!(
                        "Merged PDF saved to: {}",
                        outcome.merged.output_locator
                    ));
                }
                Err(e) => {
                    spinner.abandon_with_message("Merge failed");
                    let notice = editor
                        .snapshot()
                        .notice
                        .unwrap_or_else(|| e.user_message());
                    return Err(e).context(notice);
                }
            }
        }

        Command::Merged => {
            for doc in studio.store().merged_documents()? {
                let source = match studio.store().merge_source(&doc)? {
                    SourceLink::Workspace(ws) => ws.name,
                    SourceLink::Unknown => "source unknown".to_string(),
                };
                say(format!(
                    "{}  {}  {}  ({})",
                    doc.id, doc.name, doc.output_locator, source
                ));
            }
        }

        Command::DeleteMerged { id } => {
            if studio.delete_merged_document(id).await? {
                say(format!("Deleted merged document {id}"));
            } else {
                bail!("Merged document {id} not found");
            }
        }

        Command::Preview {
            workspace,
            position,
            output,
            full,
        } => {
            let mut editor = open_existing(&studio, workspace)?;
            let index = position_index(position, editor.items().len())?;
            let session_id = editor.items()[index].session_id;

            let Some(preview) = editor.preview(session_id, full).await else {
                bail!("Could not render page {position}");
            };
            std::fs::write(&output, &preview.png)
                .context(format!("Failed to write preview: {}", output.display()))?;
            say(format!(
                "Wrote {}x{} preview to {}",
                preview.width,
                preview.height,
                output.display()
            ));
        }
    }

    studio.store().flush()?;
    Ok(())
}
