//! Command-line front end for the Lumen updater.
//!
//! Thin glue over `lumen-core`: argument parsing, tracing setup, and a
//! console progress sink. All pipeline logic lives in the core crate.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, bail};
use clap::{Parser, Subcommand};

use lumen_core::pipeline::{Pipeline, PipelineOptions};
use lumen_core::reconcile::ReconcileOptions;
use lumen_core::settings::JsonFileStore;
use lumen_core::{InstallRoot, Progress};
use lumen_schema::manifest::{IndexDocument, LaunchMetadata};
use lumen_schema::runtime::RuntimeDescriptor;

mod progress;

use progress::ConsoleProgress;

#[derive(Parser, Debug)]
#[command(name = "lumen", version, about = "Game client updater and repair tool")]
struct Cli {
    /// Installation root (defaults to $LUMEN_HOME, else ~/.lumen)
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Update API root URL
    #[arg(
        long,
        global = true,
        default_value = "https://api.lumen.example.com/api"
    )]
    api_url: String,

    /// URL of the upstream default config document
    #[arg(
        long,
        global = true,
        default_value = "https://api.lumen.example.com/config.example.json"
    )]
    default_config_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Synchronize the installation with the remote manifests
    Sync {
        /// Path to the launch metadata JSON supplied by the launcher
        metadata: PathBuf,
    },
    /// Manage downloaded runtimes
    Runtime {
        #[command(subcommand)]
        action: RuntimeAction,
    },
    /// Audit a local tree against an index file without fetching anything
    Verify {
        /// Path to a newline-delimited index document
        index: PathBuf,
        /// Directory the index paths are relative to
        dir: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
enum RuntimeAction {
    /// Download, extract, and install a runtime from a descriptor file
    Install {
        /// Path to the runtime descriptor JSON
        descriptor: PathBuf,
    },
    /// Delete an installed runtime
    Remove {
        /// Runtime name
        name: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let root = match &cli.root {
        Some(path) => InstallRoot::at(path.clone()),
        None => InstallRoot::resolve()
            .context("could not determine the installation root; set --root or LUMEN_HOME")?,
    };

    match &cli.command {
        Command::Sync { metadata } => run_sync(&cli, root, metadata).await,
        Command::Runtime { action } => run_runtime(&cli, root, action).await,
        Command::Verify { index, dir } => run_verify(index, dir).await,
    }
}

fn build_pipeline(cli: &Cli, root: InstallRoot, store: JsonFileStore) -> Pipeline {
    Pipeline::new(
        reqwest::Client::new(),
        root,
        Arc::new(store),
        Arc::new(ConsoleProgress),
        PipelineOptions {
            api_url: cli.api_url.clone(),
            default_config_url: cli.default_config_url.clone(),
            reconcile: ReconcileOptions::default(),
            fetch: lumen_core::fetch::FetchOptions::default(),
        },
    )
}

async fn run_sync(cli: &Cli, root: InstallRoot, metadata_path: &PathBuf) -> anyhow::Result<()> {
    let raw = tokio::fs::read_to_string(metadata_path)
        .await
        .with_context(|| format!("reading {}", metadata_path.display()))?;
    let metadata: LaunchMetadata =
        serde_json::from_str(&raw).context("parsing launch metadata")?;

    let store = JsonFileStore::open(root.settings_path()).await?;
    let pipeline = build_pipeline(cli, root, store);

    let report = pipeline.run(&metadata).await.context("update pipeline")?;
    for stage in &report.stages {
        let status = if stage.ok { "ok" } else { "FAILED" };
        tracing::info!(
            stage = stage.stage,
            status,
            detail = stage.detail.as_deref().unwrap_or("-")
        );
    }
    if !report.success() {
        bail!("one or more update stages failed");
    }
    Ok(())
}

async fn run_runtime(cli: &Cli, root: InstallRoot, action: &RuntimeAction) -> anyhow::Result<()> {
    let store = JsonFileStore::open(root.settings_path()).await?;
    let pipeline = build_pipeline(cli, root, store);

    match action {
        RuntimeAction::Install { descriptor } => {
            let raw = tokio::fs::read_to_string(descriptor)
                .await
                .with_context(|| format!("reading {}", descriptor.display()))?;
            let descriptor: RuntimeDescriptor =
                serde_json::from_str(&raw).context("parsing runtime descriptor")?;
            if pipeline.acquire_runtime(&descriptor).await? {
                tracing::info!(runtime = descriptor.name, "runtime installed");
                Ok(())
            } else {
                bail!("runtime {} could not be installed", descriptor.name)
            }
        }
        RuntimeAction::Remove { name } => {
            pipeline.remove_runtime(name).await?;
            Ok(())
        }
    }
}

/// Dry-run hash audit: parse the index, hash every local file, report.
async fn run_verify(index_path: &PathBuf, dir: &PathBuf) -> anyhow::Result<()> {
    let raw = tokio::fs::read_to_string(index_path)
        .await
        .with_context(|| format!("reading {}", index_path.display()))?;
    // No fetches are issued, so the base URL never leaves this process.
    let document = IndexDocument::parse(&raw, "");

    let mut stale = 0usize;
    for entry in &document.entries {
        let path = dir.join(&entry.local_path);
        if !lumen_core::verify::verify_file(&path, &entry.hash).await {
            stale += 1;
            ConsoleProgress.warn(&format!("stale or missing: {}", entry.local_path.display()));
        }
    }

    tracing::info!(
        entries = document.len(),
        skipped_lines = document.skipped,
        stale,
        "verification complete"
    );
    if stale > 0 {
        bail!("{stale} of {} entries need repair", document.len());
    }
    Ok(())
}
