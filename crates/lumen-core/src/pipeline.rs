//! Pipeline orchestration.
//!
//! Sequences the update stages against the remote updater index and the
//! launch metadata: patch-layer upgrade (with config merge), then asset
//! and game-file reconciliation concurrently. Stage failures are reported
//! and recorded but do not stop later independent stages; only a missing
//! updater index aborts the manifest-dependent stages outright.

use std::path::Path;
use std::sync::Arc;

use reqwest::Client;
use serde_json::Value;

use lumen_schema::hash::HashValue;
use lumen_schema::manifest::{IndexDocument, LaunchMetadata, UpdaterIndex};
use lumen_schema::runtime::RuntimeDescriptor;

use crate::config;
use crate::error::UpdateError;
use crate::fetch::{FetchOptions, FetchRequest};
use crate::paths::InstallRoot;
use crate::progress::Progress;
use crate::reconcile::{self, ReconcileOptions, ReconcileStats};
use crate::runtime::RuntimeStore;
use crate::settings::{keys, SettingsStore};

/// Component name of the patch layer in the updater index.
const PATCH_COMPONENT: &str = "patcher";

/// Component name of the engine in the updater index.
const ENGINE_COMPONENT: &str = "engine";

/// Pipeline-wide configuration.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Root of the update API, e.g. `https://api.example.com/api`.
    pub api_url: String,
    /// Where the upstream default config document is published.
    pub default_config_url: String,
    /// Reconciliation tuning (batch size, fan-out).
    pub reconcile: ReconcileOptions,
    /// Transfer tuning for single-artifact fetches.
    pub fetch: FetchOptions,
}

/// Outcome of one named stage.
#[derive(Debug, Clone)]
pub struct StageOutcome {
    /// Human-readable stage name.
    pub stage: &'static str,
    /// Whether the stage completed without error.
    pub ok: bool,
    /// Extra detail: failure cause or reconciliation counters.
    pub detail: Option<String>,
}

/// Per-stage record of one pipeline run.
#[derive(Debug, Clone, Default)]
pub struct PipelineReport {
    /// Stage outcomes in execution order.
    pub stages: Vec<StageOutcome>,
}

impl PipelineReport {
    /// Overall success: the conjunction of every stage.
    pub fn success(&self) -> bool {
        self.stages.iter().all(|s| s.ok)
    }

    fn record(&mut self, stage: &'static str, result: Result<Option<String>, UpdateError>) {
        match result {
            Ok(detail) => self.stages.push(StageOutcome {
                stage,
                ok: true,
                detail,
            }),
            Err(err) => self.stages.push(StageOutcome {
                stage,
                ok: false,
                detail: Some(err.to_string()),
            }),
        }
    }
}

/// Drives a full update pass for one installation.
///
/// One pipeline instance per installation root at a time; concurrent runs
/// against the same root race on staging directories and must be prevented
/// by the caller (single-instance lock).
pub struct Pipeline {
    client: Client,
    root: InstallRoot,
    settings: Arc<dyn SettingsStore>,
    progress: Arc<dyn Progress>,
    options: PipelineOptions,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("root", &self.root)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    /// Assemble a pipeline from its collaborators.
    pub fn new(
        client: Client,
        root: InstallRoot,
        settings: Arc<dyn SettingsStore>,
        progress: Arc<dyn Progress>,
        options: PipelineOptions,
    ) -> Self {
        Self {
            client,
            root,
            settings,
            progress,
            options,
        }
    }

    /// Run the full reconciliation pass.
    ///
    /// # Errors
    ///
    /// Only an unobtainable updater index is a hard error; every other
    /// stage failure is recorded in the report and the run continues.
    pub async fn run(&self, metadata: &LaunchMetadata) -> Result<PipelineReport, UpdateError> {
        let mut report = PipelineReport::default();

        self.progress
            .stage("UPDATING...", "FETCHING UPDATER INDEX...", "download");
        // Hard failure: everything below keys off the index.
        let index = self.fetch_updater_index().await?;

        let patch = self.sync_patch_layer(&index).await;
        if let Err(err) = &patch {
            self.progress.error(&format!("patch layer update failed: {err}"));
        }
        report.record("patch-layer", patch.map(|advanced| {
            Some(if advanced { "updated".to_string() } else { "up to date".to_string() })
        }));

        let engine = self.sync_engine(&index).await;
        if let Err(err) = &engine {
            self.progress.error(&format!("engine update failed: {err}"));
        }
        report.record("engine", engine.map(|advanced| {
            Some(if advanced { "updated".to_string() } else { "up to date".to_string() })
        }));

        // Independent trees; no ordering between them.
        let (assets, game_files) = tokio::join!(
            self.reconcile_assets(metadata),
            self.reconcile_game_files(metadata),
        );
        if let Err(err) = &assets {
            self.progress.error(&format!("asset reconciliation failed: {err}"));
        }
        if let Err(err) = &game_files {
            self.progress.error(&format!("game file reconciliation failed: {err}"));
        }
        report.record("assets", assets.map(|s| Some(format_stats(s))));
        report.record("game-files", game_files.map(|s| Some(format_stats(s))));

        Ok(report)
    }

    /// Fetch and parse `GET <api>/updater/index`.
    ///
    /// # Errors
    ///
    /// Transport errors and malformed responses propagate; the caller
    /// treats them as launch-blocking.
    pub async fn fetch_updater_index(&self) -> Result<UpdaterIndex, UpdateError> {
        let url = format!("{}/updater/index", self.options.api_url);
        let response = self
            .client
            .get(&url)
            .header(reqwest::header::USER_AGENT, crate::USER_AGENT)
            .timeout(self.options.fetch.timeout)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json::<UpdaterIndex>().await?)
    }

    /// Bring the patch layer up to the published stable version.
    ///
    /// Returns whether the installed version advanced. A fresh install
    /// downloads the jar and seeds the config but runs no merge; an
    /// upgrade fetches the new default config and merges it with the
    /// user's current document.
    async fn sync_patch_layer(&self, index: &UpdaterIndex) -> Result<bool, UpdateError> {
        self.progress
            .stage("UPDATING...", "CHECKING PATCH LAYER...", "file");

        let newest = index.stable_version(PATCH_COMPONENT).ok_or_else(|| {
            UpdateError::Format(format!("updater index has no stable {PATCH_COMPONENT} version"))
        })?;

        let jar_path = self.root.patch_jar_path();
        let jar_exists = tokio::fs::metadata(&jar_path).await.is_ok();
        let current = self.settings.get_string(keys::PATCH_VERSION).await;

        if !jar_exists || current.is_none() {
            // First install: latest jar plus a seeded config, nothing to merge.
            self.download_component_jar(PATCH_COMPONENT, newest, &jar_path)
                .await?;
            self.settings
                .set(keys::PATCH_VERSION, Value::String(newest.to_string()))
                .await?;
            config::ensure_exists(&self.root.config_path()).await?;
            tracing::info!(version = newest, "patch layer installed");
            return Ok(true);
        }

        let current = current.unwrap_or_default();
        if current == newest {
            tracing::info!(version = %current, "patch layer is up to date");
            return Ok(false);
        }

        self.download_component_jar(PATCH_COMPONENT, newest, &jar_path)
            .await?;
        self.settings
            .set(keys::PATCH_VERSION, Value::String(newest.to_string()))
            .await?;
        tracing::info!(from = %current, to = newest, "patch layer updated");

        self.merge_default_config().await?;
        Ok(true)
    }

    /// Bring the engine jar up to the published stable version.
    ///
    /// Returns whether the installed version advanced. The engine carries
    /// no config document, so there is nothing to merge.
    async fn sync_engine(&self, index: &UpdaterIndex) -> Result<bool, UpdateError> {
        self.progress
            .stage("UPDATING...", "CHECKING ENGINE...", "file");

        let newest = index.stable_version(ENGINE_COMPONENT).ok_or_else(|| {
            UpdateError::Format(format!(
                "updater index has no stable {ENGINE_COMPONENT} version"
            ))
        })?;

        let jar_path = self.root.engine_jar_path();
        let jar_exists = tokio::fs::metadata(&jar_path).await.is_ok();
        let current = self.settings.get_string(keys::ENGINE_VERSION).await;

        if jar_exists && current.as_deref() == Some(newest) {
            tracing::info!(version = newest, "engine is up to date");
            return Ok(false);
        }

        self.download_component_jar(ENGINE_COMPONENT, newest, &jar_path)
            .await?;
        self.settings
            .set(keys::ENGINE_VERSION, Value::String(newest.to_string()))
            .await?;
        tracing::info!(version = newest, "engine updated");
        Ok(true)
    }

    async fn download_component_jar(
        &self,
        component: &str,
        version: &str,
        dest: &Path,
    ) -> Result<(), UpdateError> {
        let url = format!(
            "{}/updater/?item={component}&version={version}",
            self.options.api_url
        );
        FetchRequest::new(&self.client, &url, dest)
            .with_options(self.options.fetch.clone())
            .execute()
            .await?;
        Ok(())
    }

    /// Merge the freshly published default config into the user's document.
    async fn merge_default_config(&self) -> Result<(), UpdateError> {
        let config_path = self.root.config_path();
        config::ensure_exists(&config_path).await?;
        let current = config::load(&config_path).await?;

        let defaults: Value = self
            .client
            .get(&self.options.default_config_url)
            .header(reqwest::header::USER_AGENT, crate::USER_AGENT)
            .timeout(self.options.fetch.timeout)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let merged = config::merge(&defaults, &current);
        config::save(&config_path, &merged).await?;
        tracing::info!("config merged with new defaults");
        Ok(())
    }

    /// Reconcile the cosmetic/texture assets tree.
    ///
    /// The index file is itself an artifact: fetched with verify-before
    /// (cheap no-op when unchanged) and verify-after, then parsed and
    /// reconciled. Freshness comes from re-fetching, never from caching.
    async fn reconcile_assets(&self, metadata: &LaunchMetadata) -> Result<ReconcileStats, UpdateError> {
        self.progress
            .stage("UPDATING...", "CHECKING ASSETS...", "folder");

        let index_path = self.root.asset_index_path();
        let index_hash = HashValue::from(metadata.textures.index_sha1.clone());
        FetchRequest::new(&self.client, &metadata.textures.index_url, &index_path)
            .expecting(&index_hash)
            .verify_before()
            .verify_after()
            .with_options(self.options.fetch.clone())
            .execute()
            .await?;

        let text = tokio::fs::read_to_string(&index_path).await?;
        let document = IndexDocument::parse(&text, &metadata.textures.base_url);
        self.progress
            .info(&format!("checking {} assets", document.len()));

        Ok(reconcile::reconcile(
            &self.client,
            &document,
            &self.root.textures_dir(),
            &self.options.reconcile,
        )
        .await)
    }

    /// Reconcile the base game files named by the launch metadata.
    async fn reconcile_game_files(
        &self,
        metadata: &LaunchMetadata,
    ) -> Result<ReconcileStats, UpdateError> {
        self.progress
            .stage("UPDATING...", "CHECKING GAME FILES...", "file");

        let entries = metadata.game_file_entries();
        let dir = self.root.game_files_dir();
        tokio::fs::create_dir_all(&dir).await?;

        Ok(reconcile::reconcile_entries(&self.client, &entries, &dir, &self.options.reconcile).await)
    }

    /// Acquire a runtime on demand (not part of every run).
    ///
    /// Records the runtime name in the settings store on success.
    ///
    /// # Errors
    ///
    /// See [`RuntimeStore::acquire`].
    pub async fn acquire_runtime(&self, descriptor: &RuntimeDescriptor) -> Result<bool, UpdateError> {
        let store = RuntimeStore::new(self.root.runtimes_dir())
            .with_fetch_options(self.options.fetch.clone());
        let installed = store
            .acquire(&self.client, descriptor, &self.progress)
            .await?;
        if installed {
            let mut names = match self.settings.get(keys::DOWNLOADED_RUNTIMES).await {
                Some(Value::Array(items)) => items,
                _ => Vec::new(),
            };
            let name = Value::String(descriptor.name.clone());
            if !names.contains(&name) {
                names.push(name);
                self.settings
                    .set(keys::DOWNLOADED_RUNTIMES, Value::Array(names))
                    .await?;
            }
        }
        Ok(installed)
    }

    /// Remove a runtime and forget it in the settings store.
    ///
    /// # Errors
    ///
    /// See [`RuntimeStore::remove`].
    pub async fn remove_runtime(&self, name: &str) -> Result<(), UpdateError> {
        RuntimeStore::new(self.root.runtimes_dir()).remove(name).await?;
        if let Some(Value::Array(items)) = self.settings.get(keys::DOWNLOADED_RUNTIMES).await {
            let filtered: Vec<Value> = items
                .into_iter()
                .filter(|v| v.as_str() != Some(name))
                .collect();
            self.settings
                .set(keys::DOWNLOADED_RUNTIMES, Value::Array(filtered))
                .await?;
        }
        Ok(())
    }
}

fn format_stats(stats: ReconcileStats) -> String {
    format!(
        "{} matched, {} fetched, {} failed",
        stats.matched, stats.fetched, stats.failed
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_success_is_the_conjunction() {
        let mut report = PipelineReport::default();
        report.record("a", Ok(None));
        assert!(report.success());
        report.record("b", Err(UpdateError::Format("bad".to_string())));
        assert!(!report.success());
        assert_eq!(report.stages.len(), 2);
        assert_eq!(report.stages[1].detail.as_deref(), Some("format error: bad"));
    }
}
