//! Runtime (JRE) acquisition, extraction, and relocation.
//!
//! A runtime arrives as a platform-specific archive, is extracted into a
//! `<name>_temp` staging directory, and the real payload folder inside it
//! is moved to the canonical `<name>` path. Every step is idempotent so a
//! prior failed run never blocks a retry.

use std::path::{Path, PathBuf};

use reqwest::Client;

use lumen_schema::hash::HashValue;
use lumen_schema::runtime::{ArchiveKind, RuntimeDescriptor, RuntimeVariant};
use lumen_schema::PlatformKey;

use crate::error::UpdateError;
use crate::extract;
use crate::fetch::{FetchOptions, FetchRequest};
use crate::progress::Progress;

/// Acquires and removes managed runtimes under a storage directory.
#[derive(Debug, Clone)]
pub struct RuntimeStore {
    root: PathBuf,
    platform: Option<PlatformKey>,
    fetch: FetchOptions,
}

impl RuntimeStore {
    /// Create a store rooted at `root`, resolving the host platform once.
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            platform: PlatformKey::current(),
            fetch: FetchOptions::default(),
        }
    }

    /// Override the platform key (tests).
    pub fn with_platform(mut self, platform: Option<PlatformKey>) -> Self {
        self.platform = platform;
        self
    }

    /// Override transfer tuning.
    pub fn with_fetch_options(mut self, fetch: FetchOptions) -> Self {
        self.fetch = fetch;
        self
    }

    /// Canonical install path for a runtime name.
    pub fn runtime_path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Acquire a runtime from its descriptor.
    ///
    /// `Ok(false)` is a handled, non-fatal failure: unsupported host
    /// platform, no matching variant, or an unextractable archive. The
    /// caller may retry or fall back to a user-selected runtime.
    ///
    /// # Errors
    ///
    /// Transport, integrity, and filesystem errors from the archive fetch
    /// and relocation steps propagate.
    pub async fn acquire(
        &self,
        client: &Client,
        descriptor: &RuntimeDescriptor,
        progress: &dyn Progress,
    ) -> Result<bool, UpdateError> {
        let Some(platform) = self.platform else {
            tracing::warn!("runtime acquisition attempted on an unsupported operating system");
            progress.warn("host platform has no managed runtime support");
            return Ok(false);
        };

        let Some(variant) = descriptor.select(platform) else {
            tracing::error!(
                runtime = descriptor.name,
                platform = %platform,
                "no variant published for this platform"
            );
            progress.error(&format!(
                "no {} build published for {platform}",
                descriptor.name
            ));
            return Ok(false);
        };

        tokio::fs::create_dir_all(&self.root).await?;

        let name = descriptor.name.as_str();
        let archive_path = self
            .root
            .join(format!("{name}.{}", variant.kind.extension()));

        progress.stage("UPDATING...", &format!("DOWNLOADING RUNTIME {name}"), "download");
        let checksum = HashValue::from(variant.checksum.clone());
        FetchRequest::new(client, &variant.url, &archive_path)
            .expecting(&checksum)
            .verify_before()
            .verify_after()
            .with_options(self.fetch.clone())
            .execute()
            .await?;

        // Leftovers from an earlier failed run must not block this one.
        let final_path = self.runtime_path(name);
        let temp_path = self.root.join(format!("{name}_temp"));
        remove_dir_if_present(&temp_path).await?;

        progress.stage("UPDATING...", &format!("EXTRACTING RUNTIME {name}"), "archive");
        if let Err(err) = unpack(&archive_path, &temp_path, variant.kind).await {
            tracing::error!(runtime = name, "failed to extract archive: {err}");
            progress.error(&format!("failed to extract {name} archive"));
            tokio::fs::remove_file(&archive_path).await.ok();
            remove_dir_if_present(&temp_path).await.ok();
            return Ok(false);
        }

        let payload = match self.resolve_payload(&temp_path, variant, platform).await {
            Ok(path) => path,
            Err(err) => {
                tracing::error!(runtime = name, "unexpected archive layout: {err}");
                progress.error(&format!("unexpected layout inside {name} archive"));
                tokio::fs::remove_file(&archive_path).await.ok();
                remove_dir_if_present(&temp_path).await.ok();
                return Ok(false);
            }
        };

        // The previous install is replaced only once the new payload is
        // ready, so a failed re-acquire leaves it untouched.
        remove_dir_if_present(&final_path).await?;
        tokio::fs::rename(&payload, &final_path).await?;
        remove_dir_if_present(&temp_path).await?;
        tokio::fs::remove_file(&archive_path).await?;

        tracing::info!(runtime = name, path = %final_path.display(), "runtime installed");
        Ok(true)
    }

    /// Locate the real payload folder inside the staging directory.
    ///
    /// Prefers the folder the descriptor names, else the first directory
    /// entry. On macOS a JDK bundle nests the usable tree under
    /// `Contents/Home`.
    async fn resolve_payload(
        &self,
        temp_path: &Path,
        variant: &RuntimeVariant,
        platform: PlatformKey,
    ) -> Result<PathBuf, UpdateError> {
        let mut payload = None;
        if let Some(folder) = &variant.folder {
            let hinted = temp_path.join(folder);
            if tokio::fs::metadata(&hinted).await.is_ok_and(|m| m.is_dir()) {
                payload = Some(hinted);
            }
        }
        if payload.is_none() {
            let mut entries = tokio::fs::read_dir(temp_path).await?;
            while let Some(entry) = entries.next_entry().await? {
                if entry.file_type().await?.is_dir() {
                    payload = Some(entry.path());
                    break;
                }
            }
        }
        let payload = payload.ok_or_else(|| {
            UpdateError::Format("no top-level folder inside extracted runtime".to_string())
        })?;

        if platform.os == lumen_schema::Os::Macos {
            let bundle_home = payload.join("Contents").join("Home");
            if tokio::fs::metadata(&bundle_home)
                .await
                .is_ok_and(|m| m.is_dir())
            {
                return Ok(bundle_home);
            }
        }
        Ok(payload)
    }

    /// Delete a runtime by name. Idempotent; absence is not an error.
    ///
    /// # Errors
    ///
    /// Filesystem errors other than "not found" propagate.
    pub async fn remove(&self, name: &str) -> Result<(), UpdateError> {
        remove_dir_if_present(&self.runtime_path(name)).await?;
        tracing::info!(runtime = name, "runtime removed");
        Ok(())
    }
}

async fn remove_dir_if_present(path: &Path) -> Result<(), UpdateError> {
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err.into()),
    }
}

async fn unpack(archive: &Path, dest: &Path, kind: ArchiveKind) -> Result<(), UpdateError> {
    let archive = archive.to_path_buf();
    let dest = dest.to_path_buf();
    tokio::task::spawn_blocking(move || match kind {
        ArchiveKind::Zip => extract::extract_zip(&archive, &dest),
        ArchiveKind::TarGz => extract::extract_tar_gz(&archive, &dest),
    })
    .await
    .map_err(|e| UpdateError::Format(format!("extraction task panicked: {e}")))?
}
