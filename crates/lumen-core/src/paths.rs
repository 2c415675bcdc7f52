//! Installation root layout.
//!
//! All local state lives under one root directory (default `~/.lumen`,
//! overridable via `LUMEN_HOME`). Components never compute paths ad hoc;
//! they take an [`InstallRoot`] and ask it.

use std::path::{Path, PathBuf};

/// The installation root and the well-known paths beneath it.
#[derive(Debug, Clone)]
pub struct InstallRoot {
    root: PathBuf,
}

impl InstallRoot {
    /// Wrap an explicit root directory (tests, custom installs).
    pub fn at(root: PathBuf) -> Self {
        Self { root }
    }

    /// Resolve the default root: `$LUMEN_HOME`, else `~/.lumen`.
    ///
    /// Returns `None` when neither the override nor the user's home
    /// directory can be determined.
    pub fn resolve() -> Option<Self> {
        if let Ok(val) = std::env::var("LUMEN_HOME") {
            return Some(Self::at(PathBuf::from(val)));
        }
        dirs::home_dir().map(|h| Self::at(h.join(".lumen")))
    }

    /// The root directory itself.
    pub fn dir(&self) -> &Path {
        &self.root
    }

    /// Cosmetic/texture assets: `<root>/textures`.
    pub fn textures_dir(&self) -> PathBuf {
        self.root.join("textures")
    }

    /// The downloaded asset index file: `<root>/textures/index.txt`.
    pub fn asset_index_path(&self) -> PathBuf {
        self.textures_dir().join("index.txt")
    }

    /// Base game files: `<root>/offline/multiver`.
    pub fn game_files_dir(&self) -> PathBuf {
        self.root.join("offline").join("multiver")
    }

    /// The engine agent jar: `<root>/engine/engine.jar`.
    pub fn engine_jar_path(&self) -> PathBuf {
        self.root.join("engine").join("engine.jar")
    }

    /// Patch layer directory: `<root>/patch`.
    pub fn patch_dir(&self) -> PathBuf {
        self.root.join("patch")
    }

    /// The patch agent jar.
    pub fn patch_jar_path(&self) -> PathBuf {
        self.patch_dir().join("patch.jar")
    }

    /// The patch layer's config document.
    pub fn config_path(&self) -> PathBuf {
        self.patch_dir().join("config.json")
    }

    /// Managed runtimes: `<root>/jres`.
    pub fn runtimes_dir(&self) -> PathBuf {
        self.root.join("jres")
    }

    /// The settings store document.
    pub fn settings_path(&self) -> PathBuf {
        self.root.join("settings.json")
    }
}
