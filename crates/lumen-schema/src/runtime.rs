//! Runtime (JRE) descriptor types.
//!
//! The metadata feed publishes one descriptor per runtime, keyed by the
//! platform variant names in [`PlatformKey::variant_key`]. Exactly one
//! variant is selected per run; a missing variant is a per-run failure,
//! not a protocol error.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::hash::Sha256Hash;
use crate::platform::PlatformKey;

/// Archive container format of a runtime variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveKind {
    /// `.zip` archive.
    Zip,
    /// `.tar.gz` archive.
    TarGz,
}

impl ArchiveKind {
    /// File extension used for the downloaded archive.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Zip => "zip",
            Self::TarGz => "tar.gz",
        }
    }
}

/// One platform-specific build of a runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeVariant {
    /// Archive download URL.
    pub url: String,
    /// SHA-256 checksum of the archive.
    pub checksum: Sha256Hash,
    /// Container format.
    #[serde(default = "default_kind")]
    pub kind: ArchiveKind,
    /// Name of the top-level folder inside the archive, when the feed
    /// declares one. Otherwise the extractor discovers it.
    #[serde(default)]
    pub folder: Option<String>,
}

fn default_kind() -> ArchiveKind {
    ArchiveKind::Zip
}

/// A named runtime with its per-platform variants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeDescriptor {
    /// Runtime name; doubles as the install directory name.
    pub name: String,
    /// Variant table keyed by platform variant name.
    #[serde(flatten)]
    pub variants: BTreeMap<String, RuntimeVariant>,
}

impl RuntimeDescriptor {
    /// Select the variant for a host platform, if one is published.
    pub fn select(&self, platform: PlatformKey) -> Option<&RuntimeVariant> {
        self.variants.get(platform.variant_key())
    }
}
