//! Manifest and index document types.
//!
//! Two remote formats drive reconciliation: the JSON updater index
//! (`GET /updater/index`) that maps components to their current stable
//! versions, and the newline-delimited file indexes (`<relative-path>
//! <sha1>`) that enumerate asset and game-file trees.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::hash::{HashValue, Sha1Hash};

/// One expected file: where to get it, where to put it, what it must hash to.
///
/// Immutable once parsed for a given reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    /// Remote locator for the file content.
    pub url: String,
    /// Destination path relative to the reconciliation base directory.
    pub local_path: PathBuf,
    /// Required content digest.
    pub hash: HashValue,
}

/// Parsed form of a newline-delimited index document.
#[derive(Debug, Clone, Default)]
pub struct IndexDocument {
    /// Entries in file order, malformed lines already dropped.
    pub entries: Vec<ManifestEntry>,
    /// Number of lines that failed validation and were skipped.
    pub skipped: usize,
}

impl IndexDocument {
    /// Parse an index document.
    ///
    /// Each line is `<relative-path> <40-hex-sha1>`. The remote serves
    /// content addressed by digest, so the fetch URL is `base_url` + digest.
    /// Malformed lines are skipped with a warning; a bad line must never
    /// fail the whole index.
    pub fn parse(text: &str, base_url: &str) -> Self {
        let mut entries = Vec::new();
        let mut skipped = 0;
        for (lineno, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let mut parts = line.split_whitespace();
            let (Some(path), Some(digest)) = (parts.next(), parts.next()) else {
                tracing::warn!(line = lineno + 1, "invalid line in index file: {line}");
                skipped += 1;
                continue;
            };
            let Ok(sha1) = Sha1Hash::new(digest) else {
                tracing::warn!(line = lineno + 1, "invalid line in index file: {line}");
                skipped += 1;
                continue;
            };
            entries.push(ManifestEntry {
                url: format!("{base_url}{sha1}"),
                local_path: PathBuf::from(path),
                hash: sha1.into(),
            });
        }
        Self { entries, skipped }
    }

    /// Number of well-formed entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no well-formed entries were found.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Response body of `GET /updater/index`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdaterIndex {
    /// Release channels.
    pub index: UpdaterChannels,
}

/// Channel → component-version table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdaterChannels {
    /// The stable channel; the only one the updater consumes.
    pub stable: BTreeMap<String, String>,
}

impl UpdaterIndex {
    /// Current stable version of a component, if published.
    pub fn stable_version(&self, component: &str) -> Option<&str> {
        self.index.stable.get(component).map(String::as_str)
    }
}

/// Texture/asset section of the launch metadata response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextureMeta {
    /// URL of the newline-delimited asset index.
    pub index_url: String,
    /// Digest the downloaded index file must match.
    pub index_sha1: Sha1Hash,
    /// Content-addressed base URL assets are fetched from.
    pub base_url: String,
}

/// One game-file artifact from the launch metadata response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameArtifact {
    /// File name under the game-files directory.
    pub name: String,
    /// Remote locator.
    pub url: String,
    /// Required digest.
    pub sha1: Sha1Hash,
}

/// Launch-type section of the metadata response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaunchTypeData {
    /// Game-file artifact list.
    pub artifacts: Vec<GameArtifact>,
}

/// Subset of the launch metadata response the pipeline consumes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchMetadata {
    /// Asset index pointers.
    pub textures: TextureMeta,
    /// Per-launch-type payload.
    pub launch_type_data: LaunchTypeData,
}

impl LaunchMetadata {
    /// Convert the artifact list into manifest entries rooted at `.`.
    pub fn game_file_entries(&self) -> Vec<ManifestEntry> {
        self.launch_type_data
            .artifacts
            .iter()
            .map(|a| ManifestEntry {
                url: a.url.clone(),
                local_path: PathBuf::from(&a.name),
                hash: a.sha1.clone().into(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::HashAlgorithm;

    const GOOD: &str = "da39a3ee5e6b4b0d3255bfef95601890afd80709";

    #[test]
    fn parses_well_formed_lines() {
        let text = format!("assets/icons/a.png {GOOD}\nassets/b.png {GOOD}\n");
        let doc = IndexDocument::parse(&text, "https://cdn.example/");
        assert_eq!(doc.len(), 2);
        assert_eq!(doc.skipped, 0);
        assert_eq!(doc.entries[0].local_path, PathBuf::from("assets/icons/a.png"));
        assert_eq!(doc.entries[0].url, format!("https://cdn.example/{GOOD}"));
        assert_eq!(doc.entries[0].hash.algorithm(), HashAlgorithm::Sha1);
    }

    #[test]
    fn skips_malformed_lines_without_failing() {
        let text = format!("good.png {GOOD}\nno-digest-here\nbad.png zzzz\n\nalso.png {GOOD}");
        let doc = IndexDocument::parse(&text, "https://cdn.example/");
        assert_eq!(doc.len(), 2);
        assert_eq!(doc.skipped, 2);
    }

    #[test]
    fn digest_case_is_normalized() {
        let text = format!("x.png {}", GOOD.to_uppercase());
        let doc = IndexDocument::parse(&text, "https://cdn.example/");
        assert_eq!(doc.entries[0].hash.as_str(), GOOD);
    }

    #[test]
    fn updater_index_deserializes() {
        let json = r#"{"index":{"stable":{"engine":"2.1.0","patcher":"0.9.3"}}}"#;
        let idx: UpdaterIndex = serde_json::from_str(json).unwrap();
        assert_eq!(idx.stable_version("patcher"), Some("0.9.3"));
        assert_eq!(idx.stable_version("missing"), None);
    }

    #[test]
    fn launch_metadata_maps_to_entries() {
        let json = format!(
            r#"{{"textures":{{"indexUrl":"https://t/index.txt","indexSha1":"{GOOD}","baseUrl":"https://t/"}},
                "launchTypeData":{{"artifacts":[{{"name":"client.jar","url":"https://a/client.jar","sha1":"{GOOD}"}}]}}}}"#
        );
        let meta: LaunchMetadata = serde_json::from_str(&json).unwrap();
        let entries = meta.game_file_entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].local_path, PathBuf::from("client.jar"));
    }
}
