//! Validated hash digest newtypes.
//!
//! Index lines and artifact manifests carry hex digests as plain strings;
//! these newtypes validate length and character set once, at the boundary,
//! so the rest of the pipeline never sees a malformed digest.

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Digest algorithms used by the remote manifests.
///
/// Asset and game-file indexes use SHA-1 (40 hex chars); runtime archives
/// are checksummed with SHA-256 (64 hex chars).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    /// SHA-1, 160-bit digest.
    Sha1,
    /// SHA-256, 256-bit digest.
    Sha256,
}

impl HashAlgorithm {
    /// Length of the hex encoding of a digest for this algorithm.
    pub fn hex_len(self) -> usize {
        match self {
            Self::Sha1 => 40,
            Self::Sha256 => 64,
        }
    }

    /// Lowercase name used in logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sha1 => "sha1",
            Self::Sha256 => "sha256",
        }
    }
}

impl std::fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error produced when a hex digest fails validation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid {algorithm} digest: expected {expected} hex chars, got '{input}'")]
pub struct InvalidDigest {
    /// Algorithm the digest was validated against.
    pub algorithm: HashAlgorithm,
    /// Expected hex length.
    pub expected: usize,
    /// The rejected input.
    pub input: String,
}

fn validate(algorithm: HashAlgorithm, s: &str) -> Result<String, InvalidDigest> {
    if s.len() == algorithm.hex_len() && s.chars().all(|c| c.is_ascii_hexdigit()) {
        Ok(s.to_ascii_lowercase())
    } else {
        Err(InvalidDigest {
            algorithm,
            expected: algorithm.hex_len(),
            input: s.to_string(),
        })
    }
}

/// A validated SHA-1 digest (40 hex characters, stored lowercase).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Sha1Hash(String);

impl Sha1Hash {
    /// Validate and normalize a hex digest.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidDigest`] unless `s` is exactly 40 ASCII hex chars.
    pub fn new(s: &str) -> Result<Self, InvalidDigest> {
        validate(HashAlgorithm::Sha1, s).map(Self)
    }

    /// The lowercase hex digest.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for Sha1Hash {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::new(&s).map_err(serde::de::Error::custom)
    }
}

impl std::fmt::Display for Sha1Hash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for Sha1Hash {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A validated SHA-256 digest (64 hex characters, stored lowercase).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Sha256Hash(String);

impl Sha256Hash {
    /// Validate and normalize a hex digest.
    ///
    /// Accepts an optional `sha256:` prefix, which some descriptor feeds use.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidDigest`] unless the hex portion is exactly 64 ASCII
    /// hex chars.
    pub fn new(s: &str) -> Result<Self, InvalidDigest> {
        let hex = s.strip_prefix("sha256:").unwrap_or(s);
        validate(HashAlgorithm::Sha256, hex).map(Self)
    }

    /// The lowercase hex digest.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for Sha256Hash {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::new(&s).map_err(serde::de::Error::custom)
    }
}

impl std::fmt::Display for Sha256Hash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for Sha256Hash {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A digest together with the algorithm that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HashValue {
    /// SHA-1 digest.
    Sha1(Sha1Hash),
    /// SHA-256 digest.
    Sha256(Sha256Hash),
}

impl HashValue {
    /// The algorithm behind this digest.
    pub fn algorithm(&self) -> HashAlgorithm {
        match self {
            Self::Sha1(_) => HashAlgorithm::Sha1,
            Self::Sha256(_) => HashAlgorithm::Sha256,
        }
    }

    /// The lowercase hex digest.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Sha1(h) => h.as_str(),
            Self::Sha256(h) => h.as_str(),
        }
    }
}

impl From<Sha1Hash> for HashValue {
    fn from(h: Sha1Hash) -> Self {
        Self::Sha1(h)
    }
}

impl From<Sha256Hash> for HashValue {
    fn from(h: Sha256Hash) -> Self {
        Self::Sha256(h)
    }
}

impl std::fmt::Display for HashValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha1_accepts_40_hex_and_lowercases() {
        let h = Sha1Hash::new("DA39A3EE5E6B4B0D3255BFEF95601890AFD80709").unwrap();
        assert_eq!(h.as_str(), "da39a3ee5e6b4b0d3255bfef95601890afd80709");
    }

    #[test]
    fn sha1_rejects_wrong_length() {
        assert!(Sha1Hash::new("abc123").is_err());
        assert!(Sha1Hash::new(&"a".repeat(64)).is_err());
    }

    #[test]
    fn sha1_rejects_non_hex() {
        assert!(Sha1Hash::new(&"g".repeat(40)).is_err());
    }

    #[test]
    fn sha256_strips_prefix() {
        let hex = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";
        let h = Sha256Hash::new(&format!("sha256:{hex}")).unwrap();
        assert_eq!(h.as_str(), hex);
    }

    #[test]
    fn sha256_rejects_sha1_length() {
        assert!(Sha256Hash::new(&"a".repeat(40)).is_err());
    }

    #[test]
    fn hash_value_reports_algorithm() {
        let v: HashValue = Sha1Hash::new(&"0".repeat(40)).unwrap().into();
        assert_eq!(v.algorithm(), HashAlgorithm::Sha1);
        assert_eq!(v.algorithm().hex_len(), 40);
    }
}
