//! Hash-verified artifact downloads.
//!
//! A [`FetchRequest`] downloads one remote resource to a local path. With a
//! known digest it can skip the transfer entirely when the local copy
//! already matches (the cache-hit path that makes repeated runs cheap), and
//! it verifies the received bytes while streaming them so a corrupt payload
//! never lands at the final path.

use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::StreamExt;
use reqwest::Client;
use sha1::Sha1;
use sha2::{Digest, Sha256};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use lumen_schema::hash::HashValue;
use lumen_schema::HashAlgorithm;

use crate::error::UpdateError;
use crate::verify::verify_file;

/// How the payload is treated on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Representation {
    /// Byte stream, written chunk by chunk.
    Binary,
    /// Text document, fetched whole then written.
    Text,
}

/// Transfer tuning shared by every fetch in a run.
///
/// The original pipeline had no timeout and no retry; a network stall
/// blocked the run indefinitely. Both are explicit configuration here,
/// with bounded exponential backoff on transport errors.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Per-request timeout covering connect and body transfer.
    pub timeout: Duration,
    /// Retries after the first attempt, transport errors only.
    pub retries: u32,
    /// Initial backoff delay, doubled per retry.
    pub backoff: Duration,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            retries: 2,
            backoff: Duration::from_millis(500),
        }
    }
}

/// Outcome of a fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Local file already matched the expected digest; no transfer issued.
    Cached,
    /// Payload was transferred (and verified, when requested).
    Downloaded,
}

/// Request for a single download operation.
#[derive(Debug)]
pub struct FetchRequest<'a> {
    client: &'a Client,
    url: &'a str,
    dest: &'a Path,
    representation: Representation,
    expected: Option<&'a HashValue>,
    verify_before: bool,
    verify_after: bool,
    options: FetchOptions,
}

impl<'a> FetchRequest<'a> {
    /// Start building a fetch of `url` into `dest`.
    pub fn new(client: &'a Client, url: &'a str, dest: &'a Path) -> Self {
        Self {
            client,
            url,
            dest,
            representation: Representation::Binary,
            expected: None,
            verify_before: false,
            verify_after: false,
            options: FetchOptions::default(),
        }
    }

    /// Treat the payload as text rather than a byte stream.
    pub fn text(mut self) -> Self {
        self.representation = Representation::Text;
        self
    }

    /// Attach the digest the payload must match.
    pub fn expecting(mut self, hash: &'a HashValue) -> Self {
        self.expected = Some(hash);
        self
    }

    /// Skip the transfer when the local file already matches the digest.
    pub fn verify_before(mut self) -> Self {
        self.verify_before = true;
        self
    }

    /// Verify the received bytes; mismatch fails the fetch.
    pub fn verify_after(mut self) -> Self {
        self.verify_after = true;
        self
    }

    /// Override transfer tuning.
    pub fn with_options(mut self, options: FetchOptions) -> Self {
        self.options = options;
        self
    }

    /// Execute the fetch.
    ///
    /// # Errors
    ///
    /// [`UpdateError::Transport`] when the remote is unreachable or answers
    /// non-2xx after retries are exhausted, [`UpdateError::Integrity`] when
    /// post-download verification fails, [`UpdateError::Filesystem`] when
    /// the destination cannot be written. A failed fetch never leaves a
    /// file at the final path.
    pub async fn execute(self) -> Result<FetchOutcome, UpdateError> {
        if self.verify_before {
            if let Some(expected) = self.expected {
                if verify_file(self.dest, expected).await {
                    tracing::debug!(url = self.url, "local copy matches, skipping transfer");
                    return Ok(FetchOutcome::Cached);
                }
            }
        }

        if let Some(parent) = self.dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut attempt: u32 = 0;
        loop {
            match self.transfer().await {
                Ok(()) => return Ok(FetchOutcome::Downloaded),
                Err(err) if err.is_transient() && attempt < self.options.retries => {
                    let delay = self.options.backoff * 2u32.saturating_pow(attempt);
                    attempt += 1;
                    tracing::warn!(
                        url = self.url,
                        attempt,
                        "transfer failed ({err}), retrying in {delay:?}"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn transfer(&self) -> Result<(), UpdateError> {
        let response = self
            .client
            .get(self.url)
            .header(reqwest::header::USER_AGENT, crate::USER_AGENT)
            .timeout(self.options.timeout)
            .send()
            .await?
            .error_for_status()?;

        // Written beside the destination and renamed into place, so a
        // failed verify never leaves a corrupt file at the final path.
        let part = part_path(self.dest);
        let mut hasher = self
            .verify_after
            .then(|| self.expected.map(|e| StreamingHasher::new(e.algorithm())))
            .flatten();

        let write_result: Result<(), UpdateError> = async {
            match self.representation {
                Representation::Binary => {
                    let mut file = File::create(&part).await?;
                    let mut stream = response.bytes_stream();
                    while let Some(chunk) = stream.next().await {
                        let chunk = chunk?;
                        file.write_all(&chunk).await?;
                        if let Some(h) = hasher.as_mut() {
                            h.update(&chunk);
                        }
                    }
                    file.flush().await?;
                }
                Representation::Text => {
                    let body = response.text().await?;
                    if let Some(h) = hasher.as_mut() {
                        h.update(body.as_bytes());
                    }
                    tokio::fs::write(&part, body).await?;
                }
            }
            Ok(())
        }
        .await;

        if let Err(err) = write_result {
            tokio::fs::remove_file(&part).await.ok();
            return Err(err);
        }

        if let (Some(hasher), Some(expected)) = (hasher, self.expected) {
            let actual = hasher.finish();
            if actual != expected.as_str() {
                tokio::fs::remove_file(&part).await.ok();
                return Err(UpdateError::Integrity {
                    expected: expected.as_str().to_string(),
                    actual,
                });
            }
        }

        // Windows rename does not overwrite.
        if tokio::fs::metadata(self.dest).await.is_ok() {
            tokio::fs::remove_file(self.dest).await.ok();
        }
        tokio::fs::rename(&part, self.dest).await?;
        Ok(())
    }
}

fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().map_or_else(
        || std::ffi::OsString::from("download"),
        std::ffi::OsStr::to_os_string,
    );
    name.push(".part");
    dest.with_file_name(name)
}

enum StreamingHasher {
    Sha1(Sha1),
    Sha256(Sha256),
}

impl StreamingHasher {
    fn new(algorithm: HashAlgorithm) -> Self {
        match algorithm {
            HashAlgorithm::Sha1 => Self::Sha1(Sha1::new()),
            HashAlgorithm::Sha256 => Self::Sha256(Sha256::new()),
        }
    }

    fn update(&mut self, bytes: &[u8]) {
        match self {
            Self::Sha1(h) => h.update(bytes),
            Self::Sha256(h) => h.update(bytes),
        }
    }

    fn finish(self) -> String {
        match self {
            Self::Sha1(h) => hex::encode(h.finalize()),
            Self::Sha256(h) => hex::encode(h.finalize()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn part_path_appends_suffix() {
        let part = part_path(Path::new("/tmp/a/b.jar"));
        assert_eq!(part, Path::new("/tmp/a/b.jar.part"));
    }

    #[test]
    fn default_options_are_bounded() {
        let opts = FetchOptions::default();
        assert!(opts.timeout > Duration::ZERO);
        assert!(opts.retries > 0);
    }
}
