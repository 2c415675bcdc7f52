//! Artifact acquisition and integrity pipeline.
//!
//! Keeps a local game installation synchronized with remote manifests:
//! hash-verified downloads, batched index reconciliation, runtime (JRE)
//! acquisition, and structural config merging. The filesystem under the
//! install root is the state store; hashes are recomputed from file bytes,
//! never cached in side files.

pub mod config;
pub mod error;
pub mod fetch;
pub mod paths;
pub mod pipeline;
pub mod progress;
pub mod reconcile;
pub mod runtime;
pub mod settings;
pub mod verify;

mod extract;

pub use error::UpdateError;
pub use paths::InstallRoot;
pub use progress::{NullProgress, Progress};

/// User Agent string for all remote fetches.
pub const USER_AGENT: &str = concat!("lumen/", env!("CARGO_PKG_VERSION"));
