//! Data model shared across the Lumen updater.
//!
//! Pure types only: hash digests, host platform keys, manifest/index
//! documents, and runtime descriptors. No I/O lives here.

pub mod hash;
pub mod manifest;
pub mod platform;
pub mod runtime;

pub use hash::{HashAlgorithm, Sha1Hash, Sha256Hash};
pub use platform::{Arch, Os, PlatformKey};
