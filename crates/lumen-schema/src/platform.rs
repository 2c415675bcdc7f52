//! Host platform identification.
//!
//! The runtime descriptor feed keys its per-platform variants by short names
//! inherited from the original launcher protocol (`64`, `MacArm`, ...). The
//! key is computed once at startup and passed around as data rather than
//! re-derived from `cfg!` checks in every component.

use serde::{Deserialize, Serialize};

/// Operating systems the updater can acquire a runtime for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Os {
    /// Windows.
    Windows,
    /// macOS.
    Macos,
    /// Linux.
    Linux,
}

impl Os {
    /// Lowercase name used in logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Windows => "windows",
            Self::Macos => "macos",
            Self::Linux => "linux",
        }
    }
}

/// CPU architectures the updater distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Arch {
    /// 64-bit x86.
    X64,
    /// 64-bit ARM.
    Arm,
}

impl Arch {
    /// Lowercase name used in logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::X64 => "x64",
            Self::Arm => "arm",
        }
    }
}

/// The host platform, resolved once per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlatformKey {
    /// Operating system.
    pub os: Os,
    /// CPU architecture.
    pub arch: Arch,
}

impl PlatformKey {
    /// Build a key from explicit parts.
    pub fn new(os: Os, arch: Arch) -> Self {
        Self { os, arch }
    }

    /// Resolve the key for the machine we are running on.
    ///
    /// Returns `None` on operating systems the updater does not ship a
    /// runtime for; callers treat that as an expected, handled condition.
    pub fn current() -> Option<Self> {
        let os = if cfg!(target_os = "windows") {
            Os::Windows
        } else if cfg!(target_os = "macos") {
            Os::Macos
        } else if cfg!(target_os = "linux") {
            Os::Linux
        } else {
            return None;
        };
        let arch = if cfg!(target_arch = "aarch64") {
            Arch::Arm
        } else {
            Arch::X64
        };
        Some(Self { os, arch })
    }

    /// The variant name used by the runtime descriptor feed.
    ///
    /// These are wire constants from the upstream protocol, not display
    /// strings; `64`/`32` are the legacy Windows keys.
    pub fn variant_key(self) -> &'static str {
        match (self.os, self.arch) {
            (Os::Windows, Arch::X64) => "64",
            (Os::Windows, Arch::Arm) => "32",
            (Os::Macos, Arch::X64) => "MacX64",
            (Os::Macos, Arch::Arm) => "MacArm",
            (Os::Linux, Arch::X64) => "LinuxX64",
            (Os::Linux, Arch::Arm) => "LinuxArm",
        }
    }
}

impl std::fmt::Display for PlatformKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.os.as_str(), self.arch.as_str())
    }
}
