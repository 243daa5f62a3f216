//! Settings file support.
//!
//! An optional JSON file supplies defaults beneath the command-line flags.
//! The default location follows the XDG Base Directory Specification
//! (`~/.config/turboprobe/settings.json` on Linux) and is only read if it
//! exists; nothing is ever written there.

use crate::error::{ConfigError, ConfigResult};
use crate::types::PortStrategy;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Default number of workers.
pub const DEFAULT_CONCURRENCY: usize = 100;
/// Upper bound on workers; each one holds a capture handle and two raw sockets.
pub const MAX_CONCURRENCY: usize = 10_000;
/// Default per-probe timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 300;
/// Default probe interface.
pub const DEFAULT_INTERFACE: &str = "eth0";
/// Default capture poll interval in milliseconds.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;
/// Default capture snapshot length: link header + IPv6 + TCP with room to spare.
pub const DEFAULT_SNAPLEN: u32 = 128;

/// File-level settings. Every field is optional in the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Number of concurrent workers.
    pub concurrency: usize,
    /// Per-probe timeout in milliseconds.
    pub timeout_ms: u64,
    /// Network interface to probe from.
    pub interface: String,
    /// Capture poll interval in milliseconds.
    pub poll_interval_ms: u64,
    /// Capture snapshot length in bytes.
    pub snaplen: u32,
    /// Source port selection strategy.
    pub port_strategy: PortStrategy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            interface: DEFAULT_INTERFACE.to_string(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            snaplen: DEFAULT_SNAPLEN,
            port_strategy: PortStrategy::default(),
        }
    }
}

impl Settings {
    /// Path of the settings file in the platform config directory.
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "turboprobe")
            .map(|project| project.config_dir().join("settings.json"))
    }

    /// Load settings from the default location, or defaults if absent.
    pub fn load() -> ConfigResult<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load settings from a specific file.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        serde_json::from_str(&content).map_err(|e| ConfigError::InvalidFormat(e.to_string()))
    }
}
