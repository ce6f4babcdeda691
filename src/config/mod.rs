//! Configuration for zeptoctl
//!
//! The host reads a single `config.json` from its configuration directory
//! (`~/.zeptoctl` unless overridden by `ZEPTOCTL_CONFIG` or `--config`). The
//! plugin manager only consumes the extra plugin directories and the probe
//! tuning knobs; every other key in the file is ignored.
//!
//! # Example config.json
//!
//! ```json
//! {
//!   "cliPluginsExtraDirs": ["/opt/zeptoctl/plugins", "~/dev/plugins"],
//!   "pluginProbeTimeoutSecs": 5
//! }
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Result, ZeptoctlError};

/// Name of the configuration file inside the configuration directory.
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Environment variable overriding the configuration directory.
pub const CONFIG_DIR_ENV: &str = "ZEPTOCTL_CONFIG";

/// Environment variable replacing `cliPluginsExtraDirs` (platform path list).
pub const EXTRA_DIRS_ENV: &str = "ZEPTOCTL_CLI_PLUGINS_EXTRA_DIRS";

/// Environment variable overriding `pluginProbeTimeoutSecs`.
pub const PROBE_TIMEOUT_ENV: &str = "ZEPTOCTL_PLUGIN_PROBE_TIMEOUT_SECS";

const DEFAULT_DIR_NAME: &str = ".zeptoctl";
const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 10;
const DEFAULT_PROBE_CONCURRENCY: usize = 8;

/// A snapshot of the persisted host configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Directory the configuration was loaded from. Not persisted.
    #[serde(skip)]
    pub dir: PathBuf,

    /// Extra plugin directories, searched before the default ones.
    pub cli_plugins_extra_dirs: Vec<PathBuf>,

    /// Upper bound on how long a plugin may take to answer a metadata request.
    pub plugin_probe_timeout_secs: u64,

    /// Maximum number of metadata probes running at once while listing.
    pub plugin_probe_concurrency: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self::with_dir(Self::dir())
    }
}

impl Config {
    /// Default configuration rooted at `dir`.
    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            cli_plugins_extra_dirs: Vec::new(),
            plugin_probe_timeout_secs: DEFAULT_PROBE_TIMEOUT_SECS,
            plugin_probe_concurrency: DEFAULT_PROBE_CONCURRENCY,
        }
    }

    /// The configuration directory: `$ZEPTOCTL_CONFIG`, else `~/.zeptoctl`.
    pub fn dir() -> PathBuf {
        match std::env::var_os(CONFIG_DIR_ENV) {
            Some(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => default_dir(dirs::home_dir()),
        }
    }

    /// Path of the config file inside the default configuration directory.
    pub fn path() -> PathBuf {
        Self::dir().join(CONFIG_FILE_NAME)
    }

    /// Load from the default configuration directory.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::dir())
    }

    /// Load `config.json` from `dir`, then apply environment overrides.
    ///
    /// A missing file yields the defaults. An unreadable or malformed file is
    /// a `ZeptoctlError::Config`.
    pub fn load_from(dir: &Path) -> Result<Self> {
        let mut config = Self::read_file(dir)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn read_file(dir: &Path) -> Result<Self> {
        let path = dir.join(CONFIG_FILE_NAME);
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::with_dir(dir));
        }

        let content = std::fs::read_to_string(&path).map_err(|e| {
            ZeptoctlError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let mut config: Config = serde_json::from_str(&content).map_err(|e| {
            ZeptoctlError::Config(format!("Failed to parse {}: {}", path.display(), e))
        })?;
        config.dir = dir.to_path_buf();
        Ok(config)
    }

    /// Apply overrides looked up through `lookup` (the process environment
    /// in production).
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(EXTRA_DIRS_ENV) {
            self.cli_plugins_extra_dirs = std::env::split_paths(&value)
                .filter(|p| !p.as_os_str().is_empty())
                .collect();
        }

        if let Some(value) = lookup(PROBE_TIMEOUT_ENV) {
            match value.trim().parse::<u64>() {
                Ok(secs) => self.plugin_probe_timeout_secs = secs,
                Err(e) => warn!(
                    var = PROBE_TIMEOUT_ENV,
                    value = %value,
                    error = %e,
                    "Ignoring invalid probe timeout override"
                ),
            }
        }
    }

    /// Probe timeout as a `Duration`. Zero is treated as one second.
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.plugin_probe_timeout_secs.max(1))
    }

    /// Probe concurrency, never below one.
    pub fn probe_concurrency(&self) -> usize {
        self.plugin_probe_concurrency.max(1)
    }
}

/// `<home>/.zeptoctl`, or `.zeptoctl` under the working directory when
/// there is no home directory.
fn default_dir(home: Option<PathBuf>) -> PathBuf {
    match home {
        Some(home) => home.join(DEFAULT_DIR_NAME),
        None => {
            warn!(
                "No home directory found, using ./{} (set {} to choose one)",
                DEFAULT_DIR_NAME, CONFIG_DIR_ENV
            );
            PathBuf::from(DEFAULT_DIR_NAME)
        }
    }
}
