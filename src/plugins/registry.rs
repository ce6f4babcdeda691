//! Plugin registry for zeptoctl
//!
//! This module provides the `PluginManager`, which merges the host's
//! built-in commands with the plugins discovered on disk into a single
//! command namespace. Built-in names always win; among plugins, the
//! candidate from the earliest search directory wins.
//!
//! Direct resolution and listing deliberately treat broken candidates
//! differently: `resolve` reports why the authoritative candidate for a name
//! is unusable (it never falls back to a shadowed copy), while `list` simply
//! leaves such names out.

use std::collections::BTreeMap;
use std::path::PathBuf;

use futures::stream::{self, StreamExt};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::config::Config;
use crate::error::{Result, ZeptoctlError};

use super::candidates::{list_candidates, Candidates};
use super::probe::{probe, ProbeOptions};
use super::search_path::plugin_dirs;
use super::types::{BuiltinCommand, Command, Plugin};

static PLUGIN_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z][a-z0-9]*$").expect("plugin name pattern is valid"));

/// The host's command namespace for one process run.
///
/// Construction scans the plugin directories once; candidates are probed
/// lazily when a name is resolved or the plugins are listed. Nothing is
/// cached across runs.
///
/// # Example
///
/// ```rust,no_run
/// use std::path::PathBuf;
/// use zeptoctl::plugins::{BuiltinCommand, PluginManager};
///
/// # async fn run() {
/// let manager = PluginManager::from_dirs(
///     vec![PathBuf::from("/opt/zeptoctl/plugins")],
///     vec![BuiltinCommand::new("version", "Show version")],
/// );
/// for command in manager.list().await {
///     println!("{}", command.name());
/// }
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct PluginManager {
    /// Search path the candidates were collected from.
    dirs: Vec<PathBuf>,

    /// Built-in commands by name.
    builtins: BTreeMap<String, BuiltinCommand>,

    /// Everything found on disk, including shadowed and broken entries.
    candidates: Candidates,

    options: ProbeOptions,
}

impl PluginManager {
    /// Build the namespace for `config`: resolve its search path and scan it.
    pub fn new(config: &Config, builtins: impl IntoIterator<Item = BuiltinCommand>) -> Self {
        Self::from_dirs(plugin_dirs(config), builtins)
            .with_probe_options(ProbeOptions::from_config(config))
    }

    /// Build the namespace from an explicit search path.
    pub fn from_dirs(
        dirs: Vec<PathBuf>,
        builtins: impl IntoIterator<Item = BuiltinCommand>,
    ) -> Self {
        let candidates = list_candidates(&dirs);
        let builtins: BTreeMap<String, BuiltinCommand> = builtins
            .into_iter()
            .map(|b| (b.name.clone(), b))
            .collect();

        debug!(
            dirs = dirs.len(),
            candidates = candidates.len(),
            builtins = builtins.len(),
            "Plugin namespace scanned"
        );

        Self {
            dirs,
            builtins,
            candidates,
            options: ProbeOptions::default(),
        }
    }

    pub fn with_probe_options(mut self, options: ProbeOptions) -> Self {
        self.options = options;
        self
    }

    /// The search path, highest precedence first.
    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    /// The raw discovery result.
    pub fn candidates(&self) -> &Candidates {
        &self.candidates
    }

    pub fn builtin(&self, name: &str) -> Option<&BuiltinCommand> {
        self.builtins.get(name)
    }

    /// Built-in commands, sorted by name. Nothing is probed.
    pub fn builtins(&self) -> impl Iterator<Item = &BuiltinCommand> {
        self.builtins.values()
    }

    /// Resolve a top-level command name.
    ///
    /// Built-ins shadow plugins. Otherwise the highest-precedence candidate
    /// is probed and its failure, if any, is returned as is.
    ///
    /// # Errors
    /// - `ZeptoctlError::NotFound` if no built-in or candidate has this name
    /// - any probe error of the authoritative candidate
    pub async fn resolve(&self, name: &str) -> Result<Command> {
        if let Some(builtin) = self.builtins.get(name) {
            return Ok(Command::BuiltIn(builtin.clone()));
        }
        self.load_plugin(name).await.map(Command::External)
    }

    /// Resolve `name` as a plugin only.
    ///
    /// A candidate that collides with a built-in is reported as invalid,
    /// since it can never be reached.
    pub async fn get_plugin(&self, name: &str) -> Result<Plugin> {
        let top = self
            .candidates
            .first(name)
            .ok_or_else(|| ZeptoctlError::NotFound(name.to_string()))?;

        if self.builtins.contains_key(name) {
            return Err(ZeptoctlError::InvalidPlugin {
                path: top.path.clone(),
                reason: format!("plugin {:?} duplicates builtin command", name),
            });
        }

        self.load_plugin(name).await
    }

    /// Every resolvable command, built-ins and working plugins, sorted by name.
    pub async fn list(&self) -> Vec<Command> {
        let mut commands: Vec<Command> = self
            .builtins
            .values()
            .cloned()
            .map(Command::BuiltIn)
            .collect();
        commands.extend(self.list_plugins().await.into_iter().map(Command::External));
        commands.sort_by(|a, b| a.name().cmp(b.name()));
        commands
    }

    /// Working plugins, sorted by name. Broken candidates are left out.
    pub async fn list_plugins(&self) -> Vec<Plugin> {
        self.inspect_all()
            .await
            .into_iter()
            .filter_map(|(name, outcome)| match outcome {
                Ok(plugin) => Some(plugin),
                Err(e) => {
                    debug!(plugin = %name, error = %e, "Omitting plugin from listing");
                    None
                }
            })
            .collect()
    }

    /// Every candidate name with the outcome of resolving it as a plugin,
    /// sorted by name. Probes run concurrently up to the configured limit.
    pub async fn inspect_all(&self) -> Vec<(String, Result<Plugin>)> {
        let mut outcomes: Vec<(String, Result<Plugin>)> = stream::iter(self.candidates.names())
            .map(|name| async move { (name.to_string(), self.get_plugin(name).await) })
            .buffer_unordered(self.options.concurrency.max(1))
            .collect()
            .await;
        outcomes.sort_by(|a, b| a.0.cmp(&b.0));
        outcomes
    }

    async fn load_plugin(&self, name: &str) -> Result<Plugin> {
        let (top, shadowed) = self
            .candidates
            .get(name)
            .and_then(|c| c.split_first())
            .ok_or_else(|| ZeptoctlError::NotFound(name.to_string()))?;

        if !PLUGIN_NAME_RE.is_match(name) {
            return Err(ZeptoctlError::InvalidPlugin {
                path: top.path.clone(),
                reason: format!(
                    "plugin name {:?} must start with a lowercase letter and contain only lowercase letters and digits",
                    name
                ),
            });
        }

        let metadata = probe(&top.path, &self.options).await?;

        Ok(Plugin {
            name: name.to_string(),
            path: top.path.clone(),
            metadata,
            shadowed_paths: shadowed.iter().map(|c| c.path.clone()).collect(),
        })
    }
}
