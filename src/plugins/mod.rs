//! CLI plugin manager for zeptoctl
//!
//! This module extends the host's fixed built-in command set with external
//! executables discovered at runtime. A plugin is any executable (or symlink)
//! named `zeptoctl-<name>` in one of the plugin directories; it becomes the
//! top-level command `zeptoctl <name>`.
//!
//! # Architecture
//!
//! - **search_path**: Ordered plugin search path built from the configuration
//! - **candidates**: Directory scan producing name -> ordered candidate paths
//! - **probe**: Runs a candidate with the reserved metadata argument and
//!   validates the reported schema version
//! - **registry**: Merges built-ins and probed plugins (`PluginManager`)
//! - **invoke**: Runs a resolved plugin in the foreground and mirrors its
//!   exit status
//!
//! # Search Path
//!
//! ```text
//! <cliPluginsExtraDirs...>          (config, in order)
//! ~/.zeptoctl/cli-plugins/          (user)
//! /usr/local/lib/zeptoctl/cli-plugins/
//! /usr/local/libexec/zeptoctl/cli-plugins/
//! /usr/lib/zeptoctl/cli-plugins/
//! /usr/libexec/zeptoctl/cli-plugins/
//! ```
//!
//! Earlier directories win when two contain the same plugin name. Built-in
//! commands always win over plugins.
//!
//! # Metadata Protocol
//!
//! ```text
//! $ zeptoctl-hello zeptoctl-cli-plugin-metadata
//! {"SchemaVersion":"0.1.0","Vendor":"Acme","ShortDescription":"Say hello"}
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use zeptoctl::config::Config;
//! use zeptoctl::plugins::{BuiltinCommand, Command, Invoker, PluginManager};
//!
//! # async fn run() -> zeptoctl::error::Result<()> {
//! let config = Config::load()?;
//! let builtins = vec![BuiltinCommand::new("version", "Show version")];
//! let manager = PluginManager::new(&config, builtins);
//!
//! if let Command::External(plugin) = manager.resolve("hello").await? {
//!     let exit = Invoker::new(&config).run(&plugin, &["world".into()]).await?;
//!     zeptoctl::plugins::exit_with(exit);
//! }
//! # Ok(())
//! # }
//! ```

mod candidates;
mod invoke;
mod probe;
pub mod registry;
mod search_path;
pub mod types;

pub use candidates::{list_candidates, Candidates};
pub use invoke::{exit_with, Invoker, PluginExit};
pub use probe::{probe, validate_metadata, ProbeOptions};
pub use registry::PluginManager;
pub use search_path::{plugin_dirs, system_plugin_dirs, user_plugin_dir};
pub use types::{BuiltinCommand, Candidate, Command, Metadata, Plugin};

/// File name prefix that marks an executable as a plugin.
pub const PLUGIN_NAME_PREFIX: &str = "zeptoctl-";

/// Reserved argument asking a plugin for its metadata document.
pub const METADATA_SUBCOMMAND: &str = "zeptoctl-cli-plugin-metadata";

/// Schema version the host itself speaks (used for built-in metadata).
pub const SCHEMA_VERSION: &str = "0.1.0";

/// Schema versions a plugin may declare.
pub const SUPPORTED_SCHEMA: &str = "^0.1.0";

/// Set for the plugin: path of the host executable that launched it.
pub const ENV_ORIGINAL_CLI_COMMAND: &str = "ZEPTOCTL_CLI_PLUGIN_ORIGINAL_CLI_COMMAND";

/// Set for the plugin: version of the host that launched it.
pub const ENV_HOST_VERSION: &str = "ZEPTOCTL_CLI_PLUGIN_HOST_VERSION";
