//! Command-line surface of the host.
//!
//! Built-in subcommands are declared with clap; any other top-level word is
//! captured as an external subcommand and dispatched to a plugin.

mod plugin;

use std::ffi::OsString;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};

use zeptoctl::config::Config;
use zeptoctl::plugins::{BuiltinCommand, SCHEMA_VERSION, SUPPORTED_SCHEMA};

#[derive(Parser)]
#[command(name = "zeptoctl")]
#[command(about = "Command-line host with pluggable subcommands", long_about = None)]
#[command(allow_external_subcommands = true, arg_required_else_help = true)]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Configuration directory (default: $ZEPTOCTL_CONFIG or ~/.zeptoctl)
    #[arg(long, global = true, value_name = "DIR")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short = 'D', long, global = true)]
    pub debug: bool,

    /// Output logs as JSON instead of human-readable
    #[arg(long, global = true)]
    pub json_logs: bool,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Show version information
    Version,
    /// Manage CLI plugins
    Plugin {
        #[command(subcommand)]
        action: PluginAction,
    },
    #[command(external_subcommand)]
    External(Vec<OsString>),
}

#[derive(Subcommand)]
pub(crate) enum PluginAction {
    /// List commands and installed plugins
    Ls {
        /// Also show candidates that failed to load
        #[arg(short, long)]
        all: bool,
        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },
    /// Show details of a single plugin as JSON
    Inspect {
        /// Plugin name
        name: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Table,
    Json,
}

pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Some(Commands::Version) => {
            println!("zeptoctl {}", env!("CARGO_PKG_VERSION"));
            println!("Plugin schema: {} (accepts {})", SCHEMA_VERSION, SUPPORTED_SCHEMA);
        }
        Some(Commands::Plugin { action }) => match action {
            PluginAction::Ls { all, format } => plugin::cmd_plugin_ls(&config, all, format).await?,
            PluginAction::Inspect { name } => plugin::cmd_plugin_inspect(&config, &name).await?,
        },
        Some(Commands::External(args)) => plugin::cmd_external(&config, args).await?,
        None => {
            Cli::command().print_help()?;
        }
    }

    Ok(())
}

fn load_config(dir: Option<&std::path::Path>) -> Result<Config> {
    match dir {
        Some(dir) => Config::load_from(dir)
            .with_context(|| format!("Failed to load configuration from {}", dir.display())),
        None => Config::load().with_context(|| "Failed to load configuration"),
    }
}

/// Built-in command names, taken from the clap command tree so plugins can
/// never shadow them.
pub(crate) fn builtin_commands() -> Vec<BuiltinCommand> {
    let command = Cli::command();
    let mut builtins: Vec<BuiltinCommand> = command
        .get_subcommands()
        .map(|sub| {
            BuiltinCommand::new(
                sub.get_name(),
                sub.get_about().map(|a| a.to_string()).unwrap_or_default(),
            )
        })
        .collect();

    // clap answers `help` itself before external dispatch.
    if !builtins.iter().any(|b| b.name == "help") {
        builtins.push(BuiltinCommand::new("help", "Print help"));
    }
    builtins
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_builtin_commands_come_from_clap() {
        let names: Vec<String> = builtin_commands().into_iter().map(|b| b.name).collect();
        assert!(names.contains(&"version".to_string()));
        assert!(names.contains(&"plugin".to_string()));
        assert!(names.contains(&"help".to_string()));
        assert!(!names.iter().any(|n| n.is_empty()));
    }

    #[test]
    fn test_unknown_word_is_external() {
        let cli = Cli::try_parse_from(["zeptoctl", "-D", "hello", "--flag", "x"]).unwrap();
        assert!(cli.debug);
        match cli.command {
            Some(Commands::External(args)) => {
                assert_eq!(args, vec![OsString::from("hello"), "--flag".into(), "x".into()]);
            }
            _ => panic!("expected external subcommand"),
        }
    }

    #[test]
    fn test_plugin_ls_flags() {
        let cli =
            Cli::try_parse_from(["zeptoctl", "plugin", "ls", "--all", "--format", "json"]).unwrap();
        match cli.command {
            Some(Commands::Plugin {
                action: PluginAction::Ls { all, format },
            }) => {
                assert!(all);
                assert_eq!(format, OutputFormat::Json);
            }
            _ => panic!("expected plugin ls"),
        }
    }
}
