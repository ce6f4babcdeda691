//! Plugin command handlers (listing, inspection, external dispatch).

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use sha2::{Digest, Sha256};

use zeptoctl::config::Config;
use zeptoctl::plugins::{exit_with, Command, Invoker, Metadata, Plugin, PluginManager};
use zeptoctl::ZeptoctlError;

use super::{builtin_commands, OutputFormat};

/// One line of `plugin ls`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ListRow {
    name: String,
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<Metadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl ListRow {
    fn from_command(command: &Command) -> Self {
        Self {
            name: command.name().to_string(),
            kind: if command.is_builtin() { "builtin" } else { "plugin" },
            path: command.path().map(Path::to_path_buf),
            metadata: Some(command.metadata()),
            error: None,
        }
    }

    fn from_failure(name: String, error: &ZeptoctlError) -> Self {
        Self {
            name,
            kind: "invalid",
            path: None,
            metadata: None,
            error: Some(error.to_string()),
        }
    }
}

/// Output of `plugin inspect`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Inspection {
    name: String,
    path: PathBuf,
    sha256: String,
    shadowed_paths: Vec<PathBuf>,
    metadata: Metadata,
}

/// List every resolvable command; with `all`, also the candidates that
/// failed to load and why.
pub(crate) async fn cmd_plugin_ls(config: &Config, all: bool, format: OutputFormat) -> Result<()> {
    let manager = PluginManager::new(config, builtin_commands());

    let rows: Vec<ListRow> = if all {
        let mut rows: Vec<ListRow> = manager
            .builtins()
            .map(|b| ListRow::from_command(&Command::BuiltIn(b.clone())))
            .collect();
        for (name, outcome) in manager.inspect_all().await {
            rows.push(match outcome {
                Ok(plugin) => ListRow::from_command(&Command::External(plugin)),
                Err(e) => ListRow::from_failure(name, &e),
            });
        }
        rows.sort_by(|a, b| a.name.cmp(&b.name).then(a.kind.cmp(&b.kind)));
        rows
    } else {
        manager.list().await.iter().map(ListRow::from_command).collect()
    };

    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&rows)
                .with_context(|| "Failed to serialize plugin list")?;
            println!("{}", json);
        }
        OutputFormat::Table => print!("{}", render_table(&rows)),
    }

    Ok(())
}

/// Print a plugin's metadata, location and content digest.
pub(crate) async fn cmd_plugin_inspect(config: &Config, name: &str) -> Result<()> {
    let manager = PluginManager::new(config, builtin_commands());
    let plugin = manager.get_plugin(name).await?;

    let bytes = tokio::fs::read(&plugin.path)
        .await
        .with_context(|| format!("Failed to read plugin binary {}", plugin.path.display()))?;

    let inspection = Inspection {
        sha256: hex::encode(Sha256::digest(&bytes)),
        name: plugin.name,
        path: plugin.path,
        shadowed_paths: plugin.shadowed_paths,
        metadata: plugin.metadata,
    };

    println!("{}", serde_json::to_string_pretty(&inspection)?);
    Ok(())
}

/// Resolve the first word of `args` as a plugin and hand the process over
/// to it. Does not return when the plugin ran.
pub(crate) async fn cmd_external(config: &Config, args: Vec<OsString>) -> Result<()> {
    let mut args = args.into_iter();
    let Some(raw_name) = args.next() else {
        anyhow::bail!("missing command name");
    };
    let name = raw_name
        .to_str()
        .ok_or_else(|| ZeptoctlError::NotFound(raw_name.to_string_lossy().into_owned()))?;

    let manager = PluginManager::new(config, builtin_commands());
    let plugin: Plugin = match manager.resolve(name).await? {
        Command::External(plugin) => plugin,
        // clap dispatches built-ins before we get here.
        Command::BuiltIn(builtin) => anyhow::bail!("{} is a built-in command", builtin.name),
    };

    let rest: Vec<OsString> = args.collect();
    let exit = Invoker::new(config).run(&plugin, &rest).await?;
    exit_with(exit)
}

fn render_table(rows: &[ListRow]) -> String {
    const HEADERS: [&str; 5] = ["NAME", "KIND", "VERSION", "VENDOR", "DESCRIPTION"];

    let cells: Vec<[String; 5]> = rows
        .iter()
        .map(|row| {
            let (version, vendor, description) = match (&row.metadata, &row.error) {
                (_, Some(error)) => (String::new(), String::new(), format!("ERROR: {}", error)),
                (Some(m), None) => (m.version.clone(), m.vendor.clone(), m.short_description.clone()),
                (None, None) => Default::default(),
            };
            [row.name.clone(), row.kind.to_string(), version, vendor, description]
        })
        .collect();

    let mut widths = HEADERS.map(str::len);
    for line in &cells {
        for (width, cell) in widths.iter_mut().zip(line.iter()) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    let mut push_line = |fields: [&str; 5]| {
        let mut line = String::new();
        for (i, field) in fields.iter().enumerate() {
            if i + 1 == fields.len() {
                line.push_str(field);
            } else {
                line.push_str(&format!("{:<width$}  ", field, width = widths[i]));
            }
        }
        out.push_str(line.trim_end());
        out.push('\n');
    };

    push_line(HEADERS);
    for line in &cells {
        push_line([
            line[0].as_str(),
            line[1].as_str(),
            line[2].as_str(),
            line[3].as_str(),
            line[4].as_str(),
        ]);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use zeptoctl::plugins::BuiltinCommand;

    #[test]
    fn test_render_table_aligns_columns() {
        let rows = vec![
            ListRow::from_command(&Command::BuiltIn(BuiltinCommand::new("version", "Show version"))),
            ListRow::from_failure(
                "zz".to_string(),
                &ZeptoctlError::NotFound("zz".to_string()),
            ),
        ];

        let table = render_table(&rows);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("NAME     KIND"));
        assert!(lines[1].starts_with("version  builtin"));
        assert!(lines[1].ends_with("Show version"));
        assert!(lines[2].starts_with("zz       invalid"));
        assert!(lines[2].ends_with("ERROR: No such CLI plugin: zz"));
    }

    #[test]
    fn test_list_row_json_omits_empty_fields() {
        let row = ListRow::from_failure("bad".to_string(), &ZeptoctlError::Config("x".into()));
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["name"], "bad");
        assert_eq!(json["kind"], "invalid");
        assert!(json.get("path").is_none());
        assert!(json.get("metadata").is_none());
    }
}
