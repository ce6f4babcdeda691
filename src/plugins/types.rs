//! Plugin types for zeptoctl
//!
//! This module defines the data shared by the discovery, probing and
//! dispatch stages: the metadata document a plugin reports about itself,
//! discovered candidates, resolved plugins, and the unified `Command`
//! returned by the registry.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The metadata document a plugin prints in answer to the reserved
/// metadata sub-invocation.
///
/// Keys are PascalCase on the wire. Only `SchemaVersion` is mandatory;
/// unknown keys are kept in `extra` so newer plugins round-trip intact.
///
/// # Example
///
/// ```json
/// {
///   "SchemaVersion": "0.1.0",
///   "Vendor": "Example Corp.",
///   "Version": "v1.2.0",
///   "ShortDescription": "Build images with extra features"
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Metadata {
    /// Plugin protocol version the plugin speaks.
    #[serde(default)]
    pub schema_version: String,

    /// Who ships the plugin.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub vendor: String,

    /// The plugin's own version string (free-form).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,

    /// One-line description used in listings.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub short_description: String,

    /// Project or documentation URL.
    #[serde(rename = "URL", default, skip_serializing_if = "String::is_empty")]
    pub url: String,

    /// Plugin marks itself as experimental.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub experimental: bool,

    /// Any additional keys the plugin reported.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A filesystem entry that looks like a plugin but has not been probed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Logical name (file name with the plugin prefix stripped).
    pub name: String,

    /// Path of the entry, inside the directory it was found in.
    pub path: PathBuf,

    /// Position of the source directory in the search path. Lower wins.
    pub dir_rank: usize,
}

/// A probed, usable plugin.
#[derive(Debug, Clone, PartialEq)]
pub struct Plugin {
    /// Logical plugin name.
    pub name: String,

    /// Path of the authoritative (highest-precedence) candidate.
    pub path: PathBuf,

    /// Metadata reported by the plugin.
    pub metadata: Metadata,

    /// Lower-precedence candidates with the same name, in precedence order.
    pub shadowed_paths: Vec<PathBuf>,
}

/// A command compiled into the host binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltinCommand {
    pub name: String,
    pub short_description: String,
}

impl BuiltinCommand {
    pub fn new(name: impl Into<String>, short_description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            short_description: short_description.into(),
        }
    }
}

/// Anything the host can dispatch a top-level name to.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Handled in-process by the host.
    BuiltIn(BuiltinCommand),
    /// Executed as a child process.
    External(Plugin),
}

impl Command {
    pub fn name(&self) -> &str {
        match self {
            Command::BuiltIn(b) => &b.name,
            Command::External(p) => &p.name,
        }
    }

    pub fn is_builtin(&self) -> bool {
        matches!(self, Command::BuiltIn(_))
    }

    /// Display metadata. Built-ins get a synthetic document attributed to
    /// the host itself.
    pub fn metadata(&self) -> Metadata {
        match self {
            Command::BuiltIn(b) => Metadata {
                schema_version: super::SCHEMA_VERSION.to_string(),
                vendor: "zeptoctl".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                short_description: b.short_description.clone(),
                ..Default::default()
            },
            Command::External(p) => p.metadata.clone(),
        }
    }

    /// Filesystem path of an external command.
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            Command::BuiltIn(_) => None,
            Command::External(p) => Some(&p.path),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_metadata_minimal_document() {
        let meta: Metadata = serde_json::from_str(r#"{"SchemaVersion":"0.1.0"}"#).unwrap();
        assert_eq!(meta.schema_version, "0.1.0");
        assert!(meta.vendor.is_empty());
        assert!(!meta.experimental);
        assert!(meta.extra.is_empty());
    }

    #[test]
    fn test_metadata_full_document_keeps_unknown_keys() {
        let meta: Metadata = serde_json::from_value(json!({
            "SchemaVersion": "0.1.0",
            "Vendor": "Example Corp.",
            "Version": "v0.9.1",
            "ShortDescription": "Do things",
            "URL": "https://example.com",
            "Experimental": true,
            "Hooks": ["build"]
        }))
        .unwrap();

        assert_eq!(meta.vendor, "Example Corp.");
        assert_eq!(meta.url, "https://example.com");
        assert!(meta.experimental);
        assert_eq!(meta.extra.get("Hooks"), Some(&json!(["build"])));

        let back = serde_json::to_value(&meta).unwrap();
        assert_eq!(back["URL"], "https://example.com");
        assert_eq!(back["Hooks"], json!(["build"]));
    }

    #[test]
    fn test_metadata_serialization_skips_empty_fields() {
        let meta = Metadata {
            schema_version: "0.1.0".into(),
            ..Default::default()
        };
        let value = serde_json::to_value(&meta).unwrap();
        assert_eq!(value, json!({"SchemaVersion": "0.1.0"}));
    }

    #[test]
    fn test_builtin_command_metadata_is_synthetic() {
        let cmd = Command::BuiltIn(BuiltinCommand::new("version", "Show the version"));
        assert!(cmd.is_builtin());
        assert_eq!(cmd.name(), "version");
        assert!(cmd.path().is_none());

        let meta = cmd.metadata();
        assert_eq!(meta.schema_version, "0.1.0");
        assert_eq!(meta.vendor, "zeptoctl");
        assert_eq!(meta.short_description, "Show the version");
    }

    #[test]
    fn test_external_command_exposes_plugin() {
        let plugin = Plugin {
            name: "hello".into(),
            path: PathBuf::from("/opt/zeptoctl-hello"),
            metadata: Metadata {
                schema_version: "0.1.0".into(),
                vendor: "Acme".into(),
                ..Default::default()
            },
            shadowed_paths: Vec::new(),
        };
        let cmd = Command::External(plugin);
        assert!(!cmd.is_builtin());
        assert_eq!(cmd.name(), "hello");
        assert_eq!(cmd.path(), Some(std::path::Path::new("/opt/zeptoctl-hello")));
        assert_eq!(cmd.metadata().vendor, "Acme");
    }
}
