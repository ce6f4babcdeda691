//! Plugin metadata probing.
//!
//! A candidate is asked for its metadata by running it with the reserved
//! metadata argument. The plugin must print a single JSON object on stdout
//! and exit successfully; the document's `SchemaVersion` must be one the host
//! understands.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use once_cell::sync::Lazy;
use semver::{Version, VersionReq};
use tokio::process::Command;
use tracing::debug;

use crate::config::Config;
use crate::error::{Result, ZeptoctlError};

use super::types::Metadata;
use super::{METADATA_SUBCOMMAND, SUPPORTED_SCHEMA};

static SUPPORTED_SCHEMA_REQ: Lazy<VersionReq> =
    Lazy::new(|| VersionReq::parse(SUPPORTED_SCHEMA).expect("SUPPORTED_SCHEMA is a valid requirement"));

/// Longest stderr excerpt carried into an error message.
const MAX_STDERR_EXCERPT: usize = 512;

/// Limits applied while probing candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeOptions {
    /// How long a single candidate may take to answer.
    pub timeout: Duration,
    /// Maximum number of probes in flight while listing.
    pub concurrency: usize,
}

impl Default for ProbeOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            concurrency: 8,
        }
    }
}

impl ProbeOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            timeout: config.probe_timeout(),
            concurrency: config.probe_concurrency(),
        }
    }
}

/// Run the candidate at `path` with the metadata argument and validate the
/// document it prints.
///
/// # Errors
/// - `ZeptoctlError::Exec` if the candidate cannot be started
/// - `ZeptoctlError::ProbeTimeout` if it does not finish within the timeout
/// - `ZeptoctlError::InvalidPlugin` on non-zero exit or malformed output
/// - `ZeptoctlError::UnsupportedSchema` if the schema version is not supported
pub async fn probe(path: &Path, options: &ProbeOptions) -> Result<Metadata> {
    debug!(path = %path.display(), "Probing plugin metadata");

    let child = Command::new(path)
        .arg(METADATA_SUBCOMMAND)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| ZeptoctlError::Exec {
            path: path.to_path_buf(),
            source,
        })?;

    // Dropping the wait future on timeout drops the child, which kills it.
    let output = tokio::time::timeout(options.timeout, child.wait_with_output())
        .await
        .map_err(|_| ZeptoctlError::ProbeTimeout {
            path: path.to_path_buf(),
            timeout: options.timeout,
        })?
        .map_err(|e| invalid(path, format!("failed to collect metadata output: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stderr = stderr.trim();
        let mut reason = format!("metadata command exited with {}", output.status);
        if !stderr.is_empty() {
            reason.push_str(": ");
            reason.extend(stderr.chars().take(MAX_STDERR_EXCERPT));
        }
        return Err(invalid(path, reason));
    }

    let metadata: Metadata = serde_json::from_slice(&output.stdout)
        .map_err(|e| invalid(path, format!("malformed metadata document: {}", e)))?;

    validate_metadata(path, &metadata)?;

    debug!(
        path = %path.display(),
        schema = %metadata.schema_version,
        vendor = %metadata.vendor,
        "Plugin metadata accepted"
    );

    Ok(metadata)
}

/// Check that a metadata document declares a supported schema version.
pub fn validate_metadata(path: &Path, metadata: &Metadata) -> Result<()> {
    let declared = metadata.schema_version.trim();
    let unsupported = || ZeptoctlError::UnsupportedSchema {
        path: path.to_path_buf(),
        version: metadata.schema_version.clone(),
        supported: SUPPORTED_SCHEMA.to_string(),
    };

    if declared.is_empty() {
        return Err(unsupported());
    }
    let version = Version::parse(declared).map_err(|_| unsupported())?;
    if !SUPPORTED_SCHEMA_REQ.matches(&version) {
        return Err(unsupported());
    }
    Ok(())
}

fn invalid(path: &Path, reason: String) -> ZeptoctlError {
    ZeptoctlError::InvalidPlugin {
        path: path.to_path_buf(),
        reason,
    }
}
