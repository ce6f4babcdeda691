//! Plugin candidate discovery.
//!
//! Walks the plugin search path in order and collects every entry whose file
//! name carries the plugin prefix. Nothing is executed here; whether a
//! candidate actually works is decided later by probing it.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use tracing::debug;

use super::types::Candidate;
use super::PLUGIN_NAME_PREFIX;

/// Discovery result: every candidate, grouped by logical name.
///
/// Within a name, candidates are kept in search-path order, so the first
/// entry is the authoritative one and the rest are shadowed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Candidates {
    by_name: BTreeMap<String, Vec<Candidate>>,
}

impl Candidates {
    /// All candidates for `name`, highest precedence first.
    pub fn get(&self, name: &str) -> Option<&[Candidate]> {
        self.by_name.get(name).map(Vec::as_slice)
    }

    /// The highest-precedence candidate for `name`.
    pub fn first(&self, name: &str) -> Option<&Candidate> {
        self.by_name.get(name).and_then(|c| c.first())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Candidate names in alphabetical order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.by_name.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Candidate])> {
        self.by_name
            .iter()
            .map(|(name, candidates)| (name.as_str(), candidates.as_slice()))
    }

    /// Number of distinct names.
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// Name -> ordered candidate paths.
    pub fn to_path_map(&self) -> BTreeMap<String, Vec<PathBuf>> {
        self.by_name
            .iter()
            .map(|(name, candidates)| {
                (
                    name.clone(),
                    candidates.iter().map(|c| c.path.clone()).collect(),
                )
            })
            .collect()
    }

    fn push(&mut self, candidate: Candidate) {
        self.by_name
            .entry(candidate.name.clone())
            .or_default()
            .push(candidate);
    }
}

/// Scan `dirs` in order and collect plugin candidates.
///
/// Directories that are missing, unreadable, or not directories at all are
/// skipped. Entries that are directories are ignored; regular files and
/// symlinks are candidates, including symlinks whose target does not exist.
/// Distinct paths are never merged, even when they refer to the same file.
pub fn list_candidates(dirs: &[PathBuf]) -> Candidates {
    let mut candidates = Candidates::default();

    for (rank, dir) in dirs.iter().enumerate() {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                debug!(dir = %dir.display(), error = %e, "Skipping plugin directory");
                continue;
            }
        };

        let base = std::path::absolute(dir).unwrap_or_else(|_| dir.to_path_buf());

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    debug!(dir = %dir.display(), error = %e, "Failed to read directory entry");
                    continue;
                }
            };

            // Does not follow symlinks, so a dangling link still reports as
            // a symlink rather than an error.
            let file_type = match entry.file_type() {
                Ok(file_type) => file_type,
                Err(e) => {
                    debug!(path = %entry.path().display(), error = %e, "Failed to stat entry");
                    continue;
                }
            };
            if file_type.is_dir() {
                continue;
            }

            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                debug!(path = %entry.path().display(), "Skipping non UTF-8 file name");
                continue;
            };
            let Some(name) = plugin_name(file_name) else {
                continue;
            };

            debug!(plugin = name, path = %base.join(file_name).display(), rank, "Found plugin candidate");
            candidates.push(Candidate {
                name: name.to_string(),
                path: base.join(file_name),
                dir_rank: rank,
            });
        }
    }

    candidates
}

/// Logical plugin name for a file name, if it names a plugin.
fn plugin_name(file_name: &str) -> Option<&str> {
    let name = file_name.strip_prefix(PLUGIN_NAME_PREFIX)?;
    #[cfg(windows)]
    let name = name.strip_suffix(".exe")?;
    (!name.is_empty()).then_some(name)
}
