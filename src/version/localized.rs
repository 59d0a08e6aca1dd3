//! Version propagation into the localized application config.
//!
//! Each language carries a display string such as `"cg-file-backup 1.0.0(5)"`.
//! Only the dotted number is rewritten; the label and the parenthesised build
//! number stay as they are. Text without that shape is never touched.

use crate::bundler::{ErrorExt, LocalizedConfigSettings};
use crate::error::Result;
use crate::version::ReleaseVersion;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static VERSION_IN_TEXT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?P<label>\S+\s+)(?P<version>\d+(?:\.\d+)+)(?P<build>\(\d+\))")
        .expect("version pattern is a valid regex")
});

/// Per-language result of a propagation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalizedReport {
    /// Config file that was inspected.
    pub path: PathBuf,
    /// Languages whose text now carries the new version.
    pub updated: Vec<String>,
    /// Languages that already carried the new version.
    pub current: Vec<String>,
    /// Languages whose field is missing or has no version-shaped text.
    pub unmatched: Vec<String>,
}

/// Outcome of [`sync_localized_config`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalizedUpdate {
    /// The config file does not exist.
    Missing {
        /// Expected location
        path: PathBuf,
    },
    /// The file is not JSON or lacks the language section; left untouched.
    Malformed {
        /// Config path
        path: PathBuf,
        /// What was wrong
        reason: String,
    },
    /// The file was parsed; see the report for per-language results.
    Applied(LocalizedReport),
}

/// Rewrites the version number inside `text`.
///
/// Returns `None` when the text has no `<label> <x.y.z>(<build>)` run.
pub fn replace_version_in_text(text: &str, version: &str) -> Option<String> {
    let captures = VERSION_IN_TEXT.captures(text)?;
    let number = captures.name("version")?;

    let mut replaced = String::with_capacity(text.len() + version.len());
    replaced.push_str(&text[..number.start()]);
    replaced.push_str(version);
    replaced.push_str(&text[number.end()..]);
    Some(replaced)
}

/// Writes `version` into every language's display text.
///
/// Missing or malformed files are reported, not raised. Only a failure to
/// write the updated file is an error.
pub fn sync_localized_config(
    base: &Path,
    settings: &LocalizedConfigSettings,
    version: &ReleaseVersion,
) -> Result<LocalizedUpdate> {
    let path = base.join(&settings.path);

    let contents = match std::fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(LocalizedUpdate::Missing { path });
        }
        Err(e) => {
            return Ok(LocalizedUpdate::Malformed {
                path,
                reason: format!("unreadable: {}", e),
            });
        }
    };

    let mut document: serde_json::Value = match serde_json::from_str(&contents) {
        Ok(document) => document,
        Err(e) => {
            return Ok(LocalizedUpdate::Malformed {
                path,
                reason: format!("invalid JSON: {}", e),
            });
        }
    };

    let Some(languages) = document
        .get_mut(&settings.section)
        .and_then(serde_json::Value::as_object_mut)
    else {
        return Ok(LocalizedUpdate::Malformed {
            path,
            reason: format!("no '{}' object", settings.section),
        });
    };

    let mut report = LocalizedReport {
        path: path.clone(),
        ..Default::default()
    };

    for (language, fields) in languages.iter_mut() {
        let Some(text) = fields
            .get_mut(&settings.field)
            .filter(|value| value.is_string())
        else {
            report.unmatched.push(language.clone());
            continue;
        };

        let original = text.as_str().unwrap_or_default().to_string();
        match replace_version_in_text(&original, version.as_str()) {
            Some(rewritten) if rewritten == original => report.current.push(language.clone()),
            Some(rewritten) => {
                *text = serde_json::Value::String(rewritten);
                report.updated.push(language.clone());
            }
            None => report.unmatched.push(language.clone()),
        }
    }

    if !report.updated.is_empty() {
        let mut serialized = serde_json::to_string_pretty(&document)?;
        serialized.push('\n');
        std::fs::write(&path, serialized).fs_context("writing localized config", &path)?;
        log::info!(
            "Updated version in {} for {}",
            path.display(),
            report.updated.join(", ")
        );
    }

    Ok(LocalizedUpdate::Applied(report))
}
