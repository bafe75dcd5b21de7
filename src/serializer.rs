//! Serialization of analysis reports to YAML or JSON.
//!
//! This module renders [`AnalysisReport`]s in either format and writes the
//! result to files.

use crate::report::AnalysisReport;
use anyhow::{Context, Result};
use log::debug;
use std::fs;
use std::path::Path;

/// Serializes an analysis report to YAML format.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn serialize_yaml(report: &AnalysisReport) -> Result<String> {
    debug!("Serializing analysis report to YAML");
    serde_yaml::to_string(report).context("Failed to serialize analysis report to YAML")
}

/// Serializes an analysis report to pretty-printed JSON.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn serialize_json(report: &AnalysisReport) -> Result<String> {
    debug!("Serializing analysis report to JSON");
    serde_json::to_string_pretty(report).context("Failed to serialize analysis report to JSON")
}

/// Writes string content to a file.
///
/// Creates the file and any missing parent directories, or overwrites an
/// existing file.
///
/// # Errors
///
/// Returns an error if the file cannot be created or written to.
pub fn write_to_file(content: &str, path: &Path) -> Result<()> {
    debug!("Writing content to file: {}", path.display());

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    fs::write(path, content)
        .with_context(|| format!("Failed to write to file: {}", path.display()))?;

    debug!("Successfully wrote {} bytes to {}", content.len(), path.display());
    Ok(())
}
