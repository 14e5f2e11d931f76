//! Loads the inputs of a grading run from disk.
//!
//! Projects come either as `.sb3` archives (a zip with `project.json` at the
//! root) or as a bare `project.json`. The archive is recognised by its zip
//! signature, not by the file extension.

use crate::options::GradingOptions;
use crate::requirements::Requirement;
use anyhow::{anyhow, Context, Result};
use serde_json::Value;
use std::fs;
use std::io::{Cursor, Read};
use std::path::Path;
use tracing::debug;
use zip::ZipArchive;

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

pub fn load_project(path: &Path) -> Result<Value> {
    let bytes = fs::read(path).with_context(|| format!("Failed to open '{}'.", path.display()))?;
    if bytes.starts_with(ZIP_MAGIC) {
        debug!(path = %path.display(), "reading project.json from archive");
        return read_sb3_project(&bytes, path);
    }
    serde_json::from_slice(&bytes)
        .with_context(|| format!("'{}' is neither a .sb3 archive nor valid JSON.", path.display()))
}

fn read_sb3_project(bytes: &[u8], path: &Path) -> Result<Value> {
    let mut zip = ZipArchive::new(Cursor::new(bytes))
        .with_context(|| format!("'{}' is not a valid zip/.sb3 file.", path.display()))?;
    let mut project_json = String::new();
    zip.by_name("project.json")
        .map_err(|_| anyhow!("project.json not found in '{}'.", path.display()))?
        .read_to_string(&mut project_json)
        .with_context(|| format!("Failed to read project.json from '{}'.", path.display()))?;
    serde_json::from_str(&project_json)
        .with_context(|| format!("Invalid project.json inside '{}'.", path.display()))
}

/// A hand-curated rubric: a JSON array of requirements.
pub fn load_requirements(path: &Path) -> Result<Vec<Requirement>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read requirements '{}'.", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("Invalid requirements file '{}'.", path.display()))
}

pub fn load_options(path: &Path) -> Result<GradingOptions> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config '{}'.", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Invalid config file '{}'.", path.display()))
}
