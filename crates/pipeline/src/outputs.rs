//! Output directory collection.

use std::path::{Path, PathBuf};

use serde::Serialize;
use styler_core::error::CoreError;

/// Directory name macOS archives leave behind; never an output.
const MACOS_METADATA_DIR: &str = "__MACOSX";

/// A produced file and its media type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputFile {
    pub path: PathBuf,
    pub media_type: &'static str,
}

impl OutputFile {
    pub fn new(path: PathBuf) -> Self {
        let media_type = media_type_for(&path);
        Self { path, media_type }
    }

    /// Lower-cased extension, if any.
    pub fn extension(&self) -> Option<String> {
        self.path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
    }
}

/// Media type inferred from the file extension.
pub fn media_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);

    match ext.as_deref() {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        Some("mp4") => "video/mp4",
        Some("json") => "application/json",
        _ => "application/octet-stream",
    }
}

/// Recursively list every file under `dir`.
///
/// Within each directory files come first, then subdirectories, each
/// group sorted by name. `__MACOSX` entries are skipped along with their
/// contents. Every visited path is logged relative to `dir`.
pub fn collect_outputs(dir: &Path) -> Result<Vec<OutputFile>, CoreError> {
    let mut files = Vec::new();
    collect_into(dir, "", &mut files)?;
    Ok(files)
}

fn collect_into(dir: &Path, prefix: &str, files: &mut Vec<OutputFile>) -> Result<(), CoreError> {
    let mut regular = Vec::new();
    let mut subdirs = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name == MACOS_METADATA_DIR {
            continue;
        }
        let path = entry.path();
        if path.is_file() {
            regular.push((name, path));
        } else if path.is_dir() {
            subdirs.push((name, path));
        }
    }

    regular.sort();
    subdirs.sort();

    for (name, path) in regular {
        tracing::info!("{prefix}{name}");
        files.push(OutputFile::new(path));
    }
    for (name, path) in subdirs {
        tracing::info!("{prefix}{name}/");
        collect_into(&path, &format!("{prefix}{name}/"), files)?;
    }

    Ok(())
}
