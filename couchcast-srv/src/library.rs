//! Catalog browser
//!
//! Lists playable entries under the library root: directories plus files with
//! a recognized container extension, dotfiles skipped, natural-sort order.

use std::path::{Component, Path, PathBuf};

use couchcast_common::natsort::natural_cmp;
use couchcast_common::{Error, Result};
use serde::Serialize;

/// Container extensions the catalog lists and the receiver can stream
const MEDIA_EXTENSIONS: [&str; 2] = ["mp4", "mkv"];

/// One catalog entry
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Entry {
    pub name: String,
    pub is_dir: bool,
}

/// MIME type for a media reference, derived from the container extension
pub fn content_type(media_ref: &str) -> &'static str {
    let ext = Path::new(media_ref)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    match ext.as_str() {
        "mkv" => "video/x-matroska",
        _ => "video/mp4",
    }
}

/// True when the file name carries a listed container extension
pub fn is_media_file(name: &str) -> bool {
    let ext = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    MEDIA_EXTENSIONS.contains(&ext.as_str())
}

/// Join a client-supplied relative path onto the library root.
///
/// Rejects absolute paths and `..` components so a request can never escape
/// the root.
pub fn safe_join(root: &Path, rel_path: &str) -> Result<PathBuf> {
    let rel = Path::new(rel_path);
    let mut joined = root.to_path_buf();
    for component in rel.components() {
        match component {
            Component::Normal(part) => joined.push(part),
            Component::CurDir => {}
            _ => {
                return Err(Error::InvalidInput(format!(
                    "path escapes library root: {}",
                    rel_path
                )))
            }
        }
    }
    Ok(joined)
}

/// List the playable contents of a directory under the library root,
/// natural-sorted.
pub fn browse(root: &Path, rel_path: &str) -> Result<Vec<Entry>> {
    let dir = safe_join(root, rel_path)?;
    if !dir.is_dir() {
        return Err(Error::NotFound(format!("no such directory: {}", rel_path)));
    }

    let mut entries: Vec<Entry> = Vec::new();
    for item in std::fs::read_dir(&dir)? {
        let item = item?;
        let name = match item.file_name().into_string() {
            Ok(name) => name,
            Err(_) => continue,
        };
        if name.starts_with('.') {
            continue;
        }
        let is_dir = item.file_type()?.is_dir();
        if is_dir || is_media_file(&name) {
            entries.push(Entry { name, is_dir });
        }
    }

    entries.sort_by(|a, b| natural_cmp(&a.name, &b.name));
    Ok(entries)
}
