//! Directory listing entries.

use chrono::{DateTime, Utc};
use serde::Serialize;

const SIZE_UNITS: [&str; 7] = ["B", "KiB", "MiB", "GiB", "TiB", "PiB", "EiB"];

/// A regular file inside a listed directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    pub name: String,
    pub last_modified_time: DateTime<Utc>,
    pub size_bytes: u64,
    pub human_readable_size: String,
}

impl FileEntry {
    pub fn new(name: impl Into<String>, last_modified_time: DateTime<Utc>, size_bytes: u64) -> Self {
        Self {
            name: name.into(),
            last_modified_time,
            size_bytes,
            human_readable_size: human_readable_size(size_bytes),
        }
    }
}

/// A sub-directory inside a listed directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryEntry {
    pub name: String,
    /// Path from the repository root, always ending with `/`
    pub path_relative_to_root: String,
}

/// One child of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ResourceEntry {
    File(FileEntry),
    Directory(DirectoryEntry),
}

impl ResourceEntry {
    pub fn name(&self) -> &str {
        match self {
            ResourceEntry::File(file) => &file.name,
            ResourceEntry::Directory(dir) => &dir.name,
        }
    }

    pub fn is_directory(&self) -> bool {
        matches!(self, ResourceEntry::Directory(_))
    }
}

/// Format a byte count with binary units, e.g. `1.5 KiB`.
pub fn human_readable_size(bytes: u64) -> String {
    if bytes < 1024 {
        return format!("{} B", bytes);
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < SIZE_UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, SIZE_UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_human_readable_size_bytes() {
        assert_eq!(human_readable_size(0), "0 B");
        assert_eq!(human_readable_size(1023), "1023 B");
    }

    #[test]
    fn test_human_readable_size_binary_units() {
        assert_eq!(human_readable_size(1024), "1.0 KiB");
        assert_eq!(human_readable_size(1536), "1.5 KiB");
        assert_eq!(human_readable_size(5 * 1024 * 1024), "5.0 MiB");
        assert_eq!(human_readable_size(3 * 1024 * 1024 * 1024), "3.0 GiB");
        assert_eq!(human_readable_size(u64::MAX), "16.0 EiB");
    }

    #[test]
    fn test_entry_serializes_with_type_tag() {
        let entry = ResourceEntry::Directory(DirectoryEntry {
            name: "B".to_string(),
            path_relative_to_root: "B/".to_string(),
        });
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["type"], "directory");
        assert_eq!(json["pathRelativeToRoot"], "B/");
    }
}
