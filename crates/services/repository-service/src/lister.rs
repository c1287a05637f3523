//! Non-recursive directory listings.

use std::fs;
use std::io;
use std::path::Path;

use chrono::{DateTime, Utc};
use tracing::debug;

use domain::{DirectoryEntry, FileEntry, ResourceEntry};

/// Builds the listing of a single directory.
///
/// Children are read fresh on every call. A child whose metadata cannot be
/// read, whose name is not valid UTF-8, or whose physical location lies
/// outside `root` is left out of the listing.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResourceLister;

impl ResourceLister {
    pub fn new() -> Self {
        Self
    }

    /// List the direct children of `directory`, a canonical path under `root`.
    ///
    /// Entries are ordered by name, ordinal and case-sensitive.
    pub fn list(&self, root: &Path, directory: &Path) -> io::Result<Vec<ResourceEntry>> {
        let mut entries = Vec::new();

        for child in fs::read_dir(directory)? {
            let child = match child {
                Ok(child) => child,
                Err(e) => {
                    debug!(directory = %directory.display(), error = %e, "Skipping unreadable entry");
                    continue;
                }
            };

            let Ok(name) = child.file_name().into_string() else {
                debug!(directory = %directory.display(), "Skipping entry with non UTF-8 name");
                continue;
            };

            let path = child.path();
            let physical = match path.canonicalize() {
                Ok(physical) if physical.starts_with(root) => physical,
                Ok(_) => {
                    debug!(entry = %name, "Skipping entry pointing outside the repository");
                    continue;
                }
                Err(e) => {
                    debug!(entry = %name, error = %e, "Skipping entry without metadata");
                    continue;
                }
            };

            let metadata = match fs::metadata(&physical) {
                Ok(metadata) => metadata,
                Err(e) => {
                    debug!(entry = %name, error = %e, "Skipping entry without metadata");
                    continue;
                }
            };

            if metadata.is_dir() {
                let Some(relative) = relative_directory_path(root, directory, &name) else {
                    continue;
                };
                entries.push(ResourceEntry::Directory(DirectoryEntry {
                    name,
                    path_relative_to_root: relative,
                }));
            } else if metadata.is_file() {
                let modified = match metadata.modified() {
                    Ok(modified) => DateTime::<Utc>::from(modified),
                    Err(e) => {
                        debug!(entry = %name, error = %e, "Skipping entry without modification time");
                        continue;
                    }
                };
                entries.push(ResourceEntry::File(FileEntry::new(name, modified, metadata.len())));
            }
        }

        entries.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(entries)
    }
}

/// `/`-separated path of `directory/name` from `root`, with leading and
/// trailing `/`.
fn relative_directory_path(root: &Path, directory: &Path, name: &str) -> Option<String> {
    let parent = directory.strip_prefix(root).ok()?;
    let mut relative = String::from("/");
    for component in parent.iter() {
        relative.push_str(component.to_str()?);
        relative.push('/');
    }
    relative.push_str(name);
    relative.push('/');
    Some(relative)
}
