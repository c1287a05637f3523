//! Traversal-safe resolution of request paths.
//!
//! The request path is percent-decoded, normalized segment by segment, and
//! finally checked against the physical (symlink-resolved) location. A
//! resolved location is always the repository root or one of its descendants.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;
use tracing::warn;

use domain::Repository;

/// Where a request path leads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    /// A regular file to stream
    File(PathBuf),
    /// A directory to list
    Directory(PathBuf),
    /// Directory requested without a trailing separator; the value is the
    /// repository-relative path to redirect to (`path/indexFileName`)
    Redirect(String),
}

/// Why a request path could not be resolved.
///
/// Callers must not tell the two apart in responses.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveError {
    #[error("resource not found")]
    NotFound,

    #[error("path escapes the repository root")]
    Forbidden,
}

/// Resolves repository-relative paths below a storage root.
///
/// Each repository lives in the storage root's sub-directory of the same name.
#[derive(Debug, Clone)]
pub struct PathResolver {
    storage_root: PathBuf,
}

impl PathResolver {
    /// Create a resolver for an existing storage directory.
    pub fn new(storage_root: impl AsRef<Path>) -> io::Result<Self> {
        let storage_root = storage_root.as_ref().canonicalize()?;
        if !storage_root.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is not a directory", storage_root.display()),
            ));
        }
        Ok(Self { storage_root })
    }

    pub fn storage_root(&self) -> &Path {
        &self.storage_root
    }

    pub fn repository_root(&self, repository: &Repository) -> PathBuf {
        self.storage_root.join(&repository.name)
    }

    /// Resolve `request_path` inside `repository`.
    pub fn resolve(&self, repository: &Repository, request_path: &str) -> Result<Location, ResolveError> {
        let result = resolve_under(
            &self.repository_root(repository),
            request_path,
            &repository.index_file_name,
        );
        if result == Err(ResolveError::Forbidden) {
            warn!(
                repository = %repository.name,
                path = %request_path,
                "Rejected path outside repository root"
            );
        }
        result
    }
}

/// Resolve `request_path` below `root`.
pub fn resolve_under(
    root: &Path,
    request_path: &str,
    index_file_name: &str,
) -> Result<Location, ResolveError> {
    let decoded = urlencoding::decode(request_path).map_err(|_| ResolveError::NotFound)?;
    if decoded.contains('\0') {
        return Err(ResolveError::NotFound);
    }

    let segments = normalize(&decoded)?;
    let root = root.canonicalize().map_err(|_| ResolveError::NotFound)?;
    let candidate = segments
        .iter()
        .fold(root.clone(), |path, segment| path.join(segment));
    // The bare repository root (`/name`) has no trailing separator either.
    let wants_directory = decoded.ends_with(['/', '\\']);

    let Some(physical) = contained(&root, &candidate)? else {
        return index_fallback(&root, &candidate, &segments, index_file_name);
    };

    let metadata = fs::metadata(&physical).map_err(|_| ResolveError::NotFound)?;
    if metadata.is_file() {
        return Ok(Location::File(physical));
    }
    if !metadata.is_dir() {
        return Err(ResolveError::NotFound);
    }

    if !wants_directory {
        return Ok(Location::Redirect(format!(
            "{}/{}",
            request_path, index_file_name
        )));
    }

    match contained(&root, &physical.join(index_file_name)) {
        Ok(Some(index)) if index.is_file() => Ok(Location::File(index)),
        _ => Ok(Location::Directory(physical)),
    }
}

/// `/`-separated path of `physical` below `root`, starting with `/`.
///
/// Both paths must already be canonical; `None` when `physical` is not under
/// `root`.
pub fn relative_path(root: &Path, physical: &Path) -> Option<String> {
    let relative = physical.strip_prefix(root).ok()?;
    let segments: Vec<_> = relative
        .components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect();
    Some(format!("/{}", segments.join("/")))
}

/// A missing `…/indexFileName` falls back to listing its parent directory.
fn index_fallback(
    root: &Path,
    candidate: &Path,
    segments: &[String],
    index_file_name: &str,
) -> Result<Location, ResolveError> {
    if segments.last().map(String::as_str) != Some(index_file_name) {
        return Err(ResolveError::NotFound);
    }

    let parent = candidate.parent().ok_or(ResolveError::NotFound)?;
    match contained(root, parent)? {
        Some(directory) if directory.is_dir() => Ok(Location::Directory(directory)),
        _ => Err(ResolveError::NotFound),
    }
}

/// Collapse `.` and `..`, treating `/` and `\` as separators.
///
/// A `..` that would climb above the root is rejected outright.
fn normalize(path: &str) -> Result<Vec<String>, ResolveError> {
    let mut segments: Vec<String> = Vec::new();
    for segment in path.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop().ok_or(ResolveError::Forbidden)?;
            }
            _ => {
                let mut components = Path::new(segment).components();
                match (components.next(), components.next()) {
                    (Some(Component::Normal(_)), None) => segments.push(segment.to_string()),
                    _ => return Err(ResolveError::Forbidden),
                }
            }
        }
    }
    Ok(segments)
}

/// Canonicalize `path` and require it to stay under `root`.
///
/// Returns `Ok(None)` when the path does not exist.
fn contained(root: &Path, path: &Path) -> Result<Option<PathBuf>, ResolveError> {
    match path.canonicalize() {
        Ok(physical) if physical.starts_with(root) => Ok(Some(physical)),
        Ok(_) => Err(ResolveError::Forbidden),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(_) => Err(ResolveError::NotFound),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    /// storage/
    ///   secret.txt
    ///   repo/
    ///     a.txt
    ///     docs/guide.md
    ///     site/index.html
    fn fixture() -> (TempDir, PathBuf) {
        let storage = TempDir::new().unwrap();
        let root = storage.path().join("repo");
        fs::create_dir_all(root.join("docs")).unwrap();
        fs::create_dir_all(root.join("site")).unwrap();
        fs::write(root.join("a.txt"), b"a").unwrap();
        fs::write(root.join("docs/guide.md"), b"guide").unwrap();
        fs::write(root.join("site/index.html"), b"<html>").unwrap();
        fs::write(storage.path().join("secret.txt"), b"secret").unwrap();
        (storage, root)
    }

    fn resolve(root: &Path, path: &str) -> Result<Location, ResolveError> {
        resolve_under(root, path, "index.html")
    }

    fn canonical(path: PathBuf) -> PathBuf {
        path.canonicalize().unwrap()
    }

    #[test]
    fn test_resolves_files() {
        let (_storage, root) = fixture();
        assert_eq!(
            resolve(&root, "/a.txt"),
            Ok(Location::File(canonical(root.join("a.txt"))))
        );
        assert_eq!(
            resolve(&root, "/docs/./guide.md"),
            Ok(Location::File(canonical(root.join("docs/guide.md"))))
        );
        assert_eq!(
            resolve(&root, "//docs//guide.md"),
            Ok(Location::File(canonical(root.join("docs/guide.md"))))
        );
    }

    #[test]
    fn test_missing_is_not_found() {
        let (_storage, root) = fixture();
        assert_eq!(resolve(&root, "/nope.txt"), Err(ResolveError::NotFound));
        assert_eq!(resolve(&root, "/docs/nope/deeper"), Err(ResolveError::NotFound));
    }

    #[test]
    fn test_directory_listing_and_redirect() {
        let (_storage, root) = fixture();
        assert_eq!(
            resolve(&root, "/docs/"),
            Ok(Location::Directory(canonical(root.join("docs"))))
        );
        assert_eq!(
            resolve(&root, "/"),
            Ok(Location::Directory(canonical(root.clone())))
        );
        assert_eq!(
            resolve(&root, "/docs"),
            Ok(Location::Redirect("/docs/index.html".to_string()))
        );
    }

    #[test]
    fn test_bare_root_redirects_to_index() {
        let (_storage, root) = fixture();
        assert_eq!(
            resolve(&root, ""),
            Ok(Location::Redirect("/index.html".to_string()))
        );
    }

    #[test]
    fn test_relative_path_follows_physical_location() {
        let (_storage, root) = fixture();
        let root = canonical(root);

        let Ok(Location::File(file)) = resolve(&root, "/docs/../site/") else {
            panic!("expected the site index file");
        };
        assert_eq!(relative_path(&root, &file).as_deref(), Some("/site/index.html"));
        assert_eq!(relative_path(&root, &root).as_deref(), Some("/"));
        assert_eq!(relative_path(&root.join("docs"), &root), None);
    }

    #[test]
    fn test_directory_with_index_file_serves_it() {
        let (_storage, root) = fixture();
        assert_eq!(
            resolve(&root, "/site/"),
            Ok(Location::File(canonical(root.join("site/index.html"))))
        );
    }

    #[test]
    fn test_missing_index_file_lists_parent() {
        let (_storage, root) = fixture();
        assert_eq!(
            resolve(&root, "/docs/index.html"),
            Ok(Location::Directory(canonical(root.join("docs"))))
        );
        assert_eq!(
            resolve(&root, "/index.html"),
            Ok(Location::Directory(canonical(root.clone())))
        );
        assert_eq!(
            resolve(&root, "/missing/index.html"),
            Err(ResolveError::NotFound)
        );
    }

    #[test]
    fn test_dot_dot_inside_root_is_collapsed() {
        let (_storage, root) = fixture();
        assert_eq!(
            resolve(&root, "/docs/../a.txt"),
            Ok(Location::File(canonical(root.join("a.txt"))))
        );
    }

    #[test]
    fn test_traversal_is_forbidden() {
        let (_storage, root) = fixture();
        for path in [
            "/../secret.txt",
            "/docs/../../secret.txt",
            "/%2e%2e/secret.txt",
            "/%2E%2E%2Fsecret.txt",
            "/..%2f..%2fetc%2fpasswd",
            "/..\\secret.txt",
            "/docs/..%5c..%5csecret.txt",
            "/../../etc/passwd",
        ] {
            assert_eq!(
                resolve(&root, path),
                Err(ResolveError::Forbidden),
                "path {:?} must not escape",
                path
            );
        }
    }

    #[test]
    fn test_double_encoding_is_decoded_once() {
        let (_storage, root) = fixture();
        assert_eq!(
            resolve(&root, "/%252e%252e/secret.txt"),
            Err(ResolveError::NotFound)
        );
    }

    #[test]
    fn test_null_bytes_and_bad_encoding() {
        let (_storage, root) = fixture();
        assert_eq!(resolve(&root, "/a.txt%00.png"), Err(ResolveError::NotFound));
        assert_eq!(resolve(&root, "/%ff%fe"), Err(ResolveError::NotFound));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_escape_is_forbidden() {
        let (storage, root) = fixture();
        std::os::unix::fs::symlink(storage.path().join("secret.txt"), root.join("leak.txt")).unwrap();
        std::os::unix::fs::symlink(storage.path(), root.join("outside")).unwrap();

        assert_eq!(resolve(&root, "/leak.txt"), Err(ResolveError::Forbidden));
        assert_eq!(resolve(&root, "/outside/secret.txt"), Err(ResolveError::Forbidden));
        assert_eq!(resolve(&root, "/outside/"), Err(ResolveError::Forbidden));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_inside_root_is_followed() {
        let (_storage, root) = fixture();
        std::os::unix::fs::symlink(root.join("docs/guide.md"), root.join("latest.md")).unwrap();

        assert_eq!(
            resolve(&root, "/latest.md"),
            Ok(Location::File(canonical(root.join("docs/guide.md"))))
        );
    }

    #[test]
    fn test_resolver_uses_repository_sub_directory() {
        let (storage, root) = fixture();
        let resolver = PathResolver::new(storage.path()).unwrap();
        let repository = Repository::new("repo");

        assert_eq!(resolver.repository_root(&repository), canonical(root.clone()));
        assert_eq!(
            resolver.resolve(&repository, "/a.txt"),
            Ok(Location::File(canonical(root.join("a.txt"))))
        );
        assert_eq!(
            resolver.resolve(&Repository::new("absent"), "/a.txt"),
            Err(ResolveError::NotFound)
        );
    }

    #[test]
    fn test_resolver_requires_existing_directory() {
        let storage = TempDir::new().unwrap();
        assert!(PathResolver::new(storage.path().join("missing")).is_err());

        let file = storage.path().join("file");
        fs::write(&file, b"x").unwrap();
        assert!(PathResolver::new(&file).is_err());
    }
}
