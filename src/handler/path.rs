//! Request path resolution
//!
//! Maps a URL path onto the file system without ever leaving the root
//! directory. Two layers of protection:
//! 1. Lexical: `..` segments and platform path prefixes are rejected
//!    before touching the disk.
//! 2. Physical: the joined path is canonicalized (following symlinks) and
//!    must still start with the canonical root.

use std::fs::Metadata;
use std::io;
use std::path::{Component, Path, PathBuf};

use crate::http::encoding::percent_decode;

/// Why a request path could not be mapped to a servable file
#[derive(Debug)]
pub enum ResolveError {
    /// Undecodable path: bad escape, invalid UTF-8, NUL byte (400)
    BadRequest,
    /// Path escapes the root directory (403)
    Forbidden,
    /// Nothing at that path (404)
    NotFound,
    /// Any other I/O failure (500)
    Io(io::Error),
}

impl From<io::Error> for ResolveError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound | io::ErrorKind::NotADirectory => Self::NotFound,
            _ => Self::Io(err),
        }
    }
}

/// A path confirmed to lie inside the root
#[derive(Debug)]
pub struct ResolvedPath {
    /// Canonical absolute path
    pub path: PathBuf,
    pub metadata: Metadata,
}

impl ResolvedPath {
    pub fn is_dir(&self) -> bool {
        self.metadata.is_dir()
    }
}

/// Decode a URL path into its file system segments
///
/// Empty and `.` segments are dropped, so `//a/./b` yields `["a", "b"]`.
pub fn decode_segments(url_path: &str) -> Result<Vec<String>, ResolveError> {
    let bytes = percent_decode(url_path).ok_or(ResolveError::BadRequest)?;
    let decoded = String::from_utf8(bytes).map_err(|_| ResolveError::BadRequest)?;

    if decoded.contains('\0') {
        return Err(ResolveError::BadRequest);
    }

    let mut segments = Vec::new();
    for segment in decoded.split('/') {
        match segment {
            "" | "." => {}
            ".." => return Err(ResolveError::Forbidden),
            _ if segment.contains('\\') => return Err(ResolveError::Forbidden),
            _ => {
                // Anything that is not a single plain component (e.g. `C:` on Windows)
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

/// Resolve decoded segments below `root` (which must already be canonical)
pub async fn resolve(root: &Path, segments: &[String]) -> Result<ResolvedPath, ResolveError> {
    let candidate = segments.iter().fold(root.to_path_buf(), |p, s| p.join(s));
    confine(root, &candidate).await
}

/// Canonicalize `candidate` and check it is still inside `root`
pub async fn confine(root: &Path, candidate: &Path) -> Result<ResolvedPath, ResolveError> {
    let path = tokio::fs::canonicalize(candidate).await?;
    if !path.starts_with(root) {
        return Err(ResolveError::Forbidden);
    }

    let metadata = tokio::fs::metadata(&path).await?;
    Ok(ResolvedPath { path, metadata })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("clock-path-{}-{name}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(dir.join("root/static")).unwrap();
        std::fs::write(dir.join("root/index.html"), "<h1>clock</h1>").unwrap();
        std::fs::write(dir.join("root/static/app.js"), "tick()").unwrap();
        std::fs::write(dir.join("secret.txt"), "outside").unwrap();
        dir.canonicalize().unwrap()
    }

    #[test]
    fn test_decode_segments() {
        assert_eq!(decode_segments("/").unwrap(), Vec::<String>::new());
        assert_eq!(decode_segments("/static/app.js").unwrap(), vec!["static", "app.js"]);
        assert_eq!(decode_segments("//static/./app.js").unwrap(), vec!["static", "app.js"]);
        assert_eq!(decode_segments("/round%201.mp3").unwrap(), vec!["round 1.mp3"]);
        assert_eq!(decode_segments("/.hidden").unwrap(), vec![".hidden"]);
    }

    #[test]
    fn test_traversal_rejected() {
        assert!(matches!(decode_segments("/../secret.txt"), Err(ResolveError::Forbidden)));
        assert!(matches!(decode_segments("/static/../../x"), Err(ResolveError::Forbidden)));
        assert!(matches!(decode_segments("/%2e%2e/secret.txt"), Err(ResolveError::Forbidden)));
        assert!(matches!(decode_segments("/static%2F..%2F..%2Fx"), Err(ResolveError::Forbidden)));
        assert!(matches!(decode_segments("/..%5Csecret.txt"), Err(ResolveError::Forbidden)));
    }

    #[test]
    fn test_undecodable_rejected() {
        assert!(matches!(decode_segments("/bad%zz"), Err(ResolveError::BadRequest)));
        assert!(matches!(decode_segments("/%ff%fe"), Err(ResolveError::BadRequest)));
        assert!(matches!(decode_segments("/a%00b"), Err(ResolveError::BadRequest)));
    }

    #[tokio::test]
    async fn test_resolve_inside_root() {
        let dir = fixture("inside");
        let root = dir.join("root");

        let resolved = resolve(&root, &["static".into(), "app.js".into()]).await.unwrap();
        assert_eq!(resolved.path, root.join("static/app.js"));
        assert!(!resolved.is_dir());

        let resolved = resolve(&root, &[]).await.unwrap();
        assert!(resolved.is_dir());

        assert!(matches!(
            resolve(&root, &["missing.js".into()]).await,
            Err(ResolveError::NotFound)
        ));
        assert!(matches!(
            resolve(&root, &["index.html".into(), "child".into()]).await,
            Err(ResolveError::NotFound)
        ));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlink_escape_forbidden() {
        let dir = fixture("symlink");
        let root = dir.join("root");
        std::os::unix::fs::symlink(dir.join("secret.txt"), root.join("leak.txt")).unwrap();

        assert!(matches!(
            resolve(&root, &["leak.txt".into()]).await,
            Err(ResolveError::Forbidden)
        ));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlink_loop_is_io_error() {
        let dir = fixture("loop");
        let root = dir.join("root");
        std::os::unix::fs::symlink(root.join("spin"), root.join("spin")).unwrap();

        assert!(matches!(
            resolve(&root, &["spin".into()]).await,
            Err(ResolveError::Io(_))
        ));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
