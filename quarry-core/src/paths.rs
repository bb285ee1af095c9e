//! Application root handling.

use std::path::{Component, Path, PathBuf};

/// The root directory of the application being discovered.
///
/// The root is passed explicitly into each discovery pass; it is never held
/// as ambient state. Resources that must live inside the application (such
/// as migration directories) are checked against it lexically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppRoot(PathBuf);

impl AppRoot {
    /// Create an application root from a directory path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(normalize(&path.into()))
    }

    /// The root directory.
    pub fn path(&self) -> &Path {
        &self.0
    }

    /// Join a relative path onto the root.
    pub fn join(&self, rel: impl AsRef<Path>) -> PathBuf {
        self.0.join(rel)
    }

    /// Compute the root-relative, slash-separated form of `path`.
    ///
    /// Returns `None` when the path escapes the root. The check is lexical
    /// (no symlink resolution), matching how the rest of the engine treats
    /// paths.
    pub fn relativize(&self, path: &Path) -> Option<String> {
        let normalized = normalize(path);
        let rel = normalized.strip_prefix(&self.0).ok()?;
        if rel
            .components()
            .any(|c| matches!(c, Component::ParentDir))
        {
            return None;
        }
        let mut out = String::new();
        for c in rel.components() {
            if !out.is_empty() {
                out.push('/');
            }
            out.push_str(&c.as_os_str().to_string_lossy());
        }
        Some(out)
    }

    /// Returns true if `path` is lexically inside the root.
    pub fn contains(&self, path: &Path) -> bool {
        self.relativize(path).is_some()
    }
}

/// Lexically normalize a path: drop `.` components and resolve `..` against
/// preceding components where possible.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for c in path.components() {
        match c {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other),
        }
    }
    out
}
