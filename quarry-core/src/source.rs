//! Source supplier: packages and lazily loaded files.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use crate::AppRoot;

/// File extension for Quarry source files.
pub const SOURCE_EXT: &str = "qy";

/// A source file belonging to a package.
///
/// Contents are read lazily on first access and cached for the lifetime of
/// the discovery pass; files are treated as immutable for that duration.
#[derive(Debug)]
pub struct File {
    rel_path: String,
    fs_path: Option<PathBuf>,
    contents: OnceLock<Result<Arc<str>, String>>,
}

impl File {
    /// A file backed by the filesystem, read on first `contents()` call.
    pub fn on_disk(rel_path: impl Into<String>, fs_path: impl Into<PathBuf>) -> Self {
        Self {
            rel_path: rel_path.into(),
            fs_path: Some(fs_path.into()),
            contents: OnceLock::new(),
        }
    }

    /// A file with contents supplied up front. Used by tests and by
    /// suppliers that already hold source in memory.
    pub fn in_memory(rel_path: impl Into<String>, contents: impl Into<Arc<str>>) -> Self {
        let file = Self {
            rel_path: rel_path.into(),
            fs_path: None,
            contents: OnceLock::new(),
        };
        let _ = file.contents.set(Ok(contents.into()));
        file
    }

    /// Application-root-relative, slash-separated path.
    pub fn rel_path(&self) -> &str {
        &self.rel_path
    }

    /// The file contents, loading and caching them on first access.
    pub fn contents(&self) -> io::Result<Arc<str>> {
        let cached = self.contents.get_or_init(|| match &self.fs_path {
            Some(path) => std::fs::read_to_string(path)
                .map(Arc::from)
                .map_err(|e| e.to_string()),
            None => Err("file has no backing path and no contents".to_string()),
        });
        match cached {
            Ok(contents) => Ok(contents.clone()),
            Err(msg) => Err(io::Error::other(msg.clone())),
        }
    }
}

/// One source directory: a named, ordered set of files.
#[derive(Debug)]
pub struct Package {
    /// Package name (directory name; the application name for the root).
    pub name: String,
    /// Application-root-relative path; empty for the root package.
    pub rel_path: String,
    /// Absolute (or caller-relative) filesystem path of the directory.
    pub fs_path: PathBuf,
    /// Source files, ordered by filename.
    pub files: Vec<File>,
    /// Names of immediate child directories, ordered.
    pub subdirs: Vec<String>,
}

impl Package {
    /// Returns true if the package has an immediate subdirectory `name`.
    pub fn has_subdir(&self, name: &str) -> bool {
        self.subdirs.iter().any(|s| s == name)
    }
}

/// Walk the application root and build the package set.
///
/// A directory becomes a package when it contains at least one `.qy` source
/// file or a `migrations` subdirectory. Hidden directories are skipped, and
/// `migrations` directories are never packages themselves. Files and
/// directories are visited in name order so the result is deterministic.
pub fn load_packages(root: &AppRoot, app_name: &str) -> io::Result<Vec<Package>> {
    let mut packages = Vec::new();
    walk(root, root.path(), app_name, &mut packages)?;
    Ok(packages)
}

fn walk(root: &AppRoot, dir: &Path, app_name: &str, out: &mut Vec<Package>) -> io::Result<()> {
    let mut files = Vec::new();
    let mut subdirs = Vec::new();

    let mut entries: Vec<_> = std::fs::read_dir(dir)?.collect::<io::Result<_>>()?;
    entries.sort_by_key(|e| e.file_name());

    for entry in &entries {
        let name = entry.file_name().to_string_lossy().into_owned();
        let path = entry.path();
        if path.is_dir() {
            if name.starts_with('.') {
                continue;
            }
            subdirs.push(name);
        } else if path.extension().is_some_and(|e| e == SOURCE_EXT) {
            let rel = root
                .relativize(&path)
                .ok_or_else(|| io::Error::other(format!("{} escapes the app root", path.display())))?;
            files.push(File::on_disk(rel, path));
        }
    }

    if !files.is_empty() || subdirs.iter().any(|s| s == "migrations") {
        let rel_path = root.relativize(dir).unwrap_or_default();
        let name = if rel_path.is_empty() {
            app_name.to_string()
        } else {
            rel_path.rsplit('/').next().unwrap_or(app_name).to_string()
        };
        out.push(Package {
            name,
            rel_path,
            fs_path: dir.to_path_buf(),
            files,
            subdirs: subdirs.clone(),
        });
    }

    for sub in &subdirs {
        if sub == "migrations" {
            continue;
        }
        walk(root, &dir.join(sub), app_name, out)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_in_memory_contents() {
        let file = File::in_memory("a.qy", "hello");
        assert_eq!(file.contents().unwrap().as_ref(), "hello");
        assert_eq!(file.rel_path(), "a.qy");
    }

    #[test]
    fn test_on_disk_contents_cached() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("a.qy");
        fs::write(&path, "first").unwrap();

        let file = File::on_disk("a.qy", &path);
        assert_eq!(file.contents().unwrap().as_ref(), "first");

        // Contents are cached for the pass; later writes are not observed.
        fs::write(&path, "second").unwrap();
        assert_eq!(file.contents().unwrap().as_ref(), "first");
    }

    #[test]
    fn test_load_packages_finds_source_dirs() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("blog/migrations")).unwrap();
        fs::write(temp.path().join("blog/api.qy"), "// blog").unwrap();
        fs::create_dir_all(temp.path().join("docs")).unwrap();
        fs::write(temp.path().join("docs/readme.md"), "not source").unwrap();

        let root = AppRoot::new(temp.path());
        let packages = load_packages(&root, "myapp").unwrap();

        assert_eq!(packages.len(), 1);
        assert_eq!(packages[0].name, "blog");
        assert_eq!(packages[0].rel_path, "blog");
        assert!(packages[0].has_subdir("migrations"));
        assert_eq!(packages[0].files.len(), 1);
    }

    #[test]
    fn test_load_packages_migrations_only_dir_is_a_package() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("store/migrations")).unwrap();
        fs::write(
            temp.path().join("store/migrations/1_init.up.sql"),
            "create table t (id int);",
        )
        .unwrap();

        let root = AppRoot::new(temp.path());
        let packages = load_packages(&root, "myapp").unwrap();

        assert_eq!(packages.len(), 1);
        assert_eq!(packages[0].name, "store");
        assert!(packages[0].files.is_empty());
    }

    #[test]
    fn test_load_packages_root_uses_app_name() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("main.qy"), "// root").unwrap();

        let root = AppRoot::new(temp.path());
        let packages = load_packages(&root, "myapp").unwrap();

        assert_eq!(packages.len(), 1);
        assert_eq!(packages[0].name, "myapp");
        assert_eq!(packages[0].rel_path, "");
    }
}
