//! Scan target discovery.

use crate::error::{AuditError, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Walks a root path and yields the files a scan should look at, in
/// deterministic path order.
pub struct FileSystemSourceProvider {
    path: PathBuf,
    exclude: Vec<PathBuf>,
}

impl FileSystemSourceProvider {
    pub fn new(path: &Path, exclude: Vec<PathBuf>) -> Result<Self> {
        if !path.exists() {
            return Err(AuditError::FileNotFound(path.display().to_string()));
        }
        Ok(Self {
            path: path.to_path_buf(),
            exclude,
        })
    }

    /// Collects candidate files with one of the given extensions.
    ///
    /// A root pointing at a single file is returned as-is without the
    /// extension filter; the caller asked for that exact file.
    pub fn get_files(&self, extensions: &[&str]) -> Vec<PathBuf> {
        if self.path.is_file() {
            if self.is_excluded(&self.path) {
                return vec![];
            }
            return vec![self.path.clone()];
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(&self.path).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "skipping unreadable scan entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            if has_extension(path, extensions) && !self.is_excluded(path) {
                files.push(path.to_path_buf());
            }
        }
        files.sort();
        debug!(count = files.len(), path = %self.path.display(), "files discovered");
        files
    }

    fn is_excluded(&self, path: &Path) -> bool {
        self.exclude
            .iter()
            .any(|excluded| path == excluded || path.ends_with(excluded))
    }
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    let name = match path.file_name().and_then(|n| n.to_str()) {
        Some(name) => name.to_lowercase(),
        None => return false,
    };
    extensions.iter().any(|ext| name.ends_with(ext))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const EXTENSIONS: &[&str] = &[".json", ".yml", ".yaml"];

    fn touch(dir: &TempDir, name: &str) {
        let path = dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, "{}").unwrap();
    }

    #[test]
    fn test_discovery_is_sorted() {
        let dir = TempDir::new().unwrap();
        touch(&dir, "b.yaml");
        touch(&dir, "a.json");
        touch(&dir, "nested/c.yml");

        let provider = FileSystemSourceProvider::new(dir.path(), vec![]).unwrap();
        let files = provider.get_files(EXTENSIONS);
        let names: Vec<String> = files
            .iter()
            .map(|p| {
                p.strip_prefix(dir.path())
                    .unwrap()
                    .to_string_lossy()
                    .into_owned()
            })
            .collect();
        assert_eq!(names, vec!["a.json", "b.yaml", "nested/c.yml"]);
    }

    #[test]
    fn test_extension_filter() {
        let dir = TempDir::new().unwrap();
        touch(&dir, "template.json");
        touch(&dir, "notes.txt");
        touch(&dir, "main.tf");

        let provider = FileSystemSourceProvider::new(dir.path(), vec![]).unwrap();
        let files = provider.get_files(EXTENSIONS);
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("template.json"));
    }

    #[test]
    fn test_exclusion() {
        let dir = TempDir::new().unwrap();
        touch(&dir, "keep.yaml");
        touch(&dir, "payload.json");

        let provider = FileSystemSourceProvider::new(
            dir.path(),
            vec![dir.path().join("payload.json")],
        )
        .unwrap();
        let files = provider.get_files(EXTENSIONS);
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("keep.yaml"));
    }

    #[test]
    fn test_single_file_root() {
        let dir = TempDir::new().unwrap();
        touch(&dir, "only.yaml");

        let provider =
            FileSystemSourceProvider::new(&dir.path().join("only.yaml"), vec![]).unwrap();
        let files = provider.get_files(EXTENSIONS);
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn test_missing_root_is_an_error() {
        let result = FileSystemSourceProvider::new(Path::new("/nonexistent/path"), vec![]);
        assert!(matches!(result, Err(AuditError::FileNotFound(_))));
    }
}
