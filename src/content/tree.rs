// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Tree sources: producers of canonical repository snapshots.
//!
//! The stager treats a tree source as an opaque producer of canonical archive
//! bytes. [`DirectoryTreeSource`] snapshots a checked-out working tree under a
//! root directory. Version-control metadata and everything matched by the
//! tree's `.gitignore` files or `.git/info/exclude` stay out of the archive.

use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use ignore::WalkBuilder;

use super::archive::{ArchiveBuilder, ArchiveError, TreeArchive};

/// Directory names never included in a snapshot.
const EXCLUDED_DIRS: &[&str] = &[".git", ".hg", ".svn"];

/// Errors produced by a tree source.
#[derive(Debug, thiserror::Error)]
pub enum TreeSourceError {
    #[error("invalid tree reference: {0:?}")]
    InvalidRef(String),

    #[error("tree not found: {0}")]
    NotFound(String),

    #[error("tree {0} contains no files")]
    EmptyTree(String),

    #[error("tree {0} is a bare repository without a working tree")]
    BareRepository(String),

    #[error("path is not valid UTF-8: {0}")]
    InvalidPath(String),

    #[error("tree exceeds {limit} bytes")]
    TooLarge { limit: u64 },

    #[error("archive error: {0}")]
    Archive(ArchiveError),

    #[error("I/O error reading tree: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ArchiveError> for TreeSourceError {
    fn from(e: ArchiveError) -> Self {
        match e {
            ArchiveError::TooLarge { limit } => TreeSourceError::TooLarge { limit },
            other => TreeSourceError::Archive(other),
        }
    }
}

/// Produces the canonical archive of a named tree.
#[async_trait]
pub trait TreeSource: Send + Sync {
    /// Snapshot `tree_ref` into its canonical archive.
    async fn archive(&self, tree_ref: &str) -> Result<TreeArchive, TreeSourceError>;
}

/// Tree source reading working trees from `<root>/<tree_ref>`.
#[derive(Debug, Clone)]
pub struct DirectoryTreeSource {
    root: PathBuf,
    max_bytes: Option<u64>,
}

impl DirectoryTreeSource {
    /// Create a source rooted at `root`.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            max_bytes: None,
        }
    }

    /// Cap the total file data of a snapshot.
    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = Some(max_bytes);
        self
    }

    /// Resolve a tree reference to its directory.
    ///
    /// A reference is a single path segment; anything that could escape the
    /// root is refused.
    fn resolve(&self, tree_ref: &str) -> Result<PathBuf, TreeSourceError> {
        let valid = !tree_ref.is_empty()
            && tree_ref != "."
            && tree_ref != ".."
            && !tree_ref.contains(['/', '\\', '\0']);
        if !valid {
            return Err(TreeSourceError::InvalidRef(tree_ref.to_string()));
        }
        Ok(self.root.join(tree_ref))
    }

    fn snapshot(
        dir: &Path,
        tree_ref: &str,
        max_bytes: Option<u64>,
    ) -> Result<TreeArchive, TreeSourceError> {
        if !dir.is_dir() {
            return Err(TreeSourceError::NotFound(tree_ref.to_string()));
        }
        if is_bare_repository(dir) {
            return Err(TreeSourceError::BareRepository(tree_ref.to_string()));
        }

        let mut builder = ArchiveBuilder::new();
        if let Some(limit) = max_bytes {
            builder = builder.with_limit(limit);
        }

        let walker = WalkBuilder::new(dir)
            .standard_filters(false)
            .git_ignore(true)
            .git_exclude(true)
            .require_git(false)
            .follow_links(false)
            .sort_by_file_name(|a, b| a.cmp(b))
            .filter_entry(|e| {
                !(e.file_type().is_some_and(|t| t.is_dir())
                    && e.file_name()
                        .to_str()
                        .is_some_and(|name| EXCLUDED_DIRS.contains(&name)))
            })
            .build();

        for entry in walker {
            let entry = entry.map_err(walk_error)?;

            let Some(file_type) = entry.file_type() else {
                continue;
            };
            if file_type.is_dir() {
                continue;
            }

            let relative = entry
                .path()
                .strip_prefix(dir)
                .map_err(|_| TreeSourceError::InvalidRef(tree_ref.to_string()))?;
            let relative = utf8(relative)?;

            if file_type.is_symlink() {
                let target = fs::read_link(entry.path())?;
                builder.add_symlink(relative, utf8(&target)?)?;
            } else if file_type.is_file() {
                let executable = is_executable(&entry.metadata().map_err(walk_error)?);
                let data = fs::read(entry.path())?;
                builder.add_file(relative, executable, data)?;
            }
        }

        let archive = builder.finish();
        if archive.is_empty() {
            return Err(TreeSourceError::EmptyTree(tree_ref.to_string()));
        }
        Ok(archive)
    }
}

fn walk_error(e: ignore::Error) -> TreeSourceError {
    let message = e.to_string();
    TreeSourceError::Io(
        e.into_io_error()
            .unwrap_or_else(|| std::io::Error::other(message)),
    )
}

/// Paths enter the archive as UTF-8; anything else is refused rather than
/// dropped, so two different trees never share an address.
fn utf8(path: &Path) -> Result<&str, TreeSourceError> {
    path.to_str()
        .ok_or_else(|| TreeSourceError::InvalidPath(path.to_string_lossy().into_owned()))
}

/// A git directory without a working tree: `HEAD`, `objects/` and `refs/`
/// at the top level and no `.git`.
fn is_bare_repository(dir: &Path) -> bool {
    !dir.join(".git").exists()
        && dir.join("HEAD").is_file()
        && dir.join("objects").is_dir()
        && dir.join("refs").is_dir()
}

#[cfg(unix)]
fn is_executable(metadata: &fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(_metadata: &fs::Metadata) -> bool {
    false
}

#[async_trait]
impl TreeSource for DirectoryTreeSource {
    async fn archive(&self, tree_ref: &str) -> Result<TreeArchive, TreeSourceError> {
        let dir = self.resolve(tree_ref)?;
        let tree_ref = tree_ref.to_string();
        let max_bytes = self.max_bytes;

        tokio::task::spawn_blocking(move || Self::snapshot(&dir, &tree_ref, max_bytes))
            .await
            .map_err(|e| TreeSourceError::Io(std::io::Error::other(e.to_string())))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::ContentAddress;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, data: &[u8]) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, data).unwrap();
    }

    fn repo_fixture() -> TempDir {
        let temp = TempDir::new().unwrap();
        let repo = temp.path().join("hello-world");
        write(&repo, "README.md", b"# hello");
        write(&repo, "src/main.rs", b"fn main() {}");
        write(&repo, ".git/HEAD", b"ref: refs/heads/main");
        temp
    }

    #[tokio::test]
    async fn snapshot_is_deterministic() {
        let temp = repo_fixture();
        let source = DirectoryTreeSource::new(temp.path());

        let a = source.archive("hello-world").await.unwrap();
        let b = source.archive("hello-world").await.unwrap();

        assert_eq!(a, b);
        assert_eq!(a.entry_count(), 2);
    }

    #[tokio::test]
    async fn vcs_metadata_is_excluded() {
        let temp = repo_fixture();
        let source = DirectoryTreeSource::new(temp.path());
        let before = ContentAddress::for_bytes(source.archive("hello-world").await.unwrap().as_bytes());

        write(&temp.path().join("hello-world"), ".git/ORIG_HEAD", b"abc");
        let after = ContentAddress::for_bytes(source.archive("hello-world").await.unwrap().as_bytes());

        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn identical_trees_in_different_dirs_share_an_address() {
        let temp = TempDir::new().unwrap();
        write(&temp.path().join("a"), "f.txt", b"same");
        write(&temp.path().join("b"), "f.txt", b"same");
        let source = DirectoryTreeSource::new(temp.path());

        let a = source.archive("a").await.unwrap();
        let b = source.archive("b").await.unwrap();

        assert_eq!(
            ContentAddress::for_bytes(a.as_bytes()),
            ContentAddress::for_bytes(b.as_bytes())
        );
    }

    #[tokio::test]
    async fn content_change_changes_archive() {
        let temp = repo_fixture();
        let source = DirectoryTreeSource::new(temp.path());
        let before = source.archive("hello-world").await.unwrap();

        write(&temp.path().join("hello-world"), "README.md", b"# changed");
        let after = source.archive("hello-world").await.unwrap();

        assert_ne!(before, after);
    }

    #[tokio::test]
    async fn rejects_path_traversal_refs() {
        let temp = repo_fixture();
        let source = DirectoryTreeSource::new(temp.path());

        for bad in ["", ".", "..", "../etc", "a/b", "a\\b"] {
            assert!(
                matches!(source.archive(bad).await, Err(TreeSourceError::InvalidRef(_))),
                "{bad:?} accepted"
            );
        }
    }

    #[tokio::test]
    async fn missing_tree_is_not_found() {
        let temp = repo_fixture();
        let source = DirectoryTreeSource::new(temp.path());
        assert!(matches!(
            source.archive("nope").await,
            Err(TreeSourceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn tree_with_only_vcs_metadata_is_empty() {
        let temp = TempDir::new().unwrap();
        write(&temp.path().join("bare"), ".git/HEAD", b"ref");
        let source = DirectoryTreeSource::new(temp.path());

        assert!(matches!(
            source.archive("bare").await,
            Err(TreeSourceError::EmptyTree(_))
        ));
    }

    #[tokio::test]
    async fn size_limit_is_enforced() {
        let temp = TempDir::new().unwrap();
        write(&temp.path().join("big"), "blob.bin", &[0u8; 64]);
        let source = DirectoryTreeSource::new(temp.path()).with_max_bytes(32);

        assert!(matches!(
            source.archive("big").await,
            Err(TreeSourceError::TooLarge { limit: 32 })
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn symlinks_are_recorded_not_followed() {
        let temp = TempDir::new().unwrap();
        let repo = temp.path().join("links");
        write(&repo, "target.txt", b"data");
        std::os::unix::fs::symlink("target.txt", repo.join("link")).unwrap();
        let source = DirectoryTreeSource::new(temp.path());

        let archive = source.archive("links").await.unwrap();
        assert_eq!(archive.entry_count(), 2);
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn non_utf8_paths_are_refused() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let temp = TempDir::new().unwrap();
        write(&temp.path().join("plain"), "README", b"same");
        let repo = temp.path().join("odd");
        write(&repo, "README", b"same");
        fs::write(repo.join(OsStr::from_bytes(b"secret\xff.bin")), b"hidden").unwrap();
        let source = DirectoryTreeSource::new(temp.path());

        assert!(source.archive("plain").await.is_ok());
        assert!(matches!(
            source.archive("odd").await,
            Err(TreeSourceError::InvalidPath(_))
        ));
    }

    #[tokio::test]
    async fn gitignored_files_do_not_change_the_address() {
        let temp = repo_fixture();
        let repo = temp.path().join("hello-world");
        write(&repo, ".gitignore", b".env\ntarget/\n");
        let source = DirectoryTreeSource::new(temp.path());
        let before = source.archive("hello-world").await.unwrap();

        write(&repo, ".env", b"SECRET=hunter2");
        write(&repo, "target/debug/app", b"binary");
        let after = source.archive("hello-world").await.unwrap();

        assert_eq!(before, after);
        assert_eq!(after.entry_count(), 3);
        let bytes = after.as_bytes();
        assert!(!bytes.windows(7).any(|w| w == b"hunter2"));
    }

    #[tokio::test]
    async fn nested_gitignore_and_info_exclude_are_honored() {
        let temp = repo_fixture();
        let repo = temp.path().join("hello-world");
        write(&repo, "src/.gitignore", b"*.log\n");
        write(&repo, "src/trace.log", b"noise");
        write(&repo, ".git/info/exclude", b"notes.txt\n");
        write(&repo, "notes.txt", b"private");
        let source = DirectoryTreeSource::new(temp.path());

        let archive = source.archive("hello-world").await.unwrap();

        // README.md, src/.gitignore and src/main.rs
        assert_eq!(archive.entry_count(), 3);
    }

    #[tokio::test]
    async fn bare_repository_is_refused() {
        let temp = TempDir::new().unwrap();
        let bare = temp.path().join("bare.git");
        write(&bare, "HEAD", b"ref: refs/heads/main");
        write(&bare, "objects/ab/cdef", b"blob");
        write(&bare, "refs/heads/main", b"0123");
        let source = DirectoryTreeSource::new(temp.path());

        assert!(matches!(
            source.archive("bare.git").await,
            Err(TreeSourceError::BareRepository(_))
        ));
    }
}
