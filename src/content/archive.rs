// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Canonical tree archive encoding.
//!
//! ## Format
//!
//! ```text
//! magic        "PINWALL-TREE\x01"
//! entry_count  u64 BE
//! entries, sorted by path bytes:
//!   path_len   u32 BE
//!   path       UTF-8, '/'-separated, relative
//!   mode       u32 BE   (0o100644, 0o100755 or 0o120000)
//!   data_len   u64 BE
//!   data       file bytes or symlink target
//! ```
//!
//! Insertion order, timestamps, ownership and platform path separators never
//! reach the encoding, so the same logical tree always produces the same bytes.

use std::collections::BTreeMap;

/// Archive magic header.
pub const ARCHIVE_MAGIC: &[u8] = b"PINWALL-TREE\x01";

/// Mode for regular, non-executable files.
pub const MODE_FILE: u32 = 0o100644;

/// Mode for executable files.
pub const MODE_EXECUTABLE: u32 = 0o100755;

/// Mode for symbolic links.
pub const MODE_SYMLINK: u32 = 0o120000;

/// Errors raised while building an archive.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ArchiveError {
    #[error("invalid archive path: {0:?}")]
    InvalidPath(String),

    #[error("duplicate archive path: {0}")]
    DuplicatePath(String),

    #[error("archive exceeds {limit} bytes")]
    TooLarge { limit: u64 },
}

/// Canonical serialized tree, ready to be content-addressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeArchive {
    bytes: Vec<u8>,
    entry_count: usize,
}

impl TreeArchive {
    /// Archive bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Number of entries in the archive.
    pub fn entry_count(&self) -> usize {
        self.entry_count
    }

    /// Encoded size in bytes.
    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Whether the archive holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entry_count == 0
    }
}

struct Entry {
    mode: u32,
    data: Vec<u8>,
}

/// Collects tree entries and encodes them canonically.
#[derive(Default)]
pub struct ArchiveBuilder {
    entries: BTreeMap<String, Entry>,
    data_bytes: u64,
    limit: Option<u64>,
}

impl ArchiveBuilder {
    /// Create an empty builder with no size limit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject archives whose file data exceeds `limit` bytes.
    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Add a regular file.
    pub fn add_file(
        &mut self,
        path: &str,
        executable: bool,
        data: Vec<u8>,
    ) -> Result<(), ArchiveError> {
        let mode = if executable { MODE_EXECUTABLE } else { MODE_FILE };
        self.insert(path, mode, data)
    }

    /// Add a symbolic link pointing at `target`.
    pub fn add_symlink(&mut self, path: &str, target: &str) -> Result<(), ArchiveError> {
        self.insert(path, MODE_SYMLINK, target.as_bytes().to_vec())
    }

    fn insert(&mut self, path: &str, mode: u32, data: Vec<u8>) -> Result<(), ArchiveError> {
        let path = normalize_path(path)?;
        if self.entries.contains_key(&path) {
            return Err(ArchiveError::DuplicatePath(path));
        }

        self.data_bytes = self.data_bytes.saturating_add(data.len() as u64);
        if let Some(limit) = self.limit {
            if self.data_bytes > limit {
                return Err(ArchiveError::TooLarge { limit });
            }
        }

        self.entries.insert(path, Entry { mode, data });
        Ok(())
    }

    /// Encode the collected entries.
    pub fn finish(self) -> TreeArchive {
        let entry_count = self.entries.len();
        let mut bytes = Vec::with_capacity(
            ARCHIVE_MAGIC.len() + 8 + self.data_bytes as usize + entry_count * 24,
        );

        bytes.extend_from_slice(ARCHIVE_MAGIC);
        bytes.extend_from_slice(&(entry_count as u64).to_be_bytes());

        // BTreeMap<String, _> iterates in byte order of the path.
        for (path, entry) in self.entries {
            bytes.extend_from_slice(&(path.len() as u32).to_be_bytes());
            bytes.extend_from_slice(path.as_bytes());
            bytes.extend_from_slice(&entry.mode.to_be_bytes());
            bytes.extend_from_slice(&(entry.data.len() as u64).to_be_bytes());
            bytes.extend_from_slice(&entry.data);
        }

        TreeArchive { bytes, entry_count }
    }
}

/// Normalize a relative path to `/`-separated form.
///
/// Rejects empty paths, absolute paths and `.`/`..` components.
fn normalize_path(path: &str) -> Result<String, ArchiveError> {
    let unified = path.replace('\\', "/");
    if unified.starts_with('/') {
        return Err(ArchiveError::InvalidPath(path.to_string()));
    }

    let parts: Vec<&str> = unified.split('/').filter(|p| !p.is_empty()).collect();
    if parts.is_empty() || parts.iter().any(|p| *p == "." || *p == "..") {
        return Err(ArchiveError::InvalidPath(path.to_string()));
    }

    Ok(parts.join("/"))
}
