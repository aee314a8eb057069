// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Path layout for persistent storage under `DATA_DIR`.

use std::path::{Path, PathBuf};

use crate::content::ContentAddress;

/// Default base directory for persistent storage.
pub const DATA_ROOT: &str = "/data";

/// Storage path utilities.
#[derive(Debug, Clone)]
pub struct StoragePaths {
    root: PathBuf,
}

impl Default for StoragePaths {
    fn default() -> Self {
        Self::new(DATA_ROOT)
    }
}

impl StoragePaths {
    /// Create a new StoragePaths with a custom root (useful for testing).
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Root data directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    // ========== Database Paths ==========

    /// Path to the redb metadata database.
    pub fn database(&self) -> PathBuf {
        self.root.join("pinwall.redb")
    }

    // ========== Content Store Paths ==========

    /// Directory holding the content store.
    pub fn store_dir(&self) -> PathBuf {
        self.root.join("store")
    }

    /// Directory containing all blocks.
    pub fn blocks_dir(&self) -> PathBuf {
        self.store_dir().join("blocks")
    }

    /// Path to the block for an address.
    pub fn block(&self, address: &ContentAddress) -> PathBuf {
        self.blocks_dir().join(address.as_str())
    }

    /// Directory containing pin markers.
    pub fn pins_dir(&self) -> PathBuf {
        self.store_dir().join("pins")
    }

    /// Path to the pin marker for an address.
    pub fn pin(&self, address: &ContentAddress) -> PathBuf {
        self.pins_dir().join(address.as_str())
    }

    // ========== Audit Log Paths ==========

    /// Directory containing audit logs.
    pub fn audit_dir(&self) -> PathBuf {
        self.root.join("audit")
    }

    /// Directory for a specific date's audit logs.
    pub fn audit_date_dir(&self, date: &str) -> PathBuf {
        self.audit_dir().join(date)
    }

    /// Path to a daily audit events file (JSONL format).
    pub fn audit_events_file(&self, date: &str) -> PathBuf {
        self.audit_date_dir(date).join("events.jsonl")
    }
}
