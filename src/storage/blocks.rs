// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Content-addressable block store.
//!
//! The [`ContentStore`] trait is the outbound store interface used by the
//! stager. [`FsContentStore`] keeps one file per address:
//!
//! ```text
//! <DATA_DIR>/store/
//!   blocks/{address}   # archive bytes
//!   pins/{address}     # empty marker, present while pinned
//! ```
//!
//! Writes go to a temporary file and are renamed into place, so a block is
//! either absent or complete.

use std::io;
use std::path::Path;

use async_trait::async_trait;
use tokio::fs;

use super::StoragePaths;
use crate::content::ContentAddress;

/// Errors from the content store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("block not found: {0}")]
    NotFound(ContentAddress),

    #[error("block {0} is pinned")]
    Pinned(ContentAddress),

    #[error("block {address} failed integrity check")]
    Corrupt { address: ContentAddress },

    #[error("store I/O error: {0}")]
    Io(#[from] io::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Content-addressable storage with pinning.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Store `bytes` under `address`. Writing an existing address is a no-op.
    async fn put(&self, address: &ContentAddress, bytes: &[u8]) -> StoreResult<()>;

    /// Read the bytes stored under `address`.
    async fn get(&self, address: &ContentAddress) -> StoreResult<Vec<u8>>;

    /// Mark `address` as permanently retained.
    async fn pin(&self, address: &ContentAddress) -> StoreResult<()>;

    /// Drop the retention mark for `address`.
    async fn unpin(&self, address: &ContentAddress) -> StoreResult<()>;

    /// Whether a block exists for `address`.
    async fn contains(&self, address: &ContentAddress) -> StoreResult<bool>;

    /// Whether `address` is pinned.
    async fn is_pinned(&self, address: &ContentAddress) -> StoreResult<bool>;

    /// Delete an unpinned block. Missing blocks are not an error.
    async fn remove(&self, address: &ContentAddress) -> StoreResult<()>;
}

/// Filesystem-backed [`ContentStore`].
#[derive(Debug, Clone)]
pub struct FsContentStore {
    paths: StoragePaths,
}

impl FsContentStore {
    /// Open the store, creating its directories.
    pub async fn open(paths: StoragePaths) -> StoreResult<Self> {
        fs::create_dir_all(paths.blocks_dir()).await?;
        fs::create_dir_all(paths.pins_dir()).await?;
        Ok(Self { paths })
    }

    /// Write `data` to `path` through a uniquely named temp file.
    async fn write_atomic(path: &Path, data: &[u8]) -> io::Result<()> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("block");
        let temp_path = path.with_file_name(format!(".{file_name}.{}.tmp", uuid::Uuid::new_v4()));

        if let Err(e) = fs::write(&temp_path, data).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e);
        }
        if let Err(e) = fs::rename(&temp_path, path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e);
        }
        Ok(())
    }
}

async fn exists(path: &Path) -> io::Result<bool> {
    fs::try_exists(path).await
}

#[async_trait]
impl ContentStore for FsContentStore {
    async fn put(&self, address: &ContentAddress, bytes: &[u8]) -> StoreResult<()> {
        let path = self.paths.block(address);
        if exists(&path).await? {
            return Ok(());
        }
        if ContentAddress::for_bytes(bytes) != *address {
            return Err(StoreError::Corrupt {
                address: address.clone(),
            });
        }
        Self::write_atomic(&path, bytes).await?;
        tracing::debug!(address = %address, size = bytes.len(), "Block written");
        Ok(())
    }

    async fn get(&self, address: &ContentAddress) -> StoreResult<Vec<u8>> {
        match fs::read(self.paths.block(address)).await {
            Ok(bytes) => {
                if ContentAddress::for_bytes(&bytes) != *address {
                    return Err(StoreError::Corrupt {
                        address: address.clone(),
                    });
                }
                Ok(bytes)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(address.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn pin(&self, address: &ContentAddress) -> StoreResult<()> {
        if !exists(&self.paths.block(address)).await? {
            return Err(StoreError::NotFound(address.clone()));
        }
        let pin = self.paths.pin(address);
        if !exists(&pin).await? {
            Self::write_atomic(&pin, b"").await?;
        }
        Ok(())
    }

    async fn unpin(&self, address: &ContentAddress) -> StoreResult<()> {
        match fs::remove_file(self.paths.pin(address)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn contains(&self, address: &ContentAddress) -> StoreResult<bool> {
        Ok(exists(&self.paths.block(address)).await?)
    }

    async fn is_pinned(&self, address: &ContentAddress) -> StoreResult<bool> {
        Ok(exists(&self.paths.pin(address)).await?)
    }

    async fn remove(&self, address: &ContentAddress) -> StoreResult<()> {
        if self.is_pinned(address).await? {
            return Err(StoreError::Pinned(address.clone()));
        }
        match fs::remove_file(self.paths.block(address)).await {
            Ok(()) => {
                tracing::debug!(address = %address, "Block removed");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
