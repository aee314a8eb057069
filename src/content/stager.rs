// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Content stager: staging, finalization and reclamation of content.
//!
//! The stager owns every [`StagingEntry`] and is the only component that
//! mutates the content store. All store mutations for one address happen
//! while holding that address's lock, so staging, finalizing and reclaiming
//! the same content never interleave. Different addresses proceed in
//! parallel.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use tokio::sync::Mutex;

use super::tree::{TreeSource, TreeSourceError};
use super::{ContentAddress, ReclaimReason, StagingEntry, StagingState};
use crate::auth::WalletIdentity;
use crate::storage::{
    AuditEvent, AuditEventType, AuditLog, ContentStore, DbError, MetadataDb, StoreError,
};

/// Default staging TTL in seconds.
pub const DEFAULT_STAGING_TTL_SECS: i64 = 3600;

/// Errors from staging operations.
#[derive(Debug, thiserror::Error)]
pub enum StagingError {
    #[error("tree source error: {0}")]
    Tree(#[from] TreeSourceError),

    #[error("content store error: {0}")]
    Store(#[from] StoreError),

    #[error("metadata database error: {0}")]
    Db(#[from] DbError),

    #[error("no staged content at {0}")]
    NotFound(ContentAddress),
}

/// Result of [`ContentStager::stage`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageOutcome {
    pub address: ContentAddress,
    /// `Staged` for an open cycle, `Finalized` if the content is already paid for.
    pub state: StagingState,
    /// Whether this call wrote the block.
    pub written: bool,
    pub size_bytes: u64,
}

/// Result of [`ContentStager::finalize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalizeOutcome {
    Finalized,
    AlreadyFinalized,
}

/// Result of [`ContentStager::reject_claim`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// Other claimants keep the cycle open.
    StillStaged,
    /// The last claimant was removed and the content reclaimed.
    Reclaimed,
    /// The entry was not staged; nothing changed.
    Unchanged,
}

/// Stages content-addressed trees into a [`ContentStore`].
pub struct ContentStager {
    store: Arc<dyn ContentStore>,
    db: Arc<MetadataDb>,
    locks: DashMap<ContentAddress, Arc<Mutex<()>>>,
    ttl: Duration,
    audit: Option<Arc<AuditLog>>,
}

impl ContentStager {
    pub fn new(store: Arc<dyn ContentStore>, db: Arc<MetadataDb>) -> Self {
        Self {
            store,
            db,
            locks: DashMap::new(),
            ttl: Duration::seconds(DEFAULT_STAGING_TTL_SECS),
            audit: None,
        }
    }

    /// Set the staging TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Record stager transitions in the audit log.
    pub fn with_audit(mut self, audit: Arc<AuditLog>) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn lock_for(&self, address: &ContentAddress) -> Arc<Mutex<()>> {
        Arc::clone(&self.locks.entry(address.clone()).or_default())
    }

    /// Snapshot `tree_ref` from `source` and stage it for `owner`.
    ///
    /// Idempotent by content: a block is written only when no live entry for
    /// the address exists. Staging content that is already staged adds
    /// `owner` as a claimant; staging finalized content changes nothing.
    pub async fn stage(
        &self,
        owner: &WalletIdentity,
        tree_ref: &str,
        source: &dyn TreeSource,
    ) -> Result<StageOutcome, StagingError> {
        let archive = source.archive(tree_ref).await?;
        let address = ContentAddress::for_bytes(archive.as_bytes());
        let size_bytes = archive.len();

        let lock = self.lock_for(&address);
        let _guard = lock.lock().await;

        let existing = match self.db.get_entry(&address)? {
            Some(entry) if entry.state == StagingState::Finalized => {
                tracing::debug!(address = %address, "Content already finalized");
                return Ok(StageOutcome {
                    address,
                    state: StagingState::Finalized,
                    written: false,
                    size_bytes,
                });
            }
            Some(mut entry) if entry.state == StagingState::Staged => {
                let written = self.ensure_block(&address, archive.as_bytes()).await?;
                if entry.claimants.insert(owner.account_id.clone()) {
                    entry.updated_at = Utc::now();
                    self.db.put_entry(&entry)?;
                    tracing::debug!(
                        address = %address,
                        account_id = %owner.account_id,
                        "Added claimant to staged content"
                    );
                }
                return Ok(StageOutcome {
                    address,
                    state: StagingState::Staged,
                    written,
                    size_bytes,
                });
            }
            tombstone => tombstone,
        };

        let written = self.ensure_block(&address, archive.as_bytes()).await?;

        let entry = match existing {
            Some(mut tombstone) => {
                tombstone.revive(&owner.account_id, &owner.public_key, Some(tree_ref.to_string()));
                tombstone.size_bytes = size_bytes;
                tombstone
            }
            None => StagingEntry::new_staged(
                address.clone(),
                &owner.account_id,
                &owner.public_key,
                Some(tree_ref.to_string()),
                size_bytes,
            ),
        };

        if let Err(e) = self.db.put_entry(&entry) {
            // Leave no orphaned block behind.
            if written {
                if let Err(rm) = self.store.remove(&address).await {
                    tracing::error!(address = %address, error = %rm, "Failed to remove orphaned block");
                }
            }
            return Err(e.into());
        }

        tracing::info!(
            address = %address,
            account_id = %owner.account_id,
            size_bytes,
            entries = archive.entry_count(),
            "Content staged"
        );
        self.audit(
            AuditEvent::new(AuditEventType::ContentStaged)
                .with_account(&owner.account_id)
                .with_address(&address)
                .with_details(serde_json::json!({ "tree_ref": tree_ref, "size_bytes": size_bytes })),
        );

        Ok(StageOutcome {
            address,
            state: StagingState::Staged,
            written,
            size_bytes,
        })
    }

    /// Write the block unless the store already has it.
    async fn ensure_block(&self, address: &ContentAddress, bytes: &[u8]) -> Result<bool, StagingError> {
        if self.store.contains(address).await? {
            return Ok(false);
        }
        self.store.put(address, bytes).await?;
        Ok(true)
    }

    /// Pin staged content, recording `owner` and `payment_ref`.
    ///
    /// Fails with [`StagingError::NotFound`] unless the address is staged or
    /// finalized. Finalizing twice reports [`FinalizeOutcome::AlreadyFinalized`].
    pub async fn finalize(
        &self,
        address: &ContentAddress,
        owner: &WalletIdentity,
        payment_ref: &str,
    ) -> Result<FinalizeOutcome, StagingError> {
        let lock = self.lock_for(address);
        let _guard = lock.lock().await;

        let mut entry = self
            .db
            .get_entry(address)?
            .ok_or_else(|| StagingError::NotFound(address.clone()))?;

        match entry.state {
            StagingState::Finalized => return Ok(FinalizeOutcome::AlreadyFinalized),
            StagingState::Reclaimed => return Err(StagingError::NotFound(address.clone())),
            StagingState::Staged => {}
        }

        self.store.pin(address).await?;
        entry.mark_finalized(&owner.account_id, &owner.public_key, payment_ref);
        self.db.put_entry(&entry)?;

        tracing::info!(
            address = %address,
            account_id = %owner.account_id,
            payment_ref,
            "Content finalized"
        );
        self.audit(
            AuditEvent::new(AuditEventType::ContentFinalized)
                .with_account(&owner.account_id)
                .with_address(address)
                .with_details(serde_json::json!({ "payment_ref": payment_ref })),
        );
        Ok(FinalizeOutcome::Finalized)
    }

    /// Remove staged content from the store.
    ///
    /// Returns `false` without touching the store when the entry is missing,
    /// finalized or already reclaimed.
    pub async fn reclaim(
        &self,
        address: &ContentAddress,
        reason: ReclaimReason,
    ) -> Result<bool, StagingError> {
        let lock = self.lock_for(address);
        let _guard = lock.lock().await;

        let Some(mut entry) = self.db.get_entry(address)? else {
            return Ok(false);
        };
        if entry.state != StagingState::Staged {
            return Ok(false);
        }
        self.reclaim_locked(&mut entry, reason).await?;
        Ok(true)
    }

    /// Reclaim an entry whose address lock is held by the caller.
    async fn reclaim_locked(
        &self,
        entry: &mut StagingEntry,
        reason: ReclaimReason,
    ) -> Result<(), StagingError> {
        self.store.unpin(&entry.address).await?;
        self.store.remove(&entry.address).await?;
        entry.mark_reclaimed(reason);
        self.db.put_entry(entry)?;

        tracing::info!(address = %entry.address, reason = ?reason, "Content reclaimed");
        self.audit(
            AuditEvent::new(AuditEventType::ContentReclaimed)
                .with_address(&entry.address)
                .with_details(serde_json::json!({ "reason": reason })),
        );
        Ok(())
    }

    /// Drop `account_id` from the claimants of a staged address after a
    /// rejected payment, reclaiming the content once nobody claims it.
    pub async fn reject_claim(
        &self,
        address: &ContentAddress,
        account_id: &str,
    ) -> Result<ClaimOutcome, StagingError> {
        let lock = self.lock_for(address);
        let _guard = lock.lock().await;

        let Some(mut entry) = self.db.get_entry(address)? else {
            return Ok(ClaimOutcome::Unchanged);
        };
        if entry.state != StagingState::Staged {
            return Ok(ClaimOutcome::Unchanged);
        }

        entry.claimants.remove(account_id);
        if entry.claimants.is_empty() {
            self.reclaim_locked(&mut entry, ReclaimReason::PaymentRejected)
                .await?;
            return Ok(ClaimOutcome::Reclaimed);
        }

        entry.updated_at = Utc::now();
        self.db.put_entry(&entry)?;
        Ok(ClaimOutcome::StillStaged)
    }

    /// Archive bytes of finalized content, or `None` while the address is
    /// unknown, staged or reclaimed.
    pub async fn published(&self, address: &ContentAddress) -> Result<Option<Vec<u8>>, StagingError> {
        match self.db.get_entry(address)? {
            Some(entry) if entry.state == StagingState::Finalized => {
                Ok(Some(self.store.get(address).await?))
            }
            _ => Ok(None),
        }
    }

    /// Current entry for an address.
    pub fn entry(&self, address: &ContentAddress) -> Result<Option<StagingEntry>, StagingError> {
        Ok(self.db.get_entry(address)?)
    }

    /// Reclaim every staged entry older than the TTL at `now`.
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<Vec<ContentAddress>, StagingError> {
        let candidates: Vec<_> = self
            .db
            .staged_before(now - self.ttl)?
            .into_iter()
            .filter(|e| e.is_expired(now, self.ttl))
            .collect();

        let mut reclaimed = Vec::new();
        for candidate in candidates {
            let lock = self.lock_for(&candidate.address);
            let _guard = lock.lock().await;

            // Re-read under the lock: a confirm may have won the race.
            let Some(mut entry) = self.db.get_entry(&candidate.address)? else {
                continue;
            };
            if !entry.is_expired(now, self.ttl) {
                continue;
            }
            match self.reclaim_locked(&mut entry, ReclaimReason::Expired).await {
                Ok(()) => reclaimed.push(entry.address.clone()),
                Err(e) => {
                    tracing::warn!(address = %entry.address, error = %e, "Failed to reclaim expired content");
                }
            }
        }
        Ok(reclaimed)
    }

    /// Drop address locks nobody is holding.
    pub fn prune_locks(&self) -> usize {
        let before = self.locks.len();
        self.locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        before - self.locks.len()
    }

    fn audit(&self, event: AuditEvent) {
        if let Some(audit) = &self.audit {
            audit.record(event);
        }
    }
}
