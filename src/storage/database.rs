// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Embedded metadata database backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `wallet_identities`: base58 public key → serialized WalletIdentity
//! - `staging_entries`: content address → serialized StagingEntry
//! - `staged_by_created_at`: zero-padded creation millis + address → address,
//!   one row per entry that is currently staged
//! - `payment_refs`: transaction ref → serialized PaymentRecord
//! - `consumed_challenges`: public key + nonce → Unix second the challenge
//!   stops being fresh

use std::path::Path;

use chrono::{DateTime, Utc};
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};

use crate::auth::identity::WalletIdentity;
use crate::content::{ContentAddress, StagingEntry, StagingState};

// =============================================================================
// Table Definitions
// =============================================================================

/// Identities: base58 public key → WalletIdentity (JSON bytes).
const WALLET_IDENTITIES: TableDefinition<&str, &[u8]> = TableDefinition::new("wallet_identities");

/// Staging metadata: content address → StagingEntry (JSON bytes).
const STAGING_ENTRIES: TableDefinition<&str, &[u8]> = TableDefinition::new("staging_entries");

/// Staged entries ordered by creation time: `{millis:020}:{address}` → address.
const STAGED_BY_CREATED_AT: TableDefinition<&str, &str> =
    TableDefinition::new("staged_by_created_at");

/// Payment ledger: transaction ref → PaymentRecord (JSON bytes).
const PAYMENT_REFS: TableDefinition<&str, &[u8]> = TableDefinition::new("payment_refs");

/// Used challenges: `{public_key}:{nonce}` → expiry (Unix seconds).
const CONSUMED_CHALLENGES: TableDefinition<&str, i64> = TableDefinition::new("consumed_challenges");

// =============================================================================
// Error Type
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type DbResult<T> = Result<T, DbError>;

// =============================================================================
// Payment Records
// =============================================================================

/// What happened to a transaction reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentOutcome {
    /// Paid for the finalization of `address`.
    Consumed,
    /// Presented and rejected; can never finalize anything.
    Burned,
}

/// A transaction reference seen by the coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub transaction_ref: String,
    pub address: ContentAddress,
    pub account_id: String,
    pub outcome: PaymentOutcome,
    pub recorded_at: DateTime<Utc>,
}

impl PaymentRecord {
    pub fn new(
        transaction_ref: &str,
        address: &ContentAddress,
        account_id: &str,
        outcome: PaymentOutcome,
    ) -> Self {
        Self {
            transaction_ref: transaction_ref.to_string(),
            address: address.clone(),
            account_id: account_id.to_string(),
            outcome,
            recorded_at: Utc::now(),
        }
    }
}

// =============================================================================
// MetadataDb
// =============================================================================

/// Embedded ACID metadata database.
pub struct MetadataDb {
    db: Database,
}

impl MetadataDb {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> DbResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(WALLET_IDENTITIES)?;
            let _ = write_txn.open_table(STAGING_ENTRIES)?;
            let _ = write_txn.open_table(STAGED_BY_CREATED_AT)?;
            let _ = write_txn.open_table(PAYMENT_REFS)?;
            let _ = write_txn.open_table(CONSUMED_CHALLENGES)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    // =========================================================================
    // Wallet identities
    // =========================================================================

    /// Look up the identity bound to a public key.
    pub fn get_identity(&self, public_key: &str) -> DbResult<Option<WalletIdentity>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(WALLET_IDENTITIES)?;
        match table.get(public_key)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Return the identity bound to `public_key`, inserting `create()` if none.
    ///
    /// Lookup and insert share one write transaction, so concurrent callers
    /// for the same key all observe the first inserted identity. The flag is
    /// `true` only for the call that created it.
    pub fn get_or_create_identity(
        &self,
        public_key: &str,
        create: impl FnOnce() -> WalletIdentity,
    ) -> DbResult<(WalletIdentity, bool)> {
        let write_txn = self.db.begin_write()?;
        let result = {
            let mut table = write_txn.open_table(WALLET_IDENTITIES)?;
            let existing = table
                .get(public_key)?
                .map(|value| value.value().to_vec());
            match existing {
                Some(bytes) => (serde_json::from_slice(&bytes)?, false),
                None => {
                    let identity = create();
                    let json = serde_json::to_vec(&identity)?;
                    table.insert(public_key, json.as_slice())?;
                    (identity, true)
                }
            }
        };
        write_txn.commit()?;
        Ok(result)
    }

    // =========================================================================
    // Staging entries
    // =========================================================================

    /// Look up the staging entry for an address.
    pub fn get_entry(&self, address: &ContentAddress) -> DbResult<Option<StagingEntry>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(STAGING_ENTRIES)?;
        match table.get(address.as_str())? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Insert or replace a staging entry, keeping the staged index in step.
    pub fn put_entry(&self, entry: &StagingEntry) -> DbResult<()> {
        let json = serde_json::to_vec(entry)?;
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(STAGING_ENTRIES)?;
            let mut index = write_txn.open_table(STAGED_BY_CREATED_AT)?;

            let previous = table
                .get(entry.address.as_str())?
                .map(|value| value.value().to_vec());
            if let Some(bytes) = previous {
                let previous: StagingEntry = serde_json::from_slice(&bytes)?;
                if previous.state == StagingState::Staged {
                    index.remove(staged_key(&previous).as_str())?;
                }
            }

            table.insert(entry.address.as_str(), json.as_slice())?;
            if entry.state == StagingState::Staged {
                index.insert(staged_key(entry).as_str(), entry.address.as_str())?;
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Staged entries created at or before `cutoff`, oldest first. Reads
    /// only the staged index, never the reclaimed or finalized history.
    pub fn staged_before(&self, cutoff: DateTime<Utc>) -> DbResult<Vec<StagingEntry>> {
        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(STAGED_BY_CREATED_AT)?;
        let table = read_txn.open_table(STAGING_ENTRIES)?;

        // ';' sorts right after ':', so this bound covers every address at
        // the cutoff millisecond.
        let end = format!("{:020};", cutoff.timestamp_millis().max(0));

        let mut entries = Vec::new();
        for item in index.range(..end.as_str())? {
            let (_, address) = item?;
            if let Some(value) = table.get(address.value())? {
                let entry: StagingEntry = serde_json::from_slice(value.value())?;
                if entry.state == StagingState::Staged && entry.created_at <= cutoff {
                    entries.push(entry);
                }
            }
        }
        Ok(entries)
    }

    // =========================================================================
    // Payment references
    // =========================================================================

    /// Look up a recorded transaction reference.
    pub fn get_payment(&self, transaction_ref: &str) -> DbResult<Option<PaymentRecord>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(PAYMENT_REFS)?;
        match table.get(transaction_ref)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Record a transaction reference unless one is already recorded.
    ///
    /// Returns the record that is stored after the call: `record` itself when
    /// it was inserted, otherwise the earlier one.
    pub fn claim_payment(&self, record: &PaymentRecord) -> DbResult<PaymentRecord> {
        let write_txn = self.db.begin_write()?;
        let stored = {
            let mut table = write_txn.open_table(PAYMENT_REFS)?;
            let existing = table
                .get(record.transaction_ref.as_str())?
                .map(|value| value.value().to_vec());
            match existing {
                Some(bytes) => serde_json::from_slice(&bytes)?,
                None => {
                    let json = serde_json::to_vec(record)?;
                    table.insert(record.transaction_ref.as_str(), json.as_slice())?;
                    record.clone()
                }
            }
        };
        write_txn.commit()?;
        Ok(stored)
    }

    /// Drop a recorded transaction reference.
    pub fn release_payment(&self, transaction_ref: &str) -> DbResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(PAYMENT_REFS)?;
            table.remove(transaction_ref)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    // =========================================================================
    // Consumed challenges
    // =========================================================================

    /// Mark a challenge as used.
    ///
    /// Returns `false` when `key` was already consumed, `true` when this call
    /// recorded it. Check and insert share one write transaction.
    pub fn consume_challenge(&self, key: &str, expires_at: i64) -> DbResult<bool> {
        let write_txn = self.db.begin_write()?;
        let fresh = {
            let mut table = write_txn.open_table(CONSUMED_CHALLENGES)?;
            let seen = table.get(key)?.is_some();
            if !seen {
                table.insert(key, expires_at)?;
            }
            !seen
        };
        write_txn.commit()?;
        Ok(fresh)
    }

    /// Forget challenges that expired before `now` (Unix seconds).
    ///
    /// An expired challenge fails the freshness check on its own, so its
    /// record is no longer needed.
    pub fn prune_challenges(&self, now: i64) -> DbResult<usize> {
        let write_txn = self.db.begin_write()?;
        let pruned = {
            let mut table = write_txn.open_table(CONSUMED_CHALLENGES)?;
            let mut expired = Vec::new();
            for item in table.iter()? {
                let (key, expires_at) = item?;
                if expires_at.value() < now {
                    expired.push(key.value().to_string());
                }
            }
            for key in &expired {
                table.remove(key.as_str())?;
            }
            expired.len()
        };
        write_txn.commit()?;
        Ok(pruned)
    }
}

/// Index key for a staged entry.
fn staged_key(entry: &StagingEntry) -> String {
    format!("{:020}:{}", entry.created_at.timestamp_millis().max(0), entry.address)
}

// =============================================================================
// Tests
// =============================================================================
