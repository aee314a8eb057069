// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Staging entry metadata.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::ContentAddress;

/// Lifecycle state of staged content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum StagingState {
    /// Written to the store, awaiting payment.
    Staged,
    /// Pinned after a confirmed payment. Terminal.
    Finalized,
    /// Removed from the store. Restaging starts a new cycle.
    Reclaimed,
}

/// Why an entry was reclaimed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ReclaimReason {
    /// Not finalized before the staging TTL.
    Expired,
    /// Every claimant presented a rejected payment.
    PaymentRejected,
}

/// Metadata for one content address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagingEntry {
    pub address: ContentAddress,
    pub owner_account_id: String,
    /// Base58 public key of the owner.
    pub owner_public_key: String,
    /// Accounts that staged this address in the open cycle.
    pub claimants: BTreeSet<String>,
    /// Tree reference the content was last staged from.
    pub tree_ref: Option<String>,
    pub size_bytes: u64,
    pub state: StagingState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub finalized_at: Option<DateTime<Utc>>,
    /// Transaction that paid for finalization.
    pub payment_ref: Option<String>,
    pub reclaim_reason: Option<ReclaimReason>,
}

impl StagingEntry {
    /// A fresh `Staged` entry owned by `account_id`.
    pub fn new_staged(
        address: ContentAddress,
        account_id: &str,
        public_key: &str,
        tree_ref: Option<String>,
        size_bytes: u64,
    ) -> Self {
        let now = Utc::now();
        Self {
            address,
            owner_account_id: account_id.to_string(),
            owner_public_key: public_key.to_string(),
            claimants: BTreeSet::from([account_id.to_string()]),
            tree_ref,
            size_bytes,
            state: StagingState::Staged,
            created_at: now,
            updated_at: now,
            finalized_at: None,
            payment_ref: None,
            reclaim_reason: None,
        }
    }

    /// Whether `account_id` may confirm this entry.
    pub fn is_claimant(&self, account_id: &str) -> bool {
        self.claimants.contains(account_id)
    }

    /// Whether a staged entry has outlived `ttl` at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        self.state == StagingState::Staged && now - self.created_at >= ttl
    }

    /// Restart the cycle of a reclaimed entry for a new owner.
    pub fn revive(&mut self, account_id: &str, public_key: &str, tree_ref: Option<String>) {
        let now = Utc::now();
        self.owner_account_id = account_id.to_string();
        self.owner_public_key = public_key.to_string();
        self.claimants = BTreeSet::from([account_id.to_string()]);
        self.tree_ref = tree_ref;
        self.state = StagingState::Staged;
        self.created_at = now;
        self.updated_at = now;
        self.finalized_at = None;
        self.payment_ref = None;
        self.reclaim_reason = None;
    }

    /// Mark finalized, transferring ownership to the paying account.
    pub fn mark_finalized(&mut self, account_id: &str, public_key: &str, payment_ref: &str) {
        let now = Utc::now();
        self.owner_account_id = account_id.to_string();
        self.owner_public_key = public_key.to_string();
        self.state = StagingState::Finalized;
        self.claimants.clear();
        self.finalized_at = Some(now);
        self.updated_at = now;
        self.payment_ref = Some(payment_ref.to_string());
    }

    /// Mark reclaimed for `reason`.
    pub fn mark_reclaimed(&mut self, reason: ReclaimReason) {
        self.state = StagingState::Reclaimed;
        self.claimants.clear();
        self.reclaim_reason = Some(reason);
        self.updated_at = Utc::now();
    }
}
