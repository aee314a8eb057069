// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Publish Coordinator
//!
//! Drives one publish cycle through its states:
//!
//! ```text
//! Requested ─balance─► AdmissionChecked ─stage─► Staged ─► AwaitingPayment
//!     │                                                       │
//!     └─► InsufficientFunds / LedgerUnavailable               ├─confirm─► Finalized
//!                                                             ├─reject──► Rejected (reclaimed)
//!                                                             └─TTL─────► Reclaimed
//! ```
//!
//! The coordinator never trusts a client claim that a payment happened:
//! finalization requires the ledger gateway to confirm the transaction
//! independently. Transaction references are recorded in the payment ledger
//! so one transaction pays for at most one address, and a rejected
//! transaction can never finalize anything.

use std::sync::Arc;

use uuid::Uuid;

use super::types::{PublishError, PublishOutcome, PublishPolicy, PublishStatus};
use crate::auth::WalletIdentity;
use crate::content::{
    ContentAddress, ContentStager, FinalizeOutcome, ReclaimReason, StagingEntry, StagingError,
    StagingState, TreeSource, TreeSourceError,
};
use crate::ledger::{Confirmation, LedgerError, LedgerGateway, RejectReason};
use crate::storage::{
    AuditEvent, AuditEventType, AuditLog, DbError, MetadataDb, PaymentOutcome, PaymentRecord,
};

/// Orchestrates admission, staging, payment verification and finalization.
pub struct PublishCoordinator {
    ledger: Arc<dyn LedgerGateway>,
    stager: Arc<ContentStager>,
    trees: Arc<dyn TreeSource>,
    db: Arc<MetadataDb>,
    policy: PublishPolicy,
    audit: Option<Arc<AuditLog>>,
}

impl PublishCoordinator {
    pub fn new(
        ledger: Arc<dyn LedgerGateway>,
        stager: Arc<ContentStager>,
        trees: Arc<dyn TreeSource>,
        db: Arc<MetadataDb>,
    ) -> Self {
        Self {
            ledger,
            stager,
            trees,
            db,
            policy: PublishPolicy::default(),
            audit: None,
        }
    }

    pub fn with_policy(mut self, policy: PublishPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_audit(mut self, audit: Arc<AuditLog>) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn policy(&self) -> PublishPolicy {
        self.policy
    }

    /// Start a cycle: check the wallet balance, then stage `tree_ref`.
    ///
    /// No staging happens unless admission succeeds. Content that is already
    /// finalized reports `Finalized` without asking for payment.
    pub async fn start_publish(
        &self,
        identity: &WalletIdentity,
        tree_ref: &str,
    ) -> Result<PublishOutcome, PublishError> {
        self.start_cycle(Uuid::new_v4(), identity, tree_ref).await
    }

    #[tracing::instrument(
        name = "start_publish",
        skip(self, cycle_id, identity),
        fields(%cycle_id, account_id = %identity.account_id)
    )]
    async fn start_cycle(
        &self,
        cycle_id: Uuid,
        identity: &WalletIdentity,
        tree_ref: &str,
    ) -> Result<PublishOutcome, PublishError> {
        self.audit(
            AuditEvent::new(AuditEventType::PublishStarted)
                .with_account(&identity.account_id)
                .with_cycle(cycle_id.to_string())
                .with_details(serde_json::json!({ "tree_ref": tree_ref })),
        );

        // Requested -> AdmissionChecked
        if let Err(e) = self.check_admission(identity).await {
            tracing::info!(error = %e, "Admission denied");
            self.audit(
                AuditEvent::new(AuditEventType::AdmissionDenied)
                    .with_account(&identity.account_id)
                    .with_cycle(cycle_id.to_string())
                    .failed(e.to_string()),
            );
            return Err(e);
        }

        // AdmissionChecked -> Staged
        let staged = self
            .stager
            .stage(identity, tree_ref, self.trees.as_ref())
            .await
            .map_err(staging_failure)?;

        // Staged -> AwaitingPayment, or Finalized if someone already paid.
        let (status, already_finalized) = match staged.state {
            StagingState::Finalized => (PublishStatus::Finalized, true),
            _ => (PublishStatus::AwaitingPayment, false),
        };
        tracing::info!(address = %staged.address, status = ?status, "Publish cycle started");

        Ok(PublishOutcome {
            cycle_id,
            status,
            address: staged.address,
            tree_ref: Some(tree_ref.to_string()),
            already_finalized,
        })
    }

    async fn check_admission(&self, identity: &WalletIdentity) -> Result<(), PublishError> {
        let balance = match self.ledger.get_balance(&identity.public_key).await {
            Ok(balance) => balance,
            Err(LedgerError::NotFound(_)) => 0,
            Err(e) => return Err(PublishError::LedgerUnavailable(e.to_string())),
        };

        if balance < self.policy.min_balance {
            return Err(PublishError::InsufficientFunds {
                balance,
                required: self.policy.min_balance,
            });
        }
        tracing::debug!(balance, "Admission granted");
        Ok(())
    }

    /// Verify `transaction_ref` as payment for `address` and finalize it.
    ///
    /// Only claimants of an open cycle may confirm it. `Pending` and
    /// `LedgerUnavailable` leave the content staged; a rejected proof drops
    /// the caller's claim and, when the transaction itself is unusable,
    /// burns its reference.
    pub async fn confirm_publish(
        &self,
        identity: &WalletIdentity,
        address: &ContentAddress,
        transaction_ref: &str,
    ) -> Result<PublishOutcome, PublishError> {
        self.confirm_cycle(Uuid::new_v4(), identity, address, transaction_ref)
            .await
    }

    #[tracing::instrument(
        name = "confirm_publish",
        skip(self, cycle_id, identity, address),
        fields(%cycle_id, account_id = %identity.account_id, %address)
    )]
    async fn confirm_cycle(
        &self,
        cycle_id: Uuid,
        identity: &WalletIdentity,
        address: &ContentAddress,
        transaction_ref: &str,
    ) -> Result<PublishOutcome, PublishError> {
        let entry = self.load_entry(address)?;

        // A transaction this caller already had rejected for this address
        // stays rejected without another ledger round trip.
        if let Some(record) = self.db.get_payment(transaction_ref).map_err(db_failure)? {
            if record.outcome == PaymentOutcome::Burned
                && record.address == *address
                && record.account_id == identity.account_id
            {
                return Err(PublishError::Rejected {
                    address: address.clone(),
                    reason: "transaction reference was already rejected".to_string(),
                });
            }
        }

        match entry.state {
            StagingState::Finalized => {
                return Ok(self.finalized_outcome(cycle_id, &entry, true));
            }
            StagingState::Reclaimed => return Err(reclaimed_error(&entry, identity)),
            StagingState::Staged if !entry.is_claimant(&identity.account_id) => {
                return Err(PublishError::UnknownAddress);
            }
            StagingState::Staged => {}
        }

        // A reference already recorded for something else cannot pay here.
        if let Some(record) = self.db.get_payment(transaction_ref).map_err(db_failure)? {
            if record.address != *address || record.outcome == PaymentOutcome::Burned {
                let reason = "transaction reference was already used".to_string();
                return self
                    .reject(cycle_id, identity, address, transaction_ref, reason, false)
                    .await;
            }
        }

        let confirmation = self
            .ledger
            .confirm_transaction(
                transaction_ref,
                &identity.public_key,
                address.as_str(),
                self.policy.price,
            )
            .await;

        match confirmation {
            Confirmation::Confirmed => {
                self.finalize(cycle_id, identity, address, transaction_ref)
                    .await
            }
            Confirmation::Pending => {
                tracing::info!(transaction_ref, "Payment not finalized yet");
                self.audit(
                    AuditEvent::new(AuditEventType::PaymentPending)
                        .with_account(&identity.account_id)
                        .with_cycle(cycle_id.to_string())
                        .with_address(address)
                        .with_details(serde_json::json!({ "transaction_ref": transaction_ref })),
                );
                Ok(PublishOutcome {
                    cycle_id,
                    status: PublishStatus::Pending,
                    address: address.clone(),
                    tree_ref: entry.tree_ref,
                    already_finalized: false,
                })
            }
            Confirmation::Unavailable => {
                tracing::warn!(transaction_ref, "Ledger unavailable while confirming payment");
                Err(PublishError::LedgerUnavailable(
                    "payment could not be confirmed; retry later".to_string(),
                ))
            }
            Confirmation::Rejected(reason) => {
                let burn = reason.burns_reference();
                self.reject(cycle_id, identity, address, transaction_ref, reason.to_string(), burn)
                    .await
            }
        }
    }

    async fn finalize(
        &self,
        cycle_id: Uuid,
        identity: &WalletIdentity,
        address: &ContentAddress,
        transaction_ref: &str,
    ) -> Result<PublishOutcome, PublishError> {
        let record = PaymentRecord::new(
            transaction_ref,
            address,
            &identity.account_id,
            PaymentOutcome::Consumed,
        );
        let stored = self.db.claim_payment(&record).map_err(db_failure)?;
        if stored.address != *address || stored.outcome != PaymentOutcome::Consumed {
            // Lost a race against another use of the same transaction.
            let reason = "transaction reference was already used".to_string();
            return self
                .reject(cycle_id, identity, address, transaction_ref, reason, false)
                .await;
        }

        self.audit(
            AuditEvent::new(AuditEventType::PaymentConfirmed)
                .with_account(&identity.account_id)
                .with_cycle(cycle_id.to_string())
                .with_address(address)
                .with_details(serde_json::json!({ "transaction_ref": transaction_ref })),
        );

        match self.stager.finalize(address, identity, transaction_ref).await {
            Ok(FinalizeOutcome::Finalized) => {
                let entry = self.load_entry(address)?;
                Ok(self.finalized_outcome(cycle_id, &entry, false))
            }
            Ok(FinalizeOutcome::AlreadyFinalized) => {
                // Another claimant paid first; this transaction paid for nothing.
                self.release(transaction_ref);
                let entry = self.load_entry(address)?;
                Ok(self.finalized_outcome(cycle_id, &entry, true))
            }
            Err(StagingError::NotFound(_)) => {
                self.release(transaction_ref);
                let entry = self.load_entry(address)?;
                Err(reclaimed_error(&entry, identity))
            }
            Err(e) => {
                self.release(transaction_ref);
                tracing::error!(error = %e, "Finalization failed after confirmed payment");
                Err(PublishError::StagingFailed(e.to_string()))
            }
        }
    }

    async fn reject(
        &self,
        cycle_id: Uuid,
        identity: &WalletIdentity,
        address: &ContentAddress,
        transaction_ref: &str,
        reason: String,
        burn: bool,
    ) -> Result<PublishOutcome, PublishError> {
        if burn {
            let record = PaymentRecord::new(
                transaction_ref,
                address,
                &identity.account_id,
                PaymentOutcome::Burned,
            );
            self.db.claim_payment(&record).map_err(db_failure)?;
        }

        let claim = self
            .stager
            .reject_claim(address, &identity.account_id)
            .await
            .map_err(staging_failure)?;

        tracing::info!(transaction_ref, reason = %reason, claim = ?claim, "Payment rejected");
        self.audit(
            AuditEvent::new(AuditEventType::PaymentRejected)
                .with_account(&identity.account_id)
                .with_cycle(cycle_id.to_string())
                .with_address(address)
                .with_details(serde_json::json!({ "transaction_ref": transaction_ref }))
                .failed(reason.clone()),
        );

        Err(PublishError::Rejected {
            address: address.clone(),
            reason,
        })
    }

    /// Status of `address` as seen by `identity`, without touching the ledger.
    pub fn entry_status(
        &self,
        identity: &WalletIdentity,
        address: &ContentAddress,
    ) -> Result<PublishOutcome, PublishError> {
        let entry = self.load_entry(address)?;
        match entry.state {
            StagingState::Finalized => Ok(self.finalized_outcome(Uuid::new_v4(), &entry, true)),
            StagingState::Reclaimed => Err(reclaimed_error(&entry, identity)),
            StagingState::Staged if entry.is_claimant(&identity.account_id) => Ok(PublishOutcome {
                cycle_id: Uuid::new_v4(),
                status: PublishStatus::AwaitingPayment,
                address: entry.address,
                tree_ref: entry.tree_ref,
                already_finalized: false,
            }),
            StagingState::Staged => Err(PublishError::UnknownAddress),
        }
    }

    /// Archive bytes of a finalized address, for the public gateway.
    ///
    /// Staged content is unpaid and reads as unknown, whoever asks.
    pub async fn published_content(&self, address: &ContentAddress) -> Result<Vec<u8>, PublishError> {
        self.stager
            .published(address)
            .await
            .map_err(staging_failure)?
            .ok_or(PublishError::UnknownAddress)
    }

    fn load_entry(&self, address: &ContentAddress) -> Result<StagingEntry, PublishError> {
        self.stager
            .entry(address)
            .map_err(staging_failure)?
            .ok_or(PublishError::UnknownAddress)
    }

    fn finalized_outcome(
        &self,
        cycle_id: Uuid,
        entry: &StagingEntry,
        already_finalized: bool,
    ) -> PublishOutcome {
        PublishOutcome {
            cycle_id,
            status: PublishStatus::Finalized,
            address: entry.address.clone(),
            tree_ref: entry.tree_ref.clone(),
            already_finalized,
        }
    }

    fn release(&self, transaction_ref: &str) {
        if let Err(e) = self.db.release_payment(transaction_ref) {
            tracing::error!(transaction_ref, error = %e, "Failed to release payment reference");
        }
    }

    fn audit(&self, event: AuditEvent) {
        if let Some(audit) = &self.audit {
            audit.record(event);
        }
    }
}

/// Outcome for a reclaimed entry: only its last owner learns why.
fn reclaimed_error(entry: &StagingEntry, identity: &WalletIdentity) -> PublishError {
    if entry.owner_account_id != identity.account_id {
        return PublishError::UnknownAddress;
    }
    match entry.reclaim_reason {
        Some(ReclaimReason::PaymentRejected) => PublishError::Rejected {
            address: entry.address.clone(),
            reason: "payment was rejected; publish again to start a new cycle".to_string(),
        },
        _ => PublishError::Reclaimed {
            address: entry.address.clone(),
        },
    }
}

fn staging_failure(e: StagingError) -> PublishError {
    match e {
        StagingError::Tree(TreeSourceError::Io(io)) => PublishError::StagingFailed(io.to_string()),
        StagingError::Tree(tree) => PublishError::InvalidTree(tree.to_string()),
        StagingError::NotFound(_) => PublishError::UnknownAddress,
        other => {
            tracing::error!(error = %other, "Staging failed");
            PublishError::StagingFailed(other.to_string())
        }
    }
}

fn db_failure(e: DbError) -> PublishError {
    tracing::error!(error = %e, "Metadata database failure");
    PublishError::StagingFailed(e.to_string())
}
