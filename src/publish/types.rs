// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Publish cycle statuses, outcomes and errors.

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::content::ContentAddress;
use crate::ledger::{format_sol, Lamports};

/// Default minimum balance for admission: 0.01 SOL.
pub const DEFAULT_MIN_BALANCE: Lamports = 10_000_000;

/// Status reported to the client for a publish cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PublishStatus {
    /// Staged; submit a payment transaction and confirm it.
    AwaitingPayment,
    /// The payment is not finalized yet. Retry without paying again.
    Pending,
    /// Pinned permanently.
    Finalized,
    /// The payment proof failed verification. Terminal for the cycle.
    Rejected,
    /// The staging TTL passed before payment. Publish again.
    Reclaimed,
    /// Wallet balance is below the admission minimum.
    InsufficientFunds,
    /// The ledger could not be reached. Retry later.
    LedgerUnavailable,
    /// The tree reference cannot be published.
    InvalidTree,
    /// Content could not be written to the store.
    StagingFailed,
    /// The wallet challenge did not verify.
    BadCredentials,
    /// No open cycle for this address is visible to the caller.
    UnknownAddress,
}

impl PublishStatus {
    /// HTTP status code for this publish status.
    pub fn http_status(&self) -> StatusCode {
        match self {
            PublishStatus::AwaitingPayment => StatusCode::CREATED,
            PublishStatus::Pending => StatusCode::ACCEPTED,
            PublishStatus::Finalized => StatusCode::OK,
            PublishStatus::Rejected => StatusCode::PAYMENT_REQUIRED,
            PublishStatus::Reclaimed => StatusCode::GONE,
            PublishStatus::InsufficientFunds => StatusCode::PAYMENT_REQUIRED,
            PublishStatus::LedgerUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            PublishStatus::InvalidTree => StatusCode::UNPROCESSABLE_ENTITY,
            PublishStatus::StagingFailed => StatusCode::INTERNAL_SERVER_ERROR,
            PublishStatus::BadCredentials => StatusCode::UNAUTHORIZED,
            PublishStatus::UnknownAddress => StatusCode::NOT_FOUND,
        }
    }
}

/// Amounts the coordinator enforces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishPolicy {
    /// Minimum wallet balance to start a cycle.
    pub min_balance: Lamports,
    /// Minimum payment to the recipient to finalize.
    pub price: Lamports,
}

impl Default for PublishPolicy {
    fn default() -> Self {
        Self {
            min_balance: DEFAULT_MIN_BALANCE,
            price: DEFAULT_MIN_BALANCE,
        }
    }
}

/// Successful step of a publish cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishOutcome {
    pub cycle_id: Uuid,
    /// `AwaitingPayment`, `Pending` or `Finalized`.
    pub status: PublishStatus,
    pub address: ContentAddress,
    pub tree_ref: Option<String>,
    /// Set when `Finalized` was reached before this call.
    pub already_finalized: bool,
}

/// Terminal or retryable failure of a publish step.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error(
        "balance of {} SOL is below the required {} SOL",
        format_sol(*balance),
        format_sol(*required)
    )]
    InsufficientFunds { balance: Lamports, required: Lamports },

    #[error("ledger unavailable: {0}")]
    LedgerUnavailable(String),

    #[error("tree cannot be published: {0}")]
    InvalidTree(String),

    #[error("staging failed: {0}")]
    StagingFailed(String),

    #[error("unknown content address")]
    UnknownAddress,

    #[error("payment rejected: {reason}")]
    Rejected {
        address: ContentAddress,
        reason: String,
    },

    #[error("staged content expired before payment was confirmed")]
    Reclaimed { address: ContentAddress },
}

impl PublishError {
    pub fn status(&self) -> PublishStatus {
        match self {
            PublishError::InsufficientFunds { .. } => PublishStatus::InsufficientFunds,
            PublishError::LedgerUnavailable(_) => PublishStatus::LedgerUnavailable,
            PublishError::InvalidTree(_) => PublishStatus::InvalidTree,
            PublishError::StagingFailed(_) => PublishStatus::StagingFailed,
            PublishError::UnknownAddress => PublishStatus::UnknownAddress,
            PublishError::Rejected { .. } => PublishStatus::Rejected,
            PublishError::Reclaimed { .. } => PublishStatus::Reclaimed,
        }
    }

    /// Address the failure refers to, when the caller may know it.
    pub fn address(&self) -> Option<&ContentAddress> {
        match self {
            PublishError::Rejected { address, .. } | PublishError::Reclaimed { address } => {
                Some(address)
            }
            _ => None,
        }
    }
}
