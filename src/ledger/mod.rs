// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Ledger gateway for Solana.
//!
//! This module provides functionality for:
//! - Querying SOL balances at finalized commitment
//! - Confirming that a payment transaction was signed by the expected wallet,
//!   names the content address in an SPL Memo instruction and moved at least
//!   a minimum amount to the configured recipient
//!
//! The gateway is read-only and never submits transactions.

pub mod client;
pub mod retry;
pub mod types;

use async_trait::async_trait;

pub use client::SolanaRpcClient;
pub use retry::RetryPolicy;
pub use types::*;

/// Errors from ledger queries.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// Network failure, timeout, HTTP error or RPC error object.
    #[error("ledger unavailable: {0}")]
    Unavailable(String),

    /// The account holds nothing on the ledger.
    #[error("account not found: {0}")]
    NotFound(String),

    #[error("invalid account: {0}")]
    InvalidAccount(String),

    #[error("invalid RPC URL: {0}")]
    InvalidRpcUrl(String),
}

/// Why a transaction failed verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// Not a well-formed transaction signature.
    InvalidReference,
    /// The transaction executed with an error.
    FailedOnChain,
    /// The expected wallet did not sign it.
    WrongSigner,
    /// No memo instruction names the content being paid for.
    MemoMismatch,
    /// The recipient is not among the transaction's accounts.
    RecipientMissing,
    /// The recipient received less than required.
    InsufficientAmount { paid: Lamports, required: Lamports },
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::InvalidReference => write!(f, "transaction reference is malformed"),
            RejectReason::FailedOnChain => write!(f, "transaction failed on-chain"),
            RejectReason::WrongSigner => write!(f, "transaction was not signed by the wallet"),
            RejectReason::MemoMismatch => {
                write!(f, "transaction memo does not name this content address")
            }
            RejectReason::RecipientMissing => {
                write!(f, "transaction does not pay the publishing recipient")
            }
            RejectReason::InsufficientAmount { paid, required } => write!(
                f,
                "payment of {} SOL is below the required {} SOL",
                format_sol(*paid),
                format_sol(*required)
            ),
        }
    }
}

impl RejectReason {
    /// Whether the transaction can never pay for the content it names.
    ///
    /// A reference rejected for the wrong signer or memo may still be a valid
    /// payment for another wallet or address, so it is not burned.
    pub fn burns_reference(&self) -> bool {
        matches!(
            self,
            RejectReason::FailedOnChain
                | RejectReason::RecipientMissing
                | RejectReason::InsufficientAmount { .. }
        )
    }
}

/// Result of confirming a payment transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Confirmation {
    /// Finalized, signed by the expected wallet, bound to the content and
    /// paying enough.
    Confirmed,
    /// Not finalized yet; ask again later.
    Pending,
    /// Exists but fails a condition. Terminal.
    Rejected(RejectReason),
    /// The ledger could not be reached after retries.
    Unavailable,
}

/// Read-only view of the ledger.
#[async_trait]
pub trait LedgerGateway: Send + Sync {
    /// Finalized balance of a base58 account.
    ///
    /// Unknown accounts report [`LedgerError::NotFound`]; callers treat that
    /// as a zero balance.
    async fn get_balance(&self, account: &str) -> Result<Lamports, LedgerError>;

    /// Check that `transaction_ref` is finalized, signed by `expected_signer`,
    /// carries `expected_memo` in a memo instruction and transfers at least
    /// `min_amount` to the payment recipient.
    async fn confirm_transaction(
        &self,
        transaction_ref: &str,
        expected_signer: &str,
        expected_memo: &str,
        min_amount: Lamports,
    ) -> Confirmation;
}
