// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Solana JSON-RPC client for balance and payment verification.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use super::retry::RetryPolicy;
use super::types::*;
use super::{Confirmation, LedgerError, LedgerGateway, RejectReason};

/// Default per-attempt timeout for RPC requests.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Commitment level for every query.
const COMMITMENT: &str = "finalized";

/// Solana JSON-RPC ledger gateway.
pub struct SolanaRpcClient {
    rpc_url: String,
    /// Base58 account that must receive publishing payments.
    recipient: String,
    http: reqwest::Client,
    retry: RetryPolicy,
    next_id: AtomicU64,
}

impl SolanaRpcClient {
    /// Create a client for `rpc_url` paying to `recipient`.
    pub fn new(rpc_url: &str, recipient: &str, timeout: Duration) -> Result<Self, LedgerError> {
        let url: url::Url = rpc_url
            .parse()
            .map_err(|e: url::ParseError| LedgerError::InvalidRpcUrl(e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(LedgerError::InvalidRpcUrl(rpc_url.to_string()));
        }
        validate_account(recipient)?;

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LedgerError::Unavailable(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            rpc_url: url.to_string(),
            recipient: recipient.to_string(),
            http,
            retry: RetryPolicy::default(),
            next_id: AtomicU64::new(1),
        })
    }

    /// Replace the retry policy.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// One JSON-RPC round trip. Every transport or protocol failure is
    /// reported as `Unavailable`.
    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: &Value,
    ) -> Result<Option<T>, LedgerError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let response = self
            .http
            .post(&self.rpc_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| LedgerError::Unavailable(format!("{method}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LedgerError::Unavailable(format!("{method}: HTTP {status}")));
        }

        let envelope: RpcResponse<T> = response
            .json()
            .await
            .map_err(|e| LedgerError::Unavailable(format!("{method}: invalid response: {e}")))?;

        if let Some(err) = envelope.error {
            return Err(LedgerError::Unavailable(format!(
                "{method}: RPC error {}: {}",
                err.code, err.message
            )));
        }
        Ok(envelope.result)
    }

    async fn call_with_retry<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<Option<T>, LedgerError> {
        self.retry.run(method, || self.call(method, &params)).await
    }
}

#[async_trait]
impl LedgerGateway for SolanaRpcClient {
    async fn get_balance(&self, account: &str) -> Result<Lamports, LedgerError> {
        validate_account(account)?;

        let result: Option<BalanceValue> = self
            .call_with_retry("getBalance", json!([account, { "commitment": COMMITMENT }]))
            .await?;
        let balance = result
            .ok_or_else(|| LedgerError::Unavailable("getBalance: empty result".to_string()))?
            .value;

        if balance == 0 {
            return Err(LedgerError::NotFound(account.to_string()));
        }
        tracing::debug!(account, balance_sol = %format_sol(balance), "Fetched balance");
        Ok(balance)
    }

    async fn confirm_transaction(
        &self,
        transaction_ref: &str,
        expected_signer: &str,
        expected_memo: &str,
        min_amount: Lamports,
    ) -> Confirmation {
        if !is_signature(transaction_ref) {
            return Confirmation::Rejected(RejectReason::InvalidReference);
        }

        let params = json!([
            transaction_ref,
            {
                "encoding": "json",
                "commitment": COMMITMENT,
                "maxSupportedTransactionVersion": 0,
            }
        ]);

        match self
            .call_with_retry::<ConfirmedTransaction>("getTransaction", params)
            .await
        {
            Ok(Some(tx)) => evaluate(&tx, expected_signer, expected_memo, &self.recipient, min_amount),
            Ok(None) => Confirmation::Pending,
            Err(e) => {
                tracing::warn!(transaction_ref, error = %e, "Transaction lookup failed");
                Confirmation::Unavailable
            }
        }
    }
}

/// Classify a finalized transaction against the payment requirements.
///
/// Signer and memo are checked first: only a transaction that belongs to
/// this wallet and this content is judged on its execution and amount.
fn evaluate(
    tx: &ConfirmedTransaction,
    expected_signer: &str,
    expected_memo: &str,
    recipient: &str,
    min_amount: Lamports,
) -> Confirmation {
    let Some(meta) = &tx.meta else {
        // Finalized but without status metadata; the node cannot vouch for it.
        return Confirmation::Unavailable;
    };

    let message = &tx.transaction.message;
    let signer_count = message.header.num_required_signatures.min(message.account_keys.len());
    if !message.account_keys[..signer_count]
        .iter()
        .any(|k| k == expected_signer)
    {
        return Confirmation::Rejected(RejectReason::WrongSigner);
    }

    let loaded = meta.loaded_addresses.as_ref();
    let accounts: Vec<&str> = message
        .account_keys
        .iter()
        .chain(loaded.into_iter().flat_map(|l| l.writable.iter()))
        .chain(loaded.into_iter().flat_map(|l| l.readonly.iter()))
        .map(String::as_str)
        .collect();

    if !has_memo(message, &accounts, expected_memo) {
        return Confirmation::Rejected(RejectReason::MemoMismatch);
    }
    if meta.err.is_some() {
        return Confirmation::Rejected(RejectReason::FailedOnChain);
    }

    let Some(index) = accounts.iter().position(|k| *k == recipient) else {
        return Confirmation::Rejected(RejectReason::RecipientMissing);
    };

    let (Some(pre), Some(post)) = (meta.pre_balances.get(index), meta.post_balances.get(index))
    else {
        return Confirmation::Rejected(RejectReason::RecipientMissing);
    };

    let paid = post.saturating_sub(*pre);
    if paid < min_amount {
        return Confirmation::Rejected(RejectReason::InsufficientAmount {
            paid,
            required: min_amount,
        });
    }
    Confirmation::Confirmed
}

/// Whether any memo instruction carries exactly `expected`.
fn has_memo(message: &TransactionMessage, accounts: &[&str], expected: &str) -> bool {
    message.instructions.iter().any(|ix| {
        let is_memo = accounts
            .get(ix.program_id_index)
            .is_some_and(|program| MEMO_PROGRAM_IDS.contains(program));
        is_memo
            && bs58::decode(&ix.data)
                .into_vec()
                .ok()
                .and_then(|bytes| String::from_utf8(bytes).ok())
                .is_some_and(|memo| memo.trim() == expected)
    })
}

/// Whether `value` decodes to a 64-byte transaction signature.
fn is_signature(value: &str) -> bool {
    bs58::decode(value)
        .into_vec()
        .is_ok_and(|bytes| bytes.len() == 64)
}

/// Require a base58 32-byte account key.
fn validate_account(account: &str) -> Result<(), LedgerError> {
    match bs58::decode(account).into_vec() {
        Ok(bytes) if bytes.len() == 32 => Ok(()),
        _ => Err(LedgerError::InvalidAccount(account.to_string())),
    }
}
