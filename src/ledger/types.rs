// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Solana ledger types and constants.

use serde::Deserialize;

/// Amounts on the ledger, in lamports.
pub type Lamports = u64;

/// Number of decimals of SOL.
pub const SOL_DECIMALS: u32 = 9;

/// Lamports in one SOL.
pub const LAMPORTS_PER_SOL: Lamports = 1_000_000_000;

/// Solana cluster configuration.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Network name for display
    pub name: &'static str,
    /// JSON-RPC endpoint URL
    pub rpc_url: &'static str,
    /// Block explorer URL
    pub explorer_url: &'static str,
}

/// Solana mainnet-beta configuration.
pub const SOLANA_MAINNET: NetworkConfig = NetworkConfig {
    name: "Solana Mainnet Beta",
    rpc_url: "https://api.mainnet-beta.solana.com",
    explorer_url: "https://explorer.solana.com",
};

/// Solana devnet configuration.
pub const SOLANA_DEVNET: NetworkConfig = NetworkConfig {
    name: "Solana Devnet",
    rpc_url: "https://api.devnet.solana.com",
    explorer_url: "https://explorer.solana.com/?cluster=devnet",
};

/// SPL Memo program ids (v2 first, then the legacy v1 program).
pub const MEMO_PROGRAM_IDS: [&str; 2] = [
    "MemoSq4gqABAXKb96qnH8TysNcWxMyWCqXgDLGmfcHr",
    "Memo1UhkJRfHyvLMcVucJwxXeuD728EqVDDwQDxFMNo",
];

/// Errors parsing SOL amounts.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AmountError {
    #[error("invalid SOL amount: {0:?}")]
    Invalid(String),

    #[error("SOL amount has more than 9 decimals: {0:?}")]
    TooPrecise(String),

    #[error("SOL amount overflows: {0:?}")]
    Overflow(String),
}

/// Parse a decimal SOL string such as `"0.01"` into lamports.
pub fn parse_sol(amount: &str) -> Result<Lamports, AmountError> {
    let trimmed = amount.trim();
    let (whole, fraction) = match trimmed.split_once('.') {
        Some((w, f)) => (w, f),
        None => (trimmed, ""),
    };

    let digits_only = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if (whole.is_empty() && fraction.is_empty()) || !digits_only(whole) || !digits_only(fraction)
    {
        return Err(AmountError::Invalid(amount.to_string()));
    }
    if fraction.len() > SOL_DECIMALS as usize {
        return Err(AmountError::TooPrecise(amount.to_string()));
    }

    let overflow = || AmountError::Overflow(amount.to_string());
    let whole: Lamports = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| overflow())?
    };
    let padded = format!("{fraction:0<width$}", width = SOL_DECIMALS as usize);
    let fraction: Lamports = padded.parse().map_err(|_| overflow())?;

    whole
        .checked_mul(LAMPORTS_PER_SOL)
        .and_then(|l| l.checked_add(fraction))
        .ok_or_else(overflow)
}

/// Format lamports as a decimal SOL string without trailing zeros.
pub fn format_sol(lamports: Lamports) -> String {
    let whole = lamports / LAMPORTS_PER_SOL;
    let remainder = lamports % LAMPORTS_PER_SOL;
    if remainder == 0 {
        return whole.to_string();
    }
    let decimals = format!("{remainder:0>width$}", width = SOL_DECIMALS as usize);
    format!("{whole}.{}", decimals.trim_end_matches('0'))
}

// =============================================================================
// JSON-RPC wire types
// =============================================================================

/// JSON-RPC response envelope.
#[derive(Debug, Deserialize)]
pub(crate) struct RpcResponse<T> {
    pub result: Option<T>,
    pub error: Option<RpcErrorObject>,
}

/// JSON-RPC error object.
#[derive(Debug, Deserialize)]
pub(crate) struct RpcErrorObject {
    pub code: i64,
    pub message: String,
}

/// `getBalance` result.
#[derive(Debug, Deserialize)]
pub(crate) struct BalanceValue {
    pub value: Lamports,
}

/// `getTransaction` result with `encoding: "json"`.
#[derive(Debug, Deserialize)]
pub(crate) struct ConfirmedTransaction {
    #[serde(default)]
    pub meta: Option<TransactionMeta>,
    pub transaction: TransactionBody,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TransactionMeta {
    #[serde(default)]
    pub err: Option<serde_json::Value>,
    pub pre_balances: Vec<Lamports>,
    pub post_balances: Vec<Lamports>,
    #[serde(default)]
    pub loaded_addresses: Option<LoadedAddresses>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct LoadedAddresses {
    #[serde(default)]
    pub writable: Vec<String>,
    #[serde(default)]
    pub readonly: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TransactionBody {
    pub message: TransactionMessage,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TransactionMessage {
    pub account_keys: Vec<String>,
    pub header: MessageHeader,
    #[serde(default)]
    pub instructions: Vec<CompiledInstruction>,
}

/// Top-level instruction; `data` is base58.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CompiledInstruction {
    pub program_id_index: usize,
    #[serde(default)]
    pub data: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MessageHeader {
    pub num_required_signatures: usize,
}
