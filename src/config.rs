// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! This module defines environment variable names and default values used
//! throughout the application. Configuration is loaded from the environment
//! once at startup into [`Config`].
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `DATA_DIR` | Root directory for the database, store and audit log | `/data` |
//! | `REPOS_DIR` | Directory holding publishable trees | `/repos` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `SOLANA_RPC_URL` | Solana JSON-RPC endpoint | `https://api.mainnet-beta.solana.com` |
//! | `PAYMENT_RECIPIENT` | Base58 account receiving publish payments | Required |
//! | `MIN_BALANCE_LAMPORTS` | Minimum wallet balance to start publishing | `10000000` |
//! | `PUBLISH_PRICE_LAMPORTS` | Minimum payment to finalize | `MIN_BALANCE_LAMPORTS` |
//! | `STAGING_TTL_SECS` | Lifetime of unpaid staged content | `3600` |
//! | `SWEEP_INTERVAL_SECS` | Interval between TTL sweeps | `60` |
//! | `CHALLENGE_WINDOW_SECS` | Allowed skew of a challenge's issue time | `300` |
//! | `LEDGER_TIMEOUT_SECS` | Per-request RPC timeout | `5` |
//! | `LEDGER_MAX_RETRIES` | Retries for unavailable RPC calls | `4` |
//! | `LEDGER_MAX_WAIT_SECS` | Upper bound on time spent retrying | `20` |
//! | `MAX_ARCHIVE_BYTES` | Largest publishable tree archive | `536870912` |
//! | `GATEWAY_BASE_URL` | Origin prefixed to `/ipfs/{address}` links | empty (this service) |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,pinwall=debug,tower_http=debug` |
//!
//! Durations are whole seconds and must be positive.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::ledger::{Lamports, SOLANA_MAINNET};
use crate::publish::DEFAULT_MIN_BALANCE;

/// Environment variable name for the data directory path.
pub const DATA_DIR_ENV: &str = "DATA_DIR";
pub const REPOS_DIR_ENV: &str = "REPOS_DIR";
pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const SOLANA_RPC_URL_ENV: &str = "SOLANA_RPC_URL";
/// Environment variable name for the payment recipient. Required.
pub const PAYMENT_RECIPIENT_ENV: &str = "PAYMENT_RECIPIENT";
pub const MIN_BALANCE_ENV: &str = "MIN_BALANCE_LAMPORTS";
pub const PUBLISH_PRICE_ENV: &str = "PUBLISH_PRICE_LAMPORTS";
pub const STAGING_TTL_ENV: &str = "STAGING_TTL_SECS";
pub const SWEEP_INTERVAL_ENV: &str = "SWEEP_INTERVAL_SECS";
pub const CHALLENGE_WINDOW_ENV: &str = "CHALLENGE_WINDOW_SECS";
pub const LEDGER_TIMEOUT_ENV: &str = "LEDGER_TIMEOUT_SECS";
pub const LEDGER_MAX_RETRIES_ENV: &str = "LEDGER_MAX_RETRIES";
pub const LEDGER_MAX_WAIT_ENV: &str = "LEDGER_MAX_WAIT_SECS";
pub const MAX_ARCHIVE_BYTES_ENV: &str = "MAX_ARCHIVE_BYTES";
pub const GATEWAY_BASE_URL_ENV: &str = "GATEWAY_BASE_URL";
/// `json` for structured logs, anything else for human-readable output.
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_REPOS_DIR: &str = "/repos";
/// Links stay relative, so the service's own gateway route answers them.
pub const DEFAULT_GATEWAY_BASE_URL: &str = "";
pub const DEFAULT_MAX_ARCHIVE_BYTES: u64 = 512 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has an invalid value {value:?}")]
    Invalid { name: &'static str, value: String },
}

/// Service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub repos_dir: PathBuf,
    pub bind_addr: SocketAddr,
    pub rpc_url: String,
    pub payment_recipient: String,
    pub min_balance: Lamports,
    pub publish_price: Lamports,
    pub staging_ttl: Duration,
    pub sweep_interval: Duration,
    pub challenge_window: Duration,
    pub ledger_timeout: Duration,
    pub ledger_max_retries: u32,
    pub ledger_max_wait: Duration,
    pub max_archive_bytes: u64,
    pub gateway_base_url: String,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let host = get(HOST_ENV).unwrap_or_else(|| "0.0.0.0".to_string());
        let port: u16 = parse_or(&get, PORT_ENV, 8080)?;
        let bind_addr: SocketAddr = format!("{host}:{port}")
            .parse()
            .map_err(|_| ConfigError::Invalid {
                name: HOST_ENV,
                value: host.clone(),
            })?;

        let payment_recipient = get(PAYMENT_RECIPIENT_ENV)
            .ok_or(ConfigError::Missing(PAYMENT_RECIPIENT_ENV))?;
        let recipient_ok = bs58::decode(&payment_recipient)
            .into_vec()
            .is_ok_and(|bytes| bytes.len() == 32);
        if !recipient_ok {
            return Err(ConfigError::Invalid {
                name: PAYMENT_RECIPIENT_ENV,
                value: payment_recipient,
            });
        }

        let min_balance = parse_or(&get, MIN_BALANCE_ENV, DEFAULT_MIN_BALANCE)?;
        let publish_price = parse_or(&get, PUBLISH_PRICE_ENV, min_balance)?;

        Ok(Self {
            data_dir: get(DATA_DIR_ENV)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(crate::storage::paths::DATA_ROOT)),
            repos_dir: PathBuf::from(get(REPOS_DIR_ENV).unwrap_or_else(|| DEFAULT_REPOS_DIR.to_string())),
            bind_addr,
            rpc_url: get(SOLANA_RPC_URL_ENV).unwrap_or_else(|| SOLANA_MAINNET.rpc_url.to_string()),
            payment_recipient,
            min_balance,
            publish_price,
            staging_ttl: secs_or(&get, STAGING_TTL_ENV, 3600)?,
            sweep_interval: secs_or(&get, SWEEP_INTERVAL_ENV, 60)?,
            challenge_window: secs_or(&get, CHALLENGE_WINDOW_ENV, 300)?,
            ledger_timeout: secs_or(&get, LEDGER_TIMEOUT_ENV, 5)?,
            ledger_max_retries: parse_or(&get, LEDGER_MAX_RETRIES_ENV, 4)?,
            ledger_max_wait: Duration::from_secs(parse_or(&get, LEDGER_MAX_WAIT_ENV, 20)?),
            max_archive_bytes: parse_or(&get, MAX_ARCHIVE_BYTES_ENV, DEFAULT_MAX_ARCHIVE_BYTES)?,
            gateway_base_url: get(GATEWAY_BASE_URL_ENV)
                .unwrap_or_else(|| DEFAULT_GATEWAY_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
        })
    }
}

fn parse_or<T: FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match get(name) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}

/// A positive number of seconds.
fn secs_or(
    get: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: u64,
) -> Result<Duration, ConfigError> {
    match parse_or(get, name, default)? {
        0 => Err(ConfigError::Invalid {
            name,
            value: "0".to_string(),
        }),
        secs => Ok(Duration::from_secs(secs)),
    }
}
