// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Pinwall - Payment-Gated Repository Publishing Service
//!
//! This crate lets a Solana wallet publish a snapshot of a repository tree
//! into a content-addressable store. Snapshots are staged first and pinned
//! only after the ledger confirms a payment from the same wallet.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Wallet signature authentication and identities
//! - `content` - Canonical tree archives, addresses and staging
//! - `ledger` - Solana JSON-RPC gateway (read-only)
//! - `publish` - Publish cycle coordination
//! - `storage` - Metadata database, block store and audit log

pub mod api;
pub mod auth;
pub mod config;
pub mod content;
pub mod error;
pub mod ledger;
pub mod models;
pub mod publish;
pub mod state;
pub mod storage;

#[cfg(test)]
pub mod test_support;
