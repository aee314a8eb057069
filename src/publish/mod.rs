// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Payment-gated publish cycles.
//!
//! A cycle is started with a wallet-authenticated request naming a tree,
//! admitted on the wallet's balance, staged, and finalized once the ledger
//! confirms a payment transaction from that wallet.

pub mod coordinator;
pub mod types;

pub use coordinator::PublishCoordinator;
pub use types::{
    PublishError, PublishOutcome, PublishPolicy, PublishStatus, DEFAULT_MIN_BALANCE,
};
