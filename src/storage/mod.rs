// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Storage Module
//!
//! Persistent state of the service, all under one data directory.
//!
//! ## Storage Layout
//!
//! ```text
//! /data/
//!   pinwall.redb             # identities, staging entries, payment refs
//!   store/
//!     blocks/{address}       # canonical archive bytes
//!     pins/{address}         # pin markers
//!   audit/
//!     {date}/events.jsonl    # Daily audit logs
//! ```
//!
//! ## Important Notes
//!
//! - Only the content stager mutates `store/`
//! - The redb file is opened once per process

pub mod audit;
pub mod blocks;
pub mod database;
pub mod paths;

pub use audit::{AuditEvent, AuditEventType, AuditLog};
pub use blocks::{ContentStore, FsContentStore, StoreError, StoreResult};
pub use database::{DbError, DbResult, MetadataDb, PaymentOutcome, PaymentRecord};
pub use paths::StoragePaths;
