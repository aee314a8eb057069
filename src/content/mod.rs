// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Content Module
//!
//! Deterministic snapshots of repository trees and their lifecycle in the
//! content-addressable store.
//!
//! ## Lifecycle
//!
//! ```text
//! stage ──► Staged ──finalize──► Finalized
//!              │
//!              ├──TTL sweep──────► Reclaimed (expired)
//!              └──last claimant──► Reclaimed (payment rejected)
//!                   rejected
//! ```
//!
//! Finalized content is never reclaimed. Reclaimed entries stay in the
//! metadata database; staging the same tree again starts a new cycle.

pub mod address;
pub mod archive;
pub mod entry;
pub mod stager;
pub mod sweeper;
pub mod tree;

pub use address::{AddressError, ContentAddress};
pub use archive::{ArchiveBuilder, ArchiveError, TreeArchive};
pub use entry::{ReclaimReason, StagingEntry, StagingState};
pub use stager::{ClaimOutcome, ContentStager, FinalizeOutcome, StageOutcome, StagingError};
pub use sweeper::Sweeper;
pub use tree::{DirectoryTreeSource, TreeSource, TreeSourceError};
