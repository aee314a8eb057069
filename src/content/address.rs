// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Content addresses (IPFS CIDv0).
//!
//! A [`ContentAddress`] is computed from the canonical archive bytes of a tree
//! and rendered as a CIDv0 string (`Qm…`): base58btc of the sha2-256
//! multihash. Identical bytes always yield the identical address; addresses
//! are never assigned.

use std::fmt;
use std::str::FromStr;

use cid::{Cid, Version};
use multihash_codetable::{Code, MultihashDigest};
use serde::{Deserialize, Serialize};

/// Multihash code for sha2-256.
const SHA2_256: u64 = 0x12;

/// Errors produced when parsing a content address.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AddressError {
    #[error("invalid content address: {0}")]
    Invalid(String),

    #[error("unsupported content address (expected CIDv0 sha2-256): {0}")]
    Unsupported(String),
}

/// Deterministic digest identifying a content tree.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentAddress(String);

impl ContentAddress {
    /// Compute the address of canonical archive bytes.
    pub fn for_bytes(bytes: &[u8]) -> Self {
        // CIDv0 is the bare base58btc multihash.
        let digest = Code::Sha2_256.digest(bytes);
        Self(bs58::encode(digest.to_bytes()).into_string())
    }

    /// The address as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ContentAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let cid = Cid::from_str(s).map_err(|e| AddressError::Invalid(format!("{s}: {e}")))?;
        if cid.version() != Version::V0 || cid.hash().code() != SHA2_256 {
            return Err(AddressError::Unsupported(s.to_string()));
        }
        Ok(Self(cid.to_string()))
    }
}

impl TryFrom<String> for ContentAddress {
    type Error = AddressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ContentAddress> for String {
    fn from(value: ContentAddress) -> Self {
        value.0
    }
}
