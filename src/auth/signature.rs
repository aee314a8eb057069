// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Ed25519 wallet signature verification.
//!
//! Solana wallets sign arbitrary message bytes with the account's Ed25519
//! key. Verification here is pure: no I/O, no allocation beyond decoding,
//! and malformed input is reported exactly like a bad signature.

use ed25519_dalek::{Signature, VerifyingKey};

/// Length of an Ed25519 public key in bytes.
pub const PUBLIC_KEY_LEN: usize = 32;

/// Length of an Ed25519 signature in bytes.
pub const SIGNATURE_LEN: usize = 64;

/// Verify that `public_key` signed `message`.
///
/// Returns `false` for any length mismatch, for keys that are not valid
/// curve points, and for signatures that fail strict verification
/// (small-order keys and non-canonical `S` values are rejected).
/// Never panics on malformed input.
pub fn verify(public_key: &[u8], message: &[u8], signature: &[u8]) -> bool {
    let Ok(key_bytes) = <&[u8; PUBLIC_KEY_LEN]>::try_from(public_key) else {
        return false;
    };
    let Ok(sig_bytes) = <&[u8; SIGNATURE_LEN]>::try_from(signature) else {
        return false;
    };
    let Ok(key) = VerifyingKey::from_bytes(key_bytes) else {
        return false;
    };
    let signature = Signature::from_bytes(sig_bytes);
    key.verify_strict(message, &signature).is_ok()
}
