// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Wallet-signature authentication. There are no passwords, sessions or
//! shared secrets: a request proves ownership of a Solana keypair by
//! carrying an Ed25519 signature over a message.
//!
//! ## Auth Flow
//!
//! 1. Client builds a challenge naming the request's method and path, the
//!    current time and a fresh nonce, and signs it with its wallet
//! 2. Client sends the public key, signature and message as headers
//! 3. Server:
//!    - Checks the challenge names this request and is inside the window
//!    - Verifies the signature (strict Ed25519)
//!    - Consumes the nonce, rejecting any second use
//!    - Looks up or creates the account for the public key
//!
//! ## Security
//!
//! - Publish endpoints require authentication
//! - Every verification failure yields the same `BadCredentials` response
//! - A captured challenge is useless on another endpoint or a second time
//! - A public key maps to one account for life

pub mod challenge;
pub mod error;
pub mod extractor;
pub mod identity;
pub mod signature;

pub use challenge::ChallengeMessage;
pub use error::AuthError;
pub use extractor::WalletAuth;
pub use identity::{AuthChallenge, IdentityResolver, WalletIdentity};
