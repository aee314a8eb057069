// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractor for wallet-authenticated requests.
//!
//! Use the `WalletAuth` extractor in handlers to require a signed challenge:
//!
//! ```rust,ignore
//! async fn my_handler(WalletAuth(identity): WalletAuth) -> impl IntoResponse {
//!     // identity is WalletIdentity
//! }
//! ```
//!
//! ## Headers
//!
//! | Header | Encoding |
//! |--------|----------|
//! | `X-Wallet-Public-Key` | base58, 32 bytes |
//! | `X-Wallet-Signature` | base58, 64 bytes |
//! | `X-Wallet-Message` | standard base64 of the signed bytes |
//!
//! The signed bytes are a [`ChallengeMessage`](super::challenge::ChallengeMessage)
//! naming this request's method and full path.

use axum::{
    extract::{FromRequestParts, OriginalUri},
    http::request::Parts,
};
use base64ct::{Base64, Encoding};
use chrono::Utc;

use super::{AuthChallenge, AuthError, WalletIdentity};
use crate::state::AppState;

pub const PUBLIC_KEY_HEADER: &str = "x-wallet-public-key";
pub const SIGNATURE_HEADER: &str = "x-wallet-signature";
pub const MESSAGE_HEADER: &str = "x-wallet-message";

/// Extractor for wallet-authenticated requests.
///
/// Every failure (missing header, bad encoding, bad signature, replay)
/// rejects with the same [`AuthError::BadCredentials`].
pub struct WalletAuth(pub WalletIdentity);

impl FromRequestParts<AppState> for WalletAuth {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let challenge = challenge_from_parts(parts).ok_or(AuthError::BadCredentials)?;

        // Nested routers see a stripped URI; the challenge names the full path.
        let path = parts
            .extensions
            .get::<OriginalUri>()
            .map_or_else(|| parts.uri.path(), |uri| uri.0.path());

        let identity =
            state
                .resolver
                .authenticate(&challenge, parts.method.as_str(), path, Utc::now())?;
        Ok(WalletAuth(identity))
    }
}

/// Decode the challenge headers, or `None` if any is missing or malformed.
fn challenge_from_parts(parts: &Parts) -> Option<AuthChallenge> {
    let public_key = bs58::decode(header(parts, PUBLIC_KEY_HEADER)?).into_vec().ok()?;
    let signature = bs58::decode(header(parts, SIGNATURE_HEADER)?).into_vec().ok()?;
    let message = Base64::decode_vec(header(parts, MESSAGE_HEADER)?).ok()?;

    Some(AuthChallenge {
        message,
        public_key,
        signature,
    })
}

fn header<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts.headers.get(name)?.to_str().ok().map(str::trim)
}
