// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Signed challenge messages.
//!
//! A wallet signs a four-line UTF-8 message:
//!
//! ```text
//! pinwall-auth-v1
//! POST /v1/publish
//! 1767225600
//! 3f2b9c1e8d7a4c6b9e0f1a2b3c4d5e6f
//! ```
//!
//! The second line binds the signature to one method and path, the third is
//! the issue time in Unix seconds and the last is a client-chosen nonce. A
//! challenge is accepted only for its own request, only inside the freshness
//! window and only once per wallet.

use chrono::{DateTime, Duration, Utc};

/// First line of every challenge message.
pub const CHALLENGE_PREFIX: &str = "pinwall-auth-v1";

/// Default tolerance between the issue time and the server clock.
pub const DEFAULT_CHALLENGE_WINDOW_SECS: i64 = 300;

const MIN_NONCE_LEN: usize = 16;
const MAX_NONCE_LEN: usize = 128;

/// Parsed challenge message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeMessage {
    pub method: String,
    pub path: String,
    /// Unix seconds.
    pub issued_at: i64,
    pub nonce: String,
}

impl ChallengeMessage {
    pub fn new(method: &str, path: &str, issued_at: DateTime<Utc>, nonce: &str) -> Self {
        Self {
            method: method.to_ascii_uppercase(),
            path: path.to_string(),
            issued_at: issued_at.timestamp(),
            nonce: nonce.to_string(),
        }
    }

    /// Parse the signed bytes, or `None` if they are not a challenge.
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        let text = std::str::from_utf8(bytes).ok()?;
        let mut lines = text.split('\n');

        if lines.next()? != CHALLENGE_PREFIX {
            return None;
        }
        let (method, path) = lines.next()?.split_once(' ')?;
        let issued_at = lines.next()?.parse().ok()?;
        let nonce = lines.next()?;
        if lines.next().is_some() {
            return None;
        }

        let method_ok = !method.is_empty() && method.bytes().all(|b| b.is_ascii_uppercase());
        let path_ok = path.starts_with('/') && !path.contains(char::is_whitespace);
        if !method_ok || !path_ok || !valid_nonce(nonce) {
            return None;
        }

        Some(Self {
            method: method.to_string(),
            path: path.to_string(),
            issued_at,
            nonce: nonce.to_string(),
        })
    }

    /// The exact bytes a wallet signs.
    pub fn to_bytes(&self) -> Vec<u8> {
        format!(
            "{CHALLENGE_PREFIX}\n{} {}\n{}\n{}",
            self.method, self.path, self.issued_at, self.nonce
        )
        .into_bytes()
    }

    /// Whether the challenge was signed for this request.
    pub fn binds(&self, method: &str, path: &str) -> bool {
        self.method.eq_ignore_ascii_case(method) && self.path == path
    }

    /// Whether the issue time lies within `window` of `now`, either side.
    pub fn is_fresh(&self, now: DateTime<Utc>, window: Duration) -> bool {
        now.timestamp()
            .checked_sub(self.issued_at)
            .is_some_and(|skew| skew.abs() <= window.num_seconds())
    }

    /// Unix time after which the challenge can no longer be fresh.
    pub fn expires_at(&self, window: Duration) -> i64 {
        self.issued_at.saturating_add(window.num_seconds())
    }
}

fn valid_nonce(nonce: &str) -> bool {
    (MIN_NONCE_LEN..=MAX_NONCE_LEN).contains(&nonce.len())
        && nonce
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}
