// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Wallet identity resolution.
//!
//! A verified public key maps to exactly one account. The mapping is created
//! on the first successful authentication and never changes afterwards.
//!
//! A challenge authenticates one request: it must name the request's method
//! and path, be issued within the freshness window, and carry a nonce the
//! wallet has not used before.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use lru::LruCache;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::challenge::{ChallengeMessage, DEFAULT_CHALLENGE_WINDOW_SECS};
use super::{signature, AuthError};
use crate::storage::{AuditEvent, AuditEventType, AuditLog, MetadataDb};

/// Default number of identities kept in memory.
pub const DEFAULT_CACHE_CAPACITY: usize = 10_000;

/// A wallet-backed account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct WalletIdentity {
    /// Stable internal account id (UUID v4).
    pub account_id: String,
    /// Base58 Ed25519 public key.
    pub public_key: String,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
}

impl WalletIdentity {
    /// A new identity for a base58 public key.
    pub fn new(public_key: &str) -> Self {
        let prefix: String = public_key.chars().take(8).collect();
        Self {
            account_id: uuid::Uuid::new_v4().to_string(),
            public_key: public_key.to_string(),
            display_name: format!("Solana User {prefix}"),
            created_at: Utc::now(),
        }
    }
}

/// A signed message presented as proof of key ownership. Never persisted.
#[derive(Debug, Clone)]
pub struct AuthChallenge {
    pub message: Vec<u8>,
    pub public_key: Vec<u8>,
    pub signature: Vec<u8>,
}

/// Authenticates challenges and maps public keys to accounts.
pub struct IdentityResolver {
    db: Arc<MetadataDb>,
    cache: Mutex<LruCache<String, WalletIdentity>>,
    window: Duration,
    audit: Option<Arc<AuditLog>>,
}

impl IdentityResolver {
    pub fn new(db: Arc<MetadataDb>, capacity: usize) -> Self {
        Self {
            db,
            cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN),
            )),
            window: Duration::seconds(DEFAULT_CHALLENGE_WINDOW_SECS),
            audit: None,
        }
    }

    /// Set how far a challenge's issue time may drift from the server clock.
    pub fn with_challenge_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// Record authentication outcomes in the audit log.
    pub fn with_audit(mut self, audit: Arc<AuditLog>) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Verify `challenge` for the request `method path` at `now` and resolve
    /// the signer's identity.
    ///
    /// Every verification failure yields the same
    /// [`AuthError::BadCredentials`], before any lookup happens. A challenge
    /// that passes is consumed and fails on every later presentation.
    pub fn authenticate(
        &self,
        challenge: &AuthChallenge,
        method: &str,
        path: &str,
        now: DateTime<Utc>,
    ) -> Result<WalletIdentity, AuthError> {
        let message = self.verify(challenge, method, path, now).map_err(|reason| {
            tracing::debug!(reason, method, path, "Wallet challenge rejected");
            self.audit(AuditEvent::new(AuditEventType::AuthFailure).failed(reason));
            AuthError::BadCredentials
        })?;

        let public_key = bs58::encode(&challenge.public_key).into_string();
        let key = format!("{public_key}:{}", message.nonce);
        let first_use = self
            .db
            .consume_challenge(&key, message.expires_at(self.window))
            .map_err(|e| AuthError::Internal(e.to_string()))?;
        if !first_use {
            tracing::debug!(method, path, "Wallet challenge replayed");
            self.audit(AuditEvent::new(AuditEventType::AuthFailure).failed("challenge replayed"));
            return Err(AuthError::BadCredentials);
        }

        let identity = self.resolve(&public_key)?;

        self.audit(AuditEvent::new(AuditEventType::AuthSuccess).with_account(&identity.account_id));
        Ok(identity)
    }

    /// Stateless checks, cheapest first. The error is the audit reason.
    fn verify(
        &self,
        challenge: &AuthChallenge,
        method: &str,
        path: &str,
        now: DateTime<Utc>,
    ) -> Result<ChallengeMessage, &'static str> {
        let message = ChallengeMessage::parse(&challenge.message).ok_or("malformed challenge")?;
        if !message.binds(method, path) {
            return Err("challenge signed for another request");
        }
        if !message.is_fresh(now, self.window) {
            return Err("challenge outside freshness window");
        }
        if !signature::verify(&challenge.public_key, &challenge.message, &challenge.signature) {
            return Err("bad credentials");
        }
        Ok(message)
    }

    /// Look up or create the identity for a verified base58 key.
    fn resolve(&self, public_key: &str) -> Result<WalletIdentity, AuthError> {
        if let Some(identity) = self.cached(public_key) {
            return Ok(identity);
        }

        let (identity, created) = self
            .db
            .get_or_create_identity(public_key, || WalletIdentity::new(public_key))
            .map_err(|e| AuthError::Internal(e.to_string()))?;

        if created {
            tracing::info!(
                account_id = %identity.account_id,
                public_key = %identity.public_key,
                "Created wallet identity"
            );
            self.audit(
                AuditEvent::new(AuditEventType::IdentityCreated).with_account(&identity.account_id),
            );
        }

        if let Ok(mut cache) = self.cache.lock() {
            cache.put(public_key.to_string(), identity.clone());
        }
        Ok(identity)
    }

    fn cached(&self, public_key: &str) -> Option<WalletIdentity> {
        let mut cache = self.cache.lock().ok()?;
        cache.get(public_key).cloned()
    }

    fn audit(&self, event: AuditEvent) {
        if let Some(audit) = &self.audit {
            audit.record(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signer, SigningKey};
    use tempfile::TempDir;

    fn resolver() -> (IdentityResolver, Arc<MetadataDb>, TempDir) {
        let dir = TempDir::new().unwrap();
        let db = Arc::new(MetadataDb::open(&dir.path().join("id.redb")).unwrap());
        (IdentityResolver::new(Arc::clone(&db), 16), db, dir)
    }

    const METHOD: &str = "POST";
    const PATH: &str = "/v1/publish";

    fn signed(seed: u8, message: &[u8]) -> AuthChallenge {
        let key = SigningKey::from_bytes(&[seed; 32]);
        AuthChallenge {
            message: message.to_vec(),
            public_key: key.verifying_key().to_bytes().to_vec(),
            signature: key.sign(message).to_bytes().to_vec(),
        }
    }

    /// A fresh challenge for `POST /v1/publish` with a unique nonce.
    fn challenge(seed: u8) -> AuthChallenge {
        challenge_at(seed, METHOD, PATH, Utc::now())
    }

    fn challenge_at(seed: u8, method: &str, path: &str, issued_at: DateTime<Utc>) -> AuthChallenge {
        let nonce = uuid::Uuid::new_v4().simple().to_string();
        signed(seed, &ChallengeMessage::new(method, path, issued_at, &nonce).to_bytes())
    }

    fn authenticate(resolver: &IdentityResolver, c: &AuthChallenge) -> Result<WalletIdentity, AuthError> {
        resolver.authenticate(c, METHOD, PATH, Utc::now())
    }

    #[test]
    fn first_authentication_creates_identity() {
        let (resolver, db, _dir) = resolver();
        let c = challenge(1);

        let identity = authenticate(&resolver, &c).unwrap();

        assert_eq!(identity.public_key, bs58::encode(&c.public_key).into_string());
        assert!(identity.display_name.starts_with("Solana User "));
        assert_eq!(identity.display_name.len(), "Solana User ".len() + 8);
        assert_eq!(db.get_identity(&identity.public_key).unwrap(), Some(identity));
    }

    #[test]
    fn same_key_resolves_to_same_account() {
        let (resolver, _db, _dir) = resolver();

        let a = authenticate(&resolver, &challenge(2)).unwrap();
        let b = authenticate(&resolver, &challenge(2)).unwrap();
        let other = authenticate(&resolver, &challenge(3)).unwrap();

        assert_eq!(a.account_id, b.account_id);
        assert_ne!(a.account_id, other.account_id);
    }

    #[test]
    fn identity_survives_cache_eviction() {
        let dir = TempDir::new().unwrap();
        let db = Arc::new(MetadataDb::open(&dir.path().join("id.redb")).unwrap());
        let resolver = IdentityResolver::new(db, 1);

        let a = authenticate(&resolver, &challenge(4)).unwrap();
        authenticate(&resolver, &challenge(5)).unwrap();
        let again = authenticate(&resolver, &challenge(4)).unwrap();

        assert_eq!(a, again);
    }

    #[test]
    fn every_failure_cause_is_bad_credentials() {
        let (resolver, db, _dir) = resolver();
        let valid = challenge(6);

        let mut wrong_sig = valid.clone();
        wrong_sig.signature[0] ^= 1;
        let mut short_key = valid.clone();
        short_key.public_key.truncate(31);
        let mut short_sig = valid.clone();
        short_sig.signature.truncate(10);
        let mut wrong_message = valid.clone();
        wrong_message.message = challenge(6).message;
        let unstructured = signed(6, b"publish hello-world");
        let stale = challenge_at(6, METHOD, PATH, Utc::now() - Duration::minutes(10));
        let future = challenge_at(6, METHOD, PATH, Utc::now() + Duration::minutes(10));
        let other_path = challenge_at(6, METHOD, "/v1/publish/Qm1/confirm", Utc::now());
        let other_method = challenge_at(6, "GET", PATH, Utc::now());

        for bad in [
            wrong_sig,
            short_key,
            short_sig,
            wrong_message,
            unstructured,
            stale,
            future,
            other_path,
            other_method,
        ] {
            assert!(matches!(
                authenticate(&resolver, &bad),
                Err(AuthError::BadCredentials)
            ));
        }

        // Nothing was created for the failed attempts.
        let key = bs58::encode(&valid.public_key).into_string();
        assert_eq!(db.get_identity(&key).unwrap(), None);
    }

    #[test]
    fn challenge_cannot_be_replayed() {
        let (resolver, _db, _dir) = resolver();
        let c = challenge(8);

        authenticate(&resolver, &c).unwrap();

        assert!(matches!(
            authenticate(&resolver, &c),
            Err(AuthError::BadCredentials)
        ));
    }

    #[test]
    fn failed_attempt_does_not_consume_the_nonce() {
        let (resolver, _db, _dir) = resolver();
        let c = challenge(9);

        let wrong_path = resolver.authenticate(&c, METHOD, "/v1/other", Utc::now());
        assert!(matches!(wrong_path, Err(AuthError::BadCredentials)));

        authenticate(&resolver, &c).unwrap();
    }

    #[test]
    fn nonces_are_scoped_per_wallet() {
        let (resolver, _db, _dir) = resolver();
        let now = Utc::now();
        let message = ChallengeMessage::new(METHOD, PATH, now, "shared-nonce-0001").to_bytes();

        authenticate(&resolver, &signed(10, &message)).unwrap();
        authenticate(&resolver, &signed(11, &message)).unwrap();
    }

    #[test]
    fn window_is_configurable() {
        let (resolver, _db, _dir) = resolver();
        let resolver = resolver.with_challenge_window(Duration::hours(1));

        let c = challenge_at(12, METHOD, PATH, Utc::now() - Duration::minutes(30));
        authenticate(&resolver, &c).unwrap();
    }

    #[test]
    fn audit_records_success_and_failure() {
        let dir = TempDir::new().unwrap();
        let paths = crate::storage::StoragePaths::new(dir.path());
        let db = Arc::new(MetadataDb::open(&paths.database()).unwrap());
        let audit = Arc::new(AuditLog::new(paths));
        let resolver = IdentityResolver::new(db, 16).with_audit(Arc::clone(&audit));

        authenticate(&resolver, &challenge(7)).unwrap();
        let mut bad = challenge(7);
        bad.signature[1] ^= 0x80;
        let _ = authenticate(&resolver, &bad);

        let today = Utc::now().format("%Y-%m-%d").to_string();
        let types: Vec<_> = audit
            .read_events(&today)
            .unwrap()
            .into_iter()
            .map(|e| e.event_type)
            .collect();
        assert_eq!(
            types,
            vec![
                AuditEventType::IdentityCreated,
                AuditEventType::AuthSuccess,
                AuditEventType::AuthFailure
            ]
        );
    }
}
