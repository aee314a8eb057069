// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Shared fixtures for unit tests: deterministic wallets, a counting content
//! store, a scripted ledger and a temp-dir backed stager.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use ed25519_dalek::{Signer, SigningKey};
use tempfile::TempDir;

use crate::auth::{AuthChallenge, WalletIdentity};
use crate::content::{ContentAddress, ContentStager, DirectoryTreeSource};
use crate::ledger::{Confirmation, Lamports, LedgerError, LedgerGateway};
use crate::storage::{
    ContentStore, FsContentStore, MetadataDb, StoragePaths, StoreError, StoreResult,
};

// =============================================================================
// Wallets
// =============================================================================

pub fn signing_key(seed: u8) -> SigningKey {
    SigningKey::from_bytes(&[seed; 32])
}

/// Base58 public key of the wallet for `seed`.
pub fn public_key(seed: u8) -> String {
    bs58::encode(signing_key(seed).verifying_key().to_bytes()).into_string()
}

/// Deterministic identity for `seed`, without touching a database.
pub fn identity(seed: u8) -> WalletIdentity {
    let public_key = public_key(seed);
    WalletIdentity {
        account_id: format!("acct-{seed}"),
        display_name: format!("Solana User {}", &public_key[..8]),
        public_key,
        created_at: Utc::now(),
    }
}

/// A valid challenge signed by the wallet for `seed`.
pub fn challenge(seed: u8, message: &[u8]) -> AuthChallenge {
    let key = signing_key(seed);
    AuthChallenge {
        message: message.to_vec(),
        public_key: key.verifying_key().to_bytes().to_vec(),
        signature: key.sign(message).to_bytes().to_vec(),
    }
}

/// Headers carrying a fresh challenge for `method path`, signed by the
/// wallet `seed` with a unique nonce.
pub fn wallet_headers(seed: u8, method: &str, path: &str) -> Vec<(&'static str, String)> {
    use crate::auth::challenge::ChallengeMessage;

    let nonce = uuid::Uuid::new_v4().simple().to_string();
    let message = ChallengeMessage::new(method, path, Utc::now(), &nonce);
    signed_headers(seed, &message.to_bytes())
}

/// Challenge headers for the wallet `seed` signing `message` verbatim, in
/// public key, signature, message order.
pub fn signed_headers(seed: u8, message: &[u8]) -> Vec<(&'static str, String)> {
    use crate::auth::extractor::{MESSAGE_HEADER, PUBLIC_KEY_HEADER, SIGNATURE_HEADER};
    use base64ct::{Base64, Encoding};

    let c = challenge(seed, message);
    vec![
        (PUBLIC_KEY_HEADER, bs58::encode(&c.public_key).into_string()),
        (SIGNATURE_HEADER, bs58::encode(&c.signature).into_string()),
        (MESSAGE_HEADER, Base64::encode_string(&c.message)),
    ]
}

/// A well-formed base58 transaction signature derived from `seed`.
pub fn tx_ref(seed: u8) -> String {
    bs58::encode([seed; 64]).into_string()
}

// =============================================================================
// Counting store
// =============================================================================

/// [`FsContentStore`] wrapper counting writes and pins per address.
pub struct CountingStore {
    inner: FsContentStore,
    puts: Mutex<HashMap<ContentAddress, usize>>,
    pins: Mutex<HashMap<ContentAddress, usize>>,
    fail_puts: AtomicBool,
}

impl CountingStore {
    pub fn new(inner: FsContentStore) -> Self {
        Self {
            inner,
            puts: Mutex::new(HashMap::new()),
            pins: Mutex::new(HashMap::new()),
            fail_puts: AtomicBool::new(false),
        }
    }

    pub fn put_count(&self, address: &ContentAddress) -> usize {
        self.puts.lock().unwrap().get(address).copied().unwrap_or(0)
    }

    pub fn pin_count(&self, address: &ContentAddress) -> usize {
        self.pins.lock().unwrap().get(address).copied().unwrap_or(0)
    }

    pub fn total_puts(&self) -> usize {
        self.puts.lock().unwrap().values().sum()
    }

    /// Make every following `put` fail with an I/O error.
    pub fn fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl ContentStore for CountingStore {
    async fn put(&self, address: &ContentAddress, bytes: &[u8]) -> StoreResult<()> {
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(StoreError::Io(std::io::Error::other("injected put failure")));
        }
        *self.puts.lock().unwrap().entry(address.clone()).or_default() += 1;
        self.inner.put(address, bytes).await
    }

    async fn get(&self, address: &ContentAddress) -> StoreResult<Vec<u8>> {
        self.inner.get(address).await
    }

    async fn pin(&self, address: &ContentAddress) -> StoreResult<()> {
        *self.pins.lock().unwrap().entry(address.clone()).or_default() += 1;
        self.inner.pin(address).await
    }

    async fn unpin(&self, address: &ContentAddress) -> StoreResult<()> {
        self.inner.unpin(address).await
    }

    async fn contains(&self, address: &ContentAddress) -> StoreResult<bool> {
        self.inner.contains(address).await
    }

    async fn is_pinned(&self, address: &ContentAddress) -> StoreResult<bool> {
        self.inner.is_pinned(address).await
    }

    async fn remove(&self, address: &ContentAddress) -> StoreResult<()> {
        self.inner.remove(address).await
    }
}

// =============================================================================
// Scripted ledger
// =============================================================================

/// In-memory [`LedgerGateway`] with scripted balances and confirmations.
///
/// Unknown accounts report `NotFound`; unknown transactions stay `Pending`.
#[derive(Default)]
pub struct FakeLedger {
    balances: Mutex<HashMap<String, Lamports>>,
    confirmations: Mutex<HashMap<String, Confirmation>>,
    unavailable: AtomicBool,
    balance_calls: AtomicUsize,
    confirm_calls: AtomicUsize,
    memos: Mutex<Vec<String>>,
}

impl FakeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_balance(&self, account: &str, lamports: Lamports) {
        self.balances
            .lock()
            .unwrap()
            .insert(account.to_string(), lamports);
    }

    pub fn set_confirmation(&self, transaction_ref: &str, confirmation: Confirmation) {
        self.confirmations
            .lock()
            .unwrap()
            .insert(transaction_ref.to_string(), confirmation);
    }

    /// Make balance queries fail as unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn balance_calls(&self) -> usize {
        self.balance_calls.load(Ordering::SeqCst)
    }

    pub fn confirm_calls(&self) -> usize {
        self.confirm_calls.load(Ordering::SeqCst)
    }

    /// Memos the coordinator asked to be confirmed, in call order.
    pub fn memos(&self) -> Vec<String> {
        self.memos.lock().unwrap().clone()
    }
}

#[async_trait]
impl LedgerGateway for FakeLedger {
    async fn get_balance(&self, account: &str) -> Result<Lamports, LedgerError> {
        self.balance_calls.fetch_add(1, Ordering::SeqCst);
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(LedgerError::Unavailable("scripted outage".to_string()));
        }
        self.balances
            .lock()
            .unwrap()
            .get(account)
            .copied()
            .ok_or_else(|| LedgerError::NotFound(account.to_string()))
    }

    async fn confirm_transaction(
        &self,
        transaction_ref: &str,
        _expected_signer: &str,
        expected_memo: &str,
        _min_amount: Lamports,
    ) -> Confirmation {
        self.confirm_calls.fetch_add(1, Ordering::SeqCst);
        self.memos.lock().unwrap().push(expected_memo.to_string());
        self.confirmations
            .lock()
            .unwrap()
            .get(transaction_ref)
            .cloned()
            .unwrap_or(Confirmation::Pending)
    }
}

// =============================================================================
// Fixture
// =============================================================================

pub fn write_file(root: &Path, rel: &str, data: &[u8]) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, data).unwrap();
}

/// A stager over temp directories, with two repositories:
/// `hello-world` and `other-repo`.
pub struct Fixture {
    pub stager: ContentStager,
    pub store: Arc<CountingStore>,
    pub db: Arc<MetadataDb>,
    pub paths: StoragePaths,
    pub trees: DirectoryTreeSource,
    pub repos: TempDir,
    pub data: TempDir,
}

impl Fixture {
    pub async fn new() -> Self {
        let data = TempDir::new().unwrap();
        let repos = TempDir::new().unwrap();

        write_file(&repos.path().join("hello-world"), "README.md", b"# hello");
        write_file(&repos.path().join("hello-world"), "src/main.rs", b"fn main() {}");
        write_file(&repos.path().join("other-repo"), "README.md", b"# other");

        let paths = StoragePaths::new(data.path());
        let db = Arc::new(MetadataDb::open(&paths.database()).unwrap());
        let store = Arc::new(CountingStore::new(
            FsContentStore::open(paths.clone()).await.unwrap(),
        ));
        let stager = ContentStager::new(store.clone(), Arc::clone(&db));
        let trees = DirectoryTreeSource::new(repos.path());

        Self {
            stager,
            store,
            db,
            paths,
            trees,
            repos,
            data,
        }
    }
}

// =============================================================================
// Application state
// =============================================================================

/// Temp directories and the scripted ledger behind a [`test_state`].
pub struct TestContext {
    pub ledger: Arc<FakeLedger>,
    pub store: Arc<CountingStore>,
    pub repos: TempDir,
    pub data: TempDir,
}

/// Full application state over temp directories and a [`FakeLedger`].
pub async fn test_state() -> (crate::state::AppState, TestContext) {
    use crate::auth::IdentityResolver;
    use crate::config::{Config, DATA_DIR_ENV, PAYMENT_RECIPIENT_ENV, REPOS_DIR_ENV};
    use crate::publish::PublishCoordinator;

    let fx = Fixture::new().await;
    let ledger = Arc::new(FakeLedger::new());

    let data_dir = fx.data.path().to_string_lossy().into_owned();
    let repos_dir = fx.repos.path().to_string_lossy().into_owned();
    let recipient = public_key(200);
    let config = Config::from_lookup(|name| match name {
        DATA_DIR_ENV => Some(data_dir.clone()),
        REPOS_DIR_ENV => Some(repos_dir.clone()),
        PAYMENT_RECIPIENT_ENV => Some(recipient.clone()),
        _ => None,
    })
    .unwrap();

    let resolver = Arc::new(IdentityResolver::new(Arc::clone(&fx.db), 16));
    let coordinator = Arc::new(PublishCoordinator::new(
        ledger.clone(),
        Arc::new(fx.stager),
        Arc::new(fx.trees),
        Arc::clone(&fx.db),
    ));

    let state = crate::state::AppState::new(coordinator, resolver, config);
    let context = TestContext {
        ledger,
        store: fx.store,
        repos: fx.repos,
        data: fx.data,
    };
    (state, context)
}
