// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use pinwall::{
    api::router,
    auth::{identity::DEFAULT_CACHE_CAPACITY, IdentityResolver},
    config::{Config, LOG_FORMAT_ENV},
    content::{ContentStager, DirectoryTreeSource, Sweeper},
    ledger::{RetryPolicy, SolanaRpcClient},
    publish::{PublishCoordinator, PublishPolicy},
    state::AppState,
    storage::{AuditLog, ContentStore, FsContentStore, MetadataDb, StoragePaths},
};

const DEFAULT_LOG_FILTER: &str = "info,pinwall=debug,tower_http=debug";

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let json = std::env::var(LOG_FORMAT_ENV)
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[tokio::main]
async fn main() {
    init_tracing();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            std::process::exit(1);
        }
    };

    // Storage
    let paths = StoragePaths::new(&config.data_dir);
    std::fs::create_dir_all(paths.root()).expect("Failed to create data directory");
    let db = Arc::new(MetadataDb::open(&paths.database()).expect("Failed to open metadata database"));
    let audit = Arc::new(AuditLog::new(paths.clone()));
    let store: Arc<dyn ContentStore> = Arc::new(
        FsContentStore::open(paths.clone())
            .await
            .expect("Failed to open content store"),
    );

    // Content
    let ttl = chrono::Duration::from_std(config.staging_ttl).expect("STAGING_TTL_SECS out of range");
    let stager = Arc::new(
        ContentStager::new(store, Arc::clone(&db))
            .with_ttl(ttl)
            .with_audit(Arc::clone(&audit)),
    );
    let trees = Arc::new(
        DirectoryTreeSource::new(&config.repos_dir).with_max_bytes(config.max_archive_bytes),
    );

    // Ledger
    let ledger = SolanaRpcClient::new(
        &config.rpc_url,
        &config.payment_recipient,
        config.ledger_timeout,
    )
    .expect("Failed to build Solana RPC client")
    .with_retry_policy(RetryPolicy {
        max_retries: config.ledger_max_retries,
        max_wait: config.ledger_max_wait,
        ..RetryPolicy::default()
    });

    let coordinator = Arc::new(
        PublishCoordinator::new(Arc::new(ledger), Arc::clone(&stager), trees, Arc::clone(&db))
            .with_policy(PublishPolicy {
                min_balance: config.min_balance,
                price: config.publish_price,
            })
            .with_audit(Arc::clone(&audit)),
    );
    let challenge_window = chrono::Duration::from_std(config.challenge_window)
        .expect("CHALLENGE_WINDOW_SECS out of range");
    let resolver = Arc::new(
        IdentityResolver::new(Arc::clone(&db), DEFAULT_CACHE_CAPACITY)
            .with_challenge_window(challenge_window)
            .with_audit(audit),
    );

    // Background sweep of unpaid content and spent challenges
    let shutdown = CancellationToken::new();
    let sweeper = Sweeper::new(stager)
        .with_interval(config.sweep_interval)
        .with_challenge_pruning(db);
    let sweeper_handle = tokio::spawn(sweeper.run(shutdown.clone()));

    let addr = config.bind_addr;
    info!(
        rpc_url = %config.rpc_url,
        recipient = %config.payment_recipient,
        min_balance = config.min_balance,
        price = config.publish_price,
        "Pinwall configured"
    );

    let app = router(AppState::new(coordinator, resolver, config));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind listener");
    info!(%addr, "Pinwall listening (docs at /docs)");

    let signal_token = shutdown.clone();
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            info!("Shutdown signal received");
            signal_token.cancel();
        })
        .await;

    shutdown.cancel();
    if let Err(e) = sweeper_handle.await {
        error!(error = %e, "Sweeper task failed");
    }
    if let Err(e) = served {
        error!(error = %e, "Server error");
        std::process::exit(1);
    }
}
