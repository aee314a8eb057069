// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Staging Sweeper
//!
//! Background task that reclaims staged content whose payment never arrived.
//!
//! Every `interval` (default 60 s) the sweeper:
//! 1. Lists staged entries older than the stager's TTL and reclaims them.
//! 2. Drops per-address locks that nobody holds.
//! 3. Forgets consumed auth challenges that can no longer pass the freshness
//!    check, when challenge pruning is enabled.
//!
//! Uses `tokio_util::sync::CancellationToken` for graceful shutdown.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::ContentStager;
use crate::storage::MetadataDb;

/// Default interval between sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Periodic TTL sweep over staged content.
pub struct Sweeper {
    stager: Arc<ContentStager>,
    interval: Duration,
    challenges: Option<Arc<MetadataDb>>,
}

impl Sweeper {
    pub fn new(stager: Arc<ContentStager>) -> Self {
        Self {
            stager,
            interval: DEFAULT_SWEEP_INTERVAL,
            challenges: None,
        }
    }

    /// Override the sweep interval.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Also prune expired consumed challenges from `db` on every pass.
    pub fn with_challenge_pruning(mut self, db: Arc<MetadataDb>) -> Self {
        self.challenges = Some(db);
        self
    }

    /// Run the sweep loop until the cancellation token is triggered.
    ///
    /// Should be spawned as a background task:
    /// ```rust,ignore
    /// tokio::spawn(sweeper.run(shutdown.clone()));
    /// ```
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            interval_secs = self.interval.as_secs(),
            ttl_secs = self.stager.ttl().num_seconds(),
            "Staging sweeper starting"
        );

        loop {
            if shutdown.is_cancelled() {
                info!("Staging sweeper shutting down");
                return;
            }

            self.sweep_step().await;

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {},
                _ = shutdown.cancelled() => {
                    info!("Staging sweeper shutting down");
                    return;
                }
            }
        }
    }

    /// One sweep pass.
    pub async fn sweep_step(&self) {
        match self.stager.sweep_expired(Utc::now()).await {
            Ok(reclaimed) if !reclaimed.is_empty() => {
                info!(count = reclaimed.len(), "Reclaimed expired staged content");
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Staging sweep failed"),
        }

        let pruned = self.stager.prune_locks();
        if pruned > 0 {
            debug!(pruned, "Pruned idle address locks");
        }

        if let Some(db) = &self.challenges {
            match db.prune_challenges(Utc::now().timestamp()) {
                Ok(0) => {}
                Ok(pruned) => debug!(pruned, "Pruned expired auth challenges"),
                Err(e) => warn!(error = %e, "Challenge pruning failed"),
            }
        }
    }
}
