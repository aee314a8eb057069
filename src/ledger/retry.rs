// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Bounded exponential backoff for ledger calls.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use super::LedgerError;

/// Retry policy for transient ledger failures.
///
/// Only [`LedgerError::Unavailable`] is retried. The delay doubles after each
/// attempt up to `max_backoff`, and no retry is started that would end after
/// `max_wait` has elapsed since the first attempt.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub max_wait: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 4,
            initial_backoff: Duration::from_millis(250),
            max_backoff: Duration::from_secs(4),
            max_wait: Duration::from_secs(20),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (0-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }

    /// Run `op`, retrying while it reports the ledger unavailable.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut op: F) -> Result<T, LedgerError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, LedgerError>>,
    {
        let started = Instant::now();
        let mut attempt = 0;

        loop {
            match op().await {
                Err(LedgerError::Unavailable(reason)) if attempt < self.max_retries => {
                    let delay = self.backoff(attempt);
                    if started.elapsed() + delay > self.max_wait {
                        tracing::warn!(operation, attempt, %reason, "Ledger retry budget exhausted");
                        return Err(LedgerError::Unavailable(reason));
                    }
                    tracing::debug!(
                        operation,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        %reason,
                        "Ledger unavailable, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(LedgerError::Unavailable(reason)) => {
                    tracing::warn!(operation, attempt, %reason, "Ledger unavailable after retries");
                    return Err(LedgerError::Unavailable(reason));
                }
                other => return other,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(4),
            max_wait: Duration::from_secs(5),
        }
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(500),
            ..RetryPolicy::default()
        };
        assert_eq!(policy.backoff(0), Duration::from_millis(100));
        assert_eq!(policy.backoff(1), Duration::from_millis(200));
        assert_eq!(policy.backoff(2), Duration::from_millis(400));
        assert_eq!(policy.backoff(3), Duration::from_millis(500));
        assert_eq!(policy.backoff(40), Duration::from_millis(500));
    }

    #[tokio::test]
    async fn retries_until_success() {
        let calls = AtomicU32::new(0);
        let result = fast_policy(3)
            .run("test", || async {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(LedgerError::Unavailable("flaky".into()))
                } else {
                    Ok(42)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = fast_policy(2)
            .run("test", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(LedgerError::Unavailable("down".into()))
            })
            .await;

        assert!(matches!(result, Err(LedgerError::Unavailable(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn other_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = fast_policy(5)
            .run("test", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(LedgerError::InvalidAccount("bad".into()))
            })
            .await;

        assert!(matches!(result, Err(LedgerError::InvalidAccount(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn max_wait_bounds_total_time() {
        let policy = RetryPolicy {
            max_retries: 10,
            initial_backoff: Duration::from_millis(50),
            max_backoff: Duration::from_secs(1),
            max_wait: Duration::from_millis(120),
        };
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = policy
            .run("test", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(LedgerError::Unavailable("down".into()))
            })
            .await;

        assert!(result.is_err());
        // 50ms + 100ms would exceed 120ms, so only one retry happens.
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
