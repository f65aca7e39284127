use crate::config::ThrottleConfig;
use crate::domain::ports::{ClockRef, WindowStoreRef};
use crate::domain::throttle::{Decision, RateLimitKey};
use crate::error::{BankError, Result};
use crate::infrastructure::clock::SystemClock;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Sliding-window request throttle.
///
/// The window log in the [`WindowStore`] is the only state: expired timestamps are
/// pruned before counting, so the count always covers the trailing `window`.
/// A rejected call leaves the log as it found it (modulo pruning of timestamps that
/// could never count again).
///
/// [`WindowStore`]: crate::domain::ports::WindowStore
#[derive(Clone)]
pub struct SlidingWindowThrottle {
    store: WindowStoreRef,
    clock: ClockRef,
}

/// Result of the read-only half of a check.
struct Evaluation {
    key: String,
    now_ms: i64,
    count: u64,
    reset_at_ms: i64,
}

impl SlidingWindowThrottle {
    pub fn new(store: WindowStoreRef) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    pub fn with_clock(store: WindowStoreRef, clock: ClockRef) -> Self {
        Self { store, clock }
    }

    /// Decides whether one more request for `key` fits in the window, recording it if so.
    pub async fn allow(
        &self,
        key: &RateLimitKey,
        max_requests: u64,
        window: Duration,
    ) -> Result<Decision> {
        let eval = self.evaluate(key, window).await?;
        self.decide(eval, max_requests, window).await
    }

    pub async fn check(&self, key: &RateLimitKey, config: &ThrottleConfig) -> Result<Decision> {
        self.allow(key, config.max_requests, config.window).await
    }

    /// Like [`allow`](Self::allow), but fails with `DeadlineExceeded` if the window
    /// cannot be read before `deadline`. Once an admitted request starts being
    /// recorded, recording runs to completion so a timestamp is never left without
    /// its expiry.
    pub async fn allow_before(
        &self,
        key: &RateLimitKey,
        max_requests: u64,
        window: Duration,
        deadline: Instant,
    ) -> Result<Decision> {
        let eval = tokio::time::timeout_at(deadline, self.evaluate(key, window))
            .await
            .map_err(|_| BankError::DeadlineExceeded)??;
        if Instant::now() >= deadline {
            return Err(BankError::DeadlineExceeded);
        }
        self.decide(eval, max_requests, window).await
    }

    async fn evaluate(&self, key: &RateLimitKey, window: Duration) -> Result<Evaluation> {
        let key = key.to_string();
        let window_ms = window_ms(window);
        let now_ms = self.clock.now_ms();

        self.store.remove_before(&key, now_ms.saturating_sub(window_ms)).await?;
        let count = self.store.count(&key).await?;
        let earliest = self
            .store
            .first(&key, 1)
            .await?
            .first()
            .copied()
            .unwrap_or(now_ms);

        Ok(Evaluation {
            key,
            now_ms,
            count,
            reset_at_ms: earliest.saturating_add(window_ms),
        })
    }

    async fn decide(&self, eval: Evaluation, max_requests: u64, window: Duration) -> Result<Decision> {
        // `count` excludes this attempt; admitting it must not exceed the limit.
        if eval.count >= max_requests {
            let wait_ms = eval.reset_at_ms.saturating_sub(eval.now_ms).max(0) as u64;
            let retry_after_secs = wait_ms.div_ceil(1000).max(1);
            debug!(key = %eval.key, count = eval.count, retry_after_secs, "request throttled");
            return Ok(Decision {
                allowed: false,
                limit: max_requests,
                count: eval.count,
                remaining: 0,
                reset_at_ms: eval.reset_at_ms,
                retry_after_secs: Some(retry_after_secs),
            });
        }

        self.store.add(&eval.key, eval.now_ms).await?;
        self.store.expire(&eval.key, window).await?;

        let count = eval.count + 1;
        Ok(Decision {
            allowed: true,
            limit: max_requests,
            count,
            remaining: max_requests.saturating_sub(count),
            reset_at_ms: eval.reset_at_ms,
            retry_after_secs: None,
        })
    }
}

fn window_ms(window: Duration) -> i64 {
    i64::try_from(window.as_millis()).unwrap_or(i64::MAX)
}
