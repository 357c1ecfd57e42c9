//! Token budget shared by concurrent classification batches.
//!
//! The budget is a fixed allowance per time window. Spending is recorded when
//! work is submitted and refunded with [`TokenBudget::release`] when that work
//! fails; the window empties once `interval` has elapsed on the clock.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use subpulse_core::{BudgetConfig, CancellationSignal, Clock, CoreError};
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{debug, warn};

#[derive(Debug)]
pub struct TokenBudget {
    limit: u64,
    interval: Duration,
    used: u64,
    window_start: DateTime<Utc>,
    clock: Arc<dyn Clock>,
}

impl TokenBudget {
    pub fn new(limit: u64, interval: Duration, clock: Arc<dyn Clock>) -> Self {
        let window_start = clock.now();
        Self {
            limit,
            interval,
            used: 0,
            window_start,
            clock,
        }
    }

    pub fn from_config(config: &BudgetConfig, clock: Arc<dyn Clock>) -> Self {
        Self::new(
            config.limit,
            Duration::from_secs(config.interval_secs),
            clock,
        )
    }

    pub fn try_acquire(&mut self, cost: u64) -> bool {
        self.roll_window();
        if self.used.saturating_add(cost) > self.limit {
            return false;
        }
        self.used += cost;
        true
    }

    pub fn release(&mut self, cost: u64) {
        self.used = self.used.saturating_sub(cost);
    }

    pub fn reset(&mut self) {
        self.used = 0;
        self.window_start = self.clock.now();
    }

    pub fn used(&self) -> u64 {
        self.used
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn remaining(&self) -> u64 {
        self.limit.saturating_sub(self.used)
    }

    pub fn time_until_reset(&self) -> Duration {
        let elapsed = (self.clock.now() - self.window_start)
            .to_std()
            .unwrap_or_default();
        self.interval.saturating_sub(elapsed)
    }

    fn roll_window(&mut self) {
        if self.time_until_reset().is_zero() {
            debug!("Token budget window elapsed, resetting {} used tokens", self.used);
            self.reset();
        }
    }
}

/// [`TokenBudget`] behind an async lock. Callers wait for capacity instead of
/// failing when the window is exhausted.
#[derive(Debug, Clone)]
pub struct SharedBudget {
    inner: Arc<Mutex<TokenBudget>>,
    limit: u64,
    initial_backoff: Duration,
    max_backoff: Duration,
}

impl SharedBudget {
    pub fn new(budget: TokenBudget, max_backoff: Duration) -> Self {
        let limit = budget.limit();
        Self {
            inner: Arc::new(Mutex::new(budget)),
            limit,
            initial_backoff: Duration::from_millis(50).min(max_backoff),
            max_backoff,
        }
    }

    pub fn from_config(config: &BudgetConfig, clock: Arc<dyn Clock>) -> Self {
        Self::new(
            TokenBudget::from_config(config, clock),
            Duration::from_millis(config.max_backoff_ms),
        )
    }

    pub fn with_initial_backoff(mut self, initial_backoff: Duration) -> Self {
        self.initial_backoff = initial_backoff.min(self.max_backoff);
        self
    }

    /// Waits until `cost` tokens fit in the current window.
    ///
    /// Fails only when `cost` can never fit or when `cancel` fires.
    pub async fn acquire(&self, cost: u64, cancel: &CancellationSignal) -> Result<(), CoreError> {
        if cost > self.limit {
            return Err(CoreError::invalid_input(format!(
                "token cost {} exceeds budget limit {}",
                cost, self.limit
            )));
        }

        let mut backoff = self.initial_backoff;
        loop {
            cancel.check()?;

            let until_reset = {
                let mut budget = self.inner.lock().await;
                if budget.try_acquire(cost) {
                    return Ok(());
                }
                budget.time_until_reset()
            };

            let wait = backoff.min(until_reset).max(Duration::from_millis(1));
            warn!(
                "Token budget exhausted, waiting {:?} before retrying ({} tokens needed)",
                wait, cost
            );

            tokio::select! {
                _ = sleep(wait) => {}
                _ = cancel.cancelled() => return Err(CoreError::Cancelled),
            }

            backoff = (backoff * 2).min(self.max_backoff);
        }
    }

    pub async fn try_acquire(&self, cost: u64) -> bool {
        self.inner.lock().await.try_acquire(cost)
    }

    pub async fn release(&self, cost: u64) {
        self.inner.lock().await.release(cost);
    }

    pub async fn reset(&self) {
        self.inner.lock().await.reset();
    }

    pub async fn remaining(&self) -> u64 {
        self.inner.lock().await.remaining()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use subpulse_core::ManualClock;

    fn manual_clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(Utc.timestamp_opt(1_700_000_000, 0).unwrap()))
    }

    #[test]
    fn test_try_acquire_until_exhausted() {
        let clock = manual_clock();
        let mut budget = TokenBudget::new(3_000, Duration::from_secs(60), clock);

        assert!(budget.try_acquire(1_500));
        assert!(budget.try_acquire(1_500));
        assert!(!budget.try_acquire(1));
        assert_eq!(budget.remaining(), 0);
    }

    #[test]
    fn test_window_resets_with_clock() {
        let clock = manual_clock();
        let mut budget = TokenBudget::new(100, Duration::from_secs(60), clock.clone());
        assert!(budget.try_acquire(100));

        clock.advance(chrono::Duration::seconds(59));
        assert!(!budget.try_acquire(1));
        assert_eq!(budget.time_until_reset(), Duration::from_secs(1));

        clock.advance(chrono::Duration::seconds(1));
        assert!(budget.try_acquire(100));
        assert_eq!(budget.used(), 100);
    }

    #[test]
    fn test_manual_reset_and_release() {
        let clock = manual_clock();
        let mut budget = TokenBudget::new(10, Duration::from_secs(60), clock);
        assert!(budget.try_acquire(10));

        budget.release(4);
        assert_eq!(budget.remaining(), 4);
        budget.release(100);
        assert_eq!(budget.used(), 0);

        assert!(budget.try_acquire(10));
        budget.reset();
        assert_eq!(budget.used(), 0);
        assert!(budget.try_acquire(10));
    }

    #[tokio::test]
    async fn test_acquire_rejects_impossible_cost() {
        let shared = SharedBudget::new(
            TokenBudget::new(10, Duration::from_secs(60), manual_clock()),
            Duration::from_millis(10),
        );
        let result = shared.acquire(11, &CancellationSignal::new()).await;
        assert!(matches!(result, Err(CoreError::InvalidInput { .. })));
    }

    #[tokio::test]
    async fn test_acquire_waits_for_release() {
        let shared = SharedBudget::new(
            TokenBudget::new(10, Duration::from_secs(60), manual_clock()),
            Duration::from_millis(5),
        )
        .with_initial_backoff(Duration::from_millis(1));
        let cancel = CancellationSignal::new();

        shared.acquire(10, &cancel).await.unwrap();

        let waiter = {
            let shared = shared.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { shared.acquire(5, &cancel).await })
        };

        sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        shared.release(10).await;
        let result = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should acquire after release")
            .expect("waiter task should not panic");
        assert!(result.is_ok());
        assert_eq!(shared.remaining().await, 5);
    }

    #[tokio::test]
    async fn test_acquire_resumes_after_window_rolls() {
        let clock = manual_clock();
        let shared = SharedBudget::new(
            TokenBudget::new(10, Duration::from_secs(60), clock.clone()),
            Duration::from_millis(5),
        );
        let cancel = CancellationSignal::new();
        assert!(shared.try_acquire(10).await);

        let waiter = {
            let shared = shared.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { shared.acquire(10, &cancel).await })
        };

        sleep(Duration::from_millis(10)).await;
        clock.advance(chrono::Duration::seconds(60));

        let result = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should acquire once the window rolls")
            .expect("waiter task should not panic");
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_acquire_stops_on_cancel() {
        let shared = SharedBudget::new(
            TokenBudget::new(10, Duration::from_secs(60), manual_clock()),
            Duration::from_millis(5),
        );
        let cancel = CancellationSignal::new();
        assert!(shared.try_acquire(10).await);

        let waiter = {
            let shared = shared.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { shared.acquire(1, &cancel).await })
        };

        sleep(Duration::from_millis(10)).await;
        cancel.cancel();

        let result = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should stop after cancel")
            .expect("waiter task should not panic");
        assert!(matches!(result, Err(CoreError::Cancelled)));
    }
}
