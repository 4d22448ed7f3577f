//! Single-flight, rate-limited refresh of a slowly-changing aggregate.
//! 单飞 + 限流的聚合数据刷新
//!
//! Refresh decision, in order:
//! 1. a refresh is already running → return, the running one serves the caller
//! 2. not forced and the data is younger than the minimum interval → return
//! 3. otherwise fetch; keep prior data on failure
//!
//! The in-flight flag is owned by an RAII guard, so it is cleared on success,
//! failure, panic, and when the refresh future is dropped mid-fetch.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use pf_core::ports::{AggregateFetchPort, ClockPort};
use pf_core::RefreshableAggregate;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info_span, warn, Instrument};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshOutcome {
    /// Data fetched and stored.
    Refreshed,
    /// Inside the throttle window, nothing fetched.
    Throttled,
    /// Another refresh is running, nothing fetched.
    AlreadyInFlight,
    /// Fetch failed, prior data kept.
    Failed,
    /// The aggregate was cleared while the fetch was running; result dropped.
    Discarded,
}

struct RefreshState<T> {
    aggregate: RefreshableAggregate<T>,
    /// Bumped by `clear()` so late results of an older session are dropped.
    epoch: u64,
}

pub struct ThrottledRefresher<T>
where
    T: Clone + Send + Sync + 'static,
{
    name: &'static str,
    source: Arc<dyn AggregateFetchPort<T>>,
    clock: Arc<dyn ClockPort>,
    min_interval: Duration,
    state: Mutex<RefreshState<T>>,
    publisher: watch::Sender<RefreshableAggregate<T>>,
}

impl<T> ThrottledRefresher<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(
        name: &'static str,
        source: Arc<dyn AggregateFetchPort<T>>,
        clock: Arc<dyn ClockPort>,
        min_interval: Duration,
    ) -> Self {
        let (publisher, _) = watch::channel(RefreshableAggregate::empty());
        Self {
            name,
            source,
            clock,
            min_interval,
            state: Mutex::new(RefreshState {
                aggregate: RefreshableAggregate::empty(),
                epoch: 0,
            }),
            publisher,
        }
    }

    pub async fn refresh(&self, forced: bool) -> RefreshOutcome {
        let span = info_span!("refresher.refresh", aggregate = self.name, forced);

        async {
            let now_ms = self.clock.now_ms();
            let epoch = {
                let mut state = self.lock_state();
                if state.aggregate.refresh_in_flight {
                    debug!("Refresh already in flight");
                    return RefreshOutcome::AlreadyInFlight;
                }
                if !forced && state.aggregate.is_fresh(now_ms, self.min_interval_ms()) {
                    debug!(
                        age_ms = ?state.aggregate.age_ms(now_ms),
                        "Refresh throttled"
                    );
                    return RefreshOutcome::Throttled;
                }
                state.aggregate.refresh_in_flight = true;
                self.publish(&state);
                state.epoch
            };

            let mut guard = InFlightGuard {
                refresher: self,
                epoch,
                armed: true,
            };

            let result = self.source.fetch().await;

            let outcome = {
                let mut state = self.lock_state();
                if state.epoch != epoch {
                    debug!("Aggregate cleared during refresh, dropping result");
                    RefreshOutcome::Discarded
                } else {
                    let outcome = match result {
                        Ok(data) => {
                            state.aggregate.data = Some(data);
                            state.aggregate.last_refreshed_at_ms = Some(self.clock.now_ms());
                            debug!("Aggregate refreshed");
                            RefreshOutcome::Refreshed
                        }
                        Err(err) => {
                            warn!(error = %err, "Refresh failed, keeping previous data");
                            RefreshOutcome::Failed
                        }
                    };
                    state.aggregate.refresh_in_flight = false;
                    self.publish(&state);
                    outcome
                }
            };
            guard.armed = false;

            outcome
        }
        .instrument(span)
        .await
    }

    /// Reset to an empty aggregate (sign-out). A running fetch is left to
    /// finish but its result is dropped.
    pub fn clear(&self) {
        let mut state = self.lock_state();
        state.epoch += 1;
        state.aggregate = RefreshableAggregate::empty();
        self.publish(&state);
    }

    pub fn snapshot(&self) -> RefreshableAggregate<T> {
        self.lock_state().aggregate.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<RefreshableAggregate<T>> {
        self.publisher.subscribe()
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    fn min_interval_ms(&self) -> i64 {
        i64::try_from(self.min_interval.as_millis()).unwrap_or(i64::MAX)
    }

    fn publish(&self, state: &RefreshState<T>) {
        self.publisher.send_replace(state.aggregate.clone());
    }

    fn lock_state(&self) -> MutexGuard<'_, RefreshState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

struct InFlightGuard<'a, T>
where
    T: Clone + Send + Sync + 'static,
{
    refresher: &'a ThrottledRefresher<T>,
    epoch: u64,
    armed: bool,
}

impl<T> Drop for InFlightGuard<'_, T>
where
    T: Clone + Send + Sync + 'static,
{
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut state = self.refresher.lock_state();
        if state.epoch == self.epoch && state.aggregate.refresh_in_flight {
            state.aggregate.refresh_in_flight = false;
            self.refresher.publish(&state);
            debug!(
                aggregate = self.refresher.name,
                "Refresh abandoned, in-flight flag cleared"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pf_core::ports::BackendError;
    use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
    use tokio::sync::Notify;

    struct ManualClock(AtomicI64);

    impl ManualClock {
        fn at(ms: i64) -> Arc<Self> {
            Arc::new(Self(AtomicI64::new(ms)))
        }

        fn set(&self, ms: i64) {
            self.0.store(ms, Ordering::SeqCst);
        }
    }

    impl ClockPort for ManualClock {
        fn now_ms(&self) -> i64 {
            self.0.load(Ordering::SeqCst)
        }
    }

    struct CountingSource {
        calls: AtomicUsize,
        fail: AtomicBool,
        gate: Option<Arc<Notify>>,
    }

    impl CountingSource {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                fail: AtomicBool::new(false),
                gate: None,
            })
        }

        fn gated(gate: Arc<Notify>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                fail: AtomicBool::new(false),
                gate: Some(gate),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl AggregateFetchPort<u32> for CountingSource {
        async fn fetch(&self) -> Result<u32, BackendError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            if self.fail.load(Ordering::SeqCst) {
                return Err(BackendError::Unavailable("mock outage".to_string()));
            }
            Ok(call as u32)
        }
    }

    fn refresher(
        source: Arc<CountingSource>,
        clock: Arc<ManualClock>,
    ) -> ThrottledRefresher<u32> {
        ThrottledRefresher::new("test", source, clock, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn throttle_window_skips_non_forced_refresh() {
        let source = CountingSource::new();
        let clock = ManualClock::at(0);
        let refresher = refresher(source.clone(), clock.clone());

        assert_eq!(refresher.refresh(false).await, RefreshOutcome::Refreshed);
        clock.set(2_000);
        assert_eq!(refresher.refresh(false).await, RefreshOutcome::Throttled);
        assert_eq!(source.calls(), 1);

        assert_eq!(refresher.refresh(true).await, RefreshOutcome::Refreshed);
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn refresh_after_window_fetches_again() {
        let source = CountingSource::new();
        let clock = ManualClock::at(0);
        let refresher = refresher(source.clone(), clock.clone());

        refresher.refresh(false).await;
        clock.set(5_000);
        assert_eq!(refresher.refresh(false).await, RefreshOutcome::Refreshed);
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn concurrent_refresh_is_single_flight() {
        let gate = Arc::new(Notify::new());
        let source = CountingSource::gated(gate.clone());
        let refresher = Arc::new(refresher(source.clone(), ManualClock::at(0)));

        let first = {
            let refresher = refresher.clone();
            tokio::spawn(async move { refresher.refresh(false).await })
        };
        while source.calls() == 0 {
            tokio::task::yield_now().await;
        }

        assert!(refresher.snapshot().refresh_in_flight);
        assert_eq!(
            refresher.refresh(false).await,
            RefreshOutcome::AlreadyInFlight
        );
        assert_eq!(
            refresher.refresh(true).await,
            RefreshOutcome::AlreadyInFlight
        );

        gate.notify_one();
        assert_eq!(first.await.expect("join"), RefreshOutcome::Refreshed);
        assert_eq!(source.calls(), 1);
        assert!(!refresher.snapshot().refresh_in_flight);
    }

    #[tokio::test]
    async fn failure_keeps_prior_data_and_clears_flag() {
        let source = CountingSource::new();
        let refresher = refresher(source.clone(), ManualClock::at(0));

        refresher.refresh(false).await;
        source.fail.store(true, Ordering::SeqCst);
        assert_eq!(refresher.refresh(true).await, RefreshOutcome::Failed);

        let aggregate = refresher.snapshot();
        assert_eq!(aggregate.data, Some(1));
        assert_eq!(aggregate.last_refreshed_at_ms, Some(0));
        assert!(!aggregate.refresh_in_flight);
    }

    #[tokio::test]
    async fn failure_does_not_start_throttle_window() {
        let source = CountingSource::new();
        source.fail.store(true, Ordering::SeqCst);
        let refresher = refresher(source.clone(), ManualClock::at(0));

        assert_eq!(refresher.refresh(false).await, RefreshOutcome::Failed);
        source.fail.store(false, Ordering::SeqCst);
        assert_eq!(refresher.refresh(false).await, RefreshOutcome::Refreshed);
    }

    #[tokio::test]
    async fn dropped_refresh_clears_in_flight_flag() {
        let gate = Arc::new(Notify::new());
        let source = CountingSource::gated(gate);
        let refresher = Arc::new(refresher(source.clone(), ManualClock::at(0)));

        let task = {
            let refresher = refresher.clone();
            tokio::spawn(async move { refresher.refresh(false).await })
        };
        while source.calls() == 0 {
            tokio::task::yield_now().await;
        }
        task.abort();
        let _ = task.await;

        assert!(!refresher.snapshot().refresh_in_flight);
    }

    #[tokio::test]
    async fn clear_during_fetch_drops_late_result() {
        let gate = Arc::new(Notify::new());
        let source = CountingSource::gated(gate.clone());
        let refresher = Arc::new(refresher(source.clone(), ManualClock::at(0)));

        let task = {
            let refresher = refresher.clone();
            tokio::spawn(async move { refresher.refresh(false).await })
        };
        while source.calls() == 0 {
            tokio::task::yield_now().await;
        }
        refresher.clear();
        gate.notify_one();

        assert_eq!(task.await.expect("join"), RefreshOutcome::Discarded);
        let aggregate = refresher.snapshot();
        assert_eq!(aggregate.data, None);
        assert!(!aggregate.refresh_in_flight);
    }

    #[tokio::test]
    async fn subscribers_observe_published_data() {
        let source = CountingSource::new();
        let refresher = refresher(source, ManualClock::at(0));
        let mut rx = refresher.subscribe();

        refresher.refresh(false).await;
        let aggregate = rx.borrow_and_update().clone();
        assert_eq!(aggregate.data, Some(1));
        assert!(!aggregate.refresh_in_flight);
    }
}
