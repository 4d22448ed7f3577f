//! Account data store
//! 账户数据仓库
//!
//! Account data changes slowly but is read on almost every render. All reads
//! that hit the backend go through [`ThrottledRefresher`].

use std::sync::{Arc, Weak};
use std::time::Duration;

use pf_core::account::AccountProfile;
use pf_core::ports::{AggregateFetchPort, ClockPort};
use pf_core::{RefreshableAggregate, SyncConfig};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::refresher::{RefreshOutcome, ThrottledRefresher};

pub struct AccountDataStore {
    refresher: ThrottledRefresher<AccountProfile>,
    poll_interval: Duration,
}

impl AccountDataStore {
    pub fn new(
        source: Arc<dyn AggregateFetchPort<AccountProfile>>,
        clock: Arc<dyn ClockPort>,
        config: &SyncConfig,
    ) -> Self {
        Self {
            refresher: ThrottledRefresher::new(
                "account",
                source,
                clock,
                config.min_refresh_interval(),
            ),
            poll_interval: config.account_poll_interval(),
        }
    }

    /// Refresh account data.
    ///
    /// Use `forced = true` right after an action known to change the account
    /// (purchase, finished translation); passive reads use `false`.
    pub async fn refresh(&self, forced: bool) -> RefreshOutcome {
        self.refresher.refresh(forced).await
    }

    pub fn profile(&self) -> Option<AccountProfile> {
        self.refresher.snapshot().data
    }

    pub fn aggregate(&self) -> RefreshableAggregate<AccountProfile> {
        self.refresher.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<RefreshableAggregate<AccountProfile>> {
        self.refresher.subscribe()
    }

    /// Sign-out.
    pub fn clear(&self) {
        self.refresher.clear();
        info!("Account data cleared");
    }

    /// Poll with non-forced refreshes every `poll_interval` until the store is
    /// dropped or the handle is aborted.
    pub fn spawn_periodic_refresh(self: &Arc<Self>) -> JoinHandle<()> {
        let store: Weak<Self> = Arc::downgrade(self);
        let period = self.poll_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let Some(store) = store.upgrade() else {
                    debug!("Account store dropped, stopping periodic refresh");
                    break;
                };
                store.refresh(false).await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pf_core::account::SubscriptionPlan;
    use pf_core::ports::BackendError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedClock;

    impl ClockPort for FixedClock {
        fn now_ms(&self) -> i64 {
            1_000
        }
    }

    #[derive(Default)]
    struct ProfileSource {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl AggregateFetchPort<AccountProfile> for ProfileSource {
        async fn fetch(&self) -> Result<AccountProfile, BackendError> {
            let calls = self.calls.fetch_add(1, Ordering::SeqCst) as u32 + 1;
            Ok(AccountProfile {
                user_id: "user-1".to_string(),
                email: "reader@example.com".to_string(),
                display_name: None,
                plan: SubscriptionPlan::Pro,
                credits_remaining: 100 - calls,
                translated_pages: calls,
                plan_renews_at: None,
            })
        }
    }

    fn store(source: Arc<ProfileSource>) -> AccountDataStore {
        AccountDataStore::new(source, Arc::new(FixedClock), &SyncConfig::default())
    }

    #[tokio::test]
    async fn refresh_populates_profile() {
        let source = Arc::new(ProfileSource::default());
        let store = store(source.clone());

        assert_eq!(store.refresh(false).await, RefreshOutcome::Refreshed);
        let profile = store.profile().expect("profile");
        assert_eq!(profile.credits_remaining, 99);
        assert_eq!(store.aggregate().last_refreshed_at_ms, Some(1_000));
    }

    #[tokio::test]
    async fn forced_refresh_bypasses_throttle() {
        let source = Arc::new(ProfileSource::default());
        let store = store(source.clone());

        store.refresh(false).await;
        assert_eq!(store.refresh(false).await, RefreshOutcome::Throttled);
        assert_eq!(store.refresh(true).await, RefreshOutcome::Refreshed);
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
        assert_eq!(store.profile().map(|p| p.translated_pages), Some(2));
    }

    #[tokio::test]
    async fn clear_forgets_profile() {
        let source = Arc::new(ProfileSource::default());
        let store = store(source);

        store.refresh(false).await;
        store.clear();
        assert!(store.profile().is_none());
        assert_eq!(store.aggregate().last_refreshed_at_ms, None);
        assert_eq!(store.refresh(false).await, RefreshOutcome::Refreshed);
    }

    #[tokio::test(start_paused = true)]
    async fn periodic_refresh_polls_until_dropped() {
        let source = Arc::new(ProfileSource::default());
        let store = Arc::new(store(source.clone()));

        let handle = store.spawn_periodic_refresh();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);

        drop(store);
        tokio::time::sleep(Duration::from_secs(60)).await;
        handle.await.expect("poller exits");
    }
}
