use std::sync::Arc;

use pf_core::account::AccountProfile;
use pf_core::ports::{AggregateFetchPort, ClockPort, EntityFeedPort, EntityQueryPort, NavigationPort};
use pf_core::SyncConfig;
use tracing::info;

use crate::stores::{AccountDataStore, PaperProcessingDeps, PaperProcessingStore};

/// Helper for constructing the session with explicit dependency fields.
pub struct ClientSessionDeps {
    pub feed: Arc<dyn EntityFeedPort>,
    pub query: Arc<dyn EntityQueryPort>,
    pub account: Arc<dyn AggregateFetchPort<AccountProfile>>,
    pub navigation: Arc<dyn NavigationPort>,
    pub clock: Arc<dyn ClockPort>,
}

/// Both stores of one signed-in session.
///
/// There is no global instance; the UI layer owns the session and drops it
/// (or calls [`ClientSession::sign_out`]) when the user leaves.
pub struct ClientSession {
    papers: Arc<PaperProcessingStore>,
    account: Arc<AccountDataStore>,
}

impl ClientSession {
    pub fn from_deps(deps: ClientSessionDeps, config: SyncConfig) -> Self {
        let ClientSessionDeps {
            feed,
            query,
            account,
            navigation,
            clock,
        } = deps;

        let account = Arc::new(AccountDataStore::new(account, clock.clone(), &config));
        let papers = PaperProcessingStore::new(
            PaperProcessingDeps {
                feed,
                query,
                navigation,
                clock,
            },
            config,
        );

        Self { papers, account }
    }

    pub fn papers(&self) -> &Arc<PaperProcessingStore> {
        &self.papers
    }

    pub fn account(&self) -> &Arc<AccountDataStore> {
        &self.account
    }

    /// Close every subscription and clear both stores.
    pub fn sign_out(&self) {
        self.papers.reset();
        self.account.clear();
        info!("Session signed out");
    }
}
