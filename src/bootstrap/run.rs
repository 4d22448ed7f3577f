//! Headless replay of one upload, from placeholder to completed entity.
//!
//! ```text
//! placeholder ─→ backend creates entity ─→ list sync (reconcile + watch)
//!      ─→ pushes: metadata → processing → completed ─→ effects settle
//! ```

use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use pf_app::stores::{EntityListView, ListSyncReport};
use pf_app::{ClientSession, RefreshOutcome};
use pf_core::account::{AccountProfile, SubscriptionPlan};
use pf_core::{
    Artifact, EntityId, EntityStatus, PlaceholderSeed, SlotCorrelation, SlotKey, TrackedEntity,
};
use serde::Serialize;
use tracing::{info, info_span, Instrument};

use super::wiring::WiredAdapters;

const SETTLE_TIMEOUT: Duration = Duration::from_secs(5);
const SETTLE_POLL: Duration = Duration::from_millis(10);

/// Parameters of one replay.
#[derive(Debug, Clone)]
pub struct ReplayOptions {
    /// Id the backend assigns to the uploaded entity
    pub entity_id: String,
    pub owner_id: String,
    pub title: String,
    /// Processing progress steps pushed before completion
    pub progress_steps: Vec<u8>,
    /// End the job with `Failed` instead of `Completed`
    pub fail: bool,
}

impl Default for ReplayOptions {
    fn default() -> Self {
        Self {
            entity_id: "p42".to_string(),
            owner_id: "u1".to_string(),
            title: "Attention Is All You Need".to_string(),
            progress_steps: vec![40, 90],
            fail: false,
        }
    }
}

/// State dump printed at the end of a replay.
#[derive(Debug, Serialize)]
pub struct ReplayReport {
    pub placeholder_id: EntityId,
    pub sync: ListSyncReport,
    pub view: EntityListView,
    pub routes: Vec<String>,
    pub live_subscriptions: usize,
    pub open_feeds: usize,
    pub artifact_fetches: usize,
    pub account: Option<AccountProfile>,
    pub account_refresh: RefreshOutcome,
}

pub async fn run_replay(
    session: &ClientSession,
    adapters: &WiredAdapters,
    options: &ReplayOptions,
) -> anyhow::Result<ReplayReport> {
    let span = info_span!("replay", entity_id = %options.entity_id);

    async {
        let backend = &adapters.backend;
        let papers = session.papers();
        let entity_id = EntityId::from(options.entity_id.as_str());
        let client_ref = format!("upload-{}", options.entity_id);
        let now_ms = Utc::now().timestamp_millis();

        backend.set_account(AccountProfile {
            user_id: options.owner_id.clone(),
            email: format!("{}@example.com", options.owner_id),
            display_name: None,
            plan: SubscriptionPlan::Pro,
            credits_remaining: 120,
            translated_pages: 0,
            plan_renews_at: None,
        });
        let account_refresh = session.account().refresh(false).await;

        let placeholder_id = papers.create_placeholder(
            SlotKey::from(client_ref.as_str()),
            PlaceholderSeed {
                title: Some(options.title.clone()),
                file_name: Some(format!("{}.pdf", options.entity_id)),
                owner_id: Some(options.owner_id.clone()),
            },
            SlotCorrelation::ClientRef(client_ref.clone()),
        );

        backend.insert_entity(
            TrackedEntity::new(entity_id.clone(), EntityStatus::Pending, 1)
                .with_owner(options.owner_id.as_str())
                .with_client_ref(client_ref.as_str())
                .with_title(options.title.as_str())
                .created_at(now_ms),
        );
        backend.set_artifacts(
            &entity_id,
            (1..=3)
                .map(|position| Artifact {
                    id: format!("{}-ch{position}", options.entity_id),
                    entity_id: entity_id.clone(),
                    title: format!("Chapter {position}"),
                    position,
                })
                .collect(),
        );

        let sync = papers
            .sync_entity_list()
            .await
            .context("Entity list sync failed")?;

        let mut version = 1;
        let mut next_snapshot = |status: EntityStatus| {
            version += 1;
            TrackedEntity::new(entity_id.clone(), status, version)
                .with_owner(options.owner_id.as_str())
                .with_title(options.title.as_str())
                .created_at(now_ms)
        };

        backend.push(next_snapshot(EntityStatus::MetadataExtracted)).await;
        for progress in &options.progress_steps {
            backend
                .push(next_snapshot(EntityStatus::Processing).with_progress(*progress))
                .await;
        }
        let terminal = if options.fail {
            next_snapshot(EntityStatus::Failed).with_error("translation engine rejected the document")
        } else {
            next_snapshot(EntityStatus::Completed)
        };
        backend.push(terminal).await;

        wait_until(|| papers.registry().total_live() == 0)
            .await
            .context("Subscription was not released after the terminal status")?;
        if !options.fail && papers.redirect_on_completion() {
            wait_until(|| !adapters.navigator.routes().is_empty())
                .await
                .context("Navigation did not happen after completion")?;
        }
        if !options.fail {
            wait_until(|| papers.artifacts(&entity_id).is_some())
                .await
                .context("Artifacts were not refetched after completion")?;
        }

        info!("Replay settled");
        Ok(ReplayReport {
            placeholder_id,
            sync,
            view: (*papers.view()).clone(),
            routes: adapters.navigator.routes(),
            live_subscriptions: papers.registry().total_live(),
            open_feeds: backend.total_open_feeds(),
            artifact_fetches: backend.artifact_fetch_count(),
            account: session.account().profile(),
            account_refresh,
        })
    }
    .instrument(span)
    .await
}

async fn wait_until(mut done: impl FnMut() -> bool) -> anyhow::Result<()> {
    tokio::time::timeout(SETTLE_TIMEOUT, async {
        while !done() {
            tokio::time::sleep(SETTLE_POLL).await;
        }
    })
    .await
    .context("Timed out waiting for the store to settle")
}
