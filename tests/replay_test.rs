//! Headless replay tests
//! 无界面回放测试

use std::sync::Arc;

use paperflow_lib::bootstrap::{run_replay, wire_session, ReplayOptions};
use pf_app::RefreshOutcome;
use pf_core::{EntityStatus, SyncConfig};
use pf_infra::SystemClock;

#[tokio::test]
async fn completed_upload_settles_with_one_navigation() {
    let config = SyncConfig {
        redirect_on_completion: true,
        ..SyncConfig::default()
    };
    let (session, adapters) = wire_session(config, Arc::new(SystemClock));

    let report = run_replay(&session, &adapters, &ReplayOptions::default())
        .await
        .expect("replay");

    assert_eq!(report.placeholder_id.as_str(), "temp_1");
    assert_eq!(report.sync.reconciled.len(), 1);
    assert_eq!(report.routes, vec!["/items/p42".to_string()]);
    assert_eq!(report.live_subscriptions, 0);
    assert_eq!(report.open_feeds, 0);
    assert_eq!(report.artifact_fetches, 1);
    assert_eq!(report.view.entities.len(), 1);
    assert_eq!(report.view.entities[0].status, EntityStatus::Completed);
    assert_eq!(report.account_refresh, RefreshOutcome::Refreshed);

    let dump = serde_json::to_value(&report).expect("json");
    assert_eq!(dump["view"]["entities"][0]["status"], "completed");
}

#[tokio::test]
async fn failed_upload_releases_subscription_without_navigation() {
    let config = SyncConfig {
        redirect_on_completion: true,
        ..SyncConfig::default()
    };
    let (session, adapters) = wire_session(config, Arc::new(SystemClock));
    let options = ReplayOptions {
        entity_id: "p7".to_string(),
        fail: true,
        ..ReplayOptions::default()
    };

    let report = run_replay(&session, &adapters, &options).await.expect("replay");

    assert!(report.routes.is_empty());
    assert_eq!(report.live_subscriptions, 0);
    assert_eq!(report.artifact_fetches, 0);
    let entity = &report.view.entities[0];
    assert_eq!(entity.status, EntityStatus::Failed);
    assert!(entity.error_message.is_some());
}

#[tokio::test]
async fn redirect_disabled_skips_navigation() {
    let (session, adapters) = wire_session(SyncConfig::default(), Arc::new(SystemClock));

    let report = run_replay(&session, &adapters, &ReplayOptions::default())
        .await
        .expect("replay");

    assert!(report.routes.is_empty());
    assert_eq!(report.artifact_fetches, 1);
    assert_eq!(report.live_subscriptions, 0);
}
