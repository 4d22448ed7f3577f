//! In-memory backend through the port traits
//! 通过端口 trait 使用进程内后端

use std::sync::Arc;

use pf_core::ports::{EntityFeedPort, EntityQueryPort};
use pf_core::{EntityId, EntityStatus, TrackedEntity};
use pf_infra::InMemoryBackend;

#[tokio::test]
async fn pushes_reach_subscribers_in_order() {
    let backend = Arc::new(InMemoryBackend::new(4));
    let feed_port: Arc<dyn EntityFeedPort> = backend.clone();
    let id = EntityId::from("p1");

    let mut feed = feed_port.subscribe(&id).await.expect("subscribe");
    for version in 2..=4 {
        backend
            .push(TrackedEntity::new("p1", EntityStatus::Processing, version))
            .await;
    }

    for expected in 2..=4 {
        let snapshot = feed.snapshots.recv().await.expect("snapshot");
        assert_eq!(snapshot.updated_at, expected);
    }
}

#[tokio::test]
async fn push_updates_the_pull_side() {
    let backend = Arc::new(InMemoryBackend::new(4));
    let query_port: Arc<dyn EntityQueryPort> = backend.clone();
    let id = EntityId::from("p1");

    backend.insert_entity(TrackedEntity::new("p1", EntityStatus::Pending, 1));
    backend
        .push(TrackedEntity::new("p1", EntityStatus::Completed, 2))
        .await;

    let entity = query_port.fetch_entity(&id).await.expect("fetch");
    assert_eq!(entity.status, EntityStatus::Completed);
    assert!(query_port
        .fetch_entity(&EntityId::from("missing"))
        .await
        .is_err());
}

#[tokio::test]
async fn teardown_closes_feed_for_future_pushes() {
    let backend = Arc::new(InMemoryBackend::new(4));
    let id = EntityId::from("p1");

    let feed = backend.subscribe(&id).await.expect("subscribe");
    assert_eq!(backend.open_feeds(&id), 1);
    feed.teardown.teardown();

    let delivered = backend
        .push(TrackedEntity::new("p1", EntityStatus::Failed, 3))
        .await;
    assert_eq!(delivered, 0);
    assert_eq!(backend.total_open_feeds(), 0);
}

#[tokio::test]
async fn dropped_feeds_end_the_receiver() {
    let backend = Arc::new(InMemoryBackend::new(4));
    let id = EntityId::from("p1");

    let mut feed = backend.subscribe(&id).await.expect("subscribe");
    assert_eq!(backend.drop_feeds(&id), 1);

    assert!(feed.snapshots.recv().await.is_none());
    assert_eq!(backend.open_feeds(&id), 0);
    assert_eq!(backend.drop_feeds(&id), 0);
}
