//! End-to-end scenarios and invariants (§8): exercised through the public
//! API only, against [`MemoryStorage`] and a canned transport.

use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use pocket_engine::model::{ItemFilter, ItemType};
use pocket_engine::storage::MemoryStorage;
use pocket_engine::sync::{
    InMemoryConfigProvider, PullArgs, SyncConfig, SyncEngine, SyncTransport, TransportError,
    WireRequest, WireResponse,
};
use pocket_engine::version::{DATASTORE_VERSION, PROTOCOL_VERSION};
use pocket_engine::DataEngine;

struct CannedTransport {
    responses: StdMutex<Vec<Result<WireResponse, TransportError>>>,
}

impl CannedTransport {
    fn new(responses: Vec<WireResponse>) -> Self {
        Self {
            responses: StdMutex::new(responses.into_iter().map(Ok).rev().collect()),
        }
    }
}

#[async_trait]
impl SyncTransport for CannedTransport {
    async fn request(&self, _req: WireRequest) -> Result<WireResponse, TransportError> {
        self.responses
            .lock()
            .unwrap()
            .pop()
            .unwrap_or(Err(TransportError::Request("no canned response".into())))
    }
}

fn ok_response(body: serde_json::Value) -> WireResponse {
    WireResponse {
        status: 200,
        body: body.to_string(),
        datastore_version: Some(DATASTORE_VERSION),
        protocol_version: Some(PROTOCOL_VERSION),
    }
}

fn engine_with(responses: Vec<WireResponse>) -> SyncEngine<MemoryStorage> {
    let data_engine = Arc::new(DataEngine::new(Arc::new(MemoryStorage::new())));
    let transport = Arc::new(CannedTransport::new(responses));
    let config = InMemoryConfigProvider::new(SyncConfig {
        server_url: "https://sync.test".into(),
        api_key: "key".into(),
        server_profile_id: None,
        last_sync_time: 0,
    });
    SyncEngine::new(data_engine, transport, config)
}

#[tokio::test]
async fn invariant_1_deleted_item_is_never_returned_by_get_item() {
    let de = DataEngine::new(Arc::new(MemoryStorage::new()));
    let id = de
        .add_item(ItemType::Text, Default::default())
        .await
        .unwrap();
    de.delete_item(&id).await.unwrap();
    assert!(de.get_item(&id).await.unwrap().is_none());
}

#[tokio::test]
async fn invariant_2_same_tag_name_reused_increments_frequency_with_stable_id() {
    let de = DataEngine::new(Arc::new(MemoryStorage::new()));
    let first = de.get_or_create_tag("reading").await.unwrap();
    let second = de.get_or_create_tag("reading").await.unwrap();
    assert_eq!(first.tag.id, second.tag.id);
    assert!(second.tag.frequency > first.tag.frequency);
}

#[tokio::test]
async fn invariant_3_higher_frequency_scores_higher_at_equal_recency() {
    assert!(pocket_engine::frecency::score(5, 1000, 1000) > pocket_engine::frecency::score(2, 1000, 1000));
}

#[tokio::test]
async fn invariant_7_hard_delete_cascades_item_tag_links() {
    let de = DataEngine::new(Arc::new(MemoryStorage::new()));
    let lookup = de.get_or_create_tag("x").await.unwrap();
    let id = de
        .add_item(ItemType::Text, Default::default())
        .await
        .unwrap();
    de.tag_item(&id, &lookup.tag.id).await.unwrap();
    de.hard_delete_item(&id).await.unwrap();
    assert!(de.get_item_tags(&id).await.unwrap().is_empty());
}

#[tokio::test]
async fn invariant_8_include_deleted_false_never_returns_a_tombstone() {
    let de = DataEngine::new(Arc::new(MemoryStorage::new()));
    let id = de
        .add_item(ItemType::Text, Default::default())
        .await
        .unwrap();
    de.delete_item(&id).await.unwrap();
    let items = de.query_items(ItemFilter::default()).await.unwrap();
    assert!(items.iter().all(|i| i.deleted_at == 0));
}

#[tokio::test]
async fn s1_pull_new_server_item() {
    let body = serde_json::json!({
        "items": [{
            "id": "srv-1",
            "type": "url",
            "content": "https://a.test",
            "metadata": null,
            "tags": ["x"],
            "created_at": "1970-01-01T00:00:01Z",
            "updated_at": "1970-01-01T00:00:02Z",
        }]
    });
    let se = engine_with(vec![ok_response(body)]);
    let result = se.pull_from_server(PullArgs::default()).await.unwrap();
    assert_eq!(result.pulled, 1);
    assert_eq!(result.conflicts, 0);
}

#[tokio::test]
async fn s2_push_local_item_binds_sync_identity() {
    let data_engine = Arc::new(DataEngine::new(Arc::new(MemoryStorage::new())));
    let transport = Arc::new(CannedTransport::new(vec![ok_response(
        serde_json::json!({"id": "srv-push-1", "created": true}),
    )]));
    let config = InMemoryConfigProvider::new(SyncConfig {
        server_url: "https://sync.test".into(),
        api_key: "key".into(),
        server_profile_id: None,
        last_sync_time: 0,
    });

    let outcome = data_engine
        .save_item(ItemType::Text, Some("hello".into()), &["n".to_string()], None, None)
        .await
        .unwrap();

    let se = SyncEngine::new(data_engine.clone(), transport, config);
    let push = se.push_to_server().await.unwrap();
    assert_eq!(push.pushed, 1);
    assert_eq!(push.failed, 0);

    let item = data_engine.get_item(&outcome.id).await.unwrap().unwrap();
    assert_eq!(item.sync_id, "srv-push-1");
    assert_eq!(item.sync_source, "server");
    assert!(item.synced_at > 0);
}

#[tokio::test]
async fn s6_frecency_decay_matches_literal_example() {
    let now: i64 = 1_000_000;
    let score = pocket_engine::frecency::score(5, now, now);
    assert_eq!(score, 50.0);

    let seven_days_later = now + 7 * 86_400_000;
    let decayed = pocket_engine::frecency::score(5, now, seven_days_later);
    assert_eq!(decayed, 25.0);
}

#[tokio::test]
async fn dedup_is_idempotent_invariant_7() {
    let de = DataEngine::new(Arc::new(MemoryStorage::new()));
    let names: Vec<String> = vec![];
    de.save_item(ItemType::Url, Some("https://dup.test".into()), &names, None, None)
        .await
        .unwrap();
    de.save_item(ItemType::Url, Some("https://dup.test".into()), &names, None, None)
        .await
        .unwrap();

    let first = de.deduplicate_items().await.unwrap();
    assert_eq!(first.removed_content, 1);
    let second = de.deduplicate_items().await.unwrap();
    assert_eq!(second.removed_content, 0);
    assert_eq!(second.removed_tagsets, 0);
}
