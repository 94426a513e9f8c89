//! Integration tests against a real Redis server.
//!
//! These need Docker: `cargo test -p snip-store -- --ignored`.

use redis::AsyncCommands;
use snip_core::{BackendKind, KeyValueStore};
use snip_store::{BackendSelector, RedisStore, StorageConfig};
use snip_test_infra::redis::RedisServer;

async fn start() -> (RedisServer, RedisStore) {
    let server = RedisServer::start()
        .await
        .expect("Failed to start Redis container");
    let store = RedisStore::open(server.url()).expect("Failed to open Redis store");
    (server, store)
}

#[tokio::test]
#[ignore = "requires docker"]
async fn ping_get_set() {
    let (_server, store) = start().await;

    store.ping().await.unwrap();
    assert!(store.get("abc12345").await.unwrap().is_none());

    store.set("abc12345", "{\"x\":1}").await.unwrap();
    assert_eq!(
        store.get("abc12345").await.unwrap().as_deref(),
        Some("{\"x\":1}")
    );
}

#[tokio::test]
#[ignore = "requires docker"]
async fn set_if_absent_uses_nx() {
    let (_server, store) = start().await;

    assert!(store.set_if_absent("url:abc", "first").await.unwrap());
    assert!(!store.set_if_absent("url:abc", "second").await.unwrap());
    assert_eq!(store.get("url:abc").await.unwrap().as_deref(), Some("first"));
}

#[tokio::test]
#[ignore = "requires docker"]
async fn scan_keys_drains_cursor() {
    let (server, store) = start().await;
    let store = store.with_scan_count(7);

    let mut conn = server.connection().await.unwrap();
    for i in 0..250 {
        conn.set::<_, _, ()>(format!("{i:08x}"), "v").await.unwrap();
    }

    let mut keys = store.scan_keys().await.unwrap();
    keys.sort();
    assert_eq!(keys.len(), 250);
    assert_eq!(keys.first().map(String::as_str), Some("00000000"));
    assert_eq!(keys.last().map(String::as_str), Some("000000f9"));
}

#[tokio::test]
#[ignore = "requires docker"]
async fn selector_prefers_live_redis() {
    let server = RedisServer::start().await.unwrap();
    let config = StorageConfig::builder().redis_url(server.url()).build();
    let selector = BackendSelector::from_config(&config).unwrap();

    let handle = selector.acquire_store().await.unwrap();
    assert_eq!(handle.kind(), BackendKind::Redis);
}
