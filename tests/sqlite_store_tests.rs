use serde_json::json;

use rostersync::store::{Direction, Document, DocumentStore, Query, SqliteStore};

fn store(dir: &tempfile::TempDir) -> SqliteStore {
    SqliteStore::new(format!("sqlite://{}", dir.path().join("legacy.db").display()), 1)
}

#[tokio::test]
async fn update_then_get() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(&dir);

    assert_eq!(store.get("users", "u1").await.unwrap(), None);

    let doc = Document::new("u1", json!({ "email": "ada@x.io", "tags": ["a"] }));
    store.update("users", &doc).await.unwrap();
    assert_eq!(store.get("users", "u1").await.unwrap(), Some(doc));

    let patch = Document::new("u1", json!({ "email": "ada@y.io", "meta": { "vip": true } }));
    store.update("users", &patch).await.unwrap();
    assert_eq!(
        store.get("users", "u1").await.unwrap(),
        Some(Document::new("u1", json!({ "email": "ada@y.io", "tags": ["a"], "meta": { "vip": true } })))
    );
    assert_eq!(store.get("Users", "u1").await.unwrap(), None);
}

#[tokio::test]
async fn queries_filter_order_and_limit() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(&dir);
    for (key, community, users, at) in [
        ("ch1", "c1", json!(["a", "b"]), 3),
        ("ch2", "c1", json!(["a", "c"]), 1),
        ("ch3", "c2", json!(["a", "b"]), 2),
        ("ch4", "c1", json!(["b"]), 4),
    ] {
        let doc = Document::new(key, json!({ "community": community, "users": users, "at": at }));
        store.update("channels", &doc).await.unwrap();
    }

    let keys = |docs: Vec<Document>| docs.into_iter().map(|d| d.key).collect::<Vec<_>>();

    let found = store
        .find("channels", &Query::new().eq("community", "c1").contains("users", "a"))
        .await
        .unwrap();
    assert_eq!(keys(found), vec!["ch1", "ch2"]);

    let ordered = store
        .find("channels", &Query::new().order_by("at", Direction::Descending).limit(2))
        .await
        .unwrap();
    assert_eq!(keys(ordered), vec!["ch4", "ch1"]);

    let numeric = store.find("channels", &Query::new().eq("at", 2)).await.unwrap();
    assert_eq!(keys(numeric), vec!["ch3"]);

    let none = store
        .find("channels", &Query::new().contains("community", "c1"))
        .await
        .unwrap();
    assert!(none.is_empty());
}

#[tokio::test]
async fn any_of_filters_match_wrapped_ids() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(&dir);
    for (key, community, users) in [
        ("plain", json!("c1"), json!(["a", "b"])),
        ("wrapped", json!({ "$oid": "c1" }), json!([{ "$oid": "a" }, "b"])),
        ("other", json!("c2"), json!(["a"])),
    ] {
        let doc = Document::new(key, json!({ "community": community, "users": users }));
        store.update("channels", &doc).await.unwrap();
    }

    let keys = |docs: Vec<Document>| docs.into_iter().map(|d| d.key).collect::<Vec<_>>();
    let either = |id: &str| vec![json!(id), json!({ "$oid": id })];

    let in_c1 = store
        .find("channels", &Query::new().eq_any("community", either("c1")))
        .await
        .unwrap();
    assert_eq!(keys(in_c1), vec!["plain", "wrapped"]);

    let with_a = store
        .find(
            "channels",
            &Query::new().eq_any("community", either("c1")).contains_any("users", either("a")),
        )
        .await
        .unwrap();
    assert_eq!(keys(with_a), vec!["plain", "wrapped"]);

    let scalar = store
        .find("channels", &Query::new().contains_any("community", either("c2")))
        .await
        .unwrap();
    assert!(scalar.is_empty());
}

#[tokio::test]
async fn pool_is_opened_once() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(&dir);

    let first = store.pool().await.unwrap() as *const _;
    let second = store.pool().await.unwrap() as *const _;
    assert_eq!(first, second);
}
