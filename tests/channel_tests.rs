use std::sync::Arc;

use serde_json::json;

use rostersync::channels::{
    find_channel, find_member_channel, load_conversation, load_messages, resolve_senders,
};
use rostersync::db::Message;
use rostersync::profiles::{primary_strategies, IdentityResolver};
use rostersync::store::{Document, DocumentStore, MemoryStore, SqliteStore, StoreCall};
use rostersync::Backend;

fn channel(id: &str, community: &str, users: &[&str]) -> Document {
    Document::new(id, json!({ "community": community, "users": users }))
}

fn message(id: &str, channel: &str, sender: &str, at: &str) -> Document {
    Document::new(id, json!({ "channel": channel, "sender": sender, "text": id, "createdAt": at }))
}

#[tokio::test]
async fn no_channel_without_both_participants() {
    let store = MemoryStore::new()
        .with("channels", channel("ch1", "c1", &["alice", "carol"]))
        .with("channels", channel("ch2", "c1", &["bob"]))
        .with("channels", channel("ch3", "c2", &["alice", "bob"]));

    assert_eq!(find_channel(&store, "c1", "alice", "bob").await.unwrap(), None);
}

#[tokio::test]
async fn finds_pair_regardless_of_participant_order() {
    let store = MemoryStore::new()
        .with("channels", channel("group", "c1", &["alice", "bob", "carol"]))
        .with("channels", channel("dm", "c1", &["bob", "alice"]));

    let found = find_channel(&store, "c1", "alice", "bob").await.unwrap().unwrap();
    assert_eq!(found.id, "dm");
    assert_eq!(found.community_id, "c1");
}

#[tokio::test]
async fn group_channel_holding_both_is_the_fallback() {
    let store = MemoryStore::new()
        .with("channels", channel("solo", "c1", &["alice"]))
        .with("channels", channel("group", "c1", &["alice", "carol", "bob"]));

    let found = find_channel(&store, "c1", "alice", "bob").await.unwrap().unwrap();
    assert_eq!(found.id, "group");
}

#[tokio::test]
async fn legacy_wrapped_ids_are_found() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteStore::new(format!("sqlite://{}", dir.path().join("legacy.db").display()), 1);
    for (key, fields) in [
        ("dm", json!({ "community": { "$oid": "c1" }, "users": [{ "$oid": "a" }, "b"] })),
        ("legacy", json!({ "community": { "$oid": "c2" }, "user": { "$oid": "b" } })),
    ] {
        store.update("channels", &Document::new(key, fields)).await.unwrap();
    }
    for (key, at) in [("m2", "2024-01-02T00:00:00Z"), ("m1", "2024-01-01T00:00:00Z")] {
        let doc = Document::new(key, json!({ "channel": { "$oid": "dm" }, "sender": "a", "createdAt": at }));
        store.update("messages", &doc).await.unwrap();
    }

    let dm = find_channel(&store, "c1", "a", "b").await.unwrap().unwrap();
    assert_eq!(dm.id, "dm");
    assert_eq!(dm.community_id, "c1");
    assert_eq!(find_member_channel(&store, "c1", "a").await.unwrap().unwrap().id, "dm");
    assert_eq!(find_member_channel(&store, "c2", "b").await.unwrap().unwrap().id, "legacy");

    let messages = load_messages(&store, "dm", 10).await.unwrap();
    assert_eq!(messages.iter().map(|m| m.id.as_str()).collect::<Vec<_>>(), vec!["m1", "m2"]);
}

#[tokio::test]
async fn second_participant_is_queried_only_on_a_miss() {
    let store = MemoryStore::new().with("channels", channel("dm", "c1", &["alice", "bob"]));
    find_channel(&store, "c1", "alice", "bob").await.unwrap().unwrap();
    let queries = store
        .calls()
        .into_iter()
        .filter(|c| matches!(c, StoreCall::Find { .. }))
        .count();
    assert_eq!(queries, 1);

    store.clear_calls();
    assert_eq!(find_channel(&store, "c1", "alice", "carol").await.unwrap(), None);
    assert_eq!(store.calls().len(), 2);
}

#[tokio::test]
async fn first_qualifying_channel_wins() {
    let store = MemoryStore::new()
        .with("channels", channel("first", "c1", &["alice", "bob"]))
        .with("channels", channel("second", "c1", &["bob", "alice"]));
    assert_eq!(find_channel(&store, "c1", "alice", "bob").await.unwrap().unwrap().id, "first");

    let store = MemoryStore::new()
        .with("channels", channel("second", "c1", &["bob", "alice"]))
        .with("channels", channel("first", "c1", &["alice", "bob"]));
    assert_eq!(find_channel(&store, "c1", "alice", "bob").await.unwrap().unwrap().id, "second");
}

#[tokio::test]
async fn member_channel_prefers_two_person_listing() {
    let store = MemoryStore::new()
        .with("channels", Document::new("legacy", json!({ "community": "c1", "user": "bob" })))
        .with("channels", channel("group", "c1", &["bob", "x", "y"]))
        .with("channels", channel("dm", "c1", &["op", "bob"]));
    assert_eq!(find_member_channel(&store, "c1", "bob").await.unwrap().unwrap().id, "dm");

    let store = MemoryStore::new()
        .with("channels", Document::new("legacy", json!({ "community": "c1", "user": "bob" })))
        .with("channels", channel("group", "c1", &["bob", "x", "y"]));
    let legacy = find_member_channel(&store, "c1", "bob").await.unwrap().unwrap();
    assert_eq!(legacy.id, "legacy");
    assert_eq!(legacy.participant_ids, vec!["bob"]);

    assert_eq!(find_member_channel(&store, "c9", "bob").await.unwrap(), None);
}

#[tokio::test]
async fn messages_are_bounded_and_oldest_first() {
    let store = MemoryStore::new()
        .with("messages", message("m3", "dm", "a", "2024-01-03T00:00:00Z"))
        .with("messages", message("m1", "dm", "a", "2024-01-01T00:00:00Z"))
        .with("messages", message("other", "elsewhere", "a", "2023-01-01T00:00:00Z"))
        .with("messages", message("m5", "dm", "b", "2024-01-05T00:00:00Z"))
        .with("messages", message("m2", "dm", "b", "2024-01-02T00:00:00Z"))
        .with("messages", message("m4", "dm", "a", "2024-01-04T00:00:00Z"));

    let page = load_messages(&store, "dm", 3).await.unwrap();
    assert_eq!(page.iter().map(|m| m.id.as_str()).collect::<Vec<_>>(), vec!["m1", "m2", "m3"]);

    let all = load_messages(&store, "dm", 100).await.unwrap();
    assert_eq!(all.len(), 5);
    assert!(all.windows(2).all(|w| w[0].created_at <= w[1].created_at));
}

#[tokio::test]
async fn senders_resolved_once_each() {
    let store = MemoryStore::new()
        .with("users", Document::new("a", json!({ "name": "Alice" })))
        .with("users", Document::new("b", json!({ "name": "Bob" })));
    let messages: Vec<Message> = [
        message("m1", "dm", "a", "2024-01-01T00:00:00Z"),
        message("m2", "dm", "b", "2024-01-02T00:00:00Z"),
        message("m3", "dm", "a", "2024-01-03T00:00:00Z"),
        message("m4", "dm", "a", "2024-01-04T00:00:00Z"),
    ]
    .into_iter()
    .map(Message::from_document)
    .collect();

    let strategies = primary_strategies();
    let resolver = IdentityResolver::new(&store, &strategies);
    let senders = resolve_senders(&resolver, &messages).await;

    assert_eq!(senders.len(), 2);
    assert_eq!(senders["a"].display_name.as_deref(), Some("Alice"));
    let lookups = store
        .calls()
        .into_iter()
        .filter(|c| matches!(c, StoreCall::Get { .. }))
        .count();
    assert_eq!(lookups, 2);
}

#[tokio::test]
async fn conversation_names_senders() {
    let store = Arc::new(
        MemoryStore::new()
            .with("channels", channel("dm", "c1", &["op", "bob"]))
            .with("users", Document::new("bob", json!({ "displayName": "Bob" })))
            .with("messages", message("m1", "dm", "bob", "2024-01-01T00:00:00Z"))
            .with("messages", message("m2", "dm", "op", "2024-01-02T00:00:00Z")),
    );
    let backend = Backend::new(store.clone(), primary_strategies());

    let conversation = load_conversation(&backend, "c1", Some("op"), "bob", 50).await.unwrap();
    assert_eq!(conversation.channel.unwrap().id, "dm");
    let names: Vec<&str> = conversation.messages.iter().map(|m| m.sender_name.as_str()).collect();
    assert_eq!(names, vec!["Bob", "Unknown Sender"]);

    let empty = load_conversation(&backend, "c1", Some("op"), "nobody", 50).await.unwrap();
    assert!(empty.channel.is_none());
    assert!(empty.messages.is_empty());
}
