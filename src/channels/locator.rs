use std::collections::{BTreeSet, HashMap, HashSet};

use futures_util::future::join_all;
use serde::Serialize;

use crate::{
    db::{id_forms, Channel, Message, UserProfile},
    profiles::IdentityResolver,
    store::{Direction, DocumentStore, Query},
    AppResult, Backend,
};

pub const CHANNELS: &str = "channels";
pub const MESSAGES: &str = "messages";

const UNKNOWN_SENDER: &str = "Unknown Sender";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageView {
    #[serde(flatten)]
    pub message: Message,
    pub sender_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Conversation {
    pub channel: Option<Channel>,
    pub messages: Vec<MessageView>,
}

fn is_exact_pair(channel: &Channel, a: &str, b: &str) -> bool {
    let wanted: HashSet<&str> = [a, b].into_iter().collect();
    let actual: HashSet<&str> = channel.participant_ids.iter().map(String::as_str).collect();
    actual == wanted
}

fn includes_both(channel: &Channel, a: &str, b: &str) -> bool {
    [a, b]
        .iter()
        .all(|p| channel.participant_ids.iter().any(|id| id.as_str() == *p))
}

/// The direct-message channel between `a` and `b` in a community. The store
/// can match only one participant per query, so channels holding `a` and then
/// channels holding `b` are fetched and filtered here. A channel of exactly
/// the pair is preferred; failing that, the first channel holding both. Ties
/// go to the first in fetch order.
pub async fn find_channel(
    store: &dyn DocumentStore,
    community_id: &str,
    a: &str,
    b: &str,
) -> AppResult<Option<Channel>> {
    let mut seen = HashSet::new();
    let mut candidates = Vec::new();
    for participant in [a, b] {
        let batch = store
            .find(
                CHANNELS,
                &Query::new()
                    .eq_any("community", id_forms(community_id))
                    .contains_any("users", id_forms(participant)),
            )
            .await?;
        candidates.extend(
            batch
                .into_iter()
                .filter(|doc| seen.insert(doc.key.clone()))
                .map(Channel::from_document),
        );

        if let Some(i) = candidates.iter().position(|c| is_exact_pair(c, a, b)) {
            return Ok(Some(candidates.swap_remove(i)));
        }
    }

    Ok(candidates.into_iter().find(|c| includes_both(c, a, b)))
}

/// A member's one-on-one channel when the other side is not known: first a
/// two-person channel listing the member, then a legacy channel naming the
/// member in its `user` field.
pub async fn find_member_channel(
    store: &dyn DocumentStore,
    community_id: &str,
    member: &str,
) -> AppResult<Option<Channel>> {
    let listed = store
        .find(
            CHANNELS,
            &Query::new()
                .eq_any("community", id_forms(community_id))
                .contains_any("users", id_forms(member)),
        )
        .await?
        .into_iter()
        .map(Channel::from_document)
        .find(|channel| channel.participant_ids.len() == 2);
    if listed.is_some() {
        return Ok(listed);
    }

    Ok(store
        .find(
            CHANNELS,
            &Query::new()
                .eq_any("community", id_forms(community_id))
                .eq_any("user", id_forms(member))
                .limit(1),
        )
        .await?
        .into_iter()
        .next()
        .map(Channel::from_document))
}

/// Oldest first, at most `limit`.
pub async fn load_messages(
    store: &dyn DocumentStore,
    channel_id: &str,
    limit: usize,
) -> AppResult<Vec<Message>> {
    let query = Query::new()
        .eq_any("channel", id_forms(channel_id))
        .order_by("createdAt", Direction::Ascending)
        .limit(limit);

    let mut messages: Vec<Message> = store
        .find(MESSAGES, &query)
        .await?
        .into_iter()
        .map(Message::from_document)
        .collect();
    messages.sort_by_key(|m| m.created_at);
    messages.truncate(limit);
    Ok(messages)
}

/// Resolves each distinct sender once.
pub async fn resolve_senders(
    resolver: &IdentityResolver<'_>,
    messages: &[Message],
) -> HashMap<String, UserProfile> {
    let senders: BTreeSet<&str> = messages
        .iter()
        .map(|m| m.sender_ref.as_str())
        .filter(|s| !s.is_empty())
        .collect();

    join_all(
        senders
            .into_iter()
            .map(|sender| async move { (sender.to_owned(), resolver.resolve(sender).await) }),
    )
    .await
    .into_iter()
    .collect()
}

pub async fn load_conversation(
    backend: &Backend,
    community_id: &str,
    a: Option<&str>,
    b: &str,
    limit: usize,
) -> AppResult<Conversation> {
    let store = backend.store.as_ref();
    let channel = match a {
        Some(a) => find_channel(store, community_id, a, b).await?,
        None => find_member_channel(store, community_id, b).await?,
    };
    let Some(channel) = channel else {
        return Ok(Conversation::default());
    };

    let messages = load_messages(store, &channel.id, limit).await?;
    let senders = resolve_senders(&backend.resolver(), &messages).await;

    let messages = messages
        .into_iter()
        .map(|message| {
            let sender_name = senders
                .get(&message.sender_ref)
                .filter(|profile| profile.is_found())
                .map(|profile| profile.label().to_owned())
                .unwrap_or_else(|| UNKNOWN_SENDER.to_owned());
            MessageView { message, sender_name }
        })
        .collect();

    Ok(Conversation {
        channel: Some(channel),
        messages,
    })
}
