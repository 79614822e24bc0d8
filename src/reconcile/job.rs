use serde::Serialize;
use serde_json::{json, Value};
use tracing::Instrument;
use uuid::Uuid;

use crate::{
    communities::COMMUNITIES,
    db::{Community, MemberEntry, UserProfile, MEMBER_LIST},
    identity::IdentityProvider,
    store::{Document, DocumentStore, Query},
    AppResult,
};

const PROFILES: &str = "users";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
    pub success: bool,
    pub resolved_count: usize,
    pub skipped_count: usize,
    pub message: String,
    pub run_id: Uuid,
}

struct Outcome {
    community: String,
    resolved: usize,
    skipped: usize,
}

/// Rebuilds the primary copy of a community's member list from the
/// secondary copy, swapping legacy ids for canonical ones. Members that
/// cannot be resolved end to end are dropped from the rebuilt list.
///
/// Nothing is written until every member has been looked at; the rebuilt
/// list then replaces the primary member list in one write that touches no
/// other field.
pub async fn reconcile(
    secondary: &dyn DocumentStore,
    primary: &dyn DocumentStore,
    identities: &dyn IdentityProvider,
    community_id: &str,
) -> ReconcileReport {
    let run_id = Uuid::now_v7();
    let span = tracing::info_span!("reconcile", %run_id, community_id);

    match run(secondary, primary, identities, community_id)
        .instrument(span)
        .await
    {
        Ok(Outcome { community, resolved, skipped }) => {
            tracing::info!(%run_id, resolved, skipped, "reconciled {community}");
            ReconcileReport {
                success: true,
                resolved_count: resolved,
                skipped_count: skipped,
                message: format!(
                    "synced {resolved} of {} members of {community}",
                    resolved + skipped
                ),
                run_id,
            }
        }
        Err(e) => {
            tracing::error!(%run_id, "reconcile of {community_id} failed: {:#}", e.0);
            ReconcileReport {
                success: false,
                resolved_count: 0,
                skipped_count: 0,
                message: e.0.to_string(),
                run_id,
            }
        }
    }
}

async fn run(
    secondary: &dyn DocumentStore,
    primary: &dyn DocumentStore,
    identities: &dyn IdentityProvider,
    community_id: &str,
) -> AppResult<Outcome> {
    let Some(doc) = secondary.get(COMMUNITIES, community_id).await? else {
        return Err(format!("community {community_id} not found in secondary store").into());
    };
    let community = Community::from_document(doc);
    if community.name.is_empty() {
        return Err(format!("community {community_id} has no name").into());
    }

    let total = community.member_entries.len();
    let mut rebuilt = Vec::with_capacity(total);
    for entry in community.member_entries {
        if let Some(entry) = canonical_entry(secondary, identities, entry).await {
            rebuilt.push(entry);
        }
    }

    let Some(target) = primary
        .find(COMMUNITIES, &Query::new().eq("name", community.name.as_str()).limit(1))
        .await?
        .into_iter()
        .next()
    else {
        return Err(format!("community {} not found in primary store", community.name).into());
    };

    let members = Document::new(
        target.key,
        json!({ MEMBER_LIST: rebuilt.iter().map(MemberEntry::to_value).collect::<Vec<Value>>() }),
    );
    primary.update(COMMUNITIES, &members).await?;

    Ok(Outcome {
        community: community.name,
        resolved: rebuilt.len(),
        skipped: total - rebuilt.len(),
    })
}

async fn canonical_entry(
    secondary: &dyn DocumentStore,
    identities: &dyn IdentityProvider,
    mut entry: MemberEntry,
) -> Option<MemberEntry> {
    let legacy_id = entry.user_id.clone();
    if legacy_id.is_empty() {
        tracing::warn!("skipping member entry without userId");
        return None;
    }

    let profile = match secondary.get(PROFILES, &legacy_id).await {
        Ok(Some(doc)) => UserProfile::from_document(doc, None),
        Ok(None) => {
            tracing::warn!(%legacy_id, "skipping member: no legacy profile");
            return None;
        }
        Err(e) => {
            tracing::warn!(%legacy_id, "skipping member: {e}");
            return None;
        }
    };
    let Some(email) = profile.email else {
        tracing::warn!(%legacy_id, "skipping member: profile has no email");
        return None;
    };

    match identities.lookup_by_email(&email).await {
        Ok(Some(uid)) => {
            tracing::debug!(%legacy_id, %uid, "member resolved");
            entry.user_id = uid;
            Some(entry)
        }
        Ok(None) => {
            tracing::warn!(%legacy_id, %email, "skipping member: no account for email");
            None
        }
        Err(e) => {
            tracing::warn!(%legacy_id, %email, "skipping member: {e}");
            None
        }
    }
}
