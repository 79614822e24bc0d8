use futures_util::future::join_all;
use serde::Deserialize;

use crate::{
    db::{Community, CommunitySummary, CommunityWithMembers},
    store::{DocumentStore, Query},
    AppResult, Backend,
};

pub const COMMUNITIES: &str = "communities";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommunityFilter {
    pub id: Option<String>,
    pub name: Option<String>,
    pub limit: Option<usize>,
}

impl CommunityFilter {
    pub fn by_id(id: &str) -> Self {
        CommunityFilter {
            id: Some(id.to_owned()),
            ..Default::default()
        }
    }

    pub fn by_name(name: &str) -> Self {
        CommunityFilter {
            name: Some(name.to_owned()),
            ..Default::default()
        }
    }
}

pub async fn find_communities(
    store: &dyn DocumentStore,
    filter: &CommunityFilter,
    default_limit: usize,
) -> AppResult<Vec<Community>> {
    if let Some(id) = &filter.id {
        return Ok(store
            .get(COMMUNITIES, id)
            .await?
            .map(Community::from_document)
            .into_iter()
            .collect());
    }

    let mut query = Query::new().limit(filter.limit.unwrap_or(default_limit));
    if let Some(name) = &filter.name {
        query = query.eq("name", name.as_str());
    }
    Ok(store
        .find(COMMUNITIES, &query)
        .await?
        .into_iter()
        .map(Community::from_document)
        .collect())
}

pub async fn list_communities(
    backend: &Backend,
    filter: &CommunityFilter,
    default_limit: usize,
) -> AppResult<Vec<CommunitySummary>> {
    Ok(find_communities(backend.store.as_ref(), filter, default_limit)
        .await?
        .into_iter()
        .map(CommunitySummary::from)
        .collect())
}

/// Resolves every member reference of every selected community at once.
/// Members keep stored order; blank references are dropped.
pub async fn load_communities_with_members(
    backend: &Backend,
    filter: &CommunityFilter,
    default_limit: usize,
) -> AppResult<Vec<CommunityWithMembers>> {
    let communities = find_communities(backend.store.as_ref(), filter, default_limit).await?;
    let resolver = backend.resolver();
    let resolver = &resolver;

    Ok(join_all(communities.into_iter().map(|community| async move {
        let members = join_all(
            community
                .member_refs
                .iter()
                .map(|reference| resolver.resolve_member(reference)),
        )
        .await
        .into_iter()
        .flatten()
        .collect();

        CommunityWithMembers { community, members }
    }))
    .await)
}
