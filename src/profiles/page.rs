use axum::{debug_handler, extract::{Path, Query, State}, Json};
use serde::Deserialize;

use crate::{db::UserProfile, recover, store, AppResult, Backend, Backends, Limits, StoreKind};

#[derive(Deserialize)]
pub(crate) struct ListQuery {
    limit: Option<usize>,
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn profile(
    Path((store, reference)): Path<(StoreKind, String)>,
    State(backends): State<Backends>,
) -> Json<UserProfile> {
    Json(backends.get(store).resolver().resolve(&reference).await)
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn list_profiles(
    Path(store): Path<StoreKind>,
    Query(ListQuery { limit }): Query<ListQuery>,
    State(backends): State<Backends>,
    State(limits): State<Limits>,
) -> Json<Vec<UserProfile>> {
    let limit = limit.unwrap_or(limits.community_limit);
    Json(recover(
        first_profiles(backends.get(store), limit).await,
        &format!("listing {store} profiles"),
    ))
}

/// Profiles from the collection named by the first lookup strategy.
pub async fn first_profiles(backend: &Backend, limit: usize) -> AppResult<Vec<UserProfile>> {
    let Some(strategy) = backend.lookups.first() else {
        return Ok(Vec::new());
    };
    let docs = backend
        .store
        .find(strategy.collection(), &store::Query::new().limit(limit))
        .await?;
    Ok(docs
        .into_iter()
        .map(|doc| UserProfile::from_document(doc, None))
        .collect())
}
