mod aggregate;

use axum::{debug_handler, extract::{Path, Query, State}, routing::get, Json, Router};
use serde::Deserialize;

use crate::{
    channels::{self, Conversation},
    db::{CommunitySummary, CommunityWithMembers},
    recover, AppState, Backends, Limits, StoreKind,
};

pub use aggregate::{
    find_communities, list_communities, load_communities_with_members, CommunityFilter, COMMUNITIES,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list))
        .route("/{id}", get(show))
        .route("/{id}/messages", get(messages))
}

#[debug_handler(state = AppState)]
async fn list(
    Path(store): Path<StoreKind>,
    Query(filter): Query<CommunityFilter>,
    State(backends): State<Backends>,
    State(limits): State<Limits>,
) -> Json<Vec<CommunitySummary>> {
    Json(recover(
        list_communities(backends.get(store), &filter, limits.community_limit).await,
        &format!("listing {store} communities"),
    ))
}

#[debug_handler(state = AppState)]
async fn show(
    Path((store, id)): Path<(StoreKind, String)>,
    State(backends): State<Backends>,
    State(limits): State<Limits>,
) -> Json<Option<CommunityWithMembers>> {
    let loaded = recover(
        load_communities_with_members(
            backends.get(store),
            &CommunityFilter::by_id(&id),
            limits.community_limit,
        )
        .await,
        &format!("loading {store} community {id}"),
    );
    Json(loaded.into_iter().next())
}

#[derive(Deserialize)]
struct ConversationQuery {
    a: Option<String>,
    b: String,
}

#[debug_handler(state = AppState)]
async fn messages(
    Path((store, id)): Path<(StoreKind, String)>,
    Query(ConversationQuery { a, b }): Query<ConversationQuery>,
    State(backends): State<Backends>,
    State(limits): State<Limits>,
) -> Json<Conversation> {
    Json(recover(
        channels::load_conversation(
            backends.get(store),
            &id,
            a.as_deref(),
            &b,
            limits.message_page_size,
        )
        .await,
        &format!("loading {store} messages in {id}"),
    ))
}
