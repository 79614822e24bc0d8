use axum::{debug_handler, extract::{Query, State}, Json};
use serde::{Deserialize, Serialize};

use crate::{
    communities::{load_communities_with_members, CommunityFilter},
    db::CommunityWithMembers,
    recover, AppState, Backends, Limits,
};

#[derive(Deserialize)]
pub(crate) struct CompareQuery {
    name: Option<String>,
}

#[derive(Debug, Default, Serialize)]
pub struct Comparison {
    pub primary: Vec<CommunityWithMembers>,
    pub secondary: Vec<CommunityWithMembers>,
}

/// Both stores' view of the matching communities. A failing side comes back
/// empty without hiding the other.
pub async fn compare_communities(backends: &Backends, filter: &CommunityFilter, limits: Limits) -> Comparison {
    let (primary, secondary) = tokio::join!(
        load_communities_with_members(&backends.primary, filter, limits.community_limit),
        load_communities_with_members(&backends.secondary, filter, limits.community_limit),
    );

    Comparison {
        primary: recover(primary, "loading primary communities"),
        secondary: recover(secondary, "loading secondary communities"),
    }
}

#[debug_handler(state = AppState)]
pub(crate) async fn compare(
    Query(CompareQuery { name }): Query<CompareQuery>,
    State(backends): State<Backends>,
    State(limits): State<Limits>,
) -> Json<Comparison> {
    let filter = CommunityFilter {
        name,
        ..Default::default()
    };
    Json(compare_communities(&backends, &filter, limits).await)
}
