mod job;

use std::sync::Arc;

use axum::{debug_handler, extract::{Path, State}, Json};

use crate::{identity::IdentityProvider, AppState, Backends};

pub use job::{reconcile, ReconcileReport};

#[debug_handler(state = AppState)]
pub(crate) async fn reconcile_handler(
    Path(community_id): Path<String>,
    State(backends): State<Backends>,
    State(identities): State<Arc<dyn IdentityProvider>>,
) -> Json<ReconcileReport> {
    Json(
        reconcile(
            backends.secondary.store.as_ref(),
            backends.primary.store.as_ref(),
            identities.as_ref(),
            &community_id,
        )
        .await,
    )
}
