mod page;
mod resolver;

use axum::{routing::get, Router};

use crate::AppState;

pub use page::first_profiles;
pub use resolver::{
    parse_strategies, primary_strategies, secondary_strategies, IdentityResolver, LookupStrategy,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(page::list_profiles))
        .route("/{reference}", get(page::profile))
}
