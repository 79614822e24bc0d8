pub mod appresult;
pub mod channels;
pub mod communities;
pub mod compare;
pub mod config;
pub mod db;
pub mod identity;
pub mod profiles;
pub mod reconcile;
pub mod res;
pub mod store;

use std::{fmt, ops::Deref, sync::Arc};

use axum::{extract::FromRef, response::{Html, IntoResponse}, routing::{get, post}, Router};
use serde::Deserialize;
use serde_json::Value;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub use appresult::{recover, AppError, AppResult};

use config::Config;
use identity::{FirebaseAuth, IdentityProvider};
use profiles::{IdentityResolver, LookupStrategy};
use store::{DocumentStore, FirestoreStore, SqliteStore};

/// A store together with the identity fallback chain used against it.
#[derive(Clone)]
pub struct Backend {
    pub store: Arc<dyn DocumentStore>,
    pub lookups: Arc<[LookupStrategy]>,
}

impl Backend {
    pub fn new(store: Arc<dyn DocumentStore>, lookups: Vec<LookupStrategy>) -> Self {
        Backend {
            store,
            lookups: lookups.into(),
        }
    }

    pub fn resolver(&self) -> IdentityResolver<'_> {
        IdentityResolver::new(self.store.as_ref(), &self.lookups)
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StoreKind {
    Primary,
    Secondary,
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Clone)]
pub struct Backends {
    pub primary: Backend,
    pub secondary: Backend,
}

impl Backends {
    pub fn get(&self, kind: StoreKind) -> &Backend {
        match kind {
            StoreKind::Primary => &self.primary,
            StoreKind::Secondary => &self.secondary,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Limits {
    pub message_page_size: usize,
    pub community_limit: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            message_page_size: 100,
            community_limit: 50,
        }
    }
}

#[derive(Clone, FromRef)]
pub struct AppState {
    pub backends: Backends,
    pub identities: Arc<dyn IdentityProvider>,
    pub limits: Limits,
}

impl AppState {
    pub fn from_config(config: &Config) -> Self {
        let firebase = &config.firebase;
        let primary = FirestoreStore::new(
            &firebase.firestore_url,
            &firebase.project_id,
            firebase.access_token.clone(),
        );
        let secondary = SqliteStore::new(&config.database_url, config.database_max_connections);
        let identities = FirebaseAuth::new(
            &firebase.identity_url,
            &firebase.project_id,
            firebase.access_token.clone(),
        );

        AppState {
            backends: Backends {
                primary: Backend::new(Arc::new(primary), config.primary_lookups.clone()),
                secondary: Backend::new(Arc::new(secondary), config.secondary_lookups.clone()),
            },
            identities: Arc::new(identities),
            limits: config.limits,
        }
    }
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(res::index))
        .route("/compare", get(compare::compare))
        .route("/reconcile/{id}", post(reconcile::reconcile_handler))
        .nest(
            "/{store}",
            Router::new()
                .nest("/c", communities::router())
                .nest("/p", profiles::router()),
        )
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

pub trait GetField {
    fn get_str_field(&self, field: &str) -> AppResult<String>;
    fn get_obj_field(&self, field: &str) -> AppResult<&Value>;
    fn get_opt_str_field(&self, field: &str) -> Option<String>;
}

impl GetField for serde_json::Value {
    fn get_str_field(&self, field: &str) -> AppResult<String> {
        Ok(
            self.get(field)
            .ok_or(format!("expected {field} in {self}"))?
            .as_str()
            .ok_or(format!("expected {field} in {self} to be string"))?
            .to_owned()
        )
    }

    fn get_obj_field(&self, field: &str) -> AppResult<&Value> {
        self.get(field)
        .ok_or(format!("expected {field} in {self}").into())
    }

    fn get_opt_str_field(&self, field: &str) -> Option<String> {
        self.get(field)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
    }
}

pub struct Markdown<T>(pub T);

impl<T> IntoResponse for Markdown<T>
where
    T: Deref<Target = str>
{
    fn into_response(self) -> axum::response::Response {
        use pulldown_cmark::{Parser, Options};

        let parser = Parser::new_ext(&self.0, Options::ENABLE_TABLES);

        let mut html_output = String::new();
        pulldown_cmark::html::push_html(&mut html_output, parser);
        Html(html_output).into_response()
    }
}
