use std::{fmt, str::FromStr};

use crate::{
    db::{id_forms, UserProfile},
    store::{Document, DocumentStore, Query, StoreResult},
};

/// One step of the identity fallback chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupStrategy {
    Key { collection: String },
    Field { collection: String, field: String },
}

impl LookupStrategy {
    pub fn key(collection: &str) -> Self {
        LookupStrategy::Key {
            collection: collection.to_owned(),
        }
    }

    pub fn field(collection: &str, field: &str) -> Self {
        LookupStrategy::Field {
            collection: collection.to_owned(),
            field: field.to_owned(),
        }
    }

    pub fn collection(&self) -> &str {
        match self {
            LookupStrategy::Key { collection } | LookupStrategy::Field { collection, .. } => collection,
        }
    }

    async fn lookup(&self, store: &dyn DocumentStore, reference: &str) -> StoreResult<Option<Document>> {
        match self {
            LookupStrategy::Key { collection } => store.get(collection, reference).await,
            LookupStrategy::Field { collection, field } => Ok(store
                .find(collection, &Query::new().eq_any(field, id_forms(reference)).limit(1))
                .await?
                .into_iter()
                .next()),
        }
    }
}

impl fmt::Display for LookupStrategy {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LookupStrategy::Key { collection } => write!(f, "key:{collection}"),
            LookupStrategy::Field { collection, field } => write!(f, "field:{collection}.{field}"),
        }
    }
}

impl FromStr for LookupStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.split_once(':') {
            Some(("key", collection)) if !collection.is_empty() => Ok(LookupStrategy::key(collection)),
            Some(("field", path)) => match path.split_once('.') {
                Some((collection, field)) if !collection.is_empty() && !field.is_empty() => {
                    Ok(LookupStrategy::field(collection, field))
                }
                _ => Err(format!("expected field:<collection>.<field>, got {s}")),
            },
            _ => Err(format!("unknown lookup strategy {s}")),
        }
    }
}

pub fn parse_strategies(s: &str) -> Result<Vec<LookupStrategy>, String> {
    s.split(',')
        .filter(|part| !part.trim().is_empty())
        .map(str::parse)
        .collect()
}

/// Canonical ids, the two differently-cased profile collections, then the
/// legacy-id field and the generic `id` field in each.
pub fn primary_strategies() -> Vec<LookupStrategy> {
    vec![
        LookupStrategy::key("users"),
        LookupStrategy::key("Users"),
        LookupStrategy::field("users", "originalMongoId"),
        LookupStrategy::field("Users", "originalMongoId"),
        LookupStrategy::field("users", "id"),
        LookupStrategy::field("Users", "id"),
    ]
}

pub fn secondary_strategies() -> Vec<LookupStrategy> {
    vec![
        LookupStrategy::key("users"),
        LookupStrategy::field("users", "id"),
        LookupStrategy::field("Users", "id"),
    ]
}

pub struct IdentityResolver<'a> {
    store: &'a dyn DocumentStore,
    strategies: &'a [LookupStrategy],
}

impl<'a> IdentityResolver<'a> {
    pub fn new(store: &'a dyn DocumentStore, strategies: &'a [LookupStrategy]) -> Self {
        IdentityResolver { store, strategies }
    }

    /// Walks the chain until a strategy yields a record. Faults inside a step
    /// count as a miss for that step; exhausting the chain gives a not-found
    /// placeholder.
    pub async fn resolve(&self, reference: &str) -> UserProfile {
        for strategy in self.strategies {
            match strategy.lookup(self.store, reference).await {
                Ok(Some(doc)) => {
                    tracing::debug!(reference, %strategy, "resolved");
                    return UserProfile::from_document(doc, Some(strategy.to_string()));
                }
                Ok(None) => {}
                Err(e) => tracing::warn!(reference, %strategy, "lookup failed: {e}"),
            }
        }

        tracing::warn!(reference, "user not found");
        UserProfile::not_found(reference)
    }

    /// Like [`resolve`](Self::resolve) but a blank reference is `None`.
    pub async fn resolve_member(&self, reference: &str) -> Option<UserProfile> {
        if reference.trim().is_empty() {
            return None;
        }
        Some(self.resolve(reference).await)
    }
}
