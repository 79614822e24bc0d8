mod firebase;

use std::collections::HashMap;

use async_trait::async_trait;

use crate::store::StoreResult;

pub use firebase::{FirebaseAuth, IDENTITY_URL};

/// Maps a contact field to the identity provider's canonical user id.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn lookup_by_email(&self, email: &str) -> StoreResult<Option<String>>;
}

/// Fixed email → uid table.
#[derive(Debug, Default, Clone)]
pub struct StaticIdentities(pub HashMap<String, String>);

impl StaticIdentities {
    pub fn new<const N: usize>(pairs: [(&str, &str); N]) -> Self {
        StaticIdentities(
            pairs
                .into_iter()
                .map(|(email, uid)| (email.to_lowercase(), uid.to_owned()))
                .collect(),
        )
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentities {
    async fn lookup_by_email(&self, email: &str) -> StoreResult<Option<String>> {
        Ok(self.0.get(&email.to_lowercase()).cloned())
    }
}
