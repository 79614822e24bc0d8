use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::store::{StoreError, StoreResult};

use super::IdentityProvider;

pub const IDENTITY_URL: &str = "https://identitytoolkit.googleapis.com/v1";

#[derive(Serialize)]
struct LookupRequest<'a> {
    email: [&'a str; 1],
}

/// Firebase Auth admin account lookup.
#[derive(Clone)]
pub struct FirebaseAuth {
    http: reqwest::Client,
    lookup_url: String,
    access_token: Option<String>,
}

impl FirebaseAuth {
    pub fn new(base_url: &str, project_id: &str, access_token: Option<String>) -> Self {
        FirebaseAuth {
            http: reqwest::Client::new(),
            lookup_url: format!(
                "{}/projects/{project_id}/accounts:lookup",
                base_url.trim_end_matches('/')
            ),
            access_token,
        }
    }
}

#[async_trait]
impl IdentityProvider for FirebaseAuth {
    async fn lookup_by_email(&self, email: &str) -> StoreResult<Option<String>> {
        let mut request = self.http.post(&self.lookup_url).json(&LookupRequest { email: [email] });
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(StoreError::Status {
                status,
                url: self.lookup_url.clone(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let body: Value = response.json().await?;
        Ok(body
            .get("users")
            .and_then(Value::as_array)
            .and_then(|users| users.first())
            .and_then(|user| user.get("localId"))
            .and_then(Value::as_str)
            .map(str::to_owned))
    }
}
