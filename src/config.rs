use std::{path::Path, str::FromStr};

use serde_json::Value;

use crate::{
    identity::IDENTITY_URL,
    profiles::{parse_strategies, primary_strategies, secondary_strategies, LookupStrategy},
    store::FIRESTORE_URL,
    AppResult, GetField, Limits,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirebaseConfig {
    pub project_id: String,
    pub access_token: Option<String>,
    pub firestore_url: String,
    pub identity_url: String,
}

impl FirebaseConfig {
    pub fn from_json(json: Value) -> AppResult<FirebaseConfig> {
        let json = json.get_obj_field("firebase")?;
        Ok(FirebaseConfig {
            project_id: json.get_str_field("project_id")?,
            access_token: json.get_opt_str_field("access_token"),
            firestore_url: json
                .get_opt_str_field("firestore_url")
                .unwrap_or_else(|| FIRESTORE_URL.to_owned()),
            identity_url: json
                .get_opt_str_field("identity_url")
                .unwrap_or_else(|| IDENTITY_URL.to_owned()),
        })
    }

    pub fn from_file(path: impl AsRef<Path>) -> AppResult<FirebaseConfig> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("reading {}: {e}", path.display()))?;
        Self::from_json(serde_json::from_str(&text)?)
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub database_url: String,
    pub database_max_connections: u32,
    pub firebase: FirebaseConfig,
    pub primary_lookups: Vec<LookupStrategy>,
    pub secondary_lookups: Vec<LookupStrategy>,
    pub limits: Limits,
}

impl Config {
    /// Reads the process environment, after loading `.env` when present.
    pub fn from_env() -> AppResult<Config> {
        let _ = dotenv::dotenv();
        Self::from_lookup(|key| dotenv::var(key).ok())
    }

    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> AppResult<Config> {
        let database_url = var("DATABASE_URL").ok_or("DATABASE_URL is not set")?;
        let firebase = FirebaseConfig::from_file(
            var("FIREBASE_CONFIG").unwrap_or_else(|| "firebase.json".to_owned()),
        )?;

        let lookups = |key: &str, default: fn() -> Vec<LookupStrategy>| -> AppResult<Vec<LookupStrategy>> {
            match var(key) {
                Some(text) => Ok(parse_strategies(&text).map_err(|e| format!("{key}: {e}"))?),
                None => Ok(default()),
            }
        };
        let defaults = Limits::default();

        Ok(Config {
            bind_addr: var("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_owned()),
            database_url,
            database_max_connections: parse_var(&var, "DATABASE_MAX_CONNECTIONS", 16)?,
            firebase,
            primary_lookups: lookups("PRIMARY_LOOKUPS", primary_strategies)?,
            secondary_lookups: lookups("SECONDARY_LOOKUPS", secondary_strategies)?,
            limits: Limits {
                message_page_size: parse_var(&var, "MESSAGE_PAGE_SIZE", defaults.message_page_size)?,
                community_limit: parse_var(&var, "COMMUNITY_LIMIT", defaults.community_limit)?,
            },
        })
    }
}

fn parse_var<T: FromStr>(var: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> AppResult<T> {
    match var(key) {
        Some(text) => text
            .trim()
            .parse()
            .map_err(|_| format!("{key}: cannot parse {text:?}").into()),
        None => Ok(default),
    }
}
