use serde::Serialize;
use serde_json::{Map, Value};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

use crate::store::Document;

pub const NOT_FOUND: &str = "Not Found";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub canonical_id: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
    pub raw: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_via: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UserProfile {
    pub fn from_document(doc: Document, resolved_via: Option<String>) -> Self {
        let fields = &doc.fields;
        let name = non_blank(fields, "name").map(|name| match non_blank(fields, "lastName") {
            Some(last) => format!("{name} {last}"),
            None => name.to_owned(),
        });
        let display_name = non_blank(fields, "displayName")
            .map(str::to_owned)
            .or(name)
            .or_else(|| non_blank(fields, "fullName").map(str::to_owned));
        let avatar_url = non_blank(fields, "photoURL")
            .or_else(|| non_blank(fields, "profileImage"))
            .map(str::to_owned);

        UserProfile {
            display_name,
            email: non_blank(fields, "email").map(str::to_owned),
            avatar_url,
            canonical_id: doc.key,
            raw: doc.fields,
            resolved_via,
            error: None,
        }
    }

    pub fn not_found(reference: &str) -> Self {
        UserProfile {
            canonical_id: reference.to_owned(),
            display_name: None,
            email: None,
            avatar_url: None,
            raw: Map::new(),
            resolved_via: None,
            error: Some(NOT_FOUND.to_owned()),
        }
    }

    pub fn is_found(&self) -> bool {
        self.error.is_none()
    }

    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.canonical_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberEntry {
    pub user_id: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MemberEntry {
    pub fn from_value(value: &Value) -> Self {
        match normalize_foreign_keys(value.clone()) {
            Value::Object(mut extra) => {
                let user_id = match extra.remove("userId") {
                    Some(Value::String(s)) => s,
                    Some(Value::Null) | None => String::new(),
                    Some(other) => other.to_string(),
                };
                MemberEntry { user_id, extra }
            }
            Value::String(user_id) => MemberEntry {
                user_id,
                extra: Map::new(),
            },
            _ => MemberEntry {
                user_id: String::new(),
                extra: Map::new(),
            },
        }
    }

    pub fn to_value(&self) -> Value {
        let mut map = self.extra.clone();
        map.insert("userId".to_owned(), Value::String(self.user_id.clone()));
        Value::Object(map)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Community {
    pub id: String,
    pub name: String,
    pub member_refs: Vec<String>,
    pub member_entries: Vec<MemberEntry>,
    pub raw: Map<String, Value>,
}

pub const MEMBER_LIST: &str = "usersList";

impl Community {
    pub fn from_document(doc: Document) -> Self {
        let member_entries: Vec<MemberEntry> = doc
            .get(MEMBER_LIST)
            .and_then(Value::as_array)
            .map(|entries| entries.iter().map(MemberEntry::from_value).collect())
            .unwrap_or_default();

        Community {
            name: doc.str_field("name").unwrap_or_default().to_owned(),
            member_refs: member_entries.iter().map(|m| m.user_id.clone()).collect(),
            member_entries,
            id: doc.key,
            raw: doc.fields,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommunitySummary {
    pub id: String,
    pub name: String,
    pub member_count: usize,
    pub raw: Map<String, Value>,
}

impl From<Community> for CommunitySummary {
    fn from(community: Community) -> Self {
        CommunitySummary {
            id: community.id,
            name: community.name,
            member_count: community.member_entries.len(),
            raw: community.raw,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommunityWithMembers {
    #[serde(flatten)]
    pub community: Community,
    pub members: Vec<UserProfile>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Channel {
    pub id: String,
    pub community_id: String,
    pub participant_ids: Vec<String>,
    pub raw: Map<String, Value>,
}

impl Channel {
    pub fn from_document(doc: Document) -> Self {
        let mut participant_ids: Vec<String> = doc
            .get("users")
            .and_then(Value::as_array)
            .map(|users| users.iter().filter_map(plain_string).collect())
            .unwrap_or_default();

        // legacy channels name their member in a single `user` field
        if let Some(user) = doc.get("user").and_then(plain_string) {
            if !participant_ids.contains(&user) {
                participant_ids.push(user);
            }
        }

        Channel {
            community_id: doc.get("community").and_then(plain_string).unwrap_or_default(),
            id: doc.key,
            participant_ids,
            raw: doc.fields,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub channel_id: String,
    pub sender_ref: String,
    pub text: String,
    #[serde(with = "time::serde::rfc3339::option")]
    pub created_at: Option<OffsetDateTime>,
    pub raw: Map<String, Value>,
}

impl Message {
    pub fn from_document(doc: Document) -> Self {
        let sender_ref = ["sender", "senderId", "user"]
            .iter()
            .find_map(|field| doc.get(field).and_then(plain_string))
            .unwrap_or_default();

        Message {
            channel_id: doc.get("channel").and_then(plain_string).unwrap_or_default(),
            sender_ref,
            text: doc.str_field("text").unwrap_or_default().to_owned(),
            created_at: doc.get("createdAt").and_then(parse_timestamp),
            id: doc.key,
            raw: doc.fields,
        }
    }
}

fn non_blank<'a>(fields: &'a Map<String, Value>, field: &str) -> Option<&'a str> {
    fields
        .get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}

/// Reads an id that may be stored as a string or as a `{"$oid": …}` wrapper.
pub fn plain_string(value: &Value) -> Option<String> {
    match normalize_foreign_keys(value.clone()) {
        Value::String(s) => Some(s),
        _ => None,
    }
}

/// Every encoding an id may be stored under: plain, or wrapped as the legacy
/// store exports it. Queries match either so they agree with [`plain_string`].
pub fn id_forms(id: &str) -> Vec<Value> {
    vec![Value::String(id.to_owned()), serde_json::json!({ "$oid": id })]
}

/// Collapses id wrappers left over from the legacy store's export format into
/// plain strings, recursively.
pub fn normalize_foreign_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            if map.len() == 1 {
                if let Some(Value::String(id)) = map.get("$oid") {
                    return Value::String(id.clone());
                }
            }
            Value::Object(
                map.into_iter()
                    .map(|(k, v)| (k, normalize_foreign_keys(v)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.into_iter().map(normalize_foreign_keys).collect()),
        other => other,
    }
}

/// Accepts RFC 3339 strings, epoch milliseconds, `{"$date": …}`, and
/// serialized timestamp objects (`_seconds`/`_nanoseconds` or `seconds`/`nanos`).
pub fn parse_timestamp(value: &Value) -> Option<OffsetDateTime> {
    match value {
        Value::String(s) => OffsetDateTime::parse(s, &Rfc3339).ok(),
        Value::Number(n) => {
            let millis = n.as_i64()?;
            OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000).ok()
        }
        Value::Object(map) => {
            if let Some(inner) = map.get("$date") {
                return parse_timestamp(inner);
            }
            let seconds = map.get("_seconds").or_else(|| map.get("seconds"))?.as_i64()?;
            let nanos = map
                .get("_nanoseconds")
                .or_else(|| map.get("nanos"))
                .and_then(Value::as_i64)
                .unwrap_or(0);
            OffsetDateTime::from_unix_timestamp_nanos(i128::from(seconds) * 1_000_000_000 + i128::from(nanos)).ok()
        }
        _ => None,
    }
}
