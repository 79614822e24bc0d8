use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{json, Map, Value};

use super::{Direction, Document, DocumentStore, FilterOp, Query, StoreError, StoreResult};

pub const FIRESTORE_URL: &str = "https://firestore.googleapis.com/v1";

/// Firestore over its REST interface. Documents are converted to and from
/// the typed-value wire encoding at this boundary.
#[derive(Clone)]
pub struct FirestoreStore {
    http: reqwest::Client,
    documents_url: String,
    access_token: Option<String>,
}

impl FirestoreStore {
    pub fn new(base_url: &str, project_id: &str, access_token: Option<String>) -> Self {
        FirestoreStore {
            http: reqwest::Client::new(),
            documents_url: format!(
                "{}/projects/{project_id}/databases/(default)/documents",
                base_url.trim_end_matches('/')
            ),
            access_token,
        }
    }

    fn request(&self, method: reqwest::Method, url: reqwest::Url) -> reqwest::RequestBuilder {
        let builder = self.http.request(method, url);
        match &self.access_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    fn parse_url(&self, url: &str) -> StoreResult<reqwest::Url> {
        reqwest::Url::parse(url).map_err(|e| StoreError::Url(format!("{url}: {e}")))
    }

    /// Keys are opaque, so each one goes in as a single encoded segment.
    fn document_url(&self, collection: &str, key: &str) -> StoreResult<reqwest::Url> {
        let mut url = self.parse_url(&self.documents_url)?;
        url.path_segments_mut()
            .map_err(|()| StoreError::Url(self.documents_url.clone()))?
            .push(collection)
            .push(key);
        Ok(url)
    }

    async fn send(&self, builder: reqwest::RequestBuilder, url: &str) -> StoreResult<Option<Value>> {
        let response = builder.send().await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(StoreError::Status {
                status,
                url: url.to_owned(),
                body: response.text().await.unwrap_or_default(),
            });
        }
        Ok(Some(response.json().await?))
    }
}

#[async_trait]
impl DocumentStore for FirestoreStore {
    async fn get(&self, collection: &str, key: &str) -> StoreResult<Option<Document>> {
        let url = self.document_url(collection, key)?;
        self.send(self.request(reqwest::Method::GET, url.clone()), url.as_str())
            .await?
            .map(|body| decode_document(&body))
            .transpose()
    }

    async fn find(&self, collection: &str, query: &Query) -> StoreResult<Vec<Document>> {
        let url = self.parse_url(&format!("{}:runQuery", self.documents_url))?;
        let body = json!({ "structuredQuery": structured_query(collection, query) });
        let Some(rows) = self
            .send(self.request(reqwest::Method::POST, url.clone()).json(&body), url.as_str())
            .await?
        else {
            return Ok(Vec::new());
        };

        let rows = rows
            .as_array()
            .ok_or_else(|| StoreError::Decode(format!("runQuery returned {rows}")))?;
        rows.iter()
            .filter_map(|row| row.get("document"))
            .map(decode_document)
            .collect()
    }

    /// PATCH with an update mask naming exactly the carried fields, so typed
    /// values elsewhere in the document are never round-tripped.
    async fn update(&self, collection: &str, doc: &Document) -> StoreResult<()> {
        if doc.fields.is_empty() {
            return Ok(());
        }
        let mut url = self.document_url(collection, &doc.key)?;
        url.query_pairs_mut().extend_pairs(
            doc.fields
                .keys()
                .map(|field| ("updateMask.fieldPaths", field_path(field))),
        );

        let body = json!({ "fields": encode_fields(&doc.fields) });
        self.send(self.request(reqwest::Method::PATCH, url.clone()).json(&body), url.as_str())
            .await?
            .ok_or_else(|| StoreError::Unavailable(format!("{url} rejected the write")))?;
        Ok(())
    }
}

/// Field names outside `[A-Za-z_][A-Za-z0-9_]*` must be backquoted.
pub(crate) fn field_path(field: &str) -> String {
    let simple = field.chars().next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && field.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if simple {
        field.to_owned()
    } else {
        format!("`{}`", field.replace('\\', "\\\\").replace('`', "\\`"))
    }
}

pub(crate) fn structured_query(collection: &str, query: &Query) -> Value {
    let mut structured = json!({ "from": [{ "collectionId": collection }] });

    let filters: Vec<Value> = query
        .filters
        .iter()
        .map(|f| {
            let op = match f.op {
                FilterOp::Equal => "EQUAL",
                FilterOp::ArrayContains => "ARRAY_CONTAINS",
                FilterOp::In => "IN",
                FilterOp::ArrayContainsAny => "ARRAY_CONTAINS_ANY",
            };
            json!({
                "fieldFilter": {
                    "field": { "fieldPath": field_path(&f.field) },
                    "op": op,
                    "value": encode_value(&f.value),
                }
            })
        })
        .collect();
    match filters.len() {
        0 => {}
        1 => structured["where"] = filters.into_iter().next().unwrap_or_default(),
        _ => structured["where"] = json!({ "compositeFilter": { "op": "AND", "filters": filters } }),
    }

    if let Some((field, direction)) = &query.order_by {
        let direction = match direction {
            Direction::Ascending => "ASCENDING",
            Direction::Descending => "DESCENDING",
        };
        structured["orderBy"] = json!([{ "field": { "fieldPath": field_path(field) }, "direction": direction }]);
    }
    if let Some(limit) = query.limit {
        structured["limit"] = json!(limit);
    }
    structured
}

pub(crate) fn decode_document(doc: &Value) -> StoreResult<Document> {
    let name = doc
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| StoreError::Decode(format!("document without name: {doc}")))?;
    let key = name.rsplit('/').next().unwrap_or(name);

    let mut fields = Map::new();
    if let Some(Value::Object(wire)) = doc.get("fields") {
        for (field, value) in wire {
            fields.insert(field.clone(), decode_value(value)?);
        }
    }
    Ok(Document { key: key.to_owned(), fields })
}

pub(crate) fn decode_value(value: &Value) -> StoreResult<Value> {
    let Some((kind, inner)) = value.as_object().and_then(|o| o.iter().next()) else {
        return Err(StoreError::Decode(format!("untyped value {value}")));
    };

    Ok(match kind.as_str() {
        "nullValue" => Value::Null,
        "booleanValue" | "doubleValue" | "stringValue" | "timestampValue" | "bytesValue"
        | "referenceValue" => inner.clone(),
        "integerValue" => match inner {
            Value::String(s) => s
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| StoreError::Decode(format!("bad integerValue {s}")))?,
            other => other.clone(),
        },
        "geoPointValue" => json!({
            "latitude": inner.get("latitude").cloned().unwrap_or(json!(0.0)),
            "longitude": inner.get("longitude").cloned().unwrap_or(json!(0.0)),
        }),
        "arrayValue" => Value::Array(
            inner
                .get("values")
                .and_then(Value::as_array)
                .map(|values| values.iter().map(decode_value).collect::<StoreResult<Vec<_>>>())
                .transpose()?
                .unwrap_or_default(),
        ),
        "mapValue" => {
            let mut map = Map::new();
            if let Some(Value::Object(fields)) = inner.get("fields") {
                for (field, value) in fields {
                    map.insert(field.clone(), decode_value(value)?);
                }
            }
            Value::Object(map)
        }
        other => return Err(StoreError::Decode(format!("unknown value type {other}"))),
    })
}

pub(crate) fn encode_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) if n.is_i64() || n.is_u64() => json!({ "integerValue": n.to_string() }),
        Value::Number(n) => json!({ "doubleValue": n }),
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => {
            json!({ "arrayValue": { "values": items.iter().map(encode_value).collect::<Vec<_>>() } })
        }
        Value::Object(map) => json!({ "mapValue": { "fields": encode_fields(map) } }),
    }
}

fn encode_fields(fields: &Map<String, Value>) -> Value {
    Value::Object(
        fields
            .iter()
            .map(|(k, v)| (k.clone(), encode_value(v)))
            .collect(),
    )
}
