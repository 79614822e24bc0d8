mod firestore;
mod memory;
mod sqlite;

use std::cmp::Ordering;

use async_trait::async_trait;
use serde_json::{Map, Value};

pub use firestore::{FirestoreStore, FIRESTORE_URL};
pub use memory::{MemoryStore, StoreCall};
pub use sqlite::SqliteStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("http: {0}")]
    Http(#[from] reqwest::Error),
    #[error("sql: {0}")]
    Sql(#[from] sqlx::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{status} from {url}: {body}")]
    Status {
        status: reqwest::StatusCode,
        url: String,
        body: String,
    },
    #[error("malformed document: {0}")]
    Decode(String),
    #[error("bad store url: {0}")]
    Url(String),
    #[error("{0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A schema-less record: its key within the collection plus every field the
/// store returned, already converted to plain JSON.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub key: String,
    pub fields: Map<String, Value>,
}

impl Document {
    pub fn new(key: impl Into<String>, fields: Value) -> Self {
        let fields = match fields {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Document { key: key.into(), fields }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn str_field(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Equal,
    ArrayContains,
    /// `value` is an array; the field equals one of its items.
    In,
    /// `value` is an array; the field is an array holding one of its items.
    ArrayContainsAny,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

impl Filter {
    pub fn matches(&self, doc: &Document) -> bool {
        let Some(actual) = doc.get(&self.field) else {
            return false;
        };
        match self.op {
            FilterOp::Equal => actual == &self.value,
            FilterOp::ArrayContains => actual
                .as_array()
                .is_some_and(|items| items.contains(&self.value)),
            FilterOp::In => self
                .value
                .as_array()
                .is_some_and(|wanted| wanted.contains(actual)),
            FilterOp::ArrayContainsAny => match (actual.as_array(), self.value.as_array()) {
                (Some(items), Some(wanted)) => items.iter().any(|item| wanted.contains(item)),
                _ => false,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// Conjunction of filters with optional ordering and bound. Without an
/// ordering, results come back in the store's natural iteration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filters: Vec<Filter>,
    pub order_by: Option<(String, Direction)>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter {
            field: field.to_owned(),
            op: FilterOp::Equal,
            value: value.into(),
        });
        self
    }

    pub fn contains(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter {
            field: field.to_owned(),
            op: FilterOp::ArrayContains,
            value: value.into(),
        });
        self
    }

    pub fn eq_any(mut self, field: &str, values: Vec<Value>) -> Self {
        self.filters.push(Filter {
            field: field.to_owned(),
            op: FilterOp::In,
            value: Value::Array(values),
        });
        self
    }

    pub fn contains_any(mut self, field: &str, values: Vec<Value>) -> Self {
        self.filters.push(Filter {
            field: field.to_owned(),
            op: FilterOp::ArrayContainsAny,
            value: Value::Array(values),
        });
        self
    }

    pub fn order_by(mut self, field: &str, direction: Direction) -> Self {
        self.order_by = Some((field.to_owned(), direction));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, collection: &str, key: &str) -> StoreResult<Option<Document>>;

    async fn find(&self, collection: &str, query: &Query) -> StoreResult<Vec<Document>>;

    /// Writes the top-level fields `doc` carries, leaving every other field
    /// of the stored document as it was. Creates the document when absent.
    async fn update(&self, collection: &str, doc: &Document) -> StoreResult<()>;
}

/// Total order over JSON values used for client-side sorting: null, bools,
/// numbers, strings, then everything else by its serialized form.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }

    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => rank(a)
            .cmp(&rank(b))
            .then_with(|| a.to_string().cmp(&b.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn array_contains_needs_an_array() {
        let doc = Document::new("c1", json!({ "users": ["a", "b"], "user": "a" }));

        assert!(Query::new().contains("users", "a").filters[0].matches(&doc));
        assert!(!Query::new().contains("user", "a").filters[0].matches(&doc));
        assert!(Query::new().eq("user", "a").filters[0].matches(&doc));
        assert!(!Query::new().eq("missing", "a").filters[0].matches(&doc));
    }

    #[test]
    fn disjunctive_filters_match_any_listed_value() {
        let doc = Document::new("c1", json!({ "users": [{ "$oid": "b" }], "community": "c1" }));

        let either = vec![json!("b"), json!({ "$oid": "b" })];
        assert!(Query::new().contains_any("users", either.clone()).filters[0].matches(&doc));
        assert!(!Query::new().contains_any("community", either).filters[0].matches(&doc));
        assert!(Query::new().eq_any("community", vec![json!("c0"), json!("c1")]).filters[0].matches(&doc));
        assert!(!Query::new().eq_any("community", vec![]).filters[0].matches(&doc));
    }

    #[test]
    fn values_order_by_type_then_content() {
        assert_eq!(compare_values(&json!(2), &json!(10)), Ordering::Less);
        assert_eq!(compare_values(&json!("b"), &json!("a")), Ordering::Greater);
        assert_eq!(compare_values(&json!(null), &json!("a")), Ordering::Less);
    }
}
