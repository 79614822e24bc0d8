use std::str::FromStr;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
use tokio::sync::OnceCell;

use super::{Direction, Document, DocumentStore, FilterOp, Query, StoreError, StoreResult};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS documents (
    collection TEXT NOT NULL,
    key TEXT NOT NULL,
    body TEXT NOT NULL,
    PRIMARY KEY (collection, key)
)";

/// JSON documents in a single SQLite table.
///
/// The pool is opened on the first operation and then held for the life of
/// the process; every clone of the owning state shares it. There is no
/// explicit teardown.
pub struct SqliteStore {
    url: String,
    max_connections: u32,
    pool: OnceCell<SqlitePool>,
}

impl SqliteStore {
    pub fn new(url: impl Into<String>, max_connections: u32) -> Self {
        SqliteStore {
            url: url.into(),
            max_connections,
            pool: OnceCell::new(),
        }
    }

    pub async fn pool(&self) -> StoreResult<&SqlitePool> {
        self.pool
            .get_or_try_init(|| async {
                let options = SqliteConnectOptions::from_str(&self.url)?.create_if_missing(true);
                let pool = SqlitePoolOptions::new()
                    .max_connections(self.max_connections)
                    .connect_with(options)
                    .await?;
                sqlx::query(SCHEMA).execute(&pool).await?;
                tracing::info!(url = %self.url, "connected to secondary store");
                Ok::<_, StoreError>(pool)
            })
            .await
    }
}

fn json_path(field: &str) -> String {
    format!("$.\"{}\"", field.replace('"', "\\\""))
}

fn decode_row(key: String, body: String) -> StoreResult<Document> {
    let fields = serde_json::from_str::<Value>(&body)?;
    if !fields.is_object() {
        return Err(StoreError::Decode(format!("document {key} is not an object")));
    }
    Ok(Document::new(key, fields))
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn get(&self, collection: &str, key: &str) -> StoreResult<Option<Document>> {
        let row: Option<(String, String)> =
            sqlx::query_as("SELECT key,body FROM documents WHERE collection=? AND key=?")
                .bind(collection)
                .bind(key)
                .fetch_optional(self.pool().await?)
                .await?;

        row.map(|(key, body)| decode_row(key, body)).transpose()
    }

    async fn find(&self, collection: &str, query: &Query) -> StoreResult<Vec<Document>> {
        let mut sql = String::from("SELECT key,body FROM documents WHERE collection=?");
        let mut binds = vec![collection.to_owned()];

        for filter in &query.filters {
            let path = json_path(&filter.field);
            let value = filter.value.to_string();
            match filter.op {
                FilterOp::Equal => {
                    sql += " AND json_extract(body, ?) = json_extract(?, '$')";
                    binds.extend([path, value]);
                }
                FilterOp::ArrayContains => {
                    // json_each also walks scalars, so pin the type first
                    sql += " AND json_type(body, ?) = 'array' AND EXISTS (SELECT 1 FROM json_each(body, ?) AS item WHERE item.value = json_extract(?, '$'))";
                    binds.extend([path.clone(), path, value]);
                }
                FilterOp::In => {
                    sql += " AND EXISTS (SELECT 1 FROM json_each(?) AS wanted WHERE wanted.value = json_extract(body, ?))";
                    binds.extend([value, path]);
                }
                FilterOp::ArrayContainsAny => {
                    sql += " AND json_type(body, ?) = 'array' AND EXISTS (SELECT 1 FROM json_each(body, ?) AS item, json_each(?) AS wanted WHERE item.value = wanted.value)";
                    binds.extend([path.clone(), path, value]);
                }
            }
        }

        match &query.order_by {
            Some((field, direction)) => {
                sql += match direction {
                    Direction::Ascending => " ORDER BY json_extract(body, ?) ASC, rowid",
                    Direction::Descending => " ORDER BY json_extract(body, ?) DESC, rowid",
                };
                binds.push(json_path(field));
            }
            None => sql += " ORDER BY rowid",
        }

        if query.limit.is_some() {
            sql += " LIMIT ?";
        }

        let mut q = sqlx::query_as::<_, (String, String)>(&sql);
        for bind in binds {
            q = q.bind(bind);
        }
        if let Some(limit) = query.limit {
            q = q.bind(i64::try_from(limit).unwrap_or(i64::MAX));
        }

        q.fetch_all(self.pool().await?)
            .await?
            .into_iter()
            .map(|(key, body)| decode_row(key, body))
            .collect()
    }

    async fn update(&self, collection: &str, doc: &Document) -> StoreResult<()> {
        let mut sql = String::from(
            "INSERT INTO documents (collection,key,body) VALUES (?,?,?)
            ON CONFLICT(collection,key) DO UPDATE SET body=json_set(documents.body",
        );
        let mut binds = vec![
            collection.to_owned(),
            doc.key.clone(),
            serde_json::to_string(&doc.fields)?,
        ];
        for (field, value) in &doc.fields {
            sql += ", ?, json(?)";
            binds.push(json_path(field));
            binds.push(serde_json::to_string(value)?);
        }
        sql += ")";

        let mut q = sqlx::query(&sql);
        for bind in binds {
            q = q.bind(bind);
        }
        q.execute(self.pool().await?).await?;
        Ok(())
    }
}
