use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Method;
use serde_json::{json, Map, Value};
use tokio::sync::watch;
use tracing::{debug, warn};

use shared_config::AppConfig;

use crate::document::{
    Direction, Document, DocumentStore, Query, StoreError, WriteOp, SERVER_TIMESTAMP_FIELD,
};
use crate::subscription::Subscription;
use crate::supabase::{ApiError, SupabaseClient};

/// Document store backed by PostgREST tables, one table per collection.
///
/// Rows carry `id` and `version` columns next to the document fields.
/// Multi-document writes go through the `commit_batch` RPC so they stay atomic.
#[derive(Clone)]
pub struct RestDocumentStore {
    client: Arc<SupabaseClient>,
    poll_interval: Duration,
}

impl RestDocumentStore {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Arc::new(SupabaseClient::new(config)),
            poll_interval: Duration::from_millis(config.subscription_poll_interval_ms.max(1)),
        }
    }

    fn table_path(collection: &str) -> String {
        format!("/rest/v1/{}", urlencoding::encode(collection))
    }

    fn row_path(collection: &str, id: &str) -> String {
        format!("{}?id=eq.{}", Self::table_path(collection), urlencoding::encode(id))
    }

    async fn fetch_rows(&self, path: &str) -> Result<Vec<Document>, StoreError> {
        let rows: Vec<Value> = self
            .client
            .request(Method::GET, path, None, None)
            .await
            .map_err(read_error)?;

        rows.into_iter().map(row_to_document).collect()
    }

    async fn write_rows(
        &self,
        method: Method,
        path: &str,
        body: Value,
        extra_headers: HeaderMap,
    ) -> Result<Vec<Document>, anyhow::Error> {
        let rows: Vec<Value> = self
            .client
            .request_with_headers(method, path, None, Some(body), Some(extra_headers))
            .await?;

        rows.into_iter()
            .map(|row| row_to_document(row).map_err(anyhow::Error::from))
            .collect()
    }
}

fn read_error(err: anyhow::Error) -> StoreError {
    StoreError::Read(err.to_string())
}

fn api_status(err: &anyhow::Error) -> Option<&ApiError> {
    err.downcast_ref::<ApiError>()
}

fn write_error(err: anyhow::Error) -> StoreError {
    match err.downcast::<StoreError>() {
        Ok(store_error) => store_error,
        Err(err) => StoreError::Write(err.to_string()),
    }
}

fn row_to_document(row: Value) -> Result<Document, StoreError> {
    let Value::Object(mut fields) = row else {
        return Err(StoreError::Serialization("expected a row object".to_string()));
    };

    let id = match fields.remove("id") {
        Some(Value::String(id)) => id,
        Some(Value::Number(id)) => id.to_string(),
        _ => return Err(StoreError::Serialization("row is missing its id".to_string())),
    };
    let version = fields
        .remove("version")
        .and_then(|v| v.as_u64())
        .unwrap_or(1);

    Ok(Document {
        id,
        version,
        data: Value::Object(fields),
    })
}

fn document_row(id: Option<&str>, version: u64, data: Value) -> Value {
    let mut fields = match data {
        Value::Object(fields) => fields,
        _ => Map::new(),
    };

    // Let the column default stamp the server clock
    if fields.get(SERVER_TIMESTAMP_FIELD).is_some_and(Value::is_null) {
        fields.remove(SERVER_TIMESTAMP_FIELD);
    }
    if let Some(id) = id {
        fields.insert("id".to_string(), Value::String(id.to_string()));
    }
    fields.insert("version".to_string(), json!(version));
    Value::Object(fields)
}

fn filter_value(value: &Value) -> String {
    match value {
        Value::Null => "is.null".to_string(),
        Value::String(s) => format!("eq.{}", urlencoding::encode(s)),
        other => format!("eq.{}", urlencoding::encode(&other.to_string())),
    }
}

fn query_string(query: &Query) -> String {
    let mut params = vec!["select=*".to_string()];

    for (field, value) in &query.filters {
        params.push(format!("{}={}", urlencoding::encode(field), filter_value(value)));
    }

    if !query.order_by.is_empty() {
        let order: Vec<String> = query
            .order_by
            .iter()
            .map(|key| {
                let direction = match key.direction {
                    Direction::Asc => "asc",
                    Direction::Desc => "desc",
                };
                format!("{}.{}", urlencoding::encode(&key.field), direction)
            })
            .collect();
        params.push(format!("order={}", order.join(",")));
    }

    params.join("&")
}

fn batch_op(op: &WriteOp) -> Value {
    match op {
        WriteOp::Create { collection, id, data } => json!({
            "op": "create",
            "collection": collection,
            "id": id,
            "data": document_row(None, 1, data.clone()),
        }),
        WriteOp::Set { collection, id, data } => json!({
            "op": "set",
            "collection": collection,
            "id": id,
            "data": data,
        }),
        WriteOp::Update { collection, id, patch, expected_version } => json!({
            "op": "update",
            "collection": collection,
            "id": id,
            "patch": patch,
            "expected_version": expected_version,
        }),
    }
}

fn single_document(mut rows: Vec<Document>, what: &str) -> Result<Document, StoreError> {
    rows.pop()
        .ok_or_else(|| StoreError::Write(format!("{} returned no row", what)))
}

#[async_trait]
impl DocumentStore for RestDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let mut rows = self.fetch_rows(&Self::row_path(collection, id)).await?;
        Ok(rows.pop())
    }

    async fn list(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
        self.query(collection, &Query::new()).await
    }

    async fn query(&self, collection: &str, query: &Query) -> Result<Vec<Document>, StoreError> {
        let path = format!("{}?{}", Self::table_path(collection), query_string(query));
        let docs = self.fetch_rows(&path).await?;
        debug!("Query on {} returned {} rows", collection, docs.len());
        Ok(docs)
    }

    async fn create(
        &self,
        collection: &str,
        id: Option<&str>,
        data: Value,
    ) -> Result<Document, StoreError> {
        let body = document_row(id, 1, data);
        let result = self
            .write_rows(
                Method::POST,
                &Self::table_path(collection),
                body,
                SupabaseClient::representation_headers(),
            )
            .await;

        match result {
            Ok(rows) => single_document(rows, "create"),
            Err(err) if api_status(&err).is_some_and(ApiError::is_conflict) => Err(
                StoreError::AlreadyExists(format!("{}/{}", collection, id.unwrap_or_default())),
            ),
            Err(err) => Err(write_error(err)),
        }
    }

    async fn set(&self, collection: &str, id: &str, data: Value) -> Result<Document, StoreError> {
        let version = self
            .get(collection, id)
            .await?
            .map_or(1, |existing| existing.version + 1);

        let mut headers = SupabaseClient::representation_headers();
        headers.insert(
            "Prefer",
            HeaderValue::from_static("resolution=merge-duplicates,return=representation"),
        );

        let rows = self
            .write_rows(
                Method::POST,
                &Self::table_path(collection),
                document_row(Some(id), version, data),
                headers,
            )
            .await
            .map_err(write_error)?;
        single_document(rows, "set")
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        patch: Value,
        expected_version: Option<u64>,
    ) -> Result<Document, StoreError> {
        let Value::Object(mut fields) = patch else {
            return Err(StoreError::Write("update patch must be a JSON object".to_string()));
        };

        let (path, next_version) = match expected_version {
            Some(expected) => (
                format!("{}&version=eq.{}", Self::row_path(collection, id), expected),
                expected + 1,
            ),
            None => {
                let current = self
                    .get(collection, id)
                    .await?
                    .ok_or_else(|| StoreError::NotFound(format!("{}/{}", collection, id)))?;
                (
                    format!("{}&version=eq.{}", Self::row_path(collection, id), current.version),
                    current.version + 1,
                )
            }
        };
        fields.insert("version".to_string(), json!(next_version));

        let rows = self
            .write_rows(
                Method::PATCH,
                &path,
                Value::Object(fields),
                SupabaseClient::representation_headers(),
            )
            .await
            .map_err(write_error)?;

        if let Some(doc) = rows.into_iter().next() {
            return Ok(doc);
        }

        // Nothing matched: either the row is gone or its version moved on
        match self.get(collection, id).await? {
            None => Err(StoreError::NotFound(format!("{}/{}", collection, id))),
            Some(current) => Err(StoreError::VersionConflict {
                expected: next_version - 1,
                actual: Some(current.version),
            }),
        }
    }

    async fn commit_batch(&self, ops: Vec<WriteOp>) -> Result<Vec<Document>, StoreError> {
        let expected = ops.iter().find_map(|op| match op {
            WriteOp::Update { expected_version, .. } => *expected_version,
            _ => None,
        });
        let body = json!({ "ops": ops.iter().map(batch_op).collect::<Vec<_>>() });

        let result = self
            .write_rows(
                Method::POST,
                "/rest/v1/rpc/commit_batch",
                body,
                SupabaseClient::representation_headers(),
            )
            .await;

        match result {
            Ok(rows) => Ok(rows),
            Err(err) if api_status(&err).is_some_and(ApiError::is_conflict) => {
                Err(StoreError::VersionConflict {
                    expected: expected.unwrap_or_default(),
                    actual: None,
                })
            }
            Err(err) if api_status(&err).is_some_and(ApiError::is_not_found) => {
                Err(StoreError::NotFound(err.to_string()))
            }
            Err(err) => Err(write_error(err)),
        }
    }

    async fn subscribe(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Subscription<Option<Document>>, StoreError> {
        let initial = self.get(collection, id).await?;
        let (sender, receiver) = watch::channel(initial);

        let store = self.clone();
        let collection = collection.to_string();
        let id = id.to_string();
        let task = tokio::spawn(async move {
            loop {
                tokio::time::sleep(store.poll_interval).await;
                if sender.is_closed() {
                    break;
                }

                match store.get(&collection, &id).await {
                    Ok(latest) => {
                        let changed = {
                            let current = sender.borrow().as_ref().map(|d| d.version);
                            current != latest.as_ref().map(|d| d.version)
                        };
                        if changed {
                            debug!("{}/{} changed, notifying subscribers", collection, id);
                            sender.send_replace(latest);
                        }
                    }
                    Err(e) => warn!("Polling {}/{} failed: {}", collection, id, e),
                }
            }
        });

        Ok(Subscription::with_task(receiver, task))
    }
}
