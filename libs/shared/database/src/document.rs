use std::cmp::Ordering;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use shared_models::error::AppError;

use crate::subscription::Subscription;

/// Field the store stamps with the server clock when a created document leaves it null or absent.
pub const SERVER_TIMESTAMP_FIELD: &str = "created_at";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub version: u64,
    pub data: Value,
}

impl Document {
    /// Deserialize the document body with its id folded in as the `id` field.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, StoreError> {
        let mut body = match &self.data {
            Value::Object(map) => map.clone(),
            _ => Map::new(),
        };
        body.insert("id".to_string(), Value::String(self.id.clone()));
        serde_json::from_value(Value::Object(body))
            .map_err(|e| StoreError::Serialization(format!("{} {}: {}", self.id, self.version, e)))
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.data.get(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

/// Equality filters combined with AND, then ordered by the given keys.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filters: Vec<(String, Value)>,
    pub order_by: Vec<OrderBy>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn where_eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filters.push((field.to_string(), value.into()));
        self
    }

    pub fn order_by(mut self, field: &str, direction: Direction) -> Self {
        self.order_by.push(OrderBy {
            field: field.to_string(),
            direction,
        });
        self
    }

    pub fn matches(&self, doc: &Document) -> bool {
        self.filters.iter().all(|(field, expected)| {
            if field == "id" {
                return expected.as_str() == Some(doc.id.as_str());
            }
            doc.field(field) == Some(expected)
        })
    }

    pub fn compare(&self, a: &Document, b: &Document) -> Ordering {
        for key in &self.order_by {
            let ordering = compare_values(a.field(&key.field), b.field(&key.field));
            let ordering = match key.direction {
                Direction::Asc => ordering,
                Direction::Desc => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.total_cmp(&y)
        }
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        // Missing and null sort first
        (None | Some(Value::Null), None | Some(Value::Null)) => Ordering::Equal,
        (None | Some(Value::Null), _) => Ordering::Less,
        (_, None | Some(Value::Null)) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    Create {
        collection: String,
        id: Option<String>,
        data: Value,
    },
    Set {
        collection: String,
        id: String,
        data: Value,
    },
    Update {
        collection: String,
        id: String,
        patch: Value,
        expected_version: Option<u64>,
    },
}

impl WriteOp {
    pub fn collection(&self) -> &str {
        match self {
            WriteOp::Create { collection, .. }
            | WriteOp::Set { collection, .. }
            | WriteOp::Update { collection, .. } => collection,
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum StoreError {
    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Document already exists: {0}")]
    AlreadyExists(String),

    #[error("Version conflict: expected {expected}, found {actual:?}")]
    VersionConflict { expected: u64, actual: Option<u64> },

    #[error("Backend read failed: {0}")]
    Read(String),

    #[error("Backend write failed: {0}")]
    Write(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => AppError::NotFound(what),
            StoreError::AlreadyExists(_) | StoreError::VersionConflict { .. } => {
                AppError::Conflict(err.to_string())
            }
            StoreError::Read(_) | StoreError::Write(_) => AppError::Database(err.to_string()),
            StoreError::Serialization(_) => AppError::Internal(err.to_string()),
        }
    }
}

/// Boundary to the managed document database.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError>;

    async fn list(&self, collection: &str) -> Result<Vec<Document>, StoreError>;

    async fn query(&self, collection: &str, query: &Query) -> Result<Vec<Document>, StoreError>;

    async fn create(
        &self,
        collection: &str,
        id: Option<&str>,
        data: Value,
    ) -> Result<Document, StoreError>;

    async fn set(&self, collection: &str, id: &str, data: Value) -> Result<Document, StoreError>;

    /// Merge top-level fields of `patch` into the document. With `expected_version`
    /// the write only happens if the stored version still matches.
    async fn update(
        &self,
        collection: &str,
        id: &str,
        patch: Value,
        expected_version: Option<u64>,
    ) -> Result<Document, StoreError>;

    /// Apply every op or none of them.
    async fn commit_batch(&self, ops: Vec<WriteOp>) -> Result<Vec<Document>, StoreError>;

    /// Live view of one document; the first value delivered is its current state.
    async fn subscribe(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Subscription<Option<Document>>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(id: &str, data: Value) -> Document {
        Document {
            id: id.to_string(),
            version: 1,
            data,
        }
    }

    #[test]
    fn query_matches_all_equality_filters() {
        let query = Query::new()
            .where_eq("doctor_id", "d-1")
            .where_eq("status", "scheduled");

        assert!(query.matches(&doc("a", json!({"doctor_id": "d-1", "status": "scheduled"}))));
        assert!(!query.matches(&doc("b", json!({"doctor_id": "d-1", "status": "completed"}))));
        assert!(!query.matches(&doc("c", json!({"doctor_id": "d-2", "status": "scheduled"}))));
    }

    #[test]
    fn query_orders_by_multiple_keys() {
        let query = Query::new()
            .order_by("date", Direction::Asc)
            .order_by("time", Direction::Desc);

        let early = doc("a", json!({"date": "2025-06-01", "time": "09:00"}));
        let early_later_slot = doc("b", json!({"date": "2025-06-01", "time": "14:00"}));
        let late = doc("c", json!({"date": "2025-06-02", "time": "09:00"}));

        assert_eq!(query.compare(&early, &late), Ordering::Less);
        assert_eq!(query.compare(&early_later_slot, &early), Ordering::Less);
    }

    #[test]
    fn decode_folds_in_id() {
        #[derive(Deserialize)]
        struct Named {
            id: String,
            name: String,
        }

        let named: Named = doc("x-1", json!({"name": "Dr. Rao"})).decode().unwrap();
        assert_eq!(named.id, "x-1");
        assert_eq!(named.name, "Dr. Rao");
    }
}
