use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tokio::sync::{watch, RwLock};
use tracing::debug;
use uuid::Uuid;

use crate::document::{Document, DocumentStore, Query, StoreError, WriteOp, SERVER_TIMESTAMP_FIELD};
use crate::subscription::Subscription;

#[derive(Debug, Clone)]
struct StoredDocument {
    seq: u64,
    doc: Document,
}

type Collection = HashMap<String, StoredDocument>;

#[derive(Default)]
struct State {
    collections: HashMap<String, Collection>,
    watchers: HashMap<(String, String), watch::Sender<Option<Document>>>,
    next_seq: u64,
}

/// Process-local document store used for development and tests.
///
/// Every write (single or batched) happens under one write lock, so each
/// call is atomic and version checks cannot interleave.
#[derive(Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn write_all(&self, ops: Vec<WriteOp>) -> Result<Vec<Document>, StoreError> {
        let mut state = self.state.write().await;

        let touched: HashSet<String> = ops.iter().map(|op| op.collection().to_string()).collect();
        let mut staged: HashMap<String, Collection> = touched
            .iter()
            .map(|name| {
                let collection = state.collections.get(name).cloned().unwrap_or_default();
                (name.clone(), collection)
            })
            .collect();

        let mut seq = state.next_seq;
        let mut written = Vec::with_capacity(ops.len());
        for op in ops {
            let (collection, doc) = apply(&mut staged, op, &mut seq)?;
            written.push((collection, doc));
        }

        state.next_seq = seq;
        for (name, collection) in staged {
            state.collections.insert(name, collection);
        }

        for (collection, doc) in &written {
            if let Some(sender) = state.watchers.get(&(collection.clone(), doc.id.clone())) {
                sender.send_replace(Some(doc.clone()));
            }
        }

        Ok(written.into_iter().map(|(_, doc)| doc).collect())
    }
}

fn apply(
    staged: &mut HashMap<String, Collection>,
    op: WriteOp,
    seq: &mut u64,
) -> Result<(String, Document), StoreError> {
    match op {
        WriteOp::Create { collection, id, mut data } => {
            let docs = staged.entry(collection.clone()).or_default();
            let id = id.unwrap_or_else(|| Uuid::new_v4().to_string());
            if docs.contains_key(&id) {
                return Err(StoreError::AlreadyExists(format!("{}/{}", collection, id)));
            }

            stamp_server_timestamp(&mut data);
            *seq += 1;
            let doc = Document { id: id.clone(), version: 1, data };
            docs.insert(id, StoredDocument { seq: *seq, doc: doc.clone() });
            Ok((collection, doc))
        }
        WriteOp::Set { collection, id, data } => {
            let docs = staged.entry(collection.clone()).or_default();
            let (seq_no, version) = match docs.get(&id) {
                Some(existing) => (existing.seq, existing.doc.version + 1),
                None => {
                    *seq += 1;
                    (*seq, 1)
                }
            };

            let doc = Document { id: id.clone(), version, data };
            docs.insert(id, StoredDocument { seq: seq_no, doc: doc.clone() });
            Ok((collection, doc))
        }
        WriteOp::Update { collection, id, patch, expected_version } => {
            let docs = staged.entry(collection.clone()).or_default();
            let stored = docs
                .get_mut(&id)
                .ok_or_else(|| StoreError::NotFound(format!("{}/{}", collection, id)))?;

            if let Some(expected) = expected_version {
                if stored.doc.version != expected {
                    return Err(StoreError::VersionConflict {
                        expected,
                        actual: Some(stored.doc.version),
                    });
                }
            }

            let Value::Object(fields) = patch else {
                return Err(StoreError::Write("update patch must be a JSON object".to_string()));
            };
            if !stored.doc.data.is_object() {
                stored.doc.data = Value::Object(Default::default());
            }
            if let Value::Object(target) = &mut stored.doc.data {
                for (key, value) in fields {
                    target.insert(key, value);
                }
            }
            stored.doc.version += 1;
            Ok((collection, stored.doc.clone()))
        }
    }
}

fn stamp_server_timestamp(data: &mut Value) {
    if let Value::Object(fields) = data {
        let missing = fields
            .get(SERVER_TIMESTAMP_FIELD)
            .map_or(true, Value::is_null);
        if missing {
            fields.insert(
                SERVER_TIMESTAMP_FIELD.to_string(),
                Value::String(Utc::now().to_rfc3339()),
            );
        }
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .map(|stored| stored.doc.clone()))
    }

    async fn list(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
        self.query(collection, &Query::new()).await
    }

    async fn query(&self, collection: &str, query: &Query) -> Result<Vec<Document>, StoreError> {
        let state = self.state.read().await;
        let Some(docs) = state.collections.get(collection) else {
            return Ok(Vec::new());
        };

        let mut matching: Vec<&StoredDocument> = docs
            .values()
            .filter(|stored| query.matches(&stored.doc))
            .collect();

        // Insertion order first so equal sort keys keep a stable order
        matching.sort_by_key(|stored| stored.seq);
        matching.sort_by(|a, b| query.compare(&a.doc, &b.doc));

        debug!("In-memory query on {} returned {} documents", collection, matching.len());
        Ok(matching.into_iter().map(|stored| stored.doc.clone()).collect())
    }

    async fn create(
        &self,
        collection: &str,
        id: Option<&str>,
        data: Value,
    ) -> Result<Document, StoreError> {
        let mut written = self
            .write_all(vec![WriteOp::Create {
                collection: collection.to_string(),
                id: id.map(str::to_string),
                data,
            }])
            .await?;
        written.pop().ok_or_else(|| StoreError::Write("create produced no document".to_string()))
    }

    async fn set(&self, collection: &str, id: &str, data: Value) -> Result<Document, StoreError> {
        let mut written = self
            .write_all(vec![WriteOp::Set {
                collection: collection.to_string(),
                id: id.to_string(),
                data,
            }])
            .await?;
        written.pop().ok_or_else(|| StoreError::Write("set produced no document".to_string()))
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        patch: Value,
        expected_version: Option<u64>,
    ) -> Result<Document, StoreError> {
        let mut written = self
            .write_all(vec![WriteOp::Update {
                collection: collection.to_string(),
                id: id.to_string(),
                patch,
                expected_version,
            }])
            .await?;
        written.pop().ok_or_else(|| StoreError::Write("update produced no document".to_string()))
    }

    async fn commit_batch(&self, ops: Vec<WriteOp>) -> Result<Vec<Document>, StoreError> {
        self.write_all(ops).await
    }

    async fn subscribe(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Subscription<Option<Document>>, StoreError> {
        let mut state = self.state.write().await;
        let current = state
            .collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .map(|stored| stored.doc.clone());

        let key = (collection.to_string(), id.to_string());
        let sender = state
            .watchers
            .entry(key)
            .or_insert_with(|| watch::channel(current).0);

        Ok(Subscription::new(sender.subscribe()))
    }
}
