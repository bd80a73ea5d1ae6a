use super::{document_id, Document, DocumentStore, StoreError};
use crate::query::QueryPlan;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Collections held in memory. Each collection keeps insertion order, which is the final
/// sort tiebreak.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Vec<Document>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn matching<'a>(docs: &'a [Document], plan: &QueryPlan) -> Vec<&'a Document> {
    let mut hits: Vec<&Document> = docs.iter().filter(|d| plan.matches(d)).collect();
    // stable: equal keys keep insertion order
    hits.sort_by(|a, b| plan.compare(a, b));
    hits
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn count(&self, collection: &str, plan: &QueryPlan) -> Result<u64, StoreError> {
        let guard = self.collections.read().await;
        Ok(guard
            .get(collection)
            .map(|docs| docs.iter().filter(|d| plan.matches(d)).count() as u64)
            .unwrap_or(0))
    }

    async fn find(&self, collection: &str, plan: &QueryPlan) -> Result<Vec<Document>, StoreError> {
        let guard = self.collections.read().await;
        let Some(docs) = guard.get(collection) else {
            return Ok(Vec::new());
        };
        let skip = usize::try_from(plan.pagination.skip()).unwrap_or(usize::MAX);
        let limit = usize::try_from(plan.pagination.limit).unwrap_or(usize::MAX);
        Ok(matching(docs, plan)
            .into_iter()
            .skip(skip)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn find_by_id(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let guard = self.collections.read().await;
        Ok(guard
            .get(collection)
            .and_then(|docs| docs.iter().find(|d| d.get("id").and_then(Value::as_str) == Some(id)))
            .cloned())
    }

    async fn find_where_in(
        &self,
        collection: &str,
        field: &str,
        values: &[String],
    ) -> Result<Vec<Document>, StoreError> {
        let guard = self.collections.read().await;
        let Some(docs) = guard.get(collection) else {
            return Ok(Vec::new());
        };
        Ok(docs
            .iter()
            .filter(|d| {
                d.get(field)
                    .and_then(Value::as_str)
                    .map(|v| values.iter().any(|x| x == v))
                    .unwrap_or(false)
            })
            .cloned()
            .collect())
    }

    async fn insert(&self, collection: &str, doc: Document) -> Result<Document, StoreError> {
        let id = document_id(collection, &doc)?;
        let mut guard = self.collections.write().await;
        let docs = guard.entry(collection.to_string()).or_default();
        if docs.iter().any(|d| d.get("id").and_then(Value::as_str) == Some(id.as_str())) {
            return Err(StoreError::DuplicateId {
                collection: collection.to_string(),
                id,
            });
        }
        docs.push(doc.clone());
        Ok(doc)
    }

    async fn update(&self, collection: &str, id: &str, patch: Document) -> Result<Option<Document>, StoreError> {
        let mut guard = self.collections.write().await;
        let Some(doc) = guard
            .get_mut(collection)
            .and_then(|docs| docs.iter_mut().find(|d| d.get("id").and_then(Value::as_str) == Some(id)))
        else {
            return Ok(None);
        };
        for (k, v) in patch {
            doc.insert(k, v);
        }
        Ok(Some(doc.clone()))
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool, StoreError> {
        let mut guard = self.collections.write().await;
        let Some(docs) = guard.get_mut(collection) else {
            return Ok(false);
        };
        let before = docs.len();
        docs.retain(|d| d.get("id").and_then(Value::as_str) != Some(id));
        Ok(docs.len() != before)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
