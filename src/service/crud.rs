//! Generic CRUD over any registered resource.
//!
//! One set of operations, parameterized by a [`ResourceDescriptor`] and executed against a
//! [`DocumentStore`]. The service owns id and timestamp assignment, slug derivation,
//! validation, reference and uniqueness checks, and relation population.

use crate::config::{
    FieldType, RelationDirection, ResourceDescriptor, ResourceRegistry, CREATED_AT_FIELD, ID_FIELD, SYSTEM_FIELDS,
    UPDATED_AT_FIELD,
};
use crate::error::{AppError, ValidationErrors};
use crate::query::{PageInfo, QueryPlan};
use crate::service::RequestValidator;
use crate::store::{Document, DocumentStore};
use chrono::{SecondsFormat, Utc};
use serde_json::Value;
use std::collections::HashMap;

pub struct CrudService;

impl CrudService {
    /// One page of documents matching the plan, populated and projected, with page metadata.
    pub async fn list(
        store: &dyn DocumentStore,
        registry: &ResourceRegistry,
        descriptor: &ResourceDescriptor,
        plan: &QueryPlan,
    ) -> Result<(Vec<Document>, PageInfo), AppError> {
        let total = store.count(&descriptor.collection, plan).await?;
        let mut items = store.find(&descriptor.collection, plan).await?;
        Self::populate(store, registry, descriptor, &mut items, &plan.populate).await?;
        let items = items.into_iter().map(|d| plan.project(d)).collect();
        Ok((items, PageInfo::new(plan.pagination, total)))
    }

    /// Fetch one document by id, populating the given (already whitelisted) relations.
    pub async fn get_one(
        store: &dyn DocumentStore,
        registry: &ResourceRegistry,
        descriptor: &ResourceDescriptor,
        id: &str,
        populate: &[String],
    ) -> Result<Document, AppError> {
        let doc = Self::find_existing(store, descriptor, id).await?;
        let mut docs = vec![doc];
        Self::populate(store, registry, descriptor, &mut docs, populate).await?;
        docs.pop().ok_or_else(|| not_found(descriptor, id))
    }

    /// Create a document from a client payload. Returns it as stored.
    pub async fn create(
        store: &dyn DocumentStore,
        registry: &ResourceRegistry,
        descriptor: &ResourceDescriptor,
        payload: Document,
    ) -> Result<Document, AppError> {
        let mut doc = writable_fields(descriptor, payload);
        for field in &descriptor.fields {
            if let Some(default) = &field.default {
                doc.entry(field.name.clone()).or_insert_with(|| default.clone());
            }
        }
        derive_slugs(descriptor, &mut doc);
        RequestValidator::validate(&doc, descriptor)?;
        check_references(store, registry, descriptor, &doc).await?;
        check_unique(store, descriptor, &doc, None).await?;

        let id = uuid::Uuid::new_v4().to_string();
        let now = timestamp();
        doc.insert(ID_FIELD.into(), Value::String(id.clone()));
        doc.insert(CREATED_AT_FIELD.into(), Value::String(now.clone()));
        doc.insert(UPDATED_AT_FIELD.into(), Value::String(now));
        let stored = store.insert(&descriptor.collection, doc).await?;
        tracing::info!(resource = %descriptor.kind, id = %id, "created");
        Ok(stored)
    }

    /// Merge a partial payload into an existing document. Returns the updated document.
    pub async fn update(
        store: &dyn DocumentStore,
        registry: &ResourceRegistry,
        descriptor: &ResourceDescriptor,
        id: &str,
        payload: Document,
    ) -> Result<Document, AppError> {
        let current = Self::find_existing(store, descriptor, id).await?;
        let mut patch = writable_fields(descriptor, payload);
        derive_slugs(descriptor, &mut patch);
        let mut merged = current;
        merged.extend(patch.clone());
        RequestValidator::validate_partial(&patch, &merged, descriptor)?;
        check_references(store, registry, descriptor, &patch).await?;
        check_unique(store, descriptor, &patch, Some(id)).await?;

        patch.insert(UPDATED_AT_FIELD.into(), Value::String(timestamp()));
        let updated = store
            .update(&descriptor.collection, id, patch)
            .await?
            .ok_or_else(|| not_found(descriptor, id))?;
        tracing::info!(resource = %descriptor.kind, id = %id, "updated");
        Ok(updated)
    }

    /// NotFound unless a document with this id exists.
    pub async fn ensure_exists(store: &dyn DocumentStore, descriptor: &ResourceDescriptor, id: &str) -> Result<(), AppError> {
        Self::find_existing(store, descriptor, id).await.map(|_| ())
    }

    pub async fn delete(store: &dyn DocumentStore, descriptor: &ResourceDescriptor, id: &str) -> Result<(), AppError> {
        if !is_valid_id(id) || !store.delete(&descriptor.collection, id).await? {
            return Err(not_found(descriptor, id));
        }
        tracing::info!(resource = %descriptor.kind, id = %id, "deleted");
        Ok(())
    }

    async fn find_existing(
        store: &dyn DocumentStore,
        descriptor: &ResourceDescriptor,
        id: &str,
    ) -> Result<Document, AppError> {
        if !is_valid_id(id) {
            return Err(not_found(descriptor, id));
        }
        store
            .find_by_id(&descriptor.collection, id)
            .await?
            .ok_or_else(|| not_found(descriptor, id))
    }

    /// Attach related documents under each relation name. One store lookup per relation.
    async fn populate(
        store: &dyn DocumentStore,
        registry: &ResourceRegistry,
        descriptor: &ResourceDescriptor,
        docs: &mut [Document],
        names: &[String],
    ) -> Result<(), AppError> {
        if docs.is_empty() {
            return Ok(());
        }
        for name in names {
            let Some(rel) = descriptor.relation(name) else {
                continue;
            };
            let related = registry.by_kind(&rel.related_kind).ok_or_else(|| {
                AppError::Internal(format!("relation {}.{} targets unknown kind {}", descriptor.kind, name, rel.related_kind))
            })?;
            let mut keys: Vec<String> = Vec::new();
            for doc in docs.iter() {
                if let Some(k) = doc.get(&rel.our_key).and_then(Value::as_str) {
                    if !keys.iter().any(|x| x == k) {
                        keys.push(k.to_string());
                    }
                }
            }
            let found = store.find_where_in(&related.collection, &rel.their_key, &keys).await?;
            match rel.direction {
                RelationDirection::ToOne => {
                    let by_key: HashMap<String, Document> = found
                        .into_iter()
                        .filter_map(|d| d.get(&rel.their_key).and_then(Value::as_str).map(String::from).map(|k| (k, d)))
                        .collect();
                    for doc in docs.iter_mut() {
                        let value = doc
                            .get(&rel.our_key)
                            .and_then(Value::as_str)
                            .and_then(|k| by_key.get(k))
                            .map(|d| Value::Object(d.clone()))
                            .unwrap_or(Value::Null);
                        doc.insert(rel.name.clone(), value);
                    }
                }
                RelationDirection::ToMany => {
                    let mut groups: HashMap<String, Vec<Value>> = HashMap::new();
                    for d in found {
                        if let Some(k) = d.get(&rel.their_key).and_then(Value::as_str).map(String::from) {
                            groups.entry(k).or_default().push(Value::Object(d));
                        }
                    }
                    for doc in docs.iter_mut() {
                        let items = doc
                            .get(&rel.our_key)
                            .and_then(Value::as_str)
                            .and_then(|k| groups.get(k))
                            .cloned()
                            .unwrap_or_default();
                        doc.insert(rel.name.clone(), Value::Array(items));
                    }
                }
            }
        }
        Ok(())
    }
}

fn not_found(descriptor: &ResourceDescriptor, id: &str) -> AppError {
    AppError::NotFound(format!("No {} for this id {}", descriptor.kind, id))
}

/// Document ids are UUIDs; anything else cannot exist.
fn is_valid_id(id: &str) -> bool {
    uuid::Uuid::parse_str(id).is_ok()
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Keep schema fields only; system and slug fields are server-managed.
fn writable_fields(descriptor: &ResourceDescriptor, payload: Document) -> Document {
    payload
        .into_iter()
        .filter(|(k, _)| {
            let keep = !SYSTEM_FIELDS.contains(&k.as_str())
                && descriptor.field(k).map(|f| f.slug_of.is_none()).unwrap_or(false);
            if !keep {
                tracing::debug!(resource = %descriptor.kind, field = %k, "dropping non-writable field");
            }
            keep
        })
        .collect()
}

fn derive_slugs(descriptor: &ResourceDescriptor, doc: &mut Document) {
    for field in &descriptor.fields {
        let Some(source) = &field.slug_of else { continue };
        if let Some(text) = doc.get(source).and_then(Value::as_str) {
            let slug = slugify(text);
            doc.insert(field.name.clone(), Value::String(slug));
        }
    }
}

/// Lowercase, runs of non-alphanumerics collapsed to `-`, no leading or trailing `-`.
pub fn slugify(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut pending_dash = false;
    for c in s.chars() {
        if c.is_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.extend(c.to_lowercase());
        } else {
            pending_dash = true;
        }
    }
    out
}

/// Every reference field that is set must point at an existing document.
async fn check_references(
    store: &dyn DocumentStore,
    registry: &ResourceRegistry,
    descriptor: &ResourceDescriptor,
    doc: &Document,
) -> Result<(), AppError> {
    let mut errors = ValidationErrors::default();
    for field in &descriptor.fields {
        let FieldType::Reference(kind) = &field.field_type else {
            continue;
        };
        let Some(id) = doc.get(&field.name).and_then(Value::as_str) else {
            continue;
        };
        let target = registry
            .by_kind(kind)
            .ok_or_else(|| AppError::Internal(format!("field {}.{} references unknown kind {}", descriptor.kind, field.name, kind)))?;
        if store.find_by_id(&target.collection, id).await?.is_none() {
            errors.push(&field.name, format!("No {} for this id {}", kind, id));
        }
    }
    errors.into_result()
}

/// Unique fields must not collide with another document (`own_id` excluded on update).
async fn check_unique(
    store: &dyn DocumentStore,
    descriptor: &ResourceDescriptor,
    doc: &Document,
    own_id: Option<&str>,
) -> Result<(), AppError> {
    for field in descriptor.fields.iter().filter(|f| f.unique) {
        let Some(value) = doc.get(&field.name).and_then(Value::as_str) else {
            continue;
        };
        let hits = store
            .find_where_in(&descriptor.collection, &field.name, &[value.to_string()])
            .await?;
        let taken = hits
            .iter()
            .any(|d| d.get(ID_FIELD).and_then(Value::as_str) != own_id);
        if taken {
            return Err(AppError::Conflict(format!(
                "{} with {} '{}' already exists",
                descriptor.kind, field.name, value
            )));
        }
    }
    Ok(())
}
