//! Multipart intake: text fields coerced to the resource schema, image files normalized and
//! their stored filenames injected into the payload.

use crate::config::{FieldType, ImageFieldSpec, ResourceDescriptor};
use crate::error::AppError;
use crate::store::Document;
use crate::upload::processor::{ImageJob, ImageProcessor};
use axum::body::Bytes;
use futures::future::try_join_all;
use serde_json::Value;

#[derive(Clone, Debug)]
pub struct UploadedFile {
    /// Form field name, e.g. `imageCover` or `images[]`.
    pub field: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

/// Build a payload from form text fields. Values are coerced to the declared field type when
/// they parse; otherwise they stay strings and fail validation later. Array fields collect
/// every occurrence (`colors=a&colors=b` or `colors[]=...`). Empty values of non-string fields
/// are treated as absent.
pub fn coerce_form_fields(descriptor: &ResourceDescriptor, pairs: Vec<(String, String)>) -> Document {
    let mut doc = Document::new();
    for (raw_name, value) in pairs {
        let name = raw_name.strip_suffix("[]").unwrap_or(&raw_name).to_string();
        let Some(field) = descriptor.field(&name) else {
            doc.insert(name, Value::String(value));
            continue;
        };
        match &field.field_type {
            FieldType::StringArray | FieldType::ImageList => {
                let entry = doc.entry(name).or_insert_with(|| Value::Array(Vec::new()));
                if let Value::Array(items) = entry {
                    items.push(Value::String(value));
                }
            }
            FieldType::String | FieldType::Image => {
                doc.insert(name, Value::String(value));
            }
            _ if value.trim().is_empty() => {}
            FieldType::Number | FieldType::Integer => {
                doc.insert(name, parse_number(&value).unwrap_or(Value::String(value)));
            }
            FieldType::Boolean => {
                let v = match value.trim() {
                    "true" | "1" => Value::Bool(true),
                    "false" | "0" => Value::Bool(false),
                    _ => Value::String(value),
                };
                doc.insert(name, v);
            }
            FieldType::Reference(_) => {
                doc.insert(name, Value::String(value));
            }
        }
    }
    doc
}

fn parse_number(raw: &str) -> Option<Value> {
    let raw = raw.trim();
    if let Ok(i) = raw.parse::<i64>() {
        return Some(Value::from(i));
    }
    raw.parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .map(Value::from)
}

/// Normalize every uploaded file concurrently and store the resulting filenames in `payload`.
/// Single-image fields get one filename; list fields get filenames in upload order. Fields
/// without files are left untouched. Any failure aborts the whole intake.
pub async fn apply_uploads(
    processor: &dyn ImageProcessor,
    descriptor: &ResourceDescriptor,
    files: Vec<UploadedFile>,
    payload: &mut Document,
) -> Result<(), AppError> {
    let mut groups: Vec<(&ImageFieldSpec, Vec<UploadedFile>)> = Vec::new();
    for file in files {
        let spec = descriptor
            .image_field(&file.field)
            .ok_or_else(|| AppError::BadRequest(format!("Unexpected file field: {}", file.field)))?;
        let is_image = file
            .content_type
            .as_deref()
            .map(|ct| ct.starts_with("image/"))
            .unwrap_or(false);
        if !is_image {
            return Err(AppError::BadRequest("Only images allowed".into()));
        }
        match groups.iter_mut().find(|(s, _)| s.field == spec.field) {
            Some((_, group)) => group.push(file),
            None => groups.push((spec, vec![file])),
        }
    }
    for (spec, group) in &groups {
        if group.len() > spec.max_count {
            return Err(AppError::BadRequest(format!(
                "Too many files for {}: at most {}",
                spec.field, spec.max_count
            )));
        }
    }

    let jobs = groups.iter().flat_map(|(spec, group)| {
        group.iter().enumerate().map(move |(i, file)| {
            let suffix = if spec.multiple {
                Some((i + 1).to_string())
            } else {
                spec.suffix.clone()
            };
            processor.normalize(ImageJob {
                kind: descriptor.kind.clone(),
                collection: descriptor.collection.clone(),
                width: spec.width,
                height: spec.height,
                suffix,
                bytes: file.bytes.clone(),
            })
        })
    });
    let mut names = try_join_all(jobs).await?.into_iter();

    for (spec, group) in &groups {
        let stored: Vec<Value> = names.by_ref().take(group.len()).map(Value::String).collect();
        let value = if spec.multiple {
            Value::Array(stored)
        } else {
            stored.into_iter().next().unwrap_or(Value::Null)
        };
        payload.insert(spec.field.clone(), value);
    }
    tracing::debug!(resource = %descriptor.kind, files = groups.iter().map(|(_, g)| g.len()).sum::<usize>(), "uploads normalized");
    Ok(())
}
