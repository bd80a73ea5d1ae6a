//! Load resource config from the embedded default or a JSON file, and resolve it into a registry.

use crate::config::resolved::{
    FieldSpec, FieldType, ImageFieldSpec, RelationDirection, RelationSpec, ResourceDescriptor, ResourceRegistry,
};
use crate::config::types::*;
use crate::config::validate;
use crate::error::ConfigError;
use std::collections::HashSet;
use std::path::Path;

const BUILTIN_RESOURCES: &str = include_str!("../../config/resources.json");

/// Brand, category and product resources shipped with the crate.
pub fn builtin_config() -> Result<FullConfig, ConfigError> {
    serde_json::from_str(BUILTIN_RESOURCES).map_err(|e| ConfigError::Load(format!("builtin resources: {}", e)))
}

/// Read a resources JSON file (same shape as `config/resources.json`).
pub async fn load_from_path(path: impl AsRef<Path>) -> Result<FullConfig, ConfigError> {
    let path = path.as_ref();
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
    serde_json::from_str(&raw).map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))
}

/// Build the registry from config (validates first).
pub fn resolve(config: &FullConfig) -> Result<ResourceRegistry, ConfigError> {
    validate(config)?;
    let resources = config
        .resources
        .iter()
        .map(resolve_resource)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ResourceRegistry::new(resources))
}

fn resolve_resource(r: &ResourceConfig) -> Result<ResourceDescriptor, ConfigError> {
    let fields: Vec<FieldSpec> = r
        .fields
        .iter()
        .map(|f| FieldSpec {
            name: f.name.clone(),
            field_type: field_type(f),
            unique: f.unique,
            slug_of: f.slug_of.clone(),
            default: f.default.clone(),
            rule: f.validation.clone(),
        })
        .collect();

    let filterable: HashSet<String> = match &r.filterable {
        Some(list) => list.iter().cloned().collect(),
        None => fields
            .iter()
            .filter(|f| !f.field_type.is_image())
            .map(|f| f.name.clone())
            .collect(),
    };

    let relations = r
        .relations
        .iter()
        .map(|rel| RelationSpec {
            name: rel.name.clone(),
            direction: if rel.many {
                RelationDirection::ToMany
            } else {
                RelationDirection::ToOne
            },
            related_kind: rel.resource.clone(),
            our_key: rel.local_field.clone(),
            their_key: rel.foreign_field.clone(),
        })
        .collect();

    let images = r
        .images
        .iter()
        .map(|img| {
            let multiple = fields
                .iter()
                .find(|f| f.name == img.field)
                .map(|f| f.field_type == FieldType::ImageList)
                .ok_or_else(|| ConfigError::MissingReference {
                    kind: "image field",
                    id: format!("{}.{}", r.kind, img.field),
                })?;
            Ok(ImageFieldSpec {
                field: img.field.clone(),
                width: img.width,
                height: img.height,
                max_count: img.max_count,
                multiple,
                suffix: img.suffix.clone(),
            })
        })
        .collect::<Result<Vec<_>, ConfigError>>()?;

    Ok(ResourceDescriptor {
        kind: r.kind.clone(),
        path_segment: r.path_segment.clone(),
        collection: r.collection.clone().unwrap_or_else(|| r.path_segment.clone()),
        fields,
        searchable: r.searchable.clone(),
        filterable,
        relations,
        images,
    })
}

fn field_type(f: &FieldConfig) -> FieldType {
    match f.type_ {
        FieldTypeConfig::String => FieldType::String,
        FieldTypeConfig::Number => FieldType::Number,
        FieldTypeConfig::Integer => FieldType::Integer,
        FieldTypeConfig::Boolean => FieldType::Boolean,
        FieldTypeConfig::StringArray => FieldType::StringArray,
        FieldTypeConfig::Reference => FieldType::Reference(f.references.clone().unwrap_or_default()),
        FieldTypeConfig::Image => FieldType::Image,
        FieldTypeConfig::ImageList => FieldType::ImageList,
    }
}
