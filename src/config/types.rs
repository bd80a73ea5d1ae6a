//! Raw resource configuration as read from JSON (`config/resources.json` or `RESOURCES_PATH`).

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldTypeConfig {
    String,
    Number,
    Integer,
    Boolean,
    StringArray,
    /// Identifier of a document of another resource kind; see `FieldConfig::references`.
    Reference,
    /// Stored filename of one normalized image.
    Image,
    /// Stored filenames of several normalized images, in upload order.
    ImageList,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ValidationRule {
    #[serde(default)]
    pub required: Option<bool>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub max_length: Option<u32>,
    #[serde(default)]
    pub min_length: Option<u32>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub allowed: Option<Vec<Value>>,
    #[serde(default)]
    pub minimum: Option<f64>,
    #[serde(default)]
    pub maximum: Option<f64>,
    /// Numeric field whose value this one must stay below (e.g. a discounted price).
    #[serde(default)]
    pub less_than: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FieldConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub type_: FieldTypeConfig,
    /// Target resource kind for `reference` fields.
    #[serde(default)]
    pub references: Option<String>,
    #[serde(default)]
    pub unique: bool,
    /// Source field this slug is derived from.
    #[serde(default)]
    pub slug_of: Option<String>,
    #[serde(default)]
    pub default: Option<Value>,
    #[serde(default)]
    pub validation: ValidationRule,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RelationConfig {
    /// Name used in `?populate=`.
    pub name: String,
    /// Related resource kind.
    pub resource: String,
    pub local_field: String,
    #[serde(default = "default_id_field")]
    pub foreign_field: String,
    /// true: many related documents point at us; false: we point at one.
    #[serde(default)]
    pub many: bool,
}

fn default_id_field() -> String {
    "id".into()
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ImageFieldConfig {
    pub field: String,
    pub width: u32,
    pub height: u32,
    #[serde(default = "default_max_count")]
    pub max_count: usize,
    /// Filename suffix for single images; list images use their 1-based position.
    #[serde(default)]
    pub suffix: Option<String>,
}

fn default_max_count() -> usize {
    1
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResourceConfig {
    pub kind: String,
    pub path_segment: String,
    /// Defaults to the path segment.
    #[serde(default)]
    pub collection: Option<String>,
    pub fields: Vec<FieldConfig>,
    #[serde(default)]
    pub searchable: Vec<String>,
    /// Whitelisted filter fields. Defaults to every non-image field.
    #[serde(default)]
    pub filterable: Option<Vec<String>>,
    #[serde(default)]
    pub relations: Vec<RelationConfig>,
    #[serde(default)]
    pub images: Vec<ImageFieldConfig>,
}

/// Whole registry configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FullConfig {
    pub resources: Vec<ResourceConfig>,
}
