//! Resolved resource registry: config validated and flattened for runtime use.

use crate::config::ValidationRule;
use crate::query::ValueKind;
use serde_json::Value;
use std::collections::{HashMap, HashSet};

/// Server-assigned identifier field.
pub const ID_FIELD: &str = "id";
pub const CREATED_AT_FIELD: &str = "createdAt";
pub const UPDATED_AT_FIELD: &str = "updatedAt";
/// Fields every document carries and clients can never write.
pub const SYSTEM_FIELDS: [&str; 3] = [ID_FIELD, CREATED_AT_FIELD, UPDATED_AT_FIELD];

#[derive(Clone, Debug, PartialEq)]
pub enum FieldType {
    String,
    Number,
    Integer,
    Boolean,
    StringArray,
    /// Holds the id of a document of the named resource kind.
    Reference(String),
    Image,
    ImageList,
}

impl FieldType {
    /// Kind of the scalar values stored under this field (array fields: their elements).
    pub fn value_kind(&self) -> ValueKind {
        match self {
            FieldType::Number | FieldType::Integer => ValueKind::Number,
            FieldType::Boolean => ValueKind::Bool,
            _ => ValueKind::Text,
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(self, FieldType::StringArray | FieldType::ImageList)
    }

    pub fn is_image(&self) -> bool {
        matches!(self, FieldType::Image | FieldType::ImageList)
    }
}

#[derive(Clone, Debug)]
pub struct FieldSpec {
    pub name: String,
    pub field_type: FieldType,
    pub unique: bool,
    pub slug_of: Option<String>,
    pub default: Option<Value>,
    pub rule: ValidationRule,
}

impl FieldSpec {
    pub fn is_required(&self) -> bool {
        self.rule.required == Some(true)
    }
}

/// Direction of a populatable relation: to_one (we hold their id) or to_many (they hold ours).
#[derive(Clone, Debug, PartialEq)]
pub enum RelationDirection {
    ToOne,
    ToMany,
}

#[derive(Clone, Debug)]
pub struct RelationSpec {
    /// Name accepted by `?populate=`; the populated value is stored under it.
    pub name: String,
    pub direction: RelationDirection,
    pub related_kind: String,
    /// Our field used in the join (our reference for to_one; usually our id for to_many).
    pub our_key: String,
    /// Their field used in the join (their id for to_one; their reference for to_many).
    pub their_key: String,
}

#[derive(Clone, Debug)]
pub struct ImageFieldSpec {
    pub field: String,
    pub width: u32,
    pub height: u32,
    pub max_count: usize,
    /// true for `image_list` fields.
    pub multiple: bool,
    pub suffix: Option<String>,
}

#[derive(Clone, Debug)]
pub struct ResourceDescriptor {
    pub kind: String,
    pub path_segment: String,
    pub collection: String,
    pub fields: Vec<FieldSpec>,
    /// Text fields matched by `?keyword=`.
    pub searchable: Vec<String>,
    pub filterable: HashSet<String>,
    pub relations: Vec<RelationSpec>,
    pub images: Vec<ImageFieldSpec>,
}

impl ResourceDescriptor {
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn relation(&self, name: &str) -> Option<&RelationSpec> {
        self.relations.iter().find(|r| r.name == name)
    }

    /// Image field accepting uploads under `name` (`images[]` is accepted for `images`).
    pub fn image_field(&self, name: &str) -> Option<&ImageFieldSpec> {
        let name = name.strip_suffix("[]").unwrap_or(name);
        self.images.iter().find(|i| i.field == name)
    }

    /// Value kind of a stored or system field; None for unknown fields.
    pub fn value_kind(&self, name: &str) -> Option<ValueKind> {
        if SYSTEM_FIELDS.contains(&name) {
            return Some(ValueKind::Text);
        }
        self.field(name).map(|f| f.field_type.value_kind())
    }

    pub fn is_filterable(&self, name: &str) -> bool {
        self.filterable.contains(name)
    }

    /// Scalar schema fields and system fields can be sorted on; array fields cannot.
    pub fn is_sortable(&self, name: &str) -> bool {
        SYSTEM_FIELDS.contains(&name) || self.field(name).map(|f| !f.field_type.is_array()).unwrap_or(false)
    }

    /// Schema or system field name, as accepted by `?fields=`.
    pub fn is_known_field(&self, name: &str) -> bool {
        SYSTEM_FIELDS.contains(&name) || self.field(name).is_some()
    }
}

#[derive(Clone, Debug, Default)]
pub struct ResourceRegistry {
    pub resources: Vec<ResourceDescriptor>,
    by_path: HashMap<String, usize>,
    by_kind: HashMap<String, usize>,
}

impl ResourceRegistry {
    pub fn new(resources: Vec<ResourceDescriptor>) -> Self {
        let by_path = resources
            .iter()
            .enumerate()
            .map(|(i, r)| (r.path_segment.clone(), i))
            .collect();
        let by_kind = resources
            .iter()
            .enumerate()
            .map(|(i, r)| (r.kind.clone(), i))
            .collect();
        ResourceRegistry {
            resources,
            by_path,
            by_kind,
        }
    }

    pub fn by_path(&self, path: &str) -> Option<&ResourceDescriptor> {
        self.by_path.get(path).map(|&i| &self.resources[i])
    }

    pub fn by_kind(&self, kind: &str) -> Option<&ResourceDescriptor> {
        self.by_kind.get(kind).map(|&i| &self.resources[i])
    }
}
