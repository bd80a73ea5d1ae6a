//! Config validation: referential integrity and field consistency.

use crate::config::{FieldConfig, FieldTypeConfig, FullConfig, ResourceConfig};
use crate::config::resolved::SYSTEM_FIELDS;
use crate::error::ConfigError;
use regex::Regex;
use std::collections::{HashMap, HashSet};

/// Field, kind and collection names end up inside SQL text, so they are held to a strict shape.
fn identifier_re() -> Result<Regex, ConfigError> {
    Regex::new(r"^[A-Za-z][A-Za-z0-9_]{0,62}$").map_err(|e| ConfigError::Validation(e.to_string()))
}

fn path_segment_re() -> Result<Regex, ConfigError> {
    Regex::new(r"^[a-z][a-z0-9_-]{0,62}$").map_err(|e| ConfigError::Validation(e.to_string()))
}

fn check_identifier(re: &Regex, name: &str) -> Result<(), ConfigError> {
    if re.is_match(name) {
        Ok(())
    } else {
        Err(ConfigError::InvalidIdentifier(name.to_string()))
    }
}

pub fn validate(config: &FullConfig) -> Result<(), ConfigError> {
    if config.resources.is_empty() {
        return Err(ConfigError::Validation("at least one resource required".into()));
    }
    let ident = identifier_re()?;
    let path_re = path_segment_re()?;

    let mut kinds = HashSet::new();
    let mut paths = HashSet::new();
    let mut collections = HashSet::new();
    for r in &config.resources {
        check_identifier(&ident, &r.kind)?;
        if !path_re.is_match(&r.path_segment) {
            return Err(ConfigError::InvalidIdentifier(r.path_segment.clone()));
        }
        let collection = r.collection.as_deref().unwrap_or(&r.path_segment);
        check_identifier(&ident, collection)?;
        if !kinds.insert(r.kind.as_str()) {
            return Err(ConfigError::Duplicate { kind: "resource kind", name: r.kind.clone() });
        }
        if !paths.insert(r.path_segment.as_str()) {
            return Err(ConfigError::Duplicate { kind: "path segment", name: r.path_segment.clone() });
        }
        if !collections.insert(collection) {
            return Err(ConfigError::Duplicate { kind: "collection", name: collection.to_string() });
        }
    }

    let fields_by_kind: HashMap<&str, HashMap<&str, &FieldConfig>> = config
        .resources
        .iter()
        .map(|r| (r.kind.as_str(), r.fields.iter().map(|f| (f.name.as_str(), f)).collect()))
        .collect();

    for r in &config.resources {
        validate_resource(r, &fields_by_kind, &ident)?;
    }
    Ok(())
}

fn validate_resource(
    r: &ResourceConfig,
    fields_by_kind: &HashMap<&str, HashMap<&str, &FieldConfig>>,
    ident: &Regex,
) -> Result<(), ConfigError> {
    let mut names = HashSet::new();
    for f in &r.fields {
        check_identifier(ident, &f.name)?;
        if SYSTEM_FIELDS.contains(&f.name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "{}.{} is a reserved field name",
                r.kind, f.name
            )));
        }
        if !names.insert(f.name.as_str()) {
            return Err(ConfigError::Duplicate { kind: "field", name: format!("{}.{}", r.kind, f.name) });
        }
    }
    let own = &fields_by_kind[r.kind.as_str()];
    let field_of = |name: &str| own.get(name).copied();
    let is_numeric = |f: &FieldConfig| matches!(f.type_, FieldTypeConfig::Number | FieldTypeConfig::Integer);

    for f in &r.fields {
        match (&f.type_, &f.references) {
            (FieldTypeConfig::Reference, Some(target)) => {
                if !fields_by_kind.contains_key(target.as_str()) {
                    return Err(ConfigError::MissingReference { kind: "resource", id: target.clone() });
                }
            }
            (FieldTypeConfig::Reference, None) => {
                return Err(ConfigError::Validation(format!(
                    "{}.{}: reference fields need 'references'",
                    r.kind, f.name
                )));
            }
            _ => {}
        }
        if let Some(source) = &f.slug_of {
            let ok = f.type_ == FieldTypeConfig::String
                && field_of(source).map(|s| s.type_ == FieldTypeConfig::String).unwrap_or(false);
            if !ok {
                return Err(ConfigError::Validation(format!(
                    "{}.{}: slug_of must name a string field",
                    r.kind, f.name
                )));
            }
        }
        if let Some(pattern) = &f.validation.pattern {
            Regex::new(pattern).map_err(|e| {
                ConfigError::Validation(format!("{}.{}: invalid pattern: {}", r.kind, f.name, e))
            })?;
        }
        if let Some(other) = &f.validation.less_than {
            let ok = is_numeric(f) && field_of(other).map(is_numeric).unwrap_or(false);
            if !ok {
                return Err(ConfigError::Validation(format!(
                    "{}.{}: less_than must compare two numeric fields",
                    r.kind, f.name
                )));
            }
        }
    }

    for s in &r.searchable {
        if field_of(s).map(|f| f.type_ != FieldTypeConfig::String).unwrap_or(true) {
            return Err(ConfigError::Validation(format!(
                "{}: searchable field '{}' must be a string field",
                r.kind, s
            )));
        }
    }
    for name in r.filterable.iter().flatten() {
        if field_of(name).is_none() && !SYSTEM_FIELDS.contains(&name.as_str()) {
            return Err(ConfigError::MissingReference { kind: "filterable field", id: format!("{}.{}", r.kind, name) });
        }
    }

    let mut relation_names = HashSet::new();
    for rel in &r.relations {
        if !relation_names.insert(rel.name.as_str()) {
            return Err(ConfigError::Duplicate { kind: "relation", name: format!("{}.{}", r.kind, rel.name) });
        }
        let Some(target) = fields_by_kind.get(rel.resource.as_str()) else {
            return Err(ConfigError::MissingReference { kind: "resource", id: rel.resource.clone() });
        };
        let local_ok = rel.local_field == "id" || own.contains_key(rel.local_field.as_str());
        let foreign_ok = rel.foreign_field == "id" || target.contains_key(rel.foreign_field.as_str());
        if !local_ok || !foreign_ok {
            return Err(ConfigError::MissingReference {
                kind: "relation field",
                id: format!("{}.{}", r.kind, rel.name),
            });
        }
    }

    for img in &r.images {
        let Some(f) = field_of(&img.field) else {
            return Err(ConfigError::MissingReference { kind: "image field", id: format!("{}.{}", r.kind, img.field) });
        };
        let ok = match f.type_ {
            FieldTypeConfig::Image => img.max_count == 1,
            FieldTypeConfig::ImageList => img.max_count >= 1,
            _ => false,
        };
        if !ok || img.width == 0 || img.height == 0 {
            return Err(ConfigError::Validation(format!(
                "{}.{}: image config does not match field type or has empty dimensions",
                r.kind, img.field
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::builtin_config;

    #[test]
    fn builtin_config_is_valid() {
        validate(&builtin_config().unwrap()).unwrap();
    }

    #[test]
    fn rejects_duplicate_path_segments() {
        let mut config = builtin_config().unwrap();
        config.resources[1].path_segment = "brands".into();
        assert!(matches!(validate(&config), Err(ConfigError::Duplicate { kind: "path segment", .. })));
    }

    #[test]
    fn rejects_reference_to_unknown_kind() {
        let mut config = builtin_config().unwrap();
        let product = config.resources.iter_mut().find(|r| r.kind == "product").unwrap();
        let brand = product.fields.iter_mut().find(|f| f.name == "brand").unwrap();
        brand.references = Some("manufacturer".into());
        assert!(matches!(validate(&config), Err(ConfigError::MissingReference { kind: "resource", .. })));
    }

    #[test]
    fn rejects_field_names_that_are_not_identifiers() {
        let mut config = builtin_config().unwrap();
        config.resources[0].fields[0].name = "name'); DROP".into();
        assert!(matches!(validate(&config), Err(ConfigError::InvalidIdentifier(_))));
    }

    #[test]
    fn rejects_reserved_field_names() {
        let mut config = builtin_config().unwrap();
        config.resources[0].fields[0].name = "createdAt".into();
        assert!(matches!(validate(&config), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn rejects_image_config_on_text_field() {
        let mut config = builtin_config().unwrap();
        config.resources[0].images[0].field = "name".into();
        assert!(matches!(validate(&config), Err(ConfigError::Validation(_))));
    }
}
