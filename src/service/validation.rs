//! Payload validation from resource field specs. Every offending field is reported, not just the first.

use crate::config::{FieldSpec, FieldType, ResourceDescriptor, ValidationRule};
use crate::error::{AppError, ValidationErrors};
use crate::store::Document;
use regex::Regex;
use serde_json::Value;

pub struct RequestValidator;

impl RequestValidator {
    /// Validate a complete document for create. All required fields must be present.
    pub fn validate(doc: &Document, descriptor: &ResourceDescriptor) -> Result<(), AppError> {
        let mut errors = ValidationErrors::default();
        for field in &descriptor.fields {
            let val = doc.get(&field.name);
            if field.is_required() && val.map(Value::is_null).unwrap_or(true) {
                errors.push(&field.name, format!("{} is required", field.name));
                continue;
            }
            if let Some(v) = val {
                validate_field(field, v, doc, &mut errors)?;
            }
        }
        errors.into_result()
    }

    /// Validate only the fields present in `patch` (for update). `merged` is the document as it
    /// will be stored, used for cross-field rules. Required fields may be omitted but not cleared.
    pub fn validate_partial(patch: &Document, merged: &Document, descriptor: &ResourceDescriptor) -> Result<(), AppError> {
        let mut errors = ValidationErrors::default();
        for field in &descriptor.fields {
            let Some(v) = patch.get(&field.name) else {
                // a patched bound still has to hold for the untouched field
                if let Some(other) = &field.rule.less_than {
                    if patch.contains_key(other) {
                        if let Some(current) = merged.get(&field.name) {
                            check_less_than(field, current, other, merged, &mut errors);
                        }
                    }
                }
                continue;
            };
            if field.is_required() && v.is_null() {
                errors.push(&field.name, format!("{} is required", field.name));
                continue;
            }
            validate_field(field, v, merged, &mut errors)?;
        }
        errors.into_result()
    }
}

fn validate_field(field: &FieldSpec, v: &Value, doc: &Document, errors: &mut ValidationErrors) -> Result<(), AppError> {
    if v.is_null() {
        return Ok(());
    }
    if let Err(message) = check_type(&field.name, &field.field_type, v) {
        errors.push(&field.name, message);
        return Ok(());
    }
    let before = errors.0.len();
    match v {
        Value::Array(items) => {
            for item in items {
                check_rule(&field.name, item, &field.rule, errors)?;
                if errors.0.len() > before {
                    break;
                }
            }
        }
        _ => check_rule(&field.name, v, &field.rule, errors)?,
    }
    if errors.0.len() == before {
        if let Some(other) = &field.rule.less_than {
            check_less_than(field, v, other, doc, errors);
        }
    }
    Ok(())
}

fn check_type(name: &str, field_type: &FieldType, v: &Value) -> Result<(), String> {
    let ok = match field_type {
        FieldType::String | FieldType::Image => v.is_string(),
        FieldType::Number => v.is_number(),
        FieldType::Integer => v.as_f64().map(|n| n.fract() == 0.0).unwrap_or(false),
        FieldType::Boolean => v.is_boolean(),
        FieldType::StringArray | FieldType::ImageList => v
            .as_array()
            .map(|items| items.iter().all(Value::is_string))
            .unwrap_or(false),
        FieldType::Reference(_) => {
            return match v.as_str() {
                Some(s) if uuid::Uuid::parse_str(s).is_ok() => Ok(()),
                _ => Err(format!("{} must be a valid id", name)),
            };
        }
    };
    if ok {
        Ok(())
    } else {
        Err(format!("{} must be {}", name, type_name(field_type)))
    }
}

fn type_name(field_type: &FieldType) -> &'static str {
    match field_type {
        FieldType::String | FieldType::Image => "a string",
        FieldType::Number => "a number",
        FieldType::Integer => "an integer",
        FieldType::Boolean => "a boolean",
        FieldType::StringArray | FieldType::ImageList => "a list of strings",
        FieldType::Reference(_) => "a valid id",
    }
}

fn check_rule(col: &str, v: &Value, rule: &ValidationRule, errors: &mut ValidationErrors) -> Result<(), AppError> {
    if let Some(format) = &rule.format {
        if let Some(message) = check_format(col, v, format) {
            errors.push(col, message);
            return Ok(());
        }
    }
    if let Some(s) = v.as_str() {
        let len = s.chars().count();
        if let Some(max) = rule.max_length {
            if len > max as usize {
                errors.push(col, format!("{} must be at most {} characters", col, max));
                return Ok(());
            }
        }
        if let Some(min) = rule.min_length {
            if len < min as usize {
                errors.push(col, format!("{} must be at least {} characters", col, min));
                return Ok(());
            }
        }
        if let Some(pattern) = &rule.pattern {
            let re = Regex::new(pattern).map_err(|e| AppError::Internal(format!("pattern for {}: {}", col, e)))?;
            if !re.is_match(s) {
                errors.push(col, format!("{} does not match required pattern", col));
                return Ok(());
            }
        }
    }
    if let Some(allowed) = &rule.allowed {
        if !allowed.iter().any(|a| value_eq(v, a)) {
            errors.push(
                col,
                format!("{} must be one of: {:?}", col, allowed.iter().take(5).collect::<Vec<_>>()),
            );
            return Ok(());
        }
    }
    if let Some(n) = v.as_f64() {
        if let Some(min) = rule.minimum {
            if n < min {
                errors.push(col, format!("{} must be at least {}", col, min));
                return Ok(());
            }
        }
        if let Some(max) = rule.maximum {
            if n > max {
                errors.push(col, format!("{} must be at most {}", col, max));
            }
        }
    }
    Ok(())
}

fn check_less_than(field: &FieldSpec, v: &Value, other: &str, doc: &Document, errors: &mut ValidationErrors) {
    let (Some(n), Some(bound)) = (v.as_f64(), doc.get(other).and_then(Value::as_f64)) else {
        return;
    };
    if n >= bound {
        errors.push(&field.name, format!("{} must be lower than {}", field.name, other));
    }
}

fn value_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::String(s), Value::String(t)) => s == t,
        (Value::Number(n), Value::Number(m)) => n.as_f64() == m.as_f64(),
        _ => a == b,
    }
}

fn check_format(col: &str, v: &Value, format: &str) -> Option<String> {
    let s = v.as_str()?;
    match format.to_lowercase().as_str() {
        "email" if !s.contains('@') || s.len() < 3 => Some(format!("{} must be a valid email", col)),
        "uuid" if uuid::Uuid::parse_str(s).is_err() => Some(format!("{} must be a valid UUID", col)),
        _ => None,
    }
}
