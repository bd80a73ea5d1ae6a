use chrono::Utc;

/// Stored filename for a normalized image: `{kind}-{uuid}-{millis}[-{suffix}].jpeg`.
pub fn image_filename(kind: &str, suffix: Option<&str>) -> String {
    let stamp = Utc::now().timestamp_millis();
    let id = uuid::Uuid::new_v4();
    match suffix {
        Some(s) => format!("{}-{}-{}-{}.jpeg", kind, id, stamp, s),
        None => format!("{}-{}-{}.jpeg", kind, id, stamp),
    }
}
