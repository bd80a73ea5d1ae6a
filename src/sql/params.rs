//! Convert serde_json::Value to a value sqlx can bind.
//!
//! Every parameter travels as TEXT; statements cast it to the type they compare against
//! (`$1::numeric`, `$2::jsonb`), so the declared and the encoded type always agree.

use serde_json::Value;
use sqlx::encode::{Encode, IsNull};
use sqlx::postgres::{PgTypeInfo, Postgres};
use sqlx::Database;

#[derive(Clone, Debug, PartialEq)]
pub enum PgBindValue {
    Null,
    Text(String),
}

impl From<&Value> for PgBindValue {
    fn from(v: &Value) -> Self {
        match v {
            Value::Null => PgBindValue::Null,
            Value::String(s) => PgBindValue::Text(s.clone()),
            // numbers, booleans, arrays and objects: their JSON text
            other => PgBindValue::Text(other.to_string()),
        }
    }
}

impl<'q> Encode<'q, Postgres> for PgBindValue {
    fn encode_by_ref(
        &self,
        buf: &mut <Postgres as Database>::ArgumentBuffer<'q>,
    ) -> Result<IsNull, Box<dyn std::error::Error + Send + Sync>> {
        match self {
            PgBindValue::Null => Ok(IsNull::Yes),
            PgBindValue::Text(s) => <&str as Encode<Postgres>>::encode_by_ref(&s.as_str(), buf),
        }
    }
}

impl sqlx::Type<Postgres> for PgBindValue {
    fn type_info() -> PgTypeInfo {
        PgTypeInfo::with_name("TEXT")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_values_become_text() {
        assert_eq!(PgBindValue::from(&json!(null)), PgBindValue::Null);
        assert_eq!(PgBindValue::from(&json!("abc")), PgBindValue::Text("abc".into()));
        assert_eq!(PgBindValue::from(&json!(12.5)), PgBindValue::Text("12.5".into()));
        assert_eq!(PgBindValue::from(&json!(true)), PgBindValue::Text("true".into()));
        assert_eq!(
            PgBindValue::from(&json!({"name": "x"})),
            PgBindValue::Text("{\"name\":\"x\"}".into())
        );
    }
}
