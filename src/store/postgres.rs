//! PostgreSQL backend: one `(seq, id, doc JSONB)` table per collection, in a configured schema.

use super::{document_id, Document, DocumentStore, StoreError};
use crate::config::ResourceRegistry;
use crate::query::QueryPlan;
use crate::sql::{self, PgBindValue, QueryBuf};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{ConnectOptions, PgPool, Row};
use std::str::FromStr;

#[derive(Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
    schema: String,
}

impl PgDocumentStore {
    pub fn new(pool: PgPool, schema: impl Into<String>) -> Self {
        PgDocumentStore {
            pool,
            schema: schema.into(),
        }
    }

    /// Create the database if needed, open a pool and create missing collection tables.
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        schema: &str,
        registry: &ResourceRegistry,
    ) -> Result<Self, StoreError> {
        ensure_database_exists(database_url).await?;
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        ensure_collections(&pool, schema, registry).await?;
        Ok(PgDocumentStore::new(pool, schema))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn fetch_docs(&self, collection: &str, q: &QueryBuf) -> Result<Vec<Document>, StoreError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(PgBindValue::from(p));
        }
        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(|r| row_to_document(collection, r)).collect()
    }

    async fn fetch_doc(&self, collection: &str, q: &QueryBuf) -> Result<Option<Document>, StoreError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(PgBindValue::from(p));
        }
        let row = query.fetch_optional(&self.pool).await?;
        row.map(|r| row_to_document(collection, &r)).transpose()
    }
}

/// Unique violations on a field index become `UniqueViolation`; on the primary key, `DuplicateId`.
fn map_unique_violation(collection: &str, id: &str, err: StoreError) -> StoreError {
    match err {
        StoreError::Db(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            unique_violation(collection, id, e.constraint())
        }
        other => other,
    }
}

fn unique_violation(collection: &str, id: &str, constraint: Option<&str>) -> StoreError {
    let field = constraint
        .and_then(|c| c.strip_prefix(collection))
        .and_then(|c| c.strip_prefix('_'))
        .and_then(|c| c.strip_suffix("_unique"));
    match field {
        Some(field) => StoreError::UniqueViolation {
            collection: collection.to_string(),
            field: field.to_string(),
        },
        None => StoreError::DuplicateId {
            collection: collection.to_string(),
            id: id.to_string(),
        },
    }
}

fn row_to_document(collection: &str, row: &PgRow) -> Result<Document, StoreError> {
    let doc: Value = row.try_get("doc")?;
    match doc {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::Corrupt {
            collection: collection.to_string(),
            reason: format!("expected object, found {}", other),
        }),
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn count(&self, collection: &str, plan: &QueryPlan) -> Result<u64, StoreError> {
        let q = sql::count(&self.schema, collection, plan);
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query_scalar::<_, i64>(&q.sql);
        for p in &q.params {
            query = query.bind(PgBindValue::from(p));
        }
        let n = query.fetch_one(&self.pool).await?;
        Ok(u64::try_from(n).unwrap_or(0))
    }

    async fn find(&self, collection: &str, plan: &QueryPlan) -> Result<Vec<Document>, StoreError> {
        let q = sql::select_list(&self.schema, collection, plan);
        self.fetch_docs(collection, &q).await
    }

    async fn find_by_id(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let mut q = sql::select_by_id(&self.schema, collection);
        q.params.push(Value::String(id.to_string()));
        self.fetch_doc(collection, &q).await
    }

    async fn find_where_in(
        &self,
        collection: &str,
        field: &str,
        values: &[String],
    ) -> Result<Vec<Document>, StoreError> {
        let q = sql::select_where_in(&self.schema, collection, field, values);
        self.fetch_docs(collection, &q).await
    }

    async fn insert(&self, collection: &str, doc: Document) -> Result<Document, StoreError> {
        let id = document_id(collection, &doc)?;
        let mut q = sql::insert(&self.schema, collection);
        q.params.push(Value::String(id.clone()));
        q.params.push(Value::Object(doc));
        match self.fetch_doc(collection, &q).await {
            Ok(Some(stored)) => Ok(stored),
            Ok(None) => Err(StoreError::Corrupt {
                collection: collection.to_string(),
                reason: "insert returned no row".into(),
            }),
            Err(e) => Err(map_unique_violation(collection, &id, e)),
        }
    }

    async fn update(&self, collection: &str, id: &str, patch: Document) -> Result<Option<Document>, StoreError> {
        let mut q = sql::update(&self.schema, collection);
        q.params.push(Value::String(id.to_string()));
        q.params.push(Value::Object(patch));
        self.fetch_doc(collection, &q)
            .await
            .map_err(|e| map_unique_violation(collection, id, e))
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool, StoreError> {
        let q = sql::delete(&self.schema, collection);
        tracing::debug!(sql = %q.sql, id = %id, "query");
        let result = sqlx::query(&q.sql).bind(id).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Create the schema, one table per registered collection and one unique index per
/// `unique` field, if missing.
pub async fn ensure_collections(pool: &PgPool, schema: &str, registry: &ResourceRegistry) -> Result<(), StoreError> {
    sqlx::query(&sql::create_schema(schema)).execute(pool).await?;
    for resource in &registry.resources {
        let collection = resource.collection.as_str();
        sqlx::query(&sql::create_collection(schema, collection))
            .execute(pool)
            .await?;
        for field in resource.fields.iter().filter(|f| f.unique) {
            sqlx::query(&sql::create_unique_index(schema, collection, &field.name))
                .execute(pool)
                .await?;
        }
        tracing::debug!(schema = %schema, collection = %collection, "collection ready");
    }
    Ok(())
}

/// Ensure the database in `database_url` exists; create it if not. Connects to the
/// default `postgres` database to run CREATE DATABASE. Call before creating the main pool.
pub async fn ensure_database_exists(database_url: &str) -> Result<(), StoreError> {
    let (admin_url, db_name) = parse_db_name_from_url(database_url)?;
    if db_name.is_empty() || db_name == "postgres" {
        return Ok(());
    }
    let opts = sqlx::postgres::PgConnectOptions::from_str(&admin_url)
        .map_err(|e| StoreError::InvalidUrl(e.to_string()))?;
    let mut conn: sqlx::PgConnection = opts.connect().await?;
    let exists: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
        .bind(&db_name)
        .fetch_one(&mut conn)
        .await?;
    if !exists.0 {
        tracing::info!(database = %db_name, "creating database");
        sqlx::query(&format!("CREATE DATABASE {}", quote_ident(&db_name)))
            .execute(&mut conn)
            .await?;
    }
    Ok(())
}

fn parse_db_name_from_url(url: &str) -> Result<(String, String), StoreError> {
    let scheme_end = url.find("://").map(|i| i + 3).unwrap_or(0);
    let path_start = url
        .get(scheme_end..)
        .and_then(|rest| rest.find('/'))
        .map(|i| scheme_end + i + 1)
        .ok_or_else(|| StoreError::InvalidUrl("no database path".into()))?;
    let path_and_query = url.get(path_start..).unwrap_or("");
    let mut parts = path_and_query.splitn(2, '?');
    let db_name = parts.next().unwrap_or("").trim().to_string();
    let query = parts.next().map(|q| format!("?{}", q)).unwrap_or_default();
    let base = url.get(..path_start).unwrap_or(url);
    Ok((format!("{}postgres{}", base, query), db_name))
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
