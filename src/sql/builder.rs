//! Builds parameterized statements over document collections.
//!
//! Each collection is a table `(seq BIGSERIAL, id TEXT PRIMARY KEY, doc JSONB NOT NULL)`.
//! Field names come from the resource registry only; every client value is a parameter.

use crate::query::{Filter, FilterOp, Keyword, QueryPlan, Scalar, SortDirection, ValueKind};
use serde_json::Value;

/// Quote identifier for PostgreSQL (safe: only from config).
fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Single-quoted SQL literal, for JSON keys taken from config.
fn literal(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// Full qualified table name.
fn qualified_table(schema: &str, table: &str) -> String {
    format!("{}.{}", quoted(schema), quoted(table))
}

#[derive(Debug)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<Value>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    fn push_param(&mut self, v: Value) -> u32 {
        let n = self.params.len() as u32 + 1;
        self.params.push(v);
        n
    }

    fn push_scalar(&mut self, s: &Scalar) -> String {
        let n = self.push_param(Value::String(s.to_text()));
        format!("${}::{}", n, pg_type(s.kind()))
    }
}

fn pg_type(kind: ValueKind) -> &'static str {
    match kind {
        ValueKind::Text => "text",
        ValueKind::Number => "numeric",
        ValueKind::Bool => "boolean",
    }
}

fn json_type(kind: ValueKind) -> &'static str {
    match kind {
        ValueKind::Text => "string",
        ValueKind::Number => "number",
        ValueKind::Bool => "boolean",
    }
}

/// Typed view of a jsonb expression; NULL when the stored value has another JSON type.
fn typed(json: &str, kind: ValueKind) -> String {
    format!(
        "(CASE WHEN jsonb_typeof({json}) = '{}' THEN ({json} #>> '{{}}')::{} END)",
        json_type(kind),
        pg_type(kind),
    )
}

fn field_json(field: &str) -> String {
    format!("doc->{}", literal(field))
}

/// One condition; `subject` is the typed expression being compared.
fn comparison(q: &mut QueryBuf, subject: &str, op: FilterOp, values: &[Scalar]) -> String {
    match op {
        FilterOp::In => {
            let list: Vec<String> = values.iter().map(|v| q.push_scalar(v)).collect();
            format!("{} IN ({})", subject, list.join(", "))
        }
        _ => {
            let rhs = values.first().map(|v| q.push_scalar(v)).unwrap_or_else(|| "NULL".into());
            format!("{} {} {}", subject, op.sql(), rhs)
        }
    }
}

fn filter_condition(q: &mut QueryBuf, f: &Filter) -> String {
    // ne is "no element equals", so missing fields match
    let (op, negate) = match f.op {
        FilterOp::Ne => (FilterOp::Eq, true),
        op => (op, false),
    };
    let positive = if f.array {
        let json = field_json(&f.field);
        let elements = format!(
            "jsonb_array_elements(CASE WHEN jsonb_typeof({json}) = 'array' THEN {json} ELSE jsonb_build_array({json}) END)"
        );
        let cond = comparison(q, &typed("e.v", f.kind), op, &f.values);
        format!("EXISTS (SELECT 1 FROM {} AS e(v) WHERE {})", elements, cond)
    } else {
        comparison(q, &typed(&field_json(&f.field), f.kind), op, &f.values)
    };
    if negate {
        format!("NOT COALESCE({}, false)", positive)
    } else {
        positive
    }
}

/// Escape LIKE wildcards so the term matches literally.
fn like_pattern(term: &str) -> String {
    let mut out = String::with_capacity(term.len() + 2);
    out.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('%');
    out
}

fn keyword_condition(q: &mut QueryBuf, k: &Keyword) -> String {
    let n = q.push_param(Value::String(like_pattern(&k.term)));
    let parts: Vec<String> = k
        .fields
        .iter()
        .map(|f| format!("{} ILIKE ${}", typed(&field_json(f), ValueKind::Text), n))
        .collect();
    format!("({})", parts.join(" OR "))
}

fn where_clause(q: &mut QueryBuf, plan: &QueryPlan) -> String {
    let mut parts: Vec<String> = plan.filters.iter().map(|f| filter_condition(q, f)).collect();
    if let Some(k) = &plan.keyword {
        parts.push(keyword_condition(q, k));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", parts.join(" AND "))
    }
}

fn order_clause(plan: &QueryPlan) -> String {
    let mut keys: Vec<String> = plan
        .sort
        .iter()
        .map(|k| {
            let dir = match k.direction {
                SortDirection::Asc => "ASC NULLS FIRST",
                SortDirection::Desc => "DESC NULLS LAST",
            };
            format!("{} {}", typed(&field_json(&k.field), k.kind), dir)
        })
        .collect();
    keys.push(quoted("seq"));
    format!(" ORDER BY {}", keys.join(", "))
}

/// CREATE SCHEMA IF NOT EXISTS.
pub fn create_schema(schema: &str) -> String {
    format!("CREATE SCHEMA IF NOT EXISTS {}", quoted(schema))
}

/// CREATE TABLE IF NOT EXISTS for one collection.
pub fn create_collection(schema: &str, collection: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {} (seq BIGSERIAL, id TEXT PRIMARY KEY, doc JSONB NOT NULL)",
        qualified_table(schema, collection)
    )
}

/// Index name enforcing uniqueness of one document field.
pub fn unique_index_name(collection: &str, field: &str) -> String {
    format!("{}_{}_unique", collection, field)
}

/// CREATE UNIQUE INDEX IF NOT EXISTS over `doc->>'field'`. Missing values are NULL and never collide.
pub fn create_unique_index(schema: &str, collection: &str, field: &str) -> String {
    format!(
        "CREATE UNIQUE INDEX IF NOT EXISTS {} ON {} ((doc->>{}))",
        quoted(&unique_index_name(collection, field)),
        qualified_table(schema, collection),
        literal(field)
    )
}

/// SELECT by id. Caller adds id as sole param.
pub fn select_by_id(schema: &str, collection: &str) -> QueryBuf {
    let mut q = QueryBuf::new();
    q.sql = format!("SELECT doc FROM {} WHERE id = $1", qualified_table(schema, collection));
    q
}

/// SELECT one page of matching documents in plan order, ties broken by insertion order.
pub fn select_list(schema: &str, collection: &str, plan: &QueryPlan) -> QueryBuf {
    let mut q = QueryBuf::new();
    let table = qualified_table(schema, collection);
    let where_clause = where_clause(&mut q, plan);
    q.sql = format!(
        "SELECT doc FROM {}{}{} LIMIT {} OFFSET {}",
        table,
        where_clause,
        order_clause(plan),
        plan.pagination.limit,
        plan.pagination.skip()
    );
    q
}

/// COUNT of documents matching the plan's filters and keyword (pagination ignored).
pub fn count(schema: &str, collection: &str, plan: &QueryPlan) -> QueryBuf {
    let mut q = QueryBuf::new();
    let table = qualified_table(schema, collection);
    let where_clause = where_clause(&mut q, plan);
    q.sql = format!("SELECT COUNT(*) FROM {}{}", table, where_clause);
    q
}

/// SELECT documents whose `field` equals any of `values` (string comparison), insertion order.
/// Used for batch-fetching related documents.
pub fn select_where_in(schema: &str, collection: &str, field: &str, values: &[String]) -> QueryBuf {
    let mut q = QueryBuf::new();
    let table = qualified_table(schema, collection);
    if values.is_empty() {
        q.sql = format!("SELECT doc FROM {} WHERE 1 = 0", table);
        return q;
    }
    let subject = if field == "id" {
        "id".to_string()
    } else {
        format!("doc->>{}", literal(field))
    };
    let placeholders: Vec<String> = values
        .iter()
        .map(|v| format!("${}", q.push_param(Value::String(v.clone()))))
        .collect();
    q.sql = format!(
        "SELECT doc FROM {} WHERE {} IN ({}) ORDER BY {}",
        table,
        subject,
        placeholders.join(", "),
        quoted("seq")
    );
    q
}

/// INSERT. Caller adds id and document as params.
pub fn insert(schema: &str, collection: &str) -> QueryBuf {
    let mut q = QueryBuf::new();
    q.sql = format!(
        "INSERT INTO {} (id, doc) VALUES ($1, $2::jsonb) RETURNING doc",
        qualified_table(schema, collection)
    );
    q
}

/// UPDATE by id, merging the patch into the stored document in one statement.
/// Caller adds id and patch as params.
pub fn update(schema: &str, collection: &str) -> QueryBuf {
    let mut q = QueryBuf::new();
    q.sql = format!(
        "UPDATE {} SET doc = doc || $2::jsonb WHERE id = $1 RETURNING doc",
        qualified_table(schema, collection)
    );
    q
}

/// DELETE by id. Caller adds id as sole param.
pub fn delete(schema: &str, collection: &str) -> QueryBuf {
    let mut q = QueryBuf::new();
    q.sql = format!("DELETE FROM {} WHERE id = $1", qualified_table(schema, collection));
    q
}
