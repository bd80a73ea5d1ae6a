//! Query Plan: the sanitized, store-ready form of a list request.
//!
//! Every value in a plan has already been checked against the resource whitelist and coerced
//! to the field's kind. Operators are a closed enum, so no client-supplied operator string can
//! ever reach a store. `MemoryStore` evaluates plans with [`QueryPlan::matches`] and
//! [`QueryPlan::compare`]; `PgDocumentStore` compiles them to SQL.

use crate::store::Document;
use serde::Serialize;
use serde_json::Value;
use std::cmp::Ordering;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueKind {
    Text,
    Number,
    Bool,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Scalar {
    Text(String),
    Number(f64),
    Bool(bool),
}

impl Scalar {
    /// Coerce a raw query-string value to `kind`. None when it does not fit.
    pub fn parse(kind: ValueKind, raw: &str) -> Option<Scalar> {
        match kind {
            ValueKind::Text => Some(Scalar::Text(raw.to_string())),
            ValueKind::Number => raw
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .map(Scalar::Number),
            ValueKind::Bool => match raw.trim().to_lowercase().as_str() {
                "true" | "1" => Some(Scalar::Bool(true)),
                "false" | "0" => Some(Scalar::Bool(false)),
                _ => None,
            },
        }
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            Scalar::Text(_) => ValueKind::Text,
            Scalar::Number(_) => ValueKind::Number,
            Scalar::Bool(_) => ValueKind::Bool,
        }
    }

    /// Ordering of a stored JSON value relative to this scalar; None when the types differ.
    pub fn cmp_stored(&self, stored: &Value) -> Option<Ordering> {
        match (self, stored) {
            (Scalar::Number(n), Value::Number(m)) => m.as_f64()?.partial_cmp(n),
            (Scalar::Text(s), Value::String(t)) => Some(t.as_str().cmp(s.as_str())),
            (Scalar::Bool(b), Value::Bool(c)) => Some(c.cmp(b)),
            _ => None,
        }
    }

    /// Text form used when binding to SQL (the statement casts it back).
    pub fn to_text(&self) -> String {
        match self {
            Scalar::Text(s) => s.clone(),
            Scalar::Number(n) => n.to_string(),
            Scalar::Bool(b) => b.to_string(),
        }
    }
}

/// Comparison operators accepted in `field[op]=value`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
}

impl FilterOp {
    pub fn parse(s: &str) -> Option<FilterOp> {
        Some(match s {
            "eq" => FilterOp::Eq,
            "ne" => FilterOp::Ne,
            "gt" => FilterOp::Gt,
            "gte" => FilterOp::Gte,
            "lt" => FilterOp::Lt,
            "lte" => FilterOp::Lte,
            "in" => FilterOp::In,
            _ => return None,
        })
    }

    /// SQL comparison for the single-value operators.
    pub fn sql(self) -> &'static str {
        match self {
            FilterOp::Eq | FilterOp::In => "=",
            FilterOp::Ne => "<>",
            FilterOp::Gt => ">",
            FilterOp::Gte => ">=",
            FilterOp::Lt => "<",
            FilterOp::Lte => "<=",
        }
    }

    fn accepts(self, ord: Ordering) -> bool {
        match self {
            FilterOp::Eq | FilterOp::In => ord == Ordering::Equal,
            FilterOp::Ne => ord != Ordering::Equal,
            FilterOp::Gt => ord == Ordering::Greater,
            FilterOp::Gte => ord != Ordering::Less,
            FilterOp::Lt => ord == Ordering::Less,
            FilterOp::Lte => ord != Ordering::Greater,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    /// One value for every operator except `In`, which carries one or more.
    pub values: Vec<Scalar>,
    pub kind: ValueKind,
    /// Field holds an array; the filter matches when any element does.
    pub array: bool,
}

impl Filter {
    pub fn matches(&self, doc: &Document) -> bool {
        let candidates: Vec<&Value> = match doc.get(&self.field) {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items.iter().collect(),
            Some(v) => vec![v],
        };
        let hit = |stored: &Value, op: FilterOp| {
            self.values
                .iter()
                .any(|s| s.cmp_stored(stored).map(|ord| op.accepts(ord)).unwrap_or(false))
        };
        match self.op {
            // ne matches documents where no element equals the value (including missing fields)
            FilterOp::Ne => !candidates.iter().any(|c| hit(*c, FilterOp::Eq)),
            op => candidates.iter().any(|c| hit(*c, op)),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Keyword {
    pub term: String,
    /// Text fields searched; a document matches when any of them contains the term.
    pub fields: Vec<String>,
}

impl Keyword {
    pub fn matches(&self, doc: &Document) -> bool {
        let needle = self.term.to_lowercase();
        self.fields.iter().any(|f| {
            doc.get(f)
                .and_then(Value::as_str)
                .map(|s| s.to_lowercase().contains(&needle))
                .unwrap_or(false)
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SortKey {
    pub field: String,
    pub direction: SortDirection,
    pub kind: ValueKind,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pagination {
    /// 1-based.
    pub page: u64,
    pub limit: u64,
}

impl Pagination {
    pub fn skip(&self) -> u64 {
        self.page.saturating_sub(1).saturating_mul(self.limit)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct QueryPlan {
    pub filters: Vec<Filter>,
    pub keyword: Option<Keyword>,
    /// Never empty once built; stores break remaining ties by insertion order.
    pub sort: Vec<SortKey>,
    pub projection: Option<Vec<String>>,
    pub pagination: Pagination,
    /// Relation names to populate, all declared by the resource.
    pub populate: Vec<String>,
}

impl QueryPlan {
    /// Filters and keyword combined with AND.
    pub fn matches(&self, doc: &Document) -> bool {
        self.filters.iter().all(|f| f.matches(doc))
            && self.keyword.as_ref().map(|k| k.matches(doc)).unwrap_or(true)
    }

    pub fn compare(&self, a: &Document, b: &Document) -> Ordering {
        for key in &self.sort {
            let ord = compare_stored(a.get(&key.field), b.get(&key.field), key.kind);
            let ord = match key.direction {
                SortDirection::Asc => ord,
                SortDirection::Desc => ord.reverse(),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }

    /// Keep only projected fields (plus `id` and populated relations).
    pub fn project(&self, doc: Document) -> Document {
        let Some(fields) = &self.projection else {
            return doc;
        };
        doc.into_iter()
            .filter(|(k, _)| k == "id" || fields.contains(k) || self.populate.contains(k))
            .collect()
    }
}

/// Missing and null values sort before everything else.
fn compare_stored(a: Option<&Value>, b: Option<&Value>, kind: ValueKind) -> Ordering {
    let a = a.filter(|v| !v.is_null());
    let b = b.filter(|v| !v.is_null());
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => match kind {
            ValueKind::Number => {
                let (x, y) = (a.as_f64().unwrap_or(f64::NAN), b.as_f64().unwrap_or(f64::NAN));
                x.partial_cmp(&y).unwrap_or(Ordering::Equal)
            }
            ValueKind::Bool => a.as_bool().cmp(&b.as_bool()),
            ValueKind::Text => a.as_str().cmp(&b.as_str()),
        },
    }
}

/// Pagination metadata returned with list results.
#[derive(Clone, Debug, PartialEq, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub current_page: u64,
    pub results_per_page: u64,
    pub number_of_pages: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev: Option<u64>,
}

impl PageInfo {
    pub fn new(pagination: Pagination, total: u64) -> Self {
        let number_of_pages = total.div_ceil(pagination.limit.max(1));
        let end = pagination.page.saturating_mul(pagination.limit);
        PageInfo {
            current_page: pagination.page,
            results_per_page: pagination.limit,
            number_of_pages,
            next: (end < total).then_some(pagination.page + 1),
            prev: (pagination.skip() > 0).then_some(pagination.page - 1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(v: Value) -> Document {
        v.as_object().unwrap().clone()
    }

    fn filter(field: &str, op: FilterOp, values: Vec<Scalar>, array: bool) -> Filter {
        let kind = values[0].kind();
        Filter {
            field: field.into(),
            op,
            values,
            kind,
            array,
        }
    }

    #[test]
    fn numeric_range_filters() {
        let gte = filter("price", FilterOp::Gte, vec![Scalar::Number(100.0)], false);
        let lt = filter("price", FilterOp::Lt, vec![Scalar::Number(200.0)], false);
        assert!(gte.matches(&doc(json!({"price": 100}))));
        assert!(!gte.matches(&doc(json!({"price": 99.5}))));
        assert!(lt.matches(&doc(json!({"price": 199.99}))));
        assert!(!lt.matches(&doc(json!({}))));
    }

    #[test]
    fn type_mismatch_never_matches() {
        let eq = filter("price", FilterOp::Eq, vec![Scalar::Number(10.0)], false);
        assert!(!eq.matches(&doc(json!({"price": "10"}))));
    }

    #[test]
    fn array_fields_match_any_element() {
        let eq = filter("colors", FilterOp::Eq, vec![Scalar::Text("red".into())], true);
        let ne = filter("colors", FilterOp::Ne, vec![Scalar::Text("red".into())], true);
        let within = filter(
            "colors",
            FilterOp::In,
            vec![Scalar::Text("blue".into()), Scalar::Text("green".into())],
            true,
        );
        let d = doc(json!({"colors": ["black", "red"]}));
        assert!(eq.matches(&d));
        assert!(!ne.matches(&d));
        assert!(!within.matches(&d));
        assert!(ne.matches(&doc(json!({}))));
    }

    #[test]
    fn keyword_is_case_insensitive_across_fields() {
        let k = Keyword {
            term: "SHOE".into(),
            fields: vec!["title".into(), "description".into()],
        };
        assert!(k.matches(&doc(json!({"title": "Running shoes"}))));
        assert!(k.matches(&doc(json!({"title": "Boots", "description": "a shoe for hiking"}))));
        assert!(!k.matches(&doc(json!({"title": "Hat"}))));
    }

    #[test]
    fn sort_puts_missing_first_and_honors_direction() {
        let plan = QueryPlan {
            filters: vec![],
            keyword: None,
            sort: vec![SortKey {
                field: "price".into(),
                direction: SortDirection::Desc,
                kind: ValueKind::Number,
            }],
            projection: Some(vec!["title".into()]),
            pagination: Pagination { page: 1, limit: 10 },
            populate: vec![],
        };
        let cheap = doc(json!({"price": 5}));
        let dear = doc(json!({"price": 50}));
        let unknown = doc(json!({}));
        assert_eq!(plan.compare(&dear, &cheap), Ordering::Less);
        assert_eq!(plan.compare(&unknown, &cheap), Ordering::Greater);

        let projected = plan.project(doc(json!({"id": "x", "title": "t", "price": 5})));
        assert_eq!(Value::Object(projected), json!({"id": "x", "title": "t"}));
    }

    #[test]
    fn page_info_counts_pages() {
        let info = PageInfo::new(Pagination { page: 3, limit: 50 }, 101);
        assert_eq!(info.number_of_pages, 3);
        assert_eq!(info.next, None);
        assert_eq!(info.prev, Some(2));

        let first = PageInfo::new(Pagination { page: 1, limit: 50 }, 101);
        assert_eq!(first.next, Some(2));
        assert_eq!(first.prev, None);

        let empty = PageInfo::new(Pagination { page: 1, limit: 50 }, 0);
        assert_eq!(empty.number_of_pages, 0);
    }
}
