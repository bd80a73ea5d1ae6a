//! Turns an untrusted [`QueryRequest`] into a [`QueryPlan`] for one resource.
//!
//! Anything that does not pass the resource whitelist is dropped, never rejected: unknown
//! fields and operators, values that do not coerce to the field's kind, unsortable fields and
//! undeclared relations. Page and limit fall back to defaults when not positive integers.

use crate::config::{PaginationSettings, ResourceDescriptor, CREATED_AT_FIELD};
use crate::query::plan::*;
use crate::query::request::{split_list, QueryRequest, RawFilter};

pub struct QueryBuilder<'a> {
    descriptor: &'a ResourceDescriptor,
    pagination: PaginationSettings,
}

impl<'a> QueryBuilder<'a> {
    pub fn new(descriptor: &'a ResourceDescriptor, pagination: PaginationSettings) -> Self {
        QueryBuilder {
            descriptor,
            pagination,
        }
    }

    pub fn build(&self, req: &QueryRequest) -> QueryPlan {
        QueryPlan {
            filters: req.filters.iter().filter_map(|f| self.filter(f)).collect(),
            keyword: self.keyword(req.keyword.as_deref()),
            sort: self.sort(req.sort.as_deref()),
            projection: self.projection(req.fields.as_deref()),
            pagination: self.pagination(req.page.as_deref(), req.limit.as_deref()),
            populate: self.populate(&req.populate),
        }
    }

    fn filter(&self, raw: &RawFilter) -> Option<Filter> {
        if !self.descriptor.is_filterable(&raw.field) {
            tracing::debug!(resource = %self.descriptor.kind, field = %raw.field, "dropping filter on non-filterable field");
            return None;
        }
        let op = match raw.op.as_deref() {
            None => FilterOp::Eq,
            Some(s) => match FilterOp::parse(s) {
                Some(op) => op,
                None => {
                    tracing::debug!(field = %raw.field, op = %s, "dropping filter with unknown operator");
                    return None;
                }
            },
        };
        let field = self.descriptor.field(&raw.field)?;
        let kind = field.field_type.value_kind();
        let values = if op == FilterOp::In {
            let items = split_list(&raw.value);
            if items.is_empty() {
                return None;
            }
            items
                .iter()
                .map(|v| Scalar::parse(kind, v))
                .collect::<Option<Vec<_>>>()
        } else {
            Scalar::parse(kind, &raw.value).map(|s| vec![s])
        };
        let Some(values) = values else {
            tracing::debug!(field = %raw.field, value = %raw.value, "dropping filter with value of wrong kind");
            return None;
        };
        Some(Filter {
            field: raw.field.clone(),
            op,
            values,
            kind,
            array: field.field_type.is_array(),
        })
    }

    fn keyword(&self, raw: Option<&str>) -> Option<Keyword> {
        let term = raw.map(str::trim).filter(|t| !t.is_empty())?;
        if self.descriptor.searchable.is_empty() {
            return None;
        }
        Some(Keyword {
            term: term.to_string(),
            fields: self.descriptor.searchable.clone(),
        })
    }

    fn sort(&self, raw: Option<&str>) -> Vec<SortKey> {
        let mut keys: Vec<SortKey> = raw
            .map(split_list)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|item| {
                let (name, direction) = match item.strip_prefix('-') {
                    Some(rest) => (rest.to_string(), SortDirection::Desc),
                    None => (item.trim_start_matches('+').to_string(), SortDirection::Asc),
                };
                if !self.descriptor.is_sortable(&name) {
                    tracing::debug!(field = %name, "dropping sort on unsortable field");
                    return None;
                }
                let kind = self.descriptor.value_kind(&name)?;
                Some(SortKey {
                    field: name,
                    direction,
                    kind,
                })
            })
            .collect();
        if keys.is_empty() {
            keys.push(SortKey {
                field: CREATED_AT_FIELD.to_string(),
                direction: SortDirection::Asc,
                kind: ValueKind::Text,
            });
        }
        keys
    }

    fn projection(&self, raw: Option<&str>) -> Option<Vec<String>> {
        let fields: Vec<String> = split_list(raw?)
            .into_iter()
            .filter(|f| self.descriptor.is_known_field(f))
            .collect();
        (!fields.is_empty()).then_some(fields)
    }

    fn pagination(&self, page: Option<&str>, limit: Option<&str>) -> Pagination {
        let positive = |raw: Option<&str>| raw.and_then(|v| v.trim().parse::<u64>().ok()).filter(|n| *n > 0);
        let limit = positive(limit)
            .unwrap_or(self.pagination.default_limit)
            .min(self.pagination.max_limit)
            .max(1);
        // OFFSET is a bigint: keep (page - 1) * limit within i64.
        let last_page = i64::MAX as u64 / limit + 1;
        Pagination {
            page: positive(page).unwrap_or(1).min(last_page),
            limit,
        }
    }

    /// Keep declared relation names, first occurrence wins.
    pub fn populate(&self, names: &[String]) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for name in names {
            if self.descriptor.relation(name).is_none() {
                tracing::debug!(relation = %name, "dropping unknown populate");
                continue;
            }
            if !out.contains(name) {
                out.push(name.clone());
            }
        }
        out
    }
}
