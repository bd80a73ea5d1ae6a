//! Query Request: raw, untrusted list parameters split out of the query string.

/// `field=value` or `field[op]=value`, not yet checked against anything.
#[derive(Clone, Debug, PartialEq)]
pub struct RawFilter {
    pub field: String,
    pub op: Option<String>,
    pub value: String,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct QueryRequest {
    pub filters: Vec<RawFilter>,
    pub sort: Option<String>,
    pub fields: Option<String>,
    pub keyword: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
    pub populate: Vec<String>,
}

impl QueryRequest {
    /// Build from decoded query pairs, in order. Repeated scalar parameters keep the last value;
    /// `populate` accumulates and may also be comma-separated.
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut req = QueryRequest::default();
        for (key, value) in pairs {
            match key.as_str() {
                "page" => req.page = Some(value),
                "limit" => req.limit = Some(value),
                "sort" => req.sort = Some(value),
                "fields" => req.fields = Some(value),
                "keyword" => req.keyword = Some(value),
                "populate" => req.populate.extend(split_list(&value)),
                _ => {
                    let (field, op) = split_operator(&key);
                    req.filters.push(RawFilter {
                        field,
                        op,
                        value,
                    });
                }
            }
        }
        req
    }
}

/// `price[gte]` -> (`price`, Some(`gte`)). Keys without a well-formed bracket suffix are
/// returned whole and will fail the field whitelist.
fn split_operator(key: &str) -> (String, Option<String>) {
    if let Some(open) = key.find('[') {
        if key.ends_with(']') && open > 0 {
            let field = &key[..open];
            let op = &key[open + 1..key.len() - 1];
            return (field.to_string(), Some(op.to_string()));
        }
    }
    (key.to_string(), None)
}

/// Comma- or whitespace-separated list, empty items removed.
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(|c: char| c == ',' || c.is_whitespace())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
