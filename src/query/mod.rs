pub mod builder;
pub mod plan;
pub mod request;

pub use builder::QueryBuilder;
pub use plan::{
    Filter, FilterOp, Keyword, PageInfo, Pagination, QueryPlan, Scalar, SortDirection, SortKey, ValueKind,
};
pub use request::{QueryRequest, RawFilter};
