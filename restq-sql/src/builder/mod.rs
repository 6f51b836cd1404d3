//! Statement builder.

mod filter;
mod select;
mod types;

pub use select::QueryBuilder;
pub use types::{
    Filter, FilterExpr, Operator, QueryResult, SortDir, Value, and, not, or, simple,
};
