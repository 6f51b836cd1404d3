// =============================================================================
// CRATE-LEVEL QUALITY LINTS
// =============================================================================
#![forbid(unsafe_code)]
#![deny(unused_must_use)]
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![warn(rust_2018_idioms)]
#![warn(unreachable_pub)]
#![warn(rustdoc::missing_crate_level_docs)]
#![warn(rustdoc::broken_intra_doc_links)]
// =============================================================================
// CLIPPY CONFIGURATION
// =============================================================================
#![allow(clippy::doc_markdown)] // Code items in docs
#![allow(clippy::missing_errors_doc)] // # Errors sections - doc-heavy
#![allow(clippy::missing_panics_doc)] // # Panics sections - doc-heavy
#![allow(clippy::module_name_repetitions)] // Type names matching module - acceptable
#![allow(clippy::return_self_not_must_use)] // Builder pattern methods return Self by design
#![allow(clippy::must_use_candidate)] // Builder methods - fluent API doesn't need must_use
#![allow(clippy::format_push_string)] // String building style preference
#![allow(clippy::indexing_slicing)] // Bounds checked before indexing in builder logic

//! # restq-sql
//!
//! Parameterized `SELECT` and `COUNT` statements for Postgres and `SQLite`,
//! the query builder restq plans are applied to. Values are always bound as
//! parameters; table and column names are checked as identifiers before they
//! are rendered.
//!
//! ```
//! use restq_sql::{Operator, SortDir, Value, and, or, simple, sqlite};
//!
//! let result = sqlite("orders")
//!     .fields(["id", "total"])
//!     .filter("tenant_id", Operator::Eq, Value::Int(7))
//!     .filter_expr(or(vec![
//!         simple("status", Operator::Eq, Value::from("paid")),
//!         and(vec![
//!             simple("total", Operator::Gt, Value::Int(100)),
//!             simple("note", Operator::Contains, Value::from("rush")),
//!         ]),
//!     ]))
//!     .sort("total", SortDir::Desc)
//!     .limit(10)
//!     .build();
//!
//! assert_eq!(
//!     result.sql,
//!     "SELECT id, total FROM orders WHERE tenant_id = ?1 AND \
//!      (status = ?2 OR (total > ?3 AND note LIKE '%' || ?4 || '%' ESCAPE '\\')) \
//!      ORDER BY total DESC LIMIT 10"
//! );
//! assert_eq!(result.params.len(), 4);
//! ```
//!
//! | Operator | Postgres | `SQLite` |
//! |----------|----------|----------|
//! | `Eq` / `Ne` | `=` / `!=`, `IS [NOT] NULL` against null | same |
//! | `Gt` / `Gte` / `Lt` / `Lte` | `>` / `>=` / `<` / `<=` | same |
//! | `In` | `= ANY($1)` | `IN (?1, ?2, ...)` |
//! | `StartsWith` / `EndsWith` / `Contains` | `LIKE` with `\|\|` and `ESCAPE '\'` | same |
//!
//! Pattern values have `%`, `_` and `\` escaped, so they match literally.

mod builder;
mod dialect;
mod validate;

pub use builder::{
    Filter, FilterExpr, Operator, QueryBuilder, QueryResult, SortDir, Value, and, not, or, simple,
};
pub use dialect::{Dialect, Postgres, Sqlite};
pub use validate::{
    IdentifierError, assert_valid_sql_identifier, check_sql_identifier, is_valid_sql_identifier,
};

/// `QueryBuilder` over `table` for Postgres.
#[must_use]
pub fn postgres(table: &str) -> QueryBuilder<Postgres> {
    QueryBuilder::new(Postgres, table)
}

/// `QueryBuilder` over `table` for `SQLite`.
#[must_use]
pub fn sqlite(table: &str) -> QueryBuilder<Sqlite> {
    QueryBuilder::new(Sqlite, table)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dialects_differ_only_in_placeholders() {
        let pg = postgres("users")
            .fields(["id", "name"])
            .filter("active", Operator::Eq, Value::Bool(true))
            .build();
        let lite = sqlite("users")
            .fields(["id", "name"])
            .filter("active", Operator::Eq, Value::Bool(true))
            .build();

        assert_eq!(pg.sql, "SELECT id, name FROM users WHERE active = $1");
        assert_eq!(lite.sql, "SELECT id, name FROM users WHERE active = ?1");
        assert_eq!(pg.params, lite.params);
    }

    #[test]
    fn test_in_after_trusted_filter_numbers_params() {
        let result = sqlite("items")
            .filter("tenant_id", Operator::Eq, Value::Int(1))
            .filter_expr(simple(
                "order_id",
                Operator::In,
                Value::Array(vec![Value::Int(10), Value::Int(11)]),
            ))
            .build();

        assert_eq!(
            result.sql,
            "SELECT * FROM items WHERE tenant_id = ?1 AND order_id IN (?2, ?3)"
        );
    }

    #[test]
    fn test_postgres_in_binds_after_trusted_filter() {
        let result = postgres("items")
            .filter("tenant_id", Operator::Eq, Value::Int(1))
            .filter("order_id", Operator::In, Value::Array(vec![Value::Int(10)]))
            .filter("sku", Operator::Ne, Value::from("x"))
            .build();

        assert_eq!(
            result.sql,
            "SELECT * FROM items WHERE tenant_id = $1 AND order_id = ANY($2) AND sku != $3"
        );
        assert_eq!(result.params.len(), 3);
    }

    mod send_sync {
        use static_assertions::assert_impl_all;

        assert_impl_all!(crate::QueryBuilder<crate::Postgres>: Send, Sync, Clone);
        assert_impl_all!(crate::QueryBuilder<crate::Sqlite>: Send, Sync, Clone);
        assert_impl_all!(crate::FilterExpr: Send, Sync, Clone, PartialEq);
        assert_impl_all!(crate::Value: Send, Sync, Clone, PartialEq);
    }
}
