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
#![allow(clippy::doc_markdown)] // Parameter names like $filter in docs
#![allow(clippy::missing_errors_doc)] // # Errors sections - doc-heavy
#![allow(clippy::missing_panics_doc)] // # Panics sections - doc-heavy
#![allow(clippy::module_name_repetitions)] // Type names matching module - acceptable
#![allow(clippy::return_self_not_must_use)] // Builder methods return Self
#![allow(clippy::must_use_candidate)] // Fluent API doesn't need must_use
#![allow(clippy::indexing_slicing)] // Lexer slices at ASCII boundaries it has just scanned

//! # restq - REST query parameters to whitelisted query plans
//!
//! restq compiles `$filter`, `$sort`, `$skip`, `$top`, `$expand`, `$select`
//! and `$count` into a [`QueryPlan`] that only names columns and relations
//! the [`Registry`] allows. Plans are applied to a query builder through
//! [`QueryTarget`], or executed end to end with [`SqlDriver`].
//!
//! ```
//! use restq::{Compiler, RawQuery, Registry, Relation, ResourceDescriptor};
//! use restq_sql::{QueryBuilder, Postgres};
//!
//! let registry = Registry::builder()
//!     .resource(ResourceDescriptor::new("products")
//!         .properties(["name", "price", "cost"])
//!         .allow_columns(["id", "name", "price"]))
//!     .build()
//!     .unwrap();
//! let compiler = Compiler::new(registry);
//!
//! let raw = RawQuery::from_query_string("$filter=price%20lt%2010&$sort=-price&$top=5").unwrap();
//! let plan = compiler.compile("products", &raw).unwrap();
//! let query = plan.apply_to(QueryBuilder::new(Postgres, "products")).build();
//! assert_eq!(
//!     query.sql,
//!     "SELECT id, name, price FROM products WHERE price < $1 ORDER BY price DESC LIMIT 5"
//! );
//!
//! // Non-whitelisted columns are rejected with the offending parameter.
//! let raw = RawQuery::new().with("$filter", "cost gt 1");
//! let err = compiler.compile("products", &raw).unwrap_err();
//! assert_eq!(err.code(), "UnknownAttribute");
//! assert_eq!(err.param(), "$filter");
//! ```
//!
//! ## Parameters
//!
//! | Parameter | Value | Default |
//! |-----------|-------|---------|
//! | `$filter` | `name eq 'x' and not (qty lt 1 or startswith(sku, 'A'))` | none |
//! | `$sort` | comma list, `-` prefix for descending | none |
//! | `$skip` | integer >= 0 | none |
//! | `$top` | integer in `1..=max_top` | `default_top` (10) |
//! | `$expand` | comma list of `/`-separated relation paths | none |
//! | `$select` | comma list of columns, `relation/column` for expansions | none |
//! | `$count` | `true` / `false` | `false` |
//!
//! ## Features
//!
//! - `tracing` (default): emit `restq.compile`, `restq.reject` and
//!   `restq.query` debug events.

mod trace;

mod compiler;
mod config;
mod driver;
mod error;
mod expand;
mod filter;
mod options;
mod plan;
mod raw;
mod registry;
mod select;

pub use compiler::{Compiler, compile};
pub use config::{CompilerConfig, Limits, OptionsContract, Param};
pub use driver::{Envelope, Executor, QueryTarget, Row, SqlDriver};
pub use error::{ConfigError, DriverError, ErrorBody, LimitKind, QueryError, RegistryError};
pub use expand::{ExpansionNode, ExpansionTree};
pub use filter::{
    Argument, ComparisonOp, FilterNode, Literal, LogicalOperator, PatternKind, Predicate,
    compile_filter, parse_filter,
};
pub use options::{SortSpec, ValidatedOptions, validate};
pub use plan::{QueryPlan, Shape};
pub use raw::RawQuery;
pub use registry::{Registry, RegistryBuilder, Relation, RelationKind, ResourceDescriptor};
pub use restq_sql::{SortDir, Value};
pub use select::Projection;

#[cfg(test)]
mod tests {
    use super::*;
    use static_assertions::assert_impl_all;

    assert_impl_all!(Registry: Send, Sync);
    assert_impl_all!(Compiler: Send, Sync, Clone);
    assert_impl_all!(QueryPlan: Send, Sync, Clone, PartialEq);
    assert_impl_all!(QueryError: Send, Sync, std::error::Error);

    #[test]
    fn test_compiler_is_shareable_across_threads() {
        let registry = Registry::builder()
            .resource(ResourceDescriptor::new("users").properties(["name"]))
            .build()
            .unwrap();
        let compiler = Compiler::new(registry);

        let plans: Vec<QueryPlan> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let compiler = &compiler;
                    scope.spawn(move || {
                        compiler
                            .compile("users", &RawQuery::new().with("$sort", "name"))
                            .unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert!(plans.windows(2).all(|pair| pair[0] == pair[1]));
    }
}
