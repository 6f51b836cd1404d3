//! Applying plans to query builders.
//!
//! [`QueryTarget`] is the contract a builder implements so a
//! [`QueryPlan`](crate::QueryPlan) can be applied to it. The SQL builder in
//! `restq-sql` implements it, and [`SqlDriver`] runs plans end to end over an
//! [`Executor`], eager-loading expansions.

mod sql;

pub use sql::{Envelope, Executor, Row, SqlDriver};

use crate::filter::Predicate;
use restq_sql::{Dialect, QueryBuilder, SortDir};

/// A query builder a plan can be applied to.
///
/// Every method consumes and returns the builder. Calls arrive in plan order:
/// `select`, `filter`, `order_by` per sort entry, then `offset` and `limit`.
pub trait QueryTarget: Sized {
    /// Project exactly these columns.
    fn select(self, columns: &[String]) -> Self;

    /// AND `predicate` with whatever conditions the builder already holds.
    fn filter(self, predicate: &Predicate) -> Self;

    /// Append a sort key.
    fn order_by(self, column: &str, direction: SortDir) -> Self;

    /// Skip this many rows.
    fn offset(self, offset: u64) -> Self;

    /// Return at most this many rows.
    fn limit(self, limit: u32) -> Self;
}

impl<D: Dialect> QueryTarget for QueryBuilder<D> {
    fn select(self, columns: &[String]) -> Self {
        Self::fields(self, columns)
    }

    fn filter(self, predicate: &Predicate) -> Self {
        self.filter_expr(predicate.to_filter_expr())
    }

    fn order_by(self, column: &str, direction: SortDir) -> Self {
        Self::sort(self, column, direction)
    }

    fn offset(self, offset: u64) -> Self {
        Self::offset(self, offset)
    }

    fn limit(self, limit: u32) -> Self {
        Self::limit(self, limit)
    }
}
