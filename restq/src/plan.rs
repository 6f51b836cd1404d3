//! The compiled query plan.

use crate::driver::QueryTarget;
use crate::expand::ExpansionTree;
use crate::filter::Predicate;
use crate::options::SortSpec;
use crate::select::Projection;

/// Whether a plan reads a list or a single row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Shape {
    /// A page of rows.
    Collection,
    /// One row by id, or nothing.
    Entity,
}

/// Everything a driver needs to run a request.
///
/// Built once per request by [`Compiler`](crate::Compiler) and never mutated
/// afterwards. Every column and relation in a plan has passed the registry
/// whitelist.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    /// Root resource name.
    pub resource: String,
    /// Root table.
    pub table: String,
    /// List or single row.
    pub shape: Shape,
    /// Compiled `$filter`, plus the id match for entity plans.
    pub predicate: Option<Predicate>,
    /// `$sort`, primary first.
    pub sort: Vec<SortSpec>,
    /// `$skip`.
    pub offset: Option<u64>,
    /// `$top`, or 1 for entity plans.
    pub limit: Option<u32>,
    /// Columns projected on the root resource.
    pub root_columns: Vec<String>,
    /// `$expand`, if any relation was requested.
    pub expansion: Option<ExpansionTree>,
    /// `$select`, if any entry was given.
    pub projection: Option<Projection>,
    /// `$count`.
    pub want_count: bool,
}

impl QueryPlan {
    /// Apply projection, predicate, sort and pagination to `target`, in that
    /// order.
    ///
    /// ```
    /// use restq::{Compiler, RawQuery, Registry, ResourceDescriptor};
    /// use restq_sql::{QueryBuilder, Sqlite};
    ///
    /// let registry = Registry::builder()
    ///     .resource(ResourceDescriptor::new("users").properties(["name"]))
    ///     .build()
    ///     .unwrap();
    /// let raw = RawQuery::new().with("$filter", "name eq 'x'").with("$sort", "-name");
    /// let plan = Compiler::new(registry).compile("users", &raw).unwrap();
    ///
    /// let sql = plan.apply_to(QueryBuilder::new(Sqlite, "users")).build().sql;
    /// assert_eq!(sql, "SELECT id, name FROM users WHERE name = ?1 ORDER BY name DESC LIMIT 10");
    /// ```
    pub fn apply_to<T: QueryTarget>(&self, target: T) -> T {
        let mut target = target.select(&self.root_columns);
        if let Some(predicate) = &self.predicate {
            target = predicate.apply(target);
        }
        for spec in &self.sort {
            target = target.order_by(&spec.column, spec.direction);
        }
        if let Some(offset) = self.offset {
            target = target.offset(offset);
        }
        if let Some(limit) = self.limit {
            target = target.limit(limit);
        }
        target
    }

    /// The expansion as a nested eager expression, e.g.
    /// `[customer, orders.[items]]`.
    pub fn eager_expression(&self) -> Option<String> {
        self.expansion.as_ref().map(ToString::to_string)
    }

    /// Whether this is an entity plan.
    pub const fn is_entity(&self) -> bool {
        matches!(self.shape, Shape::Entity)
    }
}
