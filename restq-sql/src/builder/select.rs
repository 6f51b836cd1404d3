//! SELECT and COUNT statements.

use crate::dialect::Dialect;
use crate::validate::assert_valid_sql_identifier;

use super::filter::Writer;
use super::types::{Filter, FilterExpr, Operator, QueryResult, SortDir, Value};

/// Parameterized `SELECT` builder for one table.
///
/// Conditions added with [`filter`](Self::filter) and the expression set with
/// [`filter_expr`](Self::filter_expr) are ANDed, conditions first. A builder
/// can therefore be pre-scoped with trusted conditions (tenant, soft delete)
/// before request filters are added.
#[derive(Debug, Clone)]
pub struct QueryBuilder<D: Dialect> {
    dialect: D,
    table: String,
    columns: Vec<String>,
    conditions: Vec<Filter>,
    expr: Option<FilterExpr>,
    order: Vec<(String, SortDir)>,
    limit: Option<u32>,
    offset: Option<u64>,
}

impl<D: Dialect> QueryBuilder<D> {
    /// # Panics
    ///
    /// Panics if `table` is not a valid SQL identifier.
    pub fn new(dialect: D, table: impl Into<String>) -> Self {
        let table = table.into();
        assert_valid_sql_identifier(&table, "table");
        Self {
            dialect,
            table,
            columns: Vec::new(),
            conditions: Vec::new(),
            expr: None,
            order: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    /// The dialect this builder renders for.
    pub const fn dialect(&self) -> D {
        self.dialect
    }

    /// The table this builder selects from.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Replace the projected columns. No columns selects `*`.
    ///
    /// # Panics
    ///
    /// Panics if a column is not a valid SQL identifier.
    pub fn fields<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.columns = columns
            .into_iter()
            .map(|column| {
                let column = column.as_ref();
                assert_valid_sql_identifier(column, "field");
                column.to_owned()
            })
            .collect();
        self
    }

    /// Add a condition.
    ///
    /// # Panics
    ///
    /// Panics if `column` is not a valid SQL identifier.
    pub fn filter(mut self, column: impl Into<String>, op: Operator, value: Value) -> Self {
        self.conditions.push(Filter::new(column, op, value));
        self
    }

    /// AND an expression onto any expression already set.
    pub fn filter_expr(mut self, expr: FilterExpr) -> Self {
        self.expr = Some(match self.expr.take() {
            None => expr,
            Some(FilterExpr::All(mut children)) => {
                children.push(expr);
                FilterExpr::All(children)
            },
            Some(existing) => FilterExpr::All(vec![existing, expr]),
        });
        self
    }

    /// Append an `ORDER BY` entry.
    ///
    /// # Panics
    ///
    /// Panics if `column` is not a valid SQL identifier.
    pub fn sort(mut self, column: impl Into<String>, dir: SortDir) -> Self {
        let column = column.into();
        assert_valid_sql_identifier(&column, "sort field");
        self.order.push((column, dir));
        self
    }

    /// Set `LIMIT`.
    pub const fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Set `OFFSET`.
    pub const fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Render the `SELECT`.
    pub fn build(&self) -> QueryResult {
        let projection = if self.columns.is_empty() {
            "*".to_string()
        } else {
            self.columns.join(", ")
        };
        let mut sql = format!("SELECT {projection} FROM {}", self.table);
        let params = self.push_where(&mut sql);

        if !self.order.is_empty() {
            let order: Vec<String> = self
                .order
                .iter()
                .map(|(column, dir)| format!("{column} {}", dir.sql()))
                .collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&order.join(", "));
        }

        match (self.limit, self.offset) {
            (Some(limit), Some(offset)) => sql.push_str(&format!(" LIMIT {limit} OFFSET {offset}")),
            (Some(limit), None) => sql.push_str(&format!(" LIMIT {limit}")),
            (None, Some(offset)) => sql.push_str(&self.dialect.bare_offset(offset)),
            (None, None) => {},
        }

        QueryResult { sql, params }
    }

    /// Render `SELECT COUNT(*) AS count` over the same conditions.
    ///
    /// Projection, ordering and paging do not apply.
    pub fn build_count(&self) -> QueryResult {
        let mut sql = format!("SELECT COUNT(*) AS count FROM {}", self.table);
        let params = self.push_where(&mut sql);
        QueryResult { sql, params }
    }

    fn push_where(&self, sql: &mut String) -> Vec<Value> {
        if self.conditions.is_empty() && self.expr.is_none() {
            return Vec::new();
        }

        let mut writer = Writer::new(&self.dialect);
        let mut parts: Vec<String> = self
            .conditions
            .iter()
            .map(|condition| writer.condition(condition))
            .collect();
        if let Some(expr) = &self.expr {
            parts.push(writer.expr(expr));
        }

        sql.push_str(" WHERE ");
        sql.push_str(&parts.join(" AND "));
        writer.into_params()
    }
}
