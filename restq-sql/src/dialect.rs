//! Placeholder and clause syntax for the supported databases.

use crate::{Operator, Value};

/// Database-specific rendering used by [`QueryBuilder`](crate::QueryBuilder).
///
/// Only the fragments that differ between engines live here; everything else
/// is shared SQL.
pub trait Dialect: Clone + Copy {
    /// Human-readable name, used in logs.
    const NAME: &'static str;

    /// Placeholder for the `n`th bound parameter, 1-based.
    fn placeholder(&self, n: usize) -> String;

    /// Membership test against `values`, with placeholders starting at `first`.
    ///
    /// Returns the fragment and the parameters it binds, in order.
    fn in_list(&self, column: &str, values: &[Value], first: usize) -> (String, Vec<Value>);

    /// `OFFSET` with no `LIMIT` before it.
    fn bare_offset(&self, offset: u64) -> String {
        format!(" OFFSET {offset}")
    }

    /// Anchored `LIKE` for the pattern operators.
    ///
    /// The bound value is expected to have its wildcards escaped with `\`.
    fn like(&self, column: &str, op: Operator, n: usize) -> String {
        let p = self.placeholder(n);
        let pattern = match op {
            Operator::StartsWith => format!("{p} || '%'"),
            Operator::EndsWith => format!("'%' || {p}"),
            _ => format!("'%' || {p} || '%'"),
        };
        format!("{column} LIKE {pattern} ESCAPE '\\'")
    }
}

/// Postgres: `$n` placeholders, arrays bound as a single parameter.
#[derive(Debug, Clone, Copy, Default)]
pub struct Postgres;

impl Dialect for Postgres {
    const NAME: &'static str = "postgres";

    #[inline]
    fn placeholder(&self, n: usize) -> String {
        format!("${n}")
    }

    fn in_list(&self, column: &str, values: &[Value], first: usize) -> (String, Vec<Value>) {
        (
            format!("{column} = ANY(${first})"),
            vec![Value::Array(values.to_vec())],
        )
    }
}

/// `SQLite`: `?n` placeholders, one per list element.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sqlite;

impl Dialect for Sqlite {
    const NAME: &'static str = "sqlite";

    #[inline]
    fn placeholder(&self, n: usize) -> String {
        format!("?{n}")
    }

    fn in_list(&self, column: &str, values: &[Value], first: usize) -> (String, Vec<Value>) {
        let slots: Vec<String> = (first..first + values.len())
            .map(|n| self.placeholder(n))
            .collect();
        (format!("{column} IN ({})", slots.join(", ")), values.to_vec())
    }

    // OFFSET is only valid after a LIMIT
    fn bare_offset(&self, offset: u64) -> String {
        format!(" LIMIT -1 OFFSET {offset}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholders() {
        assert_eq!(Postgres.placeholder(1), "$1");
        assert_eq!(Postgres.placeholder(12), "$12");
        assert_eq!(Sqlite.placeholder(1), "?1");
        assert_eq!(Sqlite.placeholder(12), "?12");
    }

    #[test]
    fn test_postgres_binds_one_array() {
        let keys = [Value::Int(3), Value::Int(4)];
        let (sql, params) = Postgres.in_list("order_id", &keys, 2);

        assert_eq!(sql, "order_id = ANY($2)");
        assert_eq!(params, vec![Value::Array(keys.to_vec())]);
    }

    #[test]
    fn test_sqlite_expands_list() {
        let keys = [Value::from("a"), Value::from("b"), Value::from("c")];
        let (sql, params) = Sqlite.in_list("sku", &keys, 5);

        assert_eq!(sql, "sku IN (?5, ?6, ?7)");
        assert_eq!(params.len(), 3);
    }

    #[test]
    fn test_like_shapes() {
        assert_eq!(
            Postgres.like("name", Operator::StartsWith, 1),
            "name LIKE $1 || '%' ESCAPE '\\'"
        );
        assert_eq!(
            Sqlite.like("email", Operator::EndsWith, 3),
            "email LIKE '%' || ?3 ESCAPE '\\'"
        );
        assert_eq!(
            Sqlite.like("bio", Operator::Contains, 2),
            "bio LIKE '%' || ?2 || '%' ESCAPE '\\'"
        );
    }

    #[test]
    fn test_bare_offset() {
        assert_eq!(Postgres.bare_offset(5), " OFFSET 5");
        assert_eq!(Sqlite.bare_offset(5), " LIMIT -1 OFFSET 5");
    }

    #[test]
    fn test_names() {
        assert_eq!(Postgres::NAME, "postgres");
        assert_eq!(Sqlite::NAME, "sqlite");
    }
}
