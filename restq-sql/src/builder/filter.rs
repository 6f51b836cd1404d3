//! WHERE-clause rendering.

use super::types::{Filter, FilterExpr, Operator, Value};
use crate::dialect::Dialect;

/// Renders conditions while collecting their parameters.
///
/// Placeholders are numbered from `first` in the order fragments are
/// written, so trusted filters written first keep stable positions.
pub(super) struct Writer<'d, D> {
    dialect: &'d D,
    first: usize,
    params: Vec<Value>,
}

impl<'d, D: Dialect> Writer<'d, D> {
    pub(super) const fn new(dialect: &'d D) -> Self {
        Self::starting_at(dialect, 1)
    }

    pub(super) const fn starting_at(dialect: &'d D, first: usize) -> Self {
        Self {
            dialect,
            first,
            params: Vec::new(),
        }
    }

    pub(super) fn into_params(self) -> Vec<Value> {
        self.params
    }

    fn next(&self) -> usize {
        self.first + self.params.len()
    }

    fn bind(&mut self, value: Value) -> usize {
        let n = self.next();
        self.params.push(value);
        n
    }

    pub(super) fn expr(&mut self, expr: &FilterExpr) -> String {
        match expr {
            FilterExpr::Condition(filter) => self.condition(filter),
            FilterExpr::All(children) => self.group(children, " AND ", "1=1"),
            FilterExpr::Any(children) => self.group(children, " OR ", "1=0"),
            FilterExpr::Not(inner) => format!("NOT ({})", self.expr(inner)),
        }
    }

    fn group(&mut self, children: &[FilterExpr], joiner: &str, empty: &str) -> String {
        match children {
            [] => empty.to_string(),
            [only] => self.expr(only),
            _ => {
                let parts: Vec<String> = children.iter().map(|child| self.expr(child)).collect();
                format!("({})", parts.join(joiner))
            },
        }
    }

    pub(super) fn condition(&mut self, filter: &Filter) -> String {
        let column = filter.column.as_str();
        match (filter.op, &filter.value) {
            (Operator::Eq, Value::Null) => format!("{column} IS NULL"),
            (Operator::Ne, Value::Null) => format!("{column} IS NOT NULL"),
            (Operator::In, value) => {
                let values = match value {
                    Value::Array(values) => values.as_slice(),
                    single => std::slice::from_ref(single),
                };
                if values.is_empty() {
                    return "1=0".to_string();
                }
                let (sql, params) = self.dialect.in_list(column, values, self.next());
                self.params.extend(params);
                sql
            },
            (op, value) if op.is_pattern() => {
                let n = self.bind(escape_pattern(value));
                self.dialect.like(column, op, n)
            },
            (op, value) => {
                let n = self.bind(value.clone());
                format!("{column} {} {}", op.sql(), self.dialect.placeholder(n))
            },
        }
    }
}

/// Escape `LIKE` wildcards so text matches literally under `ESCAPE '\'`.
fn escape_like(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 4);
    for c in text.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn escape_pattern(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(escape_like(s)),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::types::{and, not, or, simple};
    use crate::dialect::{Postgres, Sqlite};

    fn render<D: Dialect>(dialect: D, expr: &FilterExpr, first: usize) -> (String, Vec<Value>) {
        let mut writer = Writer::starting_at(&dialect, first);
        let sql = writer.expr(expr);
        (sql, writer.into_params())
    }

    #[test]
    fn test_null_comparisons_bind_nothing() {
        let (sql, params) = render(Postgres, &simple("deleted_at", Operator::Eq, Value::Null), 1);
        assert_eq!(sql, "deleted_at IS NULL");
        assert!(params.is_empty());

        let (sql, _) = render(Sqlite, &simple("deleted_at", Operator::Ne, Value::Null), 1);
        assert_eq!(sql, "deleted_at IS NOT NULL");
    }

    #[test]
    fn test_in_list_per_dialect() {
        let statuses = Value::Array(vec![Value::from("active"), Value::from("pending")]);
        let expr = simple("status", Operator::In, statuses);

        let (sql, params) = render(Postgres, &expr, 1);
        assert_eq!(sql, "status = ANY($1)");
        assert_eq!(params.len(), 1);

        let (sql, params) = render(Sqlite, &expr, 1);
        assert_eq!(sql, "status IN (?1, ?2)");
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_in_scalar_is_a_one_element_list() {
        let (sql, params) = render(Sqlite, &simple("id", Operator::In, Value::Int(4)), 2);
        assert_eq!(sql, "id IN (?2)");
        assert_eq!(params, vec![Value::Int(4)]);
    }

    #[test]
    fn test_empty_in_matches_nothing() {
        let (sql, params) = render(Sqlite, &simple("id", Operator::In, Value::Array(vec![])), 4);
        assert_eq!(sql, "1=0");
        assert!(params.is_empty());
    }

    #[test]
    fn test_pattern_value_is_escaped() {
        let expr = simple("name", Operator::StartsWith, Value::from("50%_off"));
        let (sql, params) = render(Postgres, &expr, 1);
        assert_eq!(sql, "name LIKE $1 || '%' ESCAPE '\\'");
        assert_eq!(params, vec![Value::from("50\\%\\_off")]);
    }

    #[test]
    fn test_plain_comparisons() {
        for (op, token) in [
            (Operator::Eq, "="),
            (Operator::Ne, "!="),
            (Operator::Gt, ">"),
            (Operator::Gte, ">="),
            (Operator::Lt, "<"),
            (Operator::Lte, "<="),
        ] {
            let (sql, params) = render(Postgres, &simple("qty", op, Value::Int(3)), 7);
            assert_eq!(sql, format!("qty {token} $7"));
            assert_eq!(params, vec![Value::Int(3)]);
        }
    }

    #[test]
    fn test_groups_keep_source_order() {
        let expr = and(vec![
            simple("amount", Operator::Gte, Value::Int(100)),
            or(vec![
                simple("status", Operator::Eq, Value::from("x")),
                simple("status", Operator::Eq, Value::from("y")),
            ]),
        ]);
        let (sql, params) = render(Sqlite, &expr, 1);
        assert_eq!(sql, "(amount >= ?1 AND (status = ?2 OR status = ?3))");
        assert_eq!(
            params,
            vec![Value::Int(100), Value::from("x"), Value::from("y")]
        );
    }

    #[test]
    fn test_not_and_single_child() {
        let expr = not(and(vec![simple("role", Operator::Eq, Value::from("admin"))]));
        let (sql, _) = render(Postgres, &expr, 1);
        assert_eq!(sql, "NOT (role = $1)");
    }

    #[test]
    fn test_empty_groups() {
        assert_eq!(render(Postgres, &and(vec![]), 1).0, "1=1");
        assert_eq!(render(Postgres, &or(vec![]), 1).0, "1=0");
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("plain"), "plain");
        assert_eq!(escape_like("a\\b"), "a\\\\b");
        assert_eq!(escape_like("%_"), "\\%\\_");
    }
}
