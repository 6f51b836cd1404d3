//! `$filter` expressions.
//!
//! A filter string is tokenized, parsed into a [`FilterNode`] tree and
//! compiled against a resource into a [`Predicate`]. Compilation checks every
//! referenced column against the resource's whitelist, so a `Predicate` only
//! ever names allowed columns.
//!
//! ```
//! use restq::{Limits, Predicate, ResourceDescriptor, compile_filter};
//!
//! let users = ResourceDescriptor::new("users").properties(["name", "deleted_at"]);
//! let predicate = compile_filter("name eq 'x' and deleted_at eq null", &users, &Limits::default())
//!     .unwrap();
//! assert_eq!(predicate.columns(), ["name", "deleted_at"]);
//! ```

mod compile;
mod lexer;
mod parser;

use crate::config::Limits;
use crate::driver::QueryTarget;
use crate::error::{LimitKind, QueryError};
use crate::registry::ResourceDescriptor;
use restq_sql::{FilterExpr, Operator, Value, and, not, or, simple};

const PARAM: &str = "$filter";

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparisonOp {
    /// `eq`
    Eq,
    /// `ne`
    Ne,
    /// `lt`
    Lt,
    /// `le`
    Le,
    /// `gt`
    Gt,
    /// `ge`
    Ge,
}

impl ComparisonOp {
    /// Parse an operator keyword, ignoring case.
    pub fn parse(s: &str) -> Option<Self> {
        [
            Self::Eq,
            Self::Ne,
            Self::Lt,
            Self::Le,
            Self::Gt,
            Self::Ge,
        ]
        .into_iter()
        .find(|op| s.eq_ignore_ascii_case(op.as_str()))
    }

    /// The keyword as written in a filter.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Ne => "ne",
            Self::Lt => "lt",
            Self::Le => "le",
            Self::Gt => "gt",
            Self::Ge => "ge",
        }
    }

    /// The SQL builder operator.
    pub const fn operator(self) -> Operator {
        match self {
            Self::Eq => Operator::Eq,
            Self::Ne => Operator::Ne,
            Self::Lt => Operator::Lt,
            Self::Le => Operator::Lte,
            Self::Gt => Operator::Gt,
            Self::Ge => Operator::Gte,
        }
    }
}

/// `and` / `or`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalOperator {
    /// Both sides hold.
    And,
    /// Either side holds.
    Or,
}

/// A literal value in a filter.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// `'text'`, with `''` for a quote.
    String(String),
    /// `42`, `-7`
    Int(i64),
    /// `3.5`
    Decimal(f64),
    /// `true` / `false`
    Bool(bool),
    /// `null`
    Null,
}

impl Literal {
    /// The bound parameter value.
    pub fn to_value(&self) -> Value {
        match self {
            Self::String(s) => Value::String(s.clone()),
            Self::Int(n) => Value::Int(*n),
            Self::Decimal(d) => Value::Float(*d),
            Self::Bool(b) => Value::Bool(*b),
            Self::Null => Value::Null,
        }
    }
}

/// A function-call argument.
#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    /// A bare identifier.
    Column(String),
    /// A literal.
    Literal(Literal),
}

/// Parsed, not yet validated, filter expression.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterNode {
    /// `column op literal`
    Comparison {
        /// Column as written.
        column: String,
        /// Operator.
        operator: ComparisonOp,
        /// Right-hand side.
        literal: Literal,
    },
    /// `left and right`, `left or right`
    Logical {
        /// Connective.
        operator: LogicalOperator,
        /// Left operand.
        left: Box<FilterNode>,
        /// Right operand.
        right: Box<FilterNode>,
    },
    /// `name(args...)`
    FunctionCall {
        /// Function name as written.
        name: String,
        /// Arguments in order.
        args: Vec<Argument>,
    },
    /// `not expr`
    Not(Box<FilterNode>),
}

/// Substring position for pattern predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatternKind {
    /// `startswith`
    Prefix,
    /// `endswith`
    Suffix,
    /// `contains`
    Substring,
}

impl PatternKind {
    /// Look up a filter function by name, ignoring case.
    pub fn from_function(name: &str) -> Option<Self> {
        [
            ("startswith", Self::Prefix),
            ("endswith", Self::Suffix),
            ("contains", Self::Substring),
        ]
        .into_iter()
        .find(|(function, _)| name.eq_ignore_ascii_case(function))
        .map(|(_, kind)| kind)
    }

    /// The SQL builder operator.
    pub const fn operator(self) -> Operator {
        match self {
            Self::Prefix => Operator::StartsWith,
            Self::Suffix => Operator::EndsWith,
            Self::Substring => Operator::Contains,
        }
    }
}

/// A compiled filter over whitelisted columns.
///
/// Applied to a query target with [`apply`](Self::apply). Plans compare
/// structurally, so two compilations of the same request are equal.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// `column op value`
    Compare {
        /// Column.
        column: String,
        /// Operator.
        op: ComparisonOp,
        /// Non-null value.
        value: Value,
    },
    /// `column IS NULL`, or `IS NOT NULL` when negated.
    IsNull {
        /// Column.
        column: String,
        /// `IS NOT NULL`.
        negated: bool,
    },
    /// Literal pattern match.
    Like {
        /// Column.
        column: String,
        /// Where the pattern must occur.
        kind: PatternKind,
        /// Text to match, without wildcards.
        pattern: String,
    },
    /// Both hold.
    And(Box<Predicate>, Box<Predicate>),
    /// Either holds.
    Or(Box<Predicate>, Box<Predicate>),
    /// Negation.
    Not(Box<Predicate>),
}

impl Predicate {
    /// `column = value`, or `IS NULL` for a null value.
    pub fn equals(column: impl Into<String>, value: Value) -> Self {
        let column = column.into();
        if value.is_null() {
            Self::IsNull {
                column,
                negated: false,
            }
        } else {
            Self::Compare {
                column,
                op: ComparisonOp::Eq,
                value,
            }
        }
    }

    /// `self AND other`.
    #[must_use]
    pub fn and(self, other: Self) -> Self {
        Self::And(Box::new(self), Box::new(other))
    }

    /// Add this predicate to `target`.
    pub fn apply<T: QueryTarget>(&self, target: T) -> T {
        target.filter(self)
    }

    /// Columns referenced, in order of appearance, without duplicates.
    pub fn columns(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_columns(&mut out);
        out
    }

    fn collect_columns<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Self::Compare { column, .. }
            | Self::IsNull { column, .. }
            | Self::Like { column, .. } => {
                if !out.contains(&column.as_str()) {
                    out.push(column);
                }
            },
            Self::And(left, right) | Self::Or(left, right) => {
                left.collect_columns(out);
                right.collect_columns(out);
            },
            Self::Not(inner) => inner.collect_columns(out),
        }
    }

    /// Render as a SQL builder expression. Chains of the same connective
    /// are flattened.
    ///
    /// # Panics
    ///
    /// Panics if a column is not a valid SQL identifier. Compiled predicates
    /// only hold registry columns, which are checked when the registry is
    /// built.
    pub fn to_filter_expr(&self) -> FilterExpr {
        match self {
            Self::Compare { column, op, value } => {
                simple(column.clone(), op.operator(), value.clone())
            },
            Self::IsNull { column, negated } => {
                let op = if *negated { Operator::Ne } else { Operator::Eq };
                simple(column.clone(), op, Value::Null)
            },
            Self::Like {
                column,
                kind,
                pattern,
            } => simple(column.clone(), kind.operator(), Value::String(pattern.clone())),
            Self::And(..) => {
                let mut parts = Vec::new();
                self.flatten(true, &mut parts);
                and(parts)
            },
            Self::Or(..) => {
                let mut parts = Vec::new();
                self.flatten(false, &mut parts);
                or(parts)
            },
            Self::Not(inner) => not(inner.to_filter_expr()),
        }
    }

    fn flatten(&self, conjunction: bool, out: &mut Vec<FilterExpr>) {
        match (self, conjunction) {
            (Self::And(left, right), true) | (Self::Or(left, right), false) => {
                left.flatten(conjunction, out);
                right.flatten(conjunction, out);
            },
            _ => out.push(self.to_filter_expr()),
        }
    }
}

/// Internal error before the source text and resource are attached.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum FilterError {
    Syntax { position: usize, reason: String },
    UnsupportedOperator(String),
    UnsupportedFunction { function: String, reason: String },
    UnknownAttribute(String),
    TooDeep { max: usize, actual: usize },
}

impl FilterError {
    pub(crate) fn syntax(position: usize, reason: impl Into<String>) -> Self {
        Self::Syntax {
            position,
            reason: reason.into(),
        }
    }

    fn into_query_error(self, src: &str, resource: &str) -> QueryError {
        match self {
            Self::Syntax { position, reason } => QueryError::InvalidFilter {
                param: PARAM.to_string(),
                value: src.to_string(),
                position,
                reason,
            },
            Self::UnsupportedOperator(operator) => QueryError::UnsupportedFilterOperator {
                param: PARAM.to_string(),
                value: src.to_string(),
                operator,
            },
            Self::UnsupportedFunction { function, reason } => {
                QueryError::UnsupportedFilterFunction {
                    param: PARAM.to_string(),
                    value: src.to_string(),
                    function,
                    reason,
                }
            },
            Self::UnknownAttribute(column) => {
                QueryError::unknown_attribute(PARAM, &column, resource)
            },
            Self::TooDeep { max, actual } => {
                QueryError::limit(PARAM, LimitKind::FilterDepth, max, actual)
            },
        }
    }
}

/// Parse a filter expression without resolving columns.
pub fn parse_filter(src: &str, limits: &Limits) -> Result<FilterNode, QueryError> {
    check_length(src, limits)?;
    parser::parse(src, limits.max_filter_depth).map_err(|err| err.into_query_error(src, ""))
}

/// Parse and compile a filter expression against `resource`.
pub fn compile_filter(
    src: &str,
    resource: &ResourceDescriptor,
    limits: &Limits,
) -> Result<Predicate, QueryError> {
    check_length(src, limits)?;
    parser::parse(src, limits.max_filter_depth)
        .and_then(|node| compile::compile(&node, resource))
        .map_err(|err| err.into_query_error(src, resource.name()))
}

fn check_length(src: &str, limits: &Limits) -> Result<(), QueryError> {
    if src.len() > limits.max_filter_length {
        return Err(QueryError::limit(
            PARAM,
            LimitKind::FilterLength,
            limits.max_filter_length,
            src.len(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use restq_sql::{Postgres, QueryBuilder, Sqlite};

    fn users() -> ResourceDescriptor {
        ResourceDescriptor::new("users")
            .properties(["name", "email", "qty", "price", "password"])
            .allow_columns(["id", "name", "email", "qty", "price"])
    }

    fn sql(filter: &str) -> String {
        let predicate = compile_filter(filter, &users(), &Limits::default()).unwrap();
        QueryBuilder::new(Sqlite, "users")
            .filter_expr(predicate.to_filter_expr())
            .build()
            .sql
    }

    #[test]
    fn test_or_of_equalities() {
        assert_eq!(
            sql("name eq 'x' or name eq 'y'"),
            "SELECT * FROM users WHERE (name = ?1 OR name = ?2)"
        );
    }

    #[test]
    fn test_eq_null_is_null_test() {
        assert_eq!(sql("qty eq null"), "SELECT * FROM users WHERE qty IS NULL");
        assert_eq!(
            sql("qty ne null"),
            "SELECT * FROM users WHERE qty IS NOT NULL"
        );
    }

    #[test]
    fn test_same_connective_is_flattened() {
        assert_eq!(
            sql("qty gt 1 and qty lt 5 and price ge 2.5"),
            "SELECT * FROM users WHERE (qty > ?1 AND qty < ?2 AND price >= ?3)"
        );
    }

    #[test]
    fn test_grouping_is_kept() {
        assert_eq!(
            sql("(name eq 'a' or name eq 'b') and not qty le 0"),
            "SELECT * FROM users WHERE ((name = ?1 OR name = ?2) AND NOT (qty <= ?3))"
        );
    }

    #[test]
    fn test_functions() {
        let predicate = compile_filter(
            "startswith(name, '50%') or contains(email, 'a_b')",
            &users(),
            &Limits::default(),
        )
        .unwrap();
        let result = QueryBuilder::new(Postgres, "users")
            .filter_expr(predicate.to_filter_expr())
            .build();
        assert_eq!(
            result.sql,
            "SELECT * FROM users WHERE (name LIKE $1 || '%' ESCAPE '\\' OR email LIKE '%' || $2 || '%' ESCAPE '\\')"
        );
        assert_eq!(
            result.params,
            vec![Value::from("50\\%"), Value::from("a\\_b")]
        );
    }

    #[test]
    fn test_unknown_attribute() {
        let err = compile_filter("password eq 'x'", &users(), &Limits::default()).unwrap_err();
        assert_eq!(
            err,
            QueryError::UnknownAttribute {
                param: "$filter".into(),
                attribute: "password".into(),
                resource: "users".into(),
            }
        );
    }

    #[test]
    fn test_unsupported_operator() {
        let err = compile_filter("price add 2 eq 5", &users(), &Limits::default()).unwrap_err();
        assert_eq!(err.code(), "UnsupportedFilterOperator");
        assert_eq!(err.value(), Some("price add 2 eq 5"));
    }

    #[test]
    fn test_invalid_filter_position() {
        let err = compile_filter("name eq 'x' and", &users(), &Limits::default()).unwrap_err();
        assert!(matches!(
            err,
            QueryError::InvalidFilter { position: 15, .. }
        ));
    }

    #[test]
    fn test_length_limit() {
        let limits = Limits::default().max_filter_length(10);
        let err = compile_filter("name eq 'abcdef'", &users(), &limits).unwrap_err();
        assert_eq!(
            err,
            QueryError::LimitExceeded {
                param: "$filter".into(),
                kind: LimitKind::FilterLength,
                max: 10,
                actual: 16,
            }
        );
    }

    #[test]
    fn test_depth_limit() {
        let limits = Limits::default().max_filter_depth(1);
        let err = compile_filter("((qty eq 1))", &users(), &limits).unwrap_err();
        assert!(matches!(
            err,
            QueryError::LimitExceeded {
                kind: LimitKind::FilterDepth,
                ..
            }
        ));
    }

    #[test]
    fn test_parse_filter_keeps_unknown_columns() {
        let node = parse_filter("anything eq 1", &Limits::default()).unwrap();
        assert!(matches!(node, FilterNode::Comparison { .. }));
    }

    #[test]
    fn test_predicate_eq_null() {
        assert_eq!(
            Predicate::equals("deleted_at", Value::Null),
            Predicate::IsNull {
                column: "deleted_at".into(),
                negated: false,
            }
        );
    }
}
