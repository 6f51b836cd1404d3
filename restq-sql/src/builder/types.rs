//! Values, conditions and filter trees.

use crate::validate::assert_valid_sql_identifier;
use serde_json::Value as JsonValue;

/// Comparison applied by a [`Filter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// `=`, or `IS NULL` against [`Value::Null`]
    Eq,
    /// `!=`, or `IS NOT NULL` against [`Value::Null`]
    Ne,
    /// `>`
    Gt,
    /// `>=`
    Gte,
    /// `<`
    Lt,
    /// `<=`
    Lte,
    /// Membership in a [`Value::Array`]
    In,
    /// Prefix match
    StartsWith,
    /// Suffix match
    EndsWith,
    /// Substring match
    Contains,
}

impl Operator {
    /// Infix token for the plain comparisons.
    ///
    /// `In` and the pattern operators are rendered by the dialect; for those
    /// this returns the keyword they are built around.
    #[must_use]
    pub const fn sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::In => "IN",
            Self::StartsWith | Self::EndsWith | Self::Contains => "LIKE",
        }
    }

    /// Whether this is one of the `LIKE`-based operators.
    #[must_use]
    pub const fn is_pattern(self) -> bool {
        matches!(self, Self::StartsWith | Self::EndsWith | Self::Contains)
    }
}

/// A bound parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// SQL `NULL`.
    Null,
    /// Boolean.
    Bool(bool),
    /// 64-bit integer.
    Int(i64),
    /// Double precision float.
    Float(f64),
    /// Text.
    String(String),
    /// List, bound for `IN`.
    Array(Vec<Value>),
}

impl Value {
    /// Read a value out of an executor row.
    ///
    /// Objects have no parameter form and yield `None`.
    ///
    /// ```
    /// use restq_sql::Value;
    /// use serde_json::json;
    ///
    /// assert_eq!(Value::from_json(&json!("hello")), Some(Value::from("hello")));
    /// assert_eq!(Value::from_json(&json!(42)), Some(Value::Int(42)));
    /// assert_eq!(Value::from_json(&json!({"a": 1})), None);
    /// ```
    #[must_use]
    pub fn from_json(json: &JsonValue) -> Option<Self> {
        Some(match json {
            JsonValue::Null => Self::Null,
            JsonValue::Bool(b) => Self::Bool(*b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => Self::Float(n.as_f64()?),
            },
            JsonValue::String(s) => Self::String(s.clone()),
            JsonValue::Array(items) => {
                Self::Array(items.iter().map(Self::from_json).collect::<Option<_>>()?)
            },
            JsonValue::Object(_) => return None,
        })
    }

    /// JSON form. Non-finite floats become `null`.
    #[must_use]
    pub fn to_json(&self) -> JsonValue {
        match self {
            Self::Null => JsonValue::Null,
            Self::Bool(b) => JsonValue::Bool(*b),
            Self::Int(i) => JsonValue::from(*i),
            Self::Float(f) => {
                serde_json::Number::from_f64(*f).map_or(JsonValue::Null, JsonValue::Number)
            },
            Self::String(s) => JsonValue::String(s.clone()),
            Self::Array(items) => JsonValue::Array(items.iter().map(Self::to_json).collect()),
        }
    }

    /// Whether this is [`Value::Null`].
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

/// `ORDER BY` direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortDir {
    /// Ascending.
    Asc,
    /// Descending.
    Desc,
}

impl SortDir {
    /// SQL keyword.
    #[must_use]
    pub const fn sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// One `column op value` condition.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    /// Column name, a checked identifier.
    pub column: String,
    /// Comparison.
    pub op: Operator,
    /// Right-hand side, always bound.
    pub value: Value,
}

impl Filter {
    /// # Panics
    ///
    /// Panics if `column` is not a valid SQL identifier.
    pub fn new(column: impl Into<String>, op: Operator, value: Value) -> Self {
        let column = column.into();
        assert_valid_sql_identifier(&column, "filter column");
        Self { column, op, value }
    }
}

/// A tree of conditions.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterExpr {
    /// A single condition.
    Condition(Filter),
    /// Every child holds. Empty is always true.
    All(Vec<FilterExpr>),
    /// Some child holds. Empty is always false.
    Any(Vec<FilterExpr>),
    /// The child does not hold.
    Not(Box<FilterExpr>),
}

/// Rendered statement.
#[derive(Debug, Clone, PartialEq)]
#[must_use = "QueryResult must be used to execute the query"]
pub struct QueryResult {
    /// SQL text with dialect placeholders.
    pub sql: String,
    /// Parameters in placeholder order.
    pub params: Vec<Value>,
}

/// A single condition as an expression.
///
/// # Panics
///
/// Panics if `column` is not a valid SQL identifier.
pub fn simple(column: impl Into<String>, op: Operator, value: Value) -> FilterExpr {
    FilterExpr::Condition(Filter::new(column, op, value))
}

/// Conjunction of `filters`.
#[must_use]
pub const fn and(filters: Vec<FilterExpr>) -> FilterExpr {
    FilterExpr::All(filters)
}

/// Disjunction of `filters`.
#[must_use]
pub const fn or(filters: Vec<FilterExpr>) -> FilterExpr {
    FilterExpr::Any(filters)
}

/// Negation of `filter`.
#[must_use]
pub fn not(filter: FilterExpr) -> FilterExpr {
    FilterExpr::Not(Box::new(filter))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json_scalars() {
        assert_eq!(Value::from_json(&json!(null)), Some(Value::Null));
        assert_eq!(Value::from_json(&json!(true)), Some(Value::Bool(true)));
        assert_eq!(Value::from_json(&json!(-7)), Some(Value::Int(-7)));
        assert_eq!(Value::from_json(&json!(1.5)), Some(Value::Float(1.5)));
    }

    #[test]
    fn test_from_json_nested_object_rejected() {
        assert_eq!(Value::from_json(&json!([1, {"a": 1}])), None);
        assert_eq!(
            Value::from_json(&json!([1, "x"])),
            Some(Value::Array(vec![Value::Int(1), Value::from("x")]))
        );
    }

    #[test]
    fn test_to_json() {
        let value = Value::Array(vec![Value::Int(1), Value::from("x"), Value::Null]);
        assert_eq!(value.to_json(), json!([1, "x", null]));
        assert_eq!(Value::Float(f64::NAN).to_json(), json!(null));
    }

    #[test]
    fn test_pattern_operators() {
        assert!(Operator::Contains.is_pattern());
        assert!(!Operator::In.is_pattern());
        assert_eq!(Operator::Gte.sql(), ">=");
    }

    #[test]
    #[should_panic(expected = "Invalid SQL filter column name")]
    fn test_simple_rejects_bad_identifier() {
        let _ = simple("name; DROP TABLE users", Operator::Eq, Value::Int(1));
    }
}
