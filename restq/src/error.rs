//! Error types.
//!
//! [`QueryError`] is the only error a request can produce while compiling.
//! Every variant is a client error (HTTP 400) carrying the offending query
//! parameter and value. [`RegistryError`] and [`ConfigError`] are setup-time
//! failures and never surface to a client.

use restq_sql::IdentifierError;
use serde::Serialize;
use std::fmt;

/// Which bound a request went over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum LimitKind {
    /// Segments in a single `$expand` path.
    RecursionDepth,
    /// Number of `$expand` paths.
    Relations,
    /// Number of `$select` entries.
    Columns,
    /// Parenthesis / `not` nesting in `$filter`.
    FilterDepth,
    /// Byte length of `$filter`.
    FilterLength,
}

impl fmt::Display for LimitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::RecursionDepth => "expansion depth",
            Self::Relations => "relation count",
            Self::Columns => "column count",
            Self::FilterDepth => "filter nesting depth",
            Self::FilterLength => "filter length",
        })
    }
}

/// A rejected query.
///
/// Compilation is all-or-nothing: the first violation found is returned and
/// no partial plan exists.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum QueryError {
    /// The top-level option object does not satisfy the contract.
    #[error("invalid {param} value {value:?}: {reason}")]
    SchemaValidation {
        /// Offending key.
        param: String,
        /// Offending raw value.
        value: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A resource or relation path does not resolve.
    #[error("{param}: '{path}' not found")]
    NotFound {
        /// Parameter the path came from.
        param: String,
        /// The full path, `/`-separated.
        path: String,
    },

    /// A column is not whitelisted on the resource it was looked up in.
    #[error("{param}: unknown attribute '{attribute}' on '{resource}'")]
    UnknownAttribute {
        /// Parameter the column came from.
        param: String,
        /// The column as written.
        attribute: String,
        /// Resource the column was resolved against.
        resource: String,
    },

    /// A relation path segment is not a whitelisted relation.
    #[error("{param}: unknown relation '{segment}' in '{path}'")]
    UnknownRelation {
        /// Parameter the path came from.
        param: String,
        /// The full relation path as written.
        path: String,
        /// The first segment that failed to resolve.
        segment: String,
    },

    /// A `$select` entry names a relation that is not in `$expand`.
    #[error("{param}: '{value}' selects from '{relation}', which is not expanded")]
    UnexpandedRelation {
        /// Always `$select`.
        param: String,
        /// The entry as written.
        value: String,
        /// The relation path prefix.
        relation: String,
    },

    /// An identifier in operator position is not a comparison operator, or
    /// the operator cannot be applied to the literal.
    #[error("{param}: unsupported operator '{operator}' in {value:?}")]
    UnsupportedFilterOperator {
        /// Always `$filter`.
        param: String,
        /// The whole filter expression.
        value: String,
        /// The operator as written.
        operator: String,
    },

    /// A function call names an unknown function or has bad arguments.
    #[error("{param}: unsupported call to '{function}' ({reason}) in {value:?}")]
    UnsupportedFilterFunction {
        /// Always `$filter`.
        param: String,
        /// The whole filter expression.
        value: String,
        /// The function as written.
        function: String,
        /// Unknown name, or what the arguments should be.
        reason: String,
    },

    /// The filter expression does not parse.
    #[error("{param}: {reason} at position {position} in {value:?}")]
    InvalidFilter {
        /// Always `$filter`.
        param: String,
        /// The whole filter expression.
        value: String,
        /// Byte offset of the failure.
        position: usize,
        /// What the parser expected.
        reason: String,
    },

    /// A request exceeded one of the configured limits.
    #[error("{param}: {kind} {actual} exceeds the maximum of {max}")]
    LimitExceeded {
        /// Parameter that went over.
        param: String,
        /// Which limit.
        kind: LimitKind,
        /// Configured maximum.
        max: usize,
        /// Observed value.
        actual: usize,
    },
}

impl QueryError {
    /// Stable machine-readable error code.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::SchemaValidation { .. } => "SchemaValidationError",
            Self::NotFound { .. } => "NotFound",
            Self::UnknownAttribute { .. } => "UnknownAttribute",
            Self::UnknownRelation { .. } => "UnknownRelation",
            Self::UnexpandedRelation { .. } => "UnexpandedRelation",
            Self::UnsupportedFilterOperator { .. } => "UnsupportedFilterOperator",
            Self::UnsupportedFilterFunction { .. } => "UnsupportedFilterFunction",
            Self::InvalidFilter { .. } => "InvalidFilter",
            Self::LimitExceeded { .. } => "LimitExceeded",
        }
    }

    /// The query parameter the error is about.
    pub fn param(&self) -> &str {
        match self {
            Self::SchemaValidation { param, .. }
            | Self::NotFound { param, .. }
            | Self::UnknownAttribute { param, .. }
            | Self::UnknownRelation { param, .. }
            | Self::UnexpandedRelation { param, .. }
            | Self::UnsupportedFilterOperator { param, .. }
            | Self::UnsupportedFilterFunction { param, .. }
            | Self::InvalidFilter { param, .. }
            | Self::LimitExceeded { param, .. } => param,
        }
    }

    /// The offending value, when there is one.
    pub fn value(&self) -> Option<&str> {
        match self {
            Self::SchemaValidation { value, .. }
            | Self::UnexpandedRelation { value, .. }
            | Self::UnsupportedFilterOperator { value, .. }
            | Self::UnsupportedFilterFunction { value, .. }
            | Self::InvalidFilter { value, .. } => Some(value),
            Self::NotFound { path, .. } | Self::UnknownRelation { path, .. } => Some(path),
            Self::UnknownAttribute { attribute, .. } => Some(attribute),
            Self::LimitExceeded { .. } => None,
        }
    }

    /// HTTP status for this error. Every compile error is a client error.
    pub const fn status(&self) -> u16 {
        400
    }

    pub(crate) fn schema(
        param: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::SchemaValidation {
            param: param.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn limit(param: &str, kind: LimitKind, max: usize, actual: usize) -> Self {
        Self::LimitExceeded {
            param: param.to_string(),
            kind,
            max,
            actual,
        }
    }

    pub(crate) fn unknown_attribute(param: &str, attribute: &str, resource: &str) -> Self {
        Self::UnknownAttribute {
            param: param.to_string(),
            attribute: attribute.to_string(),
            resource: resource.to_string(),
        }
    }
}

/// Serializable error body for the HTTP layer.
///
/// ```
/// use restq::{ErrorBody, QueryError};
///
/// let err = QueryError::NotFound { param: "$expand".into(), path: "orders/x".into() };
/// let body = ErrorBody::from(&err);
/// assert_eq!(body.code, "NotFound");
/// assert_eq!(body.value.as_deref(), Some("orders/x"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[non_exhaustive]
pub struct ErrorBody {
    /// [`QueryError::code`].
    pub code: &'static str,
    /// [`QueryError::param`].
    pub param: String,
    /// [`QueryError::value`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Human-readable message.
    pub message: String,
}

impl From<&QueryError> for ErrorBody {
    fn from(err: &QueryError) -> Self {
        Self {
            code: err.code(),
            param: err.param().to_string(),
            value: err.value().map(str::to_string),
            message: err.to_string(),
        }
    }
}

/// A registry that cannot be built.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum RegistryError {
    /// Two resources share a name.
    #[error("resource '{0}' is declared more than once")]
    DuplicateResource(String),

    /// A resource has no id columns.
    #[error("resource '{0}' has no id columns")]
    MissingIdColumns(String),

    /// A table or column name is not a plain SQL identifier.
    #[error("resource '{resource}': invalid identifier '{name}': {source}")]
    InvalidIdentifier {
        /// Resource declaring the name.
        resource: String,
        /// The rejected name.
        name: String,
        /// Why it was rejected.
        source: IdentifierError,
    },

    /// A relation points at a resource that is not registered.
    #[error("relation '{resource}.{relation}' targets unknown resource '{target}'")]
    UnknownTarget {
        /// Resource declaring the relation.
        resource: String,
        /// Relation name.
        relation: String,
        /// The missing target.
        target: String,
    },

    /// A relation's join column does not exist on the resource it belongs to.
    #[error("relation '{resource}.{relation}' joins on undeclared column '{column}'")]
    UnknownJoinColumn {
        /// Resource declaring the relation.
        resource: String,
        /// Relation name.
        relation: String,
        /// The missing column.
        column: String,
    },

    /// The column whitelist names a column that is not declared.
    #[error("resource '{resource}' whitelists undeclared column '{column}'")]
    UnknownColumn {
        /// Resource declaring the whitelist.
        resource: String,
        /// The undeclared column.
        column: String,
    },

    /// The relation whitelist names a relation that is not declared.
    #[error("resource '{resource}' whitelists undeclared relation '{relation}'")]
    UnknownRelation {
        /// Resource declaring the whitelist.
        resource: String,
        /// The undeclared relation.
        relation: String,
    },
}

/// A configuration that cannot be loaded.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// The TOML document does not parse or has the wrong shape.
    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// A limit is out of range.
    #[error("invalid limit {name}: {reason}")]
    InvalidLimit {
        /// Limit field name.
        name: &'static str,
        /// What is wrong with it.
        reason: String,
    },

    /// The options contract is inconsistent.
    #[error("invalid contract: {0}")]
    InvalidContract(String),
}

/// A plan that could not be run.
///
/// Executor failures are carried as-is in [`DriverError::Executor`].
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum DriverError<E> {
    /// The executor failed.
    #[error("{0}")]
    Executor(E),

    /// The count query did not return a non-negative integer `count` column.
    #[error("count query returned {found}, expected a non-negative integer")]
    InvalidCount {
        /// What was found instead, as JSON.
        found: String,
    },
}

impl<E> DriverError<E> {
    /// The executor error, if that is what failed.
    pub fn into_executor(self) -> Option<E> {
        match self {
            Self::Executor(err) => Some(err),
            Self::InvalidCount { .. } => None,
        }
    }
}
