//! Identifier validation for table and column names.

use std::fmt;

/// Maximum length for SQL identifiers (`PostgreSQL` limit is 63).
const MAX_IDENTIFIER_LENGTH: usize = 63;

/// Why a string was rejected as a SQL identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum IdentifierError {
    /// The identifier is empty.
    Empty,
    /// The identifier is longer than 63 bytes.
    TooLong {
        /// Length of the rejected identifier in bytes.
        len: usize,
    },
    /// The identifier contains a character outside `[A-Za-z0-9_]`, or starts
    /// with a digit.
    InvalidChar {
        /// Byte offset of the offending character.
        position: usize,
        /// The offending character.
        found: char,
    },
}

impl fmt::Display for IdentifierError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "identifier is empty"),
            Self::TooLong { len } => write!(
                f,
                "identifier is {len} bytes long, maximum is {MAX_IDENTIFIER_LENGTH}"
            ),
            Self::InvalidChar { position, found } => {
                write!(f, "invalid character {found:?} at position {position}")
            },
        }
    }
}

impl std::error::Error for IdentifierError {}

/// Check that a string is a safe, unquoted SQL identifier.
///
/// A valid identifier starts with an ASCII letter or underscore, continues
/// with ASCII letters, digits or underscores, and is 1-63 bytes long.
///
/// # Examples
///
/// ```
/// use restq_sql::{IdentifierError, check_sql_identifier};
///
/// assert!(check_sql_identifier("order_items").is_ok());
/// assert_eq!(check_sql_identifier(""), Err(IdentifierError::Empty));
/// assert_eq!(
///     check_sql_identifier("9lives"),
///     Err(IdentifierError::InvalidChar { position: 0, found: '9' })
/// );
/// ```
pub fn check_sql_identifier(s: &str) -> Result<(), IdentifierError> {
    if s.is_empty() {
        return Err(IdentifierError::Empty);
    }
    if s.len() > MAX_IDENTIFIER_LENGTH {
        return Err(IdentifierError::TooLong { len: s.len() });
    }

    for (position, c) in s.char_indices() {
        let ok = if position == 0 {
            c.is_ascii_alphabetic() || c == '_'
        } else {
            c.is_ascii_alphanumeric() || c == '_'
        };
        if !ok {
            return Err(IdentifierError::InvalidChar { position, found: c });
        }
    }

    Ok(())
}

/// Whether a string is a safe, unquoted SQL identifier.
///
/// ```
/// use restq_sql::is_valid_sql_identifier;
///
/// assert!(is_valid_sql_identifier("users"));
/// assert!(!is_valid_sql_identifier("user.id"));
/// ```
#[inline]
#[must_use]
pub fn is_valid_sql_identifier(s: &str) -> bool {
    check_sql_identifier(s).is_ok()
}

/// Assert that a string is a valid SQL identifier.
///
/// # Panics
///
/// Panics with a descriptive error if the identifier is invalid. Intended for
/// programmer errors (names written in code or in a registry), never for
/// request input, which is whitelisted before it reaches the builder.
///
/// ```should_panic
/// use restq_sql::assert_valid_sql_identifier;
///
/// assert_valid_sql_identifier("user; DROP TABLE", "table"); // Panics!
/// ```
#[inline]
pub fn assert_valid_sql_identifier(s: &str, context: &str) {
    if let Err(err) = check_sql_identifier(s) {
        panic!("Invalid SQL {context} name '{s}': {err}");
    }
}
