//! SQL identifier validation.
//!
//! Every table and column name that reaches the builder is checked here,
//! either once at registry setup (`check_sql_identifier`) or as a
//! programmer-error assertion at build time (`assert_valid_sql_identifier`).

mod column;

pub use column::{
    IdentifierError, assert_valid_sql_identifier, check_sql_identifier, is_valid_sql_identifier,
};
