//! Top-level option validation.
//!
//! Turns a [`RawQuery`] into typed [`ValidatedOptions`], applying the
//! contract and defaults. Nothing here knows about resources; column and
//! relation names are checked later against the registry.

use crate::config::{Limits, OptionsContract, Param};
use crate::error::QueryError;
use crate::raw::RawQuery;
use restq_sql::SortDir;

/// One `$sort` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    /// Column name.
    pub column: String,
    /// Direction. `-` prefix is descending, `+` or none is ascending.
    pub direction: SortDir,
}

impl SortSpec {
    /// Ascending sort on `column`.
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: SortDir::Asc,
        }
    }

    /// Descending sort on `column`.
    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: SortDir::Desc,
        }
    }
}

/// Typed, defaulted options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedOptions {
    /// Raw `$filter` expression.
    pub filter: Option<String>,
    /// `$sort` entries, primary first.
    pub sort: Vec<SortSpec>,
    /// `$skip`.
    pub skip: Option<u64>,
    /// `$top`, defaulted.
    pub top: u32,
    /// `$expand` paths.
    pub expand: Vec<String>,
    /// `$select` entries.
    pub select: Vec<String>,
    /// `$count`.
    pub count: bool,
}

/// Validate `raw` against `contract`.
///
/// ```
/// use restq::{Limits, OptionsContract, RawQuery, validate};
///
/// let raw = RawQuery::new().with("$sort", "-total, name").with("$top", "5");
/// let options = validate(&raw, &OptionsContract::new(), &Limits::default()).unwrap();
/// assert_eq!(options.top, 5);
/// assert_eq!(options.sort.len(), 2);
/// assert!(!options.count);
/// ```
pub fn validate(
    raw: &RawQuery,
    contract: &OptionsContract,
    limits: &Limits,
) -> Result<ValidatedOptions, QueryError> {
    for (key, values) in raw.iter() {
        match Param::from_key(key) {
            Some(param) if !contract.allows(param) => {
                return Err(QueryError::schema(
                    key,
                    values.join(","),
                    "parameter is disabled for this resource",
                ));
            },
            Some(_) => {},
            None if contract.open || contract.pass_through.contains(key) => {},
            None => {
                return Err(QueryError::schema(
                    key,
                    values.join(","),
                    "unknown parameter",
                ));
            },
        }
    }

    let filter = match single(raw, Param::Filter)? {
        Some(filter) if filter.trim().is_empty() => {
            return Err(QueryError::schema(
                Param::Filter.key(),
                filter,
                "must not be empty",
            ));
        },
        other => other.map(str::to_string),
    };

    let top = match single(raw, Param::Top)? {
        None => limits.default_top,
        Some(value) => {
            let top = parse_int(Param::Top, value, 1, i64::from(limits.max_top))?;
            u32::try_from(top).map_err(|_| out_of_range(Param::Top, value))?
        },
    };

    let skip = match single(raw, Param::Skip)? {
        None => None,
        Some(value) => {
            let skip = parse_int(Param::Skip, value, 0, i64::MAX)?;
            Some(u64::try_from(skip).map_err(|_| out_of_range(Param::Skip, value))?)
        },
    };

    let count = match single(raw, Param::Count)? {
        None => false,
        Some(value) => parse_bool(Param::Count, value)?,
    };

    let sort = list(raw, Param::Sort)
        .into_iter()
        .map(|entry| parse_sort(entry, contract))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ValidatedOptions {
        filter,
        sort,
        skip,
        top,
        expand: list(raw, Param::Expand)
            .into_iter()
            .map(str::to_string)
            .collect(),
        select: list(raw, Param::Select)
            .into_iter()
            .map(str::to_string)
            .collect(),
        count,
    })
}

/// The value of a single-valued parameter. Repeating it is an error.
fn single(raw: &RawQuery, param: Param) -> Result<Option<&str>, QueryError> {
    match raw.get(param.key()) {
        None | Some([]) => Ok(None),
        Some([value]) => Ok(Some(value.as_str())),
        Some(values) => Err(QueryError::schema(
            param.key(),
            values.join(","),
            "must not be repeated",
        )),
    }
}

/// Comma-split every value of a list parameter. Entries are trimmed and
/// empty entries dropped; repeated keys concatenate.
fn list(raw: &RawQuery, param: Param) -> Vec<&str> {
    raw.get(param.key())
        .unwrap_or_default()
        .iter()
        .flat_map(|value| value.split(','))
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .collect()
}

fn parse_int(param: Param, value: &str, min: i64, max: i64) -> Result<i64, QueryError> {
    let n: i64 = value.trim().parse().map_err(|_| {
        QueryError::schema(param.key(), value, "must be an integer")
    })?;
    if n < min || n > max {
        let reason = if max == i64::MAX {
            format!("must be at least {min}")
        } else {
            format!("must be between {min} and {max}")
        };
        return Err(QueryError::schema(param.key(), value, reason));
    }
    Ok(n)
}

fn out_of_range(param: Param, value: &str) -> QueryError {
    QueryError::schema(param.key(), value, "out of range")
}

fn parse_bool(param: Param, value: &str) -> Result<bool, QueryError> {
    match value.trim() {
        v if v.eq_ignore_ascii_case("true") => Ok(true),
        v if v.eq_ignore_ascii_case("false") => Ok(false),
        _ => Err(QueryError::schema(
            param.key(),
            value,
            "must be true or false",
        )),
    }
}

fn parse_sort(entry: &str, contract: &OptionsContract) -> Result<SortSpec, QueryError> {
    let (direction, column) = if let Some(column) = entry.strip_prefix('-') {
        (SortDir::Desc, column.trim_start())
    } else if let Some(column) = entry.strip_prefix('+') {
        (SortDir::Asc, column.trim_start())
    } else {
        (SortDir::Asc, entry)
    };

    if column.is_empty() {
        return Err(QueryError::schema(
            Param::Sort.key(),
            entry,
            "missing column name",
        ));
    }
    if let Some(sortable) = &contract.sortable
        && !sortable.contains(column)
    {
        let allowed: Vec<&str> = sortable.iter().map(String::as_str).collect();
        return Err(QueryError::schema(
            Param::Sort.key(),
            entry,
            format!("must be one of: {}", allowed.join(", ")),
        ));
    }

    Ok(SortSpec {
        column: column.to_string(),
        direction,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(raw: &RawQuery) -> Result<ValidatedOptions, QueryError> {
        validate(raw, &OptionsContract::new(), &Limits::default())
    }

    #[test]
    fn test_defaults() {
        let options = check(&RawQuery::new()).unwrap();
        assert_eq!(
            options,
            ValidatedOptions {
                filter: None,
                sort: vec![],
                skip: None,
                top: 10,
                expand: vec![],
                select: vec![],
                count: false,
            }
        );
    }

    #[test]
    fn test_top_range() {
        assert_eq!(check(&RawQuery::new().with("$top", "1")).unwrap().top, 1);
        assert_eq!(check(&RawQuery::new().with("$top", "100")).unwrap().top, 100);

        for bad in ["0", "101", "-1", "ten", "1.5", ""] {
            let err = check(&RawQuery::new().with("$top", bad)).unwrap_err();
            assert_eq!(err.code(), "SchemaValidationError", "{bad:?}");
            assert_eq!(err.param(), "$top");
        }
    }

    #[test]
    fn test_top_respects_configured_max() {
        let limits = Limits::default().max_top(20);
        let err = validate(
            &RawQuery::new().with("$top", "21"),
            &OptionsContract::new(),
            &limits,
        )
        .unwrap_err();
        assert!(err.to_string().contains("between 1 and 20"));
    }

    #[test]
    fn test_skip() {
        let options = check(&RawQuery::new().with("$skip", "0")).unwrap();
        assert_eq!(options.skip, Some(0));
        assert!(check(&RawQuery::new().with("$skip", "-5")).is_err());
    }

    #[test]
    fn test_count() {
        assert!(check(&RawQuery::new().with("$count", "true")).unwrap().count);
        assert!(check(&RawQuery::new().with("$count", "TRUE")).unwrap().count);
        assert!(!check(&RawQuery::new().with("$count", "false")).unwrap().count);
        assert!(check(&RawQuery::new().with("$count", "yes")).is_err());
    }

    #[test]
    fn test_unknown_key_rejected_by_closed_contract() {
        let err = check(&RawQuery::new().with("$orderby", "name")).unwrap_err();
        assert_eq!(err.param(), "$orderby");
        assert!(err.to_string().contains("unknown parameter"));
    }

    #[test]
    fn test_open_contract_and_pass_through() {
        let raw = RawQuery::new().with("access_token", "abc").with("$top", "3");
        let contract = OptionsContract::new().pass_through(["access_token"]);
        assert_eq!(
            validate(&raw, &contract, &Limits::default()).unwrap().top,
            3
        );

        let raw = RawQuery::new().with("anything", "x");
        let contract = OptionsContract::new().open();
        assert!(validate(&raw, &contract, &Limits::default()).is_ok());
    }

    #[test]
    fn test_disabled_parameter() {
        let contract = OptionsContract::new().disable(Param::Count);
        let err = validate(
            &RawQuery::new().with("$count", "true"),
            &contract,
            &Limits::default(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("disabled"));
    }

    #[test]
    fn test_single_valued_keys_must_not_repeat() {
        let raw = RawQuery::new().with("$top", "5").with("$top", "6");
        assert!(check(&raw).is_err());
    }

    #[test]
    fn test_lists_split_trim_and_concatenate() {
        let raw = RawQuery::new()
            .with("$expand", "orders, customer,,")
            .with("$expand", " orders/items ")
            .with("$select", "id,name");
        let options = check(&raw).unwrap();
        assert_eq!(options.expand, ["orders", "customer", "orders/items"]);
        assert_eq!(options.select, ["id", "name"]);
    }

    #[test]
    fn test_sort_prefixes() {
        let options = check(&RawQuery::new().with("$sort", "-created_at,+name,id")).unwrap();
        assert_eq!(
            options.sort,
            vec![
                SortSpec::desc("created_at"),
                SortSpec::asc("name"),
                SortSpec::asc("id"),
            ]
        );
    }

    #[test]
    fn test_sort_enum() {
        let contract = OptionsContract::new().sortable(["total"]);
        let ok = validate(
            &RawQuery::new().with("$sort", "-total"),
            &contract,
            &Limits::default(),
        );
        assert!(ok.is_ok());

        let err = validate(
            &RawQuery::new().with("$sort", "name"),
            &contract,
            &Limits::default(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("must be one of: total"));
    }

    #[test]
    fn test_sort_missing_column() {
        assert!(check(&RawQuery::new().with("$sort", "-")).is_err());
    }

    #[test]
    fn test_blank_filter() {
        let err = check(&RawQuery::new().with("$filter", "   ")).unwrap_err();
        assert_eq!(err.param(), "$filter");
    }
}
