//! The untyped request query, before validation.

use crate::error::QueryError;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

/// Maximum decoded length of a single key or value (64KB).
const MAX_DECODED_LEN: usize = 65536;

/// Per-request `key -> values` map.
///
/// Repeated keys keep every value in arrival order; the validator decides
/// whether a key may repeat.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawQuery {
    params: BTreeMap<String, Vec<String>>,
}

impl RawQuery {
    /// An empty query.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value, builder style.
    ///
    /// ```
    /// use restq::RawQuery;
    ///
    /// let raw = RawQuery::new().with("$top", "5").with("$expand", "orders");
    /// assert_eq!(raw.get("$top"), Some(&["5".to_string()][..]));
    /// ```
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(key, value);
        self
    }

    /// Append a value.
    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.params
            .entry(key.into())
            .or_default()
            .push(value.into());
    }

    /// Parse a URL query string (without the leading `?`).
    ///
    /// Keys and values are percent-decoded and `+` becomes a space. Pairs
    /// without `=` are kept with an empty value. A key or value that decodes
    /// to more than 64KB is rejected with `SchemaValidation` on that key.
    ///
    /// ```
    /// use restq::RawQuery;
    ///
    /// let raw = RawQuery::from_query_string("$filter=name%20eq%20'x'&$top=5").unwrap();
    /// assert_eq!(raw.get("$filter").unwrap()[0], "name eq 'x'");
    /// ```
    pub fn from_query_string(query: &str) -> Result<Self, QueryError> {
        let mut raw = Self::new();
        for pair in query.split('&').filter(|pair| !pair.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let key = url_decode(key).map_err(|TooLong| too_long("query", key))?;
            let value = url_decode(value).map_err(|TooLong| too_long(&key, value))?;
            raw.push(key, value);
        }
        Ok(raw)
    }

    /// Build from a JSON object, as produced by a body or query parser.
    ///
    /// Scalars become one value, arrays become repeated values and `null`
    /// entries are skipped. Nested objects are rejected.
    pub fn from_json(value: &JsonValue) -> Result<Self, QueryError> {
        let JsonValue::Object(map) = value else {
            return Err(QueryError::schema(
                "query",
                value.to_string(),
                "expected an object",
            ));
        };

        let mut raw = Self::new();
        for (key, value) in map {
            match value {
                JsonValue::Null => {},
                JsonValue::Array(items) => {
                    for item in items {
                        raw.push(key.clone(), json_scalar(key, item)?);
                    }
                },
                other => raw.push(key.clone(), json_scalar(key, other)?),
            }
        }
        Ok(raw)
    }

    /// All values for a key.
    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.params.get(key).map(Vec::as_slice)
    }

    /// Keys with their values, in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.params
            .iter()
            .map(|(key, values)| (key.as_str(), values.as_slice()))
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Whether no key is present.
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RawQuery {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut raw = Self::new();
        for (key, value) in iter {
            raw.push(key, value);
        }
        raw
    }
}

fn json_scalar(key: &str, value: &JsonValue) -> Result<String, QueryError> {
    match value {
        JsonValue::String(s) => Ok(s.clone()),
        JsonValue::Bool(b) => Ok(b.to_string()),
        JsonValue::Number(n) => Ok(n.to_string()),
        JsonValue::Null | JsonValue::Array(_) | JsonValue::Object(_) => Err(QueryError::schema(
            key,
            value.to_string(),
            "expected a string, number or boolean",
        )),
    }
}

/// Decoded output went over `MAX_DECODED_LEN`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TooLong;

fn too_long(param: &str, raw: &str) -> QueryError {
    let shown: String = raw.chars().take(64).collect();
    QueryError::schema(
        param,
        shown,
        format!("decodes to more than {}KB", MAX_DECODED_LEN / 1024),
    )
}

/// Percent-decode a query component.
///
/// Invalid escapes are kept as written and invalid UTF-8 is replaced.
fn url_decode(s: &str) -> Result<String, TooLong> {
    let mut bytes = Vec::with_capacity(s.len().min(MAX_DECODED_LEN));
    let mut input = s.bytes();

    while let Some(b) = input.next() {
        if bytes.len() >= MAX_DECODED_LEN {
            return Err(TooLong);
        }
        match b {
            b'%' => {
                let hi = input.next();
                let lo = input.next();
                match (hi, lo) {
                    (Some(hi), Some(lo)) => match (hex_digit(hi), hex_digit(lo)) {
                        (Some(h), Some(l)) => bytes.push((h << 4) | l),
                        _ => bytes.extend_from_slice(&[b'%', hi, lo]),
                    },
                    (Some(hi), None) => bytes.extend_from_slice(&[b'%', hi]),
                    _ => bytes.push(b'%'),
                }
            },
            b'+' => bytes.push(b' '),
            _ => bytes.push(b),
        }
    }

    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

const fn hex_digit(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_url_decode() {
        assert_eq!(url_decode("hello%20world").unwrap(), "hello world");
        assert_eq!(url_decode("hello+world").unwrap(), "hello world");
        assert_eq!(url_decode("orders%2Fitems").unwrap(), "orders/items");
        assert_eq!(url_decode("%24top").unwrap(), "$top");
        assert_eq!(url_decode("caf%C3%A9").unwrap(), "café");
    }

    #[test]
    fn test_url_decode_keeps_bad_escapes() {
        assert_eq!(url_decode("100%").unwrap(), "100%");
        assert_eq!(url_decode("%zz").unwrap(), "%zz");
        assert_eq!(url_decode("%4").unwrap(), "%4");
    }

    #[test]
    fn test_url_decode_length_limit() {
        assert_eq!(url_decode(&"a".repeat(MAX_DECODED_LEN)).unwrap().len(), MAX_DECODED_LEN);
        assert_eq!(url_decode(&"a".repeat(MAX_DECODED_LEN + 1)), Err(TooLong));
    }

    #[test]
    fn test_overlong_value_rejected_not_truncated() {
        let query = format!("$sort=name,{},-age", "+".repeat(MAX_DECODED_LEN));
        let err = RawQuery::from_query_string(&query).unwrap_err();
        assert_eq!(err.code(), "SchemaValidationError");
        assert_eq!(err.param(), "$sort");

        let query = format!("{}=1", "k".repeat(MAX_DECODED_LEN + 1));
        assert_eq!(RawQuery::from_query_string(&query).unwrap_err().param(), "query");
    }

    #[test]
    fn test_repeated_keys_accumulate() {
        let raw = RawQuery::from_query_string("$expand=orders&$expand=customer&$top=5").unwrap();
        assert_eq!(
            raw.get("$expand").unwrap(),
            ["orders".to_string(), "customer".to_string()]
        );
        assert_eq!(raw.len(), 2);
    }

    #[test]
    fn test_pair_without_value() {
        let raw = RawQuery::from_query_string("$count&&$top=").unwrap();
        assert_eq!(raw.get("$count").unwrap(), [String::new()]);
        assert_eq!(raw.get("$top").unwrap(), [String::new()]);
    }

    #[test]
    fn test_from_json() {
        let raw = RawQuery::from_json(&json!({
            "$top": 5,
            "$count": true,
            "$expand": ["orders", "customer"],
            "$skip": null,
        }))
        .unwrap();

        assert_eq!(raw.get("$top").unwrap(), ["5".to_string()]);
        assert_eq!(raw.get("$count").unwrap(), ["true".to_string()]);
        assert_eq!(raw.get("$expand").unwrap().len(), 2);
        assert_eq!(raw.get("$skip"), None);
    }

    #[test]
    fn test_from_json_rejects_nested_objects() {
        let err = RawQuery::from_json(&json!({ "$filter": { "name": "x" } })).unwrap_err();
        assert_eq!(err.param(), "$filter");
        assert!(RawQuery::from_json(&json!([1, 2])).is_err());
    }

    #[test]
    fn test_from_iter() {
        let raw: RawQuery = [("$top", "5"), ("$sort", "-total")].into_iter().collect();
        assert_eq!(raw.get("$sort").unwrap(), ["-total".to_string()]);
    }
}
