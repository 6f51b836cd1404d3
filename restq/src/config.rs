//! Compiler configuration: request limits and the options contract.
//!
//! Everything has a default, so an empty document is a valid configuration:
//!
//! ```toml
//! [limits]
//! max_top = 50
//! max_recursion_depth = 2
//!
//! [contract]
//! pass_through = ["access_token"]
//!
//! [resources.orders]
//! disabled = ["$expand"]
//! sortable = ["created_at", "total"]
//! ```

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Bounds applied to every request.
///
/// Limits are passed down through each builder call; nothing here is global.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Limits {
    /// `$top` when the request omits it.
    pub default_top: u32,
    /// Largest accepted `$top`.
    pub max_top: u32,
    /// Most segments in one `$expand` path.
    pub max_recursion_depth: usize,
    /// Most `$expand` paths in one request.
    pub max_relations: usize,
    /// Most `$select` entries in one request.
    pub max_columns: usize,
    /// Deepest parenthesis / `not` nesting in `$filter`.
    pub max_filter_depth: usize,
    /// Longest `$filter`, in bytes.
    pub max_filter_length: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            default_top: 10,
            max_top: 100,
            max_recursion_depth: 3,
            max_relations: 10,
            max_columns: 100,
            max_filter_depth: 16,
            max_filter_length: 2048,
        }
    }
}

impl Limits {
    /// Set the default `$top`.
    #[must_use]
    pub const fn default_top(mut self, top: u32) -> Self {
        self.default_top = top;
        self
    }

    /// Set the maximum `$top`.
    #[must_use]
    pub const fn max_top(mut self, top: u32) -> Self {
        self.max_top = top;
        self
    }

    /// Set the maximum `$expand` path depth.
    #[must_use]
    pub const fn max_recursion_depth(mut self, depth: usize) -> Self {
        self.max_recursion_depth = depth;
        self
    }

    /// Set the maximum number of `$expand` paths.
    #[must_use]
    pub const fn max_relations(mut self, count: usize) -> Self {
        self.max_relations = count;
        self
    }

    /// Set the maximum number of `$select` entries.
    #[must_use]
    pub const fn max_columns(mut self, count: usize) -> Self {
        self.max_columns = count;
        self
    }

    /// Set the maximum `$filter` nesting depth.
    #[must_use]
    pub const fn max_filter_depth(mut self, depth: usize) -> Self {
        self.max_filter_depth = depth;
        self
    }

    /// Set the maximum `$filter` length in bytes.
    #[must_use]
    pub const fn max_filter_length(mut self, len: usize) -> Self {
        self.max_filter_length = len;
        self
    }

    /// Check the limits are usable together.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_top == 0 {
            return Err(ConfigError::InvalidLimit {
                name: "max_top",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.default_top == 0 || self.default_top > self.max_top {
            return Err(ConfigError::InvalidLimit {
                name: "default_top",
                reason: format!("must be between 1 and max_top ({})", self.max_top),
            });
        }
        if self.max_filter_depth == 0 {
            return Err(ConfigError::InvalidLimit {
                name: "max_filter_depth",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// A recognized top-level query parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum Param {
    /// `$filter`
    #[serde(rename = "$filter")]
    Filter,
    /// `$sort`
    #[serde(rename = "$sort")]
    Sort,
    /// `$skip`
    #[serde(rename = "$skip")]
    Skip,
    /// `$top`
    #[serde(rename = "$top")]
    Top,
    /// `$expand`
    #[serde(rename = "$expand")]
    Expand,
    /// `$select`
    #[serde(rename = "$select")]
    Select,
    /// `$count`
    #[serde(rename = "$count")]
    Count,
}

impl Param {
    /// Every parameter, in documentation order.
    pub const ALL: [Self; 7] = [
        Self::Filter,
        Self::Sort,
        Self::Skip,
        Self::Top,
        Self::Expand,
        Self::Select,
        Self::Count,
    ];

    /// The query-string key.
    pub const fn key(self) -> &'static str {
        match self {
            Self::Filter => "$filter",
            Self::Sort => "$sort",
            Self::Skip => "$skip",
            Self::Top => "$top",
            Self::Expand => "$expand",
            Self::Select => "$select",
            Self::Count => "$count",
        }
    }

    /// Look up a parameter by its query-string key.
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.key() == key)
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// What a request's top-level option object may contain.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OptionsContract {
    /// Accept and ignore unknown keys instead of rejecting them.
    pub open: bool,
    /// Keys accepted and ignored even when the contract is closed.
    pub pass_through: BTreeSet<String>,
    /// Parameters rejected for this resource.
    pub disabled: BTreeSet<Param>,
    /// When set, the only columns `$sort` may name.
    pub sortable: Option<BTreeSet<String>>,
}

impl OptionsContract {
    /// The default closed contract.
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept unknown keys.
    #[must_use]
    pub const fn open(mut self) -> Self {
        self.open = true;
        self
    }

    /// Accept and ignore these keys.
    #[must_use]
    pub fn pass_through<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.pass_through.extend(keys.into_iter().map(Into::into));
        self
    }

    /// Reject a parameter.
    #[must_use]
    pub fn disable(mut self, param: Param) -> Self {
        self.disabled.insert(param);
        self
    }

    /// Restrict `$sort` to these columns.
    #[must_use]
    pub fn sortable<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sortable = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    /// Whether `param` is enabled.
    pub fn allows(&self, param: Param) -> bool {
        !self.disabled.contains(&param)
    }

    /// Check the contract is consistent.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(key) = self
            .pass_through
            .iter()
            .find(|key| Param::from_key(key).is_some())
        {
            return Err(ConfigError::InvalidContract(format!(
                "pass-through key '{key}' shadows a query parameter"
            )));
        }
        if let Some(key) = self.pass_through.iter().find(|key| key.is_empty()) {
            return Err(ConfigError::InvalidContract(format!(
                "pass-through key {key:?} is empty"
            )));
        }
        Ok(())
    }
}

/// Limits plus the default contract and per-resource overrides.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompilerConfig {
    /// Request limits.
    pub limits: Limits,
    /// Contract for resources without an override.
    pub contract: OptionsContract,
    /// Per-resource contracts, keyed by resource name.
    pub resources: BTreeMap<String, OptionsContract>,
}

impl CompilerConfig {
    /// Parse and validate a TOML document.
    ///
    /// ```
    /// use restq::CompilerConfig;
    ///
    /// let config = CompilerConfig::from_toml_str("[limits]\nmax_top = 50\n").unwrap();
    /// assert_eq!(config.limits.max_top, 50);
    /// assert_eq!(config.limits.default_top, 10);
    /// ```
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Check limits and every contract.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.limits.validate()?;
        self.contract.validate()?;
        for contract in self.resources.values() {
            contract.validate()?;
        }
        Ok(())
    }

    /// The contract that applies to `resource`.
    pub fn contract_for(&self, resource: &str) -> &OptionsContract {
        self.resources.get(resource).unwrap_or(&self.contract)
    }
}
