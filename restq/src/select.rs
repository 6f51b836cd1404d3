//! `$select`: which attributes to return, per level.
//!
//! Entries without a separator are root columns. `orders/total` (or
//! `orders.total`) selects `total` on the `orders` expansion, which must be
//! present in `$expand`. Defaults (ids, foreign keys, join keys) are always
//! projected on top of the selection.

use crate::config::Limits;
use crate::error::{LimitKind, QueryError};
use crate::expand::ExpansionTree;
use crate::registry::{Registry, ResourceDescriptor};
use std::collections::BTreeMap;

const PARAM: &str = "$select";

/// Validated `$select`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Projection {
    /// Root columns, in request order.
    pub top_level: Vec<String>,
    /// Columns per expanded relation path, in request order.
    pub nested: BTreeMap<String, Vec<String>>,
}

impl Projection {
    /// Validate `entries` against the root resource and the expansion tree,
    /// recording nested selections on the matching tree nodes.
    pub fn build(
        registry: &Registry,
        root: &ResourceDescriptor,
        entries: &[String],
        tree: &mut ExpansionTree,
        limits: &Limits,
    ) -> Result<Self, QueryError> {
        let mut unique: Vec<String> = Vec::with_capacity(entries.len());
        for entry in entries {
            let normalized = entry
                .replace('.', "/")
                .split('/')
                .map(str::trim)
                .collect::<Vec<_>>()
                .join("/");
            if !unique.contains(&normalized) {
                unique.push(normalized);
            }
        }
        if unique.len() > limits.max_columns {
            return Err(QueryError::limit(
                PARAM,
                LimitKind::Columns,
                limits.max_columns,
                unique.len(),
            ));
        }

        let mut projection = Self::default();
        for entry in unique {
            let Some((relation, column)) = entry.rsplit_once('/') else {
                if !root.is_allowed_column(&entry) {
                    return Err(QueryError::unknown_attribute(PARAM, &entry, root.name()));
                }
                projection.top_level.push(entry);
                continue;
            };

            let Some(node) = tree.node_mut(relation) else {
                return Err(QueryError::UnexpandedRelation {
                    param: PARAM.to_string(),
                    value: entry.clone(),
                    relation: relation.to_string(),
                });
            };
            let allowed = registry
                .get(node.resource())
                .is_some_and(|target| target.is_allowed_column(column));
            if !allowed {
                return Err(QueryError::unknown_attribute(PARAM, column, node.resource()));
            }

            node.select(column);
            projection
                .nested
                .entry(relation.to_string())
                .or_default()
                .push(column.to_string());
        }
        Ok(projection)
    }

    /// Whether nothing was selected.
    pub fn is_empty(&self) -> bool {
        self.top_level.is_empty() && self.nested.is_empty()
    }

    /// Root columns to load: defaults and expansion join keys first, then the
    /// selection, or every allowed column when no root column was selected.
    pub fn root_columns(&self, root: &ResourceDescriptor, tree: &ExpansionTree) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        let mut push = |column: &str| {
            if !out.iter().any(|c| c == column) {
                out.push(column.to_string());
            }
        };

        root.default_columns().into_iter().for_each(&mut push);
        tree.root_join_columns().into_iter().for_each(&mut push);
        if self.top_level.is_empty() {
            root.allowed_columns().into_iter().for_each(&mut push);
        } else {
            self.top_level.iter().map(String::as_str).for_each(&mut push);
        }
        out
    }
}
