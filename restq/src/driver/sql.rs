//! Running plans over a SQL executor.

use crate::error::DriverError;
use crate::expand::ExpansionNode;
use crate::plan::{QueryPlan, Shape};
use crate::trace::trace_query;
use restq_sql::{Dialect, Operator, QueryBuilder, QueryResult, SortDir, Value};
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};
use std::collections::{BTreeMap, BTreeSet};

/// One result row, keyed by column name.
pub type Row = Map<String, JsonValue>;

/// Runs parameterized SQL.
///
/// Errors reach the caller of [`SqlDriver::apply`] untouched, inside
/// [`DriverError::Executor`].
pub trait Executor {
    /// Executor failure.
    type Error;

    /// Run `sql` with `params` bound in order and return every row.
    fn query(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Row>, Self::Error>;
}

impl<E: Executor + ?Sized> Executor for &mut E {
    type Error = E::Error;

    fn query(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Row>, Self::Error> {
        (**self).query(sql, params)
    }
}

/// Shaped result of a plan.
///
/// Serializes as `{"value": [...], "count": n}` for collections and as the
/// bare row (or `null`) for entities.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Envelope {
    /// A page of rows.
    Collection {
        /// Rows with expansions attached.
        value: Vec<Row>,
        /// Total matching rows, when `$count` was requested.
        #[serde(skip_serializing_if = "Option::is_none")]
        count: Option<u64>,
    },
    /// A single row with `count` merged in, or `null`.
    Entity(JsonValue),
}

impl Envelope {
    fn entity(row: Option<Row>, count: Option<u64>) -> Self {
        let Some(mut row) = row else {
            return Self::Entity(JsonValue::Null);
        };
        if let Some(count) = count {
            row.insert("count".to_string(), JsonValue::from(count));
        }
        Self::Entity(JsonValue::Object(row))
    }

    /// The rows of a collection, or the row of an entity.
    pub fn rows(&self) -> Vec<&Row> {
        match self {
            Self::Collection { value, .. } => value.iter().collect(),
            Self::Entity(JsonValue::Object(row)) => vec![row],
            Self::Entity(_) => Vec::new(),
        }
    }

    /// Convert into a JSON document.
    pub fn into_json(self) -> JsonValue {
        match self {
            Self::Collection { value, count } => {
                let mut out = Map::new();
                out.insert(
                    "value".to_string(),
                    JsonValue::Array(value.into_iter().map(JsonValue::Object).collect()),
                );
                if let Some(count) = count {
                    out.insert("count".to_string(), JsonValue::from(count));
                }
                JsonValue::Object(out)
            },
            Self::Entity(value) => value,
        }
    }
}

/// Executes plans: the root query, one `IN` query per expanded relation,
/// and the count query when asked for.
#[derive(Debug)]
pub struct SqlDriver<E> {
    executor: E,
}

impl<E: Executor> SqlDriver<E> {
    /// Driver over `executor`.
    pub const fn new(executor: E) -> Self {
        Self { executor }
    }

    /// The wrapped executor.
    pub fn into_inner(self) -> E {
        self.executor
    }

    /// Run `plan` starting from `builder`.
    ///
    /// `builder` selects from the plan's root table and may already carry
    /// trusted conditions, such as tenant scoping. They are ANDed with the
    /// plan's predicate and also restrict the count.
    pub fn apply<D: Dialect>(
        &mut self,
        plan: &QueryPlan,
        builder: QueryBuilder<D>,
    ) -> Result<Envelope, DriverError<E::Error>> {
        let dialect = builder.dialect();
        let builder = plan.apply_to(builder);

        let mut rows = self.run::<D>(&builder.build())?;
        if let Some(tree) = &plan.expansion {
            for node in tree.children().values() {
                self.load(dialect, &mut rows, node)?;
            }
        }

        let count = if plan.want_count {
            Some(self.count(&builder)?)
        } else {
            None
        };

        Ok(match plan.shape {
            Shape::Collection => Envelope::Collection { value: rows, count },
            Shape::Entity => Envelope::entity(rows.into_iter().next(), count),
        })
    }

    fn run<D: Dialect>(
        &mut self,
        query: &QueryResult,
    ) -> Result<Vec<Row>, DriverError<E::Error>> {
        trace_query!(D::NAME, query.sql, query.params.len());
        self.executor
            .query(&query.sql, &query.params)
            .map_err(DriverError::Executor)
    }

    fn count<D: Dialect>(
        &mut self,
        builder: &QueryBuilder<D>,
    ) -> Result<u64, DriverError<E::Error>> {
        let rows = self.run::<D>(&builder.build_count())?;
        let found = rows.first().and_then(|row| row.get("count"));
        found.and_then(count_value).ok_or_else(|| DriverError::InvalidCount {
            found: found.map_or_else(|| "no count column".to_string(), JsonValue::to_string),
        })
    }

    /// Load `node` for every parent row and attach it under the relation name.
    fn load<D: Dialect>(
        &mut self,
        dialect: D,
        parents: &mut [Row],
        node: &ExpansionNode,
    ) -> Result<(), DriverError<E::Error>> {
        let relation = node.relation();
        let keys = owner_keys(parents, relation.owner_column());

        let mut rows = if keys.is_empty() {
            Vec::new()
        } else {
            let mut builder = QueryBuilder::new(dialect, node.table())
                .fields(node.columns())
                .filter(relation.related_column(), Operator::In, Value::Array(keys));
            for column in node.primary_key() {
                builder = builder.sort(column.as_str(), SortDir::Asc);
            }
            self.run::<D>(&builder.build())?
        };

        for child in node.children().values() {
            self.load(dialect, &mut rows, child)?;
        }

        let mut grouped: BTreeMap<String, Vec<Row>> = BTreeMap::new();
        for row in rows {
            if let Some(key) = row.get(relation.related_column()).and_then(join_key) {
                grouped.entry(key).or_default().push(row);
            }
        }

        for parent in parents.iter_mut() {
            let matched = parent
                .get(relation.owner_column())
                .and_then(join_key)
                .and_then(|key| grouped.get(&key));
            let attached = if relation.kind().is_many() {
                JsonValue::Array(
                    matched
                        .map(|rows| rows.iter().cloned().map(JsonValue::Object).collect())
                        .unwrap_or_default(),
                )
            } else {
                matched
                    .and_then(|rows| rows.first())
                    .map_or(JsonValue::Null, |row| JsonValue::Object(row.clone()))
            };
            parent.insert(node.name().to_string(), attached);
        }
        Ok(())
    }
}

/// Distinct non-null values of `column` across `rows`, in first-seen order.
fn owner_keys(rows: &[Row], column: &str) -> Vec<Value> {
    let mut seen = BTreeSet::new();
    let mut keys = Vec::new();
    for value in rows.iter().filter_map(|row| row.get(column)) {
        if let Some(key) = join_key(value)
            && seen.insert(key)
            && let Some(value) = Value::from_json(value)
        {
            keys.push(value);
        }
    }
    keys
}

/// A total from the count column. Some drivers return bigints as text.
fn count_value(value: &JsonValue) -> Option<u64> {
    match value {
        JsonValue::Number(n) => n.as_u64(),
        JsonValue::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Text key for matching join values. Nulls never match.
fn join_key(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::Null | JsonValue::Array(_) | JsonValue::Object(_) => None,
        other => Some(other.to_string()),
    }
}
