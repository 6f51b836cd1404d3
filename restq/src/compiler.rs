//! Request compilation: raw parameters in, [`QueryPlan`] out.

use crate::config::{CompilerConfig, Limits};
use crate::error::{ConfigError, QueryError};
use crate::expand::ExpansionTree;
use crate::filter::{Predicate, compile_filter};
use crate::options::{SortSpec, validate};
use crate::plan::{QueryPlan, Shape};
use crate::raw::RawQuery;
use crate::registry::{Registry, ResourceDescriptor};
use crate::select::Projection;
use crate::trace::{trace_compile, trace_reject};
use restq_sql::Value;
use std::sync::Arc;

/// Compiles requests against a shared registry.
///
/// Cheap to clone and safe to share across threads. Compilation takes no
/// locks and keeps no state between requests.
///
/// ```
/// use restq::{Compiler, RawQuery, Registry, Relation, ResourceDescriptor};
///
/// let registry = Registry::builder()
///     .resource(ResourceDescriptor::new("customers")
///         .properties(["name"])
///         .relation("orders", Relation::has_many("orders", "id", "customer_id")))
///     .resource(ResourceDescriptor::new("orders").properties(["customer_id", "total"]))
///     .build()
///     .unwrap();
///
/// let compiler = Compiler::new(registry);
/// let raw = RawQuery::from_query_string("$top=5&$expand=orders&$select=name,orders/total").unwrap();
/// let plan = compiler.compile("customers", &raw).unwrap();
///
/// assert_eq!(plan.limit, Some(5));
/// assert_eq!(plan.root_columns, ["id", "name"]);
/// assert_eq!(plan.eager_expression().as_deref(), Some("[orders]"));
/// ```
#[derive(Debug, Clone)]
pub struct Compiler {
    registry: Arc<Registry>,
    config: CompilerConfig,
}

impl Compiler {
    /// Compiler with the default configuration.
    pub fn new(registry: impl Into<Arc<Registry>>) -> Self {
        Self {
            registry: registry.into(),
            config: CompilerConfig::default(),
        }
    }

    /// Replace the configuration, validating it first.
    pub fn with_config(mut self, config: CompilerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        self.config = config;
        Ok(self)
    }

    /// Replace only the limits, validating them first.
    pub fn with_limits(mut self, limits: Limits) -> Result<Self, ConfigError> {
        limits.validate()?;
        self.config.limits = limits;
        Ok(self)
    }

    /// The registry requests are checked against.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// The active configuration.
    pub const fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Compile a collection request.
    pub fn compile(&self, resource: &str, raw: &RawQuery) -> Result<QueryPlan, QueryError> {
        traced(resource, plan(&self.registry, &self.config, resource, raw, None))
    }

    /// Compile a single-row request.
    ///
    /// `id` is matched positionally against the resource's id columns and
    /// ANDed with any `$filter`. `$top`, `$skip` and `$sort` do not apply.
    pub fn compile_entity(
        &self,
        resource: &str,
        raw: &RawQuery,
        id: &[Value],
    ) -> Result<QueryPlan, QueryError> {
        traced(
            resource,
            plan(&self.registry, &self.config, resource, raw, Some(id)),
        )
    }
}

/// Compile a collection request with the default configuration.
pub fn compile(
    registry: &Registry,
    resource: &str,
    raw: &RawQuery,
) -> Result<QueryPlan, QueryError> {
    traced(
        resource,
        plan(registry, &CompilerConfig::default(), resource, raw, None),
    )
}

fn traced(
    resource: &str,
    result: Result<QueryPlan, QueryError>,
) -> Result<QueryPlan, QueryError> {
    match &result {
        Ok(plan) => {
            trace_compile!(resource, plan);
        },
        Err(err) => {
            trace_reject!(resource, err);
        },
    }
    result
}

fn plan(
    registry: &Registry,
    config: &CompilerConfig,
    resource: &str,
    raw: &RawQuery,
    id: Option<&[Value]>,
) -> Result<QueryPlan, QueryError> {
    let limits = &config.limits;
    let root = registry.get(resource).ok_or_else(|| QueryError::NotFound {
        param: "resource".to_string(),
        path: resource.to_string(),
    })?;

    let options = validate(raw, config.contract_for(resource), limits)?;

    let filter = options
        .filter
        .as_deref()
        .map(|src| compile_filter(src, root, limits))
        .transpose()?;

    if let Some(spec) = options
        .sort
        .iter()
        .find(|spec| !root.is_allowed_column(&spec.column))
    {
        return Err(QueryError::unknown_attribute(
            "$sort",
            &spec.column,
            root.name(),
        ));
    }

    let mut tree = ExpansionTree::build(registry, resource, &options.expand, limits)?;
    let projection = Projection::build(registry, root, &options.select, &mut tree, limits)?;
    let root_columns = projection.root_columns(root, &tree);

    let (shape, predicate, sort, offset, limit): (_, _, Vec<SortSpec>, _, _) = match id {
        None => (
            Shape::Collection,
            filter,
            options.sort,
            options.skip,
            options.top,
        ),
        Some(id) => {
            let id_match = id_predicate(root, id)?;
            let predicate = match filter {
                Some(filter) => id_match.and(filter),
                None => id_match,
            };
            (Shape::Entity, Some(predicate), Vec::new(), None, 1)
        },
    };

    Ok(QueryPlan {
        resource: root.name().to_string(),
        table: root.table_name().to_string(),
        shape,
        predicate,
        sort,
        offset,
        limit: Some(limit),
        root_columns,
        expansion: (!tree.is_empty()).then_some(tree),
        projection: (!projection.is_empty()).then_some(projection),
        want_count: options.count,
    })
}

fn id_predicate(root: &ResourceDescriptor, id: &[Value]) -> Result<Predicate, QueryError> {
    let key = root.primary_key();
    let rendered = || {
        id.iter()
            .map(|value| value.to_json().to_string())
            .collect::<Vec<_>>()
            .join(",")
    };

    if id.len() != key.len() {
        return Err(QueryError::schema(
            "id",
            rendered(),
            format!("expected {} id value(s)", key.len()),
        ));
    }
    if id.iter().any(|value| matches!(value, Value::Array(_))) {
        return Err(QueryError::schema(
            "id",
            rendered(),
            "id values must be scalars",
        ));
    }

    key.iter()
        .zip(id)
        .map(|(column, value)| Predicate::equals(column.as_str(), value.clone()))
        .reduce(Predicate::and)
        .ok_or_else(|| QueryError::schema("id", rendered(), "resource has no id columns"))
}
