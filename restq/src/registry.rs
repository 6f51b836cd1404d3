//! Whitelist registry: which columns and relations each resource exposes.
//!
//! Resources refer to each other by name, so relations may be
//! self-referential or cyclic. Request-time depth limits bound the walk.

use crate::error::{QueryError, RegistryError};
use restq_sql::check_sql_identifier;
use std::collections::{BTreeMap, BTreeSet};

/// Cardinality of a relation, seen from the resource declaring it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationKind {
    /// This resource holds a foreign key to one target row.
    BelongsTo,
    /// One target row holds a foreign key to this resource.
    HasOne,
    /// Many target rows hold a foreign key to this resource.
    HasMany,
}

impl RelationKind {
    /// Whether the relation yields an array.
    pub const fn is_many(self) -> bool {
        matches!(self, Self::HasMany)
    }
}

/// A named link from one resource to another.
///
/// Rows join on `owner.owner_column = target.related_column`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    kind: RelationKind,
    target: String,
    owner_column: String,
    related_column: String,
}

impl Relation {
    /// This resource's `foreign_key` points at `target.target_key`.
    pub fn belongs_to(
        target: impl Into<String>,
        foreign_key: impl Into<String>,
        target_key: impl Into<String>,
    ) -> Self {
        Self {
            kind: RelationKind::BelongsTo,
            target: target.into(),
            owner_column: foreign_key.into(),
            related_column: target_key.into(),
        }
    }

    /// `target.foreign_key` points at this resource's `key`; at most one row.
    pub fn has_one(
        target: impl Into<String>,
        key: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self {
            kind: RelationKind::HasOne,
            target: target.into(),
            owner_column: key.into(),
            related_column: foreign_key.into(),
        }
    }

    /// `target.foreign_key` points at this resource's `key`.
    pub fn has_many(
        target: impl Into<String>,
        key: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self {
            kind: RelationKind::HasMany,
            target: target.into(),
            owner_column: key.into(),
            related_column: foreign_key.into(),
        }
    }

    /// Cardinality.
    pub const fn kind(&self) -> RelationKind {
        self.kind
    }

    /// Name of the target resource.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Join column on the declaring resource.
    pub fn owner_column(&self) -> &str {
        &self.owner_column
    }

    /// Join column on the target resource.
    pub fn related_column(&self) -> &str {
        &self.related_column
    }
}

/// Describes one resource: its table, columns, keys and relations.
///
/// ```
/// use restq::{Relation, ResourceDescriptor};
///
/// let orders = ResourceDescriptor::new("orders")
///     .properties(["total", "status", "secret_note"])
///     .relation("customer", Relation::belongs_to("customers", "customer_id", "id"))
///     .allow_columns(["id", "total", "status", "customer_id"]);
///
/// assert_eq!(orders.default_columns(), ["id", "customer_id"]);
/// assert!(orders.is_allowed_column("total"));
/// assert!(!orders.is_allowed_column("secret_note"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDescriptor {
    name: String,
    table: String,
    properties: Vec<String>,
    id_columns: Vec<String>,
    relations: BTreeMap<String, Relation>,
    allowed_columns: Option<BTreeSet<String>>,
    allowed_relations: Option<BTreeSet<String>>,
}

impl ResourceDescriptor {
    /// A resource backed by a table of the same name, keyed by `id`.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            table: name.clone(),
            name,
            properties: Vec::new(),
            id_columns: vec!["id".to_string()],
            relations: BTreeMap::new(),
            allowed_columns: None,
            allowed_relations: None,
        }
    }

    /// Set the backing table.
    #[must_use]
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    /// Set the declared properties, in order.
    #[must_use]
    pub fn properties<I, S>(mut self, properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.properties = properties.into_iter().map(Into::into).collect();
        self
    }

    /// Set the id columns, in order.
    #[must_use]
    pub fn id_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.id_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Declare a relation.
    #[must_use]
    pub fn relation(mut self, name: impl Into<String>, relation: Relation) -> Self {
        self.relations.insert(name.into(), relation);
        self
    }

    /// Restrict queryable columns to this set.
    #[must_use]
    pub fn allow_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    /// Restrict expandable relations to this set.
    #[must_use]
    pub fn allow_relations<I, S>(mut self, relations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_relations = Some(relations.into_iter().map(Into::into).collect());
        self
    }

    /// Resource name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Backing table name.
    pub fn table_name(&self) -> &str {
        &self.table
    }

    /// Id columns, in order.
    pub fn primary_key(&self) -> &[String] {
        &self.id_columns
    }

    /// Every declared relation, allowed or not.
    pub fn relations(&self) -> impl Iterator<Item = (&str, &Relation)> {
        self.relations.iter().map(|(name, rel)| (name.as_str(), rel))
    }

    /// Every column: properties, then id columns, then belongs-to foreign
    /// keys, without duplicates.
    pub fn columns(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        let belongs_to = self
            .relations
            .values()
            .filter(|rel| rel.kind == RelationKind::BelongsTo)
            .map(|rel| rel.owner_column.as_str());
        for column in self
            .properties
            .iter()
            .map(String::as_str)
            .chain(self.id_columns.iter().map(String::as_str))
            .chain(belongs_to)
        {
            if !out.contains(&column) {
                out.push(column);
            }
        }
        out
    }

    /// Whether `column` is declared at all.
    pub fn has_column(&self, column: &str) -> bool {
        self.properties.iter().any(|c| c == column)
            || self.id_columns.iter().any(|c| c == column)
            || self
                .relations
                .values()
                .any(|rel| rel.kind == RelationKind::BelongsTo && rel.owner_column == column)
    }

    /// Whether `column` may appear in a request.
    ///
    /// Without an explicit whitelist every declared column is allowed.
    pub fn is_allowed_column(&self, column: &str) -> bool {
        match &self.allowed_columns {
            Some(allowed) => allowed.contains(column),
            None => self.has_column(column),
        }
    }

    /// Allowed columns, in [`columns`](Self::columns) order.
    pub fn allowed_columns(&self) -> Vec<&str> {
        self.columns()
            .into_iter()
            .filter(|column| self.is_allowed_column(column))
            .collect()
    }

    /// Columns that are always projected: id columns, then belongs-to
    /// foreign keys.
    pub fn default_columns(&self) -> Vec<&str> {
        let mut out: Vec<&str> = self.id_columns.iter().map(String::as_str).collect();
        for rel in self.relations.values() {
            if rel.kind == RelationKind::BelongsTo && !out.contains(&rel.owner_column.as_str()) {
                out.push(&rel.owner_column);
            }
        }
        out
    }

    /// An allowed relation by name.
    ///
    /// Without an explicit whitelist every declared relation is allowed.
    pub fn allowed_relation(&self, name: &str) -> Option<&Relation> {
        let allowed = self
            .allowed_relations
            .as_ref()
            .is_none_or(|set| set.contains(name));
        if allowed {
            self.relations.get(name)
        } else {
            None
        }
    }

    fn check(&self, names: &BTreeSet<&str>) -> Result<(), RegistryError> {
        let ident = |name: &str| {
            check_sql_identifier(name).map_err(|source| RegistryError::InvalidIdentifier {
                resource: self.name.clone(),
                name: name.to_string(),
                source,
            })
        };

        if self.id_columns.is_empty() {
            return Err(RegistryError::MissingIdColumns(self.name.clone()));
        }
        ident(&self.table)?;
        for column in self.columns() {
            ident(column)?;
        }

        if let Some(allowed) = &self.allowed_columns
            && let Some(column) = allowed.iter().find(|c| !self.has_column(c))
        {
            return Err(RegistryError::UnknownColumn {
                resource: self.name.clone(),
                column: column.clone(),
            });
        }
        if let Some(allowed) = &self.allowed_relations
            && let Some(relation) = allowed.iter().find(|r| !self.relations.contains_key(*r))
        {
            return Err(RegistryError::UnknownRelation {
                resource: self.name.clone(),
                relation: relation.clone(),
            });
        }

        for (name, rel) in &self.relations {
            if !names.contains(rel.target.as_str()) {
                return Err(RegistryError::UnknownTarget {
                    resource: self.name.clone(),
                    relation: name.clone(),
                    target: rel.target.clone(),
                });
            }
            if !self.has_column(&rel.owner_column) {
                return Err(RegistryError::UnknownJoinColumn {
                    resource: self.name.clone(),
                    relation: name.clone(),
                    column: rel.owner_column.clone(),
                });
            }
        }
        Ok(())
    }
}

/// Collects resources and validates them as a whole.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    resources: Vec<ResourceDescriptor>,
}

impl RegistryBuilder {
    /// Add a resource.
    #[must_use]
    pub fn resource(mut self, resource: ResourceDescriptor) -> Self {
        self.resources.push(resource);
        self
    }

    /// Validate and freeze the registry.
    ///
    /// Fails when a name is duplicated or is not a plain SQL identifier, a
    /// whitelist names something undeclared, or a relation points at a
    /// missing resource or join column.
    pub fn build(self) -> Result<Registry, RegistryError> {
        let mut resources = BTreeMap::new();
        for resource in self.resources {
            if resources.contains_key(&resource.name) {
                return Err(RegistryError::DuplicateResource(resource.name));
            }
            resources.insert(resource.name.clone(), resource);
        }

        let names: BTreeSet<&str> = resources.keys().map(String::as_str).collect();
        for resource in resources.values() {
            resource.check(&names)?;
        }

        for resource in resources.values() {
            for (name, rel) in &resource.relations {
                let Some(target) = resources.get(&rel.target) else {
                    continue;
                };
                if !target.has_column(&rel.related_column) {
                    return Err(RegistryError::UnknownJoinColumn {
                        resource: resource.name.clone(),
                        relation: name.clone(),
                        column: format!("{}.{}", rel.target, rel.related_column),
                    });
                }
            }
        }

        Ok(Registry { resources })
    }
}

/// The full set of resources, validated. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registry {
    resources: BTreeMap<String, ResourceDescriptor>,
}

impl Registry {
    /// Start building a registry.
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// A resource by name.
    pub fn get(&self, name: &str) -> Option<&ResourceDescriptor> {
        self.resources.get(name)
    }

    /// Every resource, by name.
    pub fn resources(&self) -> impl Iterator<Item = &ResourceDescriptor> {
        self.resources.values()
    }

    /// Walk `path` from `root` through allowed relations.
    ///
    /// A failure is `NotFound` on `param`, carrying the full path.
    ///
    /// ```
    /// use restq::{Registry, Relation, ResourceDescriptor};
    ///
    /// let registry = Registry::builder()
    ///     .resource(ResourceDescriptor::new("users")
    ///         .relation("posts", Relation::has_many("posts", "id", "user_id")))
    ///     .resource(ResourceDescriptor::new("posts").properties(["user_id"]))
    ///     .build()
    ///     .unwrap();
    ///
    /// assert_eq!(registry.resolve("$expand", "users", &["posts"]).unwrap().name(), "posts");
    /// assert_eq!(
    ///     registry.resolve("$select", "users", &["comments"]).unwrap_err().param(),
    ///     "$select"
    /// );
    /// ```
    pub fn resolve<S: AsRef<str>>(
        &self,
        param: &str,
        root: &str,
        path: &[S],
    ) -> Result<&ResourceDescriptor, QueryError> {
        let not_found = || QueryError::NotFound {
            param: param.to_string(),
            path: std::iter::once(root)
                .chain(path.iter().map(AsRef::as_ref))
                .collect::<Vec<_>>()
                .join("/"),
        };

        let mut current = self.get(root).ok_or_else(not_found)?;
        for segment in path {
            let rel = current
                .allowed_relation(segment.as_ref())
                .ok_or_else(not_found)?;
            current = self.get(&rel.target).ok_or_else(not_found)?;
        }
        Ok(current)
    }
}
