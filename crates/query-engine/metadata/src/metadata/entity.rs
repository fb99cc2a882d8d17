//! Entity types and their properties.

use super::edm::EdmType;
use super::naming;
use serde::Serialize;

/// A single property of an entity type, backed by a column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityProperty {
    /// PascalCase property name.
    pub name: String,
    /// Name of the column (or custom query output) the property reads.
    pub column_name: String,
    pub edm_type: EdmType,
    pub nullable: bool,
    pub max_length: Option<u32>,
    pub ordinal: u32,
}

/// Where the rows of an entity type come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum EntitySource {
    /// A database table.
    Table { schema: String, table: String },
    /// A hand-written SELECT from a custom entity declaration.
    Query {
        sql: String,
        /// Present when the select list calls an aggregate function.
        aggregate: Option<AggregateProjection>,
    },
}

/// The non-aggregate part of an aggregate custom query, which is what `groupby`
/// must name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregateProjection {
    /// Output names of the non-aggregate fields, in select list order.
    pub group_names: Vec<String>,
    /// The expressions of the same fields, used to build `GROUP BY`.
    pub group_expressions: Vec<String>,
}

/// One entity type: a table or a custom entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityType {
    pub name: String,
    pub entity_set_name: String,
    pub source: EntitySource,
    /// Ordered by ordinal.
    pub properties: Vec<EntityProperty>,
    /// Names of the key properties, in key order.
    pub keys: Vec<String>,
    /// The single key column aliases SQLite's row id, so inserts may leave it out.
    pub row_id_key: bool,
}

impl EntityType {
    /// Build an entity type, sorting the properties by ordinal and deriving the entity
    /// set name.
    pub fn new(
        name: String,
        source: EntitySource,
        mut properties: Vec<EntityProperty>,
        keys: Vec<String>,
    ) -> EntityType {
        properties.sort_by_key(|property| property.ordinal);
        EntityType {
            entity_set_name: naming::pluralize(&name),
            name,
            source,
            properties,
            keys,
            row_id_key: false,
        }
    }

    /// Mark the single key column as an alias of the row id.
    pub fn with_row_id_key(mut self, row_id_key: bool) -> EntityType {
        self.row_id_key = row_id_key && self.keys.len() == 1;
        self
    }

    pub fn property(&self, name: &str) -> Option<&EntityProperty> {
        self.properties.iter().find(|property| property.name == name)
    }

    pub fn key_properties(&self) -> impl Iterator<Item = &EntityProperty> {
        self.keys.iter().filter_map(|key| self.property(key))
    }

    pub fn is_key(&self, name: &str) -> bool {
        self.keys.iter().any(|key| key == name)
    }

    /// Custom entities are read-only.
    pub fn is_writable(&self) -> bool {
        matches!(self.source, EntitySource::Table { .. })
    }

    pub fn aggregate(&self) -> Option<&AggregateProjection> {
        match &self.source {
            EntitySource::Query { aggregate, .. } => aggregate.as_ref(),
            EntitySource::Table { .. } => None,
        }
    }

    /// `JdbcModel.TableName1`
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", super::NAMESPACE, self.name)
    }
}
