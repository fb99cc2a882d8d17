//! Metadata information regarding the database and the entity model built from it.

pub mod custom_entities;
pub mod edm;
pub mod entity;
pub mod naming;

// re-export without modules
pub use custom_entities::*;
pub use edm::*;
pub use entity::*;

use serde::Serialize;

/// Namespace of the structural schema.
pub const NAMESPACE: &str = "JdbcModel";
/// Namespace of the schema holding the entity container.
pub const CONTAINER_NAMESPACE: &str = "JdbcEntities.Public";
/// Name of the single entity container.
pub const CONTAINER_NAME: &str = "Public";

/// The full schema of one database connection. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct EntityModel {
    /// Tables first, then custom entities, each in declaration order.
    pub entity_types: Vec<EntityType>,
}

impl EntityModel {
    pub fn empty() -> Self {
        EntityModel {
            entity_types: vec![],
        }
    }

    /// Build a model from the introspected tables and the custom entities. A custom
    /// entity replaces a table with the same entity name.
    pub fn new(tables: Vec<EntityType>, custom: Vec<EntityType>) -> Self {
        let mut entity_types: Vec<EntityType> = tables
            .into_iter()
            .filter(|table| {
                let replaced = custom.iter().any(|c| c.name == table.name);
                if replaced {
                    tracing::warn!(
                        entity = table.name,
                        "custom entity replaces the introspected table of the same name"
                    );
                }
                !replaced
            })
            .collect();
        entity_types.extend(custom);
        EntityModel { entity_types }
    }

    /// Look up an entity type by its entity set name.
    pub fn entity_set(&self, entity_set_name: &str) -> Option<&EntityType> {
        self.entity_types
            .iter()
            .find(|entity_type| entity_type.entity_set_name == entity_set_name)
    }

    pub fn entity_set_names(&self) -> impl Iterator<Item = &str> {
        self.entity_types
            .iter()
            .map(|entity_type| entity_type.entity_set_name.as_str())
    }
}
