//! Translate entity writes (create, update, merge and delete) to single statements.

use indexmap::IndexMap;

use crate::translation::error::Error;
use crate::translation::key::EntityKey;
use crate::translation::query::lookup_entity_set;
use crate::translation::values;
use query_engine_metadata::metadata::{EntityModel, EntityProperty, EntitySource, EntityType};
use query_engine_sql::sql;

/// Property values decoded from a request body, in document order.
pub type Payload = IndexMap<String, serde_json::Value>;

/// The value of a key property when creating an entity.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyValue {
    Explicit(serde_json::Value),
    /// Let the store pick: the next integer for integer keys, a new UUID for string keys.
    AutoGenerate,
}

impl KeyValue {
    /// An absent or null key, an empty string, or a negative integer asks for a
    /// generated key.
    pub fn from_payload(property: &EntityProperty, value: Option<&serde_json::Value>) -> KeyValue {
        use serde_json::Value;
        match value {
            None | Some(Value::Null) => KeyValue::AutoGenerate,
            Some(Value::String(s)) if s.is_empty() => KeyValue::AutoGenerate,
            Some(Value::Number(n)) if n.as_i64().is_some_and(|i| i < 0) => KeyValue::AutoGenerate,
            Some(Value::String(s))
                if property.edm_type.is_integer()
                    && s.trim().parse::<i64>().is_ok_and(|i| i < 0) =>
            {
                KeyValue::AutoGenerate
            }
            Some(value) => KeyValue::Explicit(value.clone()),
        }
    }
}

/// How to find the created row once the insert has run.
#[derive(Debug, Clone, PartialEq)]
pub enum CreatedKey {
    /// Every key value was known before the insert.
    Known(EntityKey),
    /// The single integer key property takes the row id of the insert.
    RowId { property: String },
    /// The single integer key column is an ordinary column. `next_key` computes its
    /// value, which [`InsertPlan::with_next_key`] adds to the insert at `position`.
    Next {
        property: String,
        column: String,
        position: usize,
        next_key: sql::ast::Select,
    },
}

/// An insert statement and the key of the row it creates.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertPlan {
    pub plan: sql::execution_plan::ExecutionPlan<sql::execution_plan::Mutation>,
    pub created_key: CreatedKey,
}

impl InsertPlan {
    /// Add the key computed by `CreatedKey::Next` to the insert, which makes the created
    /// key known. Other plans are returned unchanged.
    pub fn with_next_key(mut self, next_key: i64) -> InsertPlan {
        let (property, column, position) = match &self.created_key {
            CreatedKey::Next {
                property,
                column,
                position,
                ..
            } => (property.clone(), column.clone(), *position),
            CreatedKey::Known(_) | CreatedKey::RowId { .. } => return self,
        };
        let value = serde_json::Value::from(next_key);
        if let sql::execution_plan::Mutation::Insert(insert) = &mut self.plan.query {
            let position = position.min(insert.columns.len());
            insert.columns.insert(position, sql::ast::ColumnName(column));
            insert
                .values
                .insert(position, values::to_sql_value(value.clone()));
        }
        self.created_key = CreatedKey::Known(EntityKey(vec![(property, value)]));
        self
    }
}

/// Translate the creation of an entity.
pub fn translate_insert(
    model: &EntityModel,
    entity_set: &str,
    payload: &Payload,
) -> Result<InsertPlan, Error> {
    let entity_type = writable_entity_set(model, entity_set)?;
    let (schema, table) = table_of(entity_type)?;
    check_properties(entity_type, payload)?;

    let mut columns = vec![];
    let mut row_values = vec![];
    let mut known_key = vec![];
    let mut generated = None;

    for property in &entity_type.properties {
        let supplied = payload.get(&property.name);
        let value = if entity_type.is_key(&property.name) {
            match KeyValue::from_payload(property, supplied) {
                KeyValue::Explicit(value) => values::coerce(property, &value)?,
                KeyValue::AutoGenerate if property.edm_type.is_string() => {
                    serde_json::Value::String(uuid::Uuid::new_v4().to_string())
                }
                KeyValue::AutoGenerate
                    if property.edm_type.is_integer() && entity_type.keys.len() == 1 =>
                {
                    generated = Some((property, columns.len()));
                    continue;
                }
                KeyValue::AutoGenerate => return Err(Error::MissingKey(property.name.clone())),
            }
        } else {
            match supplied {
                None => continue,
                Some(value) => values::coerce(property, value)?,
            }
        };

        if entity_type.is_key(&property.name) {
            known_key.push((property.name.clone(), value.clone()));
        }
        columns.push(sql::ast::ColumnName(property.column_name.clone()));
        row_values.push(values::to_sql_value(value));
    }

    let created_key = match generated {
        Some((property, _)) if entity_type.row_id_key => CreatedKey::RowId {
            property: property.name.clone(),
        },
        Some((property, position)) => CreatedKey::Next {
            property: property.name.clone(),
            column: property.column_name.clone(),
            position,
            next_key: sql::helpers::next_key_select(
                schema,
                table,
                sql::ast::ColumnName(property.column_name.clone()),
            ),
        },
        None => CreatedKey::Known(EntityKey(
            entity_type
                .keys
                .iter()
                .filter_map(|key| known_key.iter().find(|(name, _)| name == key).cloned())
                .collect(),
        )),
    };

    let insert = sql::ast::Insert {
        schema: sql::ast::SchemaName(schema.to_string()),
        table: sql::ast::TableName(table.to_string()),
        columns,
        values: row_values,
    };
    tracing::info!(entity_set, "SQL AST: {:?}", insert);

    Ok(InsertPlan {
        plan: sql::execution_plan::mutation_execution_plan(
            entity_set.to_string(),
            sql::execution_plan::Mutation::Insert(insert),
        ),
        created_key,
    })
}

/// Translate a PUT (`merge == false`), which sets every non-key property and nulls the
/// absent ones, or a MERGE, which only sets the supplied ones.
pub fn translate_update(
    model: &EntityModel,
    entity_set: &str,
    key: &EntityKey,
    payload: &Payload,
    merge: bool,
) -> Result<sql::execution_plan::ExecutionPlan<sql::execution_plan::Mutation>, Error> {
    let entity_type = writable_entity_set(model, entity_set)?;
    let (schema, table) = table_of(entity_type)?;
    check_properties(entity_type, payload)?;

    let mut set = std::collections::BTreeMap::new();
    for property in entity_type
        .properties
        .iter()
        .filter(|property| !entity_type.is_key(&property.name))
    {
        let value = match (payload.get(&property.name), merge) {
            (Some(value), _) => values::coerce(property, value)?,
            (None, false) => serde_json::Value::Null,
            (None, true) => continue,
        };
        set.insert(
            sql::ast::ColumnName(property.column_name.clone()),
            values::to_sql_value(value),
        );
    }

    // nothing to change: still touch the row so a missing entity is reported
    if set.is_empty() {
        for property in entity_type.key_properties() {
            let column = sql::ast::ColumnName(property.column_name.clone());
            set.insert(
                column.clone(),
                sql::ast::Expression::ColumnReference(sql::ast::ColumnReference::Column(column)),
            );
        }
    }

    let update = sql::ast::Update {
        schema: sql::ast::SchemaName(schema.to_string()),
        table: sql::ast::TableName(table.to_string()),
        set,
        where_: sql::ast::Where(key.to_sql_predicate(entity_type, None)),
    };
    tracing::info!(entity_set, merge, "SQL AST: {:?}", update);

    Ok(sql::execution_plan::mutation_execution_plan(
        entity_set.to_string(),
        sql::execution_plan::Mutation::Update(update),
    ))
}

/// Translate the deletion of an entity.
pub fn translate_delete(
    model: &EntityModel,
    entity_set: &str,
    key: &EntityKey,
) -> Result<sql::execution_plan::ExecutionPlan<sql::execution_plan::Mutation>, Error> {
    let entity_type = writable_entity_set(model, entity_set)?;
    let (schema, table) = table_of(entity_type)?;

    let delete = sql::ast::Delete {
        schema: sql::ast::SchemaName(schema.to_string()),
        table: sql::ast::TableName(table.to_string()),
        where_: sql::ast::Where(key.to_sql_predicate(entity_type, None)),
    };
    tracing::info!(entity_set, "SQL AST: {:?}", delete);

    Ok(sql::execution_plan::mutation_execution_plan(
        entity_set.to_string(),
        sql::execution_plan::Mutation::Delete(delete),
    ))
}

fn writable_entity_set<'a>(model: &'a EntityModel, entity_set: &str) -> Result<&'a EntityType, Error> {
    let entity_type = lookup_entity_set(model, entity_set)?;
    if entity_type.is_writable() {
        Ok(entity_type)
    } else {
        Err(Error::ReadOnlyEntitySet(entity_set.to_string()))
    }
}

fn table_of(entity_type: &EntityType) -> Result<(&str, &str), Error> {
    match &entity_type.source {
        EntitySource::Table { schema, table } => Ok((schema, table)),
        EntitySource::Query { .. } => Err(Error::ReadOnlyEntitySet(entity_type.entity_set_name.clone())),
    }
}

fn check_properties(entity_type: &EntityType, payload: &Payload) -> Result<(), Error> {
    match payload
        .keys()
        .find(|name| entity_type.property(name).is_none())
    {
        Some(unknown) => Err(Error::UnknownProperty(unknown.clone())),
        None => Ok(()),
    }
}
