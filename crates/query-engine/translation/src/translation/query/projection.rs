//! Handle `$select`: which properties are read and rendered.

use crate::translation::error::Error;
use query_engine_metadata::metadata::EntityType;
use query_engine_sql::sql;

/// The properties to render, in order. Every requested name must exist.
pub fn projection(entity_type: &EntityType, select: Option<&[String]>) -> Result<Vec<String>, Error> {
    match select {
        None => Ok(entity_type
            .properties
            .iter()
            .map(|property| property.name.clone())
            .collect()),
        Some(names) => {
            let mut projection: Vec<String> = vec![];
            for name in names {
                if entity_type.property(name).is_none() {
                    return Err(Error::InvalidSelectField(name.clone()));
                }
                if !projection.contains(name) {
                    projection.push(name.clone());
                }
            }
            Ok(projection)
        }
    }
}

/// The select list for a projection. Key properties are always read, since they
/// identify the rendered entries; they are appended when not projected.
pub fn select_list(
    entity_type: &EntityType,
    table: &sql::ast::TableReference,
    projection: &[String],
) -> Vec<(sql::ast::ColumnAlias, sql::ast::Expression)> {
    let keys = entity_type
        .keys
        .iter()
        .filter(|key| !projection.contains(key));

    projection
        .iter()
        .chain(keys)
        .filter_map(|name| entity_type.property(name))
        .map(|property| {
            sql::helpers::make_column(
                table.clone(),
                sql::ast::ColumnName(property.column_name.clone()),
                sql::helpers::make_column_alias(property.name.clone()),
            )
        })
        .collect()
}
