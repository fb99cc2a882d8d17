//! Custom entities: entity types backed by a hand-written SELECT instead of a table.

use super::edm::EdmType;
use super::entity::{AggregateProjection, EntityProperty, EntitySource, EntityType};
use super::naming;
use query_engine_sql::sql::fields;
use quick_xml::events::Event;
use quick_xml::Reader;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A custom entity declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CustomEntity {
    /// The entity name, before PascalCase conversion.
    pub table_name: String,
    /// A SELECT producing the entity's rows.
    pub custom_query: String,
    pub columns: Vec<CustomColumn>,
    /// Column names of the key, in key order. Defaults to the first column.
    #[serde(default)]
    pub primary_keys: Vec<String>,
}

/// A column of a custom entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CustomColumn {
    /// Output name of the column in the custom query.
    pub column_name: String,
    /// A `java.sql.Types` code. Takes precedence over `columnTypeName` when recognised.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_type: Option<i32>,
    #[serde(default = "default_column_type_name")]
    pub column_type_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_size: Option<u32>,
    #[serde(default = "default_nullable")]
    pub is_nullable: bool,
    #[serde(default)]
    pub ordinal_position: u32,
}

fn default_column_type_name() -> String {
    "VARCHAR".to_string()
}

fn default_nullable() -> bool {
    true
}

/// Where custom entity declarations come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum CustomEntitiesSource {
    /// An XML `CustomEntities` document, relative to the configuration directory.
    File { file: std::path::PathBuf },
    Inline(Vec<CustomEntity>),
}

impl Default for CustomEntitiesSource {
    fn default() -> Self {
        CustomEntitiesSource::Inline(vec![])
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CustomEntityError {
    #[error("custom entity {entity}: the custom query must be a SELECT")]
    NotASelect { entity: String },
    #[error("custom entity {entity} declares no columns")]
    NoColumns { entity: String },
    #[error("custom entity {entity}: column {column} is not in the select list of the custom query")]
    UnknownColumn { entity: String, column: String },
    #[error("custom entity {entity}: primary key {column} is not a declared column")]
    UnknownKey { entity: String, column: String },
    #[error("invalid custom entities document: {0}")]
    Document(String),
}

impl From<quick_xml::Error> for CustomEntityError {
    fn from(err: quick_xml::Error) -> Self {
        CustomEntityError::Document(err.to_string())
    }
}

impl CustomEntity {
    /// Validate the declaration against its query and build the entity type.
    pub fn to_entity_type(&self) -> Result<EntityType, CustomEntityError> {
        let entity = naming::pascalize(&self.table_name);

        let select_list =
            fields::select_list(&self.custom_query).ok_or_else(|| CustomEntityError::NotASelect {
                entity: entity.clone(),
            })?;
        let field_list = fields::parse_fields(&select_list);
        if let Some(diagnostic) = &field_list.diagnostic {
            tracing::warn!(
                entity = entity,
                diagnostic = ?diagnostic,
                "custom query select list did not parse cleanly"
            );
        }
        if self.columns.is_empty() {
            return Err(CustomEntityError::NoColumns { entity });
        }

        let mut properties = vec![];
        for (index, column) in self.columns.iter().enumerate() {
            let known = field_list
                .fields
                .iter()
                .any(|field| field.output_name().eq_ignore_ascii_case(&column.column_name));
            if !known {
                return Err(CustomEntityError::UnknownColumn {
                    entity,
                    column: column.column_name.clone(),
                });
            }
            let edm_type = column
                .column_type
                .and_then(EdmType::from_type_code)
                .unwrap_or_else(|| EdmType::from_sql_type(&column.column_type_name));
            let ordinal = if column.ordinal_position == 0 {
                u32::try_from(index + 1).unwrap_or(u32::MAX)
            } else {
                column.ordinal_position
            };
            properties.push(EntityProperty {
                name: naming::pascalize(&column.column_name),
                column_name: column.column_name.clone(),
                edm_type,
                nullable: column.is_nullable,
                max_length: column.column_size.or(edm_type.default_max_length()),
                ordinal,
            });
        }

        let mut keys = vec![];
        for key in &self.primary_keys {
            let declared = self
                .columns
                .iter()
                .any(|column| column.column_name.eq_ignore_ascii_case(key));
            if !declared {
                return Err(CustomEntityError::UnknownKey {
                    entity,
                    column: key.clone(),
                });
            }
            keys.push(naming::pascalize(key));
        }
        if keys.is_empty() {
            keys.push(naming::pascalize(&self.columns[0].column_name));
        }

        let aggregate = if field_list.fields.iter().any(fields::Field::is_aggregate) {
            let (group_names, group_expressions) = field_list
                .fields
                .iter()
                .filter(|field| !field.is_aggregate())
                .map(|field| (field.output_name(), field.expression_without_alias()))
                .unzip();
            Some(AggregateProjection {
                group_names,
                group_expressions,
            })
        } else {
            None
        };

        Ok(EntityType::new(
            entity,
            EntitySource::Query {
                sql: fields::normalize(&self.custom_query),
                aggregate,
            },
            properties,
            keys,
        ))
    }
}

/// Parse a `CustomEntities` XML document. Element prefixes are ignored.
pub fn parse_custom_entities_xml(xml: &str) -> Result<Vec<CustomEntity>, CustomEntityError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut entities = vec![];
    let mut path: Vec<String> = vec![];
    let mut entity: Option<CustomEntity> = None;
    let mut column: Option<CustomColumn> = None;
    let mut primary_key: Option<String> = None;

    loop {
        match reader.read_event()? {
            Event::Start(start) => {
                let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
                match name.as_str() {
                    "Entity" => {
                        entity = Some(CustomEntity {
                            table_name: String::new(),
                            custom_query: String::new(),
                            columns: vec![],
                            primary_keys: vec![],
                        });
                    }
                    "Column" => {
                        column = Some(CustomColumn {
                            column_name: String::new(),
                            column_type: None,
                            column_type_name: default_column_type_name(),
                            column_size: None,
                            is_nullable: default_nullable(),
                            ordinal_position: 0,
                        });
                    }
                    "PrimaryKey" => primary_key = Some(String::new()),
                    _ => {}
                }
                path.push(name);
            }
            Event::End(_) => {
                let name = path.pop().unwrap_or_default();
                match name.as_str() {
                    "Entity" => {
                        let done = entity.take().ok_or_else(|| {
                            CustomEntityError::Document("unbalanced Entity element".to_string())
                        })?;
                        entities.push(done);
                    }
                    "Column" => {
                        if let (Some(entity), Some(column)) = (entity.as_mut(), column.take()) {
                            entity.columns.push(column);
                        }
                    }
                    "PrimaryKey" => {
                        if let (Some(entity), Some(key)) = (entity.as_mut(), primary_key.take()) {
                            entity.primary_keys.push(key);
                        }
                    }
                    _ => {}
                }
            }
            Event::Text(text) => {
                let value = text.unescape()?.trim().to_string();
                let element = path.last().map(String::as_str);
                let parent = path.iter().rev().nth(1).map(String::as_str);
                match (parent, element) {
                    (Some("Entity"), Some("tableName")) => {
                        if let Some(entity) = entity.as_mut() {
                            entity.table_name = value;
                        }
                    }
                    (Some("Entity"), Some("customQuery")) => {
                        if let Some(entity) = entity.as_mut() {
                            entity.custom_query = value;
                        }
                    }
                    (Some("Column"), Some(field)) => {
                        if let Some(column) = column.as_mut() {
                            set_column_field(column, field, value)?;
                        }
                    }
                    (Some("PrimaryKey"), Some("columnName")) => primary_key = Some(value),
                    _ => {}
                }
            }
            Event::CData(data) => {
                let value = String::from_utf8_lossy(&data).trim().to_string();
                if path.last().map(String::as_str) == Some("customQuery") {
                    if let Some(entity) = entity.as_mut() {
                        entity.custom_query = value;
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(entities)
}

fn set_column_field(
    column: &mut CustomColumn,
    field: &str,
    value: String,
) -> Result<(), CustomEntityError> {
    let invalid = |field: &str, value: &str| {
        CustomEntityError::Document(format!("invalid {field} value '{value}'"))
    };
    match field {
        "columnName" => column.column_name = value,
        "columnType" => {
            column.column_type = Some(value.parse().map_err(|_| invalid(field, &value))?);
        }
        "columnTypeName" => column.column_type_name = value,
        "columnSize" => {
            column.column_size = Some(value.parse().map_err(|_| invalid(field, &value))?);
        }
        "isNullable" => {
            column.is_nullable = value.parse().map_err(|_| invalid(field, &value))?;
        }
        "ordinalPosition" => {
            column.ordinal_position = value.parse().map_err(|_| invalid(field, &value))?;
        }
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOCUMENT: &str = r#"<l7:CustomEntities xmlns:l7="http://ns.l7tech.com/2012/04/api-management">
<l7:Entity>
    <l7:tableName>Table_Grouping_Test</l7:tableName>
    <l7:customQuery>SELECT t1.id, t1.ref_name, COUNT(t2.id) AS ctr
        FROM Table_Name2 t1 LEFT JOIN Table_Name1 t2 ON t1.id=t2.ref_id </l7:customQuery>
    <l7:columns>
        <l7:Column>
            <l7:columnName>id</l7:columnName>
            <l7:columnType>1</l7:columnType>
            <l7:columnTypeName>INT</l7:columnTypeName>
            <l7:columnSize>36</l7:columnSize>
            <l7:isNullable>false</l7:isNullable>
            <l7:ordinalPosition>1</l7:ordinalPosition>
        </l7:Column>
        <l7:Column>
            <l7:columnName>ctr</l7:columnName>
            <l7:columnType>12</l7:columnType>
            <l7:columnTypeName>INT</l7:columnTypeName>
            <l7:columnSize>10</l7:columnSize>
            <l7:isNullable>false</l7:isNullable>
            <l7:ordinalPosition>2</l7:ordinalPosition>
        </l7:Column>
        <l7:Column>
            <l7:columnName>ref_name</l7:columnName>
            <l7:columnType>12</l7:columnType>
            <l7:columnTypeName>VARCHAR</l7:columnTypeName>
            <l7:columnSize>36</l7:columnSize>
            <l7:isNullable>false</l7:isNullable>
            <l7:ordinalPosition>2</l7:ordinalPosition>
        </l7:Column>
    </l7:columns>
    <l7:primaryKeys>
        <l7:PrimaryKey>
            <l7:columnName>id</l7:columnName>
            <l7:sequenceNumber>1</l7:sequenceNumber>
            <l7:primaryKeyName>PRIMARY</l7:primaryKeyName>
        </l7:PrimaryKey>
    </l7:primaryKeys>
</l7:Entity>
</l7:CustomEntities>"#;

    #[test]
    fn parse_document() {
        let entities = parse_custom_entities_xml(DOCUMENT).unwrap();
        assert_eq!(entities.len(), 1);
        let entity = &entities[0];
        assert_eq!(entity.table_name, "Table_Grouping_Test");
        assert!(entity.custom_query.starts_with("SELECT t1.id"));
        assert_eq!(entity.columns.len(), 3);
        assert_eq!(entity.columns[1].column_name, "ctr");
        assert_eq!(entity.columns[1].column_type, Some(12));
        assert_eq!(entity.columns[1].column_size, Some(10));
        assert!(!entity.columns[1].is_nullable);
        assert_eq!(entity.primary_keys, vec!["id".to_string()]);
    }

    #[test]
    fn build_aggregate_entity_type() {
        let entities = parse_custom_entities_xml(DOCUMENT).unwrap();
        let entity_type = entities[0].to_entity_type().unwrap();

        assert_eq!(entity_type.name, "TableGroupingTest");
        assert_eq!(entity_type.entity_set_name, "TableGroupingTests");
        assert_eq!(entity_type.keys, vec!["Id".to_string()]);
        assert!(!entity_type.is_writable());

        let properties: Vec<_> = entity_type
            .properties
            .iter()
            .map(|p| (p.name.as_str(), p.edm_type, p.max_length))
            .collect();
        assert_eq!(
            properties,
            vec![
                ("Id", EdmType::String, Some(36)),
                ("Ctr", EdmType::String, Some(10)),
                ("RefName", EdmType::String, Some(36)),
            ]
        );

        let aggregate = entity_type.aggregate().unwrap();
        assert_eq!(aggregate.group_names, vec!["id", "ref_name"]);
        assert_eq!(aggregate.group_expressions, vec!["t1.id", "t1.ref_name"]);
    }

    #[test]
    fn unknown_column_is_rejected() {
        let entity = CustomEntity {
            table_name: "thing".to_string(),
            custom_query: "SELECT a FROM t".to_string(),
            columns: vec![CustomColumn {
                column_name: "b".to_string(),
                column_type: None,
                column_type_name: "INT".to_string(),
                column_size: None,
                is_nullable: true,
                ordinal_position: 1,
            }],
            primary_keys: vec![],
        };
        assert!(matches!(
            entity.to_entity_type(),
            Err(CustomEntityError::UnknownColumn { column, .. }) if column == "b"
        ));
    }

    #[test]
    fn non_select_is_rejected() {
        let entity = CustomEntity {
            table_name: "thing".to_string(),
            custom_query: "DELETE FROM t".to_string(),
            columns: vec![],
            primary_keys: vec![],
        };
        assert!(matches!(
            entity.to_entity_type(),
            Err(CustomEntityError::NotASelect { .. })
        ));
    }

    #[test]
    fn inline_declarations_deserialize() {
        let source: CustomEntitiesSource = serde_json::from_value(serde_json::json!([{
            "tableName": "totals",
            "customQuery": "SELECT kind, SUM(n) AS total FROM t",
            "columns": [
                { "columnName": "kind", "columnTypeName": "VARCHAR", "columnSize": 20 },
                { "columnName": "total", "columnTypeName": "INTEGER", "isNullable": false }
            ]
        }]))
        .unwrap();
        let CustomEntitiesSource::Inline(entities) = source else {
            panic!("expected inline declarations");
        };
        let entity_type = entities[0].to_entity_type().unwrap();
        assert_eq!(entity_type.keys, vec!["Kind".to_string()]);
        assert_eq!(entity_type.properties[1].edm_type, EdmType::Int32);
        assert_eq!(entity_type.properties[1].max_length, Some(32));

        let file: CustomEntitiesSource =
            serde_json::from_value(serde_json::json!({ "file": "entities.xml" })).unwrap();
        assert_eq!(
            file,
            CustomEntitiesSource::File {
                file: "entities.xml".into()
            }
        );
    }
}
