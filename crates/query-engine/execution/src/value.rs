//! Typed property values decoded from SQLite rows.

use base64::{engine::general_purpose::STANDARD as base64_engine, Engine};
use indexmap::IndexMap;
use query_engine_metadata::metadata::{EdmType, EntitySource, EntityType};
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Row as _, TypeInfo, ValueRef};

/// One property value with the EDM type it is rendered as.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyValue {
    pub edm_type: EdmType,
    pub value: serde_json::Value,
}

/// A decoded row, keyed by property name in select list order.
pub type Row = IndexMap<String, PropertyValue>;

/// The value SQLite actually stored, before any declared type is applied.
#[derive(Debug, Clone, PartialEq)]
enum Stored {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

/// Decode a row whose columns are aliased by property name.
///
/// Table properties take their declared type. Custom entity properties are typed by
/// what the query produced, falling back to the declared type for nulls.
pub fn decode_row(entity_type: &EntityType, row: &SqliteRow) -> Result<Row, sqlx::Error> {
    let from_storage = matches!(entity_type.source, EntitySource::Query { .. });
    let mut decoded = Row::new();
    for (index, column) in row.columns().iter().enumerate() {
        let name = column.name();
        let Some(property) = entity_type.property(name) else {
            continue;
        };
        let stored = decode_stored(row, index)?;
        let value = if from_storage {
            storage_value(property.edm_type, stored)
        } else {
            declared_value(property.edm_type, stored)
        };
        decoded.insert(name.to_string(), value);
    }
    Ok(decoded)
}

fn decode_stored(row: &SqliteRow, index: usize) -> Result<Stored, sqlx::Error> {
    let raw = row.try_get_raw(index)?;
    if raw.is_null() {
        return Ok(Stored::Null);
    }
    let storage_class = raw.type_info().name().to_string();
    Ok(match storage_class.as_str() {
        "INTEGER" | "BIGINT" | "INT8" | "BOOLEAN" => Stored::Integer(row.try_get(index)?),
        "REAL" => Stored::Real(row.try_get(index)?),
        "BLOB" => Stored::Blob(row.try_get(index)?),
        _ => Stored::Text(row.try_get(index)?),
    })
}

/// Type a value by its storage class. Integers that fit are `Edm.Int32`.
fn storage_value(declared: EdmType, stored: Stored) -> PropertyValue {
    let (edm_type, value) = match stored {
        Stored::Null => (declared, serde_json::Value::Null),
        Stored::Integer(i) if i32::try_from(i).is_ok() => (EdmType::Int32, serde_json::Value::from(i)),
        Stored::Integer(i) => (EdmType::Int64, serde_json::Value::from(i)),
        Stored::Real(f) => (EdmType::Double, serde_json::Value::from(f)),
        Stored::Text(s) => (EdmType::String, serde_json::Value::String(s)),
        Stored::Blob(bytes) => (
            EdmType::Binary,
            serde_json::Value::String(base64_engine.encode(bytes)),
        ),
    };
    PropertyValue { edm_type, value }
}

/// Conform a stored value to the declared type of its column. Values that do not
/// conform are kept as text.
fn declared_value(declared: EdmType, stored: Stored) -> PropertyValue {
    use serde_json::Value;

    let as_text = |stored: Stored| match stored {
        Stored::Null => Value::Null,
        Stored::Integer(i) => Value::String(i.to_string()),
        Stored::Real(f) => Value::String(f.to_string()),
        Stored::Text(s) => Value::String(s),
        Stored::Blob(bytes) => Value::String(base64_engine.encode(bytes)),
    };

    let value = match (declared, stored) {
        (_, Stored::Null) => Value::Null,
        (EdmType::Boolean, Stored::Integer(i)) => Value::Bool(i != 0),
        (EdmType::Boolean, Stored::Text(s)) if s == "true" || s == "false" => Value::Bool(s == "true"),
        (EdmType::Byte | EdmType::Int16 | EdmType::Int32 | EdmType::Int64, Stored::Integer(i)) => {
            Value::from(i)
        }
        #[allow(clippy::cast_possible_truncation)]
        (EdmType::Byte | EdmType::Int16 | EdmType::Int32 | EdmType::Int64, Stored::Real(f))
            if f.fract() == 0.0 =>
        {
            Value::from(f as i64)
        }
        (EdmType::Byte | EdmType::Int16 | EdmType::Int32 | EdmType::Int64, Stored::Text(s))
            if s.trim().parse::<i64>().is_ok() =>
        {
            Value::from(s.trim().parse::<i64>().unwrap_or_default())
        }
        #[allow(clippy::cast_precision_loss)]
        (EdmType::Double | EdmType::Single | EdmType::Decimal, Stored::Integer(i)) => {
            Value::from(i as f64)
        }
        (EdmType::Double | EdmType::Single | EdmType::Decimal, Stored::Real(f)) => Value::from(f),
        (EdmType::Double | EdmType::Single | EdmType::Decimal, Stored::Text(s))
            if s.trim().parse::<f64>().is_ok_and(f64::is_finite) =>
        {
            Value::from(s.trim().parse::<f64>().unwrap_or_default())
        }
        (_, stored) => as_text(stored),
    };

    // a value kept as text is rendered as a string whatever the declaration says
    let edm_type = match (&value, declared) {
        (Value::String(_), EdmType::DateTime | EdmType::Binary | EdmType::String) => declared,
        (Value::String(_), _) => EdmType::String,
        _ => declared,
    };
    PropertyValue { edm_type, value }
}

#[cfg(test)]
mod tests {
    use super::*;
    use query_engine_metadata::metadata::EntityProperty;
    use serde_json::json;
    use sqlx::Connection;

    fn property(name: &str, edm_type: EdmType, ordinal: u32) -> EntityProperty {
        EntityProperty {
            name: name.to_string(),
            column_name: name.to_lowercase(),
            edm_type,
            nullable: true,
            max_length: None,
            ordinal,
        }
    }

    #[tokio::test]
    async fn decodes_rows_by_property_name() {
        let mut connection = sqlx::SqliteConnection::connect("sqlite::memory:").await.unwrap();
        let row = sqlx::query(
            "SELECT 7 AS \"Id\", 'x' AS \"Label\", x'010203' AS \"Data\", 1 AS \"Flag\", 0 AS \"Ignored\"",
        )
        .fetch_one(&mut connection)
        .await
        .unwrap();

        let properties = vec![
            property("Id", EdmType::Int32, 1),
            property("Label", EdmType::String, 2),
            property("Data", EdmType::Binary, 3),
            property("Flag", EdmType::Boolean, 4),
        ];
        let table = EntityType::new(
            "Thing".to_string(),
            EntitySource::Table {
                schema: "main".to_string(),
                table: "thing".to_string(),
            },
            properties.clone(),
            vec!["Id".to_string()],
        );
        let decoded = decode_row(&table, &row).unwrap();
        assert_eq!(
            decoded.keys().collect::<Vec<_>>(),
            vec!["Id", "Label", "Data", "Flag"]
        );
        assert_eq!(decoded["Id"].value, json!(7));
        assert_eq!(decoded["Label"].value, json!("x"));
        assert_eq!(decoded["Data"].value, json!("AQID"));
        assert_eq!(decoded["Flag"].value, json!(true));

        let custom = EntityType::new(
            "Thing".to_string(),
            EntitySource::Query {
                sql: "SELECT 1".to_string(),
                aggregate: None,
            },
            properties,
            vec![],
        );
        let decoded = decode_row(&custom, &row).unwrap();
        assert_eq!(decoded["Flag"].edm_type, EdmType::Int32);
        assert_eq!(decoded["Flag"].value, json!(1));
    }

    #[test]
    fn storage_types() {
        assert_eq!(
            storage_value(EdmType::String, Stored::Integer(3)),
            PropertyValue {
                edm_type: EdmType::Int32,
                value: json!(3)
            }
        );
        assert_eq!(
            storage_value(EdmType::String, Stored::Integer(1 << 40)).edm_type,
            EdmType::Int64
        );
        assert_eq!(
            storage_value(EdmType::Int32, Stored::Null),
            PropertyValue {
                edm_type: EdmType::Int32,
                value: json!(null)
            }
        );
        assert_eq!(
            storage_value(EdmType::String, Stored::Blob(vec![1, 2, 3])).value,
            json!("AQID")
        );
    }

    #[test]
    fn declared_types() {
        assert_eq!(
            declared_value(EdmType::Boolean, Stored::Integer(1)).value,
            json!(true)
        );
        assert_eq!(
            declared_value(EdmType::Int32, Stored::Text("12".to_string())).value,
            json!(12)
        );
        assert_eq!(
            declared_value(EdmType::Double, Stored::Integer(2)).value,
            json!(2.0)
        );
        assert_eq!(
            declared_value(EdmType::String, Stored::Integer(5)),
            PropertyValue {
                edm_type: EdmType::String,
                value: json!("5")
            }
        );
        assert_eq!(
            declared_value(EdmType::Int32, Stored::Text("abc".to_string())),
            PropertyValue {
                edm_type: EdmType::String,
                value: json!("abc")
            }
        );
    }
}
