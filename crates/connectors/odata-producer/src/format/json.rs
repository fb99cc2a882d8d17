//! Verbose JSON: `{"d": …}` wrappers with `__metadata` on every entry.

use query_engine_execution::value::{PropertyValue, Row};
use query_engine_metadata::metadata::{EdmType, EntityType};
use serde_json::{json, Map, Value};

use super::{row_key, Links};

/// `{"d":{"results":[…],"__count":"N"}}`; the count is only present when requested.
pub fn feed(
    links: &Links,
    entity_type: &EntityType,
    rows: &[Row],
    projection: &[String],
    count: Option<u64>,
) -> Value {
    let results: Vec<Value> = rows
        .iter()
        .map(|row| entry_object(links, entity_type, row, projection))
        .collect();
    let mut d = Map::new();
    d.insert("results".to_string(), Value::Array(results));
    if let Some(count) = count {
        d.insert("__count".to_string(), Value::String(count.to_string()));
    }
    json!({ "d": d })
}

/// `{"d":{"__metadata":{…},"Id":1,…}}`
pub fn entry(links: &Links, entity_type: &EntityType, row: &Row, projection: &[String]) -> Value {
    json!({ "d": entry_object(links, entity_type, row, projection) })
}

fn entry_object(links: &Links, entity_type: &EntityType, row: &Row, projection: &[String]) -> Value {
    let key = row_key(entity_type, row);
    let mut object = Map::new();
    object.insert(
        "__metadata".to_string(),
        json!({
            "uri": links.entity_uri(entity_type, &key),
            "type": entity_type.qualified_name(),
        }),
    );
    for name in projection {
        if let Some(property) = row.get(name) {
            object.insert(name.clone(), property_value(property));
        }
    }
    Value::Object(object)
}

/// 64-bit integers and decimals are strings, so that clients lose no precision.
fn property_value(property: &PropertyValue) -> Value {
    match (&property.value, property.edm_type) {
        (Value::Number(n), EdmType::Int64 | EdmType::Decimal) => Value::String(n.to_string()),
        (value, _) => value.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use query_engine_metadata::metadata::{EntityProperty, EntitySource};

    fn entity_type() -> EntityType {
        let property = |name: &str, edm_type, ordinal| EntityProperty {
            name: name.to_string(),
            column_name: name.to_lowercase(),
            edm_type,
            nullable: true,
            max_length: None,
            ordinal,
        };
        EntityType::new(
            "Word".to_string(),
            EntitySource::Table {
                schema: "main".to_string(),
                table: "word".to_string(),
            },
            vec![
                property("Code", EdmType::String, 1),
                property("Total", EdmType::Int64, 2),
            ],
            vec!["Code".to_string()],
        )
    }

    fn row() -> Row {
        let mut row = Row::new();
        row.insert(
            "Code".to_string(),
            PropertyValue {
                edm_type: EdmType::String,
                value: json!("it's"),
            },
        );
        row.insert(
            "Total".to_string(),
            PropertyValue {
                edm_type: EdmType::Int64,
                value: json!(5),
            },
        );
        row
    }

    #[test]
    fn feed_shape() {
        let links = Links {
            base_uri: "http://localhost/OData.svc/",
        };
        let projection = vec!["Code".to_string(), "Total".to_string()];
        let feed = feed(&links, &entity_type(), &[row()], &projection, Some(1));
        similar_asserts::assert_eq!(
            feed,
            json!({
                "d": {
                    "results": [{
                        "__metadata": {
                            "uri": "http://localhost/OData.svc/Words('it''s')",
                            "type": "JdbcModel.Word"
                        },
                        "Code": "it's",
                        "Total": "5"
                    }],
                    "__count": "1"
                }
            })
        );
        assert!(feed["d"].get("__count").is_some());

        let without_count = super::feed(&links, &entity_type(), &[], &projection, None);
        assert_eq!(without_count, json!({"d": {"results": []}}));
    }
}
