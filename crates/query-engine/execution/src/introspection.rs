//! Build the entity model of a database from its schema and the custom entities.

use query_engine_metadata::metadata::{
    self, naming, CustomEntity, EdmType, EntityModel, EntityProperty, EntitySource, EntityType,
};
use sqlx::Row;
use tracing::{info_span, Instrument};

use crate::error::Error;

const TABLES_QUERY: &str = include_str!("introspection/tables.sql");
const COLUMNS_QUERY: &str = include_str!("introspection/columns.sql");

/// Tables are read from the main schema of the connection.
pub const SCHEMA: &str = "main";

/// Introspect the tables reachable through `connection` and merge in the custom
/// entities. Tables come first in name order, then custom entities in declaration order.
pub async fn build_entity_model(
    connection: &mut sqlx::SqliteConnection,
    custom_entities: &[CustomEntity],
) -> Result<EntityModel, Error> {
    let tables = introspect_tables(connection)
        .instrument(info_span!("Introspect tables"))
        .await?;

    let custom = custom_entities
        .iter()
        .map(CustomEntity::to_entity_type)
        .collect::<Result<Vec<_>, _>>()?;

    tracing::info!(
        tables = tables.len(),
        custom_entities = custom.len(),
        "built entity model"
    );
    Ok(EntityModel::new(tables, custom))
}

async fn introspect_tables(connection: &mut sqlx::SqliteConnection) -> Result<Vec<EntityType>, Error> {
    let table_rows = sqlx::query(TABLES_QUERY)
        .fetch_all(&mut *connection)
        .await?
        .iter()
        .map(|row| {
            Ok((
                row.try_get::<String, _>("name")?,
                row.try_get::<Option<String>, _>("sql")?.unwrap_or_default(),
            ))
        })
        .collect::<Result<Vec<_>, sqlx::Error>>()?;

    let mut tables = vec![];
    for (table, create_sql) in table_rows {
        let columns = sqlx::query(COLUMNS_QUERY)
            .bind(&table)
            .fetch_all(&mut *connection)
            .await?;
        let columns = columns
            .iter()
            .map(|row| {
                Ok(IntrospectedColumn {
                    cid: row.try_get("cid")?,
                    name: row.try_get("name")?,
                    declared_type: row.try_get("type")?,
                    not_null: row.try_get("notnull")?,
                    primary_key_position: row.try_get("pk")?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()?;

        let without_row_id = is_without_row_id(&create_sql);
        match table_entity_type(&table, columns, without_row_id) {
            Some(entity_type) => tables.push(entity_type),
            None => tracing::warn!(table, "skipping table without columns"),
        }
    }
    Ok(tables)
}

/// A row of `pragma_table_info`.
#[derive(Debug, Clone, PartialEq)]
struct IntrospectedColumn {
    cid: i64,
    name: String,
    declared_type: String,
    not_null: bool,
    primary_key_position: i64,
}

/// `CREATE TABLE ... WITHOUT ROWID`, whatever the spacing and case.
fn is_without_row_id(create_sql: &str) -> bool {
    let words: Vec<String> = create_sql
        .split(|c: char| c.is_whitespace() || c == ')' || c == ';' || c == ',')
        .filter(|word| !word.is_empty())
        .map(str::to_ascii_uppercase)
        .collect();
    words
        .windows(2)
        .any(|pair| pair[0] == "WITHOUT" && pair[1] == "ROWID")
}

/// Only a lone primary key column declared exactly `INTEGER` aliases the row id of a
/// rowid table. `INT PRIMARY KEY` and `BIGINT PRIMARY KEY` are ordinary columns.
fn aliases_row_id(columns: &[IntrospectedColumn], without_row_id: bool) -> bool {
    let mut keys = columns.iter().filter(|column| column.primary_key_position > 0);
    match (keys.next(), keys.next()) {
        (Some(key), None) => {
            !without_row_id && key.declared_type.trim().eq_ignore_ascii_case("INTEGER")
        }
        _ => false,
    }
}

fn table_entity_type(
    table: &str,
    columns: Vec<IntrospectedColumn>,
    without_row_id: bool,
) -> Option<EntityType> {
    let first = columns.first()?.name.clone();
    let row_id_key = aliases_row_id(&columns, without_row_id);

    let mut keys: Vec<&IntrospectedColumn> = columns
        .iter()
        .filter(|column| column.primary_key_position > 0)
        .collect();
    keys.sort_by_key(|column| column.primary_key_position);
    let mut keys: Vec<String> = keys
        .into_iter()
        .map(|column| naming::pascalize(&column.name))
        .collect();
    if keys.is_empty() {
        tracing::warn!(table, key = %first, "table has no primary key, keying by its first column");
        keys.push(naming::pascalize(&first));
    }

    let properties = columns
        .into_iter()
        .map(|column| {
            let edm_type = EdmType::from_sql_type(&column.declared_type);
            let (_, declared_size) = metadata::edm::split_declared_type(&column.declared_type);
            EntityProperty {
                name: naming::pascalize(&column.name),
                nullable: !column.not_null && column.primary_key_position == 0,
                max_length: declared_size.or(edm_type.default_max_length()),
                ordinal: u32::try_from(column.cid + 1).unwrap_or(u32::MAX),
                column_name: column.name,
                edm_type,
            }
        })
        .collect();

    Some(EntityType::new(
        naming::pascalize(table),
        EntitySource::Table {
            schema: SCHEMA.to_string(),
            table: table.to_string(),
        },
        properties,
        keys,
    )
    .with_row_id_key(row_id_key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::Connection;

    fn column(cid: i64, name: &str, declared_type: &str, not_null: bool, pk: i64) -> IntrospectedColumn {
        IntrospectedColumn {
            cid,
            name: name.to_string(),
            declared_type: declared_type.to_string(),
            not_null,
            primary_key_position: pk,
        }
    }

    #[test]
    fn table_shape() {
        let entity_type = table_entity_type(
            "Table_Name1",
            vec![
                column(0, "id", "INTEGER", false, 1),
                column(1, "str_col", "VARCHAR(256)", true, 0),
                column(2, "num_col", "int", false, 0),
            ],
            false,
        )
        .unwrap();

        assert_eq!(entity_type.name, "TableName1");
        assert_eq!(entity_type.entity_set_name, "TableName1s");
        assert_eq!(entity_type.keys, vec!["Id".to_string()]);
        assert!(entity_type.row_id_key);

        let id = entity_type.property("Id").unwrap();
        assert_eq!(id.edm_type, EdmType::Int32);
        assert!(!id.nullable);
        assert_eq!(id.max_length, Some(32));

        let str_col = entity_type.property("StrCol").unwrap();
        assert_eq!(str_col.column_name, "str_col");
        assert_eq!(str_col.max_length, Some(256));
        assert!(!str_col.nullable);

        assert!(entity_type.property("NumCol").unwrap().nullable);
    }

    #[test]
    fn tables_without_keys_use_the_first_column() {
        let entity_type =
            table_entity_type("log", vec![column(0, "message", "TEXT", false, 0)], false)
                .unwrap();
        assert_eq!(entity_type.keys, vec!["Message".to_string()]);
        assert!(!entity_type.row_id_key);
        assert!(table_entity_type("empty", vec![], false).is_none());
    }

    #[test]
    fn only_integer_keys_of_rowid_tables_alias_the_row_id() {
        let key = |declared_type: &str| vec![column(0, "id", declared_type, false, 1)];
        assert!(aliases_row_id(&key("INTEGER"), false));
        assert!(aliases_row_id(&key("integer"), false));
        assert!(!aliases_row_id(&key("INT"), false));
        assert!(!aliases_row_id(&key("BIGINT"), false));
        assert!(!aliases_row_id(&key("INTEGER"), true));
        assert!(!aliases_row_id(
            &[
                column(0, "a", "INTEGER", false, 1),
                column(1, "b", "INTEGER", false, 2),
            ],
            false
        ));

        assert!(is_without_row_id(
            "CREATE TABLE t (id INTEGER PRIMARY KEY) without\n  rowid"
        ));
        assert!(is_without_row_id("CREATE TABLE t (id INT PRIMARY KEY)WITHOUT ROWID;"));
        assert!(!is_without_row_id("CREATE TABLE t (id INTEGER PRIMARY KEY)"));
    }

    #[tokio::test]
    async fn introspects_row_id_keys() {
        let mut connection = sqlx::SqliteConnection::connect("sqlite::memory:").await.unwrap();
        for statement in [
            "CREATE TABLE aliased (id INTEGER PRIMARY KEY, label TEXT)",
            "CREATE TABLE plain (id INT PRIMARY KEY, label TEXT)",
            "CREATE TABLE wide (id BIGINT PRIMARY KEY, label TEXT)",
            "CREATE TABLE clustered (id INTEGER PRIMARY KEY, label TEXT) WITHOUT ROWID",
        ] {
            sqlx::query(statement).execute(&mut connection).await.unwrap();
        }

        let model = build_entity_model(&mut connection, &[]).await.unwrap();
        let row_id_keys: Vec<(&str, bool)> = model
            .entity_types
            .iter()
            .map(|entity_type| (entity_type.entity_set_name.as_str(), entity_type.row_id_key))
            .collect();
        assert_eq!(
            row_id_keys,
            vec![
                ("Aliaseds", true),
                ("Clustereds", false),
                ("Plains", false),
                ("Wides", false),
            ]
        );
    }

    #[tokio::test]
    async fn introspects_a_database() {
        let mut connection = sqlx::SqliteConnection::connect("sqlite::memory:").await.unwrap();
        sqlx::query(
            "CREATE TABLE b_table (code TEXT, part INTEGER, label VARCHAR(10), PRIMARY KEY (part, code))",
        )
        .execute(&mut connection)
        .await
        .unwrap();
        sqlx::query("CREATE TABLE a_table (id INTEGER PRIMARY KEY, flag BOOLEAN)")
            .execute(&mut connection)
            .await
            .unwrap();

        let model = build_entity_model(&mut connection, &[]).await.unwrap();
        let names: Vec<&str> = model.entity_set_names().collect();
        assert_eq!(names, vec!["ATables", "BTables"]);

        let b_table = model.entity_set("BTables").unwrap();
        assert_eq!(b_table.keys, vec!["Part".to_string(), "Code".to_string()]);
        assert_eq!(
            b_table.property("Label").unwrap().max_length,
            Some(10)
        );
        assert_eq!(
            model.entity_set("ATables").unwrap().property("Flag").unwrap().edm_type,
            EdmType::Boolean
        );
    }
}
