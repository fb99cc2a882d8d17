//! Execute a query execution plan against the database.

use query_engine_metadata::metadata::EntityType;
use query_engine_sql::sql;
use sqlx::sqlite::{Sqlite, SqliteArguments};
use sqlx::Row as _;
use tracing::{info_span, Instrument};

use crate::error::Error;
use crate::metrics;
use crate::value::{self, Row};

/// The rows of a query and the count, when one was requested.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    pub rows: Vec<Row>,
    pub count: Option<u64>,
    /// Property names to render, in order.
    pub projection: Vec<String>,
}

/// Execute a query plan on one connection.
pub async fn execute(
    connection: &mut sqlx::SqliteConnection,
    metrics: &metrics::Metrics,
    entity_type: &EntityType,
    plan: sql::execution_plan::ExecutionPlan<sql::execution_plan::Query>,
) -> Result<QueryResult, Error> {
    let count = match plan.query.count_sql() {
        None => None,
        Some(count_sql) => Some(
            fetch_count(connection, &count_sql)
                .instrument(info_span!("Count rows"))
                .await?,
        ),
    };

    let rows = if plan.query.count_only {
        vec![]
    } else {
        let query = plan.query.query_sql();
        tracing::info!(
            entity_set = plan.entity_set,
            generated_sql = query.sql,
            params = ?&query.params,
        );
        let sqlite_rows = build_query_with_params(&query)
            .fetch_all(&mut *connection)
            .instrument(info_span!("Database request"))
            .await?;
        sqlite_rows
            .iter()
            .map(|row| value::decode_row(entity_type, row))
            .collect::<Result<Vec<_>, sqlx::Error>>()?
    };

    metrics.record_successful_query();
    Ok(QueryResult {
        rows,
        count,
        projection: plan.query.projection,
    })
}

/// Execute a read-by-key plan, which must find exactly one row.
pub async fn execute_single(
    connection: &mut sqlx::SqliteConnection,
    metrics: &metrics::Metrics,
    entity_type: &EntityType,
    plan: sql::execution_plan::ExecutionPlan<sql::execution_plan::Query>,
) -> Result<(Row, Vec<String>), Error> {
    let result = execute(connection, metrics, entity_type, plan).await?;
    let row = result.rows.into_iter().next().ok_or(Error::EntityNotFound)?;
    Ok((row, result.projection))
}

async fn fetch_count(connection: &mut sqlx::SqliteConnection, count_sql: &sql::string::SQL) -> Result<u64, Error> {
    tracing::info!(
        generated_sql = count_sql.sql,
        params = ?&count_sql.params,
    );
    let row = build_query_with_params(count_sql)
        .fetch_one(&mut *connection)
        .await?;
    let count: i64 = row.try_get(0)?;
    Ok(u64::try_from(count).unwrap_or_default())
}

/// Create a SQLx query based on our SQL query and bind our parameters to it.
pub(crate) fn build_query_with_params(
    query: &sql::string::SQL,
) -> sqlx::query::Query<'_, Sqlite, SqliteArguments<'_>> {
    query
        .params
        .iter()
        .fold(sqlx::query(query.sql.as_str()), |sqlx_query, param| match param {
            sql::string::Param::String(s) => sqlx_query.bind(s.as_str()),
            sql::string::Param::Value(value) => bind_json(sqlx_query, value),
        })
}

fn bind_json<'q>(
    sqlx_query: sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>,
    value: &'q serde_json::Value,
) -> sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>> {
    match value {
        serde_json::Value::Null => sqlx_query.bind(None::<String>),
        serde_json::Value::Bool(b) => sqlx_query.bind(*b),
        serde_json::Value::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => sqlx_query.bind(i),
            (None, Some(f)) => sqlx_query.bind(f),
            (None, None) => sqlx_query.bind(n.to_string()),
        },
        serde_json::Value::String(s) => sqlx_query.bind(s.as_str()),
        other => sqlx_query.bind(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use query_engine_metadata::metadata::{CustomColumn, CustomEntity, EdmType};
    use query_engine_translation::translation::query::{options::QueryOptions, translate};
    use serde_json::json;
    use sqlx::Connection;

    async fn setup() -> (sqlx::SqliteConnection, query_engine_metadata::metadata::EntityModel) {
        let mut connection = sqlx::SqliteConnection::connect("sqlite::memory:").await.unwrap();
        for statement in [
            "CREATE TABLE Table_Name1 (id INTEGER PRIMARY KEY, str_col VARCHAR(256), num_col INT, ref_id INT)",
            "CREATE TABLE Table_Name2 (id INTEGER PRIMARY KEY, ref_name VARCHAR(256))",
            "INSERT INTO Table_Name1 VALUES (1, 'a%foo', 10, 1), (2, 'b', 20, 1), (3, NULL, 30, 2)",
            "INSERT INTO Table_Name2 VALUES (1, 'ref name1'), (2, 'ref name2'), (3, 'ref name3')",
        ] {
            sqlx::query(statement).execute(&mut connection).await.unwrap();
        }
        let column = |name: &str, ordinal| CustomColumn {
            column_name: name.to_string(),
            column_type: Some(12),
            column_type_name: "VARCHAR".to_string(),
            column_size: Some(10),
            is_nullable: true,
            ordinal_position: ordinal,
        };
        let custom = CustomEntity {
            table_name: "Table_Grouping_Test".to_string(),
            custom_query: "SELECT t1.id, t1.ref_name, COUNT(t2.id) AS ctr FROM Table_Name2 t1 LEFT JOIN Table_Name1 t2 ON t1.id=t2.ref_id".to_string(),
            columns: vec![column("id", 1), column("ctr", 2), column("ref_name", 3)],
            primary_keys: vec!["id".to_string()],
        };
        let model = crate::introspection::build_entity_model(&mut connection, &[custom])
            .await
            .unwrap();
        (connection, model)
    }

    fn metrics() -> metrics::Metrics {
        metrics::Metrics::initialize(&mut prometheus::Registry::new()).unwrap()
    }

    async fn run(entity_set: &str, pairs: &[(&str, &str)], count_only: bool) -> QueryResult {
        let (mut connection, model) = setup().await;
        let options = QueryOptions::parse(pairs.iter().copied()).unwrap();
        let plan = translate(&model, entity_set, &options, count_only).unwrap();
        let entity_type = model.entity_set(entity_set).unwrap();
        execute(&mut connection, &metrics(), entity_type, plan)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn rows_take_declared_types() {
        let result = run("TableName1s", &[("$filter", "NumCol ge 20")], false).await;
        assert_eq!(result.rows.len(), 2);
        let first = &result.rows[0];
        assert_eq!(first["Id"].value, json!(2));
        assert_eq!(first["Id"].edm_type, EdmType::Int32);
        assert_eq!(first["StrCol"].value, json!("b"));
        assert_eq!(result.rows[1]["StrCol"].value, json!(null));
        assert_eq!(result.count, None);
    }

    #[tokio::test]
    async fn like_wildcards_are_literal() {
        let result = run("TableName1s", &[("$filter", "startswith(StrCol,'%foo')")], false).await;
        assert!(result.rows.is_empty());
        let result = run("TableName1s", &[("$filter", "substringof('%foo',StrCol)")], false).await;
        assert_eq!(result.rows.len(), 1);
    }

    #[tokio::test]
    async fn inline_count_ignores_paging() {
        let result = run(
            "TableName1s",
            &[("$top", "1"), ("$inlinecount", "allpages")],
            false,
        )
        .await;
        assert_eq!(result.rows.len(), 1);
        assert_eq!(result.count, Some(3));

        let result = run("TableName1s", &[("$skip", "1")], true).await;
        assert!(result.rows.is_empty());
        assert_eq!(result.count, Some(2));
    }

    #[tokio::test]
    async fn grouped_custom_entity_is_typed_by_storage() {
        let result = run(
            "TableGroupingTests",
            &[("apply", "groupby(Id,RefName)"), ("$inlinecount", "allpages")],
            false,
        )
        .await;
        assert_eq!(result.count, Some(3));
        let first = &result.rows[0];
        assert_eq!(first["Ctr"].value, json!(2));
        assert_eq!(first["Ctr"].edm_type, EdmType::Int32);
        assert_eq!(first["RefName"].edm_type, EdmType::String);
        assert_eq!(result.rows[2]["Ctr"].value, json!(0));
    }
}
