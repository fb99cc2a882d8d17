//! Execute single-statement writes and read created entities back.

use query_engine_metadata::metadata::EntityModel;
use query_engine_sql::sql;
use query_engine_translation::translation::key::EntityKey;
use query_engine_translation::translation::mutation::{CreatedKey, InsertPlan};
use query_engine_translation::translation::query::{lookup_entity_set, translate_read_by_key};
use sqlx::Row as _;
use tracing::{info_span, Instrument};

use crate::error::Error;
use crate::metrics;
use crate::query::{build_query_with_params, execute_single};
use crate::value::Row;

/// The entity a create produced, as read back from the database.
#[derive(Debug, Clone, PartialEq)]
pub struct CreatedEntity {
    pub key: EntityKey,
    pub row: Row,
    pub projection: Vec<String>,
}

/// Run an insert, then read the created row back.
pub async fn execute_insert(
    connection: &mut sqlx::SqliteConnection,
    metrics: &metrics::Metrics,
    model: &EntityModel,
    insert: InsertPlan,
) -> Result<CreatedEntity, Error> {
    let entity_set = insert.plan.entity_set.clone();
    let insert = match &insert.created_key {
        CreatedKey::Next { next_key, .. } => {
            let next_key = fetch_next_key(connection, &entity_set, next_key)
                .instrument(info_span!("Compute next key"))
                .await?;
            insert.with_next_key(next_key)
        }
        CreatedKey::Known(_) | CreatedKey::RowId { .. } => insert,
    };
    let result = run_statement(connection, insert.plan).await?;

    let key = match insert.created_key {
        CreatedKey::Known(key) => key,
        CreatedKey::RowId { property } => EntityKey(vec![(
            property,
            serde_json::Value::from(result.last_insert_rowid()),
        )]),
        CreatedKey::Next { property, .. } => {
            return Err(query_engine_translation::translation::error::Error::MissingKey(property).into())
        }
    };
    metrics.record_successful_mutation();

    let entity_type = lookup_entity_set(model, &entity_set)?;
    let plan = translate_read_by_key(model, &entity_set, &key, None)?;
    let (row, projection) = execute_single(connection, metrics, entity_type, plan)
        .instrument(info_span!("Read created entity"))
        .await?;
    Ok(CreatedEntity {
        key,
        row,
        projection,
    })
}

/// Run an update. Zero affected rows is an error.
pub async fn execute_update(
    connection: &mut sqlx::SqliteConnection,
    metrics: &metrics::Metrics,
    plan: sql::execution_plan::ExecutionPlan<sql::execution_plan::Mutation>,
) -> Result<(), Error> {
    let result = run_statement(connection, plan).await?;
    if result.rows_affected() == 0 {
        return Err(Error::EntityNotUpdated);
    }
    metrics.record_successful_mutation();
    Ok(())
}

/// Run a delete. Zero affected rows is an error.
pub async fn execute_delete(
    connection: &mut sqlx::SqliteConnection,
    metrics: &metrics::Metrics,
    plan: sql::execution_plan::ExecutionPlan<sql::execution_plan::Mutation>,
) -> Result<(), Error> {
    let result = run_statement(connection, plan).await?;
    if result.rows_affected() == 0 {
        return Err(Error::EntityNotDeleted);
    }
    metrics.record_successful_mutation();
    Ok(())
}

async fn fetch_next_key(
    connection: &mut sqlx::SqliteConnection,
    entity_set: &str,
    next_key: &sql::ast::Select,
) -> Result<i64, Error> {
    let statement = sql::execution_plan::select_to_sql(next_key);
    tracing::info!(entity_set, generated_sql = statement.sql);
    let row = build_query_with_params(&statement)
        .fetch_one(&mut *connection)
        .await?;
    let next_key: i64 = row.try_get(0)?;
    Ok(next_key)
}

async fn run_statement(
    connection: &mut sqlx::SqliteConnection,
    plan: sql::execution_plan::ExecutionPlan<sql::execution_plan::Mutation>,
) -> Result<sqlx::sqlite::SqliteQueryResult, Error> {
    let statement = plan.query.to_sql();
    tracing::info!(
        entity_set = plan.entity_set,
        generated_sql = statement.sql,
        params = ?&statement.params,
    );
    let result = build_query_with_params(&statement)
        .execute(&mut *connection)
        .instrument(info_span!("Database request"))
        .await?;
    Ok(result)
}
