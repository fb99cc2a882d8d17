//! Translate the query options of a request against an entity set.

pub mod filtering;
pub mod grouping;
pub mod options;
pub mod projection;
pub mod sorting;

use crate::translation::error::Error;
use crate::translation::key::EntityKey;
use options::{InlineCount, QueryOptions};
use query_engine_metadata::metadata::{EntityModel, EntitySource, EntityType};
use query_engine_sql::sql;

/// Translate query options against an entity set to an ExecutionPlan (SQL) to be run
/// against the database. With `count_only` the plan only counts the rows the options
/// select, honoring `$top` and `$skip`.
pub fn translate(
    model: &EntityModel,
    entity_set: &str,
    options: &QueryOptions,
    count_only: bool,
) -> Result<sql::execution_plan::ExecutionPlan<sql::execution_plan::Query>, Error> {
    let entity_type = lookup_entity_set(model, entity_set)?;

    if options.skip_token.is_some() {
        return Err(Error::SkipTokenNotSupported);
    }

    let from = translate_from(entity_type, options.group_by.as_deref())?;
    let table = table_reference(entity_type);

    let predicate = match &options.filter {
        None => sql::helpers::empty_where(),
        Some(filter) => filtering::translate_filter(entity_type, &table, filter)?,
    };
    let projection = projection::projection(entity_type, options.select.as_deref())?;
    let order_by = sorting::translate_order_by(entity_type, &table, &options.order_by)?;
    let limit = sql::ast::Limit {
        limit: options.top,
        offset: options.skip,
    };

    if count_only {
        let mut counted = sql::helpers::star_select(from);
        counted.where_ = sql::ast::Where(predicate);
        counted.limit = limit;
        tracing::info!(entity_set, "SQL AST: {:?}", counted);
        return Ok(sql::execution_plan::count_only_execution_plan(
            entity_set.to_string(),
            counted,
        ));
    }

    let count = match options.inline_count {
        InlineCount::None => None,
        InlineCount::AllPages => {
            let mut counted = sql::helpers::star_select(from.clone());
            counted.where_ = sql::ast::Where(predicate.clone());
            Some(sql::helpers::count_select(counted))
        }
    };

    let mut select =
        sql::helpers::simple_select(projection::select_list(entity_type, &table, &projection));
    select.from = Some(from);
    select.where_ = sql::ast::Where(predicate);
    select.order_by = order_by;
    select.limit = limit;

    tracing::info!(entity_set, "SQL AST: {:?}", select);
    Ok(sql::execution_plan::simple_query_execution_plan(
        entity_set.to_string(),
        select,
        count,
        projection,
    ))
}

/// Translate a read of a single entity by key, honoring `$select`.
pub fn translate_read_by_key(
    model: &EntityModel,
    entity_set: &str,
    key: &EntityKey,
    select: Option<&[String]>,
) -> Result<sql::execution_plan::ExecutionPlan<sql::execution_plan::Query>, Error> {
    let entity_type = lookup_entity_set(model, entity_set)?;
    let table = table_reference(entity_type);
    let projection = projection::projection(entity_type, select)?;

    let mut select =
        sql::helpers::simple_select(projection::select_list(entity_type, &table, &projection));
    select.from = Some(translate_from(entity_type, None)?);
    select.where_ = sql::ast::Where(key.to_sql_predicate(entity_type, Some(&table)));

    tracing::info!(entity_set, "SQL AST: {:?}", select);
    Ok(sql::execution_plan::simple_query_execution_plan(
        entity_set.to_string(),
        select,
        None,
        projection,
    ))
}

pub fn lookup_entity_set<'a>(model: &'a EntityModel, entity_set: &str) -> Result<&'a EntityType, Error> {
    model
        .entity_set(entity_set)
        .ok_or_else(|| Error::EntitySetNotFound(entity_set.to_string()))
}

/// Rows are read through an alias named after the entity type.
fn table_reference(entity_type: &EntityType) -> sql::ast::TableReference {
    sql::ast::TableReference::AliasedTable(sql::helpers::make_table_alias(entity_type.name.clone()))
}

fn translate_from(entity_type: &EntityType, group_by: Option<&[String]>) -> Result<sql::ast::From, Error> {
    let alias = sql::helpers::make_table_alias(entity_type.name.clone());
    match (&entity_type.source, group_by) {
        (EntitySource::Table { schema, table }, None) => Ok(sql::ast::From::Table {
            reference: sql::helpers::db_table(schema, table),
            alias,
        }),
        (EntitySource::Table { .. }, Some(_)) => {
            Err(Error::GroupByNotSupported(entity_type.name.clone()))
        }
        (EntitySource::Query { sql, .. }, None) => Ok(sql::ast::From::RawSql {
            sql: sql.clone(),
            alias,
        }),
        (EntitySource::Query { sql, .. }, Some(names)) => Ok(sql::ast::From::RawSql {
            sql: grouping::grouped_query(entity_type, sql, names)?,
            alias,
        }),
    }
}
