//! `apply=groupby(…)` against aggregate custom entities.

use crate::translation::error::Error;
use query_engine_metadata::metadata::EntityType;
use query_engine_sql::sql::fields;

/// Parse `groupby(Id,RefName)` into its property names.
pub fn parse_apply(value: &str) -> Result<Vec<String>, Error> {
    let value = value.trim();
    let arguments = value
        .strip_prefix("groupby")
        .map(str::trim_start)
        .and_then(|rest| rest.strip_prefix('('))
        .and_then(|rest| rest.strip_suffix(')'))
        .ok_or_else(|| Error::InvalidApply(value.to_string()))?;
    // groupby((A,B)) is accepted as well
    let arguments = arguments
        .trim()
        .strip_prefix('(')
        .and_then(|rest| rest.strip_suffix(')'))
        .unwrap_or(arguments);
    let names: Vec<String> = arguments
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect();
    if names.is_empty() {
        return Err(Error::InvalidApply(value.to_string()));
    }
    Ok(names)
}

/// Check the group names against the entity and return the custom query with its
/// `GROUP BY` clause.
pub fn grouped_query(entity_type: &EntityType, sql: &str, names: &[String]) -> Result<String, Error> {
    let aggregate = entity_type
        .aggregate()
        .ok_or_else(|| Error::GroupByNotSupported(entity_type.name.clone()))?;

    let mut requested: Vec<String> = names
        .iter()
        .map(|name| fields::un_pascalize(name).to_ascii_lowercase())
        .collect();
    let mut expected: Vec<String> = aggregate
        .group_names
        .iter()
        .map(|name| name.to_ascii_lowercase())
        .collect();
    requested.sort();
    requested.dedup();
    expected.sort();
    expected.dedup();
    if requested != expected {
        return Err(Error::GroupByMismatch(names.to_vec()));
    }

    Ok(format!(
        "{sql} GROUP BY {}",
        aggregate.group_expressions.join(", ")
    ))
}
