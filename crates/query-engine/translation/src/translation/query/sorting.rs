//! Translate `$orderby` and the default ordering.

use crate::translation::error::Error;
use query_engine_metadata::metadata::EntityType;
use query_engine_sql::sql;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderByItem {
    pub property: String,
    pub direction: sql::ast::OrderByDirection,
}

/// Parse `StrCol desc, Id`.
pub fn parse_order_by(value: &str) -> Result<Vec<OrderByItem>, Error> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| {
            let mut words = item.split_whitespace();
            let property = words.next().unwrap_or_default().to_string();
            let direction = match words.next().map(str::to_ascii_lowercase).as_deref() {
                None | Some("asc") => sql::ast::OrderByDirection::Asc,
                Some("desc") => sql::ast::OrderByDirection::Desc,
                Some(_) => {
                    return Err(Error::InvalidOptionValue {
                        option: "$orderby".to_string(),
                        value: value.to_string(),
                    })
                }
            };
            if words.next().is_some() {
                return Err(Error::InvalidOptionValue {
                    option: "$orderby".to_string(),
                    value: value.to_string(),
                });
            }
            Ok(OrderByItem {
                property,
                direction,
            })
        })
        .collect()
}

/// Translate the requested ordering, or order by key when none is given.
pub fn translate_order_by(
    entity_type: &EntityType,
    table: &sql::ast::TableReference,
    order_by: &[OrderByItem],
) -> Result<sql::ast::OrderBy, Error> {
    let column = |column_name: &str| {
        sql::ast::Expression::ColumnReference(sql::ast::ColumnReference::TableColumn {
            table: table.clone(),
            name: sql::ast::ColumnName(column_name.to_string()),
        })
    };

    let elements = if order_by.is_empty() {
        entity_type
            .key_properties()
            .map(|property| sql::ast::OrderByElement {
                target: column(&property.column_name),
                direction: sql::ast::OrderByDirection::Asc,
            })
            .collect()
    } else {
        order_by
            .iter()
            .map(|item| {
                let property = entity_type
                    .property(&item.property)
                    .ok_or_else(|| Error::InvalidOrderByField(item.property.clone()))?;
                Ok(sql::ast::OrderByElement {
                    target: column(&property.column_name),
                    direction: item.direction,
                })
            })
            .collect::<Result<Vec<_>, Error>>()?
    };

    Ok(sql::ast::OrderBy { elements })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_directions() {
        let items = parse_order_by("A desc, B ,C asc").unwrap();
        let directions: Vec<_> = items
            .iter()
            .map(|item| (item.property.as_str(), item.direction))
            .collect();
        assert_eq!(
            directions,
            vec![
                ("A", sql::ast::OrderByDirection::Desc),
                ("B", sql::ast::OrderByDirection::Asc),
                ("C", sql::ast::OrderByDirection::Asc),
            ]
        );
        assert!(parse_order_by("A sideways").is_err());
        assert!(parse_order_by("A asc extra").is_err());
    }
}
