//! Entity keys: parsed from resource paths, rendered into entry ids, and turned into
//! predicates.

use crate::translation::error::Error;
use crate::translation::values::{self, Literal};
use query_engine_metadata::metadata::EntityType;
use query_engine_sql::sql;

/// The key of one entity: key property names and their typed values, in key order.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityKey(pub Vec<(String, serde_json::Value)>);

impl EntityKey {
    /// Parse the text between the parentheses of `EntitySet(…)`: `1`, `'abc'` or
    /// `Id=1,Name='x'`.
    pub fn parse(entity_type: &EntityType, text: &str) -> Result<EntityKey, Error> {
        let invalid = || Error::InvalidKey(text.to_string());
        let parts = split_top_level(text, ',');

        let named = parts.iter().any(|part| split_top_level(part, '=').len() == 2);
        let mut values = vec![];

        if named {
            for part in &parts {
                let pair = split_top_level(part, '=');
                let [name, literal] = pair.as_slice() else {
                    return Err(invalid());
                };
                let name = name.trim();
                if !entity_type.is_key(name) || values.iter().any(|(n, _)| n == name) {
                    return Err(invalid());
                }
                values.push((name.to_string(), literal.trim().to_string()));
            }
        } else {
            let [literal] = parts.as_slice() else {
                return Err(invalid());
            };
            let [key] = entity_type.keys.as_slice() else {
                return Err(invalid());
            };
            values.push((key.clone(), literal.trim().to_string()));
        }

        // order by key declaration, and require every key property
        let mut key = vec![];
        for property in entity_type.key_properties() {
            let (_, literal) = values
                .iter()
                .find(|(name, _)| *name == property.name)
                .ok_or_else(invalid)?;
            let literal = Literal::parse(literal).ok_or_else(invalid)?;
            if literal == Literal::Null {
                return Err(invalid());
            }
            let value = values::coerce(property, &literal.to_json()).map_err(|_| invalid())?;
            key.push((property.name.clone(), value));
        }
        Ok(EntityKey(key))
    }

    /// `(1)`, `('1')` or `(Id=1,Name='x')`.
    pub fn to_predicate_string(&self) -> String {
        let render = |value: &serde_json::Value| match value {
            serde_json::Value::String(s) => format!("'{}'", s.replace('\'', "''")),
            other => other.to_string(),
        };
        match self.0.as_slice() {
            [(_, value)] => format!("({})", render(value)),
            pairs => {
                let rendered: Vec<String> = pairs
                    .iter()
                    .map(|(name, value)| format!("{name}={}", render(value)))
                    .collect();
                format!("({})", rendered.join(","))
            }
        }
    }

    /// `key1 = $1 AND key2 = $2`, over the columns of `table`, or unqualified columns
    /// when there is no table reference (for single-table statements).
    pub fn to_sql_predicate(
        &self,
        entity_type: &EntityType,
        table: Option<&sql::ast::TableReference>,
    ) -> sql::ast::Expression {
        self.0
            .iter()
            .filter_map(|(name, value)| {
                let property = entity_type.property(name)?;
                let column = sql::ast::ColumnName(property.column_name.clone());
                let column = match table {
                    Some(table) => sql::ast::ColumnReference::TableColumn {
                        table: table.clone(),
                        name: column,
                    },
                    None => sql::ast::ColumnReference::Column(column),
                };
                Some(sql::ast::Expression::BinaryOperation {
                    left: Box::new(sql::ast::Expression::ColumnReference(column)),
                    operator: sql::ast::BinaryOperator::Equals,
                    right: Box::new(values::to_sql_value(value.clone())),
                })
            })
            .fold(sql::helpers::true_expr(), sql::helpers::and)
    }
}

/// Split on `separator` outside single-quoted strings.
fn split_top_level(text: &str, separator: char) -> Vec<String> {
    let mut parts = vec![];
    let mut current = String::new();
    let mut quoted = false;
    for c in text.chars() {
        if c == '\'' {
            quoted = !quoted;
        }
        if c == separator && !quoted {
            parts.push(std::mem::take(&mut current));
        } else {
            current.push(c);
        }
    }
    parts.push(current);
    parts
}
