//! Literals from URLs and payload values, coerced to the type of the property they
//! are compared with or stored in.

use crate::translation::error::Error;
use query_engine_metadata::metadata::{EdmType, EntityProperty};
use query_engine_sql::sql;

/// A literal in a `$filter` expression or a key predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    String(String),
    Integer(i64),
    Decimal(f64),
    Boolean(bool),
    Null,
}

impl Literal {
    /// Parse a single literal: `'text'` (with `''` escapes), `datetime'…'`, `guid'…'`,
    /// `42`, `42L`, `1.5`, `1.5M`, `1.5d`, `true`, `false` or `null`.
    pub fn parse(text: &str) -> Option<Literal> {
        let text = text.trim();
        if let Some(quoted) = strip_type_prefix(text) {
            return parse_quoted(quoted).map(Literal::String);
        }
        match text {
            "true" => return Some(Literal::Boolean(true)),
            "false" => return Some(Literal::Boolean(false)),
            "null" => return Some(Literal::Null),
            _ => {}
        }
        let number = text.trim_end_matches(['L', 'l', 'M', 'm', 'D', 'd', 'F', 'f']);
        if let Ok(integer) = number.parse::<i64>() {
            if text.ends_with(['M', 'm', 'D', 'd', 'F', 'f']) {
                #[allow(clippy::cast_precision_loss)]
                return Some(Literal::Decimal(integer as f64));
            }
            return Some(Literal::Integer(integer));
        }
        if number.starts_with(|c: char| c.is_ascii_digit() || c == '-' || c == '.') {
            if let Ok(decimal) = number.parse::<f64>() {
                if decimal.is_finite() {
                    return Some(Literal::Decimal(decimal));
                }
            }
        }
        None
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Literal::String(s) => serde_json::Value::String(s.clone()),
            Literal::Integer(i) => serde_json::Value::from(*i),
            Literal::Decimal(d) => serde_json::Value::from(*d),
            Literal::Boolean(b) => serde_json::Value::Bool(*b),
            Literal::Null => serde_json::Value::Null,
        }
    }
}

/// `datetime'2014-01-01'` and `guid'…'` are treated as plain strings.
fn strip_type_prefix(text: &str) -> Option<&str> {
    if text.starts_with('\'') {
        return Some(text);
    }
    let quote = text.find('\'')?;
    let prefix = &text[..quote];
    if ["datetime", "datetimeoffset", "guid", "time", "X", "binary"]
        .iter()
        .any(|known| prefix.eq_ignore_ascii_case(known))
    {
        Some(&text[quote..])
    } else {
        None
    }
}

/// Unquote `'it''s'` into `it's`. The whole input must be one quoted string.
pub fn parse_quoted(text: &str) -> Option<String> {
    let inner = text.strip_prefix('\'')?.strip_suffix('\'')?;
    let mut result = String::with_capacity(inner.len());
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\'' {
            // a lone quote inside the literal ends it early
            if chars.next() != Some('\'') {
                return None;
            }
        }
        result.push(c);
    }
    Some(result)
}

/// Coerce a value to the type of a property.
pub fn coerce(property: &EntityProperty, value: &serde_json::Value) -> Result<serde_json::Value, Error> {
    use serde_json::Value;

    let invalid = || Error::InvalidPropertyValue {
        property: property.name.clone(),
        value: value.to_string(),
    };

    match (property.edm_type, value) {
        (_, Value::Null) => Ok(Value::Null),
        (_, Value::Array(_) | Value::Object(_)) => Err(invalid()),

        (EdmType::Byte | EdmType::Int16 | EdmType::Int32 | EdmType::Int64, Value::Number(n)) => {
            match (n.as_i64(), n.as_f64()) {
                (Some(i), _) => Ok(Value::from(i)),
                #[allow(clippy::cast_possible_truncation)]
                (None, Some(f)) if f.fract() == 0.0 && f.abs() < 9.0e15 => Ok(Value::from(f as i64)),
                _ => Err(invalid()),
            }
        }
        (EdmType::Byte | EdmType::Int16 | EdmType::Int32 | EdmType::Int64, Value::String(s)) => s
            .trim()
            .trim_end_matches(['L', 'l'])
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| invalid()),
        (EdmType::Byte | EdmType::Int16 | EdmType::Int32 | EdmType::Int64, Value::Bool(_)) => {
            Err(invalid())
        }

        (EdmType::Boolean, Value::Bool(b)) => Ok(Value::Bool(*b)),
        (EdmType::Boolean, Value::String(s)) => match s.trim() {
            "true" | "1" => Ok(Value::Bool(true)),
            "false" | "0" => Ok(Value::Bool(false)),
            _ => Err(invalid()),
        },
        (EdmType::Boolean, Value::Number(n)) => match n.as_i64() {
            Some(1) => Ok(Value::Bool(true)),
            Some(0) => Ok(Value::Bool(false)),
            _ => Err(invalid()),
        },

        (EdmType::Double | EdmType::Single | EdmType::Decimal, Value::Number(n)) => {
            Ok(Value::Number(n.clone()))
        }
        (EdmType::Double | EdmType::Single | EdmType::Decimal, Value::String(s)) => {
            let trimmed = s.trim().trim_end_matches(['M', 'm', 'D', 'd', 'F', 'f']);
            match trimmed.parse::<i64>() {
                Ok(i) => Ok(Value::from(i)),
                Err(_) => trimmed
                    .parse::<f64>()
                    .ok()
                    .and_then(serde_json::Number::from_f64)
                    .map(Value::Number)
                    .ok_or_else(invalid),
            }
        }
        (EdmType::Double | EdmType::Single | EdmType::Decimal, Value::Bool(_)) => Err(invalid()),

        (EdmType::String | EdmType::DateTime | EdmType::Binary, Value::String(s)) => {
            Ok(Value::String(s.clone()))
        }
        (EdmType::String | EdmType::DateTime | EdmType::Binary, Value::Number(n)) => {
            Ok(Value::String(n.to_string()))
        }
        (EdmType::String | EdmType::DateTime | EdmType::Binary, Value::Bool(b)) => {
            Ok(Value::String(b.to_string()))
        }
    }
}

/// A coerced value as a SQL expression. Strings and numbers become parameters.
pub fn to_sql_value(value: serde_json::Value) -> sql::ast::Expression {
    match value {
        serde_json::Value::Null => sql::ast::Expression::Value(sql::ast::Value::Null),
        serde_json::Value::String(s) => sql::ast::Expression::Value(sql::ast::Value::String(s)),
        other => sql::ast::Expression::Value(sql::ast::Value::JsonValue(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn property(edm_type: EdmType) -> EntityProperty {
        EntityProperty {
            name: "P".to_string(),
            column_name: "p".to_string(),
            edm_type,
            nullable: true,
            max_length: None,
            ordinal: 1,
        }
    }

    #[test]
    fn parse_literals() {
        assert_eq!(
            Literal::parse("'it''s'"),
            Some(Literal::String("it's".to_string()))
        );
        assert_eq!(Literal::parse("''"), Some(Literal::String(String::new())));
        assert_eq!(Literal::parse("42"), Some(Literal::Integer(42)));
        assert_eq!(Literal::parse("-7L"), Some(Literal::Integer(-7)));
        assert_eq!(Literal::parse("1.5M"), Some(Literal::Decimal(1.5)));
        assert_eq!(Literal::parse("true"), Some(Literal::Boolean(true)));
        assert_eq!(Literal::parse("null"), Some(Literal::Null));
        assert_eq!(
            Literal::parse("datetime'2014-01-01T00:00'"),
            Some(Literal::String("2014-01-01T00:00".to_string()))
        );
        assert_eq!(Literal::parse("'unterminated"), None);
        assert_eq!(Literal::parse("'a'b'"), None);
        assert_eq!(Literal::parse("StrCol"), None);
    }

    #[test]
    fn coerce_to_property_types() {
        assert_eq!(
            coerce(&property(EdmType::Int32), &json!("555")).unwrap(),
            json!(555)
        );
        assert_eq!(
            coerce(&property(EdmType::String), &json!(1)).unwrap(),
            json!("1")
        );
        assert_eq!(
            coerce(&property(EdmType::Boolean), &json!("false")).unwrap(),
            json!(false)
        );
        assert_eq!(
            coerce(&property(EdmType::Double), &json!("2.5")).unwrap(),
            json!(2.5)
        );
        assert!(coerce(&property(EdmType::Int32), &json!("abc")).is_err());
        assert!(coerce(&property(EdmType::Int32), &json!({"a": 1})).is_err());
        assert_eq!(
            coerce(&property(EdmType::Int64), &serde_json::Value::Null).unwrap(),
            serde_json::Value::Null
        );
    }
}
