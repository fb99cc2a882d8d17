//! Decoding entity payloads: a JSON object, or an Atom `<entry>` whose
//! `<m:properties>` hold the values.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde_json::Value;

use query_engine_metadata::metadata::EdmType;
use query_engine_translation::translation::mutation::Payload;

use crate::error::ODataError;

/// Decode a request body into property values. An empty body has no properties.
pub fn decode(content_type: Option<&str>, body: &str) -> Result<Payload, ODataError> {
    let body = body.trim();
    if body.is_empty() {
        return Ok(Payload::new());
    }
    let json = content_type.is_some_and(|content_type| content_type.contains("json"));
    if json || body.starts_with('{') {
        decode_json(body)
    } else if body.starts_with('<') {
        decode_atom(body)
    } else {
        Err(ODataError::BadRequest("Unsupported entity payload".to_string()))
    }
}

/// Accepts a bare object or one wrapped in `{"d": …}`. `__metadata` is ignored.
fn decode_json(body: &str) -> Result<Payload, ODataError> {
    let value: Value = serde_json::from_str(body)
        .map_err(|error| ODataError::BadRequest(format!("Invalid JSON payload: {error}")))?;
    let object = match value {
        Value::Object(mut object) => match object.remove("d") {
            Some(Value::Object(inner)) => inner,
            Some(other) => {
                object.insert("d".to_string(), other);
                object
            }
            None => object,
        },
        _ => {
            return Err(ODataError::BadRequest(
                "Invalid JSON payload: expected an object".to_string(),
            ))
        }
    };
    Ok(object
        .into_iter()
        .filter(|(name, _)| name != "__metadata")
        .collect())
}

/// An element under `<m:properties>` being read.
struct OpenProperty {
    name: String,
    edm_type: Option<EdmType>,
    null: bool,
    text: String,
}

fn decode_atom(body: &str) -> Result<Payload, ODataError> {
    let invalid = |error: quick_xml::Error| ODataError::BadRequest(format!("Invalid Atom payload: {error}"));

    let mut reader = Reader::from_str(body);
    reader.config_mut().trim_text(true);

    let mut payload = Payload::new();
    let mut in_properties = false;
    let mut open: Option<OpenProperty> = None;

    loop {
        match reader.read_event().map_err(invalid)? {
            Event::Start(start) if start.local_name().as_ref() == b"properties" => {
                in_properties = true;
            }
            Event::Start(start) if in_properties && open.is_none() => {
                open = Some(open_property(&start)?);
            }
            Event::Empty(start) if in_properties => {
                let property = open_property(&start)?;
                payload.insert(property.name.clone(), property_value(property));
            }
            Event::Text(text) => {
                if let Some(property) = open.as_mut() {
                    property.text.push_str(&text.unescape().map_err(invalid)?);
                }
            }
            Event::CData(data) => {
                if let Some(property) = open.as_mut() {
                    property.text.push_str(&String::from_utf8_lossy(&data));
                }
            }
            Event::End(end) if end.local_name().as_ref() == b"properties" => {
                in_properties = false;
            }
            Event::End(end) => {
                let closes_open = open
                    .as_ref()
                    .is_some_and(|property| end.local_name().as_ref() == property.name.as_bytes());
                if closes_open {
                    if let Some(property) = open.take() {
                        payload.insert(property.name.clone(), property_value(property));
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(payload)
}

fn open_property(start: &BytesStart) -> Result<OpenProperty, ODataError> {
    let mut property = OpenProperty {
        name: String::from_utf8_lossy(start.local_name().as_ref()).into_owned(),
        edm_type: None,
        null: false,
        text: String::new(),
    };
    for attribute in start.attributes() {
        let attribute = attribute
            .map_err(|error| ODataError::BadRequest(format!("Invalid Atom payload: {error}")))?;
        let value = attribute
            .unescape_value()
            .map_err(|error| ODataError::BadRequest(format!("Invalid Atom payload: {error}")))?;
        match attribute.key.local_name().as_ref() {
            b"type" => property.edm_type = EdmType::from_name(&value),
            b"null" => property.null = value == "true",
            _ => {}
        }
    }
    Ok(property)
}

/// Text is typed by `m:type`. Empty elements are empty strings, or null when typed as
/// anything but a string.
fn property_value(property: OpenProperty) -> Value {
    if property.null {
        return Value::Null;
    }
    let text = property.text;
    match property.edm_type {
        None | Some(EdmType::String) => Value::String(text),
        Some(_) if text.is_empty() => Value::Null,
        Some(EdmType::Boolean) => match text.as_str() {
            "true" | "1" => Value::Bool(true),
            "false" | "0" => Value::Bool(false),
            _ => Value::String(text),
        },
        Some(EdmType::Byte | EdmType::Int16 | EdmType::Int32 | EdmType::Int64) => {
            text.parse::<i64>().map_or(Value::String(text), Value::from)
        }
        Some(EdmType::Double | EdmType::Single | EdmType::Decimal) => text
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .map_or(Value::String(text), Value::from),
        Some(EdmType::DateTime | EdmType::Binary) => Value::String(text),
    }
}
