//! Rendering of the documents the service produces: Atom feeds and entries, verbose
//! JSON, the EDMX schema, the service document and error documents.

pub mod atom;
pub mod error;
pub mod json;
pub mod metadata;
pub mod service_document;

use axum::http::header;
use axum::response::{IntoResponse, Response};

use query_engine_execution::value::Row;
use query_engine_metadata::metadata::EntityType;
use query_engine_translation::translation::key::EntityKey;

pub const ATOM_XML: &str = "application/atom+xml;charset=utf-8";
pub const XML: &str = "application/xml;charset=utf-8";
pub const JSON: &str = "application/json;charset=utf-8";
pub const JAVASCRIPT: &str = "text/javascript;charset=utf-8";
pub const TEXT: &str = "text/plain;charset=utf-8";

pub const DATA_SERVICE_VERSION_HEADER: &str = "DataServiceVersion";
pub const DATA_SERVICE_VERSION: &str = "1.0";

pub const XML_PROLOG: &str = "<?xml version='1.0' encoding='utf-8'?>";
pub const ATOM_NS: &str = "http://www.w3.org/2005/Atom";
pub const APP_NS: &str = "http://www.w3.org/2007/app";
pub const METADATA_NS: &str = "http://schemas.microsoft.com/ado/2007/08/dataservices/metadata";
pub const DATA_NS: &str = "http://schemas.microsoft.com/ado/2007/08/dataservices";
pub const SCHEME_NS: &str = "http://schemas.microsoft.com/ado/2007/08/dataservices/scheme";
pub const EDMX_NS: &str = "http://schemas.microsoft.com/ado/2007/06/edmx";
pub const EDM_NS: &str = "http://schemas.microsoft.com/ado/2008/09/edm";

/// The representation a client asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    #[default]
    Atom,
    Json,
    Text,
}

impl Format {
    /// `$format` takes precedence over the `Accept` header. Anything unrecognised is
    /// Atom.
    pub fn negotiate(format: Option<&str>, accept: Option<&str>) -> Format {
        match format.map(str::to_ascii_lowercase) {
            Some(format) if format.contains("json") => Format::Json,
            Some(format) if format.contains("text") => Format::Text,
            Some(_) => Format::Atom,
            None => match accept {
                Some(accept) if accept.to_ascii_lowercase().contains("json") => Format::Json,
                _ => Format::Atom,
            },
        }
    }
}

/// A rendered body with its content type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub content_type: &'static str,
    pub body: String,
}

impl Document {
    pub fn xml(body: String) -> Self {
        Document {
            content_type: XML,
            body,
        }
    }

    pub fn atom(body: String) -> Self {
        Document {
            content_type: ATOM_XML,
            body,
        }
    }

    pub fn text(body: String) -> Self {
        Document {
            content_type: TEXT,
            body,
        }
    }

    /// A JSON body, wrapped as `callback(…)` for JSONP when a callback is given.
    pub fn json(value: &serde_json::Value, callback: Option<&str>) -> Self {
        match callback {
            Some(callback) if !callback.is_empty() => Document {
                content_type: JAVASCRIPT,
                body: format!("{callback}({value})"),
            },
            _ => Document {
                content_type: JSON,
                body: value.to_string(),
            },
        }
    }
}

impl IntoResponse for Document {
    fn into_response(self) -> Response {
        (
            [
                (header::CONTENT_TYPE, self.content_type),
                (
                    header::HeaderName::from_static("dataserviceversion"),
                    DATA_SERVICE_VERSION,
                ),
            ],
            self.body,
        )
            .into_response()
    }
}

/// Where entries live: the service root every relative link resolves against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Links<'a> {
    /// Ends with `/`.
    pub base_uri: &'a str,
}

impl Links<'_> {
    /// `TableName1s(1)`
    pub fn entity_path(entity_type: &EntityType, key: &EntityKey) -> String {
        format!("{}{}", entity_type.entity_set_name, key.to_predicate_string())
    }

    /// `http://host/OData.svc/TableName1s(1)`
    pub fn entity_uri(&self, entity_type: &EntityType, key: &EntityKey) -> String {
        format!("{}{}", self.base_uri, Self::entity_path(entity_type, key))
    }
}

/// The key of a decoded row. Key properties are always read, whatever `$select` says.
pub fn row_key(entity_type: &EntityType, row: &Row) -> EntityKey {
    EntityKey(
        entity_type
            .keys
            .iter()
            .map(|key| {
                let value = row
                    .get(key)
                    .map_or(serde_json::Value::Null, |property| property.value.clone());
                (key.clone(), value)
            })
            .collect(),
    )
}

/// Timestamps of `<updated>` elements.
pub(crate) fn now() -> String {
    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

pub(crate) fn escape(text: &str) -> std::borrow::Cow<'_, str> {
    quick_xml::escape::escape(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negotiation() {
        assert_eq!(Format::negotiate(None, None), Format::Atom);
        assert_eq!(Format::negotiate(Some("json"), None), Format::Json);
        assert_eq!(Format::negotiate(Some("JSON"), Some("application/xml")), Format::Json);
        assert_eq!(Format::negotiate(Some("text"), None), Format::Text);
        assert_eq!(Format::negotiate(Some("atom"), Some("application/json")), Format::Atom);
        assert_eq!(
            Format::negotiate(None, Some("application/json, text/javascript")),
            Format::Json
        );
    }

    #[test]
    fn jsonp_wraps_the_body() {
        let value = serde_json::json!({"d": 1});
        assert_eq!(
            Document::json(&value, Some("cb")),
            Document {
                content_type: JAVASCRIPT,
                body: "cb({\"d\":1})".to_string()
            }
        );
        assert_eq!(Document::json(&value, None).content_type, JSON);
    }
}
