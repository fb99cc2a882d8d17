//! Error documents.

use axum::http::StatusCode;
use serde_json::json;

use super::{escape, Document, Format, METADATA_NS, XML_PROLOG};
use crate::error::ODataError;

const LANG: &str = "en-US";

/// Render `error` in the requested format. The underlying cause of a server error is
/// only included when `show_inline_error` is set.
pub fn render(
    error: &ODataError,
    format: Format,
    callback: Option<&str>,
    show_inline_error: bool,
) -> (StatusCode, Document) {
    let inner = error.inner_error().filter(|_| show_inline_error);
    let document = match format {
        Format::Json => {
            let mut body = json!({
                "error": {
                    "code": error.code(),
                    "message": { "lang": LANG, "value": error.to_string() },
                }
            });
            if let Some(inner) = inner {
                body["error"]["innererror"] = json!(inner);
            }
            Document::json(&body, callback)
        }
        Format::Atom | Format::Text => {
            let mut body = format!(
                "{XML_PROLOG}<error xmlns=\"{METADATA_NS}\"><code>{}</code><message lang=\"{LANG}\">{}</message>",
                error.code(),
                escape(&error.to_string()),
            );
            if let Some(inner) = inner {
                body.push_str("<innererror>");
                body.push_str(&escape(inner));
                body.push_str("</innererror>");
            }
            body.push_str("</error>");
            Document::xml(body)
        }
    };
    (error.status(), document)
}
