//! The service document listing every entity set.

use std::fmt::Write;

use query_engine_metadata::metadata::EntityModel;
use serde_json::json;

use super::{escape, APP_NS, ATOM_NS, XML_PROLOG};

/// The Atom publishing workspace.
pub fn atom(model: &EntityModel, base_uri: &str) -> String {
    let mut out = String::from(XML_PROLOG);
    let _ = write!(
        out,
        "<service xmlns=\"{APP_NS}\" xml:base=\"{}\" xmlns:atom=\"{ATOM_NS}\" xmlns:app=\"{APP_NS}\"><workspace><atom:title>Default</atom:title>",
        escape(base_uri)
    );
    for entity_set in model.entity_set_names() {
        let entity_set = escape(entity_set);
        let _ = write!(
            out,
            "<collection href=\"{entity_set}\"><atom:title>{entity_set}</atom:title></collection>"
        );
    }
    out.push_str("</workspace></service>");
    out
}

/// `{"d":{"EntitySets":[…]}}`
pub fn json(model: &EntityModel) -> serde_json::Value {
    json!({ "d": { "EntitySets": model.entity_set_names().collect::<Vec<_>>() } })
}
