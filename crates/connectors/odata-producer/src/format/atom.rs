//! Atom feeds and entries.

use std::fmt::Write;

use query_engine_execution::value::{PropertyValue, Row};
use query_engine_metadata::metadata::{EdmType, EntityType};

use super::{escape, now, row_key, Links, ATOM_NS, DATA_NS, METADATA_NS, SCHEME_NS, XML_PROLOG};

/// A feed of the rows of one entity set, with `<m:count>` when a count was requested.
pub fn feed(
    links: &Links,
    entity_type: &EntityType,
    rows: &[Row],
    projection: &[String],
    count: Option<u64>,
) -> String {
    let set = escape(&entity_type.entity_set_name);
    let mut out = String::from(XML_PROLOG);
    let _ = write!(
        out,
        "<feed {}><title type=\"text\">{set}</title><id>{}{set}</id><updated>{}</updated><link rel=\"self\" title=\"{set}\" href=\"{set}\"/>",
        namespaces(links),
        escape(links.base_uri),
        now(),
    );
    if let Some(count) = count {
        let _ = write!(out, "<m:count>{count}</m:count>");
    }
    for row in rows {
        write_entry(&mut out, links, entity_type, row, projection, false);
    }
    out.push_str("</feed>");
    out
}

/// A single entry, carrying its own namespace declarations.
pub fn entry(links: &Links, entity_type: &EntityType, row: &Row, projection: &[String]) -> String {
    let mut out = String::from(XML_PROLOG);
    write_entry(&mut out, links, entity_type, row, projection, true);
    out
}

fn namespaces(links: &Links) -> String {
    format!(
        "xmlns=\"{ATOM_NS}\" xmlns:m=\"{METADATA_NS}\" xmlns:d=\"{DATA_NS}\" xml:base=\"{}\"",
        escape(links.base_uri)
    )
}

fn write_entry(
    out: &mut String,
    links: &Links,
    entity_type: &EntityType,
    row: &Row,
    projection: &[String],
    standalone: bool,
) {
    let key = row_key(entity_type, row);
    let path = escape(&Links::entity_path(entity_type, &key)).into_owned();
    if standalone {
        let _ = write!(out, "<entry {}>", namespaces(links));
    } else {
        out.push_str("<entry>");
    }
    let _ = write!(
        out,
        "<id>{}</id><title type=\"text\"/><updated>{}</updated><author><name/></author><link rel=\"edit\" title=\"{}\" href=\"{path}\"/><category term=\"{}\" scheme=\"{SCHEME_NS}\"/><content type=\"application/xml\"><m:properties>",
        escape(&links.entity_uri(entity_type, &key)),
        now(),
        escape(&entity_type.name),
        escape(&entity_type.qualified_name()),
    );
    for name in projection {
        if let Some(value) = row.get(name) {
            write_property(out, name, value);
        }
    }
    out.push_str("</m:properties></content></entry>");
}

/// `<d:Name m:type="Edm.Int32">1</d:Name>`; strings carry no type, nulls are
/// `m:null="true"`.
fn write_property(out: &mut String, name: &str, property: &PropertyValue) {
    let type_attribute = match property.edm_type {
        EdmType::String => String::new(),
        edm_type => format!(" m:type=\"{}\"", edm_type.name()),
    };
    match &property.value {
        serde_json::Value::Null => {
            let _ = write!(out, "<d:{name}{type_attribute} m:null=\"true\"/>");
        }
        value => {
            let _ = write!(
                out,
                "<d:{name}{type_attribute}>{}</d:{name}>",
                escape(&literal(value))
            );
        }
    }
}

/// The text content of a non-null value.
pub(crate) fn literal(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
