//! The EDMX schema document.

use std::fmt::Write;

use query_engine_metadata::metadata::{
    EntityModel, EntityType, CONTAINER_NAME, CONTAINER_NAMESPACE, NAMESPACE,
};

use super::{escape, EDMX_NS, EDM_NS, METADATA_NS, XML_PROLOG};

/// One schema with an `EntityType` per table and custom entity, then a schema holding
/// the default entity container.
pub fn render(model: &EntityModel) -> String {
    let mut out = String::from(XML_PROLOG);
    let _ = write!(
        out,
        "<edmx:Edmx Version=\"1.0\" xmlns:edmx=\"{EDMX_NS}\"><edmx:DataServices m:DataServiceVersion=\"2.0\" xmlns:m=\"{METADATA_NS}\"><Schema Namespace=\"{NAMESPACE}\" xmlns=\"{EDM_NS}\">"
    );
    for entity_type in &model.entity_types {
        write_entity_type(&mut out, entity_type);
    }
    let _ = write!(
        out,
        "</Schema><Schema Namespace=\"{CONTAINER_NAMESPACE}\" xmlns=\"{EDM_NS}\"><EntityContainer Name=\"{CONTAINER_NAME}\" m:IsDefaultEntityContainer=\"true\">"
    );
    for entity_type in &model.entity_types {
        let _ = write!(
            out,
            "<EntitySet Name=\"{}\" EntityType=\"{}\"/>",
            escape(&entity_type.entity_set_name),
            escape(&entity_type.qualified_name()),
        );
    }
    out.push_str("</EntityContainer></Schema></edmx:DataServices></edmx:Edmx>");
    out
}

fn write_entity_type(out: &mut String, entity_type: &EntityType) {
    let _ = write!(out, "<EntityType Name=\"{}\"><Key>", escape(&entity_type.name));
    for key in &entity_type.keys {
        let _ = write!(out, "<PropertyRef Name=\"{}\"/>", escape(key));
    }
    out.push_str("</Key>");
    for property in &entity_type.properties {
        let _ = write!(
            out,
            "<Property Name=\"{}\" Type=\"{}\" Nullable=\"{}\"",
            escape(&property.name),
            property.edm_type.name(),
            property.nullable,
        );
        if let Some(max_length) = property.max_length {
            let _ = write!(out, " MaxLength=\"{max_length}\"");
        }
        out.push_str("/>");
    }
    out.push_str("</EntityType>");
}

#[cfg(test)]
mod tests {
    use super::*;
    use query_engine_metadata::metadata::{EdmType, EntityProperty, EntitySource};

    #[test]
    fn single_table() {
        let entity_type = EntityType::new(
            "TableName1".to_string(),
            EntitySource::Table {
                schema: "main".to_string(),
                table: "Table_Name1".to_string(),
            },
            vec![
                EntityProperty {
                    name: "StrCol".to_string(),
                    column_name: "str_col".to_string(),
                    edm_type: EdmType::String,
                    nullable: true,
                    max_length: None,
                    ordinal: 2,
                },
                EntityProperty {
                    name: "Id".to_string(),
                    column_name: "id".to_string(),
                    edm_type: EdmType::Int32,
                    nullable: false,
                    max_length: Some(32),
                    ordinal: 1,
                },
            ],
            vec!["Id".to_string()],
        );
        let model = EntityModel::new(vec![entity_type], vec![]);
        similar_asserts::assert_eq!(
            render(&model),
            "<?xml version='1.0' encoding='utf-8'?><edmx:Edmx Version=\"1.0\" xmlns:edmx=\"http://schemas.microsoft.com/ado/2007/06/edmx\"><edmx:DataServices m:DataServiceVersion=\"2.0\" xmlns:m=\"http://schemas.microsoft.com/ado/2007/08/dataservices/metadata\"><Schema Namespace=\"JdbcModel\" xmlns=\"http://schemas.microsoft.com/ado/2008/09/edm\"><EntityType Name=\"TableName1\"><Key><PropertyRef Name=\"Id\"/></Key><Property Name=\"Id\" Type=\"Edm.Int32\" Nullable=\"false\" MaxLength=\"32\"/><Property Name=\"StrCol\" Type=\"Edm.String\" Nullable=\"true\"/></EntityType></Schema><Schema Namespace=\"JdbcEntities.Public\" xmlns=\"http://schemas.microsoft.com/ado/2008/09/edm\"><EntityContainer Name=\"Public\" m:IsDefaultEntityContainer=\"true\"><EntitySet Name=\"TableName1s\" EntityType=\"JdbcModel.TableName1\"/></EntityContainer></Schema></edmx:DataServices></edmx:Edmx>"
        );
    }
}
