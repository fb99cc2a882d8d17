//! EDM primitive types and how database column types map onto them.

use enum_iterator::Sequence;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// The primitive types a property can have.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Sequence, Serialize, Deserialize, JsonSchema,
)]
pub enum EdmType {
    Binary,
    Boolean,
    Byte,
    DateTime,
    Decimal,
    Double,
    Int16,
    Int32,
    Int64,
    Single,
    String,
}

impl EdmType {
    /// The qualified name used in documents, such as `Edm.Int32`.
    pub fn name(self) -> &'static str {
        match self {
            EdmType::Binary => "Edm.Binary",
            EdmType::Boolean => "Edm.Boolean",
            EdmType::Byte => "Edm.Byte",
            EdmType::DateTime => "Edm.DateTime",
            EdmType::Decimal => "Edm.Decimal",
            EdmType::Double => "Edm.Double",
            EdmType::Int16 => "Edm.Int16",
            EdmType::Int32 => "Edm.Int32",
            EdmType::Int64 => "Edm.Int64",
            EdmType::Single => "Edm.Single",
            EdmType::String => "Edm.String",
        }
    }

    /// Parse a qualified name back into a type.
    pub fn from_name(name: &str) -> Option<EdmType> {
        enum_iterator::all::<EdmType>().find(|edm_type| edm_type.name() == name)
    }

    /// Map a declared SQL column type, such as `VARCHAR(256)` or `integer`, onto an EDM
    /// type. Unknown types are strings.
    pub fn from_sql_type(declared: &str) -> EdmType {
        let (base, _) = split_declared_type(declared);
        match base.as_str() {
            "INT" | "INTEGER" | "MEDIUMINT" => EdmType::Int32,
            "SMALLINT" => EdmType::Int16,
            "TINYINT" => EdmType::Byte,
            "BIGINT" => EdmType::Int64,
            "BOOLEAN" | "BOOL" | "BIT" => EdmType::Boolean,
            "REAL" | "DOUBLE" | "DOUBLE PRECISION" | "FLOAT" => EdmType::Double,
            "DECIMAL" | "NUMERIC" => EdmType::Decimal,
            "DATE" | "DATETIME" | "TIMESTAMP" => EdmType::DateTime,
            "BLOB" | "BINARY" | "VARBINARY" => EdmType::Binary,
            _ => EdmType::String,
        }
    }

    /// Map a `java.sql.Types` code, as found in exported custom entity declarations.
    pub fn from_type_code(code: i32) -> Option<EdmType> {
        match code {
            -7 | 16 => Some(EdmType::Boolean),
            -6 => Some(EdmType::Byte),
            5 => Some(EdmType::Int16),
            4 => Some(EdmType::Int32),
            -5 => Some(EdmType::Int64),
            6 | 8 => Some(EdmType::Double),
            7 => Some(EdmType::Single),
            2 | 3 => Some(EdmType::Decimal),
            91 | 92 | 93 => Some(EdmType::DateTime),
            -4 | -3 | -2 | 2004 => Some(EdmType::Binary),
            -16 | -15 | -9 | -1 | 1 | 12 | 2005 => Some(EdmType::String),
            _ => None,
        }
    }

    /// The size reported for a property when the declaration gives none.
    pub fn default_max_length(self) -> Option<u32> {
        match self {
            EdmType::Byte => Some(8),
            EdmType::Int16 => Some(16),
            EdmType::Int32 => Some(32),
            EdmType::Int64 => Some(64),
            _ => None,
        }
    }

    /// Whether values of this type are rendered without an `m:type` attribute and
    /// quoted in keys.
    pub fn is_string(self) -> bool {
        self == EdmType::String
    }

    pub fn is_integer(self) -> bool {
        matches!(
            self,
            EdmType::Byte | EdmType::Int16 | EdmType::Int32 | EdmType::Int64
        )
    }
}

/// Split `VARCHAR(256)` into `("VARCHAR", Some(256))`. The base is uppercased and its
/// whitespace collapsed.
pub fn split_declared_type(declared: &str) -> (String, Option<u32>) {
    let (base, size) = match declared.split_once('(') {
        None => (declared, None),
        Some((base, rest)) => {
            let size = rest
                .split(|c| c == ',' || c == ')')
                .next()
                .and_then(|size| size.trim().parse::<u32>().ok());
            (base, size)
        }
    };
    let base = base
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_ascii_uppercase();
    (base, size)
}
