use crate::core::StorageType;
use lazy_static::lazy_static;
use serde::Serialize;
use std::collections::BTreeMap;

/// Length used for `text` in the static table; the resolver substitutes the
/// configured length.
pub const DEFAULT_TEXT_LENGTH: u32 = 255;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrimitiveType {
    pub token: &'static str,
    pub storage: StorageType,
    pub description: &'static str,
}

macro_rules! primitive_table {
    ($( $token:literal => $storage:expr, $description:literal; )*) => {{
        let mut table = BTreeMap::new();
        $(
            table.insert($token, PrimitiveType {
                token: $token,
                storage: $storage,
                description: $description,
            });
        )*
        table
    }};
}

lazy_static! {
    static ref PRIMITIVE_TYPES: BTreeMap<&'static str, PrimitiveType> = primitive_table! {
        "text" => StorageType::Varchar(DEFAULT_TEXT_LENGTH), "Bounded text";
        "longtext" => StorageType::Text, "Unbounded text";
        "slug" => StorageType::Varchar(50), "Slug";
        "email" => StorageType::Varchar(254), "Email address";
        "url" => StorageType::Varchar(200), "URL";
        "integer" => StorageType::Integer, "Integer";
        "biginteger" => StorageType::BigInt, "Big integer";
        "smallinteger" => StorageType::SmallInt, "Small integer";
        "float" => StorageType::Double, "Floating point number";
        "decimal" => StorageType::Numeric { precision: 12, scale: 2 }, "Decimal number";
        "boolean" => StorageType::Boolean, "Boolean";
        "date" => StorageType::Date, "Date";
        "datetime" => StorageType::Timestamp, "Date and time";
        "time" => StorageType::Time, "Time";
        "uuid" => StorageType::Uuid, "UUID";
        "file" => StorageType::Varchar(100), "File path";
        "image" => StorageType::Varchar(100), "Image path";
        "binary" => StorageType::Bytea, "Raw binary data";
    };
}

/// Looks up a primitive type by its exact token.
pub fn primitive(token: &str) -> Option<&'static PrimitiveType> {
    PRIMITIVE_TYPES.get(token)
}

/// All primitive types, ordered by token.
pub fn primitive_types() -> impl Iterator<Item = &'static PrimitiveType> {
    PRIMITIVE_TYPES.values()
}
