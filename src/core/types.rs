use super::Value;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Concrete column type understood by the storage backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StorageType {
    Varchar(u32),
    Text,
    Integer,
    BigInt,
    SmallInt,
    Double,
    Numeric { precision: u8, scale: u8 },
    Boolean,
    Date,
    Timestamp,
    Time,
    Uuid,
    Bytea,
}

impl StorageType {
    /// Whether a non-null value may be stored in a column of this type.
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => true,
            (Self::Integer | Self::BigInt | Self::SmallInt, Value::Integer(_)) => true,
            (Self::Double | Self::Numeric { .. }, Value::Integer(_) | Value::Float(_)) => true,
            (Self::Boolean, Value::Boolean(_)) => true,
            (
                Self::Varchar(_)
                | Self::Text
                | Self::Date
                | Self::Timestamp
                | Self::Time
                | Self::Uuid
                | Self::Bytea,
                Value::Text(_),
            ) => true,
            _ => false,
        }
    }

    /// Parses a raw default string into a value of this type.
    pub fn parse_literal(&self, raw: &str) -> Option<Value> {
        match self {
            Self::Integer | Self::BigInt | Self::SmallInt => raw.trim().parse().ok().map(Value::Integer),
            Self::Double | Self::Numeric { .. } => raw.trim().parse().ok().map(Value::Float),
            Self::Boolean => match raw.trim().to_ascii_lowercase().as_str() {
                "true" | "t" | "1" | "yes" => Some(Value::Boolean(true)),
                "false" | "f" | "0" | "no" => Some(Value::Boolean(false)),
                _ => None,
            },
            _ => Some(Value::Text(raw.to_string())),
        }
    }

    pub fn max_length(&self) -> Option<u32> {
        match self {
            Self::Varchar(len) => Some(*len),
            _ => None,
        }
    }
}

impl fmt::Display for StorageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Varchar(len) => write!(f, "VARCHAR({})", len),
            Self::Text => write!(f, "TEXT"),
            Self::Integer => write!(f, "INTEGER"),
            Self::BigInt => write!(f, "BIGINT"),
            Self::SmallInt => write!(f, "SMALLINT"),
            Self::Double => write!(f, "DOUBLE PRECISION"),
            Self::Numeric { precision, scale } => write!(f, "NUMERIC({}, {})", precision, scale),
            Self::Boolean => write!(f, "BOOLEAN"),
            Self::Date => write!(f, "DATE"),
            Self::Timestamp => write!(f, "TIMESTAMP"),
            Self::Time => write!(f, "TIME"),
            Self::Uuid => write!(f, "UUID"),
            Self::Bytea => write!(f, "BYTEA"),
        }
    }
}

/// Constraints carried from a field definition onto its resolved column.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ColumnConstraints {
    pub nullable: bool,
    pub blank: bool,
    pub unique: bool,
    pub default: Option<String>,
    pub help_text: Option<String>,
    pub max_length: Option<u32>,
}

/// Table a reference column points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceTarget {
    pub app: String,
    pub model: String,
    pub table: String,
    /// `true` when the target is a runtime-defined entity rather than a native type.
    pub dynamic: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ColumnKind {
    Identifier,
    Primitive { token: String, storage: StorageType },
    Reference { target: ReferenceTarget },
}

/// One column of a synthesized schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedColumn {
    /// Field definition name (`owner`).
    pub field: String,
    /// Physical column name (`owner_id` for references).
    pub column: String,
    pub display_name: String,
    pub kind: ColumnKind,
    pub constraints: ColumnConstraints,
    /// Why the declared type was replaced by the text fallback, if it was.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub degraded: Option<String>,
}

impl ResolvedColumn {
    pub fn identifier() -> Self {
        Self {
            field: "id".to_string(),
            column: "id".to_string(),
            display_name: "ID".to_string(),
            kind: ColumnKind::Identifier,
            constraints: ColumnConstraints {
                nullable: false,
                blank: true,
                unique: true,
                ..ColumnConstraints::default()
            },
            degraded: None,
        }
    }

    pub fn storage_type(&self) -> StorageType {
        match &self.kind {
            ColumnKind::Primitive { storage, .. } => storage.clone(),
            ColumnKind::Identifier | ColumnKind::Reference { .. } => StorageType::Integer,
        }
    }

    pub fn reference(&self) -> Option<&ReferenceTarget> {
        match &self.kind {
            ColumnKind::Reference { target } => Some(target),
            _ => None,
        }
    }

    pub fn is_identifier(&self) -> bool {
        matches!(self.kind, ColumnKind::Identifier)
    }

    /// Whether this column is the generic bounded text type.
    pub fn is_generic_text(&self) -> bool {
        matches!(&self.kind, ColumnKind::Primitive { token, .. } if token == crate::catalog::GENERIC_TEXT_TOKEN)
    }
}
