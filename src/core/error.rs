use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Unresolved field type '{token}' for field '{field}'")]
    UnresolvedFieldType { field: String, token: String },

    #[error("Failed to install index for {app}.{entity} ({column}): {reason}")]
    IndexInstallFailure {
        app: String,
        entity: String,
        column: String,
        reason: String,
    },

    #[error("Validation failed for field(s) {}: {message}", fields.join(", "))]
    ValidationFailure { fields: Vec<String>, message: String },

    #[error("'{0}' already exists")]
    DuplicateEntity(String),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("'{0}' not found")]
    NotFound(String),

    #[error("Lock error: {0}")]
    Lock(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl SchemaError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ValidationFailure {
            fields: vec![field.into()],
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SchemaError>;

impl<T> From<std::sync::PoisonError<T>> for SchemaError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::Lock(err.to_string())
    }
}

impl From<std::io::Error> for SchemaError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
