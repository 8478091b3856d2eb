pub mod error;
pub mod types;
pub mod value;

pub use error::{Result, SchemaError};
pub use types::{
    ColumnConstraints, ColumnKind, ReferenceTarget, ResolvedColumn, StorageType,
};
pub use value::{Record, Value};
