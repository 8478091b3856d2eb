//! Type Catalog: built-in primitive storage types plus the registry of
//! externally known record types used to resolve reference tokens.

pub mod content_types;
pub mod primitives;

pub use content_types::{ContentType, ContentTypeRegistry, MemoryContentTypes};
pub use primitives::{PrimitiveType, primitive, primitive_types};

/// Token of the bounded text type used as the resolution fallback.
pub const GENERIC_TEXT_TOKEN: &str = "text";
