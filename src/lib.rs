// ============================================================================
// Instant Schema Library
// ============================================================================
//
// Runtime-defined entities: metadata in, synthesized schemas and live
// storage migrations out.

pub mod binding;
pub mod catalog;
pub mod config;
pub mod core;
pub mod metadata;
pub mod migration;
pub mod notify;
pub mod registry;
pub mod resolver;
pub mod storage;
pub mod synth;

// Re-export main types for convenience
pub use binding::{AdminBinding, ApiBinding, NestedSerializer, admin_binding, api_binding};
pub use catalog::{ContentType, ContentTypeRegistry, MemoryContentTypes};
pub use config::RegistryConfig;
pub use crate::core::{
    ColumnConstraints, ColumnKind, Record, ReferenceTarget, ResolvedColumn, Result, SchemaError, StorageType,
    Value,
};
pub use metadata::{
    AdminSettings, ApiSettings, Application, EntityDefinition, EntityPatch, FieldDefinition, FieldPatch,
    MetadataStore, NewEntity, NewField, SnapshotFile,
};
pub use migration::{MigrationEngine, MigrationReport};
pub use notify::{LogNotifier, NotificationSink, RecordingNotifier};
pub use registry::{RegistryBuilder, SchemaRegistry};
pub use resolver::FieldTypeResolver;
pub use storage::{MemoryBackend, StorageBackend, TableInfo};
pub use synth::{SchemaSynthesizer, SynthesisCache, SynthesizedSchema};
