//! Metadata Store: applications, entity definitions and field definitions.
//!
//! Every mutation bumps the owning entity's version in the same critical
//! section that writes the record, so readers that observe new metadata also
//! observe the new version.

pub mod model;
pub mod naming;
pub mod snapshot;
pub mod store;

pub use model::{
    AdminSettings, ApiSettings, Application, EntityDefinition, EntityId, EntityKey, EntityPatch,
    FieldDefinition, FieldId, FieldPatch, NewEntity, NewField, split_list,
};
pub use snapshot::SnapshotFile;
pub use store::{EntityStamp, MetadataStore};
