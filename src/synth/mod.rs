//! Schema synthesis: entity metadata -> `SynthesizedSchema`, plus the
//! versioned cache in front of it.

pub mod cache;
pub mod record;
pub mod schema;
pub mod synthesizer;

pub use cache::SynthesisCache;
pub use schema::{LabelRule, OrderingTerm, SynthesizedSchema, parse_ordering};
pub use synthesizer::SchemaSynthesizer;
