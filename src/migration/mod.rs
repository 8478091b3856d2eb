pub mod ddl;
pub mod engine;
pub mod pending;

pub use engine::{MigrationEngine, MigrationReport};
pub use pending::{PendingReference, PendingReferences};
