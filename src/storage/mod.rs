pub mod backend;
pub mod catalog;
pub mod memory;
pub mod parser;

pub use backend::{ColumnInfo, ForeignKeyInfo, IndexInfo, StorageBackend, TableInfo};
pub use catalog::TableCatalog;
pub use memory::MemoryBackend;
pub use parser::{DdlParser, DdlStatement};
