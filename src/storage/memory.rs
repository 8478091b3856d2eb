use super::backend::{StorageBackend, TableInfo};
use super::catalog::TableCatalog;
use super::parser::DdlParser;
use crate::core::{Result, SchemaError};
use std::collections::BTreeSet;
use std::sync::Mutex;

#[derive(Default)]
struct BackendState {
    catalog: TableCatalog,
    /// Catalog as of `begin`, restored on rollback
    saved: Option<TableCatalog>,
    /// Every statement applied successfully, in order
    log: Vec<String>,
    log_mark: usize,
}

/// In-memory storage backend.
///
/// Tracks table structure only. DDL is parsed with sqlparser and checked
/// against the live catalog, so malformed or conflicting statements fail the
/// way a relational database would.
#[derive(Default)]
pub struct MemoryBackend {
    parser: DdlParser,
    state: Mutex<BackendState>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with pre-existing tables, e.g. native tables the registry references.
    pub fn with_tables(self, sql: &str) -> Result<Self> {
        self.execute_ddl(sql)?;
        Ok(self)
    }

    /// Statements applied and still in effect, oldest first.
    pub fn statements(&self) -> Result<Vec<String>> {
        Ok(self.state.lock()?.log.clone())
    }

    pub fn in_transaction(&self) -> Result<bool> {
        Ok(self.state.lock()?.saved.is_some())
    }
}

impl StorageBackend for MemoryBackend {
    fn list_tables(&self) -> Result<BTreeSet<String>> {
        let state = self.state.lock()?;
        Ok(state.catalog.list_tables().into_iter().map(String::from).collect())
    }

    fn execute_ddl(&self, statement: &str) -> Result<()> {
        let parsed = self.parser.parse(statement)?;

        let mut state = self.state.lock()?;
        let catalog = parsed
            .into_iter()
            .try_fold(state.catalog.clone(), |catalog, stmt| catalog.apply(stmt))?;
        state.catalog = catalog;
        state.log.push(statement.to_string());
        log::trace!("applied: {}", statement);
        Ok(())
    }

    fn begin(&self) -> Result<()> {
        let mut state = self.state.lock()?;
        if state.saved.is_some() {
            return Err(SchemaError::StorageUnavailable(
                "transaction already in progress".into(),
            ));
        }
        state.saved = Some(state.catalog.clone());
        state.log_mark = state.log.len();
        Ok(())
    }

    fn commit(&self) -> Result<()> {
        let mut state = self.state.lock()?;
        if state.saved.take().is_none() {
            return Err(SchemaError::StorageUnavailable("no transaction in progress".into()));
        }
        Ok(())
    }

    fn rollback(&self) -> Result<()> {
        let mut state = self.state.lock()?;
        let Some(saved) = state.saved.take() else {
            return Err(SchemaError::StorageUnavailable("no transaction in progress".into()));
        };
        state.catalog = saved;
        let mark = state.log_mark;
        state.log.truncate(mark);
        Ok(())
    }

    fn describe_table(&self, name: &str) -> Result<Option<TableInfo>> {
        Ok(self.state.lock()?.catalog.get_table(name).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rollback_restores_catalog_and_log() {
        let backend = MemoryBackend::new();
        backend.execute_ddl("CREATE TABLE a (id INTEGER PRIMARY KEY)").unwrap();

        backend.begin().unwrap();
        backend.execute_ddl("CREATE TABLE b (id INTEGER PRIMARY KEY)").unwrap();
        assert!(backend.table_exists("b").unwrap());
        backend.rollback().unwrap();

        assert!(!backend.table_exists("b").unwrap());
        assert_eq!(backend.statements().unwrap().len(), 1);
        assert!(!backend.in_transaction().unwrap());
    }

    #[test]
    fn test_commit_keeps_changes() {
        let backend = MemoryBackend::new();
        backend.begin().unwrap();
        backend.execute_ddl("CREATE TABLE a (id INTEGER PRIMARY KEY)").unwrap();
        backend.commit().unwrap();
        assert!(backend.table_exists("a").unwrap());
    }

    #[test]
    fn test_nested_begin_and_stray_commit_fail() {
        let backend = MemoryBackend::new();
        assert!(backend.commit().is_err());
        assert!(backend.rollback().is_err());
        backend.begin().unwrap();
        assert!(matches!(backend.begin(), Err(SchemaError::StorageUnavailable(_))));
    }

    #[test]
    fn test_failed_statement_leaves_catalog_untouched() {
        let backend = MemoryBackend::new()
            .with_tables("CREATE TABLE a (id INTEGER PRIMARY KEY)")
            .unwrap();
        assert!(backend.execute_ddl("CREATE TABLE a (id INTEGER PRIMARY KEY)").is_err());
        assert!(matches!(backend.execute_ddl("CREATE TABL a"), Err(SchemaError::Parse(_))));
        assert_eq!(backend.statements().unwrap().len(), 1);
        assert_eq!(backend.describe_table("a").unwrap().unwrap().columns.len(), 1);
    }
}
