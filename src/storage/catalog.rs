use super::backend::{ColumnInfo, ForeignKeyInfo, IndexInfo, TableInfo};
use super::parser::DdlStatement;
use crate::core::{Result, SchemaError};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Live table structure held by the in-memory backend.
///
/// Immutable once built; every change returns a new catalog, so a clone is
/// a consistent snapshot for transaction rollback.
#[derive(Clone, Default)]
pub struct TableCatalog {
    tables: Arc<BTreeMap<String, TableInfo>>,
}

fn rejected(message: String) -> SchemaError {
    SchemaError::StorageUnavailable(message)
}

impl TableCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_table(&self, name: &str) -> Option<&TableInfo> {
        self.tables.get(name)
    }

    pub fn table_exists(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    pub fn list_tables(&self) -> Vec<&str> {
        self.tables.keys().map(|s| s.as_str()).collect()
    }

    /// Apply one statement, returning the new catalog.
    pub fn apply(self, statement: DdlStatement) -> Result<Self> {
        match statement {
            DdlStatement::CreateTable {
                table,
                columns,
                foreign_keys,
                if_not_exists,
            } => {
                if self.table_exists(&table) {
                    if if_not_exists {
                        return Ok(self);
                    }
                    return Err(rejected(format!("relation \"{}\" already exists", table)));
                }
                self.with_table(table, columns, foreign_keys)
            }
            DdlStatement::AddColumn {
                table,
                column,
                foreign_key,
            } => self.with_column(&table, column, foreign_key),
            DdlStatement::DropColumn { table, column } => self.without_column(&table, &column),
            DdlStatement::AddForeignKey { table, foreign_key } => self.with_foreign_key(&table, foreign_key),
            DdlStatement::CreateIndex {
                name,
                table,
                columns,
                unique,
                if_not_exists,
            } => self.with_index(&table, IndexInfo { name, columns, unique }, if_not_exists),
            DdlStatement::DropTable { table, if_exists } => self.without_table(&table, if_exists),
        }
    }

    fn with_table(self, name: String, columns: Vec<ColumnInfo>, foreign_keys: Vec<ForeignKeyInfo>) -> Result<Self> {
        for (i, column) in columns.iter().enumerate() {
            if columns[..i].iter().any(|other| other.name == column.name) {
                return Err(rejected(format!(
                    "column \"{}\" specified more than once",
                    column.name
                )));
            }
        }

        let draft = TableInfo {
            name: name.clone(),
            columns,
            foreign_keys: Vec::new(),
            indexes: Vec::new(),
        };
        for fk in &foreign_keys {
            self.check_foreign_key(&draft, fk)?;
        }

        let mut new_tables = (*self.tables).clone();
        new_tables.insert(name, TableInfo { foreign_keys, ..draft });
        Ok(Self {
            tables: Arc::new(new_tables),
        })
    }

    fn with_column(self, table: &str, column: ColumnInfo, foreign_key: Option<ForeignKeyInfo>) -> Result<Self> {
        let mut info = self.require(table)?.clone();
        if info.column(&column.name).is_some() {
            return Err(rejected(format!(
                "column \"{}\" of relation \"{}\" already exists",
                column.name, table
            )));
        }
        info.columns.push(column);
        if let Some(fk) = foreign_key {
            self.check_foreign_key(&info, &fk)?;
            info.foreign_keys.push(fk);
        }
        Ok(self.replace(info))
    }

    fn without_column(self, table: &str, column: &str) -> Result<Self> {
        let mut info = self.require(table)?.clone();
        if info.column(column).is_none() {
            return Err(rejected(format!(
                "column \"{}\" of relation \"{}\" does not exist",
                column, table
            )));
        }
        if info.column(column).is_some_and(|c| c.primary_key) {
            return Err(rejected(format!("cannot drop primary key column \"{}\"", column)));
        }
        if let Some(dependent) = self.dependent_on(table, Some(column)) {
            return Err(rejected(format!(
                "column \"{}\" of relation \"{}\" is referenced by \"{}\"",
                column, table, dependent
            )));
        }

        info.columns.retain(|c| c.name != column);
        info.foreign_keys.retain(|fk| fk.column != column);
        info.indexes.retain(|index| !index.columns.iter().any(|c| c == column));
        Ok(self.replace(info))
    }

    fn with_foreign_key(self, table: &str, fk: ForeignKeyInfo) -> Result<Self> {
        let mut info = self.require(table)?.clone();
        if let Some(name) = &fk.name
            && info.foreign_keys.iter().any(|existing| existing.name.as_ref() == Some(name))
        {
            return Err(rejected(format!(
                "constraint \"{}\" for relation \"{}\" already exists",
                name, table
            )));
        }
        self.check_foreign_key(&info, &fk)?;
        info.foreign_keys.push(fk);
        Ok(self.replace(info))
    }

    fn with_index(self, table: &str, index: IndexInfo, if_not_exists: bool) -> Result<Self> {
        if self
            .tables
            .values()
            .any(|t| t.indexes.iter().any(|existing| existing.name == index.name))
        {
            if if_not_exists {
                return Ok(self);
            }
            return Err(rejected(format!("relation \"{}\" already exists", index.name)));
        }

        let mut info = self.require(table)?.clone();
        for column in &index.columns {
            if info.column(column).is_none() {
                return Err(rejected(format!("column \"{}\" does not exist", column)));
            }
        }
        info.indexes.push(index);
        Ok(self.replace(info))
    }

    fn without_table(self, table: &str, if_exists: bool) -> Result<Self> {
        if !self.table_exists(table) {
            if if_exists {
                return Ok(self);
            }
            return Err(rejected(format!("table \"{}\" does not exist", table)));
        }
        if let Some(dependent) = self.dependent_on(table, None) {
            return Err(rejected(format!(
                "cannot drop table {} because {} depends on it",
                table, dependent
            )));
        }

        let mut new_tables = (*self.tables).clone();
        new_tables.remove(table);
        Ok(Self {
            tables: Arc::new(new_tables),
        })
    }

    fn require(&self, table: &str) -> Result<&TableInfo> {
        self.tables
            .get(table)
            .ok_or_else(|| rejected(format!("relation \"{}\" does not exist", table)))
    }

    fn replace(self, info: TableInfo) -> Self {
        let mut new_tables = (*self.tables).clone();
        new_tables.insert(info.name.clone(), info);
        Self {
            tables: Arc::new(new_tables),
        }
    }

    /// `owner` may be the table being built, which makes self-references legal.
    fn check_foreign_key(&self, owner: &TableInfo, fk: &ForeignKeyInfo) -> Result<()> {
        if owner.column(&fk.column).is_none() {
            return Err(rejected(format!(
                "column \"{}\" referenced in foreign key constraint does not exist",
                fk.column
            )));
        }
        let target = if fk.target_table == owner.name {
            owner
        } else {
            self.require(&fk.target_table)?
        };
        if target.column(&fk.target_column).is_none() {
            return Err(rejected(format!(
                "column \"{}\" of relation \"{}\" does not exist",
                fk.target_column, fk.target_table
            )));
        }
        Ok(())
    }

    /// First other table whose foreign key points at `table` (and `column`, if given).
    fn dependent_on(&self, table: &str, column: Option<&str>) -> Option<String> {
        self.tables
            .values()
            .filter(|t| t.name != table)
            .flat_map(|t| t.foreign_keys.iter().map(move |fk| (t, fk)))
            .find(|(_, fk)| fk.target_table == table && column.is_none_or(|c| fk.target_column == c))
            .map(|(t, _)| t.name.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::parser::DdlParser;

    fn apply_all(catalog: TableCatalog, sql: &str) -> Result<TableCatalog> {
        DdlParser::new()
            .parse(sql)?
            .into_iter()
            .try_fold(catalog, |catalog, stmt| catalog.apply(stmt))
    }

    #[test]
    fn test_catalog_is_copy_on_write() {
        let base = apply_all(TableCatalog::new(), "CREATE TABLE a (id INTEGER PRIMARY KEY)").unwrap();
        let snapshot = base.clone();
        let next = apply_all(base, "CREATE TABLE b (id INTEGER PRIMARY KEY)").unwrap();

        assert_eq!(snapshot.list_tables(), vec!["a"]);
        assert_eq!(next.list_tables(), vec!["a", "b"]);
    }

    #[test]
    fn test_foreign_key_target_must_exist_except_self() {
        assert!(apply_all(
            TableCatalog::new(),
            "CREATE TABLE node (id INTEGER PRIMARY KEY, parent_id INTEGER REFERENCES other (id))"
        )
        .is_err());

        let catalog = apply_all(
            TableCatalog::new(),
            "CREATE TABLE node (id INTEGER PRIMARY KEY, parent_id INTEGER REFERENCES node (id))",
        )
        .unwrap();
        let node = catalog.get_table("node").unwrap();
        assert_eq!(node.foreign_key("parent_id").unwrap().target_table, "node");
    }

    #[test]
    fn test_drop_column_removes_dependent_index() {
        let catalog = apply_all(
            TableCatalog::new(),
            "CREATE TABLE t (id INTEGER PRIMARY KEY, c INTEGER); CREATE INDEX t_c ON t (c); ALTER TABLE t DROP COLUMN c",
        )
        .unwrap();
        let t = catalog.get_table("t").unwrap();
        assert!(t.column("c").is_none());
        assert!(t.indexes.is_empty());

        // the index name is free again
        assert!(apply_all(catalog, "ALTER TABLE t ADD COLUMN c INTEGER; CREATE INDEX t_c ON t (c)").is_ok());
    }

    #[test]
    fn test_duplicate_index_name_rejected() {
        let catalog = apply_all(
            TableCatalog::new(),
            "CREATE TABLE t (id INTEGER PRIMARY KEY, c INTEGER); CREATE INDEX t_c ON t (c)",
        )
        .unwrap();
        assert!(matches!(
            apply_all(catalog, "CREATE INDEX t_c ON t (id)"),
            Err(SchemaError::StorageUnavailable(_))
        ));
    }

    #[test]
    fn test_drop_referenced_table_rejected() {
        let catalog = apply_all(
            TableCatalog::new(),
            "CREATE TABLE a (id INTEGER PRIMARY KEY); CREATE TABLE b (id INTEGER PRIMARY KEY, a_id INTEGER REFERENCES a (id))",
        )
        .unwrap();
        assert!(apply_all(catalog.clone(), "DROP TABLE a").is_err());
        assert!(apply_all(catalog, "DROP TABLE b; DROP TABLE a").is_ok());
    }
}
