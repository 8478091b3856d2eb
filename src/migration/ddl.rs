//! DDL text generation.
//!
//! Every identifier is double-quoted: field names may collide with SQL
//! keywords (`order`, `date`) and slugs may start with a digit.

use crate::core::ResolvedColumn;
use crate::metadata::naming;

pub fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

/// How a reference column's constraint is emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceMode {
    /// `REFERENCES target (id)` inline
    Inline,
    /// Column only; the constraint is added later
    Deferred,
}

fn column_definition(column: &ResolvedColumn, mode: ReferenceMode, enforce_null: bool) -> String {
    let mut sql = format!("{} {}", quote(&column.column), column.storage_type());

    if column.is_identifier() {
        sql.push_str(" PRIMARY KEY");
        return sql;
    }
    if enforce_null && !column.constraints.nullable {
        sql.push_str(" NOT NULL");
    }
    if column.constraints.unique {
        sql.push_str(" UNIQUE");
    }
    if let (Some(target), ReferenceMode::Inline) = (column.reference(), mode) {
        sql.push_str(&format!(" REFERENCES {} ({})", quote(&target.table), quote("id")));
    }
    sql
}

/// `CREATE TABLE`. `mode_for` decides per reference column whether its
/// constraint goes inline.
pub fn create_table<'a>(
    table: &str,
    columns: impl IntoIterator<Item = &'a ResolvedColumn>,
    mode_for: impl Fn(&ResolvedColumn) -> ReferenceMode,
) -> String {
    let definitions = columns
        .into_iter()
        .map(|column| column_definition(column, mode_for(column), true))
        .collect::<Vec<_>>();
    format!("CREATE TABLE {} ({})", quote(table), definitions.join(", "))
}

/// Never `NOT NULL`: existing rows start without a value.
pub fn add_column(table: &str, column: &ResolvedColumn, mode: ReferenceMode) -> String {
    format!(
        "ALTER TABLE {} ADD COLUMN {}",
        quote(table),
        column_definition(column, mode, false)
    )
}

pub fn drop_column(table: &str, column: &str) -> String {
    format!("ALTER TABLE {} DROP COLUMN {}", quote(table), quote(column))
}

pub fn add_foreign_key(table: &str, column: &str, target_table: &str) -> String {
    format!(
        "ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({})",
        quote(table),
        quote(&naming::foreign_key_name(table, column, target_table)),
        quote(column),
        quote(target_table),
        quote("id")
    )
}

pub fn create_index(table: &str, column: &str) -> String {
    format!(
        "CREATE INDEX {} ON {} ({})",
        quote(&naming::index_name(table, column)),
        quote(table),
        quote(column)
    )
}
