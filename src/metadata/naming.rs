use crate::core::{Result, SchemaError};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref SLUG: Regex = Regex::new(r"^[A-Za-z0-9_-]+$").expect("slug pattern is valid");
}

pub const MAX_APPLICATION_NAME: usize = 255;
pub const MAX_ENTITY_NAME: usize = 64;
pub const MAX_FIELD_NAME: usize = 64;

/// Validates a slug name (letters, digits, `_`, `-`).
pub fn validate_slug(kind: &str, name: &str, max_len: usize) -> Result<()> {
    if name.is_empty() || name.len() > max_len || !SLUG.is_match(name) {
        return Err(SchemaError::validation(
            name,
            format!(
                "{} name must be 1-{} letters, digits, '_' or '-'",
                kind, max_len
            ),
        ));
    }
    if name.eq_ignore_ascii_case("id") && kind == "field" {
        return Err(SchemaError::validation(name, "'id' is reserved for the identifier column"));
    }
    Ok(())
}

/// Converts non-alphanumeric characters to underscores and lowercases the result.
pub fn sanitize_sql_identifier(input: &str) -> String {
    let mut sanitized = String::with_capacity(input.len());
    for ch in input.chars() {
        if ch.is_ascii_alphanumeric() {
            sanitized.push(ch.to_ascii_lowercase());
        } else {
            sanitized.push('_');
        }
    }
    sanitized
}

/// Backing table name.
///
/// Format: `<app>_<entity>`
pub fn table_name(app: &str, entity: &str) -> String {
    format!(
        "{}_{}",
        sanitize_sql_identifier(app),
        sanitize_sql_identifier(entity)
    )
}

/// Format: `<table>_<column>`
pub fn index_name(table: &str, column: &str) -> String {
    format!("{}_{}", table, sanitize_sql_identifier(column))
}

/// Format: `fk_<table>_<column>_<target>`
pub fn foreign_key_name(table: &str, column: &str, target_table: &str) -> String {
    format!("fk_{}_{}_{}", table, sanitize_sql_identifier(column), target_table)
}
