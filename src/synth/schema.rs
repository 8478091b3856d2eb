use crate::core::{Record, ResolvedColumn, Value};
use crate::metadata::{EntityId, EntityKey, EntityStamp};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderingTerm {
    pub field: String,
    pub descending: bool,
}

/// Parses a comma-separated ordering spec; `-name` sorts descending.
///
/// An absent or empty spec yields `-id` (most recently created first).
pub fn parse_ordering(spec: Option<&str>) -> Vec<OrderingTerm> {
    let terms: Vec<OrderingTerm> = spec
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty() && *item != "-")
        .map(|item| {
            let (descending, name) = match item.strip_prefix('-') {
                Some(rest) => (true, rest.trim()),
                None => (false, item),
            };
            let field = if name == "pk" { "id" } else { name };
            OrderingTerm {
                field: field.to_string(),
                descending,
            }
        })
        .collect();

    if terms.is_empty() {
        return vec![OrderingTerm {
            field: "id".to_string(),
            descending: true,
        }];
    }
    terms
}

/// Human-readable label composition for records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelRule {
    /// Up to three generic text columns, in column order.
    pub columns: Vec<String>,
    /// Used when the entity has no text columns.
    pub fallback: String,
}

impl LabelRule {
    pub const MAX_COLUMNS: usize = 3;

    pub fn from_columns(columns: &[ResolvedColumn], fallback: &str) -> Self {
        Self {
            columns: columns
                .iter()
                .filter(|column| column.is_generic_text())
                .take(Self::MAX_COLUMNS)
                .map(|column| column.column.clone())
                .collect(),
            fallback: fallback.to_string(),
        }
    }

    pub fn label_for(&self, record: &Record) -> String {
        if self.columns.is_empty() {
            return self.fallback.clone();
        }
        self.columns
            .iter()
            .filter_map(|column| match record.get(column) {
                Some(Value::Null) | None => None,
                Some(value) => Some(value.to_string()),
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Resolved, cacheable projection of an entity definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthesizedSchema {
    pub entity_id: EntityId,
    pub app: String,
    pub entity: String,
    pub table: String,
    pub display_name: String,
    pub plural_display_name: String,
    /// `id` first, then one column per field in insertion order.
    pub columns: Vec<ResolvedColumn>,
    pub ordering: Vec<OrderingTerm>,
    pub label: LabelRule,
    pub stamp: EntityStamp,
}

impl SynthesizedSchema {
    pub fn key(&self) -> EntityKey {
        EntityKey::new(&self.app, &self.entity)
    }

    /// Finds a column by column name or field name.
    pub fn column(&self, name: &str) -> Option<&ResolvedColumn> {
        self.columns
            .iter()
            .find(|column| column.column == name)
            .or_else(|| self.columns.iter().find(|column| column.field == name))
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|column| column.column.clone()).collect()
    }

    /// Columns declared by fields (everything except `id`).
    pub fn field_columns(&self) -> impl Iterator<Item = &ResolvedColumn> {
        self.columns.iter().filter(|column| !column.is_identifier())
    }

    pub fn reference_columns(&self) -> impl Iterator<Item = &ResolvedColumn> {
        self.columns.iter().filter(|column| column.reference().is_some())
    }

    pub fn label_for(&self, record: &Record) -> String {
        self.label.label_for(record)
    }
}
