use super::SynthesizedSchema;
use crate::core::{Record, Result, SchemaError, Value};

impl SynthesizedSchema {
    /// Checks a generic record against this schema.
    ///
    /// Every problem is collected; the error names all offending columns.
    pub fn validate_record(&self, record: &Record) -> Result<()> {
        let mut problems: Vec<(String, String)> = Vec::new();

        for key in record.keys() {
            if self.columns.iter().all(|column| &column.column != key) {
                problems.push((key.clone(), "unknown column".to_string()));
            }
        }

        for column in &self.columns {
            let value = record.get(&column.column).unwrap_or(&Value::Null);

            if column.is_identifier() {
                if !value.is_null() && value.as_i64().is_none() {
                    problems.push((column.column.clone(), "identifier must be an integer".to_string()));
                }
                continue;
            }

            if value.is_null() {
                if !column.constraints.nullable {
                    problems.push((column.column.clone(), "cannot be null".to_string()));
                }
                continue;
            }

            let storage = column.storage_type();
            if !storage.accepts(value) {
                problems.push((
                    column.column.clone(),
                    format!("expects {}, got {}", storage, value.type_name()),
                ));
                continue;
            }

            if let Some(text) = value.as_str() {
                if text.is_empty() && !column.constraints.blank {
                    problems.push((column.column.clone(), "cannot be blank".to_string()));
                }
                if let Some(max) = column.constraints.max_length
                    && text.chars().count() > max as usize
                {
                    problems.push((column.column.clone(), format!("longer than {} characters", max)));
                }
            }
        }

        if problems.is_empty() {
            return Ok(());
        }
        Err(SchemaError::ValidationFailure {
            message: problems
                .iter()
                .map(|(column, problem)| format!("{}: {}", column, problem))
                .collect::<Vec<_>>()
                .join("; "),
            fields: problems.into_iter().map(|(column, _)| column).collect(),
        })
    }

    /// Fills field defaults for absent columns, then validates.
    pub fn prepare_insert(&self, mut record: Record) -> Result<Record> {
        for column in self.field_columns() {
            if record.contains_key(&column.column) {
                continue;
            }
            let Some(raw) = column.constraints.default.as_deref() else {
                continue;
            };
            let value = column.storage_type().parse_literal(raw).ok_or_else(|| {
                SchemaError::validation(
                    column.column.clone(),
                    format!("default '{}' is not a valid {}", raw, column.storage_type()),
                )
            })?;
            record.insert(column.column.clone(), value);
        }

        self.validate_record(&record)?;
        Ok(record)
    }
}
