use crate::core::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::RwLock;

/// A registered record type, either native to the host system or backing a
/// runtime-defined entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentType {
    pub id: u64,
    pub app_label: String,
    pub model: String,
    pub display_name: String,
    /// Table of a native type. `None` for runtime-defined entities, whose
    /// table is derived from their definition.
    pub table: Option<String>,
}

/// Content-type registry contract.
///
/// `register` must be idempotent: registering an existing (app, model) pair
/// returns the existing record.
pub trait ContentTypeRegistry: Send + Sync {
    fn lookup(&self, app_label: &str, model: &str) -> Result<Option<ContentType>>;

    fn register(&self, app_label: &str, model: &str, display_name: &str) -> Result<ContentType>;

    /// Index query used by reference resolution: every entry whose model
    /// name matches, case-insensitively.
    fn find_by_model(&self, model: &str) -> Result<Vec<ContentType>>;

    fn all(&self) -> Result<Vec<ContentType>>;
}

#[derive(Default)]
struct Entries {
    by_key: BTreeMap<(String, String), ContentType>,
    next_id: u64,
}

/// In-memory content-type registry
#[derive(Default)]
pub struct MemoryContentTypes {
    entries: RwLock<Entries>,
}

impl MemoryContentTypes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a native type backed by an existing table.
    pub fn with_native(self, app_label: &str, model: &str, display_name: &str, table: &str) -> Self {
        if let Ok(mut entries) = self.entries.write() {
            let content_type = entries.insert(app_label, model, display_name);
            content_type.table = Some(table.to_string());
        }
        self
    }
}

impl Entries {
    fn insert(&mut self, app_label: &str, model: &str, display_name: &str) -> &mut ContentType {
        let key = (app_label.to_lowercase(), model.to_lowercase());
        let next_id = &mut self.next_id;
        self.by_key.entry(key.clone()).or_insert_with(|| {
            *next_id += 1;
            ContentType {
                id: *next_id,
                app_label: key.0,
                model: key.1,
                display_name: display_name.to_string(),
                table: None,
            }
        })
    }
}

impl ContentTypeRegistry for MemoryContentTypes {
    fn lookup(&self, app_label: &str, model: &str) -> Result<Option<ContentType>> {
        let entries = self.entries.read()?;
        let key = (app_label.to_lowercase(), model.to_lowercase());
        Ok(entries.by_key.get(&key).cloned())
    }

    fn register(&self, app_label: &str, model: &str, display_name: &str) -> Result<ContentType> {
        let mut entries = self.entries.write()?;
        Ok(entries.insert(app_label, model, display_name).clone())
    }

    fn find_by_model(&self, model: &str) -> Result<Vec<ContentType>> {
        let entries = self.entries.read()?;
        let model = model.to_lowercase();
        Ok(entries
            .by_key
            .values()
            .filter(|ct| ct.model == model)
            .cloned()
            .collect())
    }

    fn all(&self) -> Result<Vec<ContentType>> {
        let entries = self.entries.read()?;
        Ok(entries.by_key.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_is_idempotent() {
        let registry = MemoryContentTypes::new();
        let first = registry.register("tasks", "Task", "Task").unwrap();
        let second = registry.register("tasks", "task", "Another name").unwrap();

        assert_eq!(first, second);
        assert_eq!(second.display_name, "Task");
        assert_eq!(registry.all().unwrap().len(), 1);
    }

    #[test]
    fn test_native_types_carry_table() {
        let registry = MemoryContentTypes::new().with_native("auth", "user", "User", "auth_user");

        let found = registry.find_by_model("USER").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].table.as_deref(), Some("auth_user"));
        assert!(registry.lookup("tasks", "user").unwrap().is_none());
    }
}
