use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A foreign-key constraint that could not be emitted because its target
/// table did not exist yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingReference {
    pub table: String,
    pub column: String,
}

/// Deferred obligations keyed by target table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingReferences {
    by_target: BTreeMap<String, Vec<PendingReference>>,
}

impl PendingReferences {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an obligation; recording the same one twice is a no-op.
    pub fn record(&mut self, target: &str, table: &str, column: &str) {
        let entry = self.by_target.entry(target.to_string()).or_default();
        let pending = PendingReference {
            table: table.to_string(),
            column: column.to_string(),
        };
        if !entry.contains(&pending) {
            log::debug!("deferring {}.{} -> {}", table, column, target);
            entry.push(pending);
        }
    }

    /// Removes and returns every obligation waiting on `target`.
    pub fn take(&mut self, target: &str) -> Vec<PendingReference> {
        self.by_target.remove(target).unwrap_or_default()
    }

    /// Drops obligations owned by a column that no longer exists.
    pub fn forget_column(&mut self, table: &str, column: &str) {
        self.by_target.retain(|_, obligations| {
            obligations.retain(|p| !(p.table == table && p.column == column));
            !obligations.is_empty()
        });
    }

    pub fn waiting_on(&self, target: &str) -> &[PendingReference] {
        self.by_target.get(target).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn targets(&self) -> impl Iterator<Item = &str> {
        self.by_target.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_target.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_target.is_empty()
    }
}
