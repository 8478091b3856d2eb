use crate::core::Result;
use crate::metadata::EntityDefinition;
use std::sync::Mutex;

/// Receives the post-creation notification after backing tables commit.
pub trait NotificationSink: Send + Sync {
    fn entities_created(&self, entities: &[EntityDefinition]);
}

/// Default sink: writes one info line per created entity.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl NotificationSink for LogNotifier {
    fn entities_created(&self, entities: &[EntityDefinition]) {
        for entity in entities {
            log::info!("created backing table {} for {}", entity.table_name(), entity.key());
        }
    }
}

/// Keeps every notification, in order. Useful for embedding and tests.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    batches: Mutex<Vec<Vec<String>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// One entry per notification, each listing `app.entity` keys.
    pub fn batches(&self) -> Result<Vec<Vec<String>>> {
        Ok(self.batches.lock()?.clone())
    }
}

impl NotificationSink for RecordingNotifier {
    fn entities_created(&self, entities: &[EntityDefinition]) {
        let keys: Vec<String> = entities.iter().map(|e| e.key().to_string()).collect();
        match self.batches.lock() {
            Ok(mut batches) => batches.push(keys),
            Err(poisoned) => {
                log::warn!("notification log lock poisoned, recording anyway");
                poisoned.into_inner().push(keys);
            }
        }
    }
}
