use super::{SchemaSynthesizer, SynthesizedSchema};
use crate::core::{Result, SchemaError};
use crate::metadata::{EntityKey, EntityStamp};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

struct CacheEntry {
    stamp: EntityStamp,
    schema: Arc<SynthesizedSchema>,
}

/// Memoized schemas keyed by (application, entity).
///
/// An entry is served only while its stamp matches the store's current
/// stamp for that entity. No capacity bound, no TTL.
#[derive(Default)]
pub struct SynthesisCache {
    entries: RwLock<HashMap<EntityKey, CacheEntry>>,
}

impl SynthesisCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, app: &str, entity: &str, synthesizer: &SchemaSynthesizer<'_>) -> Result<Arc<SynthesizedSchema>> {
        let key = EntityKey::new(app, entity);

        let Some(current) = synthesizer.store().stamp(app, entity)? else {
            self.entries.write()?.remove(&key);
            return Err(SchemaError::NotFound(format!("entity {}.{}", app, entity)));
        };

        if let Some(entry) = self.entries.read()?.get(&key)
            && entry.stamp == current
        {
            return Ok(entry.schema.clone());
        }

        let schema = Arc::new(synthesizer.synthesize(app, entity)?);
        log::debug!("synthesized {} (version {})", key, schema.stamp.version);

        let mut entries = self.entries.write()?;
        // A concurrent reader may have stored an equally fresh entry; keep it.
        if let Some(existing) = entries.get(&key)
            && existing.stamp == schema.stamp
        {
            return Ok(existing.schema.clone());
        }
        entries.insert(
            key,
            CacheEntry {
                stamp: schema.stamp,
                schema: schema.clone(),
            },
        );
        Ok(schema)
    }

    pub fn invalidate(&self, app: &str, entity: &str) -> Result<()> {
        self.entries.write()?.remove(&EntityKey::new(app, entity));
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        self.entries.write()?.clear();
        Ok(())
    }

    pub fn contains(&self, app: &str, entity: &str) -> Result<bool> {
        Ok(self.entries.read()?.contains_key(&EntityKey::new(app, entity)))
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.entries.read()?.len())
    }
}
