use crate::binding::{self, AdminBinding, ApiBinding};
use crate::catalog::{ContentTypeRegistry, MemoryContentTypes};
use crate::config::RegistryConfig;
use crate::core::{ResolvedColumn, Result, SchemaError};
use crate::metadata::naming::{self, MAX_FIELD_NAME};
use crate::metadata::{
    AdminSettings, ApiSettings, Application, EntityDefinition, EntityPatch, FieldDefinition, FieldPatch,
    MetadataStore, NewEntity, NewField, SnapshotFile,
};
use crate::migration::{MigrationEngine, MigrationReport};
use crate::notify::{LogNotifier, NotificationSink};
use crate::resolver::FieldTypeResolver;
use crate::storage::{MemoryBackend, StorageBackend};
use crate::synth::{SchemaSynthesizer, SynthesisCache, SynthesizedSchema};
use std::sync::{Arc, Mutex};

/// Entry point for defining entities at runtime.
///
/// Every mutation runs under one registry-wide lock: metadata is written
/// first, then storage is migrated, then the cache entry is invalidated
/// before the lock is released.
///
/// # Examples
///
/// ```
/// use instantschema::{NewEntity, NewField, SchemaRegistry};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let registry = SchemaRegistry::in_memory();
/// registry.create_application("tasks", "Tasks")?;
/// registry.define_entity("tasks", NewEntity::new("Task").field(NewField::new("title", "text")))?;
///
/// let schema = registry.schema("tasks", "Task")?;
/// assert_eq!(schema.table, "tasks_task");
/// assert_eq!(schema.column_names(), vec!["id", "title"]);
/// # Ok(())
/// # }
/// ```
pub struct SchemaRegistry {
    config: RegistryConfig,
    store: MetadataStore,
    content_types: Arc<dyn ContentTypeRegistry>,
    engine: MigrationEngine,
    cache: SynthesisCache,
    mutation: Mutex<()>,
}

/// Builder for [`SchemaRegistry`]. Unset collaborators default to the
/// in-memory implementations.
#[derive(Default)]
pub struct RegistryBuilder {
    config: RegistryConfig,
    store: Option<MetadataStore>,
    content_types: Option<Arc<dyn ContentTypeRegistry>>,
    backend: Option<Arc<dyn StorageBackend>>,
    notifier: Option<Arc<dyn NotificationSink>>,
}

impl RegistryBuilder {
    pub fn config(mut self, config: RegistryConfig) -> Self {
        self.config = config;
        self
    }

    /// Start from existing metadata, e.g. a loaded snapshot
    pub fn store(mut self, store: MetadataStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn content_types(mut self, content_types: Arc<dyn ContentTypeRegistry>) -> Self {
        self.content_types = Some(content_types);
        self
    }

    pub fn backend(mut self, backend: Arc<dyn StorageBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn NotificationSink>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn build(self) -> SchemaRegistry {
        let content_types = self
            .content_types
            .unwrap_or_else(|| Arc::new(MemoryContentTypes::new()));
        let backend = self.backend.unwrap_or_else(|| Arc::new(MemoryBackend::new()));
        let notifier = self.notifier.unwrap_or_else(|| Arc::new(LogNotifier));

        SchemaRegistry {
            engine: MigrationEngine::new(self.config.clone(), backend, content_types.clone(), notifier),
            config: self.config,
            store: self.store.unwrap_or_default(),
            content_types,
            cache: SynthesisCache::new(),
            mutation: Mutex::new(()),
        }
    }
}

impl SchemaRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Registry over an empty in-memory backend and content-type registry.
    pub fn in_memory() -> Self {
        Self::builder().build()
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn store(&self) -> &MetadataStore {
        &self.store
    }

    pub fn engine(&self) -> &MigrationEngine {
        &self.engine
    }

    pub fn backend(&self) -> &Arc<dyn StorageBackend> {
        self.engine.backend()
    }

    pub fn content_types(&self) -> &Arc<dyn ContentTypeRegistry> {
        &self.content_types
    }

    pub fn cache(&self) -> &SynthesisCache {
        &self.cache
    }

    fn synthesizer(&self) -> SchemaSynthesizer<'_> {
        SchemaSynthesizer::new(
            &self.store,
            FieldTypeResolver::new(&self.config, self.content_types.as_ref(), &self.store),
        )
    }

    // ------------------------------------------------------------------
    // Applications
    // ------------------------------------------------------------------

    pub fn create_application(&self, name: &str, display_name: &str) -> Result<Application> {
        let _guard = self.mutation.lock()?;
        self.store.create_application(name, display_name)
    }

    pub fn update_application(&self, name: &str, display_name: &str) -> Result<Application> {
        let _guard = self.mutation.lock()?;
        self.store.update_application(name, display_name)
    }

    /// Removes the application's metadata. Backing tables stay in place.
    pub fn delete_application(&self, name: &str) -> Result<Vec<EntityDefinition>> {
        let _guard = self.mutation.lock()?;
        let removed = self.store.remove_application(name)?;
        for entity in &removed {
            self.cache.invalidate(&entity.app, &entity.name)?;
        }
        Ok(removed)
    }

    // ------------------------------------------------------------------
    // Entities
    // ------------------------------------------------------------------

    /// Records the entity and its fields, then creates its backing table.
    ///
    /// An already existing table is left untouched.
    pub fn define_entity(&self, app: &str, draft: NewEntity) -> Result<(EntityDefinition, MigrationReport)> {
        let (mut entities, report) = self.define_entities(app, vec![draft])?;
        match entities.pop() {
            Some(entity) => Ok((entity, report)),
            None => Err(SchemaError::NotFound(format!("entity in application {}", app))),
        }
    }

    /// Records every entity first, then materializes them in one pass, so
    /// entities in the batch may reference each other in any order.
    pub fn define_entities(
        &self,
        app: &str,
        drafts: Vec<NewEntity>,
    ) -> Result<(Vec<EntityDefinition>, MigrationReport)> {
        let _guard = self.mutation.lock()?;

        for draft in &drafts {
            check_draft(draft)?;
        }

        let mut entities = Vec::with_capacity(drafts.len());
        for draft in &drafts {
            match self.record_entity(app, draft) {
                Ok(entity) => entities.push(entity),
                Err(err) => {
                    for entity in &entities {
                        self.store.remove_entity(&entity.app, &entity.name)?;
                    }
                    return Err(err);
                }
            }
        }

        let report = self.materialize(&entities);
        for entity in &entities {
            self.cache.invalidate(&entity.app, &entity.name)?;
        }
        Ok((entities, report?))
    }

    fn record_entity(&self, app: &str, draft: &NewEntity) -> Result<EntityDefinition> {
        let entity = self.store.insert_entity(app, draft)?;

        let recorded = draft
            .fields
            .iter()
            .try_for_each(|field| self.store.insert_field(entity.id, field).map(|_| ()))
            .and_then(|_| match &draft.api {
                Some(api) => self
                    .store
                    .set_api_settings(&entity.app, &entity.name, Some(api.clone()))
                    .map(|_| ()),
                None => Ok(()),
            });

        match recorded {
            Ok(()) => Ok(self
                .store
                .entity_by_id(entity.id)?
                .unwrap_or(entity)),
            Err(err) => {
                self.store.remove_entity(&entity.app, &entity.name)?;
                Err(err)
            }
        }
    }

    fn materialize(&self, entities: &[EntityDefinition]) -> Result<MigrationReport> {
        let synthesizer = self.synthesizer();
        let schemas = entities
            .iter()
            .map(|entity| synthesizer.synthesize(&entity.app, &entity.name))
            .collect::<Result<Vec<_>>>()?;

        let batch: Vec<(&EntityDefinition, &SynthesizedSchema)> = entities.iter().zip(schemas.iter()).collect();
        self.engine.create_tables(&batch)
    }

    /// Creates tables for every recorded entity that has none, e.g. after
    /// loading a snapshot against fresh storage.
    pub fn sync_storage(&self) -> Result<MigrationReport> {
        let _guard = self.mutation.lock()?;
        let entities = self.store.entities()?;
        self.materialize(&entities)
    }

    pub fn update_entity(&self, app: &str, name: &str, patch: EntityPatch) -> Result<EntityDefinition> {
        let _guard = self.mutation.lock()?;
        let updated = self.store.update_entity(app, name, patch);
        self.cache.invalidate(app, name)?;
        updated
    }

    /// Removes the entity's metadata. Its table stays in place.
    pub fn delete_entity(&self, app: &str, name: &str) -> Result<EntityDefinition> {
        let _guard = self.mutation.lock()?;
        let removed = self.store.remove_entity(app, name);
        self.cache.invalidate(app, name)?;
        removed.map(|(entity, _)| entity)
    }

    pub fn set_admin_settings(&self, app: &str, name: &str, settings: Option<AdminSettings>) -> Result<EntityDefinition> {
        let _guard = self.mutation.lock()?;
        let updated = self.store.set_admin_settings(app, name, settings);
        self.cache.invalidate(app, name)?;
        updated
    }

    /// Fails with `ValidationFailure` naming every unknown field.
    pub fn set_api_settings(&self, app: &str, name: &str, settings: Option<ApiSettings>) -> Result<EntityDefinition> {
        let _guard = self.mutation.lock()?;
        let updated = self.store.set_api_settings(app, name, settings);
        self.cache.invalidate(app, name)?;
        updated
    }

    pub fn entity(&self, app: &str, name: &str) -> Result<EntityDefinition> {
        self.store
            .entity(app, name)?
            .ok_or_else(|| SchemaError::NotFound(format!("entity {}.{}", app, name)))
    }

    // ------------------------------------------------------------------
    // Fields
    // ------------------------------------------------------------------

    /// Records the field and adds its column.
    pub fn add_field(&self, app: &str, entity: &str, draft: NewField) -> Result<(FieldDefinition, MigrationReport)> {
        let _guard = self.mutation.lock()?;
        let owner = self.entity(app, entity)?;
        let field = self.store.insert_field(owner.id, &draft)?;
        self.cache.invalidate(app, entity)?;

        let report = self.schema(app, entity).and_then(|schema| {
            let column = field_column(&schema, &field.name)?;
            self.engine.add_column(&schema, column)
        });
        self.cache.invalidate(app, entity)?;
        Ok((field, report?))
    }

    /// Metadata only; the backing column is not altered.
    pub fn update_field(&self, app: &str, entity: &str, name: &str, patch: FieldPatch) -> Result<FieldDefinition> {
        let _guard = self.mutation.lock()?;
        let owner = self.entity(app, entity)?;
        let updated = self.store.update_field(owner.id, name, patch);
        self.cache.invalidate(app, entity)?;
        if updated.is_ok() {
            log::debug!("{}.{}.{} updated without storage migration", app, entity, name);
        }
        updated
    }

    /// Removes the field and drops its column.
    pub fn delete_field(&self, app: &str, entity: &str, name: &str) -> Result<(FieldDefinition, MigrationReport)> {
        let _guard = self.mutation.lock()?;
        let schema = self.schema(app, entity)?;
        let column = field_column(&schema, name)?.column.clone();

        let removed = self.store.remove_field(schema.entity_id, name)?;
        self.cache.invalidate(app, entity)?;

        let report = self.engine.drop_column(&schema.table, &column)?;
        Ok((removed, report))
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Current synthesized schema, served from the cache when fresh.
    pub fn schema(&self, app: &str, entity: &str) -> Result<Arc<SynthesizedSchema>> {
        self.cache.get(app, entity, &self.synthesizer())
    }

    pub fn invalidate(&self, app: &str, entity: &str) -> Result<()> {
        self.cache.invalidate(app, entity)
    }

    pub fn admin_binding(&self, app: &str, entity: &str) -> Result<AdminBinding> {
        let schema = self.schema(app, entity)?;
        let definition = self.entity(app, entity)?;
        Ok(binding::admin_binding(&schema, definition.admin.as_ref()))
    }

    pub fn api_binding(&self, app: &str, entity: &str) -> Result<ApiBinding> {
        let schema = self.schema(app, entity)?;
        let definition = self.entity(app, entity)?;
        Ok(binding::api_binding(&schema, definition.api.as_ref(), &self.config))
    }

    // ------------------------------------------------------------------
    // Snapshots
    // ------------------------------------------------------------------

    pub fn save_snapshot(&self, file: &SnapshotFile) -> Result<()> {
        let _guard = self.mutation.lock()?;
        file.save(&self.store)
    }
}

/// Rejects a draft before anything is recorded.
fn check_draft(draft: &NewEntity) -> Result<()> {
    let mut seen: Vec<&str> = Vec::with_capacity(draft.fields.len());
    for field in &draft.fields {
        naming::validate_slug("field", &field.name, MAX_FIELD_NAME)?;
        if seen.contains(&field.name.as_str()) {
            return Err(SchemaError::DuplicateEntity(format!("field {}", field.name)));
        }
        seen.push(&field.name);
    }
    if let Some(api) = &draft.api {
        api.validate(seen.iter().copied())?;
    }
    Ok(())
}

fn field_column<'a>(schema: &'a SynthesizedSchema, field: &str) -> Result<&'a ResolvedColumn> {
    schema
        .columns
        .iter()
        .find(|column| column.field == field && !column.is_identifier())
        .ok_or_else(|| SchemaError::NotFound(format!("field {}", field)))
}
