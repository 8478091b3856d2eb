use super::model::*;
use super::naming::{MAX_APPLICATION_NAME, MAX_ENTITY_NAME, MAX_FIELD_NAME, validate_slug};
use crate::core::{Result, SchemaError};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::RwLock;

/// Version pair used to validate cached schemas.
///
/// `version` changes on every mutation of the entity or its fields;
/// `generation` changes whenever any entity is created or deleted, since
/// reference resolution depends on which entities exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityStamp {
    pub version: u64,
    pub generation: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct StoreState {
    applications: BTreeMap<String, Application>,
    entities: BTreeMap<EntityId, EntityDefinition>,
    fields: BTreeMap<FieldId, FieldDefinition>,
    versions: BTreeMap<EntityId, u64>,
    generation: u64,
    next_entity_id: EntityId,
    next_field_id: FieldId,
}

impl StoreState {
    fn find_entity(&self, app: &str, name: &str) -> Option<&EntityDefinition> {
        self.entities.values().find(|entity| {
            entity.app.eq_ignore_ascii_case(app) && entity.name.eq_ignore_ascii_case(name)
        })
    }

    fn entity_id(&self, app: &str, name: &str) -> Result<EntityId> {
        self.find_entity(app, name)
            .map(|entity| entity.id)
            .ok_or_else(|| SchemaError::NotFound(format!("entity {}.{}", app, name)))
    }

    fn entity_mut(&mut self, id: EntityId) -> Result<&mut EntityDefinition> {
        self.entities
            .get_mut(&id)
            .ok_or_else(|| SchemaError::NotFound(format!("entity #{}", id)))
    }

    fn field_id(&self, entity: EntityId, name: &str) -> Option<FieldId> {
        self.fields
            .values()
            .find(|field| field.entity == entity && field.name == name)
            .map(|field| field.id)
    }

    fn fields_of(&self, entity: EntityId) -> Vec<FieldDefinition> {
        // BTreeMap iteration is id order, i.e. insertion order.
        self.fields
            .values()
            .filter(|field| field.entity == entity)
            .cloned()
            .collect()
    }

    fn bump(&mut self, entity: EntityId) {
        *self.versions.entry(entity).or_insert(0) += 1;
    }

    fn remove_entity(&mut self, id: EntityId) -> Option<(EntityDefinition, Vec<FieldDefinition>)> {
        let entity = self.entities.remove(&id)?;
        let fields = self.fields_of(id);
        self.fields.retain(|_, field| field.entity != id);
        self.versions.remove(&id);
        self.generation += 1;
        Some((entity, fields))
    }
}

/// Persistent record of applications, entities and fields.
#[derive(Default)]
pub struct MetadataStore {
    state: RwLock<StoreState>,
}

impl MetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_state(state: StoreState) -> Self {
        Self {
            state: RwLock::new(state),
        }
    }

    pub(crate) fn state(&self) -> Result<StoreState> {
        Ok(self.state.read()?.clone())
    }

    // ------------------------------------------------------------------
    // Applications
    // ------------------------------------------------------------------

    pub fn create_application(&self, name: &str, display_name: &str) -> Result<Application> {
        validate_slug("application", name, MAX_APPLICATION_NAME)?;
        let mut state = self.state.write()?;
        if state
            .applications
            .keys()
            .any(|existing| existing.eq_ignore_ascii_case(name))
        {
            return Err(SchemaError::DuplicateEntity(format!("application {}", name)));
        }

        let app = Application {
            name: name.to_string(),
            display_name: display_name.to_string(),
        };
        state.applications.insert(name.to_string(), app.clone());
        Ok(app)
    }

    pub fn application(&self, name: &str) -> Result<Option<Application>> {
        let state = self.state.read()?;
        Ok(state
            .applications
            .values()
            .find(|app| app.name.eq_ignore_ascii_case(name))
            .cloned())
    }

    pub fn applications(&self) -> Result<Vec<Application>> {
        Ok(self.state.read()?.applications.values().cloned().collect())
    }

    pub fn update_application(&self, name: &str, display_name: &str) -> Result<Application> {
        let mut state = self.state.write()?;
        let app = state
            .applications
            .values_mut()
            .find(|app| app.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| SchemaError::NotFound(format!("application {}", name)))?;
        app.display_name = display_name.to_string();
        Ok(app.clone())
    }

    /// Removes an application and every entity it owns.
    pub fn remove_application(&self, name: &str) -> Result<Vec<EntityDefinition>> {
        let mut state = self.state.write()?;
        let key = state
            .applications
            .keys()
            .find(|existing| existing.eq_ignore_ascii_case(name))
            .cloned()
            .ok_or_else(|| SchemaError::NotFound(format!("application {}", name)))?;

        let owned: Vec<EntityId> = state
            .entities
            .values()
            .filter(|entity| entity.app.eq_ignore_ascii_case(name))
            .map(|entity| entity.id)
            .collect();

        let removed = owned
            .into_iter()
            .filter_map(|id| state.remove_entity(id).map(|(entity, _)| entity))
            .collect();
        state.applications.remove(&key);
        Ok(removed)
    }

    // ------------------------------------------------------------------
    // Entities
    // ------------------------------------------------------------------

    /// Records an entity definition (without its fields).
    pub fn insert_entity(&self, app: &str, draft: &NewEntity) -> Result<EntityDefinition> {
        validate_slug("entity", &draft.name, MAX_ENTITY_NAME)?;
        let mut state = self.state.write()?;

        let app_name = state
            .applications
            .values()
            .find(|candidate| candidate.name.eq_ignore_ascii_case(app))
            .map(|candidate| candidate.name.clone())
            .ok_or_else(|| SchemaError::NotFound(format!("application {}", app)))?;

        if state.find_entity(&app_name, &draft.name).is_some() {
            return Err(SchemaError::DuplicateEntity(format!(
                "entity {}.{}",
                app_name, draft.name
            )));
        }

        state.next_entity_id += 1;
        let entity = EntityDefinition {
            id: state.next_entity_id,
            app: app_name,
            name: draft.name.clone(),
            display_name: draft
                .display_name
                .clone()
                .unwrap_or_else(|| draft.name.clone()),
            plural_display_name: draft.plural_display_name.clone(),
            ordering: draft.ordering.clone(),
            admin: draft.admin.clone(),
            api: None,
            created_at: Utc::now(),
        };

        state.entities.insert(entity.id, entity.clone());
        state.bump(entity.id);
        state.generation += 1;
        Ok(entity)
    }

    pub fn entity(&self, app: &str, name: &str) -> Result<Option<EntityDefinition>> {
        Ok(self.state.read()?.find_entity(app, name).cloned())
    }

    pub fn entity_by_id(&self, id: EntityId) -> Result<Option<EntityDefinition>> {
        Ok(self.state.read()?.entities.get(&id).cloned())
    }

    pub fn entities(&self) -> Result<Vec<EntityDefinition>> {
        Ok(self.state.read()?.entities.values().cloned().collect())
    }

    /// Entity definition together with its fields, read atomically.
    pub fn entity_with_fields(
        &self,
        app: &str,
        name: &str,
    ) -> Result<Option<(EntityDefinition, Vec<FieldDefinition>, EntityStamp)>> {
        let state = self.state.read()?;
        let Some(entity) = state.find_entity(app, name) else {
            return Ok(None);
        };
        let stamp = EntityStamp {
            version: state.versions.get(&entity.id).copied().unwrap_or_default(),
            generation: state.generation,
        };
        Ok(Some((entity.clone(), state.fields_of(entity.id), stamp)))
    }

    pub fn stamp(&self, app: &str, name: &str) -> Result<Option<EntityStamp>> {
        let state = self.state.read()?;
        Ok(state.find_entity(app, name).map(|entity| EntityStamp {
            version: state.versions.get(&entity.id).copied().unwrap_or_default(),
            generation: state.generation,
        }))
    }

    pub fn update_entity(&self, app: &str, name: &str, patch: EntityPatch) -> Result<EntityDefinition> {
        let mut state = self.state.write()?;
        let id = state.entity_id(app, name)?;
        let entity = state.entity_mut(id)?;

        if let Some(display_name) = patch.display_name {
            entity.display_name = display_name;
        }
        if let Some(plural) = patch.plural_display_name {
            entity.plural_display_name = plural;
        }
        if let Some(ordering) = patch.ordering {
            entity.ordering = ordering;
        }

        let updated = entity.clone();
        state.bump(id);
        Ok(updated)
    }

    pub fn set_admin_settings(
        &self,
        app: &str,
        name: &str,
        settings: Option<AdminSettings>,
    ) -> Result<EntityDefinition> {
        let mut state = self.state.write()?;
        let id = state.entity_id(app, name)?;
        let entity = state.entity_mut(id)?;
        entity.admin = settings;
        let updated = entity.clone();
        state.bump(id);
        Ok(updated)
    }

    /// Attaches API settings after checking every referenced field exists.
    pub fn set_api_settings(
        &self,
        app: &str,
        name: &str,
        settings: Option<ApiSettings>,
    ) -> Result<EntityDefinition> {
        let mut state = self.state.write()?;
        let id = state.entity_id(app, name)?;

        if let Some(settings) = &settings {
            let fields = state.fields_of(id);
            settings.validate(fields.iter().map(|field| field.name.as_str()))?;
        }

        let entity = state.entity_mut(id)?;
        entity.api = settings;
        let updated = entity.clone();
        state.bump(id);
        Ok(updated)
    }

    pub fn remove_entity(&self, app: &str, name: &str) -> Result<(EntityDefinition, Vec<FieldDefinition>)> {
        let mut state = self.state.write()?;
        let id = state.entity_id(app, name)?;
        state
            .remove_entity(id)
            .ok_or_else(|| SchemaError::NotFound(format!("entity {}.{}", app, name)))
    }

    // ------------------------------------------------------------------
    // Fields
    // ------------------------------------------------------------------

    pub fn insert_field(&self, entity: EntityId, draft: &NewField) -> Result<FieldDefinition> {
        validate_slug("field", &draft.name, MAX_FIELD_NAME)?;
        let mut state = self.state.write()?;
        if !state.entities.contains_key(&entity) {
            return Err(SchemaError::NotFound(format!("entity #{}", entity)));
        }
        if state.field_id(entity, &draft.name).is_some() {
            return Err(SchemaError::DuplicateEntity(format!("field {}", draft.name)));
        }

        state.next_field_id += 1;
        let field = FieldDefinition {
            id: state.next_field_id,
            entity,
            name: draft.name.clone(),
            display_name: draft
                .display_name
                .clone()
                .unwrap_or_else(|| draft.name.clone()),
            field_type: draft.field_type.trim().to_lowercase(),
            nullable: draft.nullable,
            blank: draft.blank,
            unique: draft.unique,
            default: draft.default.clone().filter(|value| !value.is_empty()),
            help_text: draft.help_text.clone(),
            created_at: Utc::now(),
        };

        state.fields.insert(field.id, field.clone());
        state.bump(entity);
        Ok(field)
    }

    pub fn field(&self, entity: EntityId, name: &str) -> Result<Option<FieldDefinition>> {
        let state = self.state.read()?;
        Ok(state
            .field_id(entity, name)
            .and_then(|id| state.fields.get(&id).cloned()))
    }

    pub fn fields(&self, entity: EntityId) -> Result<Vec<FieldDefinition>> {
        Ok(self.state.read()?.fields_of(entity))
    }

    pub fn update_field(&self, entity: EntityId, name: &str, patch: FieldPatch) -> Result<FieldDefinition> {
        let mut state = self.state.write()?;
        let id = state
            .field_id(entity, name)
            .ok_or_else(|| SchemaError::NotFound(format!("field {}", name)))?;
        let field = state
            .fields
            .get_mut(&id)
            .ok_or_else(|| SchemaError::NotFound(format!("field {}", name)))?;

        if let Some(display_name) = patch.display_name {
            field.display_name = display_name;
        }
        if let Some(field_type) = patch.field_type {
            field.field_type = field_type.trim().to_lowercase();
        }
        if let Some(nullable) = patch.nullable {
            field.nullable = nullable;
        }
        if let Some(blank) = patch.blank {
            field.blank = blank;
        }
        if let Some(unique) = patch.unique {
            field.unique = unique;
        }
        if let Some(default) = patch.default {
            field.default = default.filter(|value| !value.is_empty());
        }
        if let Some(help_text) = patch.help_text {
            field.help_text = help_text;
        }

        let updated = field.clone();
        state.bump(entity);
        Ok(updated)
    }

    pub fn remove_field(&self, entity: EntityId, name: &str) -> Result<FieldDefinition> {
        let mut state = self.state.write()?;
        let id = state
            .field_id(entity, name)
            .ok_or_else(|| SchemaError::NotFound(format!("field {}", name)))?;
        let removed = state
            .fields
            .remove(&id)
            .ok_or_else(|| SchemaError::NotFound(format!("field {}", name)))?;
        state.bump(entity);
        Ok(removed)
    }
}
