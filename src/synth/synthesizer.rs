use super::schema::{LabelRule, SynthesizedSchema, parse_ordering};
use crate::core::{ResolvedColumn, Result, SchemaError};
use crate::metadata::{EntityDefinition, EntityStamp, FieldDefinition, MetadataStore};
use crate::resolver::FieldTypeResolver;

/// Builds schema descriptors from metadata.
pub struct SchemaSynthesizer<'a> {
    store: &'a MetadataStore,
    resolver: FieldTypeResolver<'a>,
}

impl<'a> SchemaSynthesizer<'a> {
    pub fn new(store: &'a MetadataStore, resolver: FieldTypeResolver<'a>) -> Self {
        Self { store, resolver }
    }

    pub fn store(&self) -> &MetadataStore {
        self.store
    }

    /// Reads the entity and its fields atomically and synthesizes them.
    pub fn synthesize(&self, app: &str, entity: &str) -> Result<SynthesizedSchema> {
        let (definition, fields, stamp) = self
            .store
            .entity_with_fields(app, entity)?
            .ok_or_else(|| SchemaError::NotFound(format!("entity {}.{}", app, entity)))?;
        Ok(self.synthesize_definition(&definition, &fields, stamp))
    }

    /// Deterministic: the same definition, fields and catalog give the same schema.
    pub fn synthesize_definition(
        &self,
        entity: &EntityDefinition,
        fields: &[FieldDefinition],
        stamp: EntityStamp,
    ) -> SynthesizedSchema {
        let mut columns = Vec::with_capacity(fields.len() + 1);
        columns.push(ResolvedColumn::identifier());
        columns.extend(fields.iter().map(|field| self.resolver.resolve(entity, field)));

        let label = LabelRule::from_columns(&columns, &entity.display_name);

        SynthesizedSchema {
            entity_id: entity.id,
            app: entity.app.clone(),
            entity: entity.name.clone(),
            table: entity.table_name(),
            display_name: entity.display_name.clone(),
            plural_display_name: entity.plural(),
            columns,
            ordering: parse_ordering(entity.ordering.as_deref()),
            label,
            stamp,
        }
    }
}
