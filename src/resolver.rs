//! Field Type Resolver
//!
//! Turns a field's type token into a resolved column. Primitive tokens win
//! over reference names. Among reference candidates the owner's application
//! wins, then the alphabetically first app label; for the chosen entry a
//! runtime-defined entity wins over the native table. Anything that cannot
//! be resolved degrades to the generic text column instead of failing the
//! whole schema.

use crate::catalog::{self, ContentTypeRegistry, GENERIC_TEXT_TOKEN};
use crate::config::RegistryConfig;
use crate::core::{
    ColumnConstraints, ColumnKind, ReferenceTarget, ResolvedColumn, Result, SchemaError,
    StorageType,
};
use crate::metadata::{EntityDefinition, FieldDefinition, MetadataStore, naming};

pub struct FieldTypeResolver<'a> {
    config: &'a RegistryConfig,
    content_types: &'a dyn ContentTypeRegistry,
    store: &'a MetadataStore,
}

/// A possible reference target found in the registered-type index.
#[derive(Debug)]
struct Candidate {
    app: String,
    model: String,
    native_table: Option<String>,
}

impl<'a> FieldTypeResolver<'a> {
    pub fn new(
        config: &'a RegistryConfig,
        content_types: &'a dyn ContentTypeRegistry,
        store: &'a MetadataStore,
    ) -> Self {
        Self {
            config,
            content_types,
            store,
        }
    }

    /// Resolves one field. Never fails: unresolvable tokens degrade.
    pub fn resolve(&self, owner: &EntityDefinition, field: &FieldDefinition) -> ResolvedColumn {
        let token = field.field_type.as_str();

        if let Some(primitive) = catalog::primitive(token) {
            return self.primitive_column(field, token, primitive.storage.clone());
        }

        match self.resolve_reference(owner, token) {
            Ok(Some(target)) => ResolvedColumn {
                field: field.name.clone(),
                column: self.config.reference_column(&field.name),
                display_name: field.display_name.clone(),
                kind: ColumnKind::Reference { target },
                constraints: ColumnConstraints {
                    nullable: field.nullable,
                    blank: field.blank,
                    unique: field.unique,
                    default: field.default.clone(),
                    help_text: field.help_text.clone(),
                    max_length: None,
                },
                degraded: None,
            },
            Ok(None) => {
                let err = SchemaError::UnresolvedFieldType {
                    field: field.name.clone(),
                    token: token.to_string(),
                };
                log::info!("{}.{}: {}, using text as default", owner.app, owner.name, err);
                self.fallback_column(field, err.to_string())
            }
            Err(err) => {
                log::info!(
                    "{}.{}: failed to set reference for field '{}' ({}): {}",
                    owner.app,
                    owner.name,
                    field.name,
                    token,
                    err
                );
                self.fallback_column(field, err.to_string())
            }
        }
    }

    fn primitive_column(&self, field: &FieldDefinition, token: &str, storage: StorageType) -> ResolvedColumn {
        let unique = field.unique && !self.config.is_unique_exempt(token);
        let (storage, max_length) = if token == GENERIC_TEXT_TOKEN {
            let length = self.config.max_text_length;
            (StorageType::Varchar(length), Some(length))
        } else {
            let length = storage.max_length();
            (storage, length)
        };

        ResolvedColumn {
            field: field.name.clone(),
            column: field.name.clone(),
            display_name: field.display_name.clone(),
            kind: ColumnKind::Primitive {
                token: token.to_string(),
                storage,
            },
            constraints: ColumnConstraints {
                nullable: field.nullable,
                blank: field.blank,
                unique,
                default: field.default.clone(),
                help_text: field.help_text.clone(),
                max_length,
            },
            degraded: None,
        }
    }

    fn fallback_column(&self, field: &FieldDefinition, reason: String) -> ResolvedColumn {
        let length = self.config.max_text_length;
        ResolvedColumn {
            field: field.name.clone(),
            column: field.name.clone(),
            display_name: field.display_name.clone(),
            kind: ColumnKind::Primitive {
                token: GENERIC_TEXT_TOKEN.to_string(),
                storage: StorageType::Varchar(length),
            },
            constraints: ColumnConstraints {
                nullable: true,
                blank: true,
                unique: false,
                default: field.default.clone(),
                help_text: field.help_text.clone(),
                max_length: Some(length),
            },
            degraded: Some(reason),
        }
    }

    /// Looks the token up in the registered-type index and picks a target.
    ///
    /// `Ok(None)` means the token names nothing, or the matched entry has no
    /// concrete table.
    fn resolve_reference(&self, owner: &EntityDefinition, token: &str) -> Result<Option<ReferenceTarget>> {
        let mut candidates: Vec<Candidate> = self
            .content_types
            .find_by_model(token)?
            .into_iter()
            .map(|ct| Candidate {
                app: ct.app_label,
                model: ct.model,
                native_table: ct.table,
            })
            .collect();

        for entity in self.store.entities()? {
            if entity.name.eq_ignore_ascii_case(token) {
                candidates.push(Candidate {
                    app: entity.app.to_lowercase(),
                    model: entity.name.to_lowercase(),
                    native_table: None,
                });
            }
        }

        // Owner's application first, then by label.
        candidates.sort_by_key(|c| (!c.app.eq_ignore_ascii_case(&owner.app), c.app.clone()));

        let Some(candidate) = candidates.into_iter().next() else {
            return Ok(None);
        };

        if let Some(entity) = self.store.entity(&candidate.app, &candidate.model)? {
            return Ok(Some(ReferenceTarget {
                app: entity.app.to_lowercase(),
                model: entity.name.to_lowercase(),
                table: naming::table_name(&entity.app, &entity.name),
                dynamic: true,
            }));
        }

        Ok(candidate.native_table.map(|table| ReferenceTarget {
            app: candidate.app,
            model: candidate.model,
            table,
            dynamic: false,
        }))
    }
}
