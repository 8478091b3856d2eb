use super::capitalize;
use crate::config::RegistryConfig;
use crate::metadata::{ApiSettings, split_list};
use crate::synth::SynthesizedSchema;
use serde::{Deserialize, Serialize};

/// A reference field rendered with the target entity's own serializer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NestedSerializer {
    pub field: String,
    pub app: String,
    pub entity: String,
    /// `<Target>ApiSerializer`
    pub serializer: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiBinding {
    /// `<Entity>ApiSerializer` with settings, `<Entity>Serializer` without
    pub name: String,
    pub viewset: String,
    /// Plural display name, lower-cased
    pub route: String,
    pub serialized_fields: Vec<String>,
    pub filter_fields: Vec<String>,
    pub nested_related_serializers: Vec<NestedSerializer>,
    pub page_size: usize,
}

pub fn api_binding(schema: &SynthesizedSchema, settings: Option<&ApiSettings>, config: &RegistryConfig) -> ApiBinding {
    let entity = capitalize(&schema.entity);
    let all_fields = || schema.columns.iter().map(|c| c.field.clone()).collect::<Vec<_>>();

    let (name, serialized_fields, filter_fields, nested_related_serializers) = match settings {
        Some(settings) => {
            let mut fields = split_list(settings.fields.as_deref());
            if fields.is_empty() {
                fields = all_fields();
            }
            let nested = if settings.nested {
                nested_serializers(schema)
            } else {
                Vec::new()
            };
            (
                format!("{}ApiSerializer", entity),
                fields,
                split_list(settings.filter_fields.as_deref()),
                nested,
            )
        }
        None => (format!("{}Serializer", entity), all_fields(), Vec::new(), Vec::new()),
    };

    ApiBinding {
        name,
        viewset: format!("{}ViewSet", entity),
        route: schema.plural_display_name.to_lowercase(),
        serialized_fields,
        filter_fields,
        nested_related_serializers,
        page_size: config.page_size,
    }
}

/// Only references to runtime-defined entities nest; native targets have no
/// serializer of ours.
fn nested_serializers(schema: &SynthesizedSchema) -> Vec<NestedSerializer> {
    schema
        .reference_columns()
        .filter_map(|column| {
            let target = column.reference()?;
            target.dynamic.then(|| NestedSerializer {
                field: column.field.clone(),
                app: target.app.clone(),
                entity: target.model.clone(),
                serializer: format!("{}ApiSerializer", capitalize(&target.model)),
            })
        })
        .collect()
}
