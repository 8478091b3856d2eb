use super::capitalize;
use crate::metadata::{AdminSettings, split_list};
use crate::synth::SynthesizedSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminBinding {
    /// `<Entity>Admin`
    pub name: String,
    pub list_filter_fields: Vec<String>,
    pub list_display_fields: Vec<String>,
    pub search_fields: Vec<String>,
}

/// Without settings every field is displayed and nothing is filtered or
/// searched. An empty `list_display` also falls back to every field.
pub fn admin_binding(schema: &SynthesizedSchema, settings: Option<&AdminSettings>) -> AdminBinding {
    let settings = settings.cloned().unwrap_or_default();

    let mut list_display_fields = split_list(settings.list_display.as_deref());
    if list_display_fields.is_empty() {
        list_display_fields = schema.columns.iter().map(|c| c.field.clone()).collect();
    }

    AdminBinding {
        name: format!("{}Admin", capitalize(&schema.entity)),
        list_filter_fields: split_list(settings.list_filter.as_deref()),
        list_display_fields,
        search_fields: split_list(settings.search_fields.as_deref()),
    }
}
