use crate::core::{Result, SchemaError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type EntityId = u64;
pub type FieldId = u64;

/// Splits a comma-separated settings value, dropping empty items.
pub fn split_list(value: Option<&str>) -> Vec<String> {
    value
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    pub name: String,
    pub display_name: String,
}

/// Case-insensitive identity of an entity: (application, entity name).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityKey {
    pub app: String,
    pub name: String,
}

impl EntityKey {
    pub fn new(app: &str, name: &str) -> Self {
        Self {
            app: app.to_lowercase(),
            name: name.to_lowercase(),
        }
    }
}

impl std::fmt::Display for EntityKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.app, self.name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminSettings {
    #[serde(default)]
    pub list_filter: Option<String>,
    #[serde(default)]
    pub list_display: Option<String>,
    #[serde(default)]
    pub search_fields: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiSettings {
    #[serde(default)]
    pub fields: Option<String>,
    #[serde(default)]
    pub filter_fields: Option<String>,
    #[serde(default)]
    pub nested: bool,
}

impl ApiSettings {
    /// Every serialized or filtered field must be a declared field or `id`.
    pub fn validate<'a>(&self, field_names: impl IntoIterator<Item = &'a str>) -> Result<()> {
        let mut allowed: Vec<&str> = field_names.into_iter().collect();
        allowed.push("id");

        let mut offending = Vec::new();
        for name in split_list(self.filter_fields.as_deref())
            .into_iter()
            .chain(split_list(self.fields.as_deref()))
        {
            if !allowed.contains(&name.as_str()) && !offending.contains(&name) {
                offending.push(name);
            }
        }

        if offending.is_empty() {
            return Ok(());
        }
        Err(SchemaError::ValidationFailure {
            message: format!("field(s) do not exist: {}", offending.join(", ")),
            fields: offending,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityDefinition {
    pub id: EntityId,
    pub app: String,
    pub name: String,
    pub display_name: String,
    pub plural_display_name: Option<String>,
    pub ordering: Option<String>,
    pub admin: Option<AdminSettings>,
    pub api: Option<ApiSettings>,
    pub created_at: DateTime<Utc>,
}

impl EntityDefinition {
    pub fn key(&self) -> EntityKey {
        EntityKey::new(&self.app, &self.name)
    }

    pub fn plural(&self) -> String {
        match self.plural_display_name.as_deref() {
            Some(plural) if !plural.is_empty() => plural.to_string(),
            _ => format!("{}s", self.display_name),
        }
    }

    pub fn table_name(&self) -> String {
        super::naming::table_name(&self.app, &self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub id: FieldId,
    pub entity: EntityId,
    pub name: String,
    pub display_name: String,
    pub field_type: String,
    pub nullable: bool,
    pub blank: bool,
    pub unique: bool,
    pub default: Option<String>,
    pub help_text: Option<String>,
    pub created_at: DateTime<Utc>,
}

fn default_true() -> bool {
    true
}

/// Field declaration used to create a field definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewField {
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    pub field_type: String,
    #[serde(default = "default_true")]
    pub nullable: bool,
    #[serde(default = "default_true")]
    pub blank: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub default: Option<String>,
    #[serde(default)]
    pub help_text: Option<String>,
}

impl NewField {
    pub fn new(name: &str, field_type: &str) -> Self {
        Self {
            name: name.to_string(),
            display_name: None,
            field_type: field_type.to_string(),
            nullable: true,
            blank: true,
            unique: false,
            default: None,
            help_text: None,
        }
    }

    pub fn display_name(mut self, display_name: &str) -> Self {
        self.display_name = Some(display_name.to_string());
        self
    }

    /// Not nullable and not blank.
    pub fn required(mut self) -> Self {
        self.nullable = false;
        self.blank = false;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn default_value(mut self, default: &str) -> Self {
        self.default = Some(default.to_string());
        self
    }

    pub fn help_text(mut self, help_text: &str) -> Self {
        self.help_text = Some(help_text.to_string());
        self
    }
}

/// Entity declaration, optionally carrying its initial fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEntity {
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub plural_display_name: Option<String>,
    #[serde(default)]
    pub ordering: Option<String>,
    #[serde(default)]
    pub fields: Vec<NewField>,
    #[serde(default)]
    pub admin: Option<AdminSettings>,
    #[serde(default)]
    pub api: Option<ApiSettings>,
}

impl NewEntity {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            display_name: None,
            plural_display_name: None,
            ordering: None,
            fields: Vec::new(),
            admin: None,
            api: None,
        }
    }

    pub fn display_name(mut self, display_name: &str) -> Self {
        self.display_name = Some(display_name.to_string());
        self
    }

    pub fn plural(mut self, plural: &str) -> Self {
        self.plural_display_name = Some(plural.to_string());
        self
    }

    pub fn ordering(mut self, ordering: &str) -> Self {
        self.ordering = Some(ordering.to_string());
        self
    }

    pub fn field(mut self, field: NewField) -> Self {
        self.fields.push(field);
        self
    }

    pub fn admin(mut self, admin: AdminSettings) -> Self {
        self.admin = Some(admin);
        self
    }

    pub fn api(mut self, api: ApiSettings) -> Self {
        self.api = Some(api);
        self
    }
}

/// Metadata-only entity changes. `Some(None)` clears an optional value.
#[derive(Debug, Clone, Default)]
pub struct EntityPatch {
    pub display_name: Option<String>,
    pub plural_display_name: Option<Option<String>>,
    pub ordering: Option<Option<String>>,
}

/// Field changes. None of these reach storage.
#[derive(Debug, Clone, Default)]
pub struct FieldPatch {
    pub display_name: Option<String>,
    pub field_type: Option<String>,
    pub nullable: Option<bool>,
    pub blank: Option<bool>,
    pub unique: Option<bool>,
    pub default: Option<Option<String>>,
    pub help_text: Option<Option<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_list() {
        assert_eq!(split_list(Some("a, b,,c ")), vec!["a", "b", "c"]);
        assert!(split_list(None).is_empty());
    }

    #[test]
    fn test_api_settings_validation_reports_all_offenders() {
        let settings = ApiSettings {
            fields: Some("id,title,colour".into()),
            filter_fields: Some("done,size".into()),
            nested: false,
        };

        let err = settings.validate(["title", "done"]).unwrap_err();
        match err {
            SchemaError::ValidationFailure { fields, .. } => {
                assert_eq!(fields, vec!["size", "colour"]);
            }
            other => panic!("Expected ValidationFailure, got {:?}", other),
        }

        assert!(settings.validate(["title", "done", "size", "colour"]).is_ok());
    }

    #[test]
    fn test_new_field_defaults() {
        let field: NewField = serde_json::from_str(r#"{"name": "title", "field_type": "text"}"#).unwrap();
        assert!(field.nullable);
        assert!(field.blank);
        assert!(!field.unique);
        assert_eq!(field, NewField::new("title", "text"));
    }
}
