/// Schema registry configuration
///
/// Controls the knobs of type resolution and binding generation that are
/// not part of any single entity's metadata.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Maximum length applied to generic text columns
    pub max_text_length: u32,

    /// Page size advertised by API bindings
    pub page_size: usize,

    /// Type tokens for which a declared `unique` flag is ignored
    pub unique_exempt_types: Vec<String>,

    /// Suffix appended to reference field names to form the column name
    pub reference_suffix: String,

    /// Whether index failures are logged at warn level (otherwise debug)
    pub warn_on_index_failure: bool,

    /// Whether the notification sink hears about newly created tables
    pub notify_on_create: bool,
}

impl RegistryConfig {
    /// Create a configuration with default settings
    pub fn new() -> Self {
        Self {
            max_text_length: 255,
            page_size: 50,
            unique_exempt_types: vec!["file".to_string(), "image".to_string(), "binary".to_string()],
            reference_suffix: "_id".to_string(),
            warn_on_index_failure: true,
            notify_on_create: true,
        }
    }

    /// Set the generic text length
    pub fn max_text_length(mut self, length: u32) -> Self {
        self.max_text_length = length;
        self
    }

    /// Set the API page size
    pub fn page_size(mut self, size: usize) -> Self {
        self.page_size = size;
        self
    }

    /// Replace the unique deny-list
    pub fn unique_exempt_types<I, S>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.unique_exempt_types = tokens.into_iter().map(Into::into).collect();
        self
    }

    /// Set the reference column suffix
    pub fn reference_suffix(mut self, suffix: &str) -> Self {
        self.reference_suffix = suffix.to_string();
        self
    }

    /// Log index failures at debug instead of warn
    pub fn quiet_index_failures(mut self) -> Self {
        self.warn_on_index_failure = false;
        self
    }

    /// Skip post-creation notifications
    pub fn without_notifications(mut self) -> Self {
        self.notify_on_create = false;
        self
    }

    pub fn is_unique_exempt(&self, token: &str) -> bool {
        self.unique_exempt_types.iter().any(|t| t == token)
    }

    pub fn reference_column(&self, field_name: &str) -> String {
        format!("{}{}", field_name, self.reference_suffix)
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = RegistryConfig::new()
            .max_text_length(120)
            .page_size(25)
            .unique_exempt_types(["image"]);

        assert_eq!(config.max_text_length, 120);
        assert_eq!(config.page_size, 25);
        assert!(config.is_unique_exempt("image"));
        assert!(!config.is_unique_exempt("file"));
        assert_eq!(config.reference_column("owner"), "owner_id");
    }
}
