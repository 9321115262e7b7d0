//! Resolver configuration

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ResolverConfig {
    /// Service base URL (e.g. `https://example.org/fhir`). Absolute conditional
    /// references are only resolved locally when they start with this base.
    /// When unset, the base is derived from an absolute request URL.
    #[serde(default)]
    pub base_url: Option<String>,

    /// Fail when the search subsystem reports unknown or unsupported parameters
    /// instead of resolving with the remaining ones.
    #[serde(default)]
    pub strict_search_parameters: bool,

    /// Resource types accepted in addition to the built-in FHIR R4 set
    /// (custom resources, R5 additions).
    #[serde(default)]
    pub additional_resource_types: Vec<String>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            strict_search_parameters: false,
            additional_resource_types: Vec::new(),
        }
    }
}

impl ResolverConfig {
    pub fn validate(&self) -> Result<(), String> {
        if let Some(base) = &self.base_url {
            let lower = base.to_ascii_lowercase();
            if !lower.starts_with("http://") && !lower.starts_with("https://") {
                return Err(format!(
                    "resolver.base_url must be an absolute http(s) URL, got '{}'",
                    base
                ));
            }
        }

        for rt in &self.additional_resource_types {
            if !crate::registry::is_valid_resource_type_name(rt) {
                return Err(format!(
                    "resolver.additional_resource_types contains invalid type name '{}'",
                    rt
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_lenient() {
        let config: ResolverConfig = serde_json::from_str("{}").unwrap();
        assert!(!config.strict_search_parameters);
        assert!(config.base_url.is_none());
        assert!(config.additional_resource_types.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_relative_base_and_bad_type_names() {
        let config = ResolverConfig {
            base_url: Some("fhir".to_string()),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = ResolverConfig {
            additional_resource_types: vec!["my-type".to_string()],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
