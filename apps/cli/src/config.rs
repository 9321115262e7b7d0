//! CLI configuration
//!
//! Sources, lowest precedence first:
//! 1. built-in defaults
//! 2. `fhir-refs.toml` in the working directory, or the file given with `--config`
//! 3. environment variables such as `FHIR_REFS__RESOLVER__BASE_URL`

use ferrum_references::{InMemorySearch, ResolverConfig};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct CliConfig {
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchConfig {
    /// Element search parameters offered by the in-memory store in addition
    /// to `_id` and `identifier`.
    #[serde(default)]
    pub parameters: Vec<SearchParameterConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchParameterConfig {
    /// Resource type, or `*` for every type.
    pub resource_type: String,
    pub name: String,
    /// Dotted element path, e.g. `name.family`.
    pub element: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Use JSON formatting for logs
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl CliConfig {
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let file = match path {
            Some(path) => config::File::from(path).required(true),
            None => config::File::with_name("fhir-refs").required(false),
        };

        let config = config::Config::builder()
            .set_default("resolver.strict_search_parameters", false)?
            .set_default("logging.level", default_log_level())?
            .set_default("logging.json", false)?
            .add_source(file)
            // FHIR_REFS__RESOLVER__BASE_URL -> resolver.base_url
            .add_source(
                config::Environment::with_prefix("FHIR_REFS")
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("resolver.additional_resource_types")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }

    pub fn validate(&self) -> Result<(), String> {
        self.resolver.validate()?;

        for param in &self.search.parameters {
            if param.name.trim().is_empty() || param.element.trim().is_empty() {
                return Err(format!(
                    "search.parameters entry for '{}' needs a name and an element path",
                    param.resource_type
                ));
            }
        }

        match self.logging.level.to_ascii_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
            other => Err(format!("logging.level '{}' is not a log level", other)),
        }
    }

    /// Empty in-memory store with the configured search parameters registered.
    pub fn search_store(&self) -> InMemorySearch {
        self.search
            .parameters
            .iter()
            .fold(InMemorySearch::new(), |store, p| {
                store.with_parameter(&p.resource_type, &p.name, &p.element)
            })
    }
}
