//! Configuration system (layered: code > env > config file).

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock, RwLock};

use serde::{Deserialize, Serialize};

use crate::error::{QuarryError, Result};

/// Global default config (lazy-initialized from env).
static DEFAULT_CONFIG: OnceLock<QuarryConfig> = OnceLock::new();

const CONFIG_FILE_NAME: &str = "quarry.toml";

const API_KEY_ENV: [(&str, &str); 1] = [("OPENAI_API_KEY", "openai")];
const BASE_URL_ENV: [(&str, &str); 3] = [
    ("OPENAI_BASE_URL", "openai"),
    ("OLLAMA_BASE_URL", "ollama"),
    ("LMSTUDIO_BASE_URL", "lmstudio"),
];
const LEARNING_URL_ENV: &str = "QUARRY_LEARNING_URL";
const LEARNING_API_KEY_ENV: &str = "QUARRY_LEARNING_API_KEY";
const MAX_TURNS_ENV: &str = "QUARRY_MAX_TURNS";
const MAX_OUTPUT_RETRIES_ENV: &str = "QUARRY_MAX_OUTPUT_RETRIES";
const MODEL_ENV: &str = "QUARRY_MODEL";

/// One configured data source.
///
/// The backend kind is derived from the URL scheme; see
/// [`crate::datasource::SourceKind::from_url`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Stable identity shown to the model. Defaults to the masked URL.
    #[serde(default)]
    pub name: Option<String>,
    pub url: String,
    /// Explicit allow-list of qualified table names (databases only).
    #[serde(default)]
    pub tables: Option<Vec<String>>,
    /// Regex restricting visible tables (databases only).
    #[serde(default)]
    pub tables_pattern: Option<String>,
    /// Headers injected into every API request. Never shown to the model.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Query parameters injected into every API request.
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

impl SourceConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn named(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn with_tables(mut self, tables: Vec<String>) -> Self {
        self.tables = Some(tables);
        self
    }

    pub fn with_tables_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.tables_pattern = Some(pattern.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }
}

/// Agent loop settings. `None` falls back to the built-in defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentSettings {
    #[serde(default)]
    pub max_turns: Option<usize>,
    #[serde(default)]
    pub max_output_retries: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSettings {
    /// Maximum rows returned by `sample` and `query`.
    #[serde(default = "default_max_rows")]
    pub max_rows: usize,
    #[serde(default = "default_sample_rows")]
    pub default_sample_rows: usize,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self {
            max_rows: default_max_rows(),
            default_sample_rows: default_sample_rows(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchSettings {
    #[serde(default = "default_search_limit")]
    pub limit: usize,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            limit: default_search_limit(),
        }
    }
}

#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LearningSettings {
    pub url: String,
    #[serde(default)]
    pub api_key: Option<String>,
}

impl fmt::Debug for LearningSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LearningSettings")
            .field("url", &self.url)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .finish()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ProviderFileEntry {
    #[serde(default)]
    api_key: Option<String>,
    #[serde(default)]
    base_url: Option<String>,
}

/// On-disk shape of `quarry.toml`.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    agent: AgentSettings,
    #[serde(default)]
    data: DataSettings,
    #[serde(default)]
    search: SearchSettings,
    #[serde(default)]
    learning: Option<LearningSettings>,
    #[serde(default)]
    providers: HashMap<String, ProviderFileEntry>,
    #[serde(default)]
    sources: Vec<SourceConfig>,
}

fn default_max_rows() -> usize {
    100
}

fn default_sample_rows() -> usize {
    5
}

fn default_search_limit() -> usize {
    20
}

/// Layered configuration for Quarry.
///
/// Provider credentials live in shared maps so clones observe later updates.
/// Everything else is plain data resolved once at load time.
#[derive(Clone, Default)]
pub struct QuarryConfig {
    api_keys: Arc<RwLock<HashMap<String, String>>>,
    base_urls: Arc<RwLock<HashMap<String, String>>>,
    pub model: Option<String>,
    pub agent: AgentSettings,
    pub data: DataSettings,
    pub search: SearchSettings,
    pub learning: Option<LearningSettings>,
    pub sources: Vec<SourceConfig>,
}

impl fmt::Debug for QuarryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let providers: Vec<String> = self
            .api_keys
            .read()
            .map(|keys| keys.keys().cloned().collect())
            .unwrap_or_default();
        f.debug_struct("QuarryConfig")
            .field("providers_with_keys", &providers)
            .field("base_urls", &self.base_urls)
            .field("model", &self.model)
            .field("agent", &self.agent)
            .field("data", &self.data)
            .field("search", &self.search)
            .field("learning", &self.learning)
            .field("sources", &self.sources.len())
            .finish()
    }
}

impl QuarryConfig {
    /// Create an empty config with built-in defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from environment variables (and `.env` if present).
    pub fn from_env() -> Self {
        let mut config = Self::new();
        config.apply_env();
        config
    }

    /// Parse a TOML document.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(raw)
            .map_err(|e| QuarryError::Configuration(format!("invalid config: {e}")))?;
        let config = Self {
            model: file.model,
            agent: file.agent,
            data: file.data,
            search: file.search,
            learning: file.learning,
            sources: file.sources,
            ..Self::default()
        };
        for (provider, entry) in file.providers {
            if let Some(key) = entry.api_key {
                config.set_api_key(&provider, key);
            }
            if let Some(url) = entry.base_url {
                config.set_base_url(&provider, url);
            }
        }
        config.validate()?;
        Ok(config)
    }

    /// Read a TOML config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            QuarryError::Configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&raw)
    }

    /// Default config file location (`<config dir>/quarry/quarry.toml`).
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "quarry")
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
    }

    /// Load the default config file when it exists, then overlay the environment.
    pub fn load() -> Result<Self> {
        let mut config = match Self::default_path() {
            Some(path) if path.is_file() => Self::from_file(path)?,
            _ => Self::new(),
        };
        config.apply_env();
        Ok(config)
    }

    /// Get (or create) the global default config.
    pub fn global() -> &'static QuarryConfig {
        DEFAULT_CONFIG.get_or_init(Self::from_env)
    }

    /// Overlay environment variables onto this config.
    pub fn apply_env(&mut self) {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error

        for (env_var, provider) in API_KEY_ENV {
            if let Ok(key) = std::env::var(env_var) {
                self.set_api_key(provider, key);
            }
        }
        for (env_var, provider) in BASE_URL_ENV {
            if let Ok(url) = std::env::var(env_var) {
                self.set_base_url(provider, url);
            }
        }
        if let Ok(model) = std::env::var(MODEL_ENV) {
            self.model = Some(model);
        }
        if let Some(turns) = env_positive_usize(MAX_TURNS_ENV) {
            self.agent.max_turns = Some(turns);
        }
        if let Some(retries) = env_usize(MAX_OUTPUT_RETRIES_ENV) {
            self.agent.max_output_retries = Some(retries);
        }
        if let Ok(url) = std::env::var(LEARNING_URL_ENV) {
            let api_key = std::env::var(LEARNING_API_KEY_ENV)
                .ok()
                .or_else(|| self.learning.as_ref().and_then(|l| l.api_key.clone()));
            self.learning = Some(LearningSettings { url, api_key });
        } else if let (Some(learning), Ok(key)) =
            (self.learning.as_mut(), std::env::var(LEARNING_API_KEY_ENV))
        {
            learning.api_key = Some(key);
        }
    }

    pub fn set_api_key(&self, provider: &str, key: String) {
        if let Ok(mut keys) = self.api_keys.write() {
            keys.insert(provider.to_string(), key);
        }
    }

    pub fn get_api_key(&self, provider: &str) -> Option<String> {
        self.api_keys.read().ok()?.get(provider).cloned()
    }

    pub fn set_base_url(&self, provider: &str, url: String) {
        if let Ok(mut urls) = self.base_urls.write() {
            urls.insert(provider.to_string(), url);
        }
    }

    pub fn get_base_url(&self, provider: &str) -> Option<String> {
        self.base_urls.read().ok()?.get(provider).cloned()
    }

    /// Check if a provider has credentials configured.
    pub fn has_credentials(&self, provider: &str) -> bool {
        self.get_api_key(provider).is_some()
    }

    pub fn with_source(mut self, source: SourceConfig) -> Self {
        self.sources.push(source);
        self
    }

    pub fn with_model(mut self, selector: impl Into<String>) -> Self {
        self.model = Some(selector.into());
        self
    }

    pub fn with_learning(mut self, url: impl Into<String>, api_key: Option<String>) -> Self {
        self.learning = Some(LearningSettings {
            url: url.into(),
            api_key,
        });
        self
    }

    /// Reject settings that would make every session fail.
    pub fn validate(&self) -> Result<()> {
        if self.data.max_rows == 0 {
            return Err(QuarryError::Configuration(
                "data.max_rows must be positive".into(),
            ));
        }
        if self.search.limit == 0 {
            return Err(QuarryError::Configuration(
                "search.limit must be positive".into(),
            ));
        }
        if self.agent.max_turns == Some(0) {
            return Err(QuarryError::Configuration(
                "agent.max_turns must be positive".into(),
            ));
        }
        for source in &self.sources {
            if source.url.trim().is_empty() {
                return Err(QuarryError::Configuration("source url is empty".into()));
            }
            if source.tables.is_some() && source.tables_pattern.is_some() {
                return Err(QuarryError::Configuration(format!(
                    "source '{}' sets both tables and tables_pattern",
                    source.name.as_deref().unwrap_or(&source.url)
                )));
            }
        }
        Ok(())
    }
}

fn env_usize(key: &str) -> Option<usize> {
    std::env::var(key).ok()?.trim().parse().ok()
}

fn env_positive_usize(key: &str) -> Option<usize> {
    env_usize(key).filter(|value| *value > 0)
}
