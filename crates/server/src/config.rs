use std::path::Path;
use std::time::Duration;

use chatbi_core::{TableSchema, DEFAULT_LANGUAGE, DEFAULT_MAX_RETRIES};
use collaborators::LlmConfig;
use orchestrator::{OrchestratorConfig, DEFAULT_STEP_TIMEOUT};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

pub const CONFIG_PATH_ENV: &str = "CHATBI_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "chatbi.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid value for {key}: {value}")]
    InvalidEnv { key: &'static str, value: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    pub base_url: String,
    pub model: String,
    /// Prefer `CHATBI_API_KEY` over writing the key into the file
    pub api_key: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    /// HTTP-level retries on 429/5xx, independent of the query correction loop
    pub max_retries: u32,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key: None,
            temperature: Some(0.0),
            max_tokens: None,
            max_retries: 3,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSection {
    /// SQLite database questions are answered from. Demo data when unset.
    pub url: Option<String>,
    /// SQLite database for the session audit log. Disabled when unset.
    pub audit_url: Option<String>,
    pub max_rows: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorSection {
    pub max_retries: u32,
    pub step_timeout_secs: u64,
    pub enable_ambiguity_check: bool,
    pub enable_reasoning: bool,
    pub event_capacity: usize,
    pub default_language: String,
}

impl Default for OrchestratorSection {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            step_timeout_secs: DEFAULT_STEP_TIMEOUT.as_secs(),
            enable_ambiguity_check: false,
            enable_reasoning: false,
            event_capacity: events::DEFAULT_CHANNEL_CAPACITY,
            default_language: DEFAULT_LANGUAGE.to_string(),
        }
    }
}

/// Contents of `chatbi.toml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerSection,
    pub llm: LlmSection,
    pub database: DatabaseSection,
    pub orchestrator: OrchestratorSection,
    /// Static schema catalog; introspected from the database when empty
    pub tables: Vec<TableSchema>,
}

impl AppConfig {
    /// Load from `CHATBI_CONFIG` (default `chatbi.toml`) and apply
    /// environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        let mut config = Self::from_file(Path::new(&path))?;
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// A missing file yields the defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!(path = %path.display(), "Config file does not exist, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_toml(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        info!(path = %path.display(), tables = config.tables.len(), "Config loaded");
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("CHATBI_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("CHATBI_PORT") {
            self.server.port = port.parse().map_err(|_| ConfigError::InvalidEnv {
                key: "CHATBI_PORT",
                value: port,
            })?;
        }
        if let Some(base_url) = lookup("CHATBI_LLM_BASE_URL") {
            self.llm.base_url = base_url;
        }
        if let Some(model) = lookup("CHATBI_LLM_MODEL") {
            self.llm.model = model;
        }
        if let Some(api_key) = lookup("CHATBI_API_KEY") {
            self.llm.api_key = Some(api_key);
        }
        if let Some(url) = lookup("CHATBI_DATABASE_URL") {
            self.database.url = Some(url);
        }
        if let Some(url) = lookup("CHATBI_AUDIT_DATABASE_URL") {
            self.database.audit_url = Some(url);
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        let section = &self.orchestrator;
        OrchestratorConfig::default()
            .with_max_retries(section.max_retries)
            .with_step_timeout(Duration::from_secs(section.step_timeout_secs.max(1)))
            .with_ambiguity_check(section.enable_ambiguity_check)
            .with_reasoning(section.enable_reasoning)
            .with_event_capacity(section.event_capacity)
            .with_default_language(section.default_language.clone())
    }

    pub fn llm_config(&self) -> LlmConfig {
        LlmConfig::new(
            self.llm.base_url.clone(),
            self.llm.api_key.clone().unwrap_or_default(),
            self.llm.model.clone(),
        )
        .with_temperature(self.llm.temperature)
        .with_max_tokens(self.llm.max_tokens)
        .with_max_retries(self.llm.max_retries)
    }
}
