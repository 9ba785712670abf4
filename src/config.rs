use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{Result, ShopsmithError};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Address the HTTP API listens on.
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Origins allowed to call the API from a browser.  Empty disables the
    /// CORS layer entirely; `"*"` allows any origin.
    #[serde(default)]
    pub cors_origins: Vec<String>,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub validation: ValidationConfig,
}

// -- LLM -----------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    /// Backend to use: "gemini" (default), "openrouter" or "ollama".
    /// Can be overridden with the `LLM_BACKEND` env var.
    #[serde(default = "default_backend")]
    pub backend: String,

    /// HTTP timeout for a single model call in seconds (0 = 300s ceiling).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,

    // -- Gemini API settings (backend = "gemini") --

    /// Google AI Studio key.  `GEMINI_API_KEY` / `GOOGLE_API_KEY` take
    /// precedence.
    #[serde(default)]
    pub gemini_api_key: String,

    /// Model name (e.g. "gemini-1.5-flash").  `GEMINI_MODEL` overrides.
    #[serde(default = "default_gemini_model")]
    pub gemini_model: String,

    /// Override for the Generative Language API base URL.
    #[serde(default)]
    pub gemini_base_url: String,

    // -- OpenRouter settings (backend = "openrouter") --

    #[serde(default)]
    pub openrouter_api_key: String,

    #[serde(default)]
    pub openrouter_model: String,

    #[serde(default)]
    pub openrouter_base_url: String,

    /// Sent as `HTTP-Referer` for OpenRouter analytics.
    #[serde(default)]
    pub openrouter_site_url: String,

    /// Sent as `X-Title` for the OpenRouter dashboard.
    #[serde(default)]
    pub openrouter_app_name: String,

    // -- Ollama settings (backend = "ollama") --

    #[serde(default)]
    pub ollama_host: String,

    #[serde(default)]
    pub ollama_model: String,
}

// -- Validation ----------------------------------------------------------

/// Domain limits applied to requests and to generated shops.
#[derive(Debug, Clone, Deserialize)]
pub struct ValidationConfig {
    /// Largest `numberOfItems` a request may ask for.
    #[serde(default = "default_max_items")]
    pub max_items: u32,

    /// How far an item's level may drift from the requested level.
    #[serde(default)]
    pub level_tolerance: u32,

    /// Upper damage bound is `max_damage_per_level * level`.
    #[serde(default = "default_max_damage_per_level")]
    pub max_damage_per_level: u32,

    /// Upper armor bound is `max_armor_per_level * level`.
    #[serde(default = "default_max_armor_per_level")]
    pub max_armor_per_level: u32,
}

fn default_bind() -> String {
    "127.0.0.1:3030".to_string()
}
fn default_backend() -> String {
    "gemini".to_string()
}
fn default_timeout_secs() -> u64 {
    120
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> usize {
    2048
}
fn default_gemini_model() -> String {
    "gemini-1.5-flash".to_string()
}
fn default_max_items() -> u32 {
    50
}
fn default_max_damage_per_level() -> u32 {
    20
}
fn default_max_armor_per_level() -> u32 {
    10
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            timeout_secs: default_timeout_secs(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            gemini_api_key: String::new(),
            gemini_model: default_gemini_model(),
            gemini_base_url: String::new(),
            openrouter_api_key: String::new(),
            openrouter_model: String::new(),
            openrouter_base_url: String::new(),
            openrouter_site_url: String::new(),
            openrouter_app_name: String::new(),
            ollama_host: String::new(),
            ollama_model: String::new(),
        }
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_items: default_max_items(),
            level_tolerance: 0,
            max_damage_per_level: default_max_damage_per_level(),
            max_armor_per_level: default_max_armor_per_level(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            cors_origins: Vec::new(),
            llm: LlmConfig::default(),
            validation: ValidationConfig::default(),
        }
    }
}

// -- Config impl ---------------------------------------------------------

impl Config {
    /// Load config from the given path, or the default XDG config location.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::default_config_path(),
        };

        let config = if config_path.exists() {
            info!("loading config from {}", config_path.display());
            let contents = std::fs::read_to_string(&config_path).map_err(ShopsmithError::Io)?;
            toml::from_str(&contents)
                .map_err(|e| ShopsmithError::Config(format!("parse error: {e}")))?
        } else {
            info!("no config file found, using defaults");
            Config::default()
        };

        Ok(config)
    }

    /// Returns the default config file path: `$XDG_CONFIG_HOME/shopsmith/config.toml`
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join("shopsmith")
            .join("config.toml")
    }

    /// Generate the default config file contents.
    pub fn default_config_contents() -> &'static str {
        include_str!("../config.example.toml")
    }
}
