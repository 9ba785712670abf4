pub mod context;

mod gemini;
mod ollama;
mod openrouter;

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use crate::config::Config;
use crate::error::{Result, ShopsmithError};

pub use context::GenerateContext;

// -- Plugin trait -----------------------------------------------------------

/// Trait that all LLM backends implement.  The shop service only ever sees
/// this narrow capability: a prompt and a schema in, raw text out.
#[async_trait::async_trait]
pub trait LlmBackend: Send + Sync {
    /// Human-readable name of this backend (e.g. "Gemini API").
    fn name(&self) -> &str;

    /// Ask the model for a reply matching `ctx.schema`.
    ///
    /// The returned text is expected, not guaranteed, to be JSON.
    async fn generate(&self, ctx: &GenerateContext<'_>) -> Result<String>;
}

// -- Plugin registry --------------------------------------------------------

/// Registry of available LLM backends.
pub struct LlmPluginRegistry {
    backends: HashMap<String, Arc<dyn LlmBackend>>,
}

impl LlmPluginRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            backends: HashMap::new(),
        }
    }

    /// Register a new backend plugin.
    pub fn register(&mut self, key: &str, backend: Arc<dyn LlmBackend>) {
        info!(backend = key, name = backend.name(), "LLM plugin registered");
        self.backends.insert(key.to_string(), backend);
    }

    /// Get a registered backend by key.
    pub fn get(&self, key: &str) -> Option<Arc<dyn LlmBackend>> {
        self.backends.get(key).cloned()
    }

    /// List all registered backend keys, sorted.
    pub fn list(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.backends.keys().cloned().collect();
        keys.sort();
        keys
    }
}

// -- Trait implementations for built-in backends ----------------------------

#[async_trait::async_trait]
impl LlmBackend for gemini::GeminiEngine {
    fn name(&self) -> &str { "Gemini API" }
    async fn generate(&self, ctx: &GenerateContext<'_>) -> Result<String> {
        self.generate(ctx).await
    }
}

#[async_trait::async_trait]
impl LlmBackend for openrouter::OpenRouterEngine {
    fn name(&self) -> &str { "OpenRouter API" }
    async fn generate(&self, ctx: &GenerateContext<'_>) -> Result<String> {
        self.generate(ctx).await
    }
}

#[async_trait::async_trait]
impl LlmBackend for ollama::OllamaEngine {
    fn name(&self) -> &str { "Ollama" }
    async fn generate(&self, ctx: &GenerateContext<'_>) -> Result<String> {
        self.generate(ctx).await
    }
}

// -- LlmEngine (wraps active backend + plugin registry) ---------------------

/// Unified LLM engine that dispatches to one of the registered backends.
///
/// Built-in backends:
/// - **Gemini**      -- Google Generative Language API (default)
/// - **OpenRouter**  -- OpenAI-compatible API with JSON-schema output
/// - **Ollama**      -- local or remote Ollama with schema-constrained output
pub struct LlmEngine {
    /// The active backend used for generation.
    active: Arc<dyn LlmBackend>,
    /// The key identifying the active backend.
    active_key: String,
    /// Registry of all available backends.
    plugins: LlmPluginRegistry,
}

impl LlmEngine {
    /// Build the engine from config.
    ///
    /// The backend is selected by `config.llm.backend` (overridable with the
    /// `LLM_BACKEND` environment variable).
    pub fn new(config: &Config) -> Result<Self> {
        let backend = std::env::var("LLM_BACKEND")
            .unwrap_or_else(|_| config.llm.backend.clone());

        let mut plugins = LlmPluginRegistry::new();

        // Backends that lack credentials are simply not registered.
        if let Ok(engine) = gemini::GeminiEngine::new(config) {
            plugins.register("gemini", Arc::new(engine));
        }
        if let Ok(engine) = openrouter::OpenRouterEngine::new(config) {
            plugins.register("openrouter", Arc::new(engine));
        }
        if let Ok(engine) = ollama::OllamaEngine::new(config) {
            plugins.register("ollama", Arc::new(engine));
        }

        Self::select(plugins, &backend)
    }

    /// Pick `backend` out of an already populated registry.
    pub fn select(plugins: LlmPluginRegistry, backend: &str) -> Result<Self> {
        let active = match plugins.get(backend) {
            Some(b) => {
                info!(backend = %backend, name = b.name(), "LLM backend selected");
                b
            }
            None => {
                return Err(ShopsmithError::Config(format!(
                    "unknown or unconfigured LLM backend \"{backend}\" (available: [{}])",
                    plugins.list().join(", "),
                )));
            }
        };

        Ok(Self {
            active,
            active_key: backend.to_string(),
            plugins,
        })
    }

    /// List all available backend keys.
    pub fn available_backends(&self) -> Vec<String> {
        self.plugins.list()
    }

    /// Return a human-readable description of the active backend.
    pub fn backend_info(&self) -> &str {
        self.active.name()
    }

    /// Return the key of the active backend.
    pub fn active_backend(&self) -> &str {
        &self.active_key
    }
}

#[async_trait::async_trait]
impl LlmBackend for LlmEngine {
    fn name(&self) -> &str {
        self.backend_info()
    }

    async fn generate(&self, ctx: &GenerateContext<'_>) -> Result<String> {
        self.active.generate(ctx).await
    }
}

/// Shared by the HTTP backends: a configured value, unless an env var wins.
fn env_or_config(var: &str, configured: &str) -> Option<String> {
    std::env::var(var).ok().filter(|v| !v.is_empty()).or_else(|| {
        if configured.is_empty() {
            None
        } else {
            Some(configured.to_string())
        }
    })
}

/// Bounded HTTP client for model calls.
fn http_client(timeout_secs: u64) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(if timeout_secs > 0 {
            std::time::Duration::from_secs(timeout_secs)
        } else {
            std::time::Duration::from_secs(300)
        })
        .build()
        .map_err(|e| ShopsmithError::Config(format!("failed to create HTTP client: {e}")))
}
