use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{Result, ShopsmithError};
use crate::llm::context::GenerateContext;

const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
const DEFAULT_MODEL: &str = "google/gemini-flash-1.5";

/// LLM engine backed by the OpenRouter API.
///
/// OpenRouter provides an OpenAI-compatible chat completions endpoint that
/// routes to many models via a single API key.  Structured output is
/// requested with `response_format: { type: "json_schema", ... }`.
///
/// Configuration priority (highest → lowest):
///   1. Environment variables (`OPENROUTER_API_KEY`, `OPENROUTER_MODEL`, …)
///   2. `[llm]` section of `config.toml`
///   3. Built-in defaults
pub struct OpenRouterEngine {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: usize,
    temperature: f32,
    /// Optional site URL sent as `HTTP-Referer` for OpenRouter analytics.
    site_url: Option<String>,
    /// Optional app name sent as `X-Title` for OpenRouter dashboard.
    app_name: Option<String>,
}

// -- OpenAI-compatible request/response types ---

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    response_format: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: Option<ErrorBody>,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

impl OpenRouterEngine {
    pub fn new(config: &Config) -> Result<Self> {
        let api_key = super::env_or_config("OPENROUTER_API_KEY", &config.llm.openrouter_api_key)
            .ok_or_else(|| {
                ShopsmithError::Config(
                    "OpenRouter API key required: set OPENROUTER_API_KEY env var \
                     or openrouter_api_key in config"
                        .into(),
                )
            })?;

        let base_url = super::env_or_config("OPENROUTER_BASE_URL", &config.llm.openrouter_base_url)
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let model = super::env_or_config("OPENROUTER_MODEL", &config.llm.openrouter_model)
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let site_url = super::env_or_config("OPENROUTER_SITE_URL", &config.llm.openrouter_site_url);
        let app_name = super::env_or_config("OPENROUTER_APP_NAME", &config.llm.openrouter_app_name);

        let client = super::http_client(config.llm.timeout_secs)?;

        info!(
            model = %model,
            base_url = %base_url,
            max_tokens = config.llm.max_tokens,
            temperature = config.llm.temperature,
            timeout_secs = config.llm.timeout_secs,
            app_name = ?app_name,
            "OpenRouter engine initialized"
        );

        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            max_tokens: config.llm.max_tokens,
            temperature: config.llm.temperature,
            site_url,
            app_name,
        })
    }

    /// Send the prompt to OpenRouter and return the raw reply text.
    pub async fn generate(&self, ctx: &GenerateContext<'_>) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);

        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: Some(ctx.prompt.to_string()),
            }],
            response_format: json!({
                "type": "json_schema",
                "json_schema": {
                    "name": "shop",
                    "strict": false,
                    "schema": ctx.schema,
                }
            }),
            max_tokens: Some(self.max_tokens),
            temperature: Some(self.temperature),
        };

        debug!(
            model = %self.model,
            prompt_len = ctx.prompt.len(),
            max_tokens = self.max_tokens,
            "invoking OpenRouter API"
        );

        let mut req = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json");

        if let Some(ref site_url) = self.site_url {
            req = req.header("HTTP-Referer", site_url.as_str());
        }
        if let Some(ref app_name) = self.app_name {
            req = req.header("X-Title", app_name.as_str());
        }

        let resp = req.json(&body).send().await.map_err(|e| {
            ShopsmithError::Upstream(format!("OpenRouter request failed: {e}"))
        })?;

        let status = resp.status();

        if !status.is_success() {
            let error_text = resp.text().await.unwrap_or_default();
            let error_msg = if let Ok(err_resp) = serde_json::from_str::<ErrorResponse>(&error_text)
            {
                err_resp
                    .error
                    .map(|e| e.message)
                    .unwrap_or_else(|| error_text.clone())
            } else {
                error_text
            };

            warn!(
                status = %status,
                error = %error_msg,
                "OpenRouter API error"
            );

            return Err(ShopsmithError::Upstream(format!(
                "OpenRouter API returned {status}: {error_msg}"
            )));
        }

        let chat_resp: ChatResponse = resp.json().await.map_err(|e| {
            ShopsmithError::Upstream(format!("failed to decode OpenRouter response envelope: {e}"))
        })?;

        if let Some(ref usage) = chat_resp.usage {
            debug!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                total_tokens = usage.total_tokens,
                "OpenRouter usage"
            );
        }

        let response = chat_resp
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default()
            .trim()
            .to_string();

        info!(
            response_len = response.len(),
            model = %self.model,
            "OpenRouter response received"
        );

        if response.is_empty() {
            return Err(ShopsmithError::Upstream(
                "OpenRouter returned empty response".into(),
            ));
        }

        Ok(response)
    }
}
