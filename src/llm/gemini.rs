use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{Result, ShopsmithError};
use crate::llm::context::GenerateContext;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// LLM engine backed by the Google Generative Language API.
///
/// Calls `models/{model}:generateContent` with `responseMimeType` set to
/// JSON and the shop schema as `responseSchema`, so the model replies with
/// a bare JSON document.
///
/// Configuration priority (highest → lowest):
///   1. Environment variables (`GEMINI_API_KEY` / `GOOGLE_API_KEY`, `GEMINI_MODEL`)
///   2. `[llm]` section of `config.toml`
///   3. Built-in defaults
pub struct GeminiEngine {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: usize,
}

// -- generateContent request/response types ---

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
    response_schema: Value,
    temperature: f32,
    max_output_tokens: usize,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: Option<ErrorBody>,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

impl GeminiEngine {
    pub fn new(config: &Config) -> Result<Self> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .ok()
            .filter(|k| !k.is_empty())
            .or_else(|| super::env_or_config("GOOGLE_API_KEY", &config.llm.gemini_api_key))
            .ok_or_else(|| {
                ShopsmithError::Config(
                    "Gemini API key required: set GEMINI_API_KEY env var \
                     or gemini_api_key in config"
                        .into(),
                )
            })?;

        let base_url = super::env_or_config("GEMINI_BASE_URL", &config.llm.gemini_base_url)
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let model = super::env_or_config("GEMINI_MODEL", &config.llm.gemini_model)
            .ok_or_else(|| ShopsmithError::Config("gemini_model must not be empty".into()))?;

        let client = super::http_client(config.llm.timeout_secs)?;

        info!(
            model = %model,
            base_url = %base_url,
            timeout_secs = config.llm.timeout_secs,
            "Gemini engine initialized"
        );

        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            temperature: config.llm.temperature,
            max_tokens: config.llm.max_tokens,
        })
    }

    /// Send the prompt to Gemini and return the JSON text of the first candidate.
    pub async fn generate(&self, ctx: &GenerateContext<'_>) -> Result<String> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);

        let body = GenerateRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: ctx.prompt.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
                response_schema: to_gemini_schema(ctx.schema),
                temperature: self.temperature,
                max_output_tokens: self.max_tokens,
            },
        };

        debug!(
            model = %self.model,
            prompt_len = ctx.prompt.len(),
            "invoking Gemini API"
        );

        let resp = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ShopsmithError::Upstream(format!("Gemini request failed: {e}")))?;

        let status = resp.status();

        if !status.is_success() {
            let error_text = resp.text().await.unwrap_or_default();
            let error_msg = serde_json::from_str::<ErrorResponse>(&error_text)
                .ok()
                .and_then(|r| r.error)
                .map(|e| e.message)
                .unwrap_or(error_text);

            warn!(status = %status, error = %error_msg, "Gemini API error");

            return Err(ShopsmithError::Upstream(format!(
                "Gemini API returned {status}: {error_msg}"
            )));
        }

        let gen_resp: GenerateResponse = resp.json().await.map_err(|e| {
            ShopsmithError::Upstream(format!("failed to decode Gemini response envelope: {e}"))
        })?;

        if let Some(ref usage) = gen_resp.usage_metadata {
            debug!(
                prompt_tokens = usage.prompt_token_count,
                candidate_tokens = usage.candidates_token_count,
                "Gemini usage"
            );
        }

        let candidate = gen_resp.candidates.into_iter().next();
        let finish_reason = candidate.as_ref().and_then(|c| c.finish_reason.clone());
        let response: String = candidate
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().map(|p| p.text).collect())
            .unwrap_or_default();
        let response = response.trim().to_string();

        info!(
            response_len = response.len(),
            finish_reason = ?finish_reason,
            model = %self.model,
            "Gemini response received"
        );

        if response.is_empty() {
            return Err(ShopsmithError::Upstream(format!(
                "Gemini returned empty response (finish reason: {})",
                finish_reason.as_deref().unwrap_or("unknown")
            )));
        }

        Ok(response)
    }
}

/// Rewrite a plain JSON schema into Gemini's OpenAPI dialect, which spells
/// `type` values in upper case.
fn to_gemini_schema(schema: &Value) -> Value {
    match schema {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, value)| {
                    let value = match (key.as_str(), value) {
                        ("type", Value::String(t)) => Value::String(t.to_uppercase()),
                        // Property names are user data, not schema keywords.
                        ("properties", Value::Object(props)) => Value::Object(
                            props
                                .iter()
                                .map(|(name, sub)| (name.clone(), to_gemini_schema(sub)))
                                .collect(),
                        ),
                        _ => to_gemini_schema(value),
                    };
                    (key.clone(), value)
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(to_gemini_schema).collect()),
        other => other.clone(),
    }
}
