use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{Result, ShopsmithError};
use crate::llm::context::GenerateContext;

const DEFAULT_OLLAMA_HOST: &str = "http://localhost:11434";
const DEFAULT_OLLAMA_MODEL: &str = "llama3.1:8b";

/// LLM engine backed by a local or remote Ollama instance.
///
/// Communicates via the Ollama HTTP chat API (`POST /api/chat`), passing the
/// shop schema as `format` so the reply is constrained to it.
///
/// Configuration priority (highest -> lowest):
///   1. Environment variables (`OLLAMA_HOST`, `OLLAMA_MODEL`)
///   2. `[llm]` section of `config.toml`
///   3. Built-in defaults
pub struct OllamaEngine {
    client: Client,
    base_url: String,
    model: String,
    max_tokens: usize,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    stream: bool,
    format: &'a Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<ChatOptions>,
}

#[derive(Serialize)]
struct ChatOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<usize>,
}

#[derive(Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: Option<ChatMessage>,
    #[serde(default)]
    eval_count: Option<u64>,
    #[serde(default)]
    eval_duration: Option<u64>,
    #[serde(default)]
    prompt_eval_count: Option<u64>,
}

impl OllamaEngine {
    pub fn new(config: &Config) -> Result<Self> {
        let base_url = super::env_or_config("OLLAMA_HOST", &config.llm.ollama_host)
            .unwrap_or_else(|| DEFAULT_OLLAMA_HOST.to_string())
            .trim_end_matches('/')
            .to_string();

        let model = super::env_or_config("OLLAMA_MODEL", &config.llm.ollama_model)
            .unwrap_or_else(|| DEFAULT_OLLAMA_MODEL.to_string());

        let client = super::http_client(config.llm.timeout_secs)?;

        info!(
            model = %model,
            base_url = %base_url,
            max_tokens = config.llm.max_tokens,
            temperature = config.llm.temperature,
            timeout_secs = config.llm.timeout_secs,
            "Ollama engine initialized"
        );

        Ok(Self {
            client,
            base_url,
            model,
            max_tokens: config.llm.max_tokens,
            temperature: config.llm.temperature,
        })
    }

    pub async fn generate(&self, ctx: &GenerateContext<'_>) -> Result<String> {
        let url = format!("{}/api/chat", self.base_url);

        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: ctx.prompt.to_string(),
            }],
            stream: false,
            format: ctx.schema,
            options: Some(ChatOptions {
                temperature: Some(self.temperature),
                num_predict: Some(self.max_tokens),
            }),
        };

        debug!(
            model = %self.model,
            prompt_len = ctx.prompt.len(),
            max_tokens = self.max_tokens,
            "invoking Ollama API"
        );

        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ShopsmithError::Upstream(format!("Ollama request failed: {e}")))?;

        let status = resp.status();

        if !status.is_success() {
            let error_text = resp.text().await.unwrap_or_default();
            warn!(status = %status, error = %error_text, "Ollama API error");
            return Err(ShopsmithError::Upstream(format!(
                "Ollama API returned {status}: {error_text}"
            )));
        }

        let chat_resp: ChatResponse = resp.json().await.map_err(|e| {
            ShopsmithError::Upstream(format!("failed to decode Ollama response envelope: {e}"))
        })?;

        if let (Some(eval_count), Some(eval_duration)) =
            (chat_resp.eval_count, chat_resp.eval_duration)
        {
            let tok_per_sec = if eval_duration > 0 {
                (eval_count as f64 / eval_duration as f64) * 1_000_000_000.0
            } else {
                0.0
            };
            debug!(
                eval_tokens = eval_count,
                prompt_tokens = chat_resp.prompt_eval_count.unwrap_or(0),
                tok_per_sec = format!("{tok_per_sec:.1}"),
                "Ollama usage"
            );
        }

        let response = chat_resp
            .message
            .map(|m| m.content)
            .unwrap_or_default()
            .trim()
            .to_string();

        info!(
            response_len = response.len(),
            model = %self.model,
            "Ollama response received"
        );

        if response.is_empty() {
            return Err(ShopsmithError::Upstream(
                "Ollama returned empty response".into(),
            ));
        }

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::extract::State;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::json;

    use super::*;
    use crate::shop::schema::shop_schema;
    use crate::shop::ShopType;

    async fn fake_ollama(status: StatusCode, reply: Value) -> (String, Arc<Mutex<Option<Value>>>) {
        let captured: Arc<Mutex<Option<Value>>> = Arc::default();
        let app = Router::new()
            .route(
                "/api/chat",
                post(
                    move |State(captured): State<Arc<Mutex<Option<Value>>>>, Json(body): Json<Value>| {
                        let reply = reply.clone();
                        async move {
                            *captured.lock().unwrap() = Some(body);
                            (status, Json(reply))
                        }
                    },
                ),
            )
            .with_state(captured.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}"), captured)
    }

    fn engine(base_url: &str) -> OllamaEngine {
        OllamaEngine {
            client: Client::new(),
            base_url: base_url.to_string(),
            model: "llama3.1:8b".into(),
            max_tokens: 256,
            temperature: 0.1,
        }
    }

    #[tokio::test]
    async fn passes_schema_as_format() {
        let reply = json!({
            "message": { "role": "assistant", "content": " {\"id\":4} " },
            "done": true,
            "eval_count": 12,
            "eval_duration": 1000
        });
        let (base, captured) = fake_ollama(StatusCode::OK, reply).await;

        let schema = shop_schema(ShopType::Potions);
        let ctx = GenerateContext { prompt: "generate a potions shop", schema: &schema };
        let text = engine(&base).generate(&ctx).await.unwrap();
        assert_eq!(text, "{\"id\":4}");

        let body = captured.lock().unwrap().clone().unwrap();
        assert_eq!(body["format"], schema);
        assert_eq!(body["stream"], false);
        assert_eq!(body["messages"][0]["content"], "generate a potions shop");
        assert_eq!(body["options"]["num_predict"], 256);
    }

    #[tokio::test]
    async fn server_error_is_upstream() {
        let (base, _) = fake_ollama(StatusCode::NOT_FOUND, json!({ "error": "model not found" })).await;

        let schema = shop_schema(ShopType::Potions);
        let ctx = GenerateContext { prompt: "p", schema: &schema };
        let err = engine(&base).generate(&ctx).await.unwrap_err();
        assert!(matches!(err, ShopsmithError::Upstream(_)));
        assert!(err.to_string().contains("model not found"));
    }
}
