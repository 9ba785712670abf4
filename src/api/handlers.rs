use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, error, warn};

use super::routes::ApiState;
use crate::error::ShopsmithError;
use crate::shop::{GenerationRequest, Shop};

#[derive(Serialize)]
pub struct BackendsResponse {
    pub active: String,
    pub name: String,
    pub available: Vec<String>,
}

type ApiError = (StatusCode, Json<Value>);

// -- Shops ---------------------------------------------------------------

pub async fn generate_shop(
    State(state): State<ApiState>,
    payload: Result<Json<GenerationRequest>, JsonRejection>,
) -> Result<Json<Shop>, ApiError> {
    let Json(request) = payload.map_err(|rejection| {
        debug!("rejected generate body: {}", rejection.body_text());
        error_response(ShopsmithError::InvalidRequest(rejection.body_text()))
    })?;

    state.service.generate(request).await.map(Json).map_err(|e| {
        if status_of(&e).is_server_error() {
            error!("generate shop: {e}");
        } else {
            warn!("generate shop: {e}");
        }
        error_response(e)
    })
}

pub async fn list_shops(State(state): State<ApiState>) -> Json<Vec<Shop>> {
    Json(state.service.list_all().await)
}

// -- LLM Backends --------------------------------------------------------

pub async fn llm_backends(State(state): State<ApiState>) -> Json<BackendsResponse> {
    Json(BackendsResponse {
        active: state.backends.active.clone(),
        name: state.backends.name.clone(),
        available: state.backends.available.clone(),
    })
}

pub async fn healthz() -> &'static str {
    "ok"
}

fn status_of(err: &ShopsmithError) -> StatusCode {
    match err {
        ShopsmithError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        ShopsmithError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ShopsmithError::Upstream(_) | ShopsmithError::MalformedResponse(_) => StatusCode::BAD_GATEWAY,
        ShopsmithError::Config(_) | ShopsmithError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(err: ShopsmithError) -> ApiError {
    let status = status_of(&err);

    let mut body = json!({
        "error": err.kind(),
        "message": err.to_string(),
    });
    if let ShopsmithError::Validation(issues) = &err {
        let issues: Vec<Value> = issues
            .iter()
            .map(|issue| {
                let mut value = serde_json::to_value(issue).unwrap_or_default();
                if let Value::Object(ref mut map) = value {
                    map.insert("message".into(), Value::String(issue.to_string()));
                }
                value
            })
            .collect();
        body["issues"] = Value::Array(issues);
    }

    (status, Json(body))
}
