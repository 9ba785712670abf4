use thiserror::Error;

use crate::shop::ValidationIssue;

#[derive(Error, Debug)]
pub enum ShopsmithError {
    #[error("config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("upstream model error: {0}")]
    Upstream(String),

    #[error("malformed model response: {0}")]
    MalformedResponse(String),

    #[error("generated shop failed validation with {} issue(s)", .0.len())]
    Validation(Vec<ValidationIssue>),
}

impl ShopsmithError {
    /// Short machine-readable name used in API error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Io(_) => "io",
            Self::InvalidRequest(_) => "invalid_request",
            Self::Upstream(_) => "upstream",
            Self::MalformedResponse(_) => "malformed_response",
            Self::Validation(_) => "validation",
        }
    }
}

pub type Result<T> = std::result::Result<T, ShopsmithError>;
