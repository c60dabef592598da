use reqwest::StatusCode;
use thiserror::Error;

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("invalid model format. Expected provider:model, got {0}")]
    InvalidModelFormat(String),

    #[error("{provider} API key not provided. Use {flag} flag or {env_var} environment variable")]
    MissingApiKey {
        provider: &'static str,
        flag: &'static str,
        env_var: &'static str,
    },

    #[error("unsupported provider: {0}")]
    UnsupportedProvider(String),

    #[error(transparent)]
    Backend(#[from] anyhow::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("Request failed: {status} - {body}")]
    Api { status: StatusCode, body: String },

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    #[error("error marshaling tool response: {0}")]
    Marshal(#[source] serde_json::Error),
}

pub type ProviderResult<T> = Result<T, ProviderError>;
