use std::net::Ipv6Addr;

use anyhow::{bail, Context, Result};
use url::Url;

use super::ollama::OLLAMA_HOST;

pub const ANTHROPIC_HOST: &str = "https://api.anthropic.com";
pub const ANTHROPIC_MAX_TOKENS: u32 = 4096;
pub const OPENAI_HOST: &str = "https://api.openai.com/v1";
pub const GOOGLE_HOST: &str = "https://generativelanguage.googleapis.com/v1beta";

const OLLAMA_DEFAULT_PORT: u16 = 11434;

// Unified enum to wrap different provider configurations
#[derive(Debug, Clone)]
pub enum ProviderConfig {
    Anthropic(AnthropicProviderConfig),
    OpenAi(OpenAiProviderConfig),
    Google(GoogleProviderConfig),
    Ollama(OllamaProviderConfig),
}

#[derive(Debug, Clone)]
pub struct AnthropicProviderConfig {
    pub host: String,
    pub api_key: String,
    pub model: String,
    pub system_prompt: String,
    pub max_tokens: u32,
}

impl AnthropicProviderConfig {
    pub fn new(api_key: String, host: Option<String>, model: String, system_prompt: String) -> Self {
        Self {
            host: host.unwrap_or_else(|| ANTHROPIC_HOST.to_string()),
            api_key,
            model,
            system_prompt,
            max_tokens: ANTHROPIC_MAX_TOKENS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OpenAiProviderConfig {
    pub host: String,
    pub api_key: String,
    pub model: String,
    pub system_prompt: String,
}

impl OpenAiProviderConfig {
    pub fn new(api_key: String, host: Option<String>, model: String, system_prompt: String) -> Self {
        Self {
            host: host.unwrap_or_else(|| OPENAI_HOST.to_string()),
            api_key,
            model,
            system_prompt,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GoogleProviderConfig {
    pub host: String,
    /// May be empty; the API rejects the call in that case
    pub api_key: String,
    pub model: String,
    pub system_prompt: String,
}

impl GoogleProviderConfig {
    pub fn new(api_key: String, model: String, system_prompt: String) -> Self {
        Self {
            host: GOOGLE_HOST.to_string(),
            api_key,
            model,
            system_prompt,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OllamaProviderConfig {
    pub host: String,
    pub model: String,
    pub system_prompt: String,
}

impl OllamaProviderConfig {
    /// Build the config from Ollama's own environment (`OLLAMA_HOST`)
    pub fn from_env<F>(env: F, model: String, system_prompt: String) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = match env("OLLAMA_HOST") {
            Some(raw) => parse_ollama_host(&raw)?,
            None => OLLAMA_HOST.to_string(),
        };

        Ok(Self {
            host,
            model,
            system_prompt,
        })
    }
}

/// Parse an `OLLAMA_HOST` value the way the Ollama CLI reads it.
///
/// The scheme defaults to http and the port to 11434 (80 or 443 when the
/// scheme is given explicitly). Quotes and surrounding whitespace are ignored.
pub fn parse_ollama_host(raw: &str) -> Result<String> {
    let value = raw.trim().trim_matches(|c: char| c == '"' || c == '\'');
    if value.is_empty() {
        return Ok(OLLAMA_HOST.to_string());
    }

    let (scheme, rest, default_port) = match value.split_once("://") {
        None => ("http", value, OLLAMA_DEFAULT_PORT),
        Some(("http", rest)) => ("http", rest, 80),
        Some(("https", rest)) => ("https", rest, 443),
        Some((scheme, _)) => bail!("unsupported scheme {:?} in OLLAMA_HOST {:?}", scheme, raw),
    };

    let (host_port, path) = match rest.split_once('/') {
        Some((host_port, path)) => (host_port, format!("/{}", path)),
        None => (rest, String::new()),
    };
    let host_port = match host_port.parse::<Ipv6Addr>() {
        Ok(ip) => format!("[{}]", ip),
        Err(_) if host_port.is_empty() => "127.0.0.1".to_string(),
        Err(_) => host_port.to_string(),
    };

    let mut url = Url::parse(&format!("{}://{}{}", scheme, host_port, path))
        .with_context(|| format!("invalid OLLAMA_HOST {:?}", raw))?;
    if url.port().is_none() && url.set_port(Some(default_port)).is_err() {
        bail!("invalid OLLAMA_HOST {:?}: cannot carry a port", raw);
    }

    Ok(url.as_str().trim_end_matches('/').to_string())
}
