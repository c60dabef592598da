use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

use super::{
    anthropic::AnthropicProvider,
    base::Provider,
    configs::{
        AnthropicProviderConfig, GoogleProviderConfig, OllamaProviderConfig, OpenAiProviderConfig,
        ProviderConfig,
    },
    google::GoogleProvider,
    ollama::OllamaProvider,
    openai::OpenAiProvider,
};
use crate::errors::{ProviderError, ProviderResult};

/// The backends a model identifier can name, spelled as in `provider:model`
#[derive(EnumIter, Display, EnumString, AsRefStr, Debug, Clone, Copy, PartialEq, Eq)]
#[strum(serialize_all = "lowercase")]
pub enum ProviderType {
    Anthropic,
    Ollama,
    OpenAi,
    Google,
}

/// Where the API key must come from when none resolves
struct RequiredKey {
    label: &'static str,
    flag: &'static str,
}

impl ProviderType {
    /// Environment variables consulted for the API key, in order
    fn api_key_env(self) -> &'static [&'static str] {
        match self {
            ProviderType::Anthropic => &["ANTHROPIC_API_KEY"],
            ProviderType::OpenAi => &["OPENAI_API_KEY"],
            // AI Studio calls it GEMINI_API_KEY, so both are accepted
            ProviderType::Google => &["GOOGLE_API_KEY", "GEMINI_API_KEY"],
            ProviderType::Ollama => &[],
        }
    }

    fn base_url_env(self) -> &'static [&'static str] {
        match self {
            ProviderType::Anthropic => &["ANTHROPIC_API_BASE_URL"],
            ProviderType::OpenAi => &["OPENAI_API_BASE_URL"],
            ProviderType::Google | ProviderType::Ollama => &[],
        }
    }

    fn required_key(self) -> Option<RequiredKey> {
        match self {
            ProviderType::Anthropic => Some(RequiredKey {
                label: "anthropic",
                flag: "--anthropic-api-key",
            }),
            ProviderType::OpenAi => Some(RequiredKey {
                label: "OpenAI",
                flag: "--openai-api-key",
            }),
            ProviderType::Google | ProviderType::Ollama => None,
        }
    }
}

/// One place a setting may come from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source<'a> {
    Explicit(Option<&'a str>),
    Env(&'static str),
}

type EnvLookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Builds providers from `provider:model` identifiers, filling in keys and
/// base URLs from the environment
pub struct ProviderFactory {
    env: EnvLookup,
}

impl Default for ProviderFactory {
    fn default() -> Self {
        Self::with_env(|key| std::env::var(key).ok())
    }
}

impl ProviderFactory {
    /// Use `env` instead of the process environment
    pub fn with_env<F>(env: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        Self { env: Box::new(env) }
    }

    /// The first source holding a non-empty value wins
    pub fn resolve(&self, sources: &[Source<'_>]) -> Option<String> {
        sources.iter().find_map(|source| {
            let value = match source {
                Source::Explicit(value) => value.map(String::from),
                Source::Env(key) => (self.env)(key),
            };
            value.filter(|value| !value.is_empty())
        })
    }

    fn chain<'a>(explicit: Option<&'a str>, env_vars: &[&'static str]) -> Vec<Source<'a>> {
        std::iter::once(Source::Explicit(explicit))
            .chain(env_vars.iter().copied().map(Source::Env))
            .collect()
    }

    /// Resolve everything a provider needs without constructing it
    pub fn provider_config(
        &self,
        model_string: &str,
        base_url: Option<&str>,
        api_key: Option<&str>,
        system_prompt: &str,
    ) -> ProviderResult<ProviderConfig> {
        let (provider, model) = match model_string.split_once(':') {
            Some((provider, model)) if !provider.is_empty() && !model.is_empty() => {
                (provider, model)
            }
            _ => return Err(ProviderError::InvalidModelFormat(model_string.to_string())),
        };
        let kind: ProviderType = provider
            .parse()
            .map_err(|_| ProviderError::UnsupportedProvider(provider.to_string()))?;

        let key_env = kind.api_key_env();
        let api_key = self.resolve(&Self::chain(api_key, key_env));
        let api_key = match (api_key, kind.required_key()) {
            (Some(key), _) => key,
            (None, Some(required)) => {
                return Err(ProviderError::MissingApiKey {
                    provider: required.label,
                    flag: required.flag,
                    env_var: key_env[0],
                })
            }
            (None, None) => String::new(),
        };
        let base_url = self.resolve(&Self::chain(base_url, kind.base_url_env()));

        let model = model.to_string();
        let system_prompt = system_prompt.to_string();
        tracing::debug!(provider = %kind, model = %model, "resolved provider configuration");

        let config = match kind {
            ProviderType::Anthropic => ProviderConfig::Anthropic(AnthropicProviderConfig::new(
                api_key,
                base_url,
                model,
                system_prompt,
            )),
            ProviderType::OpenAi => ProviderConfig::OpenAi(OpenAiProviderConfig::new(
                api_key,
                base_url,
                model,
                system_prompt,
            )),
            ProviderType::Google => {
                ProviderConfig::Google(GoogleProviderConfig::new(api_key, model, system_prompt))
            }
            ProviderType::Ollama => ProviderConfig::Ollama(OllamaProviderConfig::from_env(
                &self.env,
                model,
                system_prompt,
            )?),
        };
        Ok(config)
    }

    pub fn create(
        &self,
        model_string: &str,
        base_url: Option<&str>,
        api_key: Option<&str>,
        system_prompt: &str,
    ) -> ProviderResult<Box<dyn Provider>> {
        get_provider(self.provider_config(model_string, base_url, api_key, system_prompt)?)
    }
}

/// Create a provider for `provider:model`, reading fallbacks from the process environment
pub fn create_provider(
    model_string: &str,
    base_url: Option<&str>,
    api_key: Option<&str>,
    system_prompt: &str,
) -> ProviderResult<Box<dyn Provider>> {
    ProviderFactory::default().create(model_string, base_url, api_key, system_prompt)
}

pub fn get_provider(config: ProviderConfig) -> ProviderResult<Box<dyn Provider>> {
    match config {
        ProviderConfig::Anthropic(anthropic_config) => {
            Ok(Box::new(AnthropicProvider::new(anthropic_config)?))
        }
        ProviderConfig::OpenAi(openai_config) => Ok(Box::new(OpenAiProvider::new(openai_config)?)),
        ProviderConfig::Google(google_config) => Ok(Box::new(GoogleProvider::new(google_config)?)),
        ProviderConfig::Ollama(ollama_config) => Ok(Box::new(OllamaProvider::new(ollama_config)?)),
    }
}
