//! Chat-completion providers.
//!
//! The registry maps a provider name to its ordered list of allowed models and
//! a factory that builds a streaming [`ChatModel`] client. The built-in
//! registry carries Groq and OpenAI, both spoken to through the
//! OpenAI-compatible Chat Completions API. Clients do no I/O until the first
//! [`ChatModel::stream`] call, so a bad API key surfaces on first use.

pub mod openai;
pub mod scripted;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::ConfigError;

/// Errors raised while streaming a model reply.
#[derive(Debug, Error, Diagnostic)]
pub enum StreamError {
    #[error("{provider} rejected the API key")]
    #[diagnostic(
        code(oracle::stream::auth),
        help("Check the API key for {provider} (`/key <secret>`) and re-initialize.")
    )]
    Auth { provider: String },

    #[error("{provider} returned HTTP {status}: {message}")]
    #[diagnostic(
        code(oracle::stream::http),
        help("The provider refused the request. Check the model name and your account quota.")
    )]
    Http {
        provider: String,
        status: u16,
        message: String,
    },

    #[error("could not reach {provider}: {message}")]
    #[diagnostic(
        code(oracle::stream::transport),
        help("Check the network connection and the provider base URL in the config file.")
    )]
    Transport { provider: String, message: String },

    #[error("stream interrupted: {message}")]
    #[diagnostic(
        code(oracle::stream::interrupted),
        help("The reply was cut off before it finished. Nothing was added to the history; send the message again.")
    )]
    Interrupted { message: String },

    #[error("malformed stream event: {message}")]
    #[diagnostic(
        code(oracle::stream::malformed),
        help("The provider sent data that is not an OpenAI-compatible stream chunk.")
    )]
    Malformed { message: String },

    #[error("provider error: {message}")]
    #[diagnostic(
        code(oracle::stream::provider),
        help("The provider reported an error while generating the reply.")
    )]
    Provider { message: String },
}

/// Who authored a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::System => write!(f, "system"),
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
        }
    }
}

/// A chat message for multi-turn conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Reply tokens in arrival order. An `Err` item ends the stream.
pub type TokenStream<'a> = Box<dyn Iterator<Item = Result<String, StreamError>> + 'a>;

/// A chat client bound to one provider model.
pub trait ChatModel {
    /// Start a streaming completion for the given messages.
    fn stream(&self, messages: &[ChatMessage]) -> Result<TokenStream<'_>, StreamError>;

    /// The model this client talks to.
    fn model_name(&self) -> &str;
}

/// Builds clients for one provider.
pub trait ClientFactory {
    fn connect(&self, model: &str, api_key: &str) -> Box<dyn ChatModel>;
}

impl<F> ClientFactory for F
where
    F: Fn(&str, &str) -> Box<dyn ChatModel>,
{
    fn connect(&self, model: &str, api_key: &str) -> Box<dyn ChatModel> {
        self(model, api_key)
    }
}

/// A compiled-in provider definition.
#[derive(Debug, Clone, Copy)]
pub struct BuiltinProvider {
    pub name: &'static str,
    pub models: &'static [&'static str],
    pub default_base_url: &'static str,
    /// Environment variable that may pre-seed the session's key.
    pub api_key_env: &'static str,
}

pub const GROQ: BuiltinProvider = BuiltinProvider {
    name: "Groq",
    models: &["llama-3.3-70b-versatile", "mixtral-8x7b-32768", "gemma2-9b-it"],
    default_base_url: "https://api.groq.com/openai/v1",
    api_key_env: "GROQ_API_KEY",
};

pub const OPENAI: BuiltinProvider = BuiltinProvider {
    name: "OpenAI",
    models: &[
        "gpt-4o",
        "gpt-4o-mini",
        "gpt-4-turbo",
        "gpt-4",
        "gpt-3.5-turbo",
        "o1-preview",
        "o1-mini",
    ],
    default_base_url: "https://api.openai.com/v1",
    api_key_env: "OPENAI_API_KEY",
};

/// Built-in providers in display order.
pub const BUILTIN_PROVIDERS: [BuiltinProvider; 2] = [GROQ, OPENAI];

/// Endpoint settings for the built-in HTTP clients.
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    /// Read timeout while waiting for stream data.
    pub stream_timeout: Duration,
    /// Base URL overrides keyed by lowercase provider name.
    pub base_urls: BTreeMap<String, String>,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            stream_timeout: Duration::from_secs(120),
            base_urls: BTreeMap::new(),
        }
    }
}

impl ProviderSettings {
    fn base_url(&self, provider: &BuiltinProvider) -> String {
        self.base_urls
            .get(&provider.name.to_lowercase())
            .cloned()
            .unwrap_or_else(|| provider.default_base_url.to_string())
    }
}

/// One registry entry: allowed models plus client factory.
pub struct ProviderEntry {
    pub name: String,
    pub models: Vec<String>,
    factory: Arc<dyn ClientFactory>,
}

impl ProviderEntry {
    pub fn allows(&self, model: &str) -> bool {
        self.models.iter().any(|m| m == model)
    }
}

impl std::fmt::Debug for ProviderEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderEntry")
            .field("name", &self.name)
            .field("models", &self.models)
            .finish()
    }
}

/// Read-only mapping from provider name to models and client factory.
#[derive(Debug, Default)]
pub struct ProviderRegistry {
    entries: Vec<ProviderEntry>,
}

impl ProviderRegistry {
    /// Registry with Groq and OpenAI backed by HTTP clients.
    pub fn builtin(settings: &ProviderSettings) -> Self {
        Self::builtin_with(|provider| {
            Arc::new(openai::OpenAiCompatFactory::new(
                provider.name,
                settings.base_url(provider),
                settings.stream_timeout,
            ))
        })
    }

    /// Registry with the built-in names and model lists, but clients from
    /// `make_factory`.
    pub fn builtin_with(make_factory: impl Fn(&BuiltinProvider) -> Arc<dyn ClientFactory>) -> Self {
        let mut registry = Self::default();
        for provider in &BUILTIN_PROVIDERS {
            registry.register(
                provider.name,
                provider.models.iter().map(|m| m.to_string()).collect(),
                make_factory(provider),
            );
        }
        registry
    }

    /// Add a provider. A provider registered twice keeps the later entry.
    pub fn register(&mut self, name: &str, models: Vec<String>, factory: Arc<dyn ClientFactory>) {
        self.entries.retain(|e| !e.name.eq_ignore_ascii_case(name));
        self.entries.push(ProviderEntry {
            name: name.to_string(),
            models,
            factory,
        });
    }

    /// Provider names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    pub fn entries(&self) -> &[ProviderEntry] {
        &self.entries
    }

    /// Look up a provider by name (case-insensitive).
    pub fn get(&self, provider: &str) -> Option<&ProviderEntry> {
        self.entries
            .iter()
            .find(|e| e.name.eq_ignore_ascii_case(provider.trim()))
    }

    /// Check that `model` is offered by `provider`.
    pub fn resolve(&self, provider: &str, model: &str) -> Result<&ProviderEntry, ConfigError> {
        let entry = self.get(provider).ok_or_else(|| ConfigError::UnknownProvider {
            provider: provider.to_string(),
            known: self.names().collect::<Vec<_>>().join(", "),
        })?;
        if !entry.allows(model) {
            return Err(ConfigError::UnknownModel {
                provider: entry.name.clone(),
                model: model.to_string(),
                allowed: entry.models.join(", "),
            });
        }
        Ok(entry)
    }

    /// Build a client for a validated provider/model pair.
    pub fn connect(
        &self,
        provider: &str,
        model: &str,
        api_key: &str,
    ) -> Result<Box<dyn ChatModel>, ConfigError> {
        let entry = self.resolve(provider, model)?;
        Ok(entry.factory.connect(model, api_key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::scripted::{Script, ScriptedModel};

    fn registry() -> ProviderRegistry {
        ProviderRegistry::builtin_with(|_| {
            Arc::new(|model: &str, _key: &str| -> Box<dyn ChatModel> {
                Box::new(ScriptedModel::new(model, Script::Echo))
            })
        })
    }

    #[test]
    fn builtin_registry_lists_both_providers() {
        let reg = ProviderRegistry::builtin(&ProviderSettings::default());
        assert_eq!(reg.names().collect::<Vec<_>>(), vec!["Groq", "OpenAI"]);
        assert_eq!(reg.get("groq").unwrap().models[0], "llama-3.3-70b-versatile");
        assert_eq!(reg.get("OpenAI").unwrap().models.len(), 7);
    }

    #[test]
    fn resolve_accepts_listed_model() {
        let reg = registry();
        let entry = reg.resolve("Groq", "gemma2-9b-it").unwrap();
        assert_eq!(entry.name, "Groq");
    }

    #[test]
    fn resolve_rejects_unknown_provider() {
        let err = registry().resolve("Anthropic", "claude").unwrap_err();
        assert!(matches!(err, ConfigError::UnknownProvider { .. }));
    }

    #[test]
    fn resolve_rejects_model_from_other_provider() {
        let err = registry().resolve("Groq", "gpt-4o").unwrap_err();
        match err {
            ConfigError::UnknownModel { provider, model, .. } => {
                assert_eq!(provider, "Groq");
                assert_eq!(model, "gpt-4o");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn connect_uses_factory() {
        let model = registry().connect("openai", "gpt-4o-mini", "sk-test").unwrap();
        assert_eq!(model.model_name(), "gpt-4o-mini");
    }

    #[test]
    fn register_replaces_same_name() {
        let mut reg = registry();
        reg.register(
            "groq",
            vec!["only-model".into()],
            Arc::new(|m: &str, _k: &str| -> Box<dyn ChatModel> {
                Box::new(ScriptedModel::new(m, Script::Echo))
            }),
        );
        assert_eq!(reg.entries().len(), 2);
        assert!(reg.resolve("Groq", "only-model").is_ok());
    }

    #[test]
    fn base_url_override() {
        let mut settings = ProviderSettings::default();
        settings
            .base_urls
            .insert("groq".into(), "http://localhost:8080/v1".into());
        assert_eq!(settings.base_url(&GROQ), "http://localhost:8080/v1");
        assert_eq!(settings.base_url(&OPENAI), OPENAI.default_base_url);
    }

    #[test]
    fn role_serializes_lowercase() {
        let json = serde_json::to_string(&ChatMessage::assistant("hi")).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"hi"}"#);
    }
}
