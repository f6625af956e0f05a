//! User configuration, read from TOML.
//!
//! Lives at `$XDG_CONFIG_HOME/doc-oracle/config.toml`. Every field is
//! optional; a missing file means all defaults.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::chain::ChainSettings;
use crate::loader::LoaderSettings;
use crate::prompt::PromptOptions;
use crate::provider::ProviderSettings;

/// Errors from reading the config file.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigFileError {
    #[error("failed to read config: {path}")]
    #[diagnostic(
        code(oracle::config_file::read),
        help("Ensure the config file is readable, or remove it to use the defaults.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {path}: {message}")]
    #[diagnostic(
        code(oracle::config_file::parse),
        help("Check the TOML syntax in the config file.")
    )]
    Parse { path: String, message: String },
}

pub type ConfigFileResult<T> = std::result::Result<T, ConfigFileError>;

/// Per-provider overrides (`[providers.<name>]`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderOverride {
    /// Replaces the built-in OpenAI-compatible base URL.
    #[serde(default)]
    pub base_url: Option<String>,
}

/// Contents of `config.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleConfig {
    #[serde(default = "default_persona")]
    pub persona: String,
    #[serde(default = "default_true")]
    pub replace_currency_marker: bool,
    /// Timeout for page, video and caption fetches.
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
    /// Read timeout while a reply streams.
    #[serde(default = "default_stream_timeout_secs")]
    pub stream_timeout_secs: u64,
    /// Caption languages tried in order.
    #[serde(default = "default_transcript_languages")]
    pub transcript_languages: Vec<String>,
    #[serde(default)]
    pub providers: BTreeMap<String, ProviderOverride>,
}

fn default_persona() -> String {
    "Victor".into()
}
fn default_true() -> bool {
    true
}
fn default_http_timeout_secs() -> u64 {
    30
}
fn default_stream_timeout_secs() -> u64 {
    120
}
fn default_transcript_languages() -> Vec<String> {
    vec!["pt".into(), "en".into()]
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            persona: default_persona(),
            replace_currency_marker: default_true(),
            http_timeout_secs: default_http_timeout_secs(),
            stream_timeout_secs: default_stream_timeout_secs(),
            transcript_languages: default_transcript_languages(),
            providers: BTreeMap::new(),
        }
    }
}

impl OracleConfig {
    /// Load from a TOML file.
    pub fn load(path: &Path) -> ConfigFileResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigFileError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::parse(&content, path)
    }

    /// Load from a TOML file, falling back to defaults when it does not exist.
    pub fn load_or_default(path: &Path) -> ConfigFileResult<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        Self::load(path)
    }

    fn parse(content: &str, path: &Path) -> ConfigFileResult<Self> {
        toml::from_str(content).map_err(|e| ConfigFileError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    pub fn chain_settings(&self) -> ChainSettings {
        ChainSettings {
            loader: LoaderSettings {
                http_timeout: Duration::from_secs(self.http_timeout_secs),
                transcript_languages: self.transcript_languages.clone(),
            },
            prompt: PromptOptions {
                persona: self.persona.clone(),
                replace_currency_marker: self.replace_currency_marker,
            },
        }
    }

    pub fn provider_settings(&self) -> ProviderSettings {
        let base_urls = self
            .providers
            .iter()
            .filter_map(|(name, o)| o.base_url.clone().map(|url| (name.to_lowercase(), url)))
            .collect();
        ProviderSettings {
            stream_timeout: Duration::from_secs(self.stream_timeout_secs),
            base_urls,
        }
    }
}
