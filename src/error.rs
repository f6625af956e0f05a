//! Rich diagnostic error types for doc-oracle.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes and help text so the user knows which action failed
//! and what to change before trying again.

use miette::Diagnostic;
use thiserror::Error;

pub use crate::loader::error::LoadError;
pub use crate::provider::StreamError;

/// Top-level error type for doc-oracle.
///
/// Every failure is surfaced at the action that caused it (initialize, reset,
/// or send); nothing is retried.
#[derive(Debug, Error, Diagnostic)]
pub enum OracleError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Stream(#[from] StreamError),
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("unknown provider \"{provider}\"")]
    #[diagnostic(
        code(oracle::config::unknown_provider),
        help("Known providers are: {known}. List them with `doc-oracle providers`.")
    )]
    UnknownProvider { provider: String, known: String },

    #[error("model \"{model}\" is not offered by provider \"{provider}\"")]
    #[diagnostic(
        code(oracle::config::unknown_model),
        help("Pick one of: {allowed}.")
    )]
    UnknownModel {
        provider: String,
        model: String,
        allowed: String,
    },

    #[error("missing required input: {field}")]
    #[diagnostic(
        code(oracle::config::missing_input),
        help(
            "Initializing the oracle needs a document type, a source, a provider, \
             a model and an API key. Set the {field} and try again."
        )
    )]
    MissingInput { field: &'static str },
}

// ---------------------------------------------------------------------------
// Session errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum SessionError {
    #[error("the oracle has not been initialized")]
    #[diagnostic(
        code(oracle::session::not_initialized),
        help("Load a document and initialize the oracle (`/init`) before chatting.")
    )]
    NotInitialized,
}

/// Convenience alias for functions returning doc-oracle results.
pub type OracleResult<T> = std::result::Result<T, OracleError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_converts_to_oracle_error() {
        let err = ConfigError::MissingInput { field: "api key" };
        let oracle: OracleError = err.into();
        assert!(matches!(
            oracle,
            OracleError::Config(ConfigError::MissingInput { field: "api key" })
        ));
    }

    #[test]
    fn session_error_converts_to_oracle_error() {
        let oracle: OracleError = SessionError::NotInitialized.into();
        assert!(matches!(
            oracle,
            OracleError::Session(SessionError::NotInitialized)
        ));
    }

    #[test]
    fn unknown_model_message_names_both_sides() {
        let err = ConfigError::UnknownModel {
            provider: "Groq".into(),
            model: "gpt-4o".into(),
            allowed: "gemma2-9b-it".into(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("Groq"));
        assert!(msg.contains("gpt-4o"));
    }
}
