//! Structured display messages.
//!
//! `OracleMessage` is what front ends show: the user's turns, the oracle's
//! replies (whole or token by token), status notes and errors. Sinks render
//! them to the terminal or as newline-delimited JSON.

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use std::io::Write;

// ── Message types ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum OracleMessage {
    /// Something the user said.
    User { text: String },
    /// A complete oracle reply.
    Assistant { text: String },
    /// One streamed piece of a reply in progress.
    Token { text: String },
    /// Status or informational message.
    System { text: String },
    Error {
        code: String,
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        help: Option<String>,
    },
}

// ── MessageSink trait ───────────────────────────────────────────────────

/// A destination for display messages.
pub trait MessageSink: Send + Sync {
    fn emit(&self, msg: &OracleMessage);
}

// ── StdoutSink ──────────────────────────────────────────────────────────

/// Plain terminal output. Tokens are written without a newline and flushed,
/// so a streamed reply appears as it arrives.
pub struct StdoutSink;

impl MessageSink for StdoutSink {
    fn emit(&self, msg: &OracleMessage) {
        match msg {
            OracleMessage::User { text } => println!("> {text}"),
            OracleMessage::Assistant { text } => println!("{text}"),
            OracleMessage::Token { text } => {
                let mut out = std::io::stdout().lock();
                let _ = out.write_all(text.as_bytes());
                let _ = out.flush();
            }
            OracleMessage::System { text } => println!("{text}"),
            OracleMessage::Error {
                code,
                message,
                help,
            } => {
                eprintln!("[error:{code}] {message}");
                if let Some(h) = help {
                    eprintln!("  help: {h}");
                }
            }
        }
    }
}

// ── JsonSink ────────────────────────────────────────────────────────────

/// Emits messages as newline-delimited JSON.
pub struct JsonSink;

impl MessageSink for JsonSink {
    fn emit(&self, msg: &OracleMessage) {
        if let Ok(json) = serde_json::to_string(msg) {
            println!("{json}");
        }
    }
}

// ── Convenience constructors ────────────────────────────────────────────

impl OracleMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self::User { text: text.into() }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::Assistant { text: text.into() }
    }

    pub fn token(text: impl Into<String>) -> Self {
        Self::Token { text: text.into() }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::System { text: text.into() }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Error {
            code: code.into(),
            message: message.into(),
            help: None,
        }
    }

    /// An error line carrying the diagnostic's code and help text.
    pub fn from_diagnostic<D: Diagnostic + ?Sized>(err: &D) -> Self {
        Self::Error {
            code: err
                .code()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "oracle".into()),
            message: err.to_string(),
            help: err.help().map(|h| h.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{OracleError, SessionError};

    #[test]
    fn message_serializes_to_json() {
        let json = serde_json::to_string(&OracleMessage::token("Hel")).unwrap();
        assert_eq!(json, r#"{"type":"Token","text":"Hel"}"#);
    }

    #[test]
    fn error_without_help_omits_field() {
        let json = serde_json::to_string(&OracleMessage::error("x", "boom")).unwrap();
        assert!(!json.contains("help"));
    }

    #[test]
    fn diagnostic_code_and_help_carry_through() {
        let err: OracleError = SessionError::NotInitialized.into();
        match OracleMessage::from_diagnostic(&err) {
            OracleMessage::Error {
                code,
                message,
                help,
            } => {
                assert_eq!(code, "oracle::session::not_initialized");
                assert!(message.contains("not been initialized"));
                assert!(help.unwrap().contains("/init"));
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }
}
