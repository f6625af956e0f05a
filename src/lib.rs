// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # doc-oracle
//!
//! Chat with a language model grounded in a single document: a web page, a
//! YouTube transcript, a PDF, a CSV file or plain text.
//!
//! ## Architecture
//!
//! - **Loaders** (`loader`): turn a URL or an uploaded file into plain text
//! - **Providers** (`provider`): Groq and OpenAI streaming chat clients
//! - **Chain** (`chain`, `prompt`): system prompt with the document baked in,
//!   composed with a client
//! - **Session** (`session`): chain, five-message window memory, API keys
//! - **Control flow** (`oracle`): initialize, reset, send
//! - **Front end** (`tui`): ratatui chat screen with slash commands
//!
//! ## Library usage
//!
//! ```no_run
//! use doc_oracle::chain::ChainSettings;
//! use doc_oracle::loader::DocumentType;
//! use doc_oracle::oracle::Oracle;
//! use doc_oracle::provider::{ProviderRegistry, ProviderSettings};
//!
//! let registry = ProviderRegistry::builtin(&ProviderSettings::default());
//! let mut oracle = Oracle::new(registry, ChainSettings::default());
//! oracle.set_document_type(DocumentType::Site);
//! oracle.set_source("https://example.com");
//! oracle.set_api_key("gsk-...").unwrap();
//! oracle.initialize().unwrap();
//! let reply = oracle.send("What is this page about?", |token| print!("{token}")).unwrap();
//! ```

pub mod chain;
pub mod config;
pub mod error;
pub mod loader;
pub mod message;
pub mod oracle;
pub mod paths;
pub mod prompt;
pub mod provider;
pub mod session;
pub mod tui;
