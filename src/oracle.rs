//! Front-end independent control flow.
//!
//! [`Oracle`] holds the user's current selections and the [`Session`], and
//! exposes the three actions a front end triggers: initialize, reset the
//! history, and send a message. Every action either succeeds completely or
//! leaves the state as it was.

use crate::chain::{BuildRequest, Chain, ChainSettings};
use crate::error::{ConfigError, OracleResult, SessionError};
use crate::loader::{DocumentType, RawInput};
use crate::provider::{ChatMessage, ProviderRegistry};
use crate::session::{Session, WindowMemory};

/// Whether a chain is installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OracleState {
    Uninitialized,
    Ready,
}

impl std::fmt::Display for OracleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "uninitialized"),
            Self::Ready => write!(f, "ready"),
        }
    }
}

/// The inputs chosen in the front end. API keys live in the [`Session`].
#[derive(Debug, Clone, Default)]
pub struct Selection {
    pub document_type: Option<DocumentType>,
    /// URL for Site/Youtube, file path for uploads.
    pub source: Option<String>,
    pub provider: Option<String>,
    pub model: Option<String>,
}

/// Snapshot of what a front end shows in its header and status bar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleStatus {
    pub state: OracleState,
    pub document_type: Option<DocumentType>,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub history_len: usize,
}

/// Selection state plus session, driven by front-end actions.
pub struct Oracle {
    registry: ProviderRegistry,
    settings: ChainSettings,
    session: Session,
    selection: Selection,
}

impl Oracle {
    /// Create an oracle with the first registered provider and its first
    /// model preselected.
    pub fn new(registry: ProviderRegistry, settings: ChainSettings) -> Self {
        let mut selection = Selection::default();
        if let Some(entry) = registry.entries().first() {
            selection.provider = Some(entry.name.clone());
            selection.model = entry.models.first().cloned();
        }
        Self {
            registry,
            settings,
            session: Session::new(),
            selection,
        }
    }

    /// Use `session` (e.g. one with keys pre-seeded) instead of a fresh one.
    pub fn with_session(mut self, session: Session) -> Self {
        self.session = session;
        self
    }

    // ── Selections ───────────────────────────────────────────────────────

    pub fn set_document_type(&mut self, document_type: DocumentType) {
        self.selection.document_type = Some(document_type);
    }

    pub fn set_source(&mut self, source: impl Into<String>) {
        self.selection.source = Some(source.into());
    }

    /// Switch provider. The model snaps back to the provider's first model;
    /// the key stored for the new provider applies.
    pub fn set_provider(&mut self, provider: &str) -> Result<(), ConfigError> {
        let entry = self
            .registry
            .get(provider)
            .ok_or_else(|| ConfigError::UnknownProvider {
                provider: provider.to_string(),
                known: self.registry.names().collect::<Vec<_>>().join(", "),
            })?;
        self.selection.provider = Some(entry.name.clone());
        self.selection.model = entry.models.first().cloned();
        Ok(())
    }

    pub fn set_model(&mut self, model: &str) -> Result<(), ConfigError> {
        let provider = self
            .selection
            .provider
            .as_deref()
            .ok_or(ConfigError::MissingInput { field: "provider" })?;
        self.registry.resolve(provider, model.trim())?;
        self.selection.model = Some(model.trim().to_string());
        Ok(())
    }

    /// Store `key` for the selected provider. A blank key clears it.
    pub fn set_api_key(&mut self, key: impl Into<String>) -> Result<(), ConfigError> {
        let provider = self
            .selection
            .provider
            .as_deref()
            .ok_or(ConfigError::MissingInput { field: "provider" })?;
        let key = key.into();
        if key.trim().is_empty() {
            self.session.clear_api_key(provider);
        } else {
            self.session.set_api_key(provider, key);
        }
        Ok(())
    }

    // ── Actions ──────────────────────────────────────────────────────────

    /// Build a chain from the current selections and install it.
    pub fn initialize(&mut self) -> OracleResult<()> {
        self.install_fresh_chain()
    }

    /// Rebuild the chain from the current selections, then clear the history.
    pub fn reset_history(&mut self) -> OracleResult<()> {
        self.install_fresh_chain()?;
        self.session.reset_history();
        tracing::info!("history cleared");
        Ok(())
    }

    /// Run one turn. Tokens reach `on_token` in arrival order; the user
    /// message and the reply are added to the history only once the stream
    /// completes. Returns the full reply.
    pub fn send(&mut self, input: &str, mut on_token: impl FnMut(&str)) -> OracleResult<String> {
        let (chain, history) = self.session.parts_mut();
        let chain = chain.ok_or(SessionError::NotInitialized)?;

        tracing::debug!(
            provider = chain.provider(),
            model = chain.model_name(),
            history = history.len(),
            "turn started"
        );

        let mut reply = String::new();
        for token in chain.stream(input, history.iter())? {
            let token = token?;
            on_token(&token);
            reply.push_str(&token);
        }

        history.append(ChatMessage::user(input));
        history.append(ChatMessage::assistant(reply.clone()));
        tracing::info!(reply_chars = reply.len(), history = history.len(), "turn complete");
        Ok(reply)
    }

    fn install_fresh_chain(&mut self) -> OracleResult<()> {
        let request = self.build_request()?;
        let chain = Chain::build(&self.registry, &request, &self.settings)?;
        self.session.install_chain(chain);
        Ok(())
    }

    fn build_request(&self) -> OracleResult<BuildRequest> {
        let selection = &self.selection;
        let document_type = selection
            .document_type
            .ok_or(ConfigError::MissingInput { field: "document type" })?;
        let source = non_blank(selection.source.as_deref())
            .ok_or(ConfigError::MissingInput { field: "source" })?;
        let provider = non_blank(selection.provider.as_deref())
            .ok_or(ConfigError::MissingInput { field: "provider" })?;
        let model = non_blank(selection.model.as_deref())
            .ok_or(ConfigError::MissingInput { field: "model" })?;

        // Validate the pairing before touching the source.
        let entry = self.registry.resolve(provider, model)?;
        let api_key = non_blank(self.session.api_key(&entry.name))
            .ok_or(ConfigError::MissingInput { field: "api key" })?
            .to_string();

        let raw_input = RawInput::from_source(document_type, source)?;

        Ok(BuildRequest {
            provider: entry.name.clone(),
            model: model.to_string(),
            api_key,
            document_type,
            raw_input,
        })
    }

    // ── Accessors ────────────────────────────────────────────────────────

    pub fn state(&self) -> OracleState {
        if self.session.is_initialized() {
            OracleState::Ready
        } else {
            OracleState::Uninitialized
        }
    }

    pub fn status(&self) -> OracleStatus {
        OracleStatus {
            state: self.state(),
            document_type: self.selection.document_type,
            provider: self.selection.provider.clone(),
            model: self.selection.model.clone(),
            history_len: self.session.history().len(),
        }
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn history(&self) -> &WindowMemory {
        self.session.history()
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Models offered by the selected provider.
    pub fn models(&self) -> &[String] {
        self.selection
            .provider
            .as_deref()
            .and_then(|p| self.registry.get(p))
            .map(|e| e.models.as_slice())
            .unwrap_or_default()
    }
}

impl std::fmt::Debug for Oracle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Oracle")
            .field("state", &self.state())
            .field("selection", &self.selection)
            .field("session", &self.session)
            .finish()
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::Arc;

    use super::*;
    use crate::error::{LoadError, OracleError, StreamError};
    use crate::provider::ChatModel;
    use crate::provider::scripted::{RequestLog, Script, ScriptedModel};

    fn oracle_with(script: Script) -> (Oracle, RequestLog) {
        let log = RequestLog::default();
        let shared = Arc::clone(&log);
        let registry = ProviderRegistry::builtin_with(move |_| {
            let script = script.clone();
            let log = Arc::clone(&shared);
            Arc::new(move |model: &str, _key: &str| -> Box<dyn ChatModel> {
                Box::new(ScriptedModel::new(model, script.clone()).with_log(Arc::clone(&log)))
            })
        });
        (Oracle::new(registry, ChainSettings::default()), log)
    }

    fn txt_fixture(text: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
        file.write_all(text.as_bytes()).unwrap();
        file
    }

    fn ready(oracle: &mut Oracle, file: &tempfile::NamedTempFile) {
        oracle.set_document_type(DocumentType::Txt);
        oracle.set_source(file.path().to_string_lossy());
        oracle.set_api_key("gsk-test").unwrap();
        oracle.initialize().unwrap();
    }

    #[test]
    fn starts_uninitialized_with_defaults() {
        let (oracle, _) = oracle_with(Script::Echo);
        let status = oracle.status();
        assert_eq!(status.state, OracleState::Uninitialized);
        assert_eq!(status.provider.as_deref(), Some("Groq"));
        assert_eq!(status.model.as_deref(), Some("llama-3.3-70b-versatile"));
        assert_eq!(status.document_type, None);
    }

    #[test]
    fn send_before_initialize_does_not_touch_history() {
        let (mut oracle, log) = oracle_with(Script::Echo);
        let err = oracle.send("hello", |_| {}).unwrap_err();
        assert!(matches!(err, OracleError::Session(SessionError::NotInitialized)));
        assert!(oracle.history().is_empty());
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn initialize_reports_first_missing_input() {
        let (mut oracle, _) = oracle_with(Script::Echo);
        let err = oracle.initialize().unwrap_err();
        assert!(matches!(
            err,
            OracleError::Config(ConfigError::MissingInput { field: "document type" })
        ));

        oracle.set_document_type(DocumentType::Site);
        oracle.set_source("https://example.com");
        let err = oracle.initialize().unwrap_err();
        assert!(matches!(
            err,
            OracleError::Config(ConfigError::MissingInput { field: "api key" })
        ));
        assert_eq!(oracle.state(), OracleState::Uninitialized);
    }

    #[test]
    fn failed_initialize_keeps_previous_chain() {
        let (mut oracle, _) = oracle_with(Script::Echo);
        let file = txt_fixture("first document");
        ready(&mut oracle, &file);

        oracle.set_source("/definitely/not/here.txt");
        let err = oracle.initialize().unwrap_err();
        assert!(matches!(err, OracleError::Load(LoadError::Io { .. })));
        assert_eq!(oracle.state(), OracleState::Ready);
        assert!(
            oracle
                .session()
                .chain()
                .unwrap()
                .system_prompt()
                .contains("first document")
        );
    }

    #[test]
    fn send_streams_and_commits_pair() {
        let (mut oracle, _) = oracle_with(Script::Echo);
        let file = txt_fixture("A\nB\nC");
        ready(&mut oracle, &file);

        let mut seen = Vec::new();
        let reply = oracle.send("how are you", |t| seen.push(t.to_string())).unwrap();
        assert_eq!(seen, vec!["how ", "are ", "you"]);
        assert_eq!(reply, "how are you");
        assert_eq!(
            oracle.history().messages(),
            vec![ChatMessage::user("how are you"), ChatMessage::assistant("how are you")]
        );
    }

    #[test]
    fn interrupted_stream_commits_nothing() {
        let (mut oracle, _) = oracle_with(Script::FailAfter {
            tokens: vec!["par".into(), "tial".into()],
            message: "connection reset".into(),
        });
        let file = txt_fixture("doc");
        ready(&mut oracle, &file);

        let mut seen = Vec::new();
        let err = oracle.send("q", |t| seen.push(t.to_string())).unwrap_err();
        assert!(matches!(err, OracleError::Stream(StreamError::Interrupted { .. })));
        assert_eq!(seen.len(), 2);
        assert!(oracle.history().is_empty());
    }

    #[test]
    fn reset_clears_history_and_rebuilds_chain() {
        let (mut oracle, log) = oracle_with(Script::Echo);
        let file = txt_fixture("before");
        ready(&mut oracle, &file);
        oracle.send("one", |_| {}).unwrap();
        assert_eq!(oracle.history().len(), 2);

        std::fs::write(file.path(), "after").unwrap();
        oracle.reset_history().unwrap();
        assert!(oracle.history().is_empty());
        let prompt = oracle.session().chain().unwrap().system_prompt().to_string();
        assert!(prompt.contains("after"));

        oracle.send("two", |_| {}).unwrap();
        let requests = log.lock().unwrap();
        assert_eq!(requests.last().unwrap().len(), 2);
    }

    #[test]
    fn failed_reset_keeps_history() {
        let (mut oracle, _) = oracle_with(Script::Echo);
        let file = txt_fixture("doc");
        ready(&mut oracle, &file);
        oracle.send("one", |_| {}).unwrap();

        oracle.set_source("/definitely/not/here.txt");
        assert!(oracle.reset_history().is_err());
        assert_eq!(oracle.history().len(), 2);
    }

    #[test]
    fn provider_switch_resets_model_and_reuses_stored_key() {
        let (mut oracle, _) = oracle_with(Script::Echo);
        let file = txt_fixture("doc");
        ready(&mut oracle, &file);
        assert_eq!(oracle.session().api_key("Groq"), Some("gsk-test"));

        oracle.set_provider("openai").unwrap();
        assert_eq!(oracle.selection().model.as_deref(), Some("gpt-4o"));
        assert_eq!(oracle.session().api_key("OpenAI"), None);
        oracle.set_api_key("sk-test").unwrap();
        oracle.initialize().unwrap();

        oracle.set_provider("Groq").unwrap();
        oracle.initialize().unwrap();
        assert_eq!(oracle.session().chain().unwrap().provider(), "Groq");
        assert_eq!(oracle.session().api_key("OpenAI"), Some("sk-test"));
    }

    #[test]
    fn unknown_selections_are_rejected() {
        let (mut oracle, _) = oracle_with(Script::Echo);
        assert!(matches!(
            oracle.set_provider("Mistral"),
            Err(ConfigError::UnknownProvider { .. })
        ));
        assert!(matches!(
            oracle.set_model("gpt-4o"),
            Err(ConfigError::UnknownModel { .. })
        ));
        assert_eq!(oracle.selection().provider.as_deref(), Some("Groq"));
        oracle.set_model("gemma2-9b-it").unwrap();
        assert_eq!(oracle.models().len(), 3);
    }

    #[test]
    fn typed_key_is_stored_for_selected_provider() {
        let (mut oracle, _) = oracle_with(Script::Echo);
        oracle.set_provider("OpenAI").unwrap();
        oracle.set_api_key(" sk-typed ").unwrap();
        assert_eq!(oracle.session().api_key("openai"), Some("sk-typed"));
        assert_eq!(oracle.session().api_key("Groq"), None);

        // Kept through a failed initialize and a round trip to another provider.
        oracle.set_document_type(DocumentType::Txt);
        oracle.set_source("/definitely/not/here.txt");
        assert!(oracle.initialize().is_err());
        oracle.set_provider("Groq").unwrap();
        oracle.set_provider("OpenAI").unwrap();
        assert_eq!(oracle.session().api_key("OpenAI"), Some("sk-typed"));

        oracle.set_api_key("  ").unwrap();
        assert_eq!(oracle.session().api_key("OpenAI"), None);
    }

    #[test]
    fn oracle_debug_redacts_key() {
        let (mut oracle, _) = oracle_with(Script::Echo);
        oracle.set_api_key("gsk-secret").unwrap();
        assert!(!format!("{oracle:?}").contains("gsk-secret"));
    }
}
