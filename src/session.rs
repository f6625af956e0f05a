//! Conversation session state.
//!
//! A [`Session`] owns the active [`Chain`], a window memory holding the last
//! [`HISTORY_WINDOW`] messages, and the API keys entered for each provider.
//! There is one session per running front end.

use std::collections::{BTreeMap, VecDeque};

use crate::chain::Chain;
use crate::error::SessionError;
use crate::provider::{BUILTIN_PROVIDERS, ChatMessage};

/// Number of messages kept in the window memory.
pub const HISTORY_WINDOW: usize = 5;

// ── WindowMemory ─────────────────────────────────────────────────────────

/// Bounded conversation history. Appending past capacity evicts the oldest
/// messages, so the window always holds the most recent ones in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowMemory {
    messages: VecDeque<ChatMessage>,
    window: usize,
}

impl WindowMemory {
    pub fn new() -> Self {
        Self::with_window(HISTORY_WINDOW)
    }

    /// A memory holding at most `window` messages (minimum one).
    pub fn with_window(window: usize) -> Self {
        let window = window.max(1);
        Self {
            messages: VecDeque::with_capacity(window + 1),
            window,
        }
    }

    pub fn append(&mut self, message: ChatMessage) {
        self.messages.push_back(message);
        while self.messages.len() > self.window {
            if let Some(evicted) = self.messages.pop_front() {
                tracing::debug!(
                    role = %evicted.role,
                    chars = evicted.content.len(),
                    "evicted from history"
                );
            }
        }
    }

    pub fn reset(&mut self) {
        self.messages.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChatMessage> {
        self.messages.iter()
    }

    /// Snapshot of the window, oldest first.
    pub fn messages(&self) -> Vec<ChatMessage> {
        self.messages.iter().cloned().collect()
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl Default for WindowMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> IntoIterator for &'a WindowMemory {
    type Item = &'a ChatMessage;
    type IntoIter = std::collections::vec_deque::Iter<'a, ChatMessage>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.iter()
    }
}

// ── Session ──────────────────────────────────────────────────────────────

/// Per-user conversation state: chain, history and API keys.
#[derive(Default)]
pub struct Session {
    chain: Option<Chain>,
    history: WindowMemory,
    /// Keyed by lowercase provider name.
    api_keys: BTreeMap<String, String>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// A session whose keys are pre-seeded from the built-in providers'
    /// environment variables (`GROQ_API_KEY`, `OPENAI_API_KEY`).
    pub fn with_env_keys() -> Self {
        let mut session = Self::new();
        session.seed_keys(|var| std::env::var(var).ok());
        session
    }

    /// Pre-seed keys using `lookup` to read each provider's variable.
    /// Blank values are ignored.
    pub fn seed_keys(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        for provider in &BUILTIN_PROVIDERS {
            if let Some(key) = lookup(provider.api_key_env).filter(|k| !k.trim().is_empty()) {
                tracing::debug!(provider = provider.name, "api key taken from environment");
                self.set_api_key(provider.name, key);
            }
        }
    }

    /// Replace the active chain. History is kept.
    pub fn install_chain(&mut self, chain: Chain) {
        self.chain = Some(chain);
    }

    pub fn chain(&self) -> Result<&Chain, SessionError> {
        self.chain.as_ref().ok_or(SessionError::NotInitialized)
    }

    pub fn is_initialized(&self) -> bool {
        self.chain.is_some()
    }

    pub fn history(&self) -> &WindowMemory {
        &self.history
    }

    /// Split borrow used while a turn streams: the chain reads, the history
    /// is only written once the reply is complete.
    pub(crate) fn parts_mut(&mut self) -> (Option<&Chain>, &mut WindowMemory) {
        (self.chain.as_ref(), &mut self.history)
    }

    /// Empty the history. The chain is left alone.
    pub fn reset_history(&mut self) {
        self.history.reset();
    }

    pub fn set_api_key(&mut self, provider: &str, key: impl Into<String>) {
        self.api_keys
            .insert(provider.trim().to_lowercase(), key.into().trim().to_string());
    }

    pub fn clear_api_key(&mut self, provider: &str) {
        self.api_keys.remove(&provider.trim().to_lowercase());
    }

    pub fn api_key(&self, provider: &str) -> Option<&str> {
        self.api_keys
            .get(&provider.trim().to_lowercase())
            .map(String::as_str)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("chain", &self.chain)
            .field("history_len", &self.history.len())
            .field("api_keys", &self.api_keys.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::DocumentType;
    use crate::prompt::PromptTemplate;
    use crate::provider::scripted::{Script, ScriptedModel};

    fn chain(system: &str) -> Chain {
        Chain::new(
            PromptTemplate::new(system),
            "Groq",
            DocumentType::Txt,
            Box::new(ScriptedModel::new("gemma2-9b-it", Script::Echo)),
        )
    }

    #[test]
    fn window_keeps_last_five_in_order() {
        let mut memory = WindowMemory::new();
        for i in 0..8 {
            memory.append(ChatMessage::user(format!("m{i}")));
            assert!(memory.len() <= HISTORY_WINDOW);
        }
        let contents: Vec<&str> = memory.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["m3", "m4", "m5", "m6", "m7"]);
    }

    #[test]
    fn window_below_capacity_keeps_everything() {
        let mut memory = WindowMemory::new();
        memory.append(ChatMessage::user("q"));
        memory.append(ChatMessage::assistant("a"));
        assert_eq!(memory.messages(), vec![ChatMessage::user("q"), ChatMessage::assistant("a")]);
    }

    #[test]
    fn zero_window_is_clamped() {
        let mut memory = WindowMemory::with_window(0);
        memory.append(ChatMessage::user("a"));
        memory.append(ChatMessage::user("b"));
        assert_eq!(memory.window(), 1);
        assert_eq!(memory.messages(), vec![ChatMessage::user("b")]);
    }

    #[test]
    fn new_session_is_uninitialized() {
        let session = Session::new();
        assert!(!session.is_initialized());
        assert!(matches!(session.chain(), Err(SessionError::NotInitialized)));
        assert!(session.history().is_empty());
    }

    #[test]
    fn reset_history_keeps_chain() {
        let mut session = Session::new();
        session.install_chain(chain("sys"));
        session.history.append(ChatMessage::user("q"));
        session.reset_history();
        assert!(session.history().is_empty());
        assert_eq!(session.chain().unwrap().system_prompt(), "sys");
    }

    #[test]
    fn api_keys_survive_chain_rebuilds() {
        let mut session = Session::new();
        session.set_api_key("Groq", "gsk-1");
        session.install_chain(chain("first"));
        session.install_chain(chain("second"));
        assert_eq!(session.api_key("groq"), Some("gsk-1"));
        assert_eq!(session.chain().unwrap().system_prompt(), "second");

        session.set_api_key("GROQ", "gsk-2");
        assert_eq!(session.api_key("Groq"), Some("gsk-2"));
        assert_eq!(session.api_key("OpenAI"), None);
    }

    #[test]
    fn seed_keys_reads_provider_variables() {
        let mut session = Session::new();
        session.seed_keys(|var| match var {
            "OPENAI_API_KEY" => Some("sk-env".into()),
            "GROQ_API_KEY" => Some("   ".into()),
            _ => None,
        });
        assert_eq!(session.api_key("OpenAI"), Some("sk-env"));
        assert_eq!(session.api_key("Groq"), None);
    }

    #[test]
    fn debug_hides_key_values() {
        let mut session = Session::new();
        session.set_api_key("OpenAI", "sk-secret");
        let debug = format!("{session:?}");
        assert!(debug.contains("openai"));
        assert!(!debug.contains("sk-secret"));
    }
}
