//! Scripted chat model for tests and offline runs.
//!
//! Replies follow a fixed [`Script`] instead of calling a provider, and every
//! request is recorded so callers can inspect exactly what was sent.

use std::sync::{Arc, Mutex};

use super::{ChatMessage, ChatModel, Role, StreamError, TokenStream};

/// What a [`ScriptedModel`] answers.
#[derive(Debug, Clone)]
pub enum Script {
    /// Echo the latest user message back, one word per token.
    Echo,
    /// Always stream these tokens.
    Tokens(Vec<String>),
    /// Stream these tokens, then fail mid-reply.
    FailAfter { tokens: Vec<String>, message: String },
}

/// Messages sent to a scripted model, one entry per request.
pub type RequestLog = Arc<Mutex<Vec<Vec<ChatMessage>>>>;

/// A [`ChatModel`] driven by a [`Script`].
#[derive(Debug, Clone)]
pub struct ScriptedModel {
    name: String,
    script: Script,
    requests: RequestLog,
}

impl ScriptedModel {
    pub fn new(name: impl Into<String>, script: Script) -> Self {
        Self {
            name: name.into(),
            script,
            requests: RequestLog::default(),
        }
    }

    /// Share a request log with other models (e.g. across chain rebuilds).
    pub fn with_log(mut self, requests: RequestLog) -> Self {
        self.requests = requests;
        self
    }

    /// Handle to everything sent to this model so far.
    pub fn requests(&self) -> RequestLog {
        Arc::clone(&self.requests)
    }
}

impl ChatModel for ScriptedModel {
    fn model_name(&self) -> &str {
        &self.name
    }

    fn stream(&self, messages: &[ChatMessage]) -> Result<TokenStream<'_>, StreamError> {
        if let Ok(mut log) = self.requests.lock() {
            log.push(messages.to_vec());
        }

        let stream: TokenStream<'_> = match &self.script {
            Script::Echo => {
                let input = messages
                    .iter()
                    .rev()
                    .find(|m| m.role == Role::User)
                    .map(|m| m.content.clone())
                    .unwrap_or_default();
                let tokens: Vec<String> = input.split_inclusive(' ').map(str::to_string).collect();
                Box::new(tokens.into_iter().map(Ok::<String, StreamError>))
            }
            Script::Tokens(tokens) => {
                Box::new(tokens.clone().into_iter().map(Ok::<String, StreamError>))
            }
            Script::FailAfter { tokens, message } => {
                let failure = StreamError::Interrupted {
                    message: message.clone(),
                };
                Box::new(
                    tokens
                        .clone()
                        .into_iter()
                        .map(Ok::<String, StreamError>)
                        .chain(std::iter::once(Err(failure))),
                )
            }
        };
        Ok(stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn echo_repeats_last_user_message() {
        let model = ScriptedModel::new("echo", Script::Echo);
        let msgs = vec![
            ChatMessage::system("sys"),
            ChatMessage::user("first"),
            ChatMessage::assistant("reply"),
            ChatMessage::user("hello there world"),
        ];
        let out: Vec<String> = model.stream(&msgs).unwrap().map(|t| t.unwrap()).collect();
        assert_eq!(out, vec!["hello ", "there ", "world"]);
        assert_eq!(out.concat(), "hello there world");
    }

    #[test]
    fn requests_are_recorded() {
        let model = ScriptedModel::new("echo", Script::Tokens(vec!["ok".into()]));
        let log = model.requests();
        let _ = model.stream(&[ChatMessage::user("q")]).unwrap().count();
        let log = log.lock().unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0], vec![ChatMessage::user("q")]);
    }

    #[test]
    fn fail_after_emits_tokens_then_error() {
        let model = ScriptedModel::new(
            "flaky",
            Script::FailAfter {
                tokens: vec!["a".into(), "b".into()],
                message: "reset by peer".into(),
            },
        );
        let out: Vec<_> = model.stream(&[]).unwrap().collect();
        assert_eq!(out.len(), 3);
        assert!(out[0].is_ok() && out[1].is_ok());
        assert!(matches!(out[2], Err(StreamError::Interrupted { .. })));
    }
}
