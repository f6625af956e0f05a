//! OpenAI-compatible streaming chat client.
//!
//! Speaks the Chat Completions API with `stream: true` over `ureq`. The reply
//! arrives as Server-Sent Events: one `data: {json}` line per chunk, closed by
//! `data: [DONE]`. A stream that ends without the `[DONE]` marker counts as
//! interrupted.

use std::io::{BufRead, BufReader};
use std::time::Duration;

use serde::Deserialize;

use super::{ChatMessage, ChatModel, ClientFactory, StreamError, TokenStream};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Builds [`OpenAiCompatClient`]s for one provider endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiCompatFactory {
    provider: String,
    base_url: String,
    timeout: Duration,
}

impl OpenAiCompatFactory {
    pub fn new(
        provider: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            provider: provider.into(),
            base_url: base_url.into(),
            timeout,
        }
    }
}

impl ClientFactory for OpenAiCompatFactory {
    fn connect(&self, model: &str, api_key: &str) -> Box<dyn ChatModel> {
        Box::new(OpenAiCompatClient {
            provider: self.provider.clone(),
            base_url: self.base_url.clone(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            timeout: self.timeout,
        })
    }
}

/// Client for an OpenAI-compatible `/chat/completions` endpoint.
pub struct OpenAiCompatClient {
    provider: String,
    base_url: String,
    api_key: String,
    model: String,
    timeout: Duration,
}

impl OpenAiCompatClient {
    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

impl std::fmt::Debug for OpenAiCompatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiCompatClient")
            .field("provider", &self.provider)
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

impl ChatModel for OpenAiCompatClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn stream(&self, messages: &[ChatMessage]) -> Result<TokenStream<'_>, StreamError> {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(CONNECT_TIMEOUT)
            .timeout_read(self.timeout)
            .build();

        let body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "stream": true,
        });

        tracing::debug!(
            provider = %self.provider,
            model = %self.model,
            messages = messages.len(),
            "starting completion stream"
        );

        let response = agent
            .post(&self.endpoint())
            .set("Authorization", &format!("Bearer {}", self.api_key))
            .set("Accept", "text/event-stream")
            .send_json(body)
            .map_err(|e| self.map_request_error(e))?;

        Ok(Box::new(SseTokens::new(BufReader::new(response.into_reader()))))
    }
}

impl OpenAiCompatClient {
    fn map_request_error(&self, err: ureq::Error) -> StreamError {
        match err {
            ureq::Error::Status(401 | 403, _) => StreamError::Auth {
                provider: self.provider.clone(),
            },
            ureq::Error::Status(status, response) => {
                let body = response.into_string().unwrap_or_default();
                StreamError::Http {
                    provider: self.provider.clone(),
                    status,
                    message: api_error_message(&body).unwrap_or(body),
                }
            }
            ureq::Error::Transport(transport) => StreamError::Transport {
                provider: self.provider.clone(),
                message: transport.to_string(),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
}

#[derive(Debug, Default, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiError,
}

/// Pull `error.message` out of an error response body, if it has one.
fn api_error_message(body: &str) -> Option<String> {
    serde_json::from_str::<ApiErrorBody>(body)
        .ok()
        .map(|b| b.error.message)
}

/// Iterator over the content deltas of an SSE completion stream.
pub struct SseTokens<R> {
    lines: std::io::Lines<R>,
    done: bool,
}

impl<R: BufRead> SseTokens<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            done: false,
        }
    }

    fn fail(&mut self, err: StreamError) -> Option<Result<String, StreamError>> {
        self.done = true;
        Some(Err(err))
    }
}

impl<R: BufRead> Iterator for SseTokens<R> {
    type Item = Result<String, StreamError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            let line = match self.lines.next() {
                Some(Ok(line)) => line,
                Some(Err(e)) => {
                    return self.fail(StreamError::Interrupted {
                        message: e.to_string(),
                    });
                }
                None => {
                    return self.fail(StreamError::Interrupted {
                        message: "connection closed before [DONE]".into(),
                    });
                }
            };

            // Blank separators, `event:` fields and `:` comments carry no content.
            let Some(data) = line.strip_prefix("data:") else {
                continue;
            };
            let data = data.trim();
            if data == "[DONE]" {
                self.done = true;
                return None;
            }

            let chunk: StreamChunk = match serde_json::from_str(data) {
                Ok(chunk) => chunk,
                Err(e) => {
                    return self.fail(StreamError::Malformed {
                        message: format!("{e}: {data}"),
                    });
                }
            };
            if let Some(error) = chunk.error {
                return self.fail(StreamError::Provider {
                    message: error.message,
                });
            }

            let token: String = chunk
                .choices
                .into_iter()
                .filter_map(|c| c.delta.content)
                .collect();
            if !token.is_empty() {
                return Some(Ok(token));
            }
        }
    }
}
