//! Prompt/model assembly.
//!
//! A [`Chain`] binds a [`PromptTemplate`] (document text already baked into
//! its system message) to a provider client. It is immutable: switching the
//! document or the model means building a new chain.

use crate::error::{ConfigError, OracleResult};
use crate::loader::{self, DocumentType, LoaderSettings, RawInput};
use crate::prompt::{PromptOptions, PromptTemplate};
use crate::provider::{ChatMessage, ChatModel, ProviderRegistry, StreamError, TokenStream};

/// Everything needed to build a chain.
#[derive(Debug, Clone)]
pub struct BuildRequest {
    pub provider: String,
    pub model: String,
    pub api_key: String,
    pub document_type: DocumentType,
    pub raw_input: RawInput,
}

/// Loader and prompt settings used during assembly.
#[derive(Debug, Clone, Default)]
pub struct ChainSettings {
    pub loader: LoaderSettings,
    pub prompt: PromptOptions,
}

/// A prompt template composed with a chat client.
pub struct Chain {
    template: PromptTemplate,
    model: Box<dyn ChatModel>,
    provider: String,
    document_type: DocumentType,
}

impl Chain {
    /// Compose an already-built template and client.
    pub fn new(
        template: PromptTemplate,
        provider: impl Into<String>,
        document_type: DocumentType,
        model: Box<dyn ChatModel>,
    ) -> Self {
        Self {
            template,
            model,
            provider: provider.into(),
            document_type,
        }
    }

    /// Validate the provider/model pair, load the document, build the system
    /// prompt and connect the client.
    ///
    /// The pairing is checked before any document is fetched, so a typo in the
    /// model name never costs a network round trip.
    pub fn build(
        registry: &ProviderRegistry,
        request: &BuildRequest,
        settings: &ChainSettings,
    ) -> OracleResult<Self> {
        let entry = registry.resolve(&request.provider, &request.model)?;
        if request.api_key.trim().is_empty() {
            return Err(ConfigError::MissingInput { field: "api key" }.into());
        }

        let text = loader::load_with(&settings.loader, request.document_type, &request.raw_input)?;
        let template = PromptTemplate::for_document(request.document_type, &text, &settings.prompt);
        let model = registry.connect(&entry.name, &request.model, request.api_key.trim())?;

        tracing::info!(
            provider = %entry.name,
            model = %request.model,
            document_type = %request.document_type,
            prompt_chars = template.system_message().len(),
            "chain built"
        );

        Ok(Self::new(template, entry.name.clone(), request.document_type, model))
    }

    /// Start streaming a reply to `input`, replaying `history` between the
    /// system message and the input.
    pub fn stream<'h>(
        &self,
        input: &str,
        history: impl IntoIterator<Item = &'h ChatMessage>,
    ) -> Result<TokenStream<'_>, StreamError> {
        let messages = self.template.render(history, input);
        self.model.stream(&messages)
    }

    pub fn system_prompt(&self) -> &str {
        self.template.system_message()
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn model_name(&self) -> &str {
        self.model.model_name()
    }

    pub fn document_type(&self) -> DocumentType {
        self.document_type
    }
}

impl std::fmt::Debug for Chain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chain")
            .field("provider", &self.provider)
            .field("model", &self.model.model_name())
            .field("document_type", &self.document_type)
            .field("prompt_chars", &self.template.system_message().len())
            .finish()
    }
}
