//! System prompt construction and the three-slot chat template.
//!
//! The document text is baked into the system message once, when the chain is
//! built. Each turn then renders `[system, ..history, user input]`.

use crate::loader::DocumentType;
use crate::provider::ChatMessage;

/// Text served by bot-protection interstitials instead of the real page.
pub const ANTI_BOT_SIGNATURE: &str = "Just a moment...Enable JavaScript and cookies to continue";

/// Knobs for the system prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptOptions {
    /// Name the oracle introduces itself with.
    pub persona: String,
    /// Ask the model to write `S` wherever it would write `$`.
    pub replace_currency_marker: bool,
}

impl Default for PromptOptions {
    fn default() -> Self {
        Self {
            persona: "Victor".into(),
            replace_currency_marker: true,
        }
    }
}

/// Build the system message grounding the oracle in `text`.
pub fn system_prompt(document_type: DocumentType, text: &str, options: &PromptOptions) -> String {
    let mut prompt = format!(
        "You are an Oracle named {persona}.\n\
         You hold knowledge across many fields.\n\
         You have access to the following information from a {document_type} document:\n\
         \n\
         ###\n\
         {text}\n\
         ###\n\
         \n\
         Use the information provided to ground your answers.\n",
        persona = options.persona,
    );

    if options.replace_currency_marker {
        prompt.push_str("\nWhenever your output contains $, replace it with S.\n");
    }

    prompt.push_str(&format!(
        "\nIf the document information is something like \"{ANTI_BOT_SIGNATURE}\", \
         suggest that the user load the Oracle again!"
    ));
    prompt
}

/// The prompt half of a chain: a fixed system message plus history and
/// input slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    system: String,
}

impl PromptTemplate {
    pub fn new(system: impl Into<String>) -> Self {
        Self {
            system: system.into(),
        }
    }

    pub fn for_document(document_type: DocumentType, text: &str, options: &PromptOptions) -> Self {
        Self::new(system_prompt(document_type, text, options))
    }

    pub fn system_message(&self) -> &str {
        &self.system
    }

    /// Fill the slots: system message, then every history message, then the
    /// user's input.
    pub fn render<'a>(
        &self,
        history: impl IntoIterator<Item = &'a ChatMessage>,
        input: &str,
    ) -> Vec<ChatMessage> {
        let mut messages = vec![ChatMessage::system(self.system.clone())];
        messages.extend(history.into_iter().cloned());
        messages.push(ChatMessage::user(input));
        messages
    }
}
