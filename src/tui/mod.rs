//! ratatui-based chat front end.
//!
//! The TUI provides a scrollable transcript, an input area, a header with the
//! current provider/model/document and a status bar. Slash commands
//! (`/type`, `/source`, `/provider`, `/init`, ...) make the selections; any
//! other input is a chat turn.

pub mod widgets;

use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use miette::IntoDiagnostic;
use ratatui::backend::Backend;
use ratatui::{DefaultTerminal, Terminal};

use crate::error::SessionError;
use crate::loader::DocumentType;
use crate::message::OracleMessage;
use crate::oracle::{Oracle, OracleState};

const HELP: &str = "Commands:
  /type <Site|Youtube|PDF|CSV|Txt>   document type
  /source <url or path>              URL for Site/Youtube, file path otherwise
  /provider <name>                   switch provider (model resets to its first)
  /model <name>                      pick a model of the current provider
  /models                            list the current provider's models
  /key <secret>                      API key for the current provider
  /init                              load the document and start the oracle
  /reset                             reload and clear the conversation history
  /history                           show the remembered messages
  /quit                              exit";

/// Work that may block, run outside the key handler so a notice can be drawn
/// first.
enum Pending {
    Initialize,
    Reset,
    Turn(String),
}

/// TUI application state.
pub struct OracleTui {
    oracle: Oracle,
    messages: Vec<OracleMessage>,
    input_buffer: String,
    /// Display lines scrolled back from the bottom of the transcript.
    scroll_offset: usize,
    pending: Option<Pending>,
    should_quit: bool,
}

impl OracleTui {
    pub fn new(oracle: Oracle) -> Self {
        let mut messages = vec![OracleMessage::system(
            "Welcome to doc-oracle. Pick a document and a model, then /init. \
             /help for commands, /quit to exit.",
        )];
        if oracle.state() == OracleState::Uninitialized {
            messages.push(OracleMessage::from_diagnostic(&SessionError::NotInitialized));
        }
        Self {
            oracle,
            messages,
            input_buffer: String::new(),
            scroll_offset: 0,
            pending: None,
            should_quit: false,
        }
    }

    /// Queue an initialize to run as soon as the loop starts.
    pub fn initialize_on_start(&mut self) {
        self.pending = Some(Pending::Initialize);
    }

    /// Run the TUI event loop.
    pub fn run(&mut self) -> miette::Result<()> {
        let mut terminal = ratatui::init();
        let result = self.event_loop(&mut terminal);
        ratatui::restore();
        result
    }

    fn event_loop(&mut self, terminal: &mut DefaultTerminal) -> miette::Result<()> {
        loop {
            self.draw(terminal)?;

            if self.should_quit {
                break;
            }

            if let Some(pending) = self.pending.take() {
                self.run_pending(terminal, pending)?;
                continue;
            }

            if event::poll(Duration::from_millis(100)).into_diagnostic()? {
                if let Event::Key(key) = event::read().into_diagnostic()? {
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    self.handle_key(key.code, key.modifiers);
                }
            }
        }
        Ok(())
    }

    fn draw<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> miette::Result<()> {
        let status = self.oracle.status();
        let mut scroll_offset = self.scroll_offset;
        terminal
            .draw(|frame| {
                scroll_offset = widgets::render(
                    frame,
                    &status,
                    &self.messages,
                    &self.input_buffer,
                    scroll_offset,
                );
            })
            .into_diagnostic()?;
        self.scroll_offset = scroll_offset;
        Ok(())
    }

    fn push(&mut self, msg: OracleMessage) {
        self.messages.push(msg);
        // Auto-scroll to bottom.
        self.scroll_offset = 0;
    }

    fn handle_key(&mut self, code: KeyCode, modifiers: KeyModifiers) {
        match code {
            KeyCode::Enter => {
                let input = self.input_buffer.trim().to_string();
                self.input_buffer.clear();

                if input.is_empty() {
                    return;
                }

                self.process_input(&input);
            }
            KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => {
                self.should_quit = true;
            }
            KeyCode::Char(c) => {
                self.input_buffer.push(c);
            }
            KeyCode::Backspace => {
                self.input_buffer.pop();
            }
            // The next draw clamps the offset to the transcript.
            KeyCode::PageUp => {
                self.scroll_offset = self.scroll_offset.saturating_add(10);
            }
            KeyCode::PageDown => {
                self.scroll_offset = self.scroll_offset.saturating_sub(10);
            }
            KeyCode::Home => {
                self.scroll_offset = usize::MAX;
            }
            KeyCode::End => {
                self.scroll_offset = 0;
            }
            KeyCode::Esc => {
                self.should_quit = true;
            }
            _ => {}
        }
    }

    fn process_input(&mut self, input: &str) {
        if let Some(cmd) = input.strip_prefix('/') {
            self.handle_command(cmd);
            return;
        }

        if self.oracle.state() == OracleState::Uninitialized {
            self.push(OracleMessage::from_diagnostic(&SessionError::NotInitialized));
            return;
        }
        self.pending = Some(Pending::Turn(input.to_string()));
    }

    fn handle_command(&mut self, cmd: &str) {
        let (name, arg) = match cmd.split_once(' ') {
            Some((name, arg)) => (name, Some(arg.trim()).filter(|a| !a.is_empty())),
            None => (cmd, None),
        };

        match name {
            "quit" | "q" => {
                self.should_quit = true;
            }
            "help" | "h" => {
                self.push(OracleMessage::system(HELP));
            }
            "type" | "t" => match arg.map(DocumentType::from_str_loose) {
                Some(Some(document_type)) => {
                    self.oracle.set_document_type(document_type);
                    let expects = if document_type.expects_url() {
                        "a URL"
                    } else {
                        "a file path"
                    };
                    self.push(OracleMessage::system(format!(
                        "Document type: {document_type}. /source takes {expects}."
                    )));
                }
                _ => {
                    let types: Vec<String> =
                        DocumentType::ALL.iter().map(|t| t.to_string()).collect();
                    self.push(OracleMessage::system(format!(
                        "Usage: /type <{}>",
                        types.join("|")
                    )));
                }
            },
            "source" | "s" => match arg {
                Some(source) => {
                    self.oracle.set_source(source);
                    self.push(OracleMessage::system(format!("Source: {source}")));
                }
                None => self.push(OracleMessage::system("Usage: /source <url or path>")),
            },
            "provider" | "p" => match arg {
                Some(provider) => match self.oracle.set_provider(provider) {
                    Ok(()) => {
                        let status = self.oracle.status();
                        let key_note = match status.provider.as_deref() {
                            Some(p) if self.oracle.session().api_key(p).is_some() => {
                                "stored key will be used"
                            }
                            _ => "set a key with /key",
                        };
                        self.push(OracleMessage::system(format!(
                            "Provider: {}, model: {} ({key_note}).",
                            status.provider.unwrap_or_default(),
                            status.model.unwrap_or_default(),
                        )));
                    }
                    Err(e) => self.push(OracleMessage::from_diagnostic(&e)),
                },
                None => {
                    let names: Vec<&str> = self.oracle.registry().names().collect();
                    self.push(OracleMessage::system(format!(
                        "Providers: {}. Usage: /provider <name>",
                        names.join(", ")
                    )));
                }
            },
            "model" | "m" => match arg {
                Some(model) => match self.oracle.set_model(model) {
                    Ok(()) => self.push(OracleMessage::system(format!("Model: {model}"))),
                    Err(e) => self.push(OracleMessage::from_diagnostic(&e)),
                },
                None => self.push(OracleMessage::system("Usage: /model <name> (see /models)")),
            },
            "models" => {
                let models = self.oracle.models().join(", ");
                self.push(OracleMessage::system(format!("Models: {models}")));
            }
            "key" | "k" => match arg {
                Some(key) => match self.oracle.set_api_key(key) {
                    Ok(()) => {
                        let provider = self.oracle.status().provider.unwrap_or_default();
                        self.push(OracleMessage::system(format!("API key stored for {provider}.")));
                    }
                    Err(e) => self.push(OracleMessage::from_diagnostic(&e)),
                },
                None => self.push(OracleMessage::system("Usage: /key <secret>")),
            },
            "init" | "i" => {
                self.pending = Some(Pending::Initialize);
            }
            "reset" | "r" => {
                self.pending = Some(Pending::Reset);
            }
            "history" => {
                let history = self.oracle.history().messages();
                if history.is_empty() {
                    self.push(OracleMessage::system("History is empty."));
                } else {
                    for m in history {
                        self.push(OracleMessage::system(format!("[{}] {}", m.role, m.content)));
                    }
                }
            }
            _ => {
                self.push(OracleMessage::system(format!(
                    "Unknown command: /{cmd}. Type /help for commands."
                )));
            }
        }
    }

    fn run_pending<B: Backend>(
        &mut self,
        terminal: &mut Terminal<B>,
        pending: Pending,
    ) -> miette::Result<()> {
        match pending {
            Pending::Initialize => {
                self.push(OracleMessage::system("Loading the document..."));
                self.draw(terminal)?;
                match self.oracle.initialize() {
                    Ok(()) => self.push(OracleMessage::system(self.ready_notice())),
                    Err(e) => self.push(OracleMessage::from_diagnostic(&e)),
                }
            }
            Pending::Reset => {
                self.push(OracleMessage::system("Reloading the document..."));
                self.draw(terminal)?;
                match self.oracle.reset_history() {
                    Ok(()) => {
                        self.messages.clear();
                        self.scroll_offset = 0;
                        self.push(OracleMessage::system(format!(
                            "History cleared. {}",
                            self.ready_notice()
                        )));
                    }
                    Err(e) => self.push(OracleMessage::from_diagnostic(&e)),
                }
            }
            Pending::Turn(input) => self.run_turn(terminal, &input)?,
        }
        Ok(())
    }

    fn ready_notice(&self) -> String {
        match self.oracle.session().chain() {
            Ok(chain) => format!(
                "Oracle ready: {} document, {} / {}.",
                chain.document_type(),
                chain.provider(),
                chain.model_name()
            ),
            Err(_) => "Oracle not initialized.".to_string(),
        }
    }

    /// Stream one turn, redrawing after every token.
    fn run_turn<B: Backend>(
        &mut self,
        terminal: &mut Terminal<B>,
        input: &str,
    ) -> miette::Result<()> {
        self.push(OracleMessage::user(input));
        self.push(OracleMessage::assistant(String::new()));
        self.draw(terminal)?;

        // The view stays pinned to the bottom while the reply streams.
        let status = self.oracle.status();
        let Self {
            oracle,
            messages,
            input_buffer,
            ..
        } = self;

        let mut draw_error = None;
        let result = oracle.send(input, |token| {
            if let Some(OracleMessage::Assistant { text }) = messages.last_mut() {
                text.push_str(token);
            }
            if draw_error.is_some() {
                return;
            }
            let drawn = terminal.draw(|frame| {
                widgets::render(
                    frame,
                    &status,
                    messages.as_slice(),
                    input_buffer.as_str(),
                    0,
                );
            });
            if let Err(e) = drawn {
                draw_error = Some(e);
            }
        });

        if let Err(e) = result {
            self.messages.pop();
            self.push(OracleMessage::from_diagnostic(&e));
        }
        if let Some(e) = draw_error {
            return Err(e).into_diagnostic();
        }
        Ok(())
    }
}

/// Launch the TUI, initializing immediately when `initialize` is set.
pub fn launch(oracle: Oracle, initialize: bool) -> miette::Result<()> {
    let mut tui = OracleTui::new(oracle);
    if initialize {
        tui.initialize_on_start();
    }
    tui.run()
}
