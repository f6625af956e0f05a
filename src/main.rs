//! doc-oracle CLI: chat with a document.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use miette::Result;

use doc_oracle::config::OracleConfig;
use doc_oracle::loader::{self, DocumentType, RawInput};
use doc_oracle::message::{JsonSink, MessageSink, OracleMessage, StdoutSink};
use doc_oracle::oracle::Oracle;
use doc_oracle::paths::OraclePaths;
use doc_oracle::provider::ProviderRegistry;
use doc_oracle::session::Session;

#[derive(Parser)]
#[command(name = "doc-oracle", version, about = "Chat with an oracle grounded in a document")]
struct Cli {
    /// Config file (default: $XDG_CONFIG_HOME/doc-oracle/config.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ModelArgs {
    /// Provider name (Groq, OpenAI).
    #[arg(long)]
    provider: Option<String>,

    /// Model name; defaults to the provider's first model.
    #[arg(long)]
    model: Option<String>,

    /// API key; defaults to GROQ_API_KEY / OPENAI_API_KEY.
    #[arg(long)]
    api_key: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the interactive chat screen.
    Chat {
        /// Document type (Site, Youtube, PDF, CSV, Txt).
        #[arg(long = "type", value_parser = parse_document_type)]
        document_type: Option<DocumentType>,

        /// URL for Site/Youtube, file path otherwise.
        #[arg(long)]
        source: Option<String>,

        #[command(flatten)]
        model: ModelArgs,
    },

    /// Ask a single question and stream the answer to stdout.
    Ask {
        #[arg(long = "type", value_parser = parse_document_type)]
        document_type: DocumentType,

        #[arg(long)]
        source: String,

        #[command(flatten)]
        model: ModelArgs,

        /// The question.
        #[arg(long)]
        question: String,

        /// Emit newline-delimited JSON messages instead of plain text.
        #[arg(long)]
        json: bool,
    },

    /// Print the text extracted from a document.
    Extract {
        #[arg(long = "type", value_parser = parse_document_type)]
        document_type: DocumentType,

        #[arg(long)]
        source: String,
    },

    /// List providers and their models.
    Providers,
}

fn parse_document_type(s: &str) -> std::result::Result<DocumentType, String> {
    DocumentType::from_str_loose(s).ok_or_else(|| {
        let known: Vec<String> = DocumentType::ALL.iter().map(|t| t.to_string()).collect();
        format!("unknown document type \"{s}\" (expected one of {})", known.join(", "))
    })
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Chat {
            document_type,
            source,
            model,
        } => {
            let mut oracle = build_oracle(&config, &model)?;
            let ready = document_type.is_some() && source.is_some();
            if let Some(document_type) = document_type {
                oracle.set_document_type(document_type);
            }
            if let Some(source) = source {
                oracle.set_source(source);
            }
            doc_oracle::tui::launch(oracle, ready)?;
        }

        Commands::Ask {
            document_type,
            source,
            model,
            question,
            json,
        } => {
            let mut oracle = build_oracle(&config, &model)?;
            oracle.set_document_type(document_type);
            oracle.set_source(source);
            oracle.initialize()?;

            let sink: Box<dyn MessageSink> = if json {
                Box::new(JsonSink)
            } else {
                Box::new(StdoutSink)
            };
            if json {
                sink.emit(&OracleMessage::user(&question));
            }
            let reply = oracle.send(&question, |token| sink.emit(&OracleMessage::token(token)))?;
            if json {
                sink.emit(&OracleMessage::assistant(reply));
            } else {
                println!();
            }
        }

        Commands::Extract {
            document_type,
            source,
        } => {
            let input = RawInput::from_source(document_type, &source)?;
            let text = loader::load_with(&config.chain_settings().loader, document_type, &input)?;
            println!("{text}");
        }

        Commands::Providers => {
            let registry = ProviderRegistry::builtin(&config.provider_settings());
            let session = Session::with_env_keys();
            for entry in registry.entries() {
                let key = if session.api_key(&entry.name).is_some() {
                    "key from environment"
                } else {
                    "no key"
                };
                println!("{} ({key}):", entry.name);
                for model in &entry.models {
                    println!("  {model}");
                }
            }
        }
    }

    Ok(())
}

fn load_config(path: Option<&std::path::Path>) -> Result<OracleConfig> {
    if let Some(path) = path {
        return Ok(OracleConfig::load(path)?);
    }
    match OraclePaths::resolve() {
        Ok(paths) => Ok(OracleConfig::load_or_default(&paths.config_file())?),
        Err(e) => {
            tracing::warn!(error = %e, "no config directory, using defaults");
            Ok(OracleConfig::default())
        }
    }
}

fn build_oracle(config: &OracleConfig, args: &ModelArgs) -> Result<Oracle> {
    let registry = ProviderRegistry::builtin(&config.provider_settings());
    let mut oracle =
        Oracle::new(registry, config.chain_settings()).with_session(Session::with_env_keys());
    if let Some(provider) = &args.provider {
        oracle.set_provider(provider)?;
    }
    if let Some(model) = &args.model {
        oracle.set_model(model)?;
    }
    if let Some(key) = &args.api_key {
        oracle.set_api_key(key.as_str())?;
    }
    Ok(oracle)
}
