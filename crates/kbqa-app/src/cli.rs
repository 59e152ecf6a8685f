use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// kbqa: ask questions against a knowledge-base server.
#[derive(Parser, Debug)]
#[command(name = "kbqa", version, about)]
pub struct Args {
    /// Config file path override.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level override (trace, debug, info, warn, error) or a full
    /// filter directive.
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// List knowledge bases.
    Kbs,

    /// List the documents of a knowledge base.
    Docs { kb: String },

    /// Add documents by URL (non-http(s) entries are skipped).
    AddDocs {
        kb: String,
        #[arg(required = true)]
        urls: Vec<String>,
        /// Keep polling until ingestion settles.
        #[arg(long)]
        watch: bool,
    },

    /// Poll document ingestion until every document is completed or failed.
    Watch { kb: String },

    /// List the conversations of a knowledge base.
    Conversations { kb: String },

    /// Print the message history of a conversation.
    History { conversation: String },

    /// Delete a conversation.
    DeleteConversation {
        kb: String,
        id: String,
        /// Skip the confirmation prompt.
        #[arg(long)]
        yes: bool,
    },

    /// Ask a question and stream the answer.
    Ask {
        kb: String,
        /// Continue an existing conversation.
        #[arg(long)]
        conversation: Option<String>,
        #[arg(required = true, trailing_var_arg = true)]
        question: Vec<String>,
    },

    /// Print the effective configuration as JSON.
    Config,
}

pub fn parse() -> Args {
    Args::parse()
}

/// Log directive for a `--log-level` value: bare level names are scoped to
/// the kbqa crates, anything else is used verbatim.
pub fn log_directive(level: &str) -> String {
    match level.trim().to_ascii_lowercase().as_str() {
        lvl @ ("trace" | "debug" | "info" | "warn" | "error") => format!("kbqa={lvl}"),
        _ => level.trim().to_string(),
    }
}
