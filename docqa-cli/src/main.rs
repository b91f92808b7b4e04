//! # docqa
//!
//! Ask questions about your own documents.
//!
//! Usage:
//!   docqa ingest moby-dick.pdf          # store and index a document
//!   docqa ask "Who is Ishmael?"         # answer from the stored documents
//!   docqa books                         # list stored documents
//!   docqa delete 3                      # remove a document
//!   docqa history --limit 5             # recent questions and answers
//!   docqa model large                   # answer with the large local model from now on
//!   docqa                               # interactive session

mod app;
mod loader;
mod repl;
mod settings;
mod telemetry;

use std::io::Write;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use docqa_rag::{BackendKind, DEFAULT_HISTORY_LIMIT, DocumentId, DocumentStore, LocalModelSize};

use crate::app::App;
use crate::settings::Settings;

#[derive(Parser)]
#[command(name = "docqa", version, about = "Ask questions about your documents")]
struct Cli {
    #[command(flatten)]
    settings: Settings,

    /// Emit logs as JSON
    #[arg(long, env = "DOCQA_LOG_JSON", global = true)]
    json_logs: bool,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Store and index a .pdf, .txt or .md file
    Ingest {
        file: PathBuf,
        /// Title shown in listings (defaults to the file name)
        #[arg(long)]
        title: Option<String>,
    },
    /// Answer a question from the stored documents
    Ask {
        question: String,
        /// Also print the passages the answer was based on
        #[arg(long)]
        sources: bool,
        /// Print the answer and its sources as JSON
        #[arg(long)]
        json: bool,
    },
    /// List stored documents
    Books {
        #[arg(long)]
        json: bool,
    },
    /// Remove a stored document
    Delete { id: i64 },
    /// Show recent questions and answers
    History {
        #[arg(long, default_value_t = DEFAULT_HISTORY_LIMIT)]
        limit: usize,
    },
    /// Show the generation model, or save the local model size to use
    Model { size: Option<LocalModelSize> },
    /// Interactive session (the default)
    Repl,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let filter =
        if cli.verbose { "docqa_rag=debug,docqa=debug,info" } else { "warn,docqa_rag=info" };
    telemetry::init(filter, cli.json_logs);

    let settings = cli.settings;
    let mut out = std::io::stdout();

    match cli.command.unwrap_or(Command::Repl) {
        // These only touch the store; the index lives in memory.
        Command::Books { json } => {
            let store = app::open_store(&settings)?;
            app::list_books(&store, json, &mut out).await?;
        }
        Command::Delete { id } => {
            let store = app::open_store(&settings)?;
            let id = DocumentId::from(id);
            let existed = store.delete(&id).await?;
            app::report_delete(&id, existed, &mut out)?;
        }
        Command::History { limit } => {
            let store = app::open_store(&settings)?;
            app::show_history(&store, limit, &mut out).await?;
        }
        Command::Model { size } => {
            let store = app::open_store(&settings)?;
            if let Some(size) = size {
                app::save_model_size(&store, size).await?;
                writeln!(out, "Saved {size} as the local model size.")?;
            }
            let saved = app::saved_model_size(&store).await?;
            let (kind, model) = app::configured_model(&settings.generator_config(saved));
            app::list_models(kind, &model, &mut out)?;
            if kind == BackendKind::Hosted {
                writeln!(out, "Local models are used when OPENAI_API_KEY is not set.")?;
            }
        }
        Command::Ingest { file, title } => {
            App::start(&settings).await?.ingest(&file, title, &mut out).await?;
        }
        Command::Ask { question, sources, json } => {
            App::start(&settings).await?.ask(&question, sources, json, &mut out).await?;
        }
        Command::Repl => {
            let app = App::start(&settings).await?;
            repl::run(&app).await?;
        }
    }
    Ok(())
}
