//! The operations behind each command.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use docqa_rag::{
    AnswerGenerator, BackendKind, DocumentId, DocumentStore, Exchange, GeneratorConfig,
    HistoryLog, LocalModelSize, NewDocument, Pipeline, Retriever, SqliteDocumentStore,
};
use tracing::{info, warn};

use crate::loader;
use crate::settings::Settings;

/// Longest source excerpt printed with `--sources`.
const EXCERPT_CHARS: usize = 160;

/// Settings key of the local model size chosen with `model <size>`.
const MODEL_SIZE_KEY: &str = "model_size";

/// Open the document store named in `settings`.
pub fn open_store(settings: &Settings) -> Result<SqliteDocumentStore> {
    if let Some(parent) = settings.database.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("cannot create {}", parent.display()))?;
    }
    Ok(SqliteDocumentStore::open(&settings.database)?)
}

/// The local model size saved by an earlier `model <size>`.
pub async fn saved_model_size(store: &SqliteDocumentStore) -> Result<Option<LocalModelSize>> {
    let Some(saved) = store.setting(MODEL_SIZE_KEY).await? else {
        return Ok(None);
    };
    match saved.parse::<LocalModelSize>() {
        Ok(size) => Ok(Some(size)),
        Err(e) => {
            warn!(saved = %saved, error = %e, "ignoring saved model size");
            Ok(None)
        }
    }
}

/// Remember `size` for later invocations.
pub async fn save_model_size(store: &SqliteDocumentStore, size: LocalModelSize) -> Result<()> {
    store.set_setting(MODEL_SIZE_KEY, size.as_str()).await?;
    Ok(())
}

/// A loaded pipeline with its document store.
pub struct App {
    pipeline: Pipeline,
    store: SqliteDocumentStore,
}

impl App {
    /// Build the embedder and generator, then rebuild the index from the store.
    pub async fn start(settings: &Settings) -> Result<Self> {
        let store = open_store(settings)?;
        let retriever = Retriever::builder()
            .config(settings.rag_config()?)
            .embedding_provider(settings.embedding_provider().await?)
            .build()?;
        let saved = saved_model_size(&store).await?;
        let generator = AnswerGenerator::from_config(&settings.generator_config(saved)).await?;
        let pipeline = Pipeline::builder().retriever(retriever).generator(generator).build()?;

        let restored = pipeline.restore(&store).await?;
        info!(documents = restored, "library loaded");
        Ok(Self { pipeline, store })
    }

    /// Decode, store and index a file. The stored row is removed again if
    /// indexing fails.
    pub async fn ingest(
        &self,
        path: &Path,
        title: Option<String>,
        out: &mut impl Write,
    ) -> Result<()> {
        let loaded = loader::load(path).await?;
        let mut upload = NewDocument::from_file(&loaded.filename, loaded.text);
        if let Some(title) = title {
            upload.title = title;
        }

        let document = self.store.insert(upload).await?;
        let chunks = match self.pipeline.ingest_document(&document).await {
            Ok(chunks) => chunks,
            Err(e) => {
                if let Err(rollback) = self.store.delete(&document.id).await {
                    warn!(
                        document.id = %document.id,
                        error = %rollback,
                        "failed to roll back stored document"
                    );
                }
                return Err(e.into());
            }
        };

        writeln!(out, "Added '{}' as #{} ({} chunks).", document.title, document.id, chunks)?;
        Ok(())
    }

    /// Answer `question` and record the exchange in the history.
    pub async fn ask(
        &self,
        question: &str,
        sources: bool,
        json: bool,
        out: &mut impl Write,
    ) -> Result<()> {
        let answer = self.pipeline.ask_with_sources(question).await?;
        if let Err(e) = self.store.record(Exchange::new(question, answer.text.clone())).await {
            warn!(error = %e, "failed to record question in history");
        }
        if json {
            writeln!(out, "{}", serde_json::to_string_pretty(&answer)?)?;
            return Ok(());
        }

        writeln!(out, "{}", answer.text)?;
        if sources && !answer.sources.is_empty() {
            writeln!(out, "\nSources:")?;
            for result in &answer.sources {
                let title = match self.store.get(&result.chunk.source).await? {
                    Some(document) => document.title,
                    None => result.chunk.source.to_string(),
                };
                writeln!(
                    out,
                    "  [{:.3}] {} (chunk {}): {}",
                    result.score,
                    title,
                    result.chunk.chunk_index,
                    excerpt(&result.chunk.content)
                )?;
            }
        }
        Ok(())
    }

    pub async fn delete(&self, id: &DocumentId, out: &mut impl Write) -> Result<()> {
        let stored = self.store.delete(id).await?;
        self.pipeline.delete_document(id).await?;
        report_delete(id, stored, out)
    }

    pub async fn books(&self, json: bool, out: &mut impl Write) -> Result<()> {
        list_books(&self.store, json, out).await
    }

    pub async fn history(&self, limit: usize, out: &mut impl Write) -> Result<()> {
        show_history(&self.store, limit, out).await
    }

    /// Show the active backend, or switch the running session to the local
    /// model of `size` and save the choice.
    pub async fn model(&self, size: Option<LocalModelSize>, out: &mut impl Write) -> Result<()> {
        if let Some(size) = size {
            writeln!(out, "Loading {} ({})...", size.model_id(), size.description())?;
            let generator = AnswerGenerator::from_config(&GeneratorConfig::local(size)).await?;
            self.pipeline.replace_generator(generator).await;
            save_model_size(&self.store, size).await?;
        }

        let active = self.pipeline.generator_info().await;
        list_models(active.kind, &active.model, out)
    }
}

/// Print the current backend and the local sizes, marking the active one.
pub fn list_models(kind: BackendKind, model: &str, out: &mut impl Write) -> Result<()> {
    let current = match kind {
        BackendKind::Hosted => "hosted",
        BackendKind::Local => "local",
    };
    writeln!(out, "Current model: {model} ({current})")?;
    writeln!(out, "Available local models:")?;
    for size in LocalModelSize::ALL {
        let active = kind == BackendKind::Local && model == size.model_id();
        let marker = if active { "*" } else { " " };
        writeln!(
            out,
            " {marker} {:<6} {:<9} {}",
            size.as_str(),
            size.model_id(),
            size.description()
        )?;
    }
    Ok(())
}

/// The backend and model `config` would load.
pub fn configured_model(config: &GeneratorConfig) -> (BackendKind, String) {
    match config {
        GeneratorConfig::Hosted(hosted) => (BackendKind::Hosted, hosted.model.clone()),
        GeneratorConfig::Local(local) => (BackendKind::Local, local.model_id().to_string()),
    }
}

/// Print the latest `limit` questions and answers, oldest first.
pub async fn show_history(log: &dyn HistoryLog, limit: usize, out: &mut impl Write) -> Result<()> {
    let exchanges = log.recent(limit).await?;
    if exchanges.is_empty() {
        writeln!(out, "No questions asked yet.")?;
        return Ok(());
    }
    for exchange in &exchanges {
        writeln!(out, "[{}]", exchange.asked_at.format("%Y-%m-%d %H:%M"))?;
        writeln!(out, "Q: {}", exchange.question)?;
        writeln!(out, "A: {}\n", exchange.answer)?;
    }
    Ok(())
}

/// Print every stored document.
pub async fn list_books(
    store: &dyn DocumentStore,
    json: bool,
    out: &mut impl Write,
) -> Result<()> {
    let documents = store.list().await?;
    if json {
        writeln!(out, "{}", serde_json::to_string_pretty(&documents)?)?;
        return Ok(());
    }
    if documents.is_empty() {
        writeln!(out, "No documents yet. Add one with `docqa ingest <file>`.")?;
        return Ok(());
    }
    for document in &documents {
        writeln!(
            out,
            "#{:<4} {:<40} {:<4} {:>8} words  {}",
            document.id.as_str(),
            document.title,
            document.kind.as_str(),
            document.text.split_whitespace().count(),
            document.created_at.format("%Y-%m-%d %H:%M")
        )?;
    }
    Ok(())
}

pub fn report_delete(id: &DocumentId, existed: bool, out: &mut impl Write) -> Result<()> {
    if existed {
        writeln!(out, "Deleted #{id}.")?;
    } else {
        writeln!(out, "No document with id {id}.")?;
    }
    Ok(())
}

fn excerpt(content: &str) -> String {
    let flat = content.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= EXCERPT_CHARS {
        return flat;
    }
    let cut: String = flat.chars().take(EXCERPT_CHARS).collect();
    format!("{cut}...")
}
