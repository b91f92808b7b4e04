//! Decoding uploaded files into plain text.

use std::path::Path;

use anyhow::{Context, Result, bail};
use docqa_rag::DocumentKind;
use tracing::debug;

/// A decoded upload.
#[derive(Debug)]
pub struct LoadedFile {
    pub filename: String,
    pub text: String,
}

/// Read `path` as plain text. PDFs are extracted on the blocking pool;
/// text and markdown files must be UTF-8. Other file types are rejected.
pub async fn load(path: &Path) -> Result<LoadedFile> {
    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .with_context(|| format!("not a file name: {}", path.display()))?
        .to_string();

    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("cannot read {}", path.display()))?;

    let text = match DocumentKind::from_filename(&filename) {
        DocumentKind::Pdf => {
            tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
                .await?
                .with_context(|| format!("cannot extract text from {filename}"))?
        }
        DocumentKind::Txt | DocumentKind::Markdown => {
            String::from_utf8(bytes).with_context(|| format!("{filename} is not valid UTF-8"))?
        }
        DocumentKind::Other(ext) => {
            bail!("unsupported file type '.{ext}' (expected .pdf, .txt or .md)")
        }
    };

    if text.trim().is_empty() {
        bail!("{filename} contains no extractable text");
    }
    debug!(file = %filename, chars = text.len(), "decoded upload");
    Ok(LoadedFile { filename, text })
}
