//! Document ingestion
//!
//! ```text
//! upload -> extract text -> header split -> recursive split
//!        -> embed (search_document, batched) -> insert into store
//! ```
//!
//! Files are processed concurrently. A failing file is reported by name and
//! does not abort the others. Extraction and chunking run on the blocking
//! pool; a panic inside the PDF parser fails only the file being parsed.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use docqa_core::{Chunk, EmbedInputType, Embedder, StoredChunk, VectorStore};
use futures::future::{join_all, try_join_all};
use serde::Serialize;

use crate::chunker::MarkdownChunker;
use crate::RagError;

/// One uploaded file
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Outcome of a multi-file upload
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub uploaded: Vec<String>,
    pub failed: Vec<String>,
}

impl IngestReport {
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileKind {
    Pdf,
    Text,
}

fn file_kind(file: &UploadedFile) -> Option<FileKind> {
    if file.content_type.as_deref() == Some("application/pdf") {
        return Some(FileKind::Pdf);
    }

    let extension = Path::new(&file.filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());

    match extension.as_deref() {
        Some("pdf") => Some(FileKind::Pdf),
        Some("md") | Some("markdown") | Some("txt") => Some(FileKind::Text),
        _ => match file.content_type.as_deref() {
            Some("text/markdown") | Some("text/plain") => Some(FileKind::Text),
            _ => None,
        },
    }
}

/// Extract the text of an uploaded file
///
/// PDF text comes from `pdf-extract`; markdown and plain text are read as
/// UTF-8. A file with no extractable text is an error.
pub fn extract_text(file: &UploadedFile) -> Result<String, RagError> {
    let text = match file_kind(file) {
        Some(FileKind::Pdf) => pdf_extract::extract_text_from_mem(&file.bytes).map_err(|e| {
            RagError::Extraction(format!("Failed to extract text from {}: {}", file.filename, e))
        })?,
        Some(FileKind::Text) => String::from_utf8(file.bytes.clone()).map_err(|e| {
            RagError::Extraction(format!("{} is not valid UTF-8: {}", file.filename, e))
        })?,
        None => return Err(RagError::UnsupportedFile(file.filename.clone())),
    };

    if text.trim().is_empty() {
        return Err(RagError::Extraction(format!(
            "{} contains no extractable text",
            file.filename
        )));
    }
    Ok(text)
}

/// Run CPU-bound parsing off the async workers
///
/// A panic in `work` becomes an extraction error for `filename`.
async fn run_blocking<T, F>(filename: &str, work: F) -> Result<T, RagError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, RagError> + Send + 'static,
{
    tokio::task::spawn_blocking(work).await.map_err(|e| {
        RagError::Extraction(format!("Failed to extract text from {}: {}", filename, e))
    })?
}

/// Chunks, embeds and stores uploaded files
pub struct Ingestor {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    chunker: MarkdownChunker,
    batch_size: usize,
}

impl Ingestor {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        chunker: MarkdownChunker,
        batch_size: usize,
    ) -> Self {
        Self {
            embedder,
            store,
            chunker,
            batch_size: batch_size.max(1),
        }
    }

    /// Ingest every file concurrently and report which ones failed
    pub async fn ingest_files(&self, files: Vec<UploadedFile>) -> IngestReport {
        let results = join_all(files.iter().map(|file| self.ingest_file(file))).await;

        let mut report = IngestReport::default();
        for (file, result) in files.iter().zip(results) {
            match result {
                Ok(chunks) => {
                    tracing::info!(filename = %file.filename, chunks, "Ingested file");
                    report.uploaded.push(file.filename.clone());
                }
                Err(e) => {
                    metrics::counter!("docqa_ingestion_failures_total").increment(1);
                    tracing::warn!(filename = %file.filename, error = %e, "File ingestion failed");
                    report.failed.push(file.filename.clone());
                }
            }
        }
        report
    }

    /// Ingest one file, returning the number of chunks stored
    pub async fn ingest_file(&self, file: &UploadedFile) -> Result<usize, RagError> {
        let start = Instant::now();

        let chunker = self.chunker.clone();
        let owned = file.clone();
        let chunks = run_blocking(&file.filename, move || {
            let text = extract_text(&owned)?;
            Ok(chunker.chunk(&text))
        })
        .await?;
        if chunks.is_empty() {
            return Err(RagError::Extraction(format!(
                "{} produced no chunks",
                file.filename
            )));
        }

        let batches = chunks
            .chunks(self.batch_size)
            .map(|batch| self.store_batch(&file.filename, batch));
        try_join_all(batches).await?;

        metrics::histogram!("docqa_stage_latency_seconds", "stage" => "ingestion")
            .record(start.elapsed().as_secs_f64());
        Ok(chunks.len())
    }

    async fn store_batch(
        &self,
        filename: &str,
        batch: &[Chunk],
    ) -> Result<(), RagError> {
        let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
        let vectors = self
            .embedder
            .embed(&texts, EmbedInputType::SearchDocument)
            .await?;

        if vectors.len() != batch.len() {
            return Err(RagError::Embedding(format!(
                "expected {} embeddings, got {}",
                batch.len(),
                vectors.len()
            )));
        }

        let objects = batch
            .iter()
            .zip(vectors)
            .map(|(chunk, vector)| StoredChunk {
                filename: filename.to_string(),
                title: if chunk.title.is_empty() {
                    filename.to_string()
                } else {
                    chunk.title.clone()
                },
                content: chunk.content.clone(),
                vector,
            })
            .collect();

        let outcome = self.store.insert_many(objects).await?;
        if outcome.has_errors {
            return Err(RagError::VectorStore(format!(
                "insert reported errors for {} ({} of {} stored)",
                filename,
                outcome.inserted,
                batch.len()
            )));
        }
        Ok(())
    }
}
