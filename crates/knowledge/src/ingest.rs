//! Document ingestion pipeline: parse, chunk, embed, index.

use crate::chunker::StructureAwareChunker;
use crate::embeddings::{create_provider, EmbeddingConfig, EmbeddingProvider};
use crate::parser::{self, DocumentKind};
use crate::progress::ProgressReporter;
use crate::search::{create_search_index, SearchIndex};
use crate::types::{DocumentChunk, IngestStats, SearchDocument};
use finagent_core::{AppConfig, AppError, AppResult};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;
use walkdir::WalkDir;

/// Documents uploaded per indexing request.
pub const INDEX_BATCH_SIZE: usize = 100;

/// Chunks embedded per provider call.
const EMBED_BATCH_SIZE: usize = 100;

/// Chunks and page count of one processed document.
#[derive(Debug, Clone)]
pub struct ProcessedDocument {
    pub name: String,
    pub pages: u32,
    pub chunks: Vec<DocumentChunk>,
}

/// Turns source documents into indexed chunks.
pub struct DocumentProcessor {
    chunker: StructureAwareChunker,
    embedder: Arc<dyn EmbeddingProvider>,
    index: Option<Arc<dyn SearchIndex>>,
    progress: ProgressReporter,
}

impl DocumentProcessor {
    pub fn new(
        chunker: StructureAwareChunker,
        embedder: Arc<dyn EmbeddingProvider>,
        index: Option<Arc<dyn SearchIndex>>,
    ) -> Self {
        Self {
            chunker,
            embedder,
            index,
            progress: ProgressReporter::noop(),
        }
    }

    /// Build the processor from configuration: chunk settings, embedding
    /// provider and search backend.
    pub fn from_config(config: &AppConfig) -> AppResult<Self> {
        let embedder = create_provider(&EmbeddingConfig::from_app_config(config))?;
        let index = create_search_index(config)?;
        let chunker = StructureAwareChunker::new(
            config.ingestion.chunk_size,
            config.ingestion.chunk_overlap,
        );

        tracing::info!(
            "Document processor ready (embeddings: {}/{}, index: {})",
            embedder.provider_name(),
            embedder.model_name(),
            index
                .as_ref()
                .map(|i| i.backend_name().to_string())
                .unwrap_or_else(|| "none".to_string())
        );

        Ok(Self::new(chunker, embedder, index))
    }

    pub fn with_progress(mut self, progress: ProgressReporter) -> Self {
        self.progress = progress;
        self
    }

    pub fn index(&self) -> Option<&Arc<dyn SearchIndex>> {
        self.index.as_ref()
    }

    pub fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedder
    }

    /// Parse and chunk a single document.
    pub fn process_pdf(&self, path: &Path) -> AppResult<Vec<DocumentChunk>> {
        Ok(self.process_document(path)?.chunks)
    }

    #[instrument(name = "process_pdf", skip_all, fields(path = %path.display()))]
    pub fn process_document(&self, path: &Path) -> AppResult<ProcessedDocument> {
        let name = parser::document_name(path);
        let pages = parser::parse_document(path)?;

        let mut chunks = Vec::new();
        for page in &pages {
            let page_chunks = self.chunker.chunk_text(&page.text, page.page_number, &name);
            tracing::info!(
                document = %name,
                page = page.page_number,
                chunks = page_chunks.len(),
                "page_processed"
            );
            chunks.extend(page_chunks);
        }

        tracing::info!(
            "Processed {:?}: {} pages, {} chunks",
            path,
            pages.len(),
            chunks.len()
        );

        Ok(ProcessedDocument {
            name,
            pages: pages.len() as u32,
            chunks,
        })
    }

    /// Fill in the embedding of every chunk.
    #[instrument(name = "generate_embeddings", skip_all, fields(count = chunks.len(), model = %self.embedder.model_name()))]
    pub async fn generate_embeddings(
        &self,
        mut chunks: Vec<DocumentChunk>,
    ) -> AppResult<Vec<DocumentChunk>> {
        let total = chunks.len() as u64;
        let mut done = 0u64;

        for batch in chunks.chunks_mut(EMBED_BATCH_SIZE) {
            let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
            let embeddings = self.embedder.embed_batch(&texts).await?;
            if embeddings.len() != batch.len() {
                return Err(AppError::Knowledge(format!(
                    "Embedding provider returned {} vectors for {} chunks",
                    embeddings.len(),
                    batch.len()
                )));
            }

            for (chunk, embedding) in batch.iter_mut().zip(embeddings) {
                chunk.embedding = Some(embedding);
            }

            done += batch.len() as u64;
            self.progress.embed(done, total, self.embedder.model_name());
        }

        tracing::info!("Generated {} embeddings", total);
        Ok(chunks)
    }

    /// Upload embedded chunks to the search index in batches.
    ///
    /// Returns the number of documents stored; 0 when no index is configured.
    #[instrument(name = "index_chunks", skip_all, fields(count = chunks.len()))]
    pub async fn index_chunks(&self, chunks: &[DocumentChunk]) -> AppResult<usize> {
        let index = match &self.index {
            Some(index) => index,
            None => {
                tracing::warn!("Search client not initialized; skipping indexing");
                return Ok(0);
            }
        };

        index.ensure_index(self.embedder.dimensions()).await?;

        let documents: Vec<SearchDocument> = chunks
            .iter()
            .filter_map(|chunk| {
                let doc = SearchDocument::from_chunk(chunk);
                if doc.is_none() {
                    tracing::warn!("Chunk {} has no embedding; not indexed", chunk.id);
                }
                doc
            })
            .collect();

        let total = documents.len() as u64;
        let batches = documents.len().div_ceil(INDEX_BATCH_SIZE);
        let mut indexed = 0usize;

        for (i, batch) in documents.chunks(INDEX_BATCH_SIZE).enumerate() {
            indexed += index.upload(batch).await?;
            tracing::info!(
                "Indexed batch {}/{} ({} documents)",
                i + 1,
                batches,
                batch.len()
            );
            self.progress.index(indexed as u64, total, index.backend_name());
        }

        Ok(indexed)
    }

    /// Ingest every supported document directly inside `directory`.
    pub async fn process_directory(&self, directory: &Path) -> AppResult<IngestStats> {
        let start = Instant::now();

        if !directory.is_dir() {
            return Err(AppError::Knowledge(format!(
                "Directory not found: {:?}",
                directory
            )));
        }

        let files = discover_documents(directory);
        self.progress
            .discover(files.len() as u64, &directory.display().to_string());

        if files.is_empty() {
            tracing::warn!("No documents found in {:?}", directory);
            return Ok(IngestStats::default());
        }

        tracing::info!("Found {} documents in {:?}", files.len(), directory);

        let mut stats = IngestStats::default();
        let mut all_chunks = Vec::new();
        let total = files.len() as u64;

        for (i, path) in files.iter().enumerate() {
            let label = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            self.progress.parse(i as u64 + 1, total, &label);

            match self.process_document(path) {
                Ok(document) => {
                    self.progress.chunk(
                        i as u64 + 1,
                        total,
                        &document.name,
                        document.pages,
                        document.chunks.len(),
                    );
                    stats.documents += 1;
                    stats.pages += document.pages;
                    all_chunks.extend(document.chunks);
                }
                Err(e) => {
                    tracing::error!("Failed to process {:?}: {}", path, e);
                    stats.failed += 1;
                }
            }
        }

        stats.chunks = all_chunks.len() as u32;

        if !all_chunks.is_empty() {
            let embedded = self.generate_embeddings(all_chunks).await?;
            stats.indexed = self.index_chunks(&embedded).await? as u32;
        }

        stats.duration_secs = start.elapsed().as_secs_f64();

        tracing::info!(
            "Ingestion complete: {} documents, {} pages, {} chunks, {} indexed in {:.2}s",
            stats.documents,
            stats.pages,
            stats.chunks,
            stats.indexed,
            stats.duration_secs
        );

        Ok(stats)
    }
}

/// Supported documents directly inside `directory`, sorted by name.
pub fn discover_documents(directory: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(directory)
        .min_depth(1)
        .max_depth(1)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| DocumentKind::from_path(p).is_supported())
        .collect();

    files.sort();
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::providers::HashEmbeddings;
    use crate::progress::ProgressEvent;
    use crate::search::{HybridQuery, LocalSearchIndex};
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;

    fn processor(dir: &Path) -> DocumentProcessor {
        let index: Arc<dyn SearchIndex> =
            Arc::new(LocalSearchIndex::open(&dir.join("index.sqlite"), "financial-docs").unwrap());
        DocumentProcessor::new(
            StructureAwareChunker::default(),
            Arc::new(HashEmbeddings::new(64)),
            Some(index),
        )
    }

    #[test]
    fn test_discover_documents_is_flat_and_sorted() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("b.txt"), "b").unwrap();
        fs::write(dir.path().join("a.md"), "a").unwrap();
        fs::write(dir.path().join("chart.png"), "png").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested/c.txt"), "c").unwrap();

        let files = discover_documents(dir.path());
        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.md", "b.txt"]);
    }

    #[test]
    fn test_document_name_keeps_spaces_but_id_does_not() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Q3 2024 Report.txt");
        fs::write(&path, "BALANCE SHEET\nCash on hand was $500 million.").unwrap();

        let document = processor(dir.path()).process_document(&path).unwrap();
        assert_eq!(document.name, "Q3 2024 Report");
        assert_eq!(document.pages, 1);
        assert_eq!(document.chunks[0].id, "Q3_2024_Report_p1_c0");
        assert_eq!(document.chunks[0].document_name, "Q3 2024 Report");
        assert_eq!(document.chunks[0].section, "BALANCE SHEET");
    }

    #[tokio::test]
    async fn test_process_directory_indexes_chunks() {
        let workspace = TempDir::new().unwrap();
        let docs = workspace.path().join("docs");
        fs::create_dir(&docs).unwrap();
        fs::write(
            docs.join("q3.txt"),
            "EXECUTIVE SUMMARY\nSales grew 12% to $5.2 million.\nRISK FACTORS\nCurrency exposure remains high.",
        )
        .unwrap();
        fs::write(docs.join("q4.md"), "# INCOME STATEMENT\nNet income was $1.4 million.").unwrap();

        let events = Arc::new(Mutex::new(Vec::<ProgressEvent>::new()));
        let sink = events.clone();
        let processor = processor(workspace.path())
            .with_progress(ProgressReporter::new(Arc::new(move |e| sink.lock().unwrap().push(e))));

        let stats = processor.process_directory(&docs).await.unwrap();
        assert_eq!(stats.documents, 2);
        assert_eq!(stats.pages, 2);
        assert_eq!(stats.chunks, 3);
        assert_eq!(stats.indexed, 3);
        assert_eq!(stats.failed, 0);

        let index = processor.index().unwrap();
        let index_stats = index.stats().await.unwrap();
        assert_eq!(index_stats.documents, 2);

        let embedding = processor.embedder().embed("net income").await.unwrap();
        let results = index
            .search(&HybridQuery::new("net income", embedding, 1))
            .await
            .unwrap();
        assert_eq!(results[0].document_name, "q4");

        let phases: Vec<String> = events.lock().unwrap().iter().map(|e| e.phase.clone()).collect();
        assert_eq!(phases.first().map(String::as_str), Some("discover"));
        assert!(phases.iter().any(|p| p == "embed"));
        assert_eq!(phases.last().map(String::as_str), Some("index"));
    }

    #[tokio::test]
    async fn test_empty_directory_returns_empty_stats() {
        let dir = TempDir::new().unwrap();
        let stats = processor(dir.path()).process_directory(dir.path()).await.unwrap();
        assert_eq!(stats.documents, 0);
        assert_eq!(stats.chunks, 0);
    }

    #[tokio::test]
    async fn test_index_chunks_without_index_is_skipped() {
        let processor = DocumentProcessor::new(
            StructureAwareChunker::default(),
            Arc::new(HashEmbeddings::new(8)),
            None,
        );
        assert_eq!(processor.index_chunks(&[]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_missing_directory_is_error() {
        let dir = TempDir::new().unwrap();
        let result = processor(dir.path())
            .process_directory(&dir.path().join("missing"))
            .await;
        assert!(result.is_err());
    }
}
