//! SQLite-backed local search index with hybrid ranking.
//!
//! Keyword ranking uses BM25 over unicode word tokens, vector ranking uses
//! cosine similarity, and both lists are merged with Reciprocal Rank Fusion.

use crate::search::{HybridQuery, SearchIndex};
use crate::types::{IndexStats, RetrievalResult, SearchDocument};
use finagent_core::{AppError, AppResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use unicode_segmentation::UnicodeSegmentation;

/// BM25 term frequency saturation
const BM25_K1: f64 = 1.2;
/// BM25 length normalisation
const BM25_B: f64 = 0.75;
/// Reciprocal Rank Fusion constant
pub const RRF_K: f64 = 60.0;

/// Local hybrid search index stored in a single SQLite file.
pub struct LocalSearchIndex {
    path: PathBuf,
    index_name: String,
    conn: Arc<Mutex<Connection>>,
}

impl LocalSearchIndex {
    /// Open (creating if needed) the index database at `path`.
    pub fn open(path: &Path, index_name: &str) -> AppResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AppError::Search(format!("Failed to create index directory: {}", e))
            })?;
        }

        let conn = Connection::open(path)
            .map_err(|e| AppError::Search(format!("Failed to open SQLite index: {}", e)))?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS chunks (
                id TEXT PRIMARY KEY,
                content TEXT NOT NULL,
                document_name TEXT NOT NULL,
                page_number INTEGER NOT NULL,
                chunk_index INTEGER NOT NULL,
                chunk_type TEXT NOT NULL,
                section TEXT NOT NULL,
                embedding BLOB NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_chunks_document ON chunks(document_name);

            CREATE TABLE IF NOT EXISTS meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            "#,
        )
        .map_err(|e| AppError::Search(format!("Failed to create tables: {}", e)))?;

        tracing::debug!("Opened local search index at {:?}", path);

        Ok(Self {
            path: path.to_path_buf(),
            index_name: index_name.to_string(),
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run blocking SQLite work off the async runtime.
    async fn with_conn<T, F>(&self, work: F) -> AppResult<T>
    where
        F: FnOnce(&mut Connection) -> AppResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| AppError::Search("Local index lock poisoned".to_string()))?;
            work(&mut guard)
        })
        .await
        .map_err(|e| AppError::Search(format!("Local index task failed: {}", e)))?
    }

    fn load_documents(conn: &Connection) -> AppResult<Vec<SearchDocument>> {
        let mut stmt = conn
            .prepare(
                "SELECT id, content, document_name, page_number, chunk_index, chunk_type, section, embedding
                 FROM chunks ORDER BY id",
            )
            .map_err(|e| AppError::Search(format!("Failed to prepare query: {}", e)))?;

        let rows = stmt
            .query_map([], |row| {
                let bytes: Vec<u8> = row.get(7)?;
                Ok(SearchDocument {
                    id: row.get(0)?,
                    content: row.get(1)?,
                    document_name: row.get(2)?,
                    page_number: row.get::<_, i64>(3)? as u32,
                    chunk_index: row.get::<_, i64>(4)? as u32,
                    chunk_type: row.get(5)?,
                    section: row.get(6)?,
                    embedding: bytes_to_embedding(&bytes),
                })
            })
            .map_err(|e| AppError::Search(format!("Failed to query chunks: {}", e)))?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| AppError::Search(format!("Failed to read chunk: {}", e)))
    }

    fn stored_dimensions(conn: &Connection) -> AppResult<Option<usize>> {
        let value: Option<String> = conn
            .query_row("SELECT value FROM meta WHERE key = 'dimensions'", [], |row| {
                row.get(0)
            })
            .optional()
            .map_err(|e| AppError::Search(format!("Failed to read index metadata: {}", e)))?;

        Ok(value.and_then(|v| v.parse().ok()))
    }
}

#[async_trait::async_trait]
impl SearchIndex for LocalSearchIndex {
    fn backend_name(&self) -> &str {
        "local"
    }

    fn index_name(&self) -> &str {
        &self.index_name
    }

    async fn ensure_index(&self, dimensions: usize) -> AppResult<()> {
        let index_name = self.index_name.clone();
        self.with_conn(move |conn| match Self::stored_dimensions(conn)? {
            Some(existing) if existing != dimensions => Err(AppError::Search(format!(
                "Index '{}' holds {}-dimensional embeddings but the provider produces {}. Run `finagent index reset` first.",
                index_name, existing, dimensions
            ))),
            Some(_) => Ok(()),
            None => {
                conn.execute(
                    "INSERT OR REPLACE INTO meta (key, value) VALUES ('dimensions', ?1)",
                    params![dimensions.to_string()],
                )
                .map_err(|e| AppError::Search(format!("Failed to write index metadata: {}", e)))?;
                tracing::info!("Created local index '{}' ({} dimensions)", index_name, dimensions);
                Ok(())
            }
        })
        .await
    }

    async fn upload(&self, documents: &[SearchDocument]) -> AppResult<usize> {
        let documents = documents.to_vec();
        self.with_conn(move |conn| {
            let tx = conn
                .transaction()
                .map_err(|e| AppError::Search(format!("Failed to start transaction: {}", e)))?;

            for doc in &documents {
                tx.execute(
                    "INSERT OR REPLACE INTO chunks
                     (id, content, document_name, page_number, chunk_index, chunk_type, section, embedding)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    params![
                        doc.id,
                        doc.content,
                        doc.document_name,
                        doc.page_number as i64,
                        doc.chunk_index as i64,
                        doc.chunk_type,
                        doc.section,
                        embedding_to_bytes(&doc.embedding),
                    ],
                )
                .map_err(|e| AppError::Search(format!("Failed to insert chunk {}: {}", doc.id, e)))?;
            }

            tx.commit()
                .map_err(|e| AppError::Search(format!("Failed to commit upload: {}", e)))?;

            Ok(documents.len())
        })
        .await
    }

    #[tracing::instrument(name = "hybrid_search", skip(self, query), fields(backend = "local", top_k = query.top_k))]
    async fn search(&self, query: &HybridQuery) -> AppResult<Vec<RetrievalResult>> {
        let query = query.clone();
        self.with_conn(move |conn| {
            let documents = Self::load_documents(conn)?;
            let candidates: Vec<&SearchDocument> = documents
                .iter()
                .filter(|doc| query.filter.matches(doc))
                .collect();

            let results = hybrid_rank(&candidates, &query);
            tracing::debug!(
                "Local hybrid search returned {} of {} candidates",
                results.len(),
                candidates.len()
            );
            Ok(results)
        })
        .await
    }

    async fn stats(&self) -> AppResult<IndexStats> {
        let (documents, chunks): (i64, i64) = self
            .with_conn(|conn| {
                conn.query_row(
                    "SELECT COUNT(DISTINCT document_name), COUNT(*) FROM chunks",
                    [],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .map_err(|e| AppError::Search(format!("Failed to count chunks: {}", e)))
            })
            .await?;

        Ok(IndexStats {
            backend: "local".to_string(),
            index_name: self.index_name.clone(),
            documents: documents as u64,
            chunks: chunks as u64,
            storage_bytes: std::fs::metadata(&self.path).map(|m| m.len()).ok(),
        })
    }

    async fn reset(&self) -> AppResult<()> {
        self.with_conn(|conn| {
            conn.execute_batch("DELETE FROM chunks; DELETE FROM meta;")
                .map_err(|e| AppError::Search(format!("Failed to reset index: {}", e)))
        })
        .await?;

        tracing::info!("Reset local index '{}'", self.index_name);
        Ok(())
    }
}

/// Rank candidates by fusing BM25 and cosine rankings.
pub fn hybrid_rank(candidates: &[&SearchDocument], query: &HybridQuery) -> Vec<RetrievalResult> {
    let keyword = bm25_ranking(candidates, &query.text);

    let mut vector: Vec<(usize, f64)> = if query.vector.is_empty() {
        Vec::new()
    } else {
        candidates
            .iter()
            .enumerate()
            .map(|(i, doc)| (i, cosine_similarity(&query.vector, &doc.embedding) as f64))
            .collect()
    };
    sort_ranking(&mut vector, candidates);
    vector.truncate(query.k_nearest);

    let mut fused: HashMap<usize, f64> = HashMap::new();
    for ranking in [&keyword, &vector] {
        for (rank, (i, _)) in ranking.iter().enumerate() {
            *fused.entry(*i).or_insert(0.0) += 1.0 / (RRF_K + (rank + 1) as f64);
        }
    }

    let mut ranked: Vec<(usize, f64)> = fused.into_iter().collect();
    sort_ranking(&mut ranked, candidates);
    ranked.truncate(query.top_k);

    ranked
        .into_iter()
        .map(|(i, score)| {
            let doc = candidates[i];
            RetrievalResult {
                content: doc.content.clone(),
                document_name: doc.document_name.clone(),
                page_number: doc.page_number,
                section: doc.section.clone(),
                score,
                chunk_id: doc.id.clone(),
                chunk_type: doc.chunk_type.clone(),
            }
        })
        .collect()
}

/// Sort by score descending, ties by chunk id.
fn sort_ranking(ranking: &mut [(usize, f64)], candidates: &[&SearchDocument]) {
    ranking.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(Ordering::Equal)
            .then_with(|| candidates[a.0].id.cmp(&candidates[b.0].id))
    });
}

fn tokenize(text: &str) -> Vec<String> {
    text.unicode_words().map(|w| w.to_lowercase()).collect()
}

/// BM25 scores of the candidates that contain at least one query term.
fn bm25_ranking(candidates: &[&SearchDocument], query: &str) -> Vec<(usize, f64)> {
    let terms: HashSet<String> = tokenize(query).into_iter().collect();
    if terms.is_empty() || candidates.is_empty() {
        return Vec::new();
    }

    let docs: Vec<Vec<String>> = candidates.iter().map(|d| tokenize(&d.content)).collect();
    let n = docs.len() as f64;
    let avg_len = docs.iter().map(|d| d.len()).sum::<usize>() as f64 / n;

    let mut doc_freq: HashMap<&str, usize> = HashMap::new();
    for tokens in &docs {
        let unique: HashSet<&str> = tokens.iter().map(String::as_str).collect();
        for term in &terms {
            if unique.contains(term.as_str()) {
                *doc_freq.entry(term.as_str()).or_insert(0) += 1;
            }
        }
    }

    let mut ranking = Vec::new();
    for (i, tokens) in docs.iter().enumerate() {
        let len = tokens.len() as f64;
        let mut score = 0.0;

        for term in &terms {
            let df = match doc_freq.get(term.as_str()) {
                Some(df) => *df as f64,
                None => continue,
            };
            let tf = tokens.iter().filter(|t| *t == term).count() as f64;
            if tf == 0.0 {
                continue;
            }
            let idf = ((n - df + 0.5) / (df + 0.5) + 1.0).ln();
            let norm = if avg_len > 0.0 { len / avg_len } else { 1.0 };
            score += idf * (tf * (BM25_K1 + 1.0)) / (tf + BM25_K1 * (1.0 - BM25_B + BM25_B * norm));
        }

        if score > 0.0 {
            ranking.push((i, score));
        }
    }

    ranking
}

fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(embedding.len() * 4);
    for &value in embedding {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Calculate cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}
