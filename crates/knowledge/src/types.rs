//! Core types for document ingestion and retrieval.

use serde::{Deserialize, Serialize};

/// Kind of content a chunk holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkType {
    Text,
    Table,
    SectionHeader,
}

impl ChunkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Table => "table",
            Self::SectionHeader => "section_header",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "table" => Self::Table,
            "section_header" => Self::SectionHeader,
            _ => Self::Text,
        }
    }
}

/// Text of a single document page.
#[derive(Debug, Clone, PartialEq)]
pub struct PageText {
    /// 1-based page number
    pub page_number: u32,
    pub text: String,
}

/// A chunk of a financial document, the unit of indexing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunk {
    /// `{doc}_p{page}_c{index}`
    pub id: String,
    pub content: String,
    pub document_name: String,
    pub page_number: u32,
    /// Index within the page, starting at 0
    pub chunk_index: u32,
    pub chunk_type: ChunkType,
    /// Section heading the chunk falls under
    pub section: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

/// Flat record stored in a search index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchDocument {
    pub id: String,
    pub content: String,
    pub document_name: String,
    pub page_number: u32,
    pub chunk_index: u32,
    pub chunk_type: String,
    pub section: String,
    pub embedding: Vec<f32>,
}

impl SearchDocument {
    /// Build the index record for an embedded chunk.
    pub fn from_chunk(chunk: &DocumentChunk) -> Option<Self> {
        let embedding = chunk.embedding.clone()?;
        Some(Self {
            id: chunk.id.clone(),
            content: chunk.content.clone(),
            document_name: chunk.document_name.clone(),
            page_number: chunk.page_number,
            chunk_index: chunk.chunk_index,
            chunk_type: chunk.chunk_type.as_str().to_string(),
            section: chunk.section.clone(),
            embedding,
        })
    }
}

/// A ranked hit returned by hybrid search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub content: String,
    pub document_name: String,
    pub page_number: u32,
    pub section: String,
    pub score: f64,
    pub chunk_id: String,
    pub chunk_type: String,
}

/// Source reference attached to an answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    /// 1-based position in the result list
    pub id: usize,
    pub document: String,
    pub page: u32,
    pub section: String,
    /// Content preview, at most 200 characters plus "..."
    pub content: String,
    /// Rounded to 3 decimals
    pub score: f64,
}

/// Summary of an ingestion run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestStats {
    pub documents: u32,
    /// Documents that could not be parsed
    pub failed: u32,
    pub pages: u32,
    pub chunks: u32,
    pub indexed: u32,
    pub duration_secs: f64,
}

/// Index statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexStats {
    pub backend: String,
    pub index_name: String,
    pub documents: u64,
    pub chunks: u64,
    /// Bytes on disk (local backend) or storage size reported by the service
    pub storage_bytes: Option<u64>,
}
