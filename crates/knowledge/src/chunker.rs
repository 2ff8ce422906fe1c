//! Structure-aware chunking of financial document pages.
//!
//! Lines are grouped into chunks that respect section boundaries: every
//! detected heading starts a new chunk and becomes the section label of the
//! chunks that follow it.

use crate::parser::sanitize_key;
use crate::types::{ChunkType, DocumentChunk};

/// Section label used until the first heading is seen.
pub const DEFAULT_SECTION: &str = "Introduction";

/// Lines carried from a flushed chunk into the next one.
const OVERLAP_LINES: usize = 3;

/// Keywords that mark a line as a financial statement heading.
const SECTION_KEYWORDS: &[&str] = &[
    "REVENUE",
    "EXPENSES",
    "ASSETS",
    "LIABILITIES",
    "CASH FLOW",
    "INCOME STATEMENT",
    "BALANCE SHEET",
    "EXECUTIVE SUMMARY",
    "MANAGEMENT DISCUSSION",
    "RISK FACTORS",
    "QUARTERLY RESULTS",
];

/// Splits page text into chunks along section headings.
#[derive(Debug, Clone)]
pub struct StructureAwareChunker {
    /// Soft limit on chunk length in characters
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for StructureAwareChunker {
    fn default() -> Self {
        Self::new(1000, 200)
    }
}

struct ChunkBuilder<'a> {
    document_name: &'a str,
    /// `document_name` restricted to key-safe characters
    key: String,
    page_number: u32,
    chunks: Vec<DocumentChunk>,
    lines: Vec<String>,
    size: usize,
    section: String,
}

impl<'a> ChunkBuilder<'a> {
    fn flush(&mut self) {
        if self.lines.is_empty() {
            return;
        }

        let index = self.chunks.len() as u32;
        self.chunks.push(DocumentChunk {
            id: format!("{}_p{}_c{}", self.key, self.page_number, index),
            content: self.lines.join("\n"),
            document_name: self.document_name.to_string(),
            page_number: self.page_number,
            chunk_index: index,
            chunk_type: classify(&self.lines),
            section: self.section.clone(),
            embedding: None,
        });
    }
}

impl StructureAwareChunker {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
        }
    }

    /// Chunk the text of one page.
    ///
    /// Chunk ids are `{key}_p{page_number}_c{index}`, where `key` is the
    /// document name with non-key characters replaced by `_`. The index
    /// restarts at 0 for every page.
    #[tracing::instrument(name = "chunk_document", skip(self, text), fields(page = page_number, document = document_name))]
    pub fn chunk_text(&self, text: &str, page_number: u32, document_name: &str) -> Vec<DocumentChunk> {
        let mut builder = ChunkBuilder {
            document_name,
            key: sanitize_key(document_name),
            page_number,
            chunks: Vec::new(),
            lines: Vec::new(),
            size: 0,
            section: DEFAULT_SECTION.to_string(),
        };

        for raw in text.split('\n') {
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }
            let line_len = line.chars().count();

            if is_section_header(line) {
                builder.flush();
                builder.section = line.to_string();
                builder.lines = vec![format!("Section: {}", line)];
                builder.size = line_len;
                continue;
            }

            if builder.size + line_len > self.chunk_size && !builder.lines.is_empty() {
                builder.flush();

                let overlap = if builder.lines.len() >= OVERLAP_LINES {
                    builder.lines[builder.lines.len() - OVERLAP_LINES..].join(" ")
                } else {
                    String::new()
                };
                builder.size = overlap.chars().count();
                builder.lines = if overlap.is_empty() {
                    Vec::new()
                } else {
                    vec![overlap]
                };
            }

            builder.lines.push(line.to_string());
            builder.size += line_len;
        }

        builder.flush();

        tracing::debug!(
            "Chunked page {} of {} into {} chunks (size: {})",
            page_number,
            document_name,
            builder.chunks.len(),
            self.chunk_size
        );

        builder.chunks
    }
}

/// Heuristic heading detection for financial reports.
pub fn is_section_header(line: &str) -> bool {
    let length = line.chars().count();
    if !(5..=100).contains(&length) {
        return false;
    }

    let prefix: String = line
        .chars()
        .take(3)
        .filter(|c| *c != '.' && *c != ' ')
        .collect();
    if !prefix.is_empty() && prefix.chars().all(|c| c.is_ascii_digit()) {
        return true;
    }

    let has_cased = line.chars().any(|c| c.is_uppercase() || c.is_lowercase());
    let has_lower = line.chars().any(char::is_lowercase);
    if has_cased && !has_lower && line.split_whitespace().count() <= 8 {
        return true;
    }

    let upper = line.to_uppercase();
    SECTION_KEYWORDS.iter().any(|keyword| upper.contains(keyword))
}

fn classify(lines: &[String]) -> ChunkType {
    let body: Vec<&String> = lines
        .iter()
        .filter(|line| !line.starts_with("Section: "))
        .collect();

    if body.is_empty() {
        return ChunkType::SectionHeader;
    }

    let tabular = body.iter().filter(|line| is_tabular_line(line)).count();
    if tabular > 0 && tabular * 2 >= body.len() {
        ChunkType::Table
    } else {
        ChunkType::Text
    }
}

fn is_tabular_line(line: &str) -> bool {
    line.split_whitespace().filter(|token| is_numeric_token(token)).count() >= 3
}

/// Numbers as they appear in statements: `1,234.5`, `(12)`, `$4.2`, `15%`.
fn is_numeric_token(token: &str) -> bool {
    let cleaned: String = token
        .trim_start_matches(['$', '(', '-', '+'])
        .trim_end_matches([')', '%', ',', ';'])
        .chars()
        .filter(|c| *c != ',')
        .collect();

    cleaned.chars().any(|c| c.is_ascii_digit()) && cleaned.parse::<f64>().is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_detection_numbered() {
        assert!(is_section_header("1. Overview"));
        assert!(is_section_header("2.1 Segment results"));
        assert!(!is_section_header("a. overview of things"));
    }

    #[test]
    fn test_header_detection_uppercase() {
        assert!(is_section_header("CONSOLIDATED STATEMENTS"));
        assert!(!is_section_header("ONE TWO THREE FOUR FIVE SIX SEVEN EIGHT NINE"));
        assert!(!is_section_header("1234"));
    }

    #[test]
    fn test_header_detection_keywords() {
        assert!(is_section_header("Total revenue for the quarter"));
        assert!(is_section_header("Cash flow from operations"));
        assert!(!is_section_header("The company hired staff."));
    }

    #[test]
    fn test_header_length_bounds() {
        assert!(!is_section_header("ABC"));
        assert!(!is_section_header(&"A".repeat(101)));
    }

    #[test]
    fn test_chunks_split_on_sections() {
        let text = "Opening remarks from the board.\n\nBALANCE SHEET\nThe company holds cash.\nINCOME STATEMENT\nNet income rose.";
        let chunker = StructureAwareChunker::default();
        let chunks = chunker.chunk_text(text, 3, "q3");

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].id, "q3_p3_c0");
        assert_eq!(chunks[0].section, "Introduction");
        assert_eq!(chunks[0].content, "Opening remarks from the board.");

        assert_eq!(chunks[1].id, "q3_p3_c1");
        assert_eq!(chunks[1].section, "BALANCE SHEET");
        assert_eq!(chunks[1].content, "Section: BALANCE SHEET\nThe company holds cash.");

        assert_eq!(chunks[2].section, "INCOME STATEMENT");
        assert_eq!(chunks[2].chunk_index, 2);
    }

    #[test]
    fn test_only_the_id_is_sanitized() {
        let chunks = StructureAwareChunker::default().chunk_text("Revenue grew 8%.", 2, "Q3 2024 Report");

        assert_eq!(chunks[0].id, "Q3_2024_Report_p2_c0");
        assert_eq!(chunks[0].document_name, "Q3 2024 Report");
    }

    #[test]
    fn test_consecutive_headers_produce_section_header_chunk() {
        let text = "EXECUTIVE SUMMARY\nRISK FACTORS\nMarket conditions may change.";
        let chunks = StructureAwareChunker::default().chunk_text(text, 1, "doc");

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].chunk_type, ChunkType::SectionHeader);
        assert_eq!(chunks[0].section, "EXECUTIVE SUMMARY");
        assert_eq!(chunks[1].chunk_type, ChunkType::Text);
    }

    #[test]
    fn test_size_limit_carries_last_three_lines() {
        let text = "line one is here\nline two is here\nline three here\nline four is here";
        let chunker = StructureAwareChunker::new(50, 0);
        let chunks = chunker.chunk_text(text, 1, "doc");

        assert_eq!(chunks.len(), 2);
        assert_eq!(
            chunks[0].content,
            "line one is here\nline two is here\nline three here"
        );
        assert_eq!(
            chunks[1].content,
            "line one is here line two is here line three here\nline four is here"
        );
    }

    #[test]
    fn test_no_overlap_when_fewer_than_three_lines() {
        let text = "aaaaaaaaaaaaaaaaaaaa\nbbbbbbbbbbbbbbbbbbbb\ncccccccccccccccccccc";
        let chunks = StructureAwareChunker::new(30, 0).chunk_text(text, 1, "doc");

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[1].content, "bbbbbbbbbbbbbbbbbbbb");
        assert_eq!(chunks[2].content, "cccccccccccccccccccc");
    }

    #[test]
    fn test_table_detection() {
        let text = "Segment 2023 2024 Change\nRetail 1,200 1,350 12.5%\nWholesale 800 (40) $760";
        let chunks = StructureAwareChunker::default().chunk_text(text, 1, "doc");

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_type, ChunkType::Table);
    }

    #[test]
    fn test_empty_text_yields_no_chunks() {
        let chunks = StructureAwareChunker::default().chunk_text("\n  \n", 1, "doc");
        assert!(chunks.is_empty());
    }

    #[test]
    fn test_numeric_tokens() {
        assert!(is_numeric_token("1,234.5"));
        assert!(is_numeric_token("(12)"));
        assert!(is_numeric_token("$4.2"));
        assert!(is_numeric_token("15%"));
        assert!(!is_numeric_token("Q3"));
        assert!(!is_numeric_token("$"));
    }
}
