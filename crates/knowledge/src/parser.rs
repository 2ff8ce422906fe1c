//! Source document parsing and page text extraction.

use crate::types::PageText;
use finagent_core::{AppError, AppResult};
use std::fs;
use std::path::Path;

/// Document format classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Markdown,
    PlainText,
    Unsupported,
}

impl DocumentKind {
    /// Detect the document format from the file extension.
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .as_deref()
        {
            Some("pdf") => Self::Pdf,
            Some("md") | Some("markdown") => Self::Markdown,
            Some("txt") => Self::PlainText,
            _ => Self::Unsupported,
        }
    }

    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Markdown => "markdown",
            Self::PlainText => "text",
            Self::Unsupported => "unsupported",
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Unsupported)
    }
}

/// Parse a document into per-page text.
///
/// PDFs yield one entry per non-empty page; text and markdown files are a
/// single page 1.
pub fn parse_document(path: &Path) -> AppResult<Vec<PageText>> {
    match DocumentKind::from_path(path) {
        DocumentKind::Pdf => parse_pdf(path),
        DocumentKind::Markdown => Ok(single_page(clean_markdown(&read_text(path)?))),
        DocumentKind::PlainText => Ok(single_page(read_text(path)?)),
        DocumentKind::Unsupported => Err(AppError::Knowledge(format!(
            "Unsupported document type: {:?}",
            path
        ))),
    }
}

/// Extract the text of every page of a PDF.
pub fn parse_pdf(path: &Path) -> AppResult<Vec<PageText>> {
    let document = lopdf::Document::load(path)
        .map_err(|e| AppError::Knowledge(format!("Failed to open PDF {:?}: {}", path, e)))?;

    let mut pages = Vec::new();
    for page_number in document.get_pages().keys().copied() {
        let text = match document.extract_text(&[page_number]) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("Failed to extract text from {:?} page {}: {}", path, page_number, e);
                continue;
            }
        };

        if text.trim().is_empty() {
            tracing::debug!("Skipping empty page {} of {:?}", page_number, path);
            continue;
        }

        pages.push(PageText { page_number, text });
    }

    tracing::debug!("Extracted {} pages from {:?}", pages.len(), path);
    Ok(pages)
}

/// Document name used in chunk ids and citations: the file stem.
pub fn document_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "document".to_string())
}

/// Restrict a string to characters allowed in search document keys
/// (letters, digits, `_`, `-`, `=`); anything else becomes `_`.
pub fn sanitize_key(value: &str) -> String {
    value
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '=') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn read_text(path: &Path) -> AppResult<String> {
    fs::read_to_string(path)
        .map_err(|e| AppError::Knowledge(format!("Failed to read {:?}: {}", path, e)))
}

fn single_page(text: String) -> Vec<PageText> {
    if text.trim().is_empty() {
        return Vec::new();
    }
    vec![PageText {
        page_number: 1,
        text,
    }]
}

/// Strip markdown markup while keeping one line per source line.
fn clean_markdown(text: &str) -> String {
    let mut result = String::with_capacity(text.len());

    for line in text.lines() {
        let trimmed = line.trim_start_matches('#').trim();

        if trimmed.starts_with("---") || trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            continue;
        }

        let cleaned: String = trimmed
            .trim_start_matches(['*', '-', '>'])
            .replace("**", "")
            .replace('|', " ")
            .trim()
            .to_string();

        if !cleaned.is_empty() {
            result.push_str(&cleaned);
            result.push('\n');
        }
    }

    result.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, Stream};
    use tempfile::TempDir;

    /// Write a PDF with one line of Helvetica text per entry; empty entries
    /// become blank pages.
    fn write_pdf(path: &Path, pages: &[&str]) {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids: Vec<Object> = Vec::new();
        for text in pages {
            let mut operations = vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
            ];
            if !text.is_empty() {
                operations.push(Operation::new("Tj", vec![Object::string_literal(*text)]));
            }
            operations.push(Operation::new("ET", vec![]));

            let content = Content { operations };
            let content_id =
                doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc.save(path).unwrap();
    }

    #[test]
    fn test_parse_pdf_pages() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("q3.pdf");
        write_pdf(
            &path,
            &["INCOME STATEMENT Revenue was 5.2 million", "BALANCE SHEET Cash was 800 thousand"],
        );

        let pages = parse_document(&path).unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].page_number, 1);
        assert!(pages[0].text.contains("Revenue was 5.2 million"));
        assert!(!pages[0].text.contains("Cash"));
        assert_eq!(pages[1].page_number, 2);
        assert!(pages[1].text.contains("BALANCE SHEET Cash was 800 thousand"));
    }

    #[test]
    fn test_parse_pdf_skips_blank_pages_but_keeps_numbering() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("annual.pdf");
        write_pdf(&path, &["Cover page", "", "RISK FACTORS Currency exposure"]);

        let pages = parse_pdf(&path).unwrap();
        let numbers: Vec<u32> = pages.iter().map(|p| p.page_number).collect();
        assert_eq!(numbers, vec![1, 3]);
        assert!(pages[1].text.contains("Currency exposure"));
    }

    #[test]
    fn test_document_kind_detection() {
        assert_eq!(DocumentKind::from_path(Path::new("q3.PDF")), DocumentKind::Pdf);
        assert_eq!(DocumentKind::from_path(Path::new("notes.md")), DocumentKind::Markdown);
        assert_eq!(DocumentKind::from_path(Path::new("a.txt")), DocumentKind::PlainText);
        assert!(!DocumentKind::from_path(Path::new("chart.png")).is_supported());
    }

    #[test]
    fn test_sanitize_key() {
        assert_eq!(sanitize_key("Q3 2024 Report"), "Q3_2024_Report");
        assert_eq!(sanitize_key("10-K=final"), "10-K=final");
        assert_eq!(sanitize_key("café.v2"), "caf__v2");
    }

    #[test]
    fn test_document_name_is_stem() {
        assert_eq!(document_name(Path::new("/data/q3_report.pdf")), "q3_report");
    }

    #[test]
    fn test_parse_text_document_is_single_page() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("summary.txt");
        fs::write(&path, "EXECUTIVE SUMMARY\nRevenue grew 12%.\n").unwrap();

        let pages = parse_document(&path).unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].page_number, 1);
        assert!(pages[0].text.contains("Revenue grew"));
    }

    #[test]
    fn test_parse_markdown_strips_markup() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes.md");
        fs::write(&path, "# BALANCE SHEET\n\n```\ncode\n```\n- **Total assets** | 500\n").unwrap();

        let pages = parse_document(&path).unwrap();
        assert_eq!(pages[0].text, "BALANCE SHEET\ncode\nTotal assets   500");
    }

    #[test]
    fn test_empty_text_document_has_no_pages() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.txt");
        fs::write(&path, "   \n").unwrap();
        assert!(parse_document(&path).unwrap().is_empty());
    }

    #[test]
    fn test_unsupported_document() {
        assert!(parse_document(Path::new("image.png")).is_err());
    }

    #[test]
    fn test_invalid_pdf_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.pdf");
        fs::write(&path, b"not a pdf").unwrap();
        assert!(parse_pdf(&path).is_err());
    }
}
