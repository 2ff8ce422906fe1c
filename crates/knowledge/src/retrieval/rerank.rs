//! Result reranking.

use crate::types::RetrievalResult;
use std::cmp::Ordering;
use std::collections::HashSet;
use unicode_segmentation::UnicodeSegmentation;

/// Reorders retrieved results for a query.
pub trait Reranker: Send + Sync {
    fn name(&self) -> &str;

    fn rerank(&self, query: &str, results: Vec<RetrievalResult>) -> Vec<RetrievalResult>;
}

/// Keeps the search order.
#[derive(Debug, Default)]
pub struct NoOpReranker;

impl Reranker for NoOpReranker {
    fn name(&self) -> &str {
        "none"
    }

    fn rerank(&self, _query: &str, results: Vec<RetrievalResult>) -> Vec<RetrievalResult> {
        results
    }
}

/// Re-scores by query term coverage blended with the original rank.
///
/// `score = 0.5 * coverage + 0.5 * 1 / (1 + rank)` where `coverage` is the
/// fraction of distinct query terms found in the content and `rank` is the
/// 0-based position in the incoming list.
#[derive(Debug, Default)]
pub struct LexicalReranker;

fn terms(text: &str) -> HashSet<String> {
    text.unicode_words().map(|w| w.to_lowercase()).collect()
}

impl Reranker for LexicalReranker {
    fn name(&self) -> &str {
        "lexical"
    }

    fn rerank(&self, query: &str, results: Vec<RetrievalResult>) -> Vec<RetrievalResult> {
        let query_terms = terms(query);
        if query_terms.is_empty() {
            return results;
        }

        let mut rescored: Vec<RetrievalResult> = results
            .into_iter()
            .enumerate()
            .map(|(rank, mut result)| {
                let content_terms = terms(&result.content);
                let covered = query_terms
                    .iter()
                    .filter(|t| content_terms.contains(*t))
                    .count();
                let coverage = covered as f64 / query_terms.len() as f64;
                result.score = 0.5 * coverage + 0.5 * (1.0 / (1.0 + rank as f64));
                result
            })
            .collect();

        // sort_by is stable
        rescored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        rescored
    }
}
