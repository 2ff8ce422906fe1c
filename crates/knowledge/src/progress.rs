//! Progress reporting for ingestion runs.
//!
//! Phases: `discover`, `parse`, `chunk`, `embed`, `index`.

use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

/// Progress event emitted during ingestion.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressEvent {
    pub phase: String,

    /// Units of work done so far (documents, chunks or documents uploaded)
    pub current: u64,

    /// Total expected work, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub percentage: Option<f64>,

    pub message: String,

    /// Seconds since the reporter was created
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_secs: Option<f64>,
}

impl ProgressEvent {
    pub fn new(
        phase: impl Into<String>,
        current: u64,
        total: Option<u64>,
        message: impl Into<String>,
    ) -> Self {
        let percentage = total.map(|t| {
            if t > 0 {
                (current as f64 / t as f64) * 100.0
            } else {
                0.0
            }
        });

        Self {
            phase: phase.into(),
            current,
            total,
            percentage,
            message: message.into(),
            elapsed_secs: None,
        }
    }

    pub fn with_elapsed(mut self, elapsed_secs: f64) -> Self {
        self.elapsed_secs = Some(elapsed_secs);
        self
    }

    /// Format as a single console line, e.g. `[parse] 2/5 (40%) - q3_report.pdf`.
    pub fn format_simple(&self) -> String {
        let progress = match self.total {
            Some(total) => format!("{}/{}", self.current, total),
            None => self.current.to_string(),
        };

        let pct = self
            .percentage
            .map(|p| format!(" ({:.0}%)", p))
            .unwrap_or_default();

        format!("[{}] {}{} - {}", self.phase, progress, pct, self.message)
    }
}

pub type ProgressCallback = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// Emits progress events through an optional callback.
#[derive(Clone)]
pub struct ProgressReporter {
    callback: Option<ProgressCallback>,
    start_time: Instant,
}

impl ProgressReporter {
    pub fn new(callback: ProgressCallback) -> Self {
        Self {
            callback: Some(callback),
            start_time: Instant::now(),
        }
    }

    /// Reporter that only logs.
    pub fn noop() -> Self {
        Self {
            callback: None,
            start_time: Instant::now(),
        }
    }

    pub fn emit(&self, event: ProgressEvent) {
        let event = event.with_elapsed(self.start_time.elapsed().as_secs_f64());

        tracing::debug!(
            phase = %event.phase,
            current = event.current,
            total = ?event.total,
            message = %event.message,
            "Progress event"
        );

        if let Some(callback) = &self.callback {
            callback(event);
        }
    }

    pub fn discover(&self, found: u64, directory: &str) {
        self.emit(ProgressEvent::new(
            "discover",
            found,
            None,
            format!("found {} documents in {}", found, directory),
        ));
    }

    pub fn parse(&self, current: u64, total: u64, document: &str) {
        self.emit(ProgressEvent::new(
            "parse",
            current,
            Some(total),
            document.to_string(),
        ));
    }

    pub fn chunk(&self, current: u64, total: u64, document: &str, pages: u32, chunks: usize) {
        self.emit(ProgressEvent::new(
            "chunk",
            current,
            Some(total),
            format!("{}: {} pages, {} chunks", document, pages, chunks),
        ));
    }

    pub fn embed(&self, current: u64, total: u64, model: &str) {
        self.emit(ProgressEvent::new(
            "embed",
            current,
            Some(total),
            format!("model={}", model),
        ));
    }

    pub fn index(&self, current: u64, total: u64, backend: &str) {
        self.emit(ProgressEvent::new(
            "index",
            current,
            Some(total),
            format!("uploading to {} index", backend),
        ));
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::noop()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_progress_event_format() {
        let event = ProgressEvent::new("parse", 2, Some(5), "q3_report.pdf");
        assert_eq!(event.format_simple(), "[parse] 2/5 (40%) - q3_report.pdf");
    }

    #[test]
    fn test_progress_reporter_emit() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();

        let reporter = ProgressReporter::new(Arc::new(move |event| {
            sink.lock().unwrap().push(event);
        }));

        reporter.discover(3, "data/sample_pdfs");
        reporter.index(100, 250, "local");

        let captured = events.lock().unwrap();
        assert_eq!(captured.len(), 2);
        assert_eq!(captured[0].phase, "discover");
        assert_eq!(captured[0].total, None);
        assert_eq!(captured[1].message, "uploading to local index");
        assert!(captured[1].elapsed_secs.is_some());
    }

    #[test]
    fn test_noop_reporter() {
        ProgressReporter::noop().embed(1, 2, "hash-trigram-v1");
    }
}
