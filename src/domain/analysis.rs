//! Request-scoped pipeline entities: the inbound upload and the assembled
//! analysis result.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use serde::Serialize;

use super::costing::CostEstimate;
use super::drawing::DrawingSpecs;

/// One uploaded file, alive for the duration of a single pipeline run.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub filename: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// The composed output of a successful pipeline run. Immutable after
/// assembly; not persisted beyond the response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub document_id: String,
    pub filename: String,
    pub specs: DrawingSpecs,
    pub analysis_confidence: f64,
    pub costing: CostEstimate,
}

static DOCUMENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Fresh document stem (`<millis>-<seq>`), unique under bursty concurrent
/// uploads. Feeds both the `DOC-<stem>` document id and the
/// `drawing-<stem>.jpg` archive name so the two always correlate.
///
/// A bare millisecond timestamp collides when two requests land in the same
/// millisecond; the atomic sequence suffix removes that window while keeping
/// stems sortable by arrival time.
pub fn next_document_stem() -> String {
    let millis = Utc::now().timestamp_millis();
    let seq = DOCUMENT_SEQ.fetch_add(1, Ordering::Relaxed);
    format!("{millis}-{seq:04}")
}

/// `DOC-<stem>` id assigned to each completed analysis.
pub fn next_document_id() -> String {
    format!("DOC-{}", next_document_stem())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn document_stems_are_unique_under_burst() {
        let stems: HashSet<String> = (0..1000).map(|_| next_document_stem()).collect();
        assert_eq!(stems.len(), 1000);
    }

    #[test]
    fn document_id_format() {
        let id = next_document_id();
        assert!(id.starts_with("DOC-"));
        let parts: Vec<&str> = id.splitn(3, '-').collect();
        assert_eq!(parts.len(), 3);
        assert!(parts[1].parse::<i64>().is_ok());
        assert!(parts[2].parse::<u64>().is_ok());
    }
}
