//! Per-page and per-document processing results.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, FailureCategory};

use super::block::Block;

/// Terminal status of a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageStatus {
    /// Translated text written into the page
    Written,
    /// Left with its original content
    Failed,
    /// Nothing to translate (no embedded text layer)
    Skipped,
    /// Not started because processing was cancelled
    Cancelled,
}

/// Result of processing one page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageResult {
    /// Page number (1-indexed)
    pub page: u32,
    pub status: PageStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<FailureCategory>,
    /// Blocks processed on the page
    #[serde(default)]
    pub blocks: Vec<Block>,
}

impl PageResult {
    pub fn written(page: u32, blocks: Vec<Block>) -> Self {
        Self {
            page,
            status: PageStatus::Written,
            reason: None,
            category: None,
            blocks,
        }
    }

    pub fn skipped(page: u32, reason: impl Into<String>) -> Self {
        Self {
            page,
            status: PageStatus::Skipped,
            reason: Some(reason.into()),
            category: None,
            blocks: Vec::new(),
        }
    }

    pub fn cancelled(page: u32) -> Self {
        Self {
            page,
            status: PageStatus::Cancelled,
            reason: Some(Error::Cancelled.to_string()),
            category: Some(FailureCategory::Cancelled),
            blocks: Vec::new(),
        }
    }

    /// Record a failed page from the error that stopped it.
    pub fn failed(page: u32, error: &Error, blocks: Vec<Block>) -> Self {
        Self {
            page,
            status: PageStatus::Failed,
            reason: Some(error.to_string()),
            category: Some(error.category()),
            blocks,
        }
    }

    pub fn is_failed(&self) -> bool {
        self.status == PageStatus::Failed
    }
}

/// Counters collected while processing a document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessingStats {
    /// Pages selected for processing
    pub page_count: u32,
    /// Blocks built across all pages
    pub block_count: u32,
    /// Blocks rendered with a translation
    pub translated_count: u32,
    /// Blocks whose text still overflowed at the minimum font size
    pub overflow_count: u32,
    /// Pages where the layout model returned nothing
    pub fallback_pages: u32,
}

/// Result of processing a document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,
    pub per_page: Vec<PageResult>,
    pub failed_pages: Vec<u32>,
    pub stats: ProcessingStats,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl DocumentResult {
    /// Assemble a result from page results, sorted by page number.
    pub fn new(mut per_page: Vec<PageResult>, stats: ProcessingStats, started_at: DateTime<Utc>) -> Self {
        per_page.sort_by_key(|p| p.page);
        let failed_pages = per_page
            .iter()
            .filter(|p| p.is_failed())
            .map(|p| p.page)
            .collect();
        Self {
            output_path: None,
            per_page,
            failed_pages,
            stats,
            started_at,
            finished_at: Utc::now(),
        }
    }

    /// Whether every selected page was written or skipped.
    pub fn is_complete(&self) -> bool {
        self.per_page
            .iter()
            .all(|p| matches!(p.status, PageStatus::Written | PageStatus::Skipped))
    }

    pub fn page(&self, page: u32) -> Option<&PageResult> {
        self.per_page.iter().find(|p| p.page == page)
    }

    pub fn count(&self, status: PageStatus) -> usize {
        self.per_page.iter().filter(|p| p.status == status).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_pages_are_collected() {
        let pages = vec![
            PageResult::written(2, Vec::new()),
            PageResult::failed(3, &Error::ContentStreamCorrupt("bad".into()), Vec::new()),
            PageResult::skipped(1, "no text layer"),
        ];
        let result = DocumentResult::new(pages, ProcessingStats::default(), Utc::now());
        assert_eq!(result.failed_pages, vec![3]);
        assert_eq!(result.per_page[0].page, 1);
        assert!(!result.is_complete());
        assert_eq!(
            result.page(3).and_then(|p| p.category),
            Some(FailureCategory::ContentStream)
        );
    }

    #[test]
    fn test_result_serializes_status_names() {
        let result = DocumentResult::new(
            vec![PageResult::cancelled(1)],
            ProcessingStats::default(),
            Utc::now(),
        );
        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains("\"status\":\"cancelled\""));
        assert!(json.contains("\"failed_pages\":[]"));
    }
}
