// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Extraction results — per segment, per page, per document, and per batch.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use lesewerk_core::error::LesewerkError;
use lesewerk_core::human_errors::{Severity, humanize_error};
use lesewerk_core::{BoundingBox, DocumentKind, DocumentStage, WordEntry};
use serde::Serialize;

use crate::scan::engine::RecognitionMode;

/// Prefix rendered in text output in place of a segment whose recognition failed.
pub const FAILED_OCR_MARKER: &str = "FAILED OCR";

/// Engine output for one segment.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecognitionResult {
    Text { text: String },
    /// Word records in segment coordinates.
    Words { words: Vec<WordEntry> },
    /// The engine failed on this segment; recorded, never retried.
    Failed { reason: String },
}

impl RecognitionResult {
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// Text rendering of this result. Word results are joined by spaces.
    pub fn text(&self) -> String {
        match self {
            Self::Text { text } => text.clone(),
            Self::Words { words } => words
                .iter()
                .map(|w| w.text.as_str())
                .collect::<Vec<_>>()
                .join(" "),
            Self::Failed { reason } => format!("{FAILED_OCR_MARKER}: {reason}"),
        }
    }
}

/// Result for one segment of a page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentResult {
    pub index: usize,
    /// Segment location in page coordinates.
    pub bbox: BoundingBox,
    pub result: RecognitionResult,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PageOutcome {
    Recognized { segments: Vec<SegmentResult> },
    /// The page could not be segmented; it contributes no text.
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageResult {
    /// Zero-based page number.
    pub index: usize,
    pub width: u32,
    pub height: u32,
    pub outcome: PageOutcome,
}

impl PageResult {
    pub fn segments(&self) -> &[SegmentResult] {
        match &self.outcome {
            PageOutcome::Recognized { segments } => segments,
            PageOutcome::Failed { .. } => &[],
        }
    }

    /// Segment texts in segment order, each starting on a new line.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for segment in self.segments() {
            if !out.is_empty() && !out.ends_with('\n') {
                out.push('\n');
            }
            out.push_str(&segment.result.text());
        }
        out
    }
}

/// One word with its position on the page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WordRecord {
    pub page: usize,
    pub segment: usize,
    /// Text, confidence, and box in page coordinates.
    pub word: WordEntry,
}

/// Ordered results for one input document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentResult {
    pub path: PathBuf,
    pub kind: DocumentKind,
    pub mode: RecognitionMode,
    pub pages: Vec<PageResult>,
    /// File written for this document, if any.
    pub output: Option<PathBuf>,
}

impl DocumentResult {
    /// Page texts joined by `page_break`.
    pub fn text(&self, page_break: &str) -> String {
        self.pages
            .iter()
            .map(PageResult::text)
            .collect::<Vec<_>>()
            .join(page_break)
    }

    /// Every recognised word in page, segment, then engine order.
    ///
    /// Word boxes are translated to page coordinates and clipped to their
    /// segment.
    pub fn word_records(&self) -> Vec<WordRecord> {
        let mut records = Vec::new();
        for page in &self.pages {
            for segment in page.segments() {
                let RecognitionResult::Words { words } = &segment.result else {
                    continue;
                };
                for word in words {
                    let bbox = word
                        .bbox
                        .offset(segment.bbox.left, segment.bbox.top)
                        .clamp_to(&segment.bbox);
                    records.push(WordRecord {
                        page: page.index,
                        segment: segment.index,
                        word: WordEntry {
                            bbox,
                            ..word.clone()
                        },
                    });
                }
            }
        }
        records
    }

    pub fn segment_count(&self) -> usize {
        self.pages.iter().map(|p| p.segments().len()).sum()
    }

    pub fn failed_segments(&self) -> usize {
        self.pages
            .iter()
            .flat_map(PageResult::segments)
            .filter(|s| s.result.is_failed())
            .count()
    }

    pub fn failed_pages(&self) -> usize {
        self.pages
            .iter()
            .filter(|p| matches!(p.outcome, PageOutcome::Failed { .. }))
            .count()
    }
}

/// Why a file produced no result, and how far it got.
#[derive(Debug)]
pub struct FileFailure {
    /// Last stage reached before the failure.
    pub stage: DocumentStage,
    pub error: LesewerkError,
}

#[derive(Debug)]
pub enum FileOutcome {
    Extracted(DocumentResult),
    Failed(FileFailure),
}

#[derive(Debug)]
pub struct BatchEntry {
    pub path: PathBuf,
    pub outcome: FileOutcome,
}

impl BatchEntry {
    pub fn document(&self) -> Option<&DocumentResult> {
        match &self.outcome {
            FileOutcome::Extracted(doc) => Some(doc),
            FileOutcome::Failed(_) => None,
        }
    }

    pub fn error(&self) -> Option<&LesewerkError> {
        match &self.outcome {
            FileOutcome::Extracted(_) => None,
            FileOutcome::Failed(failure) => Some(&failure.error),
        }
    }
}

/// Outcome of one run over a file list or directory, in input order.
#[derive(Debug)]
pub struct BatchResult {
    pub root: PathBuf,
    pub entries: Vec<BatchEntry>,
    /// The run was stopped before every input was visited.
    pub cancelled: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl BatchResult {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, path: &Path) -> Option<&BatchEntry> {
        self.entries.iter().find(|e| e.path == path)
    }

    pub fn succeeded(&self) -> impl Iterator<Item = &DocumentResult> {
        self.entries.iter().filter_map(BatchEntry::document)
    }

    pub fn failed(&self) -> impl Iterator<Item = (&Path, &LesewerkError)> {
        self.entries
            .iter()
            .filter_map(|e| e.error().map(|err| (e.path.as_path(), err)))
    }

    pub fn summary(&self) -> BatchSummary {
        let failures: Vec<FailureSummary> = self
            .entries
            .iter()
            .filter_map(|entry| match &entry.outcome {
                FileOutcome::Failed(failure) => {
                    let human = humanize_error(&failure.error);
                    Some(FailureSummary {
                        path: entry.path.clone(),
                        stage: failure.stage,
                        severity: human.severity,
                        message: human.message,
                        suggestion: human.suggestion,
                        detail: failure.error.to_string(),
                    })
                }
                FileOutcome::Extracted(_) => None,
            })
            .collect();
        BatchSummary {
            total: self.entries.len(),
            succeeded: self.entries.len() - failures.len(),
            failed: failures.len(),
            cancelled: self.cancelled,
            elapsed_ms: (self.finished_at - self.started_at).num_milliseconds(),
            failures,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FailureSummary {
    pub path: PathBuf,
    pub stage: DocumentStage,
    pub severity: Severity,
    pub message: String,
    pub suggestion: String,
    pub detail: String,
}

/// Serializable counts and reasons for a finished batch.
#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub cancelled: bool,
    pub elapsed_ms: i64,
    pub failures: Vec<FailureSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use lesewerk_core::error::InputProblem;

    fn text_page(index: usize, texts: &[&str]) -> PageResult {
        PageResult {
            index,
            width: 100,
            height: 100,
            outcome: PageOutcome::Recognized {
                segments: texts
                    .iter()
                    .enumerate()
                    .map(|(i, t)| SegmentResult {
                        index: i,
                        bbox: BoundingBox::full(100, 100),
                        result: RecognitionResult::Text {
                            text: t.to_string(),
                        },
                    })
                    .collect(),
            },
        }
    }

    fn document(pages: Vec<PageResult>, mode: RecognitionMode) -> DocumentResult {
        DocumentResult {
            path: PathBuf::from("doc.pdf"),
            kind: DocumentKind::Pdf,
            mode,
            pages,
            output: None,
        }
    }

    #[test]
    fn pages_join_with_break_and_segments_with_newline() {
        let doc = document(
            vec![
                text_page(0, &["a", "b\n"]),
                PageResult {
                    index: 1,
                    width: 10,
                    height: 10,
                    outcome: PageOutcome::Failed {
                        reason: "bad region".into(),
                    },
                },
                text_page(2, &["c"]),
            ],
            RecognitionMode::Text,
        );
        assert_eq!(doc.text("\x0c"), "a\nb\n\x0c\x0cc");
        assert_eq!(doc.failed_pages(), 1);
        assert_eq!(doc.segment_count(), 3);
    }

    #[test]
    fn failed_segment_renders_marker() {
        let failed = RecognitionResult::Failed {
            reason: "blurry".into(),
        };
        assert_eq!(failed.text(), "FAILED OCR: blurry");
        assert!(failed.is_failed());
    }

    #[test]
    fn word_records_move_to_page_coordinates() {
        let segment_box = BoundingBox::new(50, 20, 40, 10);
        let page = PageResult {
            index: 0,
            width: 200,
            height: 100,
            outcome: PageOutcome::Recognized {
                segments: vec![SegmentResult {
                    index: 0,
                    bbox: segment_box,
                    result: RecognitionResult::Words {
                        words: vec![
                            WordEntry::new("in", 91.0, BoundingBox::new(2, 1, 10, 5)),
                            WordEntry::new("over", 80.0, BoundingBox::new(35, 5, 20, 9)),
                        ],
                    },
                }],
            },
        };
        let records = document(vec![page], RecognitionMode::Words).word_records();
        assert_eq!(records[0].word.bbox, BoundingBox::new(52, 21, 10, 5));
        for record in &records {
            assert!(segment_box.contains(&record.word.bbox));
        }
    }

    #[test]
    fn summary_counts_failures() {
        let now = Utc::now();
        let batch = BatchResult {
            root: PathBuf::from("in"),
            entries: vec![
                BatchEntry {
                    path: PathBuf::from("in/a.png"),
                    outcome: FileOutcome::Extracted(document(vec![], RecognitionMode::Text)),
                },
                BatchEntry {
                    path: PathBuf::from("in/b.png"),
                    outcome: FileOutcome::Failed(FileFailure {
                        stage: DocumentStage::Unprocessed,
                        error: LesewerkError::input("in/b.png", InputProblem::Empty, "zero bytes"),
                    }),
                },
            ],
            cancelled: false,
            started_at: now,
            finished_at: now,
        };
        let summary = batch.summary();
        assert_eq!((summary.total, summary.succeeded, summary.failed), (2, 1, 1));
        assert_eq!(summary.failures[0].path, PathBuf::from("in/b.png"));
        assert_eq!(summary.failures[0].severity, Severity::FileSkipped);
        assert_eq!(batch.failed().count(), 1);
        assert!(batch.get(Path::new("in/a.png")).unwrap().document().is_some());
        let json = serde_json::to_string(&summary).unwrap();
        assert!(json.contains("\"failed\":1"));
        assert!(json.contains("\"severity\":\"file_skipped\""));
    }
}
