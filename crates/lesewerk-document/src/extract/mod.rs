// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Extraction — input loading, the orchestrator, results, output files, and
// word-table tools.

pub mod document;
pub mod orchestrator;
pub mod output;
pub mod result;
pub mod tables;

pub use orchestrator::{CancelFlag, TextExtractor};
pub use output::{WORD_TABLE_HEADER, WordTableError, parse_word_table, render_word_table};
pub use result::{
    BatchEntry, BatchResult, BatchSummary, DocumentResult, FileFailure, FileOutcome, PageOutcome,
    PageResult, RecognitionResult, SegmentResult, WordRecord,
};
pub use tables::{filter_low_confidence, words_to_lines};
