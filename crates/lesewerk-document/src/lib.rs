// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// lesewerk-document — Image cleanup, region segmentation, PDF rasterization,
// and the OCR extraction pipeline.
//
// The pipeline loads an image or PDF, splits each page into regions, cleans
// every region with a pluggable preprocessor, runs an OCR engine over it, and
// merges the results per document and per batch.

pub mod extract;
pub mod image;
pub mod pdf;
pub mod scan;
pub mod segment;

// Re-export the primary types so callers can use `lesewerk_document::TextExtractor` etc.
pub use extract::{BatchResult, CancelFlag, DocumentResult, RecognitionResult, TextExtractor};
pub use crate::image::processor::ImageProcessor;
pub use pdf::{PageRasterizer, PdfReader, PdftoppmRasterizer};
pub use scan::enhance::ScanEnhancer;
pub use scan::{DefaultCleaner, EngineProvider, EngineSession, OcrEngine, Preprocessor};
pub use segment::{FixedRegions, HorizontalBands, SegmentRegion, Segmenter, WholePage};

#[cfg(feature = "ocr")]
pub use scan::ocr::{OcrConfig, OcrsProvider};
