// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scanning pipeline — binarization, deskew, denoise, the preprocessing
// contract, the OCR engine seam, and the optional `ocrs` backend.

pub mod clean;
pub mod engine;
pub mod enhance;
pub mod preprocess;

#[cfg(feature = "ocr")]
pub mod ocr;

pub use engine::{
    EngineError, EngineOutput, EngineProvider, EngineSession, OcrEngine, RecognitionMode,
};
pub use enhance::ScanEnhancer;
pub use preprocess::{DefaultCleaner, Identity, Preprocessor, Threshold};

#[cfg(feature = "ocr")]
pub use ocr::{OcrConfig, OcrsBackend, OcrsProvider};
