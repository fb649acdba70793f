// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Lesewerk.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

/// Why an input file was rejected before any recognition happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InputProblem {
    /// The file could not be opened or read.
    Unreadable,
    /// The extension (or sniffed content) is not an image or PDF.
    Unsupported,
    /// The file has zero bytes.
    Empty,
    /// The bytes look like a supported format but fail to decode.
    Corrupt,
}

impl fmt::Display for InputProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unreadable => "unreadable",
            Self::Unsupported => "unsupported",
            Self::Empty => "empty",
            Self::Corrupt => "corrupt",
        })
    }
}

/// Top-level error type for all Lesewerk operations.
#[derive(Debug, Error)]
pub enum LesewerkError {
    // -- Input errors (local to one file) --
    #[error("{problem} input {}: {detail}", path.display())]
    InputError {
        path: PathBuf,
        problem: InputProblem,
        detail: String,
    },

    // -- Page / segment errors --
    #[error("segment {segment} on page {page} is out of bounds: {detail}")]
    SegmentBoundsError {
        page: usize,
        segment: usize,
        detail: String,
    },

    #[error("recognition failed: {0}")]
    RecognitionFailure(String),

    // -- Environment errors (fatal to the run) --
    #[error("OCR engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("invalid configuration: {0}")]
    ConfigError(String),

    // -- Document errors --
    #[error("PDF operation failed: {0}")]
    PdfError(String),

    #[error("image processing failed: {0}")]
    ImageError(String),

    #[error("page rasterization failed: {0}")]
    RasterizeError(String),

    // -- Storage / persistence --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl LesewerkError {
    /// Shorthand for building an [`LesewerkError::InputError`].
    pub fn input(path: impl AsRef<Path>, problem: InputProblem, detail: impl Into<String>) -> Self {
        Self::InputError {
            path: path.as_ref().to_path_buf(),
            problem,
            detail: detail.into(),
        }
    }

    /// Errors that indicate a misconfigured environment rather than a bad
    /// input. These abort a whole run instead of being recorded per file.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::EngineUnavailable(_) | Self::ConfigError(_))
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, LesewerkError>;
