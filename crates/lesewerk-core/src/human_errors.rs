// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Human-readable error messages for batch summaries and single-file failures.
//
// Every technical error is mapped to plain English with a clear suggestion.
// The severity drives how the CLI reports the failure and whether the run stops.

use serde::Serialize;

use crate::error::{InputProblem, LesewerkError};

/// Severity of an error from the user's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Only one page or segment is affected; the rest of the file is fine.
    Partial,
    /// This file cannot be processed; other files are unaffected.
    FileSkipped,
    /// The environment is misconfigured; every file would fail the same way.
    Fatal,
}

impl Severity {
    /// Short tag shown next to a failure in the run report.
    pub fn label(self) -> &'static str {
        match self {
            Self::Partial => "partial",
            Self::FileSkipped => "skipped",
            Self::Fatal => "fatal",
        }
    }
}

/// A human-readable error with plain English message and actionable suggestion.
#[derive(Debug, Clone)]
pub struct HumanError {
    /// Plain English summary (one line in the batch summary).
    pub message: String,
    /// What the user should try.
    pub suggestion: String,
    pub severity: Severity,
}

/// Convert a `LesewerkError` into a `HumanError` for the run summary.
pub fn humanize_error(err: &LesewerkError) -> HumanError {
    match err {
        LesewerkError::InputError { problem, detail, .. } => humanize_input(*problem, detail),

        LesewerkError::SegmentBoundsError { page, .. } => HumanError {
            message: format!("A region on page {} lies outside the page.", page + 1),
            suggestion: "Check the segment coordinates against the page size at the rendering DPI.".into(),
            severity: Severity::Partial,
        },

        LesewerkError::RecognitionFailure(_) => HumanError {
            message: "Text recognition didn't work on part of this document.".into(),
            suggestion: "Try a cleaner scan or a higher DPI.".into(),
            severity: Severity::Partial,
        },

        LesewerkError::EngineUnavailable(detail) => HumanError {
            message: "The OCR engine could not be started.".into(),
            suggestion: format!("Check that the OCR model files are installed. ({detail})"),
            severity: Severity::Fatal,
        },

        LesewerkError::ConfigError(detail) => HumanError {
            message: "The configuration is invalid.".into(),
            suggestion: format!("Fix the configuration and run again. ({detail})"),
            severity: Severity::Fatal,
        },

        LesewerkError::PdfError(_) => HumanError {
            message: "There's a problem with this PDF file.".into(),
            suggestion: "The file may be damaged. Try opening it in a PDF viewer first.".into(),
            severity: Severity::FileSkipped,
        },

        LesewerkError::ImageError(_) => HumanError {
            message: "There's a problem with this image.".into(),
            suggestion: "The image may be damaged or in an unusual format. Try saving it as PNG first.".into(),
            severity: Severity::FileSkipped,
        },

        LesewerkError::RasterizeError(detail) => HumanError {
            message: "The PDF pages could not be rendered.".into(),
            suggestion: format!("Make sure poppler-utils (pdftoppm) is installed. ({detail})"),
            severity: Severity::FileSkipped,
        },

        LesewerkError::Io(err) => HumanError {
            message: "A file could not be read or written.".into(),
            suggestion: format!("Check permissions and free disk space. ({err})"),
            severity: Severity::FileSkipped,
        },
    }
}

fn humanize_input(problem: InputProblem, detail: &str) -> HumanError {
    let (message, suggestion) = match problem {
        InputProblem::Unreadable => (
            "This file couldn't be opened.",
            format!("Check that the file exists and is readable. ({detail})"),
        ),
        InputProblem::Unsupported => (
            "This type of file isn't supported.",
            format!("Convert it to PNG, JPEG, TIFF, or PDF first. ({detail})"),
        ),
        InputProblem::Empty => (
            "This file is empty.",
            "The file has no content. Try exporting or scanning it again.".to_string(),
        ),
        InputProblem::Corrupt => (
            "This file appears to be damaged.",
            format!("Try opening it in another program to check it works. ({detail})"),
        ),
    };
    HumanError {
        message: message.into(),
        suggestion,
        severity: Severity::FileSkipped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_failure_is_fatal() {
        let human = humanize_error(&LesewerkError::EngineUnavailable("missing model".into()));
        assert_eq!(human.severity, Severity::Fatal);
        assert!(human.suggestion.contains("missing model"));
    }

    #[test]
    fn empty_input_skips_file() {
        let err = LesewerkError::input("a.png", InputProblem::Empty, "zero-byte file");
        let human = humanize_error(&err);
        assert_eq!(human.severity, Severity::FileSkipped);
        assert_eq!(human.message, "This file is empty.");
    }

    #[test]
    fn segment_bounds_reports_one_based_page() {
        let err = LesewerkError::SegmentBoundsError {
            page: 2,
            segment: 0,
            detail: "negative width".into(),
        };
        let human = humanize_error(&err);
        assert_eq!(human.severity, Severity::Partial);
        assert!(human.message.contains("page 3"));
    }

    #[test]
    fn severity_agrees_with_is_fatal() {
        let errors = [
            LesewerkError::EngineUnavailable("x".into()),
            LesewerkError::ConfigError("x".into()),
            LesewerkError::PdfError("x".into()),
            LesewerkError::RecognitionFailure("x".into()),
        ];
        for err in &errors {
            let fatal = humanize_error(err).severity == Severity::Fatal;
            assert_eq!(fatal, err.is_fatal(), "mismatch for {err}");
        }
    }
}
