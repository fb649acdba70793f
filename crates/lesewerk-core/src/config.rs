// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Extraction configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{LesewerkError, Result};
use crate::types::PAGE_BREAK;

/// Default rasterization resolution for PDF pages.
pub const DEFAULT_DPI: u32 = 300;

/// Settings applied uniformly to every file of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Produce word-level records (text, confidence, box) instead of plain text.
    pub get_data: bool,
    /// Print each result to standard output.
    pub print: bool,
    /// Directory receiving one output file per input document.
    pub output_dir: Option<PathBuf>,
    /// Descend into subdirectories when extracting from a directory.
    pub recursive: bool,
    /// Number of files processed concurrently. `1` keeps the run sequential.
    pub workers: usize,
    /// Resolution used when rasterizing PDF pages.
    pub dpi: u32,
    /// Drop words whose confidence is below this value (word mode only).
    pub min_confidence: Option<f32>,
    /// Directory holding the OCR model files. `None` uses the default cache.
    pub model_dir: Option<PathBuf>,
    /// Separator placed between page texts in text mode.
    pub page_break: String,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            get_data: false,
            print: false,
            output_dir: None,
            recursive: false,
            workers: 1,
            dpi: DEFAULT_DPI,
            min_confidence: None,
            model_dir: None,
            page_break: PAGE_BREAK.to_string(),
        }
    }
}

impl ExtractionConfig {
    /// Load configuration from a TOML file. Missing keys take their defaults.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|err| {
            LesewerkError::ConfigError(format!("failed to read {}: {}", path.display(), err))
        })?;
        let config: Self = toml::from_str(&content).map_err(|err| {
            LesewerkError::ConfigError(format!("invalid TOML in {}: {}", path.display(), err))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Results go to standard output when asked to, or when there is
    /// nowhere else for them to go.
    pub fn should_print(&self) -> bool {
        self.print || self.output_dir.is_none()
    }

    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(LesewerkError::ConfigError(
                "workers must be at least 1".to_string(),
            ));
        }
        if self.dpi == 0 {
            return Err(LesewerkError::ConfigError("dpi must be positive".to_string()));
        }
        if let Some(threshold) = self.min_confidence
            && !(0.0..=100.0).contains(&threshold)
        {
            return Err(LesewerkError::ConfigError(format!(
                "min_confidence must be within 0..=100, got {threshold}"
            )));
        }
        Ok(())
    }
}
