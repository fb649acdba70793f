// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// OCR backend built on the `ocrs` crate, a pure-Rust OCR engine backed by
// neural network models executed via `rten`.
//
// # Feature Gate
//
// This module is only available when the `ocr` feature is enabled:
//
// ```toml
// lesewerk-document = { path = "crates/lesewerk-document", features = ["ocr"] }
// ```
//
// # Model Setup
//
// The engine requires two model files:
//
// - **Detection model** (`text-detection.rten`) — locates words in the image.
// - **Recognition model** (`text-recognition.rten`) — decodes characters from
//   detected lines.
//
// They can be obtained by running the `ocrs-cli` tool once:
//   ```sh
//   cargo install ocrs-cli
//   ocrs some-image.png  # downloads models to ~/.cache/ocrs/
//   ```
//
// The default cache directory is `$XDG_CACHE_HOME/ocrs` (typically `~/.cache/ocrs`).

use std::path::{Path, PathBuf};

use image::DynamicImage;
use lesewerk_core::error::LesewerkError;
use lesewerk_core::{BoundingBox, WordEntry};
use ocrs::{ImageSource, OcrEngine as OcrsEngine, OcrEngineParams, OcrInput, TextItem};
use rten::Model;
use tracing::{debug, info, instrument};

use crate::scan::engine::{EngineError, EngineProvider, OcrEngine};

/// `ocrs` does not score words; every recognized word reports this value.
pub const UNSCORED_CONFIDENCE: f32 = 100.0;

/// Well-known filenames for the detection and recognition models.
const DETECTION_MODEL_FILENAME: &str = "text-detection.rten";
const RECOGNITION_MODEL_FILENAME: &str = "text-recognition.rten";

/// Default directory for cached OCR model files.
///
/// Follows the XDG Base Directory specification: `$XDG_CACHE_HOME/ocrs`, falling
/// back to `~/.cache/ocrs` when `XDG_CACHE_HOME` is unset.
fn default_model_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CACHE_HOME") {
        PathBuf::from(xdg).join("ocrs")
    } else if let Ok(home) = std::env::var("HOME") {
        PathBuf::from(home).join(".cache").join("ocrs")
    } else {
        PathBuf::from("ocrs-models")
    }
}

/// Locations of the two model files.
#[derive(Debug, Clone)]
pub struct OcrConfig {
    pub detection_model_path: PathBuf,
    pub recognition_model_path: PathBuf,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self::from_dir(default_model_dir())
    }
}

impl OcrConfig {
    /// Expects the directory to contain `text-detection.rten` and
    /// `text-recognition.rten`.
    pub fn from_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            detection_model_path: dir.join(DETECTION_MODEL_FILENAME),
            recognition_model_path: dir.join(RECOGNITION_MODEL_FILENAME),
        }
    }

    /// Config for `dir` when given, the default cache otherwise.
    pub fn from_optional_dir(dir: Option<&Path>) -> Self {
        dir.map(Self::from_dir).unwrap_or_default()
    }

    /// Verify that both model files exist.
    pub fn validate(&self) -> Result<(), LesewerkError> {
        for (kind, path) in [
            ("detection", &self.detection_model_path),
            ("recognition", &self.recognition_model_path),
        ] {
            if !path.exists() {
                return Err(LesewerkError::EngineUnavailable(format!(
                    "{kind} model not found at {}; run `ocrs-cli` once to download models",
                    path.display()
                )));
            }
        }
        Ok(())
    }
}

/// [`OcrEngine`] implementation wrapping `ocrs`.
///
/// Model loading is the expensive step; keep the engine for a whole run.
pub struct OcrsBackend {
    engine: OcrsEngine,
    /// Input prepared by the last `set_image` call.
    input: Option<OcrInput>,
}

impl OcrsBackend {
    /// Load both models and build the engine.
    ///
    /// # Errors
    ///
    /// Returns [`LesewerkError::EngineUnavailable`] if model files are missing
    /// or corrupt.
    ///
    /// # Performance
    ///
    /// The `ocrs` and `rten` crates must be compiled in release mode. Debug
    /// builds are 10-100x slower.
    #[instrument(skip_all, fields(
        detection = %config.detection_model_path.display(),
        recognition = %config.recognition_model_path.display(),
    ))]
    pub fn new(config: &OcrConfig) -> Result<Self, LesewerkError> {
        config.validate()?;

        info!("Loading OCR models");
        let load = |path: &Path| {
            Model::load_file(path).map_err(|err| {
                LesewerkError::EngineUnavailable(format!(
                    "failed to load model from {}: {}",
                    path.display(),
                    err
                ))
            })
        };
        let detection_model = load(&config.detection_model_path)?;
        let recognition_model = load(&config.recognition_model_path)?;

        let engine = OcrsEngine::new(OcrEngineParams {
            detection_model: Some(detection_model),
            recognition_model: Some(recognition_model),
            ..Default::default()
        })
        .map_err(|err| {
            LesewerkError::EngineUnavailable(format!("failed to initialise OCR engine: {}", err))
        })?;

        info!("OCR engine initialised");
        Ok(Self {
            engine,
            input: None,
        })
    }

    fn current_input(&self) -> Result<&OcrInput, EngineError> {
        self.input
            .as_ref()
            .ok_or_else(|| EngineError::Recognition("no image set".to_string()))
    }
}

impl OcrEngine for OcrsBackend {
    fn name(&self) -> &'static str {
        "ocrs"
    }

    fn set_image(&mut self, image: &DynamicImage) -> Result<(), EngineError> {
        self.input = None;

        // ocrs expects RGB8.
        let rgb = image.to_rgb8();
        let (width, height) = rgb.dimensions();
        let source = ImageSource::from_bytes(rgb.as_raw(), (width, height)).map_err(|err| {
            EngineError::Recognition(format!(
                "failed to create image source ({}x{}): {}",
                width, height, err
            ))
        })?;
        let input = self
            .engine
            .prepare_input(source)
            .map_err(|err| EngineError::Recognition(format!("OCR preprocessing failed: {}", err)))?;
        self.input = Some(input);
        Ok(())
    }

    fn get_text(&mut self) -> Result<String, EngineError> {
        let input = self.current_input()?;
        let text = self
            .engine
            .get_text(input)
            .map_err(|err| EngineError::Recognition(format!("text recognition failed: {}", err)))?;
        debug!(line_count = text.lines().count(), "OCR text recognised");
        Ok(text)
    }

    fn get_word_data(&mut self) -> Result<Vec<WordEntry>, EngineError> {
        let input = self.current_input()?;

        let word_rects = self
            .engine
            .detect_words(input)
            .map_err(|err| EngineError::Recognition(format!("word detection failed: {}", err)))?;
        let line_rects = self.engine.find_text_lines(input, &word_rects);
        let lines = self
            .engine
            .recognize_text(input, &line_rects)
            .map_err(|err| EngineError::Recognition(format!("line recognition failed: {}", err)))?;

        let mut words = Vec::new();
        for line in lines.iter().flatten() {
            for word in line.words() {
                let text = word.to_string();
                if text.trim().is_empty() {
                    continue;
                }
                let rect = word.bounding_rect();
                let bbox = BoundingBox::new(
                    rect.left().max(0) as u32,
                    rect.top().max(0) as u32,
                    rect.width().max(0) as u32,
                    rect.height().max(0) as u32,
                );
                words.push(WordEntry::new(text, UNSCORED_CONFIDENCE, bbox));
            }
        }
        debug!(word_count = words.len(), "OCR words recognised");
        Ok(words)
    }

    fn release(&mut self) {
        self.input = None;
    }
}

/// Builds one [`OcrsBackend`] per acquisition from a fixed model config.
#[derive(Debug, Clone, Default)]
pub struct OcrsProvider {
    config: OcrConfig,
}

impl OcrsProvider {
    pub fn new(config: OcrConfig) -> Self {
        Self { config }
    }
}

impl EngineProvider for OcrsProvider {
    fn acquire(&self) -> Result<Box<dyn OcrEngine>, LesewerkError> {
        Ok(Box::new(OcrsBackend::new(&self.config)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_points_to_cache_dir() {
        let config = OcrConfig::default();
        let path_str = config.detection_model_path.to_string_lossy();
        assert!(
            path_str.ends_with(DETECTION_MODEL_FILENAME),
            "detection model path should end with {DETECTION_MODEL_FILENAME}, got {path_str}"
        );
    }

    #[test]
    fn config_from_optional_dir() {
        let config = OcrConfig::from_optional_dir(Some(Path::new("/tmp/my-models")));
        assert_eq!(
            config.recognition_model_path,
            PathBuf::from("/tmp/my-models/text-recognition.rten")
        );
    }

    #[test]
    fn missing_models_make_the_engine_unavailable() {
        let config = OcrConfig::from_dir("/nonexistent/path/ocr-models");
        let err = OcrsBackend::new(&config).err().expect("construction must fail");
        assert!(err.is_fatal());
    }
}
