// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// OCR engine seam — the narrow interface the extraction pipeline drives, plus
// the scoped session that guarantees an engine is released on every exit path.

use image::DynamicImage;
use lesewerk_core::WordEntry;
use lesewerk_core::error::LesewerkError;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

/// Failure reported by an engine call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EngineError {
    /// The current image produced no usable result. Local to one segment.
    #[error("recognition failed: {0}")]
    Recognition(String),
    /// The engine cannot work at all; every later call would fail too.
    #[error("engine unavailable: {0}")]
    Unavailable(String),
}

impl From<EngineError> for LesewerkError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Recognition(detail) => LesewerkError::RecognitionFailure(detail),
            EngineError::Unavailable(detail) => LesewerkError::EngineUnavailable(detail),
        }
    }
}

/// A stateful OCR engine.
///
/// Callers must call [`set_image`](Self::set_image) before each recognition
/// call. Results for one image are not valid after the next `set_image`.
/// Instances are not shared between threads; concurrent workers each hold
/// their own.
pub trait OcrEngine {
    /// Short identifier used in logs (e.g. `"ocrs"`).
    fn name(&self) -> &'static str;

    fn set_image(&mut self, image: &DynamicImage) -> Result<(), EngineError>;

    /// Plain text of the current image, lines separated by `\n`.
    fn get_text(&mut self) -> Result<String, EngineError>;

    /// Word-level records for the current image, in image coordinates.
    fn get_word_data(&mut self) -> Result<Vec<WordEntry>, EngineError>;

    /// Free engine resources. Called exactly once, by [`EngineSession`].
    fn release(&mut self) {}
}

/// Creates engine instances; one per run, or one per worker in parallel mode.
pub trait EngineProvider: Send + Sync {
    fn acquire(&self) -> Result<Box<dyn OcrEngine>, LesewerkError>;
}

impl<F> EngineProvider for F
where
    F: Fn() -> Result<Box<dyn OcrEngine>, LesewerkError> + Send + Sync,
{
    fn acquire(&self) -> Result<Box<dyn OcrEngine>, LesewerkError> {
        self()
    }
}

/// What the pipeline asks the engine for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecognitionMode {
    Text,
    Words,
}

impl RecognitionMode {
    pub fn from_get_data(get_data: bool) -> Self {
        if get_data { Self::Words } else { Self::Text }
    }
}

/// Raw engine output for one image.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineOutput {
    Text(String),
    Words(Vec<WordEntry>),
}

/// Exclusive, scoped ownership of one engine instance.
///
/// The engine is released when the session is dropped, whether the run ended
/// normally, returned early with an error, or unwound.
pub struct EngineSession {
    engine: Box<dyn OcrEngine>,
    recognitions: u64,
}

impl EngineSession {
    /// Acquire a fresh engine from `provider`.
    pub fn open(provider: &dyn EngineProvider) -> Result<Self, LesewerkError> {
        let engine = provider.acquire()?;
        Ok(Self::new(engine))
    }

    pub fn new(engine: Box<dyn OcrEngine>) -> Self {
        info!(engine = engine.name(), "OCR engine acquired");
        Self {
            engine,
            recognitions: 0,
        }
    }

    pub fn engine_name(&self) -> &'static str {
        self.engine.name()
    }

    /// Number of recognition calls made through this session.
    pub fn recognitions(&self) -> u64 {
        self.recognitions
    }

    /// Load `image` into the engine and run one recognition call.
    pub fn recognize(
        &mut self,
        image: &DynamicImage,
        mode: RecognitionMode,
    ) -> Result<EngineOutput, EngineError> {
        self.engine.set_image(image)?;
        self.recognitions += 1;
        match mode {
            RecognitionMode::Text => self.engine.get_text().map(EngineOutput::Text),
            RecognitionMode::Words => self.engine.get_word_data().map(EngineOutput::Words),
        }
    }
}

impl Drop for EngineSession {
    fn drop(&mut self) {
        self.engine.release();
        debug!(
            engine = self.engine.name(),
            recognitions = self.recognitions,
            "OCR engine released"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::GrayImage;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingEngine {
        releases: Arc<AtomicUsize>,
        loaded: bool,
    }

    impl OcrEngine for CountingEngine {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn set_image(&mut self, _image: &DynamicImage) -> Result<(), EngineError> {
            self.loaded = true;
            Ok(())
        }

        fn get_text(&mut self) -> Result<String, EngineError> {
            if self.loaded {
                Ok("ok".to_string())
            } else {
                Err(EngineError::Recognition("no image".into()))
            }
        }

        fn get_word_data(&mut self) -> Result<Vec<WordEntry>, EngineError> {
            Err(EngineError::Unavailable("words not supported".into()))
        }

        fn release(&mut self) {
            self.releases.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn image() -> DynamicImage {
        DynamicImage::ImageLuma8(GrayImage::new(4, 4))
    }

    #[test]
    fn session_releases_on_drop() {
        let releases = Arc::new(AtomicUsize::new(0));
        {
            let mut session = EngineSession::new(Box::new(CountingEngine {
                releases: releases.clone(),
                loaded: false,
            }));
            let out = session.recognize(&image(), RecognitionMode::Text).unwrap();
            assert_eq!(out, EngineOutput::Text("ok".into()));
            assert_eq!(session.recognitions(), 1);
        }
        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn session_releases_on_early_return() {
        let releases = Arc::new(AtomicUsize::new(0));
        let run = |releases: Arc<AtomicUsize>| -> Result<(), LesewerkError> {
            let mut session = EngineSession::new(Box::new(CountingEngine {
                releases,
                loaded: false,
            }));
            session.recognize(&image(), RecognitionMode::Words)?;
            Ok(())
        };
        let err = run(releases.clone()).unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn closure_provider_reports_unavailable() {
        let provider = || -> Result<Box<dyn OcrEngine>, LesewerkError> {
            Err(LesewerkError::EngineUnavailable("no models".into()))
        };
        let err = EngineSession::open(&provider).err().expect("open must fail");
        assert!(matches!(err, LesewerkError::EngineUnavailable(_)));
    }
}
