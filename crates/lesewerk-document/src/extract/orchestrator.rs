// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Extraction orchestrator — drives each input through rasterize, segment,
// preprocess, recognise, and aggregate, and collects a batch result.
//
// Sequential work shares one engine session, opened on first use. In
// parallel mode every worker acquires its own engine from the provider;
// results land in pre-sized slots indexed by input position, so output order
// never depends on scheduling.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use chrono::Utc;
use lesewerk_core::error::{InputProblem, LesewerkError, Result};
use lesewerk_core::{DocumentStage, ExtractionConfig, WordEntry};
use tracing::{debug, info, instrument, warn};

use crate::extract::document::inspect;
use crate::extract::output::{OutputNamer, print_banner, render_word_table, write_output};
use crate::extract::result::{
    BatchEntry, BatchResult, DocumentResult, FileFailure, FileOutcome, PageOutcome, PageResult,
    RecognitionResult, SegmentResult,
};
use crate::extract::tables::filter_low_confidence;
use crate::pdf::{PageRasterizer, PdftoppmRasterizer};
use crate::scan::engine::{
    EngineError, EngineOutput, EngineProvider, EngineSession, OcrEngine, RecognitionMode,
};
use crate::scan::preprocess::{DefaultCleaner, Preprocessor};
use crate::segment::{Segmenter, WholePage, cut_segments};

/// Cooperative cancellation, checked before each file is started.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// The stateless part of extraction, shared by every worker.
#[derive(Clone)]
struct Pipeline {
    segmenter: Arc<dyn Segmenter>,
    preprocessor: Arc<dyn Preprocessor>,
    rasterizer: Arc<dyn PageRasterizer>,
    config: ExtractionConfig,
}

impl Pipeline {
    fn mode(&self) -> RecognitionMode {
        RecognitionMode::from_get_data(self.config.get_data)
    }

    /// Run one file through recognition. Failures carry the stage they
    /// stopped at; the caller decides whether they end the run.
    #[instrument(skip_all, fields(path = %path.display()))]
    fn process(
        &self,
        session: &mut EngineSession,
        path: &Path,
    ) -> std::result::Result<DocumentResult, FileFailure> {
        let mut stage = DocumentStage::Unprocessed;
        let fail = |stage: DocumentStage, error: LesewerkError| {
            warn!(?stage, %error, "File failed");
            FileFailure { stage, error }
        };

        let source = inspect(path).map_err(|err| fail(stage, err))?;
        let kind = source.kind;
        let pages = source
            .rasterize(self.rasterizer.as_ref(), self.config.dpi)
            .map_err(|err| fail(stage, err))?;
        stage = stage.next();
        debug!(?stage, pages = pages.len());

        // Every page is segmented before any recognition starts.
        let segmented: Vec<_> = pages
            .iter()
            .enumerate()
            .map(|(index, page)| {
                let segments = cut_segments(page, index, self.segmenter.as_ref());
                (index, page.width(), page.height(), segments)
            })
            .collect();
        drop(pages);
        stage = stage.next();
        debug!(?stage);

        let mode = self.mode();
        let mut results = Vec::with_capacity(segmented.len());
        for (index, width, height, segments) in segmented {
            let outcome = match segments {
                Err(err) => {
                    warn!(page = index, error = %err, "Page skipped");
                    PageOutcome::Failed {
                        reason: err.to_string(),
                    }
                }
                Ok(segments) => {
                    let mut recognised = Vec::with_capacity(segments.len());
                    for segment in segments {
                        let cleaned = self.preprocessor.clean(segment.image);
                        let result = match session.recognize(&cleaned, mode) {
                            Ok(EngineOutput::Text(text)) => RecognitionResult::Text {
                                text: text.trim_end_matches('\x0c').to_string(),
                            },
                            Ok(EngineOutput::Words(words)) => RecognitionResult::Words {
                                words: words.into_iter().map(WordEntry::normalized).collect(),
                            },
                            Err(EngineError::Recognition(reason)) => {
                                warn!(
                                    page = index,
                                    segment = segment.index,
                                    %reason,
                                    "Segment not recognised"
                                );
                                RecognitionResult::Failed { reason }
                            }
                            Err(err @ EngineError::Unavailable(_)) => {
                                return Err(fail(stage, err.into()));
                            }
                        };
                        debug!(page = index, segment = segment.index, failed = result.is_failed());
                        recognised.push(SegmentResult {
                            index: segment.index,
                            bbox: segment.bbox,
                            result,
                        });
                    }
                    PageOutcome::Recognized {
                        segments: recognised,
                    }
                }
            };
            results.push(PageResult {
                index,
                width,
                height,
                outcome,
            });
        }
        stage = stage.next();
        debug!(?stage);

        let document = DocumentResult {
            path: path.to_path_buf(),
            kind,
            mode,
            pages: results,
            output: None,
        };
        info!(
            engine = session.engine_name(),
            pages = document.pages.len(),
            segments = document.segment_count(),
            failed_segments = document.failed_segments(),
            "Document extracted"
        );
        Ok(document)
    }

    /// Write the rendered document to the output directory, if one is set.
    /// The file name is reserved only here, once the document has succeeded.
    fn save(&self, namer: &mut OutputNamer, document: &mut DocumentResult) -> Result<()> {
        let Some(dir) = &self.config.output_dir else {
            return Ok(());
        };
        let name = namer.name_for(&document.path, document.mode);
        let body = self.render(document);
        document.output = Some(write_output(dir, &name, &body)?);
        Ok(())
    }

    /// The text written to files and printed: plain text, or the word table.
    fn render(&self, document: &DocumentResult) -> String {
        match document.mode {
            RecognitionMode::Text => document.text(&self.config.page_break),
            RecognitionMode::Words => {
                let mut records = document.word_records();
                if let Some(threshold) = self.config.min_confidence {
                    records = filter_low_confidence(records, threshold);
                }
                render_word_table(&records)
            }
        }
    }
}

/// Extracts text or word data from images and PDFs.
///
/// ```ignore
/// let mut extractor = TextExtractor::from_provider(Arc::new(OcrsProvider::default()), config)?
///     .with_segmenter(FixedRegions::new(fields));
/// let batch = extractor.extract_from_directory(Path::new("scans"))?;
/// ```
pub struct TextExtractor {
    pipeline: Pipeline,
    /// Run-level engine for sequential work, opened on first use.
    session: Option<EngineSession>,
    provider: Option<Arc<dyn EngineProvider>>,
    out: Box<dyn Write + Send>,
    cancel: CancelFlag,
}

impl TextExtractor {
    // -- Construction ---------------------------------------------------------

    /// Sequential extractor around a single engine.
    pub fn new(engine: Box<dyn OcrEngine>, config: ExtractionConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::assemble(Some(EngineSession::new(engine)), None, config))
    }

    /// Extractor that acquires engines from `provider`. With
    /// `config.workers > 1`, batches run in parallel with one engine per
    /// worker and no run-level engine is opened.
    pub fn from_provider(
        provider: Arc<dyn EngineProvider>,
        config: ExtractionConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self::assemble(None, Some(provider), config))
    }

    fn assemble(
        session: Option<EngineSession>,
        provider: Option<Arc<dyn EngineProvider>>,
        config: ExtractionConfig,
    ) -> Self {
        Self {
            pipeline: Pipeline {
                segmenter: Arc::new(WholePage),
                preprocessor: Arc::new(DefaultCleaner::default()),
                rasterizer: Arc::new(PdftoppmRasterizer::default()),
                config,
            },
            session,
            provider,
            out: Box::new(std::io::stdout()),
            cancel: CancelFlag::new(),
        }
    }

    pub fn with_segmenter(mut self, segmenter: impl Segmenter + 'static) -> Self {
        self.pipeline.segmenter = Arc::new(segmenter);
        self
    }

    pub fn with_preprocessor(mut self, preprocessor: impl Preprocessor + 'static) -> Self {
        self.pipeline.preprocessor = Arc::new(preprocessor);
        self
    }

    pub fn with_rasterizer(mut self, rasterizer: impl PageRasterizer + 'static) -> Self {
        self.pipeline.rasterizer = Arc::new(rasterizer);
        self
    }

    /// Destination for printed results (standard output by default).
    pub fn with_output(mut self, out: impl Write + Send + 'static) -> Self {
        self.out = Box::new(out);
        self
    }

    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    // -- Accessors ------------------------------------------------------------

    pub fn config(&self) -> &ExtractionConfig {
        &self.pipeline.config
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// The run-level engine session, once sequential work has opened it.
    pub fn session(&self) -> Option<&EngineSession> {
        self.session.as_ref()
    }

    // -- Extraction -----------------------------------------------------------

    /// Extract one file. Its input error is returned directly.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn extract_from_file(&mut self, path: &Path) -> Result<DocumentResult> {
        let session = open_session(&mut self.session, self.provider.as_ref())?;
        let mut document = self
            .pipeline
            .process(session, path)
            .map_err(|failure| failure.error)?;
        self.pipeline.save(&mut OutputNamer::new(), &mut document)?;
        self.emit(&document)?;
        Ok(document)
    }

    /// Extract every file in `dir`, in lexicographic order of relative path.
    ///
    /// Subdirectories are visited only when `config.recursive` is set. A file
    /// that fails is recorded in its slot; only fatal errors end the run.
    #[instrument(skip_all, fields(dir = %dir.display()))]
    pub fn extract_from_directory(&mut self, dir: &Path) -> Result<BatchResult> {
        if !dir.is_dir() {
            return Err(LesewerkError::input(
                dir,
                InputProblem::Unreadable,
                "not a directory",
            ));
        }
        let mut files = Vec::new();
        collect_inputs(dir, self.pipeline.config.recursive, &mut files)?;
        files.sort();
        info!(files = files.len(), "Directory listed");
        self.run_batch(dir.to_path_buf(), &files)
    }

    /// Extract an explicit list of files, in the given order.
    pub fn extract_from_list(&mut self, files: &[PathBuf]) -> Result<BatchResult> {
        self.run_batch(PathBuf::new(), files)
    }

    fn run_batch(&mut self, root: PathBuf, files: &[PathBuf]) -> Result<BatchResult> {
        let started_at = Utc::now();
        let mut namer = OutputNamer::new();

        let workers = self.pipeline.config.workers;
        let (entries, cancelled) = match self.provider.clone() {
            Some(provider) if workers > 1 && files.len() > 1 => {
                self.run_parallel(provider, files, workers, &mut namer)?
            }
            _ => {
                if workers > 1 && self.provider.is_none() {
                    warn!(workers, "No engine provider; running sequentially");
                }
                self.run_sequential(files, &mut namer)?
            }
        };

        let batch = BatchResult {
            root,
            entries,
            cancelled,
            started_at,
            finished_at: Utc::now(),
        };
        info!(
            total = batch.len(),
            succeeded = batch.succeeded().count(),
            failed = batch.failed().count(),
            cancelled,
            elapsed_ms = (batch.finished_at - batch.started_at).num_milliseconds(),
            "Batch finished"
        );
        Ok(batch)
    }

    fn run_sequential(
        &mut self,
        files: &[PathBuf],
        namer: &mut OutputNamer,
    ) -> Result<(Vec<BatchEntry>, bool)> {
        let mut entries = Vec::with_capacity(files.len());
        for path in files {
            if self.cancel.is_cancelled() {
                info!(remaining = files.len() - entries.len(), "Batch cancelled");
                return Ok((entries, true));
            }
            let session = open_session(&mut self.session, self.provider.as_ref())?;
            let outcome = match self.pipeline.process(session, path) {
                Ok(document) => self.finish(namer, document)?,
                Err(failure) if failure.error.is_fatal() => return Err(failure.error),
                Err(failure) => FileOutcome::Failed(failure),
            };
            entries.push(BatchEntry {
                path: path.clone(),
                outcome,
            });
        }
        Ok((entries, false))
    }

    fn run_parallel(
        &mut self,
        provider: Arc<dyn EngineProvider>,
        files: &[PathBuf],
        workers: usize,
        namer: &mut OutputNamer,
    ) -> Result<(Vec<BatchEntry>, bool)> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()
            .map_err(|err| {
                LesewerkError::ConfigError(format!("cannot start worker pool: {}", err))
            })?;
        info!(workers, files = files.len(), "Running batch in parallel");

        let slots: Vec<OnceLock<std::result::Result<DocumentResult, FileFailure>>> =
            files.iter().map(|_| OnceLock::new()).collect();
        let next = AtomicUsize::new(0);
        let abort = AtomicBool::new(false);
        let first_fatal: OnceLock<LesewerkError> = OnceLock::new();
        let pipeline = &self.pipeline;
        let cancel = &self.cancel;

        pool.scope(|scope| {
            for _ in 0..workers.min(files.len()) {
                scope.spawn(|_| {
                    let mut session = match EngineSession::open(provider.as_ref()) {
                        Ok(session) => session,
                        Err(err) => {
                            abort.store(true, Ordering::SeqCst);
                            let _ = first_fatal.set(err);
                            return;
                        }
                    };
                    while !abort.load(Ordering::SeqCst) && !cancel.is_cancelled() {
                        let index = next.fetch_add(1, Ordering::SeqCst);
                        let Some(path) = files.get(index) else {
                            break;
                        };
                        match pipeline.process(&mut session, path) {
                            Err(failure) if failure.error.is_fatal() => {
                                abort.store(true, Ordering::SeqCst);
                                let _ = first_fatal.set(failure.error);
                            }
                            outcome => {
                                let _ = slots[index].set(outcome);
                            }
                        }
                    }
                });
            }
        });

        if let Some(err) = first_fatal.into_inner() {
            return Err(err);
        }

        // Workers claim indices in order, so visited files form a prefix.
        // Outputs are written here, in input order, so names do not depend
        // on scheduling.
        let mut entries = Vec::with_capacity(files.len());
        for (path, slot) in files.iter().zip(slots) {
            let Some(outcome) = slot.into_inner() else {
                break;
            };
            let outcome = match outcome {
                Ok(document) => self.finish(namer, document)?,
                Err(failure) => FileOutcome::Failed(failure),
            };
            entries.push(BatchEntry {
                path: path.clone(),
                outcome,
            });
        }
        let cancelled = entries.len() < files.len();
        if cancelled {
            info!(remaining = files.len() - entries.len(), "Batch cancelled");
        }
        Ok((entries, cancelled))
    }

    /// Save and print a recognised document. A failed write fails the file,
    /// not the run.
    fn finish(
        &mut self,
        namer: &mut OutputNamer,
        mut document: DocumentResult,
    ) -> Result<FileOutcome> {
        if let Err(error) = self.pipeline.save(namer, &mut document) {
            warn!(path = %document.path.display(), %error, "Output not written");
            return Ok(FileOutcome::Failed(FileFailure {
                stage: DocumentStage::Aggregated,
                error,
            }));
        }
        self.emit(&document)?;
        Ok(FileOutcome::Extracted(document))
    }

    /// Print a finished document when printing is enabled.
    fn emit(&mut self, document: &DocumentResult) -> Result<()> {
        if self.pipeline.config.should_print() {
            let body = self.pipeline.render(document);
            print_banner(self.out.as_mut(), &document.path, &body)?;
        }
        Ok(())
    }
}

/// The run-level session, opened from `provider` the first time it is needed.
fn open_session<'a>(
    session: &'a mut Option<EngineSession>,
    provider: Option<&Arc<dyn EngineProvider>>,
) -> Result<&'a mut EngineSession> {
    if session.is_none() {
        let provider = provider.ok_or_else(|| {
            LesewerkError::EngineUnavailable("no engine or engine provider configured".to_string())
        })?;
        *session = Some(EngineSession::open(provider.as_ref())?);
    }
    session.as_mut().ok_or_else(|| {
        LesewerkError::EngineUnavailable("engine session could not be opened".to_string())
    })
}

/// Regular files under `dir`; descends into subdirectories when `recursive`.
fn collect_inputs(dir: &Path, recursive: bool, files: &mut Vec<PathBuf>) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            if recursive {
                collect_inputs(&path, recursive, files)?;
            } else {
                debug!(path = %path.display(), "Skipping subdirectory");
            }
        } else {
            files.push(path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_flag_is_shared_between_clones() {
        let flag = CancelFlag::new();
        let observer = flag.clone();
        assert!(!observer.is_cancelled());
        flag.cancel();
        assert!(observer.is_cancelled());
    }

    #[test]
    fn collects_nested_files_only_when_recursive() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.png"), b"x").unwrap();
        std::fs::create_dir(dir.path().join("a")).unwrap();
        std::fs::write(dir.path().join("a").join("z.png"), b"x").unwrap();

        let mut flat = Vec::new();
        collect_inputs(dir.path(), false, &mut flat).unwrap();
        assert_eq!(flat, vec![dir.path().join("b.png")]);

        let mut deep = Vec::new();
        collect_inputs(dir.path(), true, &mut deep).unwrap();
        deep.sort();
        assert_eq!(deep, vec![dir.path().join("a").join("z.png"), dir.path().join("b.png")]);
    }
}
