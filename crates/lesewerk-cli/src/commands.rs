// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Command implementations for the `lesewerk` binary.

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use lesewerk_core::ExtractionConfig;
use lesewerk_core::human_errors::humanize_error;
use lesewerk_document::extract::BatchResult;
use lesewerk_document::scan::clean::{clean_directory, clean_image_file};
use lesewerk_document::{DefaultCleaner, EngineProvider, TextExtractor};
use tracing::info;

use crate::{CleanArgs, ExtractArgs};

pub fn extract(args: ExtractArgs) -> Result<ExitCode> {
    let config = build_config(&args)?;
    let provider = engine_provider(&config)?;
    let mut extractor = TextExtractor::from_provider(provider, config)?;

    if let Some(file) = &args.file {
        extractor
            .extract_from_file(file)
            .with_context(|| format!("could not extract text from {}", file.display()))?;
        return Ok(ExitCode::SUCCESS);
    }

    let Some(dir) = &args.directory else {
        anyhow::bail!("either --file or --directory is required");
    };
    let batch = extractor
        .extract_from_directory(dir)
        .with_context(|| format!("could not extract text from {}", dir.display()))?;
    report_batch(&batch);

    if let Some(path) = &args.summary {
        let json = serde_json::to_string_pretty(&batch.summary())?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write summary to {}", path.display()))?;
    }

    Ok(exit_status(batch.len(), batch.failed().count()))
}

pub fn clean(args: CleanArgs) -> Result<ExitCode> {
    let cleaner = DefaultCleaner::default();
    let output = args.output.as_deref();

    if let Some(image) = &args.image {
        let written = clean_image_file(image, output, &cleaner)
            .with_context(|| format!("could not clean {}", image.display()))?;
        println!("{}", written.display());
        return Ok(ExitCode::SUCCESS);
    }

    let Some(dir) = &args.directory else {
        anyhow::bail!("either --image or --directory is required");
    };
    let report = clean_directory(dir, output, &cleaner)
        .with_context(|| format!("could not clean images in {}", dir.display()))?;
    for path in &report.cleaned {
        println!("{}", path.display());
    }
    for (path, err) in &report.failed {
        report_failure(path, err);
    }

    let attempted = report.cleaned.len() + report.failed.len();
    Ok(exit_status(attempted, report.failed.len()))
}

/// Load the config file, if any, then apply command-line overrides.
fn build_config(args: &ExtractArgs) -> Result<ExtractionConfig> {
    let mut config = match &args.config {
        Some(path) => ExtractionConfig::from_toml_file(path)?,
        None => ExtractionConfig::default(),
    };

    config.get_data |= args.get_data;
    config.print |= args.print;
    config.recursive |= args.recursive;
    if let Some(output) = &args.output {
        config.output_dir = Some(output.clone());
    }
    if let Some(workers) = args.workers {
        config.workers = workers;
    }
    if let Some(dpi) = args.dpi {
        config.dpi = dpi;
    }
    if let Some(threshold) = args.min_confidence {
        config.min_confidence = Some(threshold);
    }
    if let Some(model_dir) = &args.model_dir {
        config.model_dir = Some(model_dir.clone());
    }

    config.validate()?;
    info!(?config, "Configuration resolved");
    Ok(config)
}

#[cfg(feature = "ocr")]
fn engine_provider(config: &ExtractionConfig) -> Result<Arc<dyn EngineProvider>> {
    use lesewerk_document::{OcrConfig, OcrsProvider};

    let models = OcrConfig::from_optional_dir(config.model_dir.as_deref());
    models.validate()?;
    Ok(Arc::new(OcrsProvider::new(models)))
}

#[cfg(not(feature = "ocr"))]
fn engine_provider(_config: &ExtractionConfig) -> Result<Arc<dyn EngineProvider>> {
    Err(lesewerk_core::LesewerkError::EngineUnavailable(
        "lesewerk was built without the `ocr` feature".to_string(),
    )
    .into())
}

fn report_batch(batch: &BatchResult) {
    let summary = batch.summary();
    eprintln!(
        "Extracted {} of {} files in {:.2} seconds",
        summary.succeeded,
        summary.total,
        summary.elapsed_ms as f64 / 1000.0
    );
    if summary.cancelled {
        eprintln!("Run was cancelled before every file was processed.");
    }
    for (path, err) in batch.failed() {
        report_failure(path, err);
    }
}

fn report_failure(path: &Path, err: &lesewerk_core::LesewerkError) {
    let human = humanize_error(err);
    eprintln!("  [{}] {}: {}", human.severity.label(), path.display(), human.message);
    eprintln!("    {}", human.suggestion);
}

/// Failure only when files were attempted and none of them succeeded.
fn exit_status(attempted: usize, failed: usize) -> ExitCode {
    if batch_failed(attempted, failed) {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn batch_failed(attempted: usize, failed: usize) -> bool {
    attempted > 0 && failed == attempted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Cli;
    use clap::Parser;
    use std::io::Write;

    fn extract_args(argv: &[&str]) -> ExtractArgs {
        let cli = Cli::try_parse_from(argv).unwrap();
        match cli.command {
            crate::Commands::Extract(args) => args,
            crate::Commands::Clean(_) => panic!("expected extract"),
        }
    }

    #[test]
    fn partial_batches_succeed() {
        assert!(!batch_failed(0, 0));
        assert!(!batch_failed(5, 1));
        assert!(batch_failed(2, 2));
    }

    #[test]
    fn flags_override_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "workers = 2\ndpi = 150\nrecursive = true").unwrap();
        let path = file.path().to_string_lossy().into_owned();

        let args = extract_args(&[
            "lesewerk", "extract", "-d", "in", "--config", &path, "--dpi", "400", "-g",
        ]);
        let config = build_config(&args).unwrap();
        assert_eq!(config.workers, 2);
        assert_eq!(config.dpi, 400);
        assert!(config.recursive);
        assert!(config.get_data);
        assert!(config.should_print());
    }

    #[test]
    fn invalid_flags_are_rejected() {
        let args = extract_args(&["lesewerk", "extract", "-f", "a.png", "--workers", "0"]);
        let err = build_config(&args).unwrap_err();
        assert!(err.downcast_ref::<lesewerk_core::LesewerkError>().is_some());
    }
}
