// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Standalone image cleaning: run a preprocessor over one image or a directory
// of images and save `<stem>_annotated.<ext>` next to the input or into an
// output directory.

use std::path::{Path, PathBuf};

use lesewerk_core::DocumentKind;
use lesewerk_core::error::{InputProblem, LesewerkError, Result};
use tracing::{debug, info, instrument, warn};

use crate::image::ImageProcessor;
use crate::scan::preprocess::Preprocessor;

const ANNOTATED_SUFFIX: &str = "_annotated";

/// Where the cleaned version of `input` is written.
pub fn annotated_path(input: &Path, output_dir: Option<&Path>) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match input.extension() {
        Some(ext) => format!("{stem}{ANNOTATED_SUFFIX}.{}", ext.to_string_lossy()),
        None => format!("{stem}{ANNOTATED_SUFFIX}"),
    };
    let dir = output_dir
        .map(Path::to_path_buf)
        .or_else(|| input.parent().map(Path::to_path_buf))
        .unwrap_or_default();
    dir.join(name)
}

/// Clean one image and save it. Returns the written path.
#[instrument(skip_all, fields(path = %input.display()))]
pub fn clean_image_file(
    input: &Path,
    output_dir: Option<&Path>,
    cleaner: &dyn Preprocessor,
) -> Result<PathBuf> {
    let source = ImageProcessor::open(input).map_err(|err| {
        LesewerkError::input(input, InputProblem::Corrupt, err.to_string())
    })?;
    let cleaned = ImageProcessor::from_dynamic(cleaner.clean(source.into_dynamic()));

    if let Some(dir) = output_dir {
        std::fs::create_dir_all(dir)?;
    }
    let target = annotated_path(input, output_dir);
    cleaned.save(&target)?;
    info!(output = %target.display(), "Cleaned image saved");
    Ok(target)
}

/// Outcome of cleaning a directory.
#[derive(Debug, Default)]
pub struct CleanReport {
    pub cleaned: Vec<PathBuf>,
    /// Subdirectories and non-image files that were passed over.
    pub skipped: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, LesewerkError)>,
}

/// Clean every image directly inside `dir`, in file-name order.
#[instrument(skip_all, fields(dir = %dir.display()))]
pub fn clean_directory(
    dir: &Path,
    output_dir: Option<&Path>,
    cleaner: &dyn Preprocessor,
) -> Result<CleanReport> {
    let mut entries = std::fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()?;
    entries.sort();

    let mut report = CleanReport::default();
    for path in entries {
        if path.is_dir() {
            debug!(path = %path.display(), "Skipping subdirectory");
            report.skipped.push(path);
            continue;
        }
        let is_image = path
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(DocumentKind::from_extension)
            == Some(DocumentKind::Image);
        if !is_image {
            info!(path = %path.display(), "Skipping non-image file");
            report.skipped.push(path);
            continue;
        }
        match clean_image_file(&path, output_dir, cleaner) {
            Ok(written) => report.cleaned.push(written),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "Image could not be cleaned");
                report.failed.push((path, err));
            }
        }
    }

    info!(
        cleaned = report.cleaned.len(),
        skipped = report.skipped.len(),
        failed = report.failed.len(),
        "Directory cleaned"
    );
    Ok(report)
}
