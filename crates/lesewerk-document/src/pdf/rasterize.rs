// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF rasterization — turn each page of a PDF into a pixel buffer. The default
// implementation shells out to `pdftoppm` (poppler-utils).

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;

use image::DynamicImage;
use lesewerk_core::error::{LesewerkError, Result};
use tracing::{debug, info, instrument};

/// Renders PDF pages to images.
pub trait PageRasterizer: Send + Sync {
    /// Render all `page_count` pages of `pdf` at `dpi`, in page order.
    fn rasterize(&self, pdf: &Path, page_count: usize, dpi: u32) -> Result<Vec<DynamicImage>>;
}

/// Rasterizer backed by the `pdftoppm` command-line tool.
#[derive(Debug, Clone)]
pub struct PdftoppmRasterizer {
    program: OsString,
}

impl Default for PdftoppmRasterizer {
    fn default() -> Self {
        Self {
            program: OsString::from("pdftoppm"),
        }
    }
}

impl PdftoppmRasterizer {
    /// Use a specific `pdftoppm` binary.
    pub fn with_program(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl PageRasterizer for PdftoppmRasterizer {
    #[instrument(skip_all, fields(pdf = %pdf.display(), page_count, dpi))]
    fn rasterize(&self, pdf: &Path, page_count: usize, dpi: u32) -> Result<Vec<DynamicImage>> {
        let workdir = tempfile::Builder::new().prefix("lesewerk-raster").tempdir()?;
        let prefix = workdir.path().join("page");

        let output = Command::new(&self.program)
            .arg("-png")
            .arg("-r")
            .arg(dpi.to_string())
            .arg(pdf)
            .arg(&prefix)
            .output()
            .map_err(|err| {
                LesewerkError::RasterizeError(format!(
                    "failed to invoke {}: {}; is poppler-utils installed?",
                    self.program.to_string_lossy(),
                    err
                ))
            })?;
        if !output.status.success() {
            return Err(LesewerkError::RasterizeError(format!(
                "{} exited with {}: {}",
                self.program.to_string_lossy(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let rendered = rendered_pages(workdir.path())?;
        if rendered.len() != page_count {
            return Err(LesewerkError::RasterizeError(format!(
                "expected {} rendered pages, found {}",
                page_count,
                rendered.len()
            )));
        }

        let pages = rendered
            .iter()
            .map(|path| {
                image::open(path).map_err(|err| {
                    LesewerkError::RasterizeError(format!(
                        "failed to read rendered page {}: {}",
                        path.display(),
                        err
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        info!(pages = pages.len(), "PDF rasterized");
        Ok(pages)
    }
}

/// PNGs written by `pdftoppm` (`page-1.png`, `page-02.png`, ...), sorted by
/// page number. The zero padding width depends on the page count.
fn rendered_pages(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut numbered = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let number = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .and_then(|stem| stem.rsplit_once('-'))
            .and_then(|(_, n)| n.parse::<usize>().ok());
        match number {
            Some(n) if path.extension().is_some_and(|ext| ext == "png") => numbered.push((n, path)),
            _ => debug!(path = %path.display(), "Ignoring unexpected rasterizer output"),
        }
    }
    numbered.sort_by_key(|(n, _)| *n);
    Ok(numbered.into_iter().map(|(_, path)| path).collect())
}
