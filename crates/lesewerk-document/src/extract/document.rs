// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Input loading — classify a file by extension, sniff its content, and turn it
// into an ordered list of page images.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::{DynamicImage, GrayImage, ImageBuffer, ImageFormat, RgbImage, RgbaImage};
use lesewerk_core::DocumentKind;
use lesewerk_core::error::{InputProblem, LesewerkError, Result};
use tiff::ColorType;
use tiff::decoder::{Decoder, DecodingResult};
use tracing::{debug, instrument};

use crate::pdf::{PageRasterizer, PdfReader};

const PDF_MAGIC: &[u8] = b"%PDF-";

/// A file that passed the input checks but has not been rasterized yet.
pub struct SourceFile {
    pub path: PathBuf,
    pub kind: DocumentKind,
    content: SourceContent,
}

enum SourceContent {
    /// Already decoded while sniffing: one image, or every frame of a TIFF.
    Pages(Vec<DynamicImage>),
    Pdf { page_count: usize },
}

impl SourceFile {
    pub fn page_count(&self) -> usize {
        match &self.content {
            SourceContent::Pages(pages) => pages.len(),
            SourceContent::Pdf { page_count } => *page_count,
        }
    }

    /// Produce page images in page order.
    pub fn rasterize(self, rasterizer: &dyn PageRasterizer, dpi: u32) -> Result<Vec<DynamicImage>> {
        match self.content {
            SourceContent::Pages(pages) => Ok(pages),
            SourceContent::Pdf { page_count } => rasterizer.rasterize(&self.path, page_count, dpi),
        }
    }
}

/// Check that `path` is a readable, non-empty image or PDF whose bytes match
/// its extension.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn inspect(path: &Path) -> Result<SourceFile> {
    let metadata = std::fs::metadata(path)
        .map_err(|err| LesewerkError::input(path, InputProblem::Unreadable, err.to_string()))?;
    if !metadata.is_file() {
        return Err(LesewerkError::input(
            path,
            InputProblem::Unreadable,
            "not a regular file",
        ));
    }

    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or_default();
    let kind = DocumentKind::from_extension(extension).ok_or_else(|| {
        LesewerkError::input(
            path,
            InputProblem::Unsupported,
            format!("extension {extension:?} is not an image or PDF"),
        )
    })?;

    if metadata.len() == 0 {
        return Err(LesewerkError::input(path, InputProblem::Empty, "file has zero bytes"));
    }

    let bytes = std::fs::read(path)
        .map_err(|err| LesewerkError::input(path, InputProblem::Unreadable, err.to_string()))?;

    let content = match kind {
        DocumentKind::Pdf => sniff_pdf(path, &bytes)?,
        DocumentKind::Image => sniff_image(path, &bytes)?,
    };

    let source = SourceFile {
        path: path.to_path_buf(),
        kind,
        content,
    };
    debug!(?kind, pages = source.page_count(), "Input accepted");
    Ok(source)
}

fn sniff_pdf(path: &Path, bytes: &[u8]) -> Result<SourceContent> {
    if !bytes.starts_with(PDF_MAGIC) {
        return Err(LesewerkError::input(
            path,
            InputProblem::Corrupt,
            "missing %PDF- header",
        ));
    }
    let reader = PdfReader::from_bytes(bytes)
        .map_err(|err| LesewerkError::input(path, InputProblem::Corrupt, err.to_string()))?;
    let page_count = reader.page_count();
    if page_count == 0 {
        return Err(LesewerkError::input(path, InputProblem::Corrupt, "PDF has no pages"));
    }
    debug!(
        version = reader.version(),
        sizes = ?reader.page_sizes(),
        "PDF parsed"
    );
    Ok(SourceContent::Pdf { page_count })
}

fn sniff_image(path: &Path, bytes: &[u8]) -> Result<SourceContent> {
    let corrupt = |detail: String| LesewerkError::input(path, InputProblem::Corrupt, detail);
    let format = image::guess_format(bytes)
        .map_err(|_| corrupt("content is not a recognised image format".to_string()))?;

    let pages = if format == ImageFormat::Tiff && tiff_frame_count(bytes) > 1 {
        tiff_frames(bytes).map_err(corrupt)?
    } else {
        let image = image::load_from_memory_with_format(bytes, format)
            .map_err(|err| corrupt(err.to_string()))?;
        vec![image]
    };
    if pages.iter().any(|page| page.width() == 0 || page.height() == 0) {
        return Err(corrupt("image has no pixels".to_string()));
    }
    Ok(SourceContent::Pages(pages))
}

/// Number of images in a TIFF; `0` when the header cannot be read.
fn tiff_frame_count(bytes: &[u8]) -> usize {
    let Ok(mut decoder) = Decoder::new(Cursor::new(bytes)) else {
        return 0;
    };
    let mut count = 1;
    while decoder.more_images() && decoder.next_image().is_ok() {
        count += 1;
    }
    count
}

/// Decode every frame of a multi-page TIFF, one page per frame.
fn tiff_frames(bytes: &[u8]) -> std::result::Result<Vec<DynamicImage>, String> {
    let mut decoder = Decoder::new(Cursor::new(bytes)).map_err(|err| err.to_string())?;
    let mut frames = Vec::new();
    loop {
        let (width, height) = decoder.dimensions().map_err(|err| err.to_string())?;
        let color = decoder.colortype().map_err(|err| err.to_string())?;
        let data = decoder.read_image().map_err(|err| err.to_string())?;
        frames.push(tiff_frame(width, height, color, data)?);
        if !decoder.more_images() {
            break;
        }
        decoder.next_image().map_err(|err| err.to_string())?;
    }
    debug!(frames = frames.len(), "TIFF frames decoded");
    Ok(frames)
}

fn tiff_frame(
    width: u32,
    height: u32,
    color: ColorType,
    data: DecodingResult,
) -> std::result::Result<DynamicImage, String> {
    let image = match (color, data) {
        (ColorType::Gray(8), DecodingResult::U8(buf)) => {
            GrayImage::from_raw(width, height, buf).map(DynamicImage::ImageLuma8)
        }
        (ColorType::Gray(16), DecodingResult::U16(buf)) => {
            ImageBuffer::from_raw(width, height, buf).map(DynamicImage::ImageLuma16)
        }
        (ColorType::GrayA(8), DecodingResult::U8(buf)) => {
            ImageBuffer::from_raw(width, height, buf).map(DynamicImage::ImageLumaA8)
        }
        (ColorType::RGB(8), DecodingResult::U8(buf)) => {
            RgbImage::from_raw(width, height, buf).map(DynamicImage::ImageRgb8)
        }
        (ColorType::RGBA(8), DecodingResult::U8(buf)) => {
            RgbaImage::from_raw(width, height, buf).map(DynamicImage::ImageRgba8)
        }
        (ColorType::RGB(16), DecodingResult::U16(buf)) => {
            ImageBuffer::from_raw(width, height, buf).map(DynamicImage::ImageRgb16)
        }
        (ColorType::RGBA(16), DecodingResult::U16(buf)) => {
            ImageBuffer::from_raw(width, height, buf).map(DynamicImage::ImageRgba16)
        }
        (color, _) => return Err(format!("unsupported TIFF colour type {color:?}")),
    };
    image.ok_or_else(|| "TIFF frame holds fewer samples than its dimensions".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    fn problem_of(err: LesewerkError) -> InputProblem {
        match err {
            LesewerkError::InputError { problem, .. } => problem,
            other => panic!("expected input error, got {other}"),
        }
    }

    #[test]
    fn accepts_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.png");
        GrayImage::from_pixel(5, 4, Luma([9u8])).save(&path).unwrap();

        let source = inspect(&path).unwrap();
        assert_eq!(source.kind, DocumentKind::Image);
        assert_eq!(source.page_count(), 1);
    }

    #[test]
    fn classifies_bad_inputs() {
        let dir = tempfile::tempdir().unwrap();

        let empty = dir.path().join("empty.png");
        std::fs::write(&empty, b"").unwrap();
        assert_eq!(problem_of(inspect(&empty).err().unwrap()), InputProblem::Empty);

        let text = dir.path().join("notes.txt");
        std::fs::write(&text, b"hello").unwrap();
        assert_eq!(problem_of(inspect(&text).err().unwrap()), InputProblem::Unsupported);

        let fake = dir.path().join("fake.jpg");
        std::fs::write(&fake, b"this is not a jpeg").unwrap();
        assert_eq!(problem_of(inspect(&fake).err().unwrap()), InputProblem::Corrupt);

        let fake_pdf = dir.path().join("fake.pdf");
        std::fs::write(&fake_pdf, b"GIF89a").unwrap();
        assert_eq!(problem_of(inspect(&fake_pdf).err().unwrap()), InputProblem::Corrupt);

        let missing = dir.path().join("missing.png");
        assert_eq!(problem_of(inspect(&missing).err().unwrap()), InputProblem::Unreadable);
    }

    #[test]
    fn counts_pdf_pages() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.pdf");
        std::fs::write(&path, crate::pdf::reader::tests::blank_pdf(3)).unwrap();

        let source = inspect(&path).unwrap();
        assert_eq!(source.kind, DocumentKind::Pdf);
        assert_eq!(source.page_count(), 3);
    }

    #[test]
    fn every_tiff_frame_is_a_page() {
        use tiff::encoder::{TiffEncoder, colortype};

        let mut buf = Cursor::new(Vec::new());
        let mut encoder = TiffEncoder::new(&mut buf).unwrap();
        encoder.write_image::<colortype::Gray8>(4, 3, &[10u8; 12]).unwrap();
        encoder.write_image::<colortype::RGB8>(2, 2, &[20u8; 12]).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.tif");
        std::fs::write(&path, buf.into_inner()).unwrap();

        let source = inspect(&path).unwrap();
        assert_eq!(source.kind, DocumentKind::Image);
        assert_eq!(source.page_count(), 2);
        let pages = source
            .rasterize(&crate::pdf::PdftoppmRasterizer::default(), 300)
            .unwrap();
        assert_eq!((pages[0].width(), pages[0].height()), (4, 3));
        assert_eq!(pages[0].to_luma8().get_pixel(0, 0).0, [10]);
        assert_eq!((pages[1].width(), pages[1].height()), (2, 2));
    }
}
