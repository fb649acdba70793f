// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF reader — open and inspect PDF documents using the `lopdf` crate. Used to
// validate a PDF and count its pages before it is rasterized.

use lesewerk_core::error::LesewerkError;
use lopdf::{Document, Object};
use tracing::{debug, instrument};

/// Read-only view of a parsed PDF.
pub struct PdfReader {
    document: Document,
}

impl PdfReader {
    /// Create a reader from raw PDF bytes already in memory.
    #[instrument(skip_all, fields(bytes_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self, LesewerkError> {
        let document = Document::load_mem(data).map_err(|err| {
            LesewerkError::PdfError(format!("failed to load PDF from memory: {}", err))
        })?;

        debug!(pages = document.get_pages().len(), "PDF loaded from bytes");

        Ok(Self { document })
    }

    // -- Inspection -----------------------------------------------------------

    /// Number of pages in the document.
    pub fn page_count(&self) -> usize {
        self.document.get_pages().len()
    }

    /// PDF header version, e.g. `"1.5"`.
    pub fn version(&self) -> &str {
        &self.document.version
    }

    /// `/MediaBox` width and height in points for each page, in page order.
    /// Pages without a readable media box report `None`.
    pub fn page_sizes(&self) -> Vec<Option<(f32, f32)>> {
        self.document
            .get_pages()
            .values()
            .map(|&page_id| {
                let dict = self.document.get_dictionary(page_id).ok()?;
                let media_box = dict.get(b"MediaBox").ok()?.as_array().ok()?;
                let coords: Vec<f32> = media_box.iter().filter_map(number).collect();
                match coords.as_slice() {
                    [x0, y0, x1, y1] => Some(((x1 - x0).abs(), (y1 - y0).abs())),
                    _ => None,
                }
            })
            .collect()
    }
}

fn number(object: &Object) -> Option<f32> {
    match object {
        Object::Integer(value) => Some(*value as f32),
        Object::Real(value) => Some(*value),
        _ => None,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use lopdf::dictionary;

    /// Serialise a PDF with `pages` empty 200x300pt pages.
    pub(crate) fn blank_pdf(pages: usize) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let kids: Vec<Object> = (0..pages)
            .map(|_| {
                let page_id = doc.add_object(dictionary! {
                    "Type" => "Page",
                    "Parent" => pages_id,
                    "MediaBox" => vec![
                        Object::Integer(0),
                        Object::Integer(0),
                        Object::Integer(200),
                        Object::Integer(300),
                    ],
                });
                Object::Reference(page_id)
            })
            .collect();
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => pages as i64,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut out = Vec::new();
        doc.save_to(&mut out).unwrap();
        out
    }

    #[test]
    fn counts_pages() {
        let reader = PdfReader::from_bytes(&blank_pdf(3)).unwrap();
        assert_eq!(reader.page_count(), 3);
        assert_eq!(reader.version(), "1.5");
    }

    #[test]
    fn reads_media_boxes() {
        let reader = PdfReader::from_bytes(&blank_pdf(2)).unwrap();
        assert_eq!(reader.page_sizes(), vec![Some((200.0, 300.0)); 2]);
    }

    #[test]
    fn garbage_is_a_pdf_error() {
        let err = PdfReader::from_bytes(b"%PDF-1.5 truncated").err().unwrap();
        assert!(matches!(err, LesewerkError::PdfError(_)));
    }
}
