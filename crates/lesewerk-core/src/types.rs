// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Lesewerk extraction pipeline.

use serde::{Deserialize, Serialize};

/// Marker placed between the texts of consecutive pages (ASCII form feed).
pub const PAGE_BREAK: &str = "\x0c";

/// Number of decimal places kept for word confidences.
pub const CONFIDENCE_DECIMALS: i32 = 2;

/// Image file extensions accepted as single-page inputs.
pub const IMAGE_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "jpe", "webp", "bmp", "dib", "tif", "tiff", "pxm", "pgm", "pbm", "pnm",
];

/// Round a raw engine confidence to the documented precision.
pub fn round_confidence(value: f32) -> f32 {
    let scale = 10f32.powi(CONFIDENCE_DECIMALS);
    (value * scale).round() / scale
}

/// Bring an engine score into 0..=100 at the documented precision. NaN is 0.
pub fn normalize_confidence(value: f32) -> f32 {
    if value.is_nan() {
        return 0.0;
    }
    round_confidence(value.clamp(0.0, 100.0))
}

/// Supported input document kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    /// A single raster image (one page).
    Image,
    /// A PDF, rasterized into one image per page.
    Pdf,
}

impl DocumentKind {
    /// Infer document kind from file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        let lower = ext.to_ascii_lowercase();
        if lower == "pdf" {
            Some(Self::Pdf)
        } else if IMAGE_EXTENSIONS.contains(&lower.as_str()) {
            Some(Self::Image)
        } else {
            None
        }
    }
}

/// Lifecycle of one document through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStage {
    Unprocessed,
    /// Pages are available as pixel buffers.
    Rasterized,
    /// Every page has been split into validated segments.
    Segmented,
    /// Every segment has a recognition result (possibly the failure sentinel).
    Recognized,
    /// Results merged into a `DocumentResult`. Terminal state.
    Aggregated,
}

impl DocumentStage {
    /// The stage that follows `self` on the success path.
    pub fn next(self) -> Self {
        match self {
            Self::Unprocessed => Self::Rasterized,
            Self::Rasterized => Self::Segmented,
            Self::Segmented => Self::Recognized,
            Self::Recognized | Self::Aggregated => Self::Aggregated,
        }
    }

    pub fn is_terminal(self) -> bool {
        self == Self::Aggregated
    }
}

/// Axis-aligned rectangle in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoundingBox {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn new(left: u32, top: u32, width: u32, height: u32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// Rectangle covering a whole `width` x `height` image.
    pub fn full(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }

    /// Exclusive right edge.
    pub fn right(&self) -> u32 {
        self.left.saturating_add(self.width)
    }

    /// Exclusive bottom edge.
    pub fn bottom(&self) -> u32 {
        self.top.saturating_add(self.height)
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Whether `other` lies entirely inside `self`.
    pub fn contains(&self, other: &BoundingBox) -> bool {
        other.left >= self.left
            && other.top >= self.top
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    /// Shift the rectangle by the origin of an enclosing region.
    pub fn offset(&self, dx: u32, dy: u32) -> Self {
        Self::new(
            self.left.saturating_add(dx),
            self.top.saturating_add(dy),
            self.width,
            self.height,
        )
    }

    /// Intersect with `outer`, yielding a rectangle that is always inside it.
    pub fn clamp_to(&self, outer: &BoundingBox) -> Self {
        let left = self.left.clamp(outer.left, outer.right());
        let top = self.top.clamp(outer.top, outer.bottom());
        let right = self.right().clamp(left, outer.right());
        let bottom = self.bottom().clamp(top, outer.bottom());
        Self::new(left, top, right - left, bottom - top)
    }
}

/// One recognized word with its confidence and position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordEntry {
    pub text: String,
    /// Engine confidence in the range 0..=100, rounded to [`CONFIDENCE_DECIMALS`].
    pub confidence: f32,
    pub bbox: BoundingBox,
}

impl WordEntry {
    pub fn new(text: impl Into<String>, confidence: f32, bbox: BoundingBox) -> Self {
        Self {
            text: text.into(),
            confidence: normalize_confidence(confidence),
            bbox,
        }
    }

    /// Re-apply the confidence range and precision to an entry whose fields
    /// were set directly.
    pub fn normalized(self) -> Self {
        Self {
            confidence: normalize_confidence(self.confidence),
            ..self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_from_extension_is_case_insensitive() {
        assert_eq!(DocumentKind::from_extension("PDF"), Some(DocumentKind::Pdf));
        assert_eq!(DocumentKind::from_extension("Jpe"), Some(DocumentKind::Image));
        assert_eq!(DocumentKind::from_extension("tiff"), Some(DocumentKind::Image));
        assert_eq!(DocumentKind::from_extension("txt"), None);
    }

    #[test]
    fn stages_advance_to_aggregated() {
        let mut stage = DocumentStage::Unprocessed;
        let mut seen = vec![stage];
        while !stage.is_terminal() {
            stage = stage.next();
            seen.push(stage);
        }
        assert_eq!(
            seen,
            vec![
                DocumentStage::Unprocessed,
                DocumentStage::Rasterized,
                DocumentStage::Segmented,
                DocumentStage::Recognized,
                DocumentStage::Aggregated,
            ]
        );
        assert_eq!(DocumentStage::Aggregated.next(), DocumentStage::Aggregated);
    }

    #[test]
    fn contains_and_clamp() {
        let page = BoundingBox::full(100, 50);
        let inner = BoundingBox::new(10, 10, 20, 20);
        assert!(page.contains(&inner));
        assert!(!inner.contains(&page));

        let spill = BoundingBox::new(90, 40, 30, 30);
        let clamped = spill.clamp_to(&page);
        assert_eq!(clamped, BoundingBox::new(90, 40, 10, 10));
        assert!(page.contains(&clamped));

        let outside = BoundingBox::new(200, 200, 5, 5);
        let clamped = outside.clamp_to(&page);
        assert_eq!(clamped.area(), 0);
        assert!(page.contains(&clamped));
    }

    #[test]
    fn confidence_is_rounded_and_non_negative() {
        let word = WordEntry::new("total", 91.23456, BoundingBox::new(0, 0, 4, 4));
        assert_eq!(word.confidence, 91.23);
        let word = WordEntry::new("noise", -1.0, BoundingBox::new(0, 0, 4, 4));
        assert_eq!(word.confidence, 0.0);
    }

    #[test]
    fn direct_fields_are_normalized() {
        let bbox = BoundingBox::new(0, 0, 4, 4);
        for (raw, expected) in [(f32::NAN, 0.0), (-3.0, 0.0), (250.0, 100.0), (42.126, 42.13)] {
            let word = WordEntry {
                text: "w".to_string(),
                confidence: raw,
                bbox,
            };
            assert_eq!(word.normalized().confidence, expected, "raw {raw}");
        }
    }
}
