// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Preprocessing contract — a pure image-to-image cleanup step applied to every
// segment before recognition — and the built-in default cleaner.

use image::DynamicImage;
use tracing::instrument;

use crate::scan::enhance::ScanEnhancer;

/// A cleanup step run on each segment before it is handed to the OCR engine.
///
/// Implementations must be pure: the same input yields the same output, and the
/// result is still a valid 2-D image. Any `Fn(DynamicImage) -> DynamicImage`
/// closure satisfies the contract.
pub trait Preprocessor: Send + Sync {
    fn clean(&self, image: DynamicImage) -> DynamicImage;
}

impl<F> Preprocessor for F
where
    F: Fn(DynamicImage) -> DynamicImage + Send + Sync,
{
    fn clean(&self, image: DynamicImage) -> DynamicImage {
        self(image)
    }
}

/// Leaves pixels untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl Preprocessor for Identity {
    fn clean(&self, image: DynamicImage) -> DynamicImage {
        image
    }
}

/// Binarization strategy used by [`DefaultCleaner`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Threshold {
    /// Local mean over a `(2 * block_radius + 1)` square, minus `offset`.
    Adaptive { block_radius: u32, offset: i32 },
    /// One global threshold picked from the histogram.
    Otsu,
}

/// Grayscale, deskew, boost contrast, denoise, then threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DefaultCleaner {
    pub deskew: bool,
    /// Contrast factor around mid-gray; `1.0` leaves contrast alone.
    pub contrast: f32,
    /// Gaussian sigma for denoising; `0.0` disables it.
    pub denoise_sigma: f32,
    pub threshold: Threshold,
}

impl Default for DefaultCleaner {
    fn default() -> Self {
        Self {
            deskew: true,
            contrast: 1.0,
            denoise_sigma: 1.0,
            threshold: Threshold::Adaptive {
                block_radius: 5,
                offset: 2,
            },
        }
    }
}

impl Preprocessor for DefaultCleaner {
    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    fn clean(&self, image: DynamicImage) -> DynamicImage {
        let mut enhancer = ScanEnhancer::from_dynamic(DynamicImage::ImageLuma8(image.to_luma8()));
        if self.deskew {
            enhancer = enhancer.deskew();
        }
        if (self.contrast - 1.0).abs() > f32::EPSILON {
            enhancer = enhancer.boost_contrast(self.contrast);
        }
        enhancer = enhancer.denoise(self.denoise_sigma);
        let enhancer = match self.threshold {
            Threshold::Adaptive {
                block_radius,
                offset,
            } => enhancer.binarize(block_radius, offset),
            Threshold::Otsu => enhancer.binarize_otsu(),
        };
        enhancer.into_dynamic()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgb, RgbImage};

    #[test]
    fn closures_are_preprocessors() {
        let invert = |img: DynamicImage| {
            let mut img = img;
            img.invert();
            img
        };
        let src = DynamicImage::ImageLuma8(GrayImage::from_pixel(2, 2, Luma([10u8])));
        let out = invert.clean(src).to_luma8();
        assert_eq!(out.get_pixel(0, 0).0[0], 245);
    }

    #[test]
    fn identity_returns_input() {
        let src = DynamicImage::ImageRgb8(RgbImage::from_pixel(3, 3, Rgb([1, 2, 3])));
        assert_eq!(Identity.clean(src.clone()), src);
    }

    #[test]
    fn default_cleaner_outputs_binary_grayscale() {
        let src = DynamicImage::ImageRgb8(RgbImage::from_fn(40, 20, |x, _| {
            if (10..14).contains(&x) { Rgb([20, 20, 20]) } else { Rgb([230, 225, 220]) }
        }));
        let out = DefaultCleaner::default().clean(src);
        assert!(matches!(out, DynamicImage::ImageLuma8(_)));
        assert_eq!((out.width(), out.height()), (40, 20));
        assert!(out.to_luma8().pixels().all(|p| p.0[0] == 0 || p.0[0] == 255));
    }

    #[test]
    fn otsu_variant_is_selectable() {
        let cleaner = DefaultCleaner {
            deskew: false,
            contrast: 1.0,
            denoise_sigma: 0.0,
            threshold: Threshold::Otsu,
        };
        let src = DynamicImage::ImageLuma8(GrayImage::from_fn(8, 2, |x, _| {
            if x < 4 { Luma([30u8]) } else { Luma([200u8]) }
        }));
        let out = cleaner.clean(src).to_luma8();
        assert_eq!(out.get_pixel(0, 0).0[0], 0);
        assert_eq!(out.get_pixel(7, 0).0[0], 255);
    }

    #[test]
    fn contrast_boost_recovers_faint_marks() {
        // A mark three levels darker than the paper around it.
        let src = DynamicImage::ImageLuma8(GrayImage::from_fn(9, 9, |x, y| {
            if (x, y) == (4, 4) { Luma([97u8]) } else { Luma([100u8]) }
        }));
        let cleaner = |contrast| DefaultCleaner {
            deskew: false,
            contrast,
            denoise_sigma: 0.0,
            threshold: Threshold::Adaptive {
                block_radius: 4,
                offset: 4,
            },
        };
        let flat = cleaner(1.0).clean(src.clone()).to_luma8();
        assert_eq!(flat.get_pixel(4, 4).0[0], 255);
        let boosted = cleaner(4.0).clean(src).to_luma8();
        assert_eq!(boosted.get_pixel(4, 4).0[0], 0);
        assert_eq!(boosted.get_pixel(0, 0).0[0], 255);
    }
}
