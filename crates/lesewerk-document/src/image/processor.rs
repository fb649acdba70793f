// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image processor — load, rotate, grayscale, contrast adjustment, and save.
// Operates on in-memory images using the `image` and `imageproc` crates.

use std::path::Path;

use image::{DynamicImage, Rgba, RgbaImage};
use imageproc::geometric_transformations::{self, Interpolation};
use lesewerk_core::error::LesewerkError;
use tracing::{debug, info, instrument};

/// Fill colour for pixels uncovered by a rotation: opaque paper white.
const PAPER_WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Image processing pipeline operating on a single in-memory image.
///
/// Each method consumes `self` and returns a new `ImageProcessor` wrapping the
/// transformed image, enabling method chaining.
///
/// ```ignore
/// let cleaned = ImageProcessor::open("form.jpg")?
///     .grayscale()
///     .adjust_contrast(1.4)
///     .rotate(-2.5)
///     .into_dynamic();
/// ```
pub struct ImageProcessor {
    /// The current working image.
    image: DynamicImage,
}

impl ImageProcessor {
    // -- Construction ---------------------------------------------------------

    /// Load an image from a file path.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LesewerkError> {
        let img = image::open(path.as_ref()).map_err(|err| {
            LesewerkError::ImageError(format!(
                "failed to open {}: {}",
                path.as_ref().display(),
                err
            ))
        })?;
        info!(width = img.width(), height = img.height(), "Image loaded");
        Ok(Self { image: img })
    }

    /// Wrap an already-decoded `DynamicImage`.
    pub fn from_dynamic(image: DynamicImage) -> Self {
        Self { image }
    }

    // -- Accessors ------------------------------------------------------------

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn into_dynamic(self) -> DynamicImage {
        self.image
    }

    // -- Transformations (consume self, return new Self) -----------------------

    /// Rotate the image by an arbitrary angle in degrees (clockwise).
    ///
    /// Multiples of 90 use lossless rotation. Other angles rotate about the
    /// centre with bilinear interpolation, keeping the original canvas size and
    /// filling uncovered corners with white so they read as blank paper.
    #[instrument(skip(self), fields(degrees))]
    pub fn rotate(self, degrees: f32) -> Self {
        let normalised = degrees.rem_euclid(360.0);
        if normalised.abs() < 0.01 || (normalised - 360.0).abs() < 0.01 {
            return self;
        }
        if (normalised - 90.0).abs() < 0.01 {
            return Self {
                image: self.image.rotate90(),
            };
        }
        if (normalised - 180.0).abs() < 0.01 {
            return Self {
                image: self.image.rotate180(),
            };
        }
        if (normalised - 270.0).abs() < 0.01 {
            return Self {
                image: self.image.rotate270(),
            };
        }

        debug!(degrees, "Rotating image about centre");
        let rgba = self.image.to_rgba8();
        let rotated: RgbaImage = geometric_transformations::rotate_about_center(
            &rgba,
            degrees.to_radians(),
            Interpolation::Bilinear,
            PAPER_WHITE,
        );
        Self {
            image: DynamicImage::ImageRgba8(rotated),
        }
    }

    /// Convert the image to 8-bit grayscale.
    pub fn grayscale(self) -> Self {
        Self {
            image: DynamicImage::ImageLuma8(self.image.to_luma8()),
        }
    }

    /// Adjust contrast by a factor. Values > 1.0 increase contrast; values
    /// < 1.0 decrease it. A value of 1.0 is a no-op.
    #[instrument(skip(self), fields(factor))]
    pub fn adjust_contrast(self, factor: f32) -> Self {
        let rgba = self.image.to_rgba8();

        let contrasted = image::ImageBuffer::from_fn(rgba.width(), rgba.height(), |x, y| {
            let Rgba([r, g, b, a]) = *rgba.get_pixel(x, y);
            let adjust = |channel: u8| -> u8 {
                let val = factor * (channel as f32 - 128.0) + 128.0;
                val.clamp(0.0, 255.0) as u8
            };
            Rgba([adjust(r), adjust(g), adjust(b), a])
        });

        Self {
            image: DynamicImage::ImageRgba8(contrasted),
        }
    }

    // -- Output ---------------------------------------------------------------

    /// Write the image to a file. The format is inferred from the file extension.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), LesewerkError> {
        self.image.save(path.as_ref()).map_err(|err| {
            LesewerkError::ImageError(format!(
                "failed to save image to {}: {}",
                path.as_ref().display(),
                err
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    #[test]
    fn quarter_turn_swaps_dimensions() {
        let img = DynamicImage::ImageLuma8(GrayImage::new(40, 10));
        let rotated = ImageProcessor::from_dynamic(img).rotate(90.0);
        assert_eq!((rotated.width(), rotated.height()), (10, 40));
    }

    #[test]
    fn small_rotation_keeps_canvas_and_fills_white() {
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(60, 30, Luma([0u8])));
        let rotated = ImageProcessor::from_dynamic(img).rotate(10.0).into_dynamic();
        assert_eq!((rotated.width(), rotated.height()), (60, 30));
        // The corner falls outside the rotated source and reads as paper.
        let corner = rotated.to_rgba8().get_pixel(0, 0).0;
        assert_eq!(corner, [255, 255, 255, 255]);
    }

    #[test]
    fn zero_rotation_is_identity() {
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(8, 8, Luma([77u8])));
        let out = ImageProcessor::from_dynamic(img.clone()).rotate(360.0).into_dynamic();
        assert_eq!(out, img);
    }

    #[test]
    fn contrast_pushes_values_apart() {
        let mut gray = GrayImage::from_pixel(2, 1, Luma([100u8]));
        gray.put_pixel(1, 0, Luma([160u8]));
        let out = ImageProcessor::from_dynamic(DynamicImage::ImageLuma8(gray))
            .adjust_contrast(2.0)
            .grayscale()
            .into_dynamic()
            .to_luma8();
        assert!(out.get_pixel(0, 0).0[0] < 100);
        assert!(out.get_pixel(1, 0).0[0] > 160);
    }
}
