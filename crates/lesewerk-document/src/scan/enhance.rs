// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scan enhancement — binarization, denoising, contrast boosting, and skew
// correction for scanned document images before they reach the OCR engine.

use image::{DynamicImage, GrayImage, Luma};
use imageproc::edges::canny;
use imageproc::filter::gaussian_blur_f32;
use imageproc::hough::{LineDetectionOptions, PolarLine, detect_lines};
use tracing::{debug, info, instrument};

use crate::image::processor::ImageProcessor;

/// Largest skew (degrees, either direction) that deskewing will correct.
pub const MAX_SKEW_DEGREES: f32 = 15.0;

/// Skews smaller than this are left alone.
const MIN_SKEW_DEGREES: f32 = 0.5;

/// Enhances scanned document images for recognition.
///
/// Provides the operations commonly needed before OCR: grayscale conversion,
/// denoising, contrast enhancement, deskewing, and adaptive or global
/// binarization.
pub struct ScanEnhancer {
    /// The working image (kept as `DynamicImage` for flexibility).
    image: DynamicImage,
}

impl ScanEnhancer {
    pub fn from_dynamic(image: DynamicImage) -> Self {
        Self { image }
    }

    pub fn into_dynamic(self) -> DynamicImage {
        self.image
    }

    // -- Binarization ---------------------------------------------------------

    /// Apply adaptive thresholding to produce a black-and-white image.
    ///
    /// Uses a local mean approach: for each pixel, the threshold is the mean
    /// intensity within a `block_radius` neighbourhood, minus a constant `c`.
    /// Pixels darker than the local threshold become black; others become white.
    #[instrument(skip(self), fields(block_radius, c))]
    pub fn binarize(self, block_radius: u32, c: i32) -> Self {
        let gray = self.image.to_luma8();
        let (width, height) = gray.dimensions();

        // Compute the integral image for fast local mean calculation.
        let integral = compute_integral_image(&gray);

        let mut output = GrayImage::new(width, height);

        for y in 0..height {
            for x in 0..width {
                let local_mean = region_mean(&integral, width, height, x, y, block_radius);
                let threshold = (local_mean as i32 - c).clamp(0, 255) as u8;
                let pixel_val = gray.get_pixel(x, y).0[0];
                let binary = if pixel_val < threshold { 0u8 } else { 255u8 };
                output.put_pixel(x, y, Luma([binary]));
            }
        }

        debug!("Adaptive binarization complete");
        Self {
            image: DynamicImage::ImageLuma8(output),
        }
    }

    /// Global binarization with the threshold chosen by Otsu's method.
    #[instrument(skip(self))]
    pub fn binarize_otsu(self) -> Self {
        let gray = self.image.to_luma8();
        let threshold = otsu_threshold(&gray);
        debug!(threshold, "Otsu threshold computed");

        let (width, height) = gray.dimensions();
        let mut output = GrayImage::new(width, height);

        for y in 0..height {
            for x in 0..width {
                let val = gray.get_pixel(x, y).0[0];
                let binary = if val < threshold { 0u8 } else { 255u8 };
                output.put_pixel(x, y, Luma([binary]));
            }
        }

        Self {
            image: DynamicImage::ImageLuma8(output),
        }
    }

    // -- Cleanup --------------------------------------------------------------

    /// Gaussian smoothing on the grayscale image to suppress scanner noise.
    pub fn denoise(self, sigma: f32) -> Self {
        if sigma <= 0.0 {
            return self;
        }
        let gray = self.image.to_luma8();
        Self {
            image: DynamicImage::ImageLuma8(gaussian_blur_f32(&gray, sigma)),
        }
    }

    /// Grayscale conversion followed by a contrast boost.
    pub fn boost_contrast(self, factor: f32) -> Self {
        let image = ImageProcessor::from_dynamic(self.image)
            .adjust_contrast(factor)
            .grayscale()
            .into_dynamic();
        Self { image }
    }

    // -- Skew correction ------------------------------------------------------

    /// Estimate how far text lines are rotated from horizontal, in degrees.
    ///
    /// Positive values mean lines descend to the right (a clockwise skew).
    /// Returns `None` when no dominant near-horizontal lines are found or the
    /// skew is too small to matter.
    ///
    /// ## Pipeline
    ///
    /// 1. Gaussian blur (sigma 1.5) and Canny edge detection
    /// 2. Hough line detection with a vote threshold proportional to width
    /// 3. Keep lines within [`MAX_SKEW_DEGREES`] of horizontal
    /// 4. Take the median deviation
    #[instrument(skip(self))]
    pub fn estimate_skew(&self) -> Option<f32> {
        let gray = self.image.to_luma8();
        let (width, height) = gray.dimensions();
        if width < 16 || height < 16 {
            return None;
        }

        let blurred = gaussian_blur_f32(&gray, 1.5);
        let edges = canny(&blurred, 50.0, 150.0);

        let vote_threshold = ((width as f64) * 0.3).max(40.0) as u32;
        let options = LineDetectionOptions {
            vote_threshold,
            suppression_radius: 8,
        };
        let lines = detect_lines(&edges, options);

        let mut deviations = near_horizontal_deviations(&lines);
        debug!(
            line_count = lines.len(),
            candidates = deviations.len(),
            vote_threshold,
            "Hough lines detected"
        );
        if deviations.is_empty() {
            return None;
        }

        deviations.sort_by(|a, b| a.total_cmp(b));
        let median = deviations[deviations.len() / 2];
        if median.abs() < MIN_SKEW_DEGREES {
            return None;
        }
        Some(median)
    }

    /// Rotate the image so dominant text lines become horizontal.
    ///
    /// The canvas size is preserved; uncovered corners are filled white. When
    /// no skew can be estimated the image is returned unchanged.
    #[instrument(skip(self))]
    pub fn deskew(self) -> Self {
        match self.estimate_skew() {
            Some(skew) => {
                info!(skew, "Correcting skew");
                let image = ImageProcessor::from_dynamic(self.image)
                    .rotate(-skew)
                    .into_dynamic();
                Self { image }
            }
            None => self,
        }
    }
}

// -- Integral image helpers ---------------------------------------------------

/// Compute the integral (summed-area table) of a grayscale image.
///
/// `integral[y * (width+1) + x]` contains the sum of all pixel values in the
/// rectangle [0, 0) to (x, y) (exclusive on both axes). The table has
/// dimensions `(width+1) x (height+1)` with a zero-padded border.
fn compute_integral_image(gray: &GrayImage) -> Vec<u64> {
    let (w, h) = gray.dimensions();
    let stride = (w + 1) as usize;
    let mut table = vec![0u64; stride * (h + 1) as usize];

    for y in 0..h {
        let mut row_sum: u64 = 0;
        for x in 0..w {
            row_sum += gray.get_pixel(x, y).0[0] as u64;
            let idx = (y + 1) as usize * stride + (x + 1) as usize;
            let above = y as usize * stride + (x + 1) as usize;
            table[idx] = row_sum + table[above];
        }
    }

    table
}

/// Mean pixel value within a square region centred on (cx, cy) with the
/// given radius, using the precomputed integral image.
fn region_mean(
    integral: &[u64],
    img_width: u32,
    img_height: u32,
    cx: u32,
    cy: u32,
    radius: u32,
) -> f64 {
    let stride = (img_width + 1) as usize;

    let x1 = cx.saturating_sub(radius) as usize;
    let y1 = cy.saturating_sub(radius) as usize;
    let x2 = ((cx + radius + 1) as usize).min(img_width as usize);
    let y2 = ((cy + radius + 1) as usize).min(img_height as usize);

    let area = ((x2 - x1) * (y2 - y1)) as f64;
    if area == 0.0 {
        return 128.0;
    }

    // S = I[y2][x2] - I[y1][x2] - I[y2][x1] + I[y1][x1]
    let sum = integral[y2 * stride + x2] as f64
        - integral[y1 * stride + x2] as f64
        - integral[y2 * stride + x1] as f64
        + integral[y1 * stride + x1] as f64;

    sum / area
}

/// Compute the Otsu threshold for a grayscale image.
///
/// Finds the threshold value that maximises the between-class variance of the
/// black and white pixel groups.
fn otsu_threshold(gray: &GrayImage) -> u8 {
    let mut histogram = [0u64; 256];
    for pixel in gray.pixels() {
        histogram[pixel.0[0] as usize] += 1;
    }

    let total_pixels = gray.width() as u64 * gray.height() as u64;
    if total_pixels == 0 {
        return 128;
    }

    let mut sum_total: f64 = 0.0;
    for (i, &count) in histogram.iter().enumerate() {
        sum_total += i as f64 * count as f64;
    }

    let mut sum_background: f64 = 0.0;
    let mut weight_background: u64 = 0;
    let mut max_variance: f64 = 0.0;
    let mut best_threshold: u8 = 0;

    for (t, &count) in histogram.iter().enumerate() {
        weight_background += count;
        if weight_background == 0 {
            continue;
        }
        let weight_foreground = total_pixels - weight_background;
        if weight_foreground == 0 {
            break;
        }

        sum_background += t as f64 * count as f64;
        let mean_background = sum_background / weight_background as f64;
        let mean_foreground = (sum_total - sum_background) / weight_foreground as f64;

        let between_variance = weight_background as f64
            * weight_foreground as f64
            * (mean_background - mean_foreground).powi(2);

        if between_variance > max_variance {
            max_variance = between_variance;
            best_threshold = t as u8;
        }
    }

    // Pixels strictly below the threshold turn black, so the cut sits one
    // above the last background level.
    best_threshold.saturating_add(1)
}

// -- Skew helpers -------------------------------------------------------------

/// Deviation from horizontal, in degrees, of every Hough line close enough to
/// horizontal to be a text baseline.
///
/// A `PolarLine` satisfies `x * cos(theta) + y * sin(theta) = r`, so a
/// horizontal line has `theta = 90`. A line at `90 + d` descends to the right
/// by `d` degrees in image coordinates.
fn near_horizontal_deviations(lines: &[PolarLine]) -> Vec<f32> {
    lines
        .iter()
        .map(|line| line.angle_in_degrees as f32 - 90.0)
        .filter(|deviation| deviation.abs() <= MAX_SKEW_DEGREES)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_tone(width: u32, height: u32, split_x: u32) -> DynamicImage {
        let img = GrayImage::from_fn(width, height, |x, _| {
            if x < split_x { Luma([40u8]) } else { Luma([210u8]) }
        });
        DynamicImage::ImageLuma8(img)
    }

    #[test]
    fn otsu_separates_two_tones() {
        let out = ScanEnhancer::from_dynamic(two_tone(20, 4, 10))
            .binarize_otsu()
            .into_dynamic()
            .to_luma8();
        assert_eq!(out.get_pixel(0, 0).0[0], 0);
        assert_eq!(out.get_pixel(19, 0).0[0], 255);
    }

    #[test]
    fn adaptive_binarize_keeps_uniform_page_white() {
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(30, 30, Luma([180u8])));
        let out = ScanEnhancer::from_dynamic(img).binarize(5, 2).into_dynamic().to_luma8();
        assert!(out.pixels().all(|p| p.0[0] == 255));
    }

    #[test]
    fn adaptive_binarize_marks_dark_stroke_black() {
        let mut gray = GrayImage::from_pixel(30, 30, Luma([220u8]));
        for x in 5..25 {
            gray.put_pixel(x, 15, Luma([20u8]));
        }
        let out = ScanEnhancer::from_dynamic(DynamicImage::ImageLuma8(gray))
            .binarize(5, 2)
            .into_dynamic()
            .to_luma8();
        assert_eq!(out.get_pixel(15, 15).0[0], 0);
        assert_eq!(out.get_pixel(15, 2).0[0], 255);
    }

    #[test]
    fn blank_page_has_no_skew() {
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(200, 120, Luma([250u8])));
        let enhancer = ScanEnhancer::from_dynamic(img);
        assert_eq!(enhancer.estimate_skew(), None);

        let out = enhancer.deskew().into_dynamic();
        assert_eq!((out.width(), out.height()), (200, 120));
    }

    #[test]
    fn tiny_images_are_not_deskewed() {
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(8, 8, Luma([0u8])));
        assert_eq!(ScanEnhancer::from_dynamic(img).estimate_skew(), None);
    }

    #[test]
    fn deviations_keep_only_near_horizontal_lines() {
        let lines = vec![
            PolarLine { r: 10.0, angle_in_degrees: 90 },
            PolarLine { r: 20.0, angle_in_degrees: 93 },
            PolarLine { r: 30.0, angle_in_degrees: 86 },
            PolarLine { r: 40.0, angle_in_degrees: 0 },
            PolarLine { r: 50.0, angle_in_degrees: 45 },
        ];
        let deviations = near_horizontal_deviations(&lines);
        assert_eq!(deviations, vec![0.0, 3.0, -4.0]);
    }

    #[test]
    fn denoise_with_zero_sigma_is_identity() {
        let img = two_tone(10, 10, 5);
        let out = ScanEnhancer::from_dynamic(img.clone()).denoise(0.0).into_dynamic();
        assert_eq!(out, img);
    }
}
