// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Region segmentation — split a page image into rectangles that are
// recognised independently, and validate them against the page.

use image::DynamicImage;
use lesewerk_core::BoundingBox;
use lesewerk_core::error::{LesewerkError, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A candidate region as proposed by a [`Segmenter`].
///
/// Coordinates are signed so that a misbehaving segmenter can express a
/// negative origin or size; [`cut_segments`] rejects those.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentRegion {
    pub left: i64,
    pub top: i64,
    pub width: i64,
    pub height: i64,
}

impl SegmentRegion {
    pub fn new(left: i64, top: i64, width: i64, height: i64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// The whole of a `width` x `height` page.
    pub fn full(width: u32, height: u32) -> Self {
        Self::new(0, 0, width as i64, height as i64)
    }

    /// Region spanning from `(left, top)` to the exclusive corner `(right, bottom)`.
    pub fn from_corners(left: i64, top: i64, right: i64, bottom: i64) -> Self {
        Self::new(left, top, right.saturating_sub(left), bottom.saturating_sub(top))
    }

    /// Check the region against a page and convert it to page coordinates.
    fn validate(
        &self,
        page_width: u32,
        page_height: u32,
    ) -> std::result::Result<BoundingBox, String> {
        if self.width <= 0 || self.height <= 0 {
            return Err(format!("size {}x{} is not positive", self.width, self.height));
        }
        let outside = || {
            format!(
                "origin ({}, {}) with size {}x{} exceeds page {}x{}",
                self.left, self.top, self.width, self.height, page_width, page_height
            )
        };
        let (Some(right), Some(bottom)) = (
            self.left.checked_add(self.width),
            self.top.checked_add(self.height),
        ) else {
            return Err(outside());
        };
        if self.left < 0
            || self.top < 0
            || right > i64::from(page_width)
            || bottom > i64::from(page_height)
        {
            return Err(outside());
        }
        let coord = |value: i64| u32::try_from(value).map_err(|_| outside());
        Ok(BoundingBox::new(
            coord(self.left)?,
            coord(self.top)?,
            coord(self.width)?,
            coord(self.height)?,
        ))
    }
}

/// Regions proposed for one page, in recognition order.
pub type Regions<'a> = Box<dyn Iterator<Item = SegmentRegion> + 'a>;

/// Produces the regions of a page to recognise independently.
///
/// Any `Fn(&DynamicImage) -> Vec<SegmentRegion>` closure is a segmenter.
pub trait Segmenter: Send + Sync {
    fn segment<'a>(&'a self, page: &'a DynamicImage) -> Regions<'a>;
}

impl<F> Segmenter for F
where
    F: Fn(&DynamicImage) -> Vec<SegmentRegion> + Send + Sync,
{
    fn segment<'a>(&'a self, page: &'a DynamicImage) -> Regions<'a> {
        Box::new(self(page).into_iter())
    }
}

/// One region covering the whole page.
#[derive(Debug, Clone, Copy, Default)]
pub struct WholePage;

impl Segmenter for WholePage {
    fn segment<'a>(&'a self, page: &'a DynamicImage) -> Regions<'a> {
        Box::new(std::iter::once(SegmentRegion::full(page.width(), page.height())))
    }
}

/// A fixed list of boxes applied to every page, e.g. the fields of a form.
#[derive(Debug, Clone, Default)]
pub struct FixedRegions {
    regions: Vec<SegmentRegion>,
}

impl FixedRegions {
    pub fn new(regions: Vec<SegmentRegion>) -> Self {
        Self { regions }
    }

    pub fn add(&mut self, region: SegmentRegion) {
        self.regions.push(region);
    }

    pub fn clear(&mut self) {
        self.regions.clear();
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}

impl Segmenter for FixedRegions {
    fn segment<'a>(&'a self, _page: &'a DynamicImage) -> Regions<'a> {
        Box::new(self.regions.iter().copied())
    }
}

/// Full-width bands between horizontal cut lines.
///
/// Cuts at `y = 0` or at/after the page bottom produce no empty bands.
#[derive(Debug, Clone, Default)]
pub struct HorizontalBands {
    cuts: Vec<u32>,
}

impl HorizontalBands {
    pub fn new(mut cuts: Vec<u32>) -> Self {
        cuts.retain(|&y| y > 0);
        cuts.sort_unstable();
        cuts.dedup();
        Self { cuts }
    }

    pub fn cuts(&self) -> &[u32] {
        &self.cuts
    }
}

impl Segmenter for HorizontalBands {
    fn segment<'a>(&'a self, page: &'a DynamicImage) -> Regions<'a> {
        let (width, height) = (page.width(), page.height());
        let inner = self.cuts.iter().copied().take_while(move |&y| y < height);
        let starts = std::iter::once(0).chain(inner.clone());
        let ends = inner.chain(std::iter::once(height));
        Box::new(starts.zip(ends).map(move |(top, bottom)| {
            SegmentRegion::from_corners(0, top as i64, width as i64, bottom as i64)
        }))
    }
}

/// A validated region of a page with its cropped pixels.
#[derive(Debug, Clone)]
pub struct Segment {
    /// Position within the page, in segmenter order.
    pub index: usize,
    /// Location in page coordinates.
    pub bbox: BoundingBox,
    pub image: DynamicImage,
}

/// Segment `page` and crop every region.
///
/// All regions are validated before any is cropped, so a page with one bad
/// region yields [`LesewerkError::SegmentBoundsError`] and no segments.
pub fn cut_segments(
    page: &DynamicImage,
    page_index: usize,
    segmenter: &dyn Segmenter,
) -> Result<Vec<Segment>> {
    let (width, height) = (page.width(), page.height());
    let boxes = segmenter
        .segment(page)
        .enumerate()
        .map(|(index, region)| {
            region
                .validate(width, height)
                .map_err(|detail| LesewerkError::SegmentBoundsError {
                    page: page_index,
                    segment: index,
                    detail,
                })
        })
        .collect::<Result<Vec<_>>>()?;

    debug!(page = page_index, segments = boxes.len(), "Page segmented");
    Ok(boxes
        .into_iter()
        .enumerate()
        .map(|(index, bbox)| Segment {
            index,
            bbox,
            image: page.crop_imm(bbox.left, bbox.top, bbox.width, bbox.height),
        })
        .collect())
}
