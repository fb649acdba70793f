// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Post-processing for word tables: confidence filtering and regrouping words
// into lines.

use lesewerk_core::{BoundingBox, WordEntry};

use crate::extract::result::WordRecord;

/// Drop words whose confidence is below `threshold`.
pub fn filter_low_confidence(records: Vec<WordRecord>, threshold: f32) -> Vec<WordRecord> {
    records
        .into_iter()
        .filter(|r| r.word.confidence >= threshold)
        .collect()
}

/// Merge words that sit on the same line into one record per line.
///
/// Two words share a line when they are on the same page and segment, their
/// boxes overlap vertically by at least half the shorter height, and the
/// horizontal gap between them is at most `max_gap` pixels. A merged record
/// spans the union of its words' boxes, joins their text with spaces in
/// left-to-right order, and averages their confidence. Lines come back in
/// page, then top, then left order.
pub fn words_to_lines(records: &[WordRecord], max_gap: u32) -> Vec<WordRecord> {
    let mut sorted: Vec<&WordRecord> = records.iter().collect();
    sorted.sort_by_key(|r| (r.page, r.segment, r.word.bbox.left, r.word.bbox.top));

    let mut lines: Vec<LineBuilder> = Vec::new();
    for record in sorted {
        let open = lines.iter_mut().find(|line| line.accepts(record, max_gap));
        match open {
            Some(line) => line.push(record),
            None => lines.push(LineBuilder::start(record)),
        }
    }

    let mut merged: Vec<WordRecord> = lines.into_iter().map(LineBuilder::finish).collect();
    merged.sort_by_key(|r| (r.page, r.word.bbox.top, r.word.bbox.left));
    merged
}

struct LineBuilder {
    page: usize,
    segment: usize,
    bbox: BoundingBox,
    texts: Vec<String>,
    confidence_sum: f32,
}

impl LineBuilder {
    fn start(record: &WordRecord) -> Self {
        Self {
            page: record.page,
            segment: record.segment,
            bbox: record.word.bbox,
            texts: vec![record.word.text.clone()],
            confidence_sum: record.word.confidence,
        }
    }

    fn accepts(&self, record: &WordRecord, max_gap: u32) -> bool {
        if record.page != self.page || record.segment != self.segment {
            return false;
        }
        let word = record.word.bbox;
        let overlap =
            self.bbox.bottom().min(word.bottom()) as i64 - self.bbox.top.max(word.top) as i64;
        let shorter = self.bbox.height.min(word.height) as i64;
        let gap = word.left as i64 - self.bbox.right() as i64;
        overlap > 0 && overlap * 2 >= shorter && gap <= max_gap as i64
    }

    fn push(&mut self, record: &WordRecord) {
        let (a, b) = (self.bbox, record.word.bbox);
        let left = a.left.min(b.left);
        let top = a.top.min(b.top);
        let right = a.right().max(b.right());
        let bottom = a.bottom().max(b.bottom());
        self.bbox = BoundingBox::new(left, top, right - left, bottom - top);
        self.texts.push(record.word.text.clone());
        self.confidence_sum += record.word.confidence;
    }

    fn finish(self) -> WordRecord {
        let count = self.texts.len() as f32;
        WordRecord {
            page: self.page,
            segment: self.segment,
            word: WordEntry::new(self.texts.join(" "), self.confidence_sum / count, self.bbox),
        }
    }
}
