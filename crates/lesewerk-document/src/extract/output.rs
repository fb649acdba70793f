// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Output side of extraction: file naming, the word table format, atomic file
// writes, and the console banner.

use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};

use lesewerk_core::error::{LesewerkError, Result};
use lesewerk_core::{BoundingBox, WordEntry};
use thiserror::Error;
use tracing::debug;

use crate::extract::result::WordRecord;
use crate::scan::engine::RecognitionMode;

/// Header line of the word table.
pub const WORD_TABLE_HEADER: &str = "page\tsegment\tleft\ttop\twidth\theight\tconf\ttext";

const BANNER_WIDTH: usize = 50;

/// File extension used for each recognition mode.
pub fn output_extension(mode: RecognitionMode) -> &'static str {
    match mode {
        RecognitionMode::Text => "txt",
        RecognitionMode::Words => "tsv",
    }
}

/// Hands out unique output file names within one batch.
///
/// Inputs are named `<stem>.<ext>`. A later input whose stem is already taken
/// uses its full file name (`form1.png.txt`), then a numbered stem.
#[derive(Debug, Default)]
pub struct OutputNamer {
    used: HashSet<String>,
}

impl OutputNamer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name_for(&mut self, input: &Path, mode: RecognitionMode) -> String {
        let ext = output_extension(mode);
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "output".to_string());
        let file_name = input
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| stem.clone());

        let mut candidates = [format!("{stem}.{ext}"), format!("{file_name}.{ext}")]
            .into_iter()
            .chain((2..).map(|n| format!("{stem}-{n}.{ext}")));
        // The numbered tail is unbounded, so a free name always exists.
        let name = candidates
            .find(|name| !self.used.contains(name))
            .unwrap_or_default();
        self.used.insert(name.clone());
        name
    }
}

/// Write `contents` to `dir/name` through a temporary file in the same
/// directory, so readers never observe a partial file.
pub fn write_output(dir: &Path, name: &str, contents: &str) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let target = dir.join(name);
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(contents.as_bytes())?;
    tmp.flush()?;
    tmp.persist(&target).map_err(|err| LesewerkError::Io(err.error))?;
    debug!(path = %target.display(), bytes = contents.len(), "Output written");
    Ok(target)
}

/// Print one result between `#` banners.
pub fn print_banner(out: &mut dyn Write, source: &Path, body: &str) -> std::io::Result<()> {
    let rule = "#".repeat(BANNER_WIDTH);
    writeln!(out)?;
    writeln!(out, "{rule}")?;
    writeln!(out, "Extracted text from {}", source.display())?;
    writeln!(out, "{rule}")?;
    writeln!(out, "{body}")?;
    writeln!(out, "{rule}")?;
    writeln!(out, "End of extracted text.")?;
    writeln!(out, "{rule}")?;
    writeln!(out)
}

/// Render word records as a tab-separated table.
///
/// Page and segment numbers are one-based in the file. Tabs and line breaks
/// inside a word become spaces.
pub fn render_word_table(records: &[WordRecord]) -> String {
    let mut out = String::with_capacity(WORD_TABLE_HEADER.len() + records.len() * 32);
    out.push_str(WORD_TABLE_HEADER);
    out.push('\n');
    for record in records {
        let bbox = record.word.bbox;
        let text: String = record
            .word
            .text
            .chars()
            .map(|c| if matches!(c, '\t' | '\n' | '\r') { ' ' } else { c })
            .collect();
        out.push_str(&format!(
            "{}\t{}\t{}\t{}\t{}\t{}\t{:.2}\t{}\n",
            record.page + 1,
            record.segment + 1,
            bbox.left,
            bbox.top,
            bbox.width,
            bbox.height,
            record.word.confidence,
            text
        ));
    }
    out
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WordTableError {
    #[error("missing or unexpected header line")]
    BadHeader,
    #[error("line {line}: {detail}")]
    BadRow { line: usize, detail: String },
}

/// Parse a table produced by [`render_word_table`].
pub fn parse_word_table(input: &str) -> std::result::Result<Vec<WordRecord>, WordTableError> {
    let mut lines = input.lines();
    if lines.next() != Some(WORD_TABLE_HEADER) {
        return Err(WordTableError::BadHeader);
    }

    let mut records = Vec::new();
    for (offset, row) in lines.enumerate() {
        let line = offset + 2;
        if row.is_empty() {
            continue;
        }
        let fields: Vec<&str> = row.splitn(8, '\t').collect();
        if fields.len() != 8 {
            return Err(WordTableError::BadRow {
                line,
                detail: format!("expected 8 columns, found {}", fields.len()),
            });
        }
        let bad = |name: &str, value: &str| WordTableError::BadRow {
            line,
            detail: format!("invalid {name}: {value:?}"),
        };
        let int = |index: usize, name: &str| -> std::result::Result<u32, WordTableError> {
            fields[index].parse::<u32>().map_err(|_| bad(name, fields[index]))
        };
        let page = int(0, "page")?.checked_sub(1).ok_or_else(|| bad("page", fields[0]))?;
        let segment = int(1, "segment")?
            .checked_sub(1)
            .ok_or_else(|| bad("segment", fields[1]))?;
        let bbox = BoundingBox::new(
            int(2, "left")?,
            int(3, "top")?,
            int(4, "width")?,
            int(5, "height")?,
        );
        let confidence = fields[6].parse::<f32>().map_err(|_| bad("conf", fields[6]))?;
        records.push(WordRecord {
            page: page as usize,
            segment: segment as usize,
            word: WordEntry::new(fields[7], confidence, bbox),
        });
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn colliding_stems_fall_back_to_file_name() {
        let mut namer = OutputNamer::new();
        assert_eq!(namer.name_for(Path::new("a/form1.jpg"), RecognitionMode::Text), "form1.txt");
        assert_eq!(
            namer.name_for(Path::new("a/form1.png"), RecognitionMode::Text),
            "form1.png.txt"
        );
        assert_eq!(namer.name_for(Path::new("b/form1.png"), RecognitionMode::Text), "form1-2.txt");
        assert_eq!(namer.name_for(Path::new("scan.pdf"), RecognitionMode::Words), "scan.tsv");
    }

    #[test]
    fn word_table_parses_back() {
        let records = vec![
            WordRecord {
                page: 0,
                segment: 0,
                word: WordEntry::new("Invoice", 96.456, BoundingBox::new(10, 12, 80, 20)),
            },
            WordRecord {
                page: 1,
                segment: 2,
                word: WordEntry::new("tab\there", 40.0, BoundingBox::new(0, 0, 5, 5)),
            },
        ];
        let table = render_word_table(&records);
        assert!(table.starts_with(WORD_TABLE_HEADER));
        assert!(table.contains("1\t1\t10\t12\t80\t20\t96.46\tInvoice\n"));

        let parsed = parse_word_table(&table).unwrap();
        assert_eq!(parsed[0], records[0]);
        assert_eq!(parsed[1].word.text, "tab here");
        assert_eq!((parsed[1].page, parsed[1].segment), (1, 2));
    }

    #[test]
    fn word_table_rejects_bad_rows() {
        assert_eq!(parse_word_table("nope"), Err(WordTableError::BadHeader));
        let table = format!("{WORD_TABLE_HEADER}\n1\t1\t0\t0\t5\n");
        assert!(matches!(
            parse_word_table(&table),
            Err(WordTableError::BadRow { line: 2, .. })
        ));
        let zero_page = format!("{WORD_TABLE_HEADER}\n0\t1\t0\t0\t5\t5\t1.00\tx\n");
        assert!(parse_word_table(&zero_page).is_err());
    }

    #[test]
    fn write_output_replaces_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested");
        let path = write_output(&out, "a.txt", "first").unwrap();
        write_output(&out, "a.txt", "second").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "second");
        assert_eq!(std::fs::read_dir(&out).unwrap().count(), 1);
    }

    #[test]
    fn banner_wraps_body() {
        let mut buf = Vec::new();
        print_banner(&mut buf, Path::new("form1.jpg"), "hello").unwrap();
        let printed = String::from_utf8(buf).unwrap();
        assert!(printed.contains("Extracted text from form1.jpg\n"));
        assert!(printed.contains("hello\n"));
        assert!(printed.contains("End of extracted text."));
        assert_eq!(printed.matches(&"#".repeat(50)).count(), 4);
    }
}
