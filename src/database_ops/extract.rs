//! Sequential reader over IMDb-style tab-separated extracts.
//!
//! An extract is consumed once, front to back, through a single reused `ByteRecord`; nothing is
//! materialized. Reading it again means opening it again.
use anyhow::{anyhow, Context, Result};
use csv::{ByteRecord, ReaderBuilder};
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

const READ_BUFFER: usize = 8 << 20;

pub struct TsvExtract<R: Read> {
    label: String,
    reader: csv::Reader<R>,
    record: ByteRecord,
    rows_read: u64,
}

impl TsvExtract<Box<dyn Read>> {
    /// Open an extract from disk; `.gz` files are decompressed on the fly.
    pub fn open(path: &Path) -> Result<Self> {
        let file =
            File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
        let gz = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("gz"));
        let inner: Box<dyn Read> = if gz {
            Box::new(BufReader::with_capacity(READ_BUFFER, GzDecoder::new(file)))
        } else {
            Box::new(BufReader::with_capacity(READ_BUFFER, file))
        };
        Ok(Self::from_reader(path.display().to_string(), inner))
    }
}

impl<R: Read> TsvExtract<R> {
    pub fn from_reader(label: impl Into<String>, reader: R) -> Self {
        // IMDb dumps never quote fields and names may contain bare `"`.
        let reader = ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(true)
            .quoting(false)
            .flexible(false)
            .from_reader(reader);
        Self {
            label: label.into(),
            reader,
            record: ByteRecord::new(),
            rows_read: 0,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Index of a header column; a missing column means the wrong file was supplied.
    pub fn column(&mut self, name: &str) -> Result<usize> {
        let headers = self
            .reader
            .byte_headers()
            .with_context(|| format!("{}: reading header row", self.label))?;
        headers
            .iter()
            .position(|h| h == name.as_bytes())
            .ok_or_else(|| anyhow!("{}: column {name:?} missing from header", self.label))
    }

    /// Advance to the next data row. `None` once the extract is exhausted.
    pub fn next_record(&mut self) -> Result<Option<&ByteRecord>> {
        let more = self
            .reader
            .read_byte_record(&mut self.record)
            .with_context(|| format!("{}: malformed record", self.label))?;
        if !more {
            return Ok(None);
        }
        self.rows_read += 1;
        Ok(Some(&self.record))
    }

    pub fn rows_read(&self) -> u64 {
        self.rows_read
    }
}

/// Decode one field as UTF-8, naming the line on failure.
pub fn text_field<'r>(record: &'r ByteRecord, idx: usize, label: &str) -> Result<&'r str> {
    let raw = record.get(idx).unwrap_or_default();
    std::str::from_utf8(raw).map_err(|e| {
        let line = record.position().map(|p| p.line()).unwrap_or_default();
        anyhow!("{label}: line {line}: field {idx} is not UTF-8 ({e})")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database_ops::test_support::tsv;
    use std::io::{Cursor, Write};

    #[test]
    fn streams_rows_and_keeps_bare_quotes() {
        let body = tsv(
            &["nconst", "primaryName"],
            &[&["nm1", "Dwayne \"The Rock\" Johnson"], &["nm2", "Alice"]],
        );
        let mut extract = TsvExtract::from_reader("names", Cursor::new(body));
        let name_idx = extract.column("primaryName").unwrap();

        let first = extract.next_record().unwrap().unwrap();
        assert_eq!(
            text_field(first, name_idx, "names").unwrap(),
            "Dwayne \"The Rock\" Johnson"
        );
        assert!(extract.next_record().unwrap().is_some());
        assert!(extract.next_record().unwrap().is_none());
        assert_eq!(extract.rows_read(), 2);
    }

    #[test]
    fn missing_header_column_is_an_error() {
        let mut extract =
            TsvExtract::from_reader("principals", Cursor::new("tconst\tnconst\n"));
        let err = extract.column("category").unwrap_err().to_string();
        assert!(err.contains("category"));
    }

    #[test]
    fn ragged_row_aborts() {
        let body = "tconst\tnconst\tcategory\nt1\tn1\n";
        let mut extract = TsvExtract::from_reader("principals", Cursor::new(body));
        extract.column("tconst").unwrap();
        assert!(extract.next_record().is_err());
    }

    #[test]
    fn invalid_utf8_names_the_line() {
        let mut body = b"nconst\tprimaryName\nnm1\t".to_vec();
        body.extend_from_slice(&[0xff, 0xfe]);
        body.push(b'\n');
        let mut extract = TsvExtract::from_reader("names", Cursor::new(body));
        let idx = extract.column("primaryName").unwrap();
        let rec = extract.next_record().unwrap().unwrap();
        let err = text_field(rec, idx, "names").unwrap_err().to_string();
        assert!(err.contains("line 2"), "{err}");
    }

    #[test]
    fn opens_gzipped_extracts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("name.basics.tsv.gz");
        let mut enc = flate2::write::GzEncoder::new(
            File::create(&path).unwrap(),
            flate2::Compression::fast(),
        );
        enc.write_all(tsv(&["nconst", "primaryName"], &[&["nm1", "Alice"]]).as_bytes())
            .unwrap();
        enc.finish().unwrap();

        let mut extract = TsvExtract::open(&path).unwrap();
        let idx = extract.column("primaryName").unwrap();
        let rec = extract.next_record().unwrap().unwrap();
        assert_eq!(text_field(rec, idx, "names").unwrap(), "Alice");
    }
}
