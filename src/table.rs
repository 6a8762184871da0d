//! Delimited Table I/O
//!
//! Opens CSV/TSV tables, including gzip-compressed files, and resolves
//! columns by header name.
//!
//! # Format Detection
//! - `.gz` suffix: gzip-decompressed before parsing
//! - `.tsv` / `.txt` (before any `.gz`): tab-delimited
//! - anything else: comma-delimited

use anyhow::{Context, Result};
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Selects the field delimiter from the file name.
pub fn delimiter_for(path: &Path) -> u8 {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    let name = name.strip_suffix(".gz").unwrap_or(&name);

    if name.ends_with(".tsv") || name.ends_with(".txt") {
        b'\t'
    } else {
        b','
    }
}

/// Opens a table file, decompressing `.gz` inputs on the fly.
pub fn open_table<P: AsRef<Path>>(path: P) -> Result<csv::Reader<Box<dyn Read>>> {
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("Failed to open table: {}", path.display()))?;

    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let source: Box<dyn Read> = if ext == "gz" {
        Box::new(MultiGzDecoder::new(file))
    } else {
        Box::new(file)
    };

    Ok(table_reader(
        BufReader::with_capacity(1024 * 1024, source),
        delimiter_for(path),
    ))
}

/// Wraps any reader as a headered table.
pub fn table_reader<R: Read + 'static>(reader: R, delimiter: u8) -> csv::Reader<Box<dyn Read>> {
    csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(Box::new(reader) as Box<dyn Read>)
}

/// Finds the index of each required column, naming every missing one.
pub fn column_indices(headers: &csv::StringRecord, required: &[&str]) -> Result<Vec<usize>> {
    let mut indices = Vec::with_capacity(required.len());
    let mut missing = Vec::new();

    for name in required {
        match headers.iter().position(|h| h.eq_ignore_ascii_case(name)) {
            Some(i) => indices.push(i),
            None => missing.push(*name),
        }
    }

    if !missing.is_empty() {
        anyhow::bail!("Missing required columns: {}", missing.join(", "));
    }
    Ok(indices)
}

/// Reads a field, mapping blank cells to `None`.
pub fn optional_field<'r>(record: &'r csv::StringRecord, index: usize) -> Option<&'r str> {
    record.get(index).filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("nan"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;

    #[test]
    fn test_delimiter_for() {
        assert_eq!(delimiter_for(&PathBuf::from("muts.tsv")), b'\t');
        assert_eq!(delimiter_for(&PathBuf::from("muts.TXT.gz")), b'\t');
        assert_eq!(delimiter_for(&PathBuf::from("catalogue.csv")), b',');
        assert_eq!(delimiter_for(&PathBuf::from("catalogue.csv.gz")), b',');
    }

    #[test]
    fn test_column_indices() {
        let headers = csv::StringRecord::from(vec!["UNIQUEID", "gene", "MUTATION"]);
        assert_eq!(column_indices(&headers, &["GENE", "UNIQUEID"]).unwrap(), vec![1, 0]);

        let err = column_indices(&headers, &["DRUG", "GENE", "PREDICTION"]).unwrap_err();
        assert!(err.to_string().contains("DRUG, PREDICTION"));
    }

    #[test]
    fn test_open_gzipped_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("muts.tsv.gz");
        let mut encoder = flate2::write::GzEncoder::new(
            File::create(&path).unwrap(),
            flate2::Compression::default(),
        );
        encoder.write_all(b"UNIQUEID\tGENE\tMUTATION\ns1\trpoB\trpoB@S450L\n").unwrap();
        encoder.finish().unwrap();

        let mut reader = open_table(&path).unwrap();
        let records: Vec<_> = reader.records().collect::<Result<_, _>>().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(&records[0][2], "rpoB@S450L");
    }

    #[test]
    fn test_optional_field() {
        let record = csv::StringRecord::from(vec!["s1", "", "NaN", "katG@S315T"]);
        assert_eq!(optional_field(&record, 1), None);
        assert_eq!(optional_field(&record, 2), None);
        assert_eq!(optional_field(&record, 3), Some("katG@S315T"));
        assert_eq!(optional_field(&record, 9), None);
    }
}
