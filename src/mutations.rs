//! Mutation Records and Samples
//!
//! Loads `(UNIQUEID, GENE, MUTATION)` rows and groups them into samples.
//! A blank `MUTATION` cell is kept as a record with no variant: it marks the
//! sample as present without contributing evidence.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::Path;

use crate::table;

/// One genetic change observed in a sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mutation {
    /// Gene the change lies in.
    pub gene: String,
    /// Variant notation (`GENE@CHANGE`), if one was recorded.
    pub variant: Option<String>,
}

impl Mutation {
    pub fn new(gene: impl Into<String>, variant: Option<&str>) -> Self {
        Self {
            gene: gene.into(),
            variant: variant.filter(|v| !v.is_empty()).map(str::to_string),
        }
    }
}

/// A sample and all of its mutation records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    /// Unique sample identifier (`UNIQUEID`).
    pub id: String,
    pub mutations: Vec<Mutation>,
}

impl Sample {
    pub fn new(id: impl Into<String>, mutations: Vec<Mutation>) -> Self {
        Self {
            id: id.into(),
            mutations,
        }
    }

    /// Variant strings of the sample, skipping records without one.
    pub fn variants(&self) -> impl Iterator<Item = &str> {
        self.mutations.iter().filter_map(|m| m.variant.as_deref())
    }
}

/// A single row of the mutation table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationRecord {
    pub sample_id: String,
    pub mutation: Mutation,
}

/// Groups rows by sample identifier, preserving row order within a sample.
///
/// Samples come back sorted by identifier.
pub fn group_by_sample<I>(records: I) -> Vec<Sample>
where
    I: IntoIterator<Item = MutationRecord>,
{
    let mut grouped: BTreeMap<String, Vec<Mutation>> = BTreeMap::new();
    for record in records {
        grouped
            .entry(record.sample_id)
            .or_default()
            .push(record.mutation);
    }

    grouped
        .into_iter()
        .map(|(id, mutations)| Sample::new(id, mutations))
        .collect()
}

/// Reads a mutation table (CSV/TSV, optionally gzipped).
///
/// Required columns: `UNIQUEID`, `GENE`, `MUTATION`. Rows with an empty
/// `UNIQUEID` or `GENE` are rejected.
pub fn read_mutation_table<P: AsRef<Path>>(path: P) -> Result<Vec<MutationRecord>> {
    let path = path.as_ref();
    let mut reader = table::open_table(path)?;
    parse_mutation_rows(&mut reader)
        .with_context(|| format!("Invalid mutation table: {}", path.display()))
}

pub(crate) fn parse_mutation_rows<R: std::io::Read>(
    reader: &mut csv::Reader<R>,
) -> Result<Vec<MutationRecord>> {
    let headers = reader.headers()?.clone();
    let cols = table::column_indices(&headers, &["UNIQUEID", "GENE", "MUTATION"])?;
    let (id_col, gene_col, mut_col) = (cols[0], cols[1], cols[2]);

    let mut records = Vec::new();
    for (row, result) in reader.records().enumerate() {
        let record = result?;
        // header is line 1
        let line = row + 2;

        let sample_id = table::optional_field(&record, id_col)
            .with_context(|| format!("Line {}: missing UNIQUEID", line))?;
        let gene = table::optional_field(&record, gene_col)
            .with_context(|| format!("Line {}: missing GENE", line))?;

        records.push(MutationRecord {
            sample_id: sample_id.to_string(),
            mutation: Mutation::new(gene, table::optional_field(&record, mut_col)),
        });
    }

    Ok(records)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn record(id: &str, gene: &str, variant: Option<&str>) -> MutationRecord {
        MutationRecord {
            sample_id: id.to_string(),
            mutation: Mutation::new(gene, variant),
        }
    }

    #[test]
    fn test_group_by_sample() {
        let samples = group_by_sample(vec![
            record("s2", "rpoB", Some("rpoB@S450L")),
            record("s1", "katG", None),
            record("s2", "katG", Some("katG@S315T")),
        ]);

        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].id, "s1");
        assert_eq!(samples[0].variants().count(), 0);
        assert_eq!(samples[1].id, "s2");
        assert_eq!(
            samples[1].variants().collect::<Vec<_>>(),
            vec!["rpoB@S450L", "katG@S315T"]
        );
    }

    #[test]
    fn test_empty_variant_is_absent() {
        let m = Mutation::new("rpoB", Some(""));
        assert_eq!(m.variant, None);
    }

    #[test]
    fn test_parse_mutation_rows() {
        let data = "UNIQUEID,GENE,MUTATION,EXTRA\n\
                    s1,rpoB,rpoB@S450L,x\n\
                    s1,katG,,x\n\
                    s2,inhA,inhA@c-15t,x\n";
        let mut reader = table::table_reader(Cursor::new(data.as_bytes().to_vec()), b',');
        let records = parse_mutation_rows(&mut reader).unwrap();

        assert_eq!(records.len(), 3);
        assert_eq!(records[0], record("s1", "rpoB", Some("rpoB@S450L")));
        assert_eq!(records[1].mutation.variant, None);
        assert_eq!(records[2].sample_id, "s2");
    }

    #[test]
    fn test_parse_mutation_rows_missing_column() {
        let data = "UNIQUEID,MUTATION\ns1,rpoB@S450L\n";
        let mut reader = table::table_reader(Cursor::new(data.as_bytes().to_vec()), b',');
        let err = parse_mutation_rows(&mut reader).unwrap_err();
        assert!(err.to_string().contains("GENE"));
    }

    #[test]
    fn test_parse_mutation_rows_missing_id() {
        let data = "UNIQUEID,GENE,MUTATION\n,rpoB,rpoB@S450L\n";
        let mut reader = table::table_reader(Cursor::new(data.as_bytes().to_vec()), b',');
        let err = parse_mutation_rows(&mut reader).unwrap_err();
        assert!(err.to_string().contains("Line 2"));
    }
}
