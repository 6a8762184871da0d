use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::{info, Level};
use rustc_hash::FxHashMap;
use simple_logger::init_with_level;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use gwtyper::antibiogram::{Antibiogram, GeneratorConfig};
use gwtyper::catalogue::{CatalogueGateway, CatalogueId};
use gwtyper::drug_genes::{DrugPanel, FIRST_LINE, SECOND_LINE};
use gwtyper::memo::{DiskStore, MemoryStore, PredictionMemo};
use gwtyper::mutations::{group_by_sample, read_mutation_table};
use gwtyper::wildtype::{InferredAntibiogram, NonSilent, Verdicts, WildTypeClassifier};

fn parse_batch_size(s: &str) -> Result<usize, String> {
    let val: usize = s.parse().map_err(|_| format!("Invalid number: {}", s))?;
    if val == 0 {
        Err("Batch size must be at least 1".to_string())
    } else {
        Ok(val)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Definition {
    /// Wild-type unless a mutation changes the residue
    Nonsilent,
    /// Wild-type by threshold over catalogue-inferred antibiograms
    InferredAntibiogram,
}

#[derive(Parser)]
#[command(name = "gwtyper")]
#[command(version)]
#[command(about = "Genotypic wild-type calling for MIC/ECOFF analyses")]
#[command(long_about = r#"
gwtyper - classify samples as genotypic wild-type or mutant

Two definitions are available:

  nonsilent              Wild-type when a sample has no mutations, or every
                         mutation keeps the same residue (e.g. rpoB@S450S).

  inferred-antibiogram   Predicts a call per drug from a resistance catalogue
                         and calls a sample wild-type when every first-line
                         drug is S and no second-line drug is R.

INPUT:
  Mutation table (CSV/TSV, optionally .gz) with columns UNIQUEID, GENE, MUTATION.
  Catalogue (CSV) with columns MUTATION, DRUG, PREDICTION.

OUTPUT FILES:
  verdicts.tsv       UNIQUEID, WILD_TYPE
  antibiograms.tsv   UNIQUEID then one call per panel drug (--antibiograms)

EXAMPLES:
  gwtyper -m mutations.csv -c catalogue.csv -o results/
  gwtyper -m mutations.tsv.gz -d nonsilent -o results/
"#)]
struct Args {
    #[arg(short = 'm', long, value_name = "FILE", help_heading = "Input")]
    mutations: PathBuf,

    #[arg(short = 'd', long, value_enum, default_value = "inferred-antibiogram", help_heading = "Input")]
    definition: Definition,

    #[arg(short = 'c', long, value_name = "FILE", help_heading = "Catalogue")]
    catalogue: Option<PathBuf>,

    #[arg(long = "first-line", value_name = "DRUGS", value_delimiter = ',', help_heading = "Catalogue")]
    first_line: Option<Vec<String>>,

    #[arg(long = "second-line", value_name = "DRUGS", value_delimiter = ',', help_heading = "Catalogue")]
    second_line: Option<Vec<String>>,

    #[arg(long = "cache-dir", value_name = "DIR", default_value = ".gwt_cache", help_heading = "Cache")]
    cache_dir: PathBuf,

    #[arg(long = "reuse-cache", help_heading = "Cache")]
    reuse_cache: bool,

    #[arg(long = "no-cache", conflicts_with = "reuse_cache", help_heading = "Cache")]
    no_cache: bool,

    #[arg(short = 'o', long, value_name = "DIR", default_value = ".", help_heading = "Output")]
    outdir: PathBuf,

    #[arg(short = 'a', long, help_heading = "Output")]
    antibiograms: bool,

    #[arg(short = 'v', long, help_heading = "Output")]
    verbose: bool,

    #[arg(short = 't', long, value_name = "NUM", default_value = "0", help_heading = "Runtime")]
    threads: usize,

    #[arg(short = 'b', long = "batch-size", value_name = "NUM", default_value = "10",
          value_parser = parse_batch_size, help_heading = "Runtime")]
    batch_size: usize,
}

fn main() -> Result<()> {
    let mut args = Args::parse();
    let start_time = Instant::now();

    init_with_level(if args.verbose { Level::Debug } else { Level::Info })?;

    if args.threads == 0 {
        args.threads = num_cpus::get();
    }

    let records = read_mutation_table(&args.mutations)?;
    let samples = group_by_sample(records);
    if samples.is_empty() {
        anyhow::bail!("No samples in {}", args.mutations.display());
    }
    info!("Read {} samples from {}", samples.len(), args.mutations.display());

    fs::create_dir_all(&args.outdir)
        .with_context(|| format!("Failed to create output directory: {}", args.outdir.display()))?;

    let verdicts = match args.definition {
        Definition::Nonsilent => NonSilent.classify(&samples)?,
        Definition::InferredAntibiogram => {
            let classifier = build_inferred(&args)?;
            let antibiograms = classifier.antibiograms(&samples)?;
            if args.antibiograms {
                write_antibiograms(&antibiograms, classifier.panel(), &args.outdir)?;
            }

            let stats = classifier.memo().stats();
            info!(
                "Predictions: {} computed, {} reused from cache",
                stats.computed, stats.stored
            );
            InferredAntibiogram::verdicts(&antibiograms)
        }
    };

    let output_path = write_verdicts(&verdicts, &args.outdir)?;

    let wild_type = verdicts.values().filter(|&&wt| wt).count();
    info!(
        "{} of {} samples wild-type ({:?})",
        wild_type,
        verdicts.len(),
        args.definition
    );
    info!("Results written to: {}", output_path.display());
    info!("Total time: {:.1}s", start_time.elapsed().as_secs_f64());

    Ok(())
}

fn build_inferred(args: &Args) -> Result<InferredAntibiogram> {
    let catalogue = args
        .catalogue
        .as_ref()
        .context("--catalogue is required for the inferred-antibiogram definition")?;

    let first_line = args
        .first_line
        .clone()
        .unwrap_or_else(|| FIRST_LINE.iter().map(|d| d.to_string()).collect());
    let second_line = args
        .second_line
        .clone()
        .unwrap_or_else(|| SECOND_LINE.iter().map(|d| d.to_string()).collect());
    let panel = DrugPanel::new(&first_line, &second_line)?;

    let memo = if args.no_cache {
        PredictionMemo::new(MemoryStore::new(), false)?
    } else {
        let store = DiskStore::open(&args.cache_dir).with_context(|| {
            format!("Failed to open cache directory: {}", args.cache_dir.display())
        })?;
        PredictionMemo::new(store, args.reuse_cache)?
    };

    Ok(InferredAntibiogram::new(
        CatalogueGateway::default(),
        memo,
        CatalogueId::new(catalogue),
        panel,
        GeneratorConfig {
            threads: args.threads,
            batch_size: args.batch_size,
        },
    ))
}

fn write_verdicts(verdicts: &Verdicts, outdir: &Path) -> Result<PathBuf> {
    let output_path = outdir.join("verdicts.tsv");
    let mut output = BufWriter::new(
        File::create(&output_path)
            .with_context(|| format!("Failed to create {}", output_path.display()))?,
    );

    writeln!(output, "UNIQUEID\tWILD_TYPE")?;
    for (id, wild_type) in verdicts {
        writeln!(output, "{}\t{}", id, wild_type)?;
    }
    output.flush()?;

    Ok(output_path)
}

fn write_antibiograms(
    antibiograms: &FxHashMap<String, Antibiogram>,
    panel: &DrugPanel,
    outdir: &Path,
) -> Result<()> {
    let output_path = outdir.join("antibiograms.tsv");
    let mut output = BufWriter::new(
        File::create(&output_path)
            .with_context(|| format!("Failed to create {}", output_path.display()))?,
    );

    writeln!(output, "UNIQUEID\t{}", panel.drugs().join("\t"))?;

    let mut ids: Vec<&String> = antibiograms.keys().collect();
    ids.sort();
    for id in ids {
        let calls: Vec<String> = antibiograms[id]
            .calls()
            .iter()
            .map(|c| c.to_string())
            .collect();
        writeln!(output, "{}\t{}", id, calls.join("\t"))?;
    }
    output.flush()?;

    info!("Antibiograms written to: {}", output_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gwtyper::call::Call;

    #[test]
    fn test_parse_batch_size() {
        assert_eq!(parse_batch_size("25"), Ok(25));
        assert!(parse_batch_size("0").is_err());
        assert!(parse_batch_size("ten").is_err());
    }

    #[test]
    fn test_args_defaults() {
        let args = Args::try_parse_from(["gwtyper", "-m", "muts.csv", "-c", "cat.csv"]).unwrap();
        assert_eq!(args.definition, Definition::InferredAntibiogram);
        assert_eq!(args.batch_size, 10);
        assert_eq!(args.cache_dir, PathBuf::from(".gwt_cache"));
        assert!(args.first_line.is_none());

        let args = Args::try_parse_from([
            "gwtyper", "-m", "muts.csv", "-d", "nonsilent", "--first-line", "RIF,INH",
        ])
        .unwrap();
        assert_eq!(args.definition, Definition::Nonsilent);
        assert_eq!(args.first_line, Some(vec!["RIF".to_string(), "INH".to_string()]));

        assert!(Args::try_parse_from(["gwtyper", "-m", "m.csv", "--no-cache", "--reuse-cache"]).is_err());
    }

    #[test]
    fn test_inferred_requires_catalogue() {
        let args = Args::try_parse_from(["gwtyper", "-m", "muts.csv", "--no-cache"]).unwrap();
        assert!(build_inferred(&args).is_err());
    }

    #[test]
    fn test_write_outputs() {
        let dir = tempfile::tempdir().unwrap();

        let mut verdicts = Verdicts::new();
        verdicts.insert("s2".to_string(), false);
        verdicts.insert("s1".to_string(), true);
        let path = write_verdicts(&verdicts, dir.path()).unwrap();
        let content = fs::read_to_string(path).unwrap();
        assert_eq!(content, "UNIQUEID\tWILD_TYPE\ns1\ttrue\ns2\tfalse\n");

        let panel = DrugPanel::new(&["RIF"], &["AMI"]).unwrap();
        let mut antibiograms = FxHashMap::default();
        antibiograms.insert(
            "s1".to_string(),
            Antibiogram::new(vec![Call::Resistant, Call::Uncertain], &panel),
        );
        write_antibiograms(&antibiograms, &panel, dir.path()).unwrap();
        let content = fs::read_to_string(dir.path().join("antibiograms.tsv")).unwrap();
        assert_eq!(content, "UNIQUEID\tRIF\tAMI\ns1\tR\tU\n");
    }
}
