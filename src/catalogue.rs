//! Catalogue Gateway Module
//!
//! Wraps an external resistance catalogue (mutation → phenotype per drug)
//! behind [`ResistanceCatalogue`], and caches loaded catalogues by identity in
//! a [`CatalogueGateway`] owned by the run.
//!
//! # Prediction Resolution
//! A catalogue answers either with one call per drug ([`Prediction::PerDrug`])
//! or with a single call that applies to every drug ([`Prediction::Single`]).
//! A drug missing from a per-drug answer is susceptible.
//!
//! # Table Catalogues
//! [`TableCatalogue`] reads a CSV with `MUTATION`, `DRUG` and `PREDICTION`
//! columns and predicts by exact lookup of the variant notation. It does not
//! evaluate wildcard or default rules.

use anyhow::Context;
use log::{debug, info};
use rustc_hash::{FxHashMap, FxHashSet};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use crate::call::Call;
use crate::error::{GwtError, PredictError};
use crate::table;
use crate::variant::VariantNotation;

// ============================================================================
// Identity and Predictions
// ============================================================================

/// Stable identity of a catalogue, used as a cache partition key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CatalogueId(PathBuf);

impl CatalogueId {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self(path.into())
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}

impl std::fmt::Display for CatalogueId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// Answer of a catalogue for one variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prediction {
    /// One call per drug the catalogue has rules for.
    PerDrug(FxHashMap<String, Call>),
    /// One call regardless of drug.
    Single(Call),
}

impl Prediction {
    /// Resolves the call for `drug`.
    pub fn call_for(&self, drug: &str) -> Call {
        match self {
            Prediction::PerDrug(calls) => calls.get(drug).copied().unwrap_or(Call::Susceptible),
            Prediction::Single(call) => *call,
        }
    }
}

/// One catalogue rule: variant notation, drug, predicted call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogueRow {
    pub variant: String,
    pub drug: String,
    pub call: Call,
}

impl CatalogueRow {
    pub fn new(variant: &str, drug: &str, call: Call) -> Self {
        Self {
            variant: variant.to_string(),
            drug: drug.to_string(),
            call,
        }
    }
}

/// Read-only mutation-to-phenotype catalogue.
pub trait ResistanceCatalogue: Send + Sync {
    /// All rules of the catalogue, in file order.
    fn rows(&self) -> &[CatalogueRow];

    /// Predicts the phenotype(s) conferred by a variant.
    fn predict(&self, variant: &str) -> Result<Prediction, PredictError>;

    /// Drugs the catalogue has at least one rule for.
    fn drugs(&self) -> FxHashSet<&str> {
        self.rows().iter().map(|r| r.drug.as_str()).collect()
    }
}

/// Shared handle to a loaded catalogue.
pub type CatalogueHandle = Arc<dyn ResistanceCatalogue>;

// ============================================================================
// Table Catalogue
// ============================================================================

/// Catalogue backed by a CSV rule table.
#[derive(Debug)]
pub struct TableCatalogue {
    rows: Vec<CatalogueRow>,
    by_variant: FxHashMap<String, FxHashMap<String, Call>>,
}

impl TableCatalogue {
    /// Builds a catalogue from rules. Later rows win for a repeated (variant, drug).
    pub fn from_rows(rows: Vec<CatalogueRow>) -> Self {
        let mut by_variant: FxHashMap<String, FxHashMap<String, Call>> = FxHashMap::default();
        for row in &rows {
            by_variant
                .entry(row.variant.clone())
                .or_default()
                .insert(row.drug.clone(), row.call);
        }
        Self { rows, by_variant }
    }

    /// Loads a catalogue CSV (optionally gzipped).
    pub fn open(id: &CatalogueId) -> Result<Self, GwtError> {
        let load = || -> anyhow::Result<Self> {
            let mut reader = table::open_table(id.path())?;
            Self::parse(&mut reader)
        };

        let catalogue = load().map_err(|e| GwtError::CatalogueLoad {
            identity: id.to_string(),
            reason: format!("{:#}", e),
        })?;

        info!(
            "Loaded catalogue {}: {} rules, {} variants, {} drugs",
            id,
            catalogue.rows.len(),
            catalogue.by_variant.len(),
            catalogue.drugs().len()
        );
        Ok(catalogue)
    }

    pub(crate) fn parse<R: Read>(reader: &mut csv::Reader<R>) -> anyhow::Result<Self> {
        let headers = reader.headers()?.clone();
        let cols = table::column_indices(&headers, &["MUTATION", "DRUG", "PREDICTION"])?;
        let (mut_col, drug_col, pred_col) = (cols[0], cols[1], cols[2]);

        let mut rows = Vec::new();
        for (row, result) in reader.records().enumerate() {
            let record = result?;
            let line = row + 2;

            let variant = table::optional_field(&record, mut_col)
                .with_context(|| format!("Line {}: missing MUTATION", line))?;
            let drug = table::optional_field(&record, drug_col)
                .with_context(|| format!("Line {}: missing DRUG", line))?;
            let code = record.get(pred_col).unwrap_or("");
            let call = Call::from_code(code)
                .with_context(|| format!("Line {}: unknown PREDICTION '{}'", line, code))?;

            rows.push(CatalogueRow::new(variant, drug, call));
        }

        if rows.is_empty() {
            anyhow::bail!("Catalogue has no rules");
        }

        Ok(Self::from_rows(rows))
    }
}

impl ResistanceCatalogue for TableCatalogue {
    fn rows(&self) -> &[CatalogueRow] {
        &self.rows
    }

    fn predict(&self, variant: &str) -> Result<Prediction, PredictError> {
        VariantNotation::parse(variant)
            .map_err(|_| PredictError::MalformedNotation(variant.to_string()))?;

        Ok(match self.by_variant.get(variant) {
            Some(calls) => Prediction::PerDrug(calls.clone()),
            None => Prediction::Single(Call::Susceptible),
        })
    }
}

// ============================================================================
// Catalogue Gateway
// ============================================================================

/// Source of catalogues, addressed by identity.
pub trait CatalogueSource: Send + Sync {
    fn load(&self, id: &CatalogueId) -> Result<CatalogueHandle, GwtError>;
}

/// Loads [`TableCatalogue`]s from CSV files.
#[derive(Debug, Default, Clone, Copy)]
pub struct TableSource;

impl CatalogueSource for TableSource {
    fn load(&self, id: &CatalogueId) -> Result<CatalogueHandle, GwtError> {
        Ok(Arc::new(TableCatalogue::open(id)?))
    }
}

/// Loads each catalogue identity at most once and hands out shared handles.
pub struct CatalogueGateway {
    source: Box<dyn CatalogueSource>,
    loaded: Mutex<FxHashMap<CatalogueId, CatalogueHandle>>,
}

impl CatalogueGateway {
    pub fn new<S: CatalogueSource + 'static>(source: S) -> Self {
        Self {
            source: Box::new(source),
            loaded: Mutex::new(FxHashMap::default()),
        }
    }

    /// Returns the cached handle for `id`, loading it on first use.
    ///
    /// The lock is held across the load so concurrent callers never load twice.
    pub fn load(&self, id: &CatalogueId) -> Result<CatalogueHandle, GwtError> {
        let mut loaded = self.loaded.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = loaded.get(id) {
            debug!("Catalogue {} already loaded", id);
            return Ok(Arc::clone(handle));
        }

        let handle = self.source.load(id)?;
        loaded.insert(id.clone(), Arc::clone(&handle));
        Ok(handle)
    }

    /// Predicts the call of `variant` for `drug`.
    pub fn predict(
        handle: &dyn ResistanceCatalogue,
        variant: &str,
        drug: &str,
    ) -> Result<Call, PredictError> {
        Ok(handle.predict(variant)?.call_for(drug))
    }
}

impl Default for CatalogueGateway {
    fn default() -> Self {
        Self::new(TableSource)
    }
}

// ============================================================================
// Tests
// ============================================================================
