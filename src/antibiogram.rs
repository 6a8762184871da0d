//! Antibiogram Generation
//!
//! Produces one call per panel drug for every sample, using the catalogue
//! gateway and the prediction memoizer.
//!
//! # Per-drug Call
//! 1. Select the sample's mutations in genes associated with the drug
//! 2. None selected: `S`, without consulting the catalogue
//! 3. Otherwise call each mutation (no variant: `S`) and aggregate
//!    (any `R` → `R`, else any `U` → `U`, else `S`)
//!
//! # Parallelism
//! Samples are independent. They are split into batches and processed on a
//! dedicated rayon pool of `min(threads, batches)` workers. The catalogue is
//! loaded before any work is dispatched, so a load failure aborts the run
//! without starting workers.
//!
//! # Prediction Errors
//! A mutation whose prediction fails is called `U` and logged. The failure is
//! never written to the durable cache.

use log::{debug, info, warn};
use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::call::Call;
use crate::catalogue::{CatalogueGateway, CatalogueId, ResistanceCatalogue};
use crate::drug_genes::{DrugGeneMap, DrugPanel};
use crate::error::GwtError;
use crate::memo::{PredictionKey, PredictionMemo};
use crate::mutations::Sample;

// ============================================================================
// Antibiogram
// ============================================================================

/// Calls for one sample, in panel order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Antibiogram {
    calls: Vec<Call>,
    first_line: usize,
}

impl Antibiogram {
    /// Wraps calls ordered as `panel`.
    ///
    /// # Panics
    /// Panics if the number of calls differs from the panel size.
    pub fn new(calls: Vec<Call>, panel: &DrugPanel) -> Self {
        assert_eq!(calls.len(), panel.len(), "one call per panel drug");
        Self {
            calls,
            first_line: panel.first_line().len(),
        }
    }

    pub fn calls(&self) -> &[Call] {
        &self.calls
    }

    pub fn first_line(&self) -> &[Call] {
        &self.calls[..self.first_line]
    }

    pub fn second_line(&self) -> &[Call] {
        &self.calls[self.first_line..]
    }

    /// Wild-type threshold rule: every first-line call is `S` and no
    /// second-line call is `R`.
    pub fn is_wild_type(&self) -> bool {
        self.first_line().iter().all(|&c| c == Call::Susceptible)
            && self
                .second_line()
                .iter()
                .all(|&c| matches!(c, Call::Susceptible | Call::Uncertain))
    }
}

// ============================================================================
// Generator
// ============================================================================

/// Worker pool settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorConfig {
    /// Upper bound on worker threads.
    pub threads: usize,
    /// Samples per dispatched task.
    pub batch_size: usize,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            threads: num_cpus::get(),
            batch_size: 10,
        }
    }
}

/// Generates antibiograms against one catalogue.
pub struct AntibiogramGenerator<'a> {
    gateway: &'a CatalogueGateway,
    memo: &'a PredictionMemo,
    config: GeneratorConfig,
}

impl<'a> AntibiogramGenerator<'a> {
    pub fn new(
        gateway: &'a CatalogueGateway,
        memo: &'a PredictionMemo,
        config: GeneratorConfig,
    ) -> Self {
        Self {
            gateway,
            memo,
            config,
        }
    }

    /// Generates an antibiogram for every sample.
    ///
    /// `samples` should already be restricted to resistance genes; mutations in
    /// other genes are simply never selected.
    pub fn generate(
        &self,
        samples: &[Sample],
        drug_genes: &DrugGeneMap,
        panel: &DrugPanel,
        catalogue: &CatalogueId,
    ) -> Result<FxHashMap<String, Antibiogram>, GwtError> {
        let handle = self.gateway.load(catalogue)?;
        if samples.is_empty() {
            return Ok(FxHashMap::default());
        }

        let batch_size = self.config.batch_size.max(1);
        let batches = samples.len().div_ceil(batch_size);
        let workers = self.config.threads.clamp(1, batches);

        info!(
            "Generating antibiograms for {} samples ({} batches, {} workers)",
            samples.len(),
            batches,
            workers
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("antibiogram-{}", i))
            .build()?;

        let antibiograms: FxHashMap<String, Antibiogram> = pool.install(|| {
            samples
                .par_chunks(batch_size)
                .flat_map_iter(|batch| {
                    batch.iter().map(|sample| {
                        let calls =
                            self.sample_calls(sample, drug_genes, panel, &*handle, catalogue);
                        (sample.id.clone(), Antibiogram::new(calls, panel))
                    })
                })
                .collect()
        });

        let stats = self.memo.stats();
        debug!(
            "Predictions: {} computed, {} from cache",
            stats.computed, stats.stored
        );
        Ok(antibiograms)
    }

    fn sample_calls(
        &self,
        sample: &Sample,
        drug_genes: &DrugGeneMap,
        panel: &DrugPanel,
        catalogue: &dyn ResistanceCatalogue,
        identity: &CatalogueId,
    ) -> Vec<Call> {
        let empty = FxHashSet::default();

        panel
            .drugs()
            .iter()
            .map(|drug| {
                let genes = drug_genes.genes_for(drug).unwrap_or(&empty);
                let selected: Vec<_> = sample
                    .mutations
                    .iter()
                    .filter(|m| genes.contains(&m.gene))
                    .collect();

                if selected.is_empty() {
                    return Call::Susceptible;
                }

                Call::aggregate(selected.iter().map(|m| match m.variant.as_deref() {
                    None => Call::Susceptible,
                    Some(variant) => self.predict(variant, drug, catalogue, identity, &sample.id),
                }))
            })
            .collect()
    }

    fn predict(
        &self,
        variant: &str,
        drug: &str,
        catalogue: &dyn ResistanceCatalogue,
        identity: &CatalogueId,
        sample_id: &str,
    ) -> Call {
        let key = PredictionKey::new(variant, drug, identity);
        self.memo
            .get_or_compute(&key, || CatalogueGateway::predict(catalogue, variant, drug))
            .unwrap_or_else(|e| {
                warn!("Sample {}: {} for {}; calling U", sample_id, e, drug);
                Call::Uncertain
            })
    }
}

// ============================================================================
// Tests
// ============================================================================
