//! Wild-Type Classification
//!
//! Two interchangeable definitions of a genotypic wild-type sample:
//!
//! - [`NonSilent`]: wild-type when the sample has no mutations, or every
//!   mutation keeps the same residue (`rpoB@S450S`).
//! - [`InferredAntibiogram`]: wild-type when the catalogue-inferred
//!   antibiogram is `S` for every first-line drug and not `R` for any
//!   second-line drug.

use log::{info, warn};
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;

use crate::antibiogram::{Antibiogram, AntibiogramGenerator, GeneratorConfig};
use crate::catalogue::{CatalogueGateway, CatalogueId};
use crate::drug_genes::{map_resistance_genes, DrugPanel};
use crate::error::GwtError;
use crate::memo::PredictionMemo;
use crate::mutations::Sample;
use crate::variant::VariantNotation;

/// Wild-type verdict per sample identifier.
pub type Verdicts = BTreeMap<String, bool>;

/// A wild-type definition.
pub trait WildTypeClassifier {
    /// Short name of the definition.
    fn name(&self) -> &'static str;

    /// Classifies every sample. Each input sample gets exactly one verdict.
    fn classify(&self, samples: &[Sample]) -> Result<Verdicts, GwtError>;
}

// ============================================================================
// Non-silent
// ============================================================================

/// Wild-type unless a sample carries a residue-changing mutation.
#[derive(Debug, Default, Clone, Copy)]
pub struct NonSilent;

impl NonSilent {
    /// Verdict for a single sample.
    ///
    /// Malformed notations are logged and count as residue-changing.
    pub fn is_wild_type(sample: &Sample) -> bool {
        sample.variants().all(|variant| match VariantNotation::parse(variant) {
            Ok(notation) => notation.is_same_residue(),
            Err(e) => {
                warn!("Sample {}: {}; treating as non-synonymous", sample.id, e);
                false
            }
        })
    }
}

impl WildTypeClassifier for NonSilent {
    fn name(&self) -> &'static str {
        "nonsilent"
    }

    fn classify(&self, samples: &[Sample]) -> Result<Verdicts, GwtError> {
        Ok(samples
            .iter()
            .map(|s| (s.id.clone(), Self::is_wild_type(s)))
            .collect())
    }
}

// ============================================================================
// Inferred antibiogram
// ============================================================================

/// Wild-type by threshold over catalogue-inferred antibiograms.
pub struct InferredAntibiogram {
    gateway: CatalogueGateway,
    memo: PredictionMemo,
    catalogue: CatalogueId,
    panel: DrugPanel,
    config: GeneratorConfig,
}

impl InferredAntibiogram {
    pub fn new(
        gateway: CatalogueGateway,
        memo: PredictionMemo,
        catalogue: CatalogueId,
        panel: DrugPanel,
        config: GeneratorConfig,
    ) -> Self {
        Self {
            gateway,
            memo,
            catalogue,
            panel,
            config,
        }
    }

    pub fn panel(&self) -> &DrugPanel {
        &self.panel
    }

    pub fn memo(&self) -> &PredictionMemo {
        &self.memo
    }

    /// Builds the drug-gene map and generates an antibiogram per sample.
    pub fn antibiograms(&self, samples: &[Sample]) -> Result<FxHashMap<String, Antibiogram>, GwtError> {
        let handle = self.gateway.load(&self.catalogue)?;
        let drug_genes =
            map_resistance_genes(handle.rows(), &self.panel, &self.catalogue.to_string())?;
        info!(
            "{} resistance genes across {} drugs",
            drug_genes.resistance_genes().len(),
            self.panel.len()
        );

        let restricted = drug_genes.restrict(samples);
        AntibiogramGenerator::new(&self.gateway, &self.memo, self.config.clone()).generate(
            &restricted,
            &drug_genes,
            &self.panel,
            &self.catalogue,
        )
    }

    /// Applies the threshold rule to generated antibiograms.
    pub fn verdicts(antibiograms: &FxHashMap<String, Antibiogram>) -> Verdicts {
        antibiograms
            .iter()
            .map(|(id, abg)| (id.clone(), abg.is_wild_type()))
            .collect()
    }
}

impl WildTypeClassifier for InferredAntibiogram {
    fn name(&self) -> &'static str {
        "inferred-antibiogram"
    }

    fn classify(&self, samples: &[Sample]) -> Result<Verdicts, GwtError> {
        Ok(Self::verdicts(&self.antibiograms(samples)?))
    }
}

// ============================================================================
// Tests
// ============================================================================
