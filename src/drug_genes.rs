//! Drug Panel and Drug-Gene Resistance Mapping
//!
//! Derives, from catalogue rules, which genes can confer resistance to each
//! drug of the panel. A gene is a resistance gene when at least one rule
//! for it (for any drug) predicts `R`; it is associated with a drug when it
//! also has at least one rule for that drug.
//!
//! Mutations outside every resistance gene can never change a call, so they
//! are dropped before antibiograms are generated.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::call::Call;
use crate::catalogue::CatalogueRow;
use crate::error::GwtError;
use crate::mutations::Sample;
use crate::variant::gene_of;

/// Default first-line drugs (rifampicin, isoniazid, ethambutol, pyrazinamide).
pub const FIRST_LINE: [&str; 4] = ["RIF", "INH", "EMB", "PZA"];

/// Default second-line drugs (amikacin, kanamycin, levofloxacin, moxifloxacin, ethionamide).
pub const SECOND_LINE: [&str; 5] = ["AMI", "KAN", "LEV", "MXF", "ETH"];

// ============================================================================
// Drug Panel
// ============================================================================

/// Ordered drug panel: first-line drugs followed by second-line drugs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrugPanel {
    drugs: Vec<String>,
    first_line: usize,
}

impl DrugPanel {
    /// Builds a panel. Drug names must be unique and the first line non-empty.
    pub fn new<S: AsRef<str>>(first_line: &[S], second_line: &[S]) -> Result<Self, GwtError> {
        if first_line.is_empty() {
            return Err(GwtError::InvalidPanel("no first-line drugs".to_string()));
        }

        let drugs: Vec<String> = first_line
            .iter()
            .chain(second_line)
            .map(|d| d.as_ref().trim().to_string())
            .collect();

        let mut seen = FxHashSet::default();
        for drug in &drugs {
            if drug.is_empty() {
                return Err(GwtError::InvalidPanel("empty drug name".to_string()));
            }
            if !seen.insert(drug.as_str()) {
                return Err(GwtError::InvalidPanel(format!("duplicate drug '{}'", drug)));
            }
        }

        Ok(Self {
            drugs,
            first_line: first_line.len(),
        })
    }

    /// All drugs in panel order.
    pub fn drugs(&self) -> &[String] {
        &self.drugs
    }

    pub fn first_line(&self) -> &[String] {
        &self.drugs[..self.first_line]
    }

    pub fn second_line(&self) -> &[String] {
        &self.drugs[self.first_line..]
    }

    pub fn len(&self) -> usize {
        self.drugs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drugs.is_empty()
    }
}

impl Default for DrugPanel {
    fn default() -> Self {
        Self {
            drugs: FIRST_LINE
                .iter()
                .chain(SECOND_LINE.iter())
                .map(|d| d.to_string())
                .collect(),
            first_line: FIRST_LINE.len(),
        }
    }
}

// ============================================================================
// Drug-Gene Map
// ============================================================================

/// Resistance genes per panel drug, in panel order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrugGeneMap {
    entries: Vec<(String, FxHashSet<String>)>,
    resistance_genes: FxHashSet<String>,
}

impl DrugGeneMap {
    /// Genes associated with `drug`, if the drug is in the panel.
    pub fn genes_for(&self, drug: &str) -> Option<&FxHashSet<String>> {
        self.entries
            .iter()
            .find(|(d, _)| d == drug)
            .map(|(_, genes)| genes)
    }

    /// `(drug, genes)` pairs in panel order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FxHashSet<String>)> {
        self.entries.iter().map(|(d, g)| (d.as_str(), g))
    }

    /// Genes with at least one `R` rule for any drug.
    pub fn resistance_genes(&self) -> &FxHashSet<String> {
        &self.resistance_genes
    }

    /// Keeps only mutations in resistance genes. Samples are never dropped,
    /// even when no mutation survives.
    pub fn restrict(&self, samples: &[Sample]) -> Vec<Sample> {
        samples
            .iter()
            .map(|s| {
                let mutations = s
                    .mutations
                    .iter()
                    .filter(|m| self.resistance_genes.contains(&m.gene))
                    .cloned()
                    .collect();
                Sample::new(s.id.clone(), mutations)
            })
            .collect()
    }
}

/// Builds the drug → resistance-gene map for `panel`.
///
/// Fails with [`GwtError::UnsupportedDrug`] when a panel drug has no rules.
pub fn map_resistance_genes(
    rows: &[CatalogueRow],
    panel: &DrugPanel,
    identity: &str,
) -> Result<DrugGeneMap, GwtError> {
    let resistance_genes: FxHashSet<String> = rows
        .iter()
        .filter(|r| r.call == Call::Resistant)
        .map(|r| gene_of(&r.variant).to_string())
        .collect();

    let mut genes_by_drug: FxHashMap<&str, FxHashSet<String>> = FxHashMap::default();
    for row in rows {
        let genes = genes_by_drug.entry(row.drug.as_str()).or_default();
        let gene = gene_of(&row.variant);
        if resistance_genes.contains(gene) {
            genes.insert(gene.to_string());
        }
    }

    let mut entries = Vec::with_capacity(panel.len());
    for drug in panel.drugs() {
        let genes = genes_by_drug
            .remove(drug.as_str())
            .ok_or_else(|| GwtError::UnsupportedDrug {
                drug: drug.clone(),
                identity: identity.to_string(),
            })?;
        entries.push((drug.clone(), genes));
    }

    Ok(DrugGeneMap {
        entries,
        resistance_genes,
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mutations::Mutation;

    fn rows() -> Vec<CatalogueRow> {
        vec![
            CatalogueRow::new("geneA@X1Y", "DRUG1", Call::Resistant),
            CatalogueRow::new("geneB@X2Y", "DRUG1", Call::Susceptible),
            CatalogueRow::new("geneA@X3Y", "DRUG2", Call::Resistant),
        ]
    }

    fn panel() -> DrugPanel {
        DrugPanel::new(&["DRUG1"], &["DRUG2"]).unwrap()
    }

    fn genes(names: &[&str]) -> FxHashSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_map_excludes_genes_without_resistance() {
        let map = map_resistance_genes(&rows(), &panel(), "cat").unwrap();
        assert_eq!(map.genes_for("DRUG1"), Some(&genes(&["geneA"])));
        assert_eq!(map.genes_for("DRUG2"), Some(&genes(&["geneA"])));
        assert_eq!(map.resistance_genes(), &genes(&["geneA"]));
    }

    #[test]
    fn test_map_uses_resistance_from_any_drug() {
        // geneC is resistant for DRUG2 only but still counts for DRUG1
        let mut rows = rows();
        rows.push(CatalogueRow::new("geneC@A5T", "DRUG2", Call::Resistant));
        rows.push(CatalogueRow::new("geneC@A9T", "DRUG1", Call::Uncertain));

        let map = map_resistance_genes(&rows, &panel(), "cat").unwrap();
        assert_eq!(map.genes_for("DRUG1"), Some(&genes(&["geneA", "geneC"])));
    }

    #[test]
    fn test_map_is_order_independent() {
        let mut reversed = rows();
        reversed.reverse();
        assert_eq!(
            map_resistance_genes(&rows(), &panel(), "cat").unwrap(),
            map_resistance_genes(&reversed, &panel(), "cat").unwrap()
        );
    }

    #[test]
    fn test_map_keeps_panel_order() {
        let panel = DrugPanel::new(&["DRUG2"], &["DRUG1"]).unwrap();
        let map = map_resistance_genes(&rows(), &panel, "cat").unwrap();
        let order: Vec<&str> = map.iter().map(|(d, _)| d).collect();
        assert_eq!(order, vec!["DRUG2", "DRUG1"]);
    }

    #[test]
    fn test_unsupported_drug() {
        let panel = DrugPanel::new(&["DRUG1"], &["DRUG9"]).unwrap();
        let err = map_resistance_genes(&rows(), &panel, "cat").unwrap_err();
        assert!(matches!(err, GwtError::UnsupportedDrug { ref drug, .. } if drug == "DRUG9"));
    }

    #[test]
    fn test_restrict_keeps_empty_samples() {
        let map = map_resistance_genes(&rows(), &panel(), "cat").unwrap();
        let samples = vec![
            Sample::new(
                "s1",
                vec![
                    Mutation::new("geneA", Some("geneA@X1Y")),
                    Mutation::new("geneB", Some("geneB@X2Y")),
                ],
            ),
            Sample::new("s2", vec![Mutation::new("geneZ", Some("geneZ@Q1R"))]),
        ];

        let restricted = map.restrict(&samples);
        assert_eq!(restricted.len(), 2);
        assert_eq!(restricted[0].mutations.len(), 1);
        assert_eq!(restricted[0].mutations[0].gene, "geneA");
        assert!(restricted[1].mutations.is_empty());
    }

    #[test]
    fn test_default_panel() {
        let panel = DrugPanel::default();
        assert_eq!(panel.len(), 9);
        assert_eq!(panel.first_line(), &["RIF", "INH", "EMB", "PZA"]);
        assert_eq!(panel.second_line(), &["AMI", "KAN", "LEV", "MXF", "ETH"]);
    }

    #[test]
    fn test_invalid_panels() {
        let none: [&str; 0] = [];
        assert!(DrugPanel::new(&none, &["AMI"]).is_err());
        assert!(DrugPanel::new(&["RIF", "RIF"], &none).is_err());
        assert!(DrugPanel::new(&["RIF"], &[" "]).is_err());
    }
}
