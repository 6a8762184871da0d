//! Variant Notation Module
//!
//! Parses mutation strings of the form `GENE@CHANGE`, where `CHANGE`
//! carries a reference symbol, a position and an altered symbol.
//!
//! # Examples
//! - `rpoB@S450L`: serine at residue 450 changed to leucine
//! - `katG@S315S`: same residue, treated as silent
//! - `pncA@c-11a`: promoter nucleotide change

use crate::error::GwtError;

/// A `GENE@CHANGE` string split into its two parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariantNotation<'a> {
    /// Gene name (text before the last `@`).
    pub gene: &'a str,
    /// Change description (text after the last `@`).
    pub change: &'a str,
}

impl<'a> VariantNotation<'a> {
    /// Splits a variant string at its last `@`.
    ///
    /// Fails when there is no `@` or nothing follows it.
    ///
    /// ```
    /// use gwtyper::variant::VariantNotation;
    ///
    /// let v = VariantNotation::parse("rpoB@S450L").unwrap();
    /// assert_eq!(v.gene, "rpoB");
    /// assert_eq!(v.change, "S450L");
    /// ```
    pub fn parse(notation: &'a str) -> Result<Self, GwtError> {
        match notation.rsplit_once('@') {
            Some((gene, change)) if !change.is_empty() => Ok(Self { gene, change }),
            _ => Err(GwtError::MalformedNotation(notation.to_string())),
        }
    }

    /// True when the change starts and ends with the same symbol.
    ///
    /// The position between them is ignored, so `S450S` counts as silent.
    /// Multi-symbol substitutions are judged on their outer symbols only.
    pub fn is_same_residue(&self) -> bool {
        let mut chars = self.change.chars();
        match (chars.next(), chars.next_back()) {
            (Some(first), Some(last)) => first == last,
            // single-symbol change
            (Some(_), None) => true,
            _ => false,
        }
    }
}

/// Returns the gene component of a catalogue variant string.
///
/// Strings without `@` are returned whole.
pub fn gene_of(notation: &str) -> &str {
    notation.split_once('@').map_or(notation, |(gene, _)| gene)
}

// ============================================================================
// Tests
// ============================================================================
