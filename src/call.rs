//! Resistance Calls
//!
//! A [`Call`] is the phenotype predicted for one drug. Calls are totally
//! ordered for aggregation: `Resistant > Uncertain > Susceptible`, so the
//! combined call for a set of mutations is simply the maximum.

use serde::{Deserialize, Serialize};

/// Predicted phenotype for a single drug.
///
/// Variant order matters: the derived `Ord` is the aggregation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Call {
    #[serde(rename = "S")]
    Susceptible,
    #[serde(rename = "U")]
    Uncertain,
    #[serde(rename = "R")]
    Resistant,
}

impl Call {
    /// Parses a catalogue prediction code.
    ///
    /// `F` (a failed call in the catalogue) counts as uncertain.
    pub fn from_code(code: &str) -> Option<Call> {
        match code.trim() {
            "S" => Some(Call::Susceptible),
            "R" => Some(Call::Resistant),
            "U" | "F" => Some(Call::Uncertain),
            _ => None,
        }
    }

    pub fn code(self) -> char {
        match self {
            Call::Susceptible => 'S',
            Call::Uncertain => 'U',
            Call::Resistant => 'R',
        }
    }

    /// Combines per-mutation calls into one call for the drug.
    ///
    /// Any `R` wins, then any `U`; an empty set is susceptible.
    pub fn aggregate<I>(calls: I) -> Call
    where
        I: IntoIterator<Item = Call>,
    {
        calls.into_iter().max().unwrap_or(Call::Susceptible)
    }
}

impl std::fmt::Display for Call {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregate_precedence() {
        use crate::call::Call::*;
        assert_eq!(Call::aggregate([Susceptible, Uncertain, Susceptible]), Uncertain);
        assert_eq!(Call::aggregate([Uncertain, Resistant, Susceptible]), Resistant);
        assert_eq!(Call::aggregate([Susceptible, Susceptible]), Susceptible);
        assert_eq!(Call::aggregate(Vec::<Call>::new()), Susceptible);
    }

    #[test]
    fn test_aggregate_ignores_order() {
        use crate::call::Call::*;
        let calls = [Resistant, Uncertain, Susceptible];
        let reversed: Vec<Call> = calls.iter().rev().copied().collect();
        assert_eq!(Call::aggregate(calls), Call::aggregate(reversed));
        assert_eq!(
            Call::aggregate([Uncertain, Uncertain, Susceptible]),
            Call::aggregate([Susceptible, Uncertain])
        );
    }

    #[test]
    fn test_from_code() {
        assert_eq!(Call::from_code("R"), Some(Call::Resistant));
        assert_eq!(Call::from_code(" S "), Some(Call::Susceptible));
        assert_eq!(Call::from_code("U"), Some(Call::Uncertain));
        assert_eq!(Call::from_code("F"), Some(Call::Uncertain));
        assert_eq!(Call::from_code("X"), None);
    }

    #[test]
    fn test_call_display() {
        assert_eq!(format!("{}", Call::Resistant), "R");
        assert_eq!(Call::Uncertain.to_string(), "U");
    }
}
