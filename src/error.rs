//! Error Types
//!
//! Run-level failures are [`GwtError`]; they either abort the classification
//! run (catalogue unavailable, unsupported drug) or report bad input.
//! [`PredictError`] is local to a single mutation and never aborts a run.

use thiserror::Error;

/// Failures of a classification run.
#[derive(Debug, Error)]
pub enum GwtError {
    /// The catalogue could not be found or parsed. Fatal.
    #[error("Failed to load catalogue {identity}: {reason}")]
    CatalogueLoad { identity: String, reason: String },

    /// A panel drug has no rows in the catalogue. Fatal.
    #[error("Drug '{drug}' is not covered by catalogue {identity}")]
    UnsupportedDrug { drug: String, identity: String },

    /// A variant string lacks the `GENE@CHANGE` shape.
    #[error("Malformed mutation notation: '{0}'")]
    MalformedNotation(String),

    /// A stored prediction could not be read back. Reported, then treated as a miss.
    #[error("Corrupt cache entry {path}: {reason}")]
    CacheCorruption { path: String, reason: String },

    #[error("Invalid drug panel: {0}")]
    InvalidPanel(String),

    #[error("Failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Failure to predict a single mutation against a single catalogue.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PredictError {
    #[error("malformed mutation notation '{0}'")]
    MalformedNotation(String),

    #[error("catalogue rejected '{variant}': {reason}")]
    Rejected { variant: String, reason: String },
}

