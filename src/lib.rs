//! gwtyper - Genotypic Wild-Type Calling
//!
//! Classifies samples as genotypic wild-type or mutant ahead of MIC/ECOFF
//! analyses, either directly from mutation notations or through per-drug
//! calls inferred from a resistance catalogue.
//!
//! # Modules
//! - `call`: S/U/R calls and their aggregation order
//! - `variant`: `GENE@CHANGE` notation parsing
//! - `table`: CSV/TSV reading with gzip support
//! - `mutations`: mutation records grouped into samples
//! - `catalogue`: catalogue trait, CSV catalogue and the per-run gateway
//! - `memo`: at-most-once prediction cache with durable stores
//! - `drug_genes`: drug panel and drug → resistance-gene mapping
//! - `antibiogram`: parallel antibiogram generation
//! - `wildtype`: `nonsilent` and `inferred-antibiogram` classifiers
//! - `error`: error types

pub mod call;
pub mod variant;
pub mod table;
pub mod mutations;
pub mod catalogue;
pub mod memo;
pub mod drug_genes;
pub mod antibiogram;
pub mod wildtype;
pub mod error;
