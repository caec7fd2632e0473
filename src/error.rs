//! Error types for the compile pipeline.
//!
//! Every core function fails fast on the first violation it finds; the
//! message names the offending field, document, or range.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Malformed or internally inconsistent study spec
    #[error("invalid study spec: {0}")]
    SpecValidation(String),

    /// Malformed, duplicate, or empty documents
    #[error("invalid dataset: {0}")]
    DatasetValidation(String),

    /// Missing, out-of-range, empty, or overlapping target spans
    #[error("unitization failed: {0}")]
    Unitization(String),

    /// Odd document counts, unequal two-file lengths, missing secondary dataset
    #[error("compare pairing failed: {0}")]
    Pairing(String),

    /// Missing or blank context metadata, sidecar gaps and duplicates
    #[error("compare context resolution failed: {0}")]
    ContextResolution(String),
}

pub type Result<T> = std::result::Result<T, Error>;
