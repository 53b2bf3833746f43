//! Chain error types

use thiserror::Error;

/// Result type for chain operations
pub type ChainResult<T> = std::result::Result<T, ChainError>;

/// Errors that can occur while building a dependency chain
///
/// Unresolved references are not errors at any layer; they simply contribute
/// no edge. Everything here aborts the whole build: partial chains are never
/// returned.
#[derive(Debug, Error)]
pub enum ChainError {
    /// A cycle was found on the active traversal path and circular
    /// references are not tolerated (never tolerated for names)
    #[error("Circular reference detected involving {0}")]
    CircularReference(String),

    /// The tokenizer could not make sense of a formula
    #[error("Malformed formula '{formula}': {reason}")]
    MalformedFormula {
        /// The offending formula text
        formula: String,
        /// What the tokenizer choked on
        reason: String,
    },

    /// Collaborator model failure
    #[error(transparent)]
    Core(#[from] sheetcalc_core::Error),
}
