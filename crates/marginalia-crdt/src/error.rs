//! Error types for the transport-facing document paths.
//!
//! The mutation and projection surfaces never return these: routine
//! concurrent-editing races degrade to silent no-ops by contract. Errors
//! exist only where bytes cross the boundary (import/export, token decode).

use thiserror::Error;

/// Errors on the document import/export and anchor-decode paths.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum AnnotError {
    /// Failed to import document data.
    #[error("failed to import document data: {0}")]
    Import(String),

    /// Failed to export document data.
    #[error("failed to export document data: {0}")]
    Export(String),

    /// An anchor token could not be decoded.
    #[error("malformed anchor token: {0}")]
    BadAnchorToken(String),
}

impl From<loro::LoroError> for AnnotError {
    fn from(e: loro::LoroError) -> Self {
        AnnotError::Import(e.to_string())
    }
}
