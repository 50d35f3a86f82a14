//! Error types for the recognition pipeline.
//!
//! Fatal variants abort the current image (or page) and are returned to the
//! caller. Recoverable variants describe a single dropped candidate; the
//! pipeline never returns them; they are counted in the
//! [`ProcessingReport`](crate::pipeline::ProcessingReport) instead.
//!
//! ```
//! use scorescan::OmrError;
//!
//! let err = OmrError::MultiPageOrderMismatch("page list is empty".to_string());
//! assert_eq!(err.to_string(), "Inconsistent page list: page list is empty");
//! assert!(err.is_fatal());
//! ```

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum OmrError {
    /// No group of five evenly spaced lines was found in the image.
    #[error("No staff detected in image")]
    NoStaffDetected,

    /// Staves were found but no note or rest could be recognized.
    #[error("No symbols detected: staff found but no notes or rests recognized")]
    NoSymbolsDetected,

    /// The multi-page input is empty or names the same page twice.
    #[error("Inconsistent page list: {0}")]
    MultiPageOrderMismatch(String),

    /// A stem, beam or accidental with nothing to attach to.
    #[error("Unresolved association: {0}")]
    UnresolvedAssociation(String),

    /// A glyph that matched more than one signature equally well.
    #[error("Ambiguous glyph: {0}")]
    AmbiguousGlyph(String),

    /// Caller-supplied configuration is out of range.
    #[error("Invalid options: {0}")]
    InvalidOptions(String),

    /// A report could not be written as JSON.
    #[error("JSON serialization error: {0}")]
    Serialization(String),

    /// The batch worker pool could not be created.
    #[error("Worker pool error: {0}")]
    WorkerPool(String),
}

impl OmrError {
    /// Whether this error aborts the image it was raised for.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            OmrError::UnresolvedAssociation(_) | OmrError::AmbiguousGlyph(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, OmrError>;
