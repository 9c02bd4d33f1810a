//! Error types for the pdf-parser-api library.
//!
//! Three error types reflect the three collaborators a request touches:
//!
//! * [`ServiceError`] — what a conversion request can fail with. Each variant
//!   maps to exactly one HTTP status in [`crate::api::error`].
//!
//! * [`EngineError`] — raised by a [`crate::engine::DocumentEngine`] while
//!   loading or converting. Folded into [`ServiceError::Conversion`] or
//!   [`ServiceError::EngineUnavailable`] at the service boundary.
//!
//! * [`PublishError`] — raised by an [`crate::pipeline::publish::AssetStore`]
//!   when an image cannot be made retrievable.

use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by [`crate::convert::ConversionService`].
#[derive(Debug, Error)]
pub enum ServiceError {
    // ── Client errors ─────────────────────────────────────────────────────
    /// The request payload is malformed (empty, not base64, bad option).
    #[error("{0}")]
    Validation(String),

    // ── Availability ──────────────────────────────────────────────────────
    /// The engine is still loading, failed to load, or has been unloaded.
    #[error("{0}")]
    EngineUnavailable(String),

    // ── Processing errors ─────────────────────────────────────────────────
    /// The payload passed prefix validation but the full decode failed.
    #[error("{0}")]
    Decode(String),

    /// The engine rejected the document.
    #[error("{0}")]
    Conversion(String),

    /// An extracted image could not be encoded or published.
    #[error("{0}")]
    Publish(String),

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error. The message is logged, never sent to clients.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<EngineError> for ServiceError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::LoadFailed(reason) => ServiceError::EngineUnavailable(reason),
            other => ServiceError::Conversion(other.to_string()),
        }
    }
}

impl From<PublishError> for ServiceError {
    fn from(err: PublishError) -> Self {
        ServiceError::Publish(err.to_string())
    }
}

/// Errors raised by a document engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine's backing library could not be loaded.
    #[error("Failed to load engine: {0}")]
    LoadFailed(String),

    /// The document could not be opened (corrupt header, xref, trailer…).
    #[error("PDF '{path}' could not be opened: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// The document requires a password.
    #[error("PDF '{path}' is encrypted and requires a password")]
    PasswordRequired { path: PathBuf },

    /// A single page failed during extraction.
    #[error("Extraction failed for page {page}: {detail}")]
    PageFailed { page: usize, detail: String },

    /// The requested page range selects nothing in this document.
    #[error("Page range '{range}' selects no pages (document has {total} pages)")]
    EmptySelection { range: String, total: usize },

    /// The options ask for something this engine cannot do.
    #[error("Unsupported option: {0}")]
    Unsupported(String),

    /// Rendering the extracted content into the requested format failed.
    #[error("Rendering failed: {0}")]
    Render(String),
}

/// Errors raised while publishing an extracted image.
#[derive(Debug, Error)]
pub enum PublishError {
    /// The image could not be serialised to the output encoding.
    #[error("Failed to encode image '{key}': {detail}")]
    Encode { key: String, detail: String },

    /// The upload request could not be sent.
    #[error("Upload to '{url}' failed: {reason}")]
    Upload { url: String, reason: String },

    /// The store answered with a non-success status.
    #[error("Upload to '{url}' was rejected with HTTP {status}")]
    Rejected { url: String, status: u16 },

    /// The store handed out a URL it had already returned for another image.
    #[error("Asset store returned duplicate reference '{url}'")]
    DuplicateReference { url: String },
}
