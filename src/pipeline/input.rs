//! Input handling: validate and decode the base64 payload, then materialise it
//! as a transient file for the engine.
//!
//! ## Why a temp file?
//!
//! Engines open documents by path. Writing the decoded bytes to a
//! `NamedTempFile` gives them a path while guaranteeing the file disappears
//! when [`TransientArtifact`] is released or dropped, even if the request
//! task panics.
//!
//! ## Prefix-only validation
//!
//! [`validate_pdf_base64`] decodes only the first
//! [`VALIDATION_PREFIX_CHARS`] characters. A payload that is valid at the
//! start but malformed later passes validation and fails in
//! [`decode_pdf_base64`] instead.

use crate::error::ServiceError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// Number of leading base64 characters decoded during validation.
///
/// A multiple of 4, so any well-formed payload decodes cleanly at this cut.
pub const VALIDATION_PREFIX_CHARS: usize = 100;

/// Check that `payload` is non-empty and starts with valid base64.
pub fn validate_pdf_base64(payload: &str) -> Result<(), ServiceError> {
    if payload.is_empty() {
        return Err(ServiceError::Validation(
            "Base64 string cannot be empty".to_string(),
        ));
    }

    let prefix: Vec<u8> = significant_bytes(payload)
        .take(VALIDATION_PREFIX_CHARS)
        .collect();

    STANDARD
        .decode(&prefix)
        .map(|_| ())
        .map_err(|_| ServiceError::Validation("Invalid base64 encoded string".to_string()))
}

/// Decode the whole payload. ASCII whitespace (line wrapping) is ignored.
pub fn decode_pdf_base64(payload: &str) -> Result<Vec<u8>, ServiceError> {
    let compact: Vec<u8> = significant_bytes(payload).collect();
    let bytes = STANDARD
        .decode(&compact)
        .map_err(|e| ServiceError::Decode(format!("Invalid base64 payload: {e}")))?;
    debug!("Decoded payload → {} bytes", bytes.len());
    Ok(bytes)
}

fn significant_bytes(payload: &str) -> impl Iterator<Item = u8> + '_ {
    payload.bytes().filter(|b| !b.is_ascii_whitespace())
}

/// A decoded PDF written to a uniquely named temporary file.
pub struct TransientArtifact {
    file: NamedTempFile,
}

impl TransientArtifact {
    /// Write `bytes` to a fresh `pdf-parser-*.pdf` file in `dir` (or the
    /// system temp dir) on a blocking thread.
    pub async fn create(bytes: Vec<u8>, dir: Option<PathBuf>) -> Result<Self, ServiceError> {
        tokio::task::spawn_blocking(move || Self::create_blocking(&bytes, dir.as_deref()))
            .await
            .map_err(|e| ServiceError::Internal(format!("Temp file task panicked: {e}")))?
    }

    /// Blocking implementation of [`TransientArtifact::create`].
    pub fn create_blocking(bytes: &[u8], dir: Option<&Path>) -> Result<Self, ServiceError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("pdf-parser-").suffix(".pdf");

        let mut file = match dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
        .map_err(|e| ServiceError::Internal(format!("Failed to create temp file: {e}")))?;

        file.write_all(bytes)
            .and_then(|_| file.flush())
            .map_err(|e| ServiceError::Internal(format!("Failed to write temp file: {e}")))?;

        info!("Temporary PDF saved to {}", file.path().display());
        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Delete the file. Failures are logged, never returned.
    pub fn release(self) {
        let path = self.file.path().to_path_buf();
        match self.file.close() {
            Ok(()) => info!("Temporary PDF deleted: {}", path.display()),
            Err(e) => warn!("Failed to delete temporary PDF {}: {}", path.display(), e),
        }
    }
}
