//! Pipeline stages wrapped around the engine call.
//!
//! Each submodule implements exactly one transformation step, so each is
//! testable without an engine or a server.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ [engine] ──▶ encode ──▶ publish ──▶ postprocess
//! (base64,    (opaque)    (png/jpeg)  (store)     (rewrite refs)
//!  temp file)
//! ```
//!
//! 1. [`input`]   — validate the base64 prefix, decode, and materialise the
//!    bytes as a transient `.pdf` file that is always cleaned up
//! 2. [`encode`]  — serialise each extracted `DynamicImage` to the configured
//!    encoding
//! 3. [`publish`] — hand each encoded image to an `AssetStore` and collect the
//!    returned URLs into an `ImageReferenceMap`
//! 4. [`postprocess`] — rewrite `![alt](key)` links to the published URLs, plus
//!    the page-text tidy rules the engine applies before assembly

pub mod encode;
pub mod input;
pub mod postprocess;
pub mod publish;
