//! # pdf-parser-api
//!
//! HTTP service that converts base64-encoded PDFs to Markdown, publishes the
//! images found in them and returns the text with image links pointing at the
//! published URLs.
//!
//! ## Why a service around an engine?
//!
//! Document parsing is the engine's job. Everything around it (payload
//! validation, temp-file hygiene, image publishing, link rewriting, status
//! mapping) is the same whichever engine does the parsing, so it lives here
//! and the engine sits behind the [`engine::DocumentEngine`] trait. The
//! bundled engine is PDFium ([`engine::PdfiumEngine`]).
//!
//! ## Request Pipeline
//!
//! ```text
//! POST /v1/convert {pdf_base64}
//!  │
//!  ├─ 1. Ready    engine loaded? else 503
//!  ├─ 2. Input    validate base64 prefix (422), decode, write temp .pdf
//!  ├─ 3. Engine   convert(path) → text + images + metadata (spawn_blocking)
//!  ├─ 4. Encode   DynamicImage → jpeg/png bytes
//!  ├─ 5. Publish  AssetStore → one fresh URL per image
//!  ├─ 6. Rewrite  ![alt](key) → ![alt](url)
//!  └─ 7. Output   {success, output, images, metadata}
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf_parser_api::{server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::builder().port(8000).build()?;
//!     server::run(config).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf-parser-api` binary (clap + anyhow + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod api;
pub mod config;
pub mod convert;
pub mod engine;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod server;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    AssetStoreKind, ConversionOptions, ConversionOptionsBuilder, ImageEncoding, OutputFormat,
    PageRange, ServerConfig, ServerConfigBuilder,
};
pub use convert::ConversionService;
pub use engine::{DocumentEngine, EngineHandle, EngineState, PdfiumEngine, RawConversionResult};
pub use error::{EngineError, PublishError, ServiceError};
pub use output::{ConversionResponse, ErrorResponse, FieldError};
pub use pipeline::publish::{AssetPublisher, AssetStore, HttpAssetStore, ImageReferenceMap, MockAssetStore};
