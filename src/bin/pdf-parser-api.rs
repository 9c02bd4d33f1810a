//! Server binary for pdf-parser-api.
//!
//! A thin shim over the library crate that maps CLI flags and environment
//! variables to `ServerConfig` and runs the server.

use anyhow::{Context, Result};
use clap::Parser;
use pdf_parser_api::{AssetStoreKind, ImageEncoding, ServerConfig};
use std::io;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

const AFTER_HELP: &str = r#"ENDPOINTS:
  GET  /v1/health     liveness check
  POST /v1/convert    {"pdf_base64": "..."} → {success, output, images, metadata}
  GET  /docs          interactive API docs

IMAGE PUBLISHING:
  By default images are not uploaded anywhere; each gets a random URL under
  --mock-base-url. Set --upload-url and --public-base-url to PUT images to a
  blob store instead.

PDFIUM:
  The PDFium shared library is loaded from --pdfium-lib-path (or
  PDFIUM_LIB_PATH), falling back to the system library search path.
"#;

/// HTTP service converting base64-encoded PDFs to Markdown.
#[derive(Parser, Debug)]
#[command(
    name = "pdf-parser-api",
    version,
    about = "HTTP service converting base64-encoded PDFs to Markdown",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Interface to bind.
    #[arg(long, env = "PDF_PARSER_HOST", default_value = "0.0.0.0")]
    host: String,

    /// TCP port.
    #[arg(short, long, env = "PDF_PARSER_PORT", default_value_t = 8000)]
    port: u16,

    /// Directory containing the PDFium shared library.
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib_path: Option<PathBuf>,

    /// Directory for temporary PDF files.
    #[arg(long, env = "PDF_PARSER_SCRATCH_DIR")]
    scratch_dir: Option<PathBuf>,

    /// Encoding of published images: png or jpeg.
    #[arg(long, env = "PDF_PARSER_IMAGE_ENCODING", default_value = "jpeg")]
    image_encoding: ImageEncoding,

    /// Base URL for mock-published images.
    #[arg(long, env = "PDF_PARSER_MOCK_BASE_URL", default_value = pdf_parser_api::config::DEFAULT_MOCK_BASE_URL)]
    mock_base_url: String,

    /// Blob endpoint images are PUT to. Enables real uploads.
    #[arg(long, env = "PDF_PARSER_UPLOAD_URL", requires = "public_base_url")]
    upload_url: Option<String>,

    /// Public base URL under which uploaded images are served.
    #[arg(long, env = "PDF_PARSER_PUBLIC_BASE_URL", requires = "upload_url")]
    public_base_url: Option<String>,

    /// Per-image upload timeout in seconds.
    #[arg(long, env = "PDF_PARSER_UPLOAD_TIMEOUT", default_value_t = 30)]
    upload_timeout: u64,

    /// Concurrent image uploads per request.
    #[arg(long, env = "PDF_PARSER_PUBLISH_CONCURRENCY", default_value_t = 4)]
    publish_concurrency: usize,

    /// Maximum conversions running at once (unbounded if unset).
    #[arg(long, env = "PDF_PARSER_MAX_CONVERSIONS")]
    max_conversions: Option<usize>,

    /// Maximum request body size in MiB.
    #[arg(long, env = "PDF_PARSER_MAX_BODY_MB", default_value_t = 100)]
    max_body_mb: usize,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF_PARSER_VERBOSE")]
    verbose: bool,
}

impl Cli {
    fn into_config(self) -> Result<ServerConfig> {
        let asset_store = match (self.upload_url, self.public_base_url) {
            (Some(upload_url), Some(public_base_url)) => AssetStoreKind::Http {
                upload_url,
                public_base_url,
            },
            _ => AssetStoreKind::Mock {
                base_url: self.mock_base_url,
            },
        };

        let mut builder = ServerConfig::builder()
            .host(self.host)
            .port(self.port)
            .image_encoding(self.image_encoding)
            .asset_store(asset_store)
            .publish_concurrency(self.publish_concurrency)
            .max_body_bytes(self.max_body_mb.saturating_mul(1024 * 1024))
            .upload_timeout_secs(self.upload_timeout);

        if let Some(path) = self.pdfium_lib_path {
            builder = builder.pdfium_lib_path(path);
        }
        if let Some(dir) = self.scratch_dir {
            builder = builder.scratch_dir(dir);
        }
        if let Some(n) = self.max_conversions {
            builder = builder.max_concurrent_conversions(n);
        }

        builder.build().context("Invalid server configuration")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let config = cli.into_config()?;
    tracing::debug!(?config, "Starting server");

    pdf_parser_api::server::run(config)
        .await
        .context("Server failed")
}
