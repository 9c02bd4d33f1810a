//! Configuration types for the service and for each engine conversion.
//!
//! Two records live here:
//!
//! * [`ServerConfig`] — process-wide knobs (bind address, engine location,
//!   asset store, limits), built once at startup via [`ServerConfigBuilder`].
//! * [`ConversionOptions`] — the per-conversion record handed to the engine.
//!   The service always uses [`ConversionOptions::pinned`].

use crate::error::ServiceError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Default public base for mocked image URLs.
pub const DEFAULT_MOCK_BASE_URL: &str = "https://example.com/images";

/// Configuration for the HTTP service.
///
/// Built via [`ServerConfig::builder()`] or using [`ServerConfig::default()`].
///
/// # Example
/// ```rust
/// use pdf_parser_api::{ImageEncoding, ServerConfig};
///
/// let config = ServerConfig::builder()
///     .port(8080)
///     .image_encoding(ImageEncoding::Png)
///     .publish_concurrency(8)
///     .build()
///     .unwrap();
/// assert_eq!(config.port, 8080);
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct ServerConfig {
    /// Interface to bind. Default: `0.0.0.0`.
    pub host: String,

    /// TCP port. Default: 8000.
    pub port: u16,

    /// Directory containing the PDFium shared library.
    /// If None, the system library search path is used.
    pub pdfium_lib_path: Option<PathBuf>,

    /// Directory for transient PDF artifacts. If None, the system temp dir.
    pub scratch_dir: Option<PathBuf>,

    /// Encoding applied to every extracted image before publishing. Default: JPEG.
    pub image_encoding: ImageEncoding,

    /// Where extracted images are published. Default: mocked URLs.
    pub asset_store: AssetStoreKind,

    /// Maximum concurrent image uploads per request. Default: 4.
    pub publish_concurrency: usize,

    /// Maximum engine invocations running at once across all requests.
    /// None means unbounded. Default: None.
    pub max_concurrent_conversions: Option<usize>,

    /// Maximum accepted request body in bytes. Default: 100 MiB.
    ///
    /// Base64 inflates a PDF by a third, so this admits PDFs up to ~75 MiB.
    pub max_body_bytes: usize,

    /// Timeout for a single image upload in seconds. Default: 30.
    pub upload_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            pdfium_lib_path: None,
            scratch_dir: None,
            image_encoding: ImageEncoding::default(),
            asset_store: AssetStoreKind::default(),
            publish_concurrency: 4,
            max_concurrent_conversions: None,
            max_body_bytes: 100 * 1024 * 1024,
            upload_timeout_secs: 30,
        }
    }
}

impl ServerConfig {
    /// Create a new builder for `ServerConfig`.
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder {
            config: Self::default(),
        }
    }

    /// `host:port` string suitable for `TcpListener::bind`.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Builder for [`ServerConfig`].
#[derive(Debug)]
pub struct ServerConfigBuilder {
    config: ServerConfig,
}

impl ServerConfigBuilder {
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    pub fn pdfium_lib_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_lib_path = Some(path.into());
        self
    }

    pub fn scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.scratch_dir = Some(dir.into());
        self
    }

    pub fn image_encoding(mut self, encoding: ImageEncoding) -> Self {
        self.config.image_encoding = encoding;
        self
    }

    pub fn asset_store(mut self, kind: AssetStoreKind) -> Self {
        self.config.asset_store = kind;
        self
    }

    pub fn publish_concurrency(mut self, n: usize) -> Self {
        self.config.publish_concurrency = n;
        self
    }

    pub fn max_concurrent_conversions(mut self, n: usize) -> Self {
        self.config.max_concurrent_conversions = Some(n);
        self
    }

    pub fn max_body_bytes(mut self, n: usize) -> Self {
        self.config.max_body_bytes = n;
        self
    }

    pub fn upload_timeout_secs(mut self, secs: u64) -> Self {
        self.config.upload_timeout_secs = secs;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ServerConfig, ServiceError> {
        let c = &self.config;
        if c.host.trim().is_empty() {
            return Err(ServiceError::InvalidConfig("host must not be empty".into()));
        }
        if c.publish_concurrency == 0 {
            return Err(ServiceError::InvalidConfig(
                "publish concurrency must be ≥ 1".into(),
            ));
        }
        if c.max_concurrent_conversions == Some(0) {
            return Err(ServiceError::InvalidConfig(
                "max concurrent conversions must be ≥ 1".into(),
            ));
        }
        if c.max_body_bytes < 1024 {
            return Err(ServiceError::InvalidConfig(format!(
                "max body size must be ≥ 1024 bytes, got {}",
                c.max_body_bytes
            )));
        }
        if let AssetStoreKind::Http {
            upload_url,
            public_base_url,
        } = &c.asset_store
        {
            for (name, url) in [("upload", upload_url), ("public base", public_base_url)] {
                if !(url.starts_with("http://") || url.starts_with("https://")) {
                    return Err(ServiceError::InvalidConfig(format!(
                        "{name} URL must be http(s), got '{url}'"
                    )));
                }
            }
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Which [`crate::pipeline::publish::AssetStore`] the service publishes to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum AssetStoreKind {
    /// No upload; synthesise `{base_url}/{uuid}` per image.
    Mock { base_url: String },
    /// `PUT` each image to `{upload_url}/{name}`, serve from `{public_base_url}/{name}`.
    Http {
        upload_url: String,
        public_base_url: String,
    },
}

impl Default for AssetStoreKind {
    fn default() -> Self {
        AssetStoreKind::Mock {
            base_url: DEFAULT_MOCK_BASE_URL.to_string(),
        }
    }
}

/// Encoding applied to extracted images before they are published.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageEncoding {
    Png,
    #[default]
    Jpeg,
}

impl ImageEncoding {
    pub fn extension(self) -> &'static str {
        match self {
            ImageEncoding::Png => "png",
            ImageEncoding::Jpeg => "jpeg",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            ImageEncoding::Png => "image/png",
            ImageEncoding::Jpeg => "image/jpeg",
        }
    }
}

impl FromStr for ImageEncoding {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "png" => Ok(ImageEncoding::Png),
            "jpeg" | "jpg" => Ok(ImageEncoding::Jpeg),
            other => Err(ServiceError::InvalidConfig(format!(
                "image encoding must be png or jpeg, got '{other}'"
            ))),
        }
    }
}

/// Text format the engine renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Markdown,
    Json,
    Html,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 3] = [OutputFormat::Markdown, OutputFormat::Json, OutputFormat::Html];

    pub fn as_str(self) -> &'static str {
        match self {
            OutputFormat::Markdown => "markdown",
            OutputFormat::Json => "json",
            OutputFormat::Html => "html",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OutputFormat::ALL
            .into_iter()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| {
                ServiceError::Validation(
                    "Output format must be one of [markdown, json, html]".to_string(),
                )
            })
    }
}

// ── Page range ───────────────────────────────────────────────────────────

/// Page selection in the engine's 0-indexed syntax, e.g. `"0,5-10,20"`.
///
/// Ranges are inclusive on both ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRange {
    spec: String,
    spans: Vec<(usize, usize)>,
}

impl PageRange {
    /// The selector as the caller wrote it.
    pub fn as_str(&self) -> &str {
        &self.spec
    }

    /// Expand into a sorted, deduplicated list of 0-indexed pages below `total_pages`.
    pub fn to_indices(&self, total_pages: usize) -> Vec<usize> {
        let mut indices: Vec<usize> = self
            .spans
            .iter()
            .flat_map(|&(start, end)| start..=end.min(total_pages.saturating_sub(1)))
            .filter(|&p| p < total_pages)
            .collect();
        indices.sort_unstable();
        indices.dedup();
        indices
    }
}

impl fmt::Display for PageRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.spec)
    }
}

impl FromStr for PageRange {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let spec = s.trim();
        if spec.is_empty() {
            return Err(ServiceError::Validation("Page range cannot be empty".into()));
        }

        let parse_page = |p: &str| {
            p.trim().parse::<usize>().map_err(|_| {
                ServiceError::Validation(format!("Invalid page number in range: '{}'", p.trim()))
            })
        };

        let mut spans = Vec::new();
        for item in spec.split(',') {
            if let Some((start, end)) = item.split_once('-') {
                let start = parse_page(start)?;
                let end = parse_page(end)?;
                if start > end {
                    return Err(ServiceError::Validation(format!(
                        "Invalid page range '{start}-{end}': start must be <= end"
                    )));
                }
                spans.push((start, end));
            } else {
                let page = parse_page(item)?;
                spans.push((page, page));
            }
        }

        Ok(PageRange {
            spec: spec.to_string(),
            spans,
        })
    }
}

// ── Conversion options ───────────────────────────────────────────────────

/// Options for a single engine conversion. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversionOptions {
    pub output_format: OutputFormat,
    pub page_range: Option<PageRange>,
    /// Comma-separated language hints for OCR-capable engines.
    pub languages: Option<String>,
    pub force_ocr: bool,
    /// Separate pages with a numbered horizontal rule.
    pub paginate_output: bool,
    /// Upper bound on the engine's internal parallelism.
    pub workers: usize,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self::pinned()
    }
}

impl ConversionOptions {
    /// The fixed options every service request is converted with:
    /// markdown output, all pages, no language override, no forced OCR,
    /// no pagination and a single worker.
    pub fn pinned() -> Self {
        Self {
            output_format: OutputFormat::Markdown,
            page_range: None,
            languages: None,
            force_ocr: false,
            paginate_output: false,
            workers: 1,
        }
    }

    pub fn builder() -> ConversionOptionsBuilder {
        ConversionOptionsBuilder {
            options: Self::pinned(),
            output_format: None,
            page_range: None,
        }
    }
}

/// Builder for [`ConversionOptions`]. String-typed fields are validated in `build`.
#[derive(Debug)]
pub struct ConversionOptionsBuilder {
    options: ConversionOptions,
    output_format: Option<String>,
    page_range: Option<String>,
}

impl ConversionOptionsBuilder {
    pub fn output_format(mut self, format: impl Into<String>) -> Self {
        self.output_format = Some(format.into());
        self
    }

    pub fn page_range(mut self, range: impl Into<String>) -> Self {
        self.page_range = Some(range.into());
        self
    }

    pub fn languages(mut self, languages: impl Into<String>) -> Self {
        self.options.languages = Some(languages.into());
        self
    }

    pub fn force_ocr(mut self, v: bool) -> Self {
        self.options.force_ocr = v;
        self
    }

    pub fn paginate_output(mut self, v: bool) -> Self {
        self.options.paginate_output = v;
        self
    }

    pub fn workers(mut self, n: usize) -> Self {
        self.options.workers = n.max(1);
        self
    }

    pub fn build(mut self) -> Result<ConversionOptions, ServiceError> {
        if let Some(format) = self.output_format {
            self.options.output_format = format.parse()?;
        }
        if let Some(range) = self.page_range {
            self.options.page_range = Some(range.parse()?);
        }
        Ok(self.options)
    }
}
