//! The conversion request pipeline.
//!
//! [`ConversionService::convert_base64`] is the whole of `POST /v1/convert`
//! minus HTTP: readiness check, base64 validation and decode, transient file,
//! engine call, image publishing, reference rewriting and response assembly.
//!
//! ## Why is every request independent?
//!
//! Each call owns its temp file, its image map and its reference map. The
//! only shared pieces are the read-only engine, the asset store and an
//! optional semaphore bounding concurrent engine calls, so requests never
//! observe each other.

use crate::config::{ConversionOptions, ServerConfig};
use crate::engine::{DocumentEngine, EngineHandle, RawConversionResult};
use crate::error::ServiceError;
use crate::output::ConversionResponse;
use crate::pipeline::input::{self, TransientArtifact};
use crate::pipeline::publish::AssetPublisher;
use crate::pipeline::{encode, postprocess};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{debug, error, info};

/// Shared state for conversion requests. Cheap to clone.
#[derive(Clone)]
pub struct ConversionService {
    engine: EngineHandle,
    publisher: AssetPublisher,
    scratch_dir: Option<PathBuf>,
    permits: Option<Arc<Semaphore>>,
}

impl ConversionService {
    pub fn new(engine: EngineHandle, publisher: AssetPublisher) -> Self {
        Self {
            engine,
            publisher,
            scratch_dir: None,
            permits: None,
        }
    }

    /// Build the service described by `config` around `engine`.
    pub fn from_config(config: &ServerConfig, engine: EngineHandle) -> Result<Self, ServiceError> {
        let publisher = AssetPublisher::from_config(config)?;
        let mut service = Self::new(engine, publisher);
        service.scratch_dir = config.scratch_dir.clone();
        service.permits = config
            .max_concurrent_conversions
            .map(|n| Arc::new(Semaphore::new(n)));
        Ok(service)
    }

    /// Place transient PDFs in `dir` instead of the system temp dir.
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    pub fn engine(&self) -> &EngineHandle {
        &self.engine
    }

    /// Fail with [`ServiceError::EngineUnavailable`] unless the engine is ready.
    pub fn ensure_ready(&self) -> Result<(), ServiceError> {
        self.engine.get().map(|_| ())
    }

    /// Convert one base64-encoded PDF.
    ///
    /// # Errors
    /// * [`ServiceError::EngineUnavailable`] — engine not ready (checked first)
    /// * [`ServiceError::Validation`] — empty payload or invalid base64 prefix
    /// * [`ServiceError::Decode`] — the full payload is not valid base64
    /// * [`ServiceError::Conversion`] — the engine rejected the document
    /// * [`ServiceError::Publish`] — an image could not be published
    pub async fn convert_base64(&self, payload: &str) -> Result<ConversionResponse, ServiceError> {
        let start = Instant::now();
        let engine = self.engine.get()?;

        input::validate_pdf_base64(payload)?;
        let bytes = input::decode_pdf_base64(payload)?;
        info!("Converting PDF ({} bytes) with {}", bytes.len(), engine.name());

        let artifact = TransientArtifact::create(bytes, self.scratch_dir.clone()).await?;
        let raw = self.run_engine(engine, &artifact).await;
        artifact.release();
        let raw = raw?;

        let image_count = raw.images.len();
        let response = self.assemble(raw).await?;

        info!(
            "Conversion complete: {} chars, {} images, {}ms",
            response.output.len(),
            image_count,
            start.elapsed().as_millis()
        );
        Ok(response)
    }

    async fn run_engine(
        &self,
        engine: Arc<dyn DocumentEngine>,
        artifact: &TransientArtifact,
    ) -> Result<RawConversionResult, ServiceError> {
        let _permit = match &self.permits {
            Some(permits) => Some(
                Arc::clone(permits)
                    .acquire_owned()
                    .await
                    .map_err(|e| ServiceError::Internal(format!("Conversion limiter closed: {e}")))?,
            ),
            None => None,
        };

        let path = artifact.path().to_path_buf();
        let options = ConversionOptions::pinned();
        let engine_start = Instant::now();

        let raw = tokio::task::spawn_blocking(move || engine.convert(&path, &options))
            .await
            .map_err(|e| ServiceError::Internal(format!("Engine task panicked: {e}")))?
            .map_err(|e| {
                error!("Engine failed: {}", e);
                ServiceError::from(e)
            })?;

        debug!(
            "Engine returned {} chars and {} images in {}ms",
            raw.text.len(),
            raw.images.len(),
            engine_start.elapsed().as_millis()
        );
        Ok(raw)
    }

    async fn assemble(&self, raw: RawConversionResult) -> Result<ConversionResponse, ServiceError> {
        let RawConversionResult {
            text,
            images,
            metadata,
        } = raw;

        let encoding = self.publisher.encoding();
        let encoded = tokio::task::spawn_blocking(move || encode::encode_all(&images, encoding))
            .await
            .map_err(|e| ServiceError::Internal(format!("Encoding task panicked: {e}")))??;

        let refs = self.publisher.publish_all(encoded).await?;
        let output = postprocess::rewrite_image_references(&text, &refs);

        Ok(ConversionResponse::new(output, refs, metadata))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ImageEncoding;
    use crate::error::EngineError;
    use crate::pipeline::publish::MockAssetStore;
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use image::{DynamicImage, Rgb, RgbImage};
    use std::collections::BTreeMap;
    use std::path::Path;
    use std::sync::Mutex;

    /// Engine that records the file it was given and either returns one
    /// image referenced as `img_0` or fails.
    struct FakeEngine {
        fail: bool,
        seen: Mutex<Option<(PathBuf, Vec<u8>)>>,
    }

    impl FakeEngine {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                fail,
                seen: Mutex::new(None),
            })
        }

        fn seen(&self) -> (PathBuf, Vec<u8>) {
            self.seen.lock().unwrap().clone().expect("engine was not called")
        }
    }

    impl DocumentEngine for FakeEngine {
        fn name(&self) -> &str {
            "fake"
        }

        fn convert(&self, path: &Path, options: &ConversionOptions) -> Result<RawConversionResult, EngineError> {
            assert_eq!(options, &ConversionOptions::pinned());
            let bytes = std::fs::read(path).unwrap();
            *self.seen.lock().unwrap() = Some((path.to_path_buf(), bytes));

            if self.fail {
                return Err(EngineError::CorruptPdf {
                    path: path.to_path_buf(),
                    detail: "FormatError".into(),
                });
            }

            let mut images = BTreeMap::new();
            images.insert(
                "img_0".to_string(),
                DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 4, Rgb([0, 128, 255]))),
            );
            let mut metadata = serde_json::Map::new();
            metadata.insert("page_count".into(), serde_json::json!(1));
            Ok(RawConversionResult {
                text: "# Report\n\n![fig](img_0)\n".into(),
                images,
                metadata,
            })
        }
    }

    fn service(engine: Arc<FakeEngine>, scratch: &Path) -> ConversionService {
        let publisher = AssetPublisher::new(
            Arc::new(MockAssetStore::new("https://example.com/images")),
            ImageEncoding::Jpeg,
            4,
        );
        ConversionService::new(EngineHandle::ready(engine), publisher).with_scratch_dir(scratch)
    }

    fn scratch_is_empty(dir: &Path) -> bool {
        std::fs::read_dir(dir).unwrap().next().is_none()
    }

    #[tokio::test]
    async fn image_reference_is_rewritten_to_published_url() {
        let scratch = tempfile::tempdir().unwrap();
        let engine = FakeEngine::new(false);
        let svc = service(engine.clone(), scratch.path());

        let response = svc.convert_base64(&STANDARD.encode(b"%PDF-1.4 fake")).await.unwrap();

        assert!(response.success());
        assert_eq!(response.images.len(), 1);
        let url = response.images.get("img_0").unwrap();
        assert!(url.starts_with("https://example.com/images/"));
        assert!(response.output.contains(&format!("![fig]({url})")));
        assert!(!response.output.contains("(img_0)"));
        assert_eq!(response.metadata["page_count"], 1);

        let (path, bytes) = engine.seen();
        assert_eq!(bytes, b"%PDF-1.4 fake");
        assert!(!path.exists());
        assert!(scratch_is_empty(scratch.path()));
    }

    #[tokio::test]
    async fn engine_failure_still_removes_temp_file() {
        let scratch = tempfile::tempdir().unwrap();
        let engine = FakeEngine::new(true);
        let svc = service(engine.clone(), scratch.path());

        let err = svc.convert_base64(&STANDARD.encode(b"garbage")).await.unwrap_err();

        assert!(matches!(err, ServiceError::Conversion(ref m) if m.contains("FormatError")));
        let (path, _) = engine.seen();
        assert!(path.starts_with(scratch.path()));
        assert!(!path.exists());
        assert!(scratch_is_empty(scratch.path()));
    }

    #[tokio::test]
    async fn invalid_payload_never_reaches_engine() {
        let scratch = tempfile::tempdir().unwrap();
        let engine = FakeEngine::new(false);
        let svc = service(engine.clone(), scratch.path());

        for bad in ["", "not-base64!!"] {
            let err = svc.convert_base64(bad).await.unwrap_err();
            assert!(matches!(err, ServiceError::Validation(_)), "{bad:?}: {err:?}");
        }
        assert!(engine.seen.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn unready_engine_is_reported_before_validation() {
        let publisher = AssetPublisher::new(
            Arc::new(MockAssetStore::new("https://example.com/images")),
            ImageEncoding::Jpeg,
            1,
        );
        let svc = ConversionService::new(EngineHandle::new(), publisher);
        assert!(matches!(svc.ensure_ready(), Err(ServiceError::EngineUnavailable(_))));
        let err = svc.convert_base64("").await.unwrap_err();
        assert!(matches!(err, ServiceError::EngineUnavailable(_)));
    }

    #[tokio::test]
    async fn bounded_service_still_converts() {
        let scratch = tempfile::tempdir().unwrap();
        let config = ServerConfig::builder()
            .scratch_dir(scratch.path())
            .max_concurrent_conversions(1)
            .build()
            .unwrap();
        let svc = ConversionService::from_config(&config, EngineHandle::ready(FakeEngine::new(false))).unwrap();

        let payload = STANDARD.encode(b"%PDF-1.4");
        let (a, b) = tokio::join!(svc.convert_base64(&payload), svc.convert_base64(&payload));
        let (a, b) = (a.unwrap(), b.unwrap());
        assert_ne!(a.images.get("img_0"), b.images.get("img_0"));
        assert!(scratch_is_empty(scratch.path()));
    }
}
