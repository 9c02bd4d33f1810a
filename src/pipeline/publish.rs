//! Asset publishing: make every extracted image retrievable by URL.
//!
//! The store is a capability behind [`AssetStore`]: `publish(bytes, encoding)
//! → url`. Two implementations ship:
//!
//! * [`MockAssetStore`] — uploads nothing and synthesises
//!   `{base_url}/{uuid}`; the default.
//! * [`HttpAssetStore`] — `PUT`s the bytes to a blob endpoint and returns the
//!   public URL of the stored object.
//!
//! Whatever the store, [`AssetPublisher::publish_all`] guarantees one distinct
//! URL per image: identifiers are random per call, never derived from content
//! or keys, and a store that repeats a URL fails the request.

use crate::config::{AssetStoreKind, ImageEncoding, ServerConfig};
use crate::error::{PublishError, ServiceError};
use crate::pipeline::encode::EncodedImage;
use async_trait::async_trait;
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

/// A place images can be published to.
#[async_trait]
pub trait AssetStore: Send + Sync {
    /// Store `bytes` and return a URL from which they can be retrieved.
    ///
    /// Must return a different URL on every call.
    async fn publish(&self, bytes: Vec<u8>, encoding: ImageEncoding) -> Result<String, PublishError>;
}

/// Stand-in store: no upload, a fresh random URL per image.
#[derive(Debug, Clone)]
pub struct MockAssetStore {
    base_url: String,
}

impl MockAssetStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl AssetStore for MockAssetStore {
    async fn publish(&self, bytes: Vec<u8>, encoding: ImageEncoding) -> Result<String, PublishError> {
        let url = format!("{}/{}", self.base_url, Uuid::new_v4());
        debug!("Mock-published {} bytes {} → {}", bytes.len(), encoding.extension(), url);
        Ok(url)
    }
}

/// Store that uploads with HTTP `PUT` to any blob endpoint accepting it
/// (S3-compatible gateways, presigned prefixes, WebDAV…).
#[derive(Debug, Clone)]
pub struct HttpAssetStore {
    client: reqwest::Client,
    upload_url: String,
    public_base_url: String,
}

impl HttpAssetStore {
    pub fn new(
        upload_url: impl Into<String>,
        public_base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServiceError::InvalidConfig(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            upload_url: upload_url.into().trim_end_matches('/').to_string(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl AssetStore for HttpAssetStore {
    async fn publish(&self, bytes: Vec<u8>, encoding: ImageEncoding) -> Result<String, PublishError> {
        let name = format!("{}.{}", Uuid::new_v4(), encoding.extension());
        let target = format!("{}/{}", self.upload_url, name);

        let response = self
            .client
            .put(&target)
            .header(reqwest::header::CONTENT_TYPE, encoding.mime_type())
            .body(bytes)
            .send()
            .await
            .map_err(|e| PublishError::Upload {
                url: target.clone(),
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(PublishError::Rejected {
                url: target,
                status: response.status().as_u16(),
            });
        }

        debug!("Uploaded image to {}", target);
        Ok(format!("{}/{}", self.public_base_url, name))
    }
}

/// Original image key → published URL, for one conversion.
///
/// Built once via `FromIterator`; read-only afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ImageReferenceMap(BTreeMap<String, String>);

impl ImageReferenceMap {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl FromIterator<(String, String)> for ImageReferenceMap {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Publishes a request's images through the configured store.
#[derive(Clone)]
pub struct AssetPublisher {
    store: Arc<dyn AssetStore>,
    encoding: ImageEncoding,
    concurrency: usize,
}

impl AssetPublisher {
    pub fn new(store: Arc<dyn AssetStore>, encoding: ImageEncoding, concurrency: usize) -> Self {
        Self {
            store,
            encoding,
            concurrency: concurrency.max(1),
        }
    }

    /// Build the store selected by `config`.
    pub fn from_config(config: &ServerConfig) -> Result<Self, ServiceError> {
        let store: Arc<dyn AssetStore> = match &config.asset_store {
            AssetStoreKind::Mock { base_url } => {
                info!("Images are mock-published under {}", base_url);
                Arc::new(MockAssetStore::new(base_url.clone()))
            }
            AssetStoreKind::Http {
                upload_url,
                public_base_url,
            } => {
                info!("Images are uploaded to {}", upload_url);
                Arc::new(HttpAssetStore::new(
                    upload_url.clone(),
                    public_base_url.clone(),
                    Duration::from_secs(config.upload_timeout_secs),
                )?)
            }
        };
        Ok(Self::new(store, config.image_encoding, config.publish_concurrency))
    }

    pub fn encoding(&self) -> ImageEncoding {
        self.encoding
    }

    /// Publish every image, up to `concurrency` at a time.
    ///
    /// # Errors
    /// The first store failure, or [`PublishError::DuplicateReference`] if the
    /// store returns a URL twice.
    pub async fn publish_all(&self, images: Vec<EncodedImage>) -> Result<ImageReferenceMap, PublishError> {
        let total = images.len();
        let store = &self.store;

        let published: Vec<(String, String)> = stream::iter(images)
            .map(|image| async move {
                let url = store.publish(image.bytes, image.encoding).await?;
                Ok::<_, PublishError>((image.key, url))
            })
            .buffer_unordered(self.concurrency)
            .try_collect()
            .await?;

        let mut seen = HashSet::with_capacity(total);
        for (_, url) in &published {
            if !seen.insert(url.as_str()) {
                return Err(PublishError::DuplicateReference { url: url.clone() });
            }
        }

        debug!("Published {} images", total);
        Ok(published.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Bytes;
    use axum::extract::Path;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::put;
    use axum::Router;
    use std::sync::Mutex;

    fn image(key: &str, bytes: &[u8]) -> EncodedImage {
        EncodedImage {
            key: key.to_string(),
            bytes: bytes.to_vec(),
            encoding: ImageEncoding::Png,
        }
    }

    struct ConstantStore;

    #[async_trait]
    impl AssetStore for ConstantStore {
        async fn publish(&self, _bytes: Vec<u8>, _e: ImageEncoding) -> Result<String, PublishError> {
            Ok("https://cdn.local/same".into())
        }
    }

    #[tokio::test]
    async fn mock_urls_are_distinct_for_identical_images() {
        let publisher = AssetPublisher::new(
            Arc::new(MockAssetStore::new("https://example.com/images/")),
            ImageEncoding::Png,
            4,
        );
        let images = (0..16).map(|i| image(&format!("img_{i}"), b"same bytes")).collect();
        let refs = publisher.publish_all(images).await.unwrap();

        assert_eq!(refs.len(), 16);
        let urls: HashSet<_> = refs.iter().map(|(_, url)| url).collect();
        assert_eq!(urls.len(), 16);
        for (_, url) in refs.iter() {
            let id = url.strip_prefix("https://example.com/images/").expect("base prefix");
            assert!(Uuid::parse_str(id).is_ok(), "not a uuid: {id}");
        }
    }

    #[tokio::test]
    async fn empty_input_gives_empty_map() {
        let publisher = AssetPublisher::new(
            Arc::new(MockAssetStore::new("https://example.com/images")),
            ImageEncoding::Jpeg,
            1,
        );
        assert!(publisher.publish_all(vec![]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn repeated_url_is_rejected() {
        let publisher = AssetPublisher::new(Arc::new(ConstantStore), ImageEncoding::Png, 2);
        let err = publisher
            .publish_all(vec![image("a", b"1"), image("b", b"2")])
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::DuplicateReference { .. }));
    }

    #[tokio::test]
    async fn single_image_with_constant_store_is_fine() {
        let publisher = AssetPublisher::new(Arc::new(ConstantStore), ImageEncoding::Png, 2);
        let refs = publisher.publish_all(vec![image("a", b"1")]).await.unwrap();
        assert_eq!(refs.get("a"), Some("https://cdn.local/same"));
    }

    type Uploads = Arc<Mutex<Vec<(String, String, usize)>>>;

    async fn spawn_blob_server(status: StatusCode) -> (String, Uploads) {
        let uploads: Uploads = Arc::new(Mutex::new(Vec::new()));
        let recorded = uploads.clone();
        let app = Router::new().route(
            "/uploads/:name",
            put(move |Path(name): Path<String>, headers: HeaderMap, body: Bytes| {
                let recorded = recorded.clone();
                async move {
                    let content_type = headers
                        .get("content-type")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or_default()
                        .to_string();
                    recorded.lock().unwrap().push((name, content_type, body.len()));
                    status
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}/uploads"), uploads)
    }

    #[tokio::test]
    async fn http_store_puts_bytes_and_returns_public_url() {
        let (upload_url, uploads) = spawn_blob_server(StatusCode::CREATED).await;
        let store = HttpAssetStore::new(upload_url, "https://cdn.local/img/", Duration::from_secs(5)).unwrap();

        let url = store.publish(vec![1, 2, 3], ImageEncoding::Jpeg).await.unwrap();

        let uploads = uploads.lock().unwrap();
        assert_eq!(uploads.len(), 1);
        let (name, content_type, len) = &uploads[0];
        assert!(name.ends_with(".jpeg"), "got: {name}");
        assert_eq!(content_type, "image/jpeg");
        assert_eq!(*len, 3);
        assert_eq!(url, format!("https://cdn.local/img/{name}"));
    }

    #[tokio::test]
    async fn http_store_surfaces_rejection() {
        let (upload_url, _) = spawn_blob_server(StatusCode::FORBIDDEN).await;
        let store = HttpAssetStore::new(upload_url, "https://cdn.local", Duration::from_secs(5)).unwrap();
        let err = store.publish(vec![0], ImageEncoding::Png).await.unwrap_err();
        assert!(matches!(err, PublishError::Rejected { status: 403, .. }));
    }

    #[test]
    fn from_config_selects_store() {
        let config = ServerConfig::builder()
            .asset_store(AssetStoreKind::Http {
                upload_url: "http://127.0.0.1:9/uploads".into(),
                public_base_url: "https://cdn.local".into(),
            })
            .image_encoding(ImageEncoding::Png)
            .build()
            .unwrap();
        let publisher = AssetPublisher::from_config(&config).unwrap();
        assert_eq!(publisher.encoding(), ImageEncoding::Png);
    }
}
