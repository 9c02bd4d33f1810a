//! The document engine and its process-wide lifecycle.
//!
//! An engine turns a PDF on disk into `(text, images, metadata)`. All the heavy
//! lifting (parsing, text and image extraction) happens inside the engine; the
//! rest of the crate only adapts requests to it.
//!
//! ## Lifecycle
//!
//! ```text
//!  Loading ──load ok──▶ Ready ──unload──▶ Unloaded
//!     │
//!     └──load err──▶ Failed
//! ```
//!
//! [`EngineHandle`] owns that state behind an `RwLock`. Requests read it
//! through [`EngineHandle::get`], which only hands out an engine in `Ready`;
//! every other state is reported as unavailable so callers never block on a
//! half-loaded engine.

pub mod pdfium;

use crate::config::ConversionOptions;
use crate::error::{EngineError, ServiceError};
use image::DynamicImage;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{error, info, warn};

pub use pdfium::PdfiumEngine;

/// Message returned while the engine has not finished loading.
pub const NOT_LOADED: &str = "Models not loaded";

/// A loaded document-conversion engine.
///
/// Implementations are shared read-only across concurrent requests, so
/// `convert` must not mutate shared state. `convert` is blocking; callers run
/// it on a blocking thread.
pub trait DocumentEngine: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Convert the PDF at `path`.
    fn convert(
        &self,
        path: &Path,
        options: &ConversionOptions,
    ) -> Result<RawConversionResult, EngineError>;

    /// Release engine resources. Called once at shutdown.
    fn unload(&self) {}
}

/// Everything an engine extracts from one document.
#[derive(Debug, Default)]
pub struct RawConversionResult {
    /// Rendered text; markdown output references images as `![alt](key)`.
    pub text: String,
    /// Extracted images keyed by the identifiers used in `text`.
    pub images: BTreeMap<String, DynamicImage>,
    /// Free-form document metadata.
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// Observable engine state.
#[derive(Clone)]
pub enum EngineState {
    Loading,
    Ready(Arc<dyn DocumentEngine>),
    Failed(String),
    Unloaded,
}

impl std::fmt::Debug for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineState::Loading => f.write_str("Loading"),
            EngineState::Ready(engine) => write!(f, "Ready({})", engine.name()),
            EngineState::Failed(reason) => write!(f, "Failed({reason})"),
            EngineState::Unloaded => f.write_str("Unloaded"),
        }
    }
}

/// Shared, explicitly initialised handle to the process engine.
///
/// Cloning is cheap; all clones observe the same state.
#[derive(Clone)]
pub struct EngineHandle {
    state: Arc<RwLock<EngineState>>,
}

impl Default for EngineHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineHandle {
    /// A handle in the `Loading` state.
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(EngineState::Loading)),
        }
    }

    /// A handle that is already `Ready` with `engine`.
    pub fn ready(engine: Arc<dyn DocumentEngine>) -> Self {
        Self {
            state: Arc::new(RwLock::new(EngineState::Ready(engine))),
        }
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> EngineState {
        self.read().clone()
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state(), EngineState::Ready(_))
    }

    /// The engine, if ready.
    ///
    /// # Errors
    /// [`ServiceError::EngineUnavailable`] in every state but `Ready`.
    pub fn get(&self) -> Result<Arc<dyn DocumentEngine>, ServiceError> {
        let guard = self.read();
        match &*guard {
            EngineState::Ready(engine) => Ok(Arc::clone(engine)),
            EngineState::Loading => Err(ServiceError::EngineUnavailable(NOT_LOADED.into())),
            EngineState::Failed(reason) => Err(ServiceError::EngineUnavailable(format!(
                "{NOT_LOADED}: {reason}"
            ))),
            EngineState::Unloaded => Err(ServiceError::EngineUnavailable(
                "Engine unloaded: service is shutting down".into(),
            )),
        }
    }

    /// Run `loader` on a blocking thread and publish its outcome.
    ///
    /// On success the handle becomes `Ready`; on failure `Failed` with the
    /// loader's message. The error is also returned to the caller.
    ///
    /// The outcome is only published while the handle is still `Loading`. If
    /// [`EngineHandle::unload`] ran in the meantime the state stays
    /// `Unloaded` and a freshly loaded engine is unloaded straight away.
    pub async fn load_with<F>(&self, loader: F) -> Result<(), EngineError>
    where
        F: FnOnce() -> Result<Arc<dyn DocumentEngine>, EngineError> + Send + 'static,
    {
        info!("Loading engine...");
        let outcome = tokio::task::spawn_blocking(loader)
            .await
            .unwrap_or_else(|e| Err(EngineError::LoadFailed(format!("loader panicked: {e}"))));

        match outcome {
            Ok(engine) => {
                if self.finish_loading(EngineState::Ready(Arc::clone(&engine))) {
                    info!(engine = engine.name(), "Engine loaded successfully");
                } else {
                    warn!(engine = engine.name(), "Engine loaded after shutdown, unloading");
                    engine.unload();
                }
                Ok(())
            }
            Err(e) => {
                error!("Engine failed to load: {}", e);
                self.finish_loading(EngineState::Failed(e.to_string()));
                Err(e)
            }
        }
    }

    /// Move to `Unloaded` and release the engine, if one was loaded.
    pub fn unload(&self) {
        let previous = std::mem::replace(&mut *self.write(), EngineState::Unloaded);
        if let EngineState::Ready(engine) = previous {
            info!(engine = engine.name(), "Unloading engine");
            engine.unload();
        }
    }

    /// Replace `Loading` with `next`. Returns false, leaving the state
    /// untouched, if the handle already left `Loading`.
    fn finish_loading(&self, next: EngineState) -> bool {
        let mut guard = self.write();
        if matches!(*guard, EngineState::Loading) {
            *guard = next;
            true
        } else {
            false
        }
    }

    // A poisoned lock still holds a valid state; every accessor recovers it.
    fn read(&self) -> RwLockReadGuard<'_, EngineState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, EngineState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}
