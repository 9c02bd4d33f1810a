//! Server lifecycle: bind → load engine in background → serve → unload.
//!
//! The listener comes up before the engine has loaded, so `/v1/health`
//! answers immediately while `/v1/convert` returns 503 until PDFium is bound.
//! On Ctrl-C or SIGTERM the server stops accepting connections, drains
//! in-flight requests and then unloads the engine.

use crate::api::build_router;
use crate::config::ServerConfig;
use crate::convert::ConversionService;
use crate::engine::{DocumentEngine, EngineHandle, PdfiumEngine};
use crate::error::ServiceError;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

/// Run the service described by `config` until a shutdown signal arrives.
pub async fn run(config: ServerConfig) -> Result<(), ServiceError> {
    let addr = config.bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| ServiceError::Internal(format!("Failed to bind {addr}: {e}")))?;

    let engine = EngineHandle::new();
    let service = ConversionService::from_config(&config, engine.clone())?;

    let loader = engine.clone();
    let lib_dir = config.pdfium_lib_path.clone();
    tokio::spawn(async move {
        // Failures are recorded in the handle and logged by `load_with`.
        let _ = loader
            .load_with(move || {
                PdfiumEngine::load(lib_dir.as_deref()).map(|e| Arc::new(e) as Arc<dyn DocumentEngine>)
            })
            .await;
    });

    serve(listener, service, config.max_body_bytes, shutdown_signal()).await
}

/// Serve `service` on `listener` until `shutdown` resolves, then unload the
/// service's engine.
pub async fn serve<F>(
    listener: TcpListener,
    service: ConversionService,
    max_body_bytes: usize,
    shutdown: F,
) -> Result<(), ServiceError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let engine = service.engine().clone();
    let app = build_router(service, max_body_bytes);

    if let Ok(addr) = listener.local_addr() {
        info!("PDF Parser API listening on http://{}", addr);
    }

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| ServiceError::Internal(format!("Server error: {e}")));

    info!("Server stopped");
    engine.unload();
    served
}

/// Resolves on Ctrl-C, or SIGTERM on Unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl-C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
