//! HTTP surface of the service.
//!
//! Routes:
//!
//! | Method | Path            | Handler                       |
//! |--------|-----------------|-------------------------------|
//! | GET    | `/`             | 301 → `/docs`                 |
//! | GET    | `/docs`         | Swagger UI                    |
//! | GET    | `/openapi.json` | OpenAPI document              |
//! | GET    | `/v1/health`    | liveness, independent of engine |
//! | POST   | `/v1/convert`   | base64 PDF → markdown + images |
//!
//! [`build_router`] returns a plain `Router` so tests can drive it with
//! `tower::ServiceExt::oneshot` without binding a socket.

pub mod error;
pub mod handlers;
pub mod router;

pub use error::ApiError;
pub use router::build_router;
