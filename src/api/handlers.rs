//! Route handlers.

use crate::api::error::ApiError;
use crate::convert::ConversionService;
use crate::output::ConversionResponse;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse};
use axum::Json;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Name reported by the health endpoint.
pub const SERVICE_NAME: &str = "PDF Parser API";

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
}

/// Body of `POST /v1/convert`.
#[derive(Debug, Deserialize)]
pub struct ConvertRequest {
    pub pdf_base64: String,
}

/// `GET /v1/health` — always healthy once the listener is up, whatever the
/// engine state.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: SERVICE_NAME,
    })
}

/// `POST /v1/convert` — convert a base64-encoded PDF.
///
/// Engine readiness is checked before the body is looked at, so an unready
/// service answers 503 to any request.
pub async fn convert(
    State(service): State<ConversionService>,
    body: Result<Json<ConvertRequest>, JsonRejection>,
) -> Result<Json<ConversionResponse>, ApiError> {
    service.ensure_ready()?;

    let Json(request) = body.map_err(|rejection| match rejection {
        // Well-formed JSON of the wrong shape: the field itself is at fault.
        JsonRejection::JsonDataError(_) => ApiError::Validation(rejection.body_text()),
        _ if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            ApiError::PayloadTooLarge(rejection.body_text())
        }
        _ => ApiError::MalformedBody(rejection.body_text()),
    })?;

    let response = service.convert_base64(&request.pdf_base64).await?;
    Ok(Json(response))
}

/// `GET /` — redirect to the interactive docs.
pub async fn root() -> impl IntoResponse {
    (StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, "/docs")])
}

/// `GET /docs` — Swagger UI over `/openapi.json`.
pub async fn docs() -> Html<&'static str> {
    Html(DOCS_PAGE)
}

/// `GET /openapi.json`.
pub async fn openapi() -> Json<serde_json::Value> {
    Json(OPENAPI.clone())
}

const DOCS_PAGE: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8" />
  <title>PDF Parser API</title>
  <link rel="stylesheet" href="https://unpkg.com/swagger-ui-dist@5/swagger-ui.css" />
</head>
<body>
  <div id="swagger-ui"></div>
  <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-bundle.js"></script>
  <script>
    window.ui = SwaggerUIBundle({ url: "/openapi.json", dom_id: "#swagger-ui" });
  </script>
</body>
</html>
"##;

static OPENAPI: Lazy<serde_json::Value> = Lazy::new(|| {
    let error = serde_json::json!({
        "type": "object",
        "properties": {
            "success": {"type": "boolean", "enum": [false]},
            "error": {"type": "string"},
            "detail": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "loc": {"type": "array", "items": {"type": "string"}},
                        "msg": {"type": "string"},
                        "type": {"type": "string"}
                    }
                }
            }
        },
        "required": ["success", "error"]
    });

    serde_json::json!({
        "openapi": "3.0.3",
        "info": {
            "title": SERVICE_NAME,
            "description": "Convert base64-encoded PDFs to markdown with published images",
            "version": env!("CARGO_PKG_VERSION")
        },
        "paths": {
            "/v1/health": {
                "get": {
                    "summary": "Health check",
                    "responses": {
                        "200": {
                            "description": "Service is up",
                            "content": {"application/json": {"schema": {
                                "type": "object",
                                "properties": {
                                    "status": {"type": "string"},
                                    "service": {"type": "string"}
                                }
                            }}}
                        }
                    }
                }
            },
            "/v1/convert": {
                "post": {
                    "summary": "Convert a PDF",
                    "requestBody": {
                        "required": true,
                        "content": {"application/json": {"schema": {
                            "type": "object",
                            "properties": {"pdf_base64": {"type": "string"}},
                            "required": ["pdf_base64"]
                        }}}
                    },
                    "responses": {
                        "200": {
                            "description": "Converted document",
                            "content": {"application/json": {"schema": {
                                "type": "object",
                                "properties": {
                                    "success": {"type": "boolean", "enum": [true]},
                                    "output": {"type": "string"},
                                    "images": {
                                        "type": "object",
                                        "additionalProperties": {"type": "string", "format": "uri"}
                                    },
                                    "metadata": {"type": "object"}
                                }
                            }}}
                        },
                        "422": {"description": "Invalid payload", "content": {"application/json": {"schema": error.clone()}}},
                        "500": {"description": "Conversion failed", "content": {"application/json": {"schema": error.clone()}}},
                        "503": {"description": "Engine not loaded", "content": {"application/json": {"schema": error}}}
                    }
                }
            }
        }
    })
});
