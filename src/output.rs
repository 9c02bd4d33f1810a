//! Response bodies returned by the HTTP API.
//!
//! A request gets exactly one of two shapes: [`ConversionResponse`] on success
//! or [`ErrorResponse`] on failure. The `success` flag is fixed by the
//! constructor of each type, so the two can never be mixed.

use crate::pipeline::publish::ImageReferenceMap;
use serde::Serialize;

/// Body of a successful `POST /v1/convert`.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionResponse {
    success: bool,
    /// Document text with image references rewritten to published URLs.
    pub output: String,
    /// Original image key → published URL.
    pub images: ImageReferenceMap,
    /// Engine metadata, passed through untouched.
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl ConversionResponse {
    pub fn new(
        output: String,
        images: ImageReferenceMap,
        metadata: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        Self {
            success: true,
            output,
            images,
            metadata,
        }
    }

    pub fn success(&self) -> bool {
        self.success
    }
}

/// Body of every failed request.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    success: bool,
    pub error: String,
    /// Field-level errors; present only for validation failures.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<Vec<FieldError>>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
            detail: None,
        }
    }

    /// A validation failure at `loc`, e.g. `["body", "pdf_base64"]`.
    pub fn validation(loc: &[&str], msg: impl Into<String>) -> Self {
        let msg = msg.into();
        Self {
            success: false,
            detail: Some(vec![FieldError {
                loc: loc.iter().map(|s| s.to_string()).collect(),
                msg: msg.clone(),
                kind: "value_error".to_string(),
            }]),
            error: msg,
        }
    }

    pub fn success(&self) -> bool {
        self.success
    }
}

/// One invalid field in a request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    /// Path to the field, e.g. `["body", "pdf_base64"]`.
    pub loc: Vec<String>,
    pub msg: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn success_body_shape() {
        let images: ImageReferenceMap = [("img_0".to_string(), "https://x/1".to_string())]
            .into_iter()
            .collect();
        let mut metadata = serde_json::Map::new();
        metadata.insert("page_count".into(), json!(1));

        let body = serde_json::to_value(ConversionResponse::new("text".into(), images, metadata)).unwrap();
        assert_eq!(
            body,
            json!({
                "success": true,
                "output": "text",
                "images": {"img_0": "https://x/1"},
                "metadata": {"page_count": 1}
            })
        );
    }

    #[test]
    fn plain_error_has_no_detail() {
        let body = serde_json::to_value(ErrorResponse::new("boom")).unwrap();
        assert_eq!(body, json!({"success": false, "error": "boom"}));
    }

    #[test]
    fn validation_error_names_field() {
        let error = ErrorResponse::validation(&["body", "pdf_base64"], "Base64 string cannot be empty");
        let body = serde_json::to_value(error).unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["detail"][0]["loc"], json!(["body", "pdf_base64"]));
        assert_eq!(body["detail"][0]["type"], "value_error");
        assert_eq!(body["detail"][0]["msg"], "Base64 string cannot be empty");
    }
}
