//! Shared HTTP utilities for the URL shortener workspace.
//!
//! Provides request parsing, error-to-status mapping, and JSON body builders
//! used by both api-server and lambda-shortener, so the two transports expose
//! exactly the same contract.

use domain::{CoreError, CreateOutcome};
use serde_json::Value;

pub const MSG_INVALID_URL: &str = "Missing or invalid 'url'.";
pub const MSG_MISSING_CODE: &str = "Missing short code.";
pub const MSG_NOT_FOUND: &str = "Not found";
pub const MSG_METHOD_NOT_ALLOWED: &str = "Method not allowed";
pub const MSG_STORAGE_ERROR: &str = "Storage error";
pub const MSG_SERVER_ERROR: &str = "Server error";

pub const CONTENT_TYPE_JSON: &str = "application/json";

// ============================================================================
// JSON Response Helpers (framework-agnostic)
// ============================================================================

/// Returns: `{"error": "<message>"}`
pub fn json_err(message: &str) -> Value {
    serde_json::json!({ "error": message })
}

/// Returns: `{"error": "<message>", "detail": "<detail>"}`
pub fn json_err_with_detail(message: &str, detail: &str) -> Value {
    serde_json::json!({ "error": message, "detail": detail })
}

/// Body for a successful create, whether or not this call wrote the record.
///
/// Returns: `{"short_code": "...", "target_url": "..."}`
pub fn create_body(outcome: &CreateOutcome) -> Value {
    serde_json::to_value(outcome.view()).unwrap_or_else(|_| {
        serde_json::json!({
            "short_code": outcome.short_code().as_str(),
            "target_url": outcome.target_url(),
        })
    })
}

/// Map a domain error to an HTTP status and JSON body.
pub fn error_reply(err: &CoreError) -> (u16, Value) {
    match err {
        CoreError::InvalidUrl(_) => (400, json_err(MSG_INVALID_URL)),
        CoreError::MissingCode => (400, json_err(MSG_MISSING_CODE)),
        // A malformed code can never name a stored mapping
        CoreError::InvalidCode(_) | CoreError::NotFound => (404, json_err(MSG_NOT_FOUND)),
        CoreError::Storage(detail) => (500, json_err_with_detail(MSG_STORAGE_ERROR, detail)),
    }
}

/// Reply for an unexpected failure outside the domain (body decoding, etc.).
pub fn server_error_reply(detail: &str) -> (u16, Value) {
    (500, json_err_with_detail(MSG_SERVER_ERROR, detail))
}

pub fn method_not_allowed_reply() -> (u16, Value) {
    (405, json_err(MSG_METHOD_NOT_ALLOWED))
}

// ============================================================================
// Request Parsing
// ============================================================================

/// Extract the `url` field from a create request body.
///
/// An empty body is treated as `{}`. Anything that is not a JSON object with a
/// non-empty string `url` is a validation error; nothing is coerced.
pub fn parse_create_body(body: &[u8]) -> Result<String, CoreError> {
    let body = if body.iter().all(u8::is_ascii_whitespace) {
        b"{}".as_slice()
    } else {
        body
    };
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| CoreError::InvalidUrl(format!("bad json: {e}")))?;
    match value.get("url") {
        Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        Some(Value::String(_)) => Err(CoreError::InvalidUrl("empty".into())),
        Some(_) => Err(CoreError::InvalidUrl("url is not a string".into())),
        None => Err(CoreError::InvalidUrl("missing url".into())),
    }
}

/// Pick the short code out of a request path, ignoring any stage prefix
/// (API Gateway includes it in the raw path, e.g. `/dev/abc123`).
pub fn code_from_path(path: &str) -> Option<&str> {
    path.rsplit('/').find(|s| !s.is_empty())
}

// ============================================================================
// Lambda HTTP Helpers (feature-gated)
// ============================================================================

#[cfg(feature = "lambda")]
pub mod lambda {
    //! Lambda-specific HTTP response builders using `lambda_http` types.

    use lambda_http::{Body, Error, Response};

    /// Build an HTTP response with optional header and JSON body.
    pub fn resp(
        status: u16,
        header: Option<(&str, String)>,
        body_json: Option<serde_json::Value>,
    ) -> Result<Response<Body>, Error> {
        let mut rb = Response::builder().status(status);
        if let Some((k, v)) = header {
            rb = rb.header(k, v);
        }
        let resp = match body_json {
            Some(val) => rb
                .header("content-type", crate::CONTENT_TYPE_JSON)
                .body(Body::Text(serde_json::to_string(&val)?))?,
            None => rb.body(Body::Empty)?,
        };
        Ok(resp)
    }

    /// Build a JSON response from a `(status, body)` pair.
    pub fn reply((status, body): (u16, serde_json::Value)) -> Result<Response<Body>, Error> {
        resp(status, None, Some(body))
    }

    /// Build a `302 Found` redirect with an empty body.
    pub fn redirect(location: String) -> Result<Response<Body>, Error> {
        resp(302, Some(("Location", location)), None)
    }

    /// Raw bytes of a request body, whatever encoding API Gateway used.
    pub fn body_bytes(body: &Body) -> &[u8] {
        match body {
            Body::Text(s) => s.as_bytes(),
            Body::Binary(b) => b.as_slice(),
            _ => &[],
        }
    }
}
