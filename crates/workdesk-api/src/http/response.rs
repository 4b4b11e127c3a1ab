//! Envelope response format for all API responses.
//!
//! Every response is wrapped in a consistent envelope:
//! ```json
//! {
//!   "data": { ... },
//!   "meta": { "request_id": "...", "timestamp": "...", "response_time_ms": 5 },
//!   "errors": [],
//!   "_links": { "self": "..." }
//! }
//! ```
//!
//! `envelope_meta` starts one [`RequestClock`] per request. Handlers extract
//! it for success envelopes; error envelopes are rewritten with it on the way
//! out, so both carry the same request id and a real response time.

use std::collections::HashMap;
use std::convert::Infallible;
use std::time::Instant;

use axum::body::Body;
use axum::extract::{FromRequestParts, Request};
use axum::http::request::Parts;
use axum::http::{StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Envelope response wrapping all API data.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    /// The main response payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,

    /// Request metadata.
    pub meta: ApiMeta,

    /// HATEOAS-style links for discoverability.
    #[serde(rename = "_links", skip_serializing_if = "HashMap::is_empty")]
    pub links: HashMap<String, String>,

    #[serde(skip)]
    status: StatusCode,
}

/// Metadata included in every response.
#[derive(Debug, Serialize)]
pub struct ApiMeta {
    /// Unique request identifier for tracing.
    pub request_id: String,
    /// ISO-8601 timestamp of the response.
    pub timestamp: String,
    /// Response time in milliseconds.
    pub response_time_ms: u64,
}

/// Request id and start time captured when a request arrives.
#[derive(Debug, Clone)]
pub struct RequestClock {
    pub request_id: String,
    started: Instant,
}

impl RequestClock {
    pub fn start() -> Self {
        Self {
            request_id: uuid::Uuid::now_v7().to_string(),
            started: Instant::now(),
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    pub fn meta(&self) -> ApiMeta {
        ApiMeta {
            request_id: self.request_id.clone(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            response_time_ms: self.elapsed_ms(),
        }
    }

    /// Wrap `data` in a 200 envelope.
    pub fn ok<T: Serialize>(&self, data: T) -> ApiResponse<T> {
        ApiResponse::success(data, self.request_id.clone(), self.elapsed_ms())
    }
}

/// The clock `envelope_meta` stored on the request, or a fresh one when the
/// router runs without it.
impl<S: Send + Sync> FromRequestParts<S> for RequestClock {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<RequestClock>()
            .cloned()
            .unwrap_or_else(RequestClock::start))
    }
}

/// Code and message of a failed request. Carried as a response extension.
#[derive(Debug, Clone)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
}

#[derive(Serialize)]
struct ErrorEnvelope<'a> {
    data: Option<()>,
    meta: ApiMeta,
    errors: [ErrorItem<'a>; 1],
    #[serde(rename = "_links")]
    links: HashMap<String, String>,
}

#[derive(Serialize)]
struct ErrorItem<'a> {
    code: &'a str,
    message: &'a str,
}

impl ErrorDetail {
    /// Render the error envelope. `_links` is always present, possibly empty.
    pub fn body(&self, meta: ApiMeta, links: HashMap<String, String>) -> String {
        let envelope = ErrorEnvelope {
            data: None,
            meta,
            errors: [ErrorItem {
                code: self.code,
                message: &self.message,
            }],
            links,
        };
        serde_json::to_string(&envelope).unwrap_or_else(|_| {
            r#"{"errors":[{"code":"SERIALIZATION_ERROR","message":"Failed to serialize response"}]}"#.to_string()
        })
    }
}

/// Start the request clock and stamp error envelopes with it.
pub async fn envelope_meta(mut request: Request, next: Next) -> Response {
    let clock = RequestClock::start();
    let target = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());
    request.extensions_mut().insert(clock.clone());

    let mut response = next.run(request).await;
    if let Some(detail) = response.extensions_mut().remove::<ErrorDetail>() {
        let links = HashMap::from([("self".to_string(), target)]);
        *response.body_mut() = Body::from(detail.body(clock.meta(), links));
        response.headers_mut().remove(header::CONTENT_LENGTH);
    }
    response
}

impl<T: Serialize> ApiResponse<T> {
    /// Create a success response with data.
    pub fn success(data: T, request_id: String, response_time_ms: u64) -> Self {
        Self {
            data: Some(data),
            meta: ApiMeta {
                request_id,
                timestamp: chrono::Utc::now().to_rfc3339(),
                response_time_ms,
            },
            links: HashMap::new(),
            status: StatusCode::OK,
        }
    }

    /// Add a HATEOAS link.
    pub fn with_link(mut self, rel: &str, href: &str) -> Self {
        self.links.insert(rel.to_string(), href.to_string());
        self
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let body = serde_json::to_string(&self).unwrap_or_else(|_| {
            r#"{"errors":[{"code":"SERIALIZATION_ERROR","message":"Failed to serialize response"}]}"#.to_string()
        });

        (
            self.status,
            [(header::CONTENT_TYPE, "application/json")],
            body,
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_shape() {
        let response = ApiResponse::success(serde_json::json!({"id": 1}), "req-1".to_string(), 3)
            .with_link("self", "/api/v1/work-orders/1");
        let value = serde_json::to_value(&response).unwrap();

        assert_eq!(value["data"]["id"], 1);
        assert_eq!(value["meta"]["request_id"], "req-1");
        assert_eq!(value["meta"]["response_time_ms"], 3);
        assert_eq!(value["_links"]["self"], "/api/v1/work-orders/1");
        assert!(value.get("errors").is_none());
    }

    #[test]
    fn test_links_omitted_when_empty() {
        let value = serde_json::to_value(RequestClock::start().ok(42)).unwrap();
        assert!(value.get("_links").is_none());
        assert_eq!(value["data"], 42);
    }

    #[test]
    fn test_error_envelope_shape() {
        let detail = ErrorDetail {
            code: "NOT_FOUND",
            message: "work order 3 not found".to_string(),
        };
        let clock = RequestClock::start();
        let body = detail.body(clock.meta(), HashMap::new());
        let value: serde_json::Value = serde_json::from_str(&body).unwrap();

        assert!(value["data"].is_null());
        assert_eq!(value["meta"]["request_id"], clock.request_id);
        assert_eq!(value["errors"][0]["code"], "NOT_FOUND");
        assert_eq!(value["errors"][0]["message"], "work order 3 not found");
        assert!(value["_links"].as_object().unwrap().is_empty());
    }
}
