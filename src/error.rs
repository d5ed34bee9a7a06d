//! Error types and HTTP error response handling.
//!
//! This module defines all application errors and how they are converted
//! into HTTP responses. Client-facing errors are rendered as problem details
//! (`application/problem+json`) with a machine-readable `type`.

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// Failure of the key or subscription store.
///
/// Fatal to the operation that hit it, never to the process.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Failure delivering a webhook to a single subscriber.
///
/// Recovered locally by the dispatcher: logged and counted, never returned to the emitter.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("Subscriber responded with HTTP {0}")]
    Status(u16),

    #[error("Request timed out")]
    Timeout,

    #[error("Request failed: {0}")]
    Transport(String),

    #[error("Failed to serialize payload: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Delivery task aborted: {0}")]
    Aborted(String),
}

impl From<reqwest::Error> for DeliveryError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            DeliveryError::Timeout
        } else {
            DeliveryError::Transport(err.to_string())
        }
    }
}

/// Application-wide error type.
///
/// # Error Categories
///
/// - **Authentication Errors**: Invalid or revoked API keys, missing identity
/// - **Abuse Control**: Per-key quota exhausted
/// - **Storage Errors**: Registry persistence unavailable
/// - **Validation Errors**: Invalid request data or webhook URLs
/// - **Resource Errors**: Requested resources not found
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Credential is missing, invalid, or revoked.
    ///
    /// Returns HTTP 401 Unauthorized.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Per-key fixed window quota exceeded.
    ///
    /// Returns HTTP 429 with a `Retry-After` header.
    #[error("Rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimitExceeded { retry_after_secs: u64 },

    /// Returns HTTP 500; details are hidden from the client.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Request body or parameters are invalid.
    ///
    /// Returns HTTP 400 Bad Request.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Webhook URL rejected during registration.
    #[error("Invalid webhook URL: {0}")]
    InvalidWebhookUrl(String),

    /// Returns HTTP 404 Not Found.
    #[error("{0} not found")]
    NotFound(&'static str),
}

impl AppError {
    pub fn unauthorized(detail: impl Into<String>) -> Self {
        AppError::Unauthorized(detail.into())
    }
}

/// RFC 7807 problem details body.
#[derive(Debug, Serialize)]
pub struct ProblemDetails {
    #[serde(rename = "type")]
    pub problem_type: &'static str,
    pub title: &'static str,
    pub status: u16,
    pub detail: String,
}

/// Convert AppError into an HTTP response.
///
/// # Response Format
///
/// ```json
/// {
///   "type": "/problems/unauthorized",
///   "title": "Unauthorized",
///   "status": 401,
///   "detail": "Invalid or revoked API key"
/// }
/// ```
///
/// # Status Code Mapping
///
/// - `Unauthorized` → 401
/// - `RateLimitExceeded` → 429 (+ `Retry-After`)
/// - `InvalidRequest` / `InvalidWebhookUrl` → 400
/// - `NotFound` → 404
/// - `Storage` → 500 (hides details from client)
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, problem_type, title) = match &self {
            AppError::Unauthorized(_) => (
                StatusCode::UNAUTHORIZED,
                "/problems/unauthorized",
                "Unauthorized",
            ),
            AppError::RateLimitExceeded { .. } => (
                StatusCode::TOO_MANY_REQUESTS,
                "/problems/rate-limit-exceeded",
                "Too Many Requests",
            ),
            AppError::InvalidRequest(_) => (
                StatusCode::BAD_REQUEST,
                "/problems/invalid-request",
                "Invalid Request",
            ),
            AppError::InvalidWebhookUrl(_) => (
                StatusCode::BAD_REQUEST,
                "/problems/invalid-webhook-url",
                "Invalid Webhook URL",
            ),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "/problems/not-found", "Not Found"),
            AppError::Storage(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "/problems/internal-error",
                "Internal Server Error",
            ),
        };

        let detail = match &self {
            AppError::Unauthorized(detail) => detail.clone(),
            AppError::InvalidRequest(msg) | AppError::InvalidWebhookUrl(msg) => msg.clone(),
            AppError::Storage(err) => {
                tracing::error!(error = %err, "Storage operation failed");
                "An internal error occurred".to_string()
            }
            other => other.to_string(),
        };

        let body = ProblemDetails {
            problem_type,
            title,
            status: status.as_u16(),
            detail,
        };

        let mut response = (status, Json(body)).into_response();
        let headers = response.headers_mut();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/problem+json"),
        );
        if let AppError::RateLimitExceeded { retry_after_secs } = self {
            headers.insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
        }

        response
    }
}
