//! Error types for image editing sessions.

use std::time::Duration;

/// Message shown when a submission is attempted without an image or prompt.
pub const VALIDATION_MESSAGE: &str = "Please upload an image and enter a prompt.";

/// Message shown for every remote-side failure. Internal detail is only logged.
pub const REMOTE_FAILURE_MESSAGE: &str =
    "Failed to generate image. The model may have refused the request. Please try a different prompt.";

/// Message shown when a local image could not be read or is not supported.
pub const READ_FAILURE_MESSAGE: &str = "An unexpected error occurred. Please try again.";

/// Errors that can occur while preparing, submitting, or storing an edit.
#[derive(Debug, thiserror::Error)]
pub enum EditError {
    /// Missing image or empty prompt at submission time.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A submission is already in flight.
    #[error("an edit request is already in flight")]
    RequestInFlight,

    /// The local image file could not be read.
    #[error("failed to read image: {0}")]
    Read(#[source] std::io::Error),

    /// The declared media type is not one we can send.
    #[error("unsupported media type: {0}")]
    UnsupportedMediaType(String),

    /// API key missing or rejected.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Sanitized response body.
        message: String,
    },

    /// Quota exceeded.
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited {
        /// Server-suggested delay, if any.
        retry_after: Option<Duration>,
    },

    /// Network or HTTP transport error.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The service produced no usable candidate (e.g. safety refusal).
    #[error("empty response: {0}")]
    EmptyResponse(String),

    /// The service response lacked the expected inline image data.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// Startup configuration is missing or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error (e.g., saving the result).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Coarse classification of an [`EditError`], stable across messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Precondition failure before any network call.
    Validation,
    /// Single-flight guard rejection.
    Busy,
    /// Local file could not be used.
    Read,
    /// Transport, auth, or quota failure.
    RemoteCall,
    /// No usable candidate returned.
    EmptyResponse,
    /// Unexpected response shape.
    MalformedResponse,
    /// Startup configuration problem.
    Config,
    /// Local output problem.
    Output,
}

impl EditError {
    /// Returns the coarse kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::RequestInFlight => ErrorKind::Busy,
            Self::Read(_) | Self::UnsupportedMediaType(_) => ErrorKind::Read,
            Self::Auth(_) | Self::Api { .. } | Self::RateLimited { .. } | Self::Network(_) => {
                ErrorKind::RemoteCall
            }
            Self::EmptyResponse(_) => ErrorKind::EmptyResponse,
            Self::MalformedResponse(_) => ErrorKind::MalformedResponse,
            Self::Config(_) => ErrorKind::Config,
            Self::Io(_) | Self::Json(_) => ErrorKind::Output,
        }
    }

    /// Returns the text to display to the user for this error.
    ///
    /// Remote-side failures collapse to one message; the distinction between
    /// them is only visible through [`EditError::kind`] and the logs.
    pub fn user_message(&self) -> String {
        match self.kind() {
            ErrorKind::Validation => match self {
                Self::Validation(msg) => msg.clone(),
                _ => VALIDATION_MESSAGE.to_string(),
            },
            ErrorKind::RemoteCall | ErrorKind::EmptyResponse | ErrorKind::MalformedResponse => {
                REMOTE_FAILURE_MESSAGE.to_string()
            }
            ErrorKind::Read => READ_FAILURE_MESSAGE.to_string(),
            _ => self.to_string(),
        }
    }

    /// Returns the suggested retry delay reported by the service, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

/// Result type alias for editing operations.
pub type Result<T> = std::result::Result<T, EditError>;

/// Parses a `Retry-After` header given in seconds.
pub(crate) fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

const MAX_ERROR_BODY: usize = 500;

/// Redacts anything that looks like an API key and caps the length of an
/// error body before it is embedded in an error.
pub(crate) fn sanitize_error_message(text: &str) -> String {
    let redacted: Vec<String> = text
        .split_whitespace()
        .map(|word| {
            let token =
                word.trim_matches(|c: char| !c.is_ascii_alphanumeric() && c != '_' && c != '-');
            if token.starts_with("AIza") && token.len() >= 30 {
                word.replace(token, "[REDACTED]")
            } else {
                word.to_string()
            }
        })
        .collect();
    let joined = redacted.join(" ");
    if joined.chars().count() > MAX_ERROR_BODY {
        let truncated: String = joined.chars().take(MAX_ERROR_BODY).collect();
        format!("{truncated}...")
    } else {
        joined
    }
}
