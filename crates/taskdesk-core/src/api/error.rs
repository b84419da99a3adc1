//! Structured errors for backend calls.

use std::fmt;

use serde_json::Value;

/// Categories of API errors for consistent error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorKind {
    /// HTTP 401: missing, expired or rejected credentials
    Auth,
    /// Transport failure (connection refused, DNS, timeout)
    Network,
    /// Any other non-2xx status
    Server,
    /// 2xx response whose body could not be decoded
    Parse,
    /// Token pair could not be persisted
    Storage,
}

impl fmt::Display for ApiErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiErrorKind::Auth => write!(f, "auth"),
            ApiErrorKind::Network => write!(f, "network"),
            ApiErrorKind::Server => write!(f, "server"),
            ApiErrorKind::Parse => write!(f, "parse"),
            ApiErrorKind::Storage => write!(f, "storage"),
        }
    }
}

/// Structured error from the backend or the transport.
#[derive(Debug, Clone)]
pub struct ApiError {
    /// Error category
    pub kind: ApiErrorKind,
    /// HTTP status, when a response was received
    pub status: Option<u16>,
    /// One-line summary suitable for display
    pub message: String,
    /// Optional additional details (e.g., raw error body)
    pub details: Option<String>,
}

impl ApiError {
    pub fn new(kind: ApiErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            status: None,
            message: message.into(),
            details: None,
        }
    }

    /// Creates an error from a non-2xx status and its body.
    ///
    /// 401 maps to [`ApiErrorKind::Auth`]; everything else to [`ApiErrorKind::Server`].
    pub fn http_status(status: u16, body: &str) -> Self {
        let kind = if status == 401 {
            ApiErrorKind::Auth
        } else {
            ApiErrorKind::Server
        };
        let details = (!body.is_empty()).then(|| body.to_string());
        let message = match extract_message(body) {
            Some(msg) => format!("HTTP {status}: {msg}"),
            None => format!("HTTP {status}"),
        };
        Self {
            kind,
            status: Some(status),
            message,
            details,
        }
    }

    pub fn network(err: &reqwest::Error) -> Self {
        let message = if err.is_timeout() {
            "Request timed out".to_string()
        } else if err.is_connect() {
            "Could not connect to the server".to_string()
        } else {
            "Request failed".to_string()
        };
        Self {
            kind: ApiErrorKind::Network,
            status: None,
            message,
            details: Some(err.to_string()),
        }
    }

    pub fn parse(context: &str, err: &impl fmt::Display) -> Self {
        Self {
            kind: ApiErrorKind::Parse,
            status: None,
            message: format!("Failed to parse {context}"),
            details: Some(err.to_string()),
        }
    }

    pub fn storage(err: &anyhow::Error) -> Self {
        Self {
            kind: ApiErrorKind::Storage,
            status: None,
            message: "Failed to persist session tokens".to_string(),
            details: Some(format!("{err:#}")),
        }
    }

    pub fn is_auth(&self) -> bool {
        self.kind == ApiErrorKind::Auth
    }
}

/// Pulls a human-readable message out of common JSON error bodies
/// (`{"message": ...}`, `{"message": [...]}`, `{"error": {"message": ...}}`).
fn extract_message(body: &str) -> Option<String> {
    let json: Value = serde_json::from_str(body).ok()?;
    let message = json
        .get("message")
        .or_else(|| json.get("error").and_then(|e| e.get("message")))
        .or_else(|| json.get("error"))?;
    match message {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Array(items) => {
            let parts: Vec<&str> = items.iter().filter_map(Value::as_str).collect();
            (!parts.is_empty()).then(|| parts.join("; "))
        }
        _ => None,
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ApiError {}

/// Result type for API operations.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_401_is_auth() {
        let err = ApiError::http_status(401, r#"{"message":"Unauthorized"}"#);
        assert_eq!(err.kind, ApiErrorKind::Auth);
        assert!(err.is_auth());
        assert_eq!(err.status, Some(401));
        assert_eq!(err.message, "HTTP 401: Unauthorized");
    }

    #[test]
    fn test_other_statuses_are_server() {
        let err = ApiError::http_status(404, "");
        assert_eq!(err.kind, ApiErrorKind::Server);
        assert_eq!(err.message, "HTTP 404");
        assert!(err.details.is_none());
    }

    #[test]
    fn test_validation_array_messages_are_joined() {
        let err = ApiError::http_status(
            400,
            r#"{"message":["title should not be empty","status must be valid"],"error":"Bad Request"}"#,
        );
        assert_eq!(
            err.message,
            "HTTP 400: title should not be empty; status must be valid"
        );
    }

    #[test]
    fn test_nested_error_message() {
        let err = ApiError::http_status(500, r#"{"error":{"message":"boom"}}"#);
        assert_eq!(err.message, "HTTP 500: boom");
        assert!(err.details.is_some());
    }

    #[test]
    fn test_plain_text_body_kept_as_details() {
        let err = ApiError::http_status(502, "Bad Gateway");
        assert_eq!(err.message, "HTTP 502");
        assert_eq!(err.details.as_deref(), Some("Bad Gateway"));
    }
}
