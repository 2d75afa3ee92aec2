use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Unauthorized - token may be expired")]
    Unauthorized,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Rejected by the backend: {0}")]
    Validation(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            // The cap is in bytes; back it off to a char boundary so a
            // multi-byte character straddling it cannot split the slice.
            let mut cut = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..cut], body.len())
        }
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let truncated = Self::truncate_body(body);
        match status.as_u16() {
            400 => ApiError::BadRequest(truncated),
            401 => ApiError::Unauthorized,
            403 => ApiError::AccessDenied(truncated),
            404 => ApiError::NotFound(truncated),
            422 => ApiError::Validation(truncated),
            429 => ApiError::RateLimited,
            500..=599 => ApiError::ServerError(truncated),
            _ => ApiError::InvalidResponse(format!("Status {}: {}", status, truncated)),
        }
    }

    /// Transport-class failures where retrying the same call later can
    /// reasonably succeed. Everything else needs a different request or a
    /// fresh session first.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ApiError::NetworkError(_) | ApiError::RateLimited | ApiError::ServerError(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_from_status_mapping() {
        assert!(matches!(
            ApiError::from_status(StatusCode::UNAUTHORIZED, ""),
            ApiError::Unauthorized
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::UNPROCESSABLE_ENTITY, "too scary"),
            ApiError::Validation(_)
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::TOO_MANY_REQUESTS, ""),
            ApiError::RateLimited
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::BAD_GATEWAY, ""),
            ApiError::ServerError(_)
        ));
    }

    #[test]
    fn test_truncates_long_body() {
        let body = "x".repeat(2000);
        let err = ApiError::from_status(StatusCode::INTERNAL_SERVER_ERROR, &body);
        let message = err.to_string();
        assert!(message.len() < 700);
        assert!(message.contains("truncated, 2000 total bytes"));
    }

    #[test]
    fn test_truncates_multibyte_body_on_char_boundary() {
        // The 'é' occupies bytes 499..501, straddling the byte cap.
        let body = format!("{}é{}", "x".repeat(499), "y".repeat(100));
        let err = ApiError::from_status(StatusCode::INTERNAL_SERVER_ERROR, &body);
        let message = err.to_string();
        assert!(message.contains("truncated, 601 total bytes"));
        assert!(!message.contains('é'));
    }

    #[test]
    fn test_recoverability_classes() {
        assert!(ApiError::RateLimited.is_recoverable());
        assert!(ApiError::ServerError("502".into()).is_recoverable());
        assert!(!ApiError::Unauthorized.is_recoverable());
        assert!(!ApiError::Validation("nope".into()).is_recoverable());
        assert!(!ApiError::NotFound("gone".into()).is_recoverable());
    }
}
