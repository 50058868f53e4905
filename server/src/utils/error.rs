use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::config::ConfigError;
use crate::store::StoreError;
use crate::utils::response::error as error_response;

/// Seconds a client should wait before retrying after a lock timeout.
const RETRY_AFTER_SECS: &str = "1";

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Authentication error: {0}")]
    AuthError(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Database error")]
    DatabaseError(#[source] StoreError),

    #[error("Service temporarily unavailable: {0}")]
    Unavailable(String),

    #[error("Configuration error")]
    ConfigError(#[from] ConfigError),
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::LockTimeout => AppError::Unavailable(
                "Hệ thống đang bận xử lý yêu cầu khác, vui lòng thử lại".to_string(),
            ),
            other => AppError::DatabaseError(other),
        }
    }
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::AuthError(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::ConfigError(ConfigError::MissingField { .. }) => StatusCode::BAD_REQUEST,
            AppError::ConfigError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::AuthError(_) => "AUTH_ERROR",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::DatabaseError(_) => "DATABASE_ERROR",
            AppError::Unavailable(_) => "RETRYABLE",
            AppError::ConfigError(ConfigError::MissingField { .. }) => "VALIDATION_ERROR",
            AppError::ConfigError(_) => "CONFIG_ERROR",
        }
    }

    /// Whether the same request may succeed if simply retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Unavailable(_))
    }

    fn log(&self) {
        match self {
            AppError::ValidationError(msg) | AppError::NotFound(msg) => {
                debug!(code = self.code(), message = %msg, "Request rejected");
            }
            AppError::AuthError(msg) | AppError::Forbidden(msg) => {
                info!(code = self.code(), message = %msg, "Request denied");
            }
            AppError::Unavailable(msg) => {
                warn!(message = %msg, "Request timed out waiting for a lock");
            }
            AppError::DatabaseError(e) => {
                error!(error = ?e, "Database error");
            }
            AppError::ConfigError(e) => {
                error!(error = ?e, "Configuration error");
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();

        // Log internal details
        self.log();

        // Only expose high-level message to the client
        let public_message = match &self {
            AppError::ValidationError(msg)
            | AppError::AuthError(msg)
            | AppError::Forbidden(msg)
            | AppError::NotFound(msg)
            | AppError::Unavailable(msg) => msg.clone(),
            AppError::ConfigError(e @ ConfigError::MissingField { .. }) => e.to_string(),
            AppError::DatabaseError(_) | AppError::ConfigError(_) => {
                "Đã xảy ra lỗi hệ thống, vui lòng thử lại sau".to_string()
            }
        };

        // Do not expose internal details in the API response
        let details = None;

        let mut response = error_response(code, public_message, details, status);
        if self.is_retryable() {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from_static(RETRY_AFTER_SECS));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn logged_at_info(err: AppError) -> String {
        let out = Captured::default();
        let writer = out.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, || {
            let _ = err.into_response();
        });
        let bytes = out.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_business_rejections_stay_below_info() {
        assert!(logged_at_info(AppError::NotFound("Không tìm thấy vé".into())).is_empty());
        assert!(logged_at_info(AppError::ValidationError("bad".into())).is_empty());

        let denied = logged_at_info(AppError::Forbidden("no".into()));
        assert!(denied.contains("INFO"));

        let failed = logged_at_info(AppError::from(StoreError::Corrupt("x".into())));
        assert!(failed.contains("ERROR"));
    }

    #[test]
    fn test_lock_timeout_is_retryable() {
        let err = AppError::from(StoreError::LockTimeout);
        assert!(err.is_retryable());
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);

        let response = err.into_response();
        assert_eq!(response.headers()[header::RETRY_AFTER], "1");
    }

    #[test]
    fn test_missing_config_field_is_validation_error() {
        let err = AppError::from(ConfigError::MissingField {
            field: "checkinAllowedBeforeStartMinutes",
        });
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[test]
    fn test_corrupt_row_is_internal() {
        let err = AppError::from(StoreError::Corrupt("bad status".into()));
        assert!(!err.is_retryable());
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.code(), "DATABASE_ERROR");
    }
}
