use axum::extract::rejection::JsonRejection;
use axum::Json;

use crate::utils::error::AppError;

/// Unwraps a JSON body, turning axum's plain-text rejection into a
/// [`AppError::ValidationError`] so it goes out in the usual envelope.
///
/// ```ignore
/// async fn handler(body: Result<Json<T>, JsonRejection>) -> Result<..., AppError> {
///     let request = extract_json(body)?;
/// }
/// ```
pub fn extract_json<T>(result: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    result.map(|Json(v)| v).map_err(|err| {
        AppError::ValidationError(format!("Dữ liệu yêu cầu không hợp lệ: {}", err.body_text()))
    })
}
