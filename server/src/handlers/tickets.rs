use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::extract::rejection::JsonRejection;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;

use crate::models::ScanDirection;
use crate::services::ScanInput;
use crate::state::AppState;
use crate::utils::actor::Actor;
use crate::utils::error::AppError;
use crate::utils::extract::extract_json;
use crate::utils::response::outcome;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanRequest {
    #[serde(default)]
    pub ticket_code: Option<String>,
    #[serde(default)]
    pub ticket_id: Option<i64>,
}

impl ScanRequest {
    /// An explicit id wins over a code when both are sent.
    fn into_input(self) -> Result<ScanInput, AppError> {
        match (self.ticket_id, self.ticket_code) {
            (Some(id), _) => Ok(ScanInput::TicketId(id)),
            (None, Some(code)) => Ok(ScanInput::Code(code)),
            (None, None) => Err(AppError::ValidationError(
                "Vui lòng cung cấp mã vé hoặc ID vé".to_string(),
            )),
        }
    }
}

pub async fn check_in(
    State(state): State<AppState>,
    actor: Actor,
    body: Result<Json<ScanRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let request = extract_json(body)?;
    scan(state, actor, request, ScanDirection::CheckIn).await
}

pub async fn check_out(
    State(state): State<AppState>,
    actor: Actor,
    body: Result<Json<ScanRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let request = extract_json(body)?;
    scan(state, actor, request, ScanDirection::CheckOut).await
}

async fn scan(
    state: AppState,
    actor: Actor,
    request: ScanRequest,
    direction: ScanDirection,
) -> Result<Response, AppError> {
    let input = request.into_input()?;
    let batch = state
        .scanner
        .scan(direction, actor.id, &input, Utc::now())
        .await?;

    let message = batch.summary(direction);
    Ok(outcome(batch.all_succeeded(), batch, message).into_response())
}
