use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::extract::rejection::JsonRejection;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;

use crate::models::ReportAction;
use crate::services::RefundRequest;
use crate::state::AppState;
use crate::utils::actor::{Actor, Role};
use crate::utils::error::AppError;
use crate::utils::extract::extract_json;
use crate::utils::response::outcome;

const MAX_STAFF_NOTE_CHARS: usize = 1000;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessReportRequest {
    pub report_id: i64,
    pub action: ReportAction,
    #[serde(default)]
    pub staff_note: Option<String>,
}

pub async fn process_report(
    State(state): State<AppState>,
    actor: Actor,
    body: Result<Json<ProcessReportRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    actor.require(&[Role::Staff, Role::Admin])?;
    let body = extract_json(body)?;

    if body.report_id <= 0 {
        return Err(AppError::ValidationError(format!(
            "ID báo cáo không hợp lệ: {}",
            body.report_id
        )));
    }
    let staff_note = body
        .staff_note
        .map(|note| note.trim().to_string())
        .filter(|note| !note.is_empty());
    if staff_note
        .as_ref()
        .is_some_and(|note| note.chars().count() > MAX_STAFF_NOTE_CHARS)
    {
        return Err(AppError::ValidationError(format!(
            "Ghi chú không được vượt quá {MAX_STAFF_NOTE_CHARS} ký tự"
        )));
    }

    let request = RefundRequest {
        report_id: body.report_id,
        staff_id: actor.id,
        action: body.action,
        staff_note,
    };
    let result = state.refunds.process(request, Utc::now()).await?;

    let message = result.message.clone();
    Ok(outcome(result.success, result, message).into_response())
}
