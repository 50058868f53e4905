use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::extract::rejection::JsonRejection;
use axum::Json;
use chrono::Utc;
use serde::Serialize;

use crate::services::eligibility::TimeWindow;
use crate::services::{validate_event_schedule, EligibilityWindowResolver, EventScheduleDraft};
use crate::state::AppState;
use crate::utils::actor::{Actor, Role};
use crate::utils::error::AppError;
use crate::utils::extract::extract_json;
use crate::utils::response::success;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SchedulePreview {
    checkin_window: TimeWindow,
    checkout_window: TimeWindow,
}

/// Checks an event schedule before it is saved and previews the resulting
/// scan windows.
pub async fn validate_schedule(
    State(state): State<AppState>,
    actor: Actor,
    body: Result<Json<EventScheduleDraft>, JsonRejection>,
) -> Result<Response, AppError> {
    actor.require(&[Role::Organizer, Role::Admin])?;
    let draft = extract_json(body)?;

    let resolver = EligibilityWindowResolver::new(state.windows.snapshot());
    let window = validate_event_schedule(&draft, &resolver, Utc::now())
        .map_err(|e| AppError::ValidationError(e.to_string()))?;

    let preview = SchedulePreview {
        checkin_window: resolver.checkin_window(&window),
        checkout_window: resolver.checkout_window(&window),
    };
    Ok(success(preview, "Lịch sự kiện hợp lệ").into_response())
}
