use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::extract::rejection::JsonRejection;
use axum::Json;

use crate::config::checkin_window::RawCheckinWindowConfig;
use crate::state::AppState;
use crate::utils::actor::{Actor, Role};
use crate::utils::error::AppError;
use crate::utils::extract::extract_json;
use crate::utils::response::success;

pub async fn get_checkin_config(
    State(state): State<AppState>,
    actor: Actor,
) -> Result<Response, AppError> {
    actor.require(&[Role::Admin])?;
    Ok(success(state.windows.snapshot(), "Cấu hình check-in hiện tại").into_response())
}

pub async fn update_checkin_config(
    State(state): State<AppState>,
    actor: Actor,
    body: Result<Json<RawCheckinWindowConfig>, JsonRejection>,
) -> Result<Response, AppError> {
    actor.require(&[Role::Admin])?;
    let body = extract_json(body)?;
    let config = state.windows.update(body).await?;
    tracing::info!(actor_id = actor.id, ?config, "Admin updated check-in window config");
    Ok(success(config, "Đã cập nhật cấu hình check-in").into_response())
}

pub async fn reload_checkin_config(
    State(state): State<AppState>,
    actor: Actor,
) -> Result<Response, AppError> {
    actor.require(&[Role::Admin])?;
    let config = state.windows.reload().await?;
    Ok(success(config, "Đã tải lại cấu hình check-in").into_response())
}
