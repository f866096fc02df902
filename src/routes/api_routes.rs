use axum::{
    extract::{rejection::QueryRejection, Query, State},
    response::Json,
    routing::get,
    Router,
};
use serde_json::json;

use crate::dto::customer_dto::PreviewQuery;
use crate::services::reminder_service::Reminder;
use crate::state::AppState;
use crate::utils::errors::AppError;

pub fn create_api_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/api/reminders/preview", get(preview_reminders))
}

/// Endpoint de salud simple
async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "inspection-reminders",
        "line_configured": state.config.line.is_configured(),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

/// Recordatorios que el job enviaría en la fecha indicada (hoy por defecto), sin enviarlos
async fn preview_reminders(
    State(state): State<AppState>,
    query: Result<Query<PreviewQuery>, QueryRejection>,
) -> Result<Json<Vec<Reminder>>, AppError> {
    let Query(query) = query.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let date = query.date.unwrap_or_else(|| state.today());
    let reminders = state.reminder_job.preview(date).await?;
    Ok(Json(reminders))
}
