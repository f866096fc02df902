use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    routing::post,
    Router,
};

use crate::controllers::webhook_controller::WebhookController;
use crate::services::line_messaging_service::verify_signature;
use crate::services::webhook_service::WebhookPayload;
use crate::state::AppState;
use crate::utils::errors::AppError;

pub const SIGNATURE_HEADER: &str = "x-line-signature";

pub fn create_webhook_router() -> Router<AppState> {
    Router::new().route("/callback", post(callback))
}

/// Webhook de LINE: verifica la firma antes de tocar ningún registro
async fn callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<&'static str, AppError> {
    let line = &state.config.line;
    let secret = match (&line.channel_secret, line.is_configured()) {
        (Some(secret), true) => secret,
        _ => return Err(AppError::NotConfigured("LINE bot not configured.".to_string())),
    };

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or(AppError::InvalidSignature)?;
    if !verify_signature(secret, &body, signature) {
        return Err(AppError::InvalidSignature);
    }

    log::info!("📨 Webhook recibido: {}", String::from_utf8_lossy(&body));
    let payload = WebhookPayload::parse(&body)?;

    let controller = WebhookController::new(state.store.clone(), state.messenger.clone());
    controller.handle_payload(payload).await?;
    Ok("OK")
}
