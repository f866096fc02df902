use std::sync::Arc;

use crate::repositories::customer_repository::CustomerStore;
use crate::services::line_messaging_service::MessagingClient;
use crate::services::webhook_service::{
    register_phone, EventSource, MessageContent, WebhookEvent, WebhookPayload, WELCOME_MESSAGE,
};
use crate::utils::errors::AppResult;

pub struct WebhookController {
    store: Arc<dyn CustomerStore>,
    messenger: Arc<dyn MessagingClient>,
}

impl WebhookController {
    pub fn new(store: Arc<dyn CustomerStore>, messenger: Arc<dyn MessagingClient>) -> Self {
        Self { store, messenger }
    }

    /// Procesa todos los eventos; un fallo de respuesta no corta el resto
    pub async fn handle_payload(&self, payload: WebhookPayload) -> AppResult<()> {
        for event in payload.events {
            match event {
                WebhookEvent::Follow {
                    reply_token,
                    source,
                } => self.handle_follow(reply_token.as_deref(), &source).await,
                WebhookEvent::Message {
                    reply_token,
                    source,
                    message: MessageContent::Text { text },
                } => self.handle_text(reply_token.as_deref(), &source, &text).await?,
                WebhookEvent::Message { .. } | WebhookEvent::Unsupported => {}
            }
        }
        Ok(())
    }

    async fn handle_follow(&self, reply_token: Option<&str>, source: &EventSource) {
        log::info!(
            "👋 Nuevo seguidor: {}",
            source.user_id.as_deref().unwrap_or("desconocido")
        );
        self.reply(reply_token, WELCOME_MESSAGE).await;
    }

    async fn handle_text(
        &self,
        reply_token: Option<&str>,
        source: &EventSource,
        text: &str,
    ) -> AppResult<()> {
        let Some(user_id) = source.user_id.as_deref() else {
            log::warn!("⚠️ Mensaje sin userId, ignorado");
            return Ok(());
        };

        let outcome = register_phone(self.store.as_ref(), user_id, text).await?;
        self.reply(reply_token, &outcome.reply_text()).await;
        Ok(())
    }

    // Sin reply token (modo standby) no se puede responder
    async fn reply(&self, reply_token: Option<&str>, text: &str) {
        let Some(reply_token) = reply_token else {
            log::info!("ℹ️ Evento sin replyToken, no se responde");
            return;
        };
        if let Err(e) = self.messenger.reply_message(reply_token, text).await {
            log::error!("❌ No se pudo responder al evento: {}", e);
        }
    }
}
