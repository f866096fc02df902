//! Cliente de LINE Messaging API
//!
//! `MessagingClient` es el sumidero de notificaciones: el job diario solo
//! usa `push_message`, el webhook usa `reply_message`. Sin token configurado
//! el cliente no hace nada, avisa en el log y devuelve fallo.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;

use crate::config::LineConfig;
use crate::utils::errors::{AppError, AppResult};

type HmacSha256 = Hmac<Sha256>;

/// Canal de mensajería hacia los clientes
#[async_trait]
pub trait MessagingClient: Send + Sync {
    /// Envía un mensaje push. `Ok(false)` y `Err` significan fallo.
    async fn push_message(&self, to: &str, text: &str) -> AppResult<bool>;

    /// Responde a un evento del webhook usando su reply token
    async fn reply_message(&self, reply_token: &str, text: &str) -> AppResult<()>;
}

#[derive(Debug, Serialize)]
struct TextMessage<'a> {
    #[serde(rename = "type")]
    message_type: &'static str,
    text: &'a str,
}

impl<'a> TextMessage<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            message_type: "text",
            text,
        }
    }
}

#[derive(Debug, Serialize)]
struct PushRequest<'a> {
    to: &'a str,
    messages: [TextMessage<'a>; 1],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReplyRequest<'a> {
    reply_token: &'a str,
    messages: [TextMessage<'a>; 1],
}

/// Cliente HTTP de LINE
pub struct LineMessagingClient {
    access_token: Option<String>,
    api_base_url: String,
    client: reqwest::Client,
}

impl LineMessagingClient {
    pub fn new(config: &LineConfig, client: reqwest::Client) -> Self {
        if config.channel_access_token.is_none() {
            log::warn!("⚠️ LINE_CHANNEL_ACCESS_TOKEN no configurado: los mensajes no se enviarán");
        }
        Self {
            access_token: config.channel_access_token.clone(),
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    async fn post<T: Serialize + ?Sized>(&self, token: &str, path: &str, body: &T) -> AppResult<()> {
        let url = format!("{}{}", self.api_base_url, path);
        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .map_err(|e| AppError::ExternalApi(format!("LINE request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalApi(format!(
                "LINE API returned {}: {}",
                status, error_text
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl MessagingClient for LineMessagingClient {
    async fn push_message(&self, to: &str, text: &str) -> AppResult<bool> {
        let Some(token) = self.access_token.as_deref() else {
            log::warn!("⚠️ No se puede enviar push a {}: LINE no configurado", to);
            return Ok(false);
        };

        let body = PushRequest {
            to,
            messages: [TextMessage::new(text)],
        };
        self.post(token, "/v2/bot/message/push", &body).await?;
        Ok(true)
    }

    async fn reply_message(&self, reply_token: &str, text: &str) -> AppResult<()> {
        let token = self
            .access_token
            .as_deref()
            .ok_or_else(|| AppError::NotConfigured("LINE bot not configured.".to_string()))?;

        let body = ReplyRequest {
            reply_token,
            messages: [TextMessage::new(text)],
        };
        self.post(token, "/v2/bot/message/reply", &body).await
    }
}

/// Firma `X-Line-Signature`: base64(HMAC-SHA256(channel_secret, body))
pub fn sign_body(channel_secret: &str, body: &[u8]) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(channel_secret.as_bytes()).ok()?;
    mac.update(body);
    Some(BASE64.encode(mac.finalize().into_bytes()))
}

/// Verifica la firma del webhook en tiempo constante
pub fn verify_signature(channel_secret: &str, body: &[u8], signature: &str) -> bool {
    let Ok(expected) = BASE64.decode(signature.trim()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(channel_secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}
