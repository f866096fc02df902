//! Eventos del webhook de LINE y registro de clientes por teléfono
//!
//! Un cliente escribe su número al bot; si coincide con un registro, su
//! userId de LINE queda vinculado para recibir los recordatorios.

use serde::Deserialize;

use crate::models::customer::Customer;
use crate::repositories::customer_repository::CustomerStore;
use crate::utils::errors::{AppError, AppResult};

pub const WELCOME_MESSAGE: &str = "ขอบคุณที่เพิ่มเพื่อนกับ ตรอ. SK-Service ครับ!\n\nเพื่อรับบริการแจ้งเตือน พ.ร.บ./ประกันหมดอายุอัตโนมัติ กรุณาพิมพ์เบอร์โทรศัพท์ 10 หลักที่ท่านใช้ลงทะเบียนกับทางร้านส่งเข้ามาในแชทนี้ได้เลยครับ";
pub const NOT_FOUND_MESSAGE: &str = "ไม่พบข้อมูลลูกค้าสำหรับเบอร์โทรศัพท์นี้ครับ กรุณาตรวจสอบอีกครั้ง";
pub const USAGE_MESSAGE: &str = "กรุณาส่งเฉพาะตัวเลขเบอร์โทรศัพท์ 10 หลักเพื่อทำการลงทะเบียนนะครับ";
pub const ALREADY_LINKED_MESSAGE: &str = "บัญชี LINE นี้ได้ลงทะเบียนกับข้อมูลลูกค้ารายอื่นไว้แล้วครับ กรุณาติดต่อทางร้าน";

const MIN_PHONE_DIGITS: usize = 9;

/// Cuerpo del webhook
#[derive(Debug, Default)]
pub struct WebhookPayload {
    pub events: Vec<WebhookEvent>,
}

#[derive(Deserialize)]
struct RawPayload {
    #[serde(default)]
    events: Vec<serde_json::Value>,
}

impl WebhookPayload {
    /// Interpreta el cuerpo evento por evento: un evento que no encaja se
    /// descarta con un aviso sin perder el resto del lote.
    pub fn parse(body: &[u8]) -> AppResult<Self> {
        let raw: RawPayload = serde_json::from_slice(body)
            .map_err(|e| AppError::BadRequest(format!("Invalid webhook payload: {}", e)))?;

        let events = raw
            .events
            .into_iter()
            .filter_map(|value| match serde_json::from_value::<WebhookEvent>(value) {
                Ok(event) => Some(event),
                Err(e) => {
                    log::warn!("⚠️ Evento de webhook ignorado: {}", e);
                    None
                }
            })
            .collect();
        Ok(Self { events })
    }
}

/// Origen del evento; `userId` falta en algunos grupos
#[derive(Debug, Clone, Deserialize)]
pub struct EventSource {
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
}

/// Eventos que el bot atiende; el resto se ignora.
/// `replyToken` falta en eventos en modo standby.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum WebhookEvent {
    Follow {
        #[serde(rename = "replyToken", default)]
        reply_token: Option<String>,
        source: EventSource,
    },
    Message {
        #[serde(rename = "replyToken", default)]
        reply_token: Option<String>,
        source: EventSource,
        message: MessageContent,
    },
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MessageContent {
    Text { text: String },
    #[serde(other)]
    Other,
}

/// Resultado de intentar registrar un número
#[derive(Debug, Clone, PartialEq)]
pub enum RegistrationOutcome {
    Linked { name: String, plate: String },
    AlreadyLinkedElsewhere,
    NotFound,
    InvalidInput,
}

impl RegistrationOutcome {
    pub fn reply_text(&self) -> String {
        match self {
            RegistrationOutcome::Linked { name, plate } => format!(
                "ลงทะเบียนสำเร็จ!\n\nบัญชี LINE ของคุณได้ผูกกับข้อมูลคุณ {} (ทะเบียน: {}) เรียบร้อยแล้ว",
                name, plate
            ),
            RegistrationOutcome::AlreadyLinkedElsewhere => ALREADY_LINKED_MESSAGE.to_string(),
            RegistrationOutcome::NotFound => NOT_FOUND_MESSAGE.to_string(),
            RegistrationOutcome::InvalidInput => USAGE_MESSAGE.to_string(),
        }
    }
}

/// Un texto es candidato a teléfono si son solo dígitos y al menos 9
pub fn phone_candidate(text: &str) -> Option<&str> {
    let text = text.trim();
    (text.len() >= MIN_PHONE_DIGITS && text.bytes().all(|b| b.is_ascii_digit())).then_some(text)
}

/// Busca el cliente por teléfono y vincula `line_user_id`
pub async fn register_phone(
    store: &dyn CustomerStore,
    line_user_id: &str,
    text: &str,
) -> AppResult<RegistrationOutcome> {
    let Some(phone) = phone_candidate(text) else {
        return Ok(RegistrationOutcome::InvalidInput);
    };

    let Some(customer) = store.find_by_phone(phone).await? else {
        log::info!("🔍 Teléfono {} sin cliente asociado", phone);
        return Ok(RegistrationOutcome::NotFound);
    };

    if let Some(owner) = store.find_by_line_user_id(line_user_id).await? {
        if owner.id != customer.id {
            log::warn!(
                "⚠️ {} ya está vinculado al cliente {}",
                line_user_id,
                owner.id
            );
            return Ok(RegistrationOutcome::AlreadyLinkedElsewhere);
        }
    }

    match store.link_line_user_id(customer.id, line_user_id).await {
        Ok(Some(linked)) => {
            log::info!("🔗 Cliente {} vinculado a {}", linked.id, line_user_id);
            Ok(linked_outcome(&linked))
        }
        // borrado entre la búsqueda y la actualización
        Ok(None) => Ok(RegistrationOutcome::NotFound),
        Err(AppError::Conflict(_)) => Ok(RegistrationOutcome::AlreadyLinkedElsewhere),
        Err(e) => Err(e),
    }
}

fn linked_outcome(customer: &Customer) -> RegistrationOutcome {
    RegistrationOutcome::Linked {
        name: customer.name.clone(),
        plate: customer.plate.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::customer::NewCustomer;
    use crate::repositories::customer_repository::InMemoryCustomerStore;

    #[test]
    fn test_phone_candidate() {
        assert_eq!(phone_candidate(" 0812345678 "), Some("0812345678"));
        assert_eq!(phone_candidate("081234567"), Some("081234567"));
        assert_eq!(phone_candidate("08123456"), None);
        assert_eq!(phone_candidate("081-234-5678"), None);
        assert_eq!(phone_candidate("hello"), None);
        assert_eq!(phone_candidate(""), None);
    }

    #[test]
    fn test_parse_follow_and_text_message() {
        let body = r#"{
            "destination": "Uxxx",
            "events": [
                {"type": "follow", "replyToken": "r1", "source": {"type": "user", "userId": "U1"}, "timestamp": 1},
                {"type": "message", "replyToken": "r2", "source": {"type": "user", "userId": "U2"},
                 "message": {"type": "text", "id": "1", "text": "0812345678"}},
                {"type": "message", "replyToken": "r3", "source": {"type": "user", "userId": "U3"},
                 "message": {"type": "sticker", "id": "2", "packageId": "1", "stickerId": "1"}},
                {"type": "unfollow", "source": {"type": "user", "userId": "U4"}}
            ]
        }"#;
        let payload = WebhookPayload::parse(body.as_bytes()).unwrap();
        assert_eq!(payload.events.len(), 4);
        assert!(matches!(
            &payload.events[0],
            WebhookEvent::Follow { reply_token: Some(token), .. } if token == "r1"
        ));
        assert!(matches!(
            &payload.events[1],
            WebhookEvent::Message { message: MessageContent::Text { text }, .. } if text == "0812345678"
        ));
        assert!(matches!(
            &payload.events[2],
            WebhookEvent::Message { message: MessageContent::Other, .. }
        ));
        assert!(matches!(payload.events[3], WebhookEvent::Unsupported));
    }

    #[test]
    fn test_parse_keeps_batch_when_event_is_odd() {
        let body = r#"{
            "events": [
                {"type": "message", "mode": "standby", "source": {"type": "user", "userId": "U9"},
                 "message": {"type": "text", "id": "1", "text": "hola"}},
                {"type": "message", "replyToken": "r2", "source": {"type": "user", "userId": "U2"},
                 "message": {"type": "text"}},
                {"type": "message", "mode": "active", "replyToken": "r3",
                 "source": {"type": "user", "userId": "U3"},
                 "message": {"type": "text", "id": "3", "text": "0812345678"}}
            ]
        }"#;
        let payload = WebhookPayload::parse(body.as_bytes()).unwrap();

        // el segundo evento (texto sin `text`) se descarta; los otros dos quedan
        assert_eq!(payload.events.len(), 2);
        assert!(matches!(
            &payload.events[0],
            WebhookEvent::Message { reply_token: None, .. }
        ));
        assert!(matches!(
            &payload.events[1],
            WebhookEvent::Message { message: MessageContent::Text { text }, .. } if text == "0812345678"
        ));
    }

    #[test]
    fn test_parse_rejects_malformed_body() {
        assert!(matches!(
            WebhookPayload::parse(b"{not json"),
            Err(AppError::BadRequest(_))
        ));
        assert!(WebhookPayload::parse(b"{}").unwrap().events.is_empty());
    }

    async fn store_with_customer() -> (InMemoryCustomerStore, Customer) {
        let store = InMemoryCustomerStore::new();
        let customer = store
            .create(NewCustomer {
                name: "Somchai".to_string(),
                phone: "0812345678".to_string(),
                plate: "1กข 234".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        (store, customer)
    }

    #[tokio::test]
    async fn test_register_links_identity() {
        let (store, customer) = store_with_customer().await;
        let outcome = register_phone(&store, "U1", "0812345678").await.unwrap();
        assert!(outcome.reply_text().contains("Somchai"));
        assert!(matches!(outcome, RegistrationOutcome::Linked { .. }));

        let stored = store.find_by_id(customer.id).await.unwrap().unwrap();
        assert_eq!(stored.line_user_id.as_deref(), Some("U1"));
        assert_eq!(stored.phone, customer.phone);
    }

    #[tokio::test]
    async fn test_register_not_found_and_invalid() {
        let (store, _) = store_with_customer().await;
        assert_eq!(
            register_phone(&store, "U1", "0999999999").await.unwrap(),
            RegistrationOutcome::NotFound
        );
        assert_eq!(
            register_phone(&store, "U1", "สวัสดี").await.unwrap(),
            RegistrationOutcome::InvalidInput
        );
    }

    #[tokio::test]
    async fn test_identity_already_linked_elsewhere() {
        let (store, _) = store_with_customer().await;
        store
            .create(NewCustomer {
                name: "Other".to_string(),
                phone: "0899999999".to_string(),
                plate: "2คค 999".to_string(),
                line_user_id: Some("U1".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(
            register_phone(&store, "U1", "0812345678").await.unwrap(),
            RegistrationOutcome::AlreadyLinkedElsewhere
        );
    }
}
