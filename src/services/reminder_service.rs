//! Escaneo diario de vencimientos y envío de recordatorios
//!
//! Las escaleras de aviso se evalúan en orden de prioridad: primero el
//! seguro obligatorio (พ.ร.บ.) y luego el voluntario. Solo disparan en los
//! días exactos de la lista y cada cliente recibe como mucho un mensaje por
//! ejecución. El job nunca modifica registros.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use serde::Serialize;

use crate::models::customer::Customer;
use crate::repositories::customer_repository::CustomerStore;
use crate::services::line_messaging_service::MessagingClient;
use crate::utils::errors::AppResult;

/// Tipo de seguro que origina el recordatorio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderKind {
    Compulsory,
    Voluntary,
}

/// Escalera de aviso: días exactos de antelación y plantilla del mensaje
pub struct TriggerLadder {
    pub kind: ReminderKind,
    pub days: &'static [i64],
    expiry: fn(&Customer) -> Option<NaiveDate>,
    template: fn(&Customer, i64, NaiveDate) -> String,
}

impl TriggerLadder {
    /// Devuelve (días restantes, fecha de vencimiento) si hoy es un día de aviso
    fn matches(&self, customer: &Customer, today: NaiveDate) -> Option<(i64, NaiveDate)> {
        let expiry = (self.expiry)(customer)?;
        let days_left = (expiry - today).num_days();
        self.days.contains(&days_left).then_some((days_left, expiry))
    }
}

/// Escaleras en orden de prioridad
pub const REMINDER_LADDERS: [TriggerLadder; 2] = [
    TriggerLadder {
        kind: ReminderKind::Compulsory,
        days: &[30, 15, 7, 1],
        expiry: prb_expiry,
        template: compulsory_message,
    },
    TriggerLadder {
        kind: ReminderKind::Voluntary,
        days: &[90, 60, 30],
        expiry: ins_expiry,
        template: voluntary_message,
    },
];

fn prb_expiry(customer: &Customer) -> Option<NaiveDate> {
    customer.prb_expiry
}

fn ins_expiry(customer: &Customer) -> Option<NaiveDate> {
    customer.ins_expiry
}

fn compulsory_message(customer: &Customer, days_left: i64, expiry: NaiveDate) -> String {
    format!(
        "เรียนคุณ {},\n\nแจ้งเตือนจาก ตรอ. 🔔\nพ.ร.บ. ทะเบียนรถ {} ของท่านจะหมดอายุในอีก {} วัน (วันที่ {})\n\nสามารถเข้ามาต่อ พ.ร.บ. ล่วงหน้าที่ร้านได้เลยนะครับ",
        customer.name,
        customer.plate,
        days_left,
        expiry.format("%d-%m-%Y")
    )
}

fn voluntary_message(customer: &Customer, days_left: i64, expiry: NaiveDate) -> String {
    format!(
        "เรียนคุณ {},\n\nแจ้งเตือนจาก ตรอ. 🔔\nประกันภัยรถยนต์ทะเบียน {} ของท่านจะหมดอายุในอีก {} วัน (วันที่ {})\n\nติดต่อสอบถามเบี้ยประกันราคาพิเศษได้เลยนะครับ",
        customer.name,
        customer.plate,
        days_left,
        expiry.format("%d-%m-%Y")
    )
}

/// Recordatorio decidido para un cliente en una fecha
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reminder {
    pub customer_id: i32,
    pub customer_name: String,
    pub line_user_id: String,
    pub kind: ReminderKind,
    pub days_left: i64,
    pub expiry: NaiveDate,
    pub text: String,
}

/// Decide el recordatorio de un cliente para `today`, sin enviar nada.
/// Clientes sin identidad de LINE nunca reciben recordatorio.
pub fn plan_reminder(customer: &Customer, today: NaiveDate) -> Option<Reminder> {
    let line_user_id = customer.messaging_identity()?;

    REMINDER_LADDERS.iter().find_map(|ladder| {
        ladder
            .matches(customer, today)
            .map(|(days_left, expiry)| Reminder {
                customer_id: customer.id,
                customer_name: customer.name.clone(),
                line_user_id: line_user_id.to_string(),
                kind: ladder.kind,
                days_left,
                expiry,
                text: (ladder.template)(customer, days_left, expiry),
            })
    })
}

/// Resultado de una ejecución del escaneo
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub scanned: usize,
    pub sent: usize,
    pub failed: usize,
    pub not_due: usize,
}

/// Job de escaneo y envío, con almacén y canal inyectados
#[derive(Clone)]
pub struct ReminderJob {
    store: Arc<dyn CustomerStore>,
    messenger: Arc<dyn MessagingClient>,
    send_timeout: Duration,
}

impl ReminderJob {
    pub fn new(
        store: Arc<dyn CustomerStore>,
        messenger: Arc<dyn MessagingClient>,
        send_timeout: Duration,
    ) -> Self {
        Self {
            store,
            messenger,
            send_timeout,
        }
    }

    /// Recordatorios que se enviarían hoy
    pub async fn preview(&self, today: NaiveDate) -> AppResult<Vec<Reminder>> {
        let customers = self.store.linked_customers().await?;
        Ok(customers
            .iter()
            .filter_map(|customer| plan_reminder(customer, today))
            .collect())
    }

    /// Ejecuta el escaneo para `today`. Solo un fallo al leer el almacén
    /// aborta la ejecución; los fallos de envío se registran y se continúa.
    pub async fn run(&self, today: NaiveDate) -> AppResult<RunSummary> {
        log::info!("🔔 Revisión diaria de vencimientos para {}", today);
        let customers = self.store.linked_customers().await?;

        let mut summary = RunSummary {
            scanned: customers.len(),
            ..RunSummary::default()
        };

        for customer in &customers {
            let Some(reminder) = plan_reminder(customer, today) else {
                summary.not_due += 1;
                continue;
            };

            if self.deliver(&reminder).await {
                summary.sent += 1;
                log::info!(
                    "  - Notifying {} ({}): SUCCESS",
                    reminder.customer_name,
                    reminder.line_user_id
                );
            } else {
                summary.failed += 1;
                log::warn!(
                    "  - Notifying {} ({}): FAILED",
                    reminder.customer_name,
                    reminder.line_user_id
                );
            }
        }

        log::info!(
            "✅ Revisión terminada: {} revisados, {} enviados, {} fallidos",
            summary.scanned,
            summary.sent,
            summary.failed
        );
        Ok(summary)
    }

    async fn deliver(&self, reminder: &Reminder) -> bool {
        let send = self
            .messenger
            .push_message(&reminder.line_user_id, &reminder.text);
        match tokio::time::timeout(self.send_timeout, send).await {
            Ok(Ok(delivered)) => delivered,
            Ok(Err(e)) => {
                log::error!("❌ Error enviando a {}: {}", reminder.line_user_id, e);
                false
            }
            Err(_) => {
                log::error!(
                    "⏱️ Timeout de {:?} enviando a {}",
                    self.send_timeout,
                    reminder.line_user_id
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::customer::NewCustomer;
    use crate::repositories::customer_repository::InMemoryCustomerStore;
    use crate::utils::errors::AppError;
    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;
    use std::collections::HashSet;
    use tokio::sync::Mutex;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    fn in_days(days: i64) -> Option<NaiveDate> {
        Some(today() + ChronoDuration::days(days))
    }

    /// Canal de prueba: registra los envíos y falla para ciertos destinatarios
    #[derive(Default)]
    struct RecordingMessenger {
        sent: Mutex<Vec<(String, String)>>,
        reject: HashSet<String>,
        error: HashSet<String>,
        hang: HashSet<String>,
    }

    #[async_trait]
    impl MessagingClient for RecordingMessenger {
        async fn push_message(&self, to: &str, text: &str) -> AppResult<bool> {
            if self.hang.contains(to) {
                std::future::pending::<()>().await;
            }
            if self.error.contains(to) {
                return Err(AppError::ExternalApi("boom".to_string()));
            }
            self.sent.lock().await.push((to.to_string(), text.to_string()));
            Ok(!self.reject.contains(to))
        }

        async fn reply_message(&self, _reply_token: &str, _text: &str) -> AppResult<()> {
            Ok(())
        }
    }

    struct Fixture {
        store: Arc<InMemoryCustomerStore>,
        messenger: Arc<RecordingMessenger>,
        job: ReminderJob,
    }

    fn fixture(messenger: RecordingMessenger) -> Fixture {
        let store = Arc::new(InMemoryCustomerStore::new());
        let messenger = Arc::new(messenger);
        let job = ReminderJob::new(
            store.clone(),
            messenger.clone(),
            Duration::from_millis(200),
        );
        Fixture {
            store,
            messenger,
            job,
        }
    }

    async fn add(
        store: &InMemoryCustomerStore,
        name: &str,
        line_user_id: Option<&str>,
        prb: Option<NaiveDate>,
        ins: Option<NaiveDate>,
    ) -> Customer {
        let phone = format!("08{:08}", store.list_all().await.unwrap().len() + 1);
        store
            .create(NewCustomer {
                name: name.to_string(),
                phone,
                plate: format!("{name}-1234"),
                prb_expiry: prb,
                ins_expiry: ins,
                line_user_id: line_user_id.map(str::to_string),
                ..Default::default()
            })
            .await
            .unwrap()
    }

    fn customer(prb: Option<NaiveDate>, ins: Option<NaiveDate>) -> Customer {
        Customer::from_new(
            1,
            NewCustomer {
                name: "Somchai".to_string(),
                phone: "0812345678".to_string(),
                plate: "1กข 234".to_string(),
                prb_expiry: prb,
                ins_expiry: ins,
                line_user_id: Some("U1".to_string()),
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_compulsory_ladder_days() {
        for days in [30, 15, 7, 1] {
            let reminder = plan_reminder(&customer(in_days(days), None), today()).unwrap();
            assert_eq!(reminder.kind, ReminderKind::Compulsory);
            assert_eq!(reminder.days_left, days);
            assert!(reminder.text.contains("พ.ร.บ."));
        }
    }

    #[test]
    fn test_voluntary_ladder_days() {
        for days in [90, 60, 30] {
            let reminder = plan_reminder(&customer(None, in_days(days)), today()).unwrap();
            assert_eq!(reminder.kind, ReminderKind::Voluntary);
            assert!(reminder.text.contains("ประกันภัยรถยนต์"));
        }
    }

    #[test]
    fn test_exact_day_only() {
        for days in [29, 14, 8, 2, 0, -1, 31] {
            assert!(plan_reminder(&customer(in_days(days), None), today()).is_none());
        }
        for days in [89, 61, 31, 29, 1] {
            assert!(plan_reminder(&customer(None, in_days(days)), today()).is_none());
        }
    }

    #[test]
    fn test_compulsory_takes_priority() {
        let reminder = plan_reminder(&customer(in_days(30), in_days(60)), today()).unwrap();
        assert_eq!(reminder.kind, ReminderKind::Compulsory);

        let reminder = plan_reminder(&customer(in_days(7), in_days(30)), today()).unwrap();
        assert_eq!(reminder.kind, ReminderKind::Compulsory);
    }

    #[test]
    fn test_voluntary_when_compulsory_not_due() {
        let reminder = plan_reminder(&customer(in_days(29), in_days(90)), today()).unwrap();
        assert_eq!(reminder.kind, ReminderKind::Voluntary);
        assert_eq!(reminder.days_left, 90);
    }

    #[test]
    fn test_no_identity_no_reminder() {
        let mut c = customer(in_days(1), None);
        c.line_user_id = None;
        assert!(plan_reminder(&c, today()).is_none());
        c.line_user_id = Some(String::new());
        assert!(plan_reminder(&c, today()).is_none());
    }

    #[test]
    fn test_message_fields() {
        let reminder = plan_reminder(&customer(in_days(15), None), today()).unwrap();
        assert!(reminder.text.contains("Somchai"));
        assert!(reminder.text.contains("1กข 234"));
        assert!(reminder.text.contains("15 วัน"));
        assert!(reminder.text.contains("16-06-2024"));
    }

    #[tokio::test]
    async fn test_run_sends_only_due_reminders() {
        let f = fixture(RecordingMessenger::default());
        add(&f.store, "both", Some("U-both"), in_days(30), in_days(60)).await;
        add(&f.store, "almost", Some("U-almost"), in_days(29), None).await;
        add(&f.store, "unlinked", None, in_days(1), None).await;
        add(&f.store, "ins", Some("U-ins"), None, in_days(90)).await;

        let summary = f.job.run(today()).await.unwrap();
        assert_eq!(
            summary,
            RunSummary {
                scanned: 3,
                sent: 2,
                failed: 0,
                not_due: 1
            }
        );

        let sent = f.messenger.sent.lock().await;
        assert_eq!(sent.len(), 2);
        let both: Vec<_> = sent.iter().filter(|(to, _)| to == "U-both").collect();
        assert_eq!(both.len(), 1);
        assert!(both[0].1.contains("พ.ร.บ."));
        assert!(sent.iter().any(|(to, text)| to == "U-ins" && text.contains("ประกันภัย")));
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_run_or_mutate_records() {
        let messenger = RecordingMessenger {
            reject: HashSet::from(["U-a".to_string()]),
            error: HashSet::from(["U-b".to_string()]),
            ..Default::default()
        };
        let f = fixture(messenger);
        let a = add(&f.store, "a", Some("U-a"), in_days(7), None).await;
        add(&f.store, "b", Some("U-b"), in_days(7), None).await;
        add(&f.store, "c", Some("U-c"), in_days(7), None).await;

        let summary = f.job.run(today()).await.unwrap();
        assert_eq!(summary.sent, 1);
        assert_eq!(summary.failed, 2);

        let sent = f.messenger.sent.lock().await;
        assert!(sent.iter().any(|(to, _)| to == "U-c"));
        assert_eq!(f.store.find_by_id(a.id).await.unwrap().unwrap(), a);
    }

    #[tokio::test]
    async fn test_hung_send_times_out() {
        let messenger = RecordingMessenger {
            hang: HashSet::from(["U-slow".to_string()]),
            ..Default::default()
        };
        let f = fixture(messenger);
        add(&f.store, "slow", Some("U-slow"), in_days(1), None).await;
        add(&f.store, "fast", Some("U-fast"), in_days(1), None).await;

        let summary = f.job.run(today()).await.unwrap();
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.sent, 1);
    }

    #[tokio::test]
    async fn test_same_day_runs_decide_the_same() {
        let f = fixture(RecordingMessenger::default());
        add(&f.store, "a", Some("U-a"), in_days(15), None).await;
        add(&f.store, "b", Some("U-b"), None, in_days(60)).await;
        add(&f.store, "c", Some("U-c"), in_days(3), None).await;

        let first = f.job.preview(today()).await.unwrap();
        let summary_1 = f.job.run(today()).await.unwrap();
        let second = f.job.preview(today()).await.unwrap();
        let summary_2 = f.job.run(today()).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(summary_1, summary_2);
        // sin deduplicación: una segunda ejecución el mismo día vuelve a enviar
        assert_eq!(f.messenger.sent.lock().await.len(), 4);
    }
}
