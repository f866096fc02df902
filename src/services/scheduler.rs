//! Programador del aviso diario
//!
//! Calcula la próxima hora de disparo (hora y minuto locales en la zona
//! configurada) y ejecuta el job una vez por tick. El bucle espera a que
//! termine cada ejecución antes de calcular la siguiente, así que nunca hay
//! dos ejecuciones solapadas.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;

use crate::config::NotificationConfig;
use crate::services::reminder_service::{ReminderJob, RunSummary};
use crate::utils::errors::AppResult;

/// Hora diaria de disparo en una zona horaria
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DailySchedule {
    pub hour: u32,
    pub minute: u32,
    pub timezone: Tz,
}

impl From<&NotificationConfig> for DailySchedule {
    fn from(config: &NotificationConfig) -> Self {
        Self {
            hour: config.hour,
            minute: config.minute,
            timezone: config.timezone,
        }
    }
}

impl DailySchedule {
    /// Fecha local del taller para un instante dado
    pub fn local_date(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.timezone).date_naive()
    }

    /// Próximo instante estrictamente posterior a `now` con la hora local configurada.
    /// Los días en que esa hora no existe (salto de horario de verano) se saltan.
    pub fn next_fire_after(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let start = self.local_date(now);
        (0..=2)
            .filter_map(|offset| {
                let date = start + Duration::days(offset);
                let local = date.and_hms_opt(self.hour, self.minute, 0)?;
                self.timezone.from_local_datetime(&local).earliest()
            })
            .map(|fire| fire.with_timezone(&Utc))
            .find(|fire| *fire > now)
    }
}

/// Estado del programador entre disparos
///
/// Recuerda el último instante disparado: si el reloj de pared retrocede
/// tras despertar, el mismo tick no vuelve a programarse.
#[derive(Debug, Clone)]
pub struct DailyTicker {
    schedule: DailySchedule,
    last_fire: Option<DateTime<Utc>>,
}

impl DailyTicker {
    pub fn new(schedule: DailySchedule) -> Self {
        Self {
            schedule,
            last_fire: None,
        }
    }

    pub fn last_fire(&self) -> Option<DateTime<Utc>> {
        self.last_fire
    }

    /// Próximo disparo posterior a `now` y al último tick ejecutado
    pub fn next_fire(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let from = self.last_fire.map_or(now, |last| now.max(last));
        self.schedule.next_fire_after(from)
    }

    /// Ejecuta el job para el tick `fire`, con la fecha local de ese tick
    pub async fn fire(&mut self, job: &ReminderJob, fire: DateTime<Utc>) -> AppResult<RunSummary> {
        self.last_fire = Some(fire);
        job.run(self.schedule.local_date(fire)).await
    }
}

/// Bucle infinito: duerme hasta el próximo disparo y ejecuta el job
pub async fn run_daily(job: ReminderJob, schedule: DailySchedule) {
    tracing::info!(
        "⏰ Aviso diario programado a las {:02}:{:02} ({})",
        schedule.hour,
        schedule.minute,
        schedule.timezone
    );

    let mut ticker = DailyTicker::new(schedule);
    loop {
        let now = Utc::now();
        let Some(next) = ticker.next_fire(now) else {
            tracing::error!("❌ No se pudo calcular la próxima ejecución; reintento en 1h");
            tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
            continue;
        };

        tracing::info!("⏰ Próxima revisión: {}", next.with_timezone(&schedule.timezone));
        let wait = (next - now).to_std().unwrap_or_default();
        tokio::time::sleep(wait).await;

        match ticker.fire(&job, next).await {
            Ok(summary) => tracing::info!(
                sent = summary.sent,
                failed = summary.failed,
                "📬 Revisión diaria completada"
            ),
            Err(e) => tracing::error!("❌ Revisión diaria abandonada: {}", e),
        }
    }
}
