//! Shared application state
//!
//! Este módulo define el estado compartido de la aplicación que se pasa
//! a través del router de Axum. Almacén y canal de mensajería se inyectan
//! como trait objects; no hay estado global.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};

use crate::config::environment::EnvironmentConfig;
use crate::repositories::customer_repository::CustomerStore;
use crate::services::line_messaging_service::MessagingClient;
use crate::services::reminder_service::ReminderJob;
use crate::services::scheduler::DailySchedule;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn CustomerStore>,
    pub messenger: Arc<dyn MessagingClient>,
    pub config: EnvironmentConfig,
    pub reminder_job: ReminderJob,
}

impl AppState {
    pub fn new(
        store: Arc<dyn CustomerStore>,
        messenger: Arc<dyn MessagingClient>,
        config: EnvironmentConfig,
    ) -> Self {
        let reminder_job = ReminderJob::new(
            store.clone(),
            messenger.clone(),
            config.notification.push_timeout,
        );
        Self {
            store,
            messenger,
            config,
            reminder_job,
        }
    }

    pub fn schedule(&self) -> DailySchedule {
        DailySchedule::from(&self.config.notification)
    }

    /// Fecha actual en la zona horaria del taller
    pub fn today(&self) -> NaiveDate {
        self.schedule().local_date(Utc::now())
    }
}
