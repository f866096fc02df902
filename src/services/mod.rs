//! Services module
//!
//! Este módulo contiene la lógica de negocio: el escaneo diario de
//! vencimientos, su programación, el canal LINE y el registro vía webhook.

pub mod line_messaging_service;
pub mod reminder_service;
pub mod scheduler;
pub mod webhook_service;

pub use line_messaging_service::{LineMessagingClient, MessagingClient};
pub use reminder_service::{plan_reminder, Reminder, ReminderJob, RunSummary};
pub use scheduler::DailySchedule;
