//! Controladores
//!
//! Orquestan repositorio, servicios y vistas para cada ruta.

pub mod customer_controller;
pub mod webhook_controller;

pub use customer_controller::CustomerController;
pub use webhook_controller::WebhookController;
