//! Inspection shop renewal reminders
//!
//! Registro de clientes de un ตรอ. (centro de inspección vehicular) con
//! recordatorios automáticos por LINE antes del vencimiento del seguro
//! obligatorio (พ.ร.บ.) y del seguro voluntario.

pub mod config;
pub mod controllers;
pub mod database;
pub mod dto;
pub mod models;
pub mod repositories;
pub mod routes;
pub mod services;
pub mod state;
pub mod utils;
pub mod views;
