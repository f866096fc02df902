//! Modelo de Customer
//!
//! Mapea exactamente a la tabla `customers`. Los días restantes de cada
//! seguro se calculan al vuelo a partir de la fecha de hoy y nunca se guardan.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Cliente del taller con las fechas de vencimiento de sus seguros
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Customer {
    pub id: i32,
    pub name: String,
    pub phone: String,
    pub plate: String,
    pub service: Option<String>,
    pub service_date: Option<NaiveDate>,
    /// Vencimiento del seguro obligatorio (พ.ร.บ.)
    pub prb_expiry: Option<NaiveDate>,
    /// Vencimiento del seguro voluntario
    pub ins_expiry: Option<NaiveDate>,
    /// userId de LINE vinculado vía webhook
    pub line_user_id: Option<String>,
}

/// Datos para crear o reemplazar un cliente (todo excepto el id)
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NewCustomer {
    pub name: String,
    pub phone: String,
    pub plate: String,
    pub service: Option<String>,
    pub service_date: Option<NaiveDate>,
    pub prb_expiry: Option<NaiveDate>,
    pub ins_expiry: Option<NaiveDate>,
    pub line_user_id: Option<String>,
}

impl Customer {
    pub fn prb_days_left(&self, today: NaiveDate) -> Option<i64> {
        days_between(today, self.prb_expiry)
    }

    pub fn ins_days_left(&self, today: NaiveDate) -> Option<i64> {
        days_between(today, self.ins_expiry)
    }

    /// Identidad de mensajería, ignorando cadenas vacías
    pub fn messaging_identity(&self) -> Option<&str> {
        self.line_user_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }

    /// Construir el registro a partir de un id asignado por el almacén
    pub fn from_new(id: i32, data: NewCustomer) -> Self {
        Self {
            id,
            name: data.name,
            phone: data.phone,
            plate: data.plate,
            service: data.service,
            service_date: data.service_date,
            prb_expiry: data.prb_expiry,
            ins_expiry: data.ins_expiry,
            line_user_id: data.line_user_id,
        }
    }
}

fn days_between(today: NaiveDate, expiry: Option<NaiveDate>) -> Option<i64> {
    expiry.map(|date| (date - today).num_days())
}
