use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::customer::{Customer, NewCustomer};
use crate::utils::errors::AppResult;
use crate::utils::validation::{normalize_phone, optional_text, parse_optional_date, validate_phone};

// Formulario de alta/edición de cliente (todos los campos llegan como texto)
#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate)]
pub struct CustomerForm {
    #[validate(length(min = 1, max = 100))]
    #[serde(default)]
    pub name: String,

    #[validate(length(min = 9, max = 20), custom = "validate_phone")]
    #[serde(default)]
    pub phone: String,

    #[validate(length(min = 1, max = 50))]
    #[serde(default)]
    pub plate: String,

    #[validate(length(max = 100))]
    #[serde(default)]
    pub service: String,

    #[serde(default)]
    pub service_date: String,

    #[serde(default)]
    pub prb_expiry: String,

    #[serde(default)]
    pub ins_expiry: String,

    #[validate(length(max = 100))]
    #[serde(default)]
    pub line_user_id: String,
}

impl CustomerForm {
    /// Formulario precargado con los datos de un cliente
    pub fn from_customer(customer: &Customer) -> Self {
        let date = |d: Option<chrono::NaiveDate>| {
            d.map(|d| d.format("%Y-%m-%d").to_string()).unwrap_or_default()
        };
        Self {
            name: customer.name.clone(),
            phone: customer.phone.clone(),
            plate: customer.plate.clone(),
            service: customer.service.clone().unwrap_or_default(),
            service_date: date(customer.service_date),
            prb_expiry: date(customer.prb_expiry),
            ins_expiry: date(customer.ins_expiry),
            line_user_id: customer.line_user_id.clone().unwrap_or_default(),
        }
    }

    /// Recorta los campos de texto y normaliza el teléfono
    pub fn normalized(&self) -> Self {
        Self {
            name: self.name.trim().to_string(),
            phone: normalize_phone(&self.phone),
            plate: self.plate.trim().to_string(),
            service: self.service.trim().to_string(),
            service_date: self.service_date.trim().to_string(),
            prb_expiry: self.prb_expiry.trim().to_string(),
            ins_expiry: self.ins_expiry.trim().to_string(),
            line_user_id: self.line_user_id.trim().to_string(),
        }
    }

    /// Valida y convierte el formulario en los datos a guardar
    pub fn to_new_customer(&self) -> AppResult<NewCustomer> {
        let form = self.normalized();
        form.validate()?;

        Ok(NewCustomer {
            service_date: parse_optional_date("service_date", &form.service_date)?,
            prb_expiry: parse_optional_date("prb_expiry", &form.prb_expiry)?,
            ins_expiry: parse_optional_date("ins_expiry", &form.ins_expiry)?,
            service: optional_text(&form.service),
            line_user_id: optional_text(&form.line_user_id),
            name: form.name,
            phone: form.phone,
            plate: form.plate,
        })
    }
}

// Query de la página principal (mensaje tras redirección)
#[derive(Debug, Default, Deserialize)]
pub struct NoticeQuery {
    pub notice: Option<String>,
}

// Query de la vista previa de recordatorios
#[derive(Debug, Default, Deserialize)]
pub struct PreviewQuery {
    pub date: Option<chrono::NaiveDate>,
}
