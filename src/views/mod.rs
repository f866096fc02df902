//! Páginas HTML (askama)
//!
//! Las plantillas viven en `templates/`. Los valores opcionales se
//! convierten aquí a texto para que las plantillas no tengan lógica.

use askama::Template;
use chrono::NaiveDate;

use crate::dto::customer_dto::CustomerForm;
use crate::models::customer::Customer;

/// Contadores de la barra de navegación
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NavCounts {
    pub prb_alert_count: usize,
    pub ins_alert_count: usize,
}

/// Fila de la tabla de clientes
#[derive(Debug, Clone)]
pub struct CustomerRow {
    pub id: i32,
    pub name: String,
    pub phone: String,
    pub plate: String,
    pub service: String,
    pub service_date: String,
    pub prb_expiry: String,
    pub prb_days_left: String,
    pub prb_status: &'static str,
    pub ins_expiry: String,
    pub ins_days_left: String,
    pub ins_status: &'static str,
    pub linked: bool,
}

impl CustomerRow {
    pub fn new(customer: &Customer, today: NaiveDate) -> Self {
        let prb_days = customer.prb_days_left(today);
        let ins_days = customer.ins_days_left(today);
        Self {
            id: customer.id,
            name: customer.name.clone(),
            phone: customer.phone.clone(),
            plate: customer.plate.clone(),
            service: customer.service.clone().unwrap_or_default(),
            service_date: display_date(customer.service_date),
            prb_expiry: display_date(customer.prb_expiry),
            prb_days_left: display_days(prb_days),
            prb_status: urgency(prb_days, 30),
            ins_expiry: display_date(customer.ins_expiry),
            ins_days_left: display_days(ins_days),
            ins_status: urgency(ins_days, 90),
            linked: customer.messaging_identity().is_some(),
        }
    }
}

fn display_date(date: Option<NaiveDate>) -> String {
    date.map(|d| d.format("%d-%m-%Y").to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn display_days(days: Option<i64>) -> String {
    match days {
        Some(d) if d < 0 => format!("หมดอายุแล้ว {} วัน", -d),
        Some(d) => format!("{} วัน", d),
        None => "-".to_string(),
    }
}

/// Clase CSS según lo cerca que esté el vencimiento
fn urgency(days: Option<i64>, window: i64) -> &'static str {
    match days {
        Some(d) if d < 0 => "expired",
        Some(d) if d <= window => "due-soon",
        Some(_) => "ok",
        None => "",
    }
}

/// Texto del aviso tras una redirección
pub fn notice_text(notice: &str) -> Option<&'static str> {
    match notice {
        "created" => Some("เพิ่มข้อมูลลูกค้าเรียบร้อยแล้ว"),
        "updated" => Some("แก้ไขข้อมูลลูกค้าเรียบร้อยแล้ว"),
        "deleted" => Some("ลบข้อมูลลูกค้าเรียบร้อยแล้ว"),
        _ => None,
    }
}

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexPage {
    pub nav: NavCounts,
    pub notice: Option<&'static str>,
    pub customers: Vec<CustomerRow>,
}

#[derive(Template)]
#[template(path = "customer_form.html")]
pub struct CustomerFormPage {
    pub nav: NavCounts,
    pub title: &'static str,
    pub action: String,
    pub form: CustomerForm,
    pub error: Option<String>,
}

#[derive(Template)]
#[template(path = "expiring.html")]
pub struct ExpiringPage {
    pub nav: NavCounts,
    pub title: &'static str,
    pub window_days: i64,
    pub prb: bool,
    pub customers: Vec<CustomerRow>,
}
