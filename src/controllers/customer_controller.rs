use std::sync::Arc;

use chrono::{Duration, NaiveDate};

use crate::dto::customer_dto::CustomerForm;
use crate::models::customer::{Customer, NewCustomer};
use crate::repositories::customer_repository::CustomerStore;
use crate::utils::errors::{conflict_error, not_found_error, AppError, AppResult};
use crate::views::{notice_text, CustomerFormPage, CustomerRow, ExpiringPage, IndexPage, NavCounts};

/// Ventana de la lista de พ.ร.บ. próximos a vencer
pub const PRB_ALERT_WINDOW_DAYS: i64 = 30;
/// Ventana de la lista de seguros voluntarios próximos a vencer
pub const INS_ALERT_WINDOW_DAYS: i64 = 90;

const ADD_TITLE: &str = "เพิ่มข้อมูลลูกค้า";
const EDIT_TITLE: &str = "แก้ไขข้อมูลลูกค้า";

pub struct CustomerController {
    store: Arc<dyn CustomerStore>,
}

impl CustomerController {
    pub fn new(store: Arc<dyn CustomerStore>) -> Self {
        Self { store }
    }

    pub async fn nav_counts(&self, today: NaiveDate) -> AppResult<NavCounts> {
        let prb = self
            .store
            .prb_expiring_by(today + Duration::days(PRB_ALERT_WINDOW_DAYS))
            .await?;
        let ins = self
            .store
            .ins_expiring_by(today + Duration::days(INS_ALERT_WINDOW_DAYS))
            .await?;
        Ok(NavCounts {
            prb_alert_count: prb.len(),
            ins_alert_count: ins.len(),
        })
    }

    pub async fn index(&self, today: NaiveDate, notice: Option<&str>) -> AppResult<IndexPage> {
        let customers = self.store.list_all().await?;
        Ok(IndexPage {
            nav: self.nav_counts(today).await?,
            notice: notice.and_then(notice_text),
            customers: rows(&customers, today),
        })
    }

    pub async fn add_form(
        &self,
        today: NaiveDate,
        form: CustomerForm,
        error: Option<String>,
    ) -> AppResult<CustomerFormPage> {
        Ok(CustomerFormPage {
            nav: self.nav_counts(today).await?,
            title: ADD_TITLE,
            action: "/add".to_string(),
            form,
            error,
        })
    }

    pub async fn edit_form(
        &self,
        id: i32,
        today: NaiveDate,
        form: Option<CustomerForm>,
        error: Option<String>,
    ) -> AppResult<CustomerFormPage> {
        let form = match form {
            Some(form) => form,
            None => CustomerForm::from_customer(&self.get(id).await?),
        };
        Ok(CustomerFormPage {
            nav: self.nav_counts(today).await?,
            title: EDIT_TITLE,
            action: format!("/edit/{}", id),
            form,
            error,
        })
    }

    pub async fn get(&self, id: i32) -> AppResult<Customer> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or_else(|| not_found_error("Customer", &id.to_string()))
    }

    pub async fn create(&self, form: &CustomerForm) -> AppResult<Customer> {
        let data = form.to_new_customer()?;
        self.ensure_unique(&data, None).await?;

        let customer = self.store.create(data).await?;
        log::info!("✅ Cliente {} creado ({})", customer.id, customer.name);
        Ok(customer)
    }

    pub async fn update(&self, id: i32, form: &CustomerForm) -> AppResult<Customer> {
        self.get(id).await?;
        let data = form.to_new_customer()?;
        self.ensure_unique(&data, Some(id)).await?;

        let customer = self
            .store
            .update(id, data)
            .await?
            .ok_or_else(|| not_found_error("Customer", &id.to_string()))?;
        log::info!("✏️ Cliente {} actualizado", customer.id);
        Ok(customer)
    }

    pub async fn delete(&self, id: i32) -> AppResult<()> {
        if !self.store.delete(id).await? {
            return Err(not_found_error("Customer", &id.to_string()));
        }
        log::info!("🗑️ Cliente {} eliminado", id);
        Ok(())
    }

    pub async fn expiring_prb(&self, today: NaiveDate) -> AppResult<ExpiringPage> {
        let customers = self
            .store
            .prb_expiring_by(today + Duration::days(PRB_ALERT_WINDOW_DAYS))
            .await?;
        Ok(ExpiringPage {
            nav: self.nav_counts(today).await?,
            title: "พ.ร.บ. ใกล้หมดอายุ",
            window_days: PRB_ALERT_WINDOW_DAYS,
            prb: true,
            customers: rows(&customers, today),
        })
    }

    pub async fn expiring_insurance(&self, today: NaiveDate) -> AppResult<ExpiringPage> {
        let customers = self
            .store
            .ins_expiring_by(today + Duration::days(INS_ALERT_WINDOW_DAYS))
            .await?;
        Ok(ExpiringPage {
            nav: self.nav_counts(today).await?,
            title: "ประกันภัยใกล้หมดอายุ",
            window_days: INS_ALERT_WINDOW_DAYS,
            prb: false,
            customers: rows(&customers, today),
        })
    }

    // Teléfono e identidad de LINE son únicos
    async fn ensure_unique(&self, data: &NewCustomer, current_id: Option<i32>) -> AppResult<()> {
        if let Some(other) = self.store.find_by_phone(&data.phone).await? {
            if Some(other.id) != current_id {
                return Err(conflict_error("Customer", "phone", &data.phone));
            }
        }
        if let Some(line_user_id) = data.line_user_id.as_deref() {
            if let Some(other) = self.store.find_by_line_user_id(line_user_id).await? {
                if Some(other.id) != current_id {
                    return Err(AppError::Conflict(format!(
                        "LINE user '{}' is already linked to customer {}",
                        line_user_id, other.id
                    )));
                }
            }
        }
        Ok(())
    }
}

fn rows(customers: &[Customer], today: NaiveDate) -> Vec<CustomerRow> {
    customers.iter().map(|c| CustomerRow::new(c, today)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::customer_repository::InMemoryCustomerStore;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    fn controller() -> CustomerController {
        CustomerController::new(Arc::new(InMemoryCustomerStore::new()))
    }

    fn form(phone: &str, prb: &str, ins: &str) -> CustomerForm {
        CustomerForm {
            name: "Somchai".to_string(),
            phone: phone.to_string(),
            plate: "1กข 234".to_string(),
            prb_expiry: prb.to_string(),
            ins_expiry: ins.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_rejects_duplicate_phone() {
        let c = controller();
        c.create(&form("0812345678", "", "")).await.unwrap();
        let err = c.create(&form("081-234-5678", "", "")).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let c = controller();
        let err = c.update(99, &form("0812345678", "", "")).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert!(matches!(c.delete(99).await, Err(AppError::NotFound(_))));
        assert!(matches!(
            c.edit_form(99, today(), None, None).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_nav_counts_and_expiring_lists() {
        let c = controller();
        c.create(&form("0810000001", "2024-06-20", "")).await.unwrap();
        c.create(&form("0810000002", "2024-07-01", "2024-08-30")).await.unwrap();
        c.create(&form("0810000003", "2024-05-01", "2024-12-01")).await.unwrap();

        let nav = c.nav_counts(today()).await.unwrap();
        assert_eq!(nav.prb_alert_count, 3);
        assert_eq!(nav.ins_alert_count, 1);

        let page = c.expiring_prb(today()).await.unwrap();
        let phones: Vec<_> = page.customers.iter().map(|r| r.phone.as_str()).collect();
        assert_eq!(phones, vec!["0810000003", "0810000001", "0810000002"]);
    }

    #[tokio::test]
    async fn test_edit_preserves_id() {
        let c = controller();
        let created = c.create(&form("0812345678", "", "")).await.unwrap();
        let mut changed = form("0812345678", "2025-01-01", "");
        changed.name = "Somsak".to_string();
        let updated = c.update(created.id, &changed).await.unwrap();
        assert_eq!(updated.id, created.id);
        assert_eq!(updated.name, "Somsak");
    }
}
