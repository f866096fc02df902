//! Repositorio de clientes
//!
//! `CustomerStore` es la única puerta de acceso a los registros. Hay dos
//! implementaciones: PostgreSQL para el despliegue alojado y una en memoria
//! para ejecución local sin base de datos y para los tests.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::PgPool;
use tokio::sync::RwLock;

use crate::models::customer::{Customer, NewCustomer};
use crate::utils::errors::{conflict_error, AppError, AppResult};

const PHONE_TAKEN: &str = "A customer with this phone number already exists";
const IDENTITY_TAKEN: &str = "This LINE account is already linked to another customer";

/// Restricción UNIQUE de `line_user_id` en la migración
const IDENTITY_CONSTRAINT: &str = "customers_line_user_id_key";

/// Mensaje de conflicto según la restricción violada
fn unique_message(constraint: Option<&str>) -> &'static str {
    match constraint {
        Some(IDENTITY_CONSTRAINT) => IDENTITY_TAKEN,
        _ => PHONE_TAKEN,
    }
}

fn map_unique_violation(err: sqlx::Error) -> AppError {
    let message = match &err {
        sqlx::Error::Database(db_err) => unique_message(db_err.constraint()),
        _ => PHONE_TAKEN,
    };
    AppError::from_unique_violation(err, message)
}

/// Almacén de registros de clientes
#[async_trait]
pub trait CustomerStore: Send + Sync {
    /// Todos los clientes, del más reciente al más antiguo
    async fn list_all(&self) -> AppResult<Vec<Customer>>;

    async fn find_by_id(&self, id: i32) -> AppResult<Option<Customer>>;

    async fn find_by_phone(&self, phone: &str) -> AppResult<Option<Customer>>;

    async fn find_by_line_user_id(&self, line_user_id: &str) -> AppResult<Option<Customer>>;

    /// Clientes con una identidad de LINE no vacía
    async fn linked_customers(&self) -> AppResult<Vec<Customer>>;

    /// Clientes con `prb_expiry <= cutoff`, ordenados por vencimiento
    async fn prb_expiring_by(&self, cutoff: NaiveDate) -> AppResult<Vec<Customer>>;

    /// Clientes con `ins_expiry <= cutoff`, ordenados por vencimiento
    async fn ins_expiring_by(&self, cutoff: NaiveDate) -> AppResult<Vec<Customer>>;

    async fn create(&self, data: NewCustomer) -> AppResult<Customer>;

    /// Reemplaza todos los campos; `None` si el id no existe
    async fn update(&self, id: i32, data: NewCustomer) -> AppResult<Option<Customer>>;

    /// `true` si se eliminó un registro
    async fn delete(&self, id: i32) -> AppResult<bool>;

    /// Vincula la identidad de LINE; solo toca ese campo
    async fn link_line_user_id(&self, id: i32, line_user_id: &str) -> AppResult<Option<Customer>>;
}

/// Implementación sobre PostgreSQL
pub struct PgCustomerStore {
    pool: PgPool,
}

impl PgCustomerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CustomerStore for PgCustomerStore {
    async fn list_all(&self) -> AppResult<Vec<Customer>> {
        let customers = sqlx::query_as::<_, Customer>("SELECT * FROM customers ORDER BY id DESC")
            .fetch_all(&self.pool)
            .await?;
        Ok(customers)
    }

    async fn find_by_id(&self, id: i32) -> AppResult<Option<Customer>> {
        let customer = sqlx::query_as::<_, Customer>("SELECT * FROM customers WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(customer)
    }

    async fn find_by_phone(&self, phone: &str) -> AppResult<Option<Customer>> {
        let customer = sqlx::query_as::<_, Customer>("SELECT * FROM customers WHERE phone = $1")
            .bind(phone)
            .fetch_optional(&self.pool)
            .await?;
        Ok(customer)
    }

    async fn find_by_line_user_id(&self, line_user_id: &str) -> AppResult<Option<Customer>> {
        let customer =
            sqlx::query_as::<_, Customer>("SELECT * FROM customers WHERE line_user_id = $1")
                .bind(line_user_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(customer)
    }

    async fn linked_customers(&self) -> AppResult<Vec<Customer>> {
        let customers = sqlx::query_as::<_, Customer>(
            "SELECT * FROM customers WHERE line_user_id IS NOT NULL AND btrim(line_user_id) <> '' ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(customers)
    }

    async fn prb_expiring_by(&self, cutoff: NaiveDate) -> AppResult<Vec<Customer>> {
        let customers = sqlx::query_as::<_, Customer>(
            "SELECT * FROM customers WHERE prb_expiry IS NOT NULL AND prb_expiry <= $1 ORDER BY prb_expiry ASC, id ASC",
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;
        Ok(customers)
    }

    async fn ins_expiring_by(&self, cutoff: NaiveDate) -> AppResult<Vec<Customer>> {
        let customers = sqlx::query_as::<_, Customer>(
            "SELECT * FROM customers WHERE ins_expiry IS NOT NULL AND ins_expiry <= $1 ORDER BY ins_expiry ASC, id ASC",
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;
        Ok(customers)
    }

    async fn create(&self, data: NewCustomer) -> AppResult<Customer> {
        sqlx::query_as::<_, Customer>(
            r#"
            INSERT INTO customers (name, phone, plate, service, service_date, prb_expiry, ins_expiry, line_user_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(data.name)
        .bind(data.phone)
        .bind(data.plate)
        .bind(data.service)
        .bind(data.service_date)
        .bind(data.prb_expiry)
        .bind(data.ins_expiry)
        .bind(data.line_user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(map_unique_violation)
    }

    async fn update(&self, id: i32, data: NewCustomer) -> AppResult<Option<Customer>> {
        sqlx::query_as::<_, Customer>(
            r#"
            UPDATE customers
            SET name = $2, phone = $3, plate = $4, service = $5, service_date = $6,
                prb_expiry = $7, ins_expiry = $8, line_user_id = $9
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(data.name)
        .bind(data.phone)
        .bind(data.plate)
        .bind(data.service)
        .bind(data.service_date)
        .bind(data.prb_expiry)
        .bind(data.ins_expiry)
        .bind(data.line_user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_unique_violation)
    }

    async fn delete(&self, id: i32) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM customers WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn link_line_user_id(&self, id: i32, line_user_id: &str) -> AppResult<Option<Customer>> {
        sqlx::query_as::<_, Customer>(
            "UPDATE customers SET line_user_id = $2 WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(line_user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_unique_violation)
    }
}

/// Implementación en memoria con las mismas restricciones de unicidad que la tabla
#[derive(Default)]
pub struct InMemoryCustomerStore {
    inner: RwLock<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    next_id: i32,
    customers: BTreeMap<i32, Customer>,
}

impl MemoryState {
    fn check_unique(&self, data: &NewCustomer, except: Option<i32>) -> AppResult<()> {
        let others = self.customers.values().filter(|c| Some(c.id) != except);
        for other in others {
            if other.phone == data.phone {
                return Err(conflict_error("Customer", "phone", &data.phone));
            }
            if let (Some(mine), Some(theirs)) = (
                data.line_user_id.as_deref().filter(|s| !s.trim().is_empty()),
                other.messaging_identity(),
            ) {
                if mine == theirs {
                    return Err(AppError::Conflict(IDENTITY_TAKEN.to_string()));
                }
            }
        }
        Ok(())
    }
}

impl InMemoryCustomerStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn filtered<F>(&self, keep: F) -> Vec<Customer>
    where
        F: Fn(&Customer) -> bool,
    {
        let state = self.inner.read().await;
        state.customers.values().filter(|c| keep(*c)).cloned().collect()
    }
}

#[async_trait]
impl CustomerStore for InMemoryCustomerStore {
    async fn list_all(&self) -> AppResult<Vec<Customer>> {
        let mut customers = self.filtered(|_| true).await;
        customers.reverse();
        Ok(customers)
    }

    async fn find_by_id(&self, id: i32) -> AppResult<Option<Customer>> {
        Ok(self.inner.read().await.customers.get(&id).cloned())
    }

    async fn find_by_phone(&self, phone: &str) -> AppResult<Option<Customer>> {
        Ok(self.filtered(|c| c.phone == phone).await.into_iter().next())
    }

    async fn find_by_line_user_id(&self, line_user_id: &str) -> AppResult<Option<Customer>> {
        Ok(self
            .filtered(|c| c.messaging_identity() == Some(line_user_id))
            .await
            .into_iter()
            .next())
    }

    async fn linked_customers(&self) -> AppResult<Vec<Customer>> {
        Ok(self.filtered(|c| c.messaging_identity().is_some()).await)
    }

    async fn prb_expiring_by(&self, cutoff: NaiveDate) -> AppResult<Vec<Customer>> {
        let mut customers = self
            .filtered(|c| c.prb_expiry.is_some_and(|d| d <= cutoff))
            .await;
        customers.sort_by_key(|c| (c.prb_expiry, c.id));
        Ok(customers)
    }

    async fn ins_expiring_by(&self, cutoff: NaiveDate) -> AppResult<Vec<Customer>> {
        let mut customers = self
            .filtered(|c| c.ins_expiry.is_some_and(|d| d <= cutoff))
            .await;
        customers.sort_by_key(|c| (c.ins_expiry, c.id));
        Ok(customers)
    }

    async fn create(&self, data: NewCustomer) -> AppResult<Customer> {
        let mut state = self.inner.write().await;
        state.check_unique(&data, None)?;
        state.next_id += 1;
        let customer = Customer::from_new(state.next_id, data);
        state.customers.insert(customer.id, customer.clone());
        Ok(customer)
    }

    async fn update(&self, id: i32, data: NewCustomer) -> AppResult<Option<Customer>> {
        let mut state = self.inner.write().await;
        if !state.customers.contains_key(&id) {
            return Ok(None);
        }
        state.check_unique(&data, Some(id))?;
        let customer = Customer::from_new(id, data);
        state.customers.insert(id, customer.clone());
        Ok(Some(customer))
    }

    async fn delete(&self, id: i32) -> AppResult<bool> {
        Ok(self.inner.write().await.customers.remove(&id).is_some())
    }

    async fn link_line_user_id(&self, id: i32, line_user_id: &str) -> AppResult<Option<Customer>> {
        let mut state = self.inner.write().await;
        let taken = state
            .customers
            .values()
            .any(|c| c.id != id && c.messaging_identity() == Some(line_user_id));
        if taken {
            return Err(AppError::Conflict(IDENTITY_TAKEN.to_string()));
        }
        Ok(state.customers.get_mut(&id).map(|customer| {
            customer.line_user_id = Some(line_user_id.to_string());
            customer.clone()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_customer(name: &str, phone: &str) -> NewCustomer {
        NewCustomer {
            name: name.to_string(),
            phone: phone.to_string(),
            plate: "1กข 234".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_assigns_increasing_ids() {
        let store = InMemoryCustomerStore::new();
        let a = store.create(new_customer("A", "0810000001")).await.unwrap();
        let b = store.create(new_customer("B", "0810000002")).await.unwrap();
        assert!(b.id > a.id);

        let listed = store.list_all().await.unwrap();
        assert_eq!(listed[0].id, b.id);
    }

    #[tokio::test]
    async fn test_phone_must_be_unique() {
        let store = InMemoryCustomerStore::new();
        store.create(new_customer("A", "0810000001")).await.unwrap();
        let err = store.create(new_customer("B", "0810000001")).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_update_keeps_own_phone() {
        let store = InMemoryCustomerStore::new();
        let a = store.create(new_customer("A", "0810000001")).await.unwrap();
        let mut data = new_customer("A renamed", "0810000001");
        data.service = Some("ตรวจสภาพ".to_string());
        let updated = store.update(a.id, data).await.unwrap().unwrap();
        assert_eq!(updated.id, a.id);
        assert_eq!(updated.name, "A renamed");

        assert!(store.update(999, new_customer("X", "1")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_linked_customers_skips_blank_identity() {
        let store = InMemoryCustomerStore::new();
        let mut blank = new_customer("Blank", "0810000001");
        blank.line_user_id = Some(String::new());
        store.create(blank).await.unwrap();
        let linked = store.create(new_customer("Linked", "0810000002")).await.unwrap();
        store.link_line_user_id(linked.id, "U-linked").await.unwrap();

        let result = store.linked_customers().await.unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].name, "Linked");
    }

    #[tokio::test]
    async fn test_link_rejects_identity_of_other_customer() {
        let store = InMemoryCustomerStore::new();
        let a = store.create(new_customer("A", "0810000001")).await.unwrap();
        let b = store.create(new_customer("B", "0810000002")).await.unwrap();
        store.link_line_user_id(a.id, "U1").await.unwrap();

        assert!(store.link_line_user_id(b.id, "U1").await.is_err());
        // volver a vincular el mismo cliente es válido
        assert!(store.link_line_user_id(a.id, "U1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_expiring_lists_sorted_and_bounded() {
        let store = InMemoryCustomerStore::new();
        let day = |d| NaiveDate::from_ymd_opt(2024, 5, d).unwrap();
        for (i, prb) in [Some(day(20)), Some(day(3)), None, Some(day(31))].into_iter().enumerate() {
            let mut data = new_customer(&format!("C{i}"), &format!("08100000{i}"));
            data.prb_expiry = prb;
            store.create(data).await.unwrap();
        }

        let expiring = store.prb_expiring_by(day(25)).await.unwrap();
        let dates: Vec<_> = expiring.iter().map(|c| c.prb_expiry).collect();
        assert_eq!(dates, vec![Some(day(3)), Some(day(20))]);
    }

    #[test]
    fn test_unique_message_by_constraint() {
        assert_eq!(unique_message(Some("customers_line_user_id_key")), IDENTITY_TAKEN);
        assert_eq!(unique_message(Some("customers_phone_key")), PHONE_TAKEN);
        assert_eq!(unique_message(None), PHONE_TAKEN);
    }

    #[test]
    fn test_non_database_error_is_not_conflict() {
        assert!(matches!(
            map_unique_violation(sqlx::Error::RowNotFound),
            AppError::Database(_)
        ));
    }

    #[tokio::test]
    async fn test_delete() {
        let store = InMemoryCustomerStore::new();
        let a = store.create(new_customer("A", "0810000001")).await.unwrap();
        assert!(store.delete(a.id).await.unwrap());
        assert!(!store.delete(a.id).await.unwrap());
        assert!(store.find_by_id(a.id).await.unwrap().is_none());
    }
}
