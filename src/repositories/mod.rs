//! Repositorios
//!
//! Acceso a datos de clientes.

pub mod customer_repository;

pub use customer_repository::{CustomerStore, InMemoryCustomerStore, PgCustomerStore};
