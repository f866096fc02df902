//! DTOs de formularios y queries

pub mod customer_dto;
