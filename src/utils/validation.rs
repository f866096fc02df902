//! Utilidades de validación
//!
//! Este módulo contiene funciones helper para validación de los datos
//! de los formularios y conversión de tipos.

use chrono::NaiveDate;
use validator::{ValidationError, ValidationErrors};

use crate::utils::errors::AppError;

/// Validar y convertir string a fecha (formato de `<input type="date">`)
pub fn validate_date(value: &str) -> Result<NaiveDate, ValidationError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| {
        let mut error = ValidationError::new("date");
        error.add_param("value".into(), &value.to_string());
        error.add_param("format".into(), &"YYYY-MM-DD".to_string());
        error
    })
}

/// Fecha opcional de formulario: vacío significa ausente
pub fn parse_optional_date(
    field: &'static str,
    value: &str,
) -> Result<Option<NaiveDate>, AppError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    validate_date(value).map(Some).map_err(|error| {
        let mut errors = ValidationErrors::new();
        errors.add(field, error);
        AppError::Validation(errors)
    })
}

/// Validar que un teléfono contenga solo dígitos
pub fn validate_phone(value: &str) -> Result<(), ValidationError> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        let mut error = ValidationError::new("phone");
        error.add_param("value".into(), &value.to_string());
        return Err(error);
    }
    Ok(())
}

/// Normaliza un teléfono quitando espacios y guiones
pub fn normalize_phone(value: &str) -> String {
    value
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect()
}

/// Texto opcional: vacío (tras recortar) significa ausente
pub fn optional_text(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_optional_date() {
        assert_eq!(parse_optional_date("prb_expiry", "").unwrap(), None);
        assert_eq!(parse_optional_date("prb_expiry", "  ").unwrap(), None);
        assert_eq!(
            parse_optional_date("prb_expiry", "2024-12-31").unwrap(),
            NaiveDate::from_ymd_opt(2024, 12, 31)
        );
        assert!(matches!(
            parse_optional_date("prb_expiry", "31/12/2024"),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_validate_phone() {
        assert!(validate_phone("0812345678").is_ok());
        assert!(validate_phone("08123x5678").is_err());
        assert!(validate_phone("").is_err());
    }

    #[test]
    fn test_normalize_phone() {
        assert_eq!(normalize_phone(" 081-234 5678 "), "0812345678");
    }

    #[test]
    fn test_optional_text() {
        assert_eq!(optional_text("   "), None);
        assert_eq!(optional_text(" oil change "), Some("oil change".to_string()));
    }
}
