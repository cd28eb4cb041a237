//! Input validation helpers. Every check runs before any write.

use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveTime};
use regex::Regex;
use uuid::Uuid;

use crate::error::ServiceError;

/// A required text field: present and not blank. Returns the trimmed value.
pub fn required(value: Option<&str>, field: &str) -> Result<String, ServiceError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(ServiceError::Validation(format!(
            "El campo '{field}' es obligatorio"
        ))),
    }
}

/// An optional text field: blank collapses to `None`.
pub fn optional(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Collect the names of missing required fields, so the error lists them all.
pub fn missing_fields<'a>(fields: &[(&'a str, Option<&str>)]) -> Vec<&'a str> {
    fields
        .iter()
        .filter(|(_, v)| v.map_or(true, |s| s.trim().is_empty()))
        .map(|(name, _)| *name)
        .collect()
}

pub fn require_all(fields: &[(&str, Option<&str>)]) -> Result<(), ServiceError> {
    let missing = missing_fields(fields);
    if missing.is_empty() {
        Ok(())
    } else {
        Err(ServiceError::Validation(format!(
            "Faltan campos obligatorios: {}",
            missing.join(", ")
        )))
    }
}

/// Minimal `local@domain.tld` shape check, normalized to lowercase.
pub fn email(value: &str) -> Result<String, ServiceError> {
    let normalized = value.trim().to_lowercase();
    if EMAIL_PATTERN.is_match(&normalized) {
        Ok(normalized)
    } else {
        Err(ServiceError::Validation(format!("Correo inválido: {value}")))
    }
}

// Dot-separated atoms, then hostname labels (no empty or hyphen-edged
// labels) and an alphabetic TLD. Matched against the lowercased input.
static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[a-z0-9!#$%&'*+/=?^_`{|}~-]+(?:\.[a-z0-9!#$%&'*+/=?^_`{|}~-]+)*@(?:[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?\.)+[a-z]{2,63}$",
    )
    .unwrap()
});

/// `YYYY-MM-DD`
pub fn date(value: &str) -> Result<NaiveDate, ServiceError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| ServiceError::Validation(format!("Fecha inválida (AAAA-MM-DD): {value}")))
}

/// `HH:MM` (24h). Returns the canonical zero-padded form.
pub fn time(value: &str) -> Result<String, ServiceError> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M")
        .map(|t| t.format("%H:%M").to_string())
        .map_err(|_| ServiceError::Validation(format!("Hora inválida (HH:MM): {value}")))
}

pub fn id(value: &str, field: &str) -> Result<Uuid, ServiceError> {
    Uuid::parse_str(value.trim())
        .map_err(|_| ServiceError::Validation(format!("Identificador inválido en '{field}'")))
}
