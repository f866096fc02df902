//! Configuración de variables de entorno
//!
//! Este módulo maneja la configuración del entorno: servidor, credenciales
//! de LINE y horario del aviso diario.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use chrono_tz::Tz;
use thiserror::Error;

/// Error al leer la configuración
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} has an invalid value '{value}'")]
    InvalidValue { name: &'static str, value: String },

    #[error("{name} must be between {min} and {max}, got {value}")]
    OutOfRange {
        name: &'static str,
        value: u32,
        min: u32,
        max: u32,
    },
}

/// Credenciales del canal LINE Messaging API
#[derive(Debug, Clone)]
pub struct LineConfig {
    pub channel_access_token: Option<String>,
    pub channel_secret: Option<String>,
    pub api_base_url: String,
}

impl LineConfig {
    /// El bot está operativo solo si tiene token y secreto
    pub fn is_configured(&self) -> bool {
        self.channel_access_token.is_some() && self.channel_secret.is_some()
    }
}

/// Horario del escaneo diario de vencimientos
#[derive(Debug, Clone)]
pub struct NotificationConfig {
    pub hour: u32,
    pub minute: u32,
    pub timezone: Tz,
    pub push_timeout: Duration,
}

/// Configuración del entorno
#[derive(Debug, Clone)]
pub struct EnvironmentConfig {
    pub environment: String,
    pub port: u16,
    pub host: String,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub line: LineConfig,
    pub notification: NotificationConfig,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            port: 5001,
            host: "0.0.0.0".to_string(),
            database_url: None,
            db_max_connections: 10,
            line: LineConfig {
                channel_access_token: None,
                channel_secret: None,
                api_base_url: "https://api.line.me".to_string(),
            },
            notification: NotificationConfig {
                hour: 9,
                minute: 0,
                timezone: chrono_tz::Asia::Bangkok,
                push_timeout: Duration::from_secs(10),
            },
        }
    }
}

impl EnvironmentConfig {
    /// Leer la configuración desde variables de entorno (con valores por defecto)
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let hour = parse_var("NOTIFY_HOUR", defaults.notification.hour)?;
        check_range("NOTIFY_HOUR", hour, 0, 23)?;
        let minute = parse_var("NOTIFY_MINUTE", defaults.notification.minute)?;
        check_range("NOTIFY_MINUTE", minute, 0, 59)?;
        let push_timeout_secs: u64 = parse_var("PUSH_TIMEOUT_SECS", 10)?;

        Ok(Self {
            environment: env::var("ENVIRONMENT").unwrap_or(defaults.environment),
            port: parse_var("PORT", defaults.port)?,
            host: env::var("HOST").unwrap_or(defaults.host),
            database_url: non_empty_var("DATABASE_URL"),
            db_max_connections: parse_var("DB_MAX_CONNECTIONS", defaults.db_max_connections)?,
            line: LineConfig {
                channel_access_token: non_empty_var("LINE_CHANNEL_ACCESS_TOKEN"),
                channel_secret: non_empty_var("LINE_CHANNEL_SECRET"),
                api_base_url: non_empty_var("LINE_API_BASE_URL")
                    .unwrap_or(defaults.line.api_base_url),
            },
            notification: NotificationConfig {
                hour,
                minute,
                timezone: parse_var("NOTIFY_TIMEZONE", defaults.notification.timezone)?,
                push_timeout: Duration::from_secs(push_timeout_secs),
            },
        })
    }

    /// Obtener la dirección del servidor
    pub fn server_url(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match non_empty_var(name) {
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::InvalidValue { name, value }),
        None => Ok(default),
    }
}

fn check_range(name: &'static str, value: u32, min: u32, max: u32) -> Result<(), ConfigError> {
    if value < min || value > max {
        return Err(ConfigError::OutOfRange {
            name,
            value,
            min,
            max,
        });
    }
    Ok(())
}
