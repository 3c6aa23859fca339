use std::{env, fmt::Display, str::FromStr, time::Duration};

use anyhow::{Context, Result, anyhow};
use chrono_tz::Tz;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub pool_size: u32,
}

#[derive(Debug, Clone)]
pub struct PrinterConfig {
    /// `host:port` of a receipt printer listening for raw JSON receipts.
    pub addr: Option<String>,
    /// Print endpoint accepting a multipart text upload. Used when `addr` is unset.
    pub url: Option<String>,
    pub timeout: Duration,
    pub receipt_width: usize,
}

#[derive(Debug, Clone)]
pub struct BusinessConfig {
    /// Timezone that decides which calendar day an order belongs to.
    pub timezone: Tz,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub printer: PrinterConfig,
    pub business: BusinessConfig,
}

pub fn load() -> Result<AppConfig> {
    let url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;

    let timezone = match optional("BUSINESS_TIMEZONE") {
        Some(name) => name
            .parse::<Tz>()
            .map_err(|err| anyhow!("BUSINESS_TIMEZONE is not a valid IANA timezone: {err}"))?,
        None => Tz::UTC,
    };

    Ok(AppConfig {
        server: ServerConfig {
            host: optional("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or("SERVER_PORT", 3000)?,
        },
        database: DatabaseConfig {
            url,
            pool_size: parse_or("DB_POOL_SIZE", 10)?,
        },
        printer: PrinterConfig {
            addr: optional("PRINTER_ADDR"),
            url: optional("PRINTER_URL"),
            timeout: Duration::from_secs(parse_or("PRINTER_TIMEOUT_SECS", 5)?),
            receipt_width: parse_or("RECEIPT_WIDTH", 32)?,
        },
        business: BusinessConfig { timezone },
    })
}

/// Reads a variable, treating an empty value the same as an unset one.
fn optional(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match optional(key) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|err| anyhow!("{key}={raw:?} could not be parsed: {err}")),
        None => Ok(default),
    }
}
