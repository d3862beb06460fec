use anyhow::{Context, Result};
use base64::{engine::general_purpose, Engine as _};

pub const DEFAULT_ROLLUP_CRON: &str = "0 0 * * * *";

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// `None` runs against the in-memory store.
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub bind_addr: String,
    pub session_key: Vec<u8>,
    pub rollup_cron: String,
    pub anon_report_limit: usize,
    pub anon_report_window_secs: u64,
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{name} is invalid: {e}")),
        _ => Ok(default),
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|v| !v.trim().is_empty());

        let session_key_b64 = std::env::var("SESSION_KEY").context("SESSION_KEY missing")?;
        let session_key = general_purpose::STANDARD
            .decode(session_key_b64.trim())
            .context("SESSION_KEY must be base64")?;
        if session_key.len() < 32 {
            anyhow::bail!("SESSION_KEY must decode to at least 32 bytes");
        }

        let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| {
            let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
            format!("0.0.0.0:{}", port)
        });

        Ok(Self {
            database_url,
            db_max_connections: env_or("DB_MAX_CONNECTIONS", 10)?,
            bind_addr,
            session_key,
            rollup_cron: std::env::var("ROLLUP_CRON")
                .unwrap_or_else(|_| DEFAULT_ROLLUP_CRON.to_string()),
            anon_report_limit: env_or("ANON_REPORT_LIMIT", 10)?,
            anon_report_window_secs: env_or("ANON_REPORT_WINDOW_SECS", 60)?,
        })
    }
}
