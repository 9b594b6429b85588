//! Configuration loading from environment variables.
//!
//! Values are read once at startup and handed to the components that need
//! them; nothing in the workspace reads the environment after this point.

use core::time::Duration;
use std::path::PathBuf;

use anyhow::{Context, Result};

/// Default directory holding one inbox subdirectory per model.
const DEFAULT_INBOX_DIR: &str = "./autotest";

/// Default root of the model artifact store.
const DEFAULT_ARTIFACT_DIR: &str = "./mlartifacts";

/// Default directory for log files.
const DEFAULT_LOG_DIR: &str = "./logs";

/// Default timeout applied to each external call made during a monitoring pass.
const DEFAULT_CALL_TIMEOUT_SECONDS: u64 = 60;

/// Implicit-TLS SMTP port.
const DEFAULT_SMTP_PORT: u16 = 465;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Database connection URL
    pub database_url: String,

    /// Root directory of the per-model test inboxes
    pub inbox_dir: PathBuf,

    /// Root directory of the model artifact store
    pub artifact_dir: PathBuf,

    /// Directory where log files are written
    pub log_dir: PathBuf,

    /// Monitoring pass settings
    pub monitor: MonitorConfig,
}

/// Settings that shape a monitoring pass.
#[derive(Debug, Clone, Copy)]
pub struct MonitorConfig {
    /// Upper bound for any single external call
    pub call_timeout: Duration,

    /// Whether owners are mailed when their model could not be tested at all
    pub notify_on_fault: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(DEFAULT_CALL_TIMEOUT_SECONDS),
            notify_on_fault: true,
        }
    }
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// Required environment variables:
    /// - `DATABASE_URL`: `PostgreSQL` connection string
    ///
    /// Optional environment variables:
    /// - `INBOX_DIR`: root of the per-model test inboxes (default: `./autotest`)
    /// - `ARTIFACT_DIR`: root of the model artifact store (default: `./mlartifacts`)
    /// - `LOG_DIR`: log file directory (default: `./logs`)
    /// - `MONITOR_CALL_TIMEOUT_SECS`: per-call timeout in seconds (default: 60)
    /// - `MONITOR_NOTIFY_ON_FAULT`: mail owners about faults (default: `true`)
    ///
    /// # Errors
    ///
    /// Returns an error if required environment variables are missing or an
    /// optional one cannot be parsed.
    pub fn from_env() -> Result<Self> {
        // Load .env file
        dotenvy::dotenv().ok();

        let database_url =
            std::env::var("DATABASE_URL").context("DATABASE_URL environment variable not set")?;

        let call_timeout_seconds = match std::env::var("MONITOR_CALL_TIMEOUT_SECS") {
            Ok(raw) => raw
                .trim()
                .parse::<u64>()
                .context("MONITOR_CALL_TIMEOUT_SECS must be a whole number of seconds")?,
            Err(_) => DEFAULT_CALL_TIMEOUT_SECONDS,
        };

        let notify_on_fault = match std::env::var("MONITOR_NOTIFY_ON_FAULT") {
            Ok(raw) => parse_flag(&raw)
                .context("MONITOR_NOTIFY_ON_FAULT must be one of true/false/1/0/yes/no")?,
            Err(_) => true,
        };

        Ok(Self {
            database_url,
            inbox_dir: path_or_default("INBOX_DIR", DEFAULT_INBOX_DIR),
            artifact_dir: path_or_default("ARTIFACT_DIR", DEFAULT_ARTIFACT_DIR),
            log_dir: path_or_default("LOG_DIR", DEFAULT_LOG_DIR),
            monitor: MonitorConfig {
                call_timeout: Duration::from_secs(call_timeout_seconds),
                notify_on_fault,
            },
        })
    }
}

/// SMTP settings used to deliver monitoring reports.
#[derive(Clone)]
pub struct MailConfig {
    /// SMTP relay host name
    pub server: String,

    /// SMTP port (implicit TLS)
    pub port: u16,

    /// Login used to authenticate against the relay
    pub login: String,

    /// Password used to authenticate against the relay
    pub password: String,

    /// Address placed in the `From` header
    pub sender: String,
}

impl core::fmt::Debug for MailConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MailConfig")
            .field("server", &self.server)
            .field("port", &self.port)
            .field("login", &self.login)
            .field("password", &"<redacted>")
            .field("sender", &self.sender)
            .finish()
    }
}

impl MailConfig {
    /// Loads SMTP settings from environment variables.
    ///
    /// Required environment variables:
    /// - `SMTP_SERVER`: relay host name
    /// - `SMTP_LOGIN`: account login
    /// - `SMTP_PASSWORD`: account password
    ///
    /// Optional environment variables:
    /// - `SMTP_PORT`: relay port (default: 465)
    /// - `SMTP_SENDER`: `From` address (default: the login)
    ///
    /// # Errors
    ///
    /// Returns an error if required environment variables are missing or the
    /// port is not a valid number.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let server =
            std::env::var("SMTP_SERVER").context("SMTP_SERVER environment variable not set")?;
        let login =
            std::env::var("SMTP_LOGIN").context("SMTP_LOGIN environment variable not set")?;
        let password =
            std::env::var("SMTP_PASSWORD").context("SMTP_PASSWORD environment variable not set")?;

        let port = match std::env::var("SMTP_PORT") {
            Ok(raw) => raw
                .trim()
                .parse::<u16>()
                .context("SMTP_PORT must be a valid port number")?,
            Err(_) => DEFAULT_SMTP_PORT,
        };

        let sender = std::env::var("SMTP_SENDER").unwrap_or_else(|_| login.clone());

        Ok(Self {
            server,
            port,
            login,
            password,
            sender,
        })
    }
}

fn path_or_default(key: &str, default: &str) -> PathBuf {
    std::env::var(key).map_or_else(|_| PathBuf::from(default), PathBuf::from)
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
