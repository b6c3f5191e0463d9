//! Service configuration.
//!
//! Every value comes from the environment (optionally seeded from a `.env`
//! file) and falls back to a default suitable for a local MySQL install.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Default connect/read timeout for per-target connections, in seconds.
pub const DEFAULT_DB_TIMEOUT_SECS: u64 = 60;

/// Default upper bound for a request body, in bytes.
pub const DEFAULT_MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Runtime configuration shared by all services.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Name of the service owning this configuration.
    pub service_name: String,
    /// Bind address.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Timeout for establishing a database connection.
    pub connect_timeout_secs: u64,
    /// Timeout for a single statement round trip.
    pub read_timeout_secs: u64,
    /// Character set negotiated on every database connection.
    pub session_charset: String,
    /// Collation negotiated on every database connection.
    pub session_collation: String,
    /// Idle lifetime of a stored session.
    pub session_ttl_secs: u64,
    /// Optional file receiving DROP DATABASE audit lines.
    pub audit_log_path: Option<PathBuf>,
    /// Emit JSON log lines instead of human-readable ones.
    pub log_json: bool,
    /// Largest accepted request body.
    pub max_body_bytes: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            service_name: "unknown".to_string(),
            host: "0.0.0.0".to_string(),
            port: 8080,
            connect_timeout_secs: DEFAULT_DB_TIMEOUT_SECS,
            read_timeout_secs: DEFAULT_DB_TIMEOUT_SECS,
            session_charset: "utf8mb4".to_string(),
            session_collation: "utf8mb4_unicode_ci".to_string(),
            session_ttl_secs: 24 * 60 * 60,
            audit_log_path: None,
            log_json: false,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl AppConfig {
    /// Loads the configuration for a service.
    ///
    /// `default_port` is used when `SERVER_PORT` is not set.
    pub fn load_with_service(service_name: &str, default_port: u16) -> Self {
        load_dotenv();
        let defaults = Self::default();

        Self {
            service_name: service_name.to_string(),
            host: env_or("SERVER_HOST", defaults.host),
            port: env_or("SERVER_PORT", default_port),
            connect_timeout_secs: env_or("DB_CONNECT_TIMEOUT_SECS", defaults.connect_timeout_secs),
            read_timeout_secs: env_or("DB_READ_TIMEOUT_SECS", defaults.read_timeout_secs),
            session_charset: env_or("DB_SESSION_CHARSET", defaults.session_charset),
            session_collation: env_or("DB_SESSION_COLLATION", defaults.session_collation),
            session_ttl_secs: env_or("SESSION_TTL_SECS", defaults.session_ttl_secs),
            audit_log_path: std::env::var("AUDIT_LOG_PATH")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
            log_json: std::env::var("LOG_FORMAT")
                .map(|v| v.eq_ignore_ascii_case("json"))
                .unwrap_or(false),
            max_body_bytes: env_or("MAX_BODY_BYTES", defaults.max_body_bytes),
        }
    }

    /// Connect timeout as a `Duration`.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Read timeout as a `Duration`.
    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    /// Session TTL as a `Duration`.
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    /// Socket address string to bind.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Installs the global tracing subscriber.
    ///
    /// Filtering honours `RUST_LOG` and defaults to `info`.
    pub fn init_tracing(&self) {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "info".into());
        let registry = tracing_subscriber::registry().with(filter);

        if self.log_json {
            registry.with(tracing_subscriber::fmt::layer().json()).init();
        } else {
            registry.with(tracing_subscriber::fmt::layer()).init();
        }
    }
}

/// Base URLs of peer services.
#[derive(Debug, Clone)]
pub struct ServiceUrls {
    /// Session collaborator (connection-service).
    pub connection_service: String,
}

impl ServiceUrls {
    /// Loads peer URLs from the environment.
    pub fn load() -> Self {
        let url: String = env_or(
            "CONNECTION_SERVICE_URL",
            "http://127.0.0.1:8081".to_string(),
        );
        Self {
            connection_service: url.trim_end_matches('/').to_string(),
        }
    }
}

/// Reads `.env` from the working directory; variables already present in
/// the environment are kept.
fn load_dotenv() {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("ignoring unreadable .env file: {e}");
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
