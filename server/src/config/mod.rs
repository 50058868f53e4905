use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

pub mod checkin_window;
pub mod cors;
pub mod security;

pub use checkin_window::{CheckinWindowConfig, CheckinWindowStore, ConfigError};
pub use cors::create_cors_layer;
pub use security::apply_security_headers;

const DEFAULT_DATABASE_URL: &str = "postgres://localhost/checkin";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3001";
const DEFAULT_CHECKIN_CONFIG_PATH: &str = "config/checkin_window.json";
const DEFAULT_ALLOWED_ORIGINS: &str = "http://localhost:3000,http://localhost:5173";
const DEFAULT_LOCK_TIMEOUT_MS: u64 = 5000;

/// Process configuration, read once at start-up.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub max_connections: u32,
    pub bind_addr: SocketAddr,
    /// Location of the check-in window JSON document.
    pub checkin_config_path: PathBuf,
    /// Upper bound on waiting for a row lock before a request fails as retryable.
    pub lock_timeout: Duration,
    pub allowed_origins: Vec<String>,
    /// Production mode turns on HSTS.
    pub production: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: 5,
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3001)),
            checkin_config_path: PathBuf::from(DEFAULT_CHECKIN_CONFIG_PATH),
            lock_timeout: Duration::from_millis(DEFAULT_LOCK_TIMEOUT_MS),
            allowed_origins: split_origins(DEFAULT_ALLOWED_ORIGINS),
            production: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let bind_addr = env::var("BIND_ADDR")
            .unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string())
            .parse()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Invalid BIND_ADDR, falling back to {}", DEFAULT_BIND_ADDR);
                defaults.bind_addr
            });

        Self {
            database_url: env::var("DATABASE_URL").unwrap_or(defaults.database_url),
            max_connections: parse_var("DATABASE_MAX_CONNECTIONS").unwrap_or(defaults.max_connections),
            bind_addr,
            checkin_config_path: env::var("CHECKIN_CONFIG_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.checkin_config_path),
            lock_timeout: parse_var("LOCK_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.lock_timeout),
            allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .map(|s| split_origins(&s))
                .unwrap_or(defaults.allowed_origins),
            production: env::var("RUST_ENV")
                .map(|v| v.to_lowercase() == "production")
                .unwrap_or(false),
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|s| s.trim().parse().ok())
}

fn split_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect()
}
