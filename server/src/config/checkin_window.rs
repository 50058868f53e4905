//! Process-wide check-in/check-out window defaults.
//!
//! Persisted as a small JSON document and cached behind a read/write lock.
//! Readers take a copy of the whole value. Writers are serialised: each one
//! normalises, persists and replaces the cached copy before the next starts.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};

pub const DEFAULT_WINDOW_MINUTES: u32 = 60;
pub const MAX_WINDOW_MINUTES: i64 = 600;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to access check-in config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("check-in config file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{field} is required")]
    MissingField { field: &'static str },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckinWindowConfig {
    /// How long before an event starts check-in opens.
    pub checkin_allowed_before_start_minutes: u32,
    /// How long after an event starts check-out opens.
    pub min_minutes_after_start_for_checkout: u32,
}

impl Default for CheckinWindowConfig {
    fn default() -> Self {
        Self {
            checkin_allowed_before_start_minutes: DEFAULT_WINDOW_MINUTES,
            min_minutes_after_start_for_checkout: DEFAULT_WINDOW_MINUTES,
        }
    }
}

/// Wire shape of the config document and of admin updates. Fields are
/// signed so that negative input can be defaulted instead of failing to parse.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCheckinWindowConfig {
    #[serde(default)]
    pub checkin_allowed_before_start_minutes: Option<i64>,
    #[serde(default)]
    pub min_minutes_after_start_for_checkout: Option<i64>,
}

const CHECKIN_FIELD: &str = "checkinAllowedBeforeStartMinutes";
const CHECKOUT_FIELD: &str = "minMinutesAfterStartForCheckout";

impl RawCheckinWindowConfig {
    /// Load-time normalisation: anything missing or out of range becomes the default.
    pub fn normalize(self) -> CheckinWindowConfig {
        CheckinWindowConfig {
            checkin_allowed_before_start_minutes: lenient(
                CHECKIN_FIELD,
                self.checkin_allowed_before_start_minutes,
            ),
            min_minutes_after_start_for_checkout: lenient(
                CHECKOUT_FIELD,
                self.min_minutes_after_start_for_checkout,
            ),
        }
    }

    /// Write-time validation: both fields are required, out-of-range values
    /// become the default.
    pub fn validate(self) -> Result<CheckinWindowConfig, ConfigError> {
        Ok(CheckinWindowConfig {
            checkin_allowed_before_start_minutes: required(
                CHECKIN_FIELD,
                self.checkin_allowed_before_start_minutes,
            )?,
            min_minutes_after_start_for_checkout: required(
                CHECKOUT_FIELD,
                self.min_minutes_after_start_for_checkout,
            )?,
        })
    }
}

fn lenient(field: &'static str, value: Option<i64>) -> u32 {
    match value {
        Some(v) if (0..=MAX_WINDOW_MINUTES).contains(&v) => v as u32,
        Some(v) => {
            warn!(field, value = v, "Check-in config value out of range, using default");
            DEFAULT_WINDOW_MINUTES
        }
        None => DEFAULT_WINDOW_MINUTES,
    }
}

fn required(field: &'static str, value: Option<i64>) -> Result<u32, ConfigError> {
    match value {
        Some(v) => Ok(lenient(field, Some(v))),
        None => Err(ConfigError::MissingField { field }),
    }
}

/// Shared, reloadable holder of the current [`CheckinWindowConfig`].
#[derive(Debug)]
pub struct CheckinWindowStore {
    path: PathBuf,
    current: RwLock<CheckinWindowConfig>,
    writer: Mutex<()>,
    staging_seq: AtomicU64,
}

impl CheckinWindowStore {
    /// Holder with a fixed value and no backing file read yet.
    pub fn with_config(path: impl Into<PathBuf>, config: CheckinWindowConfig) -> Self {
        Self {
            path: path.into(),
            current: RwLock::new(config),
            writer: Mutex::new(()),
            staging_seq: AtomicU64::new(0),
        }
    }

    /// Reads the document at `path`. Never fails: a missing file silently
    /// yields the defaults and an unreadable one is logged and ignored.
    pub async fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let config = match read_document(&path).await {
            Ok(Some(config)) => {
                info!(path = %path.display(), ?config, "Loaded check-in window config");
                config
            }
            Ok(None) => CheckinWindowConfig::default(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring unreadable check-in window config");
                CheckinWindowConfig::default()
            }
        };
        Self::with_config(path, config)
    }

    pub fn snapshot(&self) -> CheckinWindowConfig {
        *self.current.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Validates, persists and then publishes a new value. The file and the
    /// cache always end up holding the same winner.
    pub async fn update(
        &self,
        raw: RawCheckinWindowConfig,
    ) -> Result<CheckinWindowConfig, ConfigError> {
        let config = raw.validate()?;
        let _writer = self.writer.lock().await;
        let seq = self.staging_seq.fetch_add(1, Ordering::Relaxed);
        write_document(&self.path, &config, seq).await?;
        self.replace(config);
        info!(?config, "Check-in window config updated");
        Ok(config)
    }

    /// Re-reads the backing file. Errors leave the cached value untouched.
    pub async fn reload(&self) -> Result<CheckinWindowConfig, ConfigError> {
        let _writer = self.writer.lock().await;
        let config = read_document(&self.path).await?.unwrap_or_default();
        self.replace(config);
        info!(?config, "Check-in window config reloaded");
        Ok(config)
    }

    fn replace(&self, config: CheckinWindowConfig) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = config;
    }
}

async fn read_document(path: &Path) -> Result<Option<CheckinWindowConfig>, ConfigError> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let raw: RawCheckinWindowConfig = serde_json::from_slice(&bytes)?;
    Ok(Some(raw.normalize()))
}

async fn write_document(
    path: &Path,
    config: &CheckinWindowConfig,
    seq: u64,
) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let body = serde_json::to_vec_pretty(config)?;
    let staging = path.with_extension(format!("json.{}.{seq}.tmp", std::process::id()));
    tokio::fs::write(&staging, body).await?;
    if let Err(e) = tokio::fs::rename(&staging, path).await {
        let _ = tokio::fs::remove_file(&staging).await;
        return Err(e.into());
    }
    Ok(())
}
