//! Application-level configuration loading: JSON file first, environment overrides second.

use std::{
    env, fs,
    io::ErrorKind,
    path::PathBuf,
    sync::{Arc, RwLock},
    time::Duration,
};

use serde::Deserialize;
use tracing::{info, warn};

use crate::dao::models::CourtId;

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "COURTSIDE_CONFIG_PATH";

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_COURT_COUNT: CourtId = 120;
const DEFAULT_SCOPE: &str = "default";
const DEFAULT_TOURNAMENT_LABEL: &str = "Tournament";
const DEFAULT_REMOTE_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_RECORDER_ATTEMPTS: u32 = 3;
const DEFAULT_RECORDER_RETRY_STEP: Duration = Duration::from_millis(500);
const DEFAULT_SNAPSHOT_TTL: Duration = Duration::from_secs(3600);

/// Settings for the court recording devices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecorderSettings {
    /// Base URL of the device-control API. Unset disables recording actuation.
    pub base_url: Option<String>,
    /// Bearer token sent in the `Authorization` header.
    pub bearer_token: Option<String>,
    /// Client id sent as a query parameter.
    pub client_id: Option<String>,
    /// Client secret sent as a query parameter.
    pub client_secret: Option<String>,
    /// Timeout of a single attempt.
    pub timeout: Duration,
    /// Attempts per command, first try included.
    pub max_attempts: u32,
    /// Delay before attempt `n + 1` is `n * retry_step`.
    pub retry_step: Duration,
}

impl Default for RecorderSettings {
    fn default() -> Self {
        Self {
            base_url: None,
            bearer_token: None,
            client_id: None,
            client_secret: None,
            timeout: DEFAULT_REMOTE_TIMEOUT,
            max_attempts: DEFAULT_RECORDER_ATTEMPTS,
            retry_step: DEFAULT_RECORDER_RETRY_STEP,
        }
    }
}

/// Settings for the operations-hub webhook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookSettings {
    /// Target URL. Unset disables notifications.
    pub url: Option<String>,
    /// Timeout of the single delivery attempt.
    pub timeout: Duration,
}

impl Default for WebhookSettings {
    fn default() -> Self {
        Self {
            url: None,
            timeout: DEFAULT_REMOTE_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// HTTP listen port.
    pub port: u16,
    /// Courts `1..=court_count` are created at startup.
    pub court_count: CourtId,
    /// Opaque scoping key isolating viewer channels and relay keys.
    pub channel_scope: String,
    /// Initial tournament label used in webhook payloads.
    pub tournament_label: String,
    /// Lifetime of cached court snapshots.
    pub snapshot_ttl: Duration,
    /// Recording device settings.
    pub recorder: RecorderSettings,
    /// Webhook settings.
    pub webhook: WebhookSettings,
    /// Redis URL enabling the cross-process relay.
    pub redis_url: Option<String>,
    /// MongoDB URI. Unset selects the in-memory store.
    pub mongo_uri: Option<String>,
    /// MongoDB database name override.
    pub mongo_db: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            court_count: DEFAULT_COURT_COUNT,
            channel_scope: DEFAULT_SCOPE.into(),
            tournament_label: DEFAULT_TOURNAMENT_LABEL.into(),
            snapshot_ttl: DEFAULT_SNAPSHOT_TTL,
            recorder: RecorderSettings::default(),
            webhook: WebhookSettings::default(),
            redis_url: None,
            mongo_uri: None,
            mongo_db: None,
        }
    }
}

impl AppConfig {
    /// Load the configuration from disk, then apply environment overrides.
    pub fn load() -> Self {
        let mut config = Self::load_file();
        config.apply_overrides(|key| env::var(key).ok());
        config
    }

    fn load_file() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    info!(path = %path.display(), "loaded configuration file");
                    raw.into()
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Apply overrides from a variable lookup (the process environment in production).
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(port) = parse_var(&lookup, "PORT") {
            self.port = port;
        }
        if let Some(count) = parse_var(&lookup, "COURT_COUNT") {
            self.court_count = count;
        }
        if let Some(scope) = lookup("CHANNEL_SCOPE") {
            self.channel_scope = scope;
        }
        if let Some(label) = lookup("TOURNAMENT_LABEL") {
            self.tournament_label = label;
        }
        if let Some(url) = lookup("RECORDER_API_URL") {
            self.recorder.base_url = Some(url);
        }
        if let Some(token) = lookup("RECORDER_API_TOKEN") {
            self.recorder.bearer_token = Some(token);
        }
        if let Some(id) = lookup("RECORDER_CLIENT_ID") {
            self.recorder.client_id = Some(id);
        }
        if let Some(secret) = lookup("RECORDER_CLIENT_SECRET") {
            self.recorder.client_secret = Some(secret);
        }
        if let Some(url) = lookup("WEBHOOK_URL") {
            self.webhook.url = Some(url);
        }
        if let Some(url) = lookup("REDIS_URL") {
            self.redis_url = Some(url);
        }
        if let Some(uri) = lookup("MONGO_URI") {
            self.mongo_uri = Some(uri);
        }
        if let Some(db) = lookup("MONGO_DB") {
            self.mongo_db = Some(db);
        }
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "ignoring unparsable environment override");
            None
        }
    }
}

/// Shared, settable tournament label read by the webhook notifier at send time.
#[derive(Debug, Clone)]
pub struct TournamentLabel {
    inner: Arc<RwLock<String>>,
}

impl TournamentLabel {
    /// Create a handle holding `label`.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(label.into())),
        }
    }

    /// Current label.
    pub fn get(&self) -> String {
        match self.inner.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Replace the label; subsequent notifications carry the new value.
    pub fn set(&self, label: impl Into<String>) {
        let label = label.into();
        match self.inner.write() {
            Ok(mut guard) => *guard = label,
            Err(poisoned) => *poisoned.into_inner() = label,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    port: Option<u16>,
    court_count: Option<CourtId>,
    channel_scope: Option<String>,
    tournament_label: Option<String>,
    snapshot_ttl_secs: Option<u64>,
    recorder: RawRecorder,
    webhook: RawWebhook,
    redis_url: Option<String>,
    mongo_uri: Option<String>,
    mongo_db: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawRecorder {
    base_url: Option<String>,
    bearer_token: Option<String>,
    client_id: Option<String>,
    client_secret: Option<String>,
    timeout_ms: Option<u64>,
    max_attempts: Option<u32>,
    retry_step_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawWebhook {
    url: Option<String>,
    timeout_ms: Option<u64>,
}

impl From<RawConfig> for AppConfig {
    fn from(raw: RawConfig) -> Self {
        let defaults = AppConfig::default();
        let recorder_defaults = RecorderSettings::default();
        Self {
            port: raw.port.unwrap_or(defaults.port),
            court_count: raw.court_count.unwrap_or(defaults.court_count),
            channel_scope: raw.channel_scope.unwrap_or(defaults.channel_scope),
            tournament_label: raw.tournament_label.unwrap_or(defaults.tournament_label),
            snapshot_ttl: raw
                .snapshot_ttl_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.snapshot_ttl),
            recorder: RecorderSettings {
                base_url: raw.recorder.base_url,
                bearer_token: raw.recorder.bearer_token,
                client_id: raw.recorder.client_id,
                client_secret: raw.recorder.client_secret,
                timeout: raw
                    .recorder
                    .timeout_ms
                    .map(Duration::from_millis)
                    .unwrap_or(recorder_defaults.timeout),
                max_attempts: raw
                    .recorder
                    .max_attempts
                    .filter(|attempts| *attempts > 0)
                    .unwrap_or(recorder_defaults.max_attempts),
                retry_step: raw
                    .recorder
                    .retry_step_ms
                    .map(Duration::from_millis)
                    .unwrap_or(recorder_defaults.retry_step),
            },
            webhook: WebhookSettings {
                url: raw.webhook.url,
                timeout: raw
                    .webhook
                    .timeout_ms
                    .map(Duration::from_millis)
                    .unwrap_or(DEFAULT_REMOTE_TIMEOUT),
            },
            redis_url: raw.redis_url,
            mongo_uri: raw.mongo_uri,
            mongo_db: raw.mongo_db,
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let raw: RawConfig = serde_json::from_str(
            r#"{"court_count": 8, "recorder": {"base_url": "http://rec", "max_attempts": 0}}"#,
        )
        .unwrap();
        let config = AppConfig::from(raw);

        assert_eq!(config.court_count, 8);
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.recorder.base_url.as_deref(), Some("http://rec"));
        assert_eq!(config.recorder.max_attempts, DEFAULT_RECORDER_ATTEMPTS);
        assert_eq!(config.snapshot_ttl, DEFAULT_SNAPSHOT_TTL);
    }

    #[test]
    fn overrides_win_and_blank_or_invalid_values_are_ignored() {
        let vars: HashMap<&str, &str> = [
            ("PORT", "not-a-port"),
            ("COURT_COUNT", "12"),
            ("CHANNEL_SCOPE", "finals"),
            ("WEBHOOK_URL", "  "),
            ("TOURNAMENT_LABEL", "Winter Open"),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config.apply_overrides(|key| vars.get(key).map(|value| value.to_string()));

        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.court_count, 12);
        assert_eq!(config.channel_scope, "finals");
        assert_eq!(config.webhook.url, None);
        assert_eq!(config.tournament_label, "Winter Open");
    }

    #[test]
    fn tournament_label_updates_are_shared() {
        let label = TournamentLabel::new("Spring Cup");
        let reader = label.clone();
        label.set("Summer Cup");
        assert_eq!(reader.get(), "Summer Cup");
    }
}
