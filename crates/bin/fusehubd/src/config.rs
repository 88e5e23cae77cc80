//! Configuration loading — TOML file with environment variable overrides.
//!
//! Looks for `fusehub.toml` in the working directory. Every field has a
//! sensible default so the file is optional. Environment variables take
//! precedence over file values.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use fusehub_adapter_mqtt::MqttConfig;
use fusehub_app::options::HubOptions;
use fusehub_domain::account::AccountSource;
use fusehub_domain::id::DeviceId;
use fusehub_domain::virtual_function::VirtualFunctionDescriptor;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Aggregation and dispatch tunables.
    pub hub: HubConfig,
    /// Backend account connections.
    pub accounts: AccountsConfig,
    /// Virtual functions, grouped by category at startup.
    pub virtual_functions: Vec<VirtualFunctionDescriptor>,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

/// Hub tunables.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Order in which account stores are folded into the aggregated view.
    pub priority: Vec<AccountSource>,
    /// Upper bound for one backend command batch, in milliseconds.
    pub dispatch_timeout_ms: u64,
    /// Window in which two disagreeing sources count as a conflict, in milliseconds.
    pub conflict_window_ms: u64,
    /// Devices whose traffic is logged verbosely.
    pub watched_devices: Vec<String>,
    /// Capacity of the in-process event bus.
    pub event_capacity: usize,
}

/// Both backend accounts.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AccountsConfig {
    pub push: AccountConfig,
    pub api: AccountConfig,
}

/// One backend account.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AccountConfig {
    /// A disabled account is never established.
    pub enabled: bool,
    /// JSON array of device records to seed the account with. The demo set
    /// is used when absent.
    pub devices_file: Option<PathBuf>,
    /// Message-queue connection. No push messages are received when absent.
    pub mqtt: Option<MqttConfig>,
}

impl Config {
    /// Load configuration from `fusehub.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if the
    /// resulting configuration is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file("fusehub.toml")?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(val) = var("FUSEHUB_LOG") {
            self.logging.filter = val;
        }
        if let Some(val) = var("RUST_LOG") {
            self.logging.filter = val;
        }
        if let Some(timeout) = var("FUSEHUB_DISPATCH_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
            self.hub.dispatch_timeout_ms = timeout;
        }
        if let Some(val) = var("FUSEHUB_WATCH") {
            self.hub.watched_devices = val
                .split(',')
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(ToString::to_string)
                .collect();
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.hub.priority.is_empty() {
            return Err(ConfigError::Validation(
                "hub.priority must list at least one source".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        if let Some(source) = self.hub.priority.iter().find(|s| !seen.insert(**s)) {
            return Err(ConfigError::Validation(format!(
                "hub.priority lists {source} more than once"
            )));
        }
        if self.hub.dispatch_timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "hub.dispatch_timeout_ms must be non-zero".to_string(),
            ));
        }
        if let (Some(push), Some(api)) = (&self.accounts.push.mqtt, &self.accounts.api.mqtt)
            && self.accounts.push.enabled
            && self.accounts.api.enabled
            && push.broker_host == api.broker_host
            && push.client_id == api.client_id
        {
            return Err(ConfigError::Validation(
                "accounts.push.mqtt and accounts.api.mqtt share a client_id on the same broker"
                    .to_string(),
            ));
        }
        for descriptor in &self.virtual_functions {
            descriptor
                .validate()
                .map_err(|err| ConfigError::Validation(format!("virtual function: {err}")))?;
        }
        Ok(())
    }

    /// Hub options derived from the `[hub]` section.
    #[must_use]
    pub fn hub_options(&self) -> HubOptions {
        HubOptions {
            priority: self.hub.priority.clone(),
            dispatch_timeout: Duration::from_millis(self.hub.dispatch_timeout_ms),
            conflict_window: Duration::from_millis(self.hub.conflict_window_ms),
            watched_devices: self
                .hub
                .watched_devices
                .iter()
                .map(|id| DeviceId::new(id.as_str()))
                .collect(),
        }
    }

    /// The account section serving `source`.
    #[must_use]
    pub fn account(&self, source: AccountSource) -> &AccountConfig {
        match source.owning_account() {
            AccountSource::Api => &self.accounts.api,
            AccountSource::Upstream | AccountSource::Push => &self.accounts.push,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "fusehubd=info,fusehub=info".to_string(),
        }
    }
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            priority: AccountSource::ALL.to_vec(),
            dispatch_timeout_ms: 10_000,
            conflict_window_ms: 2_000,
            watched_devices: Vec::new(),
            event_capacity: 256,
        }
    }
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            devices_file: None,
            mqtt: None,
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}
