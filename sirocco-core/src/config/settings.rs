//! Typed application settings.
//!
//! Settings are split across two files: `config/app.yaml` carries the
//! application config (heartbeat, proxy, logging, notifications) and
//! `secrets/accounts.yaml` carries the per-exchange API credentials.
//! Missing files are tolerated and fall back to defaults so a public
//! market-data client can run without any configuration at all.

use crate::config::loader::ConfigLoader;
use crate::error::ConfigError;
use crate::logging::LogConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Default path of the application configuration file.
pub const DEFAULT_APP_CONFIG_PATH: &str = "config/app.yaml";

/// Default path of the account secrets file.
pub const DEFAULT_ACCOUNTS_PATH: &str = "secrets/accounts.yaml";

/// Scheduler settings from the `heartbeat` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeartbeatSettings {
    /// Tick count logging interval. 0 disables the periodic log line.
    pub interval: u64,
    /// Status broadcast interval in ticks. 0 disables broadcasting.
    pub broadcast: u64,
}

impl Default for HeartbeatSettings {
    fn default() -> Self {
        Self {
            interval: 60,
            broadcast: 0,
        }
    }
}

/// Outbound proxy settings from the `proxy` section.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxySettings {
    /// Whether outbound connections should go through the proxy.
    pub enabled: bool,
    /// Proxy URL for plain HTTP traffic.
    pub http: Option<String>,
    /// Proxy URL for HTTPS traffic.
    pub https: Option<String>,
}

impl ProxySettings {
    /// Returns the effective proxy address, preferring the HTTPS entry.
    ///
    /// Returns `None` when the proxy is disabled or no address is set.
    #[must_use]
    pub fn address(&self) -> Option<String> {
        if !self.enabled {
            return None;
        }
        self.https.clone().or_else(|| self.http.clone())
    }
}

/// Per-exchange API credentials.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Credentials {
    /// API key.
    pub api_key: String,
    /// API secret.
    #[serde(alias = "secret_key")]
    pub api_secret: String,
    /// Passphrase, required by some exchanges.
    #[serde(default)]
    pub passphrase: Option<String>,
}

/// Application configuration (`config/app.yaml`).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Scheduler settings.
    pub heartbeat: HeartbeatSettings,
    /// Outbound proxy settings.
    pub proxy: ProxySettings,
    /// Logging settings.
    pub logging: LogConfig,
    /// Notification channel settings, keyed by channel name.
    pub notifications: HashMap<String, HashMap<String, String>>,
}

/// Account secrets (`secrets/accounts.yaml`).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
struct AccountsConfig {
    /// Credentials keyed by exchange name.
    exchanges: HashMap<String, Credentials>,
}

/// Combined application settings.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    app: AppConfig,
    accounts: AccountsConfig,
}

impl Settings {
    /// Loads settings from the default paths.
    ///
    /// Files that do not exist are skipped and their sections fall back
    /// to defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing file cannot be read or parsed.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_paths(DEFAULT_APP_CONFIG_PATH, DEFAULT_ACCOUNTS_PATH)
    }

    /// Loads settings from explicit file paths.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing file cannot be read or parsed.
    pub fn from_paths<P, Q>(app_path: P, accounts_path: Q) -> Result<Self, ConfigError>
    where
        P: AsRef<Path>,
        Q: AsRef<Path>,
    {
        let loader = ConfigLoader::new();

        let app = if app_path.as_ref().exists() {
            loader.load_file(app_path)?
        } else {
            AppConfig::default()
        };

        let accounts = if accounts_path.as_ref().exists() {
            loader.load_file(accounts_path)?
        } else {
            AccountsConfig::default()
        };

        Ok(Self { app, accounts })
    }

    /// Returns the application config.
    #[must_use]
    pub fn app(&self) -> &AppConfig {
        &self.app
    }

    /// Returns the scheduler settings.
    #[must_use]
    pub fn heartbeat(&self) -> &HeartbeatSettings {
        &self.app.heartbeat
    }

    /// Returns the effective proxy address, if proxying is enabled.
    #[must_use]
    pub fn proxy_address(&self) -> Option<String> {
        self.app.proxy.address()
    }

    /// Returns the logging settings.
    #[must_use]
    pub fn logging(&self) -> &LogConfig {
        &self.app.logging
    }

    /// Returns the credentials for an exchange.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::SectionNotFound` if no credentials are
    /// configured for the exchange.
    pub fn account(&self, exchange: &str) -> Result<&Credentials, ConfigError> {
        self.accounts
            .exchanges
            .get(exchange)
            .ok_or_else(|| ConfigError::SectionNotFound {
                section: format!("exchanges.{exchange}"),
            })
    }

    /// Returns true if credentials are configured for the exchange.
    #[must_use]
    pub fn has_account(&self, exchange: &str) -> bool {
        self.accounts.exchanges.contains_key(exchange)
    }

    /// Returns the names of all configured exchanges, sorted.
    #[must_use]
    pub fn list_exchanges(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.accounts.exchanges.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Returns the settings for a notification channel.
    #[must_use]
    pub fn notification(&self, channel: &str) -> Option<&HashMap<String, String>> {
        self.app.notifications.get(channel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::loader::ConfigFormat;

    const APP_YAML: &str = r"
heartbeat:
  interval: 30
  broadcast: 10
proxy:
  enabled: true
  http: http://127.0.0.1:7890
logging:
  level: debug
notifications:
  telegram:
    token: abc
    chat_id: '42'
";

    const ACCOUNTS_YAML: &str = r"
exchanges:
  bybit:
    api_key: test-key
    api_secret: test-secret
  gate:
    api_key: gk
    secret_key: gs
";

    fn settings_from_strs(app: &str, accounts: &str) -> Settings {
        let loader = ConfigLoader::new();
        Settings {
            app: loader.load_str(app, ConfigFormat::Yaml).unwrap(),
            accounts: loader.load_str(accounts, ConfigFormat::Yaml).unwrap(),
        }
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.heartbeat().interval, 60);
        assert_eq!(settings.heartbeat().broadcast, 0);
        assert_eq!(settings.proxy_address(), None);
        assert!(settings.list_exchanges().is_empty());
    }

    #[test]
    fn test_parse_app_config() {
        let settings = settings_from_strs(APP_YAML, ACCOUNTS_YAML);
        assert_eq!(settings.heartbeat().interval, 30);
        assert_eq!(settings.heartbeat().broadcast, 10);
        assert_eq!(settings.logging().level, "debug");
        assert_eq!(
            settings.notification("telegram").unwrap().get("token"),
            Some(&"abc".to_string())
        );
    }

    #[test]
    fn test_proxy_address_prefers_https() {
        let mut proxy = ProxySettings {
            enabled: true,
            http: Some("http://127.0.0.1:7890".to_string()),
            https: Some("http://127.0.0.1:7891".to_string()),
        };
        assert_eq!(
            proxy.address(),
            Some("http://127.0.0.1:7891".to_string())
        );

        proxy.https = None;
        assert_eq!(proxy.address(), Some("http://127.0.0.1:7890".to_string()));

        proxy.enabled = false;
        assert_eq!(proxy.address(), None);
    }

    #[test]
    fn test_account_lookup() {
        let settings = settings_from_strs(APP_YAML, ACCOUNTS_YAML);

        let creds = settings.account("bybit").unwrap();
        assert_eq!(creds.api_key, "test-key");
        assert_eq!(creds.api_secret, "test-secret");
        assert!(creds.passphrase.is_none());

        assert!(settings.has_account("gate"));
        assert!(!settings.has_account("kraken"));
        assert!(matches!(
            settings.account("kraken").unwrap_err(),
            ConfigError::SectionNotFound { .. }
        ));
    }

    #[test]
    fn test_secret_key_alias() {
        let settings = settings_from_strs(APP_YAML, ACCOUNTS_YAML);
        let creds = settings.account("gate").unwrap();
        assert_eq!(creds.api_secret, "gs");
    }

    #[test]
    fn test_list_exchanges_sorted() {
        let settings = settings_from_strs(APP_YAML, ACCOUNTS_YAML);
        assert_eq!(settings.list_exchanges(), vec!["bybit", "gate"]);
    }

    #[test]
    fn test_missing_files_fall_back_to_defaults() {
        let settings =
            Settings::from_paths("/nonexistent/app.yaml", "/nonexistent/accounts.yaml").unwrap();
        assert_eq!(settings.heartbeat().interval, 60);
        assert!(!settings.has_account("bybit"));
    }
}
