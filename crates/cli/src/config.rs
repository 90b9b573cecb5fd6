//! CLI configuration.
//!
//! Loaded from a TOML file (`metaforce.toml` in the working directory unless
//! `--config` / `METAFORCE_CONFIG` names another). Every section is optional.
//! Credentials may be supplied through `METAFORCE_USERNAME`,
//! `METAFORCE_PASSWORD`, and `METAFORCE_SECURITY_TOKEN`, which override the
//! file.
//!
//! ```toml
//! [salesforce]
//! login_url = "https://login.salesforce.com"
//! api_version = "62.0"
//! username = "user@example.com"
//!
//! [polling]
//! interval_ms = 2000
//! timeout_ms = 600000
//!
//! [execution]
//! delete = "async"
//!
//! [logging]
//! filter = "info,soap=debug"
//! format = "json"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use metadata::ExecutionPolicy;
use serde::Deserialize;

/// Config file used when no path is given and it exists.
pub const DEFAULT_CONFIG_FILE: &str = "metaforce.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CliConfig {
    pub salesforce: SalesforceConfig,
    pub polling: PollingConfig,
    pub execution: ExecutionPolicy,
    pub logging: LoggingConfig,
}

#[derive(Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SalesforceConfig {
    pub login_url: String,
    pub api_version: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub security_token: Option<String>,
    /// Pre-established session; skips login when set with `metadata_url`.
    pub session_id: Option<String>,
    pub metadata_url: Option<String>,
    pub request_timeout_secs: u64,
}

impl Default for SalesforceConfig {
    fn default() -> Self {
        Self {
            login_url: "https://login.salesforce.com".to_string(),
            api_version: "62.0".to_string(),
            username: None,
            password: None,
            security_token: None,
            session_id: None,
            metadata_url: None,
            request_timeout_secs: 120,
        }
    }
}

impl SalesforceConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl std::fmt::Debug for SalesforceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redacted = |v: &Option<String>| v.as_ref().map(|_| "<redacted>");
        f.debug_struct("SalesforceConfig")
            .field("login_url", &self.login_url)
            .field("api_version", &self.api_version)
            .field("username", &self.username)
            .field("password", &redacted(&self.password))
            .field("security_token", &redacted(&self.security_token))
            .field("session_id", &redacted(&self.session_id))
            .field("metadata_url", &self.metadata_url)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

/// Interval and overall deadline for async job polling.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PollingConfig {
    pub interval_ms: u64,
    pub timeout_ms: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: 2_000,
            timeout_ms: 600_000,
        }
    }
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,
    pub format: LogFormat,
    /// OTLP gRPC endpoint; spans are exported only when set.
    pub otlp_endpoint: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "warn,metadata=info,soap=info,cli=info".to_string(),
            format: LogFormat::default(),
            otlp_endpoint: None,
        }
    }
}

impl CliConfig {
    /// Loads configuration from `path`, or from [`DEFAULT_CONFIG_FILE`] if it
    /// exists, then applies environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_FILE);
                if default.exists() {
                    Self::from_file(&default)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("parsing config file {}", path.display()))
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let sf = &mut self.salesforce;
        for (key, slot) in [
            ("METAFORCE_USERNAME", &mut sf.username),
            ("METAFORCE_PASSWORD", &mut sf.password),
            ("METAFORCE_SECURITY_TOKEN", &mut sf.security_token),
        ] {
            if let Some(value) = lookup(key).filter(|v| !v.is_empty()) {
                *slot = Some(value);
            }
        }
    }

    fn validate(&self) -> Result<()> {
        if self.polling.interval_ms == 0 {
            bail!("polling.interval_ms must be greater than zero");
        }
        if self.salesforce.session_id.is_some() != self.salesforce.metadata_url.is_some() {
            bail!("salesforce.session_id and salesforce.metadata_url must be set together");
        }
        Ok(())
    }
}
