//! # Emitter Configuration
//!
//! Endpoints, credentials, tax policy and cache tuning.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     MH_AUTH_USER / MH_AUTH_PWD / MH_AUTH_URL                           │
//! │     MH_RECEPCION_URL / LOCAL_FIRMADOR_URL / MH_CERT_PASSWORD           │
//! │     DTE_AMBIENTE / DTE_DATABASE_PATH                                   │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/dteemisor/dte.toml (Linux)                               │
//! │     ~/Library/Application Support/sv.dte.emisor/dte.toml (macOS)       │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     test-environment reception URL, local signer on :8113             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # dte.toml
//! [authority]
//! auth_url = "https://apitest.dtes.mh.gob.sv/seguridad/auth"
//! reception_url = "https://apitest.dtes.mh.gob.sv/fesv/recepciondte"
//! user = "06142803901121"
//! ambiente = "00"
//!
//! [signer]
//! url = "http://localhost:8113/firmardocumento"
//!
//! [tax]
//! iva_rate = 0.13
//!
//! [token]
//! refresh_margin_secs = 60
//! ```
//!
//! Credentials are optional at load time. A missing credential fails the
//! operation that needs it, never the whole process.

use std::path::PathBuf;
use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use dte_core::{Ambiente, TaxPolicy};

use crate::error::{EmitError, EmitResult};

pub const DEFAULT_RECEPTION_URL: &str = "https://apitest.dtes.mh.gob.sv/fesv/recepciondte";
pub const DEFAULT_SIGNER_URL: &str = "http://localhost:8113/firmardocumento";

const CONFIG_FILE_NAME: &str = "dte.toml";

/// Upper bound for configured token durations (ten years).
const MAX_TOKEN_SECS: i64 = 10 * 365 * 86_400;
const DATABASE_FILE_NAME: &str = "dte.db";

// =============================================================================
// Secret
// =============================================================================

/// A credential. `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Secret(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Secret(***)")
    }
}

// =============================================================================
// Sections
// =============================================================================

/// Tax authority endpoints and credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorityConfig {
    /// Authentication endpoint (form-encoded `user` / `pwd`).
    #[serde(default)]
    pub auth_url: Option<String>,

    #[serde(default)]
    pub user: Option<String>,

    #[serde(default)]
    pub password: Option<Secret>,

    /// Reception endpoint for signed documents.
    #[serde(default = "default_reception_url")]
    pub reception_url: String,

    /// Target environment: "00" pruebas, "01" produccion.
    #[serde(default)]
    pub ambiente: Ambiente,

    #[serde(default = "default_auth_timeout")]
    pub auth_timeout_secs: u64,

    #[serde(default = "default_reception_timeout")]
    pub reception_timeout_secs: u64,
}

fn default_reception_url() -> String {
    DEFAULT_RECEPTION_URL.to_string()
}

fn default_auth_timeout() -> u64 {
    15
}

fn default_reception_timeout() -> u64 {
    30
}

impl Default for AuthorityConfig {
    fn default() -> Self {
        AuthorityConfig {
            auth_url: None,
            user: None,
            password: None,
            reception_url: default_reception_url(),
            ambiente: Ambiente::default(),
            auth_timeout_secs: default_auth_timeout(),
            reception_timeout_secs: default_reception_timeout(),
        }
    }
}

impl AuthorityConfig {
    pub fn auth_timeout(&self) -> Duration {
        Duration::from_secs(self.auth_timeout_secs)
    }

    pub fn reception_timeout(&self) -> Duration {
        Duration::from_secs(self.reception_timeout_secs)
    }
}

/// Local signing service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignerConfig {
    #[serde(default = "default_signer_url")]
    pub url: String,

    /// Certificate password forwarded to the signer.
    #[serde(default)]
    pub password: Option<Secret>,

    #[serde(default = "default_signer_timeout")]
    pub timeout_secs: u64,
}

fn default_signer_url() -> String {
    DEFAULT_SIGNER_URL.to_string()
}

fn default_signer_timeout() -> u64 {
    15
}

impl Default for SignerConfig {
    fn default() -> Self {
        SignerConfig {
            url: default_signer_url(),
            password: None,
            timeout_secs: default_signer_timeout(),
        }
    }
}

impl SignerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Token cache tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSettings {
    /// A cached token is reused only while more than this many seconds remain.
    #[serde(default = "default_refresh_margin")]
    pub refresh_margin_secs: i64,

    /// Lifetime assumed when the authority's response carries no usable expiry.
    #[serde(default = "default_lifetime")]
    pub default_lifetime_secs: i64,
}

fn default_refresh_margin() -> i64 {
    60
}

fn default_lifetime() -> i64 {
    86_400
}

impl Default for TokenSettings {
    fn default() -> Self {
        TokenSettings {
            refresh_margin_secs: default_refresh_margin(),
            default_lifetime_secs: default_lifetime(),
        }
    }
}

/// SQLite location.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl DatabaseSettings {
    /// Configured path, else the platform data dir, else the working dir.
    pub fn resolved_path(&self) -> PathBuf {
        if let Some(path) = &self.path {
            return path.clone();
        }
        directories::ProjectDirs::from("sv", "dte", "emisor")
            .map(|dirs| dirs.data_dir().join(DATABASE_FILE_NAME))
            .unwrap_or_else(|| PathBuf::from(DATABASE_FILE_NAME))
    }
}

// =============================================================================
// Root
// =============================================================================

/// Complete emitter configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmitterConfig {
    #[serde(default)]
    pub authority: AuthorityConfig,

    #[serde(default)]
    pub signer: SignerConfig,

    #[serde(default)]
    pub tax: TaxPolicy,

    #[serde(default)]
    pub token: TokenSettings,

    #[serde(default)]
    pub database: DatabaseSettings,
}

impl EmitterConfig {
    /// Loads configuration: file (if present), then environment, then validation.
    pub fn load(config_path: Option<PathBuf>) -> EmitResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading emitter config from file");
                let contents = std::fs::read_to_string(&path).map_err(|e| {
                    EmitError::Config(format!("cannot read {}: {}", path.display(), e))
                })?;
                config = Self::from_toml(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Parses a TOML document. Missing sections take their defaults.
    pub fn from_toml(contents: &str) -> EmitResult<Self> {
        toml::from_str(contents).map_err(|e| EmitError::Config(format!("invalid TOML: {}", e)))
    }

    /// Validates the configuration.
    pub fn validate(&self) -> EmitResult<()> {
        if let Some(url) = &self.authority.auth_url {
            check_url("authority.auth_url", url)?;
        }
        check_url("authority.reception_url", &self.authority.reception_url)?;
        check_url("signer.url", &self.signer.url)?;

        if self.authority.auth_timeout_secs == 0
            || self.authority.reception_timeout_secs == 0
            || self.signer.timeout_secs == 0
        {
            return Err(EmitError::Config("timeouts must be greater than 0".into()));
        }

        if self.tax.iva_rate < Decimal::ZERO || self.tax.iva_rate >= Decimal::ONE {
            return Err(EmitError::Config(format!(
                "tax.iva_rate must be in [0, 1), got {}",
                self.tax.iva_rate
            )));
        }
        if self.tax.amount_scale > 10 || self.tax.unit_price_scale > 10 {
            return Err(EmitError::Config("rounding scales must be at most 10".into()));
        }

        if self.token.refresh_margin_secs < 0
            || self.token.default_lifetime_secs <= self.token.refresh_margin_secs
        {
            return Err(EmitError::Config(
                "token.default_lifetime_secs must exceed a non-negative refresh margin".into(),
            ));
        }
        if self.token.default_lifetime_secs > MAX_TOKEN_SECS {
            return Err(EmitError::Config(format!(
                "token.default_lifetime_secs must be at most {}",
                MAX_TOKEN_SECS
            )));
        }

        Ok(())
    }

    /// Applies overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies overrides from any key lookup. Empty values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(user) = get("MH_AUTH_USER") {
            self.authority.user = Some(user);
        }
        if let Some(pwd) = get("MH_AUTH_PWD") {
            self.authority.password = Some(Secret::new(pwd));
        }
        if let Some(url) = get("MH_AUTH_URL") {
            debug!(url = %url, "Overriding auth URL from environment");
            self.authority.auth_url = Some(url);
        }
        if let Some(url) = get("MH_RECEPCION_URL") {
            debug!(url = %url, "Overriding reception URL from environment");
            self.authority.reception_url = url;
        }
        if let Some(url) = get("LOCAL_FIRMADOR_URL") {
            self.signer.url = url;
        }
        if let Some(pwd) = get("MH_CERT_PASSWORD") {
            self.signer.password = Some(Secret::new(pwd));
        }
        if let Some(ambiente) = get("DTE_AMBIENTE") {
            if let Ok(parsed) = ambiente.parse() {
                debug!(ambiente = %ambiente, "Overriding ambiente from environment");
                self.authority.ambiente = parsed;
            }
        }
        if let Some(path) = get("DTE_DATABASE_PATH") {
            self.database.path = Some(PathBuf::from(path));
        }
    }

    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("sv", "dte", "emisor")
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
    }
}

fn check_url(field: &str, url: &str) -> EmitResult<()> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(EmitError::Config(format!(
            "{} must start with http:// or https://, got: {}",
            field, url
        )))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = EmitterConfig::default();
        assert_eq!(config.authority.reception_url, DEFAULT_RECEPTION_URL);
        assert_eq!(config.signer.url, DEFAULT_SIGNER_URL);
        assert_eq!(config.authority.ambiente, Ambiente::Pruebas);
        assert_eq!(config.token.refresh_margin_secs, 60);
        assert_eq!(config.token.default_lifetime_secs, 86_400);
        assert!(config.authority.user.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_toml() {
        let config = EmitterConfig::from_toml(
            r#"
            [authority]
            auth_url = "https://auth.example/seguridad/auth"
            user = "06142803901121"
            ambiente = "01"

            [tax]
            iva_rate = 0.15

            [token]
            refresh_margin_secs = 120
            "#,
        )
        .unwrap();

        assert_eq!(config.authority.ambiente, Ambiente::Produccion);
        assert_eq!(config.authority.user.as_deref(), Some("06142803901121"));
        assert_eq!(config.tax.iva_rate, dec!(0.15));
        assert_eq!(config.tax.amount_scale, 2);
        assert_eq!(config.token.refresh_margin_secs, 120);
        assert_eq!(config.token.default_lifetime_secs, 86_400);
        assert_eq!(config.signer.url, DEFAULT_SIGNER_URL);
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            ("MH_AUTH_USER", "user-1"),
            ("MH_AUTH_PWD", "s3cret"),
            ("MH_AUTH_URL", "http://127.0.0.1:9000/auth"),
            ("MH_RECEPCION_URL", "http://127.0.0.1:9000/recepcion"),
            ("MH_CERT_PASSWORD", ""),
            ("DTE_AMBIENTE", "produccion"),
            ("DTE_DATABASE_PATH", "/tmp/dte-test.db"),
        ]
        .into_iter()
        .collect();

        let mut config = EmitterConfig::default();
        config.apply_overrides(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.authority.user.as_deref(), Some("user-1"));
        assert_eq!(config.authority.password.as_ref().map(Secret::expose), Some("s3cret"));
        assert_eq!(config.authority.reception_url, "http://127.0.0.1:9000/recepcion");
        assert!(config.signer.password.is_none());
        assert_eq!(config.authority.ambiente, Ambiente::Produccion);
        assert_eq!(config.database.resolved_path(), PathBuf::from("/tmp/dte-test.db"));
    }

    #[test]
    fn test_secret_not_in_debug() {
        let mut config = EmitterConfig::default();
        config.signer.password = Some(Secret::new("hunter2"));
        assert!(!format!("{:?}", config).contains("hunter2"));
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = EmitterConfig::default();
        config.signer.url = "localhost:8113".to_string();
        assert!(matches!(config.validate(), Err(EmitError::Config(_))));

        let mut config = EmitterConfig::default();
        config.tax.iva_rate = dec!(1.3);
        assert!(config.validate().is_err());

        let mut config = EmitterConfig::default();
        config.token.default_lifetime_secs = 30;
        assert!(config.validate().is_err());

        let mut config = EmitterConfig::default();
        config.token.default_lifetime_secs = i64::MAX;
        assert!(config.validate().is_err());

        let mut config = EmitterConfig::default();
        config.authority.reception_timeout_secs = 0;
        assert!(config.validate().is_err());
    }
}
