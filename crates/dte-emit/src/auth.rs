//! # Authority Token Cache
//!
//! Obtains the tax authority's bearer token and keeps it until shortly
//! before it expires.
//!
//! ## Authentication Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Token Lifecycle                                    │
//! │                                                                         │
//! │  get_token()                                                           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  read lock: cached && expires_at > now + margin ? ──yes──► return      │
//! │       │ no                                                              │
//! │       ▼                                                                 │
//! │  write lock (later callers queue here)                                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  re-check: someone refreshed while we waited? ──────yes──► return      │
//! │       │ no                                                              │
//! │       ▼                                                                 │
//! │  POST auth_url  (form: user, pwd)                                      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  { access_token, expires | expires_in }                                │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  expires_at = now + lifetime   (lifetime missing/invalid → 86400 s)    │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The write lock is held across the network call, so concurrent callers
//! that find the token stale trigger a single refresh between them.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::config::{AuthorityConfig, Secret, TokenSettings};
use crate::error::{EmitError, EmitResult};

// =============================================================================
// Cached Token
// =============================================================================

/// A token and the instant it stops being valid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedToken {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

impl CachedToken {
    /// True while more than `margin` remains before expiry.
    pub fn is_fresh(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        self.expires_at > now + margin
    }

    pub fn remaining_secs(&self, now: DateTime<Utc>) -> i64 {
        (self.expires_at - now).num_seconds().max(0)
    }
}

// =============================================================================
// Wire Format
// =============================================================================

/// Body of a successful authentication.
///
/// The expiry arrives as `expires` or `expires_in`, as a number or a numeric
/// string. Both aliases are resolved here and nowhere else.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    expires: Option<Value>,
    #[serde(default)]
    expires_in: Option<Value>,
}

impl TokenResponse {
    /// First valid lifetime, `expires` preferred.
    fn lifetime_secs(&self) -> Option<i64> {
        [&self.expires, &self.expires_in]
            .into_iter()
            .flatten()
            .find_map(parse_lifetime)
    }
}

fn parse_lifetime(value: &Value) -> Option<i64> {
    let secs = match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }?;
    (secs >= 0).then_some(secs)
}

/// `start + secs`, or `None` when the instant is not representable.
fn expiry_after(start: DateTime<Utc>, secs: i64) -> Option<DateTime<Utc>> {
    start.checked_add_signed(Duration::try_seconds(secs)?)
}

/// Everything needed to call the auth endpoint.
struct Credentials<'a> {
    url: &'a str,
    user: &'a str,
    password: &'a Secret,
}

// =============================================================================
// Token Cache
// =============================================================================

/// Process-wide holder of the authority token.
///
/// ## Example
/// ```rust,ignore
/// let cache = TokenCache::new(&config.authority, config.token, Arc::new(SystemClock))?;
/// let bearer = cache.get_token().await?;
/// ```
#[derive(Debug)]
pub struct TokenCache {
    http: reqwest::Client,
    auth_url: Option<String>,
    user: Option<String>,
    password: Option<Secret>,
    settings: TokenSettings,
    clock: Arc<dyn Clock>,
    token: RwLock<Option<CachedToken>>,
}

impl TokenCache {
    pub fn new(
        config: &AuthorityConfig,
        settings: TokenSettings,
        clock: Arc<dyn Clock>,
    ) -> EmitResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.auth_timeout())
            .build()
            .map_err(|e| EmitError::Config(format!("cannot build HTTP client: {}", e)))?;

        Ok(TokenCache {
            http,
            auth_url: config.auth_url.clone(),
            user: config.user.clone(),
            password: config.password.clone(),
            settings,
            clock,
            token: RwLock::new(None),
        })
    }

    fn margin(&self) -> Duration {
        Duration::seconds(self.settings.refresh_margin_secs)
    }

    /// Returns a token valid for at least the refresh margin.
    pub async fn get_token(&self) -> EmitResult<String> {
        {
            let guard = self.token.read().await;
            if let Some(token) = guard.as_ref() {
                let now = self.clock.now();
                if token.is_fresh(now, self.margin()) {
                    debug!(remaining_secs = token.remaining_secs(now), "Using cached token");
                    return Ok(token.access_token.clone());
                }
            }
        }

        let mut guard = self.token.write().await;

        // Double-check after acquiring write lock
        if let Some(token) = guard.as_ref() {
            if token.is_fresh(self.clock.now(), self.margin()) {
                return Ok(token.access_token.clone());
            }
        }

        info!("Authority token missing or near expiry, requesting a new one");
        let fresh = self.fetch().await?;
        let access_token = fresh.access_token.clone();
        *guard = Some(fresh);

        Ok(access_token)
    }

    /// Current token without triggering a refresh.
    pub async fn current(&self) -> Option<CachedToken> {
        self.token.read().await.clone()
    }

    /// Drops the cached token; the next call authenticates again.
    pub async fn invalidate(&self) {
        *self.token.write().await = None;
        debug!("Authority token invalidated");
    }

    fn credentials(&self) -> EmitResult<Credentials<'_>> {
        match (&self.auth_url, &self.user, &self.password) {
            (Some(url), Some(user), Some(password)) => Ok(Credentials {
                url,
                user,
                password,
            }),
            _ => Err(EmitError::auth(
                "MH_AUTH_USER, MH_AUTH_PWD or MH_AUTH_URL not configured",
            )),
        }
    }

    async fn fetch(&self) -> EmitResult<CachedToken> {
        let creds = self.credentials()?;
        let requested_at = self.clock.now();

        let response = self
            .http
            .post(creds.url)
            .form(&[("user", creds.user), ("pwd", creds.password.expose())])
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "Authority authentication request failed");
                EmitError::auth(format!("authority unreachable: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(status = status.as_u16(), body = %body, "Authority rejected authentication");
            return Err(EmitError::Auth {
                status: Some(status.as_u16()),
                message: format!("authority returned HTTP {}", status.as_u16()),
            });
        }

        let body: TokenResponse = response.json().await.map_err(|e| {
            error!(error = %e, "Authority authentication response is not JSON");
            EmitError::auth(format!("malformed authentication response: {}", e))
        })?;

        let access_token = body
            .access_token
            .clone()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| EmitError::auth("authentication response has no access_token"))?;

        let expiry = body
            .lifetime_secs()
            .and_then(|secs| Some((secs, expiry_after(requested_at, secs)?)));

        let (lifetime, expires_at) = match expiry {
            Some(found) => found,
            None => {
                let fallback = self.settings.default_lifetime_secs;
                warn!(
                    fallback_secs = fallback,
                    "Expiry field missing or invalid, using default lifetime"
                );
                let expires_at = expiry_after(requested_at, fallback).ok_or_else(|| {
                    EmitError::Config("token.default_lifetime_secs out of range".to_string())
                })?;
                (fallback, expires_at)
            }
        };

        info!(expires_in_secs = lifetime, "New authority token obtained");

        Ok(CachedToken {
            access_token,
            expires_at,
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn response(v: Value) -> TokenResponse {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn test_lifetime_aliases() {
        assert_eq!(response(json!({"expires": 3600})).lifetime_secs(), Some(3600));
        assert_eq!(response(json!({"expires_in": "7200"})).lifetime_secs(), Some(7200));
        assert_eq!(
            response(json!({"expires": 100, "expires_in": 200})).lifetime_secs(),
            Some(100)
        );
        assert_eq!(
            response(json!({"expires": "soon", "expires_in": 200})).lifetime_secs(),
            Some(200)
        );
    }

    #[test]
    fn test_lifetime_invalid_values() {
        assert_eq!(response(json!({})).lifetime_secs(), None);
        assert_eq!(response(json!({"expires": null})).lifetime_secs(), None);
        assert_eq!(response(json!({"expires": -5})).lifetime_secs(), None);
        assert_eq!(response(json!({"expires_in": "abc"})).lifetime_secs(), None);
        assert_eq!(response(json!({"expires": true})).lifetime_secs(), None);
    }

    #[test]
    fn test_unrepresentable_expiry() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(
            expiry_after(now, 3600),
            Some(Utc.with_ymd_and_hms(2024, 1, 1, 1, 0, 0).unwrap())
        );
        assert_eq!(expiry_after(now, 10_000_000_000_000), None);
        assert_eq!(expiry_after(now, i64::MAX), None);
    }

    #[test]
    fn test_freshness_margin() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let token = CachedToken {
            access_token: "t".to_string(),
            expires_at: now + Duration::seconds(61),
        };
        assert!(token.is_fresh(now, Duration::seconds(60)));
        assert!(!token.is_fresh(now + Duration::seconds(1), Duration::seconds(60)));
        assert_eq!(token.remaining_secs(now + Duration::seconds(100)), 0);
    }

    #[tokio::test]
    async fn test_missing_credentials_fail_without_network() {
        let cache = TokenCache::new(
            &AuthorityConfig::default(),
            TokenSettings::default(),
            Arc::new(crate::clock::SystemClock),
        )
        .unwrap();

        let err = cache.get_token().await.unwrap_err();
        assert!(matches!(err, EmitError::Auth { status: None, .. }));
        assert!(cache.current().await.is_none());
    }
}
