//! # Signing Client
//!
//! Delegates the document signature to the local signing service, which
//! holds the issuer's certificate.
//!
//! ## Failure Precedence
//! ```text
//! no certificate password         → SigningError before any request
//! upstream body has "message"     → SigningError(message)
//! other HTTP error / transport    → SigningError naming the signer URL
//! 2xx without firma/SignatureValue → SigningError describing the gap
//! ```

use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::config::{Secret, SignerConfig};
use crate::error::{EmitError, EmitResult};

#[derive(Debug, Serialize)]
struct SignRequest<'a> {
    documento: &'a str,
    password: &'a str,
}

/// Signer reply. The signature arrives as `firma` or `SignatureValue`.
#[derive(Debug, Default, Deserialize)]
struct SignResponse {
    #[serde(default)]
    firma: Option<String>,
    #[serde(default, rename = "SignatureValue")]
    signature_value: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl SignResponse {
    fn signature(self) -> Option<String> {
        self.firma
            .filter(|s| !s.is_empty())
            .or(self.signature_value.filter(|s| !s.is_empty()))
    }
}

/// Client for the local signing service.
#[derive(Debug, Clone)]
pub struct SigningClient {
    http: reqwest::Client,
    url: String,
    password: Option<Secret>,
}

impl SigningClient {
    pub fn new(config: &SignerConfig) -> EmitResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| EmitError::Config(format!("cannot build HTTP client: {}", e)))?;

        Ok(SigningClient {
            http,
            url: config.url.clone(),
            password: config.password.clone(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn unreachable(&self) -> EmitError {
        EmitError::Signing(format!(
            "external signing failed, check the signing service at {}",
            self.url
        ))
    }

    /// Signs the serialized document and returns the signature.
    pub async fn sign(&self, serialized_document: &str) -> EmitResult<String> {
        let password = self
            .password
            .as_ref()
            .ok_or_else(|| EmitError::Signing("MH_CERT_PASSWORD is not configured".to_string()))?;

        debug!(url = %self.url, bytes = serialized_document.len(), "Requesting signature");

        let response = self
            .http
            .post(&self.url)
            .json(&SignRequest {
                documento: serialized_document,
                password: password.expose(),
            })
            .send()
            .await
            .map_err(|e| {
                error!(url = %self.url, error = %e, "Signing service unreachable");
                self.unreachable()
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            error!(url = %self.url, error = %e, "Signing response could not be read");
            self.unreachable()
        })?;
        let parsed: Option<SignResponse> = serde_json::from_str(&text).ok();

        if !status.is_success() {
            error!(url = %self.url, status = status.as_u16(), "Signing service returned an error");
            return Err(match parsed.and_then(|r| r.message) {
                Some(message) => EmitError::Signing(message),
                None => self.unreachable(),
            });
        }

        let reply = parsed.ok_or_else(|| {
            error!(url = %self.url, "Signing response is not JSON");
            self.unreachable()
        })?;

        let message = reply.message.clone();
        match reply.signature() {
            Some(signature) => Ok(signature),
            None => {
                error!(url = %self.url, "Signing response has no signature");
                Err(EmitError::Signing(message.unwrap_or_else(|| {
                    "signing service returned neither 'firma' nor 'SignatureValue'".to_string()
                })))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_aliases() {
        let r: SignResponse = serde_json::from_str(r#"{"firma":"abc"}"#).unwrap();
        assert_eq!(r.signature().as_deref(), Some("abc"));

        let r: SignResponse = serde_json::from_str(r#"{"SignatureValue":"xyz"}"#).unwrap();
        assert_eq!(r.signature().as_deref(), Some("xyz"));

        let r: SignResponse = serde_json::from_str(r#"{"firma":"","SignatureValue":"xyz"}"#).unwrap();
        assert_eq!(r.signature().as_deref(), Some("xyz"));

        let r: SignResponse = serde_json::from_str(r#"{"status":"OK"}"#).unwrap();
        assert_eq!(r.signature(), None);
    }

    #[tokio::test]
    async fn test_missing_password_fails_fast() {
        let client = SigningClient::new(&SignerConfig {
            // nothing listens here; the call must not get that far
            url: "http://127.0.0.1:9/firmardocumento".to_string(),
            password: None,
            timeout_secs: 1,
        })
        .unwrap();

        let err = client.sign("{}").await.unwrap_err();
        assert!(matches!(err, EmitError::Signing(m) if m.contains("MH_CERT_PASSWORD")));
    }
}
