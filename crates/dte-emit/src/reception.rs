//! # Reception Client
//!
//! Wraps a signed document in the authority's envelope and posts it.
//!
//! ## Envelope
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  {                                                                      │
//! │    "ambiente":  "00",                                                   │
//! │    "idEnvio":   "<uuid v4>",          unique per submission             │
//! │    "version":   3,                                                      │
//! │    "nit":       "<issuer NIT>",                                         │
//! │    "documento": "<base64 of the UNSIGNED serialized document>",         │
//! │    "claveDte":  "<codigoGeneracion>",                                   │
//! │    "firma":     "<signature from the signer>"                           │
//! │  }                                                                      │
//! │  Authorization: Bearer <token>                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A submission is never retried here. The authority may already have
//! registered the document when a transport error comes back.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use dte_core::{Ambiente, DteDocument};

use crate::config::AuthorityConfig;
use crate::error::{EmitError, EmitResult};

// =============================================================================
// Envelope
// =============================================================================

/// Wire payload for the reception endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionEnvelope {
    pub ambiente: Ambiente,
    pub id_envio: String,
    pub version: u8,
    pub nit: String,
    pub documento: String,
    pub clave_dte: String,
    pub firma: String,
}

impl SubmissionEnvelope {
    /// Builds the envelope for a composed document.
    ///
    /// `serialized` must be the exact string that was signed.
    pub fn build(document: &DteDocument, serialized: &str, signature: String) -> Self {
        SubmissionEnvelope {
            ambiente: document.ambiente,
            id_envio: Uuid::new_v4().to_string(),
            version: document.version,
            nit: document.emisor.nit.clone(),
            documento: encode_document(serialized),
            clave_dte: document.identificacion.codigo_generacion.clone(),
            firma: signature,
        }
    }
}

/// Standard base64 of the serialized document.
pub fn encode_document(serialized: &str) -> String {
    STANDARD.encode(serialized.as_bytes())
}

// =============================================================================
// Client
// =============================================================================

/// What the authority answered.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthorityResponse {
    pub status: u16,
    /// JSON body, or the raw text wrapped in a string when it isn't JSON.
    pub body: serde_json::Value,
}

/// Outcome of one POST to the reception endpoint.
#[derive(Debug)]
pub enum SubmissionResult {
    /// 2xx.
    Accepted(AuthorityResponse),
    /// HTTP error from the authority.
    Rejected(AuthorityResponse),
    /// The request may or may not have reached the authority.
    Unreachable(String),
}

impl SubmissionResult {
    /// Caller-facing form.
    pub fn into_result(self) -> EmitResult<AuthorityResponse> {
        match self {
            SubmissionResult::Accepted(response) => Ok(response),
            SubmissionResult::Rejected(response) => Err(EmitError::Submission {
                status: Some(response.status),
                body: Some(response.body.to_string()),
                message: format!("Authority rejected the document (HTTP {})", response.status),
            }),
            SubmissionResult::Unreachable(detail) => Err(EmitError::unreachable(detail)),
        }
    }
}

/// Client for the authority's reception endpoint.
#[derive(Debug, Clone)]
pub struct ReceptionClient {
    http: reqwest::Client,
    url: String,
}

impl ReceptionClient {
    pub fn new(config: &AuthorityConfig) -> EmitResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.reception_timeout())
            .build()
            .map_err(|e| EmitError::Config(format!("cannot build HTTP client: {}", e)))?;

        Ok(ReceptionClient {
            http,
            url: config.reception_url.clone(),
        })
    }

    /// Posts the envelope once.
    pub async fn submit(&self, envelope: &SubmissionEnvelope, token: &str) -> SubmissionResult {
        debug!(id_envio = %envelope.id_envio, clave_dte = %envelope.clave_dte, "Submitting envelope");

        let response = match self
            .http
            .post(&self.url)
            .bearer_auth(token)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(envelope)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                error!(id_envio = %envelope.id_envio, error = %e, "Reception endpoint unreachable");
                return SubmissionResult::Unreachable(e.to_string());
            }
        };

        let status = response.status().as_u16();
        let text = match response.text().await {
            Ok(text) => text,
            Err(e) => {
                error!(id_envio = %envelope.id_envio, error = %e, "Reception response lost");
                return SubmissionResult::Unreachable(e.to_string());
            }
        };
        let body = serde_json::from_str(&text).unwrap_or(serde_json::Value::String(text));
        let answer = AuthorityResponse { status, body };

        if (200..300).contains(&status) {
            info!(id_envio = %envelope.id_envio, status, "Authority accepted the document");
            SubmissionResult::Accepted(answer)
        } else {
            warn!(id_envio = %envelope.id_envio, status, body = %answer.body, "Authority rejected the document");
            SubmissionResult::Rejected(answer)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_encoding_is_standard_base64() {
        assert_eq!(encode_document("{\"a\":1}"), "eyJhIjoxfQ==");
    }

    #[test]
    fn test_envelope_field_names() {
        let envelope = SubmissionEnvelope {
            ambiente: Ambiente::Pruebas,
            id_envio: "id".into(),
            version: 3,
            nit: "0614".into(),
            documento: "e30=".into(),
            clave_dte: "CODE".into(),
            firma: "sig".into(),
        };
        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(
            value,
            json!({
                "ambiente": "00",
                "idEnvio": "id",
                "version": 3,
                "nit": "0614",
                "documento": "e30=",
                "claveDte": "CODE",
                "firma": "sig"
            })
        );
    }

    #[test]
    fn test_rejection_maps_to_submission_error() {
        let result = SubmissionResult::Rejected(AuthorityResponse {
            status: 401,
            body: json!({"descripcionMsg": "token invalido"}),
        });
        match result.into_result() {
            Err(EmitError::Submission { status, body, .. }) => {
                assert_eq!(status, Some(401));
                assert!(body.unwrap().contains("token invalido"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
