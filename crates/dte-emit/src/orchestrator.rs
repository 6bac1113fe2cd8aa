//! # Submission Orchestrator
//!
//! Runs one sale through the full emission pipeline.
//!
//! ## Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Validate ─► LoadReferences ─► Authenticate ─► Reserve                  │
//! │                                                   │                     │
//! │     ┌─────────────────────────────────────────────┘                     │
//! │     ▼                                                                   │
//! │  Compose ─► Serialize ─► Sign ─► Encode ─► BuildEnvelope ─► Submit      │
//! │                                                              │          │
//! │  ◄────────── races the CancellationToken ──────────────►     │          │
//! │                                                              ▼          │
//! │  failure or cancel after Reserve ─► ledger: failed     spawned task:    │
//! │                                                        accepted /       │
//! │                                                        rejected /       │
//! │                                                        unknown          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Steps run strictly in sequence for one request; separate requests run
//! concurrently. Once the envelope is dispatched the submission task owns
//! it, so cancelling or dropping the caller cannot abort it halfway.

use std::future::Future;
use std::sync::Arc;

use chrono::Local;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use dte_core::validation::{validate_client, validate_issuer, validate_sale_request};
use dte_core::{Client, DocumentComposer, DteDocument, EmissionStatus, SaleRequest};
use dte_db::{OutcomeUpdate, Reservation};

use crate::auth::TokenCache;
use crate::clock::Clock;
use crate::config::EmitterConfig;
use crate::error::{EmitError, EmitResult};
use crate::reception::{ReceptionClient, SubmissionEnvelope, SubmissionResult};
use crate::signer::SigningClient;
use crate::store::EmissionStore;

/// What a successful emission returns.
#[derive(Debug, Clone, Serialize)]
pub struct EmissionOutcome {
    pub emission_id: String,
    pub envelope_id: String,
    pub numero_control: String,
    pub codigo_generacion: String,
    /// Body of the authority's 2xx answer.
    pub authority_response: serde_json::Value,
    pub document: DteDocument,
}

/// Document and envelope ready for dispatch.
struct Prepared {
    document: DteDocument,
    envelope: SubmissionEnvelope,
}

/// Drives sales through composition, signing and submission.
///
/// ## Example
/// ```rust,ignore
/// let store: Arc<dyn EmissionStore> = Arc::new(db);
/// let orchestrator = SubmissionOrchestrator::from_config(&config, store, Arc::new(SystemClock))?;
/// let outcome = orchestrator.emit(&sale, &CancellationToken::new()).await?;
/// println!("{}", outcome.numero_control);
/// ```
pub struct SubmissionOrchestrator {
    store: Arc<dyn EmissionStore>,
    tokens: Arc<TokenCache>,
    signer: SigningClient,
    reception: ReceptionClient,
    composer: DocumentComposer,
    clock: Arc<dyn Clock>,
}

impl SubmissionOrchestrator {
    pub fn new(
        store: Arc<dyn EmissionStore>,
        tokens: Arc<TokenCache>,
        signer: SigningClient,
        reception: ReceptionClient,
        composer: DocumentComposer,
        clock: Arc<dyn Clock>,
    ) -> Self {
        SubmissionOrchestrator {
            store,
            tokens,
            signer,
            reception,
            composer,
            clock,
        }
    }

    /// Builds every collaborator from the loaded configuration.
    pub fn from_config(
        config: &EmitterConfig,
        store: Arc<dyn EmissionStore>,
        clock: Arc<dyn Clock>,
    ) -> EmitResult<Self> {
        let tokens = TokenCache::new(&config.authority, config.token, clock.clone())?;
        let signer = SigningClient::new(&config.signer)?;
        let reception = ReceptionClient::new(&config.authority)?;
        let composer = DocumentComposer::new(config.authority.ambiente, config.tax);

        Ok(Self::new(
            store,
            Arc::new(tokens),
            signer,
            reception,
            composer,
            clock,
        ))
    }

    /// Shared token cache, for reuse by other callers in the process.
    pub fn tokens(&self) -> &Arc<TokenCache> {
        &self.tokens
    }

    /// Emits one sale.
    ///
    /// ## Errors
    /// - `Validation` / `NotFound` before anything is reserved
    /// - `Config` when the stored issuer record is incomplete
    /// - `Auth` before anything is reserved
    /// - `Compose` / `Signing` / `Cancelled` after reservation; the emission
    ///   is recorded as `failed`
    /// - `Submission` with the authority's status and body when it rejects,
    ///   or without a status when it could not be reached
    pub async fn emit(
        &self,
        request: &SaleRequest,
        cancel: &CancellationToken,
    ) -> EmitResult<EmissionOutcome> {
        let cliente_id = validate_sale_request(request)?;

        let issuer = guarded(cancel, self.store.issuer_config()).await?;
        validate_issuer(&issuer)
            .map_err(|e| EmitError::Config(format!("stored issuer record is invalid: {}", e)))?;
        let client = guarded(cancel, self.store.client(cliente_id)).await?;
        validate_client(&client)?;

        let token = guarded(cancel, self.tokens.get_token()).await?;

        // Not raced: a reservation dropped mid-commit would leave an orphan row.
        if cancel.is_cancelled() {
            return Err(EmitError::Cancelled);
        }
        let reservation = self.store.reserve_identifiers(cliente_id).await?;
        info!(
            emission_id = %reservation.emission_id,
            numero_control = %reservation.numero_control(),
            "Identifiers reserved"
        );

        let prepared = match self.prepare(&reservation, &client, request, cancel).await {
            Ok(prepared) => prepared,
            Err(err) => {
                self.mark_failed(&reservation.emission_id, &err).await;
                return Err(err);
            }
        };

        let envelope_id = prepared.envelope.id_envio.clone();
        let authority = self
            .dispatch(reservation.emission_id.clone(), prepared.envelope, token)
            .await?;

        Ok(EmissionOutcome {
            emission_id: reservation.emission_id.clone(),
            envelope_id,
            numero_control: reservation.numero_control().to_string(),
            codigo_generacion: reservation.codigo_generacion().to_string(),
            authority_response: authority,
            document: prepared.document,
        })
    }

    /// Compose → Serialize → Sign → Encode → BuildEnvelope, then persist the
    /// document alongside the reservation.
    async fn prepare(
        &self,
        reservation: &Reservation,
        client: &Client,
        request: &SaleRequest,
        cancel: &CancellationToken,
    ) -> EmitResult<Prepared> {
        let emitted_at = self.clock.now().with_timezone(&Local).naive_local();
        let document = self
            .composer
            .compose(&reservation.issuer, client, &request.detalles, emitted_at)?;
        let serialized = document.to_canonical_string()?;

        let signature = guarded(cancel, self.signer.sign(&serialized)).await?;
        let envelope = SubmissionEnvelope::build(&document, &serialized, signature);

        guarded(
            cancel,
            self.store
                .attach_document(&reservation.emission_id, &serialized, &envelope.id_envio),
        )
        .await?;

        // Last point at which the caller can still back out.
        if cancel.is_cancelled() {
            return Err(EmitError::Cancelled);
        }

        Ok(Prepared { document, envelope })
    }

    /// Submits in a detached task that records the outcome itself.
    async fn dispatch(
        &self,
        emission_id: String,
        envelope: SubmissionEnvelope,
        token: String,
    ) -> EmitResult<serde_json::Value> {
        let store = self.store.clone();
        let tokens = self.tokens.clone();
        let reception = self.reception.clone();

        let task = tokio::spawn(async move {
            let result = reception.submit(&envelope, &token).await;

            let update = match &result {
                SubmissionResult::Accepted(answer) => OutcomeUpdate::new(EmissionStatus::Accepted)
                    .authority(answer.status, answer.body.to_string()),
                SubmissionResult::Rejected(answer) => {
                    if answer.status == 401 {
                        tokens.invalidate().await;
                    }
                    OutcomeUpdate::new(EmissionStatus::Rejected)
                        .authority(answer.status, answer.body.to_string())
                }
                SubmissionResult::Unreachable(detail) => {
                    OutcomeUpdate::new(EmissionStatus::Unknown).detail(detail.clone())
                }
            };

            if let Err(e) = store.record_outcome(&emission_id, update).await {
                error!(
                    emission_id = %emission_id,
                    error = %e,
                    "Submission finished but its outcome could not be recorded"
                );
            }

            result
        });

        let result = task
            .await
            .map_err(|e| EmitError::unreachable(format!("submission task aborted: {}", e)))?;

        result.into_result().map(|answer| answer.body)
    }

    async fn mark_failed(&self, emission_id: &str, cause: &EmitError) {
        warn!(emission_id = %emission_id, error = %cause, "Emission failed before dispatch");

        let update = OutcomeUpdate::new(EmissionStatus::Failed).detail(cause.to_string());
        if let Err(e) = self.store.record_outcome(emission_id, update).await {
            error!(emission_id = %emission_id, error = %e, "Could not mark emission as failed");
        }
    }
}

/// Runs `step` unless `cancel` fires first.
async fn guarded<T, F>(cancel: &CancellationToken, step: F) -> EmitResult<T>
where
    F: Future<Output = EmitResult<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(EmitError::Cancelled),
        result = step => result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_guarded_prefers_cancellation() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = guarded(&cancel, async { Ok::<_, EmitError>(1) }).await;
        assert!(matches!(result, Err(EmitError::Cancelled)));
    }

    #[tokio::test]
    async fn test_guarded_passes_result_through() {
        let cancel = CancellationToken::new();

        assert_eq!(guarded(&cancel, async { Ok::<_, EmitError>(7) }).await.unwrap(), 7);

        let err = guarded(&cancel, async {
            Err::<(), _>(EmitError::Signing("down".to_string()))
        })
        .await
        .unwrap_err();
        assert!(matches!(err, EmitError::Signing(_)));
    }
}
