//! # Emission Store
//!
//! The orchestrator's view of persistence. [`dte_db::Database`] is the
//! production implementation; tests may supply their own.

use async_trait::async_trait;

use dte_core::{Client, IssuerConfig};
use dte_db::{Database, OutcomeUpdate, Reservation};

use crate::error::{EmitError, EmitResult};

/// Reference data and the emission ledger.
#[async_trait]
pub trait EmissionStore: Send + Sync {
    /// The issuer's fiscal identity. `NotFound` when never configured.
    async fn issuer_config(&self) -> EmitResult<IssuerConfig>;

    /// A client by id. `NotFound` when absent.
    async fn client(&self, id: i64) -> EmitResult<Client>;

    /// Atomically takes the next control number and generation code.
    async fn reserve_identifiers(&self, client_id: i64) -> EmitResult<Reservation>;

    /// Keeps the exact document string and the envelope id with the emission.
    async fn attach_document(
        &self,
        emission_id: &str,
        document_json: &str,
        envelope_id: &str,
    ) -> EmitResult<()>;

    /// Records how the emission ended.
    async fn record_outcome(&self, emission_id: &str, outcome: OutcomeUpdate) -> EmitResult<()>;
}

#[async_trait]
impl EmissionStore for Database {
    async fn issuer_config(&self) -> EmitResult<IssuerConfig> {
        Ok(self.issuer().require().await?)
    }

    async fn client(&self, id: i64) -> EmitResult<Client> {
        self.clients()
            .get_by_id(id)
            .await?
            .ok_or_else(|| EmitError::not_found("Client", id.to_string()))
    }

    async fn reserve_identifiers(&self, client_id: i64) -> EmitResult<Reservation> {
        Ok(self.emissions().reserve(Some(client_id)).await?)
    }

    async fn attach_document(
        &self,
        emission_id: &str,
        document_json: &str,
        envelope_id: &str,
    ) -> EmitResult<()> {
        Ok(self
            .emissions()
            .attach_document(emission_id, document_json, envelope_id)
            .await?)
    }

    async fn record_outcome(&self, emission_id: &str, outcome: OutcomeUpdate) -> EmitResult<()> {
        Ok(self.emissions().record_outcome(emission_id, &outcome).await?)
    }
}
