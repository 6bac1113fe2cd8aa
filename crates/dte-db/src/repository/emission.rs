//! # Emission Repository
//!
//! Identifier reservation and the ledger of every document that was ever
//! numbered.
//!
//! ## Emission Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Emission Lifecycle                                │
//! │                                                                         │
//! │  1. RESERVE (one transaction)                                          │
//! │     ├── issuer_config.control_sequence += 1                            │
//! │     ├── numero_control   = DTE-01-{estab}{pv}-{seq:015}                │
//! │     ├── codigo_generacion = UUID v4, uppercase                         │
//! │     ├── issuer_config.ult_* ← both identifiers                         │
//! │     └── INSERT emissions { status: reserved }                          │
//! │                                                                         │
//! │  2. ATTACH DOCUMENT                                                    │
//! │     └── document_json, envelope_id                                     │
//! │                                                                         │
//! │  3. RECORD OUTCOME (once)                                              │
//! │     └── reserved → accepted | rejected | failed | unknown              │
//! │         unknown  → accepted | rejected | failed  (after reconciling)   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A reserved number is never handed out again, even when the emission fails.
//! The ledger row is the record that it was consumed.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::issuer::{IssuerRecord, ISSUER_COLUMNS};
use dte_core::types::format_control_number;
use dte_core::{EmissionStatus, IssuerConfig};

// =============================================================================
// Record Types
// =============================================================================

/// One row of the emission ledger.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct EmissionRecord {
    pub id: String,
    pub numero_control: String,
    pub codigo_generacion: String,
    pub client_id: Option<i64>,
    pub status: EmissionStatus,
    pub envelope_id: Option<String>,
    pub document_json: Option<String>,
    pub authority_status: Option<i64>,
    pub authority_response: Option<String>,
    pub detail: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Identifiers handed out by [`EmissionRepository::reserve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reservation {
    /// Ledger row id.
    pub emission_id: String,
    /// Issuer snapshot whose `ult_*` fields are the reserved identifiers.
    pub issuer: IssuerConfig,
}

impl Reservation {
    pub fn numero_control(&self) -> &str {
        &self.issuer.ult_num_control
    }

    pub fn codigo_generacion(&self) -> &str {
        &self.issuer.ult_cod_generacion
    }
}

/// Fields written together with a new status.
///
/// `None` leaves the stored value untouched.
///
/// ## Example
/// ```rust,ignore
/// let update = OutcomeUpdate::new(EmissionStatus::Rejected)
///     .authority(400, body)
///     .detail("authority rejected the document");
/// db.emissions().record_outcome(&id, &update).await?;
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutcomeUpdate {
    pub status: EmissionStatus,
    pub authority_status: Option<u16>,
    pub authority_response: Option<String>,
    pub detail: Option<String>,
}

impl OutcomeUpdate {
    pub fn new(status: EmissionStatus) -> Self {
        OutcomeUpdate {
            status,
            authority_status: None,
            authority_response: None,
            detail: None,
        }
    }

    pub fn authority(mut self, status: u16, body: impl Into<String>) -> Self {
        self.authority_status = Some(status);
        self.authority_response = Some(body.into());
        self
    }

    pub fn detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

const EMISSION_COLUMNS: &str = r#"
    id, numero_control, codigo_generacion, client_id, status, envelope_id,
    document_json, authority_status, authority_response, detail,
    created_at, updated_at
"#;

fn status_name(status: EmissionStatus) -> String {
    serde_json::to_value(status)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_else(|| format!("{:?}", status))
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for the emission ledger.
#[derive(Debug, Clone)]
pub struct EmissionRepository {
    pool: SqlitePool,
}

impl EmissionRepository {
    /// Creates a new EmissionRepository.
    pub fn new(pool: SqlitePool) -> Self {
        EmissionRepository { pool }
    }

    /// Reserves the next control number and a fresh generation code.
    ///
    /// The sequence increment, the issuer write-back and the ledger insert
    /// commit together. Two concurrent callers always receive different
    /// identifiers.
    pub async fn reserve(&self, client_id: Option<i64>) -> DbResult<Reservation> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        let sql = format!(
            r#"
            UPDATE issuer_config
            SET control_sequence = control_sequence + 1, updated_at = ?1
            WHERE id = 1
            RETURNING {}
            "#,
            ISSUER_COLUMNS
        );
        let record: IssuerRecord = sqlx::query_as(&sql)
            .bind(now)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| DbError::not_found("IssuerConfig", "1"))?;

        let sequence = u64::try_from(record.control_sequence).map_err(|_| DbError::Corrupt {
            entity: "IssuerConfig".to_string(),
            reason: format!("negative control sequence {}", record.control_sequence),
        })?;
        let numero_control = format_control_number(
            &record.tipo_dte,
            &record.cod_establecimiento,
            &record.cod_punto_venta,
            sequence,
        );
        let codigo_generacion = Uuid::new_v4().to_string().to_uppercase();

        sqlx::query(
            "UPDATE issuer_config SET ult_num_control = ?1, ult_cod_generacion = ?2 WHERE id = 1",
        )
        .bind(&numero_control)
        .bind(&codigo_generacion)
        .execute(&mut *tx)
        .await?;

        let emission_id = Uuid::new_v4().to_string();
        sqlx::query(
            r#"
            INSERT INTO emissions (
                id, numero_control, codigo_generacion, client_id, status,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
            "#,
        )
        .bind(&emission_id)
        .bind(&numero_control)
        .bind(&codigo_generacion)
        .bind(client_id)
        .bind(EmissionStatus::Reserved)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(
            emission_id = %emission_id,
            numero_control = %numero_control,
            codigo_generacion = %codigo_generacion,
            "Identifiers reserved"
        );

        let mut issuer = IssuerConfig::from(record);
        issuer.ult_num_control = numero_control;
        issuer.ult_cod_generacion = codigo_generacion;

        Ok(Reservation {
            emission_id,
            issuer,
        })
    }

    /// Stores the composed document and the envelope id on a reserved row.
    pub async fn attach_document(
        &self,
        id: &str,
        document_json: &str,
        envelope_id: &str,
    ) -> DbResult<()> {
        debug!(emission_id = %id, envelope_id = %envelope_id, "Attaching document");

        let result = sqlx::query(
            r#"
            UPDATE emissions
            SET document_json = ?1, envelope_id = ?2, updated_at = ?3
            WHERE id = ?4
            "#,
        )
        .bind(document_json)
        .bind(envelope_id)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Emission", id));
        }
        Ok(())
    }

    /// Moves an emission to its outcome.
    ///
    /// Allowed from `reserved` (first outcome) and from `unknown`
    /// (reconciliation). Anything else is an `InvalidTransition`.
    pub async fn record_outcome(&self, id: &str, update: &OutcomeUpdate) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE emissions
            SET status = ?1,
                authority_status = COALESCE(?2, authority_status),
                authority_response = COALESCE(?3, authority_response),
                detail = COALESCE(?4, detail),
                updated_at = ?5
            WHERE id = ?6 AND status IN ('reserved', 'unknown')
            "#,
        )
        .bind(update.status)
        .bind(update.authority_status.map(i64::from))
        .bind(&update.authority_response)
        .bind(&update.detail)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return match self.get(id).await? {
                None => Err(DbError::not_found("Emission", id)),
                Some(current) => Err(DbError::InvalidTransition {
                    id: id.to_string(),
                    from: status_name(current.status),
                    to: status_name(update.status),
                }),
            };
        }

        info!(emission_id = %id, status = %status_name(update.status), "Emission outcome recorded");
        Ok(())
    }

    /// Gets an emission by ID.
    pub async fn get(&self, id: &str) -> DbResult<Option<EmissionRecord>> {
        let sql = format!("SELECT {} FROM emissions WHERE id = ?1", EMISSION_COLUMNS);
        let record = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(record)
    }

    /// Emissions in a given state, oldest first.
    ///
    /// `Unknown` rows are the ones to reconcile with the authority.
    pub async fn list_by_status(&self, status: EmissionStatus) -> DbResult<Vec<EmissionRecord>> {
        let sql = format!(
            "SELECT {} FROM emissions WHERE status = ?1 ORDER BY created_at, id",
            EMISSION_COLUMNS
        );
        let records = sqlx::query_as(&sql)
            .bind(status)
            .fetch_all(&self.pool)
            .await?;
        Ok(records)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::issuer::tests::sample_issuer;
    use crate::{Database, DbConfig};
    use std::collections::HashSet;

    async fn seeded() -> Database {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.issuer().upsert(&sample_issuer()).await.unwrap();
        db
    }

    #[tokio::test]
    async fn test_reserve_without_issuer() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        assert!(db.emissions().reserve(None).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_reserve_increments_and_writes_back() {
        let db = seeded().await;

        let first = db.emissions().reserve(None).await.unwrap();
        assert_eq!(first.numero_control(), "DTE-01-M001P001-000000000000001");
        assert_eq!(first.codigo_generacion().len(), 36);
        assert_eq!(first.codigo_generacion(), first.codigo_generacion().to_uppercase());

        let second = db.emissions().reserve(None).await.unwrap();
        assert_eq!(second.numero_control(), "DTE-01-M001P001-000000000000002");
        assert_ne!(first.codigo_generacion(), second.codigo_generacion());

        let stored = db.issuer().require().await.unwrap();
        assert_eq!(stored.ult_num_control, second.numero_control());
        assert_eq!(stored.ult_cod_generacion, second.codigo_generacion());

        let row = db.emissions().get(&second.emission_id).await.unwrap().unwrap();
        assert_eq!(row.status, EmissionStatus::Reserved);
        assert_eq!(row.numero_control, second.numero_control());
    }

    #[tokio::test]
    async fn test_reserve_continues_existing_sequence() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut issuer = sample_issuer();
        issuer.ult_num_control = "DTE-01-M001P001-000000000000041".to_string();
        db.issuer().upsert(&issuer).await.unwrap();

        let r = db.emissions().reserve(None).await.unwrap();
        assert_eq!(r.numero_control(), "DTE-01-M001P001-000000000000042");
    }

    #[tokio::test]
    async fn test_concurrent_reservations_are_unique() {
        let db = seeded().await;

        let mut handles = Vec::new();
        for _ in 0..20 {
            let repo = db.emissions();
            handles.push(tokio::spawn(async move { repo.reserve(None).await }));
        }

        let mut numbers = HashSet::new();
        let mut codes = HashSet::new();
        for handle in handles {
            let r = handle.await.unwrap().unwrap();
            numbers.insert(r.numero_control().to_string());
            codes.insert(r.codigo_generacion().to_string());
        }
        assert_eq!(numbers.len(), 20);
        assert_eq!(codes.len(), 20);
    }

    #[tokio::test]
    async fn test_outcome_transitions() {
        let db = seeded().await;
        let r = db.emissions().reserve(None).await.unwrap();
        let repo = db.emissions();

        repo.attach_document(&r.emission_id, "{\"version\":3}", "ENV-1")
            .await
            .unwrap();
        repo.record_outcome(
            &r.emission_id,
            &OutcomeUpdate::new(EmissionStatus::Unknown).detail("connection reset"),
        )
        .await
        .unwrap();

        let pending = repo.list_by_status(EmissionStatus::Unknown).await.unwrap();
        assert_eq!(pending.len(), 1);

        repo.record_outcome(
            &r.emission_id,
            &OutcomeUpdate::new(EmissionStatus::Accepted).authority(200, "{\"estado\":\"PROCESADO\"}"),
        )
        .await
        .unwrap();

        let row = repo.get(&r.emission_id).await.unwrap().unwrap();
        assert_eq!(row.status, EmissionStatus::Accepted);
        assert_eq!(row.authority_status, Some(200));
        assert_eq!(row.detail.as_deref(), Some("connection reset"));
        assert_eq!(row.envelope_id.as_deref(), Some("ENV-1"));
        assert_eq!(row.document_json.as_deref(), Some("{\"version\":3}"));

        let again = repo
            .record_outcome(&r.emission_id, &OutcomeUpdate::new(EmissionStatus::Failed))
            .await;
        assert!(matches!(again, Err(DbError::InvalidTransition { from, .. }) if from == "accepted"));
    }

    #[tokio::test]
    async fn test_outcome_for_unknown_id() {
        let db = seeded().await;
        let err = db
            .emissions()
            .record_outcome("missing", &OutcomeUpdate::new(EmissionStatus::Failed))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
