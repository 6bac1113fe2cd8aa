//! # Issuer Repository
//!
//! The business's fiscal identity. A single row (`id = 1`).
//!
//! Identity fields are editable through [`IssuerRepository::upsert`]. The
//! control sequence and the two `ult_*` identifiers are written on first
//! insert and afterwards only by
//! [`EmissionRepository::reserve`](crate::repository::emission::EmissionRepository::reserve).

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use dte_core::types::parse_control_sequence;
use dte_core::{IssuerConfig, TIPO_DTE_FACTURA};

const ISSUER_ID: i64 = 1;

// =============================================================================
// Record Type
// =============================================================================

#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct IssuerRecord {
    pub nit: String,
    pub nrc: String,
    pub nombre: String,
    pub cod_actividad: String,
    pub desc_actividad: String,
    pub telefono: String,
    pub correo: String,
    pub departamento: String,
    pub municipio: String,
    pub direccion_complemento: String,
    pub cod_establecimiento: String,
    pub cod_punto_venta: String,
    pub tipo_dte: String,
    pub control_sequence: i64,
    pub ult_num_control: String,
    pub ult_cod_generacion: String,
}

impl From<IssuerRecord> for IssuerConfig {
    fn from(r: IssuerRecord) -> Self {
        IssuerConfig {
            nit: r.nit,
            nrc: r.nrc,
            nombre: r.nombre,
            cod_actividad: r.cod_actividad,
            desc_actividad: r.desc_actividad,
            telefono: r.telefono,
            correo: r.correo,
            departamento: r.departamento,
            municipio: r.municipio,
            direccion_complemento: r.direccion_complemento,
            cod_establecimiento: r.cod_establecimiento,
            cod_punto_venta: r.cod_punto_venta,
            ult_num_control: r.ult_num_control,
            ult_cod_generacion: r.ult_cod_generacion,
        }
    }
}

pub(crate) const ISSUER_COLUMNS: &str = r#"
    nit, nrc, nombre, cod_actividad, desc_actividad, telefono, correo,
    departamento, municipio, direccion_complemento,
    cod_establecimiento, cod_punto_venta, tipo_dte,
    control_sequence, ult_num_control, ult_cod_generacion
"#;

// =============================================================================
// Repository
// =============================================================================

/// Repository for the issuer configuration.
#[derive(Debug, Clone)]
pub struct IssuerRepository {
    pool: SqlitePool,
}

impl IssuerRepository {
    /// Creates a new IssuerRepository.
    pub fn new(pool: SqlitePool) -> Self {
        IssuerRepository { pool }
    }

    /// Loads the issuer configuration, if one was stored.
    pub async fn get(&self) -> DbResult<Option<IssuerConfig>> {
        let sql = format!("SELECT {} FROM issuer_config WHERE id = ?1", ISSUER_COLUMNS);
        let record: Option<IssuerRecord> = sqlx::query_as(&sql)
            .bind(ISSUER_ID)
            .fetch_optional(&self.pool)
            .await?;

        Ok(record.map(IssuerConfig::from))
    }

    /// Loads the issuer configuration or fails with `NotFound`.
    pub async fn require(&self) -> DbResult<IssuerConfig> {
        self.get()
            .await?
            .ok_or_else(|| DbError::not_found("IssuerConfig", ISSUER_ID.to_string()))
    }

    /// Inserts or updates the issuer's identity.
    ///
    /// On first insert the control sequence is derived from
    /// `config.ult_num_control` (empty means nothing issued yet). On update the
    /// stored sequence and `ult_*` identifiers are left as they are.
    pub async fn upsert(&self, config: &IssuerConfig) -> DbResult<()> {
        let sequence = parse_control_sequence(&config.ult_num_control).map_err(|e| {
            DbError::Corrupt {
                entity: "IssuerConfig".to_string(),
                reason: e.to_string(),
            }
        })?;
        let sequence = i64::try_from(sequence).map_err(|_| DbError::Corrupt {
            entity: "IssuerConfig".to_string(),
            reason: format!("control sequence {} out of range", sequence),
        })?;

        debug!(nit = %config.nit, sequence, "Upserting issuer configuration");

        sqlx::query(
            r#"
            INSERT INTO issuer_config (
                id, nit, nrc, nombre, cod_actividad, desc_actividad, telefono, correo,
                departamento, municipio, direccion_complemento,
                cod_establecimiento, cod_punto_venta, tipo_dte,
                control_sequence, ult_num_control, ult_cod_generacion, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8,
                ?9, ?10, ?11,
                ?12, ?13, ?14,
                ?15, ?16, ?17, ?18
            )
            ON CONFLICT (id) DO UPDATE SET
                nit = excluded.nit,
                nrc = excluded.nrc,
                nombre = excluded.nombre,
                cod_actividad = excluded.cod_actividad,
                desc_actividad = excluded.desc_actividad,
                telefono = excluded.telefono,
                correo = excluded.correo,
                departamento = excluded.departamento,
                municipio = excluded.municipio,
                direccion_complemento = excluded.direccion_complemento,
                cod_establecimiento = excluded.cod_establecimiento,
                cod_punto_venta = excluded.cod_punto_venta,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(ISSUER_ID)
        .bind(&config.nit)
        .bind(&config.nrc)
        .bind(&config.nombre)
        .bind(&config.cod_actividad)
        .bind(&config.desc_actividad)
        .bind(&config.telefono)
        .bind(&config.correo)
        .bind(&config.departamento)
        .bind(&config.municipio)
        .bind(&config.direccion_complemento)
        .bind(&config.cod_establecimiento)
        .bind(&config.cod_punto_venta)
        .bind(TIPO_DTE_FACTURA)
        .bind(sequence)
        .bind(&config.ult_num_control)
        .bind(&config.ult_cod_generacion)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        info!(nit = %config.nit, "Issuer configuration stored");
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::{Database, DbConfig};

    pub(crate) fn sample_issuer() -> IssuerConfig {
        IssuerConfig {
            nit: "06142803901121".to_string(),
            nrc: "2345678".to_string(),
            nombre: "Ferreteria La Tuerca S.A. de C.V.".to_string(),
            cod_actividad: "46632".to_string(),
            desc_actividad: "Venta al por mayor de articulos de ferreteria".to_string(),
            telefono: "22223333".to_string(),
            correo: "facturas@latuerca.sv".to_string(),
            departamento: "06".to_string(),
            municipio: "14".to_string(),
            direccion_complemento: "Calle El Progreso #12".to_string(),
            cod_establecimiento: "M001".to_string(),
            cod_punto_venta: "P001".to_string(),
            ult_num_control: String::new(),
            ult_cod_generacion: String::new(),
        }
    }

    #[tokio::test]
    async fn test_missing_issuer() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        assert!(db.issuer().get().await.unwrap().is_none());
        assert!(db.issuer().require().await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_upsert_then_get() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let issuer = sample_issuer();
        db.issuer().upsert(&issuer).await.unwrap();

        assert_eq!(db.issuer().require().await.unwrap(), issuer);
    }

    #[tokio::test]
    async fn test_update_keeps_identifiers() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut issuer = sample_issuer();
        issuer.ult_num_control = "DTE-01-M001P001-000000000000041".to_string();
        issuer.ult_cod_generacion = "AAAA".to_string();
        db.issuer().upsert(&issuer).await.unwrap();

        let mut edited = issuer.clone();
        edited.telefono = "77778888".to_string();
        edited.ult_num_control = String::new();
        edited.ult_cod_generacion = String::new();
        db.issuer().upsert(&edited).await.unwrap();

        let stored = db.issuer().require().await.unwrap();
        assert_eq!(stored.telefono, "77778888");
        assert_eq!(stored.ult_num_control, issuer.ult_num_control);
        assert_eq!(stored.ult_cod_generacion, "AAAA");
    }

    #[tokio::test]
    async fn test_rejects_unparseable_control_number() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut issuer = sample_issuer();
        issuer.ult_num_control = "DTE-01-M001P001-XYZ".to_string();
        assert!(matches!(
            db.issuer().upsert(&issuer).await,
            Err(DbError::Corrupt { .. })
        ));
    }
}
