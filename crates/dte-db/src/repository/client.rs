//! # Client Repository
//!
//! Recipients of documents, including the generic "CONSUMIDOR FINAL" that
//! every anonymous sale is issued to.

use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use dte_core::{
    Client, FiscalClassification, CONSUMIDOR_FINAL_NOMBRE, CONSUMIDOR_FINAL_NUM_DOCUMENTO,
    CONSUMIDOR_FINAL_TIPO_DOCUMENTO,
};

#[derive(Debug, Clone, sqlx::FromRow)]
struct ClientRecord {
    id: i64,
    tipo_documento: String,
    num_documento: String,
    nrc: Option<String>,
    nombre: String,
    clasificacion: FiscalClassification,
    telefono: Option<String>,
    correo: Option<String>,
    departamento: Option<String>,
    municipio: Option<String>,
    direccion_complemento: Option<String>,
}

impl From<ClientRecord> for Client {
    fn from(r: ClientRecord) -> Self {
        Client {
            id: r.id,
            tipo_documento: r.tipo_documento,
            num_documento: r.num_documento,
            nrc: r.nrc,
            nombre: r.nombre,
            clasificacion: r.clasificacion,
            telefono: r.telefono,
            correo: r.correo,
            departamento: r.departamento,
            municipio: r.municipio,
            direccion_complemento: r.direccion_complemento,
        }
    }
}

const CLIENT_COLUMNS: &str = r#"
    id, tipo_documento, num_documento, nrc, nombre, clasificacion,
    telefono, correo, departamento, municipio, direccion_complemento
"#;

/// Repository for client records.
#[derive(Debug, Clone)]
pub struct ClientRepository {
    pool: SqlitePool,
}

impl ClientRepository {
    /// Creates a new ClientRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ClientRepository { pool }
    }

    /// Gets a client by ID.
    pub async fn get_by_id(&self, id: i64) -> DbResult<Option<Client>> {
        let sql = format!("SELECT {} FROM clients WHERE id = ?1", CLIENT_COLUMNS);
        let record: Option<ClientRecord> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(record.map(Client::from))
    }

    /// First client with exactly this name.
    pub async fn find_by_nombre(&self, nombre: &str) -> DbResult<Option<Client>> {
        let sql = format!(
            "SELECT {} FROM clients WHERE nombre = ?1 ORDER BY id LIMIT 1",
            CLIENT_COLUMNS
        );
        let record: Option<ClientRecord> = sqlx::query_as(&sql)
            .bind(nombre)
            .fetch_optional(&self.pool)
            .await?;

        Ok(record.map(Client::from))
    }

    /// Inserts a client. `client.id` is ignored; the stored client is returned.
    pub async fn insert(&self, client: &Client) -> DbResult<Client> {
        debug!(nombre = %client.nombre, "Inserting client");

        let result = sqlx::query(
            r#"
            INSERT INTO clients (
                tipo_documento, num_documento, nrc, nombre, clasificacion,
                telefono, correo, departamento, municipio, direccion_complemento
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&client.tipo_documento)
        .bind(&client.num_documento)
        .bind(&client.nrc)
        .bind(&client.nombre)
        .bind(client.clasificacion)
        .bind(&client.telefono)
        .bind(&client.correo)
        .bind(&client.departamento)
        .bind(&client.municipio)
        .bind(&client.direccion_complemento)
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Client", id.to_string()))
    }

    /// Makes sure the generic "CONSUMIDOR FINAL" client exists.
    ///
    /// Idempotent: a single `INSERT ... WHERE NOT EXISTS` statement, so
    /// concurrent bootstraps still leave one row.
    ///
    /// ## Returns
    /// The id of the generic client.
    pub async fn ensure_consumidor_final(&self) -> DbResult<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO clients (tipo_documento, num_documento, nombre, clasificacion)
            SELECT ?1, ?2, ?3, ?4
            WHERE NOT EXISTS (SELECT 1 FROM clients WHERE nombre = ?3)
            "#,
        )
        .bind(CONSUMIDOR_FINAL_TIPO_DOCUMENTO)
        .bind(CONSUMIDOR_FINAL_NUM_DOCUMENTO)
        .bind(CONSUMIDOR_FINAL_NOMBRE)
        .bind(FiscalClassification::ConsumidorFinal)
        .execute(&self.pool)
        .await?;

        let client = self
            .find_by_nombre(CONSUMIDOR_FINAL_NOMBRE)
            .await?
            .ok_or_else(|| DbError::not_found("Client", CONSUMIDOR_FINAL_NOMBRE))?;

        if result.rows_affected() > 0 {
            info!(id = client.id, "Generic client created");
        } else {
            debug!(id = client.id, "Generic client already present");
        }

        Ok(client.id)
    }

    /// Counts stored clients.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM clients")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};

    fn contribuyente() -> Client {
        Client {
            id: 0,
            tipo_documento: "36".to_string(),
            num_documento: "06141507901012".to_string(),
            nrc: Some("1234-5".to_string()),
            nombre: "Constructora El Puente".to_string(),
            clasificacion: FiscalClassification::Contribuyente,
            telefono: Some("22334455".to_string()),
            correo: None,
            departamento: Some("06".to_string()),
            municipio: Some("14".to_string()),
            direccion_complemento: None,
        }
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let stored = db.clients().insert(&contribuyente()).await.unwrap();

        assert!(stored.id > 0);
        let loaded = db.clients().get_by_id(stored.id).await.unwrap().unwrap();
        assert_eq!(loaded, stored);
        assert_eq!(loaded.clasificacion, FiscalClassification::Contribuyente);
        assert_eq!(loaded.correo, None);
    }

    #[tokio::test]
    async fn test_missing_client() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        assert!(db.clients().get_by_id(404).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_consumidor_final_is_idempotent() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let first = db.clients().ensure_consumidor_final().await.unwrap();
        let second = db.clients().ensure_consumidor_final().await.unwrap();

        assert_eq!(first, second);
        assert_eq!(db.clients().count().await.unwrap(), 1);

        let client = db.clients().get_by_id(first).await.unwrap().unwrap();
        assert_eq!(client.nombre, CONSUMIDOR_FINAL_NOMBRE);
        assert_eq!(client.num_documento, "00000000");
        assert_eq!(client.clasificacion, FiscalClassification::ConsumidorFinal);
    }
}
