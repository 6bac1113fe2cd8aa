//! # Domain Types
//!
//! Core domain types used throughout DTE Emisor.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │  IssuerConfig   │   │     Client      │   │    LineItem     │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  nit / nrc      │   │  tipo_documento │   │  codigo         │       │
//! │  │  establishment  │   │  num_documento  │   │  descripcion    │       │
//! │  │  last control # │   │  classification │   │  cantidad       │       │
//! │  │  last gen. code │   │  address        │   │  precio         │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Ambiente     │   │ EmissionStatus  │   │  ControlNumber  │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  "00" pruebas   │   │  Reserved       │   │  DTE-01-        │       │
//! │  │  "01" produccion│   │  Accepted ...   │   │  M001P001-      │       │
//! │  └─────────────────┘   └─────────────────┘   │  000000000000001│       │
//! │                                              └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

// =============================================================================
// Ambiente
// =============================================================================

/// Authority environment the document is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Ambiente {
    /// Test environment.
    #[default]
    #[serde(rename = "00")]
    Pruebas,
    /// Production environment.
    #[serde(rename = "01")]
    Produccion,
}

impl Ambiente {
    /// Wire code ("00" / "01").
    pub const fn code(&self) -> &'static str {
        match self {
            Ambiente::Pruebas => "00",
            Ambiente::Produccion => "01",
        }
    }
}

impl std::str::FromStr for Ambiente {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "00" | "pruebas" | "test" => Ok(Ambiente::Pruebas),
            "01" | "produccion" | "production" => Ok(Ambiente::Produccion),
            other => Err(format!("unknown ambiente: {}", other)),
        }
    }
}

impl std::fmt::Display for Ambiente {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

// =============================================================================
// Issuer Configuration
// =============================================================================

/// The business's fiscal identity.
///
/// Loaded read-only per emission. The two `ult_*` fields are the identifiers
/// of the most recent reservation; the composer embeds them verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuerConfig {
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
    /// Establishment code assigned by the authority (4 chars).
    pub cod_establecimiento: String,
    /// Point-of-sale code assigned by the authority (4 chars).
    pub cod_punto_venta: String,
    /// Last control number handed out.
    pub ult_num_control: String,
    /// Last generation code handed out.
    pub ult_cod_generacion: String,
}

// =============================================================================
// Client
// =============================================================================

/// Fiscal classification of a sale's recipient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum FiscalClassification {
    /// Anonymous or individual buyer (DTE-01 recipient).
    ConsumidorFinal,
    /// Registered taxpayer; needs a document number or NRC.
    Contribuyente,
}

/// A sale's recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    pub id: i64,
    pub tipo_documento: String,
    pub num_documento: String,
    pub nrc: Option<String>,
    pub nombre: String,
    pub clasificacion: FiscalClassification,
    pub telefono: Option<String>,
    pub correo: Option<String>,
    pub departamento: Option<String>,
    pub municipio: Option<String>,
    pub direccion_complemento: Option<String>,
}

// =============================================================================
// Sale Input
// =============================================================================

/// One sold product entry, supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub codigo_producto: String,
    pub nombre_producto: String,
    pub cantidad: Decimal,
    pub precio: Decimal,
}

/// A request to issue one DTE.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleRequest {
    pub cliente_id: Option<i64>,
    #[serde(default)]
    pub detalles: Vec<LineItem>,
}

// =============================================================================
// Emission Status
// =============================================================================

/// Lifecycle of a reserved document identifier.
///
/// ```text
///                 ┌──────────► Accepted   (authority 2xx)
///                 │
///  Reserved ──────┼──────────► Rejected   (authority HTTP error)
///                 │
///                 ├──────────► Unknown    (dispatched, no answer)
///                 │
///                 └──────────► Failed     (never dispatched)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum EmissionStatus {
    Reserved,
    Accepted,
    Rejected,
    Failed,
    /// The envelope left this process but no response arrived. Must be
    /// reconciled with the authority before anything is resent.
    Unknown,
}

impl EmissionStatus {
    /// True once no further transition is expected.
    pub const fn is_final(&self) -> bool {
        !matches!(self, EmissionStatus::Reserved | EmissionStatus::Unknown)
    }
}

// =============================================================================
// Control Number
// =============================================================================

/// Width of the numeric sequence at the end of a control number.
pub const CONTROL_SEQUENCE_WIDTH: usize = 15;

/// Formats a control number: `DTE-{tipo}-{estab}{pv}-{seq:015}`.
///
/// ## Example
/// ```rust
/// use dte_core::types::format_control_number;
///
/// let n = format_control_number("01", "M001", "P001", 7);
/// assert_eq!(n, "DTE-01-M001P001-000000000000007");
/// ```
pub fn format_control_number(tipo_dte: &str, cod_estable: &str, cod_pv: &str, seq: u64) -> String {
    format!(
        "DTE-{}-{}{}-{:0width$}",
        tipo_dte,
        cod_estable,
        cod_pv,
        seq,
        width = CONTROL_SEQUENCE_WIDTH
    )
}

/// Extracts the trailing sequence of a control number.
///
/// An empty value means nothing has been issued yet and yields 0.
pub fn parse_control_sequence(control_number: &str) -> CoreResult<u64> {
    let value = control_number.trim();
    if value.is_empty() {
        return Ok(0);
    }

    let tail = value.rsplit('-').next().unwrap_or(value);
    tail.parse::<u64>().map_err(|_| CoreError::InvalidControlNumber {
        value: value.to_string(),
        reason: "does not end in a numeric sequence".to_string(),
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
