//! # DTE Document Composer
//!
//! Builds the canonical DTE-01 (Factura de Consumidor Final) tree from the
//! issuer, the client and the sold lines.
//!
//! ## Document Shape
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  DteDocument                                                            │
//! │  ├── version, ambiente                                                 │
//! │  ├── identificacion   numeroControl, codigoGeneracion, fecEmi, horEmi  │
//! │  ├── emisor           mirrors IssuerConfig                             │
//! │  ├── receptor         mirrors Client (nulls / placeholder when absent) │
//! │  ├── cuerpoDocumento  one entry per LineItem, numbered 1..n            │
//! │  └── resumen          totals                                           │
//! │                                                                         │
//! │  totalGravada + totalIva == totalAPagar   (± 0.01 after rounding)      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Field order in the serialized JSON is the declaration order below. The
//! authority receives this exact string (base64) and the signer signs it, so
//! do not reorder fields.

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::money::{LineAmounts, TaxPolicy, Totals};
use crate::types::{Ambiente, Client, IssuerConfig, LineItem};

// =============================================================================
// Constants
// =============================================================================

/// Current DTE schema version.
pub const DTE_VERSION: u8 = 3;

/// DTE-01: Factura de Consumidor Final.
pub const TIPO_DTE_FACTURA: &str = "01";

/// Currency of every amount.
pub const TIPO_MONEDA: &str = "USD";

/// 01: goods.
const TIPO_ITEM_BIENES: &str = "01";
/// 20: IVA.
const COD_TRIBUTO_IVA: &str = "20";
/// 59: unit.
const UNI_MEDIDA_UNIDAD: u16 = 59;
/// 1: normal transmission model.
const TIPO_MODELO_NORMAL: u8 = 1;
/// 1: normal operation.
const TIPO_OPERACION_NORMAL: u8 = 1;
/// 1: cash.
const CONDICION_CONTADO: u8 = 1;

/// Placeholder when the client has no address complement.
pub const SIN_COMPLEMENTO: &str = "Sin complemento";

// =============================================================================
// Document Tree
// =============================================================================

/// Root of a composed DTE.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DteDocument {
    pub version: u8,
    pub ambiente: Ambiente,
    pub identificacion: Identificacion,
    pub emisor: Emisor,
    pub receptor: Receptor,
    pub cuerpo_documento: Vec<CuerpoItem>,
    pub resumen: Resumen,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identificacion {
    pub version: u8,
    pub ambiente: Ambiente,
    pub tipo_dte: String,
    pub numero_control: String,
    pub codigo_generacion: String,
    pub tipo_modelo: u8,
    pub tipo_operacion: u8,
    pub tipo_contingencia: Option<u8>,
    /// `YYYY-MM-DD`
    pub fec_emi: String,
    /// `HH:MM:SS`
    pub hor_emi: String,
    pub tipo_moneda: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Direccion {
    pub departamento: Option<String>,
    pub municipio: Option<String>,
    pub complemento: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Emisor {
    pub nombre: String,
    pub nit: String,
    pub nrc: String,
    pub cod_estable_mh: String,
    pub cod_punto_venta_mh: String,
    pub telefono: String,
    pub correo: String,
    pub cod_actividad: String,
    pub desc_actividad: String,
    pub direccion: Direccion,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receptor {
    pub tipo_documento: String,
    pub num_documento: String,
    pub nrc: Option<String>,
    pub nombre: String,
    pub telefono: Option<String>,
    pub correo: Option<String>,
    pub direccion: Direccion,
}

/// One entry of `cuerpoDocumento`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CuerpoItem {
    pub num_item: u32,
    pub tipo_item: String,
    pub codigo: String,
    pub cod_tributo: String,
    pub monto_tributo: Decimal,
    pub uni_medida: u16,
    pub cantidad: Decimal,
    pub descripcion: String,
    pub precio_uni: Decimal,
    pub monto_sujeto_grav: Decimal,
    pub monto_gravado: Decimal,
    pub venta_no_suj: Decimal,
    pub venta_exenta: Decimal,
    pub venta_gravada: Decimal,
    /// Price including tax.
    pub psv: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resumen {
    pub total_no_suj: Decimal,
    pub total_exenta: Decimal,
    pub total_gravada: Decimal,
    pub sub_total_ventas: Decimal,
    pub iva_perci1: Decimal,
    pub iva_reten1: Decimal,
    pub monto_total_operacion: Decimal,
    pub total_iva: Decimal,
    pub sub_total: Decimal,
    pub total_a_pagar: Decimal,
    pub condicion_operacion: u8,
}

impl DteDocument {
    /// Serializes to the canonical string that is signed and encoded.
    pub fn to_canonical_string(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Generation code carried in the identification block.
    pub fn codigo_generacion(&self) -> &str {
        &self.identificacion.codigo_generacion
    }
}

// =============================================================================
// Composer
// =============================================================================

/// Pure transformation `(issuer, client, lines, instant) → DteDocument`.
///
/// ## Example
/// ```rust,ignore
/// let composer = DocumentComposer::new(Ambiente::Pruebas, TaxPolicy::default());
/// let doc = composer.compose(&issuer, &client, &items, emitted_at)?;
/// assert_eq!(doc.cuerpo_documento.len(), items.len());
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentComposer {
    ambiente: Ambiente,
    policy: TaxPolicy,
}

impl DocumentComposer {
    pub fn new(ambiente: Ambiente, policy: TaxPolicy) -> Self {
        DocumentComposer { ambiente, policy }
    }

    pub fn policy(&self) -> &TaxPolicy {
        &self.policy
    }

    /// Composes the document.
    ///
    /// `emitted_at` is local wall-clock time at composition; it becomes
    /// `fecEmi` / `horEmi`. The identifiers are taken from `issuer` as-is.
    pub fn compose(
        &self,
        issuer: &IssuerConfig,
        client: &Client,
        items: &[LineItem],
        emitted_at: NaiveDateTime,
    ) -> CoreResult<DteDocument> {
        let policy = &self.policy;
        let mut totals = Totals::default();
        let mut cuerpo = Vec::with_capacity(items.len());

        for (index, item) in items.iter().enumerate() {
            check_line(index + 1, item)?;

            let line = LineAmounts::compute(item.cantidad, item.precio, policy)
                .ok_or_else(|| out_of_range(index + 1))?;
            totals
                .accumulate(&line)
                .ok_or_else(|| out_of_range(index + 1))?;

            let gravada = policy.round_amount(line.subtotal);
            cuerpo.push(CuerpoItem {
                num_item: (index + 1) as u32,
                tipo_item: TIPO_ITEM_BIENES.to_string(),
                codigo: item.codigo_producto.clone(),
                cod_tributo: COD_TRIBUTO_IVA.to_string(),
                monto_tributo: policy.round_amount(line.tax),
                uni_medida: UNI_MEDIDA_UNIDAD,
                cantidad: item.cantidad,
                descripcion: item.nombre_producto.clone(),
                precio_uni: policy.round_unit_price(item.precio),
                monto_sujeto_grav: gravada,
                monto_gravado: gravada,
                venta_no_suj: Decimal::ZERO,
                venta_exenta: Decimal::ZERO,
                venta_gravada: gravada,
                psv: policy.round_amount(line.total),
            });
        }

        let total_venta = policy.round_amount(totals.venta);

        Ok(DteDocument {
            version: DTE_VERSION,
            ambiente: self.ambiente,
            identificacion: Identificacion {
                version: DTE_VERSION,
                ambiente: self.ambiente,
                tipo_dte: TIPO_DTE_FACTURA.to_string(),
                numero_control: issuer.ult_num_control.clone(),
                codigo_generacion: issuer.ult_cod_generacion.clone(),
                tipo_modelo: TIPO_MODELO_NORMAL,
                tipo_operacion: TIPO_OPERACION_NORMAL,
                tipo_contingencia: None,
                fec_emi: emitted_at.format("%Y-%m-%d").to_string(),
                hor_emi: emitted_at.format("%H:%M:%S").to_string(),
                tipo_moneda: TIPO_MONEDA.to_string(),
            },
            emisor: emisor_block(issuer),
            receptor: receptor_block(client),
            cuerpo_documento: cuerpo,
            resumen: Resumen {
                total_no_suj: Decimal::ZERO,
                total_exenta: Decimal::ZERO,
                total_gravada: policy.round_amount(totals.gravado),
                sub_total_ventas: total_venta,
                iva_perci1: Decimal::ZERO,
                iva_reten1: Decimal::ZERO,
                monto_total_operacion: total_venta,
                total_iva: policy.round_amount(totals.iva),
                sub_total: total_venta,
                total_a_pagar: total_venta,
                condicion_operacion: CONDICION_CONTADO,
            },
        })
    }
}

fn out_of_range(index: usize) -> CoreError {
    CoreError::InvalidLineItem {
        index,
        reason: "amount out of range".to_string(),
    }
}

fn check_line(index: usize, item: &LineItem) -> CoreResult<()> {
    if item.cantidad <= Decimal::ZERO {
        return Err(CoreError::InvalidLineItem {
            index,
            reason: "quantity must be positive".to_string(),
        });
    }
    if item.precio < Decimal::ZERO {
        return Err(CoreError::InvalidLineItem {
            index,
            reason: "unit price must not be negative".to_string(),
        });
    }
    Ok(())
}

fn emisor_block(issuer: &IssuerConfig) -> Emisor {
    Emisor {
        nombre: issuer.nombre.clone(),
        nit: issuer.nit.clone(),
        nrc: issuer.nrc.clone(),
        cod_estable_mh: issuer.cod_establecimiento.clone(),
        cod_punto_venta_mh: issuer.cod_punto_venta.clone(),
        telefono: issuer.telefono.clone(),
        correo: issuer.correo.clone(),
        cod_actividad: issuer.cod_actividad.clone(),
        desc_actividad: issuer.desc_actividad.clone(),
        direccion: Direccion {
            departamento: Some(issuer.departamento.clone()),
            municipio: Some(issuer.municipio.clone()),
            complemento: issuer.direccion_complemento.clone(),
        },
    }
}

/// Empty strings count as absent.
fn present(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|v| !v.trim().is_empty()).cloned()
}

fn receptor_block(client: &Client) -> Receptor {
    Receptor {
        tipo_documento: client.tipo_documento.clone(),
        num_documento: client.num_documento.clone(),
        nrc: present(&client.nrc),
        nombre: client.nombre.clone(),
        telefono: present(&client.telefono),
        correo: present(&client.correo),
        direccion: Direccion {
            departamento: client.departamento.clone(),
            municipio: client.municipio.clone(),
            complemento: present(&client.direccion_complemento)
                .unwrap_or_else(|| SIN_COMPLEMENTO.to_string()),
        },
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
