//! # Validation Module
//!
//! Input validation for sale requests, issuers and clients.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Caller                                                       │
//! │  └── Type validation (deserialization of the sale request)            │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  ├── cliente_id present, detalles non-empty                           │
//! │  └── every line priced and quantified                                  │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Composer                                                     │
//! │  └── InvalidLineItem if layer 2 was skipped                           │
//! │                                                                         │
//! │  Nothing below layer 2 talks to the authority on bad input.           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use rust_decimal::Decimal;

use crate::error::ValidationError;
use crate::types::{Client, FiscalClassification, IssuerConfig, LineItem, SaleRequest};
use crate::{MAX_CANTIDAD, MAX_LINE_ITEMS, MAX_PRECIO};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

fn required(field: &str, value: &str) -> ValidationResult<()> {
    if value.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }
    Ok(())
}

fn at_most(field: &str, value: Decimal, max: Decimal) -> ValidationResult<()> {
    if value > max {
        return Err(ValidationError::TooLarge {
            field: field.to_string(),
            max: max.to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Sale Request
// =============================================================================

/// Validates a sale request before any reference data is loaded.
///
/// ## Rules
/// - `cliente_id` must be present
/// - `detalles` must contain 1..=MAX_LINE_ITEMS entries
/// - every entry passes [`validate_line_item`]
///
/// ## Returns
/// The client id, so callers don't unwrap it again.
pub fn validate_sale_request(request: &SaleRequest) -> ValidationResult<i64> {
    let cliente_id = request.cliente_id.ok_or_else(|| ValidationError::Required {
        field: "cliente_id".to_string(),
    })?;

    if request.detalles.is_empty() {
        return Err(ValidationError::Required {
            field: "detalles".to_string(),
        });
    }

    if request.detalles.len() > MAX_LINE_ITEMS {
        return Err(ValidationError::TooMany {
            field: "detalles".to_string(),
            max: MAX_LINE_ITEMS,
        });
    }

    for item in &request.detalles {
        validate_line_item(item)?;
    }

    Ok(cliente_id)
}

/// Validates a single line item.
///
/// ## Rules
/// - Product code and description are required
/// - Quantity must be positive and at most [`MAX_CANTIDAD`]
/// - Price must not be negative (zero is allowed for gifts) and at most [`MAX_PRECIO`]
pub fn validate_line_item(item: &LineItem) -> ValidationResult<()> {
    required("codigo_producto", &item.codigo_producto)?;
    required("nombre_producto", &item.nombre_producto)?;

    if item.cantidad <= Decimal::ZERO {
        return Err(ValidationError::MustBePositive {
            field: "cantidad".to_string(),
        });
    }

    if item.precio.is_sign_negative() && !item.precio.is_zero() {
        return Err(ValidationError::Negative {
            field: "precio".to_string(),
        });
    }

    at_most("cantidad", item.cantidad, MAX_CANTIDAD)?;
    at_most("precio", item.precio, MAX_PRECIO)?;

    Ok(())
}

// =============================================================================
// Reference Data
// =============================================================================

/// Validates the issuer's fiscal identity.
///
/// NIT, NRC and name are mandatory for any document the authority will accept.
pub fn validate_issuer(config: &IssuerConfig) -> ValidationResult<()> {
    required("nit", &config.nit)?;
    required("nrc", &config.nrc)?;
    required("nombre", &config.nombre)?;
    Ok(())
}

/// Validates a client record.
///
/// ## Rules
/// - Name is required
/// - A `contribuyente` needs a document number or an NRC
pub fn validate_client(client: &Client) -> ValidationResult<()> {
    required("nombre", &client.nombre)?;

    if client.clasificacion == FiscalClassification::Contribuyente {
        let has_document = !client.num_documento.trim().is_empty();
        let has_nrc = client
            .nrc
            .as_deref()
            .map(|n| !n.trim().is_empty())
            .unwrap_or(false);
        if !has_document && !has_nrc {
            return Err(ValidationError::Required {
                field: "num_documento or nrc".to_string(),
            });
        }
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn item(cantidad: Decimal, precio: Decimal) -> LineItem {
        LineItem {
            codigo_producto: "TOR-001".to_string(),
            nombre_producto: "Tornillo 1/4".to_string(),
            cantidad,
            precio,
        }
    }

    fn client(clasificacion: FiscalClassification) -> Client {
        Client {
            id: 1,
            tipo_documento: "36".to_string(),
            num_documento: String::new(),
            nrc: None,
            nombre: "Ferreteria El Clavo".to_string(),
            clasificacion,
            telefono: None,
            correo: None,
            departamento: None,
            municipio: None,
            direccion_complemento: None,
        }
    }

    #[test]
    fn test_validate_sale_request() {
        let ok = SaleRequest {
            cliente_id: Some(7),
            detalles: vec![item(dec!(1), dec!(2.50))],
        };
        assert_eq!(validate_sale_request(&ok).unwrap(), 7);

        let no_client = SaleRequest {
            cliente_id: None,
            detalles: vec![item(dec!(1), dec!(2.50))],
        };
        assert!(matches!(
            validate_sale_request(&no_client),
            Err(ValidationError::Required { field }) if field == "cliente_id"
        ));

        let no_items = SaleRequest {
            cliente_id: Some(7),
            detalles: vec![],
        };
        assert!(validate_sale_request(&no_items).is_err());
    }

    #[test]
    fn test_too_many_items() {
        let request = SaleRequest {
            cliente_id: Some(1),
            detalles: vec![item(dec!(1), dec!(1)); MAX_LINE_ITEMS + 1],
        };
        assert!(matches!(
            validate_sale_request(&request),
            Err(ValidationError::TooMany { .. })
        ));
    }

    #[test]
    fn test_validate_line_item() {
        assert!(validate_line_item(&item(dec!(1), dec!(0))).is_ok());
        assert!(validate_line_item(&item(dec!(0.5), dec!(3))).is_ok());
        assert!(validate_line_item(&item(dec!(0), dec!(3))).is_err());
        assert!(validate_line_item(&item(dec!(-1), dec!(3))).is_err());
        assert!(validate_line_item(&item(dec!(1), dec!(-0.01))).is_err());

        assert!(validate_line_item(&item(MAX_CANTIDAD, MAX_PRECIO)).is_ok());
        assert!(matches!(
            validate_line_item(&item(Decimal::MAX, dec!(2))),
            Err(ValidationError::TooLarge { field, .. }) if field == "cantidad"
        ));
        assert!(matches!(
            validate_line_item(&item(dec!(1), MAX_PRECIO + dec!(0.01))),
            Err(ValidationError::TooLarge { field, .. }) if field == "precio"
        ));

        let mut blank = item(dec!(1), dec!(1));
        blank.codigo_producto = "  ".to_string();
        assert!(validate_line_item(&blank).is_err());
    }

    #[test]
    fn test_validate_client() {
        assert!(validate_client(&client(FiscalClassification::ConsumidorFinal)).is_ok());
        assert!(validate_client(&client(FiscalClassification::Contribuyente)).is_err());

        let mut with_nrc = client(FiscalClassification::Contribuyente);
        with_nrc.nrc = Some("1234-5".to_string());
        assert!(validate_client(&with_nrc).is_ok());
    }
}
