//! # dte-core: Pure Fiscal-Document Logic for DTE Emisor
//!
//! This crate is the **heart** of DTE Emisor. It turns a sale into the
//! canonical DTE tree with exact tax arithmetic, and it does so with zero
//! I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        DTE Emisor Architecture                          │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    apps/emitter (binary)                        │   │
//! │  │          config ──► bootstrap ──► read sale ──► emit            │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    dte-emit (network side)                      │   │
//! │  │    TokenCache, SigningClient, ReceptionClient, Orchestrator     │   │
//! │  └──────────────┬──────────────────────────────┬───────────────────┘   │
//! │                 │                              │                        │
//! │  ┌──────────────▼──────────────────┐  ┌────────▼────────────────────┐  │
//! │  │   ★ dte-core (THIS CRATE) ★     │  │  dte-db (SQLite)            │  │
//! │  │                                 │  │  issuer, clients, ledger    │  │
//! │  │  types · money · validation     │  └─────────────────────────────┘  │
//! │  │  document (composer)            │                                   │
//! │  │                                 │                                   │
//! │  │  NO I/O • NO CLOCK • PURE       │                                   │
//! │  └─────────────────────────────────┘                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (IssuerConfig, Client, LineItem, Ambiente, ...)
//! - [`money`] - Tax policy and half-up rounding on `Decimal`
//! - [`document`] - The DTE tree and the [`DocumentComposer`]
//! - [`validation`] - Input rules checked before anything leaves the process
//! - [`error`] - Domain error types
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: the composer takes the emission instant as an
//!    argument, so the same input always yields the same document
//! 2. **No I/O**: database, network and the system clock live elsewhere
//! 3. **Exact Decimals**: amounts are `rust_decimal::Decimal`, never `f64`
//! 4. **Explicit Errors**: every failure is a typed variant
//!
//! ## Example Usage
//!
//! ```rust
//! use dte_core::money::{LineAmounts, TaxPolicy};
//! use rust_decimal::Decimal;
//!
//! let policy = TaxPolicy::default();
//! let line = LineAmounts::compute(Decimal::from(2), Decimal::from(10), &policy).unwrap();
//!
//! assert_eq!(policy.round_amount(line.tax), Decimal::new(260, 2));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod document;
pub mod error;
pub mod money;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports
// =============================================================================

pub use document::{DocumentComposer, DteDocument, DTE_VERSION, TIPO_DTE_FACTURA, TIPO_MONEDA};
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::TaxPolicy;
pub use types::{
    Ambiente, Client, EmissionStatus, FiscalClassification, IssuerConfig, LineItem, SaleRequest,
};

// =============================================================================
// Constants
// =============================================================================

use rust_decimal::Decimal;

/// Maximum number of lines in a single document.
pub const MAX_LINE_ITEMS: usize = 2000;

/// Largest quantity accepted on one line.
pub const MAX_CANTIDAD: Decimal = Decimal::from_parts(1_000_000_000, 0, 0, false, 0);

/// Largest unit price accepted on one line.
pub const MAX_PRECIO: Decimal = Decimal::from_parts(1_000_000_000, 0, 0, false, 0);

/// Name of the generic walk-in client.
pub const CONSUMIDOR_FINAL_NOMBRE: &str = "CONSUMIDOR FINAL";

/// Document type recorded for the generic client.
pub const CONSUMIDOR_FINAL_TIPO_DOCUMENTO: &str = "CUI";

/// Document number recorded for the generic client.
pub const CONSUMIDOR_FINAL_NUM_DOCUMENTO: &str = "00000000";
