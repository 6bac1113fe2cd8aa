//! # dte-db: Database Layer for DTE Emisor
//!
//! SQLite persistence for the issuer's fiscal identity, the client
//! directory and the emission ledger.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        DTE Emisor Data Flow                             │
//! │                                                                         │
//! │  SubmissionOrchestrator (dte-emit)                                     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     dte-db (THIS CRATE)                         │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │               │    │  (embedded)  │  │   │
//! │  │   │               │    │ IssuerRepo    │    │ 001_initial_ │  │   │
//! │  │   │ SqlitePool    │◄───│ ClientRepo    │    │   schema.sql │  │   │
//! │  │   │               │    │ EmissionRepo  │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite file (DTE_DATABASE_PATH or the platform data dir)              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use dte_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("dte.db")).await?;
//! let cliente_id = db.clients().ensure_consumidor_final().await?;
//! let reservation = db.emissions().reserve(Some(cliente_id)).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

pub use repository::client::ClientRepository;
pub use repository::emission::{EmissionRecord, EmissionRepository, OutcomeUpdate, Reservation};
pub use repository::issuer::IssuerRepository;
