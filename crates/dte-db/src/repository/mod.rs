//! # Repository Module
//!
//! Database repository implementations for DTE Emisor.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Layout                                    │
//! │                                                                         │
//! │  Orchestrator (dte-emit)                                               │
//! │       │                                                                 │
//! │       │  store.reserve_identifiers(client_id)                          │
//! │       ▼                                                                 │
//! │  IssuerRepository        ClientRepository       EmissionRepository     │
//! │  ├── get / require       ├── get_by_id          ├── reserve           │
//! │  └── upsert              ├── insert             ├── attach_document   │
//! │                          ├── find_by_nombre     ├── record_outcome    │
//! │                          └── ensure_consumidor  ├── get               │
//! │                              _final             └── list_by_status    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Queries are runtime-checked (`sqlx::query` / `query_as` with `.bind`), and
//! rows map through `sqlx::FromRow` record types before becoming domain types.

pub mod client;
pub mod emission;
pub mod issuer;
