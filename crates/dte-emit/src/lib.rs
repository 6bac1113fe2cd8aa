//! # dte-emit: Submission Pipeline for DTE Emisor
//!
//! Everything that leaves the process: the authority's token and reception
//! endpoints, and the local signing service. The [`SubmissionOrchestrator`]
//! ties them to the pure composer in `dte-core` and the ledger in `dte-db`.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     SubmissionOrchestrator                              │
//! │                                                                         │
//! │         ┌──────────────┬──────────────┬──────────────┐                  │
//! │         ▼              ▼              ▼              ▼                  │
//! │  ┌────────────┐ ┌────────────┐ ┌────────────┐ ┌──────────────┐          │
//! │  │ TokenCache │ │  Signing   │ │ Reception  │ │ EmissionStore│          │
//! │  │            │ │  Client    │ │ Client     │ │              │          │
//! │  │ RwLock,    │ │ firma /    │ │ base64     │ │ reserve,     │          │
//! │  │ 60 s margin│ │ Signature- │ │ envelope,  │ │ outcome      │          │
//! │  │            │ │ Value      │ │ bearer     │ │ ledger       │          │
//! │  └─────┬──────┘ └─────┬──────┘ └─────┬──────┘ └──────┬───────┘          │
//! │        ▼              ▼              ▼               ▼                  │
//! │   authority auth   local signer   authority      SQLite (dte-db)       │
//! │                                   reception                            │
//! │                                                                         │
//! │  Clock: injected everywhere time matters (SystemClock / ManualClock)   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`auth`] - Authority token cache with single-flight refresh
//! - [`clock`] - Injected time source
//! - [`config`] - TOML + environment configuration
//! - [`error`] - Emission error taxonomy
//! - [`orchestrator`] - The emission pipeline
//! - [`reception`] - Envelope and reception client
//! - [`signer`] - Local signing service client
//! - [`store`] - Persistence seam
//!
//! ## Usage
//!
//! ```rust,ignore
//! use dte_emit::{EmitterConfig, SubmissionOrchestrator, SystemClock};
//! use tokio_util::sync::CancellationToken;
//!
//! let config = EmitterConfig::load(None)?;
//! let db = Database::new(DbConfig::new(config.database.resolved_path())).await?;
//! let orchestrator = SubmissionOrchestrator::from_config(&config, Arc::new(db), Arc::new(SystemClock))?;
//!
//! let outcome = orchestrator.emit(&sale, &CancellationToken::new()).await?;
//! println!("{} accepted", outcome.numero_control);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod auth;
pub mod clock;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod reception;
pub mod signer;
pub mod store;

// =============================================================================
// Re-exports
// =============================================================================

pub use auth::{CachedToken, TokenCache};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{
    AuthorityConfig, DatabaseSettings, EmitterConfig, Secret, SignerConfig, TokenSettings,
};
pub use error::{EmitError, EmitResult, ErrorCode, ErrorResponse};
pub use orchestrator::{EmissionOutcome, SubmissionOrchestrator};
pub use reception::{AuthorityResponse, ReceptionClient, SubmissionEnvelope, SubmissionResult};
pub use signer::SigningClient;
pub use store::EmissionStore;
