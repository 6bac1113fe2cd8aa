//! # DTE Emitter
//!
//! Emits one electronic invoice from a sale described in JSON.
//!
//! ## Usage
//! ```bash
//! # Sale from a file
//! dte-emitter sale.json
//!
//! # Sale from stdin, explicit config file
//! cat sale.json | dte-emitter --config ./dte.toml -
//! ```
//!
//! ## Input
//! ```json
//! {
//!   "cliente_id": 1,
//!   "detalles": [
//!     { "codigo_producto": "TOR-001", "nombre_producto": "Tornillo", "cantidad": 2, "precio": 10.00 }
//!   ]
//! }
//! ```
//!
//! The outcome (or the error response) is printed to stdout as JSON. Logs go
//! to stderr; `RUST_LOG` selects the level.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context};
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use dte_core::SaleRequest;
use dte_db::{Database, DbConfig};
use dte_emit::{EmitterConfig, SubmissionOrchestrator, SystemClock};

const USAGE: &str = "usage: dte-emitter [--config PATH] [SALE_JSON | -]";

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    init_tracing();

    match run().await {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Initializes the tracing subscriber. Default: INFO, sqlx quiet.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,dte=debug,sqlx=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Command-line arguments.
#[derive(Debug, Default)]
struct Args {
    config: Option<PathBuf>,
    /// `None` or `-` reads stdin.
    sale: Option<PathBuf>,
}

impl Args {
    fn parse(mut args: impl Iterator<Item = String>) -> anyhow::Result<Self> {
        let mut parsed = Args::default();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" | "-c" => match args.next() {
                    Some(path) => parsed.config = Some(PathBuf::from(path)),
                    None => bail!("--config needs a path\n{}", USAGE),
                },
                "--help" | "-h" => {
                    println!("{}", USAGE);
                    std::process::exit(0);
                }
                _ if parsed.sale.is_none() => parsed.sale = Some(PathBuf::from(arg)),
                _ => bail!("unexpected argument '{}'\n{}", arg, USAGE),
            }
        }

        Ok(parsed)
    }
}

async fn read_sale(source: Option<&PathBuf>) -> anyhow::Result<SaleRequest> {
    let raw = match source {
        Some(path) if path.as_os_str() != "-" => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("cannot read {}", path.display()))?,
        _ => {
            let mut buf = String::new();
            tokio::io::stdin()
                .read_to_string(&mut buf)
                .await
                .context("cannot read sale from stdin")?;
            buf
        }
    };

    serde_json::from_str(&raw).context("sale request is not valid JSON")
}

async fn run() -> anyhow::Result<ExitCode> {
    let args = Args::parse(std::env::args().skip(1))?;

    let config = EmitterConfig::load(args.config.clone())?;
    info!(ambiente = ?config.authority.ambiente, "Configuration loaded");

    let db_path = config.database.resolved_path();
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("cannot create {}", parent.display()))?;
    }
    let db = Database::new(DbConfig::new(&db_path)).await?;

    let generic_client = db.clients().ensure_consumidor_final().await?;
    info!(client_id = generic_client, "Generic client ready");

    let sale = read_sale(args.sale.as_ref()).await?;

    let orchestrator =
        SubmissionOrchestrator::from_config(&config, Arc::new(db.clone()), Arc::new(SystemClock))?;

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling emission");
            trigger.cancel();
        }
    });

    let result = orchestrator.emit(&sale, &cancel).await;
    db.close().await;

    match result {
        Ok(outcome) => {
            info!(
                numero_control = %outcome.numero_control,
                codigo_generacion = %outcome.codigo_generacion,
                "Document accepted"
            );
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            println!("{}", serde_json::to_string_pretty(&e.to_response())?);
            Ok(ExitCode::FAILURE)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> anyhow::Result<Args> {
        Args::parse(list.iter().map(|s| s.to_string()))
    }

    #[test]
    fn test_parse_args() {
        let parsed = args(&["--config", "dte.toml", "sale.json"]).unwrap();
        assert_eq!(parsed.config, Some(PathBuf::from("dte.toml")));
        assert_eq!(parsed.sale, Some(PathBuf::from("sale.json")));

        let parsed = args(&[]).unwrap();
        assert!(parsed.config.is_none());
        assert!(parsed.sale.is_none());

        assert!(args(&["--config"]).is_err());
        assert!(args(&["a.json", "b.json"]).is_err());
    }
}
