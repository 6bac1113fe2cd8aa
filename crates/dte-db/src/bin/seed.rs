//! # Seed Data Generator
//!
//! Populates a development database with an issuer, the generic client and a
//! handful of registered clients.
//!
//! ## Usage
//! ```bash
//! # Default database path
//! cargo run -p dte-db --bin seed
//!
//! # Specify database path
//! cargo run -p dte-db --bin seed -- --db ./data/dte.db
//! ```

use std::env;

use dte_core::validation::{validate_client, validate_issuer};
use dte_core::{Client, FiscalClassification, IssuerConfig};
use dte_db::{Database, DbConfig};

/// (tipo_documento, num_documento, nrc, nombre, departamento, municipio)
const CLIENTS: &[(&str, &str, Option<&str>, &str, &str, &str)] = &[
    ("36", "06140101001011", Some("1001-1"), "Constructora El Puente S.A.", "06", "14"),
    ("36", "02101505921015", Some("2002-2"), "Distribuidora Santa Ana", "02", "10"),
    ("13", "04512345-6", None, "Maria Elena Flores", "05", "11"),
    ("13", "01987654-3", None, "Jose Antonio Rivas", "06", "14"),
];

fn development_issuer() -> IssuerConfig {
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
        direccion_complemento: "Calle El Progreso #12, San Salvador".to_string(),
        cod_establecimiento: "M001".to_string(),
        cod_punto_venta: "P001".to_string(),
        ult_num_control: String::new(),
        ult_cod_generacion: String::new(),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut db_path = String::from("./dte_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("DTE Emisor Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: ./dte_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 DTE Emisor Seed Data Generator");
    println!("=================================");
    println!("Database: {}", db_path);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    if db.issuer().get().await?.is_some() {
        println!("⚠ Issuer already configured, leaving it untouched");
    } else {
        let issuer = development_issuer();
        validate_issuer(&issuer)?;
        db.issuer().upsert(&issuer).await?;
        println!("✓ Issuer {} ({})", issuer.nombre, issuer.nit);
    }

    let generic = db.clients().ensure_consumidor_final().await?;
    println!("✓ Generic client id {}", generic);

    if db.clients().count().await? > 1 {
        println!("⚠ Clients already present, skipping");
        return Ok(());
    }

    for (tipo, numero, nrc, nombre, departamento, municipio) in CLIENTS {
        let clasificacion = if nrc.is_some() {
            FiscalClassification::Contribuyente
        } else {
            FiscalClassification::ConsumidorFinal
        };
        let client = Client {
            id: 0,
            tipo_documento: tipo.to_string(),
            num_documento: numero.to_string(),
            nrc: nrc.map(str::to_string),
            nombre: nombre.to_string(),
            clasificacion,
            telefono: None,
            correo: None,
            departamento: Some(departamento.to_string()),
            municipio: Some(municipio.to_string()),
            direccion_complemento: None,
        };
        validate_client(&client)?;
        let stored = db.clients().insert(&client).await?;
        println!("  + {} (id {})", stored.nombre, stored.id);
    }

    println!();
    println!("✓ Seed complete");
    Ok(())
}
