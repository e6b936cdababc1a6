//! # Seed / Admin Tool
//!
//! Opens the shop database (running migrations and the sample catalog seed),
//! optionally imports a catalog CSV and reconciles stock.
//!
//! ## Usage
//! ```bash
//! # Open (and create) the default database
//! cargo run -p cellpos-db --bin seed
//!
//! # Specific database, import a catalog, update existing SKUs
//! cargo run -p cellpos-db --bin seed -- --db ./data/shop.db --import catalog.csv --update-existing
//!
//! # Repair current_qty drift against the ledger
//! cargo run -p cellpos-db --bin seed -- --reconcile
//! ```
//!
//! Logging follows `RUST_LOG`, default `info,cellpos=debug,sqlx=warn`.

use std::env;
use std::path::PathBuf;

use tracing_subscriber::EnvFilter;

use cellpos_db::migrations::migration_status;
use cellpos_db::{AppConfig, Database, ImportOptions};

const DEFAULT_LOG_FILTER: &str = "info,cellpos=debug,sqlx=warn";

#[derive(Debug, Default)]
struct Args {
    db: Option<PathBuf>,
    config: Option<PathBuf>,
    import: Option<PathBuf>,
    update_existing: bool,
    reconcile: bool,
}

fn print_help() {
    println!("cellpos seed / admin tool");
    println!();
    println!("Usage: seed [OPTIONS]");
    println!();
    println!("Options:");
    println!("  -d, --db <PATH>        Database file (overrides config)");
    println!("  -c, --config <PATH>    Config file (default: platform config dir)");
    println!("  -i, --import <FILE>    Import a catalog CSV");
    println!("      --update-existing  Update products whose SKU already exists");
    println!("      --reconcile        Recompute stock from the ledger");
    println!("  -h, --help             Show this help message");
}

/// Returns `None` when help was requested.
fn parse_args(args: &[String]) -> Result<Option<Args>, String> {
    let mut parsed = Args::default();
    let mut i = 1;
    while i < args.len() {
        let value = |i: usize| {
            args.get(i + 1)
                .map(PathBuf::from)
                .ok_or_else(|| format!("{} needs a value", args[i]))
        };
        match args[i].as_str() {
            "--db" | "-d" => {
                parsed.db = Some(value(i)?);
                i += 1;
            }
            "--config" | "-c" => {
                parsed.config = Some(value(i)?);
                i += 1;
            }
            "--import" | "-i" => {
                parsed.import = Some(value(i)?);
                i += 1;
            }
            "--update-existing" => parsed.update_existing = true,
            "--reconcile" => parsed.reconcile = true,
            "--help" | "-h" => return Ok(None),
            other => return Err(format!("unknown argument: {other}")),
        }
        i += 1;
    }
    Ok(Some(parsed))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let raw: Vec<String> = env::args().collect();
    let args = match parse_args(&raw) {
        Ok(Some(args)) => args,
        Ok(None) => {
            print_help();
            return Ok(());
        }
        Err(message) => {
            eprintln!("error: {message}");
            print_help();
            std::process::exit(2);
        }
    };

    let mut config = AppConfig::load(args.config)?;
    if let Some(db) = args.db {
        config.database.path = db;
    }
    if let Some(parent) = config.database.path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    println!("cellpos seed");
    println!("============");
    println!("Database: {}", config.database.path.display());

    let db = Database::new(config.db_config()).await?;
    let (total, applied) = migration_status(db.pool()).await?;
    println!("✓ Migrations applied: {applied}/{total}");

    if let Some(path) = args.import {
        let options = ImportOptions {
            has_header: true,
            update_existing: args.update_existing,
        };
        let summary = db.import().import_file(&path, options, Some("seed")).await?;
        println!(
            "✓ Imported {}: {} new, {} updated, {} skipped, {} errors",
            path.display(),
            summary.imported,
            summary.updated,
            summary.skipped,
            summary.errors
        );
        for failure in &summary.failures {
            println!("  line {}: {}", failure.line, failure.message);
        }
    }

    if args.reconcile {
        let fixed = db.inventory().reconcile_all().await?;
        println!("✓ Reconciled {fixed} product(s)");
    }

    println!();
    println!("Active products: {}", db.products().count_active().await?);
    let low = db.products().low_stock(1_000).await?;
    println!("Low stock:       {}", low.len());
    for balance in db.wallet().balances(Default::default()).await? {
        println!("Wallet {:<9} {}", balance.provider, balance.balance);
    }

    db.close().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(args: &[&str]) -> Vec<String> {
        std::iter::once("seed").chain(args.iter().copied()).map(String::from).collect()
    }

    #[test]
    fn test_parse_args() {
        let args = parse_args(&argv(&["--db", "shop.db", "-i", "cat.csv", "--update-existing"]))
            .unwrap()
            .unwrap();
        assert_eq!(args.db, Some(PathBuf::from("shop.db")));
        assert_eq!(args.import, Some(PathBuf::from("cat.csv")));
        assert!(args.update_existing);
        assert!(!args.reconcile);

        assert!(parse_args(&argv(&["--help"])).unwrap().is_none());
        assert!(parse_args(&argv(&["--db"])).is_err());
        assert!(parse_args(&argv(&["--bogus"])).is_err());
    }
}
