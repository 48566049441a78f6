use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use rxflow::application::engine::PharmacyEngine;
use rxflow::config::Config;
use rxflow::domain::ports::Stores;
use rxflow::infrastructure::clock::SystemClock;
use rxflow::infrastructure::csv_file;
use rxflow::infrastructure::signing::SigningAuthority;
use rxflow::interfaces::console::Console;
use rxflow::interfaces::server;
use rxflow::logging;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory holding the CSV collections (overrides the config file)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Signing key file (overrides the config file)
    #[arg(long)]
    key_path: Option<PathBuf>,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Interactive console (default)
    Console,
    /// Serve line-delimited JSON requests over TCP
    Serve {
        /// Listen address (overrides the config file)
        #[arg(long)]
        addr: Option<String>,
    },
    /// Print the system report as JSON
    Report,
    /// Re-verify every stored signature; fails if any record was tampered with
    Audit,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = data_dir;
    }
    if let Some(key_path) = cli.key_path {
        config.key_path = key_path;
    }
    logging::init(config.log.format, &config.log.filter);

    let stores = open_stores(&config, cli.db_path)?;
    let signer = Arc::new(SigningAuthority::load_or_degrade(&config.key_path));
    let engine = PharmacyEngine::open(stores, signer, Arc::new(SystemClock))
        .await?
        .with_expiry_warning_days(config.expiry_warning_days);

    match cli.command.unwrap_or(Command::Console) {
        Command::Console => {
            let stdin = io::stdin();
            let stdout = io::stdout();
            Console::new(&engine, stdin.lock(), stdout.lock())
                .run()
                .await
                .into_diagnostic()?;
        }
        Command::Serve { addr } => {
            let addr = addr.unwrap_or(config.listen_addr);
            let listener = TcpListener::bind(&addr).await.into_diagnostic()?;
            let shutdown = async {
                let _ = tokio::signal::ctrl_c().await;
            };
            server::serve(listener, Arc::new(engine), shutdown)
                .await
                .into_diagnostic()?;
        }
        Command::Report => {
            let report = engine.generate_report().await;
            println!(
                "{}",
                serde_json::to_string_pretty(&report).into_diagnostic()?
            );
        }
        Command::Audit => {
            let report = engine.integrity_audit().await;
            println!(
                "{}",
                serde_json::to_string_pretty(&report).into_diagnostic()?
            );
            if !report.is_clean() {
                return Err(miette::miette!(
                    code = "rxflow::security",
                    "SECURITY ALERT: {} prescription(s) and {} transaction(s) failed verification",
                    report.tampered_prescriptions.len(),
                    report.tampered_transactions.len()
                ));
            }
        }
    }

    Ok(())
}

#[cfg(feature = "storage-rocksdb")]
fn open_stores(config: &Config, db_path: Option<PathBuf>) -> Result<Stores> {
    use rxflow::infrastructure::rocksdb::RocksDBStore;

    match db_path {
        Some(db_path) => Ok(Stores::uniform(RocksDBStore::open(db_path)?)),
        None => Ok(csv_file::open_stores(&config.data_dir)?),
    }
}

#[cfg(not(feature = "storage-rocksdb"))]
fn open_stores(config: &Config, db_path: Option<PathBuf>) -> Result<Stores> {
    if db_path.is_some() {
        eprintln!(
            "WARNING: Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to CSV file storage."
        );
    }
    Ok(csv_file::open_stores(&config.data_dir)?)
}
