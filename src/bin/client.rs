//! # Client Binary Entry Point
//!
//! Command-line front end of the analysis client.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin client -- --config config/client.toml analyze boite.jpg plaquette.png
//! ```
//!
//! Against a storage-enabled backend, with metrics:
//! ```bash
//! cargo run --bin client -- --base-url http://127.0.0.1:8000 --session pharmacie-nord \
//!   --metrics-output ./metrics/run.json \
//!   analyze ./photos/*.jpg
//! cargo run --bin client -- --base-url http://127.0.0.1:8000 --session pharmacie-nord \
//!   export --output stock.csv
//! ```
//!
//! Each file given to `analyze` is uploaded in its own independent request;
//! requests run concurrently and results are printed as they complete.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use log::info;
use std::path::PathBuf;
use std::time::Instant;
use tokio::task::JoinSet;

use pharmstock_client::client::{AnalysisClient, ClientMetrics, ImageFile};
use pharmstock_client::common::config::{load_config, ClientConfig};
use pharmstock_client::common::logging::init_logger;
use pharmstock_client::common::messages::{AnalysisResponse, MedicationInfo, DEFAULT_SESSION_ID};

/// Command-line arguments for the client binary
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the client configuration file (TOML format)
    ///
    /// Example: config/client.toml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Backend base URL, overrides the configuration file
    #[arg(long, env = "PHARMSTOCK_API_URL")]
    base_url: Option<String>,

    /// Backend storage session
    #[arg(long, global = true)]
    session: Option<String>,

    /// Path to write metrics JSON output (optional)
    #[arg(long, global = true)]
    metrics_output: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload images for analysis
    Analyze {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Print the raw JSON responses
        #[arg(long)]
        json: bool,
    },
    /// Check that the backend is up
    Health,
    /// List the medications stored in the session
    List,
    /// Remove every medication stored in the session
    Clear,
    /// Download the session as CSV
    Export {
        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Outcome of one file: its name, how long it took and the result.
type FileOutcome = (String, std::time::Duration, Result<AnalysisResponse, String>);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logger();

    let args = Args::parse();

    let config: Option<ClientConfig> = match &args.config {
        Some(path) => Some(load_config(path)?),
        None => None,
    };
    let client_name = config
        .as_ref()
        .map(|c| c.client.name.clone())
        .unwrap_or_else(|| "PharmStock-CLI".to_string());
    let base_url = args
        .base_url
        .clone()
        .or_else(|| config.as_ref().map(|c| c.api.base_url.clone()))
        .context("no backend URL: pass --base-url, set PHARMSTOCK_API_URL or use --config")?;

    let client = AnalysisClient::new(&base_url)?;
    info!("🔗 {} using backend {}", client_name, client.base_url());

    let session = args.session.as_deref().unwrap_or(DEFAULT_SESSION_ID);

    match args.command {
        Command::Analyze { files, json } => {
            let mut metrics = ClientMetrics::new(client_name);
            let failures = analyze_files(&client, files, args.session.clone(), json, &mut metrics)
                .await?;

            if let Some(output_path) = &args.metrics_output {
                metrics.export_to_json(output_path)?;
                println!("Metrics exported to: {}", output_path.display());
            }
            if failures > 0 {
                bail!("{} analysis(es) failed", failures);
            }
        }
        Command::Health => {
            let health = client.health().await?;
            println!(
                "{} (gemini: {}, {})",
                health.status,
                if health.gemini_available { "yes" } else { "no" },
                health.timestamp
            );
        }
        Command::List => {
            let storage = client.list_medications(session).await?;
            println!(
                "Session '{}': {} medication(s), {} unit(s)",
                session, storage.total_count, storage.total_units
            );
            for stored in &storage.medications {
                println!("{}", format_medication(&stored.info));
            }
        }
        Command::Clear => {
            let cleared = client.clear_medications(session).await?;
            println!("{} ({} remaining)", cleared.message, cleared.remaining);
        }
        Command::Export { output } => {
            let csv = client.export_medications_csv(session).await?;
            match output {
                Some(path) => {
                    tokio::fs::write(&path, csv).await?;
                    println!("Exported to: {}", path.display());
                }
                None => print!("{}", csv),
            }
        }
    }

    Ok(())
}

/// Analyze every file concurrently, print each result, return the failure count.
async fn analyze_files(
    client: &AnalysisClient,
    files: Vec<PathBuf>,
    session: Option<String>,
    json: bool,
    metrics: &mut ClientMetrics,
) -> anyhow::Result<usize> {
    let mut tasks: JoinSet<FileOutcome> = JoinSet::new();

    for path in files {
        let client = client.clone();
        let session = session.clone();
        tasks.spawn(async move {
            let started = Instant::now();
            let name = path.display().to_string();
            let result = match ImageFile::from_path(&path).await {
                Ok(image) => {
                    let analysis = match session {
                        Some(session) => {
                            client.analyze_medication_in_session(image, &session).await
                        }
                        None => client.analyze_medication(image).await,
                    };
                    analysis.map_err(|e| e.to_string())
                }
                Err(e) => Err(e.to_string()),
            };
            (name, started.elapsed(), result)
        });
    }

    let mut failures = 0;
    while let Some(joined) = tasks.join_next().await {
        let (name, elapsed, result) = joined?;
        match result {
            Ok(response) => {
                metrics.record_success(&name, elapsed, response.medications.len());
                print_response(&name, &response, json)?;
            }
            Err(message) => {
                failures += 1;
                metrics.record_failure(&name, elapsed, &message);
                println!("❌ {}: {}", name, message);
            }
        }
    }

    Ok(failures)
}

fn print_response(name: &str, response: &AnalysisResponse, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(response)?);
        return Ok(());
    }

    println!(
        "✅ {}: {} medication(s). {}",
        name,
        response.medications.len(),
        response.message
    );
    for med in &response.medications {
        println!("{}", format_medication(med));
    }
    Ok(())
}

fn format_medication(med: &MedicationInfo) -> String {
    format!(
        "  - {} | {} | exp. {} | lot {} | {} unit(s) | {:.0}%",
        med.name,
        med.manufacturer,
        med.expiration_date,
        med.lot_number,
        med.unit_count,
        med.confidence * 100.0
    )
}
