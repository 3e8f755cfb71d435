//! # Server Binary Entry Point
//!
//! Runs the stand-in PharmStock backend (test mode, in-memory storage).
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin server -- --config config/server.toml
//! cargo run --bin server -- --address 0.0.0.0:8000
//! ```

use clap::Parser;

use pharmstock_client::common::config::{load_config, ServerConfig, ServerInfo};
use pharmstock_client::common::logging::init_logger;
use pharmstock_client::server;

/// Command-line arguments for the server binary
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the server configuration file (TOML format)
    ///
    /// Example: config/server.toml
    #[arg(short, long, required_unless_present = "address")]
    config: Option<String>,

    /// Address to listen on, overrides the configuration file
    #[arg(short, long)]
    address: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logger();

    let args = Args::parse();

    let mut config: ServerConfig = match &args.config {
        Some(path) => load_config(path)?,
        None => ServerConfig {
            server: ServerInfo {
                address: String::new(),
            },
        },
    };
    if let Some(address) = args.address {
        config.server.address = address;
    }

    server::run(config).await
}
