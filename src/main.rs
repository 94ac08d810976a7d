//! CartGuard server binary
//!
//! Runs the analysis backend as an HTTP server for the browser extension.

use std::process;

use clap::Parser;
use tracing::{error, info};

use cartguard::config::{Credentials, ServerConfig};
use cartguard::server::CartGuardServer;

const DEFAULT_PORT: u16 = 8000;

#[derive(Parser)]
#[command(name = "cartguard-server")]
#[command(about = "CartGuard analysis backend")]
#[command(version)]
struct Args {
    /// Host to bind to
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Disable CORS (the extension needs it enabled)
    #[arg(long)]
    no_cors: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    // API keys come from the environment; .env is a convenience for dev
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    let config = ServerConfig {
        host: args.host,
        port: args.port,
        enable_cors: !args.no_cors,
        log_level: if args.verbose {
            "debug".to_string()
        } else {
            "info".to_string()
        },
    };

    tracing_subscriber::fmt()
        .with_env_filter(config.env_filter())
        .init();

    print_banner();

    let credentials = Credentials::from_env();
    credentials.warn_missing();

    info!("Starting CartGuard on {}:{}", config.host, config.port);

    let server = CartGuardServer::new(config, credentials);
    if let Err(e) = server.start().await {
        error!("Server failed: {}", e);
        process::exit(1);
    }
}

fn print_banner() {
    println!(
        r#"
   ____           _    ____                     _
  / ___|__ _ _ __| |_ / ___|_   _  __ _ _ __ __| |
 | |   / _` | '__| __| |  _| | | |/ _` | '__/ _` |
 | |__| (_| | |  | |_| |_| | |_| | (_| | | | (_| |
  \____\__,_|_|   \__|\____|\__,_|\__,_|_|  \__,_|

  Marketplace scam radar for your browser
"#
    );
}
