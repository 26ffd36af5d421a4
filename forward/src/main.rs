use std::{error::Error, path::PathBuf};

use clap::Parser;
use relaymail_core::{load_config, Forwarder};
use tokio::io::AsyncReadExt;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(long, env = "RELAYMAIL_CONFIG", default_value = "config.toml")]
    config: PathBuf,

    /// Event JSON file, read from stdin when absent
    event: Option<PathBuf>,

    /// Log level
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,
}

fn setup_logging(level: &str) {
    let filter = match level.to_lowercase().as_str() {
        "trace" => "trace",
        "debug" => "debug",
        "info" => "info",
        "warn" => "warn",
        "error" => "error",
        _ => "info",
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn read_event(path: Option<&PathBuf>) -> std::io::Result<String> {
    match path {
        Some(path) => tokio::fs::read_to_string(path).await,
        None => {
            let mut payload = String::new();
            tokio::io::stdin().read_to_string(&mut payload).await?;
            Ok(payload)
        }
    }
}

/// Completes on Ctrl-C, never completes if the signal cannot be watched.
async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// Forwards the message referenced by a single event.
///
/// The confirmation goes to stdout, a failure makes the process exit with
/// a non-zero status.
#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    setup_logging(&args.log_level);

    let config = load_config(&args.config)?;
    info!(path = %args.config.display(), "Configuration loaded");

    let forwarder = Forwarder::from_config(&config)?;
    let payload = read_event(args.event.as_ref()).await?;

    match forwarder.handle_event_until(&payload, shutdown_signal()).await {
        Ok(confirmation) => {
            info!("{confirmation}");
            println!("{confirmation}");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Forwarding failed");
            Err(e.into())
        }
    }
}
