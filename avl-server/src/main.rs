//! avl-server: multi-protocol TCP ingest daemon for GPS trackers.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod server;
mod session;
mod sink;

use config::Config;
use server::GpsServer;
use sink::SqliteSink;

#[derive(Parser)]
#[command(name = "avl", version, about = "GPS tracker ingest server")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the ingest server until SIGINT/SIGTERM, then drain
    Run {
        /// Path to the JSON configuration file
        #[arg(short, long, default_value = "config.json", env = "AVL_CONFIG")]
        config: PathBuf,
    },

    /// Show record counts for a sink database
    Stats {
        /// SQLite database path
        #[arg(long, default_value = "data/records.db")]
        db_path: String,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run { config } => cmd_run(config).await,
        Commands::Stats { db_path } => cmd_stats(&db_path),
    }
}

async fn cmd_run(config_path: PathBuf) {
    let config = Config::load(&config_path).unwrap_or_else(|e| {
        error!(error = %e, "configuration load failed");
        std::process::exit(1);
    });

    let sink = Arc::new(SqliteSink::open(&config.sink.path).unwrap_or_else(|e| {
        error!(path = %config.sink.path, error = %e, "cannot open sink database");
        std::process::exit(1);
    }));

    let mut servers = Vec::new();
    for entry in config.enabled_protocols() {
        let mut server = GpsServer::new(entry.name, sink.clone());
        if let Err(e) = server.start(&config.host, entry.port).await {
            // A bind failure aborts the whole process
            error!(protocol = %entry.name, port = entry.port, error = %e, "bind failed");
            std::process::exit(1);
        }
        servers.push(server);
    }

    if servers.is_empty() {
        warn!("no protocols enabled in configuration, nothing to do");
        return;
    }
    info!(listeners = servers.len(), "all servers started");

    shutdown_signal().await;
    info!("shutdown signal received, draining connections");

    for server in &servers {
        server.stop().await;
    }
    info!("all servers stopped");
}

fn cmd_stats(db_path: &str) {
    let sink = SqliteSink::open(db_path).unwrap_or_else(|e| {
        error!(path = %db_path, error = %e, "cannot open sink database");
        std::process::exit(1);
    });
    let stats = sink.stats().unwrap_or_else(|e| {
        error!(error = %e, "stats query failed");
        std::process::exit(1);
    });

    println!();
    println!("Database: {db_path}");
    println!();
    println!("  Records:  {}", stats.records);
    println!("  Valid:    {}", stats.valid);
    println!("  Devices:  {}", stats.devices);
    match stats.last_gpstime {
        Some(ts) => println!("  Last fix: {ts} (epoch)"),
        None => println!("  Last fix: -"),
    }
    println!();
}

/// Resolve on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "cannot install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
