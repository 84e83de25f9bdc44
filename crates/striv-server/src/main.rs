//! Binary entrypoint for the striv HTTP server.
//!
//! The store backend is chosen with `--store-type` (sqlite, postgres or
//! mysql) and configured with `--store-config`, a JSON object of
//! backend-specific parameters. Store construction failures abort startup.

use std::process;

use clap::Parser;
use serde_json::Value;
use tracing::Level;

use striv_server::router::build_router;
use striv_server::state::AppState;
use striv_store::StoreConfig;

/// striv control plane server.
#[derive(Parser)]
#[command(name = "striv-server", about = "striv control plane server")]
struct Args {
    /// One of sqlite, postgres or mysql.
    #[arg(long, default_value = "sqlite")]
    store_type: String,

    /// JSON object with store parameters (default: a SQLite file in the
    /// system temp directory).
    #[arg(long)]
    store_config: Option<String>,

    /// One of trace, debug, info, warn or error.
    #[arg(long, default_value = "warn")]
    log_level: Level,

    #[arg(long, default_value = "localhost")]
    host: String,

    #[arg(long, default_value_t = 8080)]
    port: u16,
}

fn default_store_config() -> String {
    let path = std::env::temp_dir().join("striv-state.db");
    serde_json::json!({ "path": path.to_string_lossy() }).to_string()
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(args.log_level)
        .init();

    let raw_config = args.store_config.unwrap_or_else(default_store_config);
    let params: Value = match serde_json::from_str(&raw_config) {
        Ok(params) => params,
        Err(err) => {
            eprintln!("Error: --store-config is not valid JSON: {}", err);
            process::exit(2);
        }
    };
    let config = match StoreConfig::from_parts(&args.store_type, params) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Error: {}", err);
            process::exit(2);
        }
    };

    let state = match AppState::open(&config) {
        Ok(state) => state,
        Err(err) => {
            eprintln!("Error: failed to open {} store: {}", config.backend_name(), err);
            process::exit(1);
        }
    };

    let app = build_router(state);

    let addr = format!("{}:{}", args.host, args.port);
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err) => {
            eprintln!("Error: failed to bind {}: {}", addr, err);
            process::exit(1);
        }
    };
    tracing::info!("striv server listening on {}", addr);

    if let Err(err) = axum::serve(listener, app).await {
        eprintln!("Error: server failed: {}", err);
        process::exit(1);
    }
}
