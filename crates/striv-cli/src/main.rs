//! striv command-line utility.
//!
//! Provides the `striv` binary for moving configuration state in and out of
//! a running striv server. `load-state` replaces the dimensions and
//! executions present in a JSON file; `dump-state` prints the current ones
//! in the same shape, so a dump can be edited and loaded back.

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use serde_json::Value;

/// striv control plane tools.
#[derive(Parser)]
#[command(name = "striv", about = "striv control plane tools")]
struct Cli {
    /// Base URL of the striv server.
    #[arg(long, default_value = "http://localhost:8080")]
    striv_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replace server state with the contents of a JSON file.
    LoadState {
        /// State file, as produced by `dump-state`.
        file: PathBuf,
    },
    /// Print the server's dimensions and executions as JSON.
    DumpState,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let base = cli.striv_url.trim_end_matches('/');

    let exit_code = match cli.command {
        Commands::LoadState { file } => run_load_state(base, &file).await,
        Commands::DumpState => run_dump_state(base).await,
    };
    process::exit(exit_code);
}

/// Execute the load-state subcommand.
///
/// Returns exit code: 0 = success, 1 = request failed or was rejected,
/// 3 = the file could not be read.
async fn run_load_state(base: &str, file: &Path) -> i32 {
    let contents = match std::fs::read_to_string(file) {
        Ok(contents) => contents,
        Err(e) => {
            eprintln!("Error: failed to read '{}': {}", file.display(), e);
            return 3;
        }
    };
    let state: Value = match serde_json::from_str(&contents) {
        Ok(state) => state,
        Err(e) => {
            eprintln!("Error: '{}' is not valid JSON: {}", file.display(), e);
            return 3;
        }
    };

    let request = reqwest::Client::new()
        .post(format!("{base}/state"))
        .json(&state);
    match send(request).await {
        Ok(changes) => {
            print_changes(&changes);
            0
        }
        Err(msg) => {
            eprintln!("Error: {}", msg);
            1
        }
    }
}

/// Execute the dump-state subcommand.
async fn run_dump_state(base: &str) -> i32 {
    let request = reqwest::Client::new().get(format!("{base}/state"));
    match send(request).await {
        Ok(state) => {
            let json = serde_json::to_string_pretty(&state)
                .unwrap_or_else(|e| format!("{{\"error\": \"failed to serialize state: {}\"}}", e));
            println!("{}", json);
            0
        }
        Err(msg) => {
            eprintln!("Error: {}", msg);
            1
        }
    }
}

/// Sends `request` and decodes a JSON body. Non-2xx responses become an
/// error carrying the status and the response text.
async fn send(request: reqwest::RequestBuilder) -> Result<Value, String> {
    let response = request
        .send()
        .await
        .map_err(|e| format!("request failed: {}", e))?;
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| format!("failed to read response: {}", e))?;
    if !status.is_success() {
        return Err(format!("server returned {}: {}", status, text));
    }
    serde_json::from_str(&text).map_err(|e| format!("invalid response body: {}", e))
}

/// Prints one `type: deleted N, inserted M` line per replaced type.
fn print_changes(changes: &Value) {
    let Some(changes) = changes.as_object() else {
        println!("{}", changes);
        return;
    };
    for (typ, counts) in changes {
        println!(
            "{}: deleted {}, inserted {}",
            typ,
            counts["deleted"].as_u64().unwrap_or(0),
            counts["inserted"].as_u64().unwrap_or(0)
        );
    }
}
