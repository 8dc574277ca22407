//! Remote worker round trip.
//!
//! Demonstrates:
//! - Building a host against a coordinator
//! - Spawning a remote worker and waiting for readiness
//! - Sending values and receiving `message`/`error` events
//!
//! Usage:
//!   cargo run --example echo -- --worker https://app.example/echo.js
//!   cargo run --example echo -- --coordinator http://localhost:3000 --worker ... --debug

mod common;

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use common::Args;
use remote_workers::{Error, Result, Value, WorkerHost};
use url::Url;

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    let args = Args::parse();
    common::init_logging(args.debug);

    if let Err(e) = run(args).await {
        eprintln!("\n[ERROR] {e}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    println!("=== Remote echo ===\n");

    let worker_url = args
        .worker
        .ok_or_else(|| Error::config("--worker <url> is required"))?;

    let host = WorkerHost::builder()
        .remote(Url::parse(&args.coordinator)?)
        .connect_timeout(Duration::from_secs(10))
        .build()?;

    println!("[1] Spawning {worker_url}");
    let worker = host.spawn(&worker_url)?;
    worker.set_onmessage(|value| println!("    <- message {value:?}"));
    worker.set_onerror(|value| println!("    <- error {value:?}"));

    worker.ready().await?;
    println!("    ✓ Ready ({})", worker.id());

    println!("[2] Sending values");
    worker.send(&Value::from("hello")).await?;
    worker
        .send_serialize(&serde_json::json!({ "op": "sum", "args": [1, 2, 3] }))
        .await?;

    tokio::time::sleep(Duration::from_secs(2)).await;

    println!("[3] Terminating");
    host.close().await;
    println!("    ✓ Done");
    Ok(())
}
