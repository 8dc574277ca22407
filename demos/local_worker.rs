//! In-process worker.
//!
//! Demonstrates:
//! - Registering a `WorkerScript` on the host
//! - Spawning it by relative URL in local mode
//! - Script errors reaching `onerror`
//!
//! Usage:
//!   cargo run --example local_worker
//!   cargo run --example local_worker -- --debug

mod common;

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use async_trait::async_trait;
use common::Args;
use remote_workers::{Error, Result, Value, WorkerHost, WorkerScope, WorkerScript};

// ============================================================================
// Script
// ============================================================================

/// Doubles numbers, rejects everything else.
struct Doubler;

#[async_trait]
impl WorkerScript for Doubler {
    async fn on_message(&self, message: Value, scope: &WorkerScope) -> Result<()> {
        let n = message
            .as_f64()
            .ok_or_else(|| Error::config(format!("expected a number, got {message:?}")))?;
        scope.post_message(&Value::from(n * 2.0))
    }
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    let args = Args::parse();
    common::init_logging(args.debug);

    if let Err(e) = run().await {
        eprintln!("\n[ERROR] {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    println!("=== Local worker ===\n");

    let host = WorkerHost::builder()
        .local()
        .script("doubler.js", Doubler)
        .build()?;

    let worker = host.spawn("doubler.js")?;
    worker.set_onmessage(|value| println!("    <- {value:?}"));
    worker.set_onerror(|value| println!("    <- error {value:?}"));
    worker.ready().await?;

    for n in [1, 21, 50] {
        worker.send(&Value::from(n)).await?;
    }
    worker.send(&Value::from("not a number")).await?;

    tokio::time::sleep(Duration::from_millis(100)).await;
    worker.terminate().await;
    println!("\n    ✓ Done");
    Ok(())
}
