//! CLI entry point for tokenlink.
//!
//! Downloads the contact log from a token and prints the contact IDs.
//!
//! # Usage
//!
//! ```bash
//! DEV_PATH=/dev/ttyACM0 tokenlink
//! tokenlink --device /dev/ttyACM0 --timeout 30 --json
//! ```

use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use serde::Serialize;
use tokenlink::core::constants::DEFAULT_BAUD_RATE;
use tokenlink::core::contact_ids;
use tokenlink::host::start_session;
use tokenlink::{BlockMap, DeviceId};
use tokio::sync::oneshot;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tokenlink")]
#[command(about = "Download the contact log from a contact-tracing token", long_about = None)]
struct Cli {
    /// Serial device the token shows up as
    #[arg(long, env = "DEV_PATH")]
    device: String,

    /// Serial baud rate
    #[arg(long, default_value_t = DEFAULT_BAUD_RATE)]
    baud: u32,

    /// Seconds to wait before stopping and reporting a partial log
    #[arg(long, default_value_t = 60)]
    timeout: u64,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct Report {
    device_id: DeviceId,
    blocks: usize,
    contacts: Vec<u64>,
}

impl Report {
    fn new(device_id: DeviceId, blocks: &BlockMap) -> Self {
        Self {
            device_id,
            blocks: blocks.len(),
            contacts: contact_ids(blocks),
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let (tx, mut rx) = oneshot::channel();

    let session = start_session(&cli.device, cli.baud, move |device_id, blocks| {
        let _ = tx.send(Report::new(device_id, &blocks));
    })
    .with_context(|| format!("failed to start session on {}", cli.device))?;
    info!(device = %cli.device, "waiting for token");

    let first = tokio::time::timeout(Duration::from_secs(cli.timeout), &mut rx).await;
    if first.is_err() {
        warn!(seconds = cli.timeout, "timed out, stopping");
    }
    session.stop().await;

    let report = match first {
        Ok(result) => result.ok(),
        Err(_) => rx.await.ok(),
    };
    let Some(report) = report else {
        bail!("no token answered on {}", cli.device);
    };

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("device {}", report.device_id);
        for id in &report.contacts {
            println!("{id}");
        }
    }
    Ok(())
}
