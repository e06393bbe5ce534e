//! Long-running host loop fed from stdin.
//!
//! Mirrors the client bootstrap: startup check first, then subscribe to
//! lifecycle transitions until the input ends.

use anyhow::{bail, Context, Result};
use colored::Colorize;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use claimguard_core::AppState;

use super::Host;

/// A parsed stdin line.
#[derive(Debug, PartialEq, Eq)]
enum WatchInput {
    State(AppState),
    Timeout(Duration),
    Quit,
    Skip,
}

fn parse_line(line: &str) -> std::result::Result<WatchInput, String> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(WatchInput::Skip);
    }

    let mut parts = line.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some("quit" | "exit"), None, None) => Ok(WatchInput::Quit),
        (Some("timeout"), Some(secs), None) => secs
            .parse::<u64>()
            .map(|s| WatchInput::Timeout(Duration::from_secs(s)))
            .map_err(|_| format!("Invalid timeout: {}", secs)),
        (Some(word), None, None) => word
            .parse::<AppState>()
            .map(WatchInput::State)
            .map_err(|e| e.to_string()),
        _ => Err(format!("Unrecognized input: {}", line)),
    }
}

pub async fn execute(host: &Host) -> Result<()> {
    if host.manager.check_session_on_app_start().await {
        println!("{}", "✓ Session valid, continuing to home".green());
    } else {
        println!("{}", "✗ Session expired while app was closed".red());
    }

    let (tx, rx) = mpsc::channel(32);
    if !host.manager.initialize(rx) {
        bail!("Lifecycle subscription already active");
    }
    let usage = "active | background | inactive | timeout <secs> | quit";
    println!("{}", format!("Listening for transitions ({})", usage).dimmed());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        match parse_line(&line) {
            Ok(WatchInput::State(state)) => {
                tx.send(state)
                    .await
                    .context("Lifecycle subscription closed unexpectedly")?;
            }
            Ok(WatchInput::Timeout(timeout)) => {
                if let Err(e) = host.manager.set_session_timeout(timeout) {
                    eprintln!("{}", e.to_string().red());
                }
            }
            Ok(WatchInput::Quit) => break,
            Ok(WatchInput::Skip) => {}
            Err(message) => eprintln!("{}", message.red()),
        }
    }

    // Let queued transitions finish before exiting
    drop(tx);
    host.manager.closed().await;
    host.manager.destroy();

    Ok(())
}
