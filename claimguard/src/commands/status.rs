//! Session status command.

use anyhow::Result;
use chrono::{DateTime, Utc};
use colored::Colorize;
use serde::Serialize;

use claimguard_core::time::format_datetime;

use super::Host;

#[derive(Debug, Serialize)]
struct StatusReport {
    store: String,
    timeout_secs: u64,
    now: DateTime<Utc>,
    background_marker: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    marker_error: Option<String>,
    background_elapsed_ms: Option<i64>,
    would_expire: bool,
    session_keys_present: Vec<String>,
    remembered_keys_present: Vec<String>,
}

async fn collect(host: &Host) -> Result<StatusReport> {
    let now = host.clock.now();
    let timeout = host.manager.timeout();
    // A bad marker is reported, not fatal: the startup check discards it
    let (marker, marker_error) = match host.manager.persisted_marker().await {
        Ok(marker) => (marker, None),
        Err(e) => (None, Some(e.to_string())),
    };
    let elapsed_ms = marker.map(|since| (now - since).num_milliseconds());
    let would_expire = elapsed_ms.is_some_and(|ms| ms > timeout.as_millis() as i64);

    let entries = host.store.entries().await?;
    let registry = host.manager.registry();
    let session_keys_present = registry
        .session_keys()?
        .into_iter()
        .filter(|k| entries.contains_key(k))
        .collect();
    let remembered_keys_present = registry
        .remembered_keys()?
        .into_iter()
        .filter(|k| entries.contains_key(k))
        .collect();

    Ok(StatusReport {
        store: host.store.path().display().to_string(),
        timeout_secs: timeout.as_secs(),
        now,
        background_marker: marker,
        marker_error,
        background_elapsed_ms: elapsed_ms,
        would_expire,
        session_keys_present,
        remembered_keys_present,
    })
}

pub async fn execute(host: &Host, json: bool) -> Result<()> {
    let report = collect(host).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("{}", "Session Status".cyan().bold());
    println!("{}", "─".repeat(50));
    println!("  Store:   {}", report.store);
    println!("  Timeout: {}s", report.timeout_secs);

    match (report.background_marker, report.background_elapsed_ms) {
        (Some(since), Some(ms)) => {
            println!("  Backgrounded at: {}", format_datetime(&since));
            let line = format!("  In background for {}ms", ms);
            if report.would_expire {
                println!("{} {}", line.red(), "(expired)".red().bold());
            } else {
                println!("{}", line.green());
            }
        }
        _ => match &report.marker_error {
            Some(e) => println!("  {}", format!("Unreadable background marker ({})", e).yellow()),
            None => println!("  {}", "No background marker".green()),
        },
    }

    println!();
    println!("  Session keys ({}):", report.session_keys_present.len());
    for key in &report.session_keys_present {
        println!("    {}", key);
    }
    println!("  Remembered keys ({}):", report.remembered_keys_present.len());
    for key in &report.remembered_keys_present {
        println!("    {}", key.dimmed());
    }

    Ok(())
}
