//! Startup check, single transitions and logout.

use anyhow::Result;
use colored::Colorize;

use claimguard_core::session::LogoutReport;
use claimguard_core::{AppState, TransitionOutcome};

use super::Host;

pub async fn start(host: &Host) -> Result<()> {
    if host.manager.check_session_on_app_start().await {
        println!("{}", "✓ Session valid, continuing to home".green());
    } else {
        println!("{}", "✗ Session expired while app was closed".red());
    }
    Ok(())
}

pub async fn event(host: &Host, state: AppState) -> Result<()> {
    let outcome = host.manager.on_state_change(state).await;

    match outcome {
        TransitionOutcome::Backgrounded { at } => {
            println!("{} at {}", "App backgrounded".cyan(), at.timestamp_millis());
        }
        TransitionOutcome::AlreadyBackgrounded { since } => {
            println!(
                "{} (since {})",
                "Already backgrounded, keeping first capture".yellow(),
                since.timestamp_millis()
            );
        }
        TransitionOutcome::Resumed { elapsed } => {
            println!("{} after {}ms", "✓ Resumed".green(), elapsed.as_millis());
        }
        TransitionOutcome::Expired { elapsed } => {
            println!("{} after {}ms", "✗ Session expired".red(), elapsed.as_millis());
        }
        TransitionOutcome::Checked { valid: true } => {
            println!("{}", "✓ Session valid".green());
        }
        TransitionOutcome::Checked { valid: false } => {
            println!("{}", "✗ Session expired while app was closed".red());
        }
    }

    Ok(())
}

pub async fn logout(host: &Host) -> Result<()> {
    let report = host.manager.logout().await;
    print_report(&report);
    Ok(())
}

fn print_report(report: &LogoutReport) {
    println!("{}", "Session purged".cyan().bold());
    println!("  Removed: {} keys", report.removed.len());
    if !report.is_complete() {
        println!("  {}", "Failed:".red());
        for (key, error) in &report.failed {
            println!("    {} ({})", key, error);
        }
    }
}
