//! Key-value store inspection commands.

use anyhow::Result;
use colored::Colorize;

use claimguard_core::KeyValueStore;

use super::Host;
use crate::cli::{StoreAction, StoreCommand};

pub async fn execute(cmd: StoreCommand, host: &Host) -> Result<()> {
    match cmd.action {
        StoreAction::Get { key } => match host.store.get(&key).await? {
            Some(value) => println!("{}", value),
            None => println!("{}", format!("{} is not set", key).yellow()),
        },
        StoreAction::Set { key, value } => {
            host.store.set(&key, &value).await?;
            println!("{} {}", "✓ Set".green(), key);
        }
        StoreAction::Delete { key } => {
            host.store.delete(&key).await?;
            println!("{} {}", "✓ Deleted".green(), key);
        }
        StoreAction::List => {
            let entries = host.store.entries().await?;
            if entries.is_empty() {
                println!("{}", "Store is empty".dimmed());
            }
            let registry = host.manager.registry();
            for (key, value) in entries {
                let label = if registry.is_session_key(&key) {
                    "session".cyan()
                } else {
                    "other".dimmed()
                };
                println!("  [{}] {} = {}", label, key, value);
            }
        }
    }
    Ok(())
}
