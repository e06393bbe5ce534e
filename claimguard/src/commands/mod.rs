//! Command implementations for claimguard CLI.
//!
//! Each submodule implements the logic for a command group.

pub mod lifecycle;
pub mod status;
pub mod store;
pub mod watch;

use anyhow::{anyhow, Result};
use colored::Colorize;
use std::sync::Arc;
use tracing::debug;

use claimguard_core::{Clock, FileStore, ManualClock, SessionLifecycleManager, SystemClock};

use crate::cli::GlobalArgs;
use crate::config::Config;

/// One simulated host process: a fresh manager over the shared file store.
pub struct Host {
    pub manager: Arc<SessionLifecycleManager>,
    pub store: Arc<FileStore>,
    pub clock: Arc<dyn Clock>,
}

impl Host {
    pub fn build(config: &Config, args: &GlobalArgs) -> Result<Self> {
        let store = Arc::new(FileStore::new(&config.storage.path));
        debug!(
            "Using store {} with {}s timeout",
            config.storage.path.display(),
            config.session.timeout_secs
        );

        let clock: Arc<dyn Clock> = match args.at {
            Some(millis) => Arc::new(
                ManualClock::at_millis(millis)
                    .ok_or_else(|| anyhow!("--at {} is outside the supported time range", millis))?,
            ),
            None => Arc::new(SystemClock),
        };

        let navigator = Arc::new(|| {
            println!("{}", "→ Navigating to login".yellow().bold());
        });

        let manager =
            SessionLifecycleManager::new(config.session_config()?, store.clone(), navigator)
                .with_clock(clock.clone());

        Ok(Self {
            manager: Arc::new(manager),
            store,
            clock,
        })
    }
}
