//! claimguard-core - Session lifecycle core for the claims client
//!
//! This crate enforces the background-timeout policy of the mobile claims
//! client, independent of any UI toolkit:
//!
//! - **session**: Session lifecycle manager (foreground/background state machine)
//! - **storage**: Durable key-value store abstraction and backends
//! - **keys**: Registry of session-scoped and remembered-credential keys
//! - **navigation**: Navigation command issued on forced logout
//! - **clock**: Injectable time source
//! - **config**: Session timeout configuration

pub mod clock;
pub mod config;
pub mod error;
pub mod keys;
pub mod navigation;
pub mod session;
pub mod storage;
pub mod time;

// Re-export commonly used types
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::SessionConfig;
pub use error::{Error, Result};
pub use keys::SessionKeyRegistry;
pub use navigation::Navigator;
pub use session::{AppState, SessionLifecycleManager, SessionPhase, TransitionOutcome};
pub use storage::{FileStore, KeyValueStore, MemoryStore};
