//! Session lifecycle management for the claims client.
//!
//! Enforces the background-timeout policy: a session left in the background
//! longer than the configured timeout is purged before any screen can read
//! its data again.
//!
//! ## Lifecycle
//!
//! ```text
//! Process Start
//!   │
//!   └─► check_session_on_app_start()
//!         ├─► no marker            → valid
//!         ├─► marker, not expired  → delete marker, valid
//!         └─► marker, expired      → logout, navigate to login
//!
//! Active ──background/inactive──► Backgrounded
//!   │                                │
//!   │                                ├─► capture T_bg (first capture wins)
//!   │                                └─► persist app_background_time
//!   │
//! Backgrounded ──active──► Active
//!   │
//!   ├─► elapsed > timeout → logout (purge keys, then navigate)
//!   └─► clear in-memory and persisted marker
//! ```
//!
//! Logout is an action, not a state: after it the machine stays `Active`
//! with the session-scoped keys simply absent.

mod lifecycle;

pub use lifecycle::*;
