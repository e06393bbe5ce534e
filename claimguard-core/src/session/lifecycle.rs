//! Foreground/background state machine with persisted background marker.
//!
//! Every transition runs under one async lock, so host events are evaluated
//! strictly in arrival order. No lifecycle method surfaces an error to the
//! host; storage failures are logged and degrade to "session valid".

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::keys::{SessionKeyRegistry, BACKGROUND_MARKER_KEY};
use crate::navigation::Navigator;
use crate::storage::KeyValueStore;
use crate::time::{from_marker, to_marker};

// ─────────────────────────────────────────────────────────────────────────────
// Host-facing types
// ─────────────────────────────────────────────────────────────────────────────

/// Application state reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppState {
    /// Foreground and interactive.
    Active,
    /// No longer visible.
    Background,
    /// Visible but not receiving input (app switcher, incoming call).
    Inactive,
}

impl AppState {
    pub fn is_active(self) -> bool {
        matches!(self, AppState::Active)
    }
}

impl fmt::Display for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppState::Active => write!(f, "active"),
            AppState::Background => write!(f, "background"),
            AppState::Inactive => write!(f, "inactive"),
        }
    }
}

impl FromStr for AppState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(AppState::Active),
            "background" => Ok(AppState::Background),
            "inactive" => Ok(AppState::Inactive),
            other => Err(Error::Other(format!("Unknown app state: {}", other))),
        }
    }
}

/// Phase of the session state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Active,
    Backgrounded,
}

/// What a single transition did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// Background timestamp captured and persisted.
    Backgrounded { at: DateTime<Utc> },
    /// Already backgrounded; the earlier capture stands.
    AlreadyBackgrounded { since: DateTime<Utc> },
    /// Returned to foreground within the timeout.
    Resumed { elapsed: Duration },
    /// Returned after the timeout; session purged and login requested.
    Expired { elapsed: Duration },
    /// Foreground without an in-memory capture; resolved from the persisted
    /// marker instead.
    Checked { valid: bool },
}

impl TransitionOutcome {
    /// Whether this transition ended the session.
    pub fn logged_out(&self) -> bool {
        matches!(
            self,
            TransitionOutcome::Expired { .. } | TransitionOutcome::Checked { valid: false }
        )
    }
}

/// Result of a logout purge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogoutReport {
    /// Keys deleted (or already absent).
    pub removed: Vec<String>,
    /// Keys whose deletion failed, with the error message.
    pub failed: Vec<(String, String)>,
}

impl LogoutReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Point-in-time view of the manager, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub phase: SessionPhase,
    pub backgrounded_at: Option<DateTime<Utc>>,
    pub timeout_secs: u64,
    pub last_activity: Option<DateTime<Utc>>,
    pub subscribed: bool,
}

// ─────────────────────────────────────────────────────────────────────────────
// Manager
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug)]
struct SessionState {
    phase: SessionPhase,
    backgrounded_at: Option<DateTime<Utc>>,
    /// Nothing has evaluated or written the persisted marker yet, so a marker
    /// found in the store was left by an earlier process.
    inherited_marker: bool,
}

struct Subscription {
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

/// Session lifecycle manager.
///
/// Constructed once at bootstrap and shared as `Arc<SessionLifecycleManager>`.
pub struct SessionLifecycleManager {
    store: Arc<dyn KeyValueStore>,
    navigator: Arc<dyn Navigator>,
    clock: Arc<dyn Clock>,
    registry: Arc<SessionKeyRegistry>,
    timeout: StdMutex<Duration>,
    last_activity: StdMutex<Option<DateTime<Utc>>>,
    state: Mutex<SessionState>,
    subscription: StdMutex<Option<Subscription>>,
}

impl SessionLifecycleManager {
    /// Create a manager using the wall clock and the default key registry.
    pub fn new(
        config: SessionConfig,
        store: Arc<dyn KeyValueStore>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            store,
            navigator,
            clock: Arc::new(SystemClock),
            registry: Arc::new(SessionKeyRegistry::with_defaults()),
            timeout: StdMutex::new(config.timeout),
            last_activity: StdMutex::new(None),
            state: Mutex::new(SessionState {
                phase: SessionPhase::Active,
                backgrounded_at: None,
                inherited_marker: true,
            }),
            subscription: StdMutex::new(None),
        }
    }

    /// Replace the time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the key registry (shared with components that persist
    /// session-scoped data).
    pub fn with_registry(mut self, registry: Arc<SessionKeyRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn registry(&self) -> &Arc<SessionKeyRegistry> {
        &self.registry
    }

    pub fn timeout(&self) -> Duration {
        *self.timeout.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Replace the timeout. Applies from the next evaluation; an already
    /// captured background timestamp is not re-evaluated.
    pub fn set_session_timeout(&self, timeout: Duration) -> Result<()> {
        let config = SessionConfig::new(timeout)?;
        *self.timeout.lock().unwrap_or_else(|e| e.into_inner()) = config.timeout;
        info!("Session timeout set to {}s", config.timeout.as_secs());
        Ok(())
    }

    /// Record user activity.
    ///
    /// Kept for hosts that track it; the timeout decision only looks at
    /// background duration.
    pub fn update_activity(&self) {
        let now = self.clock.now();
        *self.last_activity.lock().unwrap_or_else(|e| e.into_inner()) = Some(now);
    }

    pub fn last_activity(&self) -> Option<DateTime<Utc>> {
        *self.last_activity.lock().unwrap_or_else(|e| e.into_inner())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Subscription
    // ─────────────────────────────────────────────────────────────────────

    /// Subscribe to the host's lifecycle stream.
    ///
    /// Events are processed one at a time on a spawned task. Returns `false`
    /// without subscribing again if a subscription is already live. Must be
    /// called from within a tokio runtime.
    pub fn initialize(self: &Arc<Self>, mut events: mpsc::Receiver<AppState>) -> bool {
        let mut slot = self.subscription.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(existing) = slot.as_ref() {
            if !existing.task.is_finished() {
                warn!("Lifecycle subscription already active, ignoring initialize");
                return false;
            }
        }

        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        let manager = Arc::downgrade(self);

        let task = tokio::spawn(async move {
            loop {
                let next = tokio::select! {
                    biased;
                    _ = &mut shutdown_rx => break,
                    event = events.recv() => match event {
                        Some(state) => state,
                        None => break,
                    },
                };

                let Some(manager) = manager.upgrade() else {
                    break;
                };
                manager.on_state_change(next).await;
            }
            debug!("Lifecycle subscription closed");
        });

        *slot = Some(Subscription {
            shutdown: Some(shutdown_tx),
            task,
        });
        debug!("Lifecycle subscription started");
        true
    }

    /// Stop receiving lifecycle events.
    ///
    /// An evaluation already in progress runs to completion. Safe to call
    /// without `initialize()` and more than once.
    pub fn destroy(&self) {
        let taken = self
            .subscription
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();

        if let Some(mut subscription) = taken {
            if let Some(shutdown) = subscription.shutdown.take() {
                let _ = shutdown.send(());
            }
            debug!("Lifecycle subscription stopped");
        }
    }

    /// Wait until the lifecycle stream ends (all senders dropped) and every
    /// delivered event has been evaluated.
    pub async fn closed(&self) {
        let taken = self
            .subscription
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();

        if let Some(subscription) = taken {
            // Keep the shutdown sender alive so the loop drains the stream
            let _shutdown = subscription.shutdown;
            if let Err(e) = subscription.task.await {
                error!("Lifecycle subscription task failed: {}", e);
            }
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .is_some_and(|s| !s.task.is_finished())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Transitions
    // ─────────────────────────────────────────────────────────────────────

    /// Handle a host lifecycle transition.
    pub async fn on_state_change(&self, next: AppState) -> TransitionOutcome {
        let mut state = self.state.lock().await;
        let inherited = std::mem::replace(&mut state.inherited_marker, false);

        match (next.is_active(), state.backgrounded_at) {
            (false, Some(since)) => {
                debug!("{} while already backgrounded, keeping capture from {}", next, since);
                TransitionOutcome::AlreadyBackgrounded { since }
            }
            (false, None) => {
                // A capture left by an earlier process still governs
                if inherited {
                    if let Some(since) = self.inherited_capture().await {
                        state.backgrounded_at = Some(since);
                        state.phase = SessionPhase::Backgrounded;
                        debug!("{} with background marker from {}, keeping it", next, since);
                        return TransitionOutcome::AlreadyBackgrounded { since };
                    }
                }

                let now = self.clock.now();
                state.backgrounded_at = Some(now);
                state.phase = SessionPhase::Backgrounded;

                if let Err(e) = self.store.set(BACKGROUND_MARKER_KEY, &to_marker(&now)).await {
                    warn!("Failed to persist background marker: {}", e);
                }
                debug!("App moved to {} at {}", next, now);
                TransitionOutcome::Backgrounded { at: now }
            }
            (true, Some(since)) => {
                let elapsed = self.elapsed_since(since);
                let timeout = self.timeout();
                state.backgrounded_at = None;
                state.phase = SessionPhase::Active;

                if elapsed > timeout {
                    info!(
                        "Session expired after {}ms in background (timeout {}s)",
                        elapsed.as_millis(),
                        timeout.as_secs()
                    );
                    // Purge includes the marker
                    self.purge_and_navigate().await;
                    TransitionOutcome::Expired { elapsed }
                } else {
                    debug!("Resumed after {}ms in background", elapsed.as_millis());
                    self.clear_marker().await;
                    TransitionOutcome::Resumed { elapsed }
                }
            }
            (true, None) => {
                state.phase = SessionPhase::Active;
                let valid = self.evaluate_persisted_marker().await;
                TransitionOutcome::Checked { valid }
            }
        }
    }

    /// Startup check against the persisted marker.
    ///
    /// Returns `false` when the previous process was backgrounded longer than
    /// the timeout; the session has then been purged and login requested.
    /// Storage failures fail open (`true`).
    pub async fn check_session_on_app_start(&self) -> bool {
        let mut state = self.state.lock().await;
        state.inherited_marker = false;
        self.evaluate_persisted_marker().await
    }

    /// Purge every session-scoped key, then request navigation to login.
    ///
    /// Remembered-credential keys are left untouched.
    pub async fn logout(&self) -> LogoutReport {
        let mut state = self.state.lock().await;
        state.backgrounded_at = None;
        state.phase = SessionPhase::Active;
        state.inherited_marker = false;
        self.purge_and_navigate().await
    }

    /// Current state, for diagnostics.
    pub async fn snapshot(&self) -> SessionSnapshot {
        let state = self.state.lock().await;
        SessionSnapshot {
            phase: state.phase,
            backgrounded_at: state.backgrounded_at,
            timeout_secs: self.timeout().as_secs(),
            last_activity: self.last_activity(),
            subscribed: self.is_subscribed(),
        }
    }

    /// Read the persisted marker without consuming it.
    pub async fn persisted_marker(&self) -> Result<Option<DateTime<Utc>>> {
        match self.store.get(BACKGROUND_MARKER_KEY).await? {
            Some(value) => from_marker(&value).map(Some),
            None => Ok(None),
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Internals (caller holds the state lock)
    // ─────────────────────────────────────────────────────────────────────

    async fn evaluate_persisted_marker(&self) -> bool {
        let value = match self.store.get(BACKGROUND_MARKER_KEY).await {
            Ok(Some(value)) => value,
            Ok(None) => {
                debug!("No background marker, session valid");
                return true;
            }
            Err(e) => {
                warn!("Failed to read background marker, assuming session valid: {}", e);
                return true;
            }
        };

        let since = match from_marker(&value) {
            Ok(since) => since,
            Err(e) => {
                warn!("Discarding unreadable background marker: {}", e);
                self.clear_marker().await;
                return true;
            }
        };

        let elapsed = self.elapsed_since(since);
        let timeout = self.timeout();
        if elapsed > timeout {
            info!(
                "Session expired while app was closed ({}ms in background, timeout {}s)",
                elapsed.as_millis(),
                timeout.as_secs()
            );
            self.purge_and_navigate().await;
            false
        } else {
            debug!("Previous background lasted {}ms, session valid", elapsed.as_millis());
            self.clear_marker().await;
            true
        }
    }

    async fn inherited_capture(&self) -> Option<DateTime<Utc>> {
        match self.store.get(BACKGROUND_MARKER_KEY).await {
            Ok(Some(value)) => match from_marker(&value) {
                Ok(since) => Some(since),
                Err(e) => {
                    warn!("Ignoring unreadable background marker: {}", e);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!("Failed to read background marker, capturing now: {}", e);
                None
            }
        }
    }

    async fn purge_and_navigate(&self) -> LogoutReport {
        let keys = match self.registry.session_keys() {
            Ok(keys) => keys,
            Err(e) => {
                error!("Key registry unavailable, purging marker only: {}", e);
                vec![BACKGROUND_MARKER_KEY.to_string()]
            }
        };

        let mut tasks = JoinSet::new();
        for key in keys {
            let store = self.store.clone();
            tasks.spawn(async move {
                let result = store.delete(&key).await;
                (key, result)
            });
        }

        let mut report = LogoutReport::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((key, Ok(()))) => report.removed.push(key),
                Ok((key, Err(e))) => {
                    warn!("Failed to delete session key {}: {}", key, e);
                    report.failed.push((key, e.to_string()));
                }
                Err(e) => error!("Session key deletion task failed: {}", e),
            }
        }
        report.removed.sort();
        report.failed.sort();

        info!(
            removed = report.removed.len(),
            failed = report.failed.len(),
            "Session purged, navigating to login"
        );
        self.navigator.reset_to_login();
        report
    }

    async fn clear_marker(&self) {
        if let Err(e) = self.store.delete(BACKGROUND_MARKER_KEY).await {
            warn!("Failed to delete background marker: {}", e);
        }
    }

    fn elapsed_since(&self, since: DateTime<Utc>) -> Duration {
        // Clock moved backwards: treat as no time passed
        (self.clock.now() - since).to_std().unwrap_or(Duration::ZERO)
    }
}

impl Drop for SessionLifecycleManager {
    fn drop(&mut self) {
        self.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::keys::{
        AUTH_TOKEN, DEFAULT_REMEMBERED_KEYS, DEFAULT_SESSION_KEYS, REMEMBER_ME, SELECTED_POLICY_ID,
    };
    use crate::storage::MemoryStore;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Store wrapper with switchable failures and call counters.
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryStore,
        fail_get: AtomicBool,
        fail_set: AtomicBool,
        fail_delete: StdMutex<HashSet<String>>,
        writes: AtomicUsize,
    }

    impl FlakyStore {
        fn failing_delete(&self, key: &str) {
            self.fail_delete.lock().unwrap().insert(key.to_string());
        }
    }

    #[async_trait]
    impl KeyValueStore for FlakyStore {
        async fn get(&self, key: &str) -> Result<Option<String>> {
            if self.fail_get.load(Ordering::SeqCst) {
                return Err(Error::storage("read failed"));
            }
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: &str) -> Result<()> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            if self.fail_set.load(Ordering::SeqCst) {
                return Err(Error::storage("write failed"));
            }
            self.inner.set(key, value).await
        }

        async fn delete(&self, key: &str) -> Result<()> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            if self.fail_delete.lock().unwrap().contains(key) {
                return Err(Error::storage("delete failed"));
            }
            self.inner.delete(key).await
        }
    }

    struct Harness {
        store: Arc<FlakyStore>,
        clock: Arc<ManualClock>,
        logouts: Arc<AtomicUsize>,
        manager: Arc<SessionLifecycleManager>,
    }

    impl Harness {
        fn new(timeout_secs: u64) -> Self {
            let clock = Arc::new(ManualClock::at_millis(0).unwrap());
            Self::with_store(timeout_secs, Arc::new(FlakyStore::default()), clock)
        }

        /// New process over an existing store (in-memory state lost).
        fn with_store(timeout_secs: u64, store: Arc<FlakyStore>, clock: Arc<ManualClock>) -> Self {
            let logouts = Arc::new(AtomicUsize::new(0));
            let counter = logouts.clone();
            let navigator = Arc::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });

            let manager = SessionLifecycleManager::new(
                SessionConfig::from_secs(timeout_secs).unwrap(),
                store.clone(),
                navigator,
            )
            .with_clock(clock.clone());

            Self {
                store,
                clock,
                logouts,
                manager: Arc::new(manager),
            }
        }

        fn restart(&self, timeout_secs: u64) -> Self {
            Self::with_store(timeout_secs, self.store.clone(), self.clock.clone())
        }

        fn logouts(&self) -> usize {
            self.logouts.load(Ordering::SeqCst)
        }

        async fn marker(&self) -> Option<String> {
            self.store.inner.get(BACKGROUND_MARKER_KEY).await.unwrap()
        }

        async fn seed_session(&self) {
            for key in DEFAULT_SESSION_KEYS.iter().chain(DEFAULT_REMEMBERED_KEYS) {
                self.store.inner.set(key, "value").await.unwrap();
            }
        }

        /// Every session key and the marker are gone; remembered keys remain.
        async fn assert_purged(&self) {
            let keys = self.store.inner.keys().await;
            for key in DEFAULT_SESSION_KEYS.iter().chain([&BACKGROUND_MARKER_KEY]) {
                assert!(!keys.contains(&key.to_string()), "{} survived logout", key);
            }
            for key in DEFAULT_REMEMBERED_KEYS {
                assert!(keys.contains(&key.to_string()), "{} was purged", key);
            }
        }

        async fn cycle(&self, away: Duration) -> TransitionOutcome {
            self.manager.on_state_change(AppState::Background).await;
            self.clock.advance(away);
            self.manager.on_state_change(AppState::Active).await
        }
    }

    #[test]
    fn test_app_state_parse() {
        assert_eq!("Background".parse::<AppState>().unwrap(), AppState::Background);
        assert_eq!(" inactive ".parse::<AppState>().unwrap(), AppState::Inactive);
        assert!("paused".parse::<AppState>().is_err());
        assert_eq!(AppState::Active.to_string(), "active");
    }

    #[tokio::test]
    async fn test_short_background_keeps_session() {
        let h = Harness::new(30);
        h.seed_session().await;

        let outcome = h.manager.on_state_change(AppState::Background).await;
        assert_eq!(outcome, TransitionOutcome::Backgrounded { at: h.clock.now() });
        assert_eq!(h.marker().await.as_deref(), Some("0"));

        h.clock.advance(Duration::from_secs(20));
        let outcome = h.manager.on_state_change(AppState::Active).await;

        assert_eq!(outcome, TransitionOutcome::Resumed { elapsed: Duration::from_secs(20) });
        assert_eq!(h.marker().await, None);
        assert_eq!(h.logouts(), 0);
        assert!(h.store.inner.contains(AUTH_TOKEN).await);
    }

    #[tokio::test]
    async fn test_long_background_logs_out() {
        let h = Harness::new(30);
        h.seed_session().await;

        let outcome = h.cycle(Duration::from_secs(45)).await;

        assert_eq!(outcome, TransitionOutcome::Expired { elapsed: Duration::from_secs(45) });
        assert!(outcome.logged_out());
        assert_eq!(h.logouts(), 1);
        h.assert_purged().await;

        let snapshot = h.manager.snapshot().await;
        assert_eq!(snapshot.phase, SessionPhase::Active);
        assert_eq!(snapshot.backgrounded_at, None);
    }

    #[tokio::test]
    async fn test_timeout_boundary_is_exclusive() {
        let h = Harness::new(30);
        let outcome = h.cycle(Duration::from_secs(30)).await;
        assert!(matches!(outcome, TransitionOutcome::Resumed { .. }));
        assert_eq!(h.logouts(), 0);

        let outcome = h.cycle(Duration::from_millis(30_001)).await;
        assert!(matches!(outcome, TransitionOutcome::Expired { .. }));
        assert_eq!(h.logouts(), 1);
    }

    #[tokio::test]
    async fn test_restart_within_timeout_consumes_marker() {
        let h = Harness::new(30);
        h.seed_session().await;
        h.manager.on_state_change(AppState::Background).await;

        h.clock.advance(Duration::from_secs(5));
        let relaunched = h.restart(30);

        assert!(relaunched.manager.check_session_on_app_start().await);
        assert_eq!(relaunched.marker().await, None);
        assert_eq!(relaunched.logouts(), 0);
        assert!(relaunched.store.inner.contains(AUTH_TOKEN).await);
    }

    #[tokio::test]
    async fn test_restart_after_timeout_logs_out() {
        let h = Harness::new(30);
        h.seed_session().await;
        h.manager.on_state_change(AppState::Background).await;

        h.clock.advance(Duration::from_secs(40));
        let relaunched = h.restart(30);

        assert!(!relaunched.manager.check_session_on_app_start().await);
        assert_eq!(relaunched.logouts(), 1);
        relaunched.assert_purged().await;
    }

    #[tokio::test]
    async fn test_fresh_install_only_reads() {
        let h = Harness::new(30);

        assert!(h.manager.check_session_on_app_start().await);
        assert_eq!(h.store.writes.load(Ordering::SeqCst), 0);
        assert_eq!(h.logouts(), 0);
    }

    #[tokio::test]
    async fn test_updated_timeout_applies_to_next_cycle() {
        let h = Harness::new(30);
        h.manager.set_session_timeout(Duration::from_secs(600)).unwrap();

        let outcome = h.cycle(Duration::from_secs(5 * 60)).await;
        assert!(matches!(outcome, TransitionOutcome::Resumed { .. }));
        assert_eq!(h.logouts(), 0);

        let outcome = h.cycle(Duration::from_secs(11 * 60)).await;
        assert!(matches!(outcome, TransitionOutcome::Expired { .. }));
        assert_eq!(h.logouts(), 1);
    }

    #[tokio::test]
    async fn test_zero_timeout_rejected() {
        let h = Harness::new(30);
        assert!(h.manager.set_session_timeout(Duration::ZERO).is_err());
        assert_eq!(h.manager.timeout(), Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_startup_read_failure_fails_open() {
        let h = Harness::new(30);
        h.manager.on_state_change(AppState::Background).await;
        h.clock.advance(Duration::from_secs(3600));

        let relaunched = h.restart(30);
        relaunched.store.fail_get.store(true, Ordering::SeqCst);

        assert!(relaunched.manager.check_session_on_app_start().await);
        assert_eq!(relaunched.logouts(), 0);
    }

    #[tokio::test]
    async fn test_first_background_capture_wins() {
        let h = Harness::new(30);

        h.manager.on_state_change(AppState::Inactive).await;
        h.clock.advance(Duration::from_secs(20));
        let outcome = h.manager.on_state_change(AppState::Background).await;
        let since = DateTime::from_timestamp_millis(0).unwrap();
        assert_eq!(outcome, TransitionOutcome::AlreadyBackgrounded { since });
        assert_eq!(h.marker().await.as_deref(), Some("0"));

        h.clock.advance(Duration::from_secs(15));
        let outcome = h.manager.on_state_change(AppState::Active).await;
        assert_eq!(outcome, TransitionOutcome::Expired { elapsed: Duration::from_secs(35) });
        assert_eq!(h.logouts(), 1);
    }

    #[tokio::test]
    async fn test_capture_from_previous_process_wins() {
        for repeated in [AppState::Background, AppState::Inactive] {
            let h = Harness::new(30);
            h.seed_session().await;
            h.manager.on_state_change(AppState::Inactive).await;

            // Next process sees the app leave the foreground again
            h.clock.advance(Duration::from_secs(20));
            let relaunched = h.restart(30);
            let outcome = relaunched.manager.on_state_change(repeated).await;

            let since = DateTime::from_timestamp_millis(0).unwrap();
            assert_eq!(outcome, TransitionOutcome::AlreadyBackgrounded { since });
            assert_eq!(relaunched.marker().await.as_deref(), Some("0"));
            let snapshot = relaunched.manager.snapshot().await;
            assert_eq!(snapshot.phase, SessionPhase::Backgrounded);
            assert_eq!(snapshot.backgrounded_at, Some(since));

            relaunched.clock.advance(Duration::from_secs(15));
            let outcome = relaunched.manager.on_state_change(AppState::Active).await;
            assert_eq!(outcome, TransitionOutcome::Expired { elapsed: Duration::from_secs(35) });
            assert_eq!(relaunched.logouts(), 1);
            relaunched.assert_purged().await;
        }
    }

    #[tokio::test]
    async fn test_stale_marker_from_same_process_is_recaptured() {
        let h = Harness::new(30);
        h.store.failing_delete(BACKGROUND_MARKER_KEY);

        let outcome = h.cycle(Duration::from_secs(10)).await;
        assert!(matches!(outcome, TransitionOutcome::Resumed { .. }));
        // Delete failed, so the old value is still on disk
        assert_eq!(h.marker().await.as_deref(), Some("0"));

        h.clock.advance(Duration::from_secs(100));
        let outcome = h.manager.on_state_change(AppState::Background).await;
        assert_eq!(outcome, TransitionOutcome::Backgrounded { at: h.clock.now() });
        assert_eq!(h.marker().await.as_deref(), Some("110000"));

        h.clock.advance(Duration::from_secs(5));
        let outcome = h.manager.on_state_change(AppState::Active).await;
        assert_eq!(outcome, TransitionOutcome::Resumed { elapsed: Duration::from_secs(5) });
        assert_eq!(h.logouts(), 0);
    }

    #[tokio::test]
    async fn test_unreadable_inherited_marker_is_replaced() {
        let h = Harness::new(30);
        h.store.inner.set(BACKGROUND_MARKER_KEY, "yesterday").await.unwrap();

        let outcome = h.manager.on_state_change(AppState::Background).await;
        assert_eq!(outcome, TransitionOutcome::Backgrounded { at: h.clock.now() });
        assert_eq!(h.marker().await.as_deref(), Some("0"));
    }

    #[tokio::test]
    async fn test_persist_failure_uses_memory_value() {
        let h = Harness::new(30);
        h.store.fail_set.store(true, Ordering::SeqCst);

        let outcome = h.cycle(Duration::from_secs(45)).await;

        assert!(matches!(outcome, TransitionOutcome::Expired { .. }));
        assert_eq!(h.logouts(), 1);
    }

    #[tokio::test]
    async fn test_foreground_without_capture_checks_marker() {
        let h = Harness::new(30);
        h.store.inner.set(BACKGROUND_MARKER_KEY, "0").await.unwrap();
        h.clock.advance(Duration::from_secs(10));

        let outcome = h.manager.on_state_change(AppState::Active).await;
        assert_eq!(outcome, TransitionOutcome::Checked { valid: true });
        assert_eq!(h.marker().await, None);

        // Nothing persisted now, so the next foreground is trivially valid
        let outcome = h.manager.on_state_change(AppState::Active).await;
        assert_eq!(outcome, TransitionOutcome::Checked { valid: true });
    }

    #[tokio::test]
    async fn test_unreadable_marker_is_discarded() {
        let h = Harness::new(30);
        h.store.inner.set(BACKGROUND_MARKER_KEY, "yesterday").await.unwrap();

        assert!(h.manager.check_session_on_app_start().await);
        assert_eq!(h.marker().await, None);
        assert_eq!(h.logouts(), 0);
    }

    #[tokio::test]
    async fn test_logout_continues_past_failed_key() {
        let h = Harness::new(30);
        h.seed_session().await;
        h.store.failing_delete(AUTH_TOKEN);

        let report = h.manager.logout().await;

        assert!(!report.is_complete());
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, AUTH_TOKEN);
        assert!(report.removed.contains(&SELECTED_POLICY_ID.to_string()));
        assert!(report.removed.contains(&BACKGROUND_MARKER_KEY.to_string()));
        assert!(!h.store.inner.contains(SELECTED_POLICY_ID).await);
        assert!(h.store.inner.contains(REMEMBER_ME).await);
        assert_eq!(h.logouts(), 1);
    }

    #[tokio::test]
    async fn test_logout_removes_every_session_key() {
        let h = Harness::new(30);
        h.seed_session().await;
        h.manager.on_state_change(AppState::Background).await;

        let report = h.manager.logout().await;

        assert!(report.is_complete());
        assert_eq!(report.removed.len(), DEFAULT_SESSION_KEYS.len() + 1);
        for key in DEFAULT_REMEMBERED_KEYS {
            assert!(!report.removed.contains(&key.to_string()));
        }
        h.assert_purged().await;
        assert_eq!(h.logouts(), 1);
    }

    #[tokio::test]
    async fn test_logout_purges_registered_keys() {
        let store = Arc::new(MemoryStore::new());
        let registry = Arc::new(SessionKeyRegistry::empty());
        let manager = SessionLifecycleManager::new(
            SessionConfig::from_secs(30).unwrap(),
            store.clone(),
            Arc::new(|| {}),
        )
        .with_registry(registry.clone());

        // Registered by the upload component after the manager was built
        registry.register_session_key("document_upload_queue").unwrap();
        store.set("document_upload_queue", "[]").await.unwrap();
        store.set(AUTH_TOKEN, "tok").await.unwrap();

        let report = manager.logout().await;

        assert!(report.is_complete());
        assert_eq!(
            report.removed,
            vec![BACKGROUND_MARKER_KEY.to_string(), "document_upload_queue".to_string()]
        );
        assert!(!store.contains("document_upload_queue").await);
        // Not registered with this registry
        assert!(store.contains(AUTH_TOKEN).await);
    }

    #[tokio::test]
    async fn test_backwards_clock_counts_as_zero() {
        let h = Harness::new(30);
        h.clock.set(DateTime::from_timestamp_millis(100_000).unwrap());
        h.manager.on_state_change(AppState::Background).await;
        h.clock.set(DateTime::from_timestamp_millis(0).unwrap());

        let outcome = h.manager.on_state_change(AppState::Active).await;
        assert_eq!(outcome, TransitionOutcome::Resumed { elapsed: Duration::ZERO });
    }

    #[tokio::test]
    async fn test_activity_does_not_affect_timeout() {
        let h = Harness::new(30);
        h.manager.on_state_change(AppState::Background).await;
        h.clock.advance(Duration::from_secs(40));
        h.manager.update_activity();

        assert_eq!(h.manager.last_activity(), Some(h.clock.now()));
        let outcome = h.manager.on_state_change(AppState::Active).await;
        assert!(matches!(outcome, TransitionOutcome::Expired { .. }));
    }

    #[tokio::test]
    async fn test_subscription_processes_events_in_order() {
        let h = Harness::new(30);
        let (tx, rx) = mpsc::channel(8);

        assert!(h.manager.initialize(rx));
        assert!(h.manager.is_subscribed());

        // Second initialize must not double-subscribe
        let (_tx2, rx2) = mpsc::channel(8);
        assert!(!h.manager.initialize(rx2));

        tx.send(AppState::Background).await.unwrap();
        tx.send(AppState::Inactive).await.unwrap();
        drop(tx);
        h.manager.closed().await;

        assert!(!h.manager.is_subscribed());
        let snapshot = h.manager.snapshot().await;
        assert_eq!(snapshot.phase, SessionPhase::Backgrounded);
        assert_eq!(h.marker().await.as_deref(), Some("0"));
    }

    #[tokio::test]
    async fn test_destroy_is_safe_and_allows_resubscribe() {
        let h = Harness::new(30);
        h.manager.destroy();
        h.manager.destroy();

        let (_tx, rx) = mpsc::channel(1);
        assert!(h.manager.initialize(rx));
        h.manager.destroy();
        assert!(h.manager.subscription.lock().unwrap().is_none());

        let (_tx, rx) = mpsc::channel(1);
        assert!(h.manager.initialize(rx));
    }

    #[tokio::test]
    async fn test_file_store_marker_survives_restart() {
        use crate::storage::FileStore;

        let temp = tempfile::tempdir().expect("Failed to create temp dir");
        let path = temp.path().join("store.json");
        let clock = Arc::new(ManualClock::at_millis(1_000).unwrap());
        let navigate = Arc::new(|| {});

        let first = SessionLifecycleManager::new(
            SessionConfig::from_secs(30).unwrap(),
            Arc::new(FileStore::new(&path)),
            navigate.clone(),
        )
        .with_clock(clock.clone());
        first.on_state_change(AppState::Background).await;
        drop(first);

        clock.advance(Duration::from_secs(31));
        let store = Arc::new(FileStore::new(&path));
        store.set(AUTH_TOKEN, "tok").await.unwrap();
        let second = SessionLifecycleManager::new(
            SessionConfig::from_secs(30).unwrap(),
            store.clone(),
            navigate,
        )
        .with_clock(clock);

        assert!(!second.check_session_on_app_start().await);
        let entries = store.entries().await.unwrap();
        assert!(!entries.contains_key(AUTH_TOKEN));
        assert!(!entries.contains_key(BACKGROUND_MARKER_KEY));
    }

    #[tokio::test]
    async fn test_persisted_marker_is_not_consumed() {
        let h = Harness::new(30);
        h.manager.on_state_change(AppState::Background).await;

        let first = h.manager.persisted_marker().await.unwrap();
        let second = h.manager.persisted_marker().await.unwrap();
        assert_eq!(first, Some(DateTime::from_timestamp_millis(0).unwrap()));
        assert_eq!(first, second);
    }
}
