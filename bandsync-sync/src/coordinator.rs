//! Resync coordinator
//!
//! Bridges any number of change-notification topics to one caller-supplied
//! refresh action. Notifications are filtered (self-origin, band scope,
//! record scope) and the survivors are debounced so a burst triggers a single
//! refresh once it settles.
//!
//! Lifecycle:
//!
//! ```text
//! Idle --start--> Subscribed <--notification / timer fired--> Pending
//!   ^                 |                                          |
//!   +------stop-------+----------stop (flushes refresh)----------+
//! ```
//!
//! A refresh that is pending when the coordinator stops is run synchronously
//! during `stop()` instead of being dropped. Dropping a running coordinator
//! stops it.
//!
//! The debounce timer is a task on the Tokio runtime that was current when
//! [`ResyncCoordinator::start`] ran. Continuous notifications spaced closer
//! than the debounce window postpone the refresh until the stream pauses;
//! there is no maximum wait.

use bandsync_common::config::SyncConfig;
use bandsync_common::events::{NotificationHandler, SubscriptionId};
use bandsync_common::{ChangeNotification, EntityKind, NotificationSource};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Default coalescing window
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(100);

/// Action run when a (coalesced) relevant notification is accepted
pub type RefreshCallback = Arc<dyn Fn() + Send + Sync>;

/// Coordinator configuration
///
/// Only `topics` is required; the rest default to no scoping, a 100ms window
/// and skipping the current user's own changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorOptions {
    pub topics: Vec<String>,
    pub scope_band_id: Option<String>,
    pub scope_record_id: Option<String>,
    pub debounce: Duration,
    pub skip_own_changes: bool,
    pub current_user_id: Option<String>,
}

impl CoordinatorOptions {
    pub fn new<I, T>(topics: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            topics: topics.into_iter().map(Into::into).collect(),
            scope_band_id: None,
            scope_record_id: None,
            debounce: DEFAULT_DEBOUNCE,
            skip_own_changes: true,
            current_user_id: None,
        }
    }

    /// Topics for every entity kind
    pub fn all_kinds() -> Self {
        Self::new(EntityKind::ALL.iter().map(EntityKind::topic))
    }

    /// Apply the `[sync]` section of the bootstrap config
    pub fn with_config(mut self, config: &SyncConfig) -> Self {
        self.debounce = Duration::from_millis(config.debounce_ms);
        self.skip_own_changes = config.skip_own_changes;
        self.current_user_id = config.current_user_id.clone();
        self.scope_band_id = config.band_id.clone();
        self
    }

    pub fn band(mut self, band_id: impl Into<String>) -> Self {
        self.scope_band_id = Some(band_id.into());
        self
    }

    pub fn record(mut self, record_id: impl Into<String>) -> Self {
        self.scope_record_id = Some(record_id.into());
        self
    }

    pub fn debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn skip_own_changes(mut self, skip: bool) -> Self {
        self.skip_own_changes = skip;
        self
    }

    pub fn current_user(mut self, user_id: impl Into<String>) -> Self {
        self.current_user_id = Some(user_id.into());
        self
    }

    /// Why `notification` is irrelevant under these options, if it is
    ///
    /// Filters run in order: self-origin, band scope, record scope. A
    /// notification without a band or record id passes the matching scope
    /// filter.
    pub fn rejection(&self, notification: &ChangeNotification) -> Option<Rejection> {
        if self.skip_own_changes {
            if let (Some(me), Some(origin)) = (&self.current_user_id, &notification.user_id) {
                if me == origin {
                    return Some(Rejection::OwnChange);
                }
            }
        }

        if let (Some(scope), Some(band)) = (&self.scope_band_id, &notification.band_id) {
            if scope != band {
                return Some(Rejection::OtherBand);
            }
        }

        if let (Some(scope), Some(record)) = (&self.scope_record_id, &notification.record_id) {
            if scope != record {
                return Some(Rejection::OtherRecord);
            }
        }

        None
    }
}

/// Reason a notification was ignored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    OwnChange,
    OtherBand,
    OtherRecord,
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rejection::OwnChange => f.write_str("originated by current user"),
            Rejection::OtherBand => f.write_str("band out of scope"),
            Rejection::OtherRecord => f.write_str("record out of scope"),
        }
    }
}

/// Observable coordinator state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    /// Not subscribed
    Idle,
    /// Listening, nothing pending
    Subscribed,
    /// Listening, debounce timer armed
    Pending,
}

/// State touched from notification handlers and the timer task
struct Inner {
    options: CoordinatorOptions,
    active: bool,
    pending: bool,
    /// Bumped on every arm so a superseded timer cannot fire
    generation: u64,
    timer: Option<JoinHandle<()>>,
    runtime: Option<Handle>,
}

struct Shared {
    inner: Mutex<Inner>,
    refresh: RefreshCallback,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn on_notification(self: &Arc<Self>, notification: &ChangeNotification) {
        let mut inner = self.lock();
        if !inner.active {
            return;
        }

        if let Some(reason) = inner.options.rejection(notification) {
            debug!("Resync: ignoring notification ({}): {:?}", reason, notification);
            return;
        }

        let Some(runtime) = inner.runtime.clone() else {
            return;
        };

        if let Some(previous) = inner.timer.take() {
            previous.abort();
        }
        inner.generation += 1;
        inner.pending = true;

        let generation = inner.generation;
        let deadline = tokio::time::Instant::now() + inner.options.debounce;
        let shared = Arc::clone(self);
        inner.timer = Some(runtime.spawn(async move {
            tokio::time::sleep_until(deadline).await;
            shared.fire(generation);
        }));
    }

    fn fire(&self, generation: u64) {
        {
            let mut inner = self.lock();
            if !inner.pending || inner.generation != generation {
                return;
            }
            inner.pending = false;
            inner.timer = None;
        }

        debug!("Resync: debounce window elapsed, refreshing");
        (self.refresh)();
    }

    /// Deactivate and report whether a refresh was pending
    fn deactivate(&self) -> bool {
        let mut inner = self.lock();
        inner.active = false;
        if let Some(timer) = inner.timer.take() {
            timer.abort();
        }
        std::mem::replace(&mut inner.pending, false)
    }
}

/// Debounced, filtered bridge from change notifications to a refresh action
///
/// # Examples
///
/// ```no_run
/// use bandsync_common::EventBus;
/// use bandsync_sync::coordinator::{CoordinatorOptions, ResyncCoordinator};
/// use std::sync::Arc;
///
/// # async fn run() {
/// let bus = EventBus::new(100);
/// let options = CoordinatorOptions::new(["songs:changed"])
///     .band("band-1")
///     .current_user("me");
///
/// let mut coordinator = ResyncCoordinator::new(
///     Some(Arc::new(bus.clone())),
///     options,
///     Arc::new(|| println!("re-read songs from the local store")),
/// );
/// coordinator.start();
/// // ... notifications arrive on `bus` ...
/// coordinator.stop();
/// # }
/// ```
pub struct ResyncCoordinator {
    source: Option<Arc<dyn NotificationSource>>,
    shared: Arc<Shared>,
    subscriptions: Vec<SubscriptionId>,
}

impl ResyncCoordinator {
    /// Create an idle coordinator
    ///
    /// With no `source` the coordinator never subscribes and stays idle.
    pub fn new(
        source: Option<Arc<dyn NotificationSource>>,
        options: CoordinatorOptions,
        refresh: RefreshCallback,
    ) -> Self {
        Self {
            source,
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    options,
                    active: false,
                    pending: false,
                    generation: 0,
                    timer: None,
                    runtime: None,
                }),
                refresh,
            }),
            subscriptions: Vec::new(),
        }
    }

    /// Subscribe to every configured topic with one shared handler
    ///
    /// Idempotent. Stays idle when there is no notification source or no
    /// Tokio runtime to run the debounce timer on.
    pub fn start(&mut self) {
        let Some(source) = self.source.clone() else {
            debug!("Resync: no notification source, staying idle");
            return;
        };

        let runtime = match Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                warn!("Resync: no Tokio runtime available ({}), staying idle", e);
                return;
            }
        };

        let topics = {
            let mut inner = self.shared.lock();
            if inner.active {
                return;
            }
            inner.active = true;
            inner.runtime = Some(runtime);
            inner.options.topics.clone()
        };

        let shared = Arc::clone(&self.shared);
        let handler: NotificationHandler =
            Arc::new(move |notification: &ChangeNotification| shared.on_notification(notification));

        self.subscriptions = topics
            .iter()
            .map(|topic| source.subscribe(topic, Arc::clone(&handler)))
            .collect();

        debug!("Resync: subscribed to {:?}", topics);
    }

    /// Flush any pending refresh, then unsubscribe from every topic
    pub fn stop(&mut self) {
        if self.shared.deactivate() {
            debug!("Resync: flushing pending refresh on stop");
            (self.shared.refresh)();
        }

        if let Some(source) = &self.source {
            for id in self.subscriptions.drain(..) {
                source.unsubscribe(id);
            }
        }
    }

    /// Replace the options
    ///
    /// Scope, identity and debounce changes take effect immediately without
    /// resubscribing. Topics are compared by value: only a different topic
    /// list causes a stop (with flush) and a fresh subscription.
    pub fn reconfigure(&mut self, options: CoordinatorOptions) {
        let (topics_changed, active) = {
            let mut inner = self.shared.lock();
            let topics_changed = inner.options.topics != options.topics;
            if !topics_changed {
                inner.options = options.clone();
            }
            (topics_changed, inner.active)
        };

        if !topics_changed {
            return;
        }

        debug!("Resync: topic list changed to {:?}", options.topics);
        if active {
            self.stop();
        }
        self.shared.lock().options = options;
        if active {
            self.start();
        }
    }

    pub fn state(&self) -> CoordinatorState {
        let inner = self.shared.lock();
        match (inner.active, inner.pending) {
            (false, _) => CoordinatorState::Idle,
            (true, false) => CoordinatorState::Subscribed,
            (true, true) => CoordinatorState::Pending,
        }
    }

    /// Whether a refresh is scheduled but has not run yet
    pub fn is_pending(&self) -> bool {
        self.shared.lock().pending
    }

    pub fn options(&self) -> CoordinatorOptions {
        self.shared.lock().options.clone()
    }
}

impl Drop for ResyncCoordinator {
    fn drop(&mut self) {
        self.stop();
    }
}
