//! # FeedbackBus: lifecycle-managed telemetry bus.
//!
//! [`FeedbackBus`] accepts two independent families of reportable events —
//! [`Metric`]s and [`Action`]s — and multicasts each onto its own
//! [`MulticastStream`]. Every publish runs as a tracked asynchronous task, so
//! shutdown can drain all in-flight work before tearing anything down.
//!
//! ## Lifecycle
//! ```text
//! Uninitialized ──start(parent)──► Running ──stop()──► Stopped
//!      (linear, no cycle, no re-entry; exactly one start per bus)
//! ```
//!
//! - `start(parent)` derives the bus **scope** as a child of the caller's
//!   [`CancellationToken`], so external cancellation propagates down. It also
//!   installs a completion hook on the scope that closes both streams exactly
//!   once, and fires the pending [`FeedbackBus::on_start`] callback.
//! - `report_*` spawns one tracked publish task per call and returns
//!   immediately; a full subscriber queue suspends the *publish task*, never
//!   the reporter.
//! - `stop()` drains the [`TaskTracker`] **before** cancelling the scope, so
//!   a clean shutdown never drops in-flight events. An external cancellation
//!   of the parent token bypasses that ordering and may drop events; that is
//!   the documented cost of making the scope a child of the caller's context.
//!
//! ## Shutdown path
//! ```text
//! stop()
//!   ├─► tracker.wait()              (all in-flight publishes settle)
//!   ├─► state = Stopped
//!   ├─► scope.cancel()              (kills any publish spawned mid-stop)
//!   └─► completion hook ──► metrics.close(), actions.close()
//! ```
//!
//! ## Example
//! ```rust
//! use feedbus::{Action, BusConfig, FeedbackBus};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), feedbus::BusError> {
//!     let bus = FeedbackBus::new(BusConfig::default());
//!
//!     // Subscribe before start so nothing is missed.
//!     let mut actions = bus.actions().await;
//!
//!     bus.start(&CancellationToken::new())?;
//!     bus.report_action(Action::new("session-opened"))?;
//!     bus.wait().await;
//!
//!     assert_eq!(actions.recv().await.unwrap().name.as_ref(), "session-opened");
//!
//!     bus.stop().await?;
//!     assert!(bus.is_stopped()?);
//!     Ok(())
//! }
//! ```

use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::BusConfig;
use crate::core::tracker::TaskTracker;
use crate::error::BusError;
use crate::events::{Action, Metric, MulticastStream, Subscription};

/// Single-slot start callback.
type StartCallback = Box<dyn FnOnce() + Send>;

/// Bus lifecycle state. Transitions are linear and guarded by one mutex.
enum State {
    /// Created, never started. No scope exists yet.
    Uninitialized,
    /// Started. The scope is live; the hook closes both streams on cancel.
    Running {
        scope: CancellationToken,
        hook: Option<JoinHandle<()>>,
    },
    /// Stopped. The scope is retained (cancelled) for the shutdown queries.
    Stopped { scope: CancellationToken },
}

/// Lifecycle-managed bus multiplexing metrics and actions onto two
/// independent multicast streams.
///
/// One bus per use-site; exactly one `start()` over its lifetime, no restart.
/// `report_*` and `measure` are safe to call concurrently from many producer
/// contexts without external locking.
pub struct FeedbackBus {
    state: Mutex<State>,
    on_start: Mutex<Option<StartCallback>>,
    metrics: Arc<MulticastStream<Metric>>,
    actions: Arc<MulticastStream<Action>>,
    tracker: TaskTracker,
}

impl FeedbackBus {
    /// Creates a bus in the `Uninitialized` state.
    ///
    /// Both streams exist from construction, so consumers can subscribe
    /// before `start()` and observe every event ever reported.
    pub fn new(cfg: BusConfig) -> Self {
        Self {
            state: Mutex::new(State::Uninitialized),
            on_start: Mutex::new(None),
            metrics: Arc::new(MulticastStream::new(cfg.capacity)),
            actions: Arc::new(MulticastStream::new(cfg.capacity)),
            tracker: TaskTracker::new(),
        }
    }

    /// Starts the bus: `Uninitialized → Running`.
    ///
    /// The bus scope becomes a child of `parent`, so cancelling `parent`
    /// cancels all outstanding publishes and closes both streams. The pending
    /// [`FeedbackBus::on_start`] callback (if any) fires exactly once before
    /// this method returns.
    ///
    /// Must be called from within a Tokio runtime (spawns the completion
    /// hook).
    ///
    /// # Errors
    /// [`BusError::AlreadyInitialized`] if the bus ever left `Uninitialized`.
    pub fn start(&self, parent: &CancellationToken) -> Result<(), BusError> {
        let scope = parent.child_token();
        {
            let mut state = self.state.lock().expect("bus state poisoned");
            if !matches!(*state, State::Uninitialized) {
                return Err(BusError::AlreadyInitialized);
            }

            // Completion hook: closes both streams exactly once, whether the
            // scope dies via stop() or via the parent token.
            let hook = {
                let scope = scope.clone();
                let metrics = Arc::clone(&self.metrics);
                let actions = Arc::clone(&self.actions);
                tokio::spawn(async move {
                    scope.cancelled().await;
                    metrics.close().await;
                    actions.close().await;
                    tracing::debug!("feedback bus scope cancelled; streams closed");
                })
            };

            *state = State::Running {
                scope,
                hook: Some(hook),
            };
        }

        if let Some(cb) = self.on_start.lock().expect("bus callback poisoned").take() {
            cb();
        }
        Ok(())
    }

    /// Registers the start callback.
    ///
    /// Single-slot registration, not a subscriber list: registering again
    /// before `start()` overwrites the previous callback. If the bus has
    /// already left `Uninitialized`, `callback` is invoked synchronously and
    /// immediately instead.
    ///
    /// Intended for subscribing to [`FeedbackBus::metrics`] /
    /// [`FeedbackBus::actions`] right at startup so no early emission is
    /// missed.
    pub fn on_start<F>(&self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        {
            let state = self.state.lock().expect("bus state poisoned");
            if matches!(*state, State::Uninitialized) {
                // Stored under the state lock so a racing start() either sees
                // the slot filled or runs the callback path below.
                *self.on_start.lock().expect("bus callback poisoned") = Some(Box::new(callback));
                return;
            }
        }
        callback();
    }

    /// Reports a metric onto the metrics stream.
    ///
    /// Fire-and-forget: spawns one tracked publish task and returns
    /// immediately. Failures inside the task (stream closed by a concurrent
    /// `stop()`) are logged, never surfaced to the reporter. Per-producer
    /// submission order is preserved insofar as the runtime schedules spawned
    /// tasks in submission order; no order is guaranteed across producers.
    ///
    /// # Errors
    /// [`BusError::NotStarted`] if `start()` was never called.
    pub fn report_metric(&self, metric: Metric) -> Result<(), BusError> {
        self.spawn_publish(Arc::clone(&self.metrics), metric, "metric")
    }

    /// Reports an action onto the actions stream.
    ///
    /// Same contract as [`FeedbackBus::report_metric`].
    ///
    /// # Errors
    /// [`BusError::NotStarted`] if `start()` was never called.
    pub fn report_action(&self, action: Action) -> Result<(), BusError> {
        self.spawn_publish(Arc::clone(&self.actions), action, "action")
    }

    /// Times a synchronous block and reports the result as a
    /// [`Metric::Time`].
    ///
    /// Records a timestamp, runs `block` to completion on the calling
    /// context, records a second timestamp, and reports a time metric
    /// carrying both and `description`. The block's return value is handed
    /// back to the caller.
    ///
    /// Caller obligation (not enforced here): `block` must not leave behind
    /// concurrent work it does not itself await — anything still running when
    /// `block` returns falls outside the measured interval.
    ///
    /// # Errors
    /// [`BusError::NotStarted`] if `start()` was never called; `block` does
    /// not run in that case.
    pub fn measure<R, F>(&self, description: impl Into<Arc<str>>, block: F) -> Result<R, BusError>
    where
        F: FnOnce() -> R,
    {
        self.ensure_scope()?;

        let description = description.into();
        let started_at = SystemTime::now();
        let out = block();
        let ended_at = SystemTime::now();

        self.report_metric(Metric::time(description, started_at, ended_at))?;
        Ok(out)
    }

    /// Waits for every publish tracked so far to finish.
    ///
    /// Never fails; returns immediately when nothing is in flight. Publishes
    /// spawned concurrently after this call begins are not waited on (see
    /// [`TaskTracker::wait`]).
    pub async fn wait(&self) {
        self.tracker.wait().await;
    }

    /// Stops the bus: `Running → Stopped`.
    ///
    /// Ordering: drain the tracker first (no in-flight publish is dropped),
    /// then cancel the scope, then await the completion hook so both streams
    /// are closed by the time this returns. Afterwards the scope is dead: a
    /// later `report_*` still returns `Ok` but its publish task observes the
    /// cancelled scope and drops the event.
    ///
    /// A second `stop()` on an already-stopped bus is a no-op returning
    /// `Ok(())`.
    ///
    /// # Errors
    /// [`BusError::NotStarted`] if `start()` was never called.
    pub async fn stop(&self) -> Result<(), BusError> {
        {
            let state = self.state.lock().expect("bus state poisoned");
            match *state {
                State::Uninitialized => return Err(BusError::NotStarted),
                State::Stopped { .. } => return Ok(()),
                State::Running { .. } => {}
            }
        }

        self.tracker.wait().await;

        let (scope, hook) = {
            let mut state = self.state.lock().expect("bus state poisoned");
            match &mut *state {
                State::Running { scope, hook } => {
                    let scope = scope.clone();
                    let hook = hook.take();
                    *state = State::Stopped {
                        scope: scope.clone(),
                    };
                    (scope, hook)
                }
                // Lost a race against a concurrent stop(); nothing left to do.
                State::Stopped { .. } => return Ok(()),
                State::Uninitialized => return Err(BusError::NotStarted),
            }
        };

        scope.cancel();
        if let Some(hook) = hook {
            let _ = hook.await;
        }
        tracing::debug!("feedback bus stopped");
        Ok(())
    }

    /// Subscribes to the metrics stream.
    ///
    /// Subscribe-before-emit: the subscription observes only metrics reported
    /// after this call. Usable in any lifecycle state.
    pub async fn metrics(&self) -> Subscription<Metric> {
        self.metrics.subscribe().await
    }

    /// Subscribes to the actions stream.
    ///
    /// Same semantics as [`FeedbackBus::metrics`].
    pub async fn actions(&self) -> Subscription<Action> {
        self.actions.subscribe().await
    }

    /// True iff the bus has fully shut down: scope cancelled, both streams
    /// closed for send, and no reporting task still running. All four must
    /// hold simultaneously.
    ///
    /// # Errors
    /// [`BusError::NotStarted`] if `start()` was never called — the query
    /// itself fails rather than silently answering `false`.
    pub fn is_stopped(&self) -> Result<bool, BusError> {
        let scope = self.ensure_scope()?;
        Ok(scope.is_cancelled()
            && self.metrics.is_closed_for_send()
            && self.actions.is_closed_for_send()
            && !self.tracker.is_active())
    }

    /// Like [`FeedbackBus::is_stopped`], but names what is still live.
    ///
    /// # Errors
    /// - [`BusError::NotStarted`] if `start()` was never called.
    /// - [`BusError::StillActive`] listing every unmet shutdown condition out
    ///   of {metrics stream, actions stream, scope, reporting tasks} — meant
    ///   for diagnosing leaks in tests, not for normal control flow.
    pub fn ensure_stopped(&self) -> Result<(), BusError> {
        let scope = self.ensure_scope()?;

        let mut reasons = Vec::new();
        if !self.metrics.is_closed_for_send() {
            reasons.push("metrics stream");
        }
        if !self.actions.is_closed_for_send() {
            reasons.push("actions stream");
        }
        if !scope.is_cancelled() {
            reasons.push("scope");
        }
        if self.tracker.is_active() {
            reasons.push("reporting tasks");
        }

        if reasons.is_empty() {
            Ok(())
        } else {
            Err(BusError::StillActive { reasons })
        }
    }

    /// Returns the bus scope, failing fast when the bus was never started.
    ///
    /// The scope exists from `start()` on, including after `stop()` (it is
    /// retained, cancelled, for the shutdown queries).
    ///
    /// # Errors
    /// [`BusError::NotStarted`] if the bus is `Uninitialized`.
    pub fn ensure_scope(&self) -> Result<CancellationToken, BusError> {
        match &*self.state.lock().expect("bus state poisoned") {
            State::Uninitialized => Err(BusError::NotStarted),
            State::Running { scope, .. } | State::Stopped { scope } => Ok(scope.clone()),
        }
    }

    /// Spawns one tracked publish task racing the scope against the send.
    fn spawn_publish<T: Clone + Send + 'static>(
        &self,
        stream: Arc<MulticastStream<T>>,
        ev: T,
        family: &'static str,
    ) -> Result<(), BusError> {
        let scope = self.ensure_scope()?;
        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = scope.cancelled() => {
                    tracing::debug!(family, "publish dropped: scope cancelled");
                }
                res = stream.send(ev) => {
                    if let Err(err) = res {
                        tracing::debug!(family, error = %err, "publish failed");
                    }
                }
            }
        });
        self.tracker.track(handle);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
    use std::time::Duration;

    fn bus() -> FeedbackBus {
        FeedbackBus::new(BusConfig::default())
    }

    fn started_bus() -> FeedbackBus {
        let b = bus();
        b.start(&CancellationToken::new()).unwrap();
        b
    }

    #[tokio::test]
    async fn test_double_start_fails() {
        let b = started_bus();
        let err = b.start(&CancellationToken::new()).unwrap_err();
        assert!(matches!(err, BusError::AlreadyInitialized));
    }

    #[tokio::test]
    async fn test_start_after_stop_fails() {
        let b = started_bus();
        b.stop().await.unwrap();
        let err = b.start(&CancellationToken::new()).unwrap_err();
        assert!(matches!(err, BusError::AlreadyInitialized));
    }

    #[tokio::test]
    async fn test_report_before_start_fails() {
        let b = bus();
        assert!(matches!(
            b.report_metric(Metric::count("n", 1)).unwrap_err(),
            BusError::NotStarted
        ));
        assert!(matches!(
            b.report_action(Action::new("a")).unwrap_err(),
            BusError::NotStarted
        ));
    }

    #[tokio::test]
    async fn test_measure_before_start_fails_without_running_block() {
        let b = bus();
        let ran = AtomicUsize::new(0);
        let err = b
            .measure("nope", || ran.fetch_add(1, AtomicOrdering::SeqCst))
            .unwrap_err();
        assert!(matches!(err, BusError::NotStarted));
        assert_eq!(ran.load(AtomicOrdering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_queries_fail_before_start() {
        let b = bus();
        assert!(matches!(b.is_stopped().unwrap_err(), BusError::NotStarted));
        assert!(matches!(b.ensure_scope().unwrap_err(), BusError::NotStarted));
        assert!(matches!(b.stop().await.unwrap_err(), BusError::NotStarted));
    }

    #[tokio::test]
    async fn test_stop_closes_everything() {
        let b = started_bus();
        b.report_action(Action::new("last-words")).unwrap();
        b.stop().await.unwrap();

        assert!(b.is_stopped().unwrap());
        b.ensure_stopped().unwrap();
    }

    #[tokio::test]
    async fn test_double_stop_is_noop() {
        let b = started_bus();
        b.stop().await.unwrap();
        b.stop().await.unwrap();
        assert!(b.is_stopped().unwrap());
    }

    #[tokio::test]
    async fn test_early_subscriber_sees_everything_in_order() {
        let b = started_bus();
        let mut sub = b.actions().await;

        for name in ["one", "two", "three"] {
            b.report_action(Action::new(name)).unwrap();
        }
        b.wait().await;

        // Current-thread runtime schedules the spawned publishes in
        // submission order, so a single producer's events arrive in order.
        let mut seqs = Vec::new();
        for expected in ["one", "two", "three"] {
            let ev = sub.recv().await.unwrap();
            assert_eq!(ev.name.as_ref(), expected);
            seqs.push(ev.seq);
        }
        assert!(seqs.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test]
    async fn test_late_subscriber_misses_earlier_events() {
        let b = started_bus();
        b.report_action(Action::new("missed")).unwrap();
        b.wait().await;

        let mut late = b.actions().await;
        b.report_action(Action::new("seen")).unwrap();
        b.wait().await;

        assert_eq!(late.recv().await.unwrap().name.as_ref(), "seen");
        assert!(late.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_measure_reports_exactly_one_time_metric() {
        let b = started_bus();
        let mut sub = b.metrics().await;

        let out = b.measure("compute", || 41 + 1).unwrap();
        assert_eq!(out, 42);
        b.wait().await;

        let m = sub.recv().await.unwrap();
        match m {
            Metric::Time(tm) => {
                assert_eq!(tm.description.as_ref(), "compute");
                assert!(tm.ended_at >= tm.started_at);
            }
            other => panic!("expected a time metric, got {other:?}"),
        }
        assert!(sub.try_recv().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_wait_covers_all_concurrent_reports() {
        let b = Arc::new(FeedbackBus::new(BusConfig { capacity: 256 }));
        let mut sub = b.actions().await;
        b.start(&CancellationToken::new()).unwrap();

        let mut producers = Vec::new();
        for i in 0..100 {
            let b = Arc::clone(&b);
            producers.push(tokio::spawn(async move {
                b.report_action(Action::new(format!("a-{i}"))).unwrap();
            }));
        }
        for p in producers {
            p.await.unwrap();
        }
        b.wait().await;

        // Every send completed before wait() returned: all 100 are queued.
        let mut received = 0;
        while sub.try_recv().is_some() {
            received += 1;
        }
        assert_eq!(received, 100);
    }

    #[tokio::test]
    async fn test_ensure_stopped_names_scope_when_only_streams_closed() {
        let b = started_bus();
        b.metrics.close().await;
        b.actions.close().await;

        match b.ensure_stopped().unwrap_err() {
            BusError::StillActive { reasons } => assert_eq!(reasons, vec!["scope"]),
            other => panic!("expected StillActive, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_ensure_stopped_lists_every_live_piece() {
        let b = started_bus();
        match b.ensure_stopped().unwrap_err() {
            BusError::StillActive { reasons } => {
                assert_eq!(reasons, vec!["metrics stream", "actions stream", "scope"]);
            }
            other => panic!("expected StillActive, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_on_start_fires_once_at_start() {
        let b = bus();
        let fired = Arc::new(AtomicUsize::new(0));

        let f = Arc::clone(&fired);
        b.on_start(move || {
            f.fetch_add(1, AtomicOrdering::SeqCst);
        });
        assert_eq!(fired.load(AtomicOrdering::SeqCst), 0);

        b.start(&CancellationToken::new()).unwrap();
        assert_eq!(fired.load(AtomicOrdering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_on_start_overwrites_pending_callback() {
        let b = bus();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let f = Arc::clone(&first);
        b.on_start(move || {
            f.fetch_add(1, AtomicOrdering::SeqCst);
        });
        let s = Arc::clone(&second);
        b.on_start(move || {
            s.fetch_add(1, AtomicOrdering::SeqCst);
        });

        b.start(&CancellationToken::new()).unwrap();
        assert_eq!(first.load(AtomicOrdering::SeqCst), 0);
        assert_eq!(second.load(AtomicOrdering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_on_start_after_start_fires_immediately() {
        let b = started_bus();
        let fired = Arc::new(AtomicUsize::new(0));

        let f = Arc::clone(&fired);
        b.on_start(move || {
            f.fetch_add(1, AtomicOrdering::SeqCst);
        });
        assert_eq!(fired.load(AtomicOrdering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_parent_cancellation_shuts_the_bus_down() {
        let parent = CancellationToken::new();
        let b = bus();
        b.start(&parent).unwrap();

        parent.cancel();

        // The completion hook runs asynchronously; poll until it lands.
        let deadline = tokio::time::Instant::now() + Duration::from_secs(1);
        while !b.is_stopped().unwrap() {
            assert!(
                tokio::time::Instant::now() < deadline,
                "streams never closed after parent cancellation"
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        b.ensure_stopped().unwrap();
    }

    #[tokio::test]
    async fn test_report_after_stop_is_silently_dropped() {
        let b = started_bus();
        let mut sub = b.actions().await;
        b.report_action(Action::new("delivered")).unwrap();
        b.stop().await.unwrap();

        // The scope exists but is dead: accepted, then dropped by the task.
        b.report_action(Action::new("ghost")).unwrap();
        b.wait().await;

        assert_eq!(sub.recv().await.unwrap().name.as_ref(), "delivered");
        assert!(sub.recv().await.is_none());
        b.ensure_stopped().unwrap();
    }
}
