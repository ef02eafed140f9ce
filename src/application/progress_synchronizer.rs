//! Progress synchronizer
//!
//! Polls the progress source on a fixed cadence and keeps the chart surface in
//! step with remote training progress:
//!
//! - one repeating timer per synchronizer (`start` is idempotent)
//! - one fetch per tick; failures are logged and retried on the next tick
//! - snapshots are applied one at a time behind an async mutex, and every
//!   series is guarded by its own epoch watermark so duplicate or reordered
//!   responses never produce duplicate or regressive points
//! - the terminal snapshot is always flushed, then the timer is released and
//!   the completion signal fires
//!
//! The timer task only holds a weak reference to the shared state, so dropping
//! the last `ProgressSynchronizer` handle tears polling down as well.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, PoisonError, Weak};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn, Instrument};
use uuid::Uuid;

use crate::application::backoff::BackoffPolicy;
use crate::application::readout::ProgressReadout;
use crate::domain::constants::{CONVERGENCE_SERIES_NAME, PROGRESS_GAUGE_NAME};
use crate::domain::errors::FetchError;
use crate::domain::events::SyncEvent;
use crate::domain::progress::{LossComponents, ProgressSnapshot};
use crate::domain::services::{ChartSurface, ProgressSource, SeriesHandle};
use crate::domain::session::SessionKey;
use crate::domain::watermark::SeriesWatermark;

const EVENT_CHANNEL_CAPACITY: usize = 256;
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Process-local synchronization state for one training session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncState {
    pub last_appended_epoch: Option<u64>,
    pub last_appended_convergence_epoch: Option<u64>,
    pub polling_active: bool,
}

/// What one `apply_snapshot` call did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyOutcome {
    pub epoch: Option<u64>,
    pub percentage: Option<u8>,
    pub loss_appended: bool,
    pub convergence_appended: bool,
    pub completed: bool,
    /// The session had already completed; nothing was touched
    pub ignored: bool,
}

/// Result of a single tick
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    Applied(ApplyOutcome),
    Failed(FetchError),
    /// Polling was stopped before or during the fetch
    Skipped,
}

/// Chart state guarded by the apply mutex
struct SyncCore {
    surface: Box<dyn ChartSurface>,
    loss_chart: SeriesHandle,
    convergence_chart: SeriesHandle,
    gauge: SeriesHandle,
    loss_watermark: SeriesWatermark,
    convergence_watermark: SeriesWatermark,
    readout: ProgressReadout,
}

impl SyncCore {
    fn new(mut surface: Box<dyn ChartSurface>) -> Self {
        let loss_chart = surface.create_series(&LossComponents::SERIES_NAMES);
        let convergence_chart = surface.create_series(&[CONVERGENCE_SERIES_NAME]);
        let gauge = surface.create_series(&[PROGRESS_GAUGE_NAME]);
        surface.set_value(gauge, 0.0);

        Self {
            surface,
            loss_chart,
            convergence_chart,
            gauge,
            loss_watermark: SeriesWatermark::new(),
            convergence_watermark: SeriesWatermark::new(),
            readout: ProgressReadout::default(),
        }
    }

    fn apply(&mut self, snapshot: &ProgressSnapshot) -> ApplyOutcome {
        let terminal = snapshot.is_completed();
        let mut outcome = ApplyOutcome {
            epoch: snapshot.current_epoch,
            percentage: snapshot.percentage(),
            completed: terminal,
            ..ApplyOutcome::default()
        };

        self.readout.update(snapshot);

        if let Some(epoch) = snapshot.current_epoch {
            #[allow(clippy::cast_precision_loss)]
            let x = epoch as f64;

            if let Some(losses) = snapshot.losses() {
                if self.loss_watermark.try_advance(epoch, terminal) {
                    for (index, y) in losses.as_array().into_iter().enumerate() {
                        self.surface.append_point(self.loss_chart, index, x, y);
                    }
                    self.surface.autoscale(self.loss_chart);
                    outcome.loss_appended = true;
                }
            } else {
                debug!("Snapshot for epoch {} is missing loss values, loss chart left as is", epoch);
            }

            if let Some(rate) = snapshot.convergence_rate {
                if self.convergence_watermark.try_advance(epoch, terminal) {
                    self.surface.append_point(self.convergence_chart, 0, x, rate);
                    outcome.convergence_appended = true;
                }
            }
        } else {
            debug!("Snapshot has no current_epoch, charts left as is");
        }

        if outcome.percentage.is_some() {
            self.surface.set_value(self.gauge, self.readout.gauge_value);
        }

        outcome
    }
}

struct PollTimer {
    token: CancellationToken,
    task: JoinHandle<()>,
    run_id: Uuid,
}

impl PollTimer {
    fn is_live(&self) -> bool {
        !self.token.is_cancelled() && !self.task.is_finished()
    }
}

struct Shared {
    key: SessionKey,
    source: Arc<dyn ProgressSource>,
    core: Mutex<SyncCore>,
    timer: std::sync::Mutex<Option<PollTimer>>,
    backoff: BackoffPolicy,
    consecutive_failures: AtomicU32,
    event_tx: broadcast::Sender<SyncEvent>,
    completion_tx: watch::Sender<bool>,
    readout_tx: watch::Sender<ProgressReadout>,
}

impl Shared {
    fn emit(&self, event: SyncEvent) {
        // No subscribers is fine
        let _ = self.event_tx.send(event);
    }

    fn timer_slot(&self) -> std::sync::MutexGuard<'_, Option<PollTimer>> {
        self.timer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_polling(&self) -> bool {
        self.timer_slot().as_ref().is_some_and(PollTimer::is_live)
    }

    /// Take the timer out of its slot and cancel it. Returns whether one was live.
    fn release_timer(&self) -> bool {
        let Some(timer) = self.timer_slot().take() else {
            return false;
        };
        let was_live = timer.is_live();
        timer.token.cancel();
        debug!("Released poll timer {}", timer.run_id);
        was_live
    }

    async fn tick(&self, token: Option<&CancellationToken>) -> TickOutcome {
        if token.is_some_and(CancellationToken::is_cancelled) {
            return TickOutcome::Skipped;
        }

        let result = match token {
            Some(token) => {
                tokio::select! {
                    biased;
                    () = token.cancelled() => Err(FetchError::Cancelled { url: self.key.to_string() }),
                    result = self.source.fetch_progress(&self.key) => result,
                }
            }
            None => self.source.fetch_progress(&self.key).await,
        };

        match result {
            Ok(snapshot) => {
                // A response that lands after stop() is dropped
                if token.is_some_and(CancellationToken::is_cancelled) {
                    debug!("Dropping snapshot received after polling stopped");
                    return TickOutcome::Skipped;
                }
                self.consecutive_failures.store(0, Ordering::Release);
                TickOutcome::Applied(self.apply(&snapshot).await)
            }
            Err(error) if !error.is_retryable() => {
                debug!("Tick abandoned: {}", error);
                TickOutcome::Skipped
            }
            Err(error) => {
                let failures = self.consecutive_failures.fetch_add(1, Ordering::AcqRel) + 1;
                warn!(
                    "⚠️  Error fetching training progress ({}, attempt {}): {}",
                    error.kind(),
                    failures,
                    error
                );
                self.emit(SyncEvent::TickFailed {
                    kind: error.kind().to_string(),
                    message: error.to_string(),
                    consecutive_failures: failures,
                });
                TickOutcome::Failed(error)
            }
        }
    }

    async fn apply(&self, snapshot: &ProgressSnapshot) -> ApplyOutcome {
        let outcome = {
            let mut core = self.core.lock().await;
            // Checked and set under the apply lock so at most one terminal flush happens
            if *self.completion_tx.borrow() {
                debug!(
                    "Ignoring snapshot for epoch {:?}, session already completed",
                    snapshot.current_epoch
                );
                return ApplyOutcome {
                    epoch: snapshot.current_epoch,
                    completed: true,
                    ignored: true,
                    ..ApplyOutcome::default()
                };
            }
            let outcome = core.apply(snapshot);
            self.readout_tx.send_replace(core.readout.clone());
            if outcome.completed {
                // Timer goes first so waiters never observe a live timer after completion
                self.release_timer();
                self.completion_tx.send_replace(true);
            }
            outcome
        };

        debug!(
            "📊 Applied snapshot - epoch: {:?}, percentage: {:?}, loss appended: {}, convergence appended: {}",
            outcome.epoch, outcome.percentage, outcome.loss_appended, outcome.convergence_appended
        );
        self.emit(SyncEvent::SnapshotApplied {
            epoch: outcome.epoch,
            percentage: outcome.percentage,
            loss_appended: outcome.loss_appended,
            convergence_appended: outcome.convergence_appended,
        });

        if outcome.completed {
            info!("✅ Training completed for {}, stopping polling", self.key);
            self.emit(SyncEvent::Completed {
                session: self.key.clone(),
                final_epoch: outcome.epoch,
                timestamp: Utc::now(),
            });
        }

        outcome
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        let slot = self.timer.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(timer) = slot.take() {
            timer.token.cancel();
        }
    }
}

async fn poll_loop(shared: Weak<Shared>, period: Duration, token: CancellationToken) {
    // Like a browser interval: the first tick fires one period after start
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            () = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let (failures, delay) = {
            let Some(state) = shared.upgrade() else {
                break;
            };
            let failures = state.consecutive_failures.load(Ordering::Acquire);
            (failures, state.backoff.delay_for(failures))
        };

        if !delay.is_zero() {
            debug!("Backing off {:?} after {} failed ticks", delay, failures);
            tokio::select! {
                biased;
                () = token.cancelled() => break,
                () = time::sleep(delay) => {}
            }
            // The delayed fetch runs now; the cadence restarts from here
            ticker.reset();
        }

        let Some(state) = shared.upgrade() else {
            break;
        };

        // Each fetch runs on its own task so a slow response never delays the cadence
        let tick_token = token.clone();
        tokio::spawn(
            async move {
                state.tick(Some(&tick_token)).await;
            }
            .in_current_span(),
        );
    }

    debug!("Poll loop exited");
}

/// Keeps chart series and readouts in sync with a remote training session
#[derive(Clone)]
pub struct ProgressSynchronizer {
    shared: Arc<Shared>,
}

impl ProgressSynchronizer {
    pub fn new(
        key: SessionKey,
        source: Arc<dyn ProgressSource>,
        surface: Box<dyn ChartSurface>,
    ) -> Self {
        Self::with_backoff(key, source, surface, BackoffPolicy::disabled())
    }

    pub fn with_backoff(
        key: SessionKey,
        source: Arc<dyn ProgressSource>,
        surface: Box<dyn ChartSurface>,
        backoff: BackoffPolicy,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (completion_tx, _) = watch::channel(false);
        let (readout_tx, _) = watch::channel(ProgressReadout::default());

        Self {
            shared: Arc::new(Shared {
                key,
                source,
                core: Mutex::new(SyncCore::new(surface)),
                timer: std::sync::Mutex::new(None),
                backoff,
                consecutive_failures: AtomicU32::new(0),
                event_tx,
                completion_tx,
                readout_tx,
            }),
        }
    }

    pub fn session(&self) -> &SessionKey {
        &self.shared.key
    }

    /// Begin polling every `poll_interval`.
    ///
    /// Returns `false` (and does nothing) if a timer is already live. Must be
    /// called from within a tokio runtime.
    pub fn start(&self, poll_interval: Duration) -> bool {
        let period = poll_interval.max(MIN_POLL_INTERVAL);
        let run_id = Uuid::new_v4();

        {
            let mut slot = self.shared.timer_slot();
            if slot.as_ref().is_some_and(PollTimer::is_live) {
                debug!("Polling already active for {}, start ignored", self.shared.key);
                return false;
            }

            // Restarting after completion opens a new polling run; watermarks are kept
            self.shared.completion_tx.send_replace(false);
            self.shared.consecutive_failures.store(0, Ordering::Release);

            let token = CancellationToken::new();
            let span = tracing::info_span!("poll", session = %self.shared.key, run = %run_id);
            let task = tokio::spawn(
                poll_loop(Arc::downgrade(&self.shared), period, token.clone()).instrument(span),
            );
            *slot = Some(PollTimer { token, task, run_id });
        }

        #[allow(clippy::cast_possible_truncation)]
        let interval_ms = period.as_millis() as u64;
        info!("🔄 Started progress polling for {} every {}ms", self.shared.key, interval_ms);
        self.shared.emit(SyncEvent::Started {
            session: self.shared.key.clone(),
            interval_ms,
            timestamp: Utc::now(),
        });
        true
    }

    /// Cancel the timer. Safe to call any number of times.
    ///
    /// Returns whether a live timer was cancelled.
    pub fn stop(&self) -> bool {
        let was_live = self.shared.release_timer();
        if was_live {
            info!("🛑 Stopped progress polling for {}", self.shared.key);
            self.shared.emit(SyncEvent::Stopped { timestamp: Utc::now() });
        }
        was_live
    }

    /// One fetch + apply, outside the timer
    pub async fn tick(&self) -> TickOutcome {
        self.shared.tick(None).await
    }

    /// Apply one snapshot under the watermark rule
    pub async fn apply_snapshot(&self, snapshot: &ProgressSnapshot) -> ApplyOutcome {
        self.shared.apply(snapshot).await
    }

    pub fn is_polling(&self) -> bool {
        self.shared.is_polling()
    }

    pub async fn state(&self) -> SyncState {
        let core = self.shared.core.lock().await;
        SyncState {
            last_appended_epoch: core.loss_watermark.last_appended(),
            last_appended_convergence_epoch: core.convergence_watermark.last_appended(),
            polling_active: self.shared.is_polling(),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.shared.event_tx.subscribe()
    }

    /// Completion signal: flips to `true` once the terminal snapshot is applied
    pub fn completion(&self) -> watch::Receiver<bool> {
        self.shared.completion_tx.subscribe()
    }

    pub fn readout(&self) -> watch::Receiver<ProgressReadout> {
        self.shared.readout_tx.subscribe()
    }

    pub fn is_completed(&self) -> bool {
        *self.shared.completion_tx.borrow()
    }

    /// Wait until the completion signal fires
    pub async fn wait_for_completion(&self) {
        let mut rx = self.completion();
        // The sender lives as long as `self`, so this only returns on completion
        let _ = rx.wait_for(|done| *done).await;
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.shared.consecutive_failures.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for ProgressSynchronizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressSynchronizer")
            .field("session", &self.shared.key)
            .field("polling", &self.is_polling())
            .field("completed", &self.is_completed())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::progress::TrainingStatus;
    use crate::infrastructure::chart_surface::MemoryChartSurface;
    use async_trait::async_trait;

    struct NeverSource;

    #[async_trait]
    impl ProgressSource for NeverSource {
        async fn fetch_progress(&self, key: &SessionKey) -> Result<ProgressSnapshot, FetchError> {
            Err(FetchError::Transport { url: key.to_string(), message: "offline".into() })
        }
    }

    fn snapshot(epoch: u64, status: TrainingStatus) -> ProgressSnapshot {
        ProgressSnapshot {
            current_epoch: Some(epoch),
            total_epochs: Some(100),
            status,
            total_loss: Some(0.05),
            physics_loss: Some(0.02),
            boundary_loss: Some(0.02),
            initial_loss: Some(0.01),
            convergence_rate: None,
        }
    }

    fn synchronizer() -> (ProgressSynchronizer, MemoryChartSurface) {
        let surface = MemoryChartSurface::new();
        let sync = ProgressSynchronizer::new(
            SessionKey::default(),
            Arc::new(NeverSource),
            Box::new(surface.clone()),
        );
        (sync, surface)
    }

    #[tokio::test]
    async fn test_scenario_in_progress_then_completed_at_same_epoch() {
        let (sync, surface) = synchronizer();

        let first = sync.apply_snapshot(&snapshot(10, TrainingStatus::InProgress)).await;
        assert!(first.loss_appended);
        assert!(!first.completed);
        assert_eq!(first.percentage, Some(10));
        assert_eq!(sync.state().await.last_appended_epoch, Some(10));
        assert_eq!(sync.readout().borrow().percentage, Some(10));

        let second = sync.apply_snapshot(&snapshot(10, TrainingStatus::Completed)).await;
        assert!(second.loss_appended);
        assert!(second.completed);
        assert!(sync.is_completed());

        let total = surface.series_points("Total Loss");
        assert_eq!(total, vec![(10.0, 0.05), (10.0, 0.05)]);
        assert_eq!(surface.series_points("Physics Loss").len(), 2);
    }

    #[tokio::test]
    async fn test_snapshots_after_completion_are_ignored() {
        let (sync, surface) = synchronizer();
        sync.apply_snapshot(&snapshot(50, TrainingStatus::Completed)).await;

        let late = sync.apply_snapshot(&snapshot(60, TrainingStatus::InProgress)).await;
        assert!(late.ignored);
        assert_eq!(surface.series_epochs("Total Loss"), vec![50.0]);
    }

    #[tokio::test]
    async fn test_gauge_tracks_percentage() {
        let (sync, surface) = synchronizer();
        sync.apply_snapshot(&snapshot(37, TrainingStatus::InProgress)).await;
        assert_eq!(surface.gauge_value(PROGRESS_GAUGE_NAME), Some(37.0));
    }

    #[tokio::test]
    async fn test_failed_tick_leaves_state_untouched() {
        let (sync, surface) = synchronizer();
        let outcome = sync.tick().await;
        assert!(matches!(outcome, TickOutcome::Failed(FetchError::Transport { .. })));
        assert_eq!(sync.consecutive_failures(), 1);
        assert_eq!(sync.state().await.last_appended_epoch, None);
        assert!(surface.series_points("Total Loss").is_empty());
    }
}
