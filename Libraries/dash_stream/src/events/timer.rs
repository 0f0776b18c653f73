use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::bus::{NotificationBus, StreamEvent};
use crate::collab::{ManifestLoader, ManifestModel, PlaybackController};
use crate::config::tick_period;
use crate::events::{EventTables, TickOutcome};
use crate::types::ScheduledEvent;

/// State shared between the timer handle and its periodic task.
struct TimerCore {
    /// Held for a whole tick, reloads included. `clear` takes it after cancelling so no
    /// tick outlives it.
    gate: Mutex<()>,
    tables: Mutex<EventTables>,
    playback: Arc<dyn PlaybackController>,
    manifest: Arc<dyn ManifestModel>,
    loader: Arc<dyn ManifestLoader>,
    bus: NotificationBus,
    /// Tick period expressed in clock units (seconds).
    tolerance: f64,
}

impl TimerCore {
    fn tick(&self, token: Option<&CancellationToken>) -> TickOutcome {
        let _running = self.gate.lock();
        if token.is_some_and(|t| t.is_cancelled()) {
            return TickOutcome::default();
        }
        let outcome = self
            .tables
            .lock()
            .evaluate(self.playback.time(), self.tolerance);

        for _ in 0..outcome.reloads {
            self.refresh_manifest();
        }
        outcome
    }

    fn refresh_manifest(&self) {
        let url = self.manifest.reload_url();
        info!("Refresh manifest @ {}", url);
        self.bus.publish(StreamEvent::ManifestReloadRequested { url: url.clone() });
        self.loader.load(&url);
    }
}

/// Fires scheduled events against the playback clock on a fixed period.
pub struct EventTimer {
    core: Arc<TimerCore>,
    period: Option<Duration>,
    running: Option<(CancellationToken, JoinHandle<()>)>,
}

impl EventTimer {
    /// `period_ms` that is not a finite positive number disables the timer.
    pub fn new(
        period_ms: f64,
        playback: Arc<dyn PlaybackController>,
        manifest: Arc<dyn ManifestModel>,
        loader: Arc<dyn ManifestLoader>,
        bus: NotificationBus,
    ) -> Self {
        let period = tick_period(period_ms);
        if period.is_none() {
            warn!("Event timer period {} ms is not usable, event timer disabled", period_ms);
        }
        Self {
            core: Arc::new(TimerCore {
                gate: Mutex::new(()),
                tables: Mutex::new(EventTables::default()),
                playback,
                manifest,
                loader,
                bus,
                tolerance: period.map(|p| p.as_secs_f64()).unwrap_or(0.0),
            }),
            period,
            running: None,
        }
    }

    pub fn add_inline_events(&self, events: Vec<ScheduledEvent>) {
        self.core.tables.lock().replace_inline(events);
    }

    pub fn add_inband_events(&self, events: Vec<ScheduledEvent>) -> usize {
        self.core.tables.lock().merge_inband(events)
    }

    /// Spawns the periodic tick on the current tokio runtime. Does nothing when the timer
    /// is disabled, already running, or no runtime is available.
    pub fn start(&mut self) {
        info!("Start Event Controller");
        let Some(period) = self.period else {
            return;
        };
        if self.is_running() {
            debug!("Event timer already running");
            return;
        }
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                warn!("Event timer not started, no runtime available: {}", e);
                return;
            }
        };

        let token = CancellationToken::new();
        let core = Arc::clone(&self.core);
        let task_token = token.clone();
        let task = handle.spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick completes immediately; evaluation starts one period in.
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = task_token.cancelled() => break,
                    _ = interval.tick() => {
                        core.tick(Some(&task_token));
                    }
                }
            }
        });
        self.running = Some((token, task));
    }

    /// Evaluates once against the current clock reading.
    pub fn tick(&self) -> TickOutcome {
        if self.period.is_none() {
            return TickOutcome::default();
        }
        self.core.tick(None)
    }

    /// Stops the periodic tick. Returns only once a tick already in progress has
    /// finished. Safe when already stopped.
    pub fn clear(&mut self) {
        if let Some((token, task)) = self.running.take() {
            token.cancel();
            task.abort();
            drop(self.core.gate.lock());
        }
    }

    /// Stops the periodic tick and discards every event.
    pub fn reset(&mut self) {
        self.clear();
        self.core.tables.lock().clear();
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    pub fn is_enabled(&self) -> bool {
        self.period.is_some()
    }

    pub fn pending_inline(&self) -> usize {
        self.core.tables.lock().pending_inline()
    }

    pub fn pending_inband(&self) -> usize {
        self.core.tables.lock().pending_inband()
    }

    pub fn is_active(&self, id: u64) -> bool {
        self.core.tables.lock().is_active(id)
    }
}

impl Drop for EventTimer {
    fn drop(&mut self) {
        self.clear();
    }
}
