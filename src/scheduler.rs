//! Adaptive Refresh Scheduler
//!
//! Owns the refresh timer and the one-second countdown timer. Both timers are
//! spawned tokio tasks that post [`SchedulerEvent`]s to the UI loop; the UI
//! loop feeds them back through [`Scheduler::on_refresh_due`] and
//! [`Scheduler::on_countdown_tick`].
//!
//! At most one refresh timer and one countdown timer are armed at any time.
//! Re-arming drops the old handles (which aborts their tasks) and bumps the
//! generation, so events already queued by the old timers are ignored.

use crate::resource::model::{any_transitional, ManagedResource};
use std::fmt;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant, MissedTickBehavior};

/// How long a start/stop keeps the fast cadence
pub const RECENT_ACTION_WINDOW: Duration = Duration::from_secs(10);

pub const RECENT_ACTION_INTERVAL_MS: u64 = 3_000;
pub const TRANSITIONAL_INTERVAL_MS: u64 = 5_000;
pub const IDLE_INTERVAL_MS: u64 = 60_000;

const COUNTDOWN_PERIOD: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshReason {
    RecentAction,
    TransitionalState,
    Idle,
}

impl fmt::Display for RefreshReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::RecentAction => "recent action",
            Self::TransitionalState => "transitional state",
            Self::Idle => "idle",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshPolicy {
    pub interval_ms: u64,
    pub reason: RefreshReason,
}

impl RefreshPolicy {
    /// Pick the cadence for the next cycle. A recent action wins over the
    /// snapshot contents.
    pub fn derive(snapshot: &[ManagedResource], last_action: Option<Instant>, now: Instant) -> Self {
        let recent = last_action
            .map(|at| now.saturating_duration_since(at) < RECENT_ACTION_WINDOW)
            .unwrap_or(false);

        if recent {
            Self {
                interval_ms: RECENT_ACTION_INTERVAL_MS,
                reason: RefreshReason::RecentAction,
            }
        } else if any_transitional(snapshot) {
            Self {
                interval_ms: TRANSITIONAL_INTERVAL_MS,
                reason: RefreshReason::TransitionalState,
            }
        } else {
            Self {
                interval_ms: IDLE_INTERVAL_MS,
                reason: RefreshReason::Idle,
            }
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Countdown start value, `floor(interval / 1000)`
    pub fn countdown_start(&self) -> u64 {
        (self.interval_ms / 1000).max(1)
    }
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        Self {
            interval_ms: IDLE_INTERVAL_MS,
            reason: RefreshReason::Idle,
        }
    }
}

/// Interval in milliseconds for a snapshot and last action time
pub fn derive_interval(snapshot: &[ManagedResource], last_action: Option<Instant>, now: Instant) -> u64 {
    RefreshPolicy::derive(snapshot, last_action, now).interval_ms
}

/// Next countdown value; wraps to `initial` instead of reaching zero
pub fn next_countdown(remaining: u64, initial: u64) -> u64 {
    if remaining <= 1 {
        initial
    } else {
        remaining - 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerEvent {
    RefreshDue { generation: u64 },
    CountdownTick { generation: u64 },
}

/// A periodic timer task, aborted when the handle is dropped
struct TimerHandle {
    task: JoinHandle<()>,
}

impl TimerHandle {
    fn spawn(period: Duration, tx: UnboundedSender<SchedulerEvent>, event: SchedulerEvent) -> Self {
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if tx.send(event).is_err() {
                    break;
                }
            }
        });
        Self { task }
    }

    fn is_armed(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

pub struct Scheduler {
    events: UnboundedSender<SchedulerEvent>,
    refresh_timer: Option<TimerHandle>,
    countdown_timer: Option<TimerHandle>,
    generation: u64,
    policy: RefreshPolicy,
    remaining_seconds: u64,
    active: bool,
    in_flight: bool,
    last_action: Option<Instant>,
}

impl Scheduler {
    /// Create a stopped scheduler and the receiver its timers post to
    pub fn new() -> (Self, UnboundedReceiver<SchedulerEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let policy = RefreshPolicy::default();
        let scheduler = Self {
            events,
            refresh_timer: None,
            countdown_timer: None,
            generation: 0,
            remaining_seconds: policy.countdown_start(),
            policy,
            active: false,
            in_flight: false,
            last_action: None,
        };
        (scheduler, rx)
    }

    /// STOPPED → ACTIVE. On an active scheduler this only re-arms.
    pub fn start(&mut self, snapshot: &[ManagedResource]) {
        if !self.active {
            tracing::info!("Auto-refresh started");
        }
        self.active = true;
        self.rearm(snapshot);
    }

    /// ACTIVE → STOPPED. Cancels both timers; safe to call repeatedly.
    /// An in-flight refresh is not cancelled, its result is applied without re-arming.
    pub fn stop(&mut self) {
        if self.active {
            tracing::info!("Auto-refresh stopped");
        }
        self.active = false;
        self.cancel();
    }

    fn cancel(&mut self) {
        self.refresh_timer = None;
        self.countdown_timer = None;
        self.generation += 1;
    }

    /// Recompute the policy and replace both timers. No-op while stopped.
    pub fn rearm(&mut self, snapshot: &[ManagedResource]) {
        if !self.active {
            return;
        }
        self.cancel();

        self.policy = RefreshPolicy::derive(snapshot, self.last_action, Instant::now());
        self.remaining_seconds = self.policy.countdown_start();

        let generation = self.generation;
        self.refresh_timer = Some(TimerHandle::spawn(
            self.policy.interval(),
            self.events.clone(),
            SchedulerEvent::RefreshDue { generation },
        ));
        self.countdown_timer = Some(TimerHandle::spawn(
            COUNTDOWN_PERIOD,
            self.events.clone(),
            SchedulerEvent::CountdownTick { generation },
        ));

        tracing::debug!(
            "Next refresh in {}ms ({})",
            self.policy.interval_ms,
            self.policy.reason
        );
    }

    /// Note an operator start/stop; the next re-arm uses the fast cadence
    pub fn record_action(&mut self) {
        self.last_action = Some(Instant::now());
    }

    /// Feed one timer event back. Returns true when a refresh should begin now.
    pub fn handle(&mut self, event: SchedulerEvent) -> bool {
        match event {
            SchedulerEvent::RefreshDue { generation } => self.on_refresh_due(generation),
            SchedulerEvent::CountdownTick { generation } => {
                self.on_countdown_tick(generation);
                false
            }
        }
    }

    /// Returns true when the refresh should run. Stale and reentrant ticks are dropped.
    pub fn on_refresh_due(&mut self, generation: u64) -> bool {
        if !self.active || generation != self.generation {
            return false;
        }
        if self.in_flight {
            tracing::debug!("Refresh tick skipped, previous refresh still running");
            return false;
        }
        true
    }

    pub fn on_countdown_tick(&mut self, generation: u64) {
        if !self.active || generation != self.generation {
            return;
        }
        self.remaining_seconds = next_countdown(self.remaining_seconds, self.policy.countdown_start());
    }

    /// Claim the in-flight slot. False when a refresh is already running.
    pub fn begin_refresh(&mut self) -> bool {
        if self.in_flight {
            return false;
        }
        self.in_flight = true;
        true
    }

    /// Release the in-flight slot and re-arm from the snapshot now displayed
    pub fn finish_refresh(&mut self, snapshot: &[ManagedResource]) {
        self.in_flight = false;
        self.rearm(snapshot);
    }

    /// Armed (refresh, countdown) timers; each is 0 or 1
    pub fn armed_timers(&self) -> (usize, usize) {
        let count = |t: &Option<TimerHandle>| t.as_ref().map_or(0, |t| usize::from(t.is_armed()));
        (count(&self.refresh_timer), count(&self.countdown_timer))
    }

    pub fn countdown_seconds(&self) -> u64 {
        self.remaining_seconds
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_refreshing(&self) -> bool {
        self.in_flight
    }

    pub fn policy(&self) -> RefreshPolicy {
        self.policy
    }

    pub fn last_action(&self) -> Option<Instant> {
        self.last_action
    }

    /// Generation stamped on events from the currently armed timers
    pub fn generation(&self) -> u64 {
        self.generation
    }
}
