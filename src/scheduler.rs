//! Debounced dual-timer driver for the two analysis phases
//!
//! Every schedule call rearms both timers, so the realtime pass fires after
//! `realtime_ms` of quiescence and the commit pass after `commit_after_ms`.
//! Input arriving faster than `realtime_ms` produces no pass at all until
//! the user pauses. While IME composition is active the scheduler is gated;
//! clearing the composing flag resumes scheduling once.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::trace;

use crate::config::ScheduleConfig;

/// Callback invoked when a timer fires
pub type FireCallback = Arc<dyn Fn() + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Realtime,
    Commit,
}

#[derive(Default)]
struct TimerState {
    realtime: Option<JoinHandle<()>>,
    commit: Option<JoinHandle<()>>,
    composing: bool,
    destroyed: bool,
}

struct SchedulerInner {
    config: ScheduleConfig,
    state: Mutex<TimerState>,
    on_realtime: FireCallback,
    on_commit: FireCallback,
}

/// Dual debounce timer (realtime, commit) with an IME gate
///
/// Timers are spawned Tokio tasks; construction and scheduling must happen
/// inside a Tokio runtime context.
pub struct Scheduler {
    inner: Arc<SchedulerInner>,
}

impl Scheduler {
    pub fn new(config: ScheduleConfig, on_realtime: FireCallback, on_commit: FireCallback) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                config,
                state: Mutex::new(TimerState::default()),
                on_realtime,
                on_commit,
            }),
        }
    }

    /// Rearm both debounce timers
    ///
    /// No-op while destroyed or composing. Each call cancels any pending
    /// timers and starts fresh ones, pushing both passes forward.
    pub fn schedule_analysis(&self) {
        let mut state = self.inner.state.lock().unwrap();
        if state.destroyed || state.composing {
            return;
        }
        Self::arm(&self.inner, &mut state, Phase::Realtime);
        Self::arm(&self.inner, &mut state, Phase::Commit);
    }

    fn arm(inner: &Arc<SchedulerInner>, state: &mut TimerState, phase: Phase) {
        let slot = match phase {
            Phase::Realtime => &mut state.realtime,
            Phase::Commit => &mut state.commit,
        };
        if let Some(handle) = slot.take() {
            handle.abort();
        }

        let delay = match phase {
            Phase::Realtime => inner.config.realtime_ms,
            Phase::Commit => inner.config.commit_after_ms,
        };
        let task_inner = Arc::clone(inner);
        *slot = Some(tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(delay)).await;

            // Clear our own timer slot before invoking the callback so the
            // callback observes no pending timer for this phase.
            let callback = {
                let mut state = task_inner.state.lock().unwrap();
                if state.destroyed {
                    return;
                }
                match phase {
                    Phase::Realtime => {
                        state.realtime = None;
                        Arc::clone(&task_inner.on_realtime)
                    }
                    Phase::Commit => {
                        state.commit = None;
                        Arc::clone(&task_inner.on_commit)
                    }
                }
            };
            trace!(?phase, "debounce timer fired");
            callback();
        }));
    }

    /// Cancel both timers and fire the commit callback immediately
    ///
    /// The realtime timer is dropped without firing; commit subsumes it.
    pub fn force_commit(&self) {
        let callback = {
            let mut state = self.inner.state.lock().unwrap();
            if state.destroyed {
                return;
            }
            if let Some(handle) = state.realtime.take() {
                handle.abort();
            }
            if let Some(handle) = state.commit.take() {
                handle.abort();
            }
            Arc::clone(&self.inner.on_commit)
        };
        callback();
    }

    /// Update the IME composing flag
    ///
    /// Clearing the flag resumes analysis with a fresh schedule.
    pub fn set_composing(&self, composing: bool) {
        let resumed = {
            let mut state = self.inner.state.lock().unwrap();
            if state.destroyed {
                return;
            }
            let was_composing = state.composing;
            state.composing = composing;
            was_composing && !composing
        };
        if resumed {
            self.schedule_analysis();
        }
    }

    pub fn is_composing(&self) -> bool {
        self.inner.state.lock().unwrap().composing
    }

    /// Cancel both timers without firing
    pub fn cancel(&self) {
        let mut state = self.inner.state.lock().unwrap();
        if let Some(handle) = state.realtime.take() {
            handle.abort();
        }
        if let Some(handle) = state.commit.take() {
            handle.abort();
        }
    }

    pub fn is_pending_commit(&self) -> bool {
        self.inner.state.lock().unwrap().commit.is_some()
    }

    /// Cancel timers and refuse all further scheduling
    pub fn destroy(&self) {
        let mut state = self.inner.state.lock().unwrap();
        state.destroyed = true;
        if let Some(handle) = state.realtime.take() {
            handle.abort();
        }
        if let Some(handle) = state.commit.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_scheduler(config: ScheduleConfig) -> (Scheduler, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let realtime_fires = Arc::new(AtomicUsize::new(0));
        let commit_fires = Arc::new(AtomicUsize::new(0));
        let realtime_clone = Arc::clone(&realtime_fires);
        let commit_clone = Arc::clone(&commit_fires);
        let scheduler = Scheduler::new(
            config,
            Arc::new(move || {
                realtime_clone.fetch_add(1, Ordering::SeqCst);
            }),
            Arc::new(move || {
                commit_clone.fetch_add(1, Ordering::SeqCst);
            }),
        );
        (scheduler, realtime_fires, commit_fires)
    }

    #[tokio::test(start_paused = true)]
    async fn test_both_phases_fire_after_quiescence() {
        let (scheduler, realtime, commit) = counting_scheduler(ScheduleConfig::default());
        scheduler.schedule_analysis();
        assert!(scheduler.is_pending_commit());

        tokio::time::sleep(Duration::from_millis(160)).await;
        assert_eq!(realtime.load(Ordering::SeqCst), 1);
        assert_eq!(commit.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(realtime.load(Ordering::SeqCst), 1);
        assert_eq!(commit.load(Ordering::SeqCst), 1);
        assert!(!scheduler.is_pending_commit());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_input_defers_both_phases() {
        let (scheduler, realtime, commit) = counting_scheduler(ScheduleConfig::default());

        // Keystrokes 100ms apart, faster than the 150ms realtime debounce
        for _ in 0..5 {
            scheduler.schedule_analysis();
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert_eq!(realtime.load(Ordering::SeqCst), 0);
        assert_eq!(commit.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(700)).await;
        assert_eq!(realtime.load(Ordering::SeqCst), 1);
        assert_eq!(commit.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_force_commit_suppresses_realtime() {
        let (scheduler, realtime, commit) = counting_scheduler(ScheduleConfig::default());
        scheduler.schedule_analysis();
        scheduler.force_commit();

        assert_eq!(commit.load(Ordering::SeqCst), 1);
        assert!(!scheduler.is_pending_commit());

        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(realtime.load(Ordering::SeqCst), 0);
        assert_eq!(commit.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_composing_gates_scheduling() {
        let (scheduler, realtime, commit) = counting_scheduler(ScheduleConfig::default());
        scheduler.set_composing(true);
        scheduler.schedule_analysis();

        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(realtime.load(Ordering::SeqCst), 0);
        assert_eq!(commit.load(Ordering::SeqCst), 0);

        // Ending composition resumes with a fresh schedule
        scheduler.set_composing(false);
        tokio::time::sleep(Duration::from_millis(800)).await;
        assert_eq!(realtime.load(Ordering::SeqCst), 1);
        assert_eq!(commit.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_drops_pending_timers() {
        let (scheduler, realtime, commit) = counting_scheduler(ScheduleConfig::default());
        scheduler.schedule_analysis();
        scheduler.cancel();

        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(realtime.load(Ordering::SeqCst), 0);
        assert_eq!(commit.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_destroyed_scheduler_refuses_everything() {
        let (scheduler, realtime, commit) = counting_scheduler(ScheduleConfig::default());
        scheduler.schedule_analysis();
        scheduler.destroy();

        scheduler.schedule_analysis();
        scheduler.force_commit();

        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(realtime.load(Ordering::SeqCst), 0);
        assert_eq!(commit.load(Ordering::SeqCst), 0);
    }
}
