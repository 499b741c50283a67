use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use tracing::warn;

static METRICS_LOCK_POISON_WARNED: AtomicBool = AtomicBool::new(false);

fn warn_metrics_lock_poison_once(operation: &'static str) {
    if METRICS_LOCK_POISON_WARNED
        .compare_exchange(false, true, Ordering::Relaxed, Ordering::Relaxed)
        .is_ok()
    {
        warn!(operation, "metrics lock poisoned; recovered inner value");
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LoopMetricsSnapshot {
    pub tps: f32,
    pub tick_cost_ms: f32,
    pub total_ticks: u64,
    pub scene_loads: u64,
}

/// Cloneable read side of the loop metrics; the runner publishes into it.
#[derive(Clone, Debug)]
pub struct MetricsHandle {
    snapshot: Arc<RwLock<LoopMetricsSnapshot>>,
}

impl Default for MetricsHandle {
    fn default() -> Self {
        Self {
            snapshot: Arc::new(RwLock::new(LoopMetricsSnapshot::default())),
        }
    }
}

impl MetricsHandle {
    pub fn snapshot(&self) -> LoopMetricsSnapshot {
        match self.snapshot.read() {
            Ok(guard) => *guard,
            Err(poisoned) => {
                warn_metrics_lock_poison_once("read");
                *poisoned.into_inner()
            }
        }
    }

    pub(crate) fn publish(&self, snapshot: LoopMetricsSnapshot) {
        match self.snapshot.write() {
            Ok(mut guard) => *guard = snapshot,
            Err(poisoned) => {
                warn_metrics_lock_poison_once("write");
                *poisoned.into_inner() = snapshot;
            }
        }
    }
}

#[derive(Debug)]
pub(crate) struct MetricsAccumulator {
    window_start: Instant,
    window: Duration,
    window_ticks: u32,
    window_tick_cost: Duration,
    total_ticks: u64,
}

impl MetricsAccumulator {
    pub(crate) fn new(window: Duration, started_at: Instant) -> Self {
        Self {
            window_start: started_at,
            window,
            window_ticks: 0,
            window_tick_cost: Duration::ZERO,
            total_ticks: 0,
        }
    }

    pub(crate) fn record_tick(&mut self, cost: Duration) {
        self.window_ticks = self.window_ticks.saturating_add(1);
        self.window_tick_cost = self.window_tick_cost.saturating_add(cost);
        self.total_ticks = self.total_ticks.saturating_add(1);
    }

    pub(crate) fn maybe_snapshot(
        &mut self,
        now: Instant,
        scene_loads: u64,
    ) -> Option<LoopMetricsSnapshot> {
        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed < self.window {
            return None;
        }

        let elapsed_seconds = elapsed.as_secs_f32().max(f32::EPSILON);
        let tick_cost_ms = if self.window_ticks == 0 {
            0.0
        } else {
            self.window_tick_cost.as_secs_f32() * 1000.0 / self.window_ticks as f32
        };
        let snapshot = LoopMetricsSnapshot {
            tps: self.window_ticks as f32 / elapsed_seconds,
            tick_cost_ms,
            total_ticks: self.total_ticks,
            scene_loads,
        };

        self.window_start = now;
        self.window_ticks = 0;
        self.window_tick_cost = Duration::ZERO;

        Some(snapshot)
    }
}
