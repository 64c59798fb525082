//! ---
//! sds_section: "02-emission-core"
//! sds_subsection: "module"
//! sds_type: "source"
//! sds_scope: "code"
//! sds_description: "Stepwise interpolation of a scalar over a wall-clock window."
//! sds_version: "v0.1.0"
//! sds_owner: "tbd"
//! ---
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use sds_common::time::duration_to_millis;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, trace};

/// Errors raised when a transition cannot be planned.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransitionError {
    #[error("a transition needs at least one step")]
    ZeroSteps,
    #[error("transition endpoints must be finite (from {from}, to {to})")]
    NonFinite { from: f64, to: f64 },
}

/// Linear interpolation from `from` to `to` in `step_count` equal steps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransitionPlan {
    pub from: f64,
    pub to: f64,
    pub step_count: u32,
    pub step_interval: Duration,
    pub current_step: u32,
}

impl TransitionPlan {
    pub fn delta(&self) -> f64 {
        (self.to - self.from) / f64::from(self.step_count)
    }

    /// Value reported for the 1-indexed `step`.
    pub fn value_at(&self, step: u32) -> f64 {
        if step >= self.step_count {
            return self.to;
        }
        self.from + self.delta() * f64::from(step)
    }
}

/// Result of [`TransitionScheduler::start`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransitionStart {
    Scheduled {
        step_count: u32,
        step_interval: Duration,
    },
    /// Target equals the start value; nothing was scheduled.
    NoOp,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransitionState {
    Idle,
    Scheduled(TransitionPlan),
}

struct ActivePlan {
    generation: u64,
    plan: TransitionPlan,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct SchedulerInner {
    generation: u64,
    active: Option<ActivePlan>,
}

/// Drives at most one [`TransitionPlan`] at a time.
///
/// Steps run on a tokio task; `start` and `cancel` must be called from
/// within a runtime. Starting a plan aborts the previous one before the new
/// one is installed, and every step re-checks the plan generation under the
/// lock, so steps from a superseded plan never reach the callback.
#[derive(Default)]
pub struct TransitionScheduler {
    inner: Arc<Mutex<SchedulerInner>>,
}

impl std::fmt::Debug for TransitionScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransitionScheduler")
            .field("state", &self.state())
            .finish()
    }
}

impl TransitionScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `step_count` callbacks interpolating `from` to `to` over `total`.
    ///
    /// Step `i` fires `i * total / step_count` after the call and receives
    /// `(from + delta * i, i == step_count)`.
    pub fn start<F>(
        &self,
        from: f64,
        to: f64,
        total: Duration,
        step_count: u32,
        on_step: F,
    ) -> Result<TransitionStart, TransitionError>
    where
        F: Fn(f64, bool) + Send + Sync + 'static,
    {
        if step_count == 0 {
            return Err(TransitionError::ZeroSteps);
        }
        if !from.is_finite() || !to.is_finite() {
            return Err(TransitionError::NonFinite { from, to });
        }
        let plan = TransitionPlan {
            from,
            to,
            step_count,
            step_interval: total / step_count,
            current_step: 0,
        };
        if plan.delta() == 0.0 {
            debug!(from, to, "transition target equals start value, nothing scheduled");
            return Ok(TransitionStart::NoOp);
        }

        let mut inner = self.inner.lock();
        if let Some(previous) = inner.active.take() {
            previous.handle.abort();
            debug!(
                generation = previous.generation,
                completed_steps = previous.plan.current_step,
                "superseded active transition"
            );
        }
        inner.generation += 1;
        let generation = inner.generation;
        let started = Instant::now();
        let shared = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move {
            for step in 1..=step_count {
                sleep_until(started + plan.step_interval * step).await;
                let is_final = step == step_count;
                let value = {
                    let mut guard = shared.lock();
                    match guard.active.as_mut() {
                        Some(active) if active.generation == generation => {
                            active.plan.current_step = step;
                            let value = active.plan.value_at(step);
                            if is_final {
                                guard.active = None;
                            }
                            value
                        }
                        _ => return,
                    }
                };
                trace!(generation, step, value, is_final, "transition step");
                on_step(value, is_final);
            }
        });
        inner.active = Some(ActivePlan {
            generation,
            plan,
            handle,
        });
        debug!(
            generation,
            from,
            to,
            step_count,
            interval_ms = duration_to_millis(plan.step_interval),
            "transition scheduled"
        );
        Ok(TransitionStart::Scheduled {
            step_count,
            step_interval: plan.step_interval,
        })
    }

    /// Abort every pending step of the active plan. Returns whether one existed.
    pub fn cancel(&self) -> bool {
        let mut inner = self.inner.lock();
        match inner.active.take() {
            Some(active) => {
                active.handle.abort();
                debug!(
                    generation = active.generation,
                    completed_steps = active.plan.current_step,
                    "transition cancelled"
                );
                true
            }
            None => false,
        }
    }

    pub fn state(&self) -> TransitionState {
        match &self.inner.lock().active {
            Some(active) => TransitionState::Scheduled(active.plan),
            None => TransitionState::Idle,
        }
    }

    pub fn is_active(&self) -> bool {
        self.inner.lock().active.is_some()
    }
}

impl Drop for TransitionScheduler {
    fn drop(&mut self) {
        if let Some(active) = self.inner.lock().active.take() {
            active.handle.abort();
        }
    }
}
