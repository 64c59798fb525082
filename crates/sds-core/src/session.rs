//! ---
//! sds_section: "02-emission-core"
//! sds_subsection: "module"
//! sds_type: "source"
//! sds_scope: "code"
//! sds_description: "Session lifecycle and emission orchestration."
//! sds_version: "v0.1.0"
//! sds_owner: "tbd"
//! ---
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::Mutex;
use sds_common::SessionConfig;
use sds_logging::{
    log_session_event, sds_debug, sds_info, sds_warn, LogContext, SessionEventOutcome,
};
use tokio::sync::watch;
use uuid::Uuid;

use crate::clock::SimulationClock;
use crate::debounce::DebounceGate;
use crate::dispatch::{deliver, TelemetryDispatch};
use crate::position::{normalize_direction, Position, PositionState};
use crate::telemetry::{Emission, EmissionKind, PathPattern, StopPayload, TelemetrySnapshot};
use crate::transition::{TransitionError, TransitionScheduler, TransitionStart, TransitionState};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("start time must be confirmed before the session can run")]
    StartTimeNotConfirmed,
    #[error("session is not running")]
    NotRunning,
    #[error("operation not allowed while the session is running")]
    Busy,
    #[error(transparent)]
    Transition(#[from] TransitionError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionStatus {
    #[default]
    Stopped,
    Running,
}

/// Fields the operator can edit directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Latitude,
    Longitude,
    Position,
    Direction,
    Mode,
    StartTime,
}

/// Lifecycle flags of the (single) simulation session.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationSession {
    pub status: SessionStatus,
    pub first_emission_pending: bool,
    pub mode: PathPattern,
    pub session_id: Option<Uuid>,
}

impl SimulationSession {
    fn new(mode: PathPattern) -> Self {
        Self {
            status: SessionStatus::Stopped,
            first_emission_pending: true,
            mode,
            session_id: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == SessionStatus::Running
    }
}

/// Render props published to subscribers after every state change.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionView {
    pub running: bool,
    pub transition_active: bool,
    pub position: Position,
    pub direction: f64,
    pub mode: PathPattern,
    pub start_time: Option<DateTime<Utc>>,
    pub first_emission_pending: bool,
    pub emissions: u64,
    pub session_id: Option<Uuid>,
}

/// Outcome of a direction target change.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TurnOutcome {
    Scheduled {
        step_count: u32,
        step_interval: Duration,
    },
    /// Zero window: the target was applied and emitted at once.
    Immediate,
    /// Target equals the live direction.
    Unchanged,
}

struct SessionState {
    session: SimulationSession,
    position: PositionState,
    clock: SimulationClock,
    direction: f64,
    transition_active: bool,
    emissions: u64,
}

impl SessionState {
    fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            position: self.position.position(),
            direction: self.direction,
            mode: self.session.mode,
            start_time: self.clock.start_time(),
        }
    }

    fn view(&self) -> SessionView {
        SessionView {
            running: self.session.is_running(),
            transition_active: self.transition_active,
            position: self.position.position(),
            direction: self.direction,
            mode: self.session.mode,
            start_time: self.clock.start_time(),
            first_emission_pending: self.session.first_emission_pending,
            emissions: self.emissions,
            session_id: self.session.session_id,
        }
    }
}

/// State reachable from timer tasks.
struct Shared {
    state: Mutex<SessionState>,
    dispatch: Arc<dyn TelemetryDispatch>,
    view: watch::Sender<SessionView>,
}

impl Shared {
    fn publish(&self, state: &SessionState) {
        self.view.send_replace(state.view());
    }

    /// Emit `snapshot` if the session is running at this moment.
    fn emit(&self, snapshot: &TelemetrySnapshot, origin: &'static str) {
        let (emission, session_id) = {
            let mut state = self.state.lock();
            if !state.session.is_running() {
                sds_debug!("{} fired while stopped, nothing sent", origin);
                return;
            }
            let session_id = state.session.session_id.map(|id| id.to_string());
            let Some(emission) = Emission::select(snapshot, state.session.first_emission_pending)
            else {
                sds_warn!("{} snapshot has no confirmed start time, baseline skipped", origin);
                return;
            };
            if emission.kind() == EmissionKind::Baseline {
                state.session.first_emission_pending = false;
            }
            state.emissions += 1;
            self.publish(&state);
            (emission, session_id)
        };

        let mode = snapshot.mode.to_string();
        let mut ctx = LogContext::new().with_mode(&mode);
        if let Some(id) = session_id.as_deref() {
            ctx = ctx.with_session(id);
        }
        sds_debug!(context = ctx, "{} dispatching {:?} emission", origin, emission.kind());

        let dispatch = Arc::clone(&self.dispatch);
        tokio::spawn(async move { deliver(dispatch.as_ref(), emission).await });
    }

    fn announce_stop(&self, direction: f64) {
        let dispatch = Arc::clone(&self.dispatch);
        tokio::spawn(async move { dispatch.send_stop(StopPayload::new(direction)).await });
    }
}

/// Top-level orchestrator of the emission scheduler.
///
/// Owns the session flags, position, clock, live direction, the debounce
/// gate and the transition scheduler. All methods take `&self` so the
/// controller can be shared behind an `Arc`; anything that arms a timer or
/// dispatches must run inside a tokio runtime.
pub struct SessionController {
    config: SessionConfig,
    shared: Arc<Shared>,
    gate: DebounceGate<TelemetrySnapshot>,
    scheduler: TransitionScheduler,
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("view", &self.view())
            .field("gate", &self.gate)
            .field("scheduler", &self.scheduler)
            .finish()
    }
}

impl SessionController {
    pub fn new(config: SessionConfig, dispatch: Arc<dyn TelemetryDispatch>) -> Self {
        let state = SessionState {
            session: SimulationSession::new(config.default_mode),
            position: PositionState::new(),
            clock: SimulationClock::new(),
            direction: 0.0,
            transition_active: false,
            emissions: 0,
        };
        let (view, _) = watch::channel(state.view());
        let shared = Arc::new(Shared {
            state: Mutex::new(state),
            dispatch,
            view,
        });
        let flush_target = Arc::clone(&shared);
        let gate = DebounceGate::new(config.debounce_window, move |snapshot| {
            flush_target.emit(&snapshot, "debounce flush")
        });
        Self {
            config,
            shared,
            gate,
            scheduler: TransitionScheduler::new(),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Subscribe to render props.
    pub fn subscribe(&self) -> watch::Receiver<SessionView> {
        self.shared.view.subscribe()
    }

    pub fn view(&self) -> SessionView {
        self.shared.state.lock().view()
    }

    pub fn session(&self) -> SimulationSession {
        self.shared.state.lock().session.clone()
    }

    pub fn is_running(&self) -> bool {
        self.shared.state.lock().session.is_running()
    }

    pub fn direction(&self) -> f64 {
        self.shared.state.lock().direction
    }

    pub fn position(&self) -> Position {
        self.shared.state.lock().position.position()
    }

    pub fn transition_state(&self) -> TransitionState {
        self.scheduler.state()
    }

    pub fn has_pending_dispatch(&self) -> bool {
        self.gate.is_pending()
    }

    /// Apply `edit` to the state, publish, and re-arm the debounce gate.
    fn edit<R>(&self, field: Field, edit: impl FnOnce(&mut SessionState) -> R) -> R {
        let result = {
            let mut state = self.shared.state.lock();
            let result = edit(&mut *state);
            self.shared.publish(&state);
            result
        };
        self.on_field_changed(field);
        result
    }

    pub fn confirm_start_time(&self, start: DateTime<Utc>) -> DateTime<Utc> {
        self.edit(Field::StartTime, |state| state.clock.confirm(start))
    }

    pub fn set_latitude(&self, latitude: f64) -> f64 {
        self.edit(Field::Latitude, |state| state.position.set_latitude(latitude))
    }

    pub fn set_longitude(&self, longitude: f64) -> f64 {
        self.edit(Field::Longitude, |state| {
            state.position.set_longitude(longitude)
        })
    }

    pub fn randomize_position(&self) -> Position {
        self.edit(Field::Position, |state| state.position.randomize())
    }

    pub fn set_direction(&self, direction: f64) -> f64 {
        self.edit(Field::Direction, |state| {
            state.direction = normalize_direction(direction);
            state.direction
        })
    }

    /// Shift the live direction by `step` degrees (the ±1° controls).
    pub fn nudge_direction(&self, step: f64) -> f64 {
        self.edit(Field::Direction, |state| {
            state.direction = normalize_direction(state.direction + step);
            state.direction
        })
    }

    pub fn set_mode(&self, mode: PathPattern) {
        self.edit(Field::Mode, |state| state.session.mode = mode)
    }

    /// Re-arm the debounce gate with the current full snapshot.
    pub fn on_field_changed(&self, field: Field) {
        let snapshot = self.shared.state.lock().snapshot();
        let replaced = self.gate.trigger(snapshot);
        sds_debug!("{:?} changed, debounce armed (replaced pending: {})", field, replaced);
    }

    /// Stopped → Running. The first flush afterwards carries the baseline.
    pub fn enable(&self) -> Result<(), SessionError> {
        let (snapshot, session_id, mode) = {
            let mut state = self.shared.state.lock();
            if state.session.is_running() {
                log_session_event(
                    None,
                    "session.enable",
                    "session already running",
                    SessionEventOutcome::Skipped,
                );
                return Ok(());
            }
            if !state.clock.is_confirmed() {
                return Err(SessionError::StartTimeNotConfirmed);
            }
            let session_id = Uuid::new_v4();
            state.session.status = SessionStatus::Running;
            state.session.first_emission_pending = true;
            state.session.session_id = Some(session_id);
            self.shared.publish(&state);
            (state.snapshot(), session_id.to_string(), state.session.mode.to_string())
        };
        let ctx = LogContext::new().with_session(&session_id).with_mode(&mode);
        log_session_event(
            Some(&ctx),
            "session.enable",
            "session running",
            SessionEventOutcome::Success,
        );
        self.gate.trigger(snapshot);
        Ok(())
    }

    /// Running → Stopped. Cancels the transition plan and the pending
    /// debounce flush, and re-arms the baseline for the next run.
    pub fn disable(&self) {
        self.stop(self.config.announce_stop, "session.disable");
    }

    /// Stop and forget the confirmed start time and position.
    pub fn reset(&self) {
        self.stop(false, "session.reset");
        let mut state = self.shared.state.lock();
        state.clock.clear();
        state.position.reset();
        self.shared.publish(&state);
    }

    fn stop(&self, announce: bool, event: &str) {
        // Mark stopped before cancelling so any timer that still fires sees it.
        let stopped = {
            let mut state = self.shared.state.lock();
            let was_running = state.session.is_running();
            let session_id = state.session.session_id.take();
            state.session.status = SessionStatus::Stopped;
            state.session.first_emission_pending = true;
            state.transition_active = false;
            self.shared.publish(&state);
            was_running.then(|| (state.direction, session_id))
        };
        let cancelled_plan = self.scheduler.cancel();
        let cancelled_flush = self.gate.cancel();

        let Some((direction, session_id)) = stopped else {
            log_session_event(
                None,
                event,
                "session already stopped",
                SessionEventOutcome::Skipped,
            );
            return;
        };
        let session_id = session_id.map(|id| id.to_string()).unwrap_or_default();
        let ctx = LogContext::new().with_session(&session_id);
        log_session_event(
            Some(&ctx),
            event,
            &format!(
                "session stopped (transition cancelled: {}, flush dropped: {})",
                cancelled_plan, cancelled_flush
            ),
            SessionEventOutcome::Success,
        );
        if announce {
            self.shared.announce_stop(direction);
        }
    }

    /// Animate the live direction towards `target` over `window` in
    /// `step_count` steps. Each step emits immediately, bypassing the gate.
    pub fn on_direction_target_changed(
        &self,
        target: f64,
        window: Duration,
        step_count: u32,
    ) -> Result<TurnOutcome, SessionError> {
        let target = normalize_direction(target);
        let from = {
            let state = self.shared.state.lock();
            if !state.session.is_running() {
                return Err(SessionError::NotRunning);
            }
            state.direction
        };

        if window.is_zero() {
            if from == target {
                return Ok(TurnOutcome::Unchanged);
            }
            self.scheduler.cancel();
            let snapshot = {
                let mut state = self.shared.state.lock();
                state.direction = target;
                state.transition_active = false;
                self.shared.publish(&state);
                state.snapshot()
            };
            self.shared.emit(&snapshot, "direction change");
            return Ok(TurnOutcome::Immediate);
        }

        // Raised before the first step can run so its final step always clears it.
        {
            let mut state = self.shared.state.lock();
            state.transition_active = true;
            self.shared.publish(&state);
        }
        let shared = Arc::clone(&self.shared);
        let started = self.scheduler.start(from, target, window, step_count, move |value, is_final| {
            let snapshot = {
                let mut state = shared.state.lock();
                if !state.session.is_running() {
                    return;
                }
                state.direction = normalize_direction(value);
                if is_final {
                    state.transition_active = false;
                }
                shared.publish(&state);
                state.snapshot()
            };
            shared.emit(&snapshot, "transition step");
        });

        match started {
            Ok(TransitionStart::Scheduled {
                step_count,
                step_interval,
            }) => {
                let session_id = self.session().session_id.map(|id| id.to_string());
                let mut ctx = LogContext::new().with_step(step_count);
                if let Some(id) = session_id.as_deref() {
                    ctx = ctx.with_session(id);
                }
                sds_info!(context = ctx, "turning {} -> {}", from, target);
                Ok(TurnOutcome::Scheduled {
                    step_count,
                    step_interval,
                })
            }
            // Nothing new was scheduled; any earlier plan keeps running.
            Ok(TransitionStart::NoOp) => {
                self.settle_transition_flag();
                Ok(TurnOutcome::Unchanged)
            }
            Err(err) => {
                self.settle_transition_flag();
                Err(err.into())
            }
        }
    }

    fn settle_transition_flag(&self) {
        let mut state = self.shared.state.lock();
        state.transition_active = state.session.is_running() && self.scheduler.is_active();
        self.shared.publish(&state);
    }

    /// Turn using the configured transition window and step count.
    pub fn turn_to(&self, target: f64) -> Result<TurnOutcome, SessionError> {
        self.on_direction_target_changed(
            target,
            self.config.transition_window,
            self.config.transition_steps,
        )
    }

    /// Ask the backend to delete the recorded data of `date`.
    pub async fn remove_day(&self, date: NaiveDate) -> Result<(), SessionError> {
        if self.is_running() {
            return Err(SessionError::Busy);
        }
        self.shared.dispatch.remove_day(date).await;
        log_session_event(
            None,
            "data.remove_day",
            &format!("removal requested for {}", sds_common::time::calendar_day(&date)),
            SessionEventOutcome::Success,
        );
        Ok(())
    }
}
