//! ---
//! sds_section: "02-emission-core"
//! sds_subsection: "module"
//! sds_type: "source"
//! sds_scope: "code"
//! sds_description: "Emission core module exports and shared types."
//! sds_version: "v0.1.0"
//! sds_owner: "tbd"
//! ---
//! Emission scheduling core for the Spray Data Simulator.
//!
//! [`SessionController`] owns the running/stopped lifecycle and decides
//! when a snapshot of the agent leaves the process: debounced after manual
//! edits, or step by step while the heading animates towards a new target.
//! Delivery is delegated to a [`TelemetryDispatch`] implementation.

pub mod clock;
pub mod debounce;
pub mod dispatch;
pub mod position;
pub mod session;
pub mod telemetry;
pub mod transition;

pub use clock::SimulationClock;
pub use debounce::DebounceGate;
pub use dispatch::{deliver, DispatchRecord, RecordingDispatch, TelemetryDispatch};
pub use position::{normalize_direction, Position, PositionState};
pub use session::{
    Field, SessionController, SessionError, SessionStatus, SessionView, SimulationSession,
    TurnOutcome,
};
pub use telemetry::{
    BaselinePayload, DeltaPayload, Emission, EmissionKind, PathPattern, StopPayload,
    TelemetryPoint, TelemetrySnapshot,
};
pub use transition::{
    TransitionError, TransitionPlan, TransitionScheduler, TransitionStart, TransitionState,
};
