//! ---
//! sds_section: "03-logging"
//! sds_subsection: "module"
//! sds_type: "source"
//! sds_scope: "code"
//! sds_description: "Structured logging adapters for emission sessions."
//! sds_version: "v0.1.0"
//! sds_owner: "tbd"
//! ---
#![warn(missing_docs)]

use tracing::Level;
use tracing_subscriber::{fmt as subscriber_fmt, prelude::*, EnvFilter, Registry};

pub mod macros;

/// Initialize a baseline tracing subscriber suitable for development.
pub fn init() {
    let _ = Registry::default()
        .with(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(subscriber_fmt::layer())
        .try_init();
}

/// Structured logging context propagated by the convenience macros.
#[derive(Debug, Default, Clone)]
pub struct LogContext<'a> {
    /// Session identifier allocated when the simulation is enabled.
    pub session: Option<&'a str>,
    /// Path pattern the agent is following.
    pub mode: Option<&'a str>,
    /// Transition step currently being applied.
    pub step: Option<u32>,
}

impl<'a> LogContext<'a> {
    /// Create an empty logging context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a session identifier.
    pub fn with_session(mut self, session: &'a str) -> Self {
        self.session = Some(session);
        self
    }

    /// Attach a path pattern descriptor.
    pub fn with_mode(mut self, mode: &'a str) -> Self {
        self.mode = Some(mode);
        self
    }

    /// Attach a transition step.
    pub fn with_step(mut self, step: u32) -> Self {
        self.step = Some(step);
        self
    }
}

/// High-level outcome used when emitting lifecycle log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEventOutcome {
    /// The operation completed successfully.
    Success,
    /// The operation was skipped or superseded.
    Skipped,
    /// The operation failed.
    Fault,
}

impl SessionEventOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            SessionEventOutcome::Success => "success",
            SessionEventOutcome::Skipped => "skipped",
            SessionEventOutcome::Fault => "fault",
        }
    }
}

/// Emit a standardized session lifecycle event.
pub fn log_session_event(
    context: Option<&LogContext>,
    event: &str,
    message: &str,
    outcome: SessionEventOutcome,
) {
    let ctx = context.cloned().unwrap_or_default();
    let session = ctx.session.unwrap_or("");
    let mode = ctx.mode.unwrap_or("");
    let step = ctx.step.unwrap_or_default();
    let outcome_str = outcome.as_str();
    // `tracing::event!` needs a constant level, hence the match.
    match outcome {
        SessionEventOutcome::Success => tracing::event!(
            Level::INFO,
            event,
            outcome = outcome_str,
            session,
            mode,
            step,
            message = %message
        ),
        SessionEventOutcome::Skipped => tracing::event!(
            Level::DEBUG,
            event,
            outcome = outcome_str,
            session,
            mode,
            step,
            message = %message
        ),
        SessionEventOutcome::Fault => tracing::event!(
            Level::WARN,
            event,
            outcome = outcome_str,
            session,
            mode,
            step,
            message = %message
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn macros_emit_without_panic() {
        init();
        let ctx = LogContext::new().with_session("s-1").with_mode("lateral");
        sds_info!(context = ctx.clone(), "session enabled");
        sds_debug!("debug message");
        sds_warn!(context = ctx.clone().with_step(2), "step {} skipped", 2);
        sds_error!(context = ctx, "error code: {}", 42);
    }

    #[test]
    fn session_event_helper_emits() {
        init();
        let ctx = LogContext::new().with_session("s-1");
        log_session_event(
            Some(&ctx),
            "session.enable",
            "session running",
            SessionEventOutcome::Success,
        );
        log_session_event(
            None,
            "session.disable",
            "already stopped",
            SessionEventOutcome::Skipped,
        );
        log_session_event(
            None,
            "dispatch",
            "backend unreachable",
            SessionEventOutcome::Fault,
        );
    }
}
