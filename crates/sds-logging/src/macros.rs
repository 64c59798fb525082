//! ---
//! sds_section: "03-logging"
//! sds_subsection: "module"
//! sds_type: "source"
//! sds_scope: "code"
//! sds_description: "Structured logging adapters for emission sessions."
//! sds_version: "v0.1.0"
//! sds_owner: "tbd"
//! ---
/// Shared expansion for the level-specific macros below.
#[doc(hidden)]
#[macro_export]
macro_rules! __sds_event {
    ($level:expr, $ctx:expr, $($arg:tt)+) => {{
        let ctx = &$ctx;
        tracing::event!(
            $level,
            session = ctx.session.unwrap_or(""),
            mode = ctx.mode.unwrap_or(""),
            step = ctx.step.unwrap_or_default(),
            message = %format_args!($($arg)+)
        );
    }};
}

/// Emit an informational log enriched with session context.
#[macro_export]
macro_rules! sds_info {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__sds_event!(tracing::Level::INFO, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__sds_event!(tracing::Level::INFO, $crate::LogContext::default(), $($arg)+)
    };
}

/// Emit a debug log enriched with session context.
#[macro_export]
macro_rules! sds_debug {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__sds_event!(tracing::Level::DEBUG, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__sds_event!(tracing::Level::DEBUG, $crate::LogContext::default(), $($arg)+)
    };
}

/// Emit a warning enriched with session context.
#[macro_export]
macro_rules! sds_warn {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__sds_event!(tracing::Level::WARN, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__sds_event!(tracing::Level::WARN, $crate::LogContext::default(), $($arg)+)
    };
}

/// Emit an error log enriched with session context.
#[macro_export]
macro_rules! sds_error {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__sds_event!(tracing::Level::ERROR, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__sds_event!(tracing::Level::ERROR, $crate::LogContext::default(), $($arg)+)
    };
}
