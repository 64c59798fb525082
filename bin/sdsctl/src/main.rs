//! ---
//! sds_section: "05-operator-interfaces"
//! sds_subsection: "binary"
//! sds_type: "source"
//! sds_scope: "code"
//! sds_description: "Control CLI driving an emission session."
//! sds_version: "v0.1.0"
//! sds_owner: "tbd"
//! ---
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{ArgAction, Args, CommandFactory, Parser, Subcommand};
use sds_common::{init_tracing, AppConfig, PathPattern};
use sds_core::{
    RecordingDispatch, SessionController, SessionView, TelemetryDispatch, TurnOutcome,
};
use sds_logging::{log_session_event, sds_error, LogContext, SessionEventOutcome};
use sds_net::DispatchClient;
use tokio::signal;
use tokio::sync::watch;
use tracing::info;

const DEFAULT_CONFIG_CANDIDATES: [&str; 2] = ["configs/sds.toml", "configs/example.toml"];

/// Time given to in-flight dispatches (stop notice included) before exit.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

#[derive(Debug, Parser)]
#[command(
    author,
    disable_version_flag = true,
    about = "Spray data simulator control utility",
    long_about = None
)]
struct Cli {
    #[arg(
        short = 'V',
        long = "version",
        action = ArgAction::SetTrue,
        help = "Print version information and exit"
    )]
    version: bool,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Run an emission session until interrupted")]
    Run(RunArgs),
    #[command(about = "Delete the telemetry recorded on one day")]
    RemoveDay(RemoveDayArgs),
}

#[derive(Debug, Args)]
struct RunArgs {
    #[arg(long, value_name = "FILE", help = "Path to configuration file")]
    config: Option<PathBuf>,

    #[arg(long, allow_negative_numbers = true, help = "Start latitude in degrees")]
    lat: Option<f64>,

    #[arg(long, allow_negative_numbers = true, help = "Start longitude in degrees")]
    lon: Option<f64>,

    #[arg(
        long,
        conflicts_with_all = ["lat", "lon"],
        help = "Pick a random start position"
    )]
    random_position: bool,

    #[arg(long, value_name = "RFC3339", help = "Simulation start time (defaults to now)")]
    start: Option<DateTime<Utc>>,

    #[arg(long, value_name = "lateral|vertical", help = "Path pattern")]
    mode: Option<PathPattern>,

    #[arg(
        long,
        allow_negative_numbers = true,
        value_name = "DEG",
        help = "Initial heading in degrees"
    )]
    direction: Option<f64>,

    #[arg(
        long = "turn",
        value_name = "DEG",
        allow_negative_numbers = true,
        help = "Heading to turn towards; repeat to play several turns in order"
    )]
    turns: Vec<f64>,

    #[arg(long, value_name = "SECS", help = "Transition window per turn")]
    window: Option<u64>,

    #[arg(
        long,
        value_name = "N",
        value_parser = clap::value_parser!(u32).range(1..),
        help = "Transition steps per turn"
    )]
    steps: Option<u32>,

    #[arg(long, help = "Record emissions locally instead of posting them")]
    dry_run: bool,
}

#[derive(Debug, Args)]
struct RemoveDayArgs {
    #[arg(long, value_name = "FILE", help = "Path to configuration file")]
    config: Option<PathBuf>,

    #[arg(long, value_name = "YYYY-MM-DD", help = "Day to delete")]
    date: NaiveDate,

    #[arg(long, help = "Record the request locally instead of posting it")]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    if cli.version {
        println!("sdsctl {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }
    match cli.command {
        Some(Commands::Run(args)) => run(args).await,
        Some(Commands::RemoveDay(args)) => remove_day(args).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    }
}

/// Load the explicit config file, else the first default candidate, else defaults.
fn load_config(explicit: Option<&Path>) -> Result<(AppConfig, Option<PathBuf>)> {
    let candidates: Vec<PathBuf> = match explicit {
        Some(path) => vec![path.to_path_buf()],
        None => DEFAULT_CONFIG_CANDIDATES.iter().map(PathBuf::from).collect(),
    };
    let env_override = std::env::var_os(AppConfig::ENV_CONFIG_PATH).is_some();
    if explicit.is_none() && !env_override && !candidates.iter().any(|path| path.exists()) {
        return Ok((AppConfig::default(), None));
    }
    let loaded = AppConfig::load_with_source(&candidates)?;
    Ok((loaded.config, Some(loaded.source)))
}

fn bootstrap(explicit: Option<&Path>) -> Result<AppConfig> {
    let (config, source) = load_config(explicit)?;
    init_tracing("sdsctl", &config.logging)?;
    match source {
        Some(path) => info!(config_path = %path.display(), "configuration loaded"),
        None => info!("no configuration file found, using defaults"),
    }
    Ok(config)
}

fn build_dispatch(
    config: &AppConfig,
    dry_run: bool,
) -> Result<(Arc<dyn TelemetryDispatch>, Option<RecordingDispatch>)> {
    if dry_run {
        let recorder = RecordingDispatch::new();
        return Ok((Arc::new(recorder.clone()), Some(recorder)));
    }
    let client = DispatchClient::new(&config.backend).context("failed to build dispatch client")?;
    info!(backend = %client.base_url(), "dispatching to backend");
    Ok((Arc::new(client), None))
}

fn report_dry_run(recorder: Option<RecordingDispatch>) {
    if let Some(recorder) = recorder {
        for record in recorder.records() {
            info!(?record, "dry-run dispatch");
        }
    }
}

async fn run(args: RunArgs) -> Result<()> {
    let config = bootstrap(args.config.as_deref())?;
    let (dispatch, recorder) = build_dispatch(&config, args.dry_run)?;
    let controller = SessionController::new(config.session.clone(), dispatch);

    let start = controller.confirm_start_time(args.start.unwrap_or_else(Utc::now));
    if args.random_position {
        controller.randomize_position();
    } else {
        if let Some(lat) = args.lat {
            controller.set_latitude(lat);
        }
        if let Some(lon) = args.lon {
            controller.set_longitude(lon);
        }
    }
    if let Some(mode) = args.mode {
        controller.set_mode(mode);
    }
    if let Some(direction) = args.direction {
        controller.set_direction(direction);
    }
    let position = controller.position();
    info!(
        start = %start,
        latitude = position.latitude,
        longitude = position.longitude,
        "session configured"
    );

    let mut view = controller.subscribe();
    controller.enable()?;

    let window = args
        .window
        .map(Duration::from_secs)
        .unwrap_or(config.session.transition_window);
    let steps = args.steps.unwrap_or(config.session.transition_steps);
    let outcome = tokio::select! {
        result = play(&controller, &mut view, &args.turns, window, steps) => match result {
            Ok(()) => {
                info!("emitting on edits until ctrl-c");
                signal::ctrl_c().await.context("failed to listen for ctrl-c")
            }
            Err(err) => Err(err),
        },
        result = signal::ctrl_c() => result.context("failed to listen for ctrl-c"),
    };

    // The session is stopped on every exit path so no timer outlives the run.
    let summary = shutdown(&controller).await;
    report_dry_run(recorder);
    if let Err(err) = &outcome {
        let session = summary.session_id.map(|id| id.to_string());
        let ctx = match session.as_deref() {
            Some(id) => LogContext::new().with_session(id),
            None => LogContext::new(),
        };
        sds_error!(context = ctx, "run aborted after {} emissions: {:#}", summary.emissions, err);
    }
    outcome
}

async fn shutdown(controller: &SessionController) -> SessionView {
    let last = controller.view();
    controller.disable();
    tokio::time::sleep(SHUTDOWN_GRACE).await;
    let summary = controller.view();
    info!(emissions = summary.emissions, "session stopped");
    SessionView {
        session_id: last.session_id,
        ..summary
    }
}

/// Wait for the baseline, then play every turn to completion in order.
async fn play(
    controller: &SessionController,
    view: &mut watch::Receiver<SessionView>,
    turns: &[f64],
    window: Duration,
    steps: u32,
) -> Result<()> {
    view.wait_for(|v| !v.first_emission_pending)
        .await
        .context("session view closed")?;
    let session = view.borrow().session_id.map(|id| id.to_string());

    for &target in turns {
        let outcome = controller.on_direction_target_changed(target, window, steps)?;
        let ctx = match session.as_deref() {
            Some(id) => LogContext::new().with_session(id),
            None => LogContext::new(),
        };
        match outcome {
            TurnOutcome::Scheduled {
                step_count,
                step_interval,
            } => {
                info!(
                    target,
                    step_count,
                    interval_ms = sds_common::time::duration_to_millis(step_interval),
                    "turn scheduled"
                );
                view.wait_for(|v| !v.transition_active)
                    .await
                    .context("session view closed")?;
                log_session_event(
                    Some(&ctx.with_step(step_count)),
                    "cli.turn",
                    &format!("heading {:.1}", controller.direction()),
                    SessionEventOutcome::Success,
                );
            }
            TurnOutcome::Immediate => log_session_event(
                Some(&ctx),
                "cli.turn",
                &format!("heading {:.1} applied at once", controller.direction()),
                SessionEventOutcome::Success,
            ),
            TurnOutcome::Unchanged => log_session_event(
                Some(&ctx),
                "cli.turn",
                &format!("already heading {target}"),
                SessionEventOutcome::Skipped,
            ),
        }
    }
    Ok(())
}

async fn remove_day(args: RemoveDayArgs) -> Result<()> {
    let config = bootstrap(args.config.as_deref())?;
    let (dispatch, recorder) = build_dispatch(&config, args.dry_run)?;
    let controller = SessionController::new(config.session.clone(), dispatch);
    let day = sds_common::time::calendar_day(&args.date);
    if let Err(err) = controller.remove_day(args.date).await {
        log_session_event(
            None,
            "cli.remove_day",
            &format!("{day} rejected: {err}"),
            SessionEventOutcome::Fault,
        );
        return Err(err.into());
    }
    log_session_event(
        None,
        "cli.remove_day",
        &format!("{day} requested"),
        SessionEventOutcome::Success,
    );
    report_dry_run(recorder);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_accepts_repeated_negative_turns() {
        let cli = Cli::try_parse_from([
            "sdsctl", "run", "--lat", "-33.5", "--lon", "151.2", "--turn", "90", "--turn", "-45",
            "--mode", "vertical", "--start", "2024-05-01T08:30:00Z", "--dry-run",
        ])
        .unwrap();
        let Some(Commands::Run(args)) = cli.command else {
            panic!("expected run command");
        };
        assert_eq!(args.lat, Some(-33.5));
        assert_eq!(args.turns, vec![90.0, -45.0]);
        assert_eq!(args.mode, Some(PathPattern::VerticalZigzag));
        assert_eq!(args.start.unwrap().to_rfc3339(), "2024-05-01T08:30:00+00:00");
        assert!(args.dry_run);
    }

    #[test]
    fn random_position_conflicts_with_explicit_coordinates() {
        assert!(
            Cli::try_parse_from(["sdsctl", "run", "--random-position", "--lat", "10"]).is_err()
        );
    }

    #[test]
    fn remove_day_requires_calendar_date() {
        let cli = Cli::try_parse_from(["sdsctl", "remove-day", "--date", "2024-05-01"]).unwrap();
        let Some(Commands::RemoveDay(args)) = cli.command else {
            panic!("expected remove-day command");
        };
        assert_eq!(args.date, NaiveDate::from_ymd_opt(2024, 5, 1).unwrap());
        assert!(Cli::try_parse_from(["sdsctl", "remove-day", "--date", "May 1"]).is_err());
    }

    #[test]
    fn zero_transition_steps_are_rejected_at_parse_time() {
        assert!(Cli::try_parse_from(["sdsctl", "run", "--steps", "0"]).is_err());
        let cli = Cli::try_parse_from(["sdsctl", "run", "--steps", "1"]).unwrap();
        let Some(Commands::Run(args)) = cli.command else {
            panic!("expected run command");
        };
        assert_eq!(args.steps, Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_session_and_keeps_its_id() {
        let recorder = RecordingDispatch::new();
        let controller = SessionController::new(
            sds_common::SessionConfig::default(),
            Arc::new(recorder.clone()),
        );
        controller.confirm_start_time(Utc::now());
        controller.enable().unwrap();
        let session_id = controller.view().session_id;
        assert!(session_id.is_some());

        let summary = shutdown(&controller).await;
        assert!(!summary.running);
        assert_eq!(summary.session_id, session_id);
        assert!(!controller.has_pending_dispatch());
        assert_eq!(recorder.len(), 1, "only the stop notice is sent");
    }

    #[test]
    fn explicit_missing_config_is_an_error() {
        assert!(load_config(Some(Path::new("does/not/exist.toml"))).is_err());
    }
}
