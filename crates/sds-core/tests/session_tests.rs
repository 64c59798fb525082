//! ---
//! sds_section: "02-emission-core"
//! sds_subsection: "module"
//! sds_type: "source"
//! sds_scope: "code"
//! sds_description: "Session controller emission behaviour under a paused clock."
//! sds_version: "v0.1.0"
//! sds_owner: "tbd"
//! ---
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use sds_common::SessionConfig;
use sds_core::{
    DeltaPayload, DispatchRecord, EmissionKind, PathPattern, RecordingDispatch, SessionController,
    SessionError, StopPayload, TransitionError, TransitionState, TurnOutcome,
};
use tokio::time::sleep;

fn controller(announce_stop: bool) -> (RecordingDispatch, SessionController) {
    let recorder = RecordingDispatch::new();
    let config = SessionConfig {
        announce_stop,
        ..SessionConfig::default()
    };
    let controller = SessionController::new(config, Arc::new(recorder.clone()));
    (recorder, controller)
}

fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 8, 30, 0).unwrap()
}

async fn running(announce_stop: bool) -> (RecordingDispatch, SessionController) {
    let (recorder, controller) = controller(announce_stop);
    controller.confirm_start_time(start_time());
    controller.enable().expect("session should start");
    sleep(Duration::from_millis(1_100)).await;
    assert_eq!(recorder.len(), 1, "baseline expected after the first flush");
    recorder.clear();
    (recorder, controller)
}

fn delta_directions(records: &[DispatchRecord]) -> Vec<f64> {
    records
        .iter()
        .map(|record| match record {
            DispatchRecord::Delta(payload) => payload.direction,
            other => panic!("expected delta, got {other:?}"),
        })
        .collect()
}

#[tokio::test(start_paused = true)]
async fn first_flush_sends_baseline_then_deltas() {
    let (recorder, controller) = controller(false);
    controller.confirm_start_time(start_time());
    controller.set_latitude(59.91);
    controller.set_longitude(10.75);
    controller.enable().unwrap();

    sleep(Duration::from_millis(1_100)).await;
    let records = recorder.records();
    let DispatchRecord::Baseline(baseline) = &records[0] else {
        panic!("expected baseline, got {:?}", records[0]);
    };
    assert_eq!(baseline.lat, 59.91);
    assert_eq!(baseline.lon, 10.75);
    assert_eq!(baseline.datetime, "2024-05-01T08:30:00.000Z");
    assert_eq!(baseline.mode, 1);
    assert!(baseline.is_start);

    controller.set_direction(45.0);
    sleep(Duration::from_millis(1_100)).await;
    assert_eq!(
        recorder.records()[1],
        DispatchRecord::Delta(DeltaPayload::new(45.0, Some(PathPattern::LateralZigzag), true))
    );

    controller.disable();
    controller.enable().unwrap();
    sleep(Duration::from_millis(1_100)).await;
    let kinds: Vec<_> = recorder
        .records()
        .iter()
        .filter_map(DispatchRecord::emission_kind)
        .collect();
    assert_eq!(
        kinds,
        vec![EmissionKind::Baseline, EmissionKind::Delta, EmissionKind::Baseline]
    );
}

#[tokio::test(start_paused = true)]
async fn burst_of_edits_emits_once_with_latest_snapshot() {
    let (recorder, controller) = running(false).await;
    controller.set_direction(10.0);
    sleep(Duration::from_millis(100)).await;
    controller.set_direction(20.0);
    sleep(Duration::from_millis(100)).await;
    controller.set_direction(30.0);

    sleep(Duration::from_millis(900)).await;
    assert!(recorder.is_empty(), "window restarts on every edit");

    sleep(Duration::from_millis(200)).await;
    assert_eq!(delta_directions(&recorder.records()), vec![30.0]);
}

#[tokio::test(start_paused = true)]
async fn transition_steps_emit_without_debounce() {
    let (recorder, controller) = running(false).await;
    let outcome = controller
        .on_direction_target_changed(90.0, Duration::from_secs(3), 3)
        .unwrap();
    assert_eq!(
        outcome,
        TurnOutcome::Scheduled {
            step_count: 3,
            step_interval: Duration::from_secs(1)
        }
    );
    assert!(controller.view().transition_active);

    sleep(Duration::from_millis(1_500)).await;
    assert_eq!(delta_directions(&recorder.records()), vec![30.0]);
    assert_eq!(controller.direction(), 30.0);

    sleep(Duration::from_secs(2)).await;
    assert_eq!(delta_directions(&recorder.records()), vec![30.0, 60.0, 90.0]);
    assert_eq!(controller.transition_state(), TransitionState::Idle);
    assert!(!controller.view().transition_active);
}

#[tokio::test(start_paused = true)]
async fn rejected_or_unchanged_turn_leaves_transition_flag_consistent() {
    let (recorder, controller) = running(false).await;
    let mut rx = controller.subscribe();
    let heading = controller.direction();
    assert_eq!(heading, 0.0);

    assert!(matches!(
        controller.on_direction_target_changed(90.0, Duration::from_secs(1), 0),
        Err(SessionError::Transition(TransitionError::ZeroSteps))
    ));
    assert!(!controller.view().transition_active);
    assert_eq!(
        controller
            .on_direction_target_changed(heading, Duration::from_secs(3), 3)
            .unwrap(),
        TurnOutcome::Unchanged
    );
    assert!(!controller.view().transition_active);
    assert!(!rx.borrow_and_update().transition_active);

    controller
        .on_direction_target_changed(90.0, Duration::from_secs(3), 3)
        .unwrap();
    assert!(rx.borrow_and_update().transition_active);

    // A rejected turn mid-plan must not hide the plan that is still running.
    assert!(controller
        .on_direction_target_changed(180.0, Duration::from_secs(1), 0)
        .is_err());
    assert!(controller.view().transition_active);

    rx.wait_for(|view| !view.transition_active).await.unwrap();
    sleep(Duration::from_millis(10)).await;
    assert_eq!(controller.direction(), 90.0);
    assert_eq!(delta_directions(&recorder.records()), vec![30.0, 60.0, 90.0]);
}

#[tokio::test(start_paused = true)]
async fn new_target_supersedes_running_transition() {
    let (recorder, controller) = running(false).await;
    controller
        .on_direction_target_changed(90.0, Duration::from_secs(4), 4)
        .unwrap();
    sleep(Duration::from_millis(1_500)).await;
    controller
        .on_direction_target_changed(0.0, Duration::from_secs(2), 2)
        .unwrap();
    sleep(Duration::from_secs(10)).await;

    assert_eq!(
        delta_directions(&recorder.records()),
        vec![22.5, 11.25, 0.0]
    );
}

#[tokio::test(start_paused = true)]
async fn zero_window_applies_target_at_once() {
    let (recorder, controller) = running(false).await;
    let outcome = controller
        .on_direction_target_changed(180.0, Duration::ZERO, 5)
        .unwrap();
    assert_eq!(outcome, TurnOutcome::Immediate);
    assert_eq!(controller.direction(), 180.0);
    sleep(Duration::from_millis(10)).await;
    assert_eq!(delta_directions(&recorder.records()), vec![180.0]);

    assert_eq!(controller.turn_to(180.0).unwrap(), TurnOutcome::Unchanged);
}

#[tokio::test(start_paused = true)]
async fn disable_cancels_every_pending_emission() {
    let (recorder, controller) = running(false).await;
    controller
        .on_direction_target_changed(90.0, Duration::from_secs(3), 3)
        .unwrap();
    sleep(Duration::from_millis(1_500)).await;
    controller.set_mode(PathPattern::VerticalZigzag);
    assert!(controller.has_pending_dispatch());

    controller.disable();
    sleep(Duration::from_millis(10)).await;
    let settled = recorder.len();
    assert_eq!(settled, 1);

    sleep(Duration::from_secs(10)).await;
    assert_eq!(recorder.len(), settled);
    assert_eq!(controller.transition_state(), TransitionState::Idle);
    assert!(!controller.has_pending_dispatch());
    assert_eq!(controller.direction(), 30.0);
}

#[tokio::test(start_paused = true)]
async fn disable_announces_stop_when_configured() {
    let (recorder, controller) = running(true).await;
    controller.set_direction(120.0);
    controller.disable();
    sleep(Duration::from_secs(5)).await;
    assert_eq!(
        recorder.records(),
        vec![DispatchRecord::Stop(StopPayload::new(120.0))]
    );

    controller.disable();
    sleep(Duration::from_millis(10)).await;
    assert_eq!(recorder.len(), 1, "second disable is a no-op");
}

#[tokio::test(start_paused = true)]
async fn edits_while_stopped_never_dispatch() {
    let (recorder, controller) = controller(true);
    controller.confirm_start_time(start_time());
    controller.randomize_position();
    controller.nudge_direction(1.0);
    controller.set_mode(PathPattern::VerticalZigzag);
    sleep(Duration::from_secs(5)).await;
    assert!(recorder.is_empty());
}

#[tokio::test(start_paused = true)]
async fn enable_and_turn_preconditions() {
    let (recorder, controller) = controller(false);
    assert!(matches!(
        controller.enable(),
        Err(SessionError::StartTimeNotConfirmed)
    ));
    assert!(matches!(
        controller.turn_to(90.0),
        Err(SessionError::NotRunning)
    ));

    controller.confirm_start_time(start_time());
    controller.enable().unwrap();
    let session_id = controller.session().session_id;
    controller.enable().unwrap();
    assert_eq!(controller.session().session_id, session_id);
    sleep(Duration::from_secs(2)).await;
    assert_eq!(recorder.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn remove_day_is_rejected_while_running() {
    let (recorder, controller) = running(false).await;
    let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
    assert!(matches!(
        controller.remove_day(date).await,
        Err(SessionError::Busy)
    ));

    controller.disable();
    controller.remove_day(date).await.unwrap();
    assert_eq!(recorder.records(), vec![DispatchRecord::RemoveDay(date)]);
}

#[tokio::test(start_paused = true)]
async fn reset_forgets_start_time_without_stop_notice() {
    let (recorder, controller) = running(true).await;
    controller.set_latitude(12.5);
    controller.reset();
    sleep(Duration::from_secs(5)).await;

    assert!(recorder.is_empty());
    let view = controller.view();
    assert!(!view.running);
    assert_eq!(view.start_time, None);
    assert_eq!(view.position.latitude, 0.0);
    assert!(matches!(
        controller.enable(),
        Err(SessionError::StartTimeNotConfirmed)
    ));
}

#[tokio::test(start_paused = true)]
async fn subscribers_observe_lifecycle() {
    let (_recorder, controller) = controller(false);
    let mut rx = controller.subscribe();
    controller.confirm_start_time(start_time());
    controller.enable().unwrap();
    assert!(rx.has_changed().unwrap());
    {
        let view = rx.borrow_and_update();
        assert!(view.running);
        assert!(view.session_id.is_some());
        assert!(view.first_emission_pending);
    }

    sleep(Duration::from_millis(1_100)).await;
    let view = rx.borrow().clone();
    assert_eq!(view.emissions, 1);
    assert!(!view.first_emission_pending);
}

#[tokio::test(start_paused = true)]
async fn dropping_controller_aborts_timers() {
    let (recorder, controller) = controller(false);
    controller.confirm_start_time(start_time());
    controller.enable().unwrap();
    drop(controller);
    sleep(Duration::from_secs(5)).await;
    assert!(recorder.is_empty());
}
