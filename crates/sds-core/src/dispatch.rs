//! ---
//! sds_section: "02-emission-core"
//! sds_subsection: "module"
//! sds_type: "source"
//! sds_scope: "code"
//! sds_description: "Network boundary seam for telemetry emissions."
//! sds_version: "v0.1.0"
//! sds_owner: "tbd"
//! ---
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::Mutex;
use tracing::debug;

use crate::telemetry::{BaselinePayload, DeltaPayload, Emission, EmissionKind, StopPayload};

/// Fire-and-forget operations against the collaborator backend.
///
/// Implementations swallow delivery failures after logging them; callers
/// cannot tell a delivered emission from a dropped one.
#[async_trait]
pub trait TelemetryDispatch: Send + Sync + 'static {
    /// Send the first emission of a running session.
    async fn send_baseline(&self, payload: BaselinePayload);

    /// Send a direction/mode update.
    async fn send_delta(&self, payload: DeltaPayload);

    /// Tell the backend the running session was paused.
    async fn send_stop(&self, payload: StopPayload);

    /// Delete every point recorded for `date`.
    async fn remove_day(&self, date: NaiveDate);
}

/// Route an [`Emission`] to the matching dispatch operation.
pub async fn deliver(dispatch: &dyn TelemetryDispatch, emission: Emission) {
    match emission {
        Emission::Baseline(payload) => dispatch.send_baseline(payload).await,
        Emission::Delta(payload) => dispatch.send_delta(payload).await,
    }
}

/// Everything a [`RecordingDispatch`] has been asked to send.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchRecord {
    Baseline(BaselinePayload),
    Delta(DeltaPayload),
    Stop(StopPayload),
    RemoveDay(NaiveDate),
}

impl DispatchRecord {
    pub fn emission_kind(&self) -> Option<EmissionKind> {
        match self {
            DispatchRecord::Baseline(_) => Some(EmissionKind::Baseline),
            DispatchRecord::Delta(_) => Some(EmissionKind::Delta),
            DispatchRecord::Stop(_) | DispatchRecord::RemoveDay(_) => None,
        }
    }
}

/// In-memory dispatcher used for dry runs and tests.
#[derive(Debug, Clone, Default)]
pub struct RecordingDispatch {
    records: Arc<Mutex<Vec<DispatchRecord>>>,
}

impl RecordingDispatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<DispatchRecord> {
        self.records.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    pub fn clear(&self) {
        self.records.lock().clear();
    }

    fn push(&self, record: DispatchRecord) {
        debug!(?record, "recorded dispatch");
        self.records.lock().push(record);
    }
}

#[async_trait]
impl TelemetryDispatch for RecordingDispatch {
    async fn send_baseline(&self, payload: BaselinePayload) {
        self.push(DispatchRecord::Baseline(payload));
    }

    async fn send_delta(&self, payload: DeltaPayload) {
        self.push(DispatchRecord::Delta(payload));
    }

    async fn send_stop(&self, payload: StopPayload) {
        self.push(DispatchRecord::Stop(payload));
    }

    async fn remove_day(&self, date: NaiveDate) {
        self.push(DispatchRecord::RemoveDay(date));
    }
}
