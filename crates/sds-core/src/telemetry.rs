//! ---
//! sds_section: "02-emission-core"
//! sds_subsection: "module"
//! sds_type: "source"
//! sds_scope: "code"
//! sds_description: "Telemetry data model and wire payload variants."
//! sds_version: "v0.1.0"
//! sds_owner: "tbd"
//! ---
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use sds_common::PathPattern;

use crate::position::{normalize_direction, Position};

/// Value of the legacy four-way `direct` field; the backend still expects it.
pub const LEGACY_DIRECT: i32 = 0;

/// Fully resolved point describing the agent at the start of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryPoint {
    pub latitude: f64,
    pub longitude: f64,
    pub direction: f64,
    pub timestamp: DateTime<Utc>,
    pub mode: PathPattern,
}

/// State captured when a dispatch is scheduled.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetrySnapshot {
    pub position: Position,
    pub direction: f64,
    pub mode: PathPattern,
    pub start_time: Option<DateTime<Utc>>,
}

impl TelemetrySnapshot {
    /// Resolve into a [`TelemetryPoint`]; `None` until a start time is confirmed.
    pub fn to_point(&self) -> Option<TelemetryPoint> {
        Some(TelemetryPoint {
            latitude: self.position.latitude,
            longitude: self.position.longitude,
            direction: normalize_direction(self.direction),
            timestamp: self.start_time?,
            mode: self.mode,
        })
    }
}

/// Body of `POST /gpspoint`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselinePayload {
    pub lat: f64,
    pub lon: f64,
    pub datetime: String,
    pub direct: i32,
    pub direction: f64,
    pub mode: u8,
    #[serde(rename = "isStart")]
    pub is_start: bool,
}

impl BaselinePayload {
    pub fn from_point(point: &TelemetryPoint) -> Self {
        Self {
            lat: point.latitude,
            lon: point.longitude,
            datetime: sds_common::time::iso8601(&point.timestamp),
            direct: LEGACY_DIRECT,
            direction: normalize_direction(point.direction),
            mode: point.mode.id(),
            is_start: true,
        }
    }
}

/// Body of `POST /direction`. Position and time are never re-sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeltaPayload {
    pub direct: i32,
    pub direction: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<u8>,
    #[serde(rename = "isStart")]
    pub is_start: bool,
}

impl DeltaPayload {
    pub fn new(direction: f64, mode: Option<PathPattern>, is_running: bool) -> Self {
        Self {
            direct: LEGACY_DIRECT,
            direction: normalize_direction(direction),
            mode: mode.map(|m| m.id()),
            is_start: is_running,
        }
    }
}

/// Body of `POST /gpspoint` announcing that the operator paused the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopPayload {
    pub direct: i32,
    pub direction: f64,
    #[serde(rename = "isStart")]
    pub is_start: bool,
}

impl StopPayload {
    pub fn new(direction: f64) -> Self {
        Self {
            direct: LEGACY_DIRECT,
            direction: normalize_direction(direction),
            is_start: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmissionKind {
    Baseline,
    Delta,
}

/// One outbound emission, chosen by the session's first-emission flag.
#[derive(Debug, Clone, PartialEq)]
pub enum Emission {
    Baseline(BaselinePayload),
    Delta(DeltaPayload),
}

impl Emission {
    /// Pick the payload variant for a running session.
    ///
    /// Returns `None` when a baseline is due but the snapshot has no start time.
    pub fn select(snapshot: &TelemetrySnapshot, first_emission_pending: bool) -> Option<Self> {
        if first_emission_pending {
            let point = snapshot.to_point()?;
            Some(Emission::Baseline(BaselinePayload::from_point(&point)))
        } else {
            Some(Emission::Delta(DeltaPayload::new(
                snapshot.direction,
                Some(snapshot.mode),
                true,
            )))
        }
    }

    pub fn kind(&self) -> EmissionKind {
        match self {
            Emission::Baseline(_) => EmissionKind::Baseline,
            Emission::Delta(_) => EmissionKind::Delta,
        }
    }
}
