//! ---
//! sds_section: "02-emission-core"
//! sds_subsection: "module"
//! sds_type: "source"
//! sds_scope: "code"
//! sds_description: "Operator-confirmed simulation start time."
//! sds_version: "v0.1.0"
//! sds_owner: "tbd"
//! ---
use chrono::{DateTime, SubsecRound, Utc};

/// Simulated "current time" owned by a single session controller.
///
/// The operator confirms a start timestamp before a session may run; the
/// baseline emission carries it. Sub-second precision is dropped on confirm.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimulationClock {
    start: Option<DateTime<Utc>>,
}

impl SimulationClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn confirm(&mut self, start: DateTime<Utc>) -> DateTime<Utc> {
        let start = start.trunc_subsecs(0);
        self.start = Some(start);
        start
    }

    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.start
    }

    pub fn is_confirmed(&self) -> bool {
        self.start.is_some()
    }

    pub fn clear(&mut self) {
        self.start = None;
    }
}
