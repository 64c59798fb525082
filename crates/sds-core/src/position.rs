//! ---
//! sds_section: "02-emission-core"
//! sds_subsection: "module"
//! sds_type: "source"
//! sds_scope: "code"
//! sds_description: "Agent position storage with range clamping and rounding."
//! sds_version: "v0.1.0"
//! sds_owner: "tbd"
//! ---
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::warn;

pub const LATITUDE_LIMIT: f64 = 90.0;
pub const LONGITUDE_LIMIT: f64 = 180.0;
const FULL_TURN: f64 = 360.0;
const ROUNDING_SCALE: f64 = 10_000.0;

/// Round to four decimal places.
pub fn round4(value: f64) -> f64 {
    (value * ROUNDING_SCALE).round() / ROUNDING_SCALE
}

pub fn clamp_latitude(value: f64) -> f64 {
    round4(value.clamp(-LATITUDE_LIMIT, LATITUDE_LIMIT))
}

pub fn clamp_longitude(value: f64) -> f64 {
    round4(value.clamp(-LONGITUDE_LIMIT, LONGITUDE_LIMIT))
}

/// Wrap a heading into `[0, 360)`. Non-finite input maps to north.
pub fn normalize_direction(value: f64) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    let wrapped = value.rem_euclid(FULL_TURN);
    // rem_euclid can round up to exactly 360 for tiny negative inputs
    if wrapped >= FULL_TURN {
        0.0
    } else {
        wrapped
    }
}

/// Latitude/longitude pair, already clamped and rounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
}

/// Mutable position holder used by the session controller.
///
/// Every stored value is clamped into its legal range and rounded to four
/// decimals, so out-of-range input can never reach the network boundary.
#[derive(Debug, Clone, Default)]
pub struct PositionState {
    current: Position,
}

impl PositionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn position(&self) -> Position {
        self.current
    }

    pub fn latitude(&self) -> f64 {
        self.current.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.current.longitude
    }

    /// Store a latitude and return the value actually kept.
    pub fn set_latitude(&mut self, value: f64) -> f64 {
        if value.is_nan() {
            warn!(input = value, "ignoring non-numeric latitude");
            return self.current.latitude;
        }
        self.current.latitude = clamp_latitude(value);
        self.current.latitude
    }

    /// Store a longitude and return the value actually kept.
    pub fn set_longitude(&mut self, value: f64) -> f64 {
        if value.is_nan() {
            warn!(input = value, "ignoring non-numeric longitude");
            return self.current.longitude;
        }
        self.current.longitude = clamp_longitude(value);
        self.current.longitude
    }

    pub fn randomize_latitude_with<R: Rng + ?Sized>(&mut self, rng: &mut R) -> f64 {
        self.set_latitude(rng.gen_range(-LATITUDE_LIMIT..=LATITUDE_LIMIT))
    }

    pub fn randomize_longitude_with<R: Rng + ?Sized>(&mut self, rng: &mut R) -> f64 {
        self.set_longitude(rng.gen_range(-LONGITUDE_LIMIT..=LONGITUDE_LIMIT))
    }

    /// Draw a uniformly distributed legal position.
    pub fn randomize_with<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Position {
        self.randomize_latitude_with(rng);
        self.randomize_longitude_with(rng);
        self.current
    }

    pub fn randomize(&mut self) -> Position {
        self.randomize_with(&mut rand::thread_rng())
    }

    pub fn reset(&mut self) {
        self.current = Position::default();
    }
}
