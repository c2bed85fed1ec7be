//! Core data types for the locator

use serde::{Deserialize, Serialize};

/// Geodetic position on the reference sphere
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeodeticCoordinate {
    /// Latitude in decimal degrees, [-90, 90]
    pub latitude_deg: f64,
    /// Longitude in decimal degrees, [-180, 180]
    pub longitude_deg: f64,
}

impl GeodeticCoordinate {
    pub fn new(latitude_deg: f64, longitude_deg: f64) -> Self {
        Self {
            latitude_deg,
            longitude_deg,
        }
    }
}

/// Position in the local tangent plane (meters east, meters north)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Coordinate2D {
    pub x: f64,
    pub y: f64,
}

impl Coordinate2D {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &Coordinate2D) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    pub fn norm(&self) -> f64 {
        self.x.hypot(self.y)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Parameters needed to move between geodetic and plane coordinates.
///
/// A frame is fixed once per request and must travel with every
/// [`Coordinate2D`] that will be converted back.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProjectionFrame {
    /// Latitude whose cosine scales longitude
    pub reference_latitude_deg: f64,
    /// Plane-space point subtracted after projection
    pub origin: Coordinate2D,
}

impl ProjectionFrame {
    /// Frame with the raw equirectangular origin (the equator/prime meridian)
    pub fn new(reference_latitude_deg: f64) -> Self {
        Self {
            reference_latitude_deg,
            origin: Coordinate2D::default(),
        }
    }

    pub fn with_origin(mut self, origin: Coordinate2D) -> Self {
        self.origin = origin;
        self
    }
}

/// One receiver's geodetic position and the time it heard the event
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    #[serde(flatten)]
    pub position: GeodeticCoordinate,
    /// Arrival time in seconds on the common clock
    #[serde(rename = "arrival_time_seconds")]
    pub arrival_time: f64,
}

impl Observation {
    pub fn new(latitude_deg: f64, longitude_deg: f64, arrival_time: f64) -> Self {
        Self {
            position: GeodeticCoordinate::new(latitude_deg, longitude_deg),
            arrival_time,
        }
    }
}

/// Receiver projected into the local plane
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaneReceiver {
    pub position: Coordinate2D,
    pub arrival_time: f64,
}

impl PlaneReceiver {
    pub fn new(x: f64, y: f64, arrival_time: f64) -> Self {
        Self {
            position: Coordinate2D::new(x, y),
            arrival_time,
        }
    }
}

/// How the emission time of the event is treated
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmissionTime {
    /// Emission time is a third unknown next to (x, y)
    #[default]
    Solve,
    /// Emission time is known on the receivers' clock (seconds)
    Known(f64),
}

impl EmissionTime {
    pub fn known(&self) -> Option<f64> {
        match self {
            EmissionTime::Solve => None,
            EmissionTime::Known(t) => Some(*t),
        }
    }
}

/// Which route produced a fix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolveMethod {
    /// Newton / Levenberg-Marquardt over the TDOA residuals
    Iterative,
    /// Linear solve with a known emission time
    ClosedForm,
}

/// Reason a fix was replaced by the nearest-receiver fallback
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Degradation {
    /// Solver stopped without meeting its tolerance
    ConvergenceFailure { iterations: usize, residual_norm: f64 },
    /// Solver returned a fix too far from the reference latitude
    Divergence {
        latitude_deg: f64,
        reference_latitude_deg: f64,
    },
    /// Solver returned NaN or infinity
    NonFiniteSolution { iterations: usize, residual_norm: f64 },
    /// Receivers are (nearly) collinear so the fix is not unique
    DegenerateGeometry { spread_ratio: f64 },
}

/// Result of one solve in plane coordinates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceEstimate {
    pub position: Coordinate2D,
    /// Emission time (seconds), `None` when the fallback discarded it
    pub emission_time: Option<f64>,
    pub converged: bool,
    pub iterations: usize,
    pub residual_norm: f64,
    pub method: SolveMethod,
    /// Set when the position is the nearest-receiver fallback
    pub degradation: Option<Degradation>,
}

impl SourceEstimate {
    pub fn is_degraded(&self) -> bool {
        self.degradation.is_some()
    }
}
