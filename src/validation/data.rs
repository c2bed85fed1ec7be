use nalgebra::Matrix2;

use crate::core::{GeodeticCoordinate, Observation, PlaneReceiver, MIN_RECEIVERS};
use crate::validation::error::InputError;

/// Parameters for request validation
#[derive(Debug, Clone)]
pub struct ValidationConfig {
    /// Minimum number of receivers per request
    pub min_receivers: usize,
    /// Arrival-time spread (seconds) at or below which all times count as identical
    pub identical_time_epsilon: f64,
    /// Smallest/largest principal spread ratio below which receivers are collinear
    pub collinearity_ratio: f64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            min_receivers: MIN_RECEIVERS,
            identical_time_epsilon: 1e-12,
            collinearity_ratio: 1e-10,
        }
    }
}

/// Validates requests before any computation runs
#[derive(Debug, Clone, Default)]
pub struct DataValidator {
    config: ValidationConfig,
}

impl DataValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ValidationConfig) -> Self {
        Self { config }
    }

    /// Reject requests that are malformed or under-determined
    pub fn validate_observations(&self, observations: &[Observation]) -> Result<(), InputError> {
        if observations.len() < self.config.min_receivers {
            return Err(InputError::InsufficientReceivers {
                available: observations.len(),
                required: self.config.min_receivers,
            });
        }

        for (index, obs) in observations.iter().enumerate() {
            if !obs.position.latitude_deg.is_finite() {
                return Err(InputError::NonFinite { field: "latitude", index });
            }
            if !obs.position.longitude_deg.is_finite() {
                return Err(InputError::NonFinite { field: "longitude", index });
            }
            if !obs.arrival_time.is_finite() {
                return Err(InputError::NonFinite { field: "arrival time", index });
            }
            check_coordinate(&obs.position)?;
        }

        let times: Vec<f64> = observations.iter().map(|o| o.arrival_time).collect();
        self.check_distinct_times(&times)
    }

    /// All-equal arrival times leave the emission time and position entangled
    pub fn check_distinct_times(&self, times: &[f64]) -> Result<(), InputError> {
        let min = times.iter().copied().fold(f64::INFINITY, f64::min);
        let max = times.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if max - min <= self.config.identical_time_epsilon {
            return Err(InputError::IdenticalArrivalTimes { count: times.len() });
        }
        Ok(())
    }

    /// True when the receivers lie (nearly) on one line or one point
    pub fn is_collinear(&self, receivers: &[PlaneReceiver]) -> bool {
        spread_ratio(receivers) <= self.config.collinearity_ratio
    }
}

/// Reject coordinates outside the geodetic ranges
pub fn check_coordinate(coord: &GeodeticCoordinate) -> Result<(), InputError> {
    if !(-90.0..=90.0).contains(&coord.latitude_deg) {
        return Err(InputError::OutOfRange {
            field: "latitude",
            value: coord.latitude_deg,
            min: -90.0,
            max: 90.0,
        });
    }
    if !(-180.0..=180.0).contains(&coord.longitude_deg) {
        return Err(InputError::OutOfRange {
            field: "longitude",
            value: coord.longitude_deg,
            min: -180.0,
            max: 180.0,
        });
    }
    Ok(())
}

/// Ratio of the smallest to the largest principal spread of receiver positions.
///
/// 0 for collinear or coincident receivers, 1 for an isotropic layout.
pub fn spread_ratio(receivers: &[PlaneReceiver]) -> f64 {
    if receivers.len() < 3 {
        return 0.0;
    }

    let n = receivers.len() as f64;
    let mx = receivers.iter().map(|r| r.position.x).sum::<f64>() / n;
    let my = receivers.iter().map(|r| r.position.y).sum::<f64>() / n;

    let mut scatter = Matrix2::<f64>::zeros();
    for r in receivers {
        let dx = r.position.x - mx;
        let dy = r.position.y - my;
        scatter[(0, 0)] += dx * dx;
        scatter[(0, 1)] += dx * dy;
        scatter[(1, 1)] += dy * dy;
    }
    scatter[(1, 0)] = scatter[(0, 1)];

    let eigen = scatter.symmetric_eigenvalues();
    let largest = eigen.max();
    if largest <= 0.0 || !largest.is_finite() {
        return 0.0;
    }
    eigen.min().max(0.0) / largest
}
