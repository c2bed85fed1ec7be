//! Request and response types for the locator API

use serde::{Deserialize, Serialize};

use crate::core::{
    Coordinate2D, Degradation, GeodeticCoordinate, Observation, ProjectionFrame, SolveMethod,
    SourceEstimate,
};

/// One localization request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocateRequest {
    pub observations: Vec<Observation>,
}

impl LocateRequest {
    pub fn new(observations: Vec<Observation>) -> Self {
        Self { observations }
    }

    /// Build from the `t1..tN lat1..latN lon1..lonN` layout
    pub fn from_columns(times: &[f64], latitudes: &[f64], longitudes: &[f64]) -> Option<Self> {
        if times.len() != latitudes.len() || times.len() != longitudes.len() {
            return None;
        }
        let observations = times
            .iter()
            .zip(latitudes)
            .zip(longitudes)
            .map(|((&t, &lat), &lon)| Observation::new(lat, lon, t))
            .collect();
        Some(Self { observations })
    }
}

/// Located source with solver diagnostics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocateResponse {
    pub latitude_deg: f64,
    pub longitude_deg: f64,
    /// Plane position in the request's frame (meters)
    pub local: Coordinate2D,
    pub frame: ProjectionFrame,
    pub diagnostics: Diagnostics,
}

impl LocateResponse {
    pub fn from_estimate(
        estimate: &SourceEstimate,
        position: GeodeticCoordinate,
        frame: ProjectionFrame,
    ) -> Self {
        Self {
            latitude_deg: position.latitude_deg,
            longitude_deg: position.longitude_deg,
            local: estimate.position,
            frame,
            diagnostics: Diagnostics::from(estimate),
        }
    }

    pub fn position(&self) -> GeodeticCoordinate {
        GeodeticCoordinate::new(self.latitude_deg, self.longitude_deg)
    }

    pub fn is_degraded(&self) -> bool {
        self.diagnostics.degradation.is_some()
    }
}

/// How the fix was obtained
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    pub converged: bool,
    pub iterations: usize,
    pub residual_norm: f64,
    /// Solved or supplied emission time (seconds), absent on fallback
    pub emission_time: Option<f64>,
    pub method: SolveMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub degradation: Option<Degradation>,
}

impl From<&SourceEstimate> for Diagnostics {
    fn from(estimate: &SourceEstimate) -> Self {
        Self {
            converged: estimate.converged,
            iterations: estimate.iterations,
            residual_norm: estimate.residual_norm,
            emission_time: estimate.emission_time,
            method: estimate.method,
            degradation: estimate.degradation.clone(),
        }
    }
}
