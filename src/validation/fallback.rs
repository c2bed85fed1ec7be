//! Plausibility checks on solver output
//!
//! A fix that did not converge, is not finite, or lands implausibly far
//! from the receivers is replaced by the seed position (the earliest
//! receiver). The replacement is flagged, never returned as a success.

use tracing::warn;

use crate::algorithms::projection::GeoProjection;
use crate::algorithms::seed::SeedState;
use crate::core::{Degradation, ProjectionFrame, SourceEstimate, DEFAULT_DIVERGENCE_THRESHOLD_DEG};

/// Checks solver results and substitutes the seed when they fail
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResultValidator {
    projection: GeoProjection,
    /// Largest accepted |latitude - reference latitude| in degrees
    divergence_threshold_deg: f64,
}

impl Default for ResultValidator {
    fn default() -> Self {
        Self::new(GeoProjection::default(), DEFAULT_DIVERGENCE_THRESHOLD_DEG)
    }
}

impl ResultValidator {
    pub fn new(projection: GeoProjection, divergence_threshold_deg: f64) -> Self {
        Self {
            projection,
            divergence_threshold_deg,
        }
    }

    pub fn divergence_threshold_deg(&self) -> f64 {
        self.divergence_threshold_deg
    }

    /// Accept `candidate` or replace it with the seed.
    pub fn validate(
        &self,
        candidate: SourceEstimate,
        seed: &SeedState,
        frame: &ProjectionFrame,
    ) -> SourceEstimate {
        if !candidate.position.is_finite() {
            let reason = Degradation::NonFiniteSolution {
                iterations: candidate.iterations,
                residual_norm: candidate.residual_norm,
            };
            return self.fallback(candidate, seed, reason);
        }

        if !candidate.converged {
            let reason = Degradation::ConvergenceFailure {
                iterations: candidate.iterations,
                residual_norm: candidate.residual_norm,
            };
            return self.fallback(candidate, seed, reason);
        }

        if let Some(reason) = self.divergence(&candidate, frame) {
            return self.fallback(candidate, seed, reason);
        }

        candidate
    }

    fn divergence(&self, candidate: &SourceEstimate, frame: &ProjectionFrame) -> Option<Degradation> {
        // An inverse that cannot be computed is as implausible as a far one
        let latitude_deg = match self.projection.to_geodetic(&candidate.position, frame) {
            Ok(geo) => geo.latitude_deg,
            Err(_) => f64::NAN,
        };

        let offset = (latitude_deg - frame.reference_latitude_deg).abs();
        if offset <= self.divergence_threshold_deg {
            return None;
        }
        Some(Degradation::Divergence {
            latitude_deg,
            reference_latitude_deg: frame.reference_latitude_deg,
        })
    }

    /// Replace `candidate` with the seed, keeping its solver diagnostics
    pub fn fallback(
        &self,
        candidate: SourceEstimate,
        seed: &SeedState,
        reason: Degradation,
    ) -> SourceEstimate {
        warn!(
            receiver = seed.receiver_index,
            iterations = candidate.iterations,
            residual_norm = candidate.residual_norm,
            ?reason,
            "falling back to nearest receiver"
        );

        SourceEstimate {
            position: seed.position,
            emission_time: None,
            converged: false,
            degradation: Some(reason),
            ..candidate
        }
    }
}
