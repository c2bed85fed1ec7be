//! Error types for the locator

use thiserror::Error;

use crate::core::Degradation;
use crate::utils::config::ConfigError;

/// Result type for locator operations
pub type LocatorResult<T> = Result<T, LocatorError>;

/// Errors surfaced by the locator
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LocatorError {
    /// Malformed or under-determined request, nothing was computed
    #[error("invalid input: {0}")]
    Input(#[from] InputError),

    /// Receiver layout makes the linear system singular
    #[error("degenerate receiver geometry: {reason} (conditioning {conditioning:e})")]
    Geometry { reason: String, conditioning: f64 },

    /// Solver ran out of iterations or budget
    #[error("solver did not converge after {iterations} iterations (residual norm {residual_norm:e})")]
    ConvergenceFailure { iterations: usize, residual_norm: f64 },

    /// Solver converged on a geographically implausible point
    #[error("solution diverged: latitude {latitude_deg:.6}° is more than the threshold away from reference {reference_latitude_deg:.6}°")]
    Divergence {
        latitude_deg: f64,
        reference_latitude_deg: f64,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Reasons an input request is rejected
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InputError {
    #[error("{available} receivers given, at least {required} required")]
    InsufficientReceivers { available: usize, required: usize },

    #[error("all {count} receivers report the same arrival time")]
    IdenticalArrivalTimes { count: usize },

    #[error("{field} of receiver {index} is not a finite number")]
    NonFinite { field: &'static str, index: usize },

    #[error("{field} {value} is outside [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("reference latitude {latitude_deg}° is at a pole, longitude scale is undefined")]
    PolarReference { latitude_deg: f64 },

    #[error("receiver {index} heard the event before the known emission time")]
    NegativeRange { index: usize },

    #[error("{0}")]
    Malformed(String),
}

impl LocatorError {
    pub fn geometry(reason: impl Into<String>, conditioning: f64) -> Self {
        LocatorError::Geometry {
            reason: reason.into(),
            conditioning,
        }
    }

    /// True for errors raised before any computation (bad request shape or values)
    pub fn is_input(&self) -> bool {
        matches!(self, LocatorError::Input(_) | LocatorError::Config(_))
    }
}

impl Degradation {
    /// The error a caller would see if degraded fixes were treated as failures
    pub fn as_error(&self) -> LocatorError {
        match self {
            Degradation::ConvergenceFailure {
                iterations,
                residual_norm,
            } => LocatorError::ConvergenceFailure {
                iterations: *iterations,
                residual_norm: *residual_norm,
            },
            Degradation::Divergence {
                latitude_deg,
                reference_latitude_deg,
            } => LocatorError::Divergence {
                latitude_deg: *latitude_deg,
                reference_latitude_deg: *reference_latitude_deg,
            },
            Degradation::NonFiniteSolution {
                iterations,
                residual_norm,
            } => LocatorError::ConvergenceFailure {
                iterations: *iterations,
                residual_norm: *residual_norm,
            },
            Degradation::DegenerateGeometry { spread_ratio } => {
                LocatorError::geometry("receivers are collinear", *spread_ratio)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_error_converts() {
        let err: LocatorError = InputError::InsufficientReceivers {
            available: 2,
            required: 3,
        }
        .into();
        assert!(err.is_input());
        assert_eq!(
            err.to_string(),
            "invalid input: 2 receivers given, at least 3 required"
        );
    }

    #[test]
    fn test_degradation_maps_to_soft_errors() {
        let diverged = Degradation::Divergence {
            latitude_deg: 45.0,
            reference_latitude_deg: 38.9,
        };
        assert!(matches!(diverged.as_error(), LocatorError::Divergence { .. }));

        let stalled = Degradation::ConvergenceFailure {
            iterations: 100,
            residual_norm: 3.5,
        };
        assert_eq!(
            stalled.as_error(),
            LocatorError::ConvergenceFailure {
                iterations: 100,
                residual_norm: 3.5
            }
        );

        let flat = Degradation::DegenerateGeometry { spread_ratio: 0.0 };
        assert!(matches!(flat.as_error(), LocatorError::Geometry { .. }));
        assert!(!flat.as_error().is_input());
    }

    #[test]
    fn test_non_finite_keeps_solver_diagnostics() {
        let blown_up = Degradation::NonFiniteSolution {
            iterations: 7,
            residual_norm: f64::INFINITY,
        };
        assert!(matches!(
            blown_up.as_error(),
            LocatorError::ConvergenceFailure {
                iterations: 7,
                residual_norm
            } if residual_norm.is_infinite()
        ));
    }
}
