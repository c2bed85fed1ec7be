use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::algorithms::solver::SolverSettings;
use crate::core::{
    EmissionTime, DEFAULT_DIVERGENCE_THRESHOLD_DEG, DEFAULT_MAX_ITERATIONS,
    DEFAULT_SOLVER_TOLERANCE, DEFAULT_STEP_TOLERANCE, EARTH_RADIUS_M, SPEED_OF_SOUND_AIR,
};

/// Locator configuration.
///
/// Every field has a default, so a JSON file only needs the keys it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocatorConfig {
    /// Speed of sound (m/s)
    pub speed_of_sound_mps: f64,
    /// Earth radius for the tangent-plane projection (m)
    pub earth_radius_m: f64,
    /// Residual norm at which the solver stops (m)
    pub solver_tolerance: f64,
    /// Relative step size at which a least-squares solve stops
    pub step_tolerance: f64,
    /// Hard iteration cap
    pub max_iterations: usize,
    /// Maximum latitude offset from the reference before a fix is rejected (degrees)
    pub divergence_threshold_deg: f64,
    /// Whether emission time is solved for or supplied
    pub emission_time: EmissionTime,
    /// Use the linear solve when the emission time is known
    pub prefer_closed_form: bool,
    /// Optional wall-clock budget per solve (milliseconds)
    pub time_budget_ms: Option<u64>,
}

/// Configuration errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("invalid value {value} for {parameter}: {reason}")]
    InvalidParameter {
        parameter: String,
        value: String,
        reason: String,
    },
    #[error("{message}")]
    IoError { message: String },
    #[error("{message}")]
    SerializationError { message: String },
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            speed_of_sound_mps: SPEED_OF_SOUND_AIR,
            earth_radius_m: EARTH_RADIUS_M,
            solver_tolerance: DEFAULT_SOLVER_TOLERANCE,
            step_tolerance: DEFAULT_STEP_TOLERANCE,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            divergence_threshold_deg: DEFAULT_DIVERGENCE_THRESHOLD_DEG,
            emission_time: EmissionTime::Solve,
            prefer_closed_form: true,
            time_budget_ms: None,
        }
    }
}

impl LocatorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load and validate a JSON configuration file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy().to_string();

        let content = fs::read_to_string(&path).map_err(|e| ConfigError::IoError {
            message: format!("Failed to read config file '{}': {}", path_str, e),
        })?;

        let config: LocatorConfig =
            serde_json::from_str(&content).map_err(|e| ConfigError::SerializationError {
                message: format!("Failed to parse config file '{}': {}", path_str, e),
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Write the configuration as pretty JSON
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path_str = path.as_ref().to_string_lossy().to_string();

        let content =
            serde_json::to_string_pretty(self).map_err(|e| ConfigError::SerializationError {
                message: format!("Failed to serialize configuration: {}", e),
            })?;

        fs::write(&path, content).map_err(|e| ConfigError::IoError {
            message: format!("Failed to write config file '{}': {}", path_str, e),
        })
    }

    /// Check every parameter, returning the first violation
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("speed_of_sound_mps", self.speed_of_sound_mps)?;
        positive("earth_radius_m", self.earth_radius_m)?;
        positive("solver_tolerance", self.solver_tolerance)?;
        positive("step_tolerance", self.step_tolerance)?;
        positive("divergence_threshold_deg", self.divergence_threshold_deg)?;

        if self.max_iterations == 0 {
            return Err(ConfigError::InvalidParameter {
                parameter: "max_iterations".to_string(),
                value: "0".to_string(),
                reason: "at least one iteration is required".to_string(),
            });
        }

        if let EmissionTime::Known(t) = self.emission_time {
            if !t.is_finite() {
                return Err(ConfigError::InvalidParameter {
                    parameter: "emission_time".to_string(),
                    value: t.to_string(),
                    reason: "must be a finite time in seconds".to_string(),
                });
            }
        }

        if self.time_budget_ms == Some(0) {
            return Err(ConfigError::InvalidParameter {
                parameter: "time_budget_ms".to_string(),
                value: "0".to_string(),
                reason: "omit the budget instead of setting it to zero".to_string(),
            });
        }

        Ok(())
    }

    /// Solver knobs derived from this configuration
    pub fn solver_settings(&self) -> SolverSettings {
        SolverSettings {
            tolerance: self.solver_tolerance,
            step_tolerance: self.step_tolerance,
            max_iterations: self.max_iterations,
            time_budget: self.time_budget_ms.map(Duration::from_millis),
        }
    }

    pub fn with_speed_of_sound(mut self, speed_mps: f64) -> Self {
        self.speed_of_sound_mps = speed_mps;
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.solver_tolerance = tolerance;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_emission_time(mut self, emission_time: EmissionTime) -> Self {
        self.emission_time = emission_time;
        self
    }

    pub fn with_closed_form(mut self, prefer: bool) -> Self {
        self.prefer_closed_form = prefer;
        self
    }

    pub fn with_divergence_threshold(mut self, threshold_deg: f64) -> Self {
        self.divergence_threshold_deg = threshold_deg;
        self
    }

    pub fn with_time_budget(mut self, budget: Duration) -> Self {
        self.time_budget_ms = Some(u64::try_from(budget.as_millis()).unwrap_or(u64::MAX));
        self
    }
}

fn positive(parameter: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidParameter {
            parameter: parameter.to_string(),
            value: value.to_string(),
            reason: "must be a positive finite number".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LocatorConfig::default();
        assert_eq!(config.speed_of_sound_mps, 343.0);
        assert_eq!(config.earth_radius_m, 6_371_000.0);
        assert_eq!(config.max_iterations, 100);
        assert_eq!(config.divergence_threshold_deg, 1.0);
        assert_eq!(config.emission_time, EmissionTime::Solve);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{ "speed_of_sound_mps": 340.0, "emission_time": { "known": 0.0 } }"#;
        let config: LocatorConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.speed_of_sound_mps, 340.0);
        assert_eq!(config.emission_time, EmissionTime::Known(0.0));
        assert_eq!(config.solver_tolerance, DEFAULT_SOLVER_TOLERANCE);

        let solve: LocatorConfig = serde_json::from_str(r#"{ "emission_time": "solve" }"#).unwrap();
        assert_eq!(solve.emission_time, EmissionTime::Solve);
    }

    #[test]
    fn test_invalid_parameters_rejected() {
        let config = LocatorConfig::default().with_speed_of_sound(-1.0);
        match config.validate() {
            Err(ConfigError::InvalidParameter { parameter, .. }) => {
                assert_eq!(parameter, "speed_of_sound_mps")
            }
            other => panic!("unexpected result: {:?}", other),
        }

        assert!(LocatorConfig::default().with_max_iterations(0).validate().is_err());
        assert!(LocatorConfig::default().with_tolerance(f64::NAN).validate().is_err());
        assert!(LocatorConfig::default()
            .with_emission_time(EmissionTime::Known(f64::INFINITY))
            .validate()
            .is_err());
    }

    #[test]
    fn test_config_file_round_trip() {
        let path = std::env::temp_dir().join(format!(
            "sound-locator-config-{}.json",
            std::process::id()
        ));
        let config = LocatorConfig::default()
            .with_tolerance(5e-14)
            .with_time_budget(Duration::from_millis(250));

        config.save_to_file(&path).unwrap();
        let loaded = LocatorConfig::from_file(&path).unwrap();
        let _ = fs::remove_file(&path);

        assert_eq!(loaded, config);
        assert_eq!(
            loaded.solver_settings().time_budget,
            Some(Duration::from_millis(250))
        );
    }

    #[test]
    fn test_huge_time_budget_saturates() {
        let config = LocatorConfig::default().with_time_budget(Duration::MAX);
        assert_eq!(config.time_budget_ms, Some(u64::MAX));

        let config = LocatorConfig::default().with_time_budget(Duration::from_micros(1500));
        assert_eq!(config.time_budget_ms, Some(1));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = LocatorConfig::from_file("/nonexistent/sound-locator.json");
        assert!(matches!(result, Err(ConfigError::IoError { .. })));
    }
}
