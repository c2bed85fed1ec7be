//! Blocking locator API
//!
//! [`Locator`] runs the whole pipeline for one request: input checks,
//! projection into a centered plane, the closed-form or iterative solve,
//! plausibility checks and the inverse projection.

use std::thread;

use tracing::debug;

use crate::algorithms::closed_form::locate_known_emission;
use crate::algorithms::equations::TdoaSystem;
use crate::algorithms::projection::GeoProjection;
use crate::algorithms::seed::{seed, SeedState};
use crate::algorithms::solver::{AutoSolver, RootFinder};
use crate::api::types::{LocateRequest, LocateResponse};
use crate::core::{
    Coordinate2D, Degradation, EmissionTime, GeodeticCoordinate, Observation, PlaneReceiver,
    ProjectionFrame, SolveMethod, SourceEstimate,
};
use crate::utils::config::LocatorConfig;
use crate::validation::data::{spread_ratio, DataValidator};
use crate::validation::error::{LocatorError, LocatorResult};
use crate::validation::fallback::ResultValidator;

/// Synchronous acoustic source locator
#[derive(Debug, Clone)]
pub struct Locator<F = AutoSolver> {
    config: LocatorConfig,
    projection: GeoProjection,
    data_validator: DataValidator,
    result_validator: ResultValidator,
    root_finder: F,
}

impl Default for Locator {
    fn default() -> Self {
        Self::assemble(LocatorConfig::default(), AutoSolver::default())
    }
}

impl Locator {
    /// Create a locator with the default root finder
    pub fn new(config: LocatorConfig) -> LocatorResult<Self> {
        Self::with_root_finder(config, AutoSolver::default())
    }
}

impl<F: RootFinder> Locator<F> {
    /// Create a locator around a custom root finder
    pub fn with_root_finder(config: LocatorConfig, root_finder: F) -> LocatorResult<Self> {
        config.validate()?;
        Ok(Self::assemble(config, root_finder))
    }

    fn assemble(config: LocatorConfig, root_finder: F) -> Self {
        let projection = GeoProjection::new(config.earth_radius_m);
        Self {
            result_validator: ResultValidator::new(projection, config.divergence_threshold_deg),
            data_validator: DataValidator::new(),
            projection,
            root_finder,
            config,
        }
    }

    pub fn config(&self) -> &LocatorConfig {
        &self.config
    }

    /// Locate the source of one event.
    ///
    /// Soft failures (no convergence, divergence, collinear receivers) are
    /// not errors: the response carries the nearest-receiver fallback and a
    /// degradation reason.
    pub fn locate(&self, observations: &[Observation]) -> LocatorResult<LocateResponse> {
        self.data_validator.validate_observations(observations)?;

        let coords: Vec<GeodeticCoordinate> = observations.iter().map(|o| o.position).collect();
        let frame = self.projection.centered_frame(&coords)?;
        let receivers = self.projection.project_all(observations, &frame)?;
        debug!(
            receivers = receivers.len(),
            reference_latitude_deg = frame.reference_latitude_deg,
            "projected request"
        );

        let estimate = self.locate_plane(&receivers, &frame)?;
        let position = self.projection.to_geodetic(&estimate.position, &frame)?;

        Ok(LocateResponse::from_estimate(&estimate, position, frame))
    }

    pub fn locate_request(&self, request: &LocateRequest) -> LocatorResult<LocateResponse> {
        self.locate(&request.observations)
    }

    /// Solve for receivers already projected into `frame`
    pub fn locate_plane(
        &self,
        receivers: &[PlaneReceiver],
        frame: &ProjectionFrame,
    ) -> LocatorResult<SourceEstimate> {
        let emission = self.config.emission_time;
        let start = seed(receivers, emission)?;

        if let (EmissionTime::Known(t0), true) = (emission, self.config.prefer_closed_form) {
            match locate_known_emission(receivers, t0, self.config.speed_of_sound_mps) {
                Ok(position) => {
                    let candidate = self.closed_form_estimate(receivers, position, t0)?;
                    return Ok(self.result_validator.validate(candidate, &start, frame));
                }
                Err(LocatorError::Geometry { reason, conditioning }) => {
                    debug!(%reason, conditioning, "closed form singular, solving iteratively");
                }
                Err(e) => return Err(e),
            }
        }

        let system = TdoaSystem::new(receivers, self.config.speed_of_sound_mps, emission)?;
        let outcome = self.root_finder.solve(
            &system,
            &start.to_vector(),
            &self.config.solver_settings(),
        );
        let candidate = system.estimate(&outcome);

        Ok(self.check_geometry(candidate, receivers, &start, frame))
    }

    fn closed_form_estimate(
        &self,
        receivers: &[PlaneReceiver],
        position: Coordinate2D,
        emission_time: f64,
    ) -> LocatorResult<SourceEstimate> {
        let system = TdoaSystem::new(
            receivers,
            self.config.speed_of_sound_mps,
            EmissionTime::Known(emission_time),
        )?;
        Ok(SourceEstimate {
            position,
            emission_time: Some(emission_time),
            converged: true,
            iterations: 0,
            residual_norm: system.residual_norm(&position, emission_time),
            method: SolveMethod::ClosedForm,
            degradation: None,
        })
    }

    /// Collinear receivers give a mirror-ambiguous fix, so the seed wins
    fn check_geometry(
        &self,
        candidate: SourceEstimate,
        receivers: &[PlaneReceiver],
        start: &SeedState,
        frame: &ProjectionFrame,
    ) -> SourceEstimate {
        if self.data_validator.is_collinear(receivers) {
            let reason = Degradation::DegenerateGeometry {
                spread_ratio: spread_ratio(receivers),
            };
            return self.result_validator.fallback(candidate, start, reason);
        }
        self.result_validator.validate(candidate, start, frame)
    }
}

impl<F: RootFinder + Sync> Locator<F> {
    /// Locate many independent events, spreading them over scoped threads.
    ///
    /// Results come back in request order.
    pub fn locate_batch(&self, requests: &[LocateRequest]) -> Vec<LocatorResult<LocateResponse>> {
        if requests.is_empty() {
            return Vec::new();
        }

        let workers = thread::available_parallelism()
            .map_or(1, |n| n.get())
            .min(requests.len());
        let chunk_size = requests.len().div_ceil(workers);

        thread::scope(|scope| {
            let handles: Vec<_> = requests
                .chunks(chunk_size)
                .map(|chunk| {
                    scope.spawn(move || {
                        chunk
                            .iter()
                            .map(|request| self.locate_request(request))
                            .collect::<Vec<_>>()
                    })
                })
                .collect();

            handles
                .into_iter()
                .flat_map(|handle| match handle.join() {
                    Ok(results) => results,
                    Err(panic) => std::panic::resume_unwind(panic),
                })
                .collect()
        })
    }
}
