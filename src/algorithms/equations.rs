//! TDOA residual equations
//!
//! For a candidate source `(x, y)` emitting at `t`, receiver `i` at
//! `(xi, yi)` hearing the event at `ti` contributes
//!
//! ```text
//! r_i = sqrt((x - xi)² + (y - yi)²) - C · (ti - t)
//! ```
//!
//! With the emission time unknown the state is `[x, y, t]`; with a known
//! emission time it is `[x, y]`.

use nalgebra::{DMatrix, DVector};

use crate::algorithms::solver::{ResidualSystem, SolverOutcome};
use crate::core::{Coordinate2D, EmissionTime, PlaneReceiver, SolveMethod, SourceEstimate};
use crate::validation::error::{InputError, LocatorResult};

/// Distance (m) under which a candidate sits on a receiver
const COINCIDENT_DISTANCE_M: f64 = 1e-12;

/// Residual system for one localization request
#[derive(Debug, Clone)]
pub struct TdoaSystem<'a> {
    receivers: &'a [PlaneReceiver],
    speed_of_sound: f64,
    emission: EmissionTime,
}

impl<'a> TdoaSystem<'a> {
    pub fn new(
        receivers: &'a [PlaneReceiver],
        speed_of_sound: f64,
        emission: EmissionTime,
    ) -> LocatorResult<Self> {
        let system = Self {
            receivers,
            speed_of_sound,
            emission,
        };
        if receivers.len() < system.unknown_count() {
            return Err(InputError::InsufficientReceivers {
                available: receivers.len(),
                required: system.unknown_count(),
            }
            .into());
        }
        Ok(system)
    }

    pub fn receivers(&self) -> &[PlaneReceiver] {
        self.receivers
    }

    pub fn speed_of_sound(&self) -> f64 {
        self.speed_of_sound
    }

    pub fn emission(&self) -> EmissionTime {
        self.emission
    }

    fn emission_at(&self, state: &DVector<f64>) -> f64 {
        match self.emission {
            EmissionTime::Solve => state[2],
            EmissionTime::Known(t) => t,
        }
    }

    /// Pack a position (and emission time when solved for) into a state vector
    pub fn encode(&self, position: &Coordinate2D, emission_time: f64) -> DVector<f64> {
        match self.emission {
            EmissionTime::Solve => DVector::from_vec(vec![position.x, position.y, emission_time]),
            EmissionTime::Known(_) => DVector::from_vec(vec![position.x, position.y]),
        }
    }

    /// Unpack a state vector into position and emission time
    pub fn decode(&self, state: &DVector<f64>) -> (Coordinate2D, f64) {
        (Coordinate2D::new(state[0], state[1]), self.emission_at(state))
    }

    /// Residual norm at a position and emission time
    pub fn residual_norm(&self, position: &Coordinate2D, emission_time: f64) -> f64 {
        self.residuals(&self.encode(position, emission_time)).norm()
    }

    /// Turn a solver run into an (unvalidated) estimate
    pub fn estimate(&self, outcome: &SolverOutcome) -> SourceEstimate {
        let (position, emission_time) = self.decode(&outcome.solution);
        SourceEstimate {
            position,
            emission_time: Some(emission_time),
            converged: outcome.converged,
            iterations: outcome.iterations,
            residual_norm: outcome.residual_norm,
            method: SolveMethod::Iterative,
            degradation: None,
        }
    }
}

impl ResidualSystem for TdoaSystem<'_> {
    fn residual_count(&self) -> usize {
        self.receivers.len()
    }

    fn unknown_count(&self) -> usize {
        match self.emission {
            EmissionTime::Solve => 3,
            EmissionTime::Known(_) => 2,
        }
    }

    fn residuals(&self, state: &DVector<f64>) -> DVector<f64> {
        let (x, y, t) = (state[0], state[1], self.emission_at(state));
        DVector::from_iterator(
            self.receivers.len(),
            self.receivers.iter().map(|r| {
                let distance = (x - r.position.x).hypot(y - r.position.y);
                distance - self.speed_of_sound * (r.arrival_time - t)
            }),
        )
    }

    fn jacobian(&self, state: &DVector<f64>) -> DMatrix<f64> {
        let (x, y) = (state[0], state[1]);
        let mut jacobian = DMatrix::<f64>::zeros(self.receivers.len(), self.unknown_count());

        for (i, r) in self.receivers.iter().enumerate() {
            let dx = x - r.position.x;
            let dy = y - r.position.y;
            let distance = dx.hypot(dy);

            // Gradient of the distance is undefined on the receiver itself
            if distance > COINCIDENT_DISTANCE_M {
                jacobian[(i, 0)] = dx / distance;
                jacobian[(i, 1)] = dy / distance;
            }
            if let EmissionTime::Solve = self.emission {
                jacobian[(i, 2)] = self.speed_of_sound;
            }
        }

        jacobian
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SPEED_OF_SOUND_AIR;
    use approx::assert_abs_diff_eq;

    fn synthetic(source: Coordinate2D, emitted_at: f64) -> Vec<PlaneReceiver> {
        [(0.0, 0.0), (120.0, 10.0), (40.0, 95.0), (-60.0, 50.0)]
            .iter()
            .map(|&(x, y)| {
                let p = Coordinate2D::new(x, y);
                PlaneReceiver {
                    position: p,
                    arrival_time: emitted_at + p.distance_to(&source) / SPEED_OF_SOUND_AIR,
                }
            })
            .collect()
    }

    #[test]
    fn test_true_source_has_zero_residuals() {
        let source = Coordinate2D::new(35.0, 42.0);
        let receivers = synthetic(source, 1.25);

        let solve_t = TdoaSystem::new(&receivers, SPEED_OF_SOUND_AIR, EmissionTime::Solve).unwrap();
        let residuals = solve_t.residuals(&solve_t.encode(&source, 1.25));
        assert_eq!(residuals.len(), 4);
        assert!(residuals.norm() < 1e-10);

        let known_t =
            TdoaSystem::new(&receivers, SPEED_OF_SOUND_AIR, EmissionTime::Known(1.25)).unwrap();
        assert!(known_t.residual_norm(&source, 1.25) < 1e-10);
        assert_eq!(known_t.unknown_count(), 2);
    }

    #[test]
    fn test_residual_sign_and_scale() {
        let receivers = [PlaneReceiver::new(3.0, 4.0, 0.5)];
        let system = TdoaSystem {
            receivers: &receivers,
            speed_of_sound: 2.0,
            emission: EmissionTime::Solve,
        };
        // distance 5, C·(0.5 - 0.0) = 1
        let r = system.residuals(&DVector::from_vec(vec![0.0, 0.0, 0.0]));
        assert_abs_diff_eq!(r[0], 4.0, epsilon = 1e-12);
    }

    #[test]
    fn test_jacobian_matches_finite_differences() {
        let receivers = synthetic(Coordinate2D::new(10.0, 20.0), 0.0);
        let system = TdoaSystem::new(&receivers, SPEED_OF_SOUND_AIR, EmissionTime::Solve).unwrap();
        let state = DVector::from_vec(vec![17.0, -3.0, -0.01]);
        let analytic = system.jacobian(&state);

        let h = 1e-6;
        for j in 0..3 {
            let mut plus = state.clone();
            let mut minus = state.clone();
            plus[j] += h;
            minus[j] -= h;
            let numeric = (system.residuals(&plus) - system.residuals(&minus)) / (2.0 * h);
            for i in 0..receivers.len() {
                assert_abs_diff_eq!(analytic[(i, j)], numeric[i], epsilon = 1e-5);
            }
        }
    }

    #[test]
    fn test_jacobian_on_receiver_has_no_position_gradient() {
        let receivers = synthetic(Coordinate2D::new(10.0, 20.0), 0.0);
        let system = TdoaSystem::new(&receivers, SPEED_OF_SOUND_AIR, EmissionTime::Solve).unwrap();
        let on_first = system.encode(&receivers[0].position, 0.0);
        let jacobian = system.jacobian(&on_first);

        assert_eq!(jacobian[(0, 0)], 0.0);
        assert_eq!(jacobian[(0, 1)], 0.0);
        assert_eq!(jacobian[(0, 2)], SPEED_OF_SOUND_AIR);
        assert!(jacobian.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_too_few_receivers_for_unknowns() {
        let receivers = [PlaneReceiver::new(0.0, 0.0, 0.1), PlaneReceiver::new(1.0, 0.0, 0.2)];
        assert!(TdoaSystem::new(&receivers, SPEED_OF_SOUND_AIR, EmissionTime::Solve).is_err());
        assert!(TdoaSystem::new(&receivers, SPEED_OF_SOUND_AIR, EmissionTime::Known(0.0)).is_ok());
    }
}
