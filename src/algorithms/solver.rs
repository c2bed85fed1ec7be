//! Newton-type root finding over a residual system
//!
//! The solvers only see a [`ResidualSystem`]: a residual vector and its
//! Jacobian at a given state. Square systems are solved with damped Newton
//! steps; over-determined systems are minimised in the least-squares sense
//! with Levenberg-Marquardt. Both stop on a hard iteration cap and an optional
//! wall-clock budget, and report how they stopped instead of failing.

use nalgebra::{DMatrix, DVector};
use std::time::{Duration, Instant};
use tracing::debug;

use crate::core::{DEFAULT_MAX_ITERATIONS, DEFAULT_SOLVER_TOLERANCE, DEFAULT_STEP_TOLERANCE};

/// Smallest/largest singular value ratio below which a Jacobian is singular
const RANK_EPSILON: f64 = 1e-12;

/// A residual function with an analytic Jacobian
pub trait ResidualSystem {
    /// Number of residuals (rows)
    fn residual_count(&self) -> usize;
    /// Number of unknowns (columns)
    fn unknown_count(&self) -> usize;
    fn residuals(&self, state: &DVector<f64>) -> DVector<f64>;
    fn jacobian(&self, state: &DVector<f64>) -> DMatrix<f64>;

    fn is_square(&self) -> bool {
        self.residual_count() == self.unknown_count()
    }
}

/// Stopping parameters shared by all solvers
#[derive(Debug, Clone, PartialEq)]
pub struct SolverSettings {
    /// Residual norm at which the iteration stops as converged
    pub tolerance: f64,
    /// Relative step size at which a least-squares iteration stops as stationary
    pub step_tolerance: f64,
    pub max_iterations: usize,
    /// Checked between iterations, never inside one
    pub time_budget: Option<Duration>,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_SOLVER_TOLERANCE,
            step_tolerance: DEFAULT_STEP_TOLERANCE,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            time_budget: None,
        }
    }
}

/// Why an iteration stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Residual norm fell below the tolerance
    ResidualBelowTolerance,
    /// Residual stopped decreasing above the tolerance and the last step was negligible
    StationaryPoint,
    IterationLimit,
    TimeBudgetExceeded,
    /// Linearization could not be solved
    SingularJacobian,
    /// No step along the correction direction reduced the residual
    NoDescent,
    /// Residuals became NaN or infinite
    NonFinite,
}

impl Termination {
    pub fn is_converged(&self) -> bool {
        matches!(
            self,
            Termination::ResidualBelowTolerance | Termination::StationaryPoint
        )
    }
}

/// Result of a root-finding run
#[derive(Debug, Clone, PartialEq)]
pub struct SolverOutcome {
    pub solution: DVector<f64>,
    pub converged: bool,
    pub iterations: usize,
    pub residual_norm: f64,
    pub termination: Termination,
}

impl SolverOutcome {
    fn finish(solution: DVector<f64>, iterations: usize, residual_norm: f64, termination: Termination) -> Self {
        debug!(
            iterations,
            residual_norm,
            ?termination,
            "solver finished"
        );
        Self {
            converged: termination.is_converged(),
            solution,
            iterations,
            residual_norm,
            termination,
        }
    }
}

/// Pluggable root finder
pub trait RootFinder {
    fn solve(
        &self,
        system: &dyn ResidualSystem,
        seed: &DVector<f64>,
        settings: &SolverSettings,
    ) -> SolverOutcome;
}

/// Damped Newton-Raphson for square systems
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NewtonRaphson {
    /// Step halvings tried before giving up on an iteration
    pub max_step_halvings: usize,
}

impl Default for NewtonRaphson {
    fn default() -> Self {
        Self {
            max_step_halvings: 20,
        }
    }
}

impl RootFinder for NewtonRaphson {
    fn solve(
        &self,
        system: &dyn ResidualSystem,
        seed: &DVector<f64>,
        settings: &SolverSettings,
    ) -> SolverOutcome {
        let start = Instant::now();
        let mut x = seed.clone();
        let mut residuals = system.residuals(&x);
        let mut norm = residuals.norm();
        let mut iterations = 0;

        let termination = loop {
            if !norm.is_finite() {
                break Termination::NonFinite;
            }
            if norm <= settings.tolerance {
                break Termination::ResidualBelowTolerance;
            }
            if iterations >= settings.max_iterations {
                break Termination::IterationLimit;
            }
            if budget_exceeded(start, settings) {
                break Termination::TimeBudgetExceeded;
            }

            let jacobian = system.jacobian(&x);
            let step = match solve_linearized(jacobian, -&residuals) {
                Some(step) => step,
                None => break Termination::SingularJacobian,
            };
            iterations += 1;

            // Backtrack until the residual norm drops
            let mut scale = 1.0;
            let mut accepted = None;
            for _ in 0..=self.max_step_halvings {
                let candidate = &x + &step * scale;
                let candidate_residuals = system.residuals(&candidate);
                let candidate_norm = candidate_residuals.norm();
                if candidate_norm < norm {
                    accepted = Some((candidate, candidate_residuals, candidate_norm));
                    break;
                }
                scale *= 0.5;
            }

            match accepted {
                Some((next, next_residuals, next_norm)) => {
                    x = next;
                    residuals = next_residuals;
                    norm = next_norm;
                }
                // A full step this small means rounding, not the model, bounds the residual
                None if step.norm() <= settings.step_tolerance * (1.0 + x.norm()) => {
                    break Termination::StationaryPoint
                }
                None => break Termination::NoDescent,
            }
        };

        SolverOutcome::finish(x, iterations, norm, termination)
    }
}

/// Levenberg-Marquardt for over-determined systems
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevenbergMarquardt {
    pub initial_damping: f64,
    /// Damping multiplier after a rejected step
    pub damping_increase: f64,
    /// Damping divisor after an accepted step
    pub damping_decrease: f64,
    pub min_damping: f64,
    pub max_damping: f64,
}

impl Default for LevenbergMarquardt {
    fn default() -> Self {
        Self {
            initial_damping: 1e-3,
            damping_increase: 10.0,
            damping_decrease: 10.0,
            min_damping: 1e-12,
            max_damping: 1e12,
        }
    }
}

impl RootFinder for LevenbergMarquardt {
    fn solve(
        &self,
        system: &dyn ResidualSystem,
        seed: &DVector<f64>,
        settings: &SolverSettings,
    ) -> SolverOutcome {
        let start = Instant::now();
        let mut x = seed.clone();
        let mut residuals = system.residuals(&x);
        let mut norm = residuals.norm();
        let mut lambda = self.initial_damping;
        let mut iterations = 0;

        let termination = 'outer: loop {
            if !norm.is_finite() {
                break Termination::NonFinite;
            }
            if norm <= settings.tolerance {
                break Termination::ResidualBelowTolerance;
            }
            if iterations >= settings.max_iterations {
                break Termination::IterationLimit;
            }
            if budget_exceeded(start, settings) {
                break Termination::TimeBudgetExceeded;
            }

            let jacobian = system.jacobian(&x);
            if !has_full_column_rank(&jacobian) {
                break Termination::SingularJacobian;
            }
            iterations += 1;

            let jt = jacobian.transpose();
            let jtj = &jt * &jacobian;
            let gradient = &jt * &residuals;

            // (JᵀJ + λ·diag(JᵀJ)) Δ = -Jᵀr, raising λ until the cost drops
            loop {
                let mut augmented = jtj.clone();
                for i in 0..augmented.nrows() {
                    augmented[(i, i)] += lambda * jtj[(i, i)];
                }

                if let Some(step) = augmented.lu().solve(&(-&gradient)) {
                    let candidate = &x + &step;
                    let candidate_residuals = system.residuals(&candidate);
                    let candidate_norm = candidate_residuals.norm();

                    if candidate_norm < norm {
                        let stationary =
                            step.norm() <= settings.step_tolerance * (1.0 + x.norm());
                        x = candidate;
                        residuals = candidate_residuals;
                        norm = candidate_norm;
                        lambda = (lambda / self.damping_decrease).max(self.min_damping);
                        if stationary && norm > settings.tolerance {
                            break 'outer Termination::StationaryPoint;
                        }
                        break;
                    }
                }

                lambda *= self.damping_increase;
                if lambda > self.max_damping {
                    // Full-rank Jacobian and no descent even for tiny steps:
                    // x is a least-squares minimum to working precision.
                    break 'outer Termination::StationaryPoint;
                }
            }
        };

        SolverOutcome::finish(x, iterations, norm, termination)
    }
}

/// Newton for square systems, Levenberg-Marquardt otherwise
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AutoSolver {
    pub newton: NewtonRaphson,
    pub least_squares: LevenbergMarquardt,
}

impl RootFinder for AutoSolver {
    fn solve(
        &self,
        system: &dyn ResidualSystem,
        seed: &DVector<f64>,
        settings: &SolverSettings,
    ) -> SolverOutcome {
        if system.is_square() {
            self.newton.solve(system, seed, settings)
        } else {
            self.least_squares.solve(system, seed, settings)
        }
    }
}

/// Drive `system` from `seed` with the default solvers
pub fn solve(
    system: &dyn ResidualSystem,
    seed: &DVector<f64>,
    tolerance: f64,
    max_iterations: usize,
) -> SolverOutcome {
    let settings = SolverSettings {
        tolerance,
        max_iterations,
        ..SolverSettings::default()
    };
    AutoSolver::default().solve(system, seed, &settings)
}

fn budget_exceeded(start: Instant, settings: &SolverSettings) -> bool {
    settings
        .time_budget
        .map_or(false, |budget| start.elapsed() >= budget)
}

fn singular_value_ratio(singular_values: &DVector<f64>) -> f64 {
    let largest = singular_values.iter().copied().fold(0.0, f64::max);
    let smallest = singular_values.iter().copied().fold(f64::INFINITY, f64::min);
    if largest > 0.0 && largest.is_finite() {
        smallest / largest
    } else {
        0.0
    }
}

fn has_full_column_rank(matrix: &DMatrix<f64>) -> bool {
    if matrix.nrows() < matrix.ncols() {
        return false;
    }
    singular_value_ratio(&matrix.singular_values()) > RANK_EPSILON
}

/// Solve the square linearization `J Δ = rhs`, `None` when J is singular
fn solve_linearized(jacobian: DMatrix<f64>, rhs: DVector<f64>) -> Option<DVector<f64>> {
    let svd = jacobian.svd(true, true);
    if singular_value_ratio(&svd.singular_values) <= RANK_EPSILON {
        return None;
    }
    svd.solve(&rhs, 0.0).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    /// x² - 2 = 0, y - x = 0
    struct SquareRoot;

    impl ResidualSystem for SquareRoot {
        fn residual_count(&self) -> usize {
            2
        }
        fn unknown_count(&self) -> usize {
            2
        }
        fn residuals(&self, s: &DVector<f64>) -> DVector<f64> {
            DVector::from_vec(vec![s[0] * s[0] - 2.0, s[1] - s[0]])
        }
        fn jacobian(&self, s: &DVector<f64>) -> DMatrix<f64> {
            DMatrix::from_row_slice(2, 2, &[2.0 * s[0], 0.0, -1.0, 1.0])
        }
    }

    /// Fit y = a·x + b through points that are not exactly on a line
    struct LineFit {
        points: Vec<(f64, f64)>,
    }

    impl ResidualSystem for LineFit {
        fn residual_count(&self) -> usize {
            self.points.len()
        }
        fn unknown_count(&self) -> usize {
            2
        }
        fn residuals(&self, s: &DVector<f64>) -> DVector<f64> {
            DVector::from_iterator(
                self.points.len(),
                self.points.iter().map(|(x, y)| s[0] * x + s[1] - y),
            )
        }
        fn jacobian(&self, _s: &DVector<f64>) -> DMatrix<f64> {
            DMatrix::from_fn(self.points.len(), 2, |i, j| {
                if j == 0 {
                    self.points[i].0
                } else {
                    1.0
                }
            })
        }
    }

    /// Residuals that ignore the second unknown
    struct Flat;

    impl ResidualSystem for Flat {
        fn residual_count(&self) -> usize {
            2
        }
        fn unknown_count(&self) -> usize {
            2
        }
        fn residuals(&self, s: &DVector<f64>) -> DVector<f64> {
            DVector::from_vec(vec![s[0] - 1.0, 2.0 * s[0] + 3.0])
        }
        fn jacobian(&self, _s: &DVector<f64>) -> DMatrix<f64> {
            DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 2.0, 0.0])
        }
    }

    #[test]
    fn test_newton_converges_on_square_system() {
        let seed = DVector::from_vec(vec![1.0, 0.0]);
        let outcome = solve(&SquareRoot, &seed, 1e-12, 50);

        assert!(outcome.converged);
        assert_eq!(outcome.termination, Termination::ResidualBelowTolerance);
        assert!(outcome.residual_norm <= 1e-12);
        assert!(outcome.iterations > 0 && outcome.iterations < 20);
        assert_abs_diff_eq!(outcome.solution[0], 2.0_f64.sqrt(), epsilon = 1e-12);
        assert_abs_diff_eq!(outcome.solution[1], 2.0_f64.sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn test_newton_stops_at_rounding_floor() {
        // x² - 2 has no exact root in f64, so a zero tolerance is unreachable
        let seed = DVector::from_vec(vec![1.0, 0.0]);
        let outcome = solve(&SquareRoot, &seed, 0.0, 100);

        assert!(outcome.converged);
        assert_eq!(outcome.termination, Termination::StationaryPoint);
        assert!(outcome.iterations < 20);
        assert!(outcome.residual_norm < 1e-14);
        assert_abs_diff_eq!(outcome.solution[0], 2.0_f64.sqrt(), epsilon = 1e-15);
    }

    #[test]
    fn test_iteration_cap_is_reported() {
        let seed = DVector::from_vec(vec![100.0, -40.0]);
        let outcome = solve(&SquareRoot, &seed, 1e-14, 2);

        assert!(!outcome.converged);
        assert_eq!(outcome.iterations, 2);
        assert_eq!(outcome.termination, Termination::IterationLimit);
        assert!(outcome.residual_norm > 1e-14);
    }

    #[test]
    fn test_singular_jacobian_stops() {
        let seed = DVector::from_vec(vec![0.0, 0.0]);
        let outcome = solve(&Flat, &seed, 1e-10, 50);

        assert!(!outcome.converged);
        assert_eq!(outcome.termination, Termination::SingularJacobian);
        assert_eq!(outcome.iterations, 0);
        assert_eq!(outcome.solution, seed);
    }

    #[test]
    fn test_least_squares_reaches_stationary_point() {
        let system = LineFit {
            points: vec![(0.0, 0.1), (1.0, 0.9), (2.0, 2.1), (3.0, 2.9)],
        };
        let seed = DVector::from_vec(vec![0.0, 0.0]);
        let outcome = solve(&system, &seed, 1e-10, 100);

        assert!(outcome.converged);
        assert_eq!(outcome.termination, Termination::StationaryPoint);
        // ordinary least squares: a = 0.96, b = 0.06
        assert_abs_diff_eq!(outcome.solution[0], 0.96, epsilon = 1e-6);
        assert_abs_diff_eq!(outcome.solution[1], 0.06, epsilon = 1e-6);
        assert!(outcome.residual_norm > 0.1);
    }

    #[test]
    fn test_zero_time_budget_stops_before_first_step() {
        let settings = SolverSettings {
            time_budget: Some(Duration::ZERO),
            ..SolverSettings::default()
        };
        let seed = DVector::from_vec(vec![1.0, 0.0]);
        let outcome = AutoSolver::default().solve(&SquareRoot, &seed, &settings);

        assert!(!outcome.converged);
        assert_eq!(outcome.termination, Termination::TimeBudgetExceeded);
        assert_eq!(outcome.iterations, 0);
    }
}
