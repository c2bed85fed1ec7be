//! Localization algorithms

pub mod closed_form;
pub mod equations;
pub mod projection;
pub mod seed;
pub mod solver;

pub use closed_form::{locate_known_emission, solve_linear};
pub use equations::TdoaSystem;
pub use projection::{to_geodetic, to_plane, GeoProjection};
pub use seed::{seed, SeedState};
pub use solver::{
    solve, AutoSolver, LevenbergMarquardt, NewtonRaphson, ResidualSystem, RootFinder,
    SolverOutcome, SolverSettings, Termination,
};
