//! Physical constants and solver defaults

/// Speed of sound in air at roughly 20 °C (m/s)
pub const SPEED_OF_SOUND_AIR: f64 = 343.0;

/// Mean Earth radius used by the spherical tangent-plane approximation (m).
///
/// The equirectangular projection built on it is only accurate for spans that
/// are small next to the radius (tens of kilometres). Altitude and ellipsoid
/// flattening are ignored.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Residual norm (m) below which the iterative solve counts as converged
pub const DEFAULT_SOLVER_TOLERANCE: f64 = 1e-10;

/// Relative step size below which a least-squares solve counts as stationary
pub const DEFAULT_STEP_TOLERANCE: f64 = 1.49e-8;

/// Hard cap on solver iterations
pub const DEFAULT_MAX_ITERATIONS: usize = 100;

/// Latitude offset (degrees) from the reference beyond which a fix is implausible
pub const DEFAULT_DIVERGENCE_THRESHOLD_DEG: f64 = 1.0;

/// Minimum receivers for a 2-D fix with unknown emission time
pub const MIN_RECEIVERS: usize = 3;
