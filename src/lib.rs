//! Acoustic source locator
//!
//! Estimates where a sound was emitted from the times at which three or more
//! receivers of known latitude and longitude heard it (time difference of
//! arrival multilateration). Receivers are projected into a local
//! equirectangular plane, the hyperbolic TDOA equations are solved from a
//! nearest-receiver seed, and implausible fixes fall back to that seed with
//! a flag instead of being returned as successes.
//!
//! ```no_run
//! use sound_locator::{Locator, Observation};
//!
//! let locator = Locator::default();
//! let fix = locator.locate(&[
//!     Observation::new(38.97623917161576, -92.25761003060849, 0.03796226239),
//!     Observation::new(38.97628921549201, -92.25743300461887, 0.02611682798),
//!     Observation::new(38.97614586018865, -92.25744574549879, 0.02172699708),
//! ])?;
//! println!("{} {}", fix.latitude_deg, fix.longitude_deg);
//! # Ok::<(), sound_locator::LocatorError>(())
//! ```

pub mod algorithms;
pub mod api;
pub mod core;
pub mod utils;
pub mod validation;

pub use crate::core::{
    Coordinate2D, Degradation, EmissionTime, GeodeticCoordinate, Observation, PlaneReceiver,
    ProjectionFrame, SolveMethod, SourceEstimate, SPEED_OF_SOUND_AIR,
};
pub use algorithms::{
    locate_known_emission, seed, solve, solve_linear, to_geodetic, to_plane, GeoProjection,
    RootFinder, TdoaSystem,
};
pub use api::{LocateRequest, LocateResponse, Locator, OutputFormat};
pub use utils::{ConfigError, LocatorConfig};
pub use validation::{InputError, LocatorError, LocatorResult, ResultValidator};
