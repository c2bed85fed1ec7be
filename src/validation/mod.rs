//! Input checks, result checks and error types

pub mod data;
pub mod error;
pub mod fallback;

pub use data::{DataValidator, ValidationConfig};
pub use error::{InputError, LocatorError, LocatorResult};
pub use fallback::ResultValidator;
