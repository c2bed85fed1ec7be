//! Public locator API
//!
//! [`Locator`] is the blocking entry point; `types` holds the request and
//! response shapes and `formatting` renders responses as text, JSON or CSV.

pub mod blocking;
pub mod formatting;
pub mod types;

pub use blocking::Locator;
pub use formatting::{render, CsvFormatter, JsonFormatter, OutputFormat, TextFormatter};
pub use types::{Diagnostics, LocateRequest, LocateResponse};
