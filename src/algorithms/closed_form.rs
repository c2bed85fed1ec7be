//! Linear solve for a known emission time
//!
//! With receiver A at the origin and propagation ranges `ri = C · (ti - t0)`,
//! subtracting A's circle equation from receiver i's cancels `x² + y²`:
//!
//! ```text
//! -2·xi·x - 2·yi·y = ri² - r0² - xi² - yi²
//! ```
//!
//! Two such rows give an exact 2×2 system; more rows are solved in the
//! least-squares sense.

use nalgebra::{DMatrix, DVector};

use crate::core::{Coordinate2D, PlaneReceiver};
use crate::validation::error::{InputError, LocatorError, LocatorResult};

/// |sin| of the angle between receiver baselines below which the system is singular
const SINGULAR_EPSILON: f64 = 1e-9;

/// Solve the 2×2 system for receivers B and C relative to A at the origin.
///
/// `range_origin`, `range_b` and `range_c` are propagation distances in
/// meters from the source to A, B and C.
pub fn solve_linear(
    pos_b: &Coordinate2D,
    pos_c: &Coordinate2D,
    range_origin: f64,
    range_b: f64,
    range_c: f64,
) -> LocatorResult<Coordinate2D> {
    let (a11, a12) = (-2.0 * pos_b.x, -2.0 * pos_b.y);
    let (a21, a22) = (-2.0 * pos_c.x, -2.0 * pos_c.y);
    let b1 = range_b * range_b - range_origin * range_origin - pos_b.x * pos_b.x - pos_b.y * pos_b.y;
    let b2 = range_c * range_c - range_origin * range_origin - pos_c.x * pos_c.x - pos_c.y * pos_c.y;

    let det = a11 * a22 - a12 * a21;
    let scale = 4.0 * pos_b.norm() * pos_c.norm();
    if scale == 0.0 || det.abs() <= SINGULAR_EPSILON * scale {
        let conditioning = if scale > 0.0 { det.abs() / scale } else { 0.0 };
        return Err(LocatorError::geometry(
            "receivers are collinear with the origin receiver",
            conditioning,
        ));
    }

    // Cramer's rule
    Ok(Coordinate2D {
        x: (b1 * a22 - a12 * b2) / det,
        y: (a11 * b2 - b1 * a21) / det,
    })
}

/// Locate a source whose emission time is known.
///
/// The first receiver becomes the local origin. Three receivers use
/// [`solve_linear`]; more are stacked into a least-squares system.
pub fn locate_known_emission(
    receivers: &[PlaneReceiver],
    emission_time: f64,
    speed_of_sound: f64,
) -> LocatorResult<Coordinate2D> {
    if receivers.len() < 3 {
        return Err(InputError::InsufficientReceivers {
            available: receivers.len(),
            required: 3,
        }
        .into());
    }

    let mut ranges = Vec::with_capacity(receivers.len());
    for (index, receiver) in receivers.iter().enumerate() {
        let range = speed_of_sound * (receiver.arrival_time - emission_time);
        if range < 0.0 {
            return Err(InputError::NegativeRange { index }.into());
        }
        ranges.push(range);
    }

    let origin = receivers[0].position;
    let relative: Vec<Coordinate2D> = receivers
        .iter()
        .map(|r| Coordinate2D::new(r.position.x - origin.x, r.position.y - origin.y))
        .collect();

    let local = if receivers.len() == 3 {
        solve_linear(&relative[1], &relative[2], ranges[0], ranges[1], ranges[2])?
    } else {
        solve_stacked(&relative, &ranges)?
    };

    Ok(Coordinate2D::new(local.x + origin.x, local.y + origin.y))
}

fn solve_stacked(relative: &[Coordinate2D], ranges: &[f64]) -> LocatorResult<Coordinate2D> {
    let rows = relative.len() - 1;
    let mut a = DMatrix::<f64>::zeros(rows, 2);
    let mut b = DVector::<f64>::zeros(rows);

    for (row, (p, r)) in relative.iter().zip(ranges).skip(1).enumerate() {
        a[(row, 0)] = -2.0 * p.x;
        a[(row, 1)] = -2.0 * p.y;
        b[row] = r * r - ranges[0] * ranges[0] - p.x * p.x - p.y * p.y;
    }

    let svd = a.svd(true, true);
    let largest = svd.singular_values.max();
    let smallest = svd.singular_values.min();
    let conditioning = if largest > 0.0 { smallest / largest } else { 0.0 };
    if conditioning <= SINGULAR_EPSILON {
        return Err(LocatorError::geometry("receivers are collinear", conditioning));
    }

    let solution = svd
        .solve(&b, 0.0)
        .map_err(|e| LocatorError::geometry(e, conditioning))?;
    Ok(Coordinate2D::new(solution[0], solution[1]))
}
