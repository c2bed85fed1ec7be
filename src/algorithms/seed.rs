//! Initial guess for the iterative solve
//!
//! The receiver that heard the event first is taken to be the closest one,
//! so the seed is that receiver's position, emitting at the moment it heard
//! the sound. This is a heuristic: it keeps Newton in the right basin for
//! compact arrays but does not guarantee global convergence.

use nalgebra::DVector;

use crate::core::{Coordinate2D, EmissionTime, PlaneReceiver};
use crate::validation::error::{InputError, LocatorResult};

/// Starting point for the solver, and the fallback when it fails
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeedState {
    pub position: Coordinate2D,
    /// `None` when the emission time is not an unknown
    pub emission_time: Option<f64>,
    /// Index of the receiver the seed was taken from
    pub receiver_index: usize,
}

impl SeedState {
    /// State vector laid out the way `TdoaSystem` expects
    pub fn to_vector(&self) -> DVector<f64> {
        match self.emission_time {
            Some(t) => DVector::from_vec(vec![self.position.x, self.position.y, t]),
            None => DVector::from_vec(vec![self.position.x, self.position.y]),
        }
    }
}

/// Seed at the earliest-arriving receiver.
///
/// Ties on the minimum arrival time go to the lowest index.
pub fn seed(receivers: &[PlaneReceiver], emission: EmissionTime) -> LocatorResult<SeedState> {
    let mut earliest: Option<(usize, &PlaneReceiver)> = None;
    for (index, receiver) in receivers.iter().enumerate() {
        let is_earlier = earliest.map_or(true, |(_, best)| receiver.arrival_time < best.arrival_time);
        if is_earlier {
            earliest = Some((index, receiver));
        }
    }

    let (receiver_index, nearest) = earliest
        .ok_or_else(|| InputError::Malformed("cannot seed without receivers".into()))?;

    Ok(SeedState {
        position: nearest.position,
        emission_time: match emission {
            EmissionTime::Solve => Some(nearest.arrival_time),
            EmissionTime::Known(_) => None,
        },
        receiver_index,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_at_earliest_receiver() {
        let receivers = [
            PlaneReceiver::new(-12.0, 4.0, 0.0380),
            PlaneReceiver::new(3.0, 9.5, 0.0261),
            PlaneReceiver::new(2.0, -6.4, 0.0217),
        ];
        let state = seed(&receivers, EmissionTime::Solve).unwrap();

        assert_eq!(state.receiver_index, 2);
        assert_eq!(state.position, Coordinate2D::new(2.0, -6.4));
        assert_eq!(state.emission_time, Some(0.0217));
        assert_eq!(state.to_vector().len(), 3);
    }

    #[test]
    fn test_tie_goes_to_lowest_index() {
        let receivers = [
            PlaneReceiver::new(0.0, 0.0, 2.828),
            PlaneReceiver::new(1.0, 0.0, 2.236),
            PlaneReceiver::new(0.0, 1.0, 2.236),
        ];
        let state = seed(&receivers, EmissionTime::Solve).unwrap();
        assert_eq!(state.receiver_index, 1);
    }

    #[test]
    fn test_known_emission_seeds_position_only() {
        let receivers = [
            PlaneReceiver::new(0.0, 0.0, 0.3),
            PlaneReceiver::new(1.0, 0.0, 0.1),
            PlaneReceiver::new(0.0, 1.0, 0.2),
        ];
        let state = seed(&receivers, EmissionTime::Known(0.0)).unwrap();
        assert_eq!(state.emission_time, None);
        assert_eq!(state.to_vector().len(), 2);
    }

    #[test]
    fn test_empty_input_rejected() {
        assert!(seed(&[], EmissionTime::Solve).is_err());
    }
}
