//! Equirectangular tangent-plane projection
//!
//! Geodetic coordinates are mapped to meters with
//! `x = R · lon · cos(lat_ref)` and `y = R · lat`, then shifted by the frame
//! origin. The inverse undoes the same operations with the same frame, so
//! the two directions are exact inverses of each other.
//!
//! The sphere model is only accurate over spans of tens of kilometres.

use crate::core::{
    Coordinate2D, GeodeticCoordinate, Observation, PlaneReceiver, ProjectionFrame,
    EARTH_RADIUS_M,
};
use crate::validation::data::check_coordinate;
use crate::validation::error::{InputError, LocatorResult};

/// |cos(lat_ref)| below this is treated as a pole
const POLE_COSINE_EPSILON: f64 = 1e-12;

/// Projection between geodetic and local plane coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoProjection {
    earth_radius_m: f64,
}

impl Default for GeoProjection {
    fn default() -> Self {
        Self {
            earth_radius_m: EARTH_RADIUS_M,
        }
    }
}

impl GeoProjection {
    pub fn new(earth_radius_m: f64) -> Self {
        Self { earth_radius_m }
    }

    pub fn earth_radius_m(&self) -> f64 {
        self.earth_radius_m
    }

    /// Meters per radian of longitude in this frame
    fn longitude_scale(&self, frame: &ProjectionFrame) -> Result<f64, InputError> {
        let cos_ref = frame.reference_latitude_deg.to_radians().cos();
        if !cos_ref.is_finite() || cos_ref.abs() < POLE_COSINE_EPSILON {
            return Err(InputError::PolarReference {
                latitude_deg: frame.reference_latitude_deg,
            });
        }
        Ok(self.earth_radius_m * cos_ref)
    }

    /// Project a geodetic coordinate into the frame's plane
    pub fn to_plane(
        &self,
        coord: &GeodeticCoordinate,
        frame: &ProjectionFrame,
    ) -> LocatorResult<Coordinate2D> {
        check_coordinate(coord)?;
        let scale = self.longitude_scale(frame)?;

        Ok(Coordinate2D {
            x: scale * coord.longitude_deg.to_radians() - frame.origin.x,
            y: self.earth_radius_m * coord.latitude_deg.to_radians() - frame.origin.y,
        })
    }

    /// Inverse of [`GeoProjection::to_plane`] for the same frame.
    ///
    /// No range check is applied to the result; callers judge plausibility.
    pub fn to_geodetic(
        &self,
        point: &Coordinate2D,
        frame: &ProjectionFrame,
    ) -> LocatorResult<GeodeticCoordinate> {
        let scale = self.longitude_scale(frame)?;

        Ok(GeodeticCoordinate {
            latitude_deg: ((point.y + frame.origin.y) / self.earth_radius_m).to_degrees(),
            longitude_deg: ((point.x + frame.origin.x) / scale).to_degrees(),
        })
    }

    /// Frame about the mean latitude with the receivers' centroid as origin
    pub fn centered_frame(&self, coords: &[GeodeticCoordinate]) -> LocatorResult<ProjectionFrame> {
        if coords.is_empty() {
            return Err(InputError::Malformed("no coordinates to build a frame from".into()).into());
        }

        let n = coords.len() as f64;
        let mean_latitude = coords.iter().map(|c| c.latitude_deg).sum::<f64>() / n;
        let raw = ProjectionFrame::new(mean_latitude);

        let mut sum = Coordinate2D::default();
        for coord in coords {
            let p = self.to_plane(coord, &raw)?;
            sum.x += p.x;
            sum.y += p.y;
        }

        Ok(raw.with_origin(Coordinate2D::new(sum.x / n, sum.y / n)))
    }

    /// Project every observation, keeping order and arrival times
    pub fn project_all(
        &self,
        observations: &[Observation],
        frame: &ProjectionFrame,
    ) -> LocatorResult<Vec<PlaneReceiver>> {
        observations
            .iter()
            .map(|obs| {
                Ok(PlaneReceiver {
                    position: self.to_plane(&obs.position, frame)?,
                    arrival_time: obs.arrival_time,
                })
            })
            .collect()
    }
}

/// Project with the default Earth radius
pub fn to_plane(coord: &GeodeticCoordinate, frame: &ProjectionFrame) -> LocatorResult<Coordinate2D> {
    GeoProjection::default().to_plane(coord, frame)
}

/// Invert with the default Earth radius
pub fn to_geodetic(point: &Coordinate2D, frame: &ProjectionFrame) -> LocatorResult<GeodeticCoordinate> {
    GeoProjection::default().to_geodetic(point, frame)
}
