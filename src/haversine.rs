//! Haversine distance matrix provider (fallback when OSRM unavailable).
//!
//! Uses great-circle distance and an assumed speed to estimate travel.
//! Less accurate than OSRM (ignores roads) but always available.

use rayon::prelude::*;

use crate::traits::{DistanceMatrixProvider, MatrixError, TravelMatrices};

/// Average driving speed assumption for duration estimation.
const DEFAULT_SPEED_KMH: f64 = 40.0;

/// Earth radius in kilometers.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Haversine-based distance matrix provider.
#[derive(Debug, Clone)]
pub struct HaversineMatrix {
    /// Assumed average driving speed in km/h.
    pub speed_kmh: f64,
}

impl Default for HaversineMatrix {
    fn default() -> Self {
        Self {
            speed_kmh: DEFAULT_SPEED_KMH,
        }
    }
}

impl HaversineMatrix {
    pub fn new(speed_kmh: f64) -> Self {
        Self { speed_kmh }
    }

    /// Calculate haversine distance between two points in kilometers.
    fn haversine_km(from: (f64, f64), to: (f64, f64)) -> f64 {
        let (lat1, lng1) = from;
        let (lat2, lng2) = to;

        let lat1_rad = lat1.to_radians();
        let lat2_rad = lat2.to_radians();
        let delta_lat = (lat2 - lat1).to_radians();
        let delta_lng = (lng2 - lng1).to_radians();

        let a = (delta_lat / 2.0).sin().powi(2)
            + lat1_rad.cos() * lat2_rad.cos() * (delta_lng / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().asin();

        EARTH_RADIUS_KM * c
    }

    /// Convert a distance in meters to travel time in seconds.
    fn meters_to_seconds(&self, meters: f64) -> f64 {
        meters / 1000.0 / self.speed_kmh * 3600.0
    }
}

impl DistanceMatrixProvider for HaversineMatrix {
    fn matrices_for(&self, locations: &[(f64, f64)]) -> Result<TravelMatrices, MatrixError> {
        let distances: Vec<Vec<f64>> = locations
            .par_iter()
            .map(|&from| {
                locations
                    .iter()
                    .map(|&to| Self::haversine_km(from, to) * 1000.0)
                    .collect()
            })
            .collect();
        let durations = distances
            .iter()
            .map(|row| {
                row.iter()
                    .map(|&meters| self.meters_to_seconds(meters))
                    .collect()
            })
            .collect();

        Ok(TravelMatrices {
            distances,
            durations,
        })
    }
}
