//! Haversine distance matrix provider (fallback when OSRM unavailable).
//!
//! Uses great-circle distance in meters. Less accurate than OSRM (ignores
//! roads) but always available and never reports an unreachable pair.

use crate::error::RoutingError;
use crate::geo::haversine_meters;
use crate::traits::{DistanceMatrix, DistanceMatrixProvider};

/// Default per-call location limit, matching the road router.
const DEFAULT_MAX_LOCATIONS: usize = 10;

/// Haversine-based distance matrix provider.
///
/// Distances are multiplied by `detour_factor` to approximate road length.
#[derive(Debug, Clone)]
pub struct HaversineMatrix {
    pub detour_factor: f64,
    pub max_locations: usize,
}

impl Default for HaversineMatrix {
    fn default() -> Self {
        Self {
            detour_factor: 1.0,
            max_locations: DEFAULT_MAX_LOCATIONS,
        }
    }
}

impl HaversineMatrix {
    pub fn new(detour_factor: f64) -> Self {
        Self {
            detour_factor,
            ..Self::default()
        }
    }

    pub fn with_max_locations(mut self, max_locations: usize) -> Self {
        self.max_locations = max_locations;
        self
    }
}

impl DistanceMatrixProvider for HaversineMatrix {
    fn max_locations(&self) -> usize {
        self.max_locations
    }

    fn matrix_for(
        &self,
        locations: &[(f64, f64)],
    ) -> std::result::Result<DistanceMatrix, RoutingError> {
        if locations.len() > self.max_locations {
            return Err(RoutingError::TooManyLocations {
                requested: locations.len(),
                limit: self.max_locations,
            });
        }

        let n = locations.len();
        let mut matrix = vec![vec![Some(0.0); n]; n];

        for (i, from) in locations.iter().enumerate() {
            for (j, to) in locations.iter().enumerate() {
                if i != j {
                    matrix[i][j] = Some(haversine_meters(*from, *to) * self.detour_factor);
                }
            }
        }

        Ok(matrix)
    }
}
