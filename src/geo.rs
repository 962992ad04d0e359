//! Geometry helpers: point-in-polygon and great-circle distance.

use crate::error::{Error, Result};

/// Earth radius in meters.
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance between two `(lat, lng)` points in meters.
pub fn haversine_meters(from: (f64, f64), to: (f64, f64)) -> f64 {
    let (lat1, lng1) = from;
    let (lat2, lng2) = to;

    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lng = (lng2 - lng1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();

    EARTH_RADIUS_M * c
}

/// Even-odd ray casting over the polygon edges.
///
/// Works for open and closed rings alike; a repeated closing vertex only adds
/// a zero-length edge. Points exactly on an edge may land on either side.
pub fn point_in_polygon(point: (f64, f64), ring: &[(f64, f64)]) -> bool {
    let (x, y) = point;
    let mut inside = false;
    if ring.is_empty() {
        return inside;
    }

    let mut j = ring.len() - 1;
    for i in 0..ring.len() {
        let (xi, yi) = ring[i];
        let (xj, yj) = ring[j];
        if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }

    inside
}

/// A geofence ring must be closed and carry at least four vertices.
pub fn validate_ring(ring: &[(f64, f64)]) -> Result<()> {
    if ring.len() < 4 {
        return Err(Error::InvalidInput(format!(
            "geofence needs at least 4 vertices, got {}",
            ring.len()
        )));
    }
    if ring.first() != ring.last() {
        return Err(Error::InvalidInput(
            "geofence ring is not closed (first vertex must equal last)".to_string(),
        ));
    }
    Ok(())
}
