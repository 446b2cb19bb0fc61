//! Great-circle distance and proximity scoring.

use crate::models::Location;

/// Mean Earth radius used by the haversine formula.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance between two points in kilometres.
pub fn haversine_km(a: &Location, b: &Location) -> f64 {
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + (d_lon / 2.0).sin().powi(2) * lat1.cos() * lat2.cos();
    // Rounding can push h fractionally above 1 for antipodal points.
    let h = h.clamp(0.0, 1.0);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_KM * c
}

/// Normalized proximity in `[0, 1]`: 1 at zero distance, falling linearly to
/// 0 at `max_distance_km` and staying 0 beyond it.
pub fn geo_score(a: &Location, b: &Location, max_distance_km: f64) -> f64 {
    if max_distance_km <= 0.0 {
        return 0.0;
    }
    let distance = haversine_km(a, b);
    if distance > max_distance_km {
        return 0.0;
    }
    (1.0 - distance / max_distance_km).clamp(0.0, 1.0)
}
