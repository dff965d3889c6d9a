//! Flat-earth helpers for placing GPS fixes in a local frame.
//!
//! The projection used here is a small-angle equirectangular approximation around a reference
//! fix. It is adequate for the few-kilometre extent of a single recording and is *not* a geodesic
//! projection. Distances between adjacent fixes use the haversine formula on a spherical Earth.

/// Mean Earth radius (m)
pub const MEAN_RADIUS: f64 = 6371000.0;

/// East/north offsets in meters of `(lon, lat)` from `(lon0, lat0)`, all in degrees.
///
/// Returns `(east, north)`; the east offset is scaled by the cosine of the reference latitude.
pub fn equirectangular_offset(lon: f64, lat: f64, lon0: f64, lat0: f64) -> (f64, f64) {
    let d_lon = (lon - lon0).to_radians();
    let d_lat = (lat - lat0).to_radians();
    let east = d_lon * MEAN_RADIUS * lat0.to_radians().cos();
    let north = d_lat * MEAN_RADIUS;
    (east, north)
}

/// Great-circle distance in meters between two fixes given in degrees.
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    MEAN_RADIUS * c
}
