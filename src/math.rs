use nalgebra as na;
use num_traits::Float;

/// Meters per degree of latitude, flat-earth approximation
pub const METERS_PER_DEGREE: f64 = 111_320.0;

/// Full angular field of view, radians
#[inline]
pub fn field_of_view<T: Float>(sensor_dim: T, focal_length: T) -> T {
    let two = T::one() + T::one();

    two * (sensor_dim / (two * focal_length)).atan()
}

/// Ground extent covered by `fov` from `altitude`
#[inline]
pub fn ground_coverage<T: Float>(altitude: T, fov: T) -> T {
    let two = T::one() + T::one();

    two * altitude * (fov / two).tan()
}

/// Moves (lat, lon) by `distance` meters along compass `bearing` (0 = north, 90 = east)
pub fn offset_by_bearing(lat: f64, lon: f64, distance: f64, bearing: f64) -> (f64, f64) {
    let bearing = bearing.to_radians();

    let east = distance * bearing.sin();
    let north = distance * bearing.cos();

    let d_lat = north / METERS_PER_DEGREE;
    let d_lon = east / (METERS_PER_DEGREE * lat.to_radians().cos());

    (lat + d_lat, lon + d_lon)
}

/// Distance from `p` to the infinite line through `a` and `b`.
/// Returns `None` when the line is degenerate.
pub fn perpendicular_distance(
    p: &na::Point2<f64>,
    a: &na::Point2<f64>,
    b: &na::Point2<f64>,
) -> Option<f64> {
    let dir = na::Unit::try_new(b - a, 0.0)?.into_inner();

    let v = p - a;
    let closest = dir * v.dot(&dir);

    Some((v - closest).norm())
}
