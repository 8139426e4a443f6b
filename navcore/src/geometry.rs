/// Great-circle geometry over (longitude, latitude) sequences

use serde::{Deserialize, Serialize};

use crate::error::{NavError, NavResult};

pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// A WGS84 position in decimal degrees.
///
/// Serialized as a `[longitude, latitude]` pair, the order used by GeoJSON and
/// by the directions API payloads.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Coordinate {
    pub longitude: f64,
    pub latitude: f64,
}

impl Coordinate {
    pub fn new(longitude: f64, latitude: f64) -> Self {
        Self { longitude, latitude }
    }

    pub fn is_valid(&self) -> bool {
        self.longitude.is_finite()
            && self.latitude.is_finite()
            && (-180.0..=180.0).contains(&self.longitude)
            && (-90.0..=90.0).contains(&self.latitude)
    }
}

impl From<[f64; 2]> for Coordinate {
    fn from(pair: [f64; 2]) -> Self {
        Self::new(pair[0], pair[1])
    }
}

impl From<Coordinate> for [f64; 2] {
    fn from(coordinate: Coordinate) -> Self {
        [coordinate.longitude, coordinate.latitude]
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.6}, {:.6})", self.longitude, self.latitude)
    }
}

/// Result of projecting a point onto a polyline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NearestPoint {
    pub point: Coordinate,
    pub distance_from_line_meters: f64,
    pub distance_along_line_meters: f64,
    /// Index of the segment (`line[i]..line[i + 1]`) holding the projection
    pub segment_index: usize,
}

/// Haversine distance in meters.
pub fn distance_meters(a: Coordinate, b: Coordinate) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let delta_lat = (b.latitude - a.latitude).to_radians();
    let delta_lon = (b.longitude - a.longitude).to_radians();

    let h = (delta_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_METERS * c
}

/// Initial bearing from `from` to `to`, degrees in [0, 360) (0 = North, 90 = East).
pub fn bearing_degrees(from: Coordinate, to: Coordinate) -> f64 {
    let lat1 = from.latitude.to_radians();
    let lat2 = to.latitude.to_radians();
    let dlon = (to.longitude - from.longitude).to_radians();

    let y = dlon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();
    normalize0_360(y.atan2(x).to_degrees())
}

pub fn normalize0_360(angle: f64) -> f64 {
    let normalized = (angle % 360.0 + 360.0) % 360.0;
    // -1e-15 % 360 + 360 rounds to exactly 360
    if normalized >= 360.0 { 0.0 } else { normalized }
}

// smallest signed difference a - b in degrees, in [-180, 180]
pub fn angle_diff(a: f64, b: f64) -> f64 {
    let xx = ((a - b) % 360.0 + 360.0) % 360.0;
    if xx > 180.0 { xx - 360.0 } else { xx }
}

fn ensure_line(line: &[Coordinate]) -> NavResult<()> {
    if line.len() < 2 {
        return Err(NavError::InvalidGeometry { points: line.len() });
    }
    Ok(())
}

/// Sum of consecutive haversine distances.
pub fn line_length_meters(line: &[Coordinate]) -> NavResult<f64> {
    ensure_line(line)?;
    Ok(line.windows(2).map(|w| distance_meters(w[0], w[1])).sum())
}

/// Project `point` onto the segment `a..b`.
///
/// The foot of the perpendicular is found in an equirectangular plane centered
/// on `point`, which is accurate at the scale of route segments. Returns the
/// foot and the clamped segment parameter.
fn project_onto_segment(a: Coordinate, b: Coordinate, point: Coordinate) -> (Coordinate, f64) {
    let cos_lat = point.latitude.to_radians().cos();

    let ax = (a.longitude - point.longitude) * cos_lat;
    let ay = a.latitude - point.latitude;
    let dx = (b.longitude - a.longitude) * cos_lat;
    let dy = b.latitude - a.latitude;

    let length_sq = dx * dx + dy * dy;
    if length_sq == 0.0 {
        return (a, 0.0);
    }

    let t = (-(ax * dx + ay * dy) / length_sq).clamp(0.0, 1.0);
    let foot = Coordinate::new(
        a.longitude + t * (b.longitude - a.longitude),
        a.latitude + t * (b.latitude - a.latitude),
    );
    (foot, t)
}

/// Closest point on `line` to `point`.
///
/// Ties between segments go to the earliest one. A line whose points all
/// coincide projects onto its first point with zero distance along it.
pub fn nearest_point_on_line(line: &[Coordinate], point: Coordinate) -> NavResult<NearestPoint> {
    ensure_line(line)?;

    let mut best: Option<NearestPoint> = None;
    let mut cumulative = 0.0;

    for (segment_index, w) in line.windows(2).enumerate() {
        let (foot, _) = project_onto_segment(w[0], w[1], point);
        let distance_from_line = distance_meters(point, foot);

        let closer = match best {
            Some(ref b) => distance_from_line < b.distance_from_line_meters,
            None => true,
        };
        if closer {
            best = Some(NearestPoint {
                point: foot,
                distance_from_line_meters: distance_from_line,
                distance_along_line_meters: cumulative + distance_meters(w[0], foot),
                segment_index,
            });
        }

        cumulative += distance_meters(w[0], w[1]);
    }

    // ensure_line guarantees at least one segment
    best.ok_or(NavError::InvalidGeometry { points: line.len() })
}

/// Point at `distance` meters from the start of `line`, clamped to its ends.
pub fn point_at_distance_along_line(line: &[Coordinate], distance: f64) -> NavResult<Coordinate> {
    ensure_line(line)?;

    if distance.is_nan() || distance <= 0.0 {
        return Ok(line[0]);
    }

    let mut cumulative = 0.0;
    for w in line.windows(2) {
        let segment = distance_meters(w[0], w[1]);
        if segment > 0.0 && cumulative + segment >= distance {
            let fraction = (distance - cumulative) / segment;
            return Ok(Coordinate::new(
                w[0].longitude + fraction * (w[1].longitude - w[0].longitude),
                w[0].latitude + fraction * (w[1].latitude - w[0].latitude),
            ));
        }
        cumulative += segment;
    }

    Ok(line[line.len() - 1])
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn c(lon: f64, lat: f64) -> Coordinate {
        Coordinate::new(lon, lat)
    }

    #[test]
    fn test_distance_known_value() {
        // 0.001 degree of latitude is ~111.19 m
        let d = distance_meters(c(0.0, 0.0), c(0.0, 0.001));
        assert_abs_diff_eq!(d, 111.19, epsilon = 0.01);
    }

    #[test]
    fn test_distance_symmetric_and_zero() {
        let a = c(153.0133, -27.4975);
        let b = c(153.0141, -27.4968);
        assert_abs_diff_eq!(distance_meters(a, b), distance_meters(b, a), epsilon = 1e-9);
        assert_eq!(distance_meters(a, a), 0.0);
        assert!(distance_meters(a, b) > 0.0);
    }

    #[test]
    fn test_distance_triangle_inequality() {
        let a = c(153.0133, -27.4975);
        let b = c(153.0141, -27.4968);
        let m = c(153.0150, -27.4990);
        assert!(distance_meters(a, b) <= distance_meters(a, m) + distance_meters(m, b) + 1e-9);
    }

    #[test]
    fn test_bearing_cardinal_directions() {
        assert_abs_diff_eq!(bearing_degrees(c(0.0, 0.0), c(0.0, 1.0)), 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(bearing_degrees(c(0.0, 0.0), c(1.0, 0.0)), 90.0, epsilon = 1e-9);
        assert_abs_diff_eq!(bearing_degrees(c(0.0, 1.0), c(0.0, 0.0)), 180.0, epsilon = 1e-9);
        assert_abs_diff_eq!(bearing_degrees(c(1.0, 0.0), c(0.0, 0.0)), 270.0, epsilon = 1e-9);
    }

    #[test]
    fn test_bearing_range() {
        let b = bearing_degrees(c(10.0, 10.0), c(9.9, 10.0001));
        assert!((0.0..360.0).contains(&b));
    }

    #[test]
    fn test_angle_diff() {
        assert_abs_diff_eq!(angle_diff(10.0, 20.0), -10.0);
        assert_abs_diff_eq!(angle_diff(10.0, 350.0), 20.0);
        assert_abs_diff_eq!(angle_diff(350.0, 10.0), -20.0);
        assert_abs_diff_eq!(angle_diff(90.0, 270.0), 180.0);
    }

    #[test]
    fn test_normalize0_360() {
        assert_abs_diff_eq!(normalize0_360(370.0), 10.0, epsilon = 1e-9);
        assert_abs_diff_eq!(normalize0_360(-10.0), 350.0, epsilon = 1e-9);
        assert_abs_diff_eq!(normalize0_360(720.0), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_line_length() {
        let line = [c(0.0, 0.0), c(0.0, 0.001), c(0.0, 0.002)];
        assert_abs_diff_eq!(line_length_meters(&line).unwrap(), 222.39, epsilon = 0.01);
    }

    #[test]
    fn test_short_lines_are_invalid() {
        assert_eq!(line_length_meters(&[]), Err(NavError::InvalidGeometry { points: 0 }));
        let single = [c(0.0, 0.0)];
        assert_eq!(line_length_meters(&single), Err(NavError::InvalidGeometry { points: 1 }));
        assert!(nearest_point_on_line(&single, c(0.0, 0.0)).is_err());
        assert!(point_at_distance_along_line(&single, 1.0).is_err());
    }

    #[test]
    fn test_projection_of_segment_midpoint() {
        let line = [c(0.0, 0.0), c(0.0, 0.001), c(0.001, 0.001)];
        let first = distance_meters(line[0], line[1]);

        let on_first = nearest_point_on_line(&line, c(0.0, 0.0005)).unwrap();
        assert_abs_diff_eq!(on_first.distance_from_line_meters, 0.0, epsilon = 1e-3);
        assert_abs_diff_eq!(on_first.distance_along_line_meters, first / 2.0, epsilon = 1e-3);
        assert_eq!(on_first.segment_index, 0);

        let mid = c(0.0005, 0.001);
        let on_second = nearest_point_on_line(&line, mid).unwrap();
        assert_abs_diff_eq!(on_second.distance_from_line_meters, 0.0, epsilon = 1e-3);
        assert_abs_diff_eq!(
            on_second.distance_along_line_meters,
            first + distance_meters(line[1], mid),
            epsilon = 1e-3
        );
        assert_eq!(on_second.segment_index, 1);
    }

    #[test]
    fn test_projection_perpendicular_offset() {
        // 0.0005 degrees east of a north-going line at the equator, ~55.6 m
        let line = [c(0.0, 0.0), c(0.0, 0.001)];
        let nearest = nearest_point_on_line(&line, c(0.0005, 0.0004)).unwrap();
        assert_abs_diff_eq!(nearest.distance_from_line_meters, 55.6, epsilon = 0.1);
        assert_abs_diff_eq!(nearest.point.longitude, 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(nearest.point.latitude, 0.0004, epsilon = 1e-9);
        assert_abs_diff_eq!(nearest.distance_along_line_meters, 44.48, epsilon = 0.01);
    }

    #[test]
    fn test_projection_clamps_to_endpoints() {
        let line = [c(0.0, 0.0), c(0.0, 0.001)];

        let before = nearest_point_on_line(&line, c(0.0, -0.0005)).unwrap();
        assert_eq!(before.point, line[0]);
        assert_eq!(before.distance_along_line_meters, 0.0);

        let after = nearest_point_on_line(&line, c(0.0, 0.0015)).unwrap();
        assert_eq!(after.point, line[1]);
        assert_abs_diff_eq!(after.distance_along_line_meters, 111.19, epsilon = 0.01);
        assert_abs_diff_eq!(after.distance_from_line_meters, 55.6, epsilon = 0.1);
    }

    #[test]
    fn test_projection_tie_goes_to_earliest_segment() {
        // Out-and-back line: the start and the end are the same closest point
        let line = [c(0.0, 0.0), c(0.0, 0.001), c(0.0, 0.0)];
        let nearest = nearest_point_on_line(&line, c(0.0002, 0.0)).unwrap();
        assert_eq!(nearest.segment_index, 0);
        assert_eq!(nearest.distance_along_line_meters, 0.0);
    }

    #[test]
    fn test_zero_length_line() {
        let p = c(10.0, 10.0);
        let line = [p, p];
        assert_eq!(line_length_meters(&line).unwrap(), 0.0);

        let nearest = nearest_point_on_line(&line, p).unwrap();
        assert_eq!(nearest.point, p);
        assert_eq!(nearest.distance_along_line_meters, 0.0);
        assert_eq!(nearest.distance_from_line_meters, 0.0);

        assert_eq!(point_at_distance_along_line(&line, 25.0).unwrap(), p);
    }

    #[test]
    fn test_point_at_distance_interpolates() {
        let line = [c(0.0, 0.0), c(0.0, 0.001), c(0.001, 0.001)];
        let first = distance_meters(line[0], line[1]);

        let p = point_at_distance_along_line(&line, first / 2.0).unwrap();
        assert_abs_diff_eq!(p.longitude, 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(p.latitude, 0.0005, epsilon = 1e-9);

        let q = point_at_distance_along_line(&line, first + 10.0).unwrap();
        assert_abs_diff_eq!(q.latitude, 0.001, epsilon = 1e-12);
        assert!(q.longitude > 0.0 && q.longitude < 0.001);
    }

    #[test]
    fn test_point_at_distance_clamps() {
        let line = [c(0.0, 0.0), c(0.0, 0.001)];
        assert_eq!(point_at_distance_along_line(&line, -5.0).unwrap(), line[0]);
        assert_eq!(point_at_distance_along_line(&line, f64::NAN).unwrap(), line[0]);
        assert_eq!(point_at_distance_along_line(&line, 1_000.0).unwrap(), line[1]);
    }

    #[test]
    fn test_coordinate_serializes_as_pair() {
        let json = serde_json::to_string(&c(153.5, -27.25)).unwrap();
        assert_eq!(json, "[153.5,-27.25]");
        let back: Coordinate = serde_json::from_str("[1.5, 2.5]").unwrap();
        assert_eq!(back, c(1.5, 2.5));
    }

    #[test]
    fn test_coordinate_validity() {
        assert!(c(153.0, -27.0).is_valid());
        assert!(!c(181.0, 0.0).is_valid());
        assert!(!c(0.0, f64::NAN).is_valid());
    }
}
