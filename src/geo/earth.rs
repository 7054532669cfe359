//! Spherical earth helpers.

use geo_types::Coord;

/// Mean earth radius in metres.
pub const EARTH_R: f64 = 6_371_000.0;

/// A point above the earth: degrees and metres above sea level.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Location {
    pub lat: f64,
    pub lon: f64,
    pub elev: f64,
}

impl Location {
    pub fn new(lat: f64, lon: f64, elev: f64) -> Self {
        Self { lat, lon, elev }
    }

    pub fn coord(&self) -> Coord<f64> {
        Coord {
            x: self.lon,
            y: self.lat,
        }
    }
}

/// Converts latitude, longitude and elevation to earth-centred xyz metres.
pub fn lle_to_xyz(lat: f64, lon: f64, elev: f64) -> [f64; 3] {
    let rad = EARTH_R + elev;
    let (lat, lon) = (lat.to_radians(), lon.to_radians());
    [
        lon.sin() * lat.cos() * rad,
        lat.sin() * rad,
        lon.cos() * lat.cos() * rad,
    ]
}

/// Straight-line distance in metres between two points.
pub fn distance(a: &Location, b: &Location) -> f64 {
    let p = lle_to_xyz(a.lat, a.lon, a.elev);
    let q = lle_to_xyz(b.lat, b.lon, b.elev);
    ((p[0] - q[0]).powi(2) + (p[1] - q[1]).powi(2) + (p[2] - q[2]).powi(2)).sqrt()
}

/// Moves `east`/`north` metres from a point on the surface.
///
/// Flat-earth approximation, adequate for the ~460 km reach of a sweep.
pub fn offset(origin: Coord<f64>, east_m: f64, north_m: f64) -> Coord<f64> {
    let dlat = (north_m / EARTH_R).to_degrees();
    let dlon = (east_m / (EARTH_R * origin.y.to_radians().cos())).to_degrees();
    Coord {
        x: origin.x + dlon,
        y: origin.y + dlat,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_is_elevation_above_point() {
        let site = Location::new(38.7, -90.7, 0.0);
        let eye = Location::new(38.7, -90.7, 100_000.0);
        assert!((distance(&site, &eye) - 100_000.0).abs() < 1e-6);
    }

    #[test]
    fn test_distance_one_degree() {
        let a = Location::new(0.0, 0.0, 0.0);
        let b = Location::new(1.0, 0.0, 0.0);
        let chord = 2.0 * EARTH_R * (0.5f64.to_radians()).sin();
        assert!((distance(&a, &b) - chord).abs() < 1e-6);
    }

    #[test]
    fn test_offset() {
        let origin = Coord { x: -90.0, y: 0.0 };
        let moved = offset(origin, 0.0, EARTH_R * 1f64.to_radians());
        assert!((moved.y - 1.0).abs() < 1e-9);
        assert!((moved.x + 90.0).abs() < 1e-9);
    }
}
