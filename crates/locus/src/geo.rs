//! Great-circle distance on a spherical Earth.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Earth's mean radius in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// A WGS84 latitude/longitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Finite and inside [-90, 90] x [-180, 180].
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }

    fn to_radians(self) -> (f64, f64) {
        (self.latitude.to_radians(), self.longitude.to_radians())
    }
}

/// Haversine distance between two coordinates in kilometers.
#[inline]
pub fn haversine_distance(from: &Coordinate, to: &Coordinate) -> f64 {
    let (lat1, lon1) = from.to_radians();
    let (lat2, lon2) = to.to_radians();

    let d_lat = lat2 - lat1;
    let d_lon = lon2 - lon1;

    let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_point_is_zero() {
        let p = Coordinate::new(52.52, 13.405);
        assert!(haversine_distance(&p, &p).abs() < 1e-9);
    }

    #[test]
    fn test_berlin_to_paris() {
        let berlin = Coordinate::new(52.5200, 13.4050);
        let paris = Coordinate::new(48.8566, 2.3522);
        let d = haversine_distance(&berlin, &paris);
        assert!((d - 878.0).abs() < 10.0, "got {d}");
    }

    #[test]
    fn test_symmetric() {
        let a = Coordinate::new(53.5511, 9.9937);
        let b = Coordinate::new(48.1374, 11.5755);
        assert!((haversine_distance(&a, &b) - haversine_distance(&b, &a)).abs() < 1e-9);
    }

    #[test]
    fn test_validity() {
        assert!(Coordinate::new(0.0, 0.0).is_valid());
        assert!(Coordinate::new(-90.0, 180.0).is_valid());
        assert!(!Coordinate::new(90.1, 0.0).is_valid());
        assert!(!Coordinate::new(0.0, -180.5).is_valid());
        assert!(!Coordinate::new(f64::NAN, 0.0).is_valid());
    }
}
