//! Spherical distance and planar polygon helpers over `[lon, lat]` data.

use serde::{Deserialize, Serialize};

const EARTH_RADIUS_KM: f64 = 6371.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Finite and within ±90 / ±180.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// Great-circle distance in kilometres.
pub fn haversine_km(a: Coordinates, b: Coordinates) -> f64 {
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();
    let s = (d_lat / 2.0).sin().powi(2)
        + a.latitude.to_radians().cos() * b.latitude.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * s.sqrt().asin()
}

/// Ray-casting containment test against a ring of `[lon, lat]` positions.
pub fn point_in_ring(point: Coordinates, ring: &[[f64; 2]]) -> bool {
    let (x, y) = (point.longitude, point.latitude);
    let mut inside = false;
    let mut j = ring.len().wrapping_sub(1);
    for (i, &[xi, yi]) in ring.iter().enumerate() {
        let [xj, yj] = ring[j];
        let dy = if yj - yi == 0.0 { 1e-12 } else { yj - yi };
        if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / dy + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Plain vertex average of the ring (closing vertex included). `None` when empty.
pub fn ring_centroid(ring: &[[f64; 2]]) -> Option<Coordinates> {
    if ring.is_empty() {
        return None;
    }
    let n = ring.len() as f64;
    let (lon, lat) = ring
        .iter()
        .fold((0.0, 0.0), |(lon, lat), [x, y]| (lon + x, lat + y));
    Some(Coordinates::new(lat / n, lon / n))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Vec<[f64; 2]> {
        vec![[0.0, 0.0], [2.0, 0.0], [2.0, 2.0], [0.0, 2.0], [0.0, 0.0]]
    }

    #[test]
    fn one_degree_of_latitude() {
        let d = haversine_km(Coordinates::new(0.0, 0.0), Coordinates::new(1.0, 0.0));
        assert!((d - 111.195).abs() < 0.01, "got {d}");
    }

    #[test]
    fn bengaluru_to_chennai() {
        let blr = Coordinates::new(12.9716, 77.5946);
        let maa = Coordinates::new(13.0827, 80.2707);
        let d = haversine_km(blr, maa);
        assert!((285.0..295.0).contains(&d), "got {d}");
        assert_eq!(haversine_km(blr, blr), 0.0);
    }

    #[test]
    fn containment() {
        let ring = square();
        assert!(point_in_ring(Coordinates::new(1.0, 1.0), &ring));
        assert!(!point_in_ring(Coordinates::new(3.0, 1.0), &ring));
        assert!(!point_in_ring(Coordinates::new(1.0, -0.5), &ring));
        assert!(!point_in_ring(Coordinates::new(1.0, 1.0), &[]));
    }

    #[test]
    fn centroid_averages_every_vertex() {
        let c = ring_centroid(&square()).unwrap();
        assert!((c.longitude - 0.8).abs() < 1e-9);
        assert!((c.latitude - 0.8).abs() < 1e-9);
        assert!(ring_centroid(&[]).is_none());
    }

    #[test]
    fn coordinate_bounds() {
        assert!(Coordinates::new(90.0, -180.0).is_valid());
        assert!(!Coordinates::new(90.1, 0.0).is_valid());
        assert!(!Coordinates::new(f64::NAN, 0.0).is_valid());
    }
}
