//! Great-circle distance math for event discovery.

use serde::{Deserialize, Serialize};

pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// How far away staff can be from a venue and still see its events.
pub const DISCOVERY_RADIUS_KM: f64 = 10.0;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

/// The haversine distance between two points, in kilometers.
pub fn haversine_km(from: Coordinates, to: Coordinates) -> f64 {
    let from_lat = from.lat.to_radians();
    let to_lat = to.lat.to_radians();
    let delta_lat = (to.lat - from.lat).to_radians();
    let delta_lng = (to.lng - from.lng).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + from_lat.cos() * to_lat.cos() * (delta_lng / 2.0).sin().powi(2);

    2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
}

/// Whether a venue is close enough to a staff member to be discoverable.
///
/// The boundary is inclusive at exactly [`DISCOVERY_RADIUS_KM`]. Missing
/// coordinates on either side never match.
pub fn within_discovery_radius(staff: Option<Coordinates>, venue: Option<Coordinates>) -> bool {
    match (staff, venue) {
        (Some(staff), Some(venue)) => haversine_km(staff, venue) <= DISCOVERY_RADIUS_KM,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coords(lat: f64, lng: f64) -> Coordinates {
        Coordinates { lat, lng }
    }

    #[test]
    fn nearby_venue_is_under_a_kilometer_away() {
        let distance = haversine_km(coords(19.070, 72.870), coords(19.075, 72.875));
        assert!(
            (distance - 0.77).abs() < 0.05,
            "expected ~0.77 km, got {distance}"
        );
    }

    #[test]
    fn distant_venue_is_out_of_range() {
        let distance = haversine_km(coords(19.070, 72.870), coords(19.30, 73.20));
        assert!(
            (distance - 27.0).abs() < 2.0,
            "expected ~27 km, got {distance}"
        );
        assert!(!within_discovery_radius(
            Some(coords(19.070, 72.870)),
            Some(coords(19.30, 73.20))
        ));
    }

    #[test]
    fn zero_distance_for_identical_points() {
        assert_eq!(haversine_km(coords(45.0, 9.0), coords(45.0, 9.0)), 0.0);
    }

    #[test]
    fn radius_boundary_is_inclusive() {
        let staff = coords(0.0, 0.0);
        let degrees_per_km = 1.0 / (EARTH_RADIUS_KM * std::f64::consts::PI / 180.0);

        // a hair inside and a hair outside the 10 km line
        let just_inside = coords(0.0, 9.9999 * degrees_per_km);
        let just_outside = coords(0.0, 10.0001 * degrees_per_km);

        assert!(within_discovery_radius(Some(staff), Some(just_inside)));
        assert!(!within_discovery_radius(Some(staff), Some(just_outside)));
    }

    #[test]
    fn missing_coordinates_never_match() {
        let here = Some(coords(19.070, 72.870));
        assert!(!within_discovery_radius(None, here));
        assert!(!within_discovery_radius(here, None));
        assert!(!within_discovery_radius(None, None));
    }
}
