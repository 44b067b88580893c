use geo_types::Point;
use std::cmp::Ordering;

use crate::entities::{Coordinates, Place};

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance in kilometres between two (longitude, latitude) points.
pub fn haversine_km(a: Point<f64>, b: Point<f64>) -> f64 {
    let d_lat = (b.y() - a.y()).to_radians();
    let d_lng = (b.x() - a.x()).to_radians();

    let h = ((d_lat / 2.0).sin().powi(2)
        + a.y().to_radians().cos() * b.y().to_radians().cos() * (d_lng / 2.0).sin().powi(2))
    .clamp(0.0, 1.0);

    2.0 * EARTH_RADIUS_KM * h.sqrt().atan2((1.0 - h).sqrt())
}

// NaN distances sort last.
fn compare_distance(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}

/// Returns a copy of `places` ordered nearest first. Ties keep their input order.
pub fn sort_by_distance(places: &[Place], latitude: f64, longitude: f64) -> Vec<Place> {
    let origin: Point<f64> = Coordinates::new(latitude, longitude).into();

    let mut keyed: Vec<(f64, &Place)> = places
        .iter()
        .map(|place| (haversine_km(origin, place.coordinates.into()), place))
        .collect();

    keyed.sort_by(|(a, _), (b, _)| compare_distance(*a, *b));

    keyed.into_iter().map(|(_, place)| place.clone()).collect()
}

#[cfg(test)]
use crate::engine::testing::{ids, place};

#[test]
fn haversine_known_distance() {
    let paris: Point<f64> = Coordinates::new(48.8566, 2.3522).into();
    let london: Point<f64> = Coordinates::new(51.5074, -0.1278).into();

    let d = haversine_km(paris, london);
    assert!((d - 343.5).abs() < 1.0, "got {}", d);
    assert_eq!(haversine_km(paris, paris), 0.0);
}

#[test]
fn sorts_nearest_first_without_touching_input() {
    let places = vec![
        place("far", 10.0, 10.0),
        place("near", 0.1, 0.1),
        place("mid", 1.0, 1.0),
    ];

    let sorted = sort_by_distance(&places, 0.0, 0.0);

    assert_eq!(ids(&sorted), ["near", "mid", "far"]);
    assert_eq!(ids(&places), ["far", "near", "mid"]);
}

#[test]
fn empty_input() {
    assert!(sort_by_distance(&[], 12.0, 34.0).is_empty());
}

#[test]
fn ties_keep_input_order() {
    let places = vec![
        place("b", 1.0, 0.0),
        place("x", 5.0, 0.0),
        place("a", -1.0, 0.0),
        place("c", 0.0, 1.0),
    ];

    let sorted = sort_by_distance(&places, 0.0, 0.0);
    assert_eq!(ids(&sorted), ["b", "a", "c", "x"]);
}

#[test]
fn nan_sorts_last() {
    let places = vec![
        place("nan", f64::NAN, 0.0),
        place("far", 20.0, 20.0),
        place("nan2", 0.0, f64::NAN),
        place("near", 0.5, 0.5),
    ];

    let sorted = sort_by_distance(&places, 0.0, 0.0);
    assert_eq!(ids(&sorted), ["near", "far", "nan", "nan2"]);
}

#[test]
fn permutation_ordered_and_idempotent() {
    let origin = Coordinates::new(37.7749, -122.4194);
    let places: Vec<Place> = (0..40)
        .map(|i| {
            let f = i as f64;
            place(
                &format!("p{}", i),
                ((f * 37.0) % 180.0) - 90.0,
                ((f * 71.0) % 360.0) - 180.0,
            )
        })
        .collect();

    let sorted = sort_by_distance(&places, origin.latitude, origin.longitude);

    let mut before = ids(&places);
    let mut after = ids(&sorted);
    before.sort();
    after.sort();
    assert_eq!(before, after);

    for pair in sorted.windows(2) {
        assert!(
            haversine_km(origin.into(), pair[0].coordinates.into())
                <= haversine_km(origin.into(), pair[1].coordinates.into())
        );
    }

    assert_eq!(
        sort_by_distance(&sorted, origin.latitude, origin.longitude),
        sorted
    );
}
