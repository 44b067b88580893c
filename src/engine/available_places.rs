use crate::{
    api::{DynAPI, DynGeolocation},
    engine::distance::sort_by_distance,
    entities::Place,
    error::Error,
};

pub const AVAILABLE_FALLBACK: &str = "Failed to fetch places.";

/// Fetches the catalog and orders it by distance from the current position. The position
/// is looked up once per call, after the catalog arrives.
#[tracing::instrument(skip_all)]
pub async fn fetch_sorted_places(
    api: &DynAPI,
    geolocation: &DynGeolocation,
) -> Result<Vec<Place>, Error> {
    let places = api.fetch_available_places().await?;
    let position = geolocation.current_position().await?;

    tracing::info!(
        count = places.len(),
        latitude = position.latitude,
        longitude = position.longitude,
        "sorting places by distance"
    );

    Ok(sort_by_distance(
        &places,
        position.latitude,
        position.longitude,
    ))
}

#[cfg(test)]
use std::sync::Arc;
#[cfg(test)]
use tokio_test::block_on;

#[cfg(test)]
use crate::engine::testing::{ids, place, FakeAPI};
#[cfg(test)]
use crate::entities::Coordinates;
#[cfg(test)]
use crate::error::{server_error, ErrorKind};
#[cfg(test)]
use crate::external::{FixedLocation, Unavailable};

#[cfg(test)]
fn catalog() -> Vec<Place> {
    vec![
        place("tokyo", 35.6762, 139.6503),
        place("berlin", 52.52, 13.405),
        place("paris", 48.8566, 2.3522),
    ]
}

#[test]
fn sorted_from_current_position() {
    let api: DynAPI = Arc::new(FakeAPI::new(catalog(), vec![]));
    let london: DynGeolocation = Arc::new(FixedLocation(Coordinates::new(51.5074, -0.1278)));

    let places = block_on(fetch_sorted_places(&api, &london)).unwrap();

    assert_eq!(ids(&places), ["paris", "berlin", "tokyo"]);
}

#[test]
fn geolocation_failure_fails_the_fetch() {
    let api: DynAPI = Arc::new(FakeAPI::new(catalog(), vec![]));
    let nowhere: DynGeolocation = Arc::new(Unavailable::new("User denied Geolocation"));

    let err = block_on(fetch_sorted_places(&api, &nowhere)).unwrap_err();

    assert_eq!(err.kind, ErrorKind::Geolocation);
    assert_eq!(err.message, "User denied Geolocation");
}

#[test]
fn backend_failure_skips_geolocation() {
    let mut fake = FakeAPI::new(vec![], vec![]);
    fake.available = Err(server_error(503, "Service Unavailable"));
    let api: DynAPI = Arc::new(fake);
    let nowhere: DynGeolocation = Arc::new(Unavailable::default());

    let err = block_on(fetch_sorted_places(&api, &nowhere)).unwrap_err();

    assert_eq!(err.kind, ErrorKind::Server(503));
}
