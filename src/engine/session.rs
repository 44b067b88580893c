use tokio::sync::watch;

use crate::{
    api::{DynAPI, DynGeolocation},
    engine::{
        available_places::{fetch_sorted_places, AVAILABLE_FALLBACK},
        fetch::{Fetch, FetchState},
        saved_places::SavedPlaces,
    },
    entities::Place,
};

/// One view session: the nearby catalog plus the user's saved list. Both are fetched on
/// `mount` and dropped with the session.
pub struct PlacePicker {
    api: DynAPI,
    geolocation: DynGeolocation,
    available: Fetch<Vec<Place>>,
    saved: SavedPlaces,
}

impl PlacePicker {
    pub fn new(api: DynAPI, geolocation: DynGeolocation) -> Self {
        Self {
            saved: SavedPlaces::new(api.clone()),
            available: Fetch::with_fallback(vec![], AVAILABLE_FALLBACK),
            api,
            geolocation,
        }
    }

    #[tracing::instrument(name = "PlacePicker::mount", skip(self))]
    pub async fn mount(&self) {
        futures::join!(self.load_available(), self.saved.load());
    }

    /// The nearby catalog is read-only for callers; only `mount` writes it.
    pub fn available(&self) -> FetchState<Vec<Place>> {
        self.available.state()
    }

    pub fn subscribe_available(&self) -> watch::Receiver<FetchState<Vec<Place>>> {
        self.available.subscribe()
    }

    pub fn saved(&self) -> &SavedPlaces {
        &self.saved
    }

    async fn load_available(&self) -> bool {
        self.available
            .activate("available-places", || {
                fetch_sorted_places(&self.api, &self.geolocation)
            })
            .await
    }
}

#[cfg(test)]
use std::sync::Arc;
#[cfg(test)]
use tokio_test::block_on;

#[cfg(test)]
use crate::engine::fetch::Status;
#[cfg(test)]
use crate::engine::saved_places::Outcome;
#[cfg(test)]
use crate::engine::testing::{ids, place, FakeAPI};
#[cfg(test)]
use crate::entities::Coordinates;
#[cfg(test)]
use crate::error::ErrorInfo;
#[cfg(test)]
use crate::external::{FixedLocation, Unavailable};

#[cfg(test)]
fn catalog() -> Vec<Place> {
    vec![place("far", 40.0, 40.0), place("near", 1.0, 1.0)]
}

#[test]
fn mount_loads_both_lists() {
    let api = Arc::new(FakeAPI::new(catalog(), vec![place("saved", 3.0, 3.0)]));
    let here = FixedLocation(Coordinates::new(0.0, 0.0));
    let picker = PlacePicker::new(api.clone(), Arc::new(here));

    block_on(picker.mount());

    assert_eq!(ids(&picker.available().data), ["near", "far"]);
    assert_eq!(ids(&picker.saved().places()), ["saved"]);

    // mounting again does not refetch
    block_on(picker.mount());
    assert_eq!(api.fetches(), 2);
    assert!(api.writes().is_empty());

    let nearest = picker.available().data[0].clone();
    assert_eq!(
        block_on(picker.saved().select_place(nearest)),
        Outcome::Confirmed
    );
    assert_eq!(ids(&picker.saved().places()), ["near", "saved"]);
    assert_eq!(api.writes(), [vec!["near", "saved"]]);
}

#[test]
fn catalog_subscribers_see_mount() {
    let api = Arc::new(FakeAPI::new(catalog(), vec![]));
    let here = FixedLocation(Coordinates::new(0.0, 0.0));
    let picker = PlacePicker::new(api, Arc::new(here));
    let mut available = picker.subscribe_available();

    block_on(picker.mount());

    assert!(available.has_changed().unwrap());
    assert_eq!(ids(&available.borrow_and_update().data), ["near", "far"]);
}

#[test]
fn denied_location_fails_only_the_catalog() {
    let api = Arc::new(FakeAPI::new(catalog(), vec![]));
    let picker = PlacePicker::new(api, Arc::new(Unavailable::new("")));

    block_on(picker.mount());

    assert_eq!(
        picker.available().status(),
        Status::Failed(&ErrorInfo::new("Failed to fetch places."))
    );
    assert_eq!(picker.saved().state().status(), Status::Ready(&vec![]));
}
