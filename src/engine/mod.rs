mod available_places;
mod distance;
mod fetch;
mod saved_places;
mod session;

#[cfg(test)]
mod testing;

pub use available_places::{fetch_sorted_places, AVAILABLE_FALLBACK};
pub use distance::{haversine_km, sort_by_distance};
pub use fetch::{Fetch, FetchState, Status, DEFAULT_FETCH_FALLBACK};
pub use saved_places::{
    OpenPrompt, Outcome, RemovalPrompt, SavedPlaces, ADD_FALLBACK, LOAD_FALLBACK,
    REMOVE_FALLBACK,
};
pub use session::PlacePicker;
