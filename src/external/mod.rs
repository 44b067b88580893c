mod geolocation;
mod places_backend;

pub use geolocation::{FixedLocation, Unavailable};
pub use places_backend::PlacesBackend;
