mod location;
mod place;

pub use location::Coordinates;
pub use place::{Place, PlaceId};
