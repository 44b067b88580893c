use async_trait::async_trait;
use std::sync::Arc;

use crate::entities::{Coordinates, Place};
use crate::error::Error;

/// Remote side of the place picker. Failures propagate once; callers decide what to do.
#[async_trait]
pub trait PlacesAPI {
    async fn fetch_available_places(&self) -> Result<Vec<Place>, Error>;
    async fn fetch_user_places(&self) -> Result<Vec<Place>, Error>;
    /// Replaces the saved list on the backend as a whole.
    async fn update_user_places(&self, places: &[Place]) -> Result<(), Error>;
}

/// One-shot position lookup.
#[async_trait]
pub trait Geolocation {
    async fn current_position(&self) -> Result<Coordinates, Error>;
}

pub type DynAPI = Arc<dyn PlacesAPI + Send + Sync>;
pub type DynGeolocation = Arc<dyn Geolocation + Send + Sync>;
