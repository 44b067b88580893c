use async_trait::async_trait;

use crate::{
    api::Geolocation,
    entities::Coordinates,
    error::{geolocation_error, Error},
};

/// Always reports the same position.
#[derive(Clone, Copy, Debug)]
pub struct FixedLocation(pub Coordinates);

#[async_trait]
impl Geolocation for FixedLocation {
    async fn current_position(&self) -> Result<Coordinates, Error> {
        Ok(self.0)
    }
}

/// No position source available (or permission denied).
#[derive(Clone, Debug)]
pub struct Unavailable {
    reason: String,
}

impl Unavailable {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl Default for Unavailable {
    fn default() -> Self {
        Self::new("Location is not available.")
    }
}

#[async_trait]
impl Geolocation for Unavailable {
    #[tracing::instrument]
    async fn current_position(&self) -> Result<Coordinates, Error> {
        Err(geolocation_error(self.reason.clone()))
    }
}

#[test]
fn fixed_and_unavailable() {
    use crate::error::ErrorKind;
    use tokio_test::block_on;

    let here = Coordinates::new(48.8566, 2.3522);
    assert_eq!(block_on(FixedLocation(here).current_position()), Ok(here));

    let err = block_on(Unavailable::default().current_position()).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Geolocation);
    assert_eq!(err.message, "Location is not available.");
}
