use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::entities::Coordinates;

pub type PlaceId = String;

/// A place as served by the backend. Identity is `id`; everything except `id` and the
/// coordinates is carried through untouched.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub id: PlaceId,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(flatten)]
    pub coordinates: Coordinates,
}

impl Place {
    pub fn new(id: impl Into<PlaceId>, name: impl Into<String>, coordinates: Coordinates) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            image: None,
            description: None,
            coordinates,
        }
    }
}

#[test]
fn deserialize_backend_dto() {
    let place: Place = serde_json::from_value(serde_json::json!({
        "id": "p1",
        "name": "Forest Waterfall",
        "image": { "src": "forest-waterfall.jpg", "alt": "A waterfall" },
        "latitude": 44.5588,
        "longitude": -80.344,
    }))
    .unwrap();

    assert_eq!(place.id, "p1");
    assert_eq!(place.coordinates, Coordinates::new(44.5588, -80.344));
    assert!(place.image.is_some());
    assert_eq!(place.description, None);
}
