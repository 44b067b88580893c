use geo_types::Point;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    #[serde(alias = "lat")]
    pub latitude: f64,
    #[serde(alias = "lon", alias = "lng")]
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

// geo_types points are (x, y), i.e. (longitude, latitude)
impl From<Coordinates> for Point<f64> {
    fn from(coordinates: Coordinates) -> Self {
        Point::new(coordinates.longitude, coordinates.latitude)
    }
}

#[test]
fn point_conversion_keeps_axis_order() {
    let coordinates = Coordinates::new(52.52, 13.405);
    let point: Point<f64> = coordinates.into();

    assert_eq!(point.x(), 13.405);
    assert_eq!(point.y(), 52.52);
}
