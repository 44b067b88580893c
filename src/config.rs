use std::env::{self, VarError};
use std::sync::Arc;

use crate::{
    api::{DynAPI, DynGeolocation},
    entities::Coordinates,
    error::{config_error, Error},
    external::{FixedLocation, PlacesBackend, Unavailable},
};

pub const DEFAULT_API_BASE: &str = "http://localhost:3000";

#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub api_base: String,
    /// Position reported to the sorter. `None` means geolocation is unavailable.
    pub location: Option<Coordinates>,
}

impl Config {
    /// Reads `PLACES_API_BASE`, `PLACES_LATITUDE` and `PLACES_LONGITUDE`, loading a `.env`
    /// file first if there is one.
    pub fn from_env() -> Result<Self, Error> {
        dotenv::dotenv().ok();

        Self::from_lookup(|key| env::var(key))
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, Error>
    where
        F: Fn(&str) -> Result<String, VarError>,
    {
        let optional = |key: &str| -> Result<Option<String>, Error> {
            match lookup(key) {
                Ok(value) => Ok(Some(value)),
                Err(VarError::NotPresent) => Ok(None),
                Err(err) => Err(err.into()),
            }
        };

        let api_base = optional("PLACES_API_BASE")?
            .map(|base| base.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_API_BASE.into());

        let latitude = optional("PLACES_LATITUDE")?
            .map(|value| parse_degrees("PLACES_LATITUDE", &value, 90.0))
            .transpose()?;
        let longitude = optional("PLACES_LONGITUDE")?
            .map(|value| parse_degrees("PLACES_LONGITUDE", &value, 180.0))
            .transpose()?;

        let location = match (latitude, longitude) {
            (Some(latitude), Some(longitude)) => Some(Coordinates::new(latitude, longitude)),
            _ => None,
        };

        Ok(Self { api_base, location })
    }

    pub fn api(&self) -> DynAPI {
        Arc::new(PlacesBackend::new(self.api_base.clone()))
    }

    pub fn geolocation(&self) -> DynGeolocation {
        match self.location {
            Some(coordinates) => Arc::new(FixedLocation(coordinates)),
            None => Arc::new(Unavailable::default()),
        }
    }
}

fn parse_degrees(key: &str, value: &str, limit: f64) -> Result<f64, Error> {
    let degrees: f64 = value
        .trim()
        .parse()
        .map_err(|_| config_error(format!("{} is not a number: {:?}", key, value)))?;

    if !(-limit..=limit).contains(&degrees) {
        return Err(config_error(format!("{} out of range: {}", key, degrees)));
    }

    Ok(degrees)
}

#[cfg(test)]
fn lookup_in(
    vars: &'static [(&'static str, &'static str)],
) -> impl Fn(&str) -> Result<String, VarError> {
    move |key| {
        vars.iter()
            .find(|(name, _)| *name == key)
            .map(|(_, value)| value.to_string())
            .ok_or(VarError::NotPresent)
    }
}

#[test]
fn defaults() {
    let config = Config::from_lookup(lookup_in(&[])).unwrap();

    assert_eq!(config.api_base, DEFAULT_API_BASE);
    assert_eq!(config.location, None);
}

#[test]
fn reads_base_and_location() {
    let config = Config::from_lookup(lookup_in(&[
        ("PLACES_API_BASE", "https://places.example.com/"),
        ("PLACES_LATITUDE", " 52.52"),
        ("PLACES_LONGITUDE", "13.405"),
    ]))
    .unwrap();

    assert_eq!(config.api_base, "https://places.example.com");
    assert_eq!(config.location, Some(Coordinates::new(52.52, 13.405)));
}

#[test]
fn half_a_location_is_no_location() {
    let config = Config::from_lookup(lookup_in(&[("PLACES_LATITUDE", "52.52")])).unwrap();

    assert_eq!(config.location, None);
}

#[test]
fn rejects_bad_coordinates() {
    use crate::error::ErrorKind;

    let err = Config::from_lookup(lookup_in(&[
        ("PLACES_LATITUDE", "north"),
        ("PLACES_LONGITUDE", "13.405"),
    ]))
    .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Config);

    let err = Config::from_lookup(lookup_in(&[
        ("PLACES_LATITUDE", "120"),
        ("PLACES_LONGITUDE", "13.405"),
    ]))
    .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Config);
}

#[test]
fn rejects_a_lone_bad_value() {
    use crate::error::ErrorKind;

    let err = Config::from_lookup(lookup_in(&[("PLACES_LATITUDE", "north")])).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Config);

    let err = Config::from_lookup(lookup_in(&[("PLACES_LONGITUDE", "-200")])).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Config);
}
