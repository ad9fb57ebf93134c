//! City response shape shared by the MaxMind database and web service.

use std::collections::BTreeMap;

use serde::Deserialize;

use super::RawRecord;

#[derive(Debug, Default, Deserialize)]
pub(super) struct CityResponse {
    country: Option<Country>,
    city: Option<City>,
    subdivisions: Option<Vec<Subdivision>>,
    postal: Option<Postal>,
    location: Option<Location>,
}

#[derive(Debug, Deserialize)]
struct Country {
    iso_code: Option<String>,
    names: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Deserialize)]
struct City {
    names: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Deserialize)]
struct Subdivision {
    iso_code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Postal {
    code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Location {
    latitude: Option<f64>,
    longitude: Option<f64>,
}

fn english_name(names: Option<BTreeMap<String, String>>) -> Option<String> {
    names?.remove("en")
}

impl From<CityResponse> for RawRecord {
    fn from(value: CityResponse) -> Self {
        let (iso_code, country_name) = match value.country {
            Some(country) => (country.iso_code, english_name(country.names)),
            None => (None, None),
        };

        // Subdivisions are ordered from largest to smallest
        let subdivision_code = value
            .subdivisions
            .and_then(|subdivisions| subdivisions.into_iter().last())
            .and_then(|subdivision| subdivision.iso_code);

        let (latitude, longitude) = match value.location {
            Some(location) => (location.latitude, location.longitude),
            None => (None, None),
        };

        Self {
            iso_code,
            country_name,
            city_name: value.city.and_then(|city| english_name(city.names)),
            subdivision_code,
            postal_code: value.postal.and_then(|postal| postal.code),
            latitude,
            longitude,
        }
    }
}
