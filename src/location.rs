use serde::{Deserialize, Serialize};

use crate::providers::RawRecord;

/// Location as handed to callers and stored in the cache cookie. Every field is always
/// populated, whichever provider produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationRecord {
    pub ip: String,
    pub iso_code: String,
    pub country: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub lat: f64,
    pub lon: f64,
}

impl LocationRecord {
    /// Placeholder returned when an address can't be looked up.
    pub fn fallback(ip: &str) -> Self {
        Self {
            ip: ip.to_owned(),
            iso_code: "US".into(),
            country: "United States".into(),
            city: "New Haven".into(),
            state: "CT".into(),
            postal_code: "06510".into(),
            lat: 41.28,
            lon: -72.88,
        }
    }

    pub fn from_raw(ip: impl Into<String>, raw: RawRecord) -> Self {
        Self {
            ip: ip.into(),
            iso_code: raw.iso_code.unwrap_or_default(),
            country: raw.country_name.unwrap_or_default(),
            city: raw.city_name.unwrap_or_default(),
            state: raw.subdivision_code.unwrap_or_default(),
            postal_code: raw.postal_code.unwrap_or_default(),
            lat: raw.latitude.unwrap_or_default(),
            lon: raw.longitude.unwrap_or_default(),
        }
    }
}
