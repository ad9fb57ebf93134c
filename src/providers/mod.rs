use std::{net::Ipv4Addr, path::PathBuf, time::Duration};

use async_trait::async_trait;
use clap::ValueEnum;

mod maxmind;

mod maxmind_database;
pub use maxmind_database::MaxmindDatabaseProvider;

mod maxmind_web_service;
pub use maxmind_web_service::MaxmindWebServiceProvider;

/// Location data as returned by a provider, before being reshaped into a
/// [LocationRecord](crate::location::LocationRecord).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecord {
    pub iso_code: Option<String>,
    pub country_name: Option<String>,
    pub city_name: Option<String>,
    /// ISO code of the most specific subdivision
    pub subdivision_code: Option<String>,
    pub postal_code: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, thiserror::Error)]
pub enum LocateError {
    #[error("IP address {0} not covered by the provider")]
    NotFound(Ipv4Addr),
    #[error("geolocation database error: {0}")]
    Database(#[from] maxminddb::MaxMindDBError),
    #[error("geolocation web service request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("geolocation web service returned {status} ({code}): {message}")]
    Service {
        status: u16,
        code: String,
        message: String,
    },
}

#[async_trait]
pub trait GeoProvider: Send + Sync {
    async fn locate(&self, ip_address: Ipv4Addr) -> Result<RawRecord, LocateError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProviderName {
    Maxmind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MaxmindTransport {
    LocalDatabase,
    WebService,
}

#[derive(Debug, Clone)]
pub struct MaxmindSettings {
    pub transport: MaxmindTransport,
    pub database: PathBuf,
    pub account_id: Option<String>,
    pub license_key: Option<String>,
    pub endpoint: String,
    pub timeout: Duration,
}

/// Builds the provider registered under `name`.
pub fn build(
    name: ProviderName,
    maxmind: &MaxmindSettings,
) -> anyhow::Result<Box<dyn GeoProvider>> {
    match name {
        ProviderName::Maxmind => match maxmind.transport {
            MaxmindTransport::LocalDatabase => Ok(Box::new(MaxmindDatabaseProvider::from_file(
                &maxmind.database,
            )?)),
            MaxmindTransport::WebService => {
                let (Some(account_id), Some(license_key)) =
                    (&maxmind.account_id, &maxmind.license_key)
                else {
                    anyhow::bail!("the web service requires both an account ID and a license key");
                };

                Ok(Box::new(MaxmindWebServiceProvider::new(
                    &maxmind.endpoint,
                    account_id,
                    license_key,
                    maxmind.timeout,
                )?))
            }
        },
    }
}
