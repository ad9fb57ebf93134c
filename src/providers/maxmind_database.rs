use std::{
    net::{IpAddr, Ipv4Addr},
    path::Path,
};

use async_trait::async_trait;
use maxminddb::{MaxMindDBError, Reader};

use super::{maxmind::CityResponse, GeoProvider, LocateError, RawRecord};

/// Looks addresses up in a local GeoIP2/GeoLite2 City database.
pub struct MaxmindDatabaseProvider {
    reader: Reader<Vec<u8>>,
}

impl MaxmindDatabaseProvider {
    pub fn from_file(db_path: &Path) -> anyhow::Result<Self> {
        let reader = Reader::open_readfile(db_path).map_err(|err| {
            anyhow::anyhow!("unable to open {}: {}", db_path.display(), err)
        })?;

        Ok(Self { reader })
    }

    pub fn lookup(&self, ip_address: Ipv4Addr) -> Result<RawRecord, LocateError> {
        match self.reader.lookup::<CityResponse>(IpAddr::V4(ip_address)) {
            Ok(response) => Ok(response.into()),
            Err(MaxMindDBError::AddressNotFoundError(_)) => Err(LocateError::NotFound(ip_address)),
            Err(err) => Err(err.into()),
        }
    }
}

impl std::fmt::Debug for MaxmindDatabaseProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MaxmindDatabaseProvider")
            .field("database_type", &self.reader.metadata.database_type)
            .finish()
    }
}

#[async_trait]
impl GeoProvider for MaxmindDatabaseProvider {
    async fn locate(&self, ip_address: Ipv4Addr) -> Result<RawRecord, LocateError> {
        self.lookup(ip_address)
    }
}
