use std::{net::Ipv4Addr, str::FromStr, time::Duration};

use log::debug;

use crate::{
    cache::LocationCache,
    location::LocationRecord,
    providers::{GeoProvider, LocateError},
    reserved::{reserved_range, routable_ipv4},
};

/// 7 days
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(10080 * 60);

/// Resolves locations on behalf of a single client.
pub struct Locator<'a> {
    remote_ip: String,
    default_location: LocationRecord,
    location: Option<LocationRecord>,
    provider: &'a dyn GeoProvider,
    cache: &'a dyn LocationCache,
    cache_ttl: Duration,
}

impl<'a> Locator<'a> {
    pub fn new(
        remote_ip: impl Into<String>,
        provider: &'a dyn GeoProvider,
        cache: &'a dyn LocationCache,
    ) -> Self {
        let remote_ip = remote_ip.into();

        Self {
            default_location: LocationRecord::fallback(&remote_ip),
            remote_ip,
            location: None,
            provider,
            cache,
            cache_ttl: DEFAULT_CACHE_TTL,
        }
    }

    pub fn with_cache_ttl(mut self, cache_ttl: Duration) -> Self {
        self.cache_ttl = cache_ttl;
        self
    }

    /// The record produced by the last [Locator::resolve] call.
    pub fn location(&self) -> Option<&LocationRecord> {
        self.location.as_ref()
    }

    /// Resolves `ip_address`, or the client's own address when `None`.
    ///
    /// Only lookups of the client's own address go through the cache. Empty, malformed and
    /// reserved addresses resolve to the default location without consulting the provider.
    /// Provider errors are returned as-is.
    pub async fn resolve(
        &mut self,
        ip_address: Option<&str>,
    ) -> Result<LocationRecord, LocateError> {
        if ip_address.is_none() {
            if let Some(cached) = self.cache.get() {
                if cached.ip == self.remote_ip {
                    debug!("Using cached location for {}", self.remote_ip);
                    self.location = Some(cached.clone());
                    return Ok(cached);
                }
            }
        }

        let target = ip_address.unwrap_or(self.remote_ip.as_str()).to_owned();

        let Some(routable) = routable_ipv4(&target) else {
            match Ipv4Addr::from_str(&target).ok().as_ref().and_then(reserved_range) {
                Some(range) => debug!(
                    "{} is a {} address, using default location",
                    target, range.usage
                ),
                None => debug!("{:?} is not an IPv4 address, using default location", target),
            }
            self.location = Some(self.default_location.clone());
            return Ok(self.default_location.clone());
        };

        let raw = self.provider.locate(routable).await?;
        let location = LocationRecord::from_raw(target, raw);
        self.location = Some(location.clone());

        if ip_address.is_none() {
            self.save_location();
        }

        Ok(location)
    }

    /// Writes the last resolved location to the cache. Does nothing before the first
    /// [Locator::resolve].
    pub fn save_location(&self) {
        if let Some(location) = &self.location {
            self.cache.set(location, self.cache_ttl);
        }
    }
}
