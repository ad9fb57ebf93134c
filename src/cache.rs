use std::time::Duration;

use log::debug;
use poem::web::cookie::{Cookie, CookieJar};

use crate::location::LocationRecord;

/// Per-client store for the last resolved location.
pub trait LocationCache: Send + Sync {
    fn get(&self) -> Option<LocationRecord>;

    fn set(&self, location: &LocationRecord, ttl: Duration);
}

/// [LocationCache] kept in a cookie on the client.
pub struct CookieLocationCache<'a> {
    jar: &'a CookieJar,
    name: &'a str,
}

impl<'a> CookieLocationCache<'a> {
    pub fn new(jar: &'a CookieJar, name: &'a str) -> Self {
        Self { jar, name }
    }
}

impl LocationCache for CookieLocationCache<'_> {
    fn get(&self) -> Option<LocationRecord> {
        let cookie = self.jar.get(self.name)?;

        match serde_json::from_str(cookie.value_str()) {
            Ok(location) => Some(location),
            Err(err) => {
                debug!("Ignoring unreadable {} cookie: {}", self.name, err);
                None
            }
        }
    }

    fn set(&self, location: &LocationRecord, ttl: Duration) {
        let value = match serde_json::to_string(location) {
            Ok(value) => value,
            Err(err) => {
                debug!("Not caching location for {}: {}", location.ip, err);
                return;
            }
        };

        let mut cookie = Cookie::new_with_str(self.name, value);
        cookie.set_path("/");
        cookie.set_http_only(true);
        cookie.set_max_age(ttl);

        debug!("Caching location for {} in {} cookie", location.ip, self.name);
        self.jar.add(cookie);
    }
}
