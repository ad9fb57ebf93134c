//! Resolves client IPv4 addresses to approximate locations through a configurable geolocation
//! provider, short-circuiting reserved addresses and caching the caller's own location.

pub mod cache;
pub mod location;
pub mod locator;
pub mod providers;
pub mod reserved;
