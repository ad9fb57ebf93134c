use std::{net::Ipv4Addr, str::FromStr};

/// Inclusive IPv4 interval that is never sent to a geolocation provider.
#[derive(Debug, Clone, Copy)]
pub struct ReservedRange {
    pub low: Ipv4Addr,
    pub high: Ipv4Addr,
    pub usage: &'static str,
}

impl ReservedRange {
    const fn new(low: Ipv4Addr, high: Ipv4Addr, usage: &'static str) -> Self {
        Self { low, high, usage }
    }

    pub fn contains(&self, ip_address: &Ipv4Addr) -> bool {
        let ip_value = u32::from_be_bytes(ip_address.octets());

        u32::from_be_bytes(self.low.octets()) <= ip_value
            && ip_value <= u32::from_be_bytes(self.high.octets())
    }
}

pub static RESERVED_RANGES: [ReservedRange; 8] = [
    ReservedRange::new(
        Ipv4Addr::new(0, 0, 0, 0),
        Ipv4Addr::new(2, 255, 255, 255),
        "this network",
    ),
    ReservedRange::new(
        Ipv4Addr::new(10, 0, 0, 0),
        Ipv4Addr::new(10, 255, 255, 255),
        "private",
    ),
    ReservedRange::new(
        Ipv4Addr::new(127, 0, 0, 0),
        Ipv4Addr::new(127, 255, 255, 255),
        "loopback",
    ),
    ReservedRange::new(
        Ipv4Addr::new(169, 254, 0, 0),
        Ipv4Addr::new(169, 254, 255, 255),
        "link-local",
    ),
    ReservedRange::new(
        Ipv4Addr::new(172, 16, 0, 0),
        Ipv4Addr::new(172, 31, 255, 255),
        "private",
    ),
    ReservedRange::new(
        Ipv4Addr::new(192, 0, 2, 0),
        Ipv4Addr::new(192, 0, 2, 255),
        "documentation",
    ),
    ReservedRange::new(
        Ipv4Addr::new(192, 168, 0, 0),
        Ipv4Addr::new(192, 168, 255, 255),
        "private",
    ),
    ReservedRange::new(
        Ipv4Addr::new(255, 255, 255, 0),
        Ipv4Addr::new(255, 255, 255, 255),
        "broadcast",
    ),
];

/// Returns the first reserved range covering `ip_address`, if any.
pub fn reserved_range(ip_address: &Ipv4Addr) -> Option<&'static ReservedRange> {
    RESERVED_RANGES
        .iter()
        .find(|range| range.contains(ip_address))
}

/// Parses `ip_address` and returns it only when it is worth geolocating.
///
/// Empty input, anything that is not a dotted-quad IPv4 literal, and
/// addresses inside [RESERVED_RANGES] all yield `None`.
pub fn routable_ipv4(ip_address: &str) -> Option<Ipv4Addr> {
    if ip_address.is_empty() {
        return None;
    }

    let parsed = Ipv4Addr::from_str(ip_address).ok()?;
    if reserved_range(&parsed).is_some() {
        return None;
    }

    Some(parsed)
}

/// Checks that the address is not local or empty.
pub fn check_ip(ip_address: &str) -> bool {
    routable_ipv4(ip_address).is_some()
}
