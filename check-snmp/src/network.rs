//! IP networks scanned by device discovery.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

/// Largest number of hosts a discovery scan enumerates.
pub const MAX_DISCOVERY_HOSTS: u128 = 1 << 16;

/// An IPv4 or IPv6 network.
///
/// Accepts a prefix length (`10.0.0.0/24`) and, for IPv4, a netmask
/// (`10.0.0.0/255.255.255.0`) or host mask (`10.0.0.0/0.0.0.255`). Parsing
/// is strict: the address must not have bits set below the prefix
/// (`10.0.0.1/24` is rejected). A bare address is a single-host network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IpNetwork {
    addr: IpAddr,
    prefix: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkParseError(String);

impl fmt::Display for NetworkParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for NetworkParseError {}

impl IpNetwork {
    pub fn addr(&self) -> IpAddr {
        self.addr
    }

    pub fn prefix(&self) -> u8 {
        self.prefix
    }

    fn max_prefix(addr: &IpAddr) -> u8 {
        match addr {
            IpAddr::V4(_) => 32,
            IpAddr::V6(_) => 128,
        }
    }

    fn host_bits(&self) -> u32 {
        u32::from(Self::max_prefix(&self.addr) - self.prefix)
    }

    fn base(&self) -> u128 {
        match self.addr {
            IpAddr::V4(v4) => u128::from(u32::from(v4)),
            IpAddr::V6(v6) => u128::from(v6),
        }
    }

    fn at(&self, value: u128) -> IpAddr {
        match self.addr {
            IpAddr::V4(_) => IpAddr::V4(Ipv4Addr::from(value as u32)),
            IpAddr::V6(_) => IpAddr::V6(Ipv6Addr::from(value)),
        }
    }

    /// Whether `ip` belongs to this network.
    pub fn contains(&self, ip: &IpAddr) -> bool {
        let value = match (ip, &self.addr) {
            (IpAddr::V4(v4), IpAddr::V4(_)) => u128::from(u32::from(*v4)),
            (IpAddr::V6(v6), IpAddr::V6(_)) => u128::from(*v6),
            _ => return false,
        };
        let host_bits = self.host_bits();
        host_bits >= 128 || value >> host_bits == self.base() >> host_bits
    }

    /// Usable host addresses, in order.
    ///
    /// For IPv4 the network and broadcast addresses are skipped unless the
    /// prefix is /31 or /32; for IPv6 the subnet-router anycast address is
    /// skipped unless the prefix is /127 or /128. Enumeration stops after
    /// [`MAX_DISCOVERY_HOSTS`] addresses.
    pub fn hosts(&self) -> Vec<IpAddr> {
        let host_bits = self.host_bits();
        let size: u128 = if host_bits >= 128 {
            u128::MAX
        } else {
            1u128 << host_bits
        };
        let base = self.base();

        let (start, end) = match self.addr {
            IpAddr::V4(_) if host_bits >= 2 => (base + 1, base + size - 1),
            IpAddr::V6(_) if host_bits >= 2 => (base + 1, base.saturating_add(size)),
            _ => (base, base + size.min(MAX_DISCOVERY_HOSTS)),
        };

        let end = end.min(start.saturating_add(MAX_DISCOVERY_HOSTS));
        (start..end).map(|value| self.at(value)).collect()
    }
}

impl FromStr for IpNetwork {
    type Err = NetworkParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (addr, prefix) = match s.split_once('/') {
            Some((addr, prefix)) => (addr, Some(prefix)),
            None => (s, None),
        };

        let addr: IpAddr = addr
            .parse()
            .map_err(|_| NetworkParseError(format!("'{}' does not appear to be an IPv4 or IPv6 network", s)))?;
        let max = Self::max_prefix(&addr);

        let prefix = match prefix {
            Some(p) => parse_prefix(p, &addr, max)
                .ok_or_else(|| NetworkParseError(format!("'{}' has an invalid prefix length", s)))?,
            None => max,
        };

        let network = IpNetwork { addr, prefix };
        let host_bits = network.host_bits();
        let host_mask = if host_bits >= 128 {
            u128::MAX
        } else {
            (1u128 << host_bits) - 1
        };
        if network.base() & host_mask != 0 {
            return Err(NetworkParseError(format!("{} has host bits set", s)));
        }

        Ok(network)
    }
}

/// Prefix length given as a number or, for IPv4, as a mask.
fn parse_prefix(prefix: &str, addr: &IpAddr, max: u8) -> Option<u8> {
    if let Ok(length) = prefix.parse::<u8>() {
        return (length <= max).then_some(length);
    }

    match (addr, prefix.parse::<Ipv4Addr>()) {
        (IpAddr::V4(_), Ok(mask)) => mask_prefix(mask),
        _ => None,
    }
}

/// Prefix length of a netmask (`255.255.255.0`) or host mask (`0.0.0.255`).
fn mask_prefix(mask: Ipv4Addr) -> Option<u8> {
    let bits = u32::from(mask);
    if bits.leading_ones() + bits.trailing_zeros() == 32 {
        Some(bits.leading_ones() as u8)
    } else if bits.leading_zeros() + bits.trailing_ones() == 32 {
        Some(bits.leading_zeros() as u8)
    } else {
        None
    }
}

impl fmt::Display for IpNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.prefix)
    }
}
