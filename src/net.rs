//! Network types and transports for KNXnet/IP communication.
//!
//! KNXnet/IP only speaks IPv4, so every endpoint here is an IPv4 address plus
//! a port. The engine never touches OS sockets directly: it talks to an
//! [`AsyncTransport`](transport::AsyncTransport), with a tokio UDP
//! implementation in [`udp`] and a scripted one in [`mock_transport`].

pub mod mock_transport;
pub mod transport;
pub mod udp;

use crate::error::{KnxError, Result};
use crate::protocol::constants::{KNXNETIP_DEFAULT_PORT, KNXNETIP_MULTICAST_ADDR};
use core::fmt;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

/// IPv4 endpoint (address + port).
///
/// # Examples
///
/// ```
/// use knx_netip::net::IpEndpoint;
/// use std::net::Ipv4Addr;
///
/// let gateway = IpEndpoint::new(Ipv4Addr::new(192, 168, 1, 10), 3671);
/// assert_eq!(gateway.to_string(), "192.168.1.10:3671");
///
/// let parsed: IpEndpoint = "192.168.1.10:3671".parse()?;
/// assert_eq!(parsed, gateway);
/// # Ok::<(), knx_netip::KnxError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IpEndpoint {
    /// IPv4 address
    pub address: Ipv4Addr,
    /// UDP/TCP port
    pub port: u16,
}

impl IpEndpoint {
    /// `0.0.0.0:0`, the "route back" endpoint used behind NAT.
    pub const UNSPECIFIED: Self = Self::new(Ipv4Addr::UNSPECIFIED, 0);

    /// KNXnet/IP system setup multicast group `224.0.23.12:3671`.
    pub const MULTICAST: Self = Self::new(KNXNETIP_MULTICAST_ADDR, KNXNETIP_DEFAULT_PORT);

    /// Create a new endpoint.
    #[inline]
    pub const fn new(address: Ipv4Addr, port: u16) -> Self {
        Self { address, port }
    }

    /// True for `0.0.0.0:0`.
    pub fn is_unspecified(&self) -> bool {
        self.address.is_unspecified() && self.port == 0
    }
}

impl Default for IpEndpoint {
    fn default() -> Self {
        Self::UNSPECIFIED
    }
}

impl From<SocketAddrV4> for IpEndpoint {
    fn from(addr: SocketAddrV4) -> Self {
        Self::new(*addr.ip(), addr.port())
    }
}

impl From<IpEndpoint> for SocketAddrV4 {
    fn from(endpoint: IpEndpoint) -> Self {
        SocketAddrV4::new(endpoint.address, endpoint.port)
    }
}

impl From<IpEndpoint> for SocketAddr {
    fn from(endpoint: IpEndpoint) -> Self {
        SocketAddr::V4(endpoint.into())
    }
}

impl TryFrom<SocketAddr> for IpEndpoint {
    type Error = KnxError;

    fn try_from(addr: SocketAddr) -> Result<Self> {
        match addr {
            SocketAddr::V4(v4) => Ok(v4.into()),
            SocketAddr::V6(_) => Err(KnxError::not_ipv4()),
        }
    }
}

impl fmt::Display for IpEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.address, self.port)
    }
}

impl core::str::FromStr for IpEndpoint {
    type Err = KnxError;

    fn from_str(s: &str) -> Result<Self> {
        s.parse::<SocketAddrV4>()
            .map(Self::from)
            .map_err(|_parse| KnxError::invalid_endpoint())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multicast_group() {
        assert_eq!(IpEndpoint::MULTICAST.to_string(), "224.0.23.12:3671");
        assert!(IpEndpoint::MULTICAST.address.is_multicast());
    }

    #[test]
    fn test_unspecified() {
        assert!(IpEndpoint::UNSPECIFIED.is_unspecified());
        assert!(!IpEndpoint::new(Ipv4Addr::UNSPECIFIED, 3671).is_unspecified());
    }

    #[test]
    fn test_from_str() {
        let ep: IpEndpoint = "10.0.0.2:50000".parse().unwrap();
        assert_eq!(ep, IpEndpoint::new(Ipv4Addr::new(10, 0, 0, 2), 50000));
        assert!("10.0.0.2".parse::<IpEndpoint>().is_err());
        assert!("[::1]:3671".parse::<IpEndpoint>().is_err());
    }

    #[test]
    fn test_ipv6_socket_addr_rejected() {
        let v6: SocketAddr = "[::1]:3671".parse().unwrap();
        assert!(IpEndpoint::try_from(v6).is_err());
    }
}
