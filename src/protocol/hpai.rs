//! Host Protocol Address Information (HPAI).
//!
//! ```text
//! ┌──────────────┬──────────────┬─────────────────────┐
//! │ Structure Len│ Host Protocol│   IP Address        │
//! │   (1 byte)   │   (1 byte)   │   (4 bytes IPv4)    │
//! ├──────────────┴──────────────┴─────────────────────┤
//! │                Port (2 bytes)                      │
//! └────────────────────────────────────────────────────┘
//! ```

use crate::error::{KnxError, Result};
use crate::net::IpEndpoint;
use crate::protocol::constants::HostProtocol;
use crate::protocol::structure::Struct;
use bytes::Bytes;
use std::net::Ipv4Addr;

/// Endpoint descriptor carried in most KNXnet/IP service bodies.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Hpai(Struct<HostProtocol>);

impl Hpai {
    /// Size of HPAI structure for IPv4
    pub const SIZE: usize = 8;

    /// Create a new HPAI
    pub fn new(protocol: HostProtocol, endpoint: IpEndpoint) -> Self {
        let mut payload = [0u8; Self::SIZE - 2];
        payload[..4].copy_from_slice(&endpoint.address.octets());
        payload[4..].copy_from_slice(&endpoint.port.to_be_bytes());
        Self(Struct::from_array(protocol, payload))
    }

    /// Create a new HPAI for IPv4 UDP
    pub fn udp(endpoint: IpEndpoint) -> Self {
        Self::new(HostProtocol::Ipv4Udp, endpoint)
    }

    /// `0.0.0.0:0` UDP descriptor, asking the server to answer to the
    /// datagram's source address.
    pub fn route_back() -> Self {
        Self::udp(IpEndpoint::UNSPECIFIED)
    }

    /// Parse an HPAI starting at `offset`
    ///
    /// # Errors
    ///
    /// Returns error if the structure header is invalid or runs past `data`.
    /// A well-formed structure with the wrong size parses but is not
    /// [`is_valid`](Self::is_valid).
    pub fn parse(data: &Bytes, offset: usize) -> Result<Self> {
        Struct::parse(data, offset).map(Self)
    }

    /// Wrap an already parsed structure
    pub fn from_struct(inner: Struct<HostProtocol>) -> Self {
        Self(inner)
    }

    /// Host protocol code
    pub fn protocol(&self) -> HostProtocol {
        self.0.code()
    }

    /// Size is 8 bytes
    pub fn is_valid(&self) -> bool {
        self.0.size() == Self::SIZE
    }

    /// IPv4 address, `None` if invalid
    pub fn address(&self) -> Option<Ipv4Addr> {
        self.endpoint().map(|ep| ep.address)
    }

    /// Port, `None` if invalid
    pub fn port(&self) -> Option<u16> {
        self.endpoint().map(|ep| ep.port)
    }

    /// Address and port, `None` if invalid
    pub fn endpoint(&self) -> Option<IpEndpoint> {
        if !self.is_valid() {
            return None;
        }
        let data = self.0.data();
        let address = Ipv4Addr::new(data[0], data[1], data[2], data[3]);
        Some(IpEndpoint::new(address, u16::from_be_bytes([data[4], data[5]])))
    }

    /// Address and port of a valid UDP descriptor.
    ///
    /// # Errors
    ///
    /// Returns `InvalidEndpoint` for TCP or malformed descriptors.
    pub fn udp_endpoint(&self) -> Result<IpEndpoint> {
        match self.protocol() {
            HostProtocol::Ipv4Udp => self.endpoint().ok_or_else(KnxError::invalid_endpoint),
            HostProtocol::Ipv4Tcp => Err(KnxError::invalid_endpoint()),
        }
    }

    /// Full byte image
    pub fn bytes(&self) -> &Bytes {
        self.0.bytes()
    }

    /// Underlying structure
    pub fn as_struct(&self) -> &Struct<HostProtocol> {
        &self.0
    }
}

impl From<IpEndpoint> for Hpai {
    fn from(endpoint: IpEndpoint) -> Self {
        Self::udp(endpoint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hpai_parse() {
        let data = Bytes::from_static(&[
            0x08, // structure length
            0x01, // IPv4 UDP
            192, 168, 1, 100, // IP address
            0x0E, 0x57, // port 3671
        ]);

        let hpai = Hpai::parse(&data, 0).unwrap();
        assert!(hpai.is_valid());
        assert_eq!(hpai.protocol(), HostProtocol::Ipv4Udp);
        assert_eq!(hpai.address(), Some(Ipv4Addr::new(192, 168, 1, 100)));
        assert_eq!(hpai.port(), Some(3671));
    }

    #[test]
    fn test_hpai_encode() {
        let hpai = Hpai::udp(IpEndpoint::new(Ipv4Addr::LOCALHOST, 3671));
        assert_eq!(&hpai.bytes()[..], &[0x08, 0x01, 127, 0, 0, 1, 0x0E, 0x57]);
    }

    #[test]
    fn test_hpai_wrong_size_is_invalid() {
        let data = Bytes::from_static(&[0x06, 0x01, 10, 0, 0, 1]);
        let hpai = Hpai::parse(&data, 0).unwrap();
        assert!(!hpai.is_valid());
        assert_eq!(hpai.endpoint(), None);
    }

    #[test]
    fn test_tcp_is_not_a_udp_endpoint() {
        let hpai = Hpai::new(HostProtocol::Ipv4Tcp, IpEndpoint::new(Ipv4Addr::LOCALHOST, 3671));
        assert!(hpai.is_valid());
        assert_eq!(hpai.bytes()[1], 0x02);
        assert!(hpai.udp_endpoint().is_err());
    }

    #[test]
    fn test_route_back() {
        let hpai = Hpai::route_back();
        assert_eq!(&hpai.bytes()[..], &[0x08, 0x01, 0, 0, 0, 0, 0, 0]);
        assert!(hpai.endpoint().unwrap().is_unspecified());
    }
}
