//! Tokio UDP socket adapter for `AsyncTransport`.
//!
//! [`TokioUdpTransport`] wraps a `tokio::net::UdpSocket` bound on demand, and
//! [`UdpTransportFactory`] hands one out per discovery interface.
//!
//! ## Example
//!
//! ```rust,no_run
//! use knx_netip::net::transport::AsyncTransport;
//! use knx_netip::net::udp::TokioUdpTransport;
//! use knx_netip::net::IpEndpoint;
//!
//! # async fn demo() -> knx_netip::Result<()> {
//! let mut transport = TokioUdpTransport::new();
//! let local = transport.bind(IpEndpoint::UNSPECIFIED).await?;
//! transport.send_to(&[0x06, 0x10], "192.168.1.10:3671".parse()?).await?;
//! # let _ = local;
//! # Ok(())
//! # }
//! ```

use crate::error::{KnxError, Result};
use crate::net::transport::{AsyncTransport, TransportFactory};
use crate::net::IpEndpoint;
use std::net::{Ipv4Addr, SocketAddr};
use tokio::net::UdpSocket;

/// `AsyncTransport` over a tokio UDP socket.
#[derive(Debug, Default)]
pub struct TokioUdpTransport {
    socket: Option<UdpSocket>,
    local: Option<IpEndpoint>,
}

impl TokioUdpTransport {
    /// Create an unbound transport.
    pub fn new() -> Self {
        Self::default()
    }

    fn socket(&self) -> Result<&UdpSocket> {
        self.socket.as_ref().ok_or_else(KnxError::not_bound)
    }
}

impl AsyncTransport for TokioUdpTransport {
    async fn bind(&mut self, local: IpEndpoint) -> Result<IpEndpoint> {
        let socket = UdpSocket::bind(SocketAddr::from(local)).await?;
        let bound = IpEndpoint::try_from(socket.local_addr()?)?;
        crate::knx_log!(debug, "UDP transport bound to {}", bound);
        self.socket = Some(socket);
        self.local = Some(bound);
        Ok(bound)
    }

    async fn send_to(&mut self, data: &[u8], addr: IpEndpoint) -> Result<()> {
        let sent = self.socket()?.send_to(data, SocketAddr::from(addr)).await?;
        if sent != data.len() {
            return Err(KnxError::send_failed());
        }
        Ok(())
    }

    async fn recv_from(&mut self, buf: &mut [u8]) -> Result<(usize, IpEndpoint)> {
        let (len, from) = self.socket()?.recv_from(buf).await?;
        Ok((len, IpEndpoint::try_from(from)?))
    }

    fn local_endpoint(&self) -> Option<IpEndpoint> {
        self.local
    }

    fn join_multicast(&mut self, group: Ipv4Addr, interface: Ipv4Addr) -> Result<()> {
        self.socket()?.join_multicast_v4(group, interface)?;
        Ok(())
    }

    fn set_multicast_ttl(&mut self, ttl: u8) -> Result<()> {
        self.socket()?.set_multicast_ttl_v4(u32::from(ttl))?;
        Ok(())
    }

    fn close(&mut self) {
        self.socket = None;
        self.local = None;
    }
}

/// Factory producing [`TokioUdpTransport`]s.
///
/// Without explicit interfaces it reports the primary outbound IPv4 address:
/// the one the OS would route the KNXnet/IP multicast group through.
#[derive(Debug, Default, Clone, Copy)]
pub struct UdpTransportFactory;

impl TransportFactory for UdpTransportFactory {
    type Transport = TokioUdpTransport;

    fn create(&self, _local: Ipv4Addr) -> Result<TokioUdpTransport> {
        Ok(TokioUdpTransport::new())
    }

    fn local_addresses(&self) -> Result<Vec<Ipv4Addr>> {
        // Connecting a UDP socket sends nothing; it only resolves the route.
        let probe = std::net::UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?;
        probe.connect(SocketAddr::from(IpEndpoint::MULTICAST))?;
        match probe.local_addr()? {
            SocketAddr::V4(v4) if !v4.ip().is_unspecified() => Ok(vec![*v4.ip()]),
            _ => Err(KnxError::no_interfaces()),
        }
    }
}
