//! Network transport abstraction for KNXnet/IP communication.
//!
//! The connection state machine and the discovery agent depend on the
//! [`AsyncTransport`] trait rather than on sockets, so they can run against
//! tokio UDP sockets in production and against
//! [`MockTransport`](crate::net::mock_transport::MockTransport) in tests.
//!
//! ## Example
//!
//! ```rust,no_run
//! use knx_netip::connection::{Connection, ConnectionConfig};
//! use knx_netip::net::udp::TokioUdpTransport;
//! use knx_netip::protocol::cri::Cri;
//! use knx_netip::protocol::constants::TunnelLayer;
//!
//! # async fn demo() -> knx_netip::Result<()> {
//! // Production: real UDP socket
//! let mut tunnel = Connection::new(TokioUdpTransport::new(), ConnectionConfig::default());
//! tunnel.connect("192.168.1.10:3671".parse()?, Cri::tunnel(TunnelLayer::Link)).await?;
//! # Ok(())
//! # }
//! ```

use crate::error::Result;
use crate::net::IpEndpoint;
use std::net::Ipv4Addr;

/// Asynchronous datagram transport.
///
/// Implementations can be real network sockets, mock objects for testing, or
/// alternative transports. All methods are used from a single task; the
/// returned futures do not need to be `Send`.
///
/// # Examples
///
/// ## Implementing for a custom transport
///
/// ```rust,no_run
/// use knx_netip::net::transport::AsyncTransport;
/// use knx_netip::net::IpEndpoint;
/// use knx_netip::Result;
///
/// #[derive(Debug)]
/// struct Loopback {
///     last: Vec<u8>,
/// }
///
/// impl AsyncTransport for Loopback {
///     async fn bind(&mut self, local: IpEndpoint) -> Result<IpEndpoint> {
///         Ok(local)
///     }
///
///     async fn send_to(&mut self, data: &[u8], _addr: IpEndpoint) -> Result<()> {
///         self.last = data.to_vec();
///         Ok(())
///     }
///
///     async fn recv_from(&mut self, buf: &mut [u8]) -> Result<(usize, IpEndpoint)> {
///         let len = self.last.len().min(buf.len());
///         buf[..len].copy_from_slice(&self.last[..len]);
///         Ok((len, IpEndpoint::UNSPECIFIED))
///     }
///
///     fn local_endpoint(&self) -> Option<IpEndpoint> {
///         None
///     }
/// }
/// ```
#[allow(async_fn_in_trait, reason = "single-threaded engine, futures need not be Send")]
pub trait AsyncTransport {
    /// Bind the transport to a local endpoint.
    ///
    /// Port 0 selects any free port. Returns the endpoint actually bound.
    ///
    /// # Errors
    ///
    /// Returns a transport error if the address is in use or binding fails.
    async fn bind(&mut self, local: IpEndpoint) -> Result<IpEndpoint>;

    /// Send one datagram to `addr`.
    ///
    /// # Errors
    ///
    /// Returns a transport error if the transport is closed or the OS
    /// rejects the datagram.
    async fn send_to(&mut self, data: &[u8], addr: IpEndpoint) -> Result<()>;

    /// Wait for the next datagram.
    ///
    /// Returns the number of bytes written into `buf` and the sender.
    /// This future must be cancel safe: dropping it loses no datagram.
    ///
    /// # Errors
    ///
    /// Returns a transport error if receiving fails.
    async fn recv_from(&mut self, buf: &mut [u8]) -> Result<(usize, IpEndpoint)>;

    /// Endpoint the transport is bound to, if any.
    fn local_endpoint(&self) -> Option<IpEndpoint>;

    /// Join a multicast group on the given local interface.
    ///
    /// Default implementation does nothing.
    fn join_multicast(&mut self, _group: Ipv4Addr, _interface: Ipv4Addr) -> Result<()> {
        Ok(())
    }

    /// Set the TTL used for outgoing multicast datagrams.
    ///
    /// Default implementation does nothing.
    fn set_multicast_ttl(&mut self, _ttl: u8) -> Result<()> {
        Ok(())
    }

    /// Check if the transport is bound and usable.
    fn is_ready(&self) -> bool {
        self.local_endpoint().is_some()
    }

    /// Close the transport and release resources.
    fn close(&mut self) {}
}

/// Creates one transport per local interface.
///
/// The discovery agent runs one search task per interface and asks the
/// factory for a fresh transport for each of them.
pub trait TransportFactory {
    /// Transport type produced by this factory
    type Transport: AsyncTransport;

    /// Create an unbound transport for the interface with address `local`.
    fn create(&self, local: Ipv4Addr) -> Result<Self::Transport>;

    /// Local IPv4 addresses to search on when none are configured.
    fn local_addresses(&self) -> Result<Vec<Ipv4Addr>>;
}
