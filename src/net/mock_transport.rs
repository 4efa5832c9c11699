//! Mock transport implementation for testing.
//!
//! [`MockTransport`] replays scripted datagrams and records everything that is
//! sent. When the script runs dry, `recv_from()` pends forever so the caller's
//! timeouts fire (use `#[tokio::test(start_paused = true)]` to make that
//! instantaneous). A responder closure can generate replies from the frames
//! the engine sends, which is how tests model a server.
//!
//! ## Example
//!
//! ```rust
//! use knx_netip::net::mock_transport::MockTransport;
//! use knx_netip::net::transport::AsyncTransport;
//! use knx_netip::net::IpEndpoint;
//!
//! # tokio_test_block_on(async {
//! let mut mock = MockTransport::new();
//! mock.add_response(vec![0x06, 0x10, 0x02, 0x0A, 0x00, 0x08, 0x01, 0x00]);
//!
//! let gateway: IpEndpoint = "192.168.1.10:3671".parse().unwrap();
//! mock.send_to(&[0xAA], gateway).await.unwrap();
//! assert_eq!(mock.sent_packets().len(), 1);
//!
//! let mut buf = [0u8; 64];
//! let (n, _) = mock.recv_from(&mut buf).await.unwrap();
//! assert_eq!(n, 8);
//! # });
//! # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! ```

use crate::error::{KnxError, Result};
use crate::net::transport::{AsyncTransport, TransportFactory};
use crate::net::IpEndpoint;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex};

/// Reply generator: sees each sent datagram, returns datagrams to enqueue.
pub type Responder = Box<dyn FnMut(&[u8], IpEndpoint) -> Vec<Vec<u8>> + Send>;

/// Datagrams recorded by a [`MockTransport`], shareable with the test.
pub type SentLog = Arc<Mutex<Vec<(Vec<u8>, IpEndpoint)>>>;

/// Default endpoint scripted responses come from.
const DEFAULT_PEER: IpEndpoint = IpEndpoint::new(Ipv4Addr::new(192, 168, 1, 10), 3671);

/// Mock transport for testing KNX communication without a real network.
///
/// This mock transport allows you to:
/// - Pre-program responses that will be returned by `recv_from()`
/// - Generate responses from sent frames with a responder
/// - Inspect packets sent via `send_to()`
/// - Inject send and receive failures
pub struct MockTransport {
    responses: VecDeque<(Vec<u8>, IpEndpoint)>,
    sent: SentLog,
    responder: Option<Responder>,
    peer: IpEndpoint,
    bound: Option<IpEndpoint>,
    joined: Vec<Ipv4Addr>,
    ttl: Option<u8>,
    fail_send: bool,
    fail_recv: bool,
    fail_bind: bool,
}

impl MockTransport {
    /// Create a new, unbound mock transport.
    pub fn new() -> Self {
        Self {
            responses: VecDeque::new(),
            sent: Arc::default(),
            responder: None,
            peer: DEFAULT_PEER,
            bound: None,
            joined: Vec::new(),
            ttl: None,
            fail_send: false,
            fail_recv: false,
            fail_bind: false,
        }
    }

    /// Queue a response coming from the default peer `192.168.1.10:3671`.
    pub fn add_response(&mut self, data: Vec<u8>) {
        let peer = self.peer;
        self.add_response_from(data, peer);
    }

    /// Queue a response with a specific source endpoint.
    pub fn add_response_from(&mut self, data: Vec<u8>, from: IpEndpoint) {
        self.responses.push_back((data, from));
    }

    /// Install a reply generator, called on every `send_to()`.
    ///
    /// Replies are queued as if sent by the destination of the datagram.
    pub fn set_responder<F>(&mut self, responder: F)
    where
        F: FnMut(&[u8], IpEndpoint) -> Vec<Vec<u8>> + Send + 'static,
    {
        self.responder = Some(Box::new(responder));
    }

    /// Remove the reply generator.
    pub fn clear_responder(&mut self) {
        self.responder = None;
    }

    /// Record sent packets into a log shared with the caller.
    pub fn with_sent_log(mut self, log: SentLog) -> Self {
        self.sent = log;
        self
    }

    /// Copy of all packets sent so far, as `(data, destination)`.
    pub fn sent_packets(&self) -> Vec<(Vec<u8>, IpEndpoint)> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }

    /// Last packet sent, if any.
    pub fn last_sent(&self) -> Option<(Vec<u8>, IpEndpoint)> {
        self.sent.lock().ok().and_then(|sent| sent.last().cloned())
    }

    /// Forget the send history.
    pub fn clear_sent(&mut self) {
        if let Ok(mut sent) = self.sent.lock() {
            sent.clear();
        }
    }

    /// Number of scripted responses not yet received.
    pub fn pending_responses(&self) -> usize {
        self.responses.len()
    }

    /// Multicast groups joined through `join_multicast()`.
    pub fn joined_groups(&self) -> &[Ipv4Addr] {
        &self.joined
    }

    /// TTL set through `set_multicast_ttl()`.
    pub fn multicast_ttl(&self) -> Option<u8> {
        self.ttl
    }

    /// Make the next `send_to()` fail.
    pub fn fail_next_send(&mut self) {
        self.fail_send = true;
    }

    /// Make the next `recv_from()` fail.
    pub fn fail_next_recv(&mut self) {
        self.fail_recv = true;
    }

    /// Make `bind()` fail.
    pub fn fail_bind(&mut self) {
        self.fail_bind = true;
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockTransport")
            .field("pending_responses", &self.responses.len())
            .field("has_responder", &self.responder.is_some())
            .field("bound", &self.bound)
            .finish_non_exhaustive()
    }
}

impl AsyncTransport for MockTransport {
    async fn bind(&mut self, local: IpEndpoint) -> Result<IpEndpoint> {
        if self.fail_bind {
            return Err(KnxError::from(std::io::Error::from(
                std::io::ErrorKind::AddrInUse,
            )));
        }
        let port = if local.port == 0 { 50_000 } else { local.port };
        let bound = IpEndpoint::new(local.address, port);
        self.bound = Some(bound);
        Ok(bound)
    }

    async fn send_to(&mut self, data: &[u8], addr: IpEndpoint) -> Result<()> {
        if core::mem::take(&mut self.fail_send) {
            return Err(KnxError::send_failed());
        }
        if let Ok(mut sent) = self.sent.lock() {
            sent.push((data.to_vec(), addr));
        }
        if let Some(responder) = self.responder.as_mut() {
            for reply in responder(data, addr) {
                // Multicast searches are answered from the server's unicast address.
                let from = if addr.address.is_multicast() { self.peer } else { addr };
                self.responses.push_back((reply, from));
            }
        }
        Ok(())
    }

    async fn recv_from(&mut self, buf: &mut [u8]) -> Result<(usize, IpEndpoint)> {
        if core::mem::take(&mut self.fail_recv) {
            return Err(KnxError::receive_failed());
        }
        match self.responses.pop_front() {
            Some((data, from)) => {
                let len = data.len().min(buf.len());
                buf[..len].copy_from_slice(&data[..len]);
                Ok((len, from))
            }
            None => core::future::pending().await,
        }
    }

    fn local_endpoint(&self) -> Option<IpEndpoint> {
        self.bound
    }

    fn join_multicast(&mut self, group: Ipv4Addr, _interface: Ipv4Addr) -> Result<()> {
        self.joined.push(group);
        Ok(())
    }

    fn set_multicast_ttl(&mut self, ttl: u8) -> Result<()> {
        self.ttl = Some(ttl);
        Ok(())
    }

    fn close(&mut self) {
        self.bound = None;
        self.responses.clear();
    }
}

/// Scripted per-interface mocks for the discovery agent.
///
/// Each interface address gets its own responder; interfaces without one get
/// a silent mock. Interfaces marked broken fail to bind.
#[derive(Default)]
pub struct MockTransportFactory {
    addresses: Vec<Ipv4Addr>,
    responders: Mutex<HashMap<Ipv4Addr, Responder>>,
    broken: Vec<Ipv4Addr>,
    sent: SentLog,
}

impl MockTransportFactory {
    /// Factory reporting `addresses` as the local interfaces.
    pub fn new(addresses: Vec<Ipv4Addr>) -> Self {
        Self {
            addresses,
            ..Self::default()
        }
    }

    /// Script the server replies seen on `interface`.
    pub fn set_responder<F>(&mut self, interface: Ipv4Addr, responder: F)
    where
        F: FnMut(&[u8], IpEndpoint) -> Vec<Vec<u8>> + Send + 'static,
    {
        if let Ok(mut responders) = self.responders.lock() {
            responders.insert(interface, Box::new(responder));
        }
    }

    /// Make transports created for `interface` fail to bind.
    pub fn break_interface(&mut self, interface: Ipv4Addr) {
        self.broken.push(interface);
    }

    /// All datagrams sent by every transport this factory created.
    pub fn sent_packets(&self) -> Vec<(Vec<u8>, IpEndpoint)> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }
}

impl fmt::Debug for MockTransportFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockTransportFactory")
            .field("addresses", &self.addresses)
            .field("broken", &self.broken)
            .finish_non_exhaustive()
    }
}

impl TransportFactory for MockTransportFactory {
    type Transport = MockTransport;

    fn create(&self, local: Ipv4Addr) -> Result<MockTransport> {
        let mut mock = MockTransport::new().with_sent_log(Arc::clone(&self.sent));
        if self.broken.contains(&local) {
            mock.fail_bind();
        }
        if let Some(responder) = self
            .responders
            .lock()
            .ok()
            .and_then(|mut responders| responders.remove(&local))
        {
            mock.responder = Some(responder);
        }
        Ok(mock)
    }

    fn local_addresses(&self) -> Result<Vec<Ipv4Addr>> {
        Ok(self.addresses.clone())
    }
}
