//! Multi-interface KNXnet/IP server discovery.
//!
//! [`DiscoveryAgent::start`] runs one search task per local interface, all of
//! them inside the calling task. Each task binds its own transport, sends the
//! configured search requests (normal, extended or both) to the system setup
//! multicast group and collects search responses until the run times out or
//! the agent is stopped. Every server is reported once, keyed by its control
//! endpoint, no matter how many interfaces or search modes reached it.
//!
//! A failing interface is reported through [`DiscoveryEvent::ErrorOccurred`]
//! and does not disturb the others.
//!
//! ## Example
//!
//! ```rust,no_run
//! use knx_netip::discovery::{DiscoveryAgent, DiscoveryConfig};
//! use knx_netip::net::udp::UdpTransportFactory;
//!
//! # async fn demo() -> knx_netip::Result<()> {
//! let mut agent = DiscoveryAgent::new(UdpTransportFactory, DiscoveryConfig::default());
//! for server in agent.start().await? {
//!     println!("{server}");
//! }
//! # Ok(())
//! # }
//! ```

use crate::error::{KnxError, Result, TimeoutKind};
use crate::net::transport::{AsyncTransport, TransportFactory};
use crate::net::IpEndpoint;
use crate::protocol::constants::{DEFAULT_MULTICAST_TTL, KNXNETIP_MULTICAST_ADDR, MAX_FRAME_SIZE};
use crate::protocol::description::{DescriptionRequest, DescriptionResponse};
use crate::protocol::frame::Frame;
use crate::protocol::hpai::Hpai;
use crate::protocol::search::{SearchRequest, SearchResponse};
use crate::protocol::server_info::ServerInfo;
use crate::protocol::srp::Srp;
use core::cell::RefCell;
use core::fmt;
use core::time::Duration;
use futures::future::join_all;
use std::net::{IpAddr, Ipv4Addr};
use tokio::sync::mpsc;
use tokio::time::{timeout_at, Instant};
use tokio_util::sync::CancellationToken;

// =============================================================================
// Configuration
// =============================================================================

/// Where servers send their search responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ResponseType {
    /// To the bound local endpoint
    Unicast,
    /// To the system setup multicast group
    #[default]
    Multicast,
}

/// Search request flavours sent on every search round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DiscoveryModes {
    /// Normal `SEARCH_REQUEST`
    pub core_v1: bool,
    /// Extended `SEARCH_REQUEST_EXT`
    pub core_v2: bool,
}

impl DiscoveryModes {
    /// Normal search only
    pub const CORE_V1: Self = Self { core_v1: true, core_v2: false };
    /// Extended search only
    pub const CORE_V2: Self = Self { core_v1: false, core_v2: true };
    /// Both searches
    pub const ALL: Self = Self { core_v1: true, core_v2: true };

    /// No search selected
    pub const fn is_empty(&self) -> bool {
        !self.core_v1 && !self.core_v2
    }
}

impl Default for DiscoveryModes {
    fn default() -> Self {
        Self::ALL
    }
}

/// Settings of a discovery run.
///
/// # Examples
///
/// ```
/// use core::time::Duration;
/// use knx_netip::discovery::{DiscoveryConfig, DiscoveryModes, ResponseType};
///
/// let config = DiscoveryConfig::default()
///     .with_response_type(ResponseType::Unicast)
///     .with_modes(DiscoveryModes::CORE_V2)
///     .with_timeout(Some(Duration::from_secs(5)));
/// assert!(config.validate().is_ok());
/// assert!(config.with_modes(DiscoveryModes { core_v1: false, core_v2: false }).validate().is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DiscoveryConfig {
    /// Unicast or multicast responses
    pub response_type: ResponseType,
    /// Search flavours
    pub modes: DiscoveryModes,
    /// Length of a run, `None` runs until stopped
    pub timeout: Option<Duration>,
    /// Searches per minute, 0 for a single search
    pub search_frequency: u8,
    /// TTL of outgoing multicast datagrams
    pub multicast_ttl: u8,
    /// Ask for responses to the datagram source (`0.0.0.0:0` HPAI)
    pub nat: bool,
    /// Local port, 0 for any
    pub local_port: u16,
    /// Interfaces to search on, empty for every interface the factory reports
    pub local_addresses: Vec<Ipv4Addr>,
    /// Parameter blocks of extended searches
    #[cfg_attr(feature = "serde", serde(skip))]
    pub search_parameters: Vec<Srp>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            response_type: ResponseType::Multicast,
            modes: DiscoveryModes::ALL,
            timeout: Some(Duration::from_millis(3000)),
            search_frequency: 0,
            multicast_ttl: DEFAULT_MULTICAST_TTL,
            nat: false,
            local_port: 0,
            local_addresses: Vec::new(),
            search_parameters: Vec::new(),
        }
    }
}

impl DiscoveryConfig {
    /// Set the response type
    #[must_use]
    pub fn with_response_type(mut self, response_type: ResponseType) -> Self {
        self.response_type = response_type;
        self
    }

    /// Set the search flavours
    #[must_use]
    pub fn with_modes(mut self, modes: DiscoveryModes) -> Self {
        self.modes = modes;
        self
    }

    /// Set the run length, `None` for infinite
    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the number of searches per minute
    #[must_use]
    pub fn with_search_frequency(mut self, per_minute: u8) -> Self {
        self.search_frequency = per_minute;
        self
    }

    /// Set the multicast TTL
    #[must_use]
    pub fn with_multicast_ttl(mut self, ttl: u8) -> Self {
        self.multicast_ttl = ttl;
        self
    }

    /// Enable or disable NAT mode
    #[must_use]
    pub fn with_nat(mut self, nat: bool) -> Self {
        self.nat = nat;
        self
    }

    /// Set the local port
    #[must_use]
    pub fn with_local_port(mut self, port: u16) -> Self {
        self.local_port = port;
        self
    }

    /// Set the extended search parameters
    #[must_use]
    pub fn with_search_parameters(mut self, parameters: Vec<Srp>) -> Self {
        self.search_parameters = parameters;
        self
    }

    /// Add an interface to search on.
    ///
    /// # Errors
    ///
    /// Returns `NotIpv4` for an IPv6 address.
    pub fn with_local_address(mut self, address: IpAddr) -> Result<Self> {
        match address {
            IpAddr::V4(v4) => {
                self.local_addresses.push(v4);
                Ok(self)
            }
            IpAddr::V6(_) => Err(KnxError::not_ipv4()),
        }
    }

    /// Interval between two searches of a run
    pub fn search_interval(&self) -> Option<Duration> {
        (self.search_frequency > 0).then(|| Duration::from_millis(60_000 / u64::from(self.search_frequency)))
    }

    /// Check the settings.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` for a zero timeout, an empty mode set,
    /// or an unspecified or multicast interface address.
    pub fn validate(&self) -> Result<()> {
        let bad_address = self.local_addresses.iter().any(|a| a.is_unspecified() || a.is_multicast());
        if self.timeout.is_some_and(|t| t.is_zero()) || self.modes.is_empty() || bad_address {
            return Err(KnxError::invalid_discovery_configuration());
        }
        Ok(())
    }
}

// =============================================================================
// State and Events
// =============================================================================

/// Discovery agent state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DiscoveryState {
    /// Idle
    #[default]
    NotRunning,
    /// Resolving interfaces
    Starting,
    /// Searching
    Running,
    /// Tearing the interface tasks down
    Stopping,
}

impl fmt::Display for DiscoveryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DiscoveryState::NotRunning => "not running",
            DiscoveryState::Starting => "starting",
            DiscoveryState::Running => "running",
            DiscoveryState::Stopping => "stopping",
        };
        f.write_str(name)
    }
}

/// Cause reported with [`DiscoveryEvent::ErrorOccurred`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DiscoveryErrorCode {
    /// Socket failure on one interface
    Network,
    /// The interface could not be set up for the configured response type
    Interface,
}

/// Notification sent to every subscriber
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryEvent {
    /// The agent entered a new state
    StateChanged(DiscoveryState),
    /// Searching began on every interface
    Started,
    /// A server answered for the first time this run
    DeviceDiscovered(ServerInfo),
    /// One interface failed; the message names it
    ErrorOccurred(DiscoveryErrorCode, String),
    /// Every interface task has ended
    Finished,
}

type Subscribers = Vec<mpsc::UnboundedSender<DiscoveryEvent>>;

fn emit(subscribers: &mut Subscribers, event: DiscoveryEvent) {
    subscribers.retain(|tx| tx.send(event.clone()).is_ok());
}

/// Servers found so far, shared by the interface tasks of one run
struct Collector<'a> {
    servers: &'a mut Vec<ServerInfo>,
    subscribers: &'a mut Subscribers,
}

impl Collector<'_> {
    fn discovered(&mut self, info: ServerInfo) {
        if self.servers.iter().any(|known| known.control_endpoint() == info.control_endpoint()) {
            return;
        }
        crate::knx_log!(info, "Discovered {}", info);
        self.servers.push(info.clone());
        emit(self.subscribers, DiscoveryEvent::DeviceDiscovered(info));
    }
}

// =============================================================================
// Agent
// =============================================================================

/// Searches for KNXnet/IP servers on every configured interface.
#[derive(Debug)]
pub struct DiscoveryAgent<F: TransportFactory> {
    factory: F,
    config: DiscoveryConfig,
    state: DiscoveryState,
    servers: Vec<ServerInfo>,
    stop: CancellationToken,
    subscribers: Subscribers,
}

impl<F: TransportFactory> DiscoveryAgent<F> {
    /// Create an idle agent creating its transports through `factory`
    pub fn new(factory: F, config: DiscoveryConfig) -> Self {
        Self {
            factory,
            config,
            state: DiscoveryState::NotRunning,
            servers: Vec::new(),
            stop: CancellationToken::new(),
            subscribers: Vec::new(),
        }
    }

    /// Receive every future event. Dropping the receiver unsubscribes.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<DiscoveryEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    /// Current state
    pub fn state(&self) -> DiscoveryState {
        self.state
    }

    /// Configuration
    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    /// Replace the configuration; takes effect on the next run
    pub fn set_config(&mut self, config: DiscoveryConfig) {
        self.config = config;
    }

    /// Servers found by the last run
    pub fn discovered(&self) -> &[ServerInfo] {
        &self.servers
    }

    /// Handle ending the next (or current) run when cancelled.
    ///
    /// A handle outlives one run only: once cancelled, the next
    /// [`start`](Self::start) replaces it.
    pub fn stop_handle(&self) -> CancellationToken {
        self.stop.clone()
    }

    /// End the current run
    pub fn stop(&self) {
        self.stop.cancel();
    }

    /// Run one discovery and return the servers found.
    ///
    /// Returns when the configured timeout elapses or the stop handle is
    /// cancelled. Interface failures are reported as events; the run fails
    /// only if no interface could search at all.
    ///
    /// # Errors
    ///
    /// - `InvalidConfiguration` for an invalid [`DiscoveryConfig`]
    /// - `NoInterfaces` when there is nothing to search on
    /// - the error of the first interface when every interface failed
    pub async fn start(&mut self) -> Result<Vec<ServerInfo>> {
        self.config.validate()?;
        if self.state != DiscoveryState::NotRunning {
            crate::knx_log!(debug, "Previous run was abandoned while {}", self.state);
            self.state = DiscoveryState::NotRunning;
        }
        if self.stop.is_cancelled() {
            self.stop = CancellationToken::new();
        }
        self.servers.clear();
        self.set_state(DiscoveryState::Starting);

        let interfaces = if self.config.local_addresses.is_empty() {
            self.factory.local_addresses()
        } else {
            Ok(self.config.local_addresses.clone())
        };
        let interfaces = match interfaces {
            Ok(interfaces) if !interfaces.is_empty() => interfaces,
            Ok(_) => return self.abandon(KnxError::no_interfaces()),
            Err(err) => return self.abandon(err),
        };

        self.set_state(DiscoveryState::Running);
        emit(&mut self.subscribers, DiscoveryEvent::Started);
        crate::knx_log!(debug, "Searching on {} interface(s)", interfaces.len());

        let outcomes = {
            let collector = RefCell::new(Collector { servers: &mut self.servers, subscribers: &mut self.subscribers });
            let collector = &collector;
            let factory = &self.factory;
            let config = &self.config;
            let stop = &self.stop;
            let tasks = interfaces.iter().map(|&interface| async move {
                let outcome = match factory.create(interface) {
                    Ok(transport) => search_interface(transport, interface, config, stop, collector).await,
                    Err(err) => Err(err),
                };
                (interface, outcome)
            });
            join_all(tasks).await
        };

        let mut first_error = None;
        let mut failures = 0;
        for (interface, outcome) in outcomes {
            if let Err(err) = outcome {
                crate::knx_log!(warn, "Discovery on {} failed: {}", interface, err);
                let code = if err.is_network() { DiscoveryErrorCode::Network } else { DiscoveryErrorCode::Interface };
                emit(&mut self.subscribers, DiscoveryEvent::ErrorOccurred(code, format!("{interface}: {err}")));
                failures += 1;
                first_error.get_or_insert(err);
            }
        }

        self.set_state(DiscoveryState::Stopping);
        self.set_state(DiscoveryState::NotRunning);
        emit(&mut self.subscribers, DiscoveryEvent::Finished);
        crate::knx_log!(info, "Discovery finished, {} server(s)", self.servers.len());

        match first_error {
            Some(err) if failures == interfaces.len() => Err(err),
            _ => Ok(self.servers.clone()),
        }
    }

    fn abandon<T>(&mut self, err: KnxError) -> Result<T> {
        self.set_state(DiscoveryState::NotRunning);
        emit(&mut self.subscribers, DiscoveryEvent::Finished);
        Err(err)
    }

    fn set_state(&mut self, state: DiscoveryState) {
        if self.state != state {
            crate::knx_log!(debug, "Discovery state {} -> {}", self.state, state);
            self.state = state;
            emit(&mut self.subscribers, DiscoveryEvent::StateChanged(state));
        }
    }
}

/// Search on one interface until the run ends
async fn search_interface<T: AsyncTransport>(
    mut transport: T,
    interface: Ipv4Addr,
    config: &DiscoveryConfig,
    stop: &CancellationToken,
    collector: &RefCell<Collector<'_>>,
) -> Result<()> {
    let local = transport.bind(IpEndpoint::new(interface, config.local_port)).await?;
    let response_endpoint = match config.response_type {
        ResponseType::Unicast => local,
        ResponseType::Multicast => {
            transport.join_multicast(KNXNETIP_MULTICAST_ADDR, interface)?;
            transport.set_multicast_ttl(config.multicast_ttl)?;
            IpEndpoint::MULTICAST
        }
    };
    let hpai = if config.nat { Hpai::route_back() } else { Hpai::udp(response_endpoint) };

    let mut requests = Vec::new();
    if config.modes.core_v1 {
        requests.push(SearchRequest::new(hpai.clone()).build()?);
    }
    if config.modes.core_v2 {
        requests.push(SearchRequest::extended(hpai, config.search_parameters.clone()).build()?);
    }

    let deadline = config.timeout.map(|timeout| Instant::now() + timeout);
    let interval = config.search_interval();
    let mut next_search = Some(Instant::now());
    let mut buf = [0u8; MAX_FRAME_SIZE];

    loop {
        if let Some(due) = next_search.filter(|due| *due <= Instant::now()) {
            for request in &requests {
                crate::knx_log!(debug, "Search from {} ({:?})", local, request.service_type());
                transport.send_to(request.bytes(), IpEndpoint::MULTICAST).await?;
            }
            next_search = interval.map(|interval| due + interval);
        }

        let wake = [deadline, next_search].into_iter().flatten().min();
        let received = tokio::select! {
            () = stop.cancelled() => break,
            received = recv_until(&mut transport, &mut buf, wake) => received,
        };
        match received {
            Some(Ok((len, from))) => on_datagram(&buf[..len], from, collector),
            Some(Err(err)) => {
                transport.close();
                return Err(err);
            }
            None if deadline.is_some_and(|d| Instant::now() >= d) => break,
            None => {}
        }
    }

    transport.close();
    Ok(())
}

/// Next datagram, or `None` once `wake` passes
async fn recv_until<T: AsyncTransport>(
    transport: &mut T,
    buf: &mut [u8],
    wake: Option<Instant>,
) -> Option<Result<(usize, IpEndpoint)>> {
    match wake {
        Some(wake) => timeout_at(wake, transport.recv_from(buf)).await.ok(),
        None => Some(transport.recv_from(buf).await),
    }
}

fn on_datagram(data: &[u8], from: IpEndpoint, collector: &RefCell<Collector<'_>>) {
    let Ok(frame) = Frame::from_datagram(data) else {
        crate::knx_log!(warn, "Dropping malformed datagram from {}", from);
        return;
    };
    let Ok(response) = SearchResponse::parse(&frame) else {
        crate::knx_log!(trace, "Ignoring {:?} from {}", frame.service_type(), from);
        return;
    };
    let Some(mut info) = ServerInfo::from_search_response(&response) else {
        crate::knx_log!(warn, "Dropping invalid search response from {}", from);
        return;
    };
    if info.endpoint().map_or(true, |endpoint| endpoint.address.is_unspecified()) {
        info = info.with_control_endpoint(from);
    }
    collector.borrow_mut().discovered(info);
}

// =============================================================================
// Description
// =============================================================================

/// Ask the server at `server` for its self description.
///
/// Binds `transport` on any local endpoint if it is not bound yet and leaves
/// it bound afterwards.
///
/// # Errors
///
/// Returns `Timeout(Discovery)` when no valid description response arrives
/// within `timeout`, or the transport error.
pub async fn describe<T: AsyncTransport>(transport: &mut T, server: IpEndpoint, timeout: Duration) -> Result<ServerInfo> {
    let local = match transport.local_endpoint() {
        Some(local) => local,
        None => transport.bind(IpEndpoint::UNSPECIFIED).await?,
    };
    let hpai = if local.address.is_unspecified() { Hpai::route_back() } else { Hpai::udp(local) };
    let request = DescriptionRequest::new(hpai).build()?;
    transport.send_to(request.bytes(), server).await?;

    let deadline = Instant::now() + timeout;
    let mut buf = [0u8; MAX_FRAME_SIZE];
    while let Some(received) = recv_until(transport, &mut buf, Some(deadline)).await {
        let (len, from) = received?;
        let info = Frame::from_datagram(&buf[..len])
            .ok()
            .and_then(|frame| DescriptionResponse::parse(&frame).ok())
            .and_then(|response| ServerInfo::from_description_response(Hpai::udp(server), &response));
        match info {
            Some(info) => return Ok(info),
            None => crate::knx_log!(warn, "Ignoring datagram from {} while waiting for a description", from),
        }
    }
    Err(KnxError::timeout(TimeoutKind::Discovery))
}
