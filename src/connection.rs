//! Client side of one KNXnet/IP connection.
//!
//! A [`Connection`] owns its transport and walks through
//! `Disconnected -> Connecting -> Connected -> Disconnecting -> Disconnected`.
//! While connected it keeps the channel alive with connection-state probes,
//! numbers outgoing data requests and acknowledges incoming ones.
//!
//! Everything runs on the caller's task. Requests that expect an answer
//! ([`connect`](Connection::connect), [`send`](Connection::send),
//! [`disconnect`](Connection::disconnect)) wait for it in place and handle any
//! other frame that shows up meanwhile. Between requests, drive the
//! connection with [`process`](Connection::process) or
//! [`run`](Connection::run), which also fire the heartbeat.
//!
//! ## Example
//!
//! ```rust,no_run
//! use knx_netip::connection::{Connection, ConnectionConfig, ConnectionEvent};
//! use knx_netip::net::udp::TokioUdpTransport;
//!
//! # async fn demo() -> knx_netip::Result<()> {
//! let mut tunnel = Connection::new(TokioUdpTransport::new(), ConnectionConfig::default());
//! let mut events = tunnel.subscribe();
//!
//! tunnel.connect_tunnel("192.168.1.10:3671".parse()?).await?;
//! tunnel.send(&[0x11, 0x00, 0xBC, 0xE0, 0x00, 0x00, 0x08, 0x01, 0x01, 0x00, 0x81]).await?;
//!
//! loop {
//!     tunnel.process().await?;
//!     while let Ok(event) = events.try_recv() {
//!         if let ConnectionEvent::FrameReceived(cemi) = event {
//!             println!("cEMI {cemi:02x?}");
//!         }
//!     }
//! }
//! # }
//! ```

use crate::addressing::IndividualAddress;
use crate::error::{KnxError, Result, TimeoutKind};
use crate::net::transport::AsyncTransport;
use crate::net::IpEndpoint;
use crate::protocol::constants::{ConnectionType, ServiceType, Status, TunnelLayer, MAX_FRAME_SIZE};
use crate::protocol::cri::Cri;
use crate::protocol::frame::Frame;
use crate::protocol::hpai::Hpai;
use crate::protocol::management::ManagementFrame;
use crate::protocol::services::{
    ConnectRequest, ConnectResponse, ConnectionHeader, ConnectionStateRequest, ConnectionStateResponse, DataAck,
    DataRequest, DataService, DisconnectRequest, DisconnectResponse,
};
use bytes::Bytes;
use core::fmt;
use core::ops::{Deref, DerefMut};
use core::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{timeout_at, Instant};

// =============================================================================
// Configuration
// =============================================================================

/// Timers and endpoint settings of a connection.
///
/// # Examples
///
/// ```
/// use core::time::Duration;
/// use knx_netip::connection::ConnectionConfig;
///
/// let config = ConnectionConfig::default()
///     .with_heartbeat_interval(Duration::from_secs(30))
///     .with_send_retries(2);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConnectionConfig {
    /// Wait for the connect response
    pub connect_timeout: Duration,
    /// Wait for the disconnect response
    pub disconnect_timeout: Duration,
    /// Time between connection-state probes
    pub heartbeat_interval: Duration,
    /// Wait for one connection-state response
    pub heartbeat_timeout: Duration,
    /// Probes sent before giving up on the server
    pub heartbeat_attempts: u8,
    /// Wait for a tunneling ack
    pub tunneling_ack_timeout: Duration,
    /// Wait for a device configuration ack
    pub device_management_ack_timeout: Duration,
    /// Repetitions of an unacknowledged data request
    pub send_retries: u8,
    /// Local endpoint to bind, port 0 for any
    pub local_endpoint: IpEndpoint,
    /// Advertise `0.0.0.0:0` so the server answers to the datagram source
    pub nat: bool,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            disconnect_timeout: Duration::from_secs(10),
            heartbeat_interval: Duration::from_secs(60),
            heartbeat_timeout: Duration::from_secs(10),
            heartbeat_attempts: 3,
            tunneling_ack_timeout: Duration::from_secs(1),
            device_management_ack_timeout: Duration::from_secs(10),
            send_retries: 1,
            local_endpoint: IpEndpoint::UNSPECIFIED,
            nat: false,
        }
    }
}

impl ConnectionConfig {
    /// Set the connect response timeout
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the disconnect response timeout
    #[must_use]
    pub const fn with_disconnect_timeout(mut self, timeout: Duration) -> Self {
        self.disconnect_timeout = timeout;
        self
    }

    /// Set the heartbeat interval
    #[must_use]
    pub const fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Set the timeout of one heartbeat probe
    #[must_use]
    pub const fn with_heartbeat_timeout(mut self, timeout: Duration) -> Self {
        self.heartbeat_timeout = timeout;
        self
    }

    /// Set the number of heartbeat probes
    #[must_use]
    pub const fn with_heartbeat_attempts(mut self, attempts: u8) -> Self {
        self.heartbeat_attempts = attempts;
        self
    }

    /// Set the tunneling ack timeout
    #[must_use]
    pub const fn with_tunneling_ack_timeout(mut self, timeout: Duration) -> Self {
        self.tunneling_ack_timeout = timeout;
        self
    }

    /// Set the device configuration ack timeout
    #[must_use]
    pub const fn with_device_management_ack_timeout(mut self, timeout: Duration) -> Self {
        self.device_management_ack_timeout = timeout;
        self
    }

    /// Set the number of repetitions of an unacknowledged request
    #[must_use]
    pub const fn with_send_retries(mut self, retries: u8) -> Self {
        self.send_retries = retries;
        self
    }

    /// Set the local endpoint
    #[must_use]
    pub const fn with_local_endpoint(mut self, endpoint: IpEndpoint) -> Self {
        self.local_endpoint = endpoint;
        self
    }

    /// Enable or disable NAT mode
    #[must_use]
    pub const fn with_nat(mut self, nat: bool) -> Self {
        self.nat = nat;
        self
    }

    /// Check the timers.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` for a zero timeout or interval, or
    /// zero heartbeat attempts.
    pub fn validate(&self) -> Result<()> {
        let timers = [
            self.connect_timeout,
            self.disconnect_timeout,
            self.heartbeat_interval,
            self.heartbeat_timeout,
            self.tunneling_ack_timeout,
            self.device_management_ack_timeout,
        ];
        if timers.iter().any(Duration::is_zero) || self.heartbeat_attempts == 0 {
            return Err(KnxError::invalid_configuration());
        }
        Ok(())
    }
}

// =============================================================================
// State and Events
// =============================================================================

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum State {
    /// No channel
    #[default]
    Disconnected,
    /// Connect request sent
    Connecting,
    /// Channel open
    Connected,
    /// Disconnect request sent
    Disconnecting,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            State::Disconnected => "disconnected",
            State::Connecting => "connecting",
            State::Connected => "connected",
            State::Disconnecting => "disconnecting",
        };
        f.write_str(name)
    }
}

/// Cause reported with [`ConnectionEvent::ErrorOccurred`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConnectionErrorCode {
    /// Socket level failure
    Network,
    /// Connect request refused or unanswered
    Connect,
    /// Data request unacknowledged or negatively acknowledged
    Acknowledge,
    /// Connection-state probes unanswered
    Heartbeat,
    /// Server reported the channel as gone
    Lost,
    /// Inbound data request skipped ahead of the receive counter
    Sequence,
    /// Disconnect request could not be sent
    Disconnect,
}

/// Notification sent to every subscriber
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// The connection entered a new state
    StateChanged(State),
    /// A data request arrived in sequence; payload is the cEMI frame
    FrameReceived(Bytes),
    /// Something went wrong; the message is human readable
    ErrorOccurred(ConnectionErrorCode, String),
}

// =============================================================================
// Connection
// =============================================================================

/// One tunneling or device management connection.
#[derive(Debug)]
pub struct Connection<T: AsyncTransport> {
    transport: T,
    config: ConnectionConfig,
    state: State,
    tunnel_layer: TunnelLayer,
    service: Option<DataService>,
    channel_id: u8,
    send_seq: u8,
    recv_seq: u8,
    control_hpai: Hpai,
    remote_control: Option<IpEndpoint>,
    remote_data: Option<IpEndpoint>,
    individual_address: Option<IndividualAddress>,
    next_heartbeat: Instant,
    subscribers: Vec<mpsc::UnboundedSender<ConnectionEvent>>,
}

impl<T: AsyncTransport> Connection<T> {
    /// Create a disconnected connection over `transport`
    pub fn new(transport: T, config: ConnectionConfig) -> Self {
        Self {
            transport,
            config,
            state: State::Disconnected,
            tunnel_layer: TunnelLayer::Link,
            service: None,
            channel_id: 0,
            send_seq: 0,
            recv_seq: 0,
            control_hpai: Hpai::route_back(),
            remote_control: None,
            remote_data: None,
            individual_address: None,
            next_heartbeat: Instant::now(),
            subscribers: Vec::new(),
        }
    }

    /// Receive every future event. Dropping the receiver unsubscribes.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<ConnectionEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    /// Current state
    pub fn state(&self) -> State {
        self.state
    }

    /// Channel open
    pub fn is_connected(&self) -> bool {
        self.state == State::Connected
    }

    /// Channel id assigned by the server
    pub fn channel_id(&self) -> Option<u8> {
        (self.state == State::Connected).then_some(self.channel_id)
    }

    /// Sequence number of the next outgoing data request
    pub fn send_sequence(&self) -> u8 {
        self.send_seq
    }

    /// Sequence number expected on the next incoming data request
    pub fn receive_sequence(&self) -> u8 {
        self.recv_seq
    }

    /// Individual address assigned to a tunnel connection
    pub fn individual_address(&self) -> Option<IndividualAddress> {
        self.individual_address
    }

    /// Negotiated connection type
    pub fn connection_type(&self) -> Option<ConnectionType> {
        match self.service? {
            DataService::Tunneling => Some(ConnectionType::Tunnel),
            DataService::DeviceConfiguration => Some(ConnectionType::DeviceManagement),
        }
    }

    /// Tunnel layer requested by [`connect_tunnel`](Self::connect_tunnel)
    pub fn tunnel_layer(&self) -> TunnelLayer {
        self.tunnel_layer
    }

    /// Change the tunnel layer.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyConnected` unless the connection is disconnected.
    pub fn set_tunnel_layer(&mut self, layer: TunnelLayer) -> Result<()> {
        if self.state != State::Disconnected {
            return Err(KnxError::already_connected());
        }
        self.tunnel_layer = layer;
        Ok(())
    }

    /// Server control endpoint
    pub fn remote_endpoint(&self) -> Option<IpEndpoint> {
        self.remote_control
    }

    /// Server data endpoint
    pub fn data_endpoint(&self) -> Option<IpEndpoint> {
        self.remote_data
    }

    /// Bound local endpoint
    pub fn local_endpoint(&self) -> Option<IpEndpoint> {
        self.transport.local_endpoint()
    }

    /// Configuration
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Replace the configuration; takes effect on the next connect
    pub fn set_config(&mut self, config: ConnectionConfig) {
        self.config = config;
    }

    /// Underlying transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Underlying transport, mutably
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    // -------------------------------------------------------------------------
    // Connect / disconnect
    // -------------------------------------------------------------------------

    /// Open a tunnel on the configured layer
    pub async fn connect_tunnel(&mut self, remote: IpEndpoint) -> Result<()> {
        self.connect(remote, Cri::tunnel(self.tunnel_layer)).await
    }

    /// Open a device management connection
    pub async fn connect_device_management(&mut self, remote: IpEndpoint) -> Result<()> {
        self.connect(remote, Cri::device_management()).await
    }

    /// Open a connection to the server control endpoint `remote`.
    ///
    /// # Errors
    ///
    /// - `AlreadyConnected` unless disconnected
    /// - `InvalidConfiguration` for bad timers, an invalid CRI, or a
    ///   connection type without data service
    /// - `Refused` if the server answers with an error status
    /// - `Timeout(Connect)` without answer
    ///
    /// Dropping the returned future before it completes leaves the
    /// connection `Disconnected` with the transport released.
    pub async fn connect(&mut self, remote: IpEndpoint, cri: Cri) -> Result<()> {
        if self.state != State::Disconnected {
            return Err(KnxError::already_connected());
        }
        self.config.validate()?;
        let service = DataService::for_connection(cri.connection_type())
            .filter(|_| cri.is_valid())
            .ok_or_else(KnxError::invalid_configuration)?;
        if let Some(layer) = cri.tunnel_layer() {
            self.tunnel_layer = layer;
        }

        let mut guard = TransitionGuard(self);
        let result = guard.establish(remote, cri, service).await;
        drop(guard);
        result
    }

    async fn establish(&mut self, remote: IpEndpoint, cri: Cri, service: DataService) -> Result<()> {
        let local = match self.transport.bind(self.config.local_endpoint).await {
            Ok(local) => local,
            Err(err) => return Err(self.fail(ConnectionErrorCode::Network, err)),
        };
        self.control_hpai = if self.config.nat || local.address.is_unspecified() {
            Hpai::route_back()
        } else {
            Hpai::udp(local)
        };
        self.remote_control = Some(remote);
        self.set_state(State::Connecting);

        let request = ConnectRequest::new(self.control_hpai.clone(), self.control_hpai.clone(), cri).build()?;
        crate::knx_log!(debug, "Connecting to {} from {}", remote, local);
        self.send_control(request.bytes()).await?;

        let deadline = Instant::now() + self.config.connect_timeout;
        let answer = self
            .wait_for(deadline, |frame, from| ConnectResponse::parse(frame).ok().map(|response| (response, from)))
            .await?;
        let Some((response, from)) = answer else {
            return Err(self.fail(ConnectionErrorCode::Connect, KnxError::timeout(TimeoutKind::Connect)));
        };

        if !response.is_ok() {
            crate::knx_log!(warn, "Connect refused with status {:#04x}", response.status);
            return Err(self.fail(ConnectionErrorCode::Connect, KnxError::connection_refused(response.status)));
        }
        let requested = match service {
            DataService::Tunneling => ConnectionType::Tunnel,
            DataService::DeviceConfiguration => ConnectionType::DeviceManagement,
        };
        if response.connection_type() != Some(requested) {
            let status = Status::ConnectionType.to_raw();
            return Err(self.fail(ConnectionErrorCode::Connect, KnxError::connection_refused(status)));
        }

        let data_endpoint = response
            .data_endpoint
            .as_ref()
            .and_then(Hpai::endpoint)
            .filter(|endpoint| !self.config.nat && !endpoint.is_unspecified())
            .unwrap_or(from);
        self.channel_id = response.channel_id;
        self.individual_address = response.crd.as_ref().and_then(|crd| crd.individual_address());
        self.remote_data = Some(data_endpoint);
        self.service = Some(service);
        self.send_seq = 0;
        self.recv_seq = 0;
        self.next_heartbeat = Instant::now() + self.config.heartbeat_interval;
        self.set_state(State::Connected);
        crate::knx_log!(info, "Connected to {} on channel {}", remote, self.channel_id);
        Ok(())
    }

    /// Close the connection.
    ///
    /// Waits for the disconnect response or its timeout, then releases the
    /// transport whatever happened, also when the returned future is
    /// dropped early. Disconnecting a closed connection is a no-op.
    pub async fn disconnect(&mut self) -> Result<()> {
        if self.state == State::Disconnected {
            return Ok(());
        }
        let channel = self.channel_id;
        self.set_state(State::Disconnecting);

        let mut guard = TransitionGuard(self);
        guard.close_channel(channel).await;
        drop(guard);
        crate::knx_log!(info, "Channel {} closed", channel);
        Ok(())
    }

    async fn close_channel(&mut self, channel: u8) {
        let deadline = Instant::now() + self.config.disconnect_timeout;
        if let Err(err) = self.send_disconnect_request().await {
            crate::knx_log!(warn, "Disconnect request not sent: {}", err);
            self.emit(ConnectionEvent::ErrorOccurred(ConnectionErrorCode::Disconnect, err.to_string()));
            return;
        }
        let answer = self
            .wait_for(deadline, |frame, _| {
                DisconnectResponse::parse(frame).ok().filter(|response| response.channel_id == channel)
            })
            .await;
        match answer {
            Ok(Some(_)) => crate::knx_log!(debug, "Disconnect acknowledged"),
            Ok(None) => crate::knx_log!(debug, "No disconnect response, closing anyway"),
            Err(err) => crate::knx_log!(warn, "Disconnect wait failed: {}", err),
        }
    }

    // -------------------------------------------------------------------------
    // Data exchange
    // -------------------------------------------------------------------------

    /// Send one cEMI frame and wait for its acknowledgement.
    ///
    /// An unacknowledged request is repeated with the same sequence number.
    /// The sequence number advances only on a positive ack.
    ///
    /// # Errors
    ///
    /// - `NotConnected` unless connected
    /// - `SendNotPermitted` on a busmonitor tunnel
    /// - `AckFailed` if the server acknowledged with an error status
    /// - `Timeout(Ack)` once the retries are exhausted; the connection is
    ///   then closed
    pub async fn send(&mut self, cemi: &[u8]) -> Result<()> {
        if self.state != State::Connected {
            return Err(KnxError::not_connected());
        }
        let service = self.service.ok_or_else(KnxError::not_connected)?;
        if service == DataService::Tunneling && self.tunnel_layer == TunnelLayer::Busmonitor {
            return Err(KnxError::send_not_permitted());
        }

        let channel = self.channel_id;
        let seq = self.send_seq;
        let header = ConnectionHeader::new(channel, seq);
        let request = DataRequest::new(service, header, Bytes::copy_from_slice(cemi)).build()?;
        let timeout = match service {
            DataService::Tunneling => self.config.tunneling_ack_timeout,
            DataService::DeviceConfiguration => self.config.device_management_ack_timeout,
        };
        let retries = self.config.send_retries;

        for attempt in 0..=retries {
            if attempt > 0 {
                crate::knx_log!(debug, "Repeating request {} ({}/{})", seq, attempt, retries);
            }
            crate::knx_log!(trace, "tx {:02x?}", &request.bytes()[..]);
            self.send_data(request.bytes()).await?;

            let deadline = Instant::now() + timeout;
            let ack = self
                .wait_for(deadline, |frame, _| {
                    DataAck::parse(frame).ok().filter(|ack| {
                        ack.service == service
                            && ack.connection_header.channel_id == channel
                            && ack.connection_header.sequence_counter == seq
                    })
                })
                .await?;

            match ack {
                Some(ack) if ack.is_ok() => {
                    self.send_seq = seq.wrapping_add(1);
                    return Ok(());
                }
                Some(ack) => {
                    let err = KnxError::ack_failed(ack.connection_header.status);
                    self.emit(ConnectionEvent::ErrorOccurred(ConnectionErrorCode::Acknowledge, err.to_string()));
                    return Err(err);
                }
                None => {}
            }
        }

        Err(self.abort(ConnectionErrorCode::Acknowledge, KnxError::timeout(TimeoutKind::Ack)).await)
    }

    /// Send a device management message.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` on a tunnel connection, otherwise the
    /// errors of [`send`](Self::send).
    pub async fn send_management(&mut self, message: &ManagementFrame) -> Result<()> {
        if self.state == State::Connected && self.service != Some(DataService::DeviceConfiguration) {
            return Err(KnxError::invalid_configuration());
        }
        self.send(message.bytes()).await
    }

    /// Handle the next incoming frame, or run the heartbeat when it is due.
    ///
    /// # Errors
    ///
    /// `NotConnected` unless connected; transport and heartbeat failures,
    /// which also close the connection.
    pub async fn process(&mut self) -> Result<()> {
        if self.state != State::Connected {
            return Err(KnxError::not_connected());
        }
        let mut buf = [0u8; MAX_FRAME_SIZE];
        let received = timeout_at(self.next_heartbeat, self.transport.recv_from(&mut buf)).await;
        match received {
            Err(_elapsed) => self.heartbeat().await,
            Ok(Err(err)) => Err(self.fail(ConnectionErrorCode::Network, err)),
            Ok(Ok((len, from))) => match decode(&buf[..len]) {
                Some(frame) => self.handle_inbound(&frame, from).await,
                None => Ok(()),
            },
        }
    }

    /// Call [`process`](Self::process) until the connection closes.
    pub async fn run(&mut self) -> Result<()> {
        while self.state == State::Connected {
            self.process().await?;
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    async fn heartbeat(&mut self) -> Result<()> {
        let channel = self.channel_id;
        let attempts = self.config.heartbeat_attempts;
        let request = ConnectionStateRequest::new(channel, self.control_hpai.clone()).build()?;

        for attempt in 1..=attempts {
            crate::knx_log!(debug, "Heartbeat attempt {}/{}", attempt, attempts);
            self.send_control(request.bytes()).await?;

            let deadline = Instant::now() + self.config.heartbeat_timeout;
            let answer = self
                .wait_for(deadline, |frame, _| {
                    ConnectionStateResponse::parse(frame).ok().filter(|response| response.channel_id == channel)
                })
                .await?;
            match answer {
                Some(response) if response.is_ok() => {
                    self.next_heartbeat = Instant::now() + self.config.heartbeat_interval;
                    return Ok(());
                }
                Some(response) => {
                    crate::knx_log!(warn, "Connection state status {:#04x}", response.status);
                    return Err(self.abort(ConnectionErrorCode::Lost, KnxError::connection_lost()).await);
                }
                None => {}
            }
        }

        Err(self.abort(ConnectionErrorCode::Heartbeat, KnxError::timeout(TimeoutKind::Heartbeat)).await)
    }

    /// Receive until `matcher` accepts a frame or `deadline` passes.
    ///
    /// Frames the matcher rejects go through the regular inbound handling.
    async fn wait_for<R>(
        &mut self,
        deadline: Instant,
        mut matcher: impl FnMut(&Frame, IpEndpoint) -> Option<R>,
    ) -> Result<Option<R>> {
        let mut buf = [0u8; MAX_FRAME_SIZE];
        loop {
            let received = timeout_at(deadline, self.transport.recv_from(&mut buf)).await;
            let (len, from) = match received {
                Err(_elapsed) => return Ok(None),
                Ok(Err(err)) => return Err(self.fail(ConnectionErrorCode::Network, err)),
                Ok(Ok(received)) => received,
            };
            let Some(frame) = decode(&buf[..len]) else {
                continue;
            };
            if let Some(matched) = matcher(&frame, from) {
                return Ok(Some(matched));
            }
            self.handle_inbound(&frame, from).await?;
            if self.state == State::Disconnected {
                return Err(KnxError::connection_lost());
            }
        }
    }

    async fn handle_inbound(&mut self, frame: &Frame, from: IpEndpoint) -> Result<()> {
        match frame.service_type() {
            ServiceType::TunnelingRequest | ServiceType::DeviceConfigurationRequest => self.on_data_request(frame).await,
            ServiceType::DisconnectRequest => self.on_disconnect_request(frame).await,
            other => {
                crate::knx_log!(debug, "Ignoring {:?} from {}", other, from);
                Ok(())
            }
        }
    }

    async fn on_data_request(&mut self, frame: &Frame) -> Result<()> {
        let Ok(request) = DataRequest::parse(frame) else {
            crate::knx_log!(warn, "Dropping malformed data request");
            return Ok(());
        };
        let header = request.connection_header;
        if self.state != State::Connected || Some(request.service) != self.service || header.channel_id != self.channel_id {
            crate::knx_log!(warn, "Dropping data request for channel {}", header.channel_id);
            return Ok(());
        }

        let ack = DataAck::new(request.service, self.channel_id, header.sequence_counter, Status::NoError.to_raw()).build()?;
        self.send_data(ack.bytes()).await?;

        if header.sequence_counter == self.recv_seq {
            self.recv_seq = self.recv_seq.wrapping_add(1);
            crate::knx_log!(trace, "rx {:02x?}", &request.cemi[..]);
            self.emit(ConnectionEvent::FrameReceived(request.cemi));
        } else if header.sequence_counter == self.recv_seq.wrapping_sub(1) {
            crate::knx_log!(debug, "Repeated request {}, acknowledged without delivery", header.sequence_counter);
        } else {
            crate::knx_log!(
                warn,
                "Sequence {} while expecting {}, acknowledged without delivery",
                header.sequence_counter,
                self.recv_seq
            );
            let err = KnxError::sequence_mismatch();
            self.emit(ConnectionEvent::ErrorOccurred(ConnectionErrorCode::Sequence, err.to_string()));
        }
        Ok(())
    }

    async fn on_disconnect_request(&mut self, frame: &Frame) -> Result<()> {
        let Ok(request) = DisconnectRequest::parse(frame) else {
            crate::knx_log!(warn, "Dropping malformed disconnect request");
            return Ok(());
        };
        if self.state == State::Disconnected || request.channel_id != self.channel_id {
            return Ok(());
        }

        let response = DisconnectResponse::new(self.channel_id, Status::NoError.to_raw()).build()?;
        if let Some(remote) = self.remote_control {
            if let Err(err) = self.transport.send_to(response.bytes(), remote).await {
                crate::knx_log!(warn, "Disconnect response not sent: {}", err);
            }
        }
        crate::knx_log!(info, "Server closed channel {}", self.channel_id);
        self.reset();
        Ok(())
    }

    async fn send_control(&mut self, data: &[u8]) -> Result<()> {
        let remote = self.remote_control.ok_or_else(KnxError::not_connected)?;
        match self.transport.send_to(data, remote).await {
            Ok(()) => Ok(()),
            Err(err) => Err(self.fail(ConnectionErrorCode::Network, err)),
        }
    }

    async fn send_data(&mut self, data: &[u8]) -> Result<()> {
        let remote = self.remote_data.ok_or_else(KnxError::not_connected)?;
        match self.transport.send_to(data, remote).await {
            Ok(()) => Ok(()),
            Err(err) => Err(self.fail(ConnectionErrorCode::Network, err)),
        }
    }

    async fn send_disconnect_request(&mut self) -> Result<()> {
        let remote = self.remote_control.ok_or_else(KnxError::not_connected)?;
        let request = DisconnectRequest::new(self.channel_id, self.control_hpai.clone()).build()?;
        self.transport.send_to(request.bytes(), remote).await
    }

    /// Best-effort disconnect request, then [`fail`](Self::fail).
    async fn abort(&mut self, code: ConnectionErrorCode, err: KnxError) -> KnxError {
        if let Err(send_err) = self.send_disconnect_request().await {
            crate::knx_log!(warn, "Disconnect request not sent: {}", send_err);
        }
        self.fail(code, err)
    }

    /// Report `err`, drop to `Disconnected` and hand `err` back.
    fn fail(&mut self, code: ConnectionErrorCode, err: KnxError) -> KnxError {
        crate::knx_log!(error, "Forcing disconnect: {}", err);
        self.emit(ConnectionEvent::ErrorOccurred(code, err.to_string()));
        self.reset();
        err
    }

    fn reset(&mut self) {
        self.transport.close();
        self.service = None;
        self.channel_id = 0;
        self.send_seq = 0;
        self.recv_seq = 0;
        self.remote_data = None;
        self.individual_address = None;
        self.set_state(State::Disconnected);
    }

    fn set_state(&mut self, state: State) {
        if self.state != state {
            crate::knx_log!(debug, "Connection state {} -> {}", self.state, state);
            self.state = state;
            self.emit(ConnectionEvent::StateChanged(state));
        }
    }

    fn emit(&mut self, event: ConnectionEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

/// Settles a connect or disconnect whose future was dropped midway.
struct TransitionGuard<'a, T: AsyncTransport>(&'a mut Connection<T>);

impl<T: AsyncTransport> Deref for TransitionGuard<'_, T> {
    type Target = Connection<T>;

    fn deref(&self) -> &Self::Target {
        self.0
    }
}

impl<T: AsyncTransport> DerefMut for TransitionGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.0
    }
}

impl<T: AsyncTransport> Drop for TransitionGuard<'_, T> {
    fn drop(&mut self) {
        if matches!(self.0.state, State::Connecting | State::Disconnecting) {
            crate::knx_log!(debug, "Leaving {} state", self.0.state);
            self.0.reset();
        }
    }
}

fn decode(datagram: &[u8]) -> Option<Frame> {
    match Frame::from_datagram(datagram) {
        Ok(frame) => Some(frame),
        Err(err) => {
            crate::knx_log!(warn, "Dropping malformed frame ({} bytes): {}", datagram.len(), err);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::mock_transport::MockTransport;
    use crate::protocol::constants::CemiServerError;
    use crate::protocol::cri::Crd;
    use crate::protocol::management::PropertyAddress;
    use std::net::Ipv4Addr;

    const GATEWAY: IpEndpoint = IpEndpoint::new(Ipv4Addr::new(192, 168, 1, 10), 3671);
    const CHANNEL: u8 = 0x15;
    const CEMI: [u8; 11] = [0x11, 0x00, 0xBC, 0xE0, 0x00, 0x00, 0x08, 0x01, 0x01, 0x00, 0x81];

    #[derive(Debug, Clone, Copy)]
    struct Script {
        refuse: Option<Status>,
        answer_heartbeat: bool,
        unacked_requests: usize,
    }

    impl Default for Script {
        fn default() -> Self {
            Self { refuse: None, answer_heartbeat: true, unacked_requests: 0 }
        }
    }

    fn reply(frame: Frame) -> Vec<Vec<u8>> {
        vec![frame.bytes().to_vec()]
    }

    fn server(script: Script) -> impl FnMut(&[u8], IpEndpoint) -> Vec<Vec<u8>> + Send + 'static {
        let mut ignored = 0;
        move |data, _to| {
            let Ok(frame) = Frame::from_datagram(data) else {
                return Vec::new();
            };
            match frame.service_type() {
                ServiceType::ConnectRequest => {
                    let request = ConnectRequest::parse(&frame).unwrap();
                    let response = match script.refuse {
                        Some(status) => ConnectResponse::refused(status),
                        None => {
                            let crd = match request.cri.connection_type() {
                                ConnectionType::Tunnel => Crd::tunnel(IndividualAddress::from(0x11FA)),
                                other => Crd::new(other),
                            };
                            ConnectResponse::accepted(CHANNEL, Hpai::udp(GATEWAY), crd)
                        }
                    };
                    reply(response.build().unwrap())
                }
                ServiceType::TunnelingRequest | ServiceType::DeviceConfigurationRequest => {
                    if ignored < script.unacked_requests {
                        ignored += 1;
                        return Vec::new();
                    }
                    let request = DataRequest::parse(&frame).unwrap();
                    let header = request.connection_header;
                    reply(DataAck::new(request.service, header.channel_id, header.sequence_counter, 0).build().unwrap())
                }
                ServiceType::ConnectionStateRequest if script.answer_heartbeat => {
                    reply(ConnectionStateResponse::new(CHANNEL, 0).build().unwrap())
                }
                ServiceType::DisconnectRequest => reply(DisconnectResponse::new(CHANNEL, 0).build().unwrap()),
                _ => Vec::new(),
            }
        }
    }

    fn connection(script: Script) -> Connection<MockTransport> {
        let mut mock = MockTransport::new();
        mock.set_responder(server(script));
        Connection::new(mock, ConnectionConfig::default())
    }

    async fn connected(script: Script) -> Connection<MockTransport> {
        let mut connection = connection(script);
        connection.connect(GATEWAY, Cri::tunnel(TunnelLayer::Link)).await.unwrap();
        connection
    }

    fn sent(connection: &Connection<MockTransport>, service: ServiceType) -> Vec<Frame> {
        connection
            .transport()
            .sent_packets()
            .into_iter()
            .filter_map(|(data, _)| Frame::from_datagram(&data).ok())
            .filter(|frame| frame.service_type() == service)
            .collect()
    }

    fn inbound(channel: u8, seq: u8) -> Vec<u8> {
        DataRequest::new(DataService::Tunneling, ConnectionHeader::new(channel, seq), Bytes::from_static(&CEMI))
            .build()
            .unwrap()
            .bytes()
            .to_vec()
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<ConnectionEvent>) -> Vec<ConnectionEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect() {
        let mut connection = connection(Script::default());
        let mut events = connection.subscribe();

        connection.connect(GATEWAY, Cri::tunnel(TunnelLayer::Link)).await.unwrap();

        assert!(connection.is_connected());
        assert_eq!(connection.channel_id(), Some(CHANNEL));
        assert_eq!(connection.individual_address().unwrap().to_string(), "1.1.250");
        assert_eq!(connection.connection_type(), Some(ConnectionType::Tunnel));
        assert_eq!(connection.data_endpoint(), Some(GATEWAY));
        assert_eq!(
            drain(&mut events),
            vec![ConnectionEvent::StateChanged(State::Connecting), ConnectionEvent::StateChanged(State::Connected)]
        );

        let request = ConnectRequest::parse(&sent(&connection, ServiceType::ConnectRequest)[0]).unwrap();
        assert!(request.control_endpoint.endpoint().unwrap().is_unspecified());
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_refused() {
        for status in [Status::NoMoreConnections, Status::NoMoreUniqueConnections] {
            let mut connection = connection(Script { refuse: Some(status), ..Script::default() });
            let err = connection.connect(GATEWAY, Cri::tunnel(TunnelLayer::Link)).await.unwrap_err();
            match err {
                KnxError::Connection(e) => assert_eq!(e.refusal_status(), Some(status.to_raw())),
                other => panic!("unexpected error {other:?}"),
            }
            assert_eq!(connection.state(), State::Disconnected);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_timeout() {
        let mut connection = Connection::new(MockTransport::new(), ConnectionConfig::default());
        let mut events = connection.subscribe();
        let err = connection.connect(GATEWAY, Cri::tunnel(TunnelLayer::Link)).await.unwrap_err();

        assert_eq!(err.timeout_kind(), Some(TimeoutKind::Connect));
        assert_eq!(connection.state(), State::Disconnected);
        let events = drain(&mut events);
        assert!(matches!(events[1], ConnectionEvent::ErrorOccurred(ConnectionErrorCode::Connect, _)));
        assert_eq!(events[2], ConnectionEvent::StateChanged(State::Disconnected));
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_rejects_bad_configuration() {
        let mut connection = connection(Script::default());
        connection.set_config(ConnectionConfig::default().with_heartbeat_timeout(Duration::ZERO));
        assert!(connection.connect(GATEWAY, Cri::tunnel(TunnelLayer::Link)).await.is_err());
        assert!(connection.transport().sent_packets().is_empty());

        connection.set_config(ConnectionConfig::default());
        let err = connection.connect(GATEWAY, Cri::new(ConnectionType::RemoteLogging)).await.unwrap_err();
        assert!(matches!(err, KnxError::Connection(ref e) if e.is_invalid_configuration()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_advances_sequence() {
        let mut connection = connected(Script::default()).await;

        connection.send(&CEMI).await.unwrap();
        connection.send(&CEMI).await.unwrap();

        let requests = sent(&connection, ServiceType::TunnelingRequest);
        let seqs: Vec<u8> =
            requests.iter().map(|f| DataRequest::parse(f).unwrap().connection_header.sequence_counter).collect();
        assert_eq!(seqs, vec![0, 1]);
        assert_eq!(connection.send_sequence(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_repeats_with_same_sequence() {
        let mut connection = connected(Script { unacked_requests: 1, ..Script::default() }).await;

        connection.send(&CEMI).await.unwrap();

        let requests = sent(&connection, ServiceType::TunnelingRequest);
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].bytes(), requests[1].bytes());
        assert_eq!(connection.send_sequence(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_gives_up_after_retries() {
        let mut connection = connected(Script { unacked_requests: 10, ..Script::default() }).await;

        let err = connection.send(&CEMI).await.unwrap_err();

        assert_eq!(err.timeout_kind(), Some(TimeoutKind::Ack));
        assert_eq!(connection.state(), State::Disconnected);
        assert_eq!(sent(&connection, ServiceType::TunnelingRequest).len(), 2);
        assert_eq!(sent(&connection, ServiceType::DisconnectRequest).len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_busmonitor_cannot_send() {
        let mut connection = connection(Script::default());
        connection.set_tunnel_layer(TunnelLayer::Busmonitor).unwrap();
        connection.connect_tunnel(GATEWAY).await.unwrap();

        let err = connection.send(&CEMI).await.unwrap_err();
        assert!(matches!(err, KnxError::Connection(ref e) if e.is_send_not_permitted()));
        assert!(connection.set_tunnel_layer(TunnelLayer::Link).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_requires_connection() {
        let mut connection = connection(Script::default());
        let err = connection.send(&CEMI).await.unwrap_err();
        assert!(matches!(err, KnxError::Connection(ref e) if e.is_not_connected()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_inbound_delivered_once() {
        let mut connection = connected(Script::default()).await;
        let mut events = connection.subscribe();

        connection.transport_mut().add_response(inbound(CHANNEL, 0));
        connection.process().await.unwrap();
        connection.transport_mut().add_response(inbound(CHANNEL, 0));
        connection.process().await.unwrap();
        connection.transport_mut().add_response(inbound(CHANNEL, 1));
        connection.process().await.unwrap();

        let delivered: Vec<_> =
            drain(&mut events).into_iter().filter(|e| matches!(e, ConnectionEvent::FrameReceived(_))).collect();
        assert_eq!(delivered.len(), 2);
        assert_eq!(connection.receive_sequence(), 2);

        let acks: Vec<u8> = sent(&connection, ServiceType::TunnelingAck)
            .iter()
            .map(|f| DataAck::parse(f).unwrap().connection_header.sequence_counter)
            .collect();
        assert_eq!(acks, vec![0, 0, 1]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_out_of_order_not_delivered() {
        let mut connection = connected(Script::default()).await;
        let mut events = connection.subscribe();

        connection.transport_mut().add_response(inbound(CHANNEL, 5));
        connection.process().await.unwrap();

        let events = drain(&mut events);
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], ConnectionEvent::ErrorOccurred(ConnectionErrorCode::Sequence, _)));
        assert_eq!(connection.receive_sequence(), 0);
        assert_eq!(sent(&connection, ServiceType::TunnelingAck).len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_foreign_channel_dropped() {
        let mut connection = connected(Script::default()).await;

        connection.transport_mut().add_response(inbound(0x99, 0));
        connection.process().await.unwrap();

        assert!(sent(&connection, ServiceType::TunnelingAck).is_empty());
        assert_eq!(connection.receive_sequence(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_frame_ignored() {
        let mut connection = connected(Script::default()).await;

        connection.transport_mut().add_response(vec![0x06, 0x10, 0x04]);
        connection.process().await.unwrap();

        assert!(connection.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_answered() {
        let mut connection = connected(Script::default()).await;

        connection.process().await.unwrap();

        assert!(connection.is_connected());
        assert_eq!(sent(&connection, ServiceType::ConnectionStateRequest).len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_timeout() {
        let mut connection = connected(Script { answer_heartbeat: false, ..Script::default() }).await;
        let mut events = connection.subscribe();

        let err = connection.process().await.unwrap_err();

        assert_eq!(err.timeout_kind(), Some(TimeoutKind::Heartbeat));
        assert_eq!(connection.state(), State::Disconnected);
        assert_eq!(sent(&connection, ServiceType::ConnectionStateRequest).len(), 3);
        assert!(drain(&mut events)
            .iter()
            .any(|e| matches!(e, ConnectionEvent::ErrorOccurred(ConnectionErrorCode::Heartbeat, _))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_disconnect() {
        let mut connection = connected(Script::default()).await;

        let request = DisconnectRequest::new(CHANNEL, Hpai::udp(GATEWAY)).build().unwrap();
        connection.transport_mut().add_response(request.bytes().to_vec());
        connection.process().await.unwrap();

        assert_eq!(connection.state(), State::Disconnected);
        let response = DisconnectResponse::parse(&sent(&connection, ServiceType::DisconnectResponse)[0]).unwrap();
        assert_eq!(response.channel_id, CHANNEL);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sequence_wraps() {
        let mut connection = connected(Script::default()).await;
        let mut events = connection.subscribe();

        for _ in 0..257 {
            connection.send(&CEMI).await.unwrap();
        }
        assert_eq!(connection.send_sequence(), 1);
        let last = DataRequest::parse(sent(&connection, ServiceType::TunnelingRequest).last().unwrap()).unwrap();
        assert_eq!(last.connection_header.sequence_counter, 0);

        for seq in (0..=255).chain([0]) {
            connection.transport_mut().add_response(inbound(CHANNEL, seq));
            connection.process().await.unwrap();
        }
        assert_eq!(connection.receive_sequence(), 1);
        let delivered =
            drain(&mut events).into_iter().filter(|e| matches!(e, ConnectionEvent::FrameReceived(_))).count();
        assert_eq!(delivered, 257);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_connect_resets() {
        let mut connection = Connection::new(MockTransport::new(), ConnectionConfig::default());
        let mut events = connection.subscribe();

        tokio::time::timeout(Duration::from_secs(1), connection.connect_tunnel(GATEWAY)).await.unwrap_err();

        assert_eq!(connection.state(), State::Disconnected);
        assert!(!connection.transport().is_ready());
        assert_eq!(
            drain(&mut events),
            vec![
                ConnectionEvent::StateChanged(State::Connecting),
                ConnectionEvent::StateChanged(State::Disconnected)
            ]
        );

        connection.transport_mut().set_responder(server(Script::default()));
        connection.connect_tunnel(GATEWAY).await.unwrap();
        assert_eq!(connection.state(), State::Connected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_disconnect_resets() {
        let mut connection = connected(Script::default()).await;
        connection.transport_mut().clear_responder();

        tokio::time::timeout(Duration::from_secs(1), connection.disconnect()).await.unwrap_err();

        assert_eq!(connection.state(), State::Disconnected);
        assert_eq!(connection.channel_id(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_send_failure_reported() {
        let mut connection = connected(Script::default()).await;
        let mut events = connection.subscribe();
        connection.transport_mut().fail_next_send();

        connection.disconnect().await.unwrap();

        assert_eq!(connection.state(), State::Disconnected);
        assert!(sent(&connection, ServiceType::DisconnectRequest).is_empty());
        let events = drain(&mut events);
        assert_eq!(events.len(), 3);
        assert_eq!(events[0], ConnectionEvent::StateChanged(State::Disconnecting));
        assert!(matches!(events[1], ConnectionEvent::ErrorOccurred(ConnectionErrorCode::Disconnect, _)));
        assert_eq!(events[2], ConnectionEvent::StateChanged(State::Disconnected));
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect() {
        let mut connection = connected(Script::default()).await;
        let mut events = connection.subscribe();

        connection.disconnect().await.unwrap();

        assert_eq!(connection.state(), State::Disconnected);
        assert_eq!(connection.channel_id(), None);
        assert!(!connection.transport().is_ready());
        let request = DisconnectRequest::parse(&sent(&connection, ServiceType::DisconnectRequest)[0]).unwrap();
        assert_eq!(request.channel_id, CHANNEL);
        assert_eq!(
            drain(&mut events),
            vec![
                ConnectionEvent::StateChanged(State::Disconnecting),
                ConnectionEvent::StateChanged(State::Disconnected)
            ]
        );

        connection.disconnect().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_device_management() {
        let mut connection = connection(Script::default());
        connection.connect_device_management(GATEWAY).await.unwrap();
        assert_eq!(connection.connection_type(), Some(ConnectionType::DeviceManagement));
        assert_eq!(connection.individual_address(), None);

        let read = ManagementFrame::property_read(PropertyAddress::new(0, 1, 11), 1, 1).unwrap();
        connection.send_management(&read).await.unwrap();

        let request = DataRequest::parse(&sent(&connection, ServiceType::DeviceConfigurationRequest)[0]).unwrap();
        assert_eq!(&request.cemi[..], &read.bytes()[..]);

        let mut events = connection.subscribe();
        let negative = ManagementFrame::negative_confirmation(
            crate::protocol::constants::ManagementCode::PropertyReadConfirmation,
            PropertyAddress::new(0, 1, 11),
            1,
            CemiServerError::VoidDp,
        )
        .unwrap();
        let inbound = DataRequest::new(
            DataService::DeviceConfiguration,
            ConnectionHeader::new(CHANNEL, 0),
            negative.bytes().clone(),
        )
        .build()
        .unwrap();
        connection.transport_mut().add_response(inbound.bytes().to_vec());
        connection.process().await.unwrap();

        assert!(connection.is_connected());
        match drain(&mut events).as_slice() {
            [ConnectionEvent::FrameReceived(cemi)] => {
                let message = ManagementFrame::parse(cemi.clone()).unwrap();
                assert_eq!(message.error(), Some(CemiServerError::VoidDp));
            }
            other => panic!("unexpected events {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_subscriber_is_removed() {
        let mut connection = connection(Script::default());
        drop(connection.subscribe());
        connection.connect(GATEWAY, Cri::tunnel(TunnelLayer::Link)).await.unwrap();
        assert!(connection.subscribers.is_empty());
    }
}
