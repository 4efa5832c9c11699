//! KNXnet/IP connection management and data service frames.
//!
//! Each service is a plain value with public fields, a `parse` that reads it
//! back from a [`Frame`] and a `build` that produces one.
//!
//! ## Supported Services
//!
//! - **CONNECT** - Establish a tunnel or device management connection
//! - **CONNECTIONSTATE** - Heartbeat/keep-alive checks
//! - **DISCONNECT** - Connection shutdown, from either side
//! - **TUNNELING** / **DEVICE_CONFIGURATION** - Sequenced cEMI transfer
//!
//! ## Example
//!
//! ```rust
//! use knx_netip::net::IpEndpoint;
//! use knx_netip::protocol::hpai::Hpai;
//! use knx_netip::protocol::services::DisconnectRequest;
//!
//! let endpoint: IpEndpoint = "127.0.0.1:3671".parse()?;
//! let frame = DisconnectRequest::new(0x01, Hpai::udp(endpoint)).build()?;
//! assert_eq!(frame.size(), 16);
//! # Ok::<(), knx_netip::KnxError>(())
//! ```
//!
//! ## Protocol Flow
//!
//! ```text
//! Client                          Gateway
//!   |                                |
//!   |------- CONNECT_REQUEST ------->|
//!   |<------ CONNECT_RESPONSE -------|
//!   |                                |
//!   |------ TUNNELING_REQUEST ------>|
//!   |<------ TUNNELING_ACK ----------|
//!   |                                |
//!   |--- CONNECTIONSTATE_REQUEST --->|  (every 60s)
//!   |<-- CONNECTIONSTATE_RESPONSE ---|
//!   |                                |
//!   |------ DISCONNECT_REQUEST ----->|
//!   |<----- DISCONNECT_RESPONSE -----|
//! ```

use crate::error::{KnxError, Result};
use crate::protocol::constants::{ConnectionType, ServiceType, Status};
use crate::protocol::cri::{Cri, Crd};
use crate::protocol::frame::Frame;
use crate::protocol::hpai::Hpai;
use bytes::Bytes;

/// Check the service type of `frame` and return its body.
fn body_of(frame: &Frame, expected: ServiceType) -> Result<Bytes> {
    if frame.service_type() != expected {
        return Err(KnxError::unsupported_service_type());
    }
    Ok(frame.body())
}

/// Parse an HPAI at `offset` that must be valid.
fn hpai_at(body: &Bytes, offset: usize) -> Result<Hpai> {
    let hpai = Hpai::parse(body, offset)?;
    if !hpai.is_valid() {
        return Err(KnxError::invalid_structure());
    }
    Ok(hpai)
}

// =============================================================================
// CONNECT
// =============================================================================

/// `CONNECT_REQUEST` service (0x0205)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectRequest {
    /// Control endpoint (for connection management)
    pub control_endpoint: Hpai,
    /// Data endpoint (for tunneling data)
    pub data_endpoint: Hpai,
    /// Connection request information
    pub cri: Cri,
}

impl ConnectRequest {
    /// Create a new `CONNECT_REQUEST`
    pub const fn new(control_endpoint: Hpai, data_endpoint: Hpai, cri: Cri) -> Self {
        Self { control_endpoint, data_endpoint, cri }
    }

    /// Build the complete frame
    ///
    /// # Errors
    ///
    /// Returns `InvalidStructure` if the CRI is not valid for its type.
    pub fn build(&self) -> Result<Frame> {
        if !self.cri.is_valid() {
            return Err(KnxError::invalid_structure());
        }
        Frame::builder(ServiceType::ConnectRequest)
            .extend(self.control_endpoint.bytes())
            .extend(self.data_endpoint.bytes())
            .extend(self.cri.bytes())
            .build()
    }

    /// Parse from a frame
    pub fn parse(frame: &Frame) -> Result<Self> {
        let body = body_of(frame, ServiceType::ConnectRequest)?;
        let control_endpoint = hpai_at(&body, 0)?;
        let data_endpoint = hpai_at(&body, Hpai::SIZE)?;
        let cri = Cri::parse(&body, 2 * Hpai::SIZE)?;
        if body.len() != 2 * Hpai::SIZE + cri.size() || !cri.is_valid() {
            return Err(KnxError::size_mismatch());
        }
        Ok(Self { control_endpoint, data_endpoint, cri })
    }
}

/// `CONNECT_RESPONSE` service (0x0206)
///
/// A refusal carries only the channel and status bytes, so the endpoint and
/// CRD are absent unless the status is `E_NO_ERROR`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectResponse {
    /// Communication channel ID
    pub channel_id: u8,
    /// Status code (0 = OK)
    pub status: u8,
    /// Data endpoint assigned by server
    pub data_endpoint: Option<Hpai>,
    /// Connection response data
    pub crd: Option<Crd>,
}

impl ConnectResponse {
    /// Successful response
    pub fn accepted(channel_id: u8, data_endpoint: Hpai, crd: Crd) -> Self {
        Self {
            channel_id,
            status: Status::NoError.to_raw(),
            data_endpoint: Some(data_endpoint),
            crd: Some(crd),
        }
    }

    /// Refusal with `status`
    pub fn refused(status: Status) -> Self {
        Self { channel_id: 0, status: status.to_raw(), data_endpoint: None, crd: None }
    }

    /// Build the complete frame
    pub fn build(&self) -> Result<Frame> {
        let mut builder = Frame::builder(ServiceType::ConnectResponse).push(self.channel_id).push(self.status);
        if let (Some(hpai), Some(crd)) = (&self.data_endpoint, &self.crd) {
            builder = builder.extend(hpai.bytes()).extend(crd.bytes());
        }
        builder.build()
    }

    /// Parse from a frame
    pub fn parse(frame: &Frame) -> Result<Self> {
        let body = body_of(frame, ServiceType::ConnectResponse)?;
        let [channel_id, status, ..] = body[..] else {
            return Err(KnxError::size_mismatch());
        };
        if status != Status::NoError.to_raw() {
            return Ok(Self { channel_id, status, data_endpoint: None, crd: None });
        }

        let data_endpoint = hpai_at(&body, 2)?;
        let crd = Crd::parse(&body, 2 + Hpai::SIZE)?;
        if !crd.is_valid() {
            return Err(KnxError::invalid_structure());
        }
        Ok(Self { channel_id, status, data_endpoint: Some(data_endpoint), crd: Some(crd) })
    }

    /// Check if connection was successful
    pub fn is_ok(&self) -> bool {
        self.status == Status::NoError.to_raw() && self.crd.is_some()
    }

    /// Connection type confirmed by the CRD
    pub fn connection_type(&self) -> Option<ConnectionType> {
        self.crd.as_ref().map(Crd::connection_type)
    }
}

// =============================================================================
// CONNECTIONSTATE
// =============================================================================

/// `CONNECTIONSTATE_REQUEST` service (0x0207)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionStateRequest {
    /// Communication channel ID
    pub channel_id: u8,
    /// Control endpoint
    pub control_endpoint: Hpai,
}

impl ConnectionStateRequest {
    /// Create a new `CONNECTIONSTATE_REQUEST`
    pub const fn new(channel_id: u8, control_endpoint: Hpai) -> Self {
        Self { channel_id, control_endpoint }
    }

    /// Build the complete frame
    pub fn build(&self) -> Result<Frame> {
        Frame::builder(ServiceType::ConnectionStateRequest)
            .push(self.channel_id)
            .push(0x00) // reserved
            .extend(self.control_endpoint.bytes())
            .build()
    }

    /// Parse from a frame
    pub fn parse(frame: &Frame) -> Result<Self> {
        let (channel_id, control_endpoint) = channel_and_endpoint(frame, ServiceType::ConnectionStateRequest)?;
        Ok(Self { channel_id, control_endpoint })
    }
}

/// `CONNECTIONSTATE_RESPONSE` service (0x0208)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionStateResponse {
    /// Communication channel ID
    pub channel_id: u8,
    /// Status code (0 = OK)
    pub status: u8,
}

impl ConnectionStateResponse {
    /// Create a new `CONNECTIONSTATE_RESPONSE`
    pub const fn new(channel_id: u8, status: u8) -> Self {
        Self { channel_id, status }
    }

    /// Build the complete frame
    pub fn build(&self) -> Result<Frame> {
        Frame::builder(ServiceType::ConnectionStateResponse).push(self.channel_id).push(self.status).build()
    }

    /// Parse from a frame
    pub fn parse(frame: &Frame) -> Result<Self> {
        let (channel_id, status) = channel_and_status(frame, ServiceType::ConnectionStateResponse)?;
        Ok(Self { channel_id, status })
    }

    /// Check if connection is still alive
    pub const fn is_ok(&self) -> bool {
        self.status == 0
    }
}

// =============================================================================
// DISCONNECT
// =============================================================================

/// `DISCONNECT_REQUEST` service (0x0209)
///
/// ```text
/// [channel id][reserved = 0x00][control endpoint HPAI (8 bytes)]
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisconnectRequest {
    /// Communication channel ID
    pub channel_id: u8,
    /// Control endpoint
    pub control_endpoint: Hpai,
}

impl DisconnectRequest {
    /// Total frame size
    pub const SIZE: usize = 16;

    /// Create a new `DISCONNECT_REQUEST`
    pub const fn new(channel_id: u8, control_endpoint: Hpai) -> Self {
        Self { channel_id, control_endpoint }
    }

    /// Build the complete frame; the reserved byte is always 0
    pub fn build(&self) -> Result<Frame> {
        Frame::builder(ServiceType::DisconnectRequest)
            .push(self.channel_id)
            .push(0x00) // reserved
            .extend(self.control_endpoint.bytes())
            .build()
    }

    /// Parse from a frame, ignoring the reserved byte
    pub fn parse(frame: &Frame) -> Result<Self> {
        let (channel_id, control_endpoint) = channel_and_endpoint(frame, ServiceType::DisconnectRequest)?;
        Ok(Self { channel_id, control_endpoint })
    }
}

/// `DISCONNECT_RESPONSE` service (0x020A)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisconnectResponse {
    /// Communication channel ID
    pub channel_id: u8,
    /// Status code (0 = OK)
    pub status: u8,
}

impl DisconnectResponse {
    /// Create a new `DISCONNECT_RESPONSE`
    pub const fn new(channel_id: u8, status: u8) -> Self {
        Self { channel_id, status }
    }

    /// Build the complete frame
    pub fn build(&self) -> Result<Frame> {
        Frame::builder(ServiceType::DisconnectResponse).push(self.channel_id).push(self.status).build()
    }

    /// Parse from a frame
    pub fn parse(frame: &Frame) -> Result<Self> {
        let (channel_id, status) = channel_and_status(frame, ServiceType::DisconnectResponse)?;
        Ok(Self { channel_id, status })
    }

    /// Check if disconnect was acknowledged
    pub const fn is_ok(&self) -> bool {
        self.status == 0
    }
}

fn channel_and_endpoint(frame: &Frame, service: ServiceType) -> Result<(u8, Hpai)> {
    let body = body_of(frame, service)?;
    if body.len() != 2 + Hpai::SIZE {
        return Err(KnxError::size_mismatch());
    }
    Ok((body[0], hpai_at(&body, 2)?))
}

fn channel_and_status(frame: &Frame, service: ServiceType) -> Result<(u8, u8)> {
    match body_of(frame, service)?[..] {
        [channel_id, status] => Ok((channel_id, status)),
        _ => Err(KnxError::size_mismatch()),
    }
}

// =============================================================================
// Connection Header + Data Services
// =============================================================================

/// Connection header of tunneling and device configuration frames
///
/// ```text
/// [0x04][channel id][sequence counter][status / reserved]
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConnectionHeader {
    /// Communication channel ID
    pub channel_id: u8,
    /// Sequence counter
    pub sequence_counter: u8,
    /// Status (acks) or reserved (requests)
    pub status: u8,
}

impl ConnectionHeader {
    /// Size of the connection header
    pub const SIZE: usize = 4;

    /// Create a new connection header
    pub const fn new(channel_id: u8, sequence_counter: u8) -> Self {
        Self { channel_id, sequence_counter, status: 0 }
    }

    /// Header carrying an ack status
    #[must_use]
    pub const fn with_status(mut self, status: u8) -> Self {
        self.status = status;
        self
    }

    /// Encode to bytes
    pub const fn to_bytes(&self) -> [u8; 4] {
        [Self::SIZE as u8, self.channel_id, self.sequence_counter, self.status]
    }

    /// Decode from bytes
    pub fn decode(data: &[u8]) -> Result<Self> {
        match data {
            [4, channel_id, sequence_counter, status, ..] => Ok(Self {
                channel_id: *channel_id,
                sequence_counter: *sequence_counter,
                status: *status,
            }),
            [_, _, _, _, ..] => Err(KnxError::invalid_structure()),
            _ => Err(KnxError::buffer_too_small()),
        }
    }
}

/// Sequenced data service carried by a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DataService {
    /// `TUNNELLING_REQUEST` / `TUNNELLING_ACK`, tunnel connections
    Tunneling,
    /// `DEVICE_CONFIGURATION_REQUEST` / `_ACK`, device management connections
    DeviceConfiguration,
}

impl DataService {
    /// Data service used by a connection type, if any
    pub const fn for_connection(connection_type: ConnectionType) -> Option<Self> {
        match connection_type {
            ConnectionType::Tunnel => Some(Self::Tunneling),
            ConnectionType::DeviceManagement => Some(Self::DeviceConfiguration),
            _ => None,
        }
    }

    /// Service type of the request
    pub const fn request_type(self) -> ServiceType {
        match self {
            Self::Tunneling => ServiceType::TunnelingRequest,
            Self::DeviceConfiguration => ServiceType::DeviceConfigurationRequest,
        }
    }

    /// Service type of the acknowledgement
    pub const fn ack_type(self) -> ServiceType {
        match self {
            Self::Tunneling => ServiceType::TunnelingAck,
            Self::DeviceConfiguration => ServiceType::DeviceConfigurationAck,
        }
    }

    /// Reverse lookup from a request service type
    pub const fn from_request(service: ServiceType) -> Option<Self> {
        match service {
            ServiceType::TunnelingRequest => Some(Self::Tunneling),
            ServiceType::DeviceConfigurationRequest => Some(Self::DeviceConfiguration),
            _ => None,
        }
    }
}

/// `TUNNELLING_REQUEST` (0x0420) or `DEVICE_CONFIGURATION_REQUEST` (0x0310)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataRequest {
    /// Which data service
    pub service: DataService,
    /// Connection header
    pub connection_header: ConnectionHeader,
    /// cEMI frame data
    pub cemi: Bytes,
}

impl DataRequest {
    /// Create a new request
    pub const fn new(service: DataService, connection_header: ConnectionHeader, cemi: Bytes) -> Self {
        Self { service, connection_header, cemi }
    }

    /// Build the complete frame
    pub fn build(&self) -> Result<Frame> {
        Frame::builder(self.service.request_type())
            .extend(&self.connection_header.to_bytes())
            .extend(&self.cemi)
            .build()
    }

    /// Parse from a tunneling or device configuration request frame
    pub fn parse(frame: &Frame) -> Result<Self> {
        let service = DataService::from_request(frame.service_type()).ok_or_else(KnxError::unsupported_service_type)?;
        let body = frame.body();
        let connection_header = ConnectionHeader::decode(&body)?;
        Ok(Self { service, connection_header, cemi: body.slice(ConnectionHeader::SIZE..) })
    }
}

/// `TUNNELLING_ACK` (0x0421) or `DEVICE_CONFIGURATION_ACK` (0x0311)
///
/// The body is the connection header alone, with the status in its last
/// byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataAck {
    /// Which data service
    pub service: DataService,
    /// Connection header
    pub connection_header: ConnectionHeader,
}

impl DataAck {
    /// Create a new ack
    pub const fn new(service: DataService, channel_id: u8, sequence_counter: u8, status: u8) -> Self {
        Self {
            service,
            connection_header: ConnectionHeader::new(channel_id, sequence_counter).with_status(status),
        }
    }

    /// Build the complete frame
    pub fn build(&self) -> Result<Frame> {
        Frame::builder(self.service.ack_type()).extend(&self.connection_header.to_bytes()).build()
    }

    /// Parse from an ack frame
    pub fn parse(frame: &Frame) -> Result<Self> {
        let service = match frame.service_type() {
            ServiceType::TunnelingAck => DataService::Tunneling,
            ServiceType::DeviceConfigurationAck => DataService::DeviceConfiguration,
            _ => return Err(KnxError::unsupported_service_type()),
        };
        let body = frame.body();
        if body.len() != ConnectionHeader::SIZE {
            return Err(KnxError::size_mismatch());
        }
        Ok(Self { service, connection_header: ConnectionHeader::decode(&body)? })
    }

    /// Check if request was acknowledged successfully
    pub const fn is_ok(&self) -> bool {
        self.connection_header.status == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addressing::IndividualAddress;
    use crate::net::IpEndpoint;
    use crate::protocol::constants::TunnelLayer;
    use std::net::Ipv4Addr;

    fn local() -> Hpai {
        Hpai::udp(IpEndpoint::new(Ipv4Addr::LOCALHOST, 3671))
    }

    #[test]
    fn test_disconnect_request_layout() {
        let frame = DisconnectRequest::new(0x01, local()).build().unwrap();
        assert_eq!(frame.size(), DisconnectRequest::SIZE);
        assert_eq!(
            &frame.bytes()[..],
            &[0x06, 0x10, 0x02, 0x09, 0x00, 0x10, 0x01, 0x00, 0x08, 0x01, 127, 0, 0, 1, 0x0E, 0x57]
        );
    }

    #[test]
    fn test_disconnect_request_ignores_reserved_byte() {
        let data = Bytes::from_static(&[0x06, 0x10, 0x02, 0x09, 0x00, 0x10, 0x07, 0xAA, 0x08, 0x01, 127, 0, 0, 1, 0x0E, 0x57]);
        let frame = Frame::parse(&data, 0).unwrap();
        let request = DisconnectRequest::parse(&frame).unwrap();
        assert_eq!(request.channel_id, 0x07);

        let rebuilt = request.build().unwrap();
        assert_eq!(rebuilt.bytes()[7], 0x00);
    }

    #[test]
    fn test_connect_request_build() {
        let request = ConnectRequest::new(local(), local(), Cri::tunnel(TunnelLayer::Link));
        let frame = request.build().unwrap();

        assert_eq!(frame.size(), 26);
        assert_eq!(&frame.bytes()[..6], &[0x06, 0x10, 0x02, 0x05, 0x00, 0x1A]);
        assert_eq!(&frame.bytes()[22..], &[0x04, 0x04, 0x02, 0x00]);
        assert_eq!(ConnectRequest::parse(&frame).unwrap(), request);
    }

    #[test]
    fn test_connect_request_rejects_invalid_cri() {
        let request = ConnectRequest::new(local(), local(), Cri::new(ConnectionType::Tunnel));
        assert!(request.build().is_err());
    }

    #[test]
    fn test_connect_response_accepted() {
        let address = IndividualAddress::new(1, 1, 250).unwrap();
        let frame = ConnectResponse::accepted(0x15, local(), Crd::tunnel(address)).build().unwrap();
        assert_eq!(frame.size(), 20);

        let response = ConnectResponse::parse(&frame).unwrap();
        assert!(response.is_ok());
        assert_eq!(response.channel_id, 0x15);
        assert_eq!(response.crd.unwrap().individual_address(), Some(address));
    }

    #[test]
    fn test_connect_response_refused() {
        let data = Bytes::from_static(&[0x06, 0x10, 0x02, 0x06, 0x00, 0x08, 0x00, 0x24]);
        let response = ConnectResponse::parse(&Frame::parse(&data, 0).unwrap()).unwrap();
        assert!(!response.is_ok());
        assert_eq!(response.status, Status::NoMoreConnections.to_raw());
        assert_eq!(response.crd, None);
    }

    #[test]
    fn test_connection_state_round_trip() {
        let frame = ConnectionStateRequest::new(0x21, local()).build().unwrap();
        assert_eq!(frame.size(), 16);
        assert_eq!(ConnectionStateRequest::parse(&frame).unwrap().channel_id, 0x21);

        let frame = ConnectionStateResponse::new(0x21, 0x21).build().unwrap();
        let response = ConnectionStateResponse::parse(&frame).unwrap();
        assert!(!response.is_ok());
    }

    #[test]
    fn test_wrong_service_type() {
        let frame = DisconnectResponse::new(1, 0).build().unwrap();
        assert!(ConnectionStateResponse::parse(&frame).is_err());
    }

    #[test]
    fn test_connection_header() {
        let header = ConnectionHeader::new(0x05, 0x0A);
        assert_eq!(header.to_bytes(), [0x04, 0x05, 0x0A, 0x00]);
        assert_eq!(ConnectionHeader::decode(&[0x04, 0x05, 0x0A, 0x00]).unwrap(), header);
        assert!(ConnectionHeader::decode(&[0x05, 0x05, 0x0A, 0x00]).is_err());
    }

    #[test]
    fn test_tunneling_request() {
        let cemi = Bytes::from_static(&[0x11, 0x00, 0xBC, 0xE0, 0x00, 0x00, 0x08, 0x01, 0x01, 0x00, 0x81]);
        let request = DataRequest::new(DataService::Tunneling, ConnectionHeader::new(0x01, 0x00), cemi.clone());
        let frame = request.build().unwrap();

        assert_eq!(frame.service_type(), ServiceType::TunnelingRequest);
        assert_eq!(frame.size(), 6 + 4 + cemi.len());
        assert_eq!(DataRequest::parse(&frame).unwrap(), request);
    }

    #[test]
    fn test_device_configuration_ack() {
        let ack = DataAck::new(DataService::DeviceConfiguration, 0x03, 0x07, 0x00);
        let frame = ack.build().unwrap();
        assert_eq!(&frame.bytes()[..], &[0x06, 0x10, 0x03, 0x11, 0x00, 0x0A, 0x04, 0x03, 0x07, 0x00]);

        let parsed = DataAck::parse(&frame).unwrap();
        assert!(parsed.is_ok());
        assert_eq!(parsed.service, DataService::DeviceConfiguration);
    }
}
