//! Error types for KNXnet/IP operations.
//!
//! Errors are grouped by category. Each category is a small struct holding a
//! private kind plus a backtrace, and exposes `is_*` helpers so callers can
//! branch on the cause without depending on the internal kind enums.
//!
//! Codec views never produce these errors for malformed input: they report
//! `is_valid() == false` instead. Errors come from builders, I/O, the
//! connection state machine, the discovery agent and the datapoint codecs.

use core::fmt;
use std::backtrace::Backtrace;

/// Result type alias for KNX operations.
pub type Result<T> = core::result::Result<T, KnxError>;

// =============================================================================
// Error Kind Enums (Internal)
// =============================================================================

/// Protocol error variants (internal)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) enum ProtocolErrorKind {
    InvalidFrame,
    UnsupportedVersion,
    UnsupportedServiceType,
    SizeMismatch,
    PayloadTooLarge,
    InvalidStructure,
    InvalidMessageCode,
}

/// Connection error variants (internal)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) enum ConnectionErrorKind {
    Refused(u8),
    Lost,
    NotConnected,
    AlreadyConnected,
    InvalidConfiguration,
    SendNotPermitted,
}

/// Tunneling error variants (internal)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) enum TunnelingErrorKind {
    SequenceMismatch,
    AckFailed(u8),
}

/// Transport error variants (internal)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TransportErrorKind {
    SendFailed,
    ReceiveFailed,
    BufferTooSmall,
    NotBound,
    Socket(std::io::ErrorKind),
}

/// Addressing error variants (internal)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) enum AddressingErrorKind {
    InvalidIndividualAddress,
    InvalidEndpoint,
    OutOfRange,
}

/// DPT error variants (internal)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) enum DptErrorKind {
    InvalidData,
    SizeMismatch,
    ValueOutOfRange,
    UnsupportedType,
}

/// Discovery error variants (internal)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) enum DiscoveryErrorKind {
    NotIpv4,
    NoInterfaces,
    InvalidConfiguration,
}

/// Which wait ran out of time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimeoutKind {
    /// No connect response arrived in time.
    Connect,
    /// The connection-state probes went unanswered.
    Heartbeat,
    /// A data request was never acknowledged.
    Ack,
    /// A discovery run ended without any response.
    Discovery,
}

// =============================================================================
// Main Error Type
// =============================================================================

/// KNX protocol error types.
///
/// This is the main error type returned by all fallible operations in the
/// crate. Every variant captures a backtrace (subject to `RUST_BACKTRACE`).
#[derive(Debug)]
pub enum KnxError {
    /// Protocol-related errors (frame parsing, version, sizes)
    Protocol(ProtocolError),
    /// Connection-related errors (connect refused, lost, not connected)
    Connection(ConnectionError),
    /// Tunneling-related errors (sequence, acknowledgement status)
    Tunneling(TunnelingError),
    /// Transport-related errors (socket, send, receive)
    Transport(TransportError),
    /// Addressing errors (invalid address or endpoint format)
    Addressing(AddressingError),
    /// Datapoint Type errors (encoding, decoding, lookup)
    Dpt(DptError),
    /// Discovery agent errors (interfaces, configuration)
    Discovery(DiscoveryError),
    /// A bounded wait expired
    Timeout(TimeoutError),
}

// =============================================================================
// Structured Error Types
// =============================================================================

/// Protocol error with backtrace
#[derive(Debug)]
pub struct ProtocolError {
    kind: ProtocolErrorKind,
    backtrace: Backtrace,
}

impl ProtocolError {
    pub(crate) fn new(kind: ProtocolErrorKind) -> Self {
        Self {
            kind,
            backtrace: Backtrace::capture(),
        }
    }

    /// Check if this is an invalid frame error
    pub fn is_invalid_frame(&self) -> bool {
        matches!(self.kind, ProtocolErrorKind::InvalidFrame)
    }

    /// Check if this is an unsupported version error
    pub fn is_unsupported_version(&self) -> bool {
        matches!(self.kind, ProtocolErrorKind::UnsupportedVersion)
    }

    /// Check if the service type is not handled here
    pub fn is_unsupported_service_type(&self) -> bool {
        matches!(self.kind, ProtocolErrorKind::UnsupportedServiceType)
    }

    /// Check if a declared length disagreed with the actual data
    pub fn is_size_mismatch(&self) -> bool {
        matches!(self.kind, ProtocolErrorKind::SizeMismatch)
    }

    /// Captured backtrace
    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }
}

/// Connection error with backtrace
#[derive(Debug)]
pub struct ConnectionError {
    kind: ConnectionErrorKind,
    backtrace: Backtrace,
}

impl ConnectionError {
    pub(crate) fn new(kind: ConnectionErrorKind) -> Self {
        Self {
            kind,
            backtrace: Backtrace::capture(),
        }
    }

    /// Check if the server refused the connect request
    pub fn is_refused(&self) -> bool {
        matches!(self.kind, ConnectionErrorKind::Refused(_))
    }

    /// Status code the server answered a refused connect request with
    pub fn refusal_status(&self) -> Option<u8> {
        match self.kind {
            ConnectionErrorKind::Refused(status) => Some(status),
            _ => None,
        }
    }

    /// Check if connection was lost
    pub fn is_lost(&self) -> bool {
        matches!(self.kind, ConnectionErrorKind::Lost)
    }

    /// Check if the operation needed an open connection
    pub fn is_not_connected(&self) -> bool {
        matches!(self.kind, ConnectionErrorKind::NotConnected)
    }

    /// Check if the connection parameters were rejected locally
    pub fn is_invalid_configuration(&self) -> bool {
        matches!(self.kind, ConnectionErrorKind::InvalidConfiguration)
    }

    /// Check if sending is forbidden in the negotiated mode
    pub fn is_send_not_permitted(&self) -> bool {
        matches!(self.kind, ConnectionErrorKind::SendNotPermitted)
    }
}

/// Tunneling error with backtrace
#[derive(Debug)]
pub struct TunnelingError {
    kind: TunnelingErrorKind,
    backtrace: Backtrace,
}

impl TunnelingError {
    pub(crate) fn new(kind: TunnelingErrorKind) -> Self {
        Self {
            kind,
            backtrace: Backtrace::capture(),
        }
    }

    /// Check if this is a sequence mismatch error
    pub fn is_sequence_mismatch(&self) -> bool {
        matches!(self.kind, TunnelingErrorKind::SequenceMismatch)
    }

    /// Check if the peer acknowledged with an error status
    pub fn is_ack_failed(&self) -> bool {
        matches!(self.kind, TunnelingErrorKind::AckFailed(_))
    }
}

/// Transport error with backtrace
#[derive(Debug)]
pub struct TransportError {
    kind: TransportErrorKind,
    backtrace: Backtrace,
}

impl TransportError {
    pub(crate) fn new(kind: TransportErrorKind) -> Self {
        Self {
            kind,
            backtrace: Backtrace::capture(),
        }
    }

    /// Check if buffer is too small
    pub fn is_buffer_too_small(&self) -> bool {
        matches!(self.kind, TransportErrorKind::BufferTooSmall)
    }

    /// Check if this is a socket error
    pub fn is_socket_error(&self) -> bool {
        matches!(self.kind, TransportErrorKind::Socket(_))
    }

    /// Underlying I/O error kind, when the error came from the OS
    pub fn io_kind(&self) -> Option<std::io::ErrorKind> {
        match self.kind {
            TransportErrorKind::Socket(kind) => Some(kind),
            _ => None,
        }
    }
}

/// Addressing error with backtrace
#[derive(Debug)]
pub struct AddressingError {
    kind: AddressingErrorKind,
    backtrace: Backtrace,
}

impl AddressingError {
    pub(crate) fn new(kind: AddressingErrorKind) -> Self {
        Self {
            kind,
            backtrace: Backtrace::capture(),
        }
    }

    /// Check if address is out of range
    pub fn is_out_of_range(&self) -> bool {
        matches!(self.kind, AddressingErrorKind::OutOfRange)
    }
}

/// DPT error with backtrace
#[derive(Debug)]
pub struct DptError {
    kind: DptErrorKind,
    backtrace: Backtrace,
}

impl DptError {
    pub(crate) fn new(kind: DptErrorKind) -> Self {
        Self {
            kind,
            backtrace: Backtrace::capture(),
        }
    }

    /// Check if value is out of range
    pub fn is_out_of_range(&self) -> bool {
        matches!(self.kind, DptErrorKind::ValueOutOfRange)
    }

    /// Check if no codec is registered for the requested type
    pub fn is_unknown_type(&self) -> bool {
        matches!(self.kind, DptErrorKind::UnsupportedType)
    }

    /// Check if the byte count did not fit the type
    pub fn is_size_mismatch(&self) -> bool {
        matches!(self.kind, DptErrorKind::SizeMismatch)
    }
}

/// Discovery error with backtrace
#[derive(Debug)]
pub struct DiscoveryError {
    kind: DiscoveryErrorKind,
    backtrace: Backtrace,
}

impl DiscoveryError {
    pub(crate) fn new(kind: DiscoveryErrorKind) -> Self {
        Self {
            kind,
            backtrace: Backtrace::capture(),
        }
    }

    /// Check if a local address was not IPv4
    pub fn is_not_ipv4(&self) -> bool {
        matches!(self.kind, DiscoveryErrorKind::NotIpv4)
    }

    /// Check if the configuration was rejected before starting
    pub fn is_invalid_configuration(&self) -> bool {
        matches!(
            self.kind,
            DiscoveryErrorKind::InvalidConfiguration | DiscoveryErrorKind::NotIpv4
        )
    }
}

/// Timeout error with backtrace
#[derive(Debug)]
pub struct TimeoutError {
    kind: TimeoutKind,
    backtrace: Backtrace,
}

impl TimeoutError {
    pub(crate) fn new(kind: TimeoutKind) -> Self {
        Self {
            kind,
            backtrace: Backtrace::capture(),
        }
    }

    /// Which wait expired
    pub fn kind(&self) -> TimeoutKind {
        self.kind
    }
}

// =============================================================================
// Convenience Constructors for KnxError
// =============================================================================

impl KnxError {
    // Protocol errors
    #[inline]
    pub(crate) const fn invalid_frame() -> Self {
        Self::Protocol(ProtocolError { kind: ProtocolErrorKind::InvalidFrame, backtrace: Backtrace::disabled() })
    }

    #[inline]
    pub(crate) const fn unsupported_version() -> Self {
        Self::Protocol(ProtocolError { kind: ProtocolErrorKind::UnsupportedVersion, backtrace: Backtrace::disabled() })
    }

    #[inline]
    pub(crate) const fn unsupported_service_type() -> Self {
        Self::Protocol(ProtocolError { kind: ProtocolErrorKind::UnsupportedServiceType, backtrace: Backtrace::disabled() })
    }

    #[inline]
    pub(crate) const fn size_mismatch() -> Self {
        Self::Protocol(ProtocolError { kind: ProtocolErrorKind::SizeMismatch, backtrace: Backtrace::disabled() })
    }

    #[inline]
    pub(crate) const fn payload_too_large() -> Self {
        Self::Protocol(ProtocolError { kind: ProtocolErrorKind::PayloadTooLarge, backtrace: Backtrace::disabled() })
    }

    pub(crate) fn invalid_structure() -> Self {
        Self::Protocol(ProtocolError::new(ProtocolErrorKind::InvalidStructure))
    }

    pub(crate) fn invalid_message_code() -> Self {
        Self::Protocol(ProtocolError::new(ProtocolErrorKind::InvalidMessageCode))
    }

    // Connection errors
    pub(crate) fn connection_refused(status: u8) -> Self {
        Self::Connection(ConnectionError::new(ConnectionErrorKind::Refused(status)))
    }

    pub(crate) fn connection_lost() -> Self {
        Self::Connection(ConnectionError::new(ConnectionErrorKind::Lost))
    }

    pub(crate) fn not_connected() -> Self {
        Self::Connection(ConnectionError::new(ConnectionErrorKind::NotConnected))
    }

    pub(crate) fn already_connected() -> Self {
        Self::Connection(ConnectionError::new(ConnectionErrorKind::AlreadyConnected))
    }

    pub(crate) fn invalid_configuration() -> Self {
        Self::Connection(ConnectionError::new(ConnectionErrorKind::InvalidConfiguration))
    }

    pub(crate) fn send_not_permitted() -> Self {
        Self::Connection(ConnectionError::new(ConnectionErrorKind::SendNotPermitted))
    }

    // Tunneling errors
    pub(crate) fn sequence_mismatch() -> Self {
        Self::Tunneling(TunnelingError::new(TunnelingErrorKind::SequenceMismatch))
    }

    pub(crate) fn ack_failed(status: u8) -> Self {
        Self::Tunneling(TunnelingError::new(TunnelingErrorKind::AckFailed(status)))
    }

    // Transport errors
    pub(crate) fn buffer_too_small() -> Self {
        Self::Transport(TransportError::new(TransportErrorKind::BufferTooSmall))
    }

    pub(crate) fn send_failed() -> Self {
        Self::Transport(TransportError::new(TransportErrorKind::SendFailed))
    }

    pub(crate) fn receive_failed() -> Self {
        Self::Transport(TransportError::new(TransportErrorKind::ReceiveFailed))
    }

    pub(crate) fn not_bound() -> Self {
        Self::Transport(TransportError::new(TransportErrorKind::NotBound))
    }

    // Addressing errors
    pub(crate) fn invalid_individual_address() -> Self {
        Self::Addressing(AddressingError::new(AddressingErrorKind::InvalidIndividualAddress))
    }

    pub(crate) fn invalid_endpoint() -> Self {
        Self::Addressing(AddressingError::new(AddressingErrorKind::InvalidEndpoint))
    }

    pub(crate) fn address_out_of_range() -> Self {
        Self::Addressing(AddressingError::new(AddressingErrorKind::OutOfRange))
    }

    // DPT errors
    pub(crate) fn invalid_dpt_data() -> Self {
        Self::Dpt(DptError::new(DptErrorKind::InvalidData))
    }

    pub(crate) fn dpt_size_mismatch() -> Self {
        Self::Dpt(DptError::new(DptErrorKind::SizeMismatch))
    }

    pub(crate) fn dpt_value_out_of_range() -> Self {
        Self::Dpt(DptError::new(DptErrorKind::ValueOutOfRange))
    }

    pub(crate) fn unknown_dpt() -> Self {
        Self::Dpt(DptError::new(DptErrorKind::UnsupportedType))
    }

    // Discovery errors
    pub(crate) fn not_ipv4() -> Self {
        Self::Discovery(DiscoveryError::new(DiscoveryErrorKind::NotIpv4))
    }

    pub(crate) fn no_interfaces() -> Self {
        Self::Discovery(DiscoveryError::new(DiscoveryErrorKind::NoInterfaces))
    }

    pub(crate) fn invalid_discovery_configuration() -> Self {
        Self::Discovery(DiscoveryError::new(DiscoveryErrorKind::InvalidConfiguration))
    }

    // Timeouts
    pub(crate) fn timeout(kind: TimeoutKind) -> Self {
        Self::Timeout(TimeoutError::new(kind))
    }

    /// Returns the timeout kind if this error is a timeout.
    pub fn timeout_kind(&self) -> Option<TimeoutKind> {
        match self {
            KnxError::Timeout(e) => Some(e.kind),
            _ => None,
        }
    }

    /// True for I/O level failures (socket, send, receive).
    pub fn is_network(&self) -> bool {
        matches!(self, KnxError::Transport(_))
            || matches!(self, KnxError::Connection(e) if e.is_lost() || e.is_refused())
    }
}

impl From<std::io::Error> for KnxError {
    fn from(err: std::io::Error) -> Self {
        Self::Transport(TransportError::new(TransportErrorKind::Socket(err.kind())))
    }
}

// =============================================================================
// Display Implementation
// =============================================================================

impl fmt::Display for KnxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KnxError::Protocol(e) => write!(f, "Protocol error: {:?}", e.kind),
            KnxError::Connection(e) => match e.kind {
                ConnectionErrorKind::Refused(status) => {
                    write!(f, "Connection error: refused with status {status:#04x}")
                }
                kind => write!(f, "Connection error: {kind:?}"),
            },
            KnxError::Tunneling(e) => write!(f, "Tunneling error: {:?}", e.kind),
            KnxError::Transport(e) => write!(f, "Transport error: {:?}", e.kind),
            KnxError::Addressing(e) => write!(f, "Addressing error: {:?}", e.kind),
            KnxError::Dpt(e) => write!(f, "DPT error: {:?}", e.kind),
            KnxError::Discovery(e) => write!(f, "Discovery error: {:?}", e.kind),
            KnxError::Timeout(e) => write!(f, "{:?} timeout", e.kind),
        }
    }
}

impl std::error::Error for KnxError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_kind_is_exposed() {
        let err = KnxError::timeout(TimeoutKind::Heartbeat);
        assert_eq!(err.timeout_kind(), Some(TimeoutKind::Heartbeat));
        assert_eq!(err.to_string(), "Heartbeat timeout");
    }

    #[test]
    fn test_refused_carries_status() {
        let err = KnxError::connection_refused(0x24);
        match &err {
            KnxError::Connection(e) => {
                assert!(e.is_refused());
                assert_eq!(e.refusal_status(), Some(0x24));
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(err.is_network());
        assert_eq!(err.to_string(), "Connection error: refused with status 0x24");
    }

    #[test]
    fn test_io_error_maps_to_transport() {
        let err = KnxError::from(std::io::Error::from(std::io::ErrorKind::AddrInUse));
        match err {
            KnxError::Transport(e) => assert_eq!(e.io_kind(), Some(std::io::ErrorKind::AddrInUse)),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_not_ipv4_is_configuration_error() {
        match KnxError::not_ipv4() {
            KnxError::Discovery(e) => {
                assert!(e.is_not_ipv4());
                assert!(e.is_invalid_configuration());
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}
