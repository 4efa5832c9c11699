//! KNXnet/IP protocol constants, service type identifiers and code tags.

use std::net::Ipv4Addr;

/// KNXnet/IP protocol version 1.0
pub const KNXNETIP_VERSION_10: u8 = 0x10;

/// Standard KNXnet/IP header length (6 bytes)
pub const HEADER_SIZE_10: u8 = 0x06;

/// Standard UDP port for KNXnet/IP communication
pub const KNXNETIP_DEFAULT_PORT: u16 = 3671;

/// Largest datagram the engine reads or builds
pub const MAX_FRAME_SIZE: usize = 512;

/// KNXnet/IP system setup multicast address
pub const KNXNETIP_MULTICAST_ADDR: Ipv4Addr = Ipv4Addr::new(224, 0, 23, 12);

/// Default multicast TTL for search requests
pub const DEFAULT_MULTICAST_TTL: u8 = 64;

/// Declares a `#[repr]` wire enum with lossless raw conversions.
macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident : $repr:ty {
            $( $(#[$vmeta:meta])* $variant:ident = $value:expr, )+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[cfg_attr(feature = "defmt", derive(defmt::Format))]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        #[repr($repr)]
        $vis enum $name {
            $( $(#[$vmeta])* $variant = $value, )+
        }

        impl $name {
            /// Every value of this code family, in wire order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// Convert a raw wire value, `None` if unknown.
            pub const fn from_raw(value: $repr) -> Option<Self> {
                match value {
                    $( $value => Some(Self::$variant), )+
                    _ => None,
                }
            }

            /// Raw wire value.
            pub const fn to_raw(self) -> $repr {
                self as $repr
            }
        }
    };
}

// =============================================================================
// Service Type Identifiers
// =============================================================================

wire_enum! {
    /// KNXnet/IP service type identifiers handled by the client engine
    pub enum ServiceType: u16 {
        /// `SEARCH_REQUEST` - Device discovery request
        SearchRequest = 0x0201,
        /// `SEARCH_RESPONSE` - Device discovery response
        SearchResponse = 0x0202,
        /// `DESCRIPTION_REQUEST` - Device description request
        DescriptionRequest = 0x0203,
        /// `DESCRIPTION_RESPONSE` - Device description response
        DescriptionResponse = 0x0204,
        /// `CONNECT_REQUEST` - Connection request
        ConnectRequest = 0x0205,
        /// `CONNECT_RESPONSE` - Connection response
        ConnectResponse = 0x0206,
        /// `CONNECTIONSTATE_REQUEST` - Connection state request (heartbeat)
        ConnectionStateRequest = 0x0207,
        /// `CONNECTIONSTATE_RESPONSE` - Connection state response
        ConnectionStateResponse = 0x0208,
        /// `DISCONNECT_REQUEST` - Disconnect request
        DisconnectRequest = 0x0209,
        /// `DISCONNECT_RESPONSE` - Disconnect response
        DisconnectResponse = 0x020A,
        /// `SEARCH_REQUEST_EXTENDED` - Core v2 discovery request
        SearchRequestExtended = 0x020B,
        /// `SEARCH_RESPONSE_EXTENDED` - Core v2 discovery response
        SearchResponseExtended = 0x020C,
        /// `DEVICE_CONFIGURATION_REQUEST`
        DeviceConfigurationRequest = 0x0310,
        /// `DEVICE_CONFIGURATION_ACK`
        DeviceConfigurationAck = 0x0311,
        /// `TUNNELLING_REQUEST` - Tunnelling data request
        TunnelingRequest = 0x0420,
        /// `TUNNELLING_ACK` - Tunnelling acknowledgement
        TunnelingAck = 0x0421,
    }
}

// =============================================================================
// Structure Code Tags
// =============================================================================

wire_enum! {
    /// Host protocol code of an endpoint descriptor (HPAI)
    pub enum HostProtocol: u8 {
        /// IPv4 UDP
        Ipv4Udp = 0x01,
        /// IPv4 TCP
        Ipv4Tcp = 0x02,
    }
}

wire_enum! {
    /// Connection type code of a CRI/CRD
    pub enum ConnectionType: u8 {
        /// `DEVICE_MGMT_CONNECTION`
        DeviceManagement = 0x03,
        /// `TUNNEL_CONNECTION`
        Tunnel = 0x04,
        /// `REMLOG_CONNECTION`
        RemoteLogging = 0x06,
        /// `REMCONF_CONNECTION`
        RemoteConfiguration = 0x07,
        /// `OBJSVR_CONNECTION`
        ObjectServer = 0x08,
    }
}

wire_enum! {
    /// Description type code of a DIB
    pub enum DescriptionType: u8 {
        /// Device information
        DeviceInfo = 0x01,
        /// Supported service families
        SupportedServiceFamilies = 0x02,
        /// IP configuration
        IpConfig = 0x03,
        /// Current IP configuration
        CurrentIpConfig = 0x04,
        /// KNX addresses
        KnxAddresses = 0x05,
        /// Secured service families
        SecuredServiceFamilies = 0x06,
        /// Tunneling information (extended search response only)
        TunnelingInfo = 0x07,
        /// Extended device information
        ExtendedDeviceInfo = 0x08,
        /// Manufacturer specific data
        ManufacturerData = 0xFE,
    }
}

wire_enum! {
    /// Search parameter type code of an SRP (without the mandatory bit)
    pub enum SearchParameterType: u8 {
        /// Reserved, never valid on the wire
        Invalid = 0x00,
        /// Only servers in programming mode answer
        SelectByProgrammingMode = 0x01,
        /// Only the server with this MAC address answers
        SelectByMacAddress = 0x02,
        /// Only servers supporting a service family version answer
        SelectByService = 0x03,
        /// Ask for additional DIBs in the response
        RequestDibs = 0x04,
    }
}

// =============================================================================
// Service Families, Layers, Media
// =============================================================================

wire_enum! {
    /// KNXnet/IP service family identifiers
    pub enum ServiceFamily: u8 {
        /// Core
        Core = 0x02,
        /// Device management
        DeviceManagement = 0x03,
        /// Tunnelling
        IpTunneling = 0x04,
        /// Routing
        IpRouting = 0x05,
        /// Remote logging
        RemoteLogging = 0x06,
        /// Remote configuration and diagnosis
        RemoteConfigAndDiagnosis = 0x07,
        /// Object server
        ObjectServer = 0x08,
        /// KNXnet/IP secure
        Security = 0x09,
    }
}

wire_enum! {
    /// Tunnel connection layer carried in a tunnel CRI
    pub enum TunnelLayer: u8 {
        /// Data link layer tunnel
        Link = 0x02,
        /// Raw tunnel
        Raw = 0x04,
        /// Bus monitor tunnel, receive only
        Busmonitor = 0x80,
    }
}

wire_enum! {
    /// KNX medium codes of the device information DIB
    pub enum KnxMedium: u8 {
        /// TP1
        Tp1 = 0x02,
        /// PL110
        Pl110 = 0x04,
        /// RF
        Rf = 0x10,
        /// KNX IP
        NetIp = 0x20,
    }
}

wire_enum! {
    /// IP address assignment methods (IP config DIBs)
    pub enum AssignmentMethod: u8 {
        /// Manually configured
        Manual = 0x01,
        /// BootP
        BootP = 0x02,
        /// DHCP
        Dhcp = 0x04,
        /// AutoIP
        AutoIp = 0x08,
    }
}

// =============================================================================
// Status Codes
// =============================================================================

wire_enum! {
    /// Status codes of connect, connection state, disconnect and ack frames
    pub enum Status: u8 {
        /// `E_NO_ERROR`
        NoError = 0x00,
        /// `E_HOST_PROTOCOL_TYPE`
        HostProtocolType = 0x01,
        /// `E_VERSION_NOT_SUPPORTED`
        VersionNotSupported = 0x02,
        /// `E_SEQUENCE_NUMBER`
        SequenceNumber = 0x04,
        /// `E_CONNECTION_ID`
        ConnectionId = 0x21,
        /// `E_CONNECTION_TYPE`
        ConnectionType = 0x22,
        /// `E_CONNECTION_OPTION`
        ConnectionOption = 0x23,
        /// `E_NO_MORE_CONNECTIONS`
        NoMoreConnections = 0x24,
        /// `E_NO_MORE_UNIQUE_CONNECTIONS`
        NoMoreUniqueConnections = 0x25,
        /// `E_DATA_CONNECTION`
        DataConnection = 0x26,
        /// `E_KNX_CONNECTION`
        KnxConnection = 0x27,
        /// `E_TUNNELLING_LAYER`
        TunnelingLayer = 0x29,
    }
}

// =============================================================================
// Device Management
// =============================================================================

wire_enum! {
    /// cEMI message codes of local device management
    pub enum ManagementCode: u8 {
        /// `M_PropRead.req`
        PropertyReadRequest = 0xFC,
        /// `M_PropRead.con`
        PropertyReadConfirmation = 0xFB,
        /// `M_PropWrite.req`
        PropertyWriteRequest = 0xF6,
        /// `M_PropWrite.con`
        PropertyWriteConfirmation = 0xF5,
        /// `M_PropInfo.ind`
        PropertyInfoIndication = 0xF7,
        /// `M_FuncPropCommand.req`
        FunctionPropertyCommandRequest = 0xF8,
        /// `M_FuncPropStateRead.req`
        FunctionPropertyStateReadRequest = 0xF9,
        /// `M_FuncPropCommand.con` / `M_FuncPropStateRead.con`
        FunctionPropertyConfirmation = 0xFA,
        /// `M_Reset.req`
        ResetRequest = 0xF1,
        /// `M_Reset.ind`
        ResetIndication = 0xF0,
    }
}

wire_enum! {
    /// Error code of a negative property confirmation
    pub enum CemiServerError: u8 {
        /// Unknown error
        Unspecified = 0x00,
        /// Write value not allowed
        OutOfRange = 0x01,
        /// Write value too high
        OutOfMaxRange = 0x02,
        /// Write value too low
        OutOfMinRange = 0x03,
        /// Memory can not be written or only with fault
        Memory = 0x04,
        /// Write access to a read-only property
        ReadOnly = 0x05,
        /// Command not valid or not supported
        IllegalCommand = 0x06,
        /// Read or write access to a non existing property
        VoidDp = 0x07,
        /// Write access with a wrong data type
        TypeConflict = 0x08,
        /// Read or write access to a non existing property index
        PropertyIndexRangeError = 0x09,
        /// Property exists but can not be written at this moment
        ValueTemporarilyNotWriteable = 0x0A,
    }
}

// =============================================================================
// Code Tag Trait
// =============================================================================

/// A code family usable in a structure header.
///
/// Each family is disjoint: a raw byte that decodes in one family says nothing
/// about the others. Search parameters are the odd one out, with a mandatory
/// flag in bit 7 of the code byte and the length counted in 2-byte units.
pub trait CodeTag: Copy + Eq + core::fmt::Debug {
    /// Multiplier applied to the header's length byte.
    const LENGTH_UNIT: usize = 1;
    /// Bits of the code byte that hold the code itself.
    const CODE_MASK: u8 = 0xFF;

    /// Decode the code bits of a header byte.
    fn from_code(raw: u8) -> Option<Self>;
    /// Encode to the code bits of a header byte.
    fn to_code(self) -> u8;
    /// Whether the code may appear on the wire.
    fn is_valid_code(self) -> bool {
        true
    }
}

impl CodeTag for HostProtocol {
    fn from_code(raw: u8) -> Option<Self> {
        Self::from_raw(raw)
    }
    fn to_code(self) -> u8 {
        self.to_raw()
    }
}

impl CodeTag for ConnectionType {
    fn from_code(raw: u8) -> Option<Self> {
        Self::from_raw(raw)
    }
    fn to_code(self) -> u8 {
        self.to_raw()
    }
}

impl CodeTag for DescriptionType {
    fn from_code(raw: u8) -> Option<Self> {
        Self::from_raw(raw)
    }
    fn to_code(self) -> u8 {
        self.to_raw()
    }
}

impl CodeTag for SearchParameterType {
    const LENGTH_UNIT: usize = 2;
    const CODE_MASK: u8 = 0x7F;

    fn from_code(raw: u8) -> Option<Self> {
        Self::from_raw(raw)
    }
    fn to_code(self) -> u8 {
        self.to_raw()
    }
    fn is_valid_code(self) -> bool {
        self != Self::Invalid
    }
}
