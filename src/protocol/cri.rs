//! Connection Request Information (CRI) and Connection Response Data (CRD).
//!
//! Both blocks use the connection type code family. For tunnel connections
//! the CRI carries the requested layer and the CRD the individual address
//! assigned by the server:
//!
//! ```text
//! CRI (tunnel): [0x04][0x04][layer][reserved]
//! CRD (tunnel): [0x04][0x04][address:2]
//! other types:  [0x02][type]
//! ```

use crate::addressing::IndividualAddress;
use crate::error::Result;
use crate::protocol::constants::{ConnectionType, TunnelLayer};
use crate::protocol::structure::Struct;
use bytes::Bytes;

/// Connection Request Information.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Cri(Struct<ConnectionType>);

impl Cri {
    /// Size of a tunnel CRI
    pub const TUNNEL_SIZE: usize = 4;

    /// CRI without additional data.
    ///
    /// Tunnel CRIs built this way are invalid; use [`tunnel`](Self::tunnel).
    pub fn new(connection_type: ConnectionType) -> Self {
        Self(Struct::from_array(connection_type, []))
    }

    /// Tunnel CRI requesting `layer`
    pub fn tunnel(layer: TunnelLayer) -> Self {
        Self(Struct::from_array(ConnectionType::Tunnel, [layer.to_raw(), 0x00]))
    }

    /// Device management CRI
    pub fn device_management() -> Self {
        Self::new(ConnectionType::DeviceManagement)
    }

    /// CRI with arbitrary additional data
    ///
    /// # Errors
    ///
    /// Returns `SizeMismatch` if the data does not fit a 1-byte length.
    pub fn with_data(connection_type: ConnectionType, additional_data: &[u8]) -> Result<Self> {
        Struct::from_payload(connection_type, additional_data).map(Self)
    }

    /// Parse a CRI starting at `offset`
    ///
    /// # Errors
    ///
    /// Returns error if the structure header is invalid.
    pub fn parse(data: &Bytes, offset: usize) -> Result<Self> {
        Struct::parse(data, offset).map(Self)
    }

    /// Validity depends on the connection type.
    pub fn is_valid(&self) -> bool {
        match self.0.code() {
            ConnectionType::Tunnel => {
                self.0.size() == Self::TUNNEL_SIZE
                    && self.0.data_byte(0).and_then(TunnelLayer::from_raw).is_some()
            }
            ConnectionType::DeviceManagement
            | ConnectionType::RemoteLogging
            | ConnectionType::RemoteConfiguration
            | ConnectionType::ObjectServer => self.0.size() == 2,
        }
    }

    /// Connection type
    pub fn connection_type(&self) -> ConnectionType {
        self.0.code()
    }

    /// Requested tunnel layer of a valid tunnel CRI
    pub fn tunnel_layer(&self) -> Option<TunnelLayer> {
        if self.is_valid() && self.connection_type() == ConnectionType::Tunnel {
            self.0.data_byte(0).and_then(TunnelLayer::from_raw)
        } else {
            None
        }
    }

    /// Additional data after the header
    pub fn additional_data(&self) -> Bytes {
        self.0.data()
    }

    /// Full byte image
    pub fn bytes(&self) -> &Bytes {
        self.0.bytes()
    }

    /// Total size
    pub fn size(&self) -> usize {
        self.0.size()
    }
}

/// Connection Response Data.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Crd(Struct<ConnectionType>);

impl Crd {
    /// Size of a tunnel CRD
    pub const TUNNEL_SIZE: usize = 4;

    /// CRD without additional data
    pub fn new(connection_type: ConnectionType) -> Self {
        Self(Struct::from_array(connection_type, []))
    }

    /// Tunnel CRD assigning `address`
    pub fn tunnel(address: IndividualAddress) -> Self {
        Self(Struct::from_array(ConnectionType::Tunnel, address.to_bytes()))
    }

    /// Parse a CRD starting at `offset`
    ///
    /// # Errors
    ///
    /// Returns error if the structure header is invalid.
    pub fn parse(data: &Bytes, offset: usize) -> Result<Self> {
        Struct::parse(data, offset).map(Self)
    }

    /// Tunnel CRDs carry 2 bytes, the others none.
    pub fn is_valid(&self) -> bool {
        match self.0.code() {
            ConnectionType::Tunnel => self.0.size() == Self::TUNNEL_SIZE,
            _ => self.0.size() == 2,
        }
    }

    /// Connection type
    pub fn connection_type(&self) -> ConnectionType {
        self.0.code()
    }

    /// Individual address assigned to a tunnel connection
    pub fn individual_address(&self) -> Option<IndividualAddress> {
        if self.is_valid() && self.connection_type() == ConnectionType::Tunnel {
            IndividualAddress::from_slice(&self.0.data())
        } else {
            None
        }
    }

    /// Full byte image
    pub fn bytes(&self) -> &Bytes {
        self.0.bytes()
    }

    /// Total size
    pub fn size(&self) -> usize {
        self.0.size()
    }
}
