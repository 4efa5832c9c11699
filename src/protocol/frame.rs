//! KNXnet/IP frame parsing and encoding.
//!
//! All KNXnet/IP frames follow this structure:
//!
//! ```text
//! ┌─────────────────────────────┐
//! │  Header (6 bytes)           │
//! │  - Header Length: 0x06      │
//! │  - Protocol Version: 0x10   │
//! │  - Service Type: 2 bytes    │
//! │  - Total Length: 2 bytes    │
//! ├─────────────────────────────┤
//! │  Body (variable)            │
//! │  - Service-specific data    │
//! └─────────────────────────────┘
//! ```
//!
//! The generic parser only checks the header. Per-service minimum sizes are
//! enforced by the service views, which know the layout of their body.
//!
//! ## Example
//!
//! ```rust
//! use bytes::Bytes;
//! use knx_netip::protocol::constants::ServiceType;
//! use knx_netip::protocol::frame::Frame;
//!
//! let datagram = Bytes::from_static(&[0x06, 0x10, 0x02, 0x0A, 0x00, 0x08, 0x15, 0x00]);
//! let frame = Frame::parse(&datagram, 0)?;
//!
//! assert_eq!(frame.service_type(), ServiceType::DisconnectResponse);
//! assert_eq!(&frame.body()[..], &[0x15, 0x00]);
//! # Ok::<(), knx_netip::KnxError>(())
//! ```

use crate::error::{KnxError, Result};
use crate::protocol::constants::{CodeTag, ServiceType, HEADER_SIZE_10, KNXNETIP_VERSION_10};
use crate::protocol::structure::Struct;
use bytes::{BufMut, Bytes, BytesMut};

/// KNXnet/IP frame header (6 bytes)
///
/// ```text
/// ┌──────────────┬──────────────┬─────────────────────┐
/// │ Header Len   │ Protocol Ver │  Service Type ID    │
/// │   (1 byte)   │   (1 byte)   │     (2 bytes)       │
/// ├──────────────┴──────────────┴─────────────────────┤
/// │           Total Length (2 bytes)                   │
/// └────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FrameHeader {
    /// Service type identifier
    pub service_type: ServiceType,
    /// Total length of frame (header + body)
    pub total_length: u16,
}

impl FrameHeader {
    /// Size of the header in bytes
    pub const SIZE: usize = HEADER_SIZE_10 as usize;

    /// Create a header for a body of `body_length` bytes
    pub const fn new(service_type: ServiceType, body_length: u16) -> Self {
        Self {
            service_type,
            total_length: Self::SIZE as u16 + body_length,
        }
    }

    /// Parse a header starting at `offset`
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Buffer is too small
    /// - Header length is invalid
    /// - Protocol version is unsupported
    /// - Service type is unknown
    pub fn parse(data: &[u8], offset: usize) -> Result<Self> {
        let Some(&[header_length, version, st_hi, st_lo, len_hi, len_lo]) =
            data.get(offset..).and_then(|rest| rest.first_chunk::<{ Self::SIZE }>())
        else {
            return Err(KnxError::buffer_too_small());
        };

        if header_length != HEADER_SIZE_10 {
            return Err(KnxError::invalid_frame());
        }

        if version != KNXNETIP_VERSION_10 {
            return Err(KnxError::unsupported_version());
        }

        let service_type = ServiceType::from_raw(u16::from_be_bytes([st_hi, st_lo]))
            .ok_or_else(KnxError::unsupported_service_type)?;
        let total_length = u16::from_be_bytes([len_hi, len_lo]);

        if usize::from(total_length) < Self::SIZE {
            return Err(KnxError::size_mismatch());
        }

        Ok(Self { service_type, total_length })
    }

    /// Append the header to `buf`
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(HEADER_SIZE_10);
        buf.put_u8(KNXNETIP_VERSION_10);
        buf.put_u16(self.service_type.to_raw());
        buf.put_u16(self.total_length);
    }

    /// Get the expected body length from the header
    pub const fn body_length(&self) -> u16 {
        self.total_length.saturating_sub(Self::SIZE as u16)
    }
}

/// Immutable KNXnet/IP frame.
///
/// Holds the full byte image; the body is a cheap slice of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    header: FrameHeader,
    bytes: Bytes,
}

impl Frame {
    /// Parse a frame starting at `offset`.
    ///
    /// Bytes past the declared total length are ignored.
    ///
    /// # Errors
    ///
    /// Returns error if the header is invalid or the frame is incomplete.
    pub fn parse(data: &Bytes, offset: usize) -> Result<Self> {
        let header = FrameHeader::parse(data, offset)?;
        let end = offset + usize::from(header.total_length);
        if end > data.len() {
            return Err(KnxError::size_mismatch());
        }
        Ok(Self { header, bytes: data.slice(offset..end) })
    }

    /// Parse a received datagram.
    ///
    /// # Errors
    ///
    /// Same as [`parse`](Self::parse).
    pub fn from_datagram(data: &[u8]) -> Result<Self> {
        Self::parse(&Bytes::copy_from_slice(data), 0)
    }

    /// Start building a frame for `service_type`.
    pub fn builder(service_type: ServiceType) -> FrameBuilder {
        FrameBuilder::new(service_type)
    }

    /// Frame header
    pub const fn header(&self) -> &FrameHeader {
        &self.header
    }

    /// Service type
    pub const fn service_type(&self) -> ServiceType {
        self.header.service_type
    }

    /// Total size in bytes
    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    /// Body after the 6-byte header
    pub fn body(&self) -> Bytes {
        self.bytes.slice(FrameHeader::SIZE..)
    }

    /// Body byte at `index`
    pub fn body_byte(&self, index: usize) -> Option<u8> {
        self.bytes.get(FrameHeader::SIZE + index).copied()
    }

    /// Complete frame including the header
    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    /// Total length invariant
    pub fn is_valid(&self) -> bool {
        usize::from(self.header.total_length) == self.bytes.len()
    }
}

/// Builder for KNXnet/IP frames.
///
/// The total length is computed on [`build`](Self::build).
#[derive(Debug, Clone)]
pub struct FrameBuilder {
    service_type: ServiceType,
    body: BytesMut,
}

impl FrameBuilder {
    /// Create a new frame builder with an empty body
    pub fn new(service_type: ServiceType) -> Self {
        Self { service_type, body: BytesMut::new() }
    }

    /// Append one byte
    #[must_use]
    pub fn push(mut self, byte: u8) -> Self {
        self.body.put_u8(byte);
        self
    }

    /// Append raw bytes
    #[must_use]
    pub fn extend(mut self, data: &[u8]) -> Self {
        self.body.extend_from_slice(data);
        self
    }

    /// Append the byte image of a sub-structure
    #[must_use]
    pub fn append<C: CodeTag>(self, structure: &Struct<C>) -> Self {
        self.extend(structure.bytes())
    }

    /// Build the frame
    ///
    /// # Errors
    ///
    /// Returns `PayloadTooLarge` if the total length does not fit 16 bits.
    pub fn build(self) -> Result<Frame> {
        let body_length = u16::try_from(self.body.len())
            .ok()
            .filter(|len| usize::from(*len) + FrameHeader::SIZE <= usize::from(u16::MAX))
            .ok_or_else(KnxError::payload_too_large)?;
        let header = FrameHeader::new(self.service_type, body_length);

        let mut buf = BytesMut::with_capacity(usize::from(header.total_length));
        header.encode(&mut buf);
        buf.extend_from_slice(&self.body);
        Ok(Frame { header, bytes: buf.freeze() })
    }
}
