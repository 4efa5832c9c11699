//! cEMI local device management messages.
//!
//! Device management connections carry these messages inside
//! `DEVICE_CONFIGURATION_REQUEST` frames. The first byte is the message code,
//! which selects the layout of the rest:
//!
//! ```text
//! property read/write/info:  [code][object type:2][instance][property][count:4|start:12][data...]
//! function property:         [code][object type:2][instance][property][data...]
//! reset:                     [code]
//! ```
//!
//! A property confirmation with a count of 0 is negative: its only data byte
//! is a [`CemiServerError`].
//!
//! ## Example
//!
//! ```rust
//! use knx_netip::protocol::management::{ManagementFrame, PropertyAddress};
//!
//! // Read the first element of PID_SERIAL_NUMBER (11) of the device object
//! let request = ManagementFrame::property_read(PropertyAddress::new(0, 1, 11), 1, 1)?;
//! assert_eq!(&request.bytes()[..], &[0xFC, 0x00, 0x00, 0x01, 0x0B, 0x10, 0x01]);
//! # Ok::<(), knx_netip::KnxError>(())
//! ```

use crate::error::{KnxError, Result};
use crate::protocol::constants::{CemiServerError, ManagementCode};
use bytes::{BufMut, Bytes, BytesMut};

/// Bytes before the data of a property message
const PROPERTY_HEADER: usize = 7;
/// Bytes before the data of a function property message
const FUNCTION_HEADER: usize = 5;
/// Largest element count (4 bits)
pub const MAX_ELEMENTS: u8 = 0x0F;
/// Largest start index (12 bits)
pub const MAX_START_INDEX: u16 = 0x0FFF;

/// Interface object property selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PropertyAddress {
    /// Interface object type
    pub object_type: u16,
    /// Object instance, starting at 1
    pub object_instance: u8,
    /// Property identifier
    pub property_id: u8,
}

impl PropertyAddress {
    /// Create a new selector
    pub const fn new(object_type: u16, object_instance: u8, property_id: u8) -> Self {
        Self { object_type, object_instance, property_id }
    }

    fn put(&self, buf: &mut BytesMut) {
        buf.put_u16(self.object_type);
        buf.put_u8(self.object_instance);
        buf.put_u8(self.property_id);
    }
}

/// Device management message.
///
/// Read accessors return `None` when the message is too short or its code
/// has no such field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ManagementFrame {
    code: ManagementCode,
    bytes: Bytes,
}

impl ManagementFrame {
    /// Wrap a received message.
    ///
    /// # Errors
    ///
    /// Returns `InvalidMessageCode` if the first byte is not a device
    /// management code, `BufferTooSmall` for an empty buffer.
    pub fn parse(bytes: Bytes) -> Result<Self> {
        let first = *bytes.first().ok_or_else(KnxError::buffer_too_small)?;
        let code = ManagementCode::from_raw(first).ok_or_else(KnxError::invalid_message_code)?;
        Ok(Self { code, bytes })
    }

    fn property(code: ManagementCode, address: PropertyAddress, count: u8, start: u16, data: &[u8]) -> Result<Self> {
        if count > MAX_ELEMENTS || start > MAX_START_INDEX {
            return Err(KnxError::invalid_structure());
        }
        let mut buf = BytesMut::with_capacity(PROPERTY_HEADER + data.len());
        buf.put_u8(code.to_raw());
        address.put(&mut buf);
        buf.put_u16((u16::from(count) << 12) | start);
        buf.extend_from_slice(data);
        Ok(Self { code, bytes: buf.freeze() })
    }

    fn function(code: ManagementCode, address: PropertyAddress, data: &[u8]) -> Self {
        let mut buf = BytesMut::with_capacity(FUNCTION_HEADER + data.len());
        buf.put_u8(code.to_raw());
        address.put(&mut buf);
        buf.extend_from_slice(data);
        Self { code, bytes: buf.freeze() }
    }

    /// `M_PropRead.req` for `count` elements from `start`
    pub fn property_read(address: PropertyAddress, count: u8, start: u16) -> Result<Self> {
        Self::property(ManagementCode::PropertyReadRequest, address, count, start, &[])
    }

    /// `M_PropRead.con` carrying the read elements
    pub fn property_read_confirmation(address: PropertyAddress, count: u8, start: u16, data: &[u8]) -> Result<Self> {
        Self::property(ManagementCode::PropertyReadConfirmation, address, count, start, data)
    }

    /// `M_PropWrite.req` writing `data` as `count` elements from `start`
    pub fn property_write(address: PropertyAddress, count: u8, start: u16, data: &[u8]) -> Result<Self> {
        if count == 0 || data.is_empty() {
            return Err(KnxError::invalid_structure());
        }
        Self::property(ManagementCode::PropertyWriteRequest, address, count, start, data)
    }

    /// Positive `M_PropWrite.con`
    pub fn property_write_confirmation(address: PropertyAddress, count: u8, start: u16) -> Result<Self> {
        Self::property(ManagementCode::PropertyWriteConfirmation, address, count, start, &[])
    }

    /// `M_PropInfo.ind` announcing a changed property value
    pub fn property_info_indication(address: PropertyAddress, count: u8, start: u16, data: &[u8]) -> Result<Self> {
        Self::property(ManagementCode::PropertyInfoIndication, address, count, start, data)
    }

    /// Negative read or write confirmation carrying `error`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidMessageCode` unless `code` is a property confirmation.
    pub fn negative_confirmation(
        code: ManagementCode,
        address: PropertyAddress,
        start: u16,
        error: CemiServerError,
    ) -> Result<Self> {
        match code {
            ManagementCode::PropertyReadConfirmation | ManagementCode::PropertyWriteConfirmation => {
                Self::property(code, address, 0, start, &[error.to_raw()])
            }
            _ => Err(KnxError::invalid_message_code()),
        }
    }

    /// `M_FuncPropCommand.req`
    pub fn function_property_command(address: PropertyAddress, data: &[u8]) -> Self {
        Self::function(ManagementCode::FunctionPropertyCommandRequest, address, data)
    }

    /// `M_FuncPropStateRead.req`
    pub fn function_property_state_read(address: PropertyAddress, data: &[u8]) -> Self {
        Self::function(ManagementCode::FunctionPropertyStateReadRequest, address, data)
    }

    /// `M_FuncPropCommand.con`, return code first in `data`
    pub fn function_property_confirmation(address: PropertyAddress, data: &[u8]) -> Self {
        Self::function(ManagementCode::FunctionPropertyConfirmation, address, data)
    }

    /// `M_Reset.req`
    pub fn reset_request() -> Self {
        Self::reset(ManagementCode::ResetRequest)
    }

    /// `M_Reset.ind`
    pub fn reset_indication() -> Self {
        Self::reset(ManagementCode::ResetIndication)
    }

    fn reset(code: ManagementCode) -> Self {
        Self { code, bytes: Bytes::copy_from_slice(&[code.to_raw()]) }
    }

    /// Message code
    pub fn message_code(&self) -> ManagementCode {
        self.code
    }

    const fn is_property(&self) -> bool {
        matches!(
            self.code,
            ManagementCode::PropertyReadRequest
                | ManagementCode::PropertyReadConfirmation
                | ManagementCode::PropertyWriteRequest
                | ManagementCode::PropertyWriteConfirmation
                | ManagementCode::PropertyInfoIndication
        )
    }

    const fn is_function(&self) -> bool {
        matches!(
            self.code,
            ManagementCode::FunctionPropertyCommandRequest
                | ManagementCode::FunctionPropertyStateReadRequest
                | ManagementCode::FunctionPropertyConfirmation
        )
    }

    /// Object type, instance and property
    pub fn property_address(&self) -> Option<PropertyAddress> {
        if !self.is_property() && !self.is_function() {
            return None;
        }
        match self.bytes[..] {
            [_, ot_hi, ot_lo, instance, property, ..] => {
                Some(PropertyAddress::new(u16::from_be_bytes([ot_hi, ot_lo]), instance, property))
            }
            _ => None,
        }
    }

    fn count_and_index(&self) -> Option<u16> {
        if !self.is_property() {
            return None;
        }
        match self.bytes[..] {
            [_, _, _, _, _, hi, lo, ..] => Some(u16::from_be_bytes([hi, lo])),
            _ => None,
        }
    }

    /// Number of elements (4 bits)
    pub fn number_of_elements(&self) -> Option<u8> {
        self.count_and_index().map(|raw| (raw >> 12) as u8)
    }

    /// Start index (12 bits)
    pub fn start_index(&self) -> Option<u16> {
        self.count_and_index().map(|raw| raw & MAX_START_INDEX)
    }

    /// Bytes after the fixed fields; empty for resets and short messages
    pub fn data(&self) -> Bytes {
        let offset = if self.is_property() {
            PROPERTY_HEADER
        } else if self.is_function() {
            FUNCTION_HEADER
        } else {
            return Bytes::new();
        };
        if self.bytes.len() < offset {
            return Bytes::new();
        }
        self.bytes.slice(offset..)
    }

    /// Property confirmation with a count of 0
    pub fn is_negative_confirmation(&self) -> bool {
        matches!(
            self.code,
            ManagementCode::PropertyReadConfirmation | ManagementCode::PropertyWriteConfirmation
        ) && self.number_of_elements() == Some(0)
    }

    /// Error code of a negative confirmation
    pub fn error(&self) -> Option<CemiServerError> {
        if !self.is_negative_confirmation() {
            return None;
        }
        match self.data()[..] {
            [code] => CemiServerError::from_raw(code),
            _ => None,
        }
    }

    /// Length matches the layout of the message code
    pub fn is_valid(&self) -> bool {
        let len = self.bytes.len();
        match self.code {
            ManagementCode::ResetRequest | ManagementCode::ResetIndication => len == 1,
            ManagementCode::PropertyReadRequest => len == PROPERTY_HEADER,
            ManagementCode::PropertyReadConfirmation | ManagementCode::PropertyWriteConfirmation
                if self.is_negative_confirmation() =>
            {
                len == PROPERTY_HEADER + 1
            }
            ManagementCode::PropertyWriteConfirmation => len == PROPERTY_HEADER,
            ManagementCode::PropertyWriteRequest => {
                len > PROPERTY_HEADER && self.number_of_elements().is_some_and(|count| count > 0)
            }
            ManagementCode::PropertyReadConfirmation | ManagementCode::PropertyInfoIndication => {
                len >= PROPERTY_HEADER
            }
            ManagementCode::FunctionPropertyCommandRequest
            | ManagementCode::FunctionPropertyStateReadRequest
            | ManagementCode::FunctionPropertyConfirmation => len >= FUNCTION_HEADER,
        }
    }

    /// Encoded message
    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEVICE_SERIAL: PropertyAddress = PropertyAddress::new(0x0000, 1, 11);

    #[test]
    fn test_property_read_layout() {
        let frame = ManagementFrame::property_read(PropertyAddress::new(0x000B, 1, 52), 1, 0x123).unwrap();
        assert_eq!(&frame.bytes()[..], &[0xFC, 0x00, 0x0B, 0x01, 0x34, 0x11, 0x23]);
        assert!(frame.is_valid());
        assert_eq!(frame.number_of_elements(), Some(1));
        assert_eq!(frame.start_index(), Some(0x123));
    }

    #[test]
    fn test_count_and_index_limits() {
        assert!(ManagementFrame::property_read(DEVICE_SERIAL, 16, 1).is_err());
        assert!(ManagementFrame::property_read(DEVICE_SERIAL, 1, 0x1000).is_err());
        assert!(ManagementFrame::property_read(DEVICE_SERIAL, 15, 0x0FFF).is_ok());
    }

    #[test]
    fn test_parse_read_confirmation() {
        let data = Bytes::from_static(&[0xFB, 0x00, 0x00, 0x01, 0x0B, 0x10, 0x01, 0x00, 0xC5, 0x01, 0x02, 0x03, 0x04]);
        let frame = ManagementFrame::parse(data).unwrap();
        assert_eq!(frame.message_code(), ManagementCode::PropertyReadConfirmation);
        assert_eq!(frame.property_address(), Some(DEVICE_SERIAL));
        assert!(!frame.is_negative_confirmation());
        assert_eq!(&frame.data()[..], &[0x00, 0xC5, 0x01, 0x02, 0x03, 0x04]);
        assert!(frame.is_valid());
    }

    #[test]
    fn test_negative_confirmation() {
        let frame = ManagementFrame::negative_confirmation(
            ManagementCode::PropertyWriteConfirmation,
            DEVICE_SERIAL,
            1,
            CemiServerError::ReadOnly,
        )
        .unwrap();
        assert_eq!(&frame.bytes()[..], &[0xF5, 0x00, 0x00, 0x01, 0x0B, 0x00, 0x01, 0x05]);
        assert!(frame.is_negative_confirmation());
        assert_eq!(frame.error(), Some(CemiServerError::ReadOnly));
        assert!(frame.is_valid());

        let not_a_confirmation = ManagementFrame::negative_confirmation(
            ManagementCode::PropertyReadRequest,
            DEVICE_SERIAL,
            1,
            CemiServerError::Unspecified,
        );
        assert!(not_a_confirmation.is_err());
    }

    #[test]
    fn test_property_write() {
        let frame = ManagementFrame::property_write(PropertyAddress::new(0x000B, 1, 51), 1, 1, &[0x00, 0x01]).unwrap();
        assert_eq!(frame.bytes().len(), 9);
        assert!(frame.is_valid());
        assert!(ManagementFrame::property_write(DEVICE_SERIAL, 0, 1, &[0x00]).is_err());
    }

    #[test]
    fn test_function_property() {
        let frame = ManagementFrame::function_property_command(PropertyAddress::new(0x000B, 1, 70), &[0x01, 0x02]);
        assert_eq!(&frame.bytes()[..], &[0xF8, 0x00, 0x0B, 0x01, 0x46, 0x01, 0x02]);
        assert_eq!(&frame.data()[..], &[0x01, 0x02]);
        assert_eq!(frame.number_of_elements(), None);
        assert!(frame.is_valid());
    }

    #[test]
    fn test_reset() {
        let frame = ManagementFrame::reset_request();
        assert_eq!(&frame.bytes()[..], &[0xF1]);
        assert!(frame.is_valid());
        assert!(frame.data().is_empty());
        assert_eq!(frame.property_address(), None);

        let long = ManagementFrame::parse(Bytes::from_static(&[0xF0, 0x00])).unwrap();
        assert!(!long.is_valid());
    }

    #[test]
    fn test_unknown_code() {
        assert!(ManagementFrame::parse(Bytes::from_static(&[0x29, 0x00])).is_err());
        assert!(ManagementFrame::parse(Bytes::new()).is_err());
    }

    #[test]
    fn test_truncated_property_is_invalid() {
        let frame = ManagementFrame::parse(Bytes::from_static(&[0xFC, 0x00, 0x00])).unwrap();
        assert!(!frame.is_valid());
        assert_eq!(frame.property_address(), None);
        assert_eq!(frame.start_index(), None);
        assert!(frame.data().is_empty());
    }
}
