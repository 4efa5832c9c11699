//! Generic header + payload codec shared by every KNXnet/IP sub-structure.
//!
//! HPAI, CRI, CRD, DIB and SRP blocks all start with the same header:
//!
//! ```text
//! ┌──────────────┬──────────────┬─────────────────────┐
//! │ Length       │ Code         │  Payload            │
//! │   (1 byte)   │   (1 byte)   │  (Length - 2 bytes) │
//! └──────────────┴──────────────┴─────────────────────┘
//! ```
//!
//! A length byte of `0xFF` announces the long form, where a 16-bit length
//! follows and the code moves to the fourth byte. The code byte is read in the
//! [`CodeTag`] family of the structure; search parameter blocks use bit 7 of
//! the code byte as the mandatory flag and count their length in 2-byte units.

use crate::error::{KnxError, Result};
use crate::protocol::constants::CodeTag;
use bytes::{BufMut, Bytes, BytesMut};
use core::fmt;

/// Length byte value announcing the 16-bit length form
const LONG_FORM_MARKER: u8 = 0xFF;

/// Largest fixed layout that fits a 1-byte length in every code family
const MAX_FIXED_PAYLOAD: usize = 252;

/// Mandatory flag of search parameter code bytes
const MANDATORY_BIT: u8 = 0x80;

/// Decoded header of a sub-structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StructHeader<C: CodeTag> {
    code: C,
    mandatory: bool,
    header_size: usize,
    total_size: usize,
}

impl<C: CodeTag> StructHeader<C> {
    /// Build a header for a payload of `data_size` bytes.
    ///
    /// # Errors
    ///
    /// Returns `PayloadTooLarge` if the size cannot be expressed.
    pub fn new(code: C, data_size: usize) -> Result<Self> {
        let header_size = if (data_size + 2) / C::LENGTH_UNIT < usize::from(LONG_FORM_MARKER) { 2 } else { 4 };
        let total_size = data_size + header_size;
        if total_size / C::LENGTH_UNIT > usize::from(u16::MAX) || total_size % C::LENGTH_UNIT != 0 {
            return Err(KnxError::payload_too_large());
        }
        Ok(Self { code, mandatory: false, header_size, total_size })
    }

    /// Decode a header starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidStructure` if the code does not belong to the family
    /// or the declared length is shorter than the header itself, and
    /// `BufferTooSmall` if the header does not fit into `data`.
    pub fn parse(data: &[u8], offset: usize) -> Result<Self> {
        let rest = data.get(offset..).ok_or_else(KnxError::buffer_too_small)?;
        let (raw_len, code_byte, header_size) = match rest {
            [LONG_FORM_MARKER, hi, lo, code, ..] => (usize::from(u16::from_be_bytes([*hi, *lo])), *code, 4),
            [LONG_FORM_MARKER, ..] => return Err(KnxError::buffer_too_small()),
            [len, code, ..] => (usize::from(*len), *code, 2),
            _ => return Err(KnxError::buffer_too_small()),
        };

        let code = C::from_code(code_byte & C::CODE_MASK)
            .filter(|code| code.is_valid_code())
            .ok_or_else(KnxError::invalid_structure)?;
        let total_size = raw_len * C::LENGTH_UNIT;
        if total_size < header_size {
            return Err(KnxError::invalid_structure());
        }

        Ok(Self {
            code,
            mandatory: C::CODE_MASK != 0xFF && code_byte & MANDATORY_BIT != 0,
            header_size,
            total_size,
        })
    }

    /// Structure code
    pub fn code(&self) -> C {
        self.code
    }

    /// Mandatory flag (search parameters only, always `false` elsewhere)
    pub fn is_mandatory(&self) -> bool {
        self.mandatory
    }

    /// Size of the header itself, 2 or 4 bytes
    pub fn size(&self) -> usize {
        self.header_size
    }

    /// Declared size of the whole structure
    pub fn total_size(&self) -> usize {
        self.total_size
    }

    /// Size of the payload following the header
    pub fn data_size(&self) -> usize {
        self.total_size - self.header_size
    }

    fn write(&self, buf: &mut BytesMut) {
        let units = self.total_size / C::LENGTH_UNIT;
        let mut code = self.code.to_code();
        if self.mandatory {
            code |= MANDATORY_BIT;
        }
        if self.header_size == 2 {
            // Below the long form marker, checked by `new`.
            buf.put_u8(units as u8);
        } else {
            buf.put_u8(LONG_FORM_MARKER);
            // Bounded to u16 by `new`.
            buf.put_u16(units as u16);
        }
        buf.put_u8(code);
    }
}

/// Immutable header + payload block.
///
/// Equality compares the full byte image.
#[derive(Clone)]
pub struct Struct<C: CodeTag> {
    header: StructHeader<C>,
    bytes: Bytes,
}

impl<C: CodeTag> Struct<C> {
    /// Start building a structure with the given code.
    pub fn builder(code: C) -> StructBuilder<C> {
        StructBuilder::new(code)
    }

    /// Short structure with a 1-byte length field.
    ///
    /// # Errors
    ///
    /// Returns `SizeMismatch` if the payload does not fit the length byte.
    pub(crate) fn from_payload(code: C, payload: &[u8]) -> Result<Self> {
        Self::flagged_from_payload(code, false, payload)
    }

    /// Same as [`from_payload`](Self::from_payload) with the mandatory flag
    /// of search parameter blocks.
    pub(crate) fn flagged_from_payload(code: C, mandatory: bool, payload: &[u8]) -> Result<Self> {
        let max = usize::from(LONG_FORM_MARKER - 1) * C::LENGTH_UNIT - 2;
        if payload.len() > max {
            return Err(KnxError::size_mismatch());
        }
        Ok(Self::short(code, mandatory, payload))
    }

    /// Short structure from a fixed layout, bounded at compile time.
    pub(crate) fn from_array<const N: usize>(code: C, payload: [u8; N]) -> Self {
        Self::flagged_from_array(code, false, payload)
    }

    /// Same as [`from_array`](Self::from_array) with the mandatory flag.
    pub(crate) fn flagged_from_array<const N: usize>(code: C, mandatory: bool, payload: [u8; N]) -> Self {
        const { assert!(N <= MAX_FIXED_PAYLOAD) };
        Self::short(code, mandatory, &payload)
    }

    fn short(code: C, mandatory: bool, payload: &[u8]) -> Self {
        let pad = (payload.len() + 2) % C::LENGTH_UNIT;
        let header = StructHeader {
            code,
            mandatory: mandatory && C::CODE_MASK != 0xFF,
            header_size: 2,
            total_size: payload.len() + 2 + pad,
        };

        let mut buf = BytesMut::with_capacity(header.total_size);
        header.write(&mut buf);
        buf.extend_from_slice(payload);
        buf.put_bytes(0, pad);
        Self { header, bytes: buf.freeze() }
    }

    /// Parse a structure starting at `offset`.
    ///
    /// Trailing bytes after the declared length are left untouched, so a
    /// sequence of structures can be walked with repeated calls.
    ///
    /// # Errors
    ///
    /// Returns an error if the header is invalid or the declared length runs
    /// past the end of `data`.
    pub fn parse(data: &Bytes, offset: usize) -> Result<Self> {
        let header = StructHeader::<C>::parse(data, offset)?;
        let end = offset
            .checked_add(header.total_size())
            .filter(|end| *end <= data.len())
            .ok_or_else(KnxError::size_mismatch)?;
        Ok(Self { header, bytes: data.slice(offset..end) })
    }

    /// Parse a structure that must fill `data` exactly.
    ///
    /// # Errors
    ///
    /// Returns `SizeMismatch` if the declared length disagrees with the
    /// buffer length.
    pub fn parse_exact(data: &Bytes) -> Result<Self> {
        let parsed = Self::parse(data, 0)?;
        if parsed.size() != data.len() {
            return Err(KnxError::size_mismatch());
        }
        Ok(parsed)
    }

    /// Parse every structure of `data` back to back.
    ///
    /// # Errors
    ///
    /// Fails as soon as one structure is invalid.
    pub fn parse_all(data: &Bytes) -> Result<Vec<Self>> {
        let mut offset = 0;
        let mut out = Vec::new();
        while offset < data.len() {
            let parsed = Self::parse(data, offset)?;
            offset += parsed.size();
            out.push(parsed);
        }
        Ok(out)
    }

    /// Decoded header
    pub fn header(&self) -> &StructHeader<C> {
        &self.header
    }

    /// Structure code
    pub fn code(&self) -> C {
        self.header.code
    }

    /// Mandatory flag of a search parameter block
    pub fn is_mandatory(&self) -> bool {
        self.header.mandatory
    }

    /// Total size including the header
    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    /// Payload size
    pub fn data_size(&self) -> usize {
        self.header.data_size()
    }

    /// Payload bytes after the header
    pub fn data(&self) -> Bytes {
        self.bytes.slice(self.header.size()..)
    }

    /// Payload byte at `index`
    pub fn data_byte(&self, index: usize) -> Option<u8> {
        self.bytes.get(self.header.size() + index).copied()
    }

    /// Full byte image, header included
    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    /// Header/payload size invariant
    pub fn is_valid(&self) -> bool {
        self.header.total_size() == self.header.size() + self.data_size()
            && self.bytes.len() == self.header.total_size()
    }
}

impl<C: CodeTag> PartialEq for Struct<C> {
    fn eq(&self, other: &Self) -> bool {
        self.bytes == other.bytes
    }
}

impl<C: CodeTag> Eq for Struct<C> {}

impl<C: CodeTag> core::hash::Hash for Struct<C> {
    fn hash<H: core::hash::Hasher>(&self, state: &mut H) {
        self.bytes.hash(state);
    }
}

impl<C: CodeTag> fmt::Debug for Struct<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Struct")
            .field("code", &self.header.code)
            .field("size", &self.size())
            .field("data", &format_args!("{:02x?}", &self.data()[..]))
            .finish()
    }
}

/// Accumulates a code and payload, then emits an immutable [`Struct`].
///
/// The length field is computed in [`build`](Self::build), so a builder can
/// never produce a header that disagrees with its payload.
#[derive(Debug, Clone)]
pub struct StructBuilder<C: CodeTag> {
    code: C,
    mandatory: bool,
    payload: BytesMut,
}

impl<C: CodeTag> StructBuilder<C> {
    /// New builder with an empty payload
    pub fn new(code: C) -> Self {
        Self { code, mandatory: false, payload: BytesMut::new() }
    }

    /// Set the mandatory flag (search parameter blocks only)
    #[must_use]
    pub fn mandatory(mut self, mandatory: bool) -> Self {
        self.mandatory = mandatory;
        self
    }

    /// Append one payload byte
    #[must_use]
    pub fn push(mut self, byte: u8) -> Self {
        self.payload.put_u8(byte);
        self
    }

    /// Append a big-endian 16-bit value
    #[must_use]
    pub fn push_u16(mut self, value: u16) -> Self {
        self.payload.put_u16(value);
        self
    }

    /// Append payload bytes
    #[must_use]
    pub fn extend(mut self, data: &[u8]) -> Self {
        self.payload.extend_from_slice(data);
        self
    }

    /// Emit the structure.
    ///
    /// Structures counted in 2-byte units get a zero pad byte when the
    /// payload leaves them odd-sized.
    ///
    /// # Errors
    ///
    /// Returns `InvalidStructure` for codes that may not appear on the wire
    /// and `PayloadTooLarge` for oversized payloads.
    pub fn build(mut self) -> Result<Struct<C>> {
        if !self.code.is_valid_code() {
            return Err(KnxError::invalid_structure());
        }
        if C::LENGTH_UNIT > 1 && self.payload.len() % C::LENGTH_UNIT != 0 {
            self.payload.put_u8(0);
        }

        let mut header = StructHeader::new(self.code, self.payload.len())?;
        header.mandatory = self.mandatory && C::CODE_MASK != 0xFF;

        let mut buf = BytesMut::with_capacity(header.total_size());
        header.write(&mut buf);
        buf.extend_from_slice(&self.payload);
        Ok(Struct { header, bytes: buf.freeze() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::constants::{DescriptionType, HostProtocol, SearchParameterType};

    #[test]
    fn test_parse_header_and_payload() {
        let data = Bytes::from_static(&[0x08, 0x01, 127, 0, 0, 1, 0x0E, 0x57]);
        let parsed = Struct::<HostProtocol>::parse(&data, 0).unwrap();

        assert_eq!(parsed.code(), HostProtocol::Ipv4Udp);
        assert_eq!(parsed.size(), 8);
        assert_eq!(parsed.header().size(), 2);
        assert_eq!(parsed.data_size(), 6);
        assert_eq!(&parsed.data()[..], &[127, 0, 0, 1, 0x0E, 0x57]);
        assert!(parsed.is_valid());
    }

    #[test]
    fn test_declared_length_past_buffer_end() {
        let data = Bytes::from_static(&[0x08, 0x01, 127, 0, 0, 1]);
        assert!(Struct::<HostProtocol>::parse(&data, 0).is_err());
    }

    #[test]
    fn test_declared_length_shorter_than_header() {
        let data = Bytes::from_static(&[0x01, 0x01, 0x00]);
        assert!(Struct::<HostProtocol>::parse(&data, 0).is_err());
    }

    #[test]
    fn test_parse_exact_rejects_trailing_bytes() {
        let data = Bytes::from_static(&[0x02, 0x01, 0xAA]);
        assert!(Struct::<HostProtocol>::parse(&data, 0).is_ok());
        assert!(Struct::<HostProtocol>::parse_exact(&data).is_err());
    }

    #[test]
    fn test_code_outside_family() {
        // 0x05 is a description type, not a host protocol.
        let data = Bytes::from_static(&[0x02, 0x05]);
        assert!(Struct::<HostProtocol>::parse(&data, 0).is_err());
        assert!(Struct::<DescriptionType>::parse(&data, 0).is_ok());
    }

    #[test]
    fn test_parse_at_offset() {
        let data = Bytes::from_static(&[0xAA, 0xBB, 0x04, 0x02, 0x02, 0x01]);
        let parsed = Struct::<DescriptionType>::parse(&data, 2).unwrap();
        assert_eq!(parsed.code(), DescriptionType::SupportedServiceFamilies);
        assert_eq!(&parsed.data()[..], &[0x02, 0x01]);
    }

    #[test]
    fn test_builder_recomputes_length() {
        let built = Struct::builder(DescriptionType::ManufacturerData)
            .push_u16(0x00C5)
            .extend(&[1, 2, 3])
            .build()
            .unwrap();
        assert_eq!(&built.bytes()[..], &[0x07, 0xFE, 0x00, 0xC5, 1, 2, 3]);

        let reparsed = Struct::<DescriptionType>::parse_exact(built.bytes()).unwrap();
        assert_eq!(reparsed, built);
    }

    #[test]
    fn test_long_form_header() {
        let payload = vec![0x55; 300];
        let built = Struct::builder(DescriptionType::ManufacturerData).extend(&payload).build().unwrap();
        assert_eq!(built.header().size(), 4);
        assert_eq!(built.size(), 304);
        assert_eq!(&built.bytes()[..4], &[0xFF, 0x01, 0x30, 0xFE]);

        let reparsed = Struct::<DescriptionType>::parse_exact(built.bytes()).unwrap();
        assert_eq!(reparsed.data_size(), 300);
    }

    #[test]
    fn test_search_parameter_units_and_mandatory_flag() {
        let built = Struct::builder(SearchParameterType::SelectByProgrammingMode)
            .mandatory(true)
            .build()
            .unwrap();
        // 2 bytes total -> length byte 1 in 2-byte units, bit 7 set on the code.
        assert_eq!(&built.bytes()[..], &[0x01, 0x81]);

        let reparsed = Struct::<SearchParameterType>::parse_exact(built.bytes()).unwrap();
        assert!(reparsed.is_mandatory());
        assert_eq!(reparsed.code(), SearchParameterType::SelectByProgrammingMode);
    }

    #[test]
    fn test_search_parameter_padding() {
        let built = Struct::builder(SearchParameterType::RequestDibs).push(0x01).build().unwrap();
        assert_eq!(&built.bytes()[..], &[0x02, 0x04, 0x01, 0x00]);
    }

    #[test]
    fn test_invalid_search_parameter_code() {
        assert!(Struct::builder(SearchParameterType::Invalid).build().is_err());
        let data = Bytes::from_static(&[0x01, 0x80]);
        assert!(Struct::<SearchParameterType>::parse(&data, 0).is_err());
    }

    #[test]
    fn test_parse_all() {
        let data = Bytes::from_static(&[0x02, 0x01, 0x04, 0x02, 0x02, 0x01]);
        let all = Struct::<DescriptionType>::parse_all(&data).unwrap();
        assert_eq!(all.len(), 2);

        let broken = Bytes::from_static(&[0x02, 0x01, 0x09, 0x02]);
        assert!(Struct::<DescriptionType>::parse_all(&broken).is_err());
    }
}
