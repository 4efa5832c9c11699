//! KNX Datapoint Types (DPT)
//!
//! A datapoint type fixes how the payload of a group telegram is laid out
//! and what it means. Every type is identified by a main number, which fixes
//! the byte layout, and a sub number, which fixes range and unit.
//!
//! [`DatapointType`] holds the raw bytes of one value together with its
//! [`DptInfo`]. Values are read and written through [`DatapointValue`]:
//!
//! ```
//! use knx_netip::dpt::{DatapointRegistry, DatapointValue};
//!
//! let registry = DatapointRegistry::standard();
//!
//! let mut scaling = registry.create_type_str("5.001")?;
//! scaling.set_value(&DatapointValue::Number(100.0))?;
//! assert_eq!(scaling.bytes(), &[0xFF]);
//!
//! // Out of range writes are rejected and leave the bytes alone
//! assert!(scaling.set_value(&DatapointValue::Number(120.0)).is_err());
//! assert_eq!(scaling.bytes(), &[0xFF]);
//! # Ok::<(), knx_netip::KnxError>(())
//! ```
//!
//! ## Supported DPT Families
//!
//! - **1, 2, 3** - switching, controlled switching, dimming and blinds
//! - **5, 6, 7, 8, 12, 13, 17, 20, 29** - integers and enumerations
//! - **9, 14** - KNX 2-byte float and IEEE single
//! - **10, 11, 19** - time of day, date, date and time
//! - **4, 16, 24, 28** - characters and strings
//! - **15, 18, 21, 22, 23, 26, 27, 6.020** - bit fields and composites

mod boolean;
mod composite;
mod datetime;
mod float;
mod numeric;
pub mod registry;
mod text;

pub use composite::AccessData;
pub use datetime::{Date, DateTime, DateTimeFlags, TimeOfDay};
pub use registry::{DatapointRegistry, DptInfo, Encoding, Range};

use crate::error::{KnxError, Result};
use core::fmt;
use core::str::FromStr;

/// Datapoint type identifier, `main.sub`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DptId {
    /// Main number
    pub main: u16,
    /// Sub number
    pub sub: u16,
}

impl DptId {
    /// Identifier for `main.sub`
    pub const fn new(main: u16, sub: u16) -> Self {
        Self { main, sub }
    }

    /// Split a numeric identifier: the last five decimal digits are the sub
    /// number, the leading digits the main number.
    ///
    /// Identifiers below `100_000` carry no main number and give `None`.
    pub fn from_number(id: u32) -> Option<Self> {
        if id < 100_000 {
            return None;
        }
        let main = u16::try_from(id / 100_000).ok()?;
        let sub = u16::try_from(id % 100_000).ok()?;
        Some(Self::new(main, sub))
    }

    /// Numeric form, `main * 100_000 + sub`
    pub fn number(&self) -> u32 {
        u32::from(self.main) * 100_000 + u32::from(self.sub)
    }
}

impl fmt::Display for DptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:03}", self.main, self.sub)
    }
}

impl FromStr for DptId {
    type Err = KnxError;

    /// Accepts `9.001`, `9`, `DPT-9` and `DPST-9-1`.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let upper = s.to_ascii_uppercase();
        let (main, sub) = if let Some(rest) = upper.strip_prefix("DPST-") {
            rest.split_once('-').ok_or_else(KnxError::unknown_dpt)?
        } else if let Some(rest) = upper.strip_prefix("DPT-") {
            (rest, "0")
        } else {
            upper.split_once('.').unwrap_or((upper.as_str(), "0"))
        };
        let main = main.parse().map_err(|_parse| KnxError::unknown_dpt())?;
        let sub = sub.parse().map_err(|_parse| KnxError::unknown_dpt())?;
        Ok(Self::new(main, sub))
    }
}

/// Decoded value of a datapoint.
///
/// Which variant a type reads and writes follows its [`Encoding`]:
/// integers come back as [`Integer`](Self::Integer) unless the type scales
/// them, in which case they come back as [`Number`](Self::Number).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DatapointValue {
    /// DPT 1
    Bool(bool),
    /// DPT 2
    Controlled {
        /// Control bit
        control: bool,
        /// Value bit
        value: bool,
    },
    /// DPT 3, step 0 means break
    Step {
        /// Direction, `true` is increase / down
        control: bool,
        /// Step code 0-7
        step: u8,
    },
    /// DPT 4
    Char(char),
    /// Unscaled integers and enumerations
    Integer(i64),
    /// Floats and scaled integers
    Number(f64),
    /// DPT 6.020
    Status {
        /// Status bits A-E, bit 4 is A
        flags: u8,
        /// Active mode 0-2
        mode: u8,
    },
    /// DPT 10
    Time(TimeOfDay),
    /// DPT 11
    Date(Date),
    /// DPT 19
    DateTime(DateTime),
    /// DPT 16, 24, 28
    Text(String),
    /// DPT 18
    Scene {
        /// Scene number 0-63
        number: u8,
        /// Learn rather than activate
        learn: bool,
    },
    /// DPT 26
    SceneInfo {
        /// Scene number 0-63
        number: u8,
        /// Scene is active
        active: bool,
    },
    /// DPT 15
    Access(AccessData),
    /// Bit sets (21, 22, 23, 27)
    Bits(u32),
}

impl DatapointValue {
    /// Numeric view of integer, float and boolean values
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            DatapointValue::Bool(b) => Some(f64::from(u8::from(b))),
            DatapointValue::Integer(i) => Some(i as f64),
            DatapointValue::Number(n) => Some(n),
            _ => None,
        }
    }
}

/// Bytes of one datapoint plus the type that gives them meaning.
///
/// Fixed size types always hold exactly [`size`](Self::size) bytes.
/// Variable size types (24, 28) hold the zero terminated string.
#[derive(Debug, Clone, PartialEq)]
pub struct DatapointType {
    info: DptInfo,
    bytes: Vec<u8>,
}

impl DatapointType {
    /// Zeroed datapoint of the given type
    pub fn new(info: DptInfo) -> Self {
        let size = info.encoding.size().max(1);
        Self { info, bytes: vec![0; size] }
    }

    /// Type description
    pub fn info(&self) -> &DptInfo {
        &self.info
    }

    /// Identifier
    pub fn id(&self) -> DptId {
        self.info.id()
    }

    /// Main number
    pub fn main_type(&self) -> u16 {
        self.info.main
    }

    /// Sub number
    pub fn sub_type(&self) -> u16 {
        self.info.sub
    }

    /// Byte size of the type, 0 for variable sized types
    pub fn size(&self) -> usize {
        self.info.encoding.size()
    }

    /// Whether the byte length varies with the value
    pub fn is_variable_size(&self) -> bool {
        self.info.encoding.is_variable()
    }

    /// Unit symbol
    pub fn unit(&self) -> &'static str {
        self.info.unit
    }

    /// Human readable description
    pub fn description(&self) -> &'static str {
        self.info.description
    }

    /// Smallest engineering value
    pub fn minimum(&self) -> f64 {
        self.info.range.minimum
    }

    /// Largest engineering value
    pub fn maximum(&self) -> f64 {
        self.info.range.maximum
    }

    /// Engineering units per raw step
    pub fn coefficient(&self) -> f64 {
        self.info.range.coefficient
    }

    /// Byte at `index`
    pub fn byte(&self, index: usize) -> Option<u8> {
        self.bytes.get(index).copied()
    }

    /// Overwrite the byte at `index`
    pub fn set_byte(&mut self, index: usize, value: u8) -> Result<()> {
        let byte = self.bytes.get_mut(index).ok_or_else(KnxError::dpt_size_mismatch)?;
        *byte = value;
        Ok(())
    }

    /// Raw bytes
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Replace the raw bytes.
    ///
    /// Fixed size types take exactly [`size`](Self::size) bytes, which may
    /// still encode an invalid value. Variable size types take only a well
    /// formed zero terminated string.
    pub fn set_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        if self.is_variable_size() {
            if text::decode(&self.info, bytes).is_none() {
                return Err(KnxError::invalid_dpt_data());
            }
        } else if bytes.len() != self.size() {
            return Err(KnxError::dpt_size_mismatch());
        }
        self.bytes.clear();
        self.bytes.extend_from_slice(bytes);
        Ok(())
    }

    /// Whether the bytes encode a value of this type
    pub fn is_valid(&self) -> bool {
        self.value().is_some()
    }

    /// Decoded value, `None` if the bytes are invalid for the type
    pub fn value(&self) -> Option<DatapointValue> {
        let info = &self.info;
        let bytes = self.bytes.as_slice();
        if !info.encoding.is_variable() && bytes.len() != info.encoding.size() {
            return None;
        }
        match info.encoding {
            Encoding::Bit | Encoding::ControlledBit | Encoding::ControlledStep => boolean::decode(info, bytes),
            Encoding::Character | Encoding::String14 | Encoding::VarString | Encoding::Utf8String => {
                text::decode(info, bytes)
            }
            Encoding::Unsigned8
            | Encoding::Signed8
            | Encoding::Unsigned16
            | Encoding::Signed16
            | Encoding::Unsigned32
            | Encoding::Signed32
            | Encoding::Signed64
            | Encoding::Enum8 => numeric::decode(info, bytes),
            Encoding::Float16 | Encoding::Float32 => float::decode(info, bytes),
            Encoding::TimeOfDay | Encoding::Date | Encoding::DateTime => datetime::decode(info, bytes),
            Encoding::StatusMode
            | Encoding::AccessData
            | Encoding::SceneControl
            | Encoding::SceneInfo
            | Encoding::BitSet8
            | Encoding::BitSet16
            | Encoding::TwoBitSet
            | Encoding::BitSet32 => composite::decode(info, bytes),
        }
    }

    /// Encode `value`.
    ///
    /// On error the bytes are left unchanged.
    pub fn set_value(&mut self, value: &DatapointValue) -> Result<()> {
        let info = &self.info;
        let bytes = match info.encoding {
            Encoding::Bit | Encoding::ControlledBit | Encoding::ControlledStep => boolean::encode(info, value),
            Encoding::Character | Encoding::String14 | Encoding::VarString | Encoding::Utf8String => {
                text::encode(info, value)
            }
            Encoding::Unsigned8
            | Encoding::Signed8
            | Encoding::Unsigned16
            | Encoding::Signed16
            | Encoding::Unsigned32
            | Encoding::Signed32
            | Encoding::Signed64
            | Encoding::Enum8 => numeric::encode(info, value),
            Encoding::Float16 | Encoding::Float32 => float::encode(info, value),
            Encoding::TimeOfDay | Encoding::Date | Encoding::DateTime => datetime::encode(info, value),
            Encoding::StatusMode
            | Encoding::AccessData
            | Encoding::SceneControl
            | Encoding::SceneInfo
            | Encoding::BitSet8
            | Encoding::BitSet16
            | Encoding::TwoBitSet
            | Encoding::BitSet32 => composite::encode(info, value),
        }?;
        self.bytes = bytes;
        Ok(())
    }
}

impl fmt::Display for DatapointType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.id(), self.info.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create(id: &str) -> DatapointType {
        DatapointRegistry::standard().create_type_str(id).unwrap()
    }

    #[test]
    fn test_id_parsing() {
        assert_eq!("9.001".parse::<DptId>().unwrap(), DptId::new(9, 1));
        assert_eq!("9".parse::<DptId>().unwrap(), DptId::new(9, 0));
        assert_eq!("DPT-14".parse::<DptId>().unwrap(), DptId::new(14, 0));
        assert_eq!("dpst-5-1".parse::<DptId>().unwrap(), DptId::new(5, 1));
        assert!("DPST-5".parse::<DptId>().is_err());
        assert!("9.x".parse::<DptId>().is_err());
        assert!("".parse::<DptId>().is_err());
    }

    #[test]
    fn test_id_number() {
        assert_eq!(DptId::from_number(900_001), Some(DptId::new(9, 1)));
        assert_eq!(DptId::from_number(2_201_000), Some(DptId::new(22, 1000)));
        assert_eq!(DptId::from_number(42), None);
        assert_eq!(DptId::new(13, 10).number(), 1_300_010);
        assert_eq!(DptId::new(7, 1).to_string(), "7.001");
    }

    #[test]
    fn test_new_is_zeroed() {
        let dpt = create("9.001");
        assert_eq!(dpt.bytes(), &[0, 0]);
        assert_eq!(dpt.value(), Some(DatapointValue::Number(0.0)));
        assert_eq!(dpt.size(), 2);
        assert_eq!(dpt.unit(), "°C");
        assert!((dpt.minimum() - -273.0).abs() < f64::EPSILON);
        assert_eq!(dpt.to_string(), "9.001 DPT_Value_Temp");
    }

    #[test]
    fn test_zeroed_date_is_invalid() {
        assert!(!create("11.001").is_valid());
    }

    #[test]
    fn test_byte_access() {
        let mut dpt = create("7.001");
        dpt.set_byte(1, 0x2A).unwrap();
        assert_eq!(dpt.byte(1), Some(0x2A));
        assert_eq!(dpt.byte(2), None);
        assert!(dpt.set_byte(2, 0).is_err());
        assert_eq!(dpt.value(), Some(DatapointValue::Integer(42)));
    }

    #[test]
    fn test_fixed_set_bytes_checks_length() {
        let mut dpt = create("9.001");
        let err = dpt.set_bytes(&[0x0C]).unwrap_err();
        assert!(matches!(err, KnxError::Dpt(ref e) if e.is_size_mismatch()));
        assert_eq!(dpt.bytes(), &[0, 0]);
        dpt.set_bytes(&[0x0C, 0x33]).unwrap();
        assert_eq!(dpt.value(), Some(DatapointValue::Number(21.5)));
    }

    #[test]
    fn test_set_value_error_keeps_bytes() {
        let mut dpt = create("5.001");
        dpt.set_value(&DatapointValue::Number(50.0)).unwrap();
        assert_eq!(dpt.bytes(), &[0x80]);
        let err = dpt.set_value(&DatapointValue::Number(-1.0)).unwrap_err();
        assert!(matches!(err, KnxError::Dpt(ref e) if e.is_out_of_range()));
        assert_eq!(dpt.bytes(), &[0x80]);
        assert!(dpt.set_value(&DatapointValue::Text("50".into())).is_err());
        assert_eq!(dpt.bytes(), &[0x80]);
    }

    #[test]
    fn test_variable_string() {
        let mut dpt = create("24.001");
        assert!(dpt.is_variable_size());
        assert_eq!(dpt.bytes(), &[0]);
        assert_eq!(dpt.value(), Some(DatapointValue::Text(String::new())));

        dpt.set_value(&DatapointValue::Text("Küche".into())).unwrap();
        assert_eq!(dpt.bytes(), &[b'K', 0xFC, b'c', b'h', b'e', 0]);

        assert!(dpt.set_bytes(b"open").is_err());
        dpt.set_bytes(b"open\0").unwrap();
        assert_eq!(dpt.value(), Some(DatapointValue::Text("open".into())));
    }

    #[test]
    fn test_as_f64() {
        assert_eq!(DatapointValue::Integer(-3).as_f64(), Some(-3.0));
        assert_eq!(DatapointValue::Bool(true).as_f64(), Some(1.0));
        assert_eq!(DatapointValue::Char('a').as_f64(), None);
    }
}
