//! KNX individual addresses.
//!
//! Servers report their own individual address in the device information
//! block, tunnel connections are assigned one in the connect response data,
//! and the KNX addresses / tunneling info blocks carry lists of them.
//!
//! Format: `Area.Line.Device` packed as `AAAA LLLL DDDD DDDD`.

use crate::error::{KnxError, Result};
use core::fmt;

/// KNX individual address (`Area.Line.Device`).
///
/// # Examples
///
/// ```
/// use knx_netip::IndividualAddress;
///
/// let addr = IndividualAddress::new(1, 1, 5)?;
/// assert_eq!(addr.to_string(), "1.1.5");
/// assert_eq!(addr.raw(), 0x1105);
///
/// let parsed: IndividualAddress = "15.15.255".parse()?;
/// assert_eq!(parsed.to_bytes(), [0xFF, 0xFF]);
/// # Ok::<(), knx_netip::KnxError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IndividualAddress {
    raw: u16,
}

impl IndividualAddress {
    /// Maximum area value (4 bits)
    pub const MAX_AREA: u8 = 15;
    /// Maximum line value (4 bits)
    pub const MAX_LINE: u8 = 15;
    /// Size of the wire encoding
    pub const SIZE: usize = 2;

    /// Create an address from its components.
    ///
    /// # Errors
    ///
    /// Returns an addressing error if area or line exceed 4 bits.
    pub fn new(area: u8, line: u8, device: u8) -> Result<Self> {
        if area > Self::MAX_AREA || line > Self::MAX_LINE {
            return Err(KnxError::address_out_of_range());
        }
        Ok(Self {
            raw: (u16::from(area) << 12) | (u16::from(line) << 8) | u16::from(device),
        })
    }

    /// Raw 16-bit value.
    #[inline(always)]
    pub const fn raw(self) -> u16 {
        self.raw
    }

    /// Area component (0-15).
    #[inline(always)]
    pub const fn area(self) -> u8 {
        (self.raw >> 12) as u8 & 0x0F
    }

    /// Line component (0-15).
    #[inline(always)]
    pub const fn line(self) -> u8 {
        (self.raw >> 8) as u8 & 0x0F
    }

    /// Device component (0-255).
    #[inline(always)]
    pub const fn device(self) -> u8 {
        self.raw as u8
    }

    /// Big-endian wire bytes.
    pub const fn to_bytes(self) -> [u8; 2] {
        self.raw.to_be_bytes()
    }

    /// Read an address from the first two bytes of `data`.
    pub fn from_slice(data: &[u8]) -> Option<Self> {
        match data {
            [hi, lo, ..] => Some(Self::from(u16::from_be_bytes([*hi, *lo]))),
            _ => None,
        }
    }
}

impl fmt::Display for IndividualAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.area(), self.line(), self.device())
    }
}

impl From<u16> for IndividualAddress {
    #[inline(always)]
    fn from(raw: u16) -> Self {
        Self { raw }
    }
}

impl From<IndividualAddress> for u16 {
    #[inline(always)]
    fn from(addr: IndividualAddress) -> u16 {
        addr.raw
    }
}

impl core::str::FromStr for IndividualAddress {
    type Err = KnxError;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.split('.').map(|part| part.parse::<u8>().ok());
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(Some(area)), Some(Some(line)), Some(Some(device)), None) => {
                Self::new(area, line, device)
            }
            _ => Err(KnxError::invalid_individual_address()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_components() {
        let addr = IndividualAddress::new(1, 2, 3).unwrap();
        assert_eq!((addr.area(), addr.line(), addr.device()), (1, 2, 3));
        assert_eq!(u16::from(addr), 0x1203);
    }

    #[test]
    fn test_out_of_range() {
        assert!(IndividualAddress::new(16, 0, 0).is_err());
        assert!(IndividualAddress::new(0, 16, 0).is_err());
    }

    #[test]
    fn test_from_slice() {
        assert_eq!(
            IndividualAddress::from_slice(&[0x11, 0x05, 0xAA]),
            Some(IndividualAddress::from(0x1105))
        );
        assert_eq!(IndividualAddress::from_slice(&[0x11]), None);
    }

    #[test]
    fn test_parse() {
        let addr: IndividualAddress = "1.1.250".parse().unwrap();
        assert_eq!(addr.to_bytes(), [0x11, 0xFA]);
        assert!("1.2".parse::<IndividualAddress>().is_err());
        assert!("16.0.0".parse::<IndividualAddress>().is_err());
        assert!("1.2.3.4".parse::<IndividualAddress>().is_err());
        assert!("a.b.c".parse::<IndividualAddress>().is_err());
        assert!("".parse::<IndividualAddress>().is_err());
    }
}
