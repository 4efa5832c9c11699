//! Bit fields and composite datapoint types
//!
//! - DPT 6.020: `ABCD EFFF`, five status bits and a one-hot mode (001, 010, 100)
//! - DPT 15: six BCD digits, then `EPDC IIII` (error, permission,
//!   direction, encryption, index)
//! - DPT 18: `L0NN NNNN`, learn bit and scene number
//! - DPT 26: `0INN NNNN`, inactive bit and scene number
//! - DPT 21, 22, 27: plain 8, 16 and 32 bit sets
//! - DPT 23: two bits

use super::{DatapointValue, DptInfo, Encoding};
use crate::error::{KnxError, Result};

/// Entrance access data (DPT 15)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AccessData {
    /// Access code, six decimal digits
    pub code: u32,
    /// Detection error
    pub error: bool,
    /// Access granted
    pub permission: bool,
    /// Read direction right to left
    pub right_to_left: bool,
    /// Code is encrypted
    pub encrypted: bool,
    /// Index of the access identification, 0-15
    pub index: u8,
}

impl AccessData {
    const MAX_CODE: u32 = 999_999;

    fn decode(bytes: [u8; 4]) -> Option<Self> {
        let mut code = 0u32;
        for nibble in bytes[..3].iter().flat_map(|b| [b >> 4, b & 0x0F]) {
            if nibble > 9 {
                return None;
            }
            code = code * 10 + u32::from(nibble);
        }
        let flags = bytes[3];
        Some(Self {
            code,
            error: flags & 0x80 != 0,
            permission: flags & 0x40 != 0,
            right_to_left: flags & 0x20 != 0,
            encrypted: flags & 0x10 != 0,
            index: flags & 0x0F,
        })
    }

    fn encode(&self) -> Result<[u8; 4]> {
        if self.code > Self::MAX_CODE || self.index > 0x0F {
            return Err(KnxError::dpt_value_out_of_range());
        }
        let mut bytes = [0u8; 4];
        let mut code = self.code;
        for byte in bytes[..3].iter_mut().rev() {
            let low = (code % 10) as u8;
            let high = (code / 10 % 10) as u8;
            *byte = (high << 4) | low;
            code /= 100;
        }
        bytes[3] = (u8::from(self.error) << 7)
            | (u8::from(self.permission) << 6)
            | (u8::from(self.right_to_left) << 5)
            | (u8::from(self.encrypted) << 4)
            | self.index;
        Ok(bytes)
    }
}

fn mode_index(mode_bits: u8) -> Option<u8> {
    match mode_bits {
        0b001 => Some(0),
        0b010 => Some(1),
        0b100 => Some(2),
        _ => None,
    }
}

pub(super) fn decode(info: &DptInfo, bytes: &[u8]) -> Option<DatapointValue> {
    let first = *bytes.first()?;
    match info.encoding {
        Encoding::StatusMode => Some(DatapointValue::Status { flags: first >> 3, mode: mode_index(first & 0x07)? }),
        Encoding::AccessData => AccessData::decode(bytes.try_into().ok()?).map(DatapointValue::Access),
        Encoding::SceneControl => {
            (first & 0x40 == 0).then_some(DatapointValue::Scene { number: first & 0x3F, learn: first & 0x80 != 0 })
        }
        Encoding::SceneInfo => {
            (first & 0x80 == 0).then_some(DatapointValue::SceneInfo { number: first & 0x3F, active: first & 0x40 == 0 })
        }
        Encoding::BitSet8 => Some(DatapointValue::Bits(u32::from(first))),
        Encoding::BitSet16 => Some(DatapointValue::Bits(u32::from(u16::from_be_bytes(bytes.try_into().ok()?)))),
        Encoding::BitSet32 => Some(DatapointValue::Bits(u32::from_be_bytes(bytes.try_into().ok()?))),
        Encoding::TwoBitSet => (first <= 0x03).then_some(DatapointValue::Bits(u32::from(first))),
        _ => None,
    }
}

pub(super) fn encode(info: &DptInfo, value: &DatapointValue) -> Result<Vec<u8>> {
    let ensure = |fits: bool| if fits { Ok(()) } else { Err(KnxError::dpt_value_out_of_range()) };
    match (info.encoding, value) {
        (Encoding::StatusMode, &DatapointValue::Status { flags, mode }) => {
            ensure(flags <= 0x1F && mode <= 2)?;
            Ok(vec![(flags << 3) | (1 << mode)])
        }
        (Encoding::AccessData, DatapointValue::Access(access)) => Ok(access.encode()?.to_vec()),
        (Encoding::SceneControl, &DatapointValue::Scene { number, learn }) => {
            ensure(number <= 0x3F)?;
            Ok(vec![(u8::from(learn) << 7) | number])
        }
        (Encoding::SceneInfo, &DatapointValue::SceneInfo { number, active }) => {
            ensure(number <= 0x3F)?;
            Ok(vec![(u8::from(!active) << 6) | number])
        }
        (Encoding::BitSet8 | Encoding::TwoBitSet, &DatapointValue::Bits(bits)) => {
            let max = if info.encoding == Encoding::TwoBitSet { 0x03 } else { 0xFF };
            ensure(bits <= max)?;
            Ok(vec![bits as u8])
        }
        (Encoding::BitSet16, &DatapointValue::Bits(bits)) => {
            let bits = u16::try_from(bits).map_err(|_range| KnxError::dpt_value_out_of_range())?;
            Ok(bits.to_be_bytes().to_vec())
        }
        (Encoding::BitSet32, &DatapointValue::Bits(bits)) => Ok(bits.to_be_bytes().to_vec()),
        _ => Err(KnxError::invalid_dpt_data()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dpt::{DatapointRegistry, DatapointType};

    fn create(main: u16, sub: u16) -> DatapointType {
        DatapointRegistry::standard().create_type(main, sub).unwrap()
    }

    #[test]
    fn test_access_data() {
        let mut dpt = create(15, 0);
        let access = AccessData { code: 123_456, permission: true, index: 3, ..AccessData::default() };
        dpt.set_value(&DatapointValue::Access(access)).unwrap();
        assert_eq!(dpt.bytes(), &[0x12, 0x34, 0x56, 0x43]);
        assert_eq!(dpt.value(), Some(DatapointValue::Access(access)));

        let too_long = AccessData { code: 1_000_000, ..AccessData::default() };
        assert!(dpt.set_value(&DatapointValue::Access(too_long)).is_err());
    }

    #[test]
    fn test_access_data_non_bcd() {
        let mut dpt = create(15, 0);
        dpt.set_bytes(&[0x1A, 0x00, 0x00, 0x00]).unwrap();
        assert!(!dpt.is_valid());
    }

    #[test]
    fn test_scene_control() {
        let mut dpt = create(18, 1);
        dpt.set_value(&DatapointValue::Scene { number: 5, learn: true }).unwrap();
        assert_eq!(dpt.bytes(), &[0x85]);
        assert!(dpt.set_value(&DatapointValue::Scene { number: 64, learn: false }).is_err());
        dpt.set_bytes(&[0x45]).unwrap();
        assert!(!dpt.is_valid());
    }

    #[test]
    fn test_scene_info() {
        let mut dpt = create(26, 1);
        dpt.set_value(&DatapointValue::SceneInfo { number: 10, active: false }).unwrap();
        assert_eq!(dpt.bytes(), &[0x4A]);
        dpt.set_bytes(&[0x0A]).unwrap();
        assert_eq!(dpt.value(), Some(DatapointValue::SceneInfo { number: 10, active: true }));
    }

    #[test]
    fn test_status_mode() {
        let mut dpt = create(6, 20);
        dpt.set_value(&DatapointValue::Status { flags: 0b10100, mode: 2 }).unwrap();
        assert_eq!(dpt.bytes(), &[0xA4]);
        assert_eq!(dpt.value(), Some(DatapointValue::Status { flags: 0b10100, mode: 2 }));
        // Two modes at once
        dpt.set_bytes(&[0x03]).unwrap();
        assert!(!dpt.is_valid());
        assert!(dpt.set_value(&DatapointValue::Status { flags: 0, mode: 3 }).is_err());
    }

    #[test]
    fn test_bit_sets() {
        let mut media = create(22, 1000);
        media.set_value(&DatapointValue::Bits(0x0022)).unwrap();
        assert_eq!(media.bytes(), &[0x00, 0x22]);
        assert!(media.set_value(&DatapointValue::Bits(0x1_0000)).is_err());

        let mut action = create(23, 1);
        action.set_value(&DatapointValue::Bits(3)).unwrap();
        assert!(action.set_value(&DatapointValue::Bits(4)).is_err());

        let mut combined = create(27, 1);
        combined.set_value(&DatapointValue::Bits(0xDEAD_BEEF)).unwrap();
        assert_eq!(combined.value(), Some(DatapointValue::Bits(0xDEAD_BEEF)));
    }
}
