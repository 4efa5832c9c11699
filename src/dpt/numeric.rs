//! Integer datapoint types: 5, 6, 7, 8, 12, 13, 17, 20 and 29.
//!
//! All are big-endian two's complement or unsigned integers. Types with a
//! coefficient other than 1 (5.001, 5.003, 7.003, 8.010, 13.002, ...) read
//! and write engineering values as [`DatapointValue::Number`], the others
//! raw values as [`DatapointValue::Integer`].

use super::{DatapointValue, DptInfo, Encoding};
use crate::error::{KnxError, Result};

fn raw(encoding: Encoding, bytes: &[u8]) -> Option<i64> {
    Some(match encoding {
        Encoding::Unsigned8 | Encoding::Enum8 => i64::from(*bytes.first()?),
        Encoding::Signed8 => i64::from(i8::from_be_bytes([*bytes.first()?])),
        Encoding::Unsigned16 => i64::from(u16::from_be_bytes(bytes.try_into().ok()?)),
        Encoding::Signed16 => i64::from(i16::from_be_bytes(bytes.try_into().ok()?)),
        Encoding::Unsigned32 => i64::from(u32::from_be_bytes(bytes.try_into().ok()?)),
        Encoding::Signed32 => i64::from(i32::from_be_bytes(bytes.try_into().ok()?)),
        Encoding::Signed64 => i64::from_be_bytes(bytes.try_into().ok()?),
        _ => return None,
    })
}

pub(super) fn decode(info: &DptInfo, bytes: &[u8]) -> Option<DatapointValue> {
    let raw = raw(info.encoding, bytes)?;
    let (low, high) = info.range.raw_bounds();
    if (raw as f64) < low || (raw as f64) > high {
        return None;
    }
    if info.range.is_scaled() {
        Some(DatapointValue::Number(raw as f64 * info.range.coefficient))
    } else {
        Some(DatapointValue::Integer(raw))
    }
}

pub(super) fn encode(info: &DptInfo, value: &DatapointValue) -> Result<Vec<u8>> {
    let (low, high) = info.range.raw_bounds();
    let raw = match *value {
        DatapointValue::Integer(i) if !info.range.is_scaled() => {
            if (i as f64) < low || (i as f64) > high {
                return Err(KnxError::dpt_value_out_of_range());
            }
            i
        }
        DatapointValue::Integer(_) | DatapointValue::Number(_) => {
            let engineering = value.as_f64().ok_or_else(KnxError::invalid_dpt_data)?;
            if !engineering.is_finite() {
                return Err(KnxError::invalid_dpt_data());
            }
            let scaled = (engineering / info.range.coefficient).round();
            if scaled < low || scaled > high {
                return Err(KnxError::dpt_value_out_of_range());
            }
            scaled as i64
        }
        _ => return Err(KnxError::invalid_dpt_data()),
    };
    let size = info.encoding.size();
    Ok(raw.to_be_bytes()[8 - size..].to_vec())
}

#[cfg(test)]
mod tests {
    use crate::dpt::{DatapointRegistry, DatapointType, DatapointValue};
    use crate::error::KnxError;

    fn create(main: u16, sub: u16) -> DatapointType {
        DatapointRegistry::standard().create_type(main, sub).unwrap()
    }

    fn assert_number(value: Option<DatapointValue>, expected: f64, epsilon: f64) {
        match value {
            Some(DatapointValue::Number(n)) => {
                assert!((n - expected).abs() < epsilon, "Expected {n} ≈ {expected}");
            }
            other => panic!("Expected a number, got {other:?}"),
        }
    }

    #[test]
    fn test_scaling() {
        let mut scaling = create(5, 1);
        scaling.set_value(&DatapointValue::Number(75.0)).unwrap();
        // 75% of 255 = 191.25 → 191
        assert_eq!(scaling.bytes(), &[0xBF]);
        assert_number(scaling.value(), 74.9, 0.1);

        scaling.set_bytes(&[0xFF]).unwrap();
        assert_number(scaling.value(), 100.0, 1e-9);
    }

    #[test]
    fn test_angle() {
        let mut angle = create(5, 3);
        angle.set_value(&DatapointValue::Number(90.0)).unwrap();
        assert_eq!(angle.bytes(), &[0x40]);
        assert!(angle.set_value(&DatapointValue::Number(361.0)).is_err());
    }

    #[test]
    fn test_tariff_limit() {
        let mut tariff = create(5, 6);
        tariff.set_value(&DatapointValue::Integer(254)).unwrap();
        assert!(tariff.set_value(&DatapointValue::Integer(255)).is_err());
        tariff.set_bytes(&[0xFF]).unwrap();
        assert!(!tariff.is_valid());
    }

    #[test]
    fn test_signed_byte() {
        let mut percent = create(6, 1);
        percent.set_value(&DatapointValue::Integer(-5)).unwrap();
        assert_eq!(percent.bytes(), &[0xFB]);
        assert_eq!(percent.value(), Some(DatapointValue::Integer(-5)));
        let err = percent.set_value(&DatapointValue::Integer(128)).unwrap_err();
        assert!(matches!(err, KnxError::Dpt(ref e) if e.is_out_of_range()));
    }

    #[test]
    fn test_two_byte_unsigned() {
        let mut brightness = create(7, 13);
        brightness.set_value(&DatapointValue::Integer(5000)).unwrap();
        assert_eq!(brightness.bytes(), &[0x13, 0x88]);
        assert!(brightness.set_value(&DatapointValue::Integer(65_536)).is_err());
    }

    #[test]
    fn test_time_period_resolution() {
        let mut period = create(7, 3);
        period.set_value(&DatapointValue::Number(1230.0)).unwrap();
        assert_eq!(period.bytes(), &[0x00, 0x7B]);
        assert_number(period.value(), 1230.0, 1e-9);
    }

    #[test]
    fn test_percent_v16() {
        let mut percent = create(8, 10);
        percent.set_value(&DatapointValue::Number(-1.5)).unwrap();
        assert_eq!(percent.bytes(), &(-150_i16).to_be_bytes());
        assert_number(percent.value(), -1.5, 1e-9);
    }

    #[test]
    fn test_four_byte_signed() {
        let mut energy = create(13, 10);
        energy.set_value(&DatapointValue::Integer(500_000)).unwrap();
        assert_eq!(energy.bytes(), &[0x00, 0x07, 0xA1, 0x20]);
        energy.set_value(&DatapointValue::Integer(-1)).unwrap();
        assert_eq!(energy.bytes(), &[0xFF, 0xFF, 0xFF, 0xFF]);
        assert_eq!(energy.value(), Some(DatapointValue::Integer(-1)));
    }

    #[test]
    fn test_flow_rate() {
        let mut flow = create(13, 2);
        flow.set_value(&DatapointValue::Number(1.5)).unwrap();
        assert_eq!(flow.bytes(), &15_000_i32.to_be_bytes());
    }

    #[test]
    fn test_four_byte_unsigned_full_range() {
        let mut counter = create(12, 1);
        counter.set_value(&DatapointValue::Integer(4_294_967_295)).unwrap();
        assert_eq!(counter.bytes(), &[0xFF; 4]);
        assert_eq!(counter.value(), Some(DatapointValue::Integer(4_294_967_295)));
        assert!(counter.set_value(&DatapointValue::Integer(-1)).is_err());
    }

    #[test]
    fn test_eight_byte_signed() {
        let mut energy = create(29, 10);
        energy.set_value(&DatapointValue::Integer(-1_000_000_000_000)).unwrap();
        assert_eq!(energy.bytes(), &(-1_000_000_000_000_i64).to_be_bytes());
        assert_eq!(energy.value(), Some(DatapointValue::Integer(-1_000_000_000_000)));
    }

    #[test]
    fn test_scene_number_and_enum() {
        let mut scene = create(17, 1);
        scene.set_value(&DatapointValue::Integer(63)).unwrap();
        assert!(scene.set_value(&DatapointValue::Integer(64)).is_err());

        let mut mode = create(20, 2);
        mode.set_value(&DatapointValue::Integer(2)).unwrap();
        assert!(mode.set_value(&DatapointValue::Integer(3)).is_err());
        mode.set_bytes(&[0x07]).unwrap();
        assert!(!mode.is_valid());
    }

    #[test]
    fn test_not_a_number() {
        let mut counter = create(7, 1);
        assert!(counter.set_value(&DatapointValue::Number(f64::NAN)).is_err());
        assert!(counter.set_value(&DatapointValue::Bool(true)).is_err());
    }
}
