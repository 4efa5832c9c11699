//! DPT 9 (KNX 2-byte float) and DPT 14 (IEEE 754 single)
//!
//! ## 2-byte float format
//!
//! ```text
//! Byte 0: SEEE EMMM
//! Byte 1: MMMM MMMM
//!
//! S = Sign bit
//! E = Exponent (4 bits, unsigned, 0-15)
//! M = Mantissa (11 bits, two's complement together with S)
//!
//! Value = 0.01 * M * 2^E
//! ```
//!
//! Range -671088.64 to +670760.96. `0x7FFF` lies outside every sub type
//! except 9.000 and marks invalid data on the bus.

use super::{DatapointValue, DptInfo, Encoding};
use crate::error::{KnxError, Result};

const MANTISSA_MIN: f64 = -2048.0;
const MANTISSA_MAX: f64 = 2047.0;

/// Decode a 2-byte KNX float
pub(super) fn decode_f16(bytes: [u8; 2]) -> f64 {
    let raw = u16::from_be_bytes(bytes);

    // SEEE EMMM MMMM MMMM
    let exponent = (raw >> 11) & 0x0F;
    let mut mantissa = i32::from(raw & 0x07FF);
    if raw & 0x8000 != 0 {
        mantissa -= 2048;
    }

    f64::from(mantissa) * f64::from(1u32 << exponent) / 100.0
}

/// Encode a 2-byte KNX float with the smallest exponent that fits
pub(super) fn encode_f16(value: f64) -> Result<[u8; 2]> {
    if !value.is_finite() {
        return Err(KnxError::invalid_dpt_data());
    }

    let hundredths = value * 100.0;
    let mut exponent = 0u16;
    let mut mantissa = hundredths.round();
    // Rounding may push the mantissa over the edge, so check after rounding
    while !(MANTISSA_MIN..=MANTISSA_MAX).contains(&mantissa) {
        exponent += 1;
        if exponent > 15 {
            return Err(KnxError::dpt_value_out_of_range());
        }
        mantissa = (hundredths / f64::from(1u32 << exponent)).round();
    }

    let mantissa = mantissa as i32;
    let sign = u16::from(mantissa < 0);
    let bits = (mantissa & 0x07FF) as u16;
    Ok(((sign << 15) | (exponent << 11) | bits).to_be_bytes())
}

pub(super) fn decode(info: &DptInfo, bytes: &[u8]) -> Option<DatapointValue> {
    let value = match info.encoding {
        Encoding::Float16 => decode_f16(bytes.try_into().ok()?),
        Encoding::Float32 => {
            let value = f32::from_be_bytes(bytes.try_into().ok()?);
            if !value.is_finite() {
                return None;
            }
            f64::from(value)
        }
        _ => return None,
    };
    info.range.contains(value).then_some(DatapointValue::Number(value))
}

pub(super) fn encode(info: &DptInfo, value: &DatapointValue) -> Result<Vec<u8>> {
    let value = match value {
        DatapointValue::Number(_) | DatapointValue::Integer(_) => value.as_f64().ok_or_else(KnxError::invalid_dpt_data)?,
        _ => return Err(KnxError::invalid_dpt_data()),
    };
    if value.is_nan() {
        return Err(KnxError::invalid_dpt_data());
    }
    if !info.range.contains(value) {
        return Err(KnxError::dpt_value_out_of_range());
    }
    match info.encoding {
        Encoding::Float16 => Ok(encode_f16(value)?.to_vec()),
        Encoding::Float32 => Ok((value as f32).to_be_bytes().to_vec()),
        _ => Err(KnxError::invalid_dpt_data()),
    }
}
