//! DPT 1, 2 and 3 - switching, controlled switching and stepping
//!
//! ```text
//! DPT 1:  0000 000B          B = value
//! DPT 2:  0000 00CB          C = control, B = value
//! DPT 3:  0000 CSSS          C = direction, SSS = step code (0 = break)
//! ```
//!
//! A step code `n > 0` divides the range into `2^(n-1)` intervals.

use super::{DatapointValue, DptInfo, Encoding};
use crate::error::{KnxError, Result};

pub(super) fn decode(info: &DptInfo, bytes: &[u8]) -> Option<DatapointValue> {
    let byte = *bytes.first()?;
    match info.encoding {
        Encoding::Bit if byte <= 0x01 => Some(DatapointValue::Bool(byte == 0x01)),
        Encoding::ControlledBit if byte <= 0x03 => Some(DatapointValue::Controlled {
            control: byte & 0x02 != 0,
            value: byte & 0x01 != 0,
        }),
        Encoding::ControlledStep if byte <= 0x0F => Some(DatapointValue::Step {
            control: byte & 0x08 != 0,
            step: byte & 0x07,
        }),
        _ => None,
    }
}

pub(super) fn encode(info: &DptInfo, value: &DatapointValue) -> Result<Vec<u8>> {
    let byte = match (info.encoding, value) {
        (Encoding::Bit, DatapointValue::Bool(b)) => u8::from(*b),
        (Encoding::Bit, DatapointValue::Integer(i)) => match i {
            0 | 1 => *i as u8,
            _ => return Err(KnxError::dpt_value_out_of_range()),
        },
        (Encoding::ControlledBit, DatapointValue::Controlled { control, value }) => {
            (u8::from(*control) << 1) | u8::from(*value)
        }
        (Encoding::ControlledStep, DatapointValue::Step { control, step }) => {
            if *step > 0x07 {
                return Err(KnxError::dpt_value_out_of_range());
            }
            (u8::from(*control) << 3) | step
        }
        _ => return Err(KnxError::invalid_dpt_data()),
    };
    Ok(vec![byte])
}
