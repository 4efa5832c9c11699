//! Character and string datapoint types
//!
//! - DPT 4: one ASCII (4.001) or ISO 8859-1 character
//! - DPT 16: up to 14 characters, padded with NUL to 14 bytes
//! - DPT 24: ISO 8859-1 string of any length, NUL terminated
//! - DPT 28: UTF-8 string of any length, NUL terminated
//!
//! ISO 8859-1 maps byte values one to one onto the first 256 code points.

use super::{DatapointValue, DptInfo, Encoding};
use crate::error::{KnxError, Result};

const STRING14_LEN: usize = 14;

/// Highest code point the type allows, from its range
fn max_code_point(info: &DptInfo) -> u32 {
    info.range.maximum as u32
}

fn latin1(bytes: &[u8], max: u32) -> Option<String> {
    bytes
        .iter()
        .map(|&b| (u32::from(b) <= max).then(|| char::from(b)))
        .collect()
}

fn to_latin1(text: &str, max: u32, out: &mut Vec<u8>) -> Result<()> {
    for c in text.chars() {
        if c == '\0' {
            return Err(KnxError::invalid_dpt_data());
        }
        if u32::from(c) > max {
            return Err(KnxError::dpt_value_out_of_range());
        }
        out.push(u32::from(c) as u8);
    }
    Ok(())
}

/// Content before the single terminating NUL
fn terminated(bytes: &[u8]) -> Option<&[u8]> {
    let (last, content) = bytes.split_last()?;
    (*last == 0 && !content.contains(&0)).then_some(content)
}

pub(super) fn decode(info: &DptInfo, bytes: &[u8]) -> Option<DatapointValue> {
    match info.encoding {
        Encoding::Character => {
            let byte = *bytes.first()?;
            (u32::from(byte) <= max_code_point(info)).then(|| DatapointValue::Char(char::from(byte)))
        }
        Encoding::String14 => {
            if bytes.len() != STRING14_LEN {
                return None;
            }
            let end = bytes.iter().position(|&b| b == 0).unwrap_or(STRING14_LEN);
            if bytes[end..].iter().any(|&b| b != 0) {
                return None;
            }
            latin1(&bytes[..end], max_code_point(info)).map(DatapointValue::Text)
        }
        Encoding::VarString => latin1(terminated(bytes)?, u32::from(u8::MAX)).map(DatapointValue::Text),
        Encoding::Utf8String => {
            let content = terminated(bytes)?;
            core::str::from_utf8(content).ok().map(|s| DatapointValue::Text(s.to_owned()))
        }
        _ => None,
    }
}

pub(super) fn encode(info: &DptInfo, value: &DatapointValue) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    match (info.encoding, value) {
        (Encoding::Character, DatapointValue::Char(c)) => {
            let mut buf = [0u8; 4];
            to_latin1(c.encode_utf8(&mut buf), max_code_point(info), &mut out)?;
        }
        (Encoding::String14, DatapointValue::Text(text)) => {
            if text.chars().count() > STRING14_LEN {
                return Err(KnxError::dpt_size_mismatch());
            }
            to_latin1(text, max_code_point(info), &mut out)?;
            out.resize(STRING14_LEN, 0);
        }
        (Encoding::VarString, DatapointValue::Text(text)) => {
            to_latin1(text, u32::from(u8::MAX), &mut out)?;
            out.push(0);
        }
        (Encoding::Utf8String, DatapointValue::Text(text)) => {
            if text.contains('\0') {
                return Err(KnxError::invalid_dpt_data());
            }
            out.extend_from_slice(text.as_bytes());
            out.push(0);
        }
        _ => return Err(KnxError::invalid_dpt_data()),
    }
    Ok(out)
}
