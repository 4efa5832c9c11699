//! DPT 10 (time of day), 11 (date) and 19 (date and time)
//!
//! ```text
//! DPT 10:  NNNH HHHH  00MM MMMM  00SS SSSS       N = day of week, 0 = no day
//! DPT 11:  000D DDDD  0000 MMMM  0YYY YYYY       Y >= 90 is 19YY, else 20YY
//! DPT 19:  YYYY YYYY  0000 MMMM  000D DDDD  NNNH HHHH
//!          00MM MMMM  00SS SSSS  FWNY DDTS  CQ00 0000
//! ```
//!
//! DPT 19 counts years from 1900 and carries the quality flags of
//! [`DateTimeFlags`] in its last two bytes.

use super::{DatapointValue, DptInfo, Encoding};
use crate::error::{KnxError, Result};
use core::fmt;
use core::ops::BitOr;

/// Time of day with optional day of week
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimeOfDay {
    /// 1 = Monday .. 7 = Sunday, 0 = no day
    pub weekday: u8,
    /// 0-23
    pub hour: u8,
    /// 0-59
    pub minute: u8,
    /// 0-59
    pub second: u8,
}

impl TimeOfDay {
    /// Time without day of week
    pub const fn new(hour: u8, minute: u8, second: u8) -> Self {
        Self { weekday: 0, hour, minute, second }
    }

    /// Same time on `weekday`
    #[must_use]
    pub const fn on(mut self, weekday: u8) -> Self {
        self.weekday = weekday;
        self
    }

    /// Whether every field is in range
    pub fn is_valid(&self) -> bool {
        self.weekday <= 7 && self.hour <= 23 && self.minute <= 59 && self.second <= 59
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}:{:02}", self.hour, self.minute, self.second)
    }
}

/// Calendar date
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Date {
    /// Full year
    pub year: u16,
    /// 1-12
    pub month: u8,
    /// 1-31
    pub day: u8,
}

impl Date {
    /// Date from its parts
    pub const fn new(year: u16, month: u8, day: u8) -> Self {
        Self { year, month, day }
    }

    /// Whether month and day are in range
    pub fn is_valid(&self) -> bool {
        (1..=12).contains(&self.month) && (1..=31).contains(&self.day)
    }
}

impl fmt::Display for Date {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}-{:02}", self.year, self.month, self.day)
    }
}

/// Quality flags of a DPT 19 value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DateTimeFlags(u16);

impl DateTimeFlags {
    /// Clock fault
    pub const FAULT: Self = Self(0x8000);
    /// Working day
    pub const WORKING_DAY: Self = Self(0x4000);
    /// Working day field not valid
    pub const NO_WORKING_DAY: Self = Self(0x2000);
    /// Year field not valid
    pub const NO_YEAR: Self = Self(0x1000);
    /// Month and day fields not valid
    pub const NO_DATE: Self = Self(0x0800);
    /// Day of week field not valid
    pub const NO_DAY_OF_WEEK: Self = Self(0x0400);
    /// Time fields not valid
    pub const NO_TIME: Self = Self(0x0200);
    /// Summer time
    pub const SUMMER_TIME: Self = Self(0x0100);
    /// Clock with external synchronisation
    pub const CLOCK_QUALITY: Self = Self(0x0080);
    /// Synchronisation source is reliable
    pub const RELIABLE_SOURCE: Self = Self(0x0040);

    const DEFINED: u16 = 0xFFC0;

    /// No flag set
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Flags from their wire form, undefined bits dropped
    pub const fn from_bits(bits: u16) -> Self {
        Self(bits & Self::DEFINED)
    }

    /// Wire form
    pub const fn bits(self) -> u16 {
        self.0
    }

    /// Whether every flag of `other` is set
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for DateTimeFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Date and time with quality flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DateTime {
    /// Date, year 1900-2155
    pub date: Date,
    /// Time, hour 24 allowed for end of day
    pub time: TimeOfDay,
    /// Quality flags
    pub flags: DateTimeFlags,
}

impl DateTime {
    /// Date and time without flags
    pub const fn new(date: Date, time: TimeOfDay) -> Self {
        Self { date, time, flags: DateTimeFlags::empty() }
    }

    /// Same value with `flags`
    #[must_use]
    pub const fn with_flags(mut self, flags: DateTimeFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Whether every field not flagged as missing is in range
    pub fn is_valid(&self) -> bool {
        let year = self.flags.contains(DateTimeFlags::NO_YEAR) || (1900..=2155).contains(&self.date.year);
        let date = self.flags.contains(DateTimeFlags::NO_DATE) || self.date.is_valid();
        let time = self.flags.contains(DateTimeFlags::NO_TIME) || {
            let t = &self.time;
            let end_of_day = t.hour == 24 && t.minute == 0 && t.second == 0;
            (t.hour <= 23 || end_of_day) && t.minute <= 59 && t.second <= 59
        };
        year && date && time && self.time.weekday <= 7
    }
}

fn decode_time(bytes: [u8; 3]) -> Option<TimeOfDay> {
    if bytes[1] & 0xC0 != 0 || bytes[2] & 0xC0 != 0 {
        return None;
    }
    let time = TimeOfDay {
        weekday: bytes[0] >> 5,
        hour: bytes[0] & 0x1F,
        minute: bytes[1],
        second: bytes[2],
    };
    time.is_valid().then_some(time)
}

fn decode_date(bytes: [u8; 3]) -> Option<Date> {
    if bytes[0] & 0xE0 != 0 || bytes[1] & 0xF0 != 0 || bytes[2] & 0x80 != 0 {
        return None;
    }
    let yy = u16::from(bytes[2]);
    let year = if yy >= 90 { 1900 + yy } else { 2000 + yy };
    let date = Date::new(year, bytes[1], bytes[0]);
    date.is_valid().then_some(date)
}

fn decode_date_time(bytes: [u8; 8]) -> Option<DateTime> {
    if bytes[1] & 0xF0 != 0 || bytes[2] & 0xE0 != 0 || bytes[4] & 0xC0 != 0 || bytes[5] & 0xC0 != 0 {
        return None;
    }
    let value = DateTime {
        date: Date::new(1900 + u16::from(bytes[0]), bytes[1], bytes[2]),
        time: TimeOfDay {
            weekday: bytes[3] >> 5,
            hour: bytes[3] & 0x1F,
            minute: bytes[4],
            second: bytes[5],
        },
        flags: DateTimeFlags::from_bits(u16::from_be_bytes([bytes[6], bytes[7]])),
    };
    value.is_valid().then_some(value)
}

pub(super) fn decode(info: &DptInfo, bytes: &[u8]) -> Option<DatapointValue> {
    match info.encoding {
        Encoding::TimeOfDay => decode_time(bytes.try_into().ok()?).map(DatapointValue::Time),
        Encoding::Date => decode_date(bytes.try_into().ok()?).map(DatapointValue::Date),
        Encoding::DateTime => decode_date_time(bytes.try_into().ok()?).map(DatapointValue::DateTime),
        _ => None,
    }
}

pub(super) fn encode(info: &DptInfo, value: &DatapointValue) -> Result<Vec<u8>> {
    match (info.encoding, value) {
        (Encoding::TimeOfDay, DatapointValue::Time(time)) => {
            if !time.is_valid() {
                return Err(KnxError::dpt_value_out_of_range());
            }
            Ok(vec![(time.weekday << 5) | time.hour, time.minute, time.second])
        }
        (Encoding::Date, DatapointValue::Date(date)) => {
            if !date.is_valid() || !(1990..=2089).contains(&date.year) {
                return Err(KnxError::dpt_value_out_of_range());
            }
            Ok(vec![date.day, date.month, (date.year % 100) as u8])
        }
        (Encoding::DateTime, DatapointValue::DateTime(value)) => {
            if !value.is_valid() {
                return Err(KnxError::dpt_value_out_of_range());
            }
            let year = u8::try_from(value.date.year.saturating_sub(1900)).map_err(|_range| KnxError::dpt_value_out_of_range())?;
            let time = &value.time;
            let [flags_high, flags_low] = value.flags.bits().to_be_bytes();
            Ok(vec![
                year,
                value.date.month & 0x0F,
                value.date.day & 0x1F,
                (time.weekday << 5) | (time.hour & 0x1F),
                time.minute & 0x3F,
                time.second & 0x3F,
                flags_high,
                flags_low,
            ])
        }
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
    fn test_time_of_day() {
        let mut time = create(10, 1);
        // Tuesday 13:45:30
        let value = TimeOfDay::new(13, 45, 30).on(2);
        time.set_value(&DatapointValue::Time(value)).unwrap();
        assert_eq!(time.bytes(), &[0x4D, 0x2D, 0x1E]);
        assert_eq!(time.value(), Some(DatapointValue::Time(value)));
        assert_eq!(value.to_string(), "13:45:30");

        assert!(time.set_value(&DatapointValue::Time(TimeOfDay::new(24, 0, 0))).is_err());
        time.set_bytes(&[0x18, 0x00, 0x00]).unwrap();
        assert!(!time.is_valid());
    }

    #[test]
    fn test_date_century() {
        let mut date = create(11, 1);
        date.set_bytes(&[0x0F, 0x03, 0x63]).unwrap();
        assert_eq!(date.value(), Some(DatapointValue::Date(Date::new(1999, 3, 15))));
        date.set_bytes(&[0x01, 0x0C, 0x18]).unwrap();
        assert_eq!(date.value(), Some(DatapointValue::Date(Date::new(2024, 12, 1))));

        date.set_value(&DatapointValue::Date(Date::new(2089, 1, 31))).unwrap();
        assert_eq!(date.bytes(), &[0x1F, 0x01, 0x59]);
        assert!(date.set_value(&DatapointValue::Date(Date::new(2090, 1, 1))).is_err());
        assert!(date.set_value(&DatapointValue::Date(Date::new(2024, 13, 1))).is_err());
    }

    #[test]
    fn test_date_reserved_bits() {
        let mut date = create(11, 1);
        date.set_bytes(&[0x2F, 0x03, 0x18]).unwrap();
        assert!(!date.is_valid());
    }

    #[test]
    fn test_date_time() {
        let mut dpt = create(19, 1);
        let value = DateTime::new(Date::new(2024, 6, 21), TimeOfDay::new(8, 30, 0).on(5))
            .with_flags(DateTimeFlags::WORKING_DAY | DateTimeFlags::SUMMER_TIME);
        dpt.set_value(&DatapointValue::DateTime(value)).unwrap();
        assert_eq!(dpt.bytes(), &[124, 6, 21, 0xA8, 30, 0, 0x41, 0x00]);
        assert_eq!(dpt.value(), Some(DatapointValue::DateTime(value)));
    }

    #[test]
    fn test_date_time_missing_fields() {
        let mut dpt = create(19, 1);
        // Only a time, the date fields are zero and flagged
        let value = DateTime::new(Date::new(1900, 0, 0), TimeOfDay::new(24, 0, 0))
            .with_flags(DateTimeFlags::NO_DATE | DateTimeFlags::NO_DAY_OF_WEEK);
        assert!(value.is_valid());
        dpt.set_value(&DatapointValue::DateTime(value)).unwrap();
        assert!(dpt.is_valid());

        let unflagged = DateTime::new(Date::new(1900, 0, 0), TimeOfDay::new(12, 0, 0));
        assert!(dpt.set_value(&DatapointValue::DateTime(unflagged)).is_err());
        assert!(dpt.is_valid());
    }

    #[test]
    fn test_flags() {
        let flags = DateTimeFlags::from_bits(0x803F);
        assert_eq!(flags, DateTimeFlags::FAULT);
        assert!((flags | DateTimeFlags::NO_TIME).contains(DateTimeFlags::NO_TIME));
        assert!(!flags.contains(DateTimeFlags::NO_TIME));
    }
}
