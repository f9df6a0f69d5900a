//! MS-DOS packed date/time used by the volume header

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Timelike, Utc};

/// First year representable in a DOS timestamp
pub const DOS_EPOCH_YEAR: i32 = 1980;

/// Last year representable in a DOS timestamp (7-bit year field)
pub const DOS_MAX_YEAR: i32 = DOS_EPOCH_YEAR + 127;

/// Packed DOS date/time
///
/// ```text
/// bits 31..25  year - 1980
/// bits 24..21  month (1-12)
/// bits 20..16  day (1-31)
/// bits 15..11  hour
/// bits 10..5   minute
/// bits 4..0    second / 2
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DosTimestamp(u32);

impl DosTimestamp {
    /// Wrap a raw packed value
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Raw packed value as stored in the header
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Pack a UTC date/time, clamping to the representable range
    pub fn from_datetime(time: &DateTime<Utc>) -> Self {
        if time.year() < DOS_EPOCH_YEAR {
            return Self::pack(DOS_EPOCH_YEAR, 1, 1, 0, 0, 0);
        }
        if time.year() > DOS_MAX_YEAR {
            return Self::pack(DOS_MAX_YEAR, 12, 31, 23, 59, 58);
        }

        Self::pack(
            time.year(),
            time.month(),
            time.day(),
            time.hour(),
            time.minute(),
            time.second(),
        )
    }

    /// Current time
    pub fn now() -> Self {
        Self::from_datetime(&Utc::now())
    }

    fn pack(year: i32, month: u32, day: u32, hour: u32, minute: u32, second: u32) -> Self {
        let mut raw = ((year - DOS_EPOCH_YEAR) as u32) << 25;
        raw |= month << 21;
        raw |= day << 16;
        raw |= hour << 11;
        raw |= minute << 5;
        raw |= second / 2;
        Self(raw)
    }

    /// Unpack into a UTC date/time, `None` if the fields are out of range
    pub fn to_datetime(self) -> Option<DateTime<Utc>> {
        let year = DOS_EPOCH_YEAR + (self.0 >> 25) as i32;
        let month = (self.0 >> 21) & 0x0F;
        let day = (self.0 >> 16) & 0x1F;
        let hour = (self.0 >> 11) & 0x1F;
        let minute = (self.0 >> 5) & 0x3F;
        let second = (self.0 & 0x1F) * 2;

        let naive = NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, second)?;
        Some(Utc.from_utc_datetime(&naive))
    }
}

impl From<DateTime<Utc>> for DosTimestamp {
    fn from(time: DateTime<Utc>) -> Self {
        Self::from_datetime(&time)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn test_pack_known_value() {
        // 2001-11-19 12:30:42
        let ts = DosTimestamp::from_datetime(&utc(2001, 11, 19, 12, 30, 42));
        let expected = (21 << 25) | (11 << 21) | (19 << 16) | (12 << 11) | (30 << 5) | 21;
        assert_eq!(ts.raw(), expected);
    }

    #[test]
    fn test_unpack_drops_odd_second() {
        let ts = DosTimestamp::from_datetime(&utc(2024, 2, 29, 23, 59, 59));
        assert_eq!(ts.to_datetime(), Some(utc(2024, 2, 29, 23, 59, 58)));
    }

    #[test]
    fn test_clamps_out_of_range_years() {
        let early = DosTimestamp::from_datetime(&utc(1970, 1, 1, 0, 0, 0));
        assert_eq!(early.to_datetime(), Some(utc(1980, 1, 1, 0, 0, 0)));

        let late = DosTimestamp::from_datetime(&utc(2200, 6, 1, 0, 0, 0));
        assert_eq!(late.to_datetime(), Some(utc(2107, 12, 31, 23, 59, 58)));
    }

    #[test]
    fn test_invalid_raw_value() {
        // month 0
        assert_eq!(DosTimestamp::from_raw(0).to_datetime(), None);
    }
}
