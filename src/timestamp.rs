use std::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveDateTime, Offset, TimeZone, Utc};

/// Day bucket used when a device timestamp has no `DD/MM/YYYY` prefix.
pub const UNKNOWN_DAY: &str = "unknown";

/// Wall-clock layouts devices are known to send, tried in order.
const DEVICE_FORMATS: &[&str] = &["%d/%m/%Y %H:%M:%S", "%d/%m/%Y, %H:%M:%S", "%d/%m/%Y %H:%M"];

/// Derive the `YYYY-MM-DD` day bucket from the leading `DD/MM/YYYY` of `raw`.
///
/// This is a plain transposition of the digits; the date itself is not
/// checked for validity. Anything without the prefix lands in [`UNKNOWN_DAY`].
pub fn day_bucket(raw: &str) -> String {
    let b = raw.as_bytes();
    if b.len() < 10 || b[2] != b'/' || b[5] != b'/' {
        return UNKNOWN_DAY.to_owned();
    }

    let digits = |from: usize, to: usize| b[from..to].iter().all(u8::is_ascii_digit);
    if !(digits(0, 2) && digits(3, 5) && digits(6, 10)) {
        return UNKNOWN_DAY.to_owned();
    }

    format!("{}-{}-{}", &raw[6..10], &raw[3..5], &raw[0..2])
}

/// The fixed UTC offset of the wall-clock strings devices report.
///
/// Everything is stored as `DateTime<Utc>`; this type is the only place that
/// converts between that canonical form and what devices and the dashboard see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceZone(FixedOffset);

impl Default for DeviceZone {
    fn default() -> Self {
        Self(Utc.fix())
    }
}

impl FromStr for DeviceZone {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        let offset = FixedOffset::from_str(s.trim())
            .map_err(|e| anyhow::anyhow!("invalid UTC offset {s:?}: {e}"))?;
        Ok(Self(offset))
    }
}

impl DeviceZone {
    pub fn offset(&self) -> FixedOffset {
        self.0
    }

    /// Parse a device timestamp into its canonical UTC instant.
    ///
    /// RFC 3339 strings carry their own offset; wall-clock strings are
    /// interpreted in this zone. Returns `None` for anything else.
    pub fn parse(&self, raw: &str) -> Option<DateTime<Utc>> {
        let raw = raw.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }

        DEVICE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
            .and_then(|naive| self.0.from_local_datetime(&naive).single())
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// `HH:MM` in device-local time, used as the chart axis label.
    pub fn time_of_day(&self, ts: DateTime<Utc>) -> String {
        ts.with_timezone(&self.0).format("%H:%M").to_string()
    }

    /// `DD/MM/YYYY HH:MM:SS` in device-local time.
    pub fn display(&self, ts: DateTime<Utc>) -> String {
        ts.with_timezone(&self.0).format("%d/%m/%Y %H:%M:%S").to_string()
    }

    /// `YYYY-MM-DD` of `ts` in device-local time.
    pub fn day_of(&self, ts: DateTime<Utc>) -> String {
        ts.with_timezone(&self.0).format("%Y-%m-%d").to_string()
    }
}
