//! ISO-8601 timestamps with millisecond precision
//!
//! Every timestamp the importer stores (capture, discovery, upload) is a local
//! wall-clock string of the form `YYYY-MM-DDTHH:MM:SS.mmm`. Records are
//! compared as strings downstream, so second-precision values are always
//! padded with `.000`.

use crate::error::{CommonError, Result};
use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use std::time::SystemTime;

/// Format used for timestamps that carry a sub-second part
pub const ISO_MILLIS_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f";

/// Format used for whole-second timestamps, before normalization
pub const ISO_SECONDS_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Length of a second-precision ISO timestamp (`2017-03-08T19:06:40`)
const SECOND_PRECISION_LEN: usize = 19;

/// Pad a second-precision timestamp to millisecond precision.
///
/// Values that already carry a fractional part are returned unchanged.
pub fn normalize_timestamp(timestamp: impl Into<String>) -> String {
    let mut timestamp = timestamp.into();
    if timestamp.len() == SECOND_PRECISION_LEN {
        timestamp.push_str(".000");
    }
    timestamp
}

/// Current local time as a millisecond-precision ISO timestamp
pub fn now_iso() -> String {
    Local::now().format(ISO_MILLIS_FORMAT).to_string()
}

/// Format a whole-second unix epoch in local time
pub fn format_epoch_seconds(epoch: i64) -> Result<String> {
    let local = Local
        .timestamp_opt(epoch, 0)
        .earliest()
        .ok_or_else(|| CommonError::InvalidTimestamp(epoch.to_string()))?;
    Ok(format_local(&local.naive_local()))
}

/// Format a fractional unix epoch (seconds with a decimal part) in local time
pub fn format_epoch_fractional(epoch: f64) -> Result<String> {
    if !epoch.is_finite() {
        return Err(CommonError::InvalidTimestamp(epoch.to_string()));
    }
    let secs = epoch.trunc() as i64;
    let nanos = ((epoch - epoch.trunc()) * 1e9).round().clamp(0.0, 999_999_999.0) as u32;
    let local = Local
        .timestamp_opt(secs, nanos)
        .earliest()
        .ok_or_else(|| CommonError::InvalidTimestamp(epoch.to_string()))?;
    Ok(format_local(&local.naive_local()))
}

/// Format a filesystem time in local time
pub fn format_system_time(time: SystemTime) -> String {
    let local: DateTime<Local> = time.into();
    format_local(&local.naive_local())
}

fn format_local(naive: &NaiveDateTime) -> String {
    use chrono::Timelike;

    let formatted = if naive.nanosecond() == 0 {
        naive.format(ISO_SECONDS_FORMAT).to_string()
    } else {
        naive.format(ISO_MILLIS_FORMAT).to_string()
    };
    normalize_timestamp(formatted)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::time::{Duration, UNIX_EPOCH};

    #[test]
    fn test_normalize_pads_second_precision() {
        assert_eq!(normalize_timestamp("2017-03-08T19:06:40"), "2017-03-08T19:06:40.000");
    }

    #[test]
    fn test_normalize_keeps_millisecond_precision() {
        assert_eq!(normalize_timestamp("2017-03-08T19:06:40.250"), "2017-03-08T19:06:40.250");
    }

    #[test]
    fn test_format_epoch_seconds_is_padded() {
        let ts = format_epoch_seconds(1_489_000_000).unwrap();
        assert_eq!(ts.len(), 23);
        assert!(ts.ends_with(".000"));

        let expected = Local
            .timestamp_opt(1_489_000_000, 0)
            .earliest()
            .unwrap()
            .format(ISO_SECONDS_FORMAT)
            .to_string();
        assert_eq!(ts, format!("{}.000", expected));
    }

    #[test]
    fn test_format_epoch_fractional_keeps_millis() {
        let ts = format_epoch_fractional(1_489_000_000.25).unwrap();
        assert_eq!(ts.len(), 23);
        assert!(ts.ends_with(".250"));
    }

    #[test]
    fn test_format_system_time_millisecond_precision() {
        let time = UNIX_EPOCH + Duration::from_millis(1_489_000_000_123);
        let ts = format_system_time(time);
        assert!(ts.ends_with(".123"));

        let whole = UNIX_EPOCH + Duration::from_secs(1_489_000_000);
        assert!(format_system_time(whole).ends_with(".000"));
    }

    #[test]
    fn test_now_iso_shape() {
        let now = now_iso();
        assert_eq!(now.len(), 23);
        assert_eq!(&now[10..11], "T");
    }
}
