//! Human-readable duration parsing
//!
//! Experiment manifests express phase and experiment lengths as strings like
//! `"2 weeks"` or `"5 days"`. Only days and weeks are supported: months and
//! years have ambiguous lengths and are rejected rather than approximated.

use crate::{Error, Result};
use chrono::Duration;

/// Parse a `"<integer> <unit>"` duration string into an exact time span.
///
/// The unit is matched case-insensitively by substring, so `"1 week"`,
/// `"2 Weeks"` and `"3 weeks,"` all parse. Unknown units fail with
/// [`Error::UnsupportedDurationUnit`] carrying the offending token.
///
/// # Examples
///
/// ```
/// use pressroom::duration::convert_duration;
/// use chrono::Duration;
///
/// assert_eq!(convert_duration("2 weeks").unwrap(), Duration::days(14));
/// assert_eq!(convert_duration("5 days").unwrap(), Duration::days(5));
/// ```
pub fn convert_duration(text: &str) -> Result<Duration> {
    let mut parts = text.split_whitespace();

    let count: i64 = parts
        .next()
        .ok_or_else(|| Error::Validation(format!("empty duration string: {:?}", text)))?
        .parse()
        .map_err(|_| Error::Validation(format!("duration must start with an integer: {:?}", text)))?;

    // A zero span would make an experiment end before it starts (end is
    // start - 1 day + total) and produce phases no as-of query can match.
    if count <= 0 {
        return Err(Error::Validation(format!("duration must be positive: {:?}", text)));
    }

    let unit = parts
        .next()
        .ok_or_else(|| Error::Validation(format!("duration is missing a unit: {:?}", text)))?;

    let lowered = unit.to_lowercase();
    if lowered.contains("week") {
        Ok(Duration::weeks(count))
    } else if lowered.contains("day") {
        Ok(Duration::days(count))
    } else {
        Err(Error::UnsupportedDurationUnit(unit.to_string()))
    }
}
