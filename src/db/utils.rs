//! Database utility functions.

use chrono::{NaiveDate, Utc};

/// Current time as epoch seconds.
pub fn current_timestamp() -> i64 {
    Utc::now().timestamp()
}

/// Half-open `[start, end)` epoch-second range covering a calendar year in UTC.
///
/// Returns `None` for years chrono cannot represent.
pub fn year_bounds(year: i32) -> Option<(i64, i64)> {
    let start = NaiveDate::from_ymd_opt(year, 1, 1)?.and_hms_opt(0, 0, 0)?;
    let end = NaiveDate::from_ymd_opt(year.checked_add(1)?, 1, 1)?.and_hms_opt(0, 0, 0)?;
    Some((start.and_utc().timestamp(), end.and_utc().timestamp()))
}

/// Calendar year (UTC) of an epoch-second timestamp.
pub fn year_of(timestamp: i64) -> Option<i32> {
    use chrono::Datelike;
    chrono::DateTime::from_timestamp(timestamp, 0).map(|dt| dt.year())
}

//
// TIMESTAMP HANDLING POLICY
//
// create() honours an explicit `created_at` when provided (imports and
// backfills keep their original time) and stamps the current time
// otherwise. `updated_at` is always set by storage.
//

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn year_bounds_cover_whole_year() {
        let (start, end) = year_bounds(2024).unwrap();
        assert_eq!(start, 1_704_067_200);
        // 2024 is a leap year
        assert_eq!(end - start, 366 * 86_400);
    }

    #[test]
    fn year_of_matches_bounds() {
        let (start, end) = year_bounds(2025).unwrap();
        assert_eq!(year_of(start), Some(2025));
        assert_eq!(year_of(end - 1), Some(2025));
        assert_eq!(year_of(end), Some(2026));
    }
}
