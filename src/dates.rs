use jiff::{civil::Date, tz::TimeZone, Span, Timestamp};

/// Parse a strict `YYYY-MM-DD` value into a civil date.
///
/// Rejects anything that is not exactly ten characters of zero-padded digits
/// and dashes, and anything that is not a real calendar date (`2024-02-30`).
pub fn parse_iso_date(value: &str) -> Option<Date> {
    let bytes = value.as_bytes();
    if bytes.len() != 10 || bytes[4] != b'-' || bytes[7] != b'-' {
        return None;
    }
    for (i, b) in bytes.iter().enumerate() {
        if i != 4 && i != 7 && !b.is_ascii_digit() {
            return None;
        }
    }
    let year: i16 = value[0..4].parse().ok()?;
    let month: i8 = value[5..7].parse().ok()?;
    let day: i8 = value[8..10].parse().ok()?;
    Date::new(year, month, day).ok()
}

pub fn is_iso_date_value(value: &str) -> bool {
    parse_iso_date(value).is_some()
}

/// Add whole calendar months, clamping the day-of-month to the end of the
/// resulting month when it would overflow (Jan 31 + 1mo = Feb 28/29).
pub fn add_months(date: Date, months: i32) -> Date {
    date.saturating_add(Span::new().months(months))
}

pub fn add_months_to_iso_date(value: &str, months: i32) -> Option<String> {
    parse_iso_date(value).map(|date| add_months(date, months).to_string())
}

// Today is always taken in UTC so that date comparisons do not flap with the
// host timezone.
pub fn today_utc() -> Date {
    Timestamp::now().to_zoned(TimeZone::UTC).date()
}

pub fn today_iso_date() -> String {
    today_utc().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use jiff::civil::date;

    #[test]
    fn test_parse_iso_date() {
        assert_eq!(Some(date(2024, 1, 10)), parse_iso_date("2024-01-10"));
        assert_eq!(Some(date(2024, 2, 29)), parse_iso_date("2024-02-29"));
        // Not a real calendar date.
        assert_eq!(None, parse_iso_date("2024-02-30"));
        assert_eq!(None, parse_iso_date("2023-02-29"));
        // Shape violations.
        assert_eq!(None, parse_iso_date(""));
        assert_eq!(None, parse_iso_date("2024-1-10"));
        assert_eq!(None, parse_iso_date("20240110"));
        assert_eq!(None, parse_iso_date("2024/01/10"));
        assert_eq!(None, parse_iso_date("2024-01-10T00:00:00"));
        assert_eq!(None, parse_iso_date("+024-01-10"));
        assert_eq!(None, parse_iso_date("abcd-ef-gh"));
    }

    #[test]
    fn test_add_zero_months_is_identity() {
        for value in ["2024-01-31", "2024-02-29", "2025-12-01", "1999-06-15"] {
            assert_eq!(Some(value.to_owned()), add_months_to_iso_date(value, 0));
        }
    }

    #[test]
    fn test_add_months_clamps_to_month_end() {
        assert_eq!(date(2025, 2, 28), add_months(date(2025, 1, 31), 1));
        assert_eq!(date(2024, 2, 29), add_months(date(2024, 1, 31), 1));
        assert_eq!(date(2024, 4, 30), add_months(date(2024, 3, 31), 1));
        assert_eq!(date(2025, 2, 28), add_months(date(2024, 2, 29), 12));
    }

    #[test]
    fn test_add_months_never_moves_backwards() {
        for value in ["2024-01-31", "2024-02-29", "2025-12-01"] {
            let start = parse_iso_date(value).unwrap();
            for months in [1, 6, 12, 25, 120] {
                assert!(add_months(start, months) > start);
            }
        }
    }

    #[test]
    fn test_is_iso_date_value() {
        assert!(is_iso_date_value("2024-07-04"));
        assert!(!is_iso_date_value("2024-13-01"));
        assert!(!is_iso_date_value("yesterday"));
    }
}
