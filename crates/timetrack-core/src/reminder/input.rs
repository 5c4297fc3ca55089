use chrono::NaiveDateTime;

use crate::error::ValidationError;

/// Parse a schedule as typed by the user.
///
/// `h:mm` is a daily time of day, except that an hour part of `0` or `00`
/// means "in mm minutes". A bare number is always minutes from now.
/// Relative schedules need at least one minute.
/// Returns `(time_hours, is_relative)`.
pub fn parse_schedule(input: &str) -> Result<(f64, bool), ValidationError> {
    let input = input.trim();
    let bad = |msg: &str| ValidationError::invalid("schedule", format!("{msg}: {input:?}"));

    if input.is_empty() {
        return Err(bad("empty schedule"));
    }

    match input.split_once(':') {
        Some((hours, minutes)) => {
            let hours = hours.trim();
            if hours.is_empty() {
                return Err(bad("missing hour"));
            }
            let h: u32 = hours.parse().map_err(|_| bad("hour is not a number"))?;
            let m: u32 = minutes
                .trim()
                .parse()
                .map_err(|_| bad("minutes are not a number"))?;
            if m >= 60 {
                return Err(bad("minutes must be below 60"));
            }
            let relative = h == 0;
            if !relative && h >= 24 {
                return Err(bad("hour must be below 24"));
            }
            if relative && m == 0 {
                return Err(bad("a relative reminder needs at least one minute"));
            }
            Ok((h as f64 + m as f64 / 60.0, relative))
        }
        None => {
            let m: u32 = input.parse().map_err(|_| bad("not a number of minutes"))?;
            if m == 0 {
                return Err(bad("a relative reminder needs at least one minute"));
            }
            Ok((m as f64 / 60.0, true))
        }
    }
}

/// Countdown as `HH:MM:SS`; zero once the target has passed.
pub fn time_left(target: NaiveDateTime, now: NaiveDateTime) -> String {
    let secs = (target - now).num_seconds().max(0);
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    #[test]
    fn clock_time_is_daily() {
        let (h, rel) = parse_schedule("9:30").unwrap();
        assert_eq!(h, 9.5);
        assert!(!rel);
    }

    #[test]
    fn zero_hour_and_bare_minutes_are_relative() {
        assert_eq!(parse_schedule("0:15").unwrap(), (0.25, true));
        assert_eq!(parse_schedule("00:45").unwrap(), (0.75, true));
        assert_eq!(parse_schedule("90").unwrap(), (1.5, true));
    }

    #[test]
    fn malformed_input_is_rejected() {
        for input in ["", ":15", "-5", "7:75", "25:00", "ab:cd", "soon"] {
            assert!(parse_schedule(input).is_err(), "{input} should be rejected");
        }
    }

    #[test]
    fn zero_length_relative_schedule_is_rejected() {
        for input in ["0", "00", "0:00", "00:00"] {
            assert!(parse_schedule(input).is_err(), "{input} should be rejected");
        }
    }

    #[test]
    fn countdown_format() {
        let now = NaiveDate::from_ymd_opt(2024, 3, 3)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        assert_eq!(time_left(now + Duration::seconds(3725), now), "01:02:05");
        assert_eq!(time_left(now - Duration::seconds(5), now), "00:00:00");
    }
}
