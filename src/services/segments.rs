use std::collections::HashSet;

use chrono::{DateTime, Datelike, Duration, NaiveTime, Utc};

use crate::errors::{AppError, Result};
use crate::models::{AppointmentTemplate, BreakWindow, NewSegment};

struct AnchoredBreak {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

/// Expands a template into its concrete segments, in start order.
///
/// Calendar math (day count, weekday, break anchoring) is done in UTC.
/// Emitted segments are converted back into the offset of `template.start`.
pub fn expand(template: &AppointmentTemplate) -> Result<Vec<NewSegment>> {
    let segment_minutes = parse_segment_length(&template.segment_length)?;
    validate(template)?;

    let offset = *template.start.offset();
    let start = template.start.with_timezone(&Utc);
    let end = template.end.with_timezone(&Utc);

    let total_days = (end.date_naive() - start.date_naive()).num_days();
    let closing = end - Duration::days(total_days);
    let window_minutes = (closing - start).num_minutes();
    let segments_per_day = if window_minutes > 0 {
        window_minutes / segment_minutes
    } else {
        0
    };

    let breaks = template
        .breaks
        .iter()
        .map(|b| anchor_break(&start, b))
        .collect::<Result<Vec<_>>>()?;
    let excluded: HashSet<u32> = template.exclude_weekdays.iter().copied().collect();

    let length = minutes(segment_minutes)?;
    let mut segments = Vec::new();

    for day in 0..=total_days {
        let day_shift = Duration::days(day);
        let weekday = (start + day_shift).weekday().number_from_monday();
        if excluded.contains(&weekday) {
            continue;
        }

        for index in 0..segments_per_day {
            // index * length stays inside the daily window
            let segment_start = start + minutes(segment_minutes * index)?;
            let segment_end = segment_start + length;

            if has_break_collision(&breaks, &segment_start, &segment_end) {
                continue;
            }

            segments.push(NewSegment {
                start: (segment_start + day_shift).with_timezone(&offset),
                end: (segment_end + day_shift).with_timezone(&offset),
                volume: template.volume,
            });
        }
    }

    Ok(segments)
}

fn minutes(value: i64) -> Result<Duration> {
    Duration::try_minutes(value)
        .ok_or_else(|| AppError::InvalidDuration(format!("{value} minutes is out of range")))
}

fn validate(template: &AppointmentTemplate) -> Result<()> {
    if template.end < template.start {
        return Err(AppError::InvalidTemplate(format!(
            "end {} is before start {}",
            template.end, template.start
        )));
    }
    if template.volume < 0 {
        return Err(AppError::InvalidTemplate(format!(
            "volume must not be negative, got {}",
            template.volume
        )));
    }
    if let Some(day) = template
        .exclude_weekdays
        .iter()
        .find(|d| !(1..=7).contains(*d))
    {
        return Err(AppError::InvalidTemplate(format!(
            "excluded weekday must be 1-7, got {day}"
        )));
    }
    Ok(())
}

// Break windows are not checked for ordering or overlap; each one is
// applied to the collision rule exactly as given.
fn anchor_break(day_zero: &DateTime<Utc>, window: &BreakWindow) -> Result<AnchoredBreak> {
    Ok(AnchoredBreak {
        start: at_time_of_day(day_zero, parse_time_of_day(&window.start)?),
        end: at_time_of_day(day_zero, parse_time_of_day(&window.end)?),
    })
}

fn at_time_of_day(day: &DateTime<Utc>, time: NaiveTime) -> DateTime<Utc> {
    day.date_naive().and_time(time).and_utc()
}

fn parse_time_of_day(s: &str) -> Result<NaiveTime> {
    let s = s.trim();
    NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .map_err(|_| AppError::InvalidTemplate(format!("invalid break time: '{s}'")))
}

/// A segment is admissible against a break only when it ends at or before
/// the break starts, or starts at or after the break ends. Each break is
/// checked on its own; failing any one rejects the segment.
fn has_break_collision(
    breaks: &[AnchoredBreak],
    segment_start: &DateTime<Utc>,
    segment_end: &DateTime<Utc>,
) -> bool {
    breaks.iter().any(|b| {
        let before = segment_start < &b.start && segment_end <= &b.start;
        let after = segment_start >= &b.end && segment_end > &b.start;
        !(before || after)
    })
}

/// Parses a segment length into whole minutes.
///
/// Accepts ISO-8601 durations (`PT30M`, `PT1H30M`, `P1D`) and the compact
/// form (`30m`, `1h30m`, `90`). A bare number is read as minutes.
pub fn parse_segment_length(s: &str) -> Result<i64> {
    let s = s.trim();
    if s.is_empty() {
        return Err(AppError::InvalidDuration("empty duration".to_string()));
    }

    let seconds = if let Some(iso) = s.strip_prefix('P').or_else(|| s.strip_prefix('p')) {
        parse_iso_duration(s, iso)?
    } else if s.chars().all(|c| c.is_ascii_digit()) {
        s.parse::<i64>()
            .ok()
            .and_then(|minutes| minutes.checked_mul(60))
            .ok_or_else(|| AppError::InvalidDuration(format!("invalid number in '{s}'")))?
    } else {
        parse_components(s, s, |unit| match unit {
            'w' | 'W' => Some(7 * 86_400),
            'd' | 'D' => Some(86_400),
            'h' | 'H' => Some(3_600),
            'm' | 'M' => Some(60),
            's' | 'S' => Some(1),
            _ => None,
        })?
    };

    if seconds <= 0 {
        return Err(AppError::InvalidDuration(format!(
            "duration must be positive: '{s}'"
        )));
    }
    if seconds % 60 != 0 {
        return Err(AppError::InvalidDuration(format!(
            "duration must be a whole number of minutes: '{s}'"
        )));
    }
    if Duration::try_seconds(seconds).is_none() {
        return Err(AppError::InvalidDuration(format!("duration too large: '{s}'")));
    }
    Ok(seconds / 60)
}

fn parse_iso_duration(original: &str, rest: &str) -> Result<i64> {
    let (date_part, time_part) = match rest.find(['T', 't']) {
        Some(idx) => (&rest[..idx], &rest[idx + 1..]),
        None => (rest, ""),
    };
    if date_part.is_empty() && time_part.is_empty() {
        return Err(AppError::InvalidDuration(format!(
            "duration has no components: '{original}'"
        )));
    }

    let mut seconds = 0;
    if !date_part.is_empty() {
        // Years and months have no fixed length and are rejected.
        seconds += parse_components(original, date_part, |unit| match unit {
            'W' | 'w' => Some(7 * 86_400),
            'D' | 'd' => Some(86_400),
            _ => None,
        })?;
    }
    if !time_part.is_empty() {
        seconds += parse_components(original, time_part, |unit| match unit {
            'H' | 'h' => Some(3_600),
            'M' | 'm' => Some(60),
            'S' | 's' => Some(1),
            _ => None,
        })?;
    }
    Ok(seconds)
}

/// Sums `<number><unit>` pairs, scaling each number by the unit's seconds.
fn parse_components(original: &str, s: &str, unit_seconds: impl Fn(char) -> Option<i64>) -> Result<i64> {
    let mut total: i64 = 0;
    let mut num_buf = String::new();
    let mut found_any = false;

    for ch in s.chars() {
        if ch.is_ascii_digit() {
            num_buf.push(ch);
            continue;
        }
        if num_buf.is_empty() {
            return Err(AppError::InvalidDuration(format!(
                "expected number before '{ch}' in '{original}'"
            )));
        }
        let n: i64 = num_buf
            .parse()
            .map_err(|_| AppError::InvalidDuration(format!("invalid number in '{original}'")))?;
        num_buf.clear();

        let scale = unit_seconds(ch).ok_or_else(|| {
            AppError::InvalidDuration(format!("unknown unit '{ch}' in '{original}'"))
        })?;
        total = n
            .checked_mul(scale)
            .and_then(|v| total.checked_add(v))
            .ok_or_else(|| AppError::InvalidDuration(format!("duration too large: '{original}'")))?;
        found_any = true;
    }

    if !num_buf.is_empty() {
        return Err(AppError::InvalidDuration(format!(
            "number without unit at end of '{original}'"
        )));
    }
    if !found_any {
        return Err(AppError::InvalidDuration(format!(
            "no valid components in '{original}'"
        )));
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, NaiveDate, Timelike, Weekday};

    fn dt(s: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(s).unwrap()
    }

    fn template(start: &str, end: &str, length: &str) -> AppointmentTemplate {
        AppointmentTemplate {
            start: dt(start),
            end: dt(end),
            segment_length: length.to_string(),
            breaks: vec![],
            exclude_weekdays: vec![],
            volume: 3,
        }
    }

    fn lunch(start: &str, end: &str) -> BreakWindow {
        BreakWindow {
            start: start.to_string(),
            end: end.to_string(),
        }
    }

    #[test]
    fn test_parse_segment_length_forms() {
        assert_eq!(parse_segment_length("30m").unwrap(), 30);
        assert_eq!(parse_segment_length("1h30m").unwrap(), 90);
        assert_eq!(parse_segment_length("PT45M").unwrap(), 45);
        assert_eq!(parse_segment_length("PT1H").unwrap(), 60);
        assert_eq!(parse_segment_length("P1DT2H").unwrap(), 26 * 60);
        assert!(parse_segment_length("PT90S").is_err());
        assert_eq!(parse_segment_length("20").unwrap(), 20);
    }

    #[test]
    fn test_parse_segment_length_rejects_garbage() {
        for input in ["", "abc", "PT", "P1M", "0m", "PT0M", "10x", "m", "5h3"] {
            assert!(
                matches!(parse_segment_length(input), Err(AppError::InvalidDuration(_))),
                "expected InvalidDuration for {input:?}"
            );
        }
    }

    #[test]
    fn test_expand_is_deterministic() {
        let mut t = template("2025-06-16T09:00:00Z", "2025-06-20T17:00:00Z", "45m");
        t.breaks = vec![lunch("12:00", "13:00")];
        t.exclude_weekdays = vec![3];

        let first = expand(&t).unwrap();
        let second = expand(&t).unwrap();
        assert!(!first.is_empty());
        assert_eq!(first, second);
    }

    #[test]
    fn test_single_break_removes_one_hour_slot() {
        let mut t = template("2025-06-16T09:00:00Z", "2025-06-16T17:00:00Z", "1h");
        t.breaks = vec![lunch("12:00", "13:00")];

        let segments = expand(&t).unwrap();
        assert_eq!(segments.len(), 7);

        let hours: Vec<u32> = segments.iter().map(|s| s.start.hour()).collect();
        assert_eq!(hours, vec![9, 10, 11, 13, 14, 15, 16]);
        assert!(segments.iter().all(|s| s.end - s.start == Duration::hours(1)));
    }

    #[test]
    fn test_break_rejects_partial_overlap() {
        // 11:30-12:30 straddles the start of the break, 12:30-13:30 its end.
        let mut t = template("2025-06-16T09:30:00Z", "2025-06-16T15:30:00Z", "1h");
        t.breaks = vec![lunch("12:00", "13:00")];

        let segments = expand(&t).unwrap();
        let hours: Vec<(u32, u32)> = segments
            .iter()
            .map(|s| (s.start.hour(), s.start.minute()))
            .collect();
        assert_eq!(hours, vec![(9, 30), (10, 30), (13, 30), (14, 30)]);
    }

    #[test]
    fn test_every_break_is_checked_independently() {
        let mut t = template("2025-06-16T09:00:00Z", "2025-06-16T17:00:00Z", "1h");
        t.breaks = vec![lunch("10:00", "11:00"), lunch("15:00", "16:00")];

        let segments = expand(&t).unwrap();
        let hours: Vec<u32> = segments.iter().map(|s| s.start.hour()).collect();
        assert_eq!(hours, vec![9, 11, 12, 13, 14, 16]);
    }

    #[test]
    fn test_weekday_exclusion_skips_saturdays() {
        // 2025-06-16 is a Monday; fourteen days reach Sunday 2025-06-29.
        let mut t = template("2025-06-16T09:00:00Z", "2025-06-29T17:00:00Z", "2h");
        t.exclude_weekdays = vec![6];

        let segments = expand(&t).unwrap();
        assert!(segments
            .iter()
            .all(|s| s.start.weekday() != Weekday::Sat));
        // 14 days, 2 Saturdays skipped, 4 segments a day.
        assert_eq!(segments.len(), 12 * 4);
    }

    #[test]
    fn test_multi_day_span_uses_daily_window() {
        // Monday 09:00 to Wednesday 17:00.
        let t = template("2025-06-16T09:00:00Z", "2025-06-18T17:00:00Z", "4h");

        let segments = expand(&t).unwrap();
        assert_eq!(segments.len(), 6);

        let first_day = NaiveDate::from_ymd_opt(2025, 6, 16).unwrap();
        let last_day = NaiveDate::from_ymd_opt(2025, 6, 18).unwrap();
        for segment in &segments {
            let date = segment.start.date_naive();
            assert!(date >= first_day && date <= last_day);
            assert!(segment.start.hour() == 9 || segment.start.hour() == 13);
            assert_eq!(segment.end.date_naive(), date);
        }
    }

    #[test]
    fn test_zero_volume_still_expands() {
        let mut t = template("2025-06-16T09:00:00Z", "2025-06-16T11:00:00Z", "30m");
        t.volume = 0;

        let segments = expand(&t).unwrap();
        assert_eq!(segments.len(), 4);
        assert!(segments.iter().all(|s| s.volume == 0));
    }

    #[test]
    fn test_zero_length_range_yields_nothing() {
        let t = template("2025-06-16T09:00:00Z", "2025-06-16T09:00:00Z", "30m");
        assert!(expand(&t).unwrap().is_empty());
    }

    #[test]
    fn test_segment_longer_than_window_yields_nothing() {
        let t = template("2025-06-16T09:00:00Z", "2025-06-18T10:00:00Z", "2h");
        assert!(expand(&t).unwrap().is_empty());
    }

    #[test]
    fn test_closing_time_before_opening_time_yields_nothing() {
        // Monday 17:00 to Wednesday 09:00: the daily window is negative.
        let t = template("2025-06-16T17:00:00Z", "2025-06-18T09:00:00Z", "1h");
        assert!(expand(&t).unwrap().is_empty());
    }

    #[test]
    fn test_offset_is_preserved() {
        // 07:00Z-10:00Z each day; break times are read as UTC.
        let mut t = template(
            "2025-06-16T09:00:00+02:00",
            "2025-06-17T12:00:00+02:00",
            "1h",
        );
        t.breaks = vec![lunch("08:00", "09:00")];

        let segments = expand(&t).unwrap();
        assert_eq!(segments.len(), 4);
        for segment in &segments {
            assert_eq!(segment.start.offset().local_minus_utc(), 2 * 3600);
            assert_ne!(segment.start.hour(), 10);
        }
        assert_eq!(segments[0].start, dt("2025-06-16T09:00:00+02:00"));
        assert_eq!(segments[3].start, dt("2025-06-17T11:00:00+02:00"));
    }

    #[test]
    fn test_break_is_anchored_in_utc() {
        // A 10:00 break is 12:00 at +02:00, after this window closes.
        let mut t = template(
            "2025-06-16T09:00:00+02:00",
            "2025-06-16T12:00:00+02:00",
            "1h",
        );
        t.breaks = vec![lunch("10:00", "11:00")];
        assert_eq!(expand(&t).unwrap().len(), 3);
    }

    #[test]
    fn test_day_count_crossing_local_midnight() {
        // 21:00Z-23:00Z on one UTC day, even though the local dates differ.
        let t = template(
            "2025-06-16T23:00:00+02:00",
            "2025-06-17T01:00:00+02:00",
            "1h",
        );

        let segments = expand(&t).unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].start, dt("2025-06-16T23:00:00+02:00"));
        assert_eq!(segments[1].start, dt("2025-06-17T00:00:00+02:00"));
        assert_eq!(segments[1].end, dt("2025-06-17T01:00:00+02:00"));
    }

    #[test]
    fn test_weekday_is_taken_from_utc_date() {
        // Saturday 00:30 at +02:00 is still Friday 22:30Z.
        let mut t = template(
            "2025-06-21T00:30:00+02:00",
            "2025-06-21T01:30:00+02:00",
            "1h",
        );
        t.exclude_weekdays = vec![6];
        assert_eq!(expand(&t).unwrap().len(), 1);

        t.exclude_weekdays = vec![5];
        assert!(expand(&t).unwrap().is_empty());
    }

    #[test]
    fn test_oversized_length_is_rejected() {
        for input in ["P1000000000000D", "PT9223372036854775807S", "99999999999999999"] {
            assert!(
                matches!(parse_segment_length(input), Err(AppError::InvalidDuration(_))),
                "expected InvalidDuration for {input:?}"
            );
        }

        let t = template("2025-06-16T09:00:00Z", "2025-06-16T17:00:00Z", "P1000000000000D");
        assert!(matches!(expand(&t), Err(AppError::InvalidDuration(_))));
    }

    #[test]
    fn test_length_longer_than_span_is_accepted() {
        let t = template("2025-06-16T09:00:00Z", "2025-06-16T17:00:00Z", "P3650D");
        assert!(expand(&t).unwrap().is_empty());
    }

    #[test]
    fn test_end_in_other_offset_is_normalized() {
        // 15:00Z is 17:00 at +02:00, giving a 09:00-17:00 window.
        let t = template("2025-06-16T09:00:00+02:00", "2025-06-16T15:00:00Z", "1h");
        assert_eq!(expand(&t).unwrap().len(), 8);
    }

    #[test]
    fn test_invalid_templates() {
        let backwards = template("2025-06-16T17:00:00Z", "2025-06-16T09:00:00Z", "1h");
        assert!(matches!(expand(&backwards), Err(AppError::InvalidTemplate(_))));

        let mut negative = template("2025-06-16T09:00:00Z", "2025-06-16T17:00:00Z", "1h");
        negative.volume = -1;
        assert!(matches!(expand(&negative), Err(AppError::InvalidTemplate(_))));

        let mut bad_weekday = template("2025-06-16T09:00:00Z", "2025-06-16T17:00:00Z", "1h");
        bad_weekday.exclude_weekdays = vec![8];
        assert!(matches!(expand(&bad_weekday), Err(AppError::InvalidTemplate(_))));

        let mut bad_break = template("2025-06-16T09:00:00Z", "2025-06-16T17:00:00Z", "1h");
        bad_break.breaks = vec![lunch("noon", "13:00")];
        assert!(matches!(expand(&bad_break), Err(AppError::InvalidTemplate(_))));

        let bad_length = template("2025-06-16T09:00:00Z", "2025-06-16T17:00:00Z", "soon");
        assert!(matches!(expand(&bad_length), Err(AppError::InvalidDuration(_))));
    }

    #[test]
    fn test_inverted_break_is_applied_as_given() {
        // Not validated: a break ending before it starts only rejects
        // segments that straddle both of its bounds.
        let mut t = template("2025-06-16T09:00:00Z", "2025-06-16T13:00:00Z", "2h");
        t.breaks = vec![lunch("12:00", "11:30")];

        let hours: Vec<u32> = expand(&t).unwrap().iter().map(|s| s.start.hour()).collect();
        assert_eq!(hours, vec![9]);
    }
}
