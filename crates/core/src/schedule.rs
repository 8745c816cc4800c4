//! Reminder time expressions accepted by `/yaruki_reminder`.
//!
//! Supported forms, all interpreted in the bot's fixed UTC offset:
//! - empty text: the configured default delay
//! - relative: `in 10 minutes`, `90s`, `2h`, `30分後`, `1時間後`
//! - wall clock: `18:30` (next occurrence), `tomorrow 9:00`, `明日 9:00`
//! - absolute: `2025-04-01 09:30` or `2025/04/01 09:30`

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use thiserror::Error;

use crate::config::MAX_SCHEDULE_HORIZON_SECS;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("could not understand reminder time `{0}`")]
    Unrecognized(String),
    #[error("reminder time `{0}` is not in the future")]
    InPast(String),
    #[error("reminder time `{0}` is more than 120 days ahead")]
    TooFar(String),
}

pub fn parse_reminder_time(
    text: &str,
    now: DateTime<Utc>,
    offset: FixedOffset,
    default_delay_secs: u64,
) -> Result<DateTime<Utc>, ScheduleError> {
    let input = text.trim();
    let target = if input.is_empty() {
        after_secs(now, default_delay_secs, input)?
    } else {
        let normalized = to_half_width(input).to_lowercase();
        let normalized = normalized.strip_prefix("in ").unwrap_or(&normalized).trim();

        if let Some(secs) = parse_relative_secs(normalized) {
            after_secs(now, secs, input)?
        } else if let Some(target) = parse_wall_clock(normalized, now, offset) {
            target
        } else {
            return Err(ScheduleError::Unrecognized(input.to_owned()));
        }
    };

    if target <= now {
        return Err(ScheduleError::InPast(input.to_owned()));
    }
    if (target - now).num_seconds() > MAX_SCHEDULE_HORIZON_SECS as i64 {
        return Err(ScheduleError::TooFar(input.to_owned()));
    }

    Ok(target)
}

/// Maps full-width ASCII forms (`３０`, `：`, `／`) and the ideographic space
/// to their ASCII equivalents, as Japanese IMEs produce them by default.
fn to_half_width(input: &str) -> String {
    input
        .chars()
        .map(|ch| match ch {
            '\u{3000}' => ' ',
            '\u{FF01}'..='\u{FF5E}' => char::from_u32(ch as u32 - 0xFEE0).unwrap_or(ch),
            _ => ch,
        })
        .collect()
}

fn after_secs(now: DateTime<Utc>, secs: u64, input: &str) -> Result<DateTime<Utc>, ScheduleError> {
    if secs > MAX_SCHEDULE_HORIZON_SECS {
        return Err(ScheduleError::TooFar(input.to_owned()));
    }
    Ok(now + Duration::seconds(secs as i64))
}

fn parse_relative_secs(input: &str) -> Option<u64> {
    let digits_end = input.find(|ch: char| !ch.is_ascii_digit()).unwrap_or(input.len());
    if digits_end == 0 {
        return None;
    }
    let amount = input[..digits_end].parse::<u64>().ok()?;
    let unit = input[digits_end..].trim();

    let multiplier = match unit {
        "s" | "sec" | "secs" | "second" | "seconds" | "秒" | "秒後" => 1,
        "m" | "min" | "mins" | "minute" | "minutes" | "分" | "分後" => 60,
        "h" | "hr" | "hrs" | "hour" | "hours" | "時間" | "時間後" => 60 * 60,
        "d" | "day" | "days" | "日" | "日後" => 24 * 60 * 60,
        _ => return None,
    };

    amount.checked_mul(multiplier)
}

fn parse_wall_clock(
    input: &str,
    now: DateTime<Utc>,
    offset: FixedOffset,
) -> Option<DateTime<Utc>> {
    let today = now.with_timezone(&offset).date_naive();

    let tomorrow_rest = input.strip_prefix("tomorrow").or_else(|| input.strip_prefix("明日"));
    if let Some(rest) = tomorrow_rest {
        let time = parse_time(rest.trim())?;
        return localize(today.succ_opt()?.and_time(time), offset);
    }

    if let Some(time) = parse_time(input) {
        let candidate = localize(today.and_time(time), offset)?;
        if candidate > now {
            return Some(candidate);
        }
        return localize(today.succ_opt()?.and_time(time), offset);
    }

    let (date_part, time_part) = input.split_once(' ')?;
    let date = NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(date_part, "%Y/%m/%d"))
        .ok()?;
    localize(date.and_time(parse_time(time_part.trim())?), offset)
}

fn parse_time(input: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(input, "%H:%M").ok()
}

fn localize(local: NaiveDateTime, offset: FixedOffset) -> Option<DateTime<Utc>> {
    offset.from_local_datetime(&local).single().map(|value| value.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, FixedOffset, TimeZone, Utc};

    use super::{parse_reminder_time, ScheduleError};

    fn jst() -> FixedOffset {
        FixedOffset::east_opt(9 * 3600).expect("valid offset")
    }

    // 2025-03-10 10:00:00 JST
    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, 1, 0, 0).single().expect("valid instant")
    }

    fn jst_instant(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        jst().with_ymd_and_hms(y, mo, d, h, mi, 0).single().expect("valid instant").with_timezone(&Utc)
    }

    #[test]
    fn full_width_digits_and_colon_are_accepted() {
        assert_eq!(
            parse_reminder_time("３０分後", now(), jst(), 30).expect("relative"),
            now() + Duration::minutes(30)
        );
        assert_eq!(
            parse_reminder_time("１８：３０", now(), jst(), 30).expect("wall clock"),
            jst_instant(2025, 3, 10, 18, 30)
        );
        assert_eq!(
            parse_reminder_time("明日　９：００", now(), jst(), 30).expect("tomorrow"),
            jst_instant(2025, 3, 11, 9, 0)
        );
    }

    #[test]
    fn empty_text_uses_default_delay() {
        let target = parse_reminder_time("  ", now(), jst(), 30).expect("default delay");
        assert_eq!(target, now() + Duration::seconds(30));
    }

    #[test]
    fn relative_expressions_in_english_and_japanese() {
        assert_eq!(
            parse_reminder_time("in 10 minutes", now(), jst(), 30),
            Ok(now() + Duration::minutes(10))
        );
        assert_eq!(parse_reminder_time("90s", now(), jst(), 30), Ok(now() + Duration::seconds(90)));
        assert_eq!(parse_reminder_time("30分後", now(), jst(), 30), Ok(now() + Duration::minutes(30)));
        assert_eq!(parse_reminder_time("2時間後", now(), jst(), 30), Ok(now() + Duration::hours(2)));
    }

    #[test]
    fn wall_clock_later_today_stays_today() {
        assert_eq!(parse_reminder_time("18:30", now(), jst(), 30), Ok(jst_instant(2025, 3, 10, 18, 30)));
    }

    #[test]
    fn wall_clock_already_passed_rolls_to_tomorrow() {
        assert_eq!(parse_reminder_time("09:15", now(), jst(), 30), Ok(jst_instant(2025, 3, 11, 9, 15)));
    }

    #[test]
    fn tomorrow_prefix_in_both_languages() {
        let expected = jst_instant(2025, 3, 11, 9, 0);
        assert_eq!(parse_reminder_time("tomorrow 9:00", now(), jst(), 30), Ok(expected));
        assert_eq!(parse_reminder_time("明日 9:00", now(), jst(), 30), Ok(expected));
    }

    #[test]
    fn absolute_dates_are_interpreted_in_offset() {
        assert_eq!(
            parse_reminder_time("2025-04-01 09:30", now(), jst(), 30),
            Ok(jst_instant(2025, 4, 1, 9, 30))
        );
        assert_eq!(
            parse_reminder_time("2025/04/01 09:30", now(), jst(), 30),
            Ok(jst_instant(2025, 4, 1, 9, 30))
        );
    }

    #[test]
    fn past_and_distant_times_are_rejected() {
        assert_eq!(
            parse_reminder_time("2025-03-01 09:30", now(), jst(), 30),
            Err(ScheduleError::InPast("2025-03-01 09:30".to_owned()))
        );
        assert_eq!(
            parse_reminder_time("200 days", now(), jst(), 30),
            Err(ScheduleError::TooFar("200 days".to_owned()))
        );
    }

    #[test]
    fn unrecognized_text_names_the_input() {
        let error = parse_reminder_time("next blue moon", now(), jst(), 30).expect_err("garbage");
        assert_eq!(error.to_string(), "could not understand reminder time `next blue moon`");
    }
}
